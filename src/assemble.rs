// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builds the output image from a layout.

use std::path::Path;

use thiserror::Error;

use crate::checksum;
use crate::error::CombineError;
use crate::image::{Image, Placement};
use crate::manifest::{Layout, Role, Span};

/// Things that went wrong without stopping the run.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Warning {
    #[error(
        "SHA256 sum not matching for {src} in part `{role}` \
         (manifest says {expected:?}, file is {actual})"
    )]
    ChecksumMismatch {
        role: Role,
        src: String,
        expected: String,
        actual: String,
    },

    #[error(
        "skipping part `{role}` ({length:#x} bytes at {offset:#x}): \
         does not fit in output"
    )]
    SkippedRegion {
        role: Role,
        offset: i64,
        length: i64,
    },
}

impl Warning {
    fn skipped(span: &Span) -> Self {
        Warning::SkippedRegion {
            role: span.role,
            offset: span.offset,
            length: span.length,
        }
    }
}

#[derive(Debug)]
pub struct Assembly {
    pub image: Image,
    pub warnings: Vec<Warning>,
}

/// Lays out every region of `layout` in an image of `image_size` bytes.
///
/// File-backed regions go first, in manifest order, then the fill regions.
/// Source binaries are obtained by calling `load` with the region's `src`;
/// each one is dropped before the next is loaded. The first fatal error stops
/// the whole thing.
pub fn assemble(
    layout: &Layout,
    image_size: usize,
    force: bool,
    mut load: impl FnMut(&str) -> Result<Vec<u8>, CombineError>,
) -> Result<Assembly, CombineError> {
    let mut image = Image::zeroed(image_size);
    let mut warnings = vec![];

    let mut warn = |w: Warning| {
        log::warn!("{w}");
        warnings.push(w);
    };

    for region in layout.copy_regions() {
        let blob = load(&region.src)?;

        // The checksum is advisory, so check it whether or not the region
        // ends up in the image.
        if !checksum::verify(&blob, &region.sha256) {
            warn(Warning::ChecksumMismatch {
                role: region.span.role,
                src: region.src.clone(),
                expected: region.sha256.clone(),
                actual: checksum::sha256_hex(&blob),
            });
        }

        match image.place_copy(region, &blob, force)? {
            Placement::Written => log::debug!(
                "{}: {} -> {:#x}+{:#x}",
                region.span.role,
                region.src,
                region.span.offset,
                region.span.length,
            ),
            Placement::Skipped => warn(Warning::skipped(&region.span)),
        }
    }

    for region in layout.fill_regions() {
        match image.place_fill(region, force)? {
            Placement::Written => log::debug!(
                "{}: fill {:#04x} -> {:#x}+{:#x}",
                region.span.role,
                region.fill,
                region.span.offset,
                region.span.length,
            ),
            Placement::Skipped => warn(Warning::skipped(&region.span)),
        }
    }

    Ok(Assembly { image, warnings })
}

/// Reads a source binary named in the manifest, relative to `base_dir`.
pub fn load_source(base_dir: &Path, src: &str) -> Result<Vec<u8>, CombineError> {
    let path = base_dir.join(src);
    std::fs::read(&path).map_err(|e| {
        CombineError::io(format!("failed to read {}", path.display()), e)
    })
}
