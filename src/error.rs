// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fatal error conditions. Anything in here ends the run.

use thiserror::Error;

use crate::manifest::Role;

#[derive(Debug, Error)]
pub enum CombineError {
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    /// A region with a negative address or size, or one whose end can't be
    /// represented.
    #[error("part `{role}` has invalid region (addr {offset}, size {length})")]
    InvalidRegion {
        role: Role,
        offset: i64,
        length: i64,
    },

    #[error(
        "part `{role}`: source {src} is {actual} bytes, \
         but the region needs {needed}"
    )]
    TruncatedSource {
        role: Role,
        src: String,
        needed: usize,
        actual: usize,
    },

    #[error(
        "size of output file too small: part `{role}` ends at {end:#x} \
         but the image is only {image_size:#x} bytes (use --force to skip it)"
    )]
    OutputTooSmall {
        role: Role,
        end: u64,
        image_size: usize,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract firmware archive")]
    Archive(#[from] zip::result::ZipError),
}

impl CombineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
