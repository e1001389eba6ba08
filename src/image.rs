// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The flat flash image under construction.

use crate::error::CombineError;
use crate::manifest::{CopyRegion, FillRegion};
use crate::policy::{self, Admission};

/// Result of asking the image to take a region.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    Written,
    /// The region didn't fit and was left out because of `force`.
    Skipped,
}

/// A fixed-size, zero-initialized flash image. Regions are written into it
/// in place; its size never changes after creation.
#[derive(Clone, Debug)]
pub struct Image {
    bytes: Vec<u8>,
}

impl Image {
    pub fn zeroed(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copies the first `size` bytes of `blob` to the region's address.
    ///
    /// Anything in `blob` past the region's size is ignored. A blob shorter
    /// than the region is an error; we won't pad it out.
    pub fn place_copy(
        &mut self,
        region: &CopyRegion,
        blob: &[u8],
        force: bool,
    ) -> Result<Placement, CombineError> {
        let range = match policy::admit(&region.span, self.len(), force)? {
            Admission::Accept(range) => range,
            Admission::Skip => return Ok(Placement::Skipped),
        };

        let data = blob.get(..range.len())
            .ok_or_else(|| CombineError::TruncatedSource {
                role: region.span.role,
                src: region.src.clone(),
                needed: range.len(),
                actual: blob.len(),
            })?;

        self.bytes[range].copy_from_slice(data);
        Ok(Placement::Written)
    }

    /// Sets every byte in the region to its fill value.
    pub fn place_fill(
        &mut self,
        region: &FillRegion,
        force: bool,
    ) -> Result<Placement, CombineError> {
        match policy::admit(&region.span, self.len(), force)? {
            Admission::Accept(range) => {
                self.bytes[range].fill(region.fill);
                Ok(Placement::Written)
            }
            Admission::Skip => Ok(Placement::Skipped),
        }
    }
}
