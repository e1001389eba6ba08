// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decides what happens to a region that doesn't fit in the output image.

use std::ops::Range;

use crate::error::CombineError;
use crate::manifest::Span;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// The region fits; write it at this byte range.
    Accept(Range<usize>),
    /// The region runs off the end of the image and `force` was given, so
    /// leave it out.
    Skip,
}

/// Checks `span` against an image of `image_size` bytes.
///
/// Negative addresses or sizes are always an error. A region that ends past
/// the image is an error unless `force` is set, in which case it's skipped.
pub fn admit(
    span: &Span,
    image_size: usize,
    force: bool,
) -> Result<Admission, CombineError> {
    let invalid = || CombineError::InvalidRegion {
        role: span.role,
        offset: span.offset,
        length: span.length,
    };

    let offset = u64::try_from(span.offset).map_err(|_| invalid())?;
    let length = u64::try_from(span.length).map_err(|_| invalid())?;
    let end = offset.checked_add(length).ok_or_else(invalid)?;

    // Anything that fits in the image fits in a usize, so these conversions
    // only fail for regions that are out of bounds anyway.
    match (usize::try_from(offset), usize::try_from(end)) {
        (Ok(start), Ok(stop)) if stop <= image_size => {
            Ok(Admission::Accept(start..stop))
        }
        _ if force => Ok(Admission::Skip),
        _ => Err(CombineError::OutputTooSmall {
            role: span.role,
            end,
            image_size,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Role;

    fn span(offset: i64, length: i64) -> Span {
        Span { role: Role::Fw, offset, length }
    }

    #[test]
    fn fitting_region_is_accepted() {
        assert_eq!(
            admit(&span(16, 32), 64, false).unwrap(),
            Admission::Accept(16..48),
        );
        // Ending exactly at the end of the image is fine.
        assert_eq!(
            admit(&span(32, 32), 64, false).unwrap(),
            Admission::Accept(32..64),
        );
        assert_eq!(
            admit(&span(64, 0), 64, false).unwrap(),
            Admission::Accept(64..64),
        );
    }

    #[test]
    fn oversized_region_is_fatal_without_force() {
        let err = admit(&span(90, 20), 100, false).unwrap_err();
        assert!(matches!(
            err,
            CombineError::OutputTooSmall { role: Role::Fw, end: 110, image_size: 100 },
        ));
    }

    #[test]
    fn oversized_region_is_skipped_with_force() {
        assert_eq!(admit(&span(90, 20), 100, true).unwrap(), Admission::Skip);
        assert_eq!(admit(&span(1000, 0), 100, true).unwrap(), Admission::Skip);
    }

    #[test]
    fn negative_values_are_invalid_even_with_force() {
        for force in [false, true] {
            for s in [span(-1, 4), span(0, -4), span(i64::MIN, i64::MIN)] {
                assert!(matches!(
                    admit(&s, 100, force),
                    Err(CombineError::InvalidRegion { .. }),
                ));
            }
        }
    }

    #[test]
    fn huge_region_is_out_of_bounds_not_a_panic() {
        assert!(matches!(
            admit(&span(i64::MAX, i64::MAX), 100, false),
            Err(CombineError::OutputTooSmall { .. }),
        ));
        assert_eq!(
            admit(&span(i64::MAX, i64::MAX), 100, true).unwrap(),
            Admission::Skip,
        );
    }
}
