// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SHA-256 checks for source binaries.

use sha2::{Digest, Sha256};

/// Hashes `blob` and returns the digest as lowercase hex, the way manifests
/// write it.
pub fn sha256_hex(blob: &[u8]) -> String {
    hex::encode(Sha256::digest(blob))
}

/// Checks `blob` against a manifest checksum. Surrounding whitespace and case
/// in `expected` are ignored.
pub fn verify(blob: &[u8], expected: &str) -> bool {
    sha256_hex(blob) == expected.trim().to_ascii_lowercase()
}
