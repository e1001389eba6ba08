// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Firmware manifest definitions.
//!
//! A manifest describes the flash layout as a `parts` object with six fixed
//! members. Four of them (`boot`, `fs`, `fw`, `sys_params`) name a binary to
//! copy into the image; the other two (`boot_cfg`, `rf_cal_data`) reserve a
//! range that gets filled with a constant byte. Manifests produced by real
//! build pipelines carry plenty of other fields, which we ignore.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::CombineError;

/// The six parts a manifest can describe.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Boot,
    Fs,
    Fw,
    SysParams,
    BootCfg,
    RfCalData,
}

impl Role {
    /// Name of the part as it appears under `parts` in the manifest.
    pub fn key(self) -> &'static str {
        match self {
            Role::Boot => "boot",
            Role::Fs => "fs",
            Role::Fw => "fw",
            Role::SysParams => "sys_params",
            Role::BootCfg => "boot_cfg",
            Role::RfCalData => "rf_cal_data",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where a region lives in the image, as written in the manifest. The values
/// are kept signed so that nonsense like a negative address survives parsing
/// and can be reported properly when the region is placed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub role: Role,
    pub offset: i64,
    pub length: i64,
}

/// A region whose contents come from a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyRegion {
    pub span: Span,
    /// Path of the source binary, relative to the manifest's directory.
    pub src: String,
    /// Expected SHA-256 of the whole source file, hex encoded.
    pub sha256: String,
}

/// A region set entirely to one byte value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FillRegion {
    pub span: Span,
    pub fill: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    pub boot: CopyRegion,
    pub fs: CopyRegion,
    pub fw: CopyRegion,
    pub sys_params: CopyRegion,
    pub boot_cfg: FillRegion,
    pub rf_cal_data: FillRegion,
}

impl Layout {
    /// Reads and parses the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self, CombineError> {
        let text = std::fs::read(path).map_err(|e| {
            CombineError::io(
                format!("failed to read manifest {}", path.display()),
                e,
            )
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &[u8]) -> Result<Self, CombineError> {
        let raw: RawManifest = serde_json::from_slice(text)
            .map_err(|e| CombineError::MalformedManifest(e.to_string()))?;
        let parts = raw.parts;

        Ok(Self {
            boot: parts.boot.into_copy(Role::Boot)?,
            fs: parts.fs.into_copy(Role::Fs)?,
            fw: parts.fw.into_copy(Role::Fw)?,
            sys_params: parts.sys_params.into_copy(Role::SysParams)?,
            boot_cfg: parts.boot_cfg.into_fill(Role::BootCfg)?,
            rf_cal_data: parts.rf_cal_data.into_fill(Role::RfCalData)?,
        })
    }

    /// The regions backed by files, in the order they're placed.
    pub fn copy_regions(&self) -> [&CopyRegion; 4] {
        [&self.boot, &self.fs, &self.fw, &self.sys_params]
    }

    /// The constant-filled regions, in the order they're placed. These always
    /// go after the copy regions.
    pub fn fill_regions(&self) -> [&FillRegion; 2] {
        [&self.boot_cfg, &self.rf_cal_data]
    }
}

///////////////////////////////////////////////////////////////////////
// On-disk representation.

#[derive(Deserialize)]
struct RawManifest {
    parts: RawParts,
}

#[derive(Deserialize)]
struct RawParts {
    boot: RawPart,
    fs: RawPart,
    fw: RawPart,
    sys_params: RawPart,
    boot_cfg: RawPart,
    rf_cal_data: RawPart,
}

#[derive(Deserialize)]
struct RawPart {
    addr: Option<i64>,
    size: Option<i64>,
    src: Option<String>,
    cs_sha256: Option<String>,
    fill: Option<u8>,
}

impl RawPart {
    fn span(&self, role: Role) -> Result<Span, CombineError> {
        Ok(Span {
            role,
            offset: required(role, "addr", self.addr)?,
            length: required(role, "size", self.size)?,
        })
    }

    fn into_copy(self, role: Role) -> Result<CopyRegion, CombineError> {
        Ok(CopyRegion {
            span: self.span(role)?,
            src: required(role, "src", self.src)?,
            sha256: required(role, "cs_sha256", self.cs_sha256)?,
        })
    }

    fn into_fill(self, role: Role) -> Result<FillRegion, CombineError> {
        Ok(FillRegion {
            span: self.span(role)?,
            fill: required(role, "fill", self.fill)?,
        })
    }
}

fn required<T>(
    role: Role,
    field: &str,
    value: Option<T>,
) -> Result<T, CombineError> {
    value.ok_or_else(|| {
        CombineError::MalformedManifest(format!(
            "part `{role}` is missing required field `{field}`"
        ))
    })
}
