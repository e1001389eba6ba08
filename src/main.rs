// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mgos-combine` turns a Mongoose OS style firmware package into a single
//! flat image that can be written to flash in one go.
//!
//! The package is either a zip archive containing a `manifest.json` and the
//! binaries it names, or a loose manifest file with the binaries next to it.
//! The manifest says where the bootloader, filesystem, firmware and system
//! parameters go, and which ranges (boot config, RF calibration data) get
//! filled with a constant byte. We lay all of that out in a zeroed buffer of
//! the requested size and write it out.
//!
//! Checksums in the manifest are checked, but a mismatch is only reported --
//! it's common to have a stale manifest during development and we'd rather
//! not get in the way.

mod archive;
mod assemble;
mod checksum;
mod error;
mod image;
mod manifest;
mod policy;

use std::io::Write;
use std::path::{Path, PathBuf};
use clap::Parser;
use anyhow::{Context, Result, bail};

use crate::manifest::Layout;

/// Archive used when neither `--input` nor `--manifest` is given.
const DEFAULT_ARCHIVE: &str = "./build/fw.zip";

/// Name of the manifest inside a firmware archive.
const MANIFEST_NAME: &str = "manifest.json";

///////////////////////////////////////////////////////////////////////
// Command line interface definition.

/// mgos-combine assembles a firmware package into a single flashable image.
#[derive(Parser)]
#[clap(term_width = 80)]
struct Combine {
    /// Path to the firmware zip file. The archive is unpacked into a
    /// temporary directory (ignoring any directories inside it) and must
    /// contain a `manifest.json`. Defaults to `./build/fw.zip`.
    #[clap(long, short, value_name = "ZIP")]
    input: Option<PathBuf>,

    /// Use an unpacked manifest instead of a zip file. Binaries named in the
    /// manifest are looked up relative to the manifest's directory.
    #[clap(long, short, value_name = "PATH", conflicts_with = "input")]
    manifest: Option<PathBuf>,

    /// Name of the output file.
    #[clap(long, short, default_value = "output.bin")]
    output: PathBuf,

    /// Output file size in KiB, given as a decimal number or with a 0x / 0b
    /// prefix.
    #[clap(
        long,
        short,
        value_name = "KB",
        default_value = "4096",
        parse(try_from_str = parse_u32),
    )]
    size: u32,

    /// Force writing to an output file that is too small. Parts that don't
    /// fit are skipped with a warning instead of failing the whole run.
    #[clap(long, short)]
    force: bool,

    /// Enable additional output, probably more of it than you'd like.
    #[clap(long)]
    verbose: bool,

    /// Prints the current version and exits. All other options are ignored.
    #[clap(long, short, action = clap::ArgAction::SetTrue)]
    version: bool,
}

/// Where the manifest and binaries come from.
enum Source {
    Archive(PathBuf),
    Manifest(PathBuf),
}

/// Everything the run needs, resolved from the command line.
struct RunConfig {
    source: Source,
    output: PathBuf,
    image_size: usize,
    force: bool,
}

impl RunConfig {
    fn from_args(args: Combine) -> Result<Self> {
        if args.size == 0 {
            bail!("output size must be positive");
        }
        let image_size = usize::try_from(args.size)
            .ok()
            .and_then(|kb| kb.checked_mul(1024))
            .with_context(|| format!(
                "output size of {} KiB is too large for this host",
                args.size,
            ))?;

        let source = match (args.manifest, args.input) {
            (Some(manifest), _) => Source::Manifest(manifest),
            (None, Some(input)) => Source::Archive(input),
            (None, None) => Source::Archive(PathBuf::from(DEFAULT_ARCHIVE)),
        };

        Ok(Self {
            source,
            output: args.output,
            image_size,
            force: args.force,
        })
    }
}

///////////////////////////////////////////////////////////////////////
// Main function.

fn main() -> Result<()> {
    let args = Combine::parse();

    if args.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    run(&RunConfig::from_args(args)?)
}

fn run(config: &RunConfig) -> Result<()> {
    // The temporary directory, if any, must outlive assembly; it's removed
    // when this goes out of scope, error or not.
    let _scratch;
    let (manifest_path, base_dir) = match &config.source {
        Source::Archive(zip_path) => {
            let dir = archive::expand_to_temp(zip_path)?;
            let base = dir.path().to_owned();
            _scratch = dir;
            (base.join(MANIFEST_NAME), base)
        }
        Source::Manifest(path) => {
            let base = path.parent()
                .map(Path::to_owned)
                .unwrap_or_default();
            (path.clone(), base)
        }
    };

    let layout = Layout::load(&manifest_path)?;

    let assembly = assemble::assemble(
        &layout,
        config.image_size,
        config.force,
        |src| assemble::load_source(&base_dir, src),
    )?;

    write_image(&config.output, assembly.image.as_bytes())?;

    log::info!(
        "wrote {} ({} bytes{})",
        config.output.display(),
        assembly.image.len(),
        match assembly.warnings.len() {
            0 => String::new(),
            n => format!(", {n} warnings"),
        },
    );

    Ok(())
}

/// Writes the finished image. This happens only once assembly has succeeded,
/// and the data goes to a temporary file next to `path` that is renamed into
/// place at the end, so a failed run never leaves a partial output file
/// behind.
fn write_image(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut out = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!(
            "failed to create output file {}",
            path.display(),
        ))?;
    out.write_all(bytes)
        .and_then(|_| out.flush())
        .with_context(|| format!(
            "failed to write output file {}",
            path.display(),
        ))?;

    // Temporary files are created owner-only; the image should look like any
    // other build output.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        out.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .with_context(|| format!(
                "failed to set permissions on {}",
                path.display(),
            ))?;
    }

    out.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!(
            "failed to write output file {}",
            path.display(),
        ))?;
    Ok(())
}

///////////////////////////////////////////////////////////////////////
// Clap helper functions. Out of the box, Clap does not appear to be able to
// parse numbers with a base prefix. So, let's fix that.

fn parse_u32(s: &str) -> Result<u32> {
    parse_with_prefix(s, u32::from_str_radix)
}

fn parse_with_prefix<T>(
    s: &str,
    parse_radix: impl FnOnce(&str, u32) -> Result<T, std::num::ParseIntError>,
) -> Result<T> {
    if let Some(hex) = s.strip_prefix("0x") {
        parse_radix(hex, 16)
            .context("has hex prefix 0x but is not a hex number")
    } else if let Some(bin) = s.strip_prefix("0b") {
        parse_radix(bin, 2)
            .context("has binary prefix 0b but is not a binary number")
    } else {
        parse_radix(s, 10)
            .context("expected decimal number or 0x/0b prefix")
    }
}
