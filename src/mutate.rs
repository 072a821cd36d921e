//! Byte mutation engine.
//!
//! A run reads the whole input file into memory, picks `floor(len * percent / 100)` distinct
//! positions, replaces each picked byte with a different random value and commits the buffer to
//! `<outdir>/<input file name>`. The output is written to a temporary file in the destination
//! directory first and renamed into place, so a failed run never leaves a truncated file behind.

use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use rand::seq::index;
use rand::Rng;
use sha1::{Digest, Sha1};
use tempfile::Builder;
use tracing::{debug, trace};

use crate::error::{IoOp, MutationError, Result};

/// Exclusive upper bound of replacement values: `0xff` is never written.
pub const REPLACEMENT_CEILING: u8 = 0xff;

/// Summary of a successful run.
#[derive(Debug)]
pub struct MutationReport {
    pub output: PathBuf,
    pub fsize: usize,
    pub nbytes: usize,
    /// Mutated positions, in ascending order.
    pub positions: Vec<usize>,
    /// Hex SHA-1 of the bytes written to `output`.
    pub sha1: String,
}

/// Number of bytes to mutate in a buffer of `fsize` bytes. Truncates, so `fsize = 10` at 1%
/// gives 0. Percentages of 100 and above select every byte.
pub fn mutation_count(fsize: usize, percent: u32) -> usize {
    if percent >= 100 {
        return fsize;
    }
    (fsize as u128 * u128::from(percent) / 100) as usize
}

/// Mutates `percent`% of `data` in place and returns the mutated positions.
///
/// Positions are sampled uniformly without replacement. Every mutated byte is guaranteed to
/// differ from its previous value.
pub fn mutate<T>(rand: &mut T, data: &mut [u8], percent: u32) -> Vec<usize>
where
    T: Rng,
{
    let nbytes = mutation_count(data.len(), percent);
    let mut positions = index::sample(rand, data.len(), nbytes).into_vec();
    positions.sort_unstable();

    for &pos in &positions {
        let original = data[pos];
        let replacement = loop {
            let byte = rand.gen_range(0..REPLACEMENT_CEILING);
            if byte != original {
                break byte;
            }
        };
        trace!(pos, original, replacement, "mutated byte");
        data[pos] = replacement;
    }
    positions
}

/// Destination of the fuzzed copy of `input`.
pub fn output_path(input: &Path, outdir: &Path) -> Result<PathBuf> {
    let name = input.file_name().ok_or_else(|| MutationError::NoFileName {
        path: input.to_path_buf(),
    })?;
    Ok(outdir.join(name))
}

/// Loads the whole content of a regular file.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| MutationError::io(IoOp::OpenInput, path, e))?;
    let metadata = file
        .metadata()
        .map_err(|e| MutationError::io(IoOp::OpenInput, path, e))?;
    if !metadata.is_file() {
        return Err(MutationError::io(
            IoOp::OpenInput,
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    let fsize = metadata.len();
    let mut data = Vec::new();
    data.try_reserve_exact(usize::try_from(fsize).unwrap_or(usize::MAX))
        .map_err(|source| MutationError::Allocation {
            path: path.to_path_buf(),
            size: fsize,
            source,
        })?;
    file.read_to_end(&mut data)
        .map_err(|e| MutationError::io(IoOp::ReadInput, path, e))?;
    Ok(data)
}

/// Atomically replaces `path` with `data`.
///
/// An existing destination must be a file the caller may write to, and its permissions carry
/// over to the new content. A new file gets `0o666` minus the umask.
pub fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let existing = match fs::metadata(path) {
        Ok(metadata) => Some(metadata),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(MutationError::io(IoOp::OpenOutput, path, e)),
    };
    if let Some(metadata) = &existing {
        if metadata.is_dir() {
            return Err(MutationError::io(
                IoOp::OpenOutput,
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "is a directory"),
            ));
        }
        OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| MutationError::io(IoOp::OpenOutput, path, e))?;
    }

    #[allow(unused_mut)]
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o666));
    }
    // Dropping the temporary file on any early return deletes it.
    let mut tmp = builder
        .tempfile_in(dir)
        .map_err(|e| MutationError::io(IoOp::OpenOutput, path, e))?;
    if let Some(metadata) = &existing {
        tmp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(|e| MutationError::io(IoOp::OpenOutput, path, e))?;
    }
    tmp.write_all(data)
        .and_then(|_| tmp.flush())
        .map_err(|e| MutationError::io(IoOp::WriteOutput, path, e))?;
    tmp.persist(path)
        .map_err(|e| MutationError::io(IoOp::WriteOutput, path, e.error))?;
    Ok(())
}

/// Writes a copy of `input` into `outdir` with `percent`% of its bytes mutated.
pub fn mutate_file<T>(
    rand: &mut T,
    input: &Path,
    outdir: &Path,
    percent: u32,
) -> Result<MutationReport>
where
    T: Rng,
{
    let output = output_path(input, outdir)?;
    let mut data = read_input(input)?;
    debug!(
        file = %input.display(),
        fsize = data.len(),
        percent,
        nbytes = mutation_count(data.len(), percent),
        "mutation plan"
    );

    let positions = mutate(rand, &mut data, percent);
    write_output(&output, &data)?;

    Ok(MutationReport {
        output,
        fsize: data.len(),
        nbytes: positions.len(),
        positions,
        sha1: format!("{:x}", Sha1::digest(&data)),
    })
}
