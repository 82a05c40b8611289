//! File comparison: decides whether a replica file must be re-copied.
//!
//! [`CompareMode::Content`] checks sizes first and only hashes both files
//! (SHA-256, streamed) when the sizes agree. [`CompareMode::Metadata`] trusts
//! size plus whole-second modification time.

use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::Path;

use filetime::FileTime;
use sha2::{Digest, Sha256};

use mirror_core::CompareMode;

const HASH_BUF_BYTES: usize = 64 * 1024;

/// Outcome of comparing a source file with its replica counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    AbsentInReplica,
    Differing,
    Identical,
}

impl Comparison {
    pub fn needs_copy(&self) -> bool {
        !matches!(self, Comparison::Identical)
    }
}

/// Compare `source` with `replica` under `mode`.
///
/// A missing replica is not an error. Any other I/O failure is returned so
/// the caller can report it against the offending file.
pub fn compare_files(source: &Path, replica: &Path, mode: CompareMode) -> io::Result<Comparison> {
    let replica_meta = match fs::metadata(replica) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(Comparison::AbsentInReplica)
        }
        Err(err) => return Err(err),
    };
    let source_meta = fs::metadata(source)?;

    if source_meta.len() != replica_meta.len() {
        return Ok(Comparison::Differing);
    }

    let identical = match mode {
        CompareMode::Metadata => same_mtime(&source_meta, &replica_meta),
        CompareMode::Content => file_digest(source)? == file_digest(replica)?,
    };

    Ok(if identical {
        Comparison::Identical
    } else {
        Comparison::Differing
    })
}

/// SHA-256 hex digest of the file at `path`.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUF_BYTES];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn same_mtime(a: &Metadata, b: &Metadata) -> bool {
    FileTime::from_last_modification_time(a).unix_seconds()
        == FileTime::from_last_modification_time(b).unix_seconds()
}
