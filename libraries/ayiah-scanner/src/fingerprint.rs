//! Content fingerprints
//!
//! A fingerprint hashes a bounded leading byte range together with the file
//! size. Two files with the same fingerprint are assumed to carry the same
//! metadata, so extraction runs once for both.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Hex-encoded SHA-256 over a file prefix and its size
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of a file whose first bytes are `prefix` and whose total
    /// length is `size`
    pub fn compute(prefix: &[u8], size: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(prefix);
        hasher.update(size.to_le_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read at most `len` leading bytes of a file
pub fn read_prefix(path: &Path, len: usize) -> std::io::Result<Vec<u8>> {
    let mut prefix = Vec::with_capacity(len.min(1024 * 1024));
    File::open(path)?.take(len as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}
