//! Content hashing for change and move detection.

use std::fs;
use std::path::Path;

use tracing::debug;

/// Computes stable digests of file contents.
///
/// Digests are hex-encoded BLAKE3 (256-bit). A file that cannot be read
/// hashes to `None`, which never equals any recorded digest.
pub struct ContentHasher;

impl ContentHasher {
    /// Hash an in-memory buffer.
    pub fn hash_bytes(bytes: &[u8]) -> String {
        blake3::hash(bytes).to_hex().to_string()
    }

    /// Hash a file on disk, or `None` if it cannot be read.
    pub fn hash_file(path: &Path) -> Option<String> {
        match fs::read(path) {
            Ok(bytes) => Some(Self::hash_bytes(&bytes)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "unable to hash file");
                None
            }
        }
    }
}
