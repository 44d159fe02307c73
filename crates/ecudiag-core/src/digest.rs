//! Firmware image digests
//!
//! Both the uploader and the receiving device log a SHA-256 over the image
//! lines so an operator can compare what was sent with what was stored.
//! The digest never travels over the wire.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `lines`, each followed by a `\n`.
pub fn image_digest<S: AsRef<str>>(lines: &[S]) -> String {
    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.as_ref().as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
