/// SHA-256 hashing utilities for whatstask-proof.
///
/// SHA-256 is the content-addressing primitive of the IP Proof service:
/// the backend keys every proof record by the hex digest of the file bytes.
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const HEX_DIGEST_LEN: usize = 64;

/// Hash arbitrary data with SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Hash arbitrary data and return the lowercase hex digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Running SHA-256 state, fed one window at a time.
///
/// Produces the same digest as [`sha256`] over the concatenation of every
/// slice passed to [`DigestAccumulator::update`].
#[derive(Clone, Default)]
pub struct DigestAccumulator {
    hasher: Sha256,
    bytes: u64,
}

impl DigestAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes fed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finalize(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }
}
