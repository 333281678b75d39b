//! Content digests for artifact addressing and cache invalidation.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit content digest computed with XXH3.
///
/// Two artifacts with the same `Fingerprint` are assumed to have identical
/// content. A unit's fingerprint captures its own sources plus the digests
/// of its non-standard-library dependencies, so identical inputs on the
/// same toolchain, OS, and architecture always produce an identical digest
/// on every machine in a build fleet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    /// Computes a fingerprint from a byte slice in one shot.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Incremental builder for a [`Fingerprint`].
///
/// Inputs are folded in with [`update`](Self::update) in a caller-defined
/// order; the digest depends on the exact byte sequence, so callers must
/// feed inputs in a fixed, deterministic order.
#[derive(Default)]
pub struct FingerprintHasher {
    inner: Xxh3,
}

impl FingerprintHasher {
    /// Creates a hasher with no input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a chunk of input into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finishes hashing and returns the digest.
    pub fn finish(&self) -> Fingerprint {
        Fingerprint(self.inner.digest128().to_le_bytes())
    }
}
