//! Shared foundational types for the packrat build cache.
//!
//! This crate provides the content digest used to address cached build
//! artifacts, plus a streaming hasher for computing digests over large
//! inputs without buffering them in memory.

#![warn(missing_docs)]

pub mod fingerprint;

pub use fingerprint::{Fingerprint, FingerprintHasher};
