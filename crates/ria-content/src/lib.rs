//! RIA Content
//!
//! Content addressing for uploaded documents. A document is identified by the
//! SHA-256 of its raw bytes, so two uploads of the same file share one
//! extraction.

#![warn(missing_docs)]

pub mod digest;

pub use digest::{ContentDigest, DigestError, DIGEST_HEX_LEN, DIGEST_LEN};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
