//! Random-access reading of DEFLATE/zlib/gzip streams.
//!
//! Builds an index of access points over a compressed stream in one
//! forward pass ([`Index::build`]), then lets a caller jump to an arbitrary
//! uncompressed byte offset ([`Index::seek`]) and decode from there
//! ([`Index::read`]) without re-decompressing from the start.
//!
//! The heavy lifting, identifying DEFLATE block boundaries mid-stream,
//! capturing a 32 KiB (or larger) history window plus a sub-byte bit
//! remainder, and later priming a fresh decoder to resume from one, lives
//! in [`adapter`], [`builder`], and [`reader`]. See `DESIGN.md` for how each
//! piece maps back to its source.

mod adapter;
mod builder;
pub mod error;
mod point;
mod reader;
mod store;

pub use error::{Error, Result};
pub use point::AccessPoint;
pub use reader::Whence;
pub use store::Index;
