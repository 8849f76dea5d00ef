//! Data structures and algorithms of the object database
//!
//! - `io`: delimiter scans, varint codecs, the exact-size writer
//! - `objects`: object IDs, kinds, and the four entity parsers
//! - `pack`: pack index/file readers and delta application
//! - `log`: commit history traversal and its canned predicates
//! - `merge`: merge-base computation

pub mod io;
pub mod log;
pub mod merge;
pub mod objects;
pub mod pack;
