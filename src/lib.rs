//! Reader and writer for the git object database
//!
//! This crate speaks the on-disk format of the git object store without
//! any of the porcelain: loose objects, pack files (v1/v2 indexes, v2
//! streams, ref and offset deltas), references, the four object kinds,
//! plus an ordered history walker and merge-base computation on top.
//!
//! ```ignore
//! let repo = silt::open_repository(".git")?;
//! let head = repo.resolve_ref("HEAD")?;
//! let commit = repo.open_commit(&head)?;
//!
//! let history = silt::History::new(&repo);
//! let log = history.walk_history(&head, silt::handlers::nop_callback)?;
//! ```
//!
//! All io is synchronous and a repository handle is single-threaded;
//! open independent handles to parallelize.

pub mod areas;
pub mod artifacts;
pub mod errors;

pub use areas::database::{Database, ObjectWriter};
pub use areas::filesystem::{FileSystem, FsFile, OsFileSystem};
pub use areas::refs::{MAX_SYMREF_HOPS, RefStore, SPECIAL_REFS};
pub use areas::repository::{Repository, open_repository};
pub use artifacts::log::handlers;
pub use artifacts::log::walker::{History, WalkAction};
pub use artifacts::objects::commit::{Commit, UserTime};
pub use artifacts::objects::object_id::ObjectId;
pub use artifacts::objects::object_type::{ObjectInfo, ObjectReader, ObjectType};
pub use artifacts::objects::tag::Tag;
pub use artifacts::objects::tree::{TREE_MODE_DIR, Tree, TreeItem};
pub use artifacts::pack::Pack;
pub use errors::{Error, Result};
