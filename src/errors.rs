//! Error taxonomy for the object database
//!
//! Every fallible operation in the crate returns [`Result`]. The variants
//! group into format errors (malformed bytes on disk), semantic errors
//! (the bytes are fine but mean the wrong thing), integrity errors
//! (writer size accounting), lifecycle errors and plain io.

use crate::artifacts::objects::object_id::ObjectId;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // format errors
    #[error("invalid hash length")]
    InvalidHashLength,
    #[error("invalid object type: {0}")]
    InvalidObjectType(String),
    #[error("commit has no tree record")]
    NoTree,
    #[error("commit has no author record")]
    NoAuthor,
    #[error("commit has no committer record")]
    NoCommitter,
    #[error("tag has no object record")]
    NoObject,
    #[error("tag has no type record")]
    NoObjectType,
    #[error("tag has no tag record")]
    NoTag,
    #[error("tag has no tagger record")]
    NoTagger,
    #[error("invalid email")]
    InvalidEmail,
    #[error("invalid encoding record")]
    InvalidEncoding,
    #[error("invalid record: {0}")]
    InvalidRecord(&'static str),
    #[error("buffer depleted")]
    BufferDepleted,
    #[error("invalid delta opcode")]
    InvalidDeltaOpcode,
    #[error("invalid base object size in delta")]
    InvalidDeltaBaseSize,
    #[error("invalid pack version")]
    InvalidPackVersion,
    #[error("invalid pack length")]
    InvalidPackLength,
    #[error("invalid pack file header")]
    InvalidPackFileHeader,
    #[error("extended offset id is out of range")]
    OffsetIdOutOfRange,

    // semantic errors
    #[error("object {0} is not a commit")]
    NotACommit(ObjectId),
    #[error("object {0} is not a tree")]
    NotATree(ObjectId),
    #[error("object {0} is not a tag")]
    NotATag(ObjectId),
    #[error("{0} is not a symbolic reference")]
    NotASymbolicRef(String),
    #[error("invalid reference: {0}")]
    InvalidRef(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("not found")]
    NotFound,
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    // integrity errors
    #[error("object size overflow")]
    ObjectOverflow,
    #[error("object was not fully written")]
    IncompletedObject,

    // lifecycle errors
    #[error("already closed")]
    AlreadyClosed,
    #[error("short hash {0} is ambiguous")]
    AmbiguousShortHash(String),
    #[error("too few roots")]
    TooFewRoots,

    #[error("io error: {0}")]
    Io(io::Error),
}

impl Error {
    /// True when the error means "the named thing does not exist", either
    /// as a semantic miss or as a file-level miss from the port.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound | Error::ObjectNotFound(_) => true,
            Error::Io(err) => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

// Writers in the crate run behind `std::io::Write`, so integrity errors
// surface wrapped in `io::Error`. Unwrap them on the way back out.
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(inner) => inner,
            Err(err) => Error::Io(err),
        }
    }
}
