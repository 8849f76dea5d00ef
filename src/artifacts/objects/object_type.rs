//! Object kinds and the object info triple

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use std::io::Read;

/// The four materialized object kinds.
///
/// The delta kinds seen inside pack streams never reach this enum; they
/// are resolved to the kind of their base before an object leaves the
/// pack layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Commit => "commit",
            ObjectType::Tree => "tree",
            ObjectType::Blob => "blob",
            ObjectType::Tag => "tag",
        }
    }
}

impl TryFrom<&str> for ObjectType {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "commit" => Ok(ObjectType::Commit),
            "tree" => Ok(ObjectType::Tree),
            "blob" => Ok(ObjectType::Blob),
            "tag" => Ok(ObjectType::Tag),
            other => Err(Error::InvalidObjectType(other.to_string())),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity, kind and payload size of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    pub oid: ObjectId,
    pub object_type: ObjectType,
    pub size: u64,
}

/// Size-limited byte stream over a stored object's payload.
///
/// Owns the underlying file handle and any zlib state; single-consumer,
/// forward-only. Dropping the reader releases both.
pub struct ObjectReader {
    inner: std::io::Take<Box<dyn Read>>,
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("limit", &self.inner.limit())
            .finish()
    }
}

impl ObjectReader {
    pub(crate) fn new(src: Box<dyn Read>, size: u64) -> Self {
        ObjectReader {
            inner: src.take(size),
        }
    }

    /// Drain the stream into an owned buffer.
    pub fn read_to_bytes(mut self) -> Result<bytes::Bytes> {
        let mut buf = Vec::new();
        self.inner.read_to_end(&mut buf).map_err(Error::Io)?;
        Ok(bytes::Bytes::from(buf))
    }
}

impl Read for ObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn kind_names_round_trip() {
        for kind in [
            ObjectType::Commit,
            ObjectType::Tree,
            ObjectType::Blob,
            ObjectType::Tag,
        ] {
            assert_eq!(ObjectType::try_from(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(matches!(
            ObjectType::try_from("blobby").unwrap_err(),
            Error::InvalidObjectType(name) if name == "blobby"
        ));
    }

    #[test]
    fn reader_is_limited_to_declared_size() {
        let reader = ObjectReader::new(Box::new(Cursor::new(b"hello, trailing".to_vec())), 5);
        assert_eq!(reader.read_to_bytes().unwrap().as_ref(), b"hello");
    }
}
