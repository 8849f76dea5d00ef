//! Pack reading: index lookup, entry decode, delta resolution
//!
//! A [`Pack`] pairs a parsed [`index::PackIndex`] with a
//! [`file::PackData`] backend. Objects come out fully materialized:
//! delta entries recurse into their base (by ID for ref-deltas, by
//! relative offset for offset-deltas) and apply the instruction stream,
//! so the caller always sees one of the four real object kinds.

pub mod delta;
pub mod file;
pub mod index;

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::{ObjectInfo, ObjectReader, ObjectType};
use crate::errors::{Error, Result};
use bytes::Bytes;
use file::{DeltaBase, PackData, PackEntryType, RawEntry};
use index::PackIndex;
use std::io::{Cursor, Read};

pub struct Pack {
    data: PackData,
    index: PackIndex,
}

impl Pack {
    pub fn open<R: Read + ?Sized>(index_src: &mut R, data: PackData) -> Result<Self> {
        let index = PackIndex::parse(index_src)?;
        Ok(Pack { data, index })
    }

    pub fn has_object(&self, oid: &ObjectId) -> bool {
        self.index.lookup_offset(oid).is_some()
    }

    pub fn open_object(&self, oid: &ObjectId) -> Result<(ObjectInfo, ObjectReader)> {
        let offset = self
            .index
            .lookup_offset(oid)
            .ok_or(Error::ObjectNotFound(*oid))?;

        let (object_type, data) = self.object_bytes_at(offset)?;
        Ok(Self::into_stream(*oid, object_type, data))
    }

    /// Open by pack offset; the offset must name an indexed entry.
    pub fn open_object_at(&self, offset: u64) -> Result<(ObjectInfo, ObjectReader)> {
        let oid = *self.index.lookup_oid(offset).ok_or(Error::NotFound)?;

        let (object_type, data) = self.object_bytes_at(offset)?;
        Ok(Self::into_stream(oid, object_type, data))
    }

    pub fn close(&mut self) -> Result<()> {
        self.data.close()
    }

    fn into_stream(oid: ObjectId, object_type: ObjectType, data: Bytes) -> (ObjectInfo, ObjectReader) {
        let size = data.len() as u64;
        let info = ObjectInfo {
            oid,
            object_type,
            size,
        };
        (info, ObjectReader::new(Box::new(Cursor::new(data)), size))
    }

    /// Materialize the entry at `offset`, resolving delta chains.
    fn object_bytes_at(&self, offset: u64) -> Result<(ObjectType, Bytes)> {
        let entry = self.data.entry_at(offset)?;

        match entry.entry_type {
            PackEntryType::Commit => Ok((ObjectType::Commit, entry.data)),
            PackEntryType::Tree => Ok((ObjectType::Tree, entry.data)),
            PackEntryType::Blob => Ok((ObjectType::Blob, entry.data)),
            PackEntryType::Tag => Ok((ObjectType::Tag, entry.data)),
            PackEntryType::RefDelta => self.resolve_ref_delta(entry),
            PackEntryType::OfsDelta => self.resolve_ofs_delta(offset, entry),
        }
    }

    fn resolve_ref_delta(&self, entry: RawEntry) -> Result<(ObjectType, Bytes)> {
        let Some(DeltaBase::Reference(base_oid)) = entry.base else {
            return Err(Error::InvalidRecord("ref-delta entry without base oid"));
        };

        let base_offset = self
            .index
            .lookup_offset(&base_oid)
            .ok_or(Error::ObjectNotFound(base_oid))?;
        let (object_type, base) = self.object_bytes_at(base_offset)?;

        let data = delta::apply_delta(&base, &entry.data)?;
        Ok((object_type, data))
    }

    fn resolve_ofs_delta(&self, offset: u64, entry: RawEntry) -> Result<(ObjectType, Bytes)> {
        let Some(DeltaBase::Offset(distance)) = entry.base else {
            return Err(Error::InvalidRecord("offset-delta entry without distance"));
        };

        // the base always precedes the delta in the stream
        if distance == 0 || distance > offset {
            return Err(Error::OffsetIdOutOfRange);
        }

        let (object_type, base) = self.object_bytes_at(offset - distance)?;
        let data = delta::apply_delta(&base, &entry.data)?;
        Ok((object_type, data))
    }
}
