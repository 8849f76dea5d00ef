//! Pack file backends and entry decoding
//!
//! A pack stream is `PACK`, a big-endian version (must be 2), a
//! big-endian entry count, then the entries. Each entry is a
//! variable-length header carrying a 3-bit kind code and the inflated
//! size, an optional delta base locator, and a zlib stream.
//!
//! Two backends provide the same capability set: [`PackData::load`]
//! keeps the whole pack in memory (read-once sources), while
//! [`PackData::open`] seeks a file-like handle per entry. Either way the
//! entry payload is inflated eagerly, so delta resolution can recurse
//! into base entries without holding a borrow on the backend.

use crate::artifacts::io::{read_entry_header, read_offset_varint};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use flate2::read::ZlibDecoder;
use std::cell::{Cell, RefCell};
use std::io::{Cursor, Read, Seek, SeekFrom};

const PACK_MAGIC: [u8; 4] = *b"PACK";

// 3-bit kind codes inside pack entry headers
const CODE_COMMIT: u8 = 1;
const CODE_TREE: u8 = 2;
const CODE_BLOB: u8 = 3;
const CODE_TAG: u8 = 4;
const CODE_OFS_DELTA: u8 = 6;
const CODE_REF_DELTA: u8 = 7;

/// Entry kinds as they appear inside pack streams. The two delta kinds
/// never leave the pack layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackEntryType {
    Commit,
    Tree,
    Blob,
    Tag,
    OfsDelta,
    RefDelta,
}

impl PackEntryType {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            CODE_COMMIT => Ok(PackEntryType::Commit),
            CODE_TREE => Ok(PackEntryType::Tree),
            CODE_BLOB => Ok(PackEntryType::Blob),
            CODE_TAG => Ok(PackEntryType::Tag),
            CODE_OFS_DELTA => Ok(PackEntryType::OfsDelta),
            CODE_REF_DELTA => Ok(PackEntryType::RefDelta),
            other => Err(Error::InvalidObjectType(format!("pack entry code {other}"))),
        }
    }
}

/// Base locator carried by a delta entry, read before its zlib stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaBase {
    /// 20-byte object ID of the base (ref-delta).
    Reference(ObjectId),
    /// Distance subtracted from the entry's own offset (offset-delta).
    Offset(u64),
}

/// A decoded pack entry: header fields, optional base locator, and the
/// inflated payload (object bytes, or the delta instruction stream).
#[derive(Debug)]
pub struct RawEntry {
    pub entry_type: PackEntryType,
    pub size: u64,
    pub base: Option<DeltaBase>,
    pub data: Bytes,
}

pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

impl std::fmt::Debug for PackData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackData::InMemory { count, .. } => f
                .debug_struct("PackData::InMemory")
                .field("count", count)
                .finish(),
            PackData::Seekable { count, closed, .. } => f
                .debug_struct("PackData::Seekable")
                .field("count", count)
                .field("closed", closed)
                .finish(),
        }
    }
}

/// Pack stream backend.
pub enum PackData {
    /// Whole pack held in memory; useful for read-once sources such as
    /// archives and the repository's scanned packs.
    InMemory {
        buf: Option<Bytes>,
        count: u32,
    },
    /// Seekable handle, one entry read per seek.
    Seekable {
        src: RefCell<Box<dyn ReadSeek>>,
        count: u32,
        closed: Cell<bool>,
    },
}

fn read_pack_header<R: Read + ?Sized>(src: &mut R) -> Result<u32> {
    let mut magic = [0u8; 4];
    src.read_exact(&mut magic).map_err(Error::Io)?;
    if magic != PACK_MAGIC {
        return Err(Error::InvalidPackFileHeader);
    }

    let version = src.read_u32::<BigEndian>().map_err(Error::Io)?;
    if version != 2 {
        return Err(Error::InvalidPackVersion);
    }

    src.read_u32::<BigEndian>().map_err(Error::Io)
}

fn read_entry<R: Read + ?Sized>(src: &mut R) -> Result<RawEntry> {
    let (code, size) = read_entry_header(src)?;
    let entry_type = PackEntryType::from_code(code)?;

    let base = match entry_type {
        PackEntryType::RefDelta => Some(DeltaBase::Reference(ObjectId::read_raw_from(src)?)),
        PackEntryType::OfsDelta => Some(DeltaBase::Offset(read_offset_varint(src)?)),
        _ => None,
    };

    let mut data = Vec::new();
    ZlibDecoder::new(src)
        .read_to_end(&mut data)
        .map_err(Error::Io)?;

    Ok(RawEntry {
        entry_type,
        size,
        base,
        data: Bytes::from(data),
    })
}

impl PackData {
    /// Load an entire pack stream into memory.
    pub fn load<R: Read>(mut src: R) -> Result<Self> {
        let count = read_pack_header(&mut src)?;

        let mut content = Vec::new();
        src.read_to_end(&mut content).map_err(Error::Io)?;

        // entry offsets are absolute, so keep the 12 header bytes in place
        let mut buf = Vec::with_capacity(content.len() + 12);
        buf.extend_from_slice(&PACK_MAGIC);
        buf.extend_from_slice(&2u32.to_be_bytes());
        buf.extend_from_slice(&count.to_be_bytes());
        buf.extend_from_slice(&content);

        Ok(PackData::InMemory {
            buf: Some(Bytes::from(buf)),
            count,
        })
    }

    /// Open a seekable pack handle; entries are read in place.
    pub fn open(src: Box<dyn ReadSeek>) -> Result<Self> {
        let mut src = src;
        src.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
        let count = read_pack_header(&mut src)?;

        Ok(PackData::Seekable {
            src: RefCell::new(src),
            count,
            closed: Cell::new(false),
        })
    }

    pub fn entry_count(&self) -> u32 {
        match self {
            PackData::InMemory { count, .. } | PackData::Seekable { count, .. } => *count,
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            PackData::InMemory { buf, .. } => {
                if buf.is_none() {
                    return Err(Error::AlreadyClosed);
                }
                *buf = None;
                Ok(())
            }
            PackData::Seekable { closed, .. } => {
                if closed.get() {
                    return Err(Error::AlreadyClosed);
                }
                closed.set(true);
                Ok(())
            }
        }
    }

    /// Decode the entry starting at `offset`.
    pub(crate) fn entry_at(&self, offset: u64) -> Result<RawEntry> {
        match self {
            PackData::InMemory { buf, .. } => {
                let buf = buf.as_ref().ok_or(Error::AlreadyClosed)?;
                if offset >= buf.len() as u64 {
                    return Err(Error::InvalidPackLength);
                }
                let mut cursor = Cursor::new(buf.slice(offset as usize..));
                read_entry(&mut cursor)
            }
            PackData::Seekable { src, closed, .. } => {
                if closed.get() {
                    return Err(Error::AlreadyClosed);
                }
                let mut guard = src.borrow_mut();
                guard.seek(SeekFrom::Start(offset)).map_err(Error::Io)?;
                read_entry(&mut *guard)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn encode_entry_header(kind: u8, mut size: u64) -> Vec<u8> {
        let mut first = (kind << 4) | (size & 0xf) as u8;
        size >>= 4;
        let mut out = Vec::new();
        if size > 0 {
            first |= 0x80;
        }
        out.push(first);
        while size > 0 {
            let mut byte = (size & 0x7f) as u8;
            size >>= 7;
            if size > 0 {
                byte |= 0x80;
            }
            out.push(byte);
        }
        out
    }

    fn tiny_pack(payload: &[u8]) -> (Vec<u8>, u64) {
        let mut pack = Vec::new();
        pack.extend_from_slice(b"PACK");
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&1u32.to_be_bytes());
        let entry_offset = pack.len() as u64;
        pack.extend_from_slice(&encode_entry_header(CODE_BLOB, payload.len() as u64));
        pack.extend_from_slice(&deflate(payload));
        (pack, entry_offset)
    }

    #[test]
    fn header_magic_and_version_are_checked() {
        assert!(matches!(
            PackData::load(&b"JUNKxxxxyyyy"[..]).unwrap_err(),
            Error::InvalidPackFileHeader
        ));

        let mut raw = Vec::new();
        raw.extend_from_slice(b"PACK");
        raw.extend_from_slice(&3u32.to_be_bytes());
        raw.extend_from_slice(&0u32.to_be_bytes());
        assert!(matches!(
            PackData::load(raw.as_slice()).unwrap_err(),
            Error::InvalidPackVersion
        ));
    }

    #[test]
    fn in_memory_backend_decodes_an_entry() {
        let (pack, offset) = tiny_pack(b"hello pack");
        let data = PackData::load(pack.as_slice()).unwrap();

        assert_eq!(data.entry_count(), 1);
        let entry = data.entry_at(offset).unwrap();
        assert_eq!(entry.entry_type, PackEntryType::Blob);
        assert_eq!(entry.size, 10);
        assert!(entry.base.is_none());
        assert_eq!(entry.data.as_ref(), b"hello pack");
    }

    #[test]
    fn seekable_backend_decodes_the_same_entry() {
        let (pack, offset) = tiny_pack(b"hello pack");
        let data = PackData::open(Box::new(Cursor::new(pack))).unwrap();

        let entry = data.entry_at(offset).unwrap();
        assert_eq!(entry.data.as_ref(), b"hello pack");

        // entries can be re-read; the handle reseeks
        let again = data.entry_at(offset).unwrap();
        assert_eq!(again.data.as_ref(), b"hello pack");
    }

    #[test]
    fn closed_backend_rejects_reads() {
        let (pack, offset) = tiny_pack(b"x");
        let mut data = PackData::load(pack.as_slice()).unwrap();

        data.close().unwrap();
        assert!(matches!(data.entry_at(offset), Err(Error::AlreadyClosed)));
        assert!(matches!(data.close(), Err(Error::AlreadyClosed)));
    }

    #[test]
    fn ref_delta_entry_carries_its_base_oid() {
        let base_oid = ObjectId::from_bytes(&[0xab; 20]).unwrap();
        let mut pack = Vec::new();
        pack.extend_from_slice(b"PACK");
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&1u32.to_be_bytes());
        let offset = pack.len() as u64;
        pack.extend_from_slice(&encode_entry_header(CODE_REF_DELTA, 3));
        pack.extend_from_slice(base_oid.as_bytes());
        pack.extend_from_slice(&deflate(b"\x01\x01a"));

        let data = PackData::load(pack.as_slice()).unwrap();
        let entry = data.entry_at(offset).unwrap();
        assert_eq!(entry.entry_type, PackEntryType::RefDelta);
        assert_eq!(entry.base, Some(DeltaBase::Reference(base_oid)));
    }

    #[test]
    fn unknown_entry_code_is_rejected() {
        let mut pack = Vec::new();
        pack.extend_from_slice(b"PACK");
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&1u32.to_be_bytes());
        let offset = pack.len() as u64;
        pack.extend_from_slice(&encode_entry_header(5, 1));
        pack.extend_from_slice(&deflate(b"x"));

        let data = PackData::load(pack.as_slice()).unwrap();
        assert!(matches!(
            data.entry_at(offset).unwrap_err(),
            Error::InvalidObjectType(_)
        ));
    }
}
