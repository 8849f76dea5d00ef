//! Pack index reader (v1 and v2)
//!
//! The index maps object IDs to byte offsets in the paired pack file.
//! Version detection: the first 4 bytes equal the v2 sentinel
//! `\377tOc`, otherwise the file is a v1 index and those bytes were
//! fanout data.
//!
//! ## v2 layout
//!
//! magic, version, 256 fanout entries, N object IDs, N crc32 sums
//! (ignored), N 4-byte primary offsets, extended 8-byte offset table,
//! 40-byte checksum trailer. A primary offset with the top bit set
//! indexes the extended table with its low 31 bits.

use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::{self, Read};

const PACK_IDX_V2_MAGIC: u32 = 0xff74_4f63;

/// Parsed pack index: OID → offset plus the reverse direction.
#[derive(Debug)]
pub struct PackIndex {
    entries: Vec<(ObjectId, u64)>,
    by_oid: HashMap<ObjectId, u64>,
}

fn skip<R: Read + ?Sized>(src: &mut R, count: u64) -> Result<()> {
    let copied = io::copy(&mut src.take(count), &mut io::sink()).map_err(Error::Io)?;
    if copied != count {
        return Err(Error::InvalidPackLength);
    }
    Ok(())
}

impl PackIndex {
    pub fn parse<R: Read + ?Sized>(src: &mut R) -> Result<Self> {
        let magic = src.read_u32::<BigEndian>().map_err(Error::Io)?;

        let entries = if magic == PACK_IDX_V2_MAGIC {
            Self::parse_v2(src)?
        } else {
            // v1: the 4 bytes just read were fanout[0]
            Self::parse_v1(src)?
        };

        let by_oid = entries.iter().cloned().collect();
        Ok(PackIndex { entries, by_oid })
    }

    fn parse_v1<R: Read + ?Sized>(src: &mut R) -> Result<Vec<(ObjectId, u64)>> {
        // skip to the last fanout entry, which holds the total
        skip(src, 254 * 4)?;
        let total = src.read_u32::<BigEndian>().map_err(Error::Io)?;

        let mut entries = Vec::with_capacity(total as usize);
        for _ in 0..total {
            let offset = src.read_u32::<BigEndian>().map_err(Error::Io)?;
            let oid = ObjectId::read_raw_from(src)?;
            entries.push((oid, u64::from(offset)));
        }

        Ok(entries)
    }

    fn parse_v2<R: Read + ?Sized>(src: &mut R) -> Result<Vec<(ObjectId, u64)>> {
        let version = src.read_u32::<BigEndian>().map_err(Error::Io)?;
        if version != 2 {
            return Err(Error::InvalidPackVersion);
        }

        skip(src, 255 * 4)?;
        let total = src.read_u32::<BigEndian>().map_err(Error::Io)?;

        let mut oids = Vec::with_capacity(total as usize);
        for _ in 0..total {
            oids.push(ObjectId::read_raw_from(src)?);
        }

        // crc32 sums are not consumed by lookups
        skip(src, u64::from(total) * 4)?;

        let mut primary_offsets = Vec::with_capacity(total as usize);
        for _ in 0..total {
            primary_offsets.push(src.read_u32::<BigEndian>().map_err(Error::Io)?);
        }

        // what remains is the extended offset table plus the 40-byte
        // checksum trailer
        let mut trailer = Vec::new();
        src.read_to_end(&mut trailer).map_err(Error::Io)?;
        if trailer.len() < 40 {
            return Err(Error::InvalidPackLength);
        }

        let ext_buf = &trailer[..trailer.len() - 40];
        let ext_count = ext_buf.len() / 8;
        let mut ext_offsets = Vec::with_capacity(ext_count);
        let mut ext_reader = &ext_buf[..ext_count * 8];
        for _ in 0..ext_count {
            ext_offsets.push(ext_reader.read_u64::<BigEndian>().map_err(Error::Io)?);
        }

        let mut entries = Vec::with_capacity(total as usize);
        for (oid, primary) in oids.into_iter().zip(primary_offsets) {
            let offset = if primary & 0x8000_0000 != 0 {
                let ext_id = (primary & 0x7fff_ffff) as usize;
                if ext_id >= ext_offsets.len() {
                    return Err(Error::OffsetIdOutOfRange);
                }
                ext_offsets[ext_id]
            } else {
                u64::from(primary)
            };
            entries.push((oid, offset));
        }

        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup_offset(&self, oid: &ObjectId) -> Option<u64> {
        self.by_oid.get(oid).copied()
    }

    /// Reverse lookup by scanning the entry table.
    pub fn lookup_oid(&self, offset: u64) -> Option<&ObjectId> {
        self.entries
            .iter()
            .find(|(_, entry_offset)| *entry_offset == offset)
            .map(|(oid, _)| oid)
    }
}
