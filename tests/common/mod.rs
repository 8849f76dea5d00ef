//! Shared fixtures: an on-disk repository builder and a minimal pack
//! writer, the encoding inverse of the production readers.

#![allow(dead_code)]

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{FixedOffset, TimeZone};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use sha1::{Digest, Sha1};
use silt::{Commit, ObjectId, ObjectType, Repository, Tree, TreeItem, UserTime};
use std::io::Write;

pub const CODE_COMMIT: u8 = 1;
pub const CODE_TREE: u8 = 2;
pub const CODE_BLOB: u8 = 3;
pub const CODE_TAG: u8 = 4;
pub const CODE_OFS_DELTA: u8 = 6;
pub const CODE_REF_DELTA: u8 = 7;

pub fn init_repo() -> (assert_fs::TempDir, Repository) {
    let dir = assert_fs::TempDir::new().unwrap();
    let repo = silt::open_repository(dir.path()).unwrap();
    (dir, repo)
}

pub fn user_at(seconds: i64) -> UserTime {
    let tz = FixedOffset::east_opt(3600).unwrap();
    UserTime::new(
        "Test Author".to_string(),
        "author@example.com".to_string(),
        tz.timestamp_opt(seconds, 0).unwrap(),
    )
}

/// Hash of the canonical serialization, without storing anything.
pub fn hash_object(object_type: ObjectType, payload: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(format!("{} {}\0", object_type.as_str(), payload.len()).as_bytes());
    hasher.update(payload);
    ObjectId::from_bytes(hasher.finalize().as_slice()).unwrap()
}

pub fn write_object(repo: &Repository, object_type: ObjectType, payload: &[u8]) -> ObjectId {
    let mut writer = repo.create_object(object_type, payload.len() as u64).unwrap();
    writer.write_all(payload).unwrap();
    writer.commit().unwrap()
}

pub fn write_blob(repo: &Repository, content: &[u8]) -> ObjectId {
    write_object(repo, ObjectType::Blob, content)
}

pub fn write_tree(repo: &Repository, items: Vec<TreeItem>) -> ObjectId {
    let payload = Tree::new(items).serialize();
    write_object(repo, ObjectType::Tree, &payload)
}

pub fn write_commit(
    repo: &Repository,
    tree_oid: ObjectId,
    parents: Vec<ObjectId>,
    seconds: i64,
    message: &str,
) -> ObjectId {
    let commit = Commit::new(
        tree_oid,
        parents,
        user_at(seconds),
        user_at(seconds),
        message.to_string(),
    );
    write_object(repo, ObjectType::Commit, &commit.serialize())
}

// ---- pack encoding ----

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn encode_size_varint(mut n: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

pub fn encode_offset_varint(mut n: u64) -> Vec<u8> {
    let mut out = vec![(n & 0x7f) as u8];
    n >>= 7;
    while n > 0 {
        n -= 1;
        out.insert(0, 0x80 | (n & 0x7f) as u8);
        n >>= 7;
    }
    out
}

pub fn encode_entry_header(kind: u8, mut size: u64) -> Vec<u8> {
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

/// Builds a v2 pack stream and its v2 index in lockstep.
pub struct PackBuilder {
    entries: Vec<u8>,
    index: Vec<(ObjectId, u64)>,
    count: u32,
}

impl PackBuilder {
    pub fn new() -> Self {
        PackBuilder {
            entries: Vec::new(),
            index: Vec::new(),
            count: 0,
        }
    }

    fn next_offset(&self) -> u64 {
        12 + self.entries.len() as u64
    }

    /// Append a non-delta object; returns its ID and pack offset.
    pub fn add_object(&mut self, object_type: ObjectType, payload: &[u8]) -> (ObjectId, u64) {
        let code = match object_type {
            ObjectType::Commit => CODE_COMMIT,
            ObjectType::Tree => CODE_TREE,
            ObjectType::Blob => CODE_BLOB,
            ObjectType::Tag => CODE_TAG,
        };

        let oid = hash_object(object_type, payload);
        let offset = self.next_offset();

        self.entries
            .extend_from_slice(&encode_entry_header(code, payload.len() as u64));
        self.entries.extend_from_slice(&deflate(payload));
        self.index.push((oid, offset));
        self.count += 1;

        (oid, offset)
    }

    /// Append a ref-delta entry reconstructing `target_payload`; the
    /// object ID indexed is the hash the reconstructed object would
    /// have under `target_type`.
    pub fn add_ref_delta(
        &mut self,
        base_oid: ObjectId,
        target_type: ObjectType,
        target_payload: &[u8],
        delta: &[u8],
    ) -> (ObjectId, u64) {
        let oid = hash_object(target_type, target_payload);
        let offset = self.next_offset();

        self.entries
            .extend_from_slice(&encode_entry_header(CODE_REF_DELTA, delta.len() as u64));
        self.entries.extend_from_slice(base_oid.as_bytes());
        self.entries.extend_from_slice(&deflate(delta));
        self.index.push((oid, offset));
        self.count += 1;

        (oid, offset)
    }

    /// Append an offset-delta entry whose base starts at `base_offset`.
    pub fn add_ofs_delta(
        &mut self,
        base_offset: u64,
        target_type: ObjectType,
        target_payload: &[u8],
        delta: &[u8],
    ) -> (ObjectId, u64) {
        let oid = hash_object(target_type, target_payload);
        let offset = self.next_offset();
        let distance = offset - base_offset;

        self.entries
            .extend_from_slice(&encode_entry_header(CODE_OFS_DELTA, delta.len() as u64));
        self.entries.extend_from_slice(&encode_offset_varint(distance));
        self.entries.extend_from_slice(&deflate(delta));
        self.index.push((oid, offset));
        self.count += 1;

        (oid, offset)
    }

    pub fn pack_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"PACK");
        out.write_u32::<BigEndian>(2).unwrap();
        out.write_u32::<BigEndian>(self.count).unwrap();
        out.extend_from_slice(&self.entries);
        out
    }

    pub fn index_bytes(&self) -> Vec<u8> {
        let mut sorted = self.index.clone();
        sorted.sort_by_key(|(oid, _)| *oid);

        let mut out = Vec::new();
        out.write_u32::<BigEndian>(0xff74_4f63).unwrap();
        out.write_u32::<BigEndian>(2).unwrap();

        for bucket in 0u32..256 {
            let count = sorted
                .iter()
                .filter(|(oid, _)| u32::from(oid.as_bytes()[0]) <= bucket)
                .count() as u32;
            out.write_u32::<BigEndian>(count).unwrap();
        }

        for (oid, _) in &sorted {
            out.extend_from_slice(oid.as_bytes());
        }
        for _ in &sorted {
            out.write_u32::<BigEndian>(0).unwrap(); // crc32, unread
        }
        for (_, offset) in &sorted {
            out.write_u32::<BigEndian>(*offset as u32).unwrap();
        }
        out.extend_from_slice(&[0u8; 40]); // checksum trailer

        out
    }

    /// Drop the pack pair into `objects/pack/` under the repository
    /// root so a freshly opened repository scans it.
    pub fn install(&self, root: &std::path::Path) -> std::io::Result<()> {
        let pack_dir = root.join("objects").join("pack");
        std::fs::create_dir_all(&pack_dir)?;

        let digest = {
            let mut hasher = Sha1::new();
            hasher.update(self.pack_bytes());
            hasher.finalize()
        };
        let name = digest
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<String>();

        std::fs::write(pack_dir.join(format!("pack-{name}.pack")), self.pack_bytes())?;
        std::fs::write(pack_dir.join(format!("pack-{name}.idx")), self.index_bytes())?;
        Ok(())
    }
}

/// Delta stream header (base size, target size) plus raw instructions.
pub fn make_delta(base_size: u64, target_size: u64, instructions: &[u8]) -> Vec<u8> {
    let mut out = encode_size_varint(base_size);
    out.extend(encode_size_varint(target_size));
    out.extend_from_slice(instructions);
    out
}
