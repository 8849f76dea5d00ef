//! Tree object
//!
//! A directory snapshot: an ordered sequence of entries, each
//! `<octal-mode> <name>\0<20-byte-oid>`. Entry order is preserved
//! exactly as read; it is part of the object's identity.

use crate::artifacts::io::{scan_until, try_scan_until};
use crate::artifacts::objects::ENTRY_BUFFER_SIZE;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bytes::Bytes;
use derive_new::new;
use std::io::Read;

/// Directory file mode; everything else resolves to a blob entry.
pub const TREE_MODE_DIR: u32 = 0o40000;

/// Single tree entry.
///
/// The entry kind is derived from the mode: the directory mode names a
/// tree, any other mode (regular file, executable, symlink, gitlink)
/// names a blob at this layer.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct TreeItem {
    pub mode: u32,
    pub name: String,
    pub oid: ObjectId,
}

impl TreeItem {
    pub fn object_type(&self) -> ObjectType {
        if self.mode == TREE_MODE_DIR {
            ObjectType::Tree
        } else {
            ObjectType::Blob
        }
    }
}

/// Tree object with its ordered entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    oid: ObjectId,
    items: Vec<TreeItem>,
}

impl Tree {
    pub fn new(items: Vec<TreeItem>) -> Self {
        Tree {
            oid: ObjectId::default(),
            items,
        }
    }

    pub fn oid(&self) -> &ObjectId {
        &self.oid
    }

    pub(crate) fn stamp_oid(&mut self, oid: ObjectId) {
        self.oid = oid;
    }

    pub fn items(&self) -> &[TreeItem] {
        &self.items
    }

    pub fn find(&self, name: &str) -> Option<&TreeItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Parse a tree payload (header frame already consumed). Entries run
    /// until a clean end of stream.
    pub fn parse<R: Read + ?Sized>(src: &mut R) -> Result<Self> {
        let mut items = Vec::new();
        let mut buf = [0u8; ENTRY_BUFFER_SIZE];

        loop {
            let mode_buf = match try_scan_until(src, b' ', &mut buf)? {
                Some(scanned) => scanned,
                None => break, // no more entries
            };
            let mode = std::str::from_utf8(mode_buf)
                .ok()
                .and_then(|s| u32::from_str_radix(s, 8).ok())
                .ok_or(Error::InvalidRecord("bad tree entry mode"))?;

            let name_buf = scan_until(src, 0, &mut buf)?;
            let name = std::str::from_utf8(name_buf)
                .map_err(|_| Error::InvalidRecord("tree entry name is not utf-8"))?
                .to_string();

            let oid = ObjectId::read_raw_from(src)?;

            items.push(TreeItem { mode, name, oid });
        }

        Ok(Tree {
            oid: ObjectId::default(),
            items,
        })
    }

    /// Canonical payload bytes, entries in stored order.
    pub fn serialize(&self) -> Bytes {
        let mut out = Vec::new();

        for item in &self.items {
            out.extend_from_slice(format!("{:o} {}", item.mode, item.name).as_bytes());
            out.push(0);
            out.extend_from_slice(item.oid.as_bytes());
        }

        Bytes::from(out)
    }
}
