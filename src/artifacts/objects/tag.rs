//! Annotated tag object
//!
//! ## Format
//!
//! ```text
//! object <40-hex>
//! type <kind-name>
//! tag <name>
//! tagger <name> <email> <unix-ts> <±HHMM>
//!
//! <message>
//! ```
//!
//! Tags may nest: the target can itself be a tag.

use crate::artifacts::io::scan_until;
use crate::artifacts::objects::ENTRY_BUFFER_SIZE;
use crate::artifacts::objects::commit::UserTime;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bytes::Bytes;
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    oid: ObjectId,
    target_oid: ObjectId,
    target_type: ObjectType,
    name: String,
    tagger: UserTime,
    message: String,
}

impl Tag {
    pub fn new(
        target_oid: ObjectId,
        target_type: ObjectType,
        name: String,
        tagger: UserTime,
        message: String,
    ) -> Self {
        Tag {
            oid: ObjectId::default(),
            target_oid,
            target_type,
            name,
            tagger,
            message,
        }
    }

    pub fn oid(&self) -> &ObjectId {
        &self.oid
    }

    pub(crate) fn stamp_oid(&mut self, oid: ObjectId) {
        self.oid = oid;
    }

    pub fn target_oid(&self) -> &ObjectId {
        &self.target_oid
    }

    pub fn target_type(&self) -> ObjectType {
        self.target_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tagger(&self) -> &UserTime {
        &self.tagger
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Parse a tag payload (header frame already consumed).
    pub fn parse<R: Read + ?Sized>(src: &mut R) -> Result<Self> {
        let mut buf = [0u8; ENTRY_BUFFER_SIZE];

        let field = scan_until(src, b' ', &mut buf)?;
        if field != b"object" {
            return Err(Error::NoObject);
        }
        let line = scan_until(src, b'\n', &mut buf)?;
        let target_oid = ObjectId::try_parse(
            std::str::from_utf8(line).map_err(|_| Error::InvalidHashLength)?,
        )?;

        let field = scan_until(src, b' ', &mut buf)?;
        if field != b"type" {
            return Err(Error::NoObjectType);
        }
        let line = scan_until(src, b'\n', &mut buf)?;
        let target_type = ObjectType::try_from(
            std::str::from_utf8(line)
                .map_err(|_| Error::InvalidObjectType("not utf-8".to_string()))?,
        )?;

        let field = scan_until(src, b' ', &mut buf)?;
        if field != b"tag" {
            return Err(Error::NoTag);
        }
        let line = scan_until(src, b'\n', &mut buf)?;
        let name = std::str::from_utf8(line)
            .map_err(|_| Error::InvalidRecord("tag name is not utf-8"))?
            .to_string();

        let field = scan_until(src, b' ', &mut buf)?;
        if field != b"tagger" {
            return Err(Error::NoTagger);
        }
        let tagger = UserTime::parse(src, &mut buf)?;

        let blank = scan_until(src, b'\n', &mut buf)?;
        if !blank.is_empty() {
            return Err(Error::InvalidRecord("expected blank line before message"));
        }

        let mut message = String::new();
        src.read_to_string(&mut message).map_err(Error::Io)?;

        Ok(Tag {
            oid: ObjectId::default(),
            target_oid,
            target_type,
            name,
            tagger,
            message,
        })
    }

    /// Canonical payload bytes.
    pub fn serialize(&self) -> Bytes {
        let out = format!(
            "object {}\ntype {}\ntag {}\ntagger {}\n\n{}",
            self.target_oid,
            self.target_type,
            self.name,
            self.tagger.display(),
            self.message
        );

        Bytes::from(out.into_bytes())
    }
}
