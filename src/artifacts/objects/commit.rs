//! Commit object
//!
//! ## Format
//!
//! ```text
//! tree <40-hex>
//! parent <40-hex>            (zero or more)
//! author <name> <email> <unix-ts> <±HHMM>
//! committer <name> <email> <unix-ts> <±HHMM>
//! encoding <token>           (optional)
//!
//! <message>
//! ```
//!
//! The payload above is what gets framed as `commit <size>\0…` and
//! hashed; [`Commit::parse`] consumes the payload with the frame already
//! stripped.

use crate::artifacts::io::scan_until;
use crate::artifacts::objects::ENTRY_BUFFER_SIZE;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use bytes::Bytes;
use std::io::Read;

/// Author, committer or tagger identity with its timestamp.
///
/// The instant is stored in UTC together with the original `±HHMM`
/// offset, converted to minutes; neither is dropped.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UserTime {
    name: String,
    email: String,
    timestamp: chrono::DateTime<chrono::FixedOffset>,
}

impl UserTime {
    pub fn new(
        name: String,
        email: String,
        timestamp: chrono::DateTime<chrono::FixedOffset>,
    ) -> Self {
        UserTime {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.timestamp
    }

    /// Serialized record form: `Name <email> <unix-ts> <±HHMM>`.
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Parse the record after its `author `/`committer `/`tagger ` tag,
    /// consuming up to and including the trailing newline.
    pub(crate) fn parse<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> Result<Self> {
        let name_buf = scan_until(src, b'<', buf)?;
        if name_buf.is_empty() {
            return Err(Error::NoAuthor);
        }
        // the name carries a trailing space before '<'
        let name = std::str::from_utf8(&name_buf[..name_buf.len() - 1])
            .map_err(|_| Error::InvalidRecord("user name is not utf-8"))?
            .to_string();

        let email_buf = scan_until(src, b' ', buf)?;
        if email_buf.is_empty() || *email_buf.last().unwrap() != b'>' {
            return Err(Error::InvalidEmail);
        }
        let email = std::str::from_utf8(&email_buf[..email_buf.len() - 1])
            .map_err(|_| Error::InvalidEmail)?
            .to_string();

        let ts_buf = scan_until(src, b' ', buf)?;
        let seconds = std::str::from_utf8(ts_buf)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(Error::InvalidRecord("bad timestamp"))?;

        let tz_buf = scan_until(src, b'\n', buf)?;
        let hhmm = std::str::from_utf8(tz_buf)
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
            .ok_or(Error::InvalidRecord("bad timezone"))?;

        let minutes = (hhmm / 100) * 60 + hhmm % 100;
        let offset = chrono::FixedOffset::east_opt(minutes * 60)
            .ok_or(Error::InvalidRecord("bad timezone"))?;
        let timestamp = chrono::DateTime::from_timestamp(seconds, 0)
            .ok_or(Error::InvalidRecord("bad timestamp"))?
            .with_timezone(&offset);

        Ok(UserTime {
            name,
            email,
            timestamp,
        })
    }
}

/// Commit object
///
/// Parent order is significant: the first parent is the commit's
/// mainline. The stamped object ID comes from the repository when the
/// commit is opened, not from the payload itself.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    oid: ObjectId,
    tree_oid: ObjectId,
    parent_oids: Vec<ObjectId>,
    author: UserTime,
    committer: UserTime,
    encoding: Option<String>,
    message: String,
}

impl Commit {
    pub fn new(
        tree_oid: ObjectId,
        parent_oids: Vec<ObjectId>,
        author: UserTime,
        committer: UserTime,
        message: String,
    ) -> Self {
        Commit {
            oid: ObjectId::default(),
            tree_oid,
            parent_oids,
            author,
            committer,
            encoding: None,
            message,
        }
    }

    pub fn oid(&self) -> &ObjectId {
        &self.oid
    }

    pub(crate) fn stamp_oid(&mut self, oid: ObjectId) {
        self.oid = oid;
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parent_oids(&self) -> &[ObjectId] {
        &self.parent_oids
    }

    /// First parent, the mainline in history terms.
    pub fn parent(&self) -> Option<&ObjectId> {
        self.parent_oids.first()
    }

    pub fn author(&self) -> &UserTime {
        &self.author
    }

    pub fn committer(&self) -> &UserTime {
        &self.committer
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Committer timestamp; this is what orders the history frontier.
    pub fn timestamp(&self) -> chrono::DateTime<chrono::FixedOffset> {
        self.committer.timestamp
    }

    /// Parse a commit payload (header frame already consumed).
    pub fn parse<R: Read + ?Sized>(src: &mut R) -> Result<Self> {
        let mut buf = [0u8; ENTRY_BUFFER_SIZE];

        let field = scan_until(src, b' ', &mut buf)?;
        if field != b"tree" {
            return Err(Error::NoTree);
        }
        let line = scan_until(src, b'\n', &mut buf)?;
        let tree_oid = ObjectId::try_parse(
            std::str::from_utf8(line).map_err(|_| Error::InvalidHashLength)?,
        )?;

        // parents, if any; the loop leaves the first non-parent field name
        let mut parent_oids = Vec::new();
        let mut field = scan_until(src, b' ', &mut buf)?.to_vec();
        while field == b"parent" {
            let line = scan_until(src, b'\n', &mut buf)?;
            parent_oids.push(ObjectId::try_parse(
                std::str::from_utf8(line).map_err(|_| Error::InvalidHashLength)?,
            )?);
            field = scan_until(src, b' ', &mut buf)?.to_vec();
        }

        if field != b"author" {
            return Err(Error::NoAuthor);
        }
        let author = UserTime::parse(src, &mut buf)?;

        let field = scan_until(src, b' ', &mut buf)?;
        if field != b"committer" {
            return Err(Error::NoCommitter);
        }
        let committer = UserTime::parse(src, &mut buf)?;

        // either the blank line before the message, or an encoding record
        let line = scan_until(src, b'\n', &mut buf)?;
        let encoding = if line.is_empty() {
            None
        } else {
            let record = std::str::from_utf8(line)
                .map_err(|_| Error::InvalidEncoding)?
                .to_string();
            let (tag, value) = record
                .split_once(' ')
                .ok_or(Error::InvalidEncoding)?;
            if tag != "encoding" {
                return Err(Error::InvalidEncoding);
            }
            let value = value.to_string();

            let blank = scan_until(src, b'\n', &mut buf)?;
            if !blank.is_empty() {
                return Err(Error::InvalidRecord("expected blank line before message"));
            }

            Some(value)
        };

        let mut message = String::new();
        src.read_to_string(&mut message).map_err(Error::Io)?;

        Ok(Commit {
            oid: ObjectId::default(),
            tree_oid,
            parent_oids,
            author,
            committer,
            encoding,
            message,
        })
    }

    /// Canonical payload bytes; hashing `commit <len>\0` + these bytes
    /// reproduces the object ID.
    pub fn serialize(&self) -> Bytes {
        let mut out = String::new();

        out.push_str(&format!("tree {}\n", self.tree_oid));
        for parent in &self.parent_oids {
            out.push_str(&format!("parent {}\n", parent));
        }
        out.push_str(&format!("author {}\n", self.author.display()));
        out.push_str(&format!("committer {}\n", self.committer.display()));
        if let Some(encoding) = &self.encoding {
            out.push_str(&format!("encoding {}\n", encoding));
        }
        out.push('\n');
        out.push_str(&self.message);

        Bytes::from(out.into_bytes())
    }
}
