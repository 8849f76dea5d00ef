//! Object identifier (SHA-1 hash)
//!
//! An object ID is the 20-byte SHA-1 of the object's canonical
//! serialization `"{kind} {size}\0{payload}"`. The textual form is 40
//! lowercase hex characters.
//!
//! ## Storage
//!
//! Loose objects live at `objects/<first-2-hex-chars>/<remaining-38>`.

use crate::artifacts::objects::{OBJECT_ID_HEX_LENGTH, OBJECT_ID_LENGTH};
use crate::errors::{Error, Result};
use std::io;
use std::path::PathBuf;

/// 20-byte object identifier
///
/// Byte-wise equality, hashable, ordered. Displays as 40 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_LENGTH]);

impl ObjectId {
    /// Parse and validate an object ID from its 40-character hex form.
    pub fn try_parse(id: &str) -> Result<Self> {
        if id.len() != OBJECT_ID_HEX_LENGTH || !id.is_ascii() {
            return Err(Error::InvalidHashLength);
        }

        let mut raw = [0u8; OBJECT_ID_LENGTH];
        for (i, chunk) in raw.iter_mut().enumerate() {
            *chunk = u8::from_str_radix(&id[2 * i..2 * i + 2], 16)
                .map_err(|_| Error::InvalidHashLength)?;
        }

        Ok(Self(raw))
    }

    /// Build an object ID from its 20 raw bytes.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != OBJECT_ID_LENGTH {
            return Err(Error::InvalidHashLength);
        }

        let mut raw = [0u8; OBJECT_ID_LENGTH];
        raw.copy_from_slice(buf);
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LENGTH] {
        &self.0
    }

    /// Hex form, lowercase, 40 characters.
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(OBJECT_ID_HEX_LENGTH);
        for byte in self.0 {
            hex.push_str(&format!("{:02x}", byte));
        }
        hex
    }

    /// Write the raw 20 bytes, as embedded in tree entries.
    pub fn write_raw_to<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.0).map_err(Error::Io)
    }

    /// Read 20 raw bytes, as embedded in tree entries and ref-delta
    /// base locators.
    pub fn read_raw_from<R: io::Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut raw = [0u8; OBJECT_ID_LENGTH];
        reader.read_exact(&mut raw).map_err(Error::Io)?;
        Ok(Self(raw))
    }

    /// Convert to the loose-object path `XX/YYYY…`.
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_hex();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
