//! Object database
//!
//! Content-addressed storage for the four object kinds. Loose objects
//! live at `objects/XX/YYYY…` as zlib-compressed
//! `"{kind} {size}\0{payload}"`; anything not found loose is served
//! from the packs scanned out of `objects/pack/` at open time.
//!
//! ## Writing
//!
//! [`Database::create_object`] hands out an [`ObjectWriter`] that pipes
//! the canonical serialization through a SHA-1 hasher and a zlib
//! encoder into a temp file, under an exact-size guard. The hasher sees
//! the decompressed bytes, header included, never the compressed ones.
//! [`ObjectWriter::commit`] finalizes both, derives the object ID from
//! the digest and atomically moves the temp file into place; the move
//! is the sole visibility point. On every other path the temp file is
//! removed.

use crate::areas::filesystem::{FileSystem, FsFile};
use crate::artifacts::io::{ExactSizeWriter, scan_until};
use crate::artifacts::objects::HEADER_BUFFER_SIZE;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::{ObjectInfo, ObjectReader, ObjectType};
use crate::artifacts::pack::Pack;
use crate::artifacts::pack::file::PackData;
use crate::errors::{Error, Result};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use sha1::{Digest, Sha1};
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const OBJECTS_DIR: &str = "objects";
const PACKS_DIR: &str = "objects/pack";

pub struct Database {
    fs: Rc<dyn FileSystem>,
    packs: RefCell<Vec<Pack>>,
    closed: Cell<bool>,
}

impl Database {
    /// Open the object store and scan `objects/pack` for pack pairs.
    pub fn open(fs: Rc<dyn FileSystem>) -> Result<Self> {
        let database = Database {
            fs,
            packs: RefCell::new(Vec::new()),
            closed: Cell::new(false),
        };
        database.scan_packs()?;

        Ok(database)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.get() {
            return Err(Error::AlreadyClosed);
        }
        Ok(())
    }

    fn loose_path(oid: &ObjectId) -> PathBuf {
        Path::new(OBJECTS_DIR).join(oid.to_path())
    }

    /// Open an object for reading: the loose path first, packs on miss.
    pub fn open_object(&self, oid: &ObjectId) -> Result<(ObjectInfo, ObjectReader)> {
        self.ensure_open()?;

        let path = Self::loose_path(oid);
        if !self.fs.is_file_exist(&path) {
            for pack in self.packs.borrow().iter() {
                if pack.has_object(oid) {
                    return pack.open_object(oid);
                }
            }
            return Err(Error::ObjectNotFound(*oid));
        }

        let file = self.fs.open(&path)?;
        let mut decoder = ZlibDecoder::new(file);
        let (object_type, size) = read_header(&mut decoder)?;

        let info = ObjectInfo {
            oid: *oid,
            object_type,
            size,
        };
        Ok((info, ObjectReader::new(Box::new(decoder), size)))
    }

    /// Object info without the payload.
    pub fn stat_object(&self, oid: &ObjectId) -> Result<ObjectInfo> {
        let (info, _) = self.open_object(oid)?;
        Ok(info)
    }

    pub fn is_object_exist(&self, oid: &ObjectId) -> bool {
        if self.closed.get() {
            return false;
        }

        self.fs.is_file_exist(&Self::loose_path(oid))
            || self.packs.borrow().iter().any(|pack| pack.has_object(oid))
    }

    /// Start writing an object of the given kind and payload size.
    pub fn create_object(&self, object_type: ObjectType, size: u64) -> Result<ObjectWriter<'_>> {
        self.ensure_open()?;

        let header = format!("{} {}\0", object_type.as_str(), size);

        let tmp = self.fs.temp_file()?;
        let temp_name = tmp.name().to_path_buf();

        let encoder = ZlibEncoder::new(tmp, Compression::default());
        let tee = HashingWriter::new(encoder);
        let mut inner = ExactSizeWriter::new(size + header.len() as u64, tee);

        inner.write_all(header.as_bytes())?;

        Ok(ObjectWriter {
            database: self,
            temp_name,
            inner: Some(inner),
        })
    }

    pub(crate) fn insert_object(&self, oid: &ObjectId, temp_name: &Path) -> Result<()> {
        self.fs.rename(temp_name, &Self::loose_path(oid))
    }

    /// Close the database and every pack it holds open.
    pub fn close(&self) -> Result<()> {
        self.ensure_open()?;
        self.closed.set(true);

        for pack in self.packs.borrow_mut().iter_mut() {
            pack.close()?;
        }
        Ok(())
    }

    fn scan_packs(&self) -> Result<()> {
        if !self.fs.is_file_exist(Path::new(PACKS_DIR)) {
            return Ok(());
        }

        for name in self.fs.list_dir(Path::new(PACKS_DIR))? {
            let Some(stem) = name.strip_suffix(".idx") else {
                continue;
            };
            let pack_name = format!("{stem}.pack");

            let mut idx_file = self.fs.open(Path::new(&name))?;
            let pack_file = self.fs.open(Path::new(&pack_name))?;

            let data = PackData::load(pack_file)?;
            let pack = Pack::open(&mut idx_file, data)?;
            self.packs.borrow_mut().push(pack);
        }

        Ok(())
    }
}

/// Read the loose-object header `"{kind} {ascii-size}\0"`.
fn read_header<R: std::io::Read + ?Sized>(src: &mut R) -> Result<(ObjectType, u64)> {
    let mut buf = [0u8; HEADER_BUFFER_SIZE];

    let kind_buf = scan_until(src, b' ', &mut buf)?;
    let object_type = ObjectType::try_from(
        std::str::from_utf8(kind_buf)
            .map_err(|_| Error::InvalidObjectType("not utf-8".to_string()))?,
    )?;

    let size_buf = scan_until(src, 0, &mut buf)?;
    let size = std::str::from_utf8(size_buf)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(Error::InvalidRecord("bad object size"))?;

    Ok((object_type, size))
}

/// Tees written bytes through a SHA-1 hasher into the inner writer.
struct HashingWriter<W: Write> {
    hasher: Sha1,
    inner: W,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        HashingWriter {
            hasher: Sha1::new(),
            inner,
        }
    }

    fn into_parts(self) -> (Sha1, W) {
        (self.hasher, self.inner)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// In-flight object write.
///
/// The writer owns a temp file until [`ObjectWriter::commit`] moves it
/// under its content hash; dropping the writer earlier aborts the write
/// and the temp file removes itself.
pub struct ObjectWriter<'db> {
    database: &'db Database,
    temp_name: PathBuf,
    inner: Option<ExactSizeWriter<HashingWriter<ZlibEncoder<Box<dyn FsFile>>>>>,
}

impl std::fmt::Debug for ObjectWriter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectWriter")
            .field("temp_name", &self.temp_name)
            .finish()
    }
}

impl ObjectWriter<'_> {
    /// Finalize compression and hashing, verify the declared size was
    /// written exactly, and install the object under its hash.
    pub fn commit(mut self) -> Result<ObjectId> {
        let inner = self.inner.take().ok_or(Error::AlreadyClosed)?;

        let tee = inner.finish()?;
        let (hasher, encoder) = tee.into_parts();
        let file = encoder.finish().map_err(Error::Io)?;

        let digest = hasher.finalize();
        let oid = ObjectId::from_bytes(digest.as_slice())?;

        self.database.insert_object(&oid, &self.temp_name)?;
        // the temp handle's self-removal is a no-op after the move
        drop(file);

        Ok(oid)
    }
}

impl Write for ObjectWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.write(buf),
            None => Err(std::io::Error::other(Error::AlreadyClosed)),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Err(std::io::Error::other(Error::AlreadyClosed)),
        }
    }
}
