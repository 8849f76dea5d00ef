//! Filesystem port
//!
//! The storage engine never touches `std::fs` directly; it goes through
//! [`FileSystem`], a small capability set over paths relative to the
//! repository root. [`OsFileSystem`] is the production implementation.
//!
//! Temp files remove themselves when dropped unless they were moved
//! into place first, which makes the atomic-rename insert pattern safe
//! on every error path.

use crate::errors::{Error, Result};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// An open file handle plus the (root-relative) name it was opened under.
pub trait FsFile: Read + Write + std::fmt::Debug {
    fn name(&self) -> &Path;
}

/// Capabilities the engine consumes.
pub trait FileSystem {
    fn open(&self, path: &Path) -> Result<Box<dyn FsFile>>;
    /// Create (truncate) a file, making parent directories as needed.
    fn create(&self, path: &Path) -> Result<Box<dyn FsFile>>;
    /// Create a temp file in the root; it removes itself on abort.
    fn temp_file(&self) -> Result<Box<dyn FsFile>>;
    /// Atomic move; parent directories of `to` are created as needed.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    /// One level of directory entries, returned as root-relative paths.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;
    fn is_file_exist(&self, path: &Path) -> bool;
    fn is_read_only(&self) -> bool;
}

/// Port implementation over a real directory.
pub struct OsFileSystem {
    root: PathBuf,
}

impl OsFileSystem {
    pub fn new(root: impl AsRef<Path>) -> Self {
        OsFileSystem {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

#[derive(Debug)]
struct OsFsFile {
    file: fs::File,
    name: PathBuf,
    full_path: PathBuf,
    temp: bool,
}

impl FsFile for OsFsFile {
    fn name(&self) -> &Path {
        &self.name
    }
}

impl Read for OsFsFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for OsFsFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl Drop for OsFsFile {
    fn drop(&mut self) {
        if self.temp {
            // a no-op once the file was renamed into place
            let _ = fs::remove_file(&self.full_path);
        }
    }
}

impl FileSystem for OsFileSystem {
    fn open(&self, path: &Path) -> Result<Box<dyn FsFile>> {
        let full_path = self.full_path(path);
        let file = fs::File::open(&full_path).map_err(Error::Io)?;

        Ok(Box::new(OsFsFile {
            file,
            name: path.to_path_buf(),
            full_path,
            temp: false,
        }))
    }

    fn create(&self, path: &Path) -> Result<Box<dyn FsFile>> {
        let full_path = self.full_path(path);
        if let Some(parent) = full_path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        let file = fs::File::create(&full_path).map_err(Error::Io)?;
        Ok(Box::new(OsFsFile {
            file,
            name: path.to_path_buf(),
            full_path,
            temp: false,
        }))
    }

    fn temp_file(&self) -> Result<Box<dyn FsFile>> {
        let name = PathBuf::from(format!("tmp-obj-{}", fake::rand::random::<u32>()));
        let full_path = self.full_path(&name);

        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&full_path)
            .map_err(Error::Io)?;

        Ok(Box::new(OsFsFile {
            file,
            name,
            full_path,
            temp: true,
        }))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let target = self.full_path(to);
        if let Some(parent) = target.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        fs::rename(self.full_path(from), target).map_err(Error::Io)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let full_path = self.full_path(path);
        if !full_path.exists() {
            // no directory, no entries
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&full_path).map_err(Error::Io)? {
            let entry = entry.map_err(Error::Io)?;
            names.push(
                path.join(entry.file_name())
                    .to_string_lossy()
                    .into_owned(),
            );
        }
        names.sort();

        Ok(names)
    }

    fn is_file_exist(&self, path: &Path) -> bool {
        self.full_path(path).exists()
    }

    fn is_read_only(&self) -> bool {
        self.root
            .metadata()
            .map(|meta| meta.permissions().readonly())
            .unwrap_or(false)
    }
}
