//! Reference store
//!
//! References are text files holding either a 40-hex object ID or
//! `ref: <name>` pointing at another reference. Branches, tags and
//! remotes live under `refs/…`; a small set of special refs (`HEAD` and
//! friends) sits at the repository root.
//!
//! Writes go through a temp file and an atomic rename; resolution
//! follows symbolic chains up to a fixed hop budget.

use crate::areas::filesystem::FileSystem;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use derive_new::new;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Refs that live at the repository root rather than under `refs/`.
pub const SPECIAL_REFS: [&str; 5] = [
    "HEAD",
    "FETCH_HEAD",
    "ORIG_HEAD",
    "MERGE_HEAD",
    "CHERRY_PICK_HEAD",
];

/// Symbolic chains longer than this fail resolution.
pub const MAX_SYMREF_HOPS: usize = 10;

/// Pattern a symbolic reference value must match.
const SYMREF_REGEX: &str = r"^ref: (.+)$";

#[derive(new)]
pub struct RefStore {
    fs: Rc<dyn FileSystem>,
}

impl RefStore {
    fn ref_path(name: &str) -> PathBuf {
        PathBuf::from(name)
    }

    /// Raw reference value (an OID in hex, or `ref: <name>`), trimmed.
    ///
    /// A missing reference surfaces the port's not-found error.
    pub fn read_ref(&self, name: &str) -> Result<String> {
        let mut file = self.fs.open(&Self::ref_path(name))?;

        let mut content = String::new();
        file.read_to_string(&mut content).map_err(Error::Io)?;

        Ok(content.trim().to_string())
    }

    /// Create or overwrite a reference atomically.
    pub fn write_ref(&self, name: &str, value: &str) -> Result<()> {
        validate_ref_name(name)?;

        let mut tmp = self.fs.temp_file()?;
        tmp.write_all(value.as_bytes()).map_err(Error::Io)?;
        tmp.flush().map_err(Error::Io)?;

        let temp_name = tmp.name().to_path_buf();
        self.fs.rename(&temp_name, &Self::ref_path(name))
    }

    /// Target of a symbolic reference; fails on direct refs.
    pub fn read_symbolic_ref(&self, name: &str) -> Result<String> {
        let value = self.read_ref(name)?;

        match symref_target(&value)? {
            Some(target) => Ok(target),
            None => Err(Error::NotASymbolicRef(name.to_string())),
        }
    }

    /// Point a symbolic reference at another reference.
    pub fn write_symbolic_ref(&self, name: &str, target: &str) -> Result<()> {
        validate_ref_name(target)?;
        self.write_ref(name, &format!("ref: {target}"))
    }

    /// Follow symbolic references until an object ID, within the hop
    /// budget.
    pub fn resolve_ref(&self, name: &str) -> Result<ObjectId> {
        let mut name = name.to_string();

        for _ in 0..MAX_SYMREF_HOPS {
            let value = self.read_ref(&name)?;
            match symref_target(&value)? {
                Some(target) => name = target,
                None => return ObjectId::try_parse(&value),
            }
        }

        Err(Error::InvalidRef(name))
    }

    /// One level of references under `refs/<namespace>`.
    pub fn list_refs(&self, namespace: &str) -> Result<Vec<String>> {
        self.fs.list_dir(&Path::new("refs").join(namespace))
    }
}

fn symref_target(value: &str) -> Result<Option<String>> {
    let pattern = regex::Regex::new(SYMREF_REGEX)
        .map_err(|_| Error::InvalidRecord("bad symref pattern"))?;

    Ok(pattern
        .captures(value)
        .map(|captures| captures[1].to_string()))
}

/// A writable name is either a special root ref or lives under `refs/`,
/// with no traversal or whitespace tricks.
fn validate_ref_name(name: &str) -> Result<()> {
    if SPECIAL_REFS.contains(&name) {
        return Ok(());
    }

    let invalid = !name.starts_with("refs/")
        || name.ends_with('/')
        || name.split('/').any(|part| part.is_empty() || part == "..")
        || name.chars().any(|c| c.is_whitespace());

    if invalid {
        return Err(Error::InvalidRef(name.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::filesystem::OsFileSystem;

    fn open_store(dir: &assert_fs::TempDir) -> RefStore {
        RefStore::new(Rc::new(OsFileSystem::new(dir.path())))
    }

    #[test]
    fn write_then_read_round_trips_trimmed() {
        let dir = assert_fs::TempDir::new().unwrap();
        let refs = open_store(&dir);

        refs.write_ref("refs/heads/main", "  aabbccdd  \n").unwrap();
        assert_eq!(refs.read_ref("refs/heads/main").unwrap(), "aabbccdd");
    }

    #[test]
    fn symbolic_refs_resolve_through_their_target() {
        let dir = assert_fs::TempDir::new().unwrap();
        let refs = open_store(&dir);
        let oid_hex = "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0";

        refs.write_symbolic_ref("HEAD", "refs/heads/main").unwrap();
        refs.write_ref("refs/heads/main", oid_hex).unwrap();

        assert_eq!(refs.read_symbolic_ref("HEAD").unwrap(), "refs/heads/main");
        assert_eq!(refs.resolve_ref("HEAD").unwrap().to_hex(), oid_hex);
    }

    #[test]
    fn direct_ref_is_not_symbolic() {
        let dir = assert_fs::TempDir::new().unwrap();
        let refs = open_store(&dir);

        refs.write_ref("refs/heads/main", "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0")
            .unwrap();
        assert!(matches!(
            refs.read_symbolic_ref("refs/heads/main").unwrap_err(),
            Error::NotASymbolicRef(_)
        ));
    }

    #[test]
    fn resolution_cycles_exhaust_the_hop_budget() {
        let dir = assert_fs::TempDir::new().unwrap();
        let refs = open_store(&dir);

        refs.write_symbolic_ref("refs/heads/a", "refs/heads/b").unwrap();
        refs.write_symbolic_ref("refs/heads/b", "refs/heads/a").unwrap();

        assert!(matches!(
            refs.resolve_ref("refs/heads/a").unwrap_err(),
            Error::InvalidRef(_)
        ));
    }

    #[test]
    fn missing_ref_surfaces_not_found_io() {
        let dir = assert_fs::TempDir::new().unwrap();
        let refs = open_store(&dir);

        assert!(refs.read_ref("refs/heads/nope").unwrap_err().is_not_found());
    }

    #[test]
    fn bad_names_are_rejected_at_write() {
        let dir = assert_fs::TempDir::new().unwrap();
        let refs = open_store(&dir);

        for name in [
            "heads/main",
            "refs/../escape",
            "refs/heads/",
            "/refs/heads/x",
            "refs/heads/with space",
            "NOT_SPECIAL",
        ] {
            assert!(
                matches!(
                    refs.write_ref(name, "x").unwrap_err(),
                    Error::InvalidRef(_)
                ),
                "expected {name} to be rejected"
            );
        }
    }

    #[test]
    fn special_refs_are_writable_at_the_root() {
        let dir = assert_fs::TempDir::new().unwrap();
        let refs = open_store(&dir);

        for name in SPECIAL_REFS {
            refs.write_ref(name, "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0")
                .unwrap();
        }
    }

    #[test]
    fn list_refs_enumerates_a_namespace() {
        let dir = assert_fs::TempDir::new().unwrap();
        let refs = open_store(&dir);

        refs.write_ref("refs/heads/main", "x").unwrap();
        refs.write_ref("refs/heads/dev", "x").unwrap();
        refs.write_ref("refs/tags/v1", "x").unwrap();

        let heads = refs.list_refs("heads").unwrap();
        assert_eq!(heads, vec!["refs/heads/dev", "refs/heads/main"]);
        assert!(refs.list_refs("remotes").unwrap().is_empty());
    }
}
