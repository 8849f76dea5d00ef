//! Repository facade
//!
//! Composes the object database and the reference store behind one
//! handle and adds the typed layer: kind-checked object accessors, path
//! lookup inside trees, branch and tag resolution, parent loading.
//!
//! A handle is single-threaded; callers wanting parallelism open
//! independent handles.

use crate::areas::database::{Database, ObjectWriter};
use crate::areas::filesystem::{FileSystem, OsFileSystem};
use crate::areas::refs::RefStore;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::{ObjectInfo, ObjectReader, ObjectType};
use crate::artifacts::objects::tag::Tag;
use crate::artifacts::objects::tree::{Tree, TreeItem};
use crate::errors::{Error, Result};
use std::path::Path;
use std::rc::Rc;

/// Open the repository rooted at `root` (the directory holding
/// `objects/` and `refs/`).
pub fn open_repository(root: impl AsRef<Path>) -> Result<Repository> {
    Repository::open_with(Rc::new(OsFileSystem::new(root)))
}

pub struct Repository {
    fs: Rc<dyn FileSystem>,
    database: Database,
    refs: RefStore,
}

impl Repository {
    /// Open over an arbitrary filesystem port.
    pub fn open_with(fs: Rc<dyn FileSystem>) -> Result<Self> {
        let database = Database::open(fs.clone())?;
        let refs = RefStore::new(fs.clone());

        Ok(Repository {
            fs,
            database,
            refs,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    pub fn is_read_only(&self) -> bool {
        self.fs.is_read_only()
    }

    /// Close the handle; packs are released and later calls fail.
    pub fn close(&self) -> Result<()> {
        self.database.close()
    }

    // raw object operations

    pub fn open_object(&self, oid: &ObjectId) -> Result<(ObjectInfo, ObjectReader)> {
        self.database.open_object(oid)
    }

    pub fn stat_object(&self, oid: &ObjectId) -> Result<ObjectInfo> {
        self.database.stat_object(oid)
    }

    pub fn create_object(&self, object_type: ObjectType, size: u64) -> Result<ObjectWriter<'_>> {
        self.database.create_object(object_type, size)
    }

    pub fn is_object_exist(&self, oid: &ObjectId) -> bool {
        self.database.is_object_exist(oid)
    }

    // ref operations

    pub fn read_ref(&self, name: &str) -> Result<String> {
        self.refs.read_ref(name)
    }

    pub fn write_ref(&self, name: &str, value: &str) -> Result<()> {
        self.refs.write_ref(name, value)
    }

    pub fn read_symbolic_ref(&self, name: &str) -> Result<String> {
        self.refs.read_symbolic_ref(name)
    }

    pub fn write_symbolic_ref(&self, name: &str, target: &str) -> Result<()> {
        self.refs.write_symbolic_ref(name, target)
    }

    pub fn resolve_ref(&self, name: &str) -> Result<ObjectId> {
        self.refs.resolve_ref(name)
    }

    pub fn list_refs(&self, namespace: &str) -> Result<Vec<String>> {
        self.refs.list_refs(namespace)
    }

    /// Resolve `refs/heads/<name>` to an object ID.
    pub fn resolve_branch(&self, name: &str) -> Result<ObjectId> {
        self.refs.resolve_ref(&format!("refs/heads/{name}"))
    }

    /// Resolve `refs/tags/<name>`, following chains of annotated tags
    /// down to the first non-tag object.
    pub fn resolve_tag(&self, name: &str) -> Result<(ObjectId, ObjectType)> {
        let mut oid = self.refs.resolve_ref(&format!("refs/tags/{name}"))?;

        loop {
            let (info, mut reader) = self.open_object(&oid)?;
            if info.object_type != ObjectType::Tag {
                return Ok((oid, info.object_type));
            }

            let tag = Tag::parse(&mut reader)?;
            oid = *tag.target_oid();
        }
    }

    // typed object accessors

    pub fn open_commit(&self, oid: &ObjectId) -> Result<Commit> {
        let (info, mut reader) = self.open_object(oid)?;
        if info.object_type != ObjectType::Commit {
            return Err(Error::NotACommit(*oid));
        }

        let mut commit = Commit::parse(&mut reader)?;
        commit.stamp_oid(*oid);
        Ok(commit)
    }

    pub fn open_tree(&self, oid: &ObjectId) -> Result<Tree> {
        let (info, mut reader) = self.open_object(oid)?;
        if info.object_type != ObjectType::Tree {
            return Err(Error::NotATree(*oid));
        }

        let mut tree = Tree::parse(&mut reader)?;
        tree.stamp_oid(*oid);
        Ok(tree)
    }

    pub fn open_tag(&self, oid: &ObjectId) -> Result<Tag> {
        let (info, mut reader) = self.open_object(oid)?;
        if info.object_type != ObjectType::Tag {
            return Err(Error::NotATag(*oid));
        }

        let mut tag = Tag::parse(&mut reader)?;
        tag.stamp_oid(*oid);
        Ok(tag)
    }

    /// Walk `path` down from the tree at `root`. Every component but
    /// the last must name a tree; a missing component is `NotFound`.
    pub fn find_in_tree(&self, root: &ObjectId, path: &str) -> Result<TreeItem> {
        let components: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
        let Some((last, parents)) = components.split_last() else {
            return Err(Error::InvalidPath(path.to_string()));
        };

        let mut tree = self.open_tree(root)?;
        for component in parents {
            let item = tree.find(component).ok_or(Error::NotFound)?;
            if item.object_type() != ObjectType::Tree {
                return Err(Error::NotATree(item.oid));
            }
            tree = self.open_tree(&item.oid)?;
        }

        tree.find(last).cloned().ok_or(Error::NotFound)
    }

    /// Open every parent of `commit`, in parent order.
    pub fn parents(&self, commit: &Commit) -> Result<Vec<Commit>> {
        commit
            .parent_oids()
            .iter()
            .map(|oid| self.open_commit(oid))
            .collect()
    }
}
