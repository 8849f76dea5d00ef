//! Merge-base computation
//!
//! Implementation follows git's `commit.c:paint_down_to_common`: every
//! visited commit carries a mark saying which inputs reach it; a commit
//! reached from both sides becomes a result and poisons everything
//! below it with the stale mark, so no older common ancestor can
//! displace it. The walk runs newest-first by committer timestamp and
//! ends when the frontier holds only stale entries.

use crate::artifacts::log::walker::History;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use bitflags::bitflags;
use std::collections::HashMap;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct TraceMark: u8 {
        /// Reachable from the first input.
        const P1 = 1;
        /// Reachable from one of the remaining inputs.
        const P2 = 1 << 1;
        /// No new common ancestor can be found through here.
        const STALE = 1 << 2;
        /// Committed to the result set.
        const RESULT = 1 << 3;

        const BOTH = Self::P1.bits() | Self::P2.bits();
    }
}

/// Commits opened during the paint, keyed by ID so repeated visits stay
/// cheap.
struct CommitCache<'r> {
    history: &'r History<'r>,
    commits: HashMap<ObjectId, Commit>,
}

impl<'r> CommitCache<'r> {
    fn new(history: &'r History<'r>) -> Self {
        CommitCache {
            history,
            commits: HashMap::new(),
        }
    }

    fn load(&mut self, oid: &ObjectId) -> Result<&Commit> {
        if !self.commits.contains_key(oid) {
            let commit = self.history.repository().open_commit(oid)?;
            self.commits.insert(*oid, commit);
        }
        Ok(&self.commits[oid])
    }

    fn get(&self, oid: &ObjectId) -> &Commit {
        &self.commits[oid]
    }
}

impl History<'_> {
    /// Youngest commit reachable from every input, or `None` when the
    /// inputs share no history. At least two inputs are required.
    pub fn find_merge_base(&self, roots: &[ObjectId]) -> Result<Option<Commit>> {
        let Some((left, rights)) = roots.split_first() else {
            return Err(Error::TooFewRoots);
        };
        if rights.is_empty() {
            return Err(Error::TooFewRoots);
        }

        if rights.iter().any(|right| right == left) {
            return Ok(Some(self.repository().open_commit(left)?));
        }

        let mut cache = CommitCache::new(self);
        let mut trace: HashMap<ObjectId, TraceMark> = HashMap::new();
        let mut frontier: Vec<ObjectId> = Vec::new();

        cache.load(left)?;
        trace.insert(*left, TraceMark::P1);
        frontier.push(*left);

        for right in rights {
            cache.load(right)?;
            *trace.entry(*right).or_insert(TraceMark::empty()) |= TraceMark::P2;
            frontier.push(*right);
        }

        let mut results: Vec<ObjectId> = Vec::new();

        while frontier
            .iter()
            .any(|oid| !trace[oid].contains(TraceMark::STALE))
        {
            let current = extract_newest(&mut frontier, &cache);
            let mark = trace[&current];

            let mut flags = mark & (TraceMark::BOTH | TraceMark::STALE);
            if flags == TraceMark::BOTH {
                if !mark.contains(TraceMark::RESULT) {
                    trace
                        .entry(current)
                        .and_modify(|entry| *entry |= TraceMark::RESULT);
                    results.push(current);
                }
                // everything below a common ancestor is old news
                flags |= TraceMark::STALE;
            }

            let parent_oids = cache.get(&current).parent_oids().to_vec();
            for parent_oid in parent_oids {
                cache.load(&parent_oid)?;
                let parent_mark = trace.entry(parent_oid).or_insert(TraceMark::empty());
                if parent_mark.contains(flags) {
                    // nothing new to propagate
                    continue;
                }
                *parent_mark |= flags;
                frontier.push(parent_oid);
            }
        }

        if results.is_empty() {
            return Ok(None);
        }

        let newest = extract_newest(&mut results, &cache);
        Ok(Some(cache.get(&newest).clone()))
    }
}

/// Remove and return the ID with the newest committer timestamp; ties
/// keep the earliest position.
fn extract_newest(oids: &mut Vec<ObjectId>, cache: &CommitCache<'_>) -> ObjectId {
    let mut target = 0;
    for idx in 1..oids.len() {
        if cache.get(&oids[idx]).timestamp() > cache.get(&oids[target]).timestamp() {
            target = idx;
        }
    }

    oids.remove(target)
}
