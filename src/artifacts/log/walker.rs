//! History walker
//!
//! An ordered traversal over the commit DAG. The walker keeps a
//! *frontier* of roots not yet visited and a *seen* set of object IDs;
//! each round it simplifies the frontier, extracts the newest commit by
//! committer timestamp, and lets the callback decide whether to take
//! the commit, follow its parents, and/or stop.
//!
//! History simplification is parameterized by an equality predicate
//! over (commit, parent) pairs: a commit equal to one of its parents is
//! dropped and that parent followed in its place, which is how
//! tree-level and path-level filtering are expressed.

use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Result;
use bitflags::bitflags;
use derive_new::new;
use std::collections::HashSet;

bitflags! {
    /// What to do with the commit just handed to the callback. Empty
    /// means drop it and do not follow its parents.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WalkAction: u8 {
        const TAKE_COMMIT = 1;
        const FOLLOW_PARENTS = 1 << 1;
        const STOP = 1 << 2;

        const TAKE_AND_FOLLOW = Self::TAKE_COMMIT.bits() | Self::FOLLOW_PARENTS.bits();
    }
}

/// History queries over one repository.
#[derive(new)]
pub struct History<'r> {
    repo: &'r Repository,
}

impl History<'_> {
    pub fn repository(&self) -> &Repository {
        self.repo
    }

    /// Walk ancestors of `start` with exact-identity simplification
    /// (every distinct commit is its own equivalence class).
    pub fn walk_history<C>(&self, start: &ObjectId, callback: C) -> Result<Vec<Commit>>
    where
        C: FnMut(&Commit) -> Result<WalkAction>,
    {
        self.walk_filtered_history(start, callback, super::handlers::exact_commit_comparator)
    }

    /// Walk ancestors of `start`, collapsing commits the comparator
    /// deems equal.
    pub fn walk_filtered_history<C, E>(
        &self,
        start: &ObjectId,
        callback: C,
        eq: E,
    ) -> Result<Vec<Commit>>
    where
        C: FnMut(&Commit) -> Result<WalkAction>,
        E: Fn(&Commit, &Commit) -> bool,
    {
        let commit = self.repo.open_commit(start)?;
        self.walk(vec![commit], callback, eq)
    }

    fn walk<C, E>(&self, mut roots: Vec<Commit>, mut callback: C, eq: E) -> Result<Vec<Commit>>
    where
        C: FnMut(&Commit) -> Result<WalkAction>,
        E: Fn(&Commit, &Commit) -> bool,
    {
        let mut results = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();

        loop {
            roots = self.simplify_roots(roots, &eq, &mut seen)?;
            if roots.is_empty() {
                return Ok(results);
            }

            let next = extract_newest_commit(&mut roots);

            let action = callback(&next)?;

            seen.insert(*next.oid());

            if action.contains(WalkAction::FOLLOW_PARENTS) {
                let parents = self.repo.parents(&next)?;
                roots = merge_roots(roots, parents, &eq, &mut seen);
            }

            if action.contains(WalkAction::TAKE_COMMIT) {
                results.push(next);
            }

            if action.contains(WalkAction::STOP) {
                return Ok(results);
            }
        }
    }

    /// Replace each root by the first parent chain member that is not
    /// equal to it; drop roots that were already seen along the way.
    fn simplify_roots<E>(
        &self,
        roots: Vec<Commit>,
        eq: &E,
        seen: &mut HashSet<ObjectId>,
    ) -> Result<Vec<Commit>>
    where
        E: Fn(&Commit, &Commit) -> bool,
    {
        let mut simplified = Vec::with_capacity(roots.len());

        for root in roots {
            if let Some(commit) = self.skip_equal_commits(root, eq, seen)? {
                simplified.push(commit);
            }
        }

        Ok(simplified)
    }

    /// Walk toward parents while some parent is equal to the current
    /// commit, witnessing every dropped commit in `seen`.
    fn skip_equal_commits<E>(
        &self,
        mut commit: Commit,
        eq: &E,
        seen: &mut HashSet<ObjectId>,
    ) -> Result<Option<Commit>>
    where
        E: Fn(&Commit, &Commit) -> bool,
    {
        loop {
            if seen.contains(commit.oid()) {
                return Ok(None);
            }

            if commit.parent_oids().is_empty() {
                return Ok(Some(commit));
            }

            let mut replacement = None;
            for parent_oid in commit.parent_oids() {
                let parent = self.repo.open_commit(parent_oid)?;
                if eq(&commit, &parent) {
                    replacement = Some(parent);
                    break;
                }
            }

            match replacement {
                Some(parent) => {
                    seen.insert(*commit.oid());
                    commit = parent;
                }
                None => return Ok(Some(commit)),
            }
        }
    }
}

/// Merge new roots into the frontier, dropping duplicates by object ID
/// and witnessing (then dropping) commits equal to an existing root.
fn merge_roots<E>(
    base: Vec<Commit>,
    merging: Vec<Commit>,
    eq: &E,
    seen: &mut HashSet<ObjectId>,
) -> Vec<Commit>
where
    E: Fn(&Commit, &Commit) -> bool,
{
    let mut merged = base;
    let existing = merged.len();

    for needle in merging {
        let mut found = false;
        for item in &merged[..existing] {
            if needle.oid() == item.oid() {
                // struck a merge point, drop the duplicate
                found = true;
                break;
            }
            if eq(&needle, item) {
                seen.insert(*needle.oid());
                found = true;
                break;
            }
        }

        if !found {
            merged.push(needle);
        }
    }

    merged
}

/// Remove and return the newest commit by committer timestamp; ties
/// keep the earliest frontier position.
fn extract_newest_commit(roots: &mut Vec<Commit>) -> Commit {
    let mut target = 0;
    for idx in 1..roots.len() {
        if roots[idx].timestamp() > roots[target].timestamp() {
            target = idx;
        }
    }

    roots.remove(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::artifacts::objects::commit::UserTime;
    use chrono::{FixedOffset, TimeZone};

    fn commit_at(seconds: i64) -> Commit {
        let tz = FixedOffset::east_opt(0).unwrap();
        let user = UserTime::new(
            "t".to_string(),
            "t@x".to_string(),
            tz.timestamp_opt(seconds, 0).unwrap(),
        );
        let mut commit = Commit::new(
            ObjectId::default(),
            vec![],
            user.clone(),
            user,
            String::new(),
        );
        commit.stamp_oid(ObjectId::from_bytes(&[seconds as u8; 20]).unwrap());
        commit
    }

    #[test]
    fn extract_newest_prefers_later_timestamps() {
        let mut roots = vec![commit_at(10), commit_at(30), commit_at(20)];
        let newest = extract_newest_commit(&mut roots);
        assert_eq!(newest.timestamp().timestamp(), 30);
        assert_eq!(roots.len(), 2);
    }

    #[test]
    fn extract_newest_breaks_ties_by_position() {
        let first = commit_at(10);
        let mut second = commit_at(10);
        second.stamp_oid(ObjectId::from_bytes(&[99; 20]).unwrap());

        let first_oid = *first.oid();
        let mut roots = vec![first, second];
        let newest = extract_newest_commit(&mut roots);
        assert_eq!(newest.oid(), &first_oid);
    }

    #[test]
    fn merge_roots_drops_duplicate_oids() {
        let a = commit_at(1);
        let duplicate = a.clone();
        let b = commit_at(2);

        let mut seen = HashSet::new();
        let merged = merge_roots(
            vec![a],
            vec![duplicate, b],
            &|x: &Commit, y: &Commit| x.oid() == y.oid(),
            &mut seen,
        );

        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_roots_witnesses_equal_commits() {
        let a = commit_at(1);
        let b = commit_at(2);
        let b_oid = *b.oid();

        let mut seen = HashSet::new();
        // a comparator that considers everything equal collapses the frontier
        let merged = merge_roots(vec![a], vec![b], &|_: &Commit, _: &Commit| true, &mut seen);

        assert_eq!(merged.len(), 1);
        assert!(seen.contains(&b_oid));
    }
}
