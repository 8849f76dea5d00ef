//! Canned walker callbacks and comparators
//!
//! Callbacks drive selection (which commits get taken, where the walk
//! goes next); comparators drive simplification (which commits count as
//! equal). Both are plain closures so they compose: the pager and
//! counter wrap any inner callback.

use crate::areas::repository::Repository;
use crate::artifacts::log::walker::WalkAction;
use crate::artifacts::objects::commit::Commit;
use crate::errors::{Error, Result};
use std::cell::Cell;
use std::rc::Rc;

/// Take everything, follow everything.
pub fn nop_callback(_commit: &Commit) -> Result<WalkAction> {
    Ok(WalkAction::TAKE_AND_FOLLOW)
}

/// Take commits whose tree contains `path`; keep following either way.
pub fn make_path_checker<'r>(
    repo: &'r Repository,
    path: &str,
) -> impl FnMut(&Commit) -> Result<WalkAction> + 'r {
    let path = path.to_string();

    move |commit: &Commit| match repo.find_in_tree(commit.tree_oid(), &path) {
        Ok(_) => Ok(WalkAction::TAKE_AND_FOLLOW),
        Err(Error::NotFound) => Ok(WalkAction::FOLLOW_PARENTS),
        Err(err) => Err(err),
    }
}

/// Take commits whose message matches the pattern.
pub fn make_history_searcher(
    pattern: &str,
) -> Result<impl FnMut(&Commit) -> Result<WalkAction>> {
    let matcher = regex::Regex::new(pattern)
        .map_err(|_| Error::InvalidRecord("bad search pattern"))?;

    Ok(move |commit: &Commit| {
        if matcher.is_match(commit.message()) {
            Ok(WalkAction::TAKE_AND_FOLLOW)
        } else {
            Ok(WalkAction::FOLLOW_PARENTS)
        }
    })
}

/// Skip the first `skip` commits the inner callback would take, then
/// take up to `count`, stopping the walk on the last one.
pub fn make_pager<C>(
    inner: C,
    skip: usize,
    count: usize,
) -> impl FnMut(&Commit) -> Result<WalkAction>
where
    C: FnMut(&Commit) -> Result<WalkAction>,
{
    let mut inner = inner;
    let mut skip = skip;
    let mut count = count;

    move |commit: &Commit| {
        let action = inner(commit)?;

        // commits the inner callback passes over do not consume the page
        if !action.contains(WalkAction::TAKE_COMMIT) {
            return Ok(action);
        }

        if skip != 0 {
            skip -= 1;
            return Ok(action - WalkAction::TAKE_COMMIT);
        }

        if count != 0 {
            count -= 1;
            if count == 0 {
                // last element of the page
                return Ok(action | WalkAction::STOP);
            }
            return Ok(action);
        }

        Ok(WalkAction::STOP)
    }
}

/// Count commits the inner callback accepts without taking them.
/// Returns the wrapped callback and a shared counter to read after the
/// walk.
pub fn make_counter<C>(
    inner: C,
) -> (impl FnMut(&Commit) -> Result<WalkAction>, Rc<Cell<usize>>)
where
    C: FnMut(&Commit) -> Result<WalkAction>,
{
    let count = Rc::new(Cell::new(0));
    let counter = count.clone();
    let mut inner = inner;

    let callback = move |commit: &Commit| {
        let action = inner(commit)?;

        if action.contains(WalkAction::TAKE_COMMIT) {
            counter.set(counter.get() + 1);
            return Ok(action - WalkAction::TAKE_COMMIT);
        }

        Ok(action)
    };

    (callback, count)
}

/// Equal iff the commits are the same object.
pub fn exact_commit_comparator(current: &Commit, parent: &Commit) -> bool {
    current.oid() == parent.oid()
}

/// Equal iff both snapshots share the same root tree; drops commits
/// that did not change anything.
pub fn commit_root_comparator(current: &Commit, parent: &Commit) -> bool {
    current.tree_oid() == parent.tree_oid()
}

/// Equal iff the entry at `path` is identical in both snapshots, or
/// missing from both.
pub fn make_path_comparator<'r>(
    repo: &'r Repository,
    path: &str,
) -> impl Fn(&Commit, &Commit) -> bool + 'r {
    let path = path.to_string();

    move |current: &Commit, parent: &Commit| {
        let current_entry = repo.find_in_tree(current.tree_oid(), &path);
        let parent_entry = repo.find_in_tree(parent.tree_oid(), &path);

        match (current_entry, parent_entry) {
            (Ok(current_entry), Ok(parent_entry)) => current_entry == parent_entry,
            (Err(Error::NotFound), Err(Error::NotFound)) => true,
            _ => false,
        }
    }
}
