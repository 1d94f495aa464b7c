//! Reconciling the change cache with the files currently on disk.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::cache::ChangeCache;
use crate::hash::ContentHasher;

/// How the set of files differs from the previous scan.
///
/// Modified files do not appear here: they keep their path and are caught by
/// the per-file hash check during analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Paths with no cache entry that did not turn out to be moves.
    pub added: Vec<String>,
    /// `(old, new)` pairs whose content digest matched.
    pub moved: Vec<(String, String)>,
    /// Cached paths that no longer exist and matched nothing.
    pub removed: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.moved.is_empty() && self.removed.is_empty()
    }
}

/// Diff `current` (relative key → absolute path) against `cache`, applying
/// renames and removals to the cache.
///
/// Only files the cache has never seen are move candidates. A tracked file
/// keeps its own entry even if its new content equals a vanished file's.
/// When several candidates share a digest, the first unclaimed one in path
/// order wins.
///
/// With `known` set to the keys of the report being written, cache entries
/// outside it are not trusted: a discovered file without a report entry
/// loses its cache entry and is re-analyzed, and an undiscovered one is
/// neither a removal nor a move source. An empty `known` makes the scan cold.
pub fn reconcile(
    cache: &ChangeCache,
    current: &BTreeMap<String, PathBuf>,
    known: Option<&BTreeSet<String>>,
) -> ChangeSet {
    let trusted = |path: &String| known.map_or(true, |k| k.contains(path));

    let mut previous = BTreeSet::new();
    for path in cache.paths() {
        if trusted(&path) {
            previous.insert(path);
        } else if current.contains_key(&path) {
            debug!(path = %path, "cached but missing from report, re-analyzing");
            cache.remove(&path);
        }
    }
    let missing: Vec<String> = previous
        .iter()
        .filter(|p| !current.contains_key(*p))
        .cloned()
        .collect();
    let candidates: Vec<(&String, &PathBuf)> = current
        .iter()
        .filter(|(rel, _)| !previous.contains(*rel))
        .collect();

    let mut changes = ChangeSet::default();
    let mut claimed = BTreeSet::new();

    if !missing.is_empty() && !candidates.is_empty() {
        let digests: Vec<(&String, Option<String>)> = candidates
            .par_iter()
            .map(|(rel, abs)| (*rel, ContentHasher::hash_file(abs)))
            .collect();

        for old in &missing {
            let Some(recorded) = cache.lookup(old).filter(|d| !d.is_empty()) else {
                continue;
            };
            let found = digests.iter().find(|(rel, digest)| {
                !claimed.contains(*rel) && digest.as_deref() == Some(recorded.as_str())
            });
            if let Some((new, _)) = found {
                debug!(from = %old, to = %new, "file moved");
                cache.rename(old, new.as_str());
                claimed.insert((*new).clone());
                changes.moved.push((old.clone(), (*new).clone()));
            }
        }
    }

    let moved_from: BTreeSet<&String> = changes.moved.iter().map(|(old, _)| old).collect();
    for old in &missing {
        if !moved_from.contains(old) {
            debug!(path = %old, "file removed");
            cache.remove(old);
            changes.removed.push(old.clone());
        }
    }

    changes.added = candidates
        .iter()
        .filter(|(rel, _)| !claimed.contains(*rel))
        .map(|(rel, _)| (*rel).clone())
        .collect();

    if !changes.is_empty() {
        info!(
            added = changes.added.len(),
            moved = changes.moved.len(),
            removed = changes.removed.len(),
            "reconciled cache with disk"
        );
    }
    changes
}
