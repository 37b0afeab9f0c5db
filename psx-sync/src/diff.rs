//! Change detection between two ticker snapshots.
//!
//! Symbols only in the current snapshot are additions, symbols only in the
//! previous one are deletions. When both sides are non-empty, deletions are
//! paired with additions whose company names look related: one name
//! contains the other, or both are longer than 10 characters and a word of
//! more than 3 characters from the old name occurs in the new one.
//!
//! Unresolved names never take part: an empty name, the "No record found"
//! placeholder, and a name that merely repeats the ticker's own symbol.
//!
//! The pairing is a heuristic, not an identity match. It is greedy: deleted
//! symbols are visited in ascending order, each takes the first unmatched
//! added symbol (ascending) that qualifies, and a match is never revisited.

use std::collections::BTreeSet;

use serde::Serialize;

use psx_core::types::is_resolved_name;
use psx_core::{Snapshot, Symbol, NO_RECORD_NAME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    pub from: Symbol,
    pub to: Symbol,
}

/// Result of one comparison. All lists are sorted by symbol (renames by
/// their old symbol).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub added: Vec<Symbol>,
    pub deleted: Vec<Symbol>,
    pub renamed: Vec<Rename>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.renamed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.deleted.len() + self.renamed.len()
    }
}

/// Classify the difference between `previous` and `current`.
pub fn detect_changes(current: &Snapshot, previous: &Snapshot) -> ChangeSet {
    let current_symbols = current.symbols();
    let previous_symbols = previous.symbols();

    let mut added: BTreeSet<&Symbol> = current_symbols
        .difference(&previous_symbols)
        .copied()
        .collect();
    let mut deleted: BTreeSet<&Symbol> = previous_symbols
        .difference(&current_symbols)
        .copied()
        .collect();

    let mut renamed = Vec::new();
    if !added.is_empty() && !deleted.is_empty() {
        // Lowercased name, or `None` while the name is still a sentinel.
        let name_of = |snapshot: &Snapshot, symbol: &Symbol| {
            snapshot
                .get(symbol)
                .filter(|t| is_resolved_name(&t.symbol, &t.name))
                .map(|t| t.name.to_lowercase())
        };

        for old in deleted.clone() {
            let Some(old_name) = name_of(previous, old) else {
                continue;
            };
            let matched = added.iter().copied().find(|new| {
                name_of(current, *new)
                    .is_some_and(|new_name| names_look_related(&old_name, &new_name))
            });
            if let Some(new) = matched {
                tracing::debug!("rename candidate {old} -> {new}");
                added.remove(new);
                deleted.remove(old);
                renamed.push(Rename {
                    from: old.clone(),
                    to: new.clone(),
                });
            }
        }
    }

    ChangeSet {
        added: added.into_iter().cloned().collect(),
        deleted: deleted.into_iter().cloned().collect(),
        renamed,
    }
}

/// The rename heuristic on two lowercased company names.
///
/// Empty names and the "No record found" placeholder never match.
pub fn names_look_related(old: &str, new: &str) -> bool {
    let placeholder = NO_RECORD_NAME.to_lowercase();
    if old.trim().is_empty() || new.trim().is_empty() || old == placeholder || new == placeholder {
        return false;
    }
    if new.contains(old) || old.contains(new) {
        return true;
    }
    old.chars().count() > 10
        && new.chars().count() > 10
        && old
            .split_whitespace()
            .filter(|word| word.chars().count() > 3)
            .any(|word| new.contains(word))
}
