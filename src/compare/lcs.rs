//! Longest-common-subsequence diff over token windows

use std::collections::HashMap;

use super::types::{DiffKind, DiffToken};

/// One step of an edit script, with indices into the compared slices
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edit {
    Keep { base: usize, comparison: usize },
    Insert { comparison: usize },
    Delete { base: usize },
}

impl Edit {
    #[must_use]
    pub const fn kind(self) -> DiffKind {
        match self {
            Self::Keep { .. } => DiffKind::Unchanged,
            Self::Insert { .. } => DiffKind::Added,
            Self::Delete { .. } => DiffKind::Removed,
        }
    }

    /// Whether this edit consumes a base token
    #[must_use]
    pub const fn takes_base(self) -> bool {
        !matches!(self, Self::Insert { .. })
    }

    /// Whether this edit consumes a comparison token
    #[must_use]
    pub const fn takes_comparison(self) -> bool {
        !matches!(self, Self::Delete { .. })
    }
}

/// Maps token strings to dense integer ids so the DP compares integers
#[derive(Debug, Default)]
pub struct Interner<'a> {
    ids: HashMap<&'a str, u32>,
}

impl<'a> Interner<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, token: &'a str) -> u32 {
        let next = self.ids.len() as u32;
        *self.ids.entry(token).or_insert(next)
    }

    pub fn intern_all<S: AsRef<str>>(&mut self, tokens: &'a [S]) -> Vec<u32> {
        tokens.iter().map(|t| self.intern(t.as_ref())).collect()
    }
}

/// Edit script between `base` and `comparison`.
///
/// Ties on backtrack prefer keeping an equal pair, then an insertion when it
/// does not shorten the LCS, so removals precede additions in a replacement.
#[must_use]
pub fn edit_script<T: Eq>(base: &[T], comparison: &[T]) -> Vec<Edit> {
    let n = base.len();
    let m = comparison.len();
    if n == 0 && m == 0 {
        return Vec::new();
    }

    let cols = m + 1;
    let mut table = vec![0u32; (n + 1) * cols];
    for i in 1..=n {
        for j in 1..=m {
            table[i * cols + j] = if base[i - 1] == comparison[j - 1] {
                table[(i - 1) * cols + j - 1] + 1
            } else {
                table[i * cols + j - 1].max(table[(i - 1) * cols + j])
            };
        }
    }

    let mut edits = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && base[i - 1] == comparison[j - 1] {
            edits.push(Edit::Keep {
                base: i - 1,
                comparison: j - 1,
            });
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[i * cols + j] == table[i * cols + j - 1]) {
            edits.push(Edit::Insert { comparison: j - 1 });
            j -= 1;
        } else {
            edits.push(Edit::Delete { base: i - 1 });
            i -= 1;
        }
    }
    edits.reverse();
    edits
}

/// Length of the longest common subsequence
#[must_use]
pub fn lcs_len<T: Eq>(base: &[T], comparison: &[T]) -> usize {
    edit_script(base, comparison)
        .iter()
        .filter(|e| matches!(e, Edit::Keep { .. }))
        .count()
}

/// Tagged token stream for two whole sequences
#[must_use]
pub fn diff_tokens<S: AsRef<str>>(base: &[S], comparison: &[S]) -> Vec<DiffToken> {
    let mut interner = Interner::new();
    let a = interner.intern_all(base);
    let b = interner.intern_all(comparison);
    edit_script(&a, &b)
        .into_iter()
        .map(|edit| match edit {
            Edit::Keep { base: i, .. } | Edit::Delete { base: i } => {
                DiffToken::new(edit.kind(), base[i].as_ref())
            }
            Edit::Insert { comparison: j } => DiffToken::added(comparison[j].as_ref()),
        })
        .collect()
}
