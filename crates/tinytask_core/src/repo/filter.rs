//! Typed text filters compiled to SQL predicates.
//!
//! # Responsibility
//! - Express equality and substring matches over one text column.
//! - Compile matches to `instr`/`substr` comparisons so no LIKE-escape
//!   handling is needed.
//!
//! # Invariants
//! - Matching is case-sensitive unless [`TextFilter::fold_case`] is set.
//! - Case folding is ASCII-only, the same folding SQLite's `lower()` and
//!   `LIKE` apply.
//! - An empty needle matches every row for the substring kinds; `Exact`
//!   still compares, so it matches only empty column text.
//! - Compiled fragments bind the needle as a value; column names come from
//!   repository code, never from callers.

use rusqlite::types::Value;

/// How a filter relates the column text to the needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Column equals the needle.
    Exact,
    /// Needle occurs anywhere in the column.
    Contains,
    /// Column begins with the needle.
    StartsWith,
    /// Column ends with the needle.
    EndsWith,
}

/// A match over one text column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    kind: MatchKind,
    needle: String,
    fold_case: bool,
}

impl TextFilter {
    /// Column equals the needle.
    pub fn exact(needle: impl Into<String>) -> Self {
        Self::with_kind(MatchKind::Exact, needle)
    }

    /// Needle occurs anywhere in the column.
    pub fn contains(needle: impl Into<String>) -> Self {
        Self::with_kind(MatchKind::Contains, needle)
    }

    /// Column begins with the needle.
    pub fn starts_with(needle: impl Into<String>) -> Self {
        Self::with_kind(MatchKind::StartsWith, needle)
    }

    /// Column ends with the needle.
    pub fn ends_with(needle: impl Into<String>) -> Self {
        Self::with_kind(MatchKind::EndsWith, needle)
    }

    fn with_kind(kind: MatchKind, needle: impl Into<String>) -> Self {
        Self {
            kind,
            needle: needle.into(),
            fold_case: false,
        }
    }

    /// Switches to ASCII case-insensitive matching.
    pub fn fold_case(mut self) -> Self {
        self.fold_case = true;
        self
    }

    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn is_case_folded(&self) -> bool {
        self.fold_case
    }

    /// Appends ` AND <predicate>` over `column` to `sql` and pushes the
    /// matching bind values.
    pub(crate) fn push_predicate(&self, column: &str, sql: &mut String, binds: &mut Vec<Value>) {
        if self.needle.is_empty() && self.kind != MatchKind::Exact {
            // Every string contains/starts/ends with the empty string.
            // Equality does not: exact("") must match only empty text.
            sql.push_str(" AND 1 = 1");
            return;
        }

        let column_expr = if self.fold_case {
            format!("lower({column})")
        } else {
            column.to_string()
        };
        let needle = if self.fold_case {
            self.needle.to_ascii_lowercase()
        } else {
            self.needle.clone()
        };

        match self.kind {
            MatchKind::Exact => {
                sql.push_str(&format!(" AND {column_expr} = ?"));
                binds.push(Value::Text(needle));
            }
            MatchKind::Contains => {
                sql.push_str(&format!(" AND instr({column_expr}, ?) > 0"));
                binds.push(Value::Text(needle));
            }
            MatchKind::StartsWith => {
                sql.push_str(&format!(" AND substr({column_expr}, 1, length(?)) = ?"));
                binds.push(Value::Text(needle.clone()));
                binds.push(Value::Text(needle));
            }
            MatchKind::EndsWith => {
                sql.push_str(&format!(" AND substr({column_expr}, -length(?)) = ?"));
                binds.push(Value::Text(needle.clone()));
                binds.push(Value::Text(needle));
            }
        }
    }
}
