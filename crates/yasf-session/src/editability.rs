//! Deciding, once per session, whether and how a schema object can be edited.

use std::fmt;

use serde::{Deserialize, Serialize};
use yasf_types::ident::IMPLICIT_KEY_NAMES;
use yasf_types::{Ident, QualifiedName};

/// The kind of schema object a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Table,
    View,
    Index,
    Trigger,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::View => "view",
            Self::Index => "index",
            Self::Trigger => "trigger",
        })
    }
}

/// One column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// 1-based position within the primary key, 0 if not a key column.
    #[serde(default)]
    pub pk: u32,
    /// An `INTEGER PRIMARY KEY` column of a rowid table, which SQLite fills
    /// with the rowid when NULL is inserted.
    #[serde(default)]
    pub rowid_alias: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, pk: u32) -> Self {
        Self {
            name: name.into(),
            pk,
            rowid_alias: false,
        }
    }

    /// The sole `INTEGER PRIMARY KEY` column of a rowid table.
    pub fn integer_primary_key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pk: 1,
            rowid_alias: true,
        }
    }

    #[must_use]
    pub const fn is_key(&self) -> bool {
        self.pk > 0
    }
}

/// Caller-supplied metadata for the object being opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: QualifiedName,
    pub kind: ObjectKind,
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub without_rowid: bool,
}

impl TableInfo {
    /// A rowid table with the given columns.
    pub fn table(name: QualifiedName, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name,
            kind: ObjectKind::Table,
            columns,
            without_rowid: false,
        }
    }

    /// Whether a user column is named `name`, ignoring ASCII case.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// How rows of an editable table are identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyColumns {
    /// Declared primary-key columns, in key order.
    Explicit(Vec<String>),
    /// The implicit row identifier under a name no user column shadows.
    Implicit(Ident),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotEditableReason {
    NotATable(ObjectKind),
    /// A `WITHOUT ROWID` table reported without key columns.
    NoKey,
    /// User columns named `rowid`, `oid` and `_rowid_` hide the implicit key.
    ImplicitKeyShadowed,
}

impl fmt::Display for NotEditableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotATable(kind) => write!(f, "only tables can be edited, not a {kind}"),
            Self::NoKey => f.write_str("WITHOUT ROWID table has no primary key"),
            Self::ImplicitKeyShadowed => f.write_str(
                "user columns named rowid, oid and _rowid_ hide the implicit row identifier",
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Editability {
    Editable(KeyColumns),
    NotEditable(NotEditableReason),
}

impl Editability {
    /// Classify `info`. Tables without a declared key use `preferred`, or the
    /// first other implicit-key spelling that no user column shadows.
    #[must_use]
    pub fn decide(info: &TableInfo, preferred: &Ident) -> Self {
        if info.kind != ObjectKind::Table {
            return Self::NotEditable(NotEditableReason::NotATable(info.kind));
        }

        let mut keyed: Vec<&ColumnInfo> = info.columns.iter().filter(|c| c.is_key()).collect();
        if !keyed.is_empty() {
            keyed.sort_by_key(|c| c.pk);
            return Self::Editable(KeyColumns::Explicit(
                keyed.into_iter().map(|c| c.name.clone()).collect(),
            ));
        }
        if info.without_rowid {
            return Self::NotEditable(NotEditableReason::NoKey);
        }

        let preferred_name = preferred.name();
        let candidates = std::iter::once(preferred_name).chain(
            IMPLICIT_KEY_NAMES
                .iter()
                .copied()
                .filter(|name| *name != preferred_name),
        );
        for name in candidates {
            if !info.has_column(name) {
                return match Ident::implicit_key(name) {
                    Ok(ident) => Self::Editable(KeyColumns::Implicit(ident)),
                    Err(_) => Self::NotEditable(NotEditableReason::ImplicitKeyShadowed),
                };
            }
        }
        Self::NotEditable(NotEditableReason::ImplicitKeyShadowed)
    }

    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self, Self::Editable(_))
    }
}
