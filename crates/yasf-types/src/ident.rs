//! Typed SQL identifiers.
//!
//! Generated statements never splice raw strings: every table and column name
//! goes through [`Ident`] or [`QualifiedName`], which own the quoting rules.

use std::fmt;

use yasf_error::{Result, YasfError};

/// Names SQLite accepts for the implicit row identifier of a rowid table.
pub const IMPLICIT_KEY_NAMES: [&str; 3] = ["rowid", "oid", "_rowid_"];

/// A single SQL identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ident {
    name: String,
    bare: bool,
}

impl Ident {
    /// An ordinary column name, rendered double-quoted.
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bare: false,
        }
    }

    /// The implicit row identifier, rendered without quotes.
    ///
    /// Quoting would make `"rowid"` resolve to a user column of that name
    /// when one exists, so only the three reserved spellings are accepted.
    pub fn implicit_key(name: &str) -> Result<Self> {
        if IMPLICIT_KEY_NAMES
            .iter()
            .any(|known| known.eq_ignore_ascii_case(name))
        {
            Ok(Self {
                name: name.to_ascii_lowercase(),
                bare: true,
            })
        } else {
            Err(YasfError::config(format!(
                "{name:?} is not an implicit row identifier"
            )))
        }
    }

    /// The default implicit row identifier, `rowid`.
    pub fn rowid() -> Self {
        Self {
            name: "rowid".to_owned(),
            bare: true,
        }
    }

    /// The unquoted name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the implicit row identifier.
    pub const fn is_implicit_key(&self) -> bool {
        self.bare
    }

    /// Exact length of the rendered form, for pre-sizing buffers.
    pub fn rendered_len(&self) -> usize {
        if self.bare {
            self.name.len()
        } else {
            self.name.len() + self.name.matches('"').count() + 2
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bare {
            return f.write_str(&self.name);
        }
        f.write_str("\"")?;
        for (i, part) in self.name.split('"').enumerate() {
            if i > 0 {
                f.write_str("\"\"")?;
            }
            f.write_str(part)?;
        }
        f.write_str("\"")
    }
}

/// A table reference, optionally qualified by its schema.
///
/// Serializes as `{"schema": "main", "table": "t"}` with the names unquoted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "RawQualifiedName", into = "RawQualifiedName")]
pub struct QualifiedName {
    schema: Option<Ident>,
    table: Ident,
}

impl QualifiedName {
    /// `"schema"."table"`.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: Some(Ident::column(schema)),
            table: Ident::column(table),
        }
    }

    /// `"table"`, resolved through the connection's search order.
    pub fn unqualified(table: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: Ident::column(table),
        }
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_ref().map(Ident::name)
    }

    pub fn table(&self) -> &str {
        self.table.name()
    }

    /// Exact length of the rendered form, for pre-sizing buffers.
    pub fn rendered_len(&self) -> usize {
        self.table.rendered_len() + self.schema.as_ref().map_or(0, |s| s.rendered_len() + 1)
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct RawQualifiedName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<String>,
    table: String,
}

impl From<RawQualifiedName> for QualifiedName {
    fn from(raw: RawQualifiedName) -> Self {
        match raw.schema {
            Some(schema) => Self::new(schema, raw.table),
            None => Self::unqualified(raw.table),
        }
    }
}

impl From<QualifiedName> for RawQualifiedName {
    fn from(name: QualifiedName) -> Self {
        Self {
            schema: name.schema.map(|s| s.name),
            table: name.table.name,
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{schema}.")?;
        }
        write!(f, "{}", self.table)
    }
}
