use serde::{Deserialize, Serialize};
use yasf_error::{Result, YasfError};
use yasf_types::Ident;

/// Settings for an [`EditSession`](crate::EditSession).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Identifier used as the key of tables without a declared primary key:
    /// `"rowid"`, `"oid"` or `"_rowid_"`.
    pub implicit_key_column: String,
    /// Require every keyed update or delete to touch exactly one row.
    pub verify_affected_rows: bool,
    /// Number of rows to pre-allocate index space for.
    pub initial_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            implicit_key_column: "rowid".to_owned(),
            verify_affected_rows: true,
            initial_capacity: 0,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| YasfError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        self.implicit_key().map(|_| ())
    }

    /// The implicit key as a typed identifier.
    pub fn implicit_key(&self) -> Result<Ident> {
        Ident::implicit_key(&self.implicit_key_column)
    }
}
