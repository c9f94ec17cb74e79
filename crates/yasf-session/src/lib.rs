//! Editing sessions over a single SQLite table.
//!
//! An [`EditSession`] decides whether a table can be edited, builds the row
//! identity model for it, fills the model with the table's current keys and
//! then turns grid operations (edit a cell, add a row, delete a row) into
//! keyed statements run through a [`SqlExecutor`].

pub mod config;
pub mod editability;
pub mod executor;
pub mod session;

pub use config::SessionConfig;
pub use editability::{
    ColumnInfo, Editability, KeyColumns, NotEditableReason, ObjectKind, TableInfo,
};
pub use executor::{RusqliteExecutor, SqlExecutor};
pub use session::EditSession;
