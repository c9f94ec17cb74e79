//! Row identity model.
//!
//! An editable grid addresses rows by their visual position, while the table
//! behind it addresses them by primary key. [`DModel`] keeps one primary-key
//! snapshot per grid row in an order-statistics tree, so a row ordinal resolves
//! to the key needed for an `UPDATE` or `DELETE` in O(log n), and appending or
//! removing a row never renumbers the rest of the grid in linear time.
//!
//! The model also compiles, once per editing session, the SQL statements that
//! address a single row by its key (see [`SqlTemplates`]).

pub mod model;
pub mod sql;

pub use model::{DModel, Entry};
pub use sql::{ColumnTemplate, SqlBuilder, SqlTemplates};
