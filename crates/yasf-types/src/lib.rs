//! Value and identifier types shared by the row identity model and the
//! edit session.

pub mod ident;
pub mod params;
pub mod value;

pub use ident::{Ident, QualifiedName};
pub use value::SqlValue;
