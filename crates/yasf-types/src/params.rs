//! Positional parameter helpers for binding key tuples and cell values.

/// Build a `Vec<SqlValue>` from heterogeneous values.
///
/// ```ignore
/// use yasf_types::params;
///
/// let p = params![42_i64, "hello", None::<i64>];
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::SqlValue>::new()
    };
    ($($val:expr),+ $(,)?) => {
        ::std::vec![$($crate::SqlValue::from($val)),+]
    };
}

/// Convert an iterator of values into a `Vec<SqlValue>`.
pub fn params_from_iter(iter: impl IntoIterator<Item = impl Into<crate::SqlValue>>) -> Vec<crate::SqlValue> {
    iter.into_iter().map(Into::into).collect()
}
