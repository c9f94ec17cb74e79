use tracing::{debug, trace};
use yasf_error::{Result, YasfError};
use yasf_types::{Ident, QualifiedName, SqlValue};
use yasf_wbt::{WbtStats, WbtTree};

use crate::sql::SqlTemplates;

/// One grid row's identity: its append sequence and a snapshot of its key.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    sequence: u64,
    key: Vec<SqlValue>,
}

impl Entry {
    /// Position in append order. Strictly increasing per model, never reused.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The primary-key values, in key-column order.
    #[must_use]
    pub fn key(&self) -> &[SqlValue] {
        &self.key
    }
}

/// Maps visual row ordinals of one editable table to primary-key tuples.
///
/// Lifecycle: register columns, [`compile`](Self::compile) once, then add,
/// look up and remove entries. Rows are identified by the order in which they
/// were appended, never by key contents, so duplicate or NULL keys (as in a
/// half-entered new row) are fine.
#[derive(Debug)]
pub struct DModel {
    table: QualifiedName,
    columns: Vec<Ident>,
    primary_key: Vec<Ident>,
    key_positions: Vec<usize>,
    implicit_key: Ident,
    sql: Option<SqlTemplates>,
    next_sequence: u64,
    entries: WbtTree<Entry>,
}

impl DModel {
    /// Create an empty model for `table`, keyed by `rowid` unless primary-key
    /// columns are registered.
    #[must_use]
    pub fn new(table: QualifiedName) -> Self {
        Self {
            table,
            columns: Vec::new(),
            primary_key: Vec::new(),
            key_positions: Vec::new(),
            implicit_key: Ident::rowid(),
            sql: None,
            next_sequence: 0,
            entries: WbtTree::new(),
        }
    }

    /// Use `key` instead of `rowid` when the table has no declared key.
    #[must_use]
    pub fn with_implicit_key(mut self, key: Ident) -> Self {
        self.implicit_key = key;
        self
    }

    /// Pre-size the entry arena for an expected row count.
    #[must_use]
    pub fn with_capacity(mut self, rows: usize) -> Self {
        self.entries = WbtTree::with_capacity(rows);
        self
    }

    // ── Column registration ─────────────────────────────────────────────

    /// Register the next table column, in table order.
    pub fn add_column(&mut self, name: &str, primary_key: bool) -> Result<()> {
        assert!(
            self.sql.is_none(),
            "column {name:?} registered after compile on {}",
            self.table
        );
        self.columns.try_reserve(1)?;
        if primary_key {
            self.primary_key.try_reserve(1)?;
            self.key_positions.try_reserve(1)?;
        }
        let ident = Ident::column(name);
        if primary_key {
            self.primary_key.push(ident.clone());
            self.key_positions.push(self.columns.len());
        }
        self.columns.push(ident);
        Ok(())
    }

    /// Register the next primary-key column. Composite keys take one call per
    /// column, in key order; no calls at all selects the implicit key.
    pub fn add_primary_key_column(&mut self, name: &str) -> Result<()> {
        self.add_column(name, true)
    }

    /// Make the already registered column `name` the next key column, so the
    /// key order can differ from table order.
    pub fn mark_primary_key(&mut self, name: &str) -> Result<()> {
        assert!(
            self.sql.is_none(),
            "key {name:?} marked after compile on {}",
            self.table
        );
        let index = self
            .column_index(name)
            .ok_or_else(|| YasfError::NoSuchColumn {
                name: name.to_owned(),
            })?;
        assert!(
            !self.key_positions.contains(&index),
            "column {name:?} marked as key twice on {}",
            self.table
        );
        self.primary_key.try_reserve(1)?;
        self.key_positions.try_reserve(1)?;
        self.primary_key.push(self.columns[index].clone());
        self.key_positions.push(index);
        Ok(())
    }

    #[must_use]
    pub const fn table(&self) -> &QualifiedName {
        &self.table
    }

    /// Every registered column, in table order.
    #[must_use]
    pub fn columns(&self) -> &[Ident] {
        &self.columns
    }

    /// Registered position of `name`, if it is a column of this table.
    /// Matching ignores ASCII case, as SQLite does.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Whether any primary-key column was registered.
    #[must_use]
    pub fn has_explicit_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// The columns that identify a row: the registered key columns, or the
    /// implicit key alone.
    #[must_use]
    pub fn key_columns(&self) -> &[Ident] {
        if self.primary_key.is_empty() {
            std::slice::from_ref(&self.implicit_key)
        } else {
            &self.primary_key
        }
    }

    /// Number of values in every key tuple.
    #[must_use]
    pub fn key_arity(&self) -> usize {
        self.key_columns().len()
    }

    /// For each explicit key column, its index in [`columns`](Self::columns).
    /// Empty when the implicit key is in use.
    #[must_use]
    pub fn key_positions(&self) -> &[usize] {
        &self.key_positions
    }

    // ── SQL ─────────────────────────────────────────────────────────────

    /// Build the row-addressing statements from the registered columns.
    ///
    /// On error the model has no statements at all and may be dropped.
    pub fn compile(&mut self) -> Result<()> {
        assert!(self.sql.is_none(), "{} compiled twice", self.table);
        let sql = SqlTemplates::build(&self.table, &self.columns, self.key_columns())?;
        debug!(
            table = %self.table,
            columns = self.columns.len(),
            key_columns = sql.key_arity(),
            implicit_key = !self.has_explicit_key(),
            "compiled row identity statements"
        );
        self.sql = Some(sql);
        Ok(())
    }

    #[must_use]
    pub const fn is_compiled(&self) -> bool {
        self.sql.is_some()
    }

    /// The compiled statements.
    ///
    /// # Panics
    ///
    /// Panics if [`compile`](Self::compile) has not succeeded.
    #[must_use]
    pub fn sql(&self) -> &SqlTemplates {
        match &self.sql {
            Some(sql) => sql,
            None => panic!("{} used before compile", self.table),
        }
    }

    // ── Entries ─────────────────────────────────────────────────────────

    /// Number of rows tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a row and return its key slots, all `NULL`, for the caller to
    /// fill. The row becomes the last ordinal.
    pub fn append_entry(&mut self) -> Result<&mut [SqlValue]> {
        let arity = self.require_compiled().key_arity();
        let mut key = Vec::new();
        key.try_reserve_exact(arity)?;
        key.resize(arity, SqlValue::Null);
        let entry = self.push(key)?;
        Ok(entry.key.as_mut_slice())
    }

    /// Append a row with a deep copy of `key` and return its ordinal.
    ///
    /// Nothing is appended if the tuple has the wrong arity or a copy fails.
    pub fn append_key(&mut self, key: &[SqlValue]) -> Result<usize> {
        let arity = self.require_compiled().key_arity();
        if key.len() != arity {
            return Err(YasfError::ArityMismatch {
                what: "primary key",
                expected: arity,
                actual: key.len(),
            });
        }
        let mut owned = Vec::new();
        owned.try_reserve_exact(arity)?;
        for value in key {
            owned.push(value.try_clone()?);
        }
        self.append_owned_key(owned)
    }

    /// Append a row that takes ownership of `key` and return its ordinal.
    ///
    /// After a successful [`reserve_entries`](Self::reserve_entries) this
    /// allocates nothing, so it only fails on a wrong arity.
    pub fn append_owned_key(&mut self, key: Vec<SqlValue>) -> Result<usize> {
        let arity = self.require_compiled().key_arity();
        if key.len() != arity {
            return Err(YasfError::ArityMismatch {
                what: "primary key",
                expected: arity,
                actual: key.len(),
            });
        }
        self.push(key)?;
        Ok(self.entries.len() - 1)
    }

    /// Make room for `additional` more rows up front.
    pub fn reserve_entries(&mut self, additional: usize) -> Result<()> {
        self.entries.try_reserve(additional)?;
        Ok(())
    }

    /// Key tuple of the row at `ordinal`.
    ///
    /// # Panics
    ///
    /// Panics if `ordinal >= self.len()`.
    #[must_use]
    pub fn get_entry(&self, ordinal: usize) -> &[SqlValue] {
        self.entry(ordinal).key()
    }

    /// Mutable key tuple of the row at `ordinal`, for refreshing the snapshot
    /// after a key column was edited.
    pub fn get_entry_mut(&mut self, ordinal: usize) -> &mut [SqlValue] {
        let id = self.entries.select(ordinal);
        &mut self.entries.get_mut(id).key
    }

    /// The full entry at `ordinal`.
    #[must_use]
    pub fn entry(&self, ordinal: usize) -> &Entry {
        self.entries.get(self.entries.select(ordinal))
    }

    /// Remove the row at `ordinal` and return its key. Later rows move up by
    /// one.
    pub fn remove_entry(&mut self, ordinal: usize) -> Vec<SqlValue> {
        let id = self.entries.select(ordinal);
        let entry = self.entries.erase(id);
        trace!(
            table = %self.table,
            ordinal,
            sequence = entry.sequence,
            "removed row identity entry"
        );
        entry.key
    }

    /// Drop every row, keeping columns and statements.
    pub fn clear_entries(&mut self) {
        self.entries.clear();
    }

    /// Entries in ordinal order.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = &Entry> + '_ {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// Structural counters of the underlying tree.
    #[must_use]
    pub const fn stats(&self) -> WbtStats {
        self.entries.stats()
    }

    /// End the editing session, releasing every key snapshot, statement and
    /// column name.
    pub fn destroy(self) {
        debug!(
            table = %self.table,
            rows = self.entries.len(),
            stats = %self.entries.stats(),
            "released row identity model"
        );
    }

    fn require_compiled(&self) -> &SqlTemplates {
        match &self.sql {
            Some(sql) => sql,
            None => panic!("entry added to {} before compile", self.table),
        }
    }

    fn push(&mut self, key: Vec<SqlValue>) -> Result<&mut Entry> {
        let sequence = self.next_sequence;
        debug_assert!(
            self.entries
                .last()
                .is_none_or(|last| self.entries.get(last).sequence < sequence),
            "sequence must grow"
        );
        let id = self.entries.try_append(Entry { sequence, key })?;
        self.next_sequence += 1;
        trace!(
            table = %self.table,
            sequence,
            ordinal = self.entries.len() - 1,
            "appended row identity entry"
        );
        Ok(self.entries.get_mut(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> SqlValue {
        SqlValue::Integer(v)
    }

    /// Composite key `(a, b)` with one data column `c`.
    fn composite() -> DModel {
        let mut model = DModel::new(QualifiedName::new("main", "t"));
        model.add_column("a", true).unwrap();
        model.add_column("b", true).unwrap();
        model.add_column("c", false).unwrap();
        model.compile().unwrap();
        model
    }

    #[test]
    fn composite_key_scenario() {
        let mut model = composite();
        for (a, b) in [(1, 1), (1, 2), (2, 1)] {
            let slots = model.append_entry().unwrap();
            slots[0] = int(a);
            slots[1] = int(b);
        }
        assert_eq!(model.get_entry(1), &[int(1), int(2)]);

        let removed = model.remove_entry(0);
        assert_eq!(removed, vec![int(1), int(1)]);
        assert_eq!(model.get_entry(0), &[int(1), int(2)]);
        assert_eq!(model.get_entry(1), &[int(2), int(1)]);
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn implicit_key_scenario() {
        let mut model = DModel::new(QualifiedName::new("main", "t"));
        model.add_column("c", false).unwrap();
        model.compile().unwrap();

        model.append_entry().unwrap()[0] = int(7);
        assert_eq!(model.get_entry(0), &[int(7)]);
        assert!(!model.has_explicit_key());

        let update = model
            .sql()
            .update_column()
            .render(&Ident::column("c"))
            .unwrap();
        assert_eq!(update.matches("rowid = ?").count(), 1);
        assert!(update.ends_with(" where rowid = ?;"));
    }

    #[test]
    fn where_clause_has_one_conjunct_per_key_column() {
        for k in 1..=5 {
            let mut model = DModel::new(QualifiedName::unqualified("t"));
            let names: Vec<String> = (0..k).map(|i| format!("k{i}")).collect();
            for name in &names {
                model.add_primary_key_column(name).unwrap();
            }
            model.compile().unwrap();

            let delete = model.sql().delete();
            let (_, filter) = delete.split_once(" where ").unwrap();
            let conjuncts: Vec<&str> = filter.trim_end_matches(';').split(" and ").collect();
            let expected: Vec<String> = names.iter().map(|n| format!("\"{n}\" = ?")).collect();
            assert_eq!(conjuncts, expected);
        }
    }

    #[test]
    fn entries_keep_append_order() {
        let mut model = composite();
        for i in 0..50 {
            model.append_key(&[int(i), int(-i)]).unwrap();
        }
        for (ordinal, i) in (0..50).enumerate() {
            assert_eq!(model.get_entry(ordinal), &[int(i), int(-i)]);
        }
        let sequences: Vec<u64> = model.entries().map(Entry::sequence).collect();
        assert_eq!(sequences, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn sequences_are_never_reused() {
        let mut model = composite();
        model.append_key(&[int(1), int(1)]).unwrap();
        model.append_key(&[int(2), int(2)]).unwrap();
        model.remove_entry(1);
        model.append_key(&[int(3), int(3)]).unwrap();
        assert_eq!(model.entry(1).sequence(), 2);
    }

    #[test]
    fn duplicate_and_null_keys_are_tracked_by_position() {
        let mut model = composite();
        model.append_key(&[int(1), int(1)]).unwrap();
        model.append_entry().unwrap();
        model.append_key(&[int(1), int(1)]).unwrap();
        assert_eq!(model.get_entry(1), &[SqlValue::Null, SqlValue::Null]);
        model.remove_entry(0);
        assert_eq!(model.get_entry(1), &[int(1), int(1)]);
    }

    #[test]
    fn append_key_rejects_wrong_arity() {
        let mut model = composite();
        let err = model.append_key(&[int(1)]).unwrap_err();
        assert!(matches!(
            err,
            YasfError::ArityMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
        assert!(model.is_empty());
    }

    #[test]
    fn get_entry_mut_refreshes_snapshot() {
        let mut model = composite();
        model.append_key(&[int(1), int(1)]).unwrap();
        model.get_entry_mut(0)[1] = int(9);
        assert_eq!(model.get_entry(0), &[int(1), int(9)]);
    }

    #[test]
    fn key_positions_follow_table_order() {
        let mut model = DModel::new(QualifiedName::unqualified("t"));
        model.add_column("x", false).unwrap();
        model.add_column("id2", true).unwrap();
        model.add_column("y", false).unwrap();
        model.add_column("id1", true).unwrap();
        assert_eq!(model.key_positions(), &[1, 3]);
        assert_eq!(model.column_index("y"), Some(2));
        assert_eq!(model.column_index("z"), None);
    }

    #[test]
    fn key_order_can_differ_from_table_order() {
        let mut model = DModel::new(QualifiedName::unqualified("t"));
        for name in ["b", "c", "a"] {
            model.add_column(name, false).unwrap();
        }
        model.mark_primary_key("a").unwrap();
        model.mark_primary_key("B").unwrap();
        model.compile().unwrap();
        assert_eq!(model.key_positions(), &[2, 0]);
        assert_eq!(model.sql().select_keys(), r#"select "a", "b" from "t";"#);
        assert_eq!(
            model.sql().delete(),
            r#"delete from "t" where "a" = ? and "b" = ?;"#
        );
    }

    #[test]
    fn marking_unknown_column_fails() {
        let mut model = DModel::new(QualifiedName::unqualified("t"));
        model.add_column("a", false).unwrap();
        let err = model.mark_primary_key("z").unwrap_err();
        assert!(matches!(err, YasfError::NoSuchColumn { name } if name == "z"));
        assert!(!model.has_explicit_key());
    }

    #[test]
    #[should_panic(expected = "marked as key twice")]
    fn marking_twice_panics() {
        let mut model = DModel::new(QualifiedName::unqualified("t"));
        model.add_column("a", true).unwrap();
        let _ = model.mark_primary_key("a");
    }

    #[test]
    fn column_lookup_ignores_case() {
        let model = composite();
        assert_eq!(model.column_index("C"), Some(2));
        assert_eq!(model.column_index("a"), Some(0));
    }

    #[test]
    fn reserved_append_takes_ownership() {
        let mut model = composite();
        model.reserve_entries(1).unwrap();
        let ordinal = model.append_owned_key(vec![int(4), int(2)]).unwrap();
        assert_eq!(ordinal, 0);
        assert_eq!(model.get_entry(0), &[int(4), int(2)]);

        let err = model.append_owned_key(vec![int(4)]).unwrap_err();
        assert!(matches!(err, YasfError::ArityMismatch { .. }));
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn custom_implicit_key() {
        let mut model = DModel::new(QualifiedName::unqualified("t"))
            .with_implicit_key(Ident::implicit_key("oid").unwrap())
            .with_capacity(16);
        model.compile().unwrap();
        assert_eq!(model.sql().select_keys(), r#"select oid from "t";"#);
    }

    #[test]
    fn clear_entries_keeps_statements() {
        let mut model = composite();
        model.append_key(&[int(1), int(1)]).unwrap();
        model.clear_entries();
        assert!(model.is_empty());
        assert!(model.is_compiled());
        model.append_key(&[int(5), int(5)]).unwrap();
        assert_eq!(model.entry(0).sequence(), 1);
    }

    #[test]
    fn destroy_partially_initialised_model() {
        let mut model = DModel::new(QualifiedName::unqualified("t"));
        model.add_column("a", true).unwrap();
        model.destroy();
    }

    #[test]
    #[should_panic(expected = "before compile")]
    fn append_before_compile_panics() {
        let mut model = DModel::new(QualifiedName::unqualified("t"));
        let _ = model.append_entry();
    }

    #[test]
    #[should_panic(expected = "compiled twice")]
    fn compile_twice_panics() {
        let mut model = composite();
        let _ = model.compile();
    }

    #[test]
    #[should_panic(expected = "after compile")]
    fn column_after_compile_panics() {
        let mut model = composite();
        let _ = model.add_column("d", false);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn get_past_end_panics() {
        let model = composite();
        let _ = model.get_entry(0);
    }
}
