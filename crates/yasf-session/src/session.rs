use tracing::{debug, trace, warn};
use yasf_dmodel::DModel;
use yasf_error::{Result, YasfError};
use yasf_types::{Ident, QualifiedName, SqlValue};

use crate::config::SessionConfig;
use crate::editability::{Editability, KeyColumns, TableInfo};
use crate::executor::SqlExecutor;

/// An open grid over one editable table.
///
/// Grid rows are addressed by zero-based ordinal. Ordinals are checked on
/// every call and reported as [`YasfError::OrdinalOutOfRange`], since they
/// come straight from UI events.
#[derive(Debug)]
pub struct EditSession<'c, E: SqlExecutor> {
    executor: &'c E,
    config: SessionConfig,
    keys: KeyColumns,
    /// Table position of an `INTEGER PRIMARY KEY` sole key column.
    rowid_alias: Option<usize>,
    model: DModel,
}

impl<'c, E: SqlExecutor> EditSession<'c, E> {
    /// Classify `info`, build the row index for it and load the keys of every
    /// existing row, in the order the database returns them.
    pub fn open(executor: &'c E, info: &TableInfo, config: SessionConfig) -> Result<Self> {
        let preferred = config.implicit_key()?;
        let keys = match Editability::decide(info, &preferred) {
            Editability::Editable(keys) => keys,
            Editability::NotEditable(reason) => {
                debug!(table = %info.name, %reason, "refused edit session");
                return Err(YasfError::not_editable(
                    info.name.to_string(),
                    reason.to_string(),
                ));
            }
        };

        let mut model = DModel::new(info.name.clone()).with_capacity(config.initial_capacity);
        for column in &info.columns {
            model.add_column(&column.name, false)?;
        }
        match &keys {
            KeyColumns::Explicit(names) => {
                for name in names {
                    model.mark_primary_key(name)?;
                }
            }
            KeyColumns::Implicit(ident) => model = model.with_implicit_key(ident.clone()),
        }
        model.compile()?;
        let rowid_alias = match &keys {
            KeyColumns::Explicit(names) if names.len() == 1 && !info.without_rowid => info
                .columns
                .iter()
                .position(|c| c.is_key() && c.rowid_alias),
            _ => None,
        };

        let mut session = Self {
            executor,
            config,
            keys,
            rowid_alias,
            model,
        };
        session.load()?;
        debug!(
            table = %session.model.table(),
            rows = session.model.len(),
            key_columns = session.model.key_arity(),
            "opened edit session"
        );
        Ok(session)
    }

    #[must_use]
    pub fn table(&self) -> &QualifiedName {
        self.model.table()
    }

    /// How rows of this table are identified. Key tuples returned by
    /// [`key`](Self::key) follow the same column order.
    #[must_use]
    pub const fn key_columns(&self) -> &KeyColumns {
        &self.keys
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The underlying row index.
    #[must_use]
    pub const fn model(&self) -> &DModel {
        &self.model
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.model.len()
    }

    /// Key tuple of the row at `ordinal`.
    pub fn key(&self, ordinal: usize) -> Result<&[SqlValue]> {
        self.check_ordinal(ordinal)?;
        Ok(self.model.get_entry(ordinal))
    }

    /// Every column of the row at `ordinal`, fetched by key.
    pub fn row(&self, ordinal: usize) -> Result<Vec<SqlValue>> {
        let key = self.key(ordinal)?;
        let rows = self.query(self.model.sql().select_row(), key)?;
        rows.into_iter().next().ok_or_else(|| self.vanished())
    }

    /// One cell of the row at `ordinal`.
    pub fn cell(&self, ordinal: usize, column: &str) -> Result<SqlValue> {
        let key = self.key(ordinal)?;
        let ident = self.column(column)?;
        let sql = self.model.sql().select_column().render(&ident)?;
        let rows = self.query(&sql, key)?;
        rows.into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .ok_or_else(|| self.vanished())
    }

    /// Store `value` in one cell of the row at `ordinal`.
    ///
    /// Editing a key column also updates the row's stored key, so the row
    /// stays addressable.
    pub fn update_cell(&mut self, ordinal: usize, column: &str, value: SqlValue) -> Result<()> {
        self.check_ordinal(ordinal)?;
        let ident = self.column(column)?;
        let sql = self.model.sql().update_column().render(&ident)?;

        let key = self.model.get_entry(ordinal);
        let mut params = Vec::new();
        params.try_reserve_exact(key.len() + 1)?;
        params.push(value.try_clone()?);
        for part in key {
            params.push(part.try_clone()?);
        }
        let changed = self.execute(&sql, &params)?;
        self.check_changed(changed, "update")?;

        let index = self.model.column_index(column);
        let slot = self
            .model
            .key_positions()
            .iter()
            .position(|&p| Some(p) == index);
        if let Some(slot) = slot {
            self.model.get_entry_mut(ordinal)[slot] = value;
        }
        Ok(())
    }

    /// Insert a row given one value per registered column, in table order,
    /// and append it to the grid. Returns its ordinal.
    ///
    /// A NULL in an `INTEGER PRIMARY KEY` column takes the rowid SQLite
    /// assigned; any other NULL key value is stored as NULL.
    pub fn insert_row(&mut self, values: &[SqlValue]) -> Result<usize> {
        let expected = self.model.sql().column_count();
        if values.len() != expected {
            return Err(YasfError::ArityMismatch {
                what: "row",
                expected,
                actual: values.len(),
            });
        }

        let mut key = Vec::new();
        key.try_reserve_exact(self.model.key_arity())?;
        if self.model.has_explicit_key() {
            for &p in self.model.key_positions() {
                key.push(values[p].try_clone()?);
            }
        } else {
            key.push(SqlValue::Null);
        }
        self.model.reserve_entries(1)?;

        self.execute(self.model.sql().insert(), values)?;

        let assigned = match self.rowid_alias {
            Some(p) => values[p].is_null(),
            None => !self.model.has_explicit_key(),
        };
        if assigned {
            key[0] = SqlValue::Integer(self.executor.last_insert_rowid());
        }
        let ordinal = self.model.append_owned_key(key)?;
        debug!(table = %self.model.table(), ordinal, "inserted row");
        Ok(ordinal)
    }

    /// Delete the row at `ordinal` from the table and the grid. Later rows
    /// move up by one.
    pub fn delete_row(&mut self, ordinal: usize) -> Result<()> {
        let key = self.key(ordinal)?;
        let changed = self.execute(self.model.sql().delete(), key)?;
        self.check_changed(changed, "delete")?;
        self.model.remove_entry(ordinal);
        debug!(table = %self.model.table(), ordinal, "deleted row");
        Ok(())
    }

    /// Discard every tracked row and load the keys again.
    pub fn reload(&mut self) -> Result<()> {
        self.model.clear_entries();
        self.load()
    }

    /// End the session and release the row index.
    pub fn close(self) {
        debug!(table = %self.model.table(), rows = self.model.len(), "closed edit session");
        self.model.destroy();
    }

    fn load(&mut self) -> Result<()> {
        let rows = self.query(self.model.sql().select_keys(), &[])?;
        for row in &rows {
            self.model.append_key(row)?;
        }
        Ok(())
    }

    fn check_ordinal(&self, ordinal: usize) -> Result<()> {
        let len = self.model.len();
        if ordinal < len {
            Ok(())
        } else {
            Err(YasfError::OrdinalOutOfRange { ordinal, len })
        }
    }

    fn column(&self, name: &str) -> Result<Ident> {
        self.model
            .column_index(name)
            .map(|i| self.model.columns()[i].clone())
            .ok_or_else(|| YasfError::NoSuchColumn {
                name: name.to_owned(),
            })
    }

    fn check_changed(&self, changed: usize, action: &'static str) -> Result<()> {
        if changed == 1 {
            return Ok(());
        }
        warn!(
            table = %self.model.table(),
            action,
            changed,
            "keyed statement touched an unexpected number of rows"
        );
        if !self.config.verify_affected_rows {
            return Ok(());
        }
        Err(if changed == 0 {
            self.vanished()
        } else {
            YasfError::UnexpectedRowCount {
                expected: 1,
                actual: changed,
            }
        })
    }

    fn vanished(&self) -> YasfError {
        YasfError::RowVanished {
            table: self.model.table().to_string(),
        }
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>> {
        trace!(sql, params = params.len(), "query");
        self.executor.query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize> {
        trace!(sql, params = params.len(), "execute");
        self.executor.execute(sql, params)
    }
}
