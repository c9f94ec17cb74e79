//! Structured construction of the per-table SQL statements.
//!
//! Statements are assembled from typed pieces (static keywords, [`Ident`]s,
//! [`QualifiedName`]s and placeholder runs) so that the quoting of every name is
//! decided by its type rather than by its position in a format string. Every
//! append reserves its bytes fallibly and reports [`YasfError::OutOfMemory`].

use std::fmt::Write as _;

use yasf_error::{Result, YasfError};
use yasf_types::{Ident, QualifiedName};

/// Append-only SQL text buffer with fallible growth.
#[derive(Debug, Default)]
pub struct SqlBuilder {
    buf: String,
}

impl SqlBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: String::new() }
    }

    /// Static SQL text: keywords, punctuation, operators.
    pub fn keyword(&mut self, text: &'static str) -> Result<&mut Self> {
        self.push_str(text)?;
        Ok(self)
    }

    /// A single identifier, quoted according to its kind.
    pub fn ident(&mut self, ident: &Ident) -> Result<&mut Self> {
        self.buf.try_reserve(ident.rendered_len())?;
        write!(self.buf, "{ident}").map_err(|e| YasfError::internal(e.to_string()))?;
        Ok(self)
    }

    /// A table reference.
    pub fn table(&mut self, name: &QualifiedName) -> Result<&mut Self> {
        self.buf.try_reserve(name.rendered_len())?;
        write!(self.buf, "{name}").map_err(|e| YasfError::internal(e.to_string()))?;
        Ok(self)
    }

    /// `a, b, c`
    pub fn ident_list(&mut self, idents: &[Ident]) -> Result<&mut Self> {
        for (i, ident) in idents.iter().enumerate() {
            if i > 0 {
                self.keyword(", ")?;
            }
            self.ident(ident)?;
        }
        Ok(self)
    }

    /// `?, ?, ?`
    pub fn placeholders(&mut self, count: usize) -> Result<&mut Self> {
        for i in 0..count {
            self.keyword(if i == 0 { "?" } else { ", ?" })?;
        }
        Ok(self)
    }

    /// ` where a = ? and b = ?`, one conjunct per key column in order.
    pub fn key_filter(&mut self, keys: &[Ident]) -> Result<&mut Self> {
        for (i, key) in keys.iter().enumerate() {
            self.keyword(if i == 0 { " where " } else { " and " })?;
            self.ident(key)?;
            self.keyword(" = ?")?;
        }
        Ok(self)
    }

    /// Previously built text, such as a shared `where` clause.
    pub fn fragment(&mut self, text: &str) -> Result<&mut Self> {
        self.push_str(text)?;
        Ok(self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.buf
    }

    fn push_str(&mut self, text: &str) -> Result<()> {
        self.buf.try_reserve(text.len())?;
        self.buf.push_str(text);
        Ok(())
    }
}

/// A statement with a hole for one column name, filled at use time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTemplate {
    head: String,
    tail: String,
}

impl ColumnTemplate {
    /// Statement text with `column` in the hole.
    pub fn render(&self, column: &Ident) -> Result<String> {
        let mut sql = SqlBuilder::new();
        sql.fragment(&self.head)?.ident(column)?.fragment(&self.tail)?;
        Ok(sql.finish())
    }

    #[must_use]
    pub fn head(&self) -> &str {
        &self.head
    }

    #[must_use]
    pub fn tail(&self) -> &str {
        &self.tail
    }
}

/// The statements an editing session needs to address single rows by key.
///
/// Key parameters always bind in key-column order and come last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplates {
    select_row: String,
    select_keys: String,
    insert: String,
    delete: String,
    select_column: ColumnTemplate,
    update_column: ColumnTemplate,
    key_arity: usize,
    column_count: usize,
}

impl SqlTemplates {
    /// Build every statement for `table`. Nothing is returned unless all of
    /// them were built.
    pub fn build(table: &QualifiedName, columns: &[Ident], keys: &[Ident]) -> Result<Self> {
        let mut filter = SqlBuilder::new();
        filter.key_filter(keys)?.keyword(";")?;
        let filter = filter.finish();

        let mut select_keys = SqlBuilder::new();
        select_keys
            .keyword("select ")?
            .ident_list(keys)?
            .keyword(" from ")?
            .table(table)?
            .keyword(";")?;

        let mut select_row = SqlBuilder::new();
        select_row
            .keyword("select * from ")?
            .table(table)?
            .fragment(&filter)?;

        let mut insert = SqlBuilder::new();
        insert.keyword("insert into ")?.table(table)?;
        if columns.is_empty() {
            insert.keyword(" default values;")?;
        } else {
            insert
                .keyword(" (")?
                .ident_list(columns)?
                .keyword(") values (")?
                .placeholders(columns.len())?
                .keyword(");")?;
        }

        let mut delete = SqlBuilder::new();
        delete
            .keyword("delete from ")?
            .table(table)?
            .fragment(&filter)?;

        let mut select_tail = SqlBuilder::new();
        select_tail
            .keyword(" from ")?
            .table(table)?
            .fragment(&filter)?;

        let mut update_head = SqlBuilder::new();
        update_head
            .keyword("update ")?
            .table(table)?
            .keyword(" set ")?;
        let mut update_tail = SqlBuilder::new();
        update_tail.keyword(" = ?")?.fragment(&filter)?;

        let mut select_head = SqlBuilder::new();
        select_head.keyword("select ")?;

        Ok(Self {
            select_row: select_row.finish(),
            select_keys: select_keys.finish(),
            insert: insert.finish(),
            delete: delete.finish(),
            select_column: ColumnTemplate {
                head: select_head.finish(),
                tail: select_tail.finish(),
            },
            update_column: ColumnTemplate {
                head: update_head.finish(),
                tail: update_tail.finish(),
            },
            key_arity: keys.len(),
            column_count: columns.len(),
        })
    }

    /// `select * from T where k1 = ? and ...;`
    #[must_use]
    pub fn select_row(&self) -> &str {
        &self.select_row
    }

    /// `select k1, ... from T;`
    #[must_use]
    pub fn select_keys(&self) -> &str {
        &self.select_keys
    }

    /// `insert into T (c1, ...) values (?, ...);`
    #[must_use]
    pub fn insert(&self) -> &str {
        &self.insert
    }

    /// `delete from T where k1 = ? and ...;`
    #[must_use]
    pub fn delete(&self) -> &str {
        &self.delete
    }

    /// `select <column> from T where k1 = ? and ...;`
    #[must_use]
    pub const fn select_column(&self) -> &ColumnTemplate {
        &self.select_column
    }

    /// `update T set <column> = ? where k1 = ? and ...;`
    #[must_use]
    pub const fn update_column(&self) -> &ColumnTemplate {
        &self.update_column
    }

    /// Number of key parameters each keyed statement expects.
    #[must_use]
    pub const fn key_arity(&self) -> usize {
        self.key_arity
    }

    /// Number of parameters the insert statement expects.
    #[must_use]
    pub const fn column_count(&self) -> usize {
        self.column_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composite() -> SqlTemplates {
        SqlTemplates::build(
            &QualifiedName::new("main", "tbl1"),
            &[
                Ident::column("key1"),
                Ident::column("key2"),
                Ident::column("value1"),
                Ident::column("value2"),
            ],
            &[Ident::column("key1"), Ident::column("key2")],
        )
        .unwrap()
    }

    #[test]
    fn composite_key_statements() {
        let sql = composite();
        assert_eq!(
            sql.select_keys(),
            r#"select "key1", "key2" from "main"."tbl1";"#
        );
        assert_eq!(
            sql.select_row(),
            r#"select * from "main"."tbl1" where "key1" = ? and "key2" = ?;"#
        );
        assert_eq!(
            sql.insert(),
            r#"insert into "main"."tbl1" ("key1", "key2", "value1", "value2") values (?, ?, ?, ?);"#
        );
        assert_eq!(
            sql.delete(),
            r#"delete from "main"."tbl1" where "key1" = ? and "key2" = ?;"#
        );
        assert_eq!(sql.key_arity(), 2);
        assert_eq!(sql.column_count(), 4);
    }

    #[test]
    fn column_templates_fill_the_hole() {
        let sql = composite();
        let value1 = Ident::column("value1");
        assert_eq!(
            sql.select_column().render(&value1).unwrap(),
            r#"select "value1" from "main"."tbl1" where "key1" = ? and "key2" = ?;"#
        );
        assert_eq!(
            sql.update_column().render(&value1).unwrap(),
            r#"update "main"."tbl1" set "value1" = ? where "key1" = ? and "key2" = ?;"#
        );
    }

    #[test]
    fn implicit_key_is_unquoted() {
        let sql = SqlTemplates::build(
            &QualifiedName::new("main", "t"),
            &[Ident::column("c")],
            &[Ident::rowid()],
        )
        .unwrap();
        assert_eq!(sql.select_keys(), r#"select rowid from "main"."t";"#);
        assert_eq!(
            sql.update_column().render(&Ident::column("c")).unwrap(),
            r#"update "main"."t" set "c" = ? where rowid = ?;"#
        );
    }

    #[test]
    fn no_columns_inserts_defaults() {
        let sql =
            SqlTemplates::build(&QualifiedName::unqualified("t"), &[], &[Ident::rowid()]).unwrap();
        assert_eq!(sql.insert(), r#"insert into "t" default values;"#);
    }

    #[test]
    fn hostile_names_stay_quoted() {
        let sql = SqlTemplates::build(
            &QualifiedName::new("main", r#"we"ird"#),
            &[Ident::column("a; drop table x")],
            &[Ident::column(r#"k"k"#)],
        )
        .unwrap();
        assert_eq!(
            sql.delete(),
            r#"delete from "main"."we""ird" where "k""k" = ?;"#
        );
        assert_eq!(
            sql.insert(),
            r#"insert into "main"."we""ird" ("a; drop table x") values (?);"#
        );
    }

    #[test]
    fn builder_chains() {
        let mut b = SqlBuilder::new();
        b.keyword("select ")
            .unwrap()
            .placeholders(3)
            .unwrap()
            .key_filter(&[Ident::column("a")])
            .unwrap();
        assert_eq!(b.as_str(), r#"select ?, ?, ? where "a" = ?"#);
    }
}
