//! CRUD, scan and batch access to one named table.

use std::collections::HashSet;

use bytes::Bytes;

use cellstore_core::protocol::message::Request;
use cellstore_core::protocol::{Procedure, WireReader, WireWriter};
use cellstore_core::{CellstoreError, Result};

use crate::connection::Connection;
use crate::retry::RetryPolicy;
use crate::row::Row;
use crate::scan::{self, ScanOptions};

/// Default number of versions kept per cell when creating column families.
const DEFAULT_MAX_VERSIONS: i32 = 3;

/// A named grouping of columns sharing storage and versioning settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFamily {
    name: String,
    max_versions: i32,
}

impl ColumnFamily {
    /// Creates a column family with the default version count.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_versions: DEFAULT_MAX_VERSIONS,
        }
    }

    /// Sets how many cell versions the family keeps.
    pub fn with_max_versions(mut self, max_versions: i32) -> Self {
        self.max_versions = max_versions;
        self
    }

    /// Returns the family name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configured version count.
    pub fn max_versions(&self) -> i32 {
        self.max_versions
    }
}

/// Options for batch id lookups.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    select: Option<Vec<String>>,
    allow_missing: bool,
}

impl FindOptions {
    /// Creates default options: every family, missing ids raise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the fetch to the given column families.
    pub fn select<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(families.into_iter().map(Into::into).collect());
        self
    }

    /// Tolerates partially missing ids instead of raising.
    pub fn allow_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }
}

/// A handle on one named table, bound to a connection.
///
/// The handle borrows the connection mutably, which serializes all access
/// through it: one table operation at a time, like the single session
/// underneath.
#[derive(Debug)]
pub struct Table<'c> {
    conn: &'c mut Connection,
    name: String,
    column_families: Vec<ColumnFamily>,
}

impl<'c> Table<'c> {
    pub(crate) fn new(conn: &'c mut Connection, name: impl Into<String>) -> Self {
        Self {
            conn,
            name: name.into(),
            column_families: Vec::new(),
        }
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the locally-declared column families.
    ///
    /// Populated by [`create`](Table::create) and
    /// [`fetch_column_families`](Table::fetch_column_families); empty for a
    /// freshly loaded handle.
    pub fn column_families(&self) -> &[ColumnFamily] {
        &self.column_families
    }

    /// Declares a column family for the next [`save`](Table::save).
    pub fn add_column_family(&mut self, family: ColumnFamily) {
        self.column_families.push(family);
    }

    /// Checks against the store whether this table exists.
    pub async fn exists(&mut self) -> Result<bool> {
        let names = self.conn.tables().await?;
        Ok(names.iter().any(|name| name == &self.name))
    }

    /// Creates the table with the given column families.
    pub async fn create(&mut self, families: Vec<ColumnFamily>) -> Result<()> {
        let mut writer = WireWriter::new();
        writer.write_str(&self.name);
        writer.write_i32(families.len() as i32);
        for family in &families {
            writer.write_str(family.name());
            writer.write_i32(family.max_versions());
        }

        self.conn
            .invoke(Request::new(Procedure::CreateTable, writer.into_bytes()))
            .await?;
        self.column_families = families;
        Ok(())
    }

    /// Creates the table with the declared families if it does not exist.
    pub async fn save(&mut self) -> Result<()> {
        if self.exists().await? {
            return Ok(());
        }
        let families = self.column_families.clone();
        self.create(families).await
    }

    /// Disables and deletes the table.
    pub async fn destroy(&mut self) -> Result<()> {
        let mut writer = WireWriter::new();
        writer.write_str(&self.name);
        self.conn
            .invoke(Request::new(Procedure::DisableTable, writer.into_bytes()))
            .await?;

        let mut writer = WireWriter::new();
        writer.write_str(&self.name);
        self.conn
            .invoke(Request::new(Procedure::DeleteTable, writer.into_bytes()))
            .await?;
        Ok(())
    }

    /// Fetches the table's column families from the store.
    pub async fn fetch_column_families(&mut self) -> Result<Vec<ColumnFamily>> {
        let mut writer = WireWriter::new();
        writer.write_str(&self.name);

        let response = self
            .conn
            .invoke(Request::new(Procedure::DescribeColumns, writer.into_bytes()))
            .await?;

        let mut reader = WireReader::new(&response.body);
        let count = reader.read_list_len()?;
        let mut families = Vec::with_capacity(count);
        for _ in 0..count {
            let name = reader.read_str()?;
            let max_versions = reader.read_i32()?;
            families.push(ColumnFamily::new(name).with_max_versions(max_versions));
        }

        self.column_families = families.clone();
        Ok(families)
    }

    /// Point lookup of one cell.
    ///
    /// `Ok(None)` means the cell is absent, as opposed to a present cell
    /// holding an empty value.
    pub async fn get(&mut self, id: &str, family: &str, qualifier: &str) -> Result<Option<Bytes>> {
        require_id(id)?;

        let mut writer = WireWriter::new();
        writer.write_str(&self.name);
        writer.write_str(id);
        writer.write_str(&format!("{}:{}", family, qualifier));

        let response = self
            .conn
            .invoke(Request::new(Procedure::GetCell, writer.into_bytes()))
            .await?;

        let mut reader = WireReader::new(&response.body);
        let count = reader.read_list_len()?;
        if count == 0 {
            return Ok(None);
        }
        let value = reader.read_bytes()?;
        let _created_at = reader.read_i64()?;
        Ok(Some(value))
    }

    /// Fetches one row, raising if it is absent.
    pub async fn find(&mut self, id: &str) -> Result<Row> {
        let rows = self.find_many(&[id], FindOptions::new()).await?;
        rows.into_iter().next().ok_or_else(|| {
            CellstoreError::NotFound(format!("row {:?} not found in table {}", id, self.name))
        })
    }

    /// Fetches a set of rows in one batch call.
    ///
    /// Unless [`FindOptions::allow_missing`] was set, any requested id
    /// absent from the store raises a not-found error.
    pub async fn find_many(&mut self, ids: &[&str], options: FindOptions) -> Result<Vec<Row>> {
        for id in ids {
            require_id(id)?;
        }

        let mut writer = WireWriter::new();
        writer.write_str(&self.name);
        writer.write_i32(ids.len() as i32);
        for id in ids {
            writer.write_str(id);
        }
        scan::write_families(&mut writer, options.select.as_deref());

        let response = self
            .conn
            .invoke(Request::new(Procedure::GetRows, writer.into_bytes()))
            .await?;

        let mut reader = WireReader::new(&response.body);
        let row_count = reader.read_list_len()?;
        let mut rows = Vec::with_capacity(row_count);
        for _ in 0..row_count {
            rows.push(Row::read_from(&mut reader)?);
        }

        if !options.allow_missing {
            let found: HashSet<&str> = rows.iter().map(Row::id).collect();
            let missing: Vec<&str> = ids
                .iter()
                .copied()
                .filter(|id| !found.contains(id))
                .collect();
            if !missing.is_empty() {
                return Err(CellstoreError::NotFound(format!(
                    "rows not found in table {}: {}",
                    self.name,
                    missing.join(", ")
                )));
            }
        }

        Ok(rows)
    }

    /// Scans the table and returns every matching row, in key order.
    ///
    /// A missing table degrades to an empty result. Transient connection
    /// faults are retried with the connection's configured backoff.
    pub async fn all(&mut self, options: ScanOptions) -> Result<Vec<Row>> {
        options.validate()?;

        let retry_config = self.conn.config().retry().clone();
        let conn = &mut *self.conn;
        let name = self.name.as_str();

        let mut policy = RetryPolicy::new(retry_config);
        policy
            .run(async || match scan::scan_rows(conn, name, &options).await {
                Err(error) if error.is_table_missing() => Ok(Vec::new()),
                result => result,
            })
            .await
    }

    /// Returns the first matching row, if any.
    pub async fn first(&mut self, options: ScanOptions) -> Result<Option<Row>> {
        let mut options = options;
        options.set_limit(1);
        Ok(self.all(options).await?.into_iter().next())
    }

    /// Scans the table in batches of at most `batch_size` rows, yielding
    /// each batch to the callback.
    ///
    /// Advances by the last row id seen, never yields an empty batch, and
    /// yields zero batches when the table does not exist.
    pub async fn find_in_batches<F>(&mut self, options: ScanOptions, mut each: F) -> Result<()>
    where
        F: FnMut(Vec<Row>),
    {
        options.validate()?;

        let batch_size = options.batch_size_value();
        let mut remaining = options.limit_value();
        let mut scan = options;

        loop {
            let take = match remaining {
                Some(0) => return Ok(()),
                Some(remaining) => remaining.min(batch_size),
                None => batch_size,
            };
            scan.set_limit(take);

            let rows = self.all(scan.clone()).await?;
            if rows.is_empty() {
                return Ok(());
            }

            let fetched = rows.len();
            let last_id = rows.last().map(|row| row.id().to_string());
            each(rows);

            if let Some(remaining) = &mut remaining {
                *remaining -= fetched.min(*remaining);
            }
            if fetched < take {
                return Ok(());
            }
            if let Some(id) = last_id {
                scan.set_offset(id);
            }
        }
    }

    /// Lists the qualified column names of the first row.
    pub async fn column_names(&mut self) -> Result<Vec<String>> {
        let first = self.first(ScanOptions::new()).await?;
        Ok(first
            .map(|row| row.values().into_keys().collect())
            .unwrap_or_default())
    }

    /// Atomically increments a binary integer cell server-side.
    ///
    /// An absent cell behaves as if it previously held zero. Returns the
    /// new value.
    pub async fn atomic_increment(&mut self, id: &str, column: &str, by: i64) -> Result<i64> {
        require_id(id)?;

        let mut writer = WireWriter::new();
        writer.write_str(&self.name);
        writer.write_str(id);
        writer.write_str(column);
        writer.write_i64(by);

        let response = self
            .conn
            .invoke(Request::new(Procedure::AtomicIncrement, writer.into_bytes()))
            .await?;
        WireReader::new(&response.body).read_i64()
    }

    /// Writes every cell of the row in one mutation batch.
    pub async fn save_row(&mut self, row: &Row) -> Result<()> {
        require_id(row.id())?;

        let mut writer = WireWriter::new();
        writer.write_str(&self.name);
        writer.write_str(row.id());
        writer.write_i32(row.cells().len() as i32);
        for (column, cell) in row.cells() {
            writer.write_str(column);
            match cell.value() {
                Some(value) => {
                    writer.write_u8(0);
                    writer.write_bytes(value);
                }
                None => {
                    writer.write_u8(1);
                    writer.write_bytes(&[]);
                }
            }
        }

        self.conn
            .invoke(Request::new(Procedure::MutateRow, writer.into_bytes()))
            .await?;
        Ok(())
    }

    /// Deletes an entire row.
    pub async fn delete_row(&mut self, id: &str) -> Result<()> {
        require_id(id)?;

        let mut writer = WireWriter::new();
        writer.write_str(&self.name);
        writer.write_str(id);

        self.conn
            .invoke(Request::new(Procedure::DeleteRow, writer.into_bytes()))
            .await?;
        Ok(())
    }
}

fn require_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CellstoreError::Argument(
            "row id must not be empty".to_string(),
        ));
    }
    Ok(())
}
