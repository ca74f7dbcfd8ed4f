//! Scan options and the server-side scanner loop.

use cellstore_core::protocol::message::Request;
use cellstore_core::protocol::{Procedure, WireReader, WireWriter};
use cellstore_core::{CellstoreError, Result};

use crate::connection::Connection;
use crate::row::Row;

/// Rows fetched per scanner round trip.
const SCAN_CHUNK: usize = 100;

/// Default rows per batch for [`Table::find_in_batches`](crate::Table::find_in_batches).
pub(crate) const DEFAULT_BATCH_SIZE: usize = 100;

/// Options for scan-based reads.
///
/// `starts_with` keeps only row ids with the given prefix; `offset` begins
/// the scan after the given row id (exclusive). The two compose. SQL-like
/// conditions are not supported and are rejected with an argument error.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    select: Option<Vec<String>>,
    limit: Option<usize>,
    starts_with: Option<String>,
    offset: Option<String>,
    batch_size: Option<usize>,
    conditions: Option<String>,
}

impl ScanOptions {
    /// Creates empty options: full-table scan, every column family.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the scan to the given column families.
    pub fn select<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(families.into_iter().map(Into::into).collect());
        self
    }

    /// Caps the number of rows returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Keeps only rows whose id starts with the given prefix.
    pub fn starts_with(mut self, prefix: impl Into<String>) -> Self {
        self.starts_with = Some(prefix.into());
        self
    }

    /// Begins the scan after the given row id (exclusive).
    pub fn offset(mut self, id: impl Into<String>) -> Self {
        self.offset = Some(id.into());
        self
    }

    /// Sets the rows-per-batch size for batched iteration.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Attaches a SQL-like condition string.
    ///
    /// Conditions are not supported by this client; any scan carrying one
    /// fails with an argument error. The option exists so callers porting
    /// from condition-based stores get a deliberate error instead of a
    /// silently ignored filter.
    pub fn conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }

    pub(crate) fn selected_families(&self) -> Option<&[String]> {
        self.select.as_deref()
    }

    pub(crate) fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub(crate) fn batch_size_value(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1)
    }

    pub(crate) fn set_offset(&mut self, id: String) {
        self.offset = Some(id);
    }

    pub(crate) fn set_limit(&mut self, limit: usize) {
        self.limit = Some(limit);
    }

    /// Rejects option combinations the store cannot serve.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.conditions.is_some() {
            return Err(CellstoreError::Argument(
                "SQL-like conditions are not supported".to_string(),
            ));
        }
        Ok(())
    }

    /// The first row the server should consider.
    ///
    /// The exclusive offset becomes its immediate successor key (the id with
    /// a zero byte appended); when a prefix is also set, the scan starts at
    /// whichever bound is later.
    fn start_row(&self) -> Vec<u8> {
        let offset_start = self.offset.as_ref().map(|id| {
            let mut bytes = id.clone().into_bytes();
            bytes.push(0);
            bytes
        });
        let prefix_start = self.starts_with.as_ref().map(|p| p.clone().into_bytes());

        match (offset_start, prefix_start) {
            (Some(a), Some(b)) => a.max(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => Vec::new(),
        }
    }

    fn prefix(&self) -> &[u8] {
        self.starts_with.as_deref().map(str::as_bytes).unwrap_or(&[])
    }
}

pub(crate) fn write_families(writer: &mut WireWriter, families: Option<&[String]>) {
    match families {
        Some(families) => {
            writer.write_i32(families.len() as i32);
            for family in families {
                writer.write_str(family);
            }
        }
        None => writer.write_i32(0),
    }
}

async fn scanner_open(conn: &mut Connection, table: &str, options: &ScanOptions) -> Result<i32> {
    let mut writer = WireWriter::new();
    writer.write_str(table);
    writer.write_bytes(&options.start_row());
    writer.write_bytes(options.prefix());
    write_families(&mut writer, options.selected_families());

    let response = conn
        .invoke(Request::new(Procedure::ScannerOpen, writer.into_bytes()))
        .await?;
    WireReader::new(&response.body).read_i32()
}

async fn scanner_next(conn: &mut Connection, scanner_id: i32, count: usize) -> Result<Vec<Row>> {
    let mut writer = WireWriter::new();
    writer.write_i32(scanner_id);
    writer.write_i32(count as i32);

    let response = conn
        .invoke(Request::new(Procedure::ScannerNext, writer.into_bytes()))
        .await?;

    let mut reader = WireReader::new(&response.body);
    let row_count = reader.read_list_len()?;
    let mut rows = Vec::with_capacity(row_count);
    for _ in 0..row_count {
        rows.push(Row::read_from(&mut reader)?);
    }
    Ok(rows)
}

async fn scanner_close(conn: &mut Connection, scanner_id: i32) {
    let mut writer = WireWriter::new();
    writer.write_i32(scanner_id);

    if let Err(error) = conn
        .invoke(Request::new(Procedure::ScannerClose, writer.into_bytes()))
        .await
    {
        tracing::debug!(scanner_id, error = %error, "failed to close scanner");
    }
}

/// Runs one complete scan and collects the rows, in key order.
pub(crate) async fn scan_rows(
    conn: &mut Connection,
    table: &str,
    options: &ScanOptions,
) -> Result<Vec<Row>> {
    options.validate()?;

    let scanner_id = scanner_open(conn, table, options).await?;
    let result = fill_rows(conn, scanner_id, options.limit_value()).await;
    scanner_close(conn, scanner_id).await;
    result
}

async fn fill_rows(
    conn: &mut Connection,
    scanner_id: i32,
    limit: Option<usize>,
) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    loop {
        let want = match limit {
            Some(limit) => limit.saturating_sub(rows.len()).min(SCAN_CHUNK),
            None => SCAN_CHUNK,
        };
        if want == 0 {
            return Ok(rows);
        }

        let batch = scanner_next(conn, scanner_id, want).await?;
        if batch.is_empty() {
            return Ok(rows);
        }
        rows.extend(batch);
    }
}
