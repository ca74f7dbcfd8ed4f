//! Row and cell value objects.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use bytes::Bytes;

use cellstore_core::protocol::WireReader;
use cellstore_core::Result;

use crate::table::Table;

/// One cell: the raw value and the server-assigned write timestamp.
///
/// A cell whose value is `None` is a pending delete: saving the row turns
/// it into a delete mutation for that column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    value: Option<Bytes>,
    created_at: Option<i64>,
}

impl Cell {
    /// Creates a cell holding a value to be written.
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: Some(value.into()),
            created_at: None,
        }
    }

    /// Creates a pending delete for the cell's column.
    pub fn deleted() -> Self {
        Self {
            value: None,
            created_at: None,
        }
    }

    pub(crate) fn stored(value: Bytes, created_at: i64) -> Self {
        Self {
            value: Some(value),
            created_at: Some(created_at),
        }
    }

    /// Returns the raw cell value, or `None` for a pending delete.
    pub fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }

    /// Returns the write timestamp in milliseconds, when known.
    pub fn created_at(&self) -> Option<i64> {
        self.created_at
    }
}

/// A transient row value object: an id and its cells.
///
/// Values are exposed as a flat mapping from `"family:qualifier"` to raw
/// bytes; decoding typed values is the codec's job
/// (see [`cellstore_core::codec`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    id: String,
    cells: BTreeMap<String, Cell>,
}

impl Row {
    /// Creates an empty row with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Returns the row id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sets a cell value.
    pub fn insert(&mut self, family: &str, qualifier: &str, value: impl Into<Bytes>) {
        self.cells
            .insert(format!("{}:{}", family, qualifier), Cell::new(value));
    }

    /// Marks a cell for deletion on the next save.
    pub fn clear_cell(&mut self, family: &str, qualifier: &str) {
        self.cells
            .insert(format!("{}:{}", family, qualifier), Cell::deleted());
    }

    /// Merges a set of qualifier/value pairs into one column family.
    ///
    /// A `None` value marks the cell for deletion.
    pub fn update_columns<I, Q, V>(&mut self, family: &str, columns: I)
    where
        I: IntoIterator<Item = (Q, Option<V>)>,
        Q: AsRef<str>,
        V: Into<Bytes>,
    {
        for (qualifier, value) in columns {
            match value {
                Some(value) => self.insert(family, qualifier.as_ref(), value),
                None => self.clear_cell(family, qualifier.as_ref()),
            }
        }
    }

    /// Returns the cell at `"family:qualifier"`, if present.
    pub fn cell(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// Returns the raw value at `"family:qualifier"`, skipping pending
    /// deletes.
    pub fn value(&self, column: &str) -> Option<&Bytes> {
        self.cells.get(column).and_then(Cell::value)
    }

    /// Returns the flat `"family:qualifier"` → value mapping.
    pub fn values(&self) -> BTreeMap<String, Bytes> {
        self.cells
            .iter()
            .filter_map(|(column, cell)| Some((column.clone(), cell.value()?.clone())))
            .collect()
    }

    /// Returns the distinct column families present in this row, sorted.
    pub fn families(&self) -> Vec<String> {
        let mut families: Vec<String> = self
            .cells
            .keys()
            .filter_map(|column| column.split(':').next())
            .map(str::to_string)
            .collect();
        families.dedup();
        families
    }

    /// Returns true if the row holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// When the row was last written: the maximum cell timestamp.
    ///
    /// `None` for a row with no stored cells.
    pub fn updated_at(&self) -> Option<SystemTime> {
        self.cells
            .values()
            .filter_map(Cell::created_at)
            .max()
            .map(|millis| SystemTime::UNIX_EPOCH + Duration::from_millis(millis as u64))
    }

    /// Persists every cell of this row in one mutation batch.
    pub async fn save(&self, table: &mut Table<'_>) -> Result<()> {
        table.save_row(self).await
    }

    /// Deletes this row from the store.
    pub async fn destroy(&self, table: &mut Table<'_>) -> Result<()> {
        table.delete_row(&self.id).await
    }

    pub(crate) fn cells(&self) -> &BTreeMap<String, Cell> {
        &self.cells
    }

    /// Decodes one row from the wire: id, then `(column, value, timestamp)`
    /// triples.
    pub(crate) fn read_from(reader: &mut WireReader<'_>) -> Result<Row> {
        let id = reader.read_str()?;
        let mut row = Row::new(id);
        let cell_count = reader.read_list_len()?;
        for _ in 0..cell_count {
            let column = reader.read_str()?;
            let value = reader.read_bytes()?;
            let created_at = reader.read_i64()?;
            row.cells.insert(column, Cell::stored(value, created_at));
        }
        Ok(row)
    }
}
