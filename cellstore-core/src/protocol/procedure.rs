//! The remote procedures the client dispatches.

/// Every remote operation the client core needs, by name.
///
/// The wire names are a fixed contract owned by the store. Keeping them in
/// one enum (rather than forwarding arbitrary method names) lets the
/// dispatcher classify calls without string matching: whether an operation
/// invalidates cached metadata is a property of the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    /// List the names of every table in the store.
    ListTables,
    /// Describe the column families of one table.
    DescribeColumns,
    /// Create a table with a set of column families.
    CreateTable,
    /// Disable a table prior to deletion.
    DisableTable,
    /// Delete a disabled table.
    DeleteTable,
    /// Point lookup of a single cell.
    GetCell,
    /// Batch fetch of rows by id.
    GetRows,
    /// Apply a batch of cell mutations to one row.
    MutateRow,
    /// Delete an entire row.
    DeleteRow,
    /// Open a server-side scanner.
    ScannerOpen,
    /// Fetch the next rows from an open scanner.
    ScannerNext,
    /// Close an open scanner.
    ScannerClose,
    /// Server-side atomic increment of a binary integer cell.
    AtomicIncrement,
}

impl Procedure {
    /// All procedures, in a stable order.
    pub const ALL: [Procedure; 13] = [
        Procedure::ListTables,
        Procedure::DescribeColumns,
        Procedure::CreateTable,
        Procedure::DisableTable,
        Procedure::DeleteTable,
        Procedure::GetCell,
        Procedure::GetRows,
        Procedure::MutateRow,
        Procedure::DeleteRow,
        Procedure::ScannerOpen,
        Procedure::ScannerNext,
        Procedure::ScannerClose,
        Procedure::AtomicIncrement,
    ];

    /// The procedure name as it appears on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::ListTables => "getTableNames",
            Self::DescribeColumns => "getColumnDescriptors",
            Self::CreateTable => "createTable",
            Self::DisableTable => "disableTable",
            Self::DeleteTable => "deleteTable",
            Self::GetCell => "get",
            Self::GetRows => "getRowsWithColumns",
            Self::MutateRow => "mutateRow",
            Self::DeleteRow => "deleteAllRow",
            Self::ScannerOpen => "scannerOpen",
            Self::ScannerNext => "scannerGetList",
            Self::ScannerClose => "scannerClose",
            Self::AtomicIncrement => "atomicIncrement",
        }
    }

    /// Resolves a wire name back to a procedure.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.wire_name() == name)
    }

    /// Returns true if dispatching this procedure invalidates the cached
    /// table-name list.
    ///
    /// Exactly the structural mutations qualify. Row-level mutations and
    /// increments never do.
    pub fn invalidates_table_cache(self) -> bool {
        matches!(self, Self::CreateTable | Self::DeleteTable)
    }
}
