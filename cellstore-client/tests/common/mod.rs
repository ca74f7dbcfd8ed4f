//! An in-process fake store for behavioral tests.
//!
//! Implements the `Transport`/`RpcChannel` seam with a scriptable in-memory
//! store: tests can seed tables, inject call failures and inspect which
//! hosts were connected and which procedures were dispatched.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use cellstore_client::{Connection, ConnectionConfig, RpcChannel, Transport};
use cellstore_core::protocol::message::{Request, Response};
use cellstore_core::protocol::{Procedure, WireReader, WireWriter};
use cellstore_core::{CellstoreError, FaultCode, Result};

type CellMap = BTreeMap<String, (Vec<u8>, i64)>;

#[derive(Debug, Default)]
struct TableState {
    families: Vec<(String, i32)>,
    rows: BTreeMap<String, CellMap>,
}

#[derive(Debug)]
enum PlannedFailure {
    Disconnect,
    Fault(FaultCode, String),
}

#[derive(Debug, Default)]
struct StoreState {
    tables: BTreeMap<String, TableState>,
    scanners: HashMap<i32, VecDeque<(String, CellMap)>>,
    next_scanner_id: i32,
    clock: i64,
    connects: Vec<String>,
    calls: Vec<String>,
    planned_failures: VecDeque<PlannedFailure>,
}

/// Handle on the fake store; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<StoreState>>,
}

#[allow(dead_code)]
impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an unopened connection backed by this store.
    pub fn connection(&self, hosts: &[&str]) -> Connection {
        let config = ConnectionConfig::builder()
            .hosts(hosts.iter().copied())
            .timeout(Duration::from_millis(500))
            .retry(|r| r.max_retries(2))
            .build();
        Connection::with_transport(config, self.clone())
    }

    /// Hosts passed to `connect`, in order.
    pub fn connects(&self) -> Vec<String> {
        self.state.lock().unwrap().connects.clone()
    }

    /// Wire names of every dispatched call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// How many times the given procedure was dispatched.
    pub fn call_count(&self, procedure: Procedure) -> usize {
        let name = procedure.wire_name();
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|called| called.as_str() == name)
            .count()
    }

    /// Makes the next `count` calls fail like a dropped transport.
    pub fn plan_disconnects(&self, count: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state.planned_failures.push_back(PlannedFailure::Disconnect);
        }
    }

    /// Makes the next call fail with the given application fault.
    pub fn plan_fault(&self, code: FaultCode, message: &str) {
        self.state
            .lock()
            .unwrap()
            .planned_failures
            .push_back(PlannedFailure::Fault(code, message.to_string()));
    }
}

#[async_trait]
impl Transport for FakeStore {
    async fn connect(
        &self,
        host: &str,
        _port: u16,
        _connect_timeout: Duration,
    ) -> Result<Box<dyn RpcChannel>> {
        self.state.lock().unwrap().connects.push(host.to_string());
        Ok(Box::new(FakeChannel {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeChannel {
    state: Arc<Mutex<StoreState>>,
}

#[async_trait]
impl RpcChannel for FakeChannel {
    async fn call(&mut self, request: &Request) -> Result<Response> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(request.procedure.wire_name().to_string());

        if let Some(failure) = state.planned_failures.pop_front() {
            return Err(match failure {
                PlannedFailure::Disconnect => {
                    CellstoreError::Connection("injected disconnect".to_string())
                }
                PlannedFailure::Fault(code, message) => {
                    CellstoreError::Application { code, message }
                }
            });
        }

        handle(&mut state, request)
    }

    async fn close(&mut self) {}
}

fn fault(code: FaultCode, message: impl Into<String>) -> CellstoreError {
    CellstoreError::Application {
        code,
        message: message.into(),
    }
}

fn reply(writer: WireWriter) -> Result<Response> {
    Ok(Response {
        body: writer.into_bytes(),
    })
}

fn empty_reply() -> Result<Response> {
    Ok(Response { body: Bytes::new() })
}

fn family_of(column: &str) -> &str {
    column.split(':').next().unwrap_or(column)
}

fn write_row(writer: &mut WireWriter, id: &str, cells: &CellMap) {
    writer.write_str(id);
    writer.write_i32(cells.len() as i32);
    for (column, (value, created_at)) in cells {
        writer.write_str(column);
        writer.write_bytes(value);
        writer.write_i64(*created_at);
    }
}

fn select_cells(cells: &CellMap, families: &[String]) -> CellMap {
    if families.is_empty() {
        return cells.clone();
    }
    cells
        .iter()
        .filter(|(column, _)| families.iter().any(|f| f == family_of(column)))
        .map(|(column, cell)| (column.clone(), cell.clone()))
        .collect()
}

fn read_families(reader: &mut WireReader<'_>) -> Result<Vec<String>> {
    let count = reader.read_list_len()?;
    let mut families = Vec::with_capacity(count);
    for _ in 0..count {
        families.push(reader.read_str()?);
    }
    Ok(families)
}

fn handle(state: &mut StoreState, request: &Request) -> Result<Response> {
    let mut reader = WireReader::new(&request.body);

    match request.procedure {
        Procedure::ListTables => {
            let mut writer = WireWriter::new();
            writer.write_i32(state.tables.len() as i32);
            for name in state.tables.keys() {
                writer.write_str(name);
            }
            reply(writer)
        }

        Procedure::DescribeColumns => {
            let name = reader.read_str()?;
            let table = state
                .tables
                .get(&name)
                .ok_or_else(|| fault(FaultCode::TableNotFound, name.clone()))?;
            let mut writer = WireWriter::new();
            writer.write_i32(table.families.len() as i32);
            for (family, max_versions) in &table.families {
                writer.write_str(family);
                writer.write_i32(*max_versions);
            }
            reply(writer)
        }

        Procedure::CreateTable => {
            let name = reader.read_str()?;
            if state.tables.contains_key(&name) {
                return Err(fault(FaultCode::IllegalArgument, "table exists"));
            }
            let count = reader.read_list_len()?;
            let mut families = Vec::with_capacity(count);
            for _ in 0..count {
                let family = reader.read_str()?;
                let max_versions = reader.read_i32()?;
                families.push((family, max_versions));
            }
            state.tables.insert(
                name,
                TableState {
                    families,
                    rows: BTreeMap::new(),
                },
            );
            empty_reply()
        }

        Procedure::DisableTable => {
            let name = reader.read_str()?;
            if !state.tables.contains_key(&name) {
                return Err(fault(FaultCode::TableNotFound, name));
            }
            empty_reply()
        }

        Procedure::DeleteTable => {
            let name = reader.read_str()?;
            state
                .tables
                .remove(&name)
                .ok_or_else(|| fault(FaultCode::TableNotFound, name))?;
            empty_reply()
        }

        Procedure::GetCell => {
            let name = reader.read_str()?;
            let id = reader.read_str()?;
            let column = reader.read_str()?;
            let table = state
                .tables
                .get(&name)
                .ok_or_else(|| fault(FaultCode::TableNotFound, name))?;

            let mut writer = WireWriter::new();
            match table.rows.get(&id).and_then(|cells| cells.get(&column)) {
                Some((value, created_at)) => {
                    writer.write_i32(1);
                    writer.write_bytes(value);
                    writer.write_i64(*created_at);
                }
                None => writer.write_i32(0),
            }
            reply(writer)
        }

        Procedure::GetRows => {
            let name = reader.read_str()?;
            let id_count = reader.read_list_len()?;
            let mut ids = Vec::with_capacity(id_count);
            for _ in 0..id_count {
                ids.push(reader.read_str()?);
            }
            let families = read_families(&mut reader)?;
            let table = state
                .tables
                .get(&name)
                .ok_or_else(|| fault(FaultCode::TableNotFound, name))?;

            let found: Vec<(&String, CellMap)> = ids
                .iter()
                .filter_map(|id| {
                    table
                        .rows
                        .get(id)
                        .map(|cells| (id, select_cells(cells, &families)))
                })
                .collect();

            let mut writer = WireWriter::new();
            writer.write_i32(found.len() as i32);
            for (id, cells) in found {
                write_row(&mut writer, id, &cells);
            }
            reply(writer)
        }

        Procedure::MutateRow => {
            let name = reader.read_str()?;
            let id = reader.read_str()?;
            let count = reader.read_list_len()?;
            let mut mutations = Vec::with_capacity(count);
            for _ in 0..count {
                let column = reader.read_str()?;
                let is_delete = reader.read_u8()? == 1;
                let value = reader.read_bytes()?;
                mutations.push((column, is_delete, value));
            }

            let table = state
                .tables
                .get_mut(&name)
                .ok_or_else(|| fault(FaultCode::TableNotFound, name))?;
            state.clock += 1;
            let now = state.clock;
            let cells = table.rows.entry(id.clone()).or_default();
            for (column, is_delete, value) in mutations {
                if is_delete {
                    cells.remove(&column);
                } else {
                    cells.insert(column, (value.to_vec(), now));
                }
            }
            // A row with no cells does not exist.
            if cells.is_empty() {
                table.rows.remove(&id);
            }
            empty_reply()
        }

        Procedure::DeleteRow => {
            let name = reader.read_str()?;
            let id = reader.read_str()?;
            let table = state
                .tables
                .get_mut(&name)
                .ok_or_else(|| fault(FaultCode::TableNotFound, name))?;
            table.rows.remove(&id);
            empty_reply()
        }

        Procedure::ScannerOpen => {
            let name = reader.read_str()?;
            let start_row = reader.read_bytes()?;
            let prefix = reader.read_bytes()?;
            let families = read_families(&mut reader)?;
            let table = state
                .tables
                .get(&name)
                .ok_or_else(|| fault(FaultCode::TableNotFound, name))?;

            let rows: VecDeque<(String, CellMap)> = table
                .rows
                .iter()
                .filter(|(id, _)| {
                    id.as_bytes() >= start_row.as_ref() && id.as_bytes().starts_with(&prefix)
                })
                .map(|(id, cells)| (id.clone(), select_cells(cells, &families)))
                .collect();

            state.next_scanner_id += 1;
            let scanner_id = state.next_scanner_id;
            state.scanners.insert(scanner_id, rows);

            let mut writer = WireWriter::new();
            writer.write_i32(scanner_id);
            reply(writer)
        }

        Procedure::ScannerNext => {
            let scanner_id = reader.read_i32()?;
            let count = reader.read_i32()?.max(0) as usize;
            let rows = state
                .scanners
                .get_mut(&scanner_id)
                .ok_or_else(|| fault(FaultCode::ScannerExpired, format!("scanner {scanner_id}")))?;

            let mut writer = WireWriter::new();
            let take = count.min(rows.len());
            writer.write_i32(take as i32);
            for _ in 0..take {
                let (id, cells) = rows.pop_front().expect("length checked");
                write_row(&mut writer, &id, &cells);
            }
            reply(writer)
        }

        Procedure::ScannerClose => {
            let scanner_id = reader.read_i32()?;
            state.scanners.remove(&scanner_id);
            empty_reply()
        }

        Procedure::AtomicIncrement => {
            let name = reader.read_str()?;
            let id = reader.read_str()?;
            let column = reader.read_str()?;
            let by = reader.read_i64()?;

            let table = state
                .tables
                .get_mut(&name)
                .ok_or_else(|| fault(FaultCode::TableNotFound, name))?;
            state.clock += 1;
            let now = state.clock;
            let cells = table.rows.entry(id).or_default();

            let current = match cells.get(&column) {
                Some((value, _)) if value.len() == 8 => {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(value);
                    i64::from_be_bytes(buf)
                }
                Some(_) => {
                    return Err(fault(
                        FaultCode::IllegalArgument,
                        "cell is not a binary integer",
                    ))
                }
                None => 0,
            };

            let next = current + by;
            cells.insert(column, (next.to_be_bytes().to_vec(), now));

            let mut writer = WireWriter::new();
            writer.write_i64(next);
            reply(writer)
        }
    }
}
