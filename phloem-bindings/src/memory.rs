//! In-process ordered store
//!
//! All instances created by one [`MemoryFactory`] share the same tables, so a
//! load phase and a run phase driven through the same factory see each other's
//! records. Supports every operation, including ordered scans.

use phloem_core::db::project_fields;
use phloem_core::{Db, DbFactory, Error, FieldMap, Properties, Record, Result, Status};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

type Table = BTreeMap<String, FieldMap>;
type Tables = Arc<RwLock<BTreeMap<String, Table>>>;

#[derive(Debug, Default, Clone)]
pub struct MemoryFactory {
    tables: Tables,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records currently stored in `table`
    pub fn len(&self, table: &str) -> usize {
        self.tables
            .read()
            .map(|tables| tables.get(table).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

impl DbFactory for MemoryFactory {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn create(&self) -> Result<Box<dyn Db>> {
        Ok(Box::new(MemoryDb { tables: Arc::clone(&self.tables) }))
    }
}

pub struct MemoryDb {
    tables: Tables,
}

fn poisoned() -> Error {
    Error::Operation("memory store lock poisoned".into())
}

impl Db for MemoryDb {
    fn init(&mut self, _properties: &Properties) -> Result<()> {
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(
        &mut self,
        table: &str,
        key: &str,
        fields: Option<&[String]>,
    ) -> Result<(Status, FieldMap)> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        match tables.get(table).and_then(|t| t.get(key)) {
            Some(record) => Ok((Status::Ok, project_fields(record.clone(), fields))),
            None => Ok((Status::NotFound, FieldMap::new())),
        }
    }

    fn insert(&mut self, table: &str, key: &str, values: &FieldMap) -> Result<Status> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        tables.entry(table.to_string()).or_default().insert(key.to_string(), values.clone());
        Ok(Status::Ok)
    }

    /// Merge `values` into an existing record
    fn update(&mut self, table: &str, key: &str, values: &FieldMap) -> Result<Status> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        match tables.get_mut(table).and_then(|t| t.get_mut(key)) {
            Some(record) => {
                record.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
                Ok(Status::Ok)
            }
            None => Ok(Status::NotFound),
        }
    }

    fn delete(&mut self, table: &str, key: &str) -> Result<Status> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        match tables.get_mut(table).and_then(|t| t.remove(key)) {
            Some(_) => Ok(Status::Ok),
            None => Ok(Status::NotFound),
        }
    }

    fn scan(
        &mut self,
        table: &str,
        start_key: &str,
        count: usize,
        fields: Option<&[String]>,
    ) -> Result<(Status, Vec<Record>)> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let Some(rows) = tables.get(table) else {
            return Ok((Status::Ok, Vec::new()));
        };
        let records = rows
            .range::<str, _>((Bound::Included(start_key), Bound::Unbounded))
            .take(count)
            .map(|(key, record)| Record {
                key: key.clone(),
                fields: project_fields(record.clone(), fields),
            })
            .collect();
        Ok((Status::Ok, records))
    }
}
