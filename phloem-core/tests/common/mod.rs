//! Shared mock backend for integration tests

#![allow(dead_code)]

use phloem_core::db::{required_property, Db, DbFactory, FieldMap, Properties, Status};
use phloem_core::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type Store = Arc<Mutex<HashMap<String, FieldMap>>>;

/// How a mock instance misbehaves
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Fault {
    #[default]
    None,
    /// Every read escapes with an operation error
    ReadErrors,
    /// Every read panics
    ReadPanics,
    /// Worker 0's instance loses its connection on the first read
    FirstInstanceDisconnects,
    /// The instance created third fails `init`
    ThirdInitFails,
}

#[derive(Clone, Default)]
pub struct MockFactory {
    pub store: Store,
    pub required: Option<&'static str>,
    pub fault: Fault,
    pub latency: Option<Duration>,
    pub created: Arc<AtomicUsize>,
    pub cleanups: Arc<AtomicUsize>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fault(fault: Fault) -> Self {
        Self { fault, ..Self::default() }
    }

    pub fn requiring(key: &'static str) -> Self {
        Self { required: Some(key), ..Self::default() }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

impl DbFactory for MockFactory {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn validate(&self, properties: &Properties) -> Result<()> {
        if let Some(key) = self.required {
            required_property(properties, key)?;
        }
        Ok(())
    }

    fn create(&self) -> Result<Box<dyn Db>> {
        let index = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDb {
            index,
            store: Arc::clone(&self.store),
            fault: self.fault,
            latency: self.latency,
            cleanups: Arc::clone(&self.cleanups),
        }))
    }
}

pub struct MockDb {
    index: usize,
    store: Store,
    fault: Fault,
    latency: Option<Duration>,
    cleanups: Arc<AtomicUsize>,
}

impl MockDb {
    fn pause(&self) {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
    }
}

impl Db for MockDb {
    fn init(&mut self, _properties: &Properties) -> Result<()> {
        if self.fault == Fault::ThirdInitFails && self.index == 2 {
            return Err(Error::Connection("mock refused connection".into()));
        }
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(
        &mut self,
        _table: &str,
        key: &str,
        fields: Option<&[String]>,
    ) -> Result<(Status, FieldMap)> {
        self.pause();
        match self.fault {
            Fault::ReadErrors => return Err(Error::Operation("mock read failed".into())),
            Fault::ReadPanics => panic!("mock read panicked"),
            Fault::FirstInstanceDisconnects if self.index == 0 => {
                return Err(Error::Connection("mock connection reset".into()))
            }
            _ => {}
        }
        let store = self.store.lock().unwrap();
        match store.get(key) {
            Some(record) => Ok((
                Status::Ok,
                phloem_core::db::project_fields(record.clone(), fields),
            )),
            None => Ok((Status::NotFound, FieldMap::new())),
        }
    }

    fn insert(&mut self, _table: &str, key: &str, values: &FieldMap) -> Result<Status> {
        self.pause();
        let mut store = self.store.lock().unwrap();
        store.entry(key.to_string()).or_default().extend(values.clone());
        Ok(Status::Ok)
    }
}
