//! Backend that accepts everything
//!
//! Every operation succeeds without storing anything. Useful for measuring the
//! harness itself; `null.latency_us` adds a simulated service time (busy wait).

use phloem_core::db::parse_property;
use phloem_core::timing::busy_wait_ns;
use phloem_core::{Db, DbFactory, FieldMap, Properties, Record, Result, Status};

/// Property holding the simulated service time in microseconds
pub const LATENCY_PROPERTY: &str = "null.latency_us";

#[derive(Debug, Default, Clone, Copy)]
pub struct NullFactory;

impl DbFactory for NullFactory {
    fn name(&self) -> &'static str {
        "null"
    }

    fn validate(&self, properties: &Properties) -> Result<()> {
        parse_property(properties, LATENCY_PROPERTY, 0u64).map(|_| ())
    }

    fn create(&self) -> Result<Box<dyn Db>> {
        Ok(Box::new(NullDb::default()))
    }
}

#[derive(Debug, Default)]
pub struct NullDb {
    latency_ns: u64,
}

impl NullDb {
    fn serve(&self) {
        if self.latency_ns > 0 {
            busy_wait_ns(self.latency_ns);
        }
    }
}

impl Db for NullDb {
    fn init(&mut self, properties: &Properties) -> Result<()> {
        let latency_us: u64 = parse_property(properties, LATENCY_PROPERTY, 0)?;
        self.latency_ns = latency_us.saturating_mul(1_000);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(
        &mut self,
        _table: &str,
        _key: &str,
        _fields: Option<&[String]>,
    ) -> Result<(Status, FieldMap)> {
        self.serve();
        Ok((Status::Ok, FieldMap::new()))
    }

    fn insert(&mut self, _table: &str, _key: &str, _values: &FieldMap) -> Result<Status> {
        self.serve();
        Ok(Status::Ok)
    }

    fn update(&mut self, _table: &str, _key: &str, _values: &FieldMap) -> Result<Status> {
        self.serve();
        Ok(Status::Ok)
    }

    fn delete(&mut self, _table: &str, _key: &str) -> Result<Status> {
        self.serve();
        Ok(Status::Ok)
    }

    fn scan(
        &mut self,
        _table: &str,
        _start_key: &str,
        _count: usize,
        _fields: Option<&[String]>,
    ) -> Result<(Status, Vec<Record>)> {
        self.serve();
        Ok((Status::Ok, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phloem_core::Error;
    use std::time::{Duration, Instant};

    #[test]
    fn test_null_accepts_everything() {
        let mut db = NullFactory.create().unwrap();
        db.init(&Properties::new()).unwrap();

        let values = FieldMap::new();
        assert_eq!(db.insert("t", "k", &values).unwrap(), Status::Ok);
        assert_eq!(db.update("t", "k", &values).unwrap(), Status::Ok);
        assert_eq!(db.read("t", "k", None).unwrap().0, Status::Ok);
        assert_eq!(db.delete("t", "k").unwrap(), Status::Ok);
        assert_eq!(db.scan("t", "k", 5, None).unwrap().0, Status::Ok);
        db.cleanup().unwrap();
        db.cleanup().unwrap();
    }

    #[test]
    fn test_null_latency() {
        let mut props = Properties::new();
        props.insert(LATENCY_PROPERTY.into(), "2000".into());
        let mut db = NullFactory.create().unwrap();
        db.init(&props).unwrap();

        let start = Instant::now();
        db.read("t", "k", None).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn test_null_rejects_bad_latency() {
        let mut props = Properties::new();
        props.insert(LATENCY_PROPERTY.into(), "fast".into());
        assert!(matches!(NullFactory.validate(&props), Err(Error::Config(_))));
    }
}
