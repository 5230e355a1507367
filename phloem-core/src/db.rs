//! Backend capability contract
//!
//! Every backend adapter implements [`Db`]. The executor creates one instance per
//! worker thread through a [`DbFactory`], so implementations never need to be
//! shareable across threads; they only need to be `Send` to move into the worker.
//!
//! Backends with partial capability sets are expected: `delete` and `scan` default
//! to [`Status::NotImplemented`], and `update` defaults to an overwriting `insert`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Field name to value mapping for one record
///
/// Ordered so that encodings are deterministic; the order carries no meaning.
pub type FieldMap = BTreeMap<String, Vec<u8>>;

/// Opaque backend connection parameters (host, port, credentials, ...)
pub type Properties = BTreeMap<String, String>;

/// A record returned by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub fields: FieldMap,
}

/// Outcome of dispatching one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    NotFound,
    Error,
    NotImplemented,
    BadRequest,
}

impl Status {
    /// All statuses, in report order
    pub const ALL: [Status; 5] = [
        Status::Ok,
        Status::NotFound,
        Status::Error,
        Status::NotImplemented,
        Status::BadRequest,
    ];

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// Whether this outcome counts against the backend in summaries
    ///
    /// `NotImplemented` is a capability gap and `NotFound` is a legitimate answer;
    /// neither is a failure.
    pub fn is_failure(self) -> bool {
        matches!(self, Status::Error | Status::BadRequest)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "NOT_FOUND",
            Status::Error => "ERROR",
            Status::NotImplemented => "NOT_IMPLEMENTED",
            Status::BadRequest => "BAD_REQUEST",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value backend driven by one worker thread
///
/// Operation methods return `Ok(status)` for every outcome the backend can
/// classify, including misses and protocol-level rejections. `Err` is reserved for
/// failures that escape status reporting: the executor records them as
/// [`Status::Error`], and an [`Error::Connection`] additionally ends the worker.
/// No method may block indefinitely; network backends apply their own timeouts.
pub trait Db: Send {
    /// Connect using the given properties
    ///
    /// Fails with [`Error::Config`] when a required parameter is missing or
    /// malformed and with [`Error::Connection`] when the backend is unreachable.
    fn init(&mut self, properties: &Properties) -> Result<()>;

    /// Release all connections
    ///
    /// Must be idempotent and must succeed after a failed `init`.
    fn cleanup(&mut self) -> Result<()>;

    /// Read a record, optionally restricted to `fields`
    fn read(&mut self, table: &str, key: &str, fields: Option<&[String]>)
        -> Result<(Status, FieldMap)>;

    /// Insert a record; concurrent calls with distinct keys must be safe
    fn insert(&mut self, table: &str, key: &str, values: &FieldMap) -> Result<Status>;

    /// Update a record
    ///
    /// Defaults to an overwriting insert for backends without a distinct update
    /// primitive.
    fn update(&mut self, table: &str, key: &str, values: &FieldMap) -> Result<Status> {
        self.insert(table, key, values)
    }

    /// Delete a record
    fn delete(&mut self, _table: &str, _key: &str) -> Result<Status> {
        Ok(Status::NotImplemented)
    }

    /// Read up to `count` records starting at `start_key` in the backend's key order
    fn scan(
        &mut self,
        _table: &str,
        _start_key: &str,
        _count: usize,
        _fields: Option<&[String]>,
    ) -> Result<(Status, Vec<Record>)> {
        Ok((Status::NotImplemented, Vec::new()))
    }
}

/// Creates backend instances, one per worker
pub trait DbFactory: Send + Sync {
    /// Backend name used in configuration (e.g. "redis")
    fn name(&self) -> &'static str;

    /// Check connection parameters without connecting
    fn validate(&self, _properties: &Properties) -> Result<()> {
        Ok(())
    }

    /// Create an uninitialised backend instance
    fn create(&self) -> Result<Box<dyn Db>>;
}

/// Look up a required property
pub fn required_property<'a>(properties: &'a Properties, key: &str) -> Result<&'a str> {
    match properties.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.as_str()),
        _ => Err(Error::Config(format!("missing required property '{key}'"))),
    }
}

/// Parse an optional property, falling back to `default` when absent
pub fn parse_property<T>(properties: &Properties, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match properties.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("invalid value '{raw}' for '{key}': {e}"))),
    }
}

/// Keep only the requested fields of a record
pub fn project_fields(mut record: FieldMap, fields: Option<&[String]>) -> FieldMap {
    if let Some(wanted) = fields {
        record.retain(|name, _| wanted.iter().any(|w| w == name));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PutOnly {
        puts: usize,
    }

    impl Db for PutOnly {
        fn init(&mut self, _properties: &Properties) -> Result<()> {
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
            Ok((Status::NotFound, FieldMap::new()))
        }

        fn insert(&mut self, _table: &str, _key: &str, _values: &FieldMap) -> Result<Status> {
            self.puts += 1;
            Ok(Status::Ok)
        }
    }

    #[test]
    fn test_default_capabilities() {
        let mut db = PutOnly { puts: 0 };
        let values = FieldMap::new();

        assert_eq!(db.update("t", "k", &values).unwrap(), Status::Ok);
        assert_eq!(db.puts, 1, "update should fall back to insert");
        assert_eq!(db.delete("t", "k").unwrap(), Status::NotImplemented);

        let (status, records) = db.scan("t", "k", 10, None).unwrap();
        assert_eq!(status, Status::NotImplemented);
        assert!(records.is_empty());
    }

    #[test]
    fn test_status_classification() {
        assert!(Status::Ok.is_ok());
        assert!(Status::Error.is_failure());
        assert!(Status::BadRequest.is_failure());
        assert!(!Status::NotImplemented.is_failure());
        assert!(!Status::NotFound.is_failure());
        assert_eq!(Status::NotImplemented.to_string(), "NOT_IMPLEMENTED");
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&Status::NotFound).unwrap();
        assert_eq!(json, "\"NOT_FOUND\"");
    }

    #[test]
    fn test_required_property() {
        let mut props = Properties::new();
        props.insert("redis.host".into(), "localhost".into());
        props.insert("redis.password".into(), "  ".into());

        assert_eq!(required_property(&props, "redis.host").unwrap(), "localhost");
        assert!(matches!(required_property(&props, "redis.port"), Err(Error::Config(_))));
        assert!(matches!(required_property(&props, "redis.password"), Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_property() {
        let mut props = Properties::new();
        props.insert("port".into(), "6380".into());
        props.insert("timeout".into(), "soon".into());

        assert_eq!(parse_property(&props, "port", 6379u16).unwrap(), 6380);
        assert_eq!(parse_property(&props, "missing", 7u32).unwrap(), 7);
        assert!(matches!(parse_property(&props, "timeout", 1u64), Err(Error::Config(_))));
    }

    #[test]
    fn test_project_fields() {
        let mut record = FieldMap::new();
        record.insert("field0".into(), b"a".to_vec());
        record.insert("field1".into(), b"b".to_vec());

        let all = project_fields(record.clone(), None);
        assert_eq!(all.len(), 2);

        let wanted = vec!["field1".to_string()];
        let some = project_fields(record, Some(&wanted));
        assert_eq!(some.len(), 1);
        assert_eq!(some["field1"], b"b");
    }
}
