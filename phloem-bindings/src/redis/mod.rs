//! Redis adapter (RESP2 over a blocking TCP connection)
//!
//! Each record is stored as a single value under its key, encoded with the
//! configured [`ValueCodec`]. The adapter covers read, insert and update (a
//! read-merge-write of the stored record); delete and scan are reported as
//! NOT_IMPLEMENTED since a flat store keeps no ordered index.
//!
//! Properties:
//! - `redis.host` (required)
//! - `redis.port` (default 6379)
//! - `redis.password` (sends AUTH after connecting)
//! - `redis.timeout_ms` (connect, read and write timeout, default 2000)
//! - `redis.max_value_length` (default 4096; longer encoded values are BAD_REQUEST)
//! - `redis.codec` (`length-prefixed` or `json`, default `length-prefixed`)

pub mod resp;

use phloem_core::codec::{codec_by_name, ValueCodec};
use phloem_core::db::{parse_property, project_fields, required_property};
use phloem_core::{Db, DbFactory, Error, FieldMap, Properties, Result, Status};
use resp::{encode_command, parse_reply, Reply};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, warn};

pub const HOST: &str = "redis.host";
pub const PORT: &str = "redis.port";
pub const PASSWORD: &str = "redis.password";
pub const TIMEOUT_MS: &str = "redis.timeout_ms";
pub const MAX_VALUE_LENGTH: &str = "redis.max_value_length";
pub const CODEC: &str = "redis.codec";

const DEFAULT_PORT: u16 = 6379;
const DEFAULT_TIMEOUT_MS: u64 = 2000;
const DEFAULT_MAX_VALUE_LENGTH: usize = 4096;
const DEFAULT_CODEC: &str = "length-prefixed";

/// Connection settings parsed from backend properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub timeout: Duration,
    pub max_value_length: usize,
    pub codec: String,
}

impl RedisSettings {
    pub fn from_properties(properties: &Properties) -> Result<Self> {
        let host = required_property(properties, HOST)?.trim().to_string();
        let port = parse_property(properties, PORT, DEFAULT_PORT)?;
        let timeout_ms = parse_property(properties, TIMEOUT_MS, DEFAULT_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(Error::Config(format!("{TIMEOUT_MS} must be > 0")));
        }
        let max_value_length =
            parse_property(properties, MAX_VALUE_LENGTH, DEFAULT_MAX_VALUE_LENGTH)?;
        let codec = properties.get(CODEC).map_or(DEFAULT_CODEC, |c| c.trim()).to_string();
        codec_by_name(&codec)?;

        Ok(Self {
            host,
            port,
            password: properties.get(PASSWORD).filter(|p| !p.is_empty()).cloned(),
            timeout: Duration::from_millis(timeout_ms),
            max_value_length,
            codec,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RedisFactory;

impl DbFactory for RedisFactory {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn validate(&self, properties: &Properties) -> Result<()> {
        RedisSettings::from_properties(properties).map(|_| ())
    }

    fn create(&self) -> Result<Box<dyn Db>> {
        Ok(Box::new(RedisDb::new()))
    }
}

/// One connection to a Redis server
pub struct RedisDb {
    settings: Option<RedisSettings>,
    codec: Option<Box<dyn ValueCodec>>,
    stream: Option<TcpStream>,
    buffer: Vec<u8>,
    /// Set while a command awaits its reply; still set on entry means the last one unwound
    in_flight: bool,
}

impl RedisDb {
    pub fn new() -> Self {
        Self {
            settings: None,
            codec: None,
            stream: None,
            buffer: Vec::with_capacity(4096),
            in_flight: false,
        }
    }

    fn connect(&mut self) -> Result<()> {
        let settings = self.settings.as_ref().ok_or_else(not_initialized)?;
        let address = (settings.host.as_str(), settings.port)
            .to_socket_addrs()
            .map_err(|e| {
                Error::Connection(format!(
                    "cannot resolve {}:{}: {e}",
                    settings.host, settings.port
                ))
            })?
            .next()
            .ok_or_else(|| {
                Error::Connection(format!("no address for {}:{}", settings.host, settings.port))
            })?;

        let stream = TcpStream::connect_timeout(&address, settings.timeout)
            .map_err(|e| Error::Connection(format!("cannot connect to {address}: {e}")))?;
        stream.set_read_timeout(Some(settings.timeout))?;
        stream.set_write_timeout(Some(settings.timeout))?;
        stream.set_nodelay(true)?;
        let password = settings.password.clone();

        self.stream = Some(stream);
        self.buffer.clear();
        debug!("Connected to redis at {}", address);

        if let Some(password) = password {
            match self.command(&[b"AUTH".as_slice(), password.as_bytes()])? {
                Reply::Simple(_) => {}
                Reply::Error(msg) => {
                    self.disconnect();
                    return Err(Error::Connection(format!("AUTH rejected: {msg}")));
                }
                other => {
                    self.disconnect();
                    return Err(Error::Connection(format!("unexpected AUTH reply: {other:?}")));
                }
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stream = None;
        self.buffer.clear();
        self.in_flight = false;
    }

    /// Send one command and wait for its reply
    ///
    /// A timeout or an unparsable reply drops the connection so a late or
    /// partial reply cannot be matched with the next command.
    fn command(&mut self, args: &[&[u8]]) -> Result<Reply> {
        if self.in_flight {
            debug!("Previous redis command did not complete, dropping its connection");
            self.disconnect();
        }
        if self.stream.is_none() {
            self.connect()?;
        }
        self.in_flight = true;
        let result = self.round_trip(&encode_command(args));
        self.in_flight = false;
        if let Err(Error::Io(e)) = &result {
            if is_timeout(e) {
                warn!("Redis command timed out, reconnecting on next operation");
                self.disconnect();
                return Err(Error::Operation(format!("timed out: {e}")));
            }
        }
        if result.is_err() {
            self.disconnect();
        }
        result
    }

    fn round_trip(&mut self, request: &[u8]) -> Result<Reply> {
        let stream = self.stream.as_mut().ok_or_else(not_initialized)?;
        stream.write_all(request)?;

        let mut chunk = [0u8; 4096];
        loop {
            if let Some((reply, used)) = parse_reply(&self.buffer)? {
                self.buffer.drain(..used);
                return Ok(reply);
            }
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                return Err(Error::Connection("server closed the connection".into()));
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    fn codec(&self) -> Result<&dyn ValueCodec> {
        self.codec.as_deref().ok_or_else(not_initialized)
    }

    /// GET and decode the whole record stored under `key`
    fn fetch(&mut self, key: &str) -> Result<(Status, FieldMap)> {
        let reply = match self.command(&[b"GET".as_slice(), key.as_bytes()]) {
            Ok(reply) => reply,
            Err(e) => return failure_status(e).map(|status| (status, FieldMap::new())),
        };
        match reply {
            Reply::Bulk(Some(value)) => match self.codec()?.decode(&value) {
                Ok(record) => Ok((Status::Ok, record)),
                Err(e) => {
                    debug!("Undecodable value for {}: {}", key, e);
                    Ok((Status::Error, FieldMap::new()))
                }
            },
            Reply::Bulk(None) => Ok((Status::NotFound, FieldMap::new())),
            Reply::Error(msg) => {
                debug!("GET {} rejected: {}", key, msg);
                Ok((Status::Error, FieldMap::new()))
            }
            other => {
                debug!("Unexpected GET reply: {:?}", other);
                Ok((Status::Error, FieldMap::new()))
            }
        }
    }

    /// Encode `record` and SET it under `key`, replacing any previous value
    fn store(&mut self, key: &str, record: &FieldMap) -> Result<Status> {
        let value = match self.codec()?.encode(record) {
            Ok(value) => value,
            Err(e) => {
                debug!("Cannot encode record {}: {}", key, e);
                return Ok(Status::BadRequest);
            }
        };
        let max = self.settings.as_ref().ok_or_else(not_initialized)?.max_value_length;
        if value.len() > max {
            debug!("Record {} encodes to {} bytes, limit is {}", key, value.len(), max);
            return Ok(Status::BadRequest);
        }

        match self.command(&[b"SET".as_slice(), key.as_bytes(), value.as_slice()]) {
            Ok(Reply::Simple(_)) => Ok(Status::Ok),
            Ok(Reply::Error(msg)) => {
                debug!("SET {} rejected: {}", key, msg);
                Ok(Status::Error)
            }
            Ok(other) => {
                debug!("Unexpected SET reply: {:?}", other);
                Ok(Status::Error)
            }
            Err(e) => failure_status(e),
        }
    }
}

impl Default for RedisDb {
    fn default() -> Self {
        Self::new()
    }
}

fn not_initialized() -> Error {
    Error::Other("redis backend used before init".into())
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Map a command failure to a status, keeping connection loss fatal
fn failure_status(error: Error) -> Result<Status> {
    if error.is_connection() {
        Err(error)
    } else {
        debug!("Redis operation failed: {}", error);
        Ok(Status::Error)
    }
}

impl Db for RedisDb {
    fn init(&mut self, properties: &Properties) -> Result<()> {
        let settings = RedisSettings::from_properties(properties)?;
        self.codec = Some(codec_by_name(&settings.codec)?);
        self.settings = Some(settings);
        self.connect()
    }

    fn cleanup(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(std::net::Shutdown::Both) {
                debug!("Redis shutdown: {}", e);
            }
        }
        self.buffer.clear();
        self.in_flight = false;
        Ok(())
    }

    fn read(
        &mut self,
        _table: &str,
        key: &str,
        fields: Option<&[String]>,
    ) -> Result<(Status, FieldMap)> {
        let (status, record) = self.fetch(key)?;
        Ok((status, project_fields(record, fields)))
    }

    fn insert(&mut self, _table: &str, key: &str, values: &FieldMap) -> Result<Status> {
        self.store(key, values)
    }

    /// Merge `values` into the stored record with GET then SET
    fn update(&mut self, _table: &str, key: &str, values: &FieldMap) -> Result<Status> {
        let (status, mut record) = self.fetch(key)?;
        if status != Status::Ok {
            return Ok(status);
        }
        record.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.store(key, &record)
    }
}
