//! In-process RESP server for adapter tests
//!
//! Understands AUTH, GET, SET and DEL. A GET for the key `slow` waits before
//! replying, to exercise client timeouts. [`scripted_server`] replays a fixed
//! reply instead, for malformed server output.

#![allow(dead_code)]

use phloem_bindings::redis::resp::{parse_reply, Reply};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const SLOW_KEY: &str = "slow";
pub const SLOW_REPLY_DELAY: Duration = Duration::from_millis(300);

pub struct FakeRedis {
    port: u16,
    data: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
    connections: Arc<AtomicUsize>,
}

impl FakeRedis {
    pub fn start() -> Self {
        Self::start_with_password(None)
    }

    pub fn start_with_password(password: Option<&str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind fake redis");
        let port = listener.local_addr().expect("Failed to get local addr").port();
        let data = Arc::new(Mutex::new(HashMap::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let password = password.map(str::to_string);

        {
            let data = Arc::clone(&data);
            let connections = Arc::clone(&connections);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    connections.fetch_add(1, Ordering::SeqCst);
                    let data = Arc::clone(&data);
                    let password = password.clone();
                    thread::spawn(move || serve(stream, data, password));
                }
            });
        }

        Self { port, data, connections }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn stored(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().unwrap().get(key.as_bytes()).cloned()
    }
}

fn serve(
    mut stream: TcpStream,
    data: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
    password: Option<String>,
) {
    let mut authenticated = password.is_none();
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let (request, used) = match parse_reply(&buffer) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => match stream.read(&mut chunk) {
                Ok(0) | Err(_) => return,
                Ok(n) => {
                    buffer.extend_from_slice(&chunk[..n]);
                    continue;
                }
            },
            Err(_) => return,
        };
        buffer.drain(..used);

        let args: Vec<Vec<u8>> = match request {
            Reply::Array(Some(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Reply::Bulk(Some(bytes)) => Some(bytes),
                    _ => None,
                })
                .collect(),
            _ => return,
        };
        let command = args.first().map(|c| c.to_ascii_uppercase()).unwrap_or_default();

        let reply: Vec<u8> = match (command.as_slice(), authenticated) {
            (b"AUTH", _) => {
                if args.get(1).map(|p| p.as_slice()) == password.as_deref().map(str::as_bytes) {
                    authenticated = true;
                    b"+OK\r\n".to_vec()
                } else {
                    b"-WRONGPASS invalid password\r\n".to_vec()
                }
            }
            (_, false) => b"-NOAUTH Authentication required.\r\n".to_vec(),
            (b"GET", true) => {
                let key = &args[1];
                if key.as_slice() == SLOW_KEY.as_bytes() {
                    thread::sleep(SLOW_REPLY_DELAY);
                }
                match data.lock().unwrap().get(key) {
                    Some(value) => {
                        let mut out = format!("${}\r\n", value.len()).into_bytes();
                        out.extend_from_slice(value);
                        out.extend_from_slice(b"\r\n");
                        out
                    }
                    None => b"$-1\r\n".to_vec(),
                }
            }
            (b"SET", true) => {
                data.lock().unwrap().insert(args[1].clone(), args[2].clone());
                b"+OK\r\n".to_vec()
            }
            (b"DEL", true) => {
                let removed = data.lock().unwrap().remove(&args[1]).is_some();
                format!(":{}\r\n", u8::from(removed)).into_bytes()
            }
            _ => b"-ERR unknown command\r\n".to_vec(),
        };

        if stream.write_all(&reply).is_err() {
            return;
        }
    }
}

/// A server that answers every read from a client with `reply`, returning its port
pub fn scripted_server(reply: &'static [u8]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind scripted server");
    let port = listener.local_addr().expect("Failed to get local addr").port();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            thread::spawn(move || {
                let mut chunk = [0u8; 4096];
                while let Ok(n) = stream.read(&mut chunk) {
                    if n == 0 || stream.write_all(reply).is_err() {
                        return;
                    }
                }
            });
        }
    });
    port
}

/// A port with nothing listening on it
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to port 0");
    let port = listener.local_addr().expect("Failed to get local addr").port();
    drop(listener);
    port
}
