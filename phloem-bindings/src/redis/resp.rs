//! RESP2 encoding and reply parsing

use phloem_core::{Error, Result};

/// Longest bulk string accepted, the server's default `proto-max-bulk-len`
pub const MAX_BULK_LENGTH: i64 = 512 * 1024 * 1024;
/// Largest array accepted
pub const MAX_ARRAY_LENGTH: i64 = 1 << 24;

/// A parsed RESP2 reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    /// `None` is the null bulk string (`$-1`)
    Bulk(Option<Vec<u8>>),
    /// `None` is the null array (`*-1`)
    Array(Option<Vec<Reply>>),
}

/// Encode a command as a RESP array of bulk strings
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let payload: usize = args.iter().map(|a| a.len() + 16).sum();
    let mut out = Vec::with_capacity(16 + payload);
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Parse one reply from the front of `data`
///
/// Returns `Ok(None)` when `data` holds an incomplete reply, otherwise the reply
/// and the number of bytes it occupies.
pub fn parse_reply(data: &[u8]) -> Result<Option<(Reply, usize)>> {
    let Some(line_end) = find_crlf(data) else {
        return Ok(None);
    };
    let Some(&marker) = data.first() else {
        return Ok(None);
    };
    let line = &data[1..line_end];
    let header = line_end + 2;

    match marker {
        b'+' => Ok(Some((Reply::Simple(text(line)?), header))),
        b'-' => Ok(Some((Reply::Error(text(line)?), header))),
        b':' => Ok(Some((Reply::Integer(number(line)?), header))),
        b'$' => {
            let length = number(line)?;
            if length < 0 {
                return Ok(Some((Reply::Bulk(None), header)));
            }
            if length > MAX_BULK_LENGTH {
                return Err(Error::Operation(format!("bulk string length {length} out of range")));
            }
            let end = header + length as usize;
            if data.len() < end + 2 {
                return Ok(None);
            }
            if &data[end..end + 2] != b"\r\n" {
                return Err(Error::Operation("bulk string not terminated by CRLF".into()));
            }
            Ok(Some((Reply::Bulk(Some(data[header..end].to_vec())), end + 2)))
        }
        b'*' => {
            let count = number(line)?;
            if count < 0 {
                return Ok(Some((Reply::Array(None), header)));
            }
            if count > MAX_ARRAY_LENGTH {
                return Err(Error::Operation(format!("array length {count} out of range")));
            }
            let mut consumed = header;
            // Every element takes at least 3 bytes
            let mut items = Vec::with_capacity((count as usize).min(data.len() / 3));
            for _ in 0..count {
                match parse_reply(&data[consumed..])? {
                    Some((item, used)) => {
                        items.push(item);
                        consumed += used;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Reply::Array(Some(items)), consumed)))
        }
        other => Err(Error::Operation(format!("invalid RESP type byte 0x{other:02x}"))),
    }
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

fn text(line: &[u8]) -> Result<String> {
    std::str::from_utf8(line)
        .map(str::to_string)
        .map_err(|e| Error::Operation(format!("invalid RESP line: {e}")))
}

fn number(line: &[u8]) -> Result<i64> {
    let raw = text(line)?;
    raw.parse().map_err(|e| Error::Operation(format!("invalid RESP integer '{raw}': {e}")))
}
