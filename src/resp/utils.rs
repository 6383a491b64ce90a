use std::time::Duration;

use redis_protocol::resp2::encode::encode;
use redis_protocol::resp2::types::{OwnedFrame as RespFrame, Resp2Frame};

use crate::error::{BusError, BusResult};

pub fn extract_string(frame: &RespFrame) -> Result<String, RespFrame> {
    match frame {
        RespFrame::BulkString(data) | RespFrame::SimpleString(data) => {
            Ok(String::from_utf8_lossy(data).to_string())
        }
        _ => Err(RespFrame::Error("ERR invalid string".to_string())),
    }
}

pub fn extract_bytes(frame: &RespFrame) -> Result<Vec<u8>, RespFrame> {
    match frame {
        RespFrame::BulkString(data) | RespFrame::SimpleString(data) => Ok(data.clone()),
        _ => Err(RespFrame::Error("ERR invalid bytes".to_string())),
    }
}

pub fn extract_integer(frame: &RespFrame) -> Result<i64, RespFrame> {
    let invalid = || RespFrame::Error("ERR value is not an integer or out of range".to_string());

    match frame {
        RespFrame::Integer(n) => Ok(*n),
        RespFrame::BulkString(data) => {
            let s = String::from_utf8_lossy(data);
            s.parse::<i64>().map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

/// Blocking-command timeout in seconds. Fractions are accepted and zero
/// means wait forever.
pub fn extract_timeout(frame: &RespFrame) -> Result<Duration, RespFrame> {
    let invalid = || RespFrame::Error("ERR timeout is not a float or out of range".to_string());

    let secs = match frame {
        RespFrame::Integer(n) => *n as f64,
        RespFrame::BulkString(data) | RespFrame::SimpleString(data) => String::from_utf8_lossy(data)
            .parse::<f64>()
            .map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    if !secs.is_finite() {
        return Err(invalid());
    }
    if secs < 0.0 {
        return Err(RespFrame::Error("ERR timeout is negative".to_string()));
    }
    if secs == 0.0 {
        return Ok(Duration::from_secs(u64::MAX));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}

/// Formats a timeout the way blocking commands expect it.
pub fn timeout_arg(timeout: Duration) -> String {
    format!("{:.3}", timeout.as_secs_f64())
}

pub fn bulk(value: impl AsRef<[u8]>) -> RespFrame {
    RespFrame::BulkString(value.as_ref().to_vec())
}

/// Builds a command frame from its parts.
pub fn command(parts: &[&str]) -> RespFrame {
    RespFrame::Array(parts.iter().map(bulk).collect())
}

pub fn encode_frame(frame: &RespFrame) -> BusResult<Vec<u8>> {
    let mut bytes = vec![0u8; frame.encode_len(false)];
    let written = encode(&mut bytes, frame, false)
        .map_err(|e| BusError::Protocol(format!("encode failed: {:?}", e)))?;
    bytes.truncate(written);
    Ok(bytes)
}
