//! Client helper for talking to the tabrank daemon.
//!
//! The daemon owns the session. Failures are surfaced to the caller; there is
//! no local fallback.

use chrono::Utc;
use rand::RngCore;
use serde_json::Value;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;
use tabrank_daemon_protocol::{
    EventEnvelope, Method, Request, Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};

pub(crate) const SOCKET_ENV: &str = "TABRANK_DAEMON_SOCKET";
const SOCKET_NAME: &str = "daemon.sock";
const READ_TIMEOUT_MS: u64 = 600;
const WRITE_TIMEOUT_MS: u64 = 600;
const RETRY_DELAY_MS: u64 = 50;

/// Sends an event, retrying once with the same event id.
///
/// Returns the daemon's response payload.
pub fn send_event_with_retry<F>(mut build: F, label: &str) -> Result<Value, String>
where
    F: FnMut() -> EventEnvelope,
{
    match send_event(build()) {
        Ok(data) => Ok(data),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to send {} to daemon", label);
            std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
            send_event(build()).map_err(|retry_err| {
                tracing::warn!(
                    error = %retry_err,
                    "Retry failed sending {} to daemon",
                    label
                );
                retry_err
            })
        }
    }
}

/// Issues a query method and returns its payload.
pub fn query(method: Method, params: Option<Value>) -> Result<Value, String> {
    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method,
        id: Some(make_request_id()),
        params,
    };
    into_data(send_request(request)?)
}

pub fn make_event_id() -> String {
    let mut random = rand::thread_rng();
    let rand = random.next_u64();
    format!(
        "evt-{}-{}-{:x}",
        Utc::now().timestamp_millis(),
        std::process::id(),
        rand
    )
}

fn make_request_id() -> String {
    format!("req-{:x}", rand::thread_rng().next_u64())
}

fn socket_path() -> Result<PathBuf, String> {
    if let Some(path) = env::var_os(SOCKET_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".tabrank").join(SOCKET_NAME))
}

fn send_event(event: EventEnvelope) -> Result<Value, String> {
    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method: Method::Event,
        id: Some(event.event_id.clone()),
        params: Some(
            serde_json::to_value(event)
                .map_err(|err| format!("Failed to serialize event: {}", err))?,
        ),
    };

    into_data(send_request(request)?)
}

fn into_data(response: Response) -> Result<Value, String> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        let message = response
            .error
            .map(|err| format!("{}: {}", err.code, err.message))
            .unwrap_or_else(|| "Unknown daemon error".to_string());
        Err(message)
    }
}

fn send_request(request: Request) -> Result<Response, String> {
    let socket = socket_path()?;
    let mut stream = UnixStream::connect(&socket)
        .map_err(|err| format!("Failed to connect to daemon socket: {}", err))?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    serde_json::to_writer(&mut stream, &request)
        .map_err(|err| format!("Failed to write request: {}", err))?;
    stream
        .write_all(b"\n")
        .map_err(|err| format!("Failed to flush request: {}", err))?;
    stream.flush().ok();

    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err("Response exceeded maximum size".to_string());
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err("Timed out waiting for daemon response".to_string());
            }
            Err(err) => return Err(format!("Failed to read response: {}", err)),
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err("Daemon response was empty".to_string());
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("Failed to parse response JSON: {}", err))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Read, Write};
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use std::time::{Duration, Instant};
    use tabrank_daemon_protocol::{Request, Response};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    pub struct EnvGuard {
        key: &'static str,
        prior: Option<String>,
    }

    impl EnvGuard {
        pub fn set(key: &'static str, value: &str) -> Self {
            let prior = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self { key, prior }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.prior {
                std::env::set_var(self.key, value);
            } else {
                std::env::remove_var(self.key);
            }
        }
    }

    pub fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn bind_socket(dir: &tempfile::TempDir) -> (UnixListener, PathBuf) {
        let socket_path = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        (listener, socket_path)
    }

    pub fn read_request(stream: &mut UnixStream) -> Option<Request> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buffer.extend_from_slice(&chunk[..n]);
                    if buffer.contains(&b'\n') {
                        break;
                    }
                }
                Err(_) => return None,
            }
        }

        let newline_index = buffer.iter().position(|b| *b == b'\n');
        let request_bytes = match newline_index {
            Some(index) => &buffer[..index],
            None => buffer.as_slice(),
        };
        serde_json::from_slice(request_bytes).ok()
    }

    pub fn write_response(stream: &mut UnixStream, response: &Response) {
        let mut payload = serde_json::to_vec(response).unwrap();
        payload.push(b'\n');
        let _ = stream.write_all(&payload);
    }

    /// Serves `responses.len()` connections, answering each in order and
    /// returning the requests it saw. `None` drops the connection unanswered.
    pub fn serve(listener: UnixListener, responses: Vec<Option<Response>>) -> Vec<Request> {
        listener.set_nonblocking(true).unwrap();
        let start = Instant::now();
        let mut seen = Vec::new();
        let mut pending = responses.into_iter();
        let mut next = pending.next();

        while next.is_some() && start.elapsed() < Duration::from_secs(5) {
            match listener.accept() {
                Ok((mut stream, _)) => {
                    stream.set_nonblocking(false).unwrap();
                    if let Some(request) = read_request(&mut stream) {
                        seen.push(request);
                    }
                    if let Some(Some(response)) = next.take() {
                        write_response(&mut stream, &response);
                    }
                    next = pending.next();
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(_) => break,
            }
        }

        seen
    }
}
