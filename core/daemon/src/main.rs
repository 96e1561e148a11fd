//! tabrank daemon entrypoint.
//!
//! A small, single-writer service that owns the engagement session. The host
//! shim forwards tab lifecycle events and probe reports over a Unix socket,
//! queries recommendations and rankings, and drains the display commands the
//! session queued for it.

use fs_err as fs;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use serde_json::Value;
use tabrank_core::{load_config, TabId, TabRankConfig};
use tabrank_daemon_protocol::{
    parse_event, parse_tab_query, ErrorInfo, Method, Request, Response, MAX_REQUEST_BYTES,
    PROTOCOL_VERSION,
};

mod state;

use state::{to_value, SharedState};

const SOCKET_NAME: &str = "daemon.sock";
const SOCKET_ENV: &str = "TABRANK_DAEMON_SOCKET";
const CONFIG_ENV: &str = "TABRANK_CONFIG";
const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;
const MAX_RANKING_LIMIT: u64 = 1000;

fn main() {
    init_logging();

    let socket_path = match daemon_socket_path() {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve daemon socket path");
            std::process::exit(1);
        }
    };

    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    info!(path = %socket_path.display(), "tabrank daemon started");

    let config_path = env::var_os(CONFIG_ENV).map(PathBuf::from);
    let config = match load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            TabRankConfig::default()
        }
    };
    info!(
        grace_period_secs = config.recommendation.grace_period_secs,
        idle_close_secs = config.recommendation.idle_close_secs,
        keep_min = config.recommendation.keep_min,
        consider_min = config.recommendation.consider_min,
        outbox_capacity = config.display.outbox_capacity,
        "Session config loaded"
    );

    let shared_state = Arc::new(SharedState::new(&config));

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = Arc::clone(&shared_state);
                thread::spawn(|| handle_connection(stream, state));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }
}

fn init_logging() {
    let debug_enabled = env::var("TABRANK_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn daemon_socket_path() -> Result<PathBuf, String> {
    if let Some(path) = env::var_os(SOCKET_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let dir = tabrank_core::tabrank_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(dir.join(SOCKET_NAME))
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(mut stream: UnixStream, state: Arc<SharedState>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let response = handle_request(request, &state);
    let _ = write_response(&mut stream, response);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
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
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    parse_request_bytes(&buffer)
}

fn parse_request_bytes(buffer: &[u8]) -> Result<Request, ErrorInfo> {
    if buffer.is_empty() {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    let request_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => {
            let trailing = &buffer[index + 1..];
            if trailing.iter().any(|b| !b.is_ascii_whitespace()) {
                warn!("Extra bytes detected after newline; ignoring trailing data");
            }
            &buffer[..index]
        }
        None => buffer,
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, state: &SharedState) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    let id = request.id;
    let result = match request.method {
        Method::GetHealth => health(state),
        Method::Event => handle_event(request.params, state),
        Method::GetLastRecommendation => last_recommendation(request.params, state),
        Method::GetLeastEngaged => parse_ranking_limit(request.params).and_then(|limit| {
            tracing::debug!(limit = ?limit, "Least-engaged request");
            state
                .least_engaged(limit)
                .and_then(|tabs| to_value(&tabs, "ranking"))
        }),
        Method::GetCloseCandidates => state
            .close_candidates()
            .and_then(|candidates| to_value(&candidates, "close candidates")),
        Method::DrainDisplayCommands => state.drain_display_commands().and_then(|commands| {
            if !commands.is_empty() {
                tracing::debug!(count = commands.len(), "Display commands drained");
            }
            to_value(&commands, "display commands")
        }),
    };

    match result {
        Ok(data) => Response::ok(id, data),
        Err(err) => Response::error_with_info(id, err),
    }
}

fn health(state: &SharedState) -> Result<Value, ErrorInfo> {
    let snapshot = state.health_snapshot()?;
    let mut data = serde_json::json!({
        "status": "ok",
        "pid": std::process::id(),
        "version": env!("CARGO_PKG_VERSION"),
        "protocol_version": PROTOCOL_VERSION,
        "pending_display_commands": snapshot.pending_display_commands,
    });
    data["session"] = to_value(&snapshot.session, "session summary")?;
    Ok(data)
}

fn handle_event(params: Option<Value>, state: &SharedState) -> Result<Value, ErrorInfo> {
    let params =
        params.ok_or_else(|| ErrorInfo::new("invalid_params", "event payload is required"))?;
    let event = parse_event(params)?;

    info!(
        event_id = %event.event_id,
        event_type = ?event.event_type,
        tab_id = ?event.tab_id,
        recorded_at = %event.recorded_at,
        "Received event"
    );

    state.apply_event(&event)
}

fn last_recommendation(params: Option<Value>, state: &SharedState) -> Result<Value, ErrorInfo> {
    let params = params.ok_or_else(|| ErrorInfo::new("invalid_params", "tab_id is required"))?;
    let query = parse_tab_query(params)?;

    match state.last_recommendation(TabId(query.tab_id))? {
        Some(snapshot) => {
            let mut data = to_value(&snapshot, "recommendation")?;
            data["found"] = Value::Bool(true);
            Ok(data)
        }
        None => Ok(serde_json::json!({ "found": false, "tab_id": query.tab_id })),
    }
}

fn parse_ranking_limit(params: Option<Value>) -> Result<Option<usize>, ErrorInfo> {
    let Some(params) = params else {
        return Ok(None);
    };
    if params.is_null() {
        return Ok(None);
    }
    if !params.is_object() {
        return Err(ErrorInfo::new("invalid_params", "params must be an object"));
    }
    match params.get("limit") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|limit| Some(limit.min(MAX_RANKING_LIMIT) as usize))
            .ok_or_else(|| {
                ErrorInfo::new("invalid_params", "limit must be a non-negative integer")
            }),
    }
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
