//! tabrank: host shim for the tabrank daemon.
//!
//! Forwards browser tab events and probe reports to the daemon and prints
//! query results as JSON on stdout.
//!
//! ## Subcommands
//!
//! - `activated`, `navigated`, `removed`: tab lifecycle events
//! - `report`: probe activity payload, read as JSON from stdin
//! - `action`: the user's response to a recommendation
//! - `recommendation`, `least-engaged`, `candidates`, `drain`, `health`: queries

mod daemon_client;
mod logging;
mod report;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tabrank_daemon_protocol::{ActivityPayload, EventEnvelope, EventType, Method, UserActionKind};

#[derive(Parser)]
#[command(name = "tabrank")]
#[command(about = "Tab engagement ranking")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// A tab became the active tab
    Activated {
        #[arg(value_name = "TAB_ID")]
        tab_id: u64,
    },

    /// A navigation finished loading in a tab
    Navigated {
        #[arg(value_name = "TAB_ID")]
        tab_id: u64,

        /// The tab was the active tab when the navigation completed
        #[arg(long)]
        active: bool,
    },

    /// A tab was closed
    Removed {
        #[arg(value_name = "TAB_ID")]
        tab_id: u64,
    },

    /// Forward a probe activity report (reads JSON from stdin)
    Report {
        /// Tab the probe ran in; defaults to the daemon's active tab
        #[arg(long)]
        tab: Option<u64>,
    },

    /// Record the user's response to a recommendation
    Action {
        #[arg(value_name = "TAB_ID")]
        tab_id: u64,

        #[arg(value_enum)]
        action: ActionArg,
    },

    /// Show the last recommendation for a tab
    Recommendation {
        #[arg(value_name = "TAB_ID")]
        tab_id: u64,
    },

    /// List tracked tabs, least engaged first
    LeastEngaged {
        #[arg(long)]
        limit: Option<u64>,
    },

    /// List tabs currently recommended for closing
    Candidates,

    /// Take the display commands queued for the host
    Drain,

    /// Check that the daemon is up
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    Close,
    Keep,
}

impl From<ActionArg> for UserActionKind {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Close => UserActionKind::Close,
            ActionArg::Keep => UserActionKind::Keep,
        }
    }
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    match run(cli.command) {
        Ok(data) => match serde_json::to_string_pretty(&data) {
            Ok(output) => println!("{}", output),
            Err(err) => {
                tracing::error!(error = %err, "Failed to render daemon response");
                std::process::exit(1);
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "tabrank command failed");
            eprintln!("tabrank: {}", err);
            std::process::exit(1);
        }
    }
}

fn run(command: Commands) -> Result<Value, String> {
    match command {
        Commands::Activated { tab_id } => {
            send(EventType::TabActivated, "tab activation", |event| {
                event.tab_id = Some(tab_id);
            })
        }
        Commands::Navigated { tab_id, active } => {
            send(EventType::TabNavigationCompleted, "navigation", |event| {
                event.tab_id = Some(tab_id);
                event.is_active_tab = Some(active);
            })
        }
        Commands::Removed { tab_id } => send(EventType::TabRemoved, "tab removal", |event| {
            event.tab_id = Some(tab_id);
        }),
        Commands::Report { tab } => {
            let payload = report::read_payload(std::io::stdin().lock())?;
            send_report(tab, payload)
        }
        Commands::Action { tab_id, action } => {
            send(EventType::UserAction, "user action", |event| {
                event.tab_id = Some(tab_id);
                event.action = Some(action.into());
            })
        }
        Commands::Recommendation { tab_id } => daemon_client::query(
            Method::GetLastRecommendation,
            Some(serde_json::json!({ "tab_id": tab_id })),
        ),
        Commands::LeastEngaged { limit } => daemon_client::query(
            Method::GetLeastEngaged,
            limit.map(|limit| serde_json::json!({ "limit": limit })),
        ),
        Commands::Candidates => daemon_client::query(Method::GetCloseCandidates, None),
        Commands::Drain => daemon_client::query(Method::DrainDisplayCommands, None),
        Commands::Health => daemon_client::query(Method::GetHealth, None),
    }
}

fn send_report(tab: Option<u64>, payload: ActivityPayload) -> Result<Value, String> {
    send(EventType::ActivityReport, "activity report", |event| {
        event.tab_id = tab;
        event.activity = Some(payload.clone());
    })
}

/// Builds one envelope and sends it; the retry reuses the same event id.
fn send<F>(event_type: EventType, label: &str, fill: F) -> Result<Value, String>
where
    F: Fn(&mut EventEnvelope),
{
    let event_id = daemon_client::make_event_id();
    let recorded_at = Utc::now().to_rfc3339();
    let build_envelope = || {
        let mut event = EventEnvelope {
            event_id: event_id.clone(),
            recorded_at: recorded_at.clone(),
            event_type,
            tab_id: None,
            is_active_tab: None,
            action: None,
            activity: None,
        };
        fill(&mut event);
        event
    };

    daemon_client::send_event_with_retry(build_envelope, label)
}

#[cfg(test)]
mod tests {
    use super::daemon_client::test_support::{bind_socket, env_lock, serve, EnvGuard};
    use super::daemon_client::SOCKET_ENV;
    use super::*;
    use tabrank_daemon_protocol::Response;

    fn run_against_fake_daemon(command: Commands) -> (Result<Value, String>, Vec<EventEnvelope>) {
        let _guard = env_lock();
        let dir = tempfile::tempdir().unwrap();
        let (listener, socket_path) = bind_socket(&dir);
        let server = std::thread::spawn(move || {
            serve(
                listener,
                vec![Some(Response::ok(
                    None,
                    serde_json::json!({ "accepted": true }),
                ))],
            )
        });

        let _socket_guard = EnvGuard::set(SOCKET_ENV, socket_path.to_str().unwrap());
        let result = run(command);
        let events = server
            .join()
            .unwrap()
            .into_iter()
            .filter_map(|request| request.params)
            .filter_map(|params| serde_json::from_value(params).ok())
            .collect();
        (result, events)
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["tabrank", "navigated", "4", "--active"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Navigated {
                tab_id: 4,
                active: true
            }
        ));

        let cli = Cli::try_parse_from(["tabrank", "action", "7", "close"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Action {
                tab_id: 7,
                action: ActionArg::Close
            }
        ));

        let cli = Cli::try_parse_from(["tabrank", "least-engaged", "--limit", "3"]).unwrap();
        assert!(matches!(cli.command, Commands::LeastEngaged { limit: Some(3) }));

        assert!(Cli::try_parse_from(["tabrank", "action", "7", "archive"]).is_err());
    }

    #[test]
    fn navigated_sends_active_flag() {
        let (result, events) = run_against_fake_daemon(Commands::Navigated {
            tab_id: 12,
            active: true,
        });
        assert!(result.is_ok());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::TabNavigationCompleted);
        assert_eq!(events[0].tab_id, Some(12));
        assert_eq!(events[0].is_active_tab, Some(true));
        assert!(events[0].validate().is_ok());
    }

    #[test]
    fn action_sends_user_action() {
        let (result, events) = run_against_fake_daemon(Commands::Action {
            tab_id: 3,
            action: ActionArg::Keep,
        });
        assert!(result.is_ok());
        assert_eq!(events[0].event_type, EventType::UserAction);
        assert_eq!(events[0].action, Some(UserActionKind::Keep));
    }

    #[test]
    fn unattributed_report_leaves_tab_unset() {
        let _guard = env_lock();
        let dir = tempfile::tempdir().unwrap();
        let (listener, socket_path) = bind_socket(&dir);
        let server = std::thread::spawn(move || {
            serve(
                listener,
                vec![Some(Response::ok(
                    None,
                    serde_json::json!({ "tab_id": 1, "score": 0.0, "recommendation": "no-data" }),
                ))],
            )
        });

        let _socket_guard = EnvGuard::set(SOCKET_ENV, socket_path.to_str().unwrap());
        let payload = ActivityPayload {
            click_count: Some(2.0),
            ..ActivityPayload::default()
        };
        let data = send_report(None, payload).expect("report");
        assert_eq!(data["recommendation"], "no-data");

        let seen = server.join().unwrap();
        let event: EventEnvelope =
            serde_json::from_value(seen[0].params.clone().expect("params")).unwrap();
        assert_eq!(event.event_type, EventType::ActivityReport);
        assert_eq!(event.tab_id, None);
        assert_eq!(
            event.activity.and_then(|activity| activity.click_count),
            Some(2.0)
        );
    }
}
