//! `dbweave events`: stream pushed server events as JSON lines.

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use dbweave_api::{ServerEventTopic, SocketState};
use dbweave_core::Workbench;

use crate::cli::{EventsArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

const ALL_TOPICS: [ServerEventTopic; 5] = [
    ServerEventTopic::Session,
    ServerEventTopic::Config,
    ServerEventTopic::Permissions,
    ServerEventTopic::Navigator,
    ServerEventTopic::Datasource,
];

fn topics(requested: &[String]) -> Result<Vec<String>, CliError> {
    if requested.is_empty() {
        return Ok(ALL_TOPICS.iter().map(ToString::to_string).collect());
    }
    requested
        .iter()
        .map(|t| {
            t.parse::<ServerEventTopic>()
                .map(|topic| topic.to_string())
                .map_err(|_| CliError::Validation {
                    field: "topic".into(),
                    reason: format!(
                        "unknown topic '{t}', expected one of: {}",
                        ALL_TOPICS.map(|t| t.to_string()).join(", ")
                    ),
                })
        })
        .collect()
}

pub async fn handle(args: EventsArgs, workbench: &Workbench, global: &GlobalOpts) -> Result<(), CliError> {
    let topics = topics(&args.topics)?;
    let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
    let mut state = workbench.connect_events(&topic_refs).await?;
    let Some(mut rx) = workbench.events().await else {
        return Ok(());
    };
    info!(topics = ?topics, "streaming events");

    let compact = !matches!(global.output, OutputFormat::Json);
    let mut seen = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow();
                if current == SocketState::Closed {
                    break;
                }
                if !global.quiet {
                    eprintln!("socket: {current:?}");
                }
            }
            result = rx.recv() => match result {
                Ok(event) => {
                    output::print_output(&output::render_json(&*event, compact), global.quiet);
                    seen += 1;
                    if args.count.is_some_and(|n| seen >= n) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}
