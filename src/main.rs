use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use netpulse_reactor::api;
use netpulse_reactor::event_log::TracingEventLog;
use netpulse_reactor::external::CommandQueue;
use netpulse_reactor::intake::{self, Directive};
use netpulse_reactor::macros::StandardMacros;
use netpulse_reactor::notify::WebhookNotifier;
use netpulse_reactor::store::InMemoryStore;
use netpulse_reactor::telemetry::BroadcastTelemetry;
use netpulse_reactor::{
    Collaborators, CommandTable, DaemonConfig, EventIdCounter, ObjectStore, Reactor, ShellRunner,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_ansi(true)
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config_content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path))?;
    let config: DaemonConfig = serde_json::from_str(&config_content)
        .with_context(|| "Failed to parse config")?;
    config.validate().with_context(|| format!("Invalid config {}", config_path))?;

    let objects = Arc::new(Mutex::new(config.build_objects()));
    let settings = Arc::new(config.reactor.clone());
    let commands = Arc::new(CommandTable::new(config.commands.clone()));
    let event_ids = Arc::new(EventIdCounter::new(config.first_event_id));
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(CommandQueue::new());
    let telemetry = Arc::new(BroadcastTelemetry::new(256));
    let log = Arc::new(TracingEventLog);

    let mut telemetry_rx = telemetry.subscribe();
    tokio::spawn(async move {
        loop {
            match telemetry_rx.recv().await {
                Ok(event) => debug!(target: "netpulse::telemetry", ?event, "Telemetry"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Telemetry subscriber lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let collaborators = Collaborators {
        runner: Arc::new(ShellRunner),
        macros: Arc::new(StandardMacros::new(settings.illegal_macro_output_chars.clone())),
        notifier: Arc::new(WebhookNotifier::new(
            config.webhook_url.clone(),
            config.notification_interval_secs,
        )),
        log: log.clone(),
        perfdata: log,
        downtime: store.clone(),
        acknowledgements: store,
        telemetry,
        external_commands: queue.clone(),
    };
    let reactor = Reactor::new(settings, commands, event_ids, collaborators);

    let objects_for_api = objects.clone();
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::start_server(api_port, objects_for_api).await {
            error!("Status API failed: {:#}", e);
        }
    });

    {
        let objects = objects.lock().await;
        info!(
            "NetPulse Reactor ready: {} hosts, {} services",
            objects.hosts().count(),
            objects.services().count()
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read check results")? {
                    Some(line) => process_line(&reactor, &objects, &queue, &line).await,
                    None => break,
                }
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received. Closing NetPulse Reactor...");
                break;
            }
        }
    }

    Ok(())
}

async fn process_line(
    reactor: &Reactor,
    objects: &Mutex<ObjectStore>,
    queue: &CommandQueue,
    line: &str,
) {
    let result = match intake::parse_line(line) {
        None => return,
        Some(Err(e)) => {
            warn!(error = %e, "Ignoring input line");
            return;
        }
        Some(Ok(Directive::Other(directive))) => {
            queue.push(directive);
            return;
        }
        Some(Ok(Directive::CheckResult(result))) => result,
    };

    // Held for the whole pass: status API reads wait while event handlers run.
    let mut objects = objects.lock().await;
    if let Err(e) = intake::apply_result(&mut objects, &result) {
        warn!(error = %e, "Rejected check result");
        return;
    }

    match reactor.handle_state(&mut objects, &result.object).await {
        Ok(outcome) => debug!(
            object = %result.object,
            reason = ?outcome.reason,
            event_id = ?outcome.event_id,
            "Check result processed"
        ),
        Err(e) => error!(object = %result.object, error = %e, "State handling failed"),
    }
    intake::finish_check(&mut objects, &result.object);
}
