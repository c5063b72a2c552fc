//! NextGCore BSF (Binding Support Function)
//!
//! The BSF is a 5G core network function responsible for:
//! - Tracking which PCF serves each PDU session
//! - Looking up bindings by SUPI, UE address or binding id
//! - Announcing bindings over Nbsf_Management

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use nextgcore_bsfd::{
    bsf_context_final, bsf_context_init, bsf_self, get_sess_load, BsfConfig, BsfContext, BsfEvent,
    BsfEventId, BsfSmContext, RequestQueue,
};

/// Capacity of the inbound event channel
const EVENT_QUEUE_SIZE: usize = 1024;

/// Idle wake-up interval of the event loop
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// NextGCore BSF - Binding Support Function
#[derive(Parser, Debug)]
#[command(name = "nextgcore-bsfd")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "5G Core Binding Support Function", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, default_value = "/etc/nextgcore/bsf.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'e', long, default_value = "info")]
    log_level: String,

    /// Disable color output
    #[arg(short = 'm', long)]
    no_color: bool,

    /// Maximum number of sessions [default: 1024]
    #[arg(long)]
    max_sess: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args)?;

    log::info!("NextGCore BSF v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = BsfConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    // Initialize BSF context
    let max_sess = args.max_sess.unwrap_or(config.bsf.max_sess);
    bsf_context_init(max_sess);

    with_bsf_context(|context| {
        for conf in &config.bsf.nf_instances {
            let nf_instance = context.nf_instance_add(conf.to_nf_instance());
            log::info!("[{}] NF instance provisioned ({})", nf_instance.id, nf_instance.nf_type);
        }
    })?;

    // Session events enter through `tx`; only shutdown is wired up here
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_SIZE);
    setup_signal_handlers(tx.clone())?;

    // Initialize BSF state machine
    let mut queue = RequestQueue::new();
    let mut bsf_sm = BsfSmContext::new();
    with_bsf_context(|context| bsf_sm.init(context, &mut queue))?;
    log::info!("NextGCore BSF ready");

    // Main event loop (async)
    run_event_loop_async(&mut bsf_sm, &mut queue, rx).await?;

    // Graceful shutdown
    log::info!("Shutting down...");
    drop(tx);

    with_bsf_context(|context| {
        bsf_sm.fini(context, &mut queue);
        let removed = context.sess_remove_all();
        log::info!("{removed} sessions removed");
    })?;
    flush_requests(&mut queue);

    bsf_context_final();

    log::info!("NextGCore BSF stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(args: &Args) -> Result<()> {
    let mut builder = env_logger::Builder::new();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };
    builder.filter_level(level);

    builder.format_timestamp_millis();

    if args.no_color {
        builder.write_style(env_logger::WriteStyle::Never);
    }

    builder
        .try_init()
        .context("Failed to initialize logger")?;

    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(tx: mpsc::Sender<BsfEvent>) -> Result<()> {
    ctrlc::set_handler(move || {
        if tx.try_send(BsfEvent::exit()).is_err() {
            log::warn!("Event queue unavailable for shutdown");
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    Ok(())
}

fn with_bsf_context<T>(f: impl FnOnce(&mut BsfContext) -> T) -> Result<T> {
    let ctx = bsf_self();
    let mut context = ctx
        .write()
        .map_err(|_| anyhow!("BSF context lock poisoned"))?;
    Ok(f(&mut *context))
}

/// Async main event loop
async fn run_event_loop_async(
    bsf_sm: &mut BsfSmContext,
    queue: &mut RequestQueue,
    mut rx: mpsc::Receiver<BsfEvent>,
) -> Result<()> {
    log::debug!("Entering async main event loop");

    loop {
        let event = match tokio::time::timeout(POLL_INTERVAL, rx.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => {
                log::trace!("BSF idle (load={}%)", get_sess_load());
                continue;
            }
        };

        if event.id == BsfEventId::FsmExit {
            log::info!("Received shutdown signal");
            break;
        }

        let result = with_bsf_context(|context| bsf_sm.dispatch(context, queue, &event))?;
        if let Err(e) = result {
            log::error!("{} failed: {e}", event.name());
        }
        flush_requests(queue);
    }

    log::debug!("Exiting async main event loop");
    Ok(())
}

/// Hand queued requests to the transport layer.
///
/// No HTTP client is linked into this binary: requests are logged and
/// dropped here, and an outbound Nbsf client plugs in at this point.
fn flush_requests(queue: &mut RequestQueue) {
    for request in queue.drain() {
        log::debug!(
            "SBI request {} {} ({} bytes)",
            request.header.method,
            request.uri,
            request.content.as_ref().map_or(0, String::len)
        );
    }
}
