//! forma-operator: keeps Form3 accounts in line with declared Account objects.
//!
//! The daemon:
//! - Serves the Account REST API (create, replace, inspect, delete)
//! - Watches the store and reconciles every Account with the Form3 API
//! - Holds deletion of an Account until its Form3 account is released

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forma_operator::rest::{AppState, create_router};
use forma_operator::{
    AccountClient, AccountReconciler, AccountStore, Controller, ControllerConfig, Form3Client,
    Form3Config, MemoryAccountClient, MemoryStore, RetryPolicy, create_audit_logger,
};

/// forma Account Operator
#[derive(Parser, Debug)]
#[command(name = "forma-operator", version, about)]
struct Args {
    /// Listen address for the REST API
    #[arg(short, long, default_value = "[::1]:50070")]
    listen: String,

    /// Form3 API base URL
    #[arg(long, default_value = "http://localhost:8080")]
    form3_endpoint: String,

    /// Bearer token for the Form3 API
    #[arg(long, env = "FORM3_TOKEN")]
    form3_token: Option<String>,

    /// Number of concurrent reconcile workers
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Full resync interval in seconds (0 disables)
    #[arg(long, default_value = "600")]
    resync_interval: u64,

    /// First retry delay after a failed reconcile, in milliseconds
    #[arg(long, default_value = "500")]
    initial_backoff_ms: u64,

    /// Upper bound for the retry delay, in seconds
    #[arg(long, default_value = "300")]
    max_backoff_secs: u64,

    /// Growth factor between consecutive retry delays
    #[arg(long, default_value = "2.0")]
    backoff_multiplier: f64,

    /// Give up on an object after this many consecutive failures
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Deadline for a single Form3 call, in seconds
    #[arg(long, default_value = "30")]
    remote_timeout_secs: u64,

    /// Run in development mode (in-memory accounts, no Form3 calls)
    #[arg(long)]
    dev: bool,
}

impl Args {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            workers: self.workers,
            resync_interval: (self.resync_interval > 0)
                .then(|| Duration::from_secs(self.resync_interval)),
            retry: RetryPolicy {
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_secs(self.max_backoff_secs),
                multiplier: self.backoff_multiplier,
                max_attempts: self.max_attempts,
            },
        }
    }

    fn form3_config(&self) -> Form3Config {
        Form3Config {
            endpoint: self.form3_endpoint.clone(),
            token: self.form3_token.clone(),
            timeout: Duration::from_secs(self.remote_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forma_operator=info,audit=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let client: Arc<dyn AccountClient> = if args.dev {
        warn!("Development mode: accounts are kept in memory, Form3 is not contacted");
        Arc::new(MemoryAccountClient::new())
    } else {
        info!("Form3 endpoint: {}", args.form3_endpoint);
        Arc::new(Form3Client::new(args.form3_config()).context("Failed to build Form3 client")?)
    };

    let store: Arc<dyn AccountStore> = Arc::new(MemoryStore::new());
    let audit = create_audit_logger("forma-operator");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reconciler = Arc::new(
        AccountReconciler::new(Arc::clone(&store), client, audit, shutdown_rx.clone())
            .with_remote_timeout(Duration::from_secs(args.remote_timeout_secs)),
    );
    let controller = Controller::new(reconciler, Arc::clone(&store), args.controller_config());
    let controller_task = tokio::spawn(controller.run(shutdown_rx));

    // Create REST router
    let router = create_router(Arc::new(AppState { store }));

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!("REST API listening on {}", args.listen);

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to install SIGTERM handler")?;

    // Run server with graceful shutdown
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signal::ctrl_c() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        })
        .await?;

    info!("Stopping controller...");
    let _ = shutdown_tx.send(true);
    if let Err(e) = controller_task.await {
        error!("Controller task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}
