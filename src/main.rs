//! Unified Replication Operator
//!
//! Runs the UnifiedVolumeReplication reconciler, the introspection REST API
//! and the health endpoints. In standalone mode no cluster is contacted:
//! discovery answers from a fixed backend list and adapters keep their
//! control objects in memory.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use unified_replication_operator::controller::reconciler::{self, Context};
use unified_replication_operator::domain::ports::BackendDiscovererRef;
use unified_replication_operator::{
    AdapterRegistry, ApiGroupDiscoverer, ApiServer, ApiServerConfig, Backend, ControllerEngine,
    Error, OperatorConfig, Result, StaticDiscoverer,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Unified Replication Operator - one replication API for Ceph, Trident and PowerStore
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "OPERATOR_CONFIG")]
    config: Option<PathBuf>,

    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
    api_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Namespace to watch (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Discovery cache expiry in seconds
    #[arg(long, env = "CACHE_EXPIRY_SECS")]
    cache_expiry_secs: Option<u64>,

    /// Always call discovery instead of reusing cached results
    #[arg(long, env = "DISABLE_DISCOVERY_CACHE")]
    disable_discovery_cache: bool,

    /// Reconciliations allowed to run at once
    #[arg(long, env = "MAX_CONCURRENT_RECONCILES")]
    max_concurrent_reconciles: Option<usize>,

    /// Fail operations against backends that are not ready
    #[arg(long, env = "FAIL_ON_UNREADY_BACKEND")]
    fail_on_unready_backend: bool,

    /// Reject modes the selected backend has no capability for
    #[arg(long, env = "ENFORCE_CAPABILITIES")]
    enforce_capabilities: bool,

    /// Run in standalone mode (no Kubernetes)
    #[arg(long, env = "STANDALONE")]
    standalone: bool,

    /// Backends reported as installed in standalone mode
    #[arg(
        long,
        env = "STANDALONE_BACKENDS",
        value_delimiter = ',',
        default_value = "ceph,trident,powerstore"
    )]
    standalone_backends: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    /// Load the configuration file, then apply flags on top
    fn operator_config(&self) -> Result<OperatorConfig> {
        let mut config = match &self.config {
            Some(path) => OperatorConfig::load(path)?,
            None => OperatorConfig::default(),
        };

        let controller = &mut config.controller;
        if let Some(secs) = self.cache_expiry_secs {
            controller.cache_expiry_secs = secs;
        }
        if let Some(limit) = self.max_concurrent_reconciles {
            controller.max_concurrent_reconciles = limit;
        }
        if self.disable_discovery_cache {
            controller.enable_caching = false;
        }
        if self.fail_on_unready_backend {
            controller.fail_on_unready_backend = true;
        }
        if self.enforce_capabilities {
            controller.enforce_capabilities = true;
        }

        config.validate()?;
        Ok(config)
    }

    fn standalone_backends(&self) -> Result<Vec<Backend>> {
        self.standalone_backends
            .iter()
            .map(|name| name.trim().parse::<Backend>())
            .collect()
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting Unified Replication Operator");
    info!("  Version: {}", unified_replication_operator::VERSION);
    info!("  REST API: {}", args.api_addr);
    info!("  Standalone mode: {}", args.standalone);

    let config = args.operator_config()?;
    info!(
        "  Discovery cache: {} ({}s)",
        config.controller.enable_caching, config.controller.cache_expiry_secs
    );

    // A broken vocabulary is fatal
    let translator = Arc::new(config.translation_engine()?);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
        signal_token.cancel();
    });

    // Discovery and adapter backing
    let (discoverer, client): (BackendDiscovererRef, Option<kube::Client>) = if args.standalone {
        let backends = args.standalone_backends()?;
        info!("Standalone backends: {:?}", backends);
        let discoverer: BackendDiscovererRef = Arc::new(StaticDiscoverer::ready(&backends));
        (discoverer, None)
    } else {
        let client = kube::Client::try_default().await?;
        let discoverer: BackendDiscovererRef = Arc::new(ApiGroupDiscoverer::new(client.clone()));
        (discoverer, Some(client))
    };

    let registry = AdapterRegistry::with_defaults(translator.clone(), &config.adapters, client.clone());
    let engine = Arc::new(ControllerEngine::new(
        config.controller.clone(),
        discoverer,
        translator,
        Arc::new(registry),
    )?);

    // Start health server
    let ready = Arc::new(AtomicBool::new(true));
    let health_addr = args.health_addr.clone();
    let health_ready = ready.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr, health_ready).await {
            error!("Health server error: {}", e);
        }
    });

    // Start API server
    let api_config = ApiServerConfig {
        rest_addr: args.api_addr.parse().map_err(|e| {
            Error::Configuration(format!("Invalid REST API address: {}", e))
        })?,
    };
    let api_server = ApiServer::new(api_config, engine.clone(), shutdown.clone());
    let api_handle = tokio::spawn(async move { api_server.run().await });

    match client {
        Some(client) => {
            let ctx = Arc::new(Context {
                client,
                engine,
                cancel: shutdown.clone(),
            });
            if let Err(e) = reconciler::run(ctx, args.namespace.clone()).await {
                ready.store(false, Ordering::Relaxed);
                shutdown.cancel();
                return Err(e);
            }
        }
        None => {
            info!("No cluster client; serving the API until shutdown");
            shutdown.cancelled().await;
        }
    }

    shutdown.cancel();
    ready.store(false, Ordering::Relaxed);
    match api_handle.await {
        Ok(Err(e)) => error!("API server error: {}", e),
        Err(e) => error!("API server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    info!("Operator shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn", "axum=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

async fn run_health_server(addr: &str, ready: Arc<AtomicBool>) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Response, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let ready = ready.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let ready = ready.load(Ordering::Relaxed);
                async move {
                    let (status, body) = match req.uri().path() {
                        "/healthz" | "/livez" => (StatusCode::OK, "ok"),
                        "/readyz" if ready => (StatusCode::OK, "ok"),
                        "/readyz" => (StatusCode::SERVICE_UNAVAILABLE, "not ready"),
                        _ => (StatusCode::NOT_FOUND, "not found"),
                    };
                    let mut response = Response::new(Body::from(body));
                    *response.status_mut() = status;
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Internal(format!("Invalid health server address: {}", e))
    })?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}
