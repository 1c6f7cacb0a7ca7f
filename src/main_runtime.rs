use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vigil::api::{create_router, AppState};
use vigil::config::{AppConfig, LoggingConfig};
use vigil::coordination::{install_signal_handlers, ShutdownController};
use vigil::error::Result;
use vigil::monitor::{HealthProbe, HealthRegistry, HttpProbe};
use vigil::persistence::build_event_store;
use vigil::supervisor::{build_executor, Orchestrator};

pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info,vigil=debug,sqlx=warn"));

    // File logging is opt-in: VIGIL_LOG_DIR wins over logging.dir
    let log_dir = std::env::var("VIGIL_LOG_DIR").ok().or_else(|| config.dir.clone());

    // `tracing_appender::rolling::daily` panics if it can't create the
    // initial log file, so preflight writability first.
    let file_layer = log_dir.as_deref().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                log_dir, e
            );
            return None;
        }
        let test_path = std::path::Path::new(log_dir).join(".vigil_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                // Daily rotating file appender
                let file_appender = tracing_appender::rolling::daily(log_dir, "vigil.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive for the life of the process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    });

    // Console layer, text or JSON
    let (text_layer, json_layer) = if config.json {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_target(true),
            ),
        )
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
            None,
        )
    };

    let file_logging_enabled = file_layer.is_some();
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/vigil.log", dir);
    }
}

pub fn init_logging_simple() {
    // Minimal logging for client commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

/// Build every component from `config`, serve the API and run the loop
/// until SIGTERM or Ctrl+C.
pub async fn run_orchestrator(config: AppConfig) -> Result<()> {
    // Fail fast before anything is probed
    config.validate()?;

    let registry = Arc::new(
        HealthRegistry::with_dependencies(config.breaker.to_breaker_config(), config.descriptors()?)
            .await?,
    );
    let probe: Arc<dyn HealthProbe> = Arc::new(HttpProbe::new()?);
    let executor = build_executor(&config.executor, Arc::clone(&registry), Arc::clone(&probe))?;
    let store = build_event_store(&config.event_store).await?;

    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        registry,
        probe,
        executor,
        store,
    ));

    let shutdown = Arc::new(ShutdownController::new());
    install_signal_handlers(Arc::clone(&shutdown));

    let app = create_router(AppState::new(Arc::clone(&orchestrator)));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", addr);

    let mut api_shutdown = shutdown.listener();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                api_shutdown.wait().await;
            })
            .await
    });

    info!(
        "Monitoring {} dependencies every {}s",
        config.dependencies.len(),
        orchestrator.cycle_interval().as_secs()
    );
    orchestrator.run(shutdown.listener()).await;

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("API server error: {}", e),
        Err(e) => error!("API server task failed: {}", e),
    }

    info!("vigil stopped");
    Ok(())
}
