//! Registration Service
//!
//! Main entry point for registration intake and faculty notifications.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use document_renderer::{
    ChromiumRasterizer, DocumentRenderer, PassthroughRasterizer, Rasterizer, TemplateAssets,
};
use registration_service::config::Config;
use registration_service::mailer::{HttpMailer, LogMailer, Mailer};
use registration_service::notifier::Notifier;
use registration_service::queue::PendingQueue;
use registration_service::registrar::Registrar;
use registration_service::scheduler;
use registration_service::serial::SerialAllocator;
use registration_service::store::{MemoryRegistrationStore, RedisRegistrationStore, RegistrationStore};
use registration_service::uploader::{HttpUploader, LocalUploader, Uploader};
use registration_service::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "registration_service=debug,document_renderer=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Registration Service");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded");
    info!("  API address: {}", config.api_address());
    info!("  Mock mode: {}", config.mock_mode);
    info!("  Assets: {}", config.assets_dir.display());
    info!("  Output: {}", config.output_dir.display());
    info!("  Faculty email: {}", config.faculty_email);

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                config.output_dir.display()
            )
        })?;

    let store = build_store(&config).await?;
    let (uploader, files_dir) = build_uploader(&config)?;
    let mailer = build_mailer(&config)?;
    let rasterizer = build_rasterizer(&config).await?;

    let queue = Arc::new(PendingQueue::new());
    let notifier = Arc::new(Notifier::new(
        mailer,
        store.clone(),
        queue.clone(),
        config.faculty_email.clone(),
        config.external_timeout,
    ));

    let registrar = Registrar::new(
        SerialAllocator::new(store.clone(), config.serial_seed, config.external_timeout),
        DocumentRenderer::new(
            TemplateAssets::new(&config.assets_dir),
            rasterizer,
            &config.output_dir,
        ),
        uploader,
        store.clone(),
        notifier.clone(),
        queue.clone(),
        config.external_timeout,
    );

    let scheduler_task = tokio::spawn(scheduler::run(
        config.flush_schedule.clone(),
        notifier.clone(),
    ));

    let app = create_router(AppState {
        registrar,
        notifier,
        queue: queue.clone(),
        store,
        form_page_url: config.form_page_url.clone(),
        files_dir,
    });

    // Start server
    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Registration Service listening on {}", config.api_address());
    info!("Health check: http://{}/health", config.api_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler_task.abort();

    let pending = queue.len().await;
    if pending > 0 {
        warn!(
            "{} submission(s) were still waiting for the faculty batch email",
            pending
        );
    }

    info!("Registration Service stopped");
    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn RegistrationStore>> {
    if config.mock_mode {
        info!("Using in-memory registration store");
        return Ok(Arc::new(MemoryRegistrationStore::new()));
    }

    let store = RedisRegistrationStore::new(&config.redis_url).await?;
    Ok(Arc::new(store))
}

/// The uploader, plus the directory to serve when uploads stay local
fn build_uploader(config: &Config) -> Result<(Arc<dyn Uploader>, Option<PathBuf>)> {
    match (
        config.mock_mode,
        &config.storage_endpoint,
        &config.storage_bucket,
        &config.storage_token,
    ) {
        (false, Some(endpoint), Some(bucket), Some(token)) => {
            let uploader = HttpUploader::new(
                endpoint.clone(),
                bucket.clone(),
                token.clone(),
                config.storage_public_url.clone(),
                config.storage_prefix.clone(),
                config.external_timeout,
            )
            .context("Failed to create storage client")?;
            Ok((Arc::new(uploader), None))
        }
        _ => {
            info!(
                "Storing uploads locally in {}, served at {}",
                config.local_storage_dir.display(),
                config.storage_public_url
            );
            let uploader = LocalUploader::new(
                &config.local_storage_dir,
                config.storage_public_url.clone(),
                config.storage_prefix.clone(),
            );
            Ok((Arc::new(uploader), Some(config.local_storage_dir.clone())))
        }
    }
}

fn build_mailer(config: &Config) -> Result<Arc<dyn Mailer>> {
    match (config.mock_mode, &config.mail_api_url, &config.mail_api_key) {
        (false, Some(api_url), Some(api_key)) => {
            let mailer = HttpMailer::new(
                api_url.clone(),
                api_key.clone(),
                config.mail_from.clone(),
                config.external_timeout,
            )
            .context("Failed to create mail client")?;
            Ok(Arc::new(mailer))
        }
        _ => {
            info!("Logging emails instead of sending them");
            Ok(Arc::new(LogMailer::new()))
        }
    }
}

async fn build_rasterizer(config: &Config) -> Result<Arc<dyn Rasterizer>> {
    if config.passthrough_render {
        info!("Rendering documents as HTML (passthrough)");
        return Ok(Arc::new(PassthroughRasterizer));
    }

    let rasterizer = ChromiumRasterizer::launch(config.chrome_executable.clone())
        .await
        .context("Failed to launch headless Chromium")?;
    info!("Headless Chromium ready");
    Ok(Arc::new(rasterizer))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }

    info!("Shutdown signal received, terminating gracefully...");
}
