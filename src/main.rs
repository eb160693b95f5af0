use clap::Parser;
use dotenvy::dotenv;
use lms_backend::config::AppConfig;
use lms_backend::infrastructure::{database, providers};
use lms_backend::services::course_service::CourseService;
use lms_backend::services::media::MediaCoordinator;
use lms_backend::services::password_reset::{LogNotifier, PasswordResetService};
use lms_backend::services::reconciler::Reconciler;
use lms_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run (api, worker, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 8000)]
    port: u16,
}

fn load_config() -> anyhow::Result<AppConfig> {
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => AppConfig::production(),
        Ok("development") => Ok(AppConfig::development()),
        _ => Ok(AppConfig::from_env()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lms_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !matches!(args.mode.as_str(), "api" | "worker" | "all") {
        anyhow::bail!("unknown mode '{}', expected api, worker or all", args.mode);
    }

    info!("🚀 Starting LMS Backend [Mode: {}]...", args.mode);

    // 2. Setup Common Infrastructure
    let config = load_config()?;
    info!(
        "🛡️  Media Config: Max Image={}MB, Max Video={}MB, Reconcile every {}s",
        config.max_image_size / 1024 / 1024,
        config.max_video_size / 1024 / 1024,
        config.reconcile_interval_secs
    );

    let db = database::setup_database().await?;
    let http = providers::http_client()?;
    let images = providers::setup_image_store(&config, http.clone())?;
    let videos = providers::setup_video_host(&config, http);
    let media = Arc::new(MediaCoordinator::new(
        db.clone(),
        images,
        videos,
        config.clone(),
    ));

    // 3. Setup Graceful Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    // 4. Initialize Reconciler
    if args.mode == "worker" || args.mode == "all" {
        let reconciler = Reconciler::new(media.clone(), shutdown_rx.clone());
        handles.push(tokio::spawn(reconciler.run()));
        info!("👷 Media reconciler initialized.");
    }

    // 5. Initialize API Service
    if args.mode == "api" || args.mode == "all" {
        let state = AppState {
            db: db.clone(),
            config: config.clone(),
            media: media.clone(),
            courses: Arc::new(CourseService::new(db.clone(), media.clone())),
            password_reset: Arc::new(PasswordResetService::new(
                db.clone(),
                config.clone(),
                Arc::new(LogNotifier),
            )),
        };

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            );

        let app = create_app(state).layer(trace_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
        info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

        let mut server_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.changed().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        }));
    }

    // 6. Wait for Shutdown Signal
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down backend services...");
    for handle in handles {
        if let Err(e) = handle.await {
            error!("❌ Task ended abnormally: {}", e);
        }
    }

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("❌ Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("🛑 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
