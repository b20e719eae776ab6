use api::{build_app, init_domain_services};
use config::{ApiConfig, LoggingConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // A missing .env is fine; variables may come from the environment
    let _ = dotenvy::dotenv();

    // Load configuration first to get logging settings
    let config = ApiConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Application cannot start without TAVILY_API_KEY and OPENROUTER_API_KEY.");
        std::process::exit(1);
    });

    init_tracing(&config.logging);

    let domain_services = init_domain_services(&config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to initialize providers");
        std::process::exit(1);
    });

    let app = build_app(domain_services);

    let bind_address = config.server.bind_address();
    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_address, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(address = %bind_address, "Server started successfully");
    tracing::info!("API Endpoints:");
    tracing::info!("  - POST /api/search (Web search)");
    tracing::info!("  - POST /api/chat (Streamed chat completion, NDJSON)");
    tracing::info!("  - POST /v1/research (Research session, SSE)");
    tracing::info!("  - GET /v1/research/sections");
    tracing::info!("  - GET /v1/research/messages");
    tracing::info!("  - DELETE /v1/research/active");
    tracing::info!("  - GET /v1/health");
    tracing::info!("  - GET /docs (API documentation)");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

fn init_tracing(logging_config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging_config.filter_directive()));

    // Initialize tracing based on the format specified in config
    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt().json().with_env_filter(filter).init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
    }
}
