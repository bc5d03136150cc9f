//! Main Entrypoint for the Voice Relay API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Building the speech, agent and tool clients that make up the turn pipeline.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use sqlx::PgPool;
use std::{collections::HashMap, fs, net::SocketAddr, sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use voxrelay_api::{
    config::Config,
    db::Db,
    router::create_router,
    state::{AppState, SessionSettings},
};
use voxrelay_core::{
    agent::ToolCallingAgent,
    llm_client::OpenAICompatibleClient,
    pipeline::{StageTimeouts, TurnPipeline},
    stt::WhisperTranscriber,
    tools::{
        McpToolInvoker, RelayToolService, news::NewsClient, weather::WeatherClient,
    },
    tts::{OpenAiSpeech, SpeechSettings},
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in std::fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts from {}", prompts_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Initialize the Turn Pipeline ---
    let prompts = load_prompts(&config.prompts_path)?;
    let system_prompt = prompts
        .get("system_prompt")
        .context("system_prompt.md not found in prompts directory")?
        .clone();

    let llm_config = OpenAIConfig::new()
        .with_api_key(&config.llm_api_key)
        .with_api_base(&config.llm_base_url);
    let llm_client = Arc::new(OpenAICompatibleClient::new(
        llm_config,
        config.chat_model.clone(),
    ));

    let tool_http = reqwest::Client::builder()
        .timeout(config.tool_timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .context("Failed to build tool HTTP client")?;
    let tool_service = RelayToolService::new(
        WeatherClient::new(tool_http.clone(), config.openweather_api_key.clone()),
        NewsClient::new(tool_http, config.news_api_key.clone()),
    );
    let tools = Arc::new(
        McpToolInvoker::start(tool_service)
            .await
            .context("Failed to start tool server")?,
    );

    let agent = Arc::new(ToolCallingAgent::new(llm_client, tools, system_prompt));

    let stt_config = OpenAIConfig::new()
        .with_api_key(&config.stt_api_key)
        .with_api_base(&config.stt_base_url);
    let stt = Arc::new(WhisperTranscriber::new(
        stt_config,
        config.stt_model.clone(),
        config.stt_language.clone(),
    ));

    let tts = Arc::new(OpenAiSpeech::new(
        reqwest::Client::new(),
        SpeechSettings {
            base_url: config.tts_base_url.clone(),
            api_key: config.tts_api_key.clone(),
            model: config.tts_model.clone(),
            voice: config.tts_voice.clone(),
            format: config.tts_format.clone(),
            speed: config.tts_speed,
            chunk_size: config.tts_chunk_size,
        },
    ));

    let pipeline = Arc::new(TurnPipeline::new(stt, agent, tts).with_timeouts(StageTimeouts {
        stt: config.stt_timeout,
        agent: config.agent_timeout,
        tts: config.tts_timeout,
    }));

    let app_state = Arc::new(AppState::new(db, pipeline, SessionSettings::from(&config)));

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        stt_model = %config.stt_model,
        tts_model = %config.tts_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
