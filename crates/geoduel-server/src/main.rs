//! Geoduel server binary.
//!
//! Reads `GEODUEL_*` settings from the environment (and `.env`), loads the
//! question list, and serves until killed.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `RUST_LOG` | log filter, default `info` |
//!
//! The `GEODUEL_*` variables are documented in the `geoduel` config module.

use std::error::Error;

use geoduel::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Geoduel server v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ServerConfig::from_env();
    config.engine = config.engine.validated();
    let questions = load_questions(config.questions_file.as_deref())?;
    info!(
        bind = %config.bind_addr,
        questions = questions.len(),
        fallback = config.question_fallback,
        radius_m = config.engine.trigger_radius_m,
        "configuration loaded"
    );

    if config.question_fallback {
        let questions = WithFallback::new(questions).with_timeout(config.fallback_timeout());
        serve(config, questions).await
    } else {
        serve(config, questions).await
    }
}

async fn serve<Q: QuestionSource>(config: ServerConfig, questions: Q) -> Result<(), Box<dyn Error>> {
    let server = GeoduelServerBuilder::new()
        .bind(&config.bind_addr)
        .config(config.engine)
        .build(questions)
        .await?;
    info!(addr = %server.local_addr()?, "server ready");
    server.run().await?;
    Ok(())
}

fn load_questions(path: Option<&str>) -> Result<StaticQuestionSource, Box<dyn Error>> {
    let Some(path) = path else {
        info!("GEODUEL_QUESTIONS_FILE not set, using the sample question");
        return Ok(StaticQuestionSource::sample());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("reading questions from {path}: {e}"))?;
    let questions: Vec<Question> = serde_json::from_str(&raw)
        .map_err(|e| format!("parsing questions from {path}: {e}"))?;
    if questions.is_empty() {
        return Err(format!("{path} contains no questions").into());
    }
    Ok(StaticQuestionSource::new(questions))
}
