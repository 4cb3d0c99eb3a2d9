use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

mod classifier;
mod conversation;
mod model;
mod orchestrator;
mod provider;
mod responder;

use classifier::IntentClassifier;
use conversation::InMemorySessionStore;
use model::IntentCorpus;
use orchestrator::{ChatEngine, ReplySource};
use provider::AzureOpenAiProvider;
use responder::ResponseGenerator;

// --- API types ---

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    conversation_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    quick_replies: Vec<String>,
    intent: String,
    confidence: f32,
    source: ReplySource,
    conversation_id: String,
    processing_time: f64,
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    status: &'static str,
}

#[derive(Serialize)]
struct IntentInfo {
    tag: String,
    sample_patterns: Vec<String>,
    response_count: usize,
}

// --- Endpoints ---

#[post("/api/chat")]
async fn chat_endpoint(
    req: web::Json<ChatRequest>,
    engine: web::Data<ChatEngine>,
) -> impl Responder {
    let start = Instant::now();

    let message = req.message.trim();
    if message.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "No message provided".to_string(),
            status: "error",
        });
    }

    let conversation_id = req
        .conversation_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    log::info!(
        "Received chat request for conversation {}: '{:.50}'",
        conversation_id,
        message
    );

    let outcome = engine.process(&conversation_id, message).await;
    let elapsed = start.elapsed().as_secs_f64();
    log::info!(
        "Replied from {:?} (intent: {}) in {:.3}s",
        outcome.source,
        outcome.intent,
        elapsed
    );

    HttpResponse::Ok().json(ChatResponse {
        response: outcome.response,
        quick_replies: outcome.suggestions,
        intent: outcome.intent,
        confidence: outcome.confidence,
        source: outcome.source,
        conversation_id,
        processing_time: (elapsed * 1000.0).round() / 1000.0,
        status: "success",
    })
}

#[get("/api/chat/health")]
async fn health_endpoint() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "Portfolio Chat API",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[get("/api/chat/history/{conversation_id}")]
async fn history_endpoint(
    path: web::Path<String>,
    engine: web::Data<ChatEngine>,
) -> impl Responder {
    let session = engine.sessions().snapshot(&path);
    HttpResponse::Ok().json(serde_json::json!({
        "messages": session.messages(),
        "quick_replies": session.suggestions(),
        "status": "success",
    }))
}

#[get("/api/chat/intents")]
async fn intents_endpoint(corpus: web::Data<IntentCorpus>) -> impl Responder {
    let intents: Vec<IntentInfo> = corpus
        .iter()
        .map(|intent| IntentInfo {
            tag: intent.tag.clone(),
            sample_patterns: intent.patterns.iter().take(3).cloned().collect(),
            response_count: intent.responses.len(),
        })
        .collect();

    HttpResponse::Ok().json(serde_json::json!({
        "intents": intents,
        "count": intents.len(),
        "status": "success",
    }))
}

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(include_str!("index.html"))
}

async fn not_found() -> impl Responder {
    HttpResponse::NotFound().json(ErrorResponse {
        error: "Not found".to_string(),
        status: "error",
    })
}

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = config::Config::builder()
        .add_source(config::File::with_name("Config"))
        .build()?;

    let data_conf = settings.get_table("data")?;
    let logic_conf = settings.get_table("logic")?;
    let provider_conf = settings.get_table("provider")?;

    let intents_file = data_conf["intents_file"].clone().into_string()?;
    let similarity_threshold = logic_conf["similarity_threshold"].clone().into_float()? as f32;
    let confidence_threshold = logic_conf["confidence_threshold"].clone().into_float()? as f32;
    let history_window = logic_conf["history_window"].clone().into_int()? as usize;

    let corpus = Arc::new(IntentCorpus::load_from_file(&intents_file)?);
    anyhow::ensure!(
        !corpus.is_empty(),
        "Intents file '{}' defines no intents",
        intents_file
    );
    log::info!("Loaded {} intents from '{}'", corpus.len(), intents_file);

    let api_key = std::env::var(provider::ENV_API_KEY).unwrap_or_default();
    if api_key.is_empty() {
        log::warn!(
            "{} not set; low-confidence messages will get a fallback reply",
            provider::ENV_API_KEY
        );
    }
    let remote = AzureOpenAiProvider::new(
        provider_conf["base_url"].clone().into_string()?,
        api_key,
        provider_conf["model"].clone().into_string()?,
        Duration::from_secs(provider_conf["request_timeout_secs"].clone().into_int()? as u64),
    )?;

    // An explicit seed pins reply selection, useful for demos and testing.
    let responder = match logic_conf.get("rng_seed") {
        Some(seed) => ResponseGenerator::with_seed(corpus.clone(), seed.clone().into_int()? as u64),
        None => ResponseGenerator::new(corpus.clone()),
    };

    let engine = ChatEngine::new(
        IntentClassifier::new(corpus.clone(), similarity_threshold),
        responder,
        Arc::new(remote),
        Arc::new(InMemorySessionStore::new()),
        confidence_threshold,
        history_window,
    );
    let engine_data = web::Data::new(engine);
    let corpus_data = web::Data::from(corpus);

    let server_conf = settings.get_table("server")?;
    let host = server_conf["host"].clone().into_string()?;
    let port = server_conf["port"].clone().into_int()? as u16;

    log::info!("Starting server at http://{}:{}", host, port);
    HttpServer::new(move || {
        App::new()
            .app_data(engine_data.clone())
            .app_data(corpus_data.clone())
            .service(index)
            .service(chat_endpoint)
            .service(health_endpoint)
            .service(history_endpoint)
            .service(intents_endpoint)
            .default_service(web::route().to(not_found))
    })
    .bind((host, port))?
    .run()
    .await?;
    Ok(())
}
