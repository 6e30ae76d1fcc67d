use crate::domain::answer::QueryResponse;
use crate::interfaces::state::AppState;
use actix_cors::Cors;
use actix_web::{dev::Server, get, post, web, App, HttpResponse, HttpServer, Responder};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

pub const WELCOME_MESSAGE: &str = "Welcome to the Text-to-SQL API. Post your questions to /query";
const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub app_state: Arc<AppState>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Serialize)]
struct WelcomeResponse {
    message: &'static str,
}

#[get("/")]
async fn root() -> impl Responder {
    HttpResponse::Ok().json(WelcomeResponse {
        message: WELCOME_MESSAGE,
    })
}

/// Pipeline failures are reported in the body with status 200.
#[post("/query")]
async fn query(data: web::Data<HttpState>, req: web::Json<QueryRequest>) -> impl Responder {
    let logs = &data.app_state.logs;
    add_log(logs, "INFO", "HttpApi", &format!("Question: {}", req.question));

    let result = data.app_state.text_to_sql.execute(&req.question).await;
    match &result {
        Ok(record) => add_log(
            logs,
            "INFO",
            "HttpApi",
            &format!(
                "Answered from {} ({} rows)",
                record.selected_table,
                record.query_result.len()
            ),
        ),
        Err(failure) => add_log(logs, "ERROR", "HttpApi", &failure.to_string()),
    }

    HttpResponse::Ok().json(QueryResponse::from(result))
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    let logs = data
        .app_state
        .logs
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    HttpResponse::Ok().json(&*logs)
}

pub fn add_log_entry(
    logs: &Mutex<Vec<LogEntry>>,
    level: &str,
    source: &str,
    message: &str,
) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    let mut logs = logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    logs.push(entry.clone());
    if logs.len() > MAX_LOG_ENTRIES {
        logs.remove(0);
    }
    entry
}

/// Records an entry in the in-memory ring and mirrors it to tracing.
pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    match level {
        "ERROR" => error!(source = source, "{}", message),
        "WARN" => warn!(source = source, "{}", message),
        "DEBUG" => debug!(source = source, "{}", message),
        _ => info!(source = source, "{}", message),
    }
    add_log_entry(logs, level, source, message);
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(root).service(query).service(get_logs);
}

pub fn start_server(app_state: Arc<AppState>, host: &str, port: u16) -> std::io::Result<Server> {
    let state = web::Data::new(HttpState { app_state });

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
