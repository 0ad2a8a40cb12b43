use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use bar_cut::engine::{self, MaterialOutcome};
use bar_cut::gate;
use bar_cut::types::{CutBar, SolveStats, deserialize_u32_from_number};
use bar_cut::{MaterialJob, SolverConfig, StockSpec};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    materials: Vec<MaterialRequest>,
    #[serde(default)]
    time_limit_ms: Option<u64>,
}

#[derive(Deserialize, Serialize)]
struct MaterialRequest {
    code: String,
    #[serde(flatten)]
    stock: StockSpec,
    pieces: Vec<PieceRequest>,
}

#[derive(Deserialize, Serialize)]
struct PieceRequest {
    length: f64,
    #[serde(default = "default_qty", deserialize_with = "deserialize_u32_from_number")]
    qty: u32,
}

fn default_qty() -> u32 {
    1
}

#[derive(Serialize)]
struct OptimizeResponse {
    materials: Vec<MaterialResponse>,
    total_bars: usize,
}

#[derive(Serialize)]
struct MaterialResponse {
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<PlanResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct PlanResponse {
    stock: StockSpec,
    bars: Vec<CutBar>,
    bar_count: usize,
    waste_percent: f64,
    purchased_length: f64,
    used_length: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    purchased_mass: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    used_mass: Option<f64>,
    stats: SolveStats,
}

/// Expands piece quantities per material. Materials over the piece limit
/// get their outcome up front; the rest leave a `None` slot for the solver.
fn build_jobs(
    materials: Vec<MaterialRequest>,
) -> (Vec<MaterialJob>, Vec<Option<MaterialOutcome>>) {
    let mut jobs = Vec::new();
    let mut slots = Vec::with_capacity(materials.len());
    for m in materials {
        let items: Vec<(f64, u32)> = m.pieces.iter().map(|p| (p.length, p.qty)).collect();
        match gate::expand_pieces(&m.code, &items) {
            Ok(pieces) => {
                jobs.push(MaterialJob::new(m.code, m.stock, pieces));
                slots.push(None);
            }
            Err(err) => {
                tracing::info!(code = %m.code, error = %err, "rejected material");
                slots.push(Some(MaterialOutcome {
                    code: m.code,
                    result: Err(err),
                }));
            }
        }
    }
    (jobs, slots)
}

async fn optimize(
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );

    if req.materials.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "at least one material is required".to_string(),
        ));
    }

    let mut config = SolverConfig::from_env();
    if let Some(ms) = req.time_limit_ms {
        config = config.with_time_limit(Duration::from_millis(ms));
    }

    let (jobs, slots) = build_jobs(req.materials);

    let solved = tokio::task::spawn_blocking(move || engine::optimize_materials(jobs, &config))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("solver task failed: {e}")))?;
    let mut solved = solved.into_iter();
    let outcomes: Vec<MaterialOutcome> = slots
        .into_iter()
        .filter_map(|slot| slot.or_else(|| solved.next()))
        .collect();

    let materials: Vec<MaterialResponse> = outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(plan) => MaterialResponse {
                code: outcome.code,
                plan: Some(PlanResponse {
                    bar_count: plan.bar_count(),
                    waste_percent: plan.waste_percent(),
                    purchased_length: plan.purchased_length(),
                    used_length: plan.used_length(),
                    purchased_mass: plan.purchased_mass(),
                    used_mass: plan.used_mass(),
                    stock: plan.stock,
                    stats: plan.stats,
                    bars: plan.bars,
                }),
                error: None,
            },
            Err(err) => MaterialResponse {
                code: outcome.code,
                plan: None,
                error: Some(err.to_string()),
            },
        })
        .collect();

    let total_bars = materials
        .iter()
        .filter_map(|m| m.plan.as_ref())
        .map(|p| p.bar_count)
        .sum();

    Ok(Json(OptimizeResponse {
        materials,
        total_bars,
    }))
}

#[tokio::main]
async fn main() {
    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let app = Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    eprintln!("Listening on {addr}");
    axum::serve(listener, app).await.unwrap();
}
