use super::ApiState;
use crate::pipeline::retention::run_retention_sweep;
use crate::pipeline::TriggerOutcome;
use serde::Serialize;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::{json, with_status, Json, WithStatus};

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'a str>,
}

fn error_reply(status: StatusCode, error: String, kind: Option<&str>) -> WithStatus<Json> {
    with_status(json(&ErrorBody { error, kind }), status)
}

pub fn event_counts(state: ApiState) -> Json {
    json(&state.aggregator.event_type_counts())
}

pub fn unique_actors(state: ApiState) -> Json {
    json(&state.aggregator.unique_actors())
}

pub fn unique_repo_urls(state: ApiState) -> Json {
    json(&state.aggregator.unique_repo_urls())
}

pub fn unique_emails(state: ApiState) -> Json {
    json(&state.aggregator.unique_emails())
}

pub fn summary(state: ApiState) -> Json {
    json(&state.aggregator.snapshot())
}

pub fn status(state: ApiState) -> Json {
    json(&serde_json::json!({
        "state": state.scheduler.state().as_str(),
        "interval_secs": state.scheduler.interval().as_secs(),
    }))
}

pub async fn list_events(state: ApiState) -> Result<WithStatus<Json>, Infallible> {
    Ok(match state.store.list_all().await {
        Ok(events) => with_status(json(&events), StatusCode::OK),
        Err(e) => {
            log::error!("❌ Failed to list stored events: {}", e);
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None)
        }
    })
}

pub async fn stored_counts(state: ApiState) -> Result<WithStatus<Json>, Infallible> {
    Ok(match state.store.count_by_type().await {
        Ok(counts) => with_status(json(&counts), StatusCode::OK),
        Err(e) => {
            log::error!("❌ Failed to count stored events: {}", e);
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None)
        }
    })
}

pub async fn stored_actors(state: ApiState) -> Result<WithStatus<Json>, Infallible> {
    Ok(match state.store.distinct_actors().await {
        Ok(actors) => with_status(json(&actors), StatusCode::OK),
        Err(e) => {
            log::error!("❌ Failed to list stored actors: {}", e);
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None)
        }
    })
}

/// Manual trigger; shares the scheduler's single-flight guard
pub async fn trigger_fetch(state: ApiState) -> Result<WithStatus<Json>, Infallible> {
    Ok(match state.scheduler.trigger().await {
        TriggerOutcome::Completed(report) => with_status(json(&report), StatusCode::OK),
        TriggerOutcome::AlreadyRunning => error_reply(
            StatusCode::CONFLICT,
            "fetch already in progress".to_string(),
            None,
        ),
        TriggerOutcome::Failed(e) => {
            error_reply(StatusCode::BAD_GATEWAY, e.to_string(), Some(e.kind().as_str()))
        }
        TriggerOutcome::Interrupted(msg) => {
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, msg, None)
        }
    })
}

pub async fn retention_sweep(state: ApiState) -> Result<WithStatus<Json>, Infallible> {
    let now = chrono::Utc::now();
    Ok(
        match run_retention_sweep(state.store.as_ref(), state.retention, now).await {
            Ok(report) => with_status(json(&report), StatusCode::OK),
            Err(e) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None),
        },
    )
}

pub fn shutdown(state: ApiState) -> WithStatus<Json> {
    log::info!("⚠️  Shutdown requested over HTTP");
    state.shutdown.notify_one();
    with_status(
        json(&serde_json::json!({ "status": "shutting down" })),
        StatusCode::ACCEPTED,
    )
}
