//! HTTP read API
//!
//! Serves the aggregator's current state as JSON and exposes the manual
//! fetch trigger and the operator-triggered retention sweep. The aggregate
//! endpoints only ever go through `EventAggregator`; the `/events` family
//! reports on what the database holds.
//!
//! | Route                   | Handler                        |
//! |-------------------------|--------------------------------|
//! | `GET  /event-counts`    | event type → count object      |
//! | `GET  /unique-actors`   | array of actor logins          |
//! | `GET  /unique-repo-urls`| array of repository URLs       |
//! | `GET  /unique-emails`   | array of commit author emails  |
//! | `GET  /summary`         | all four of the above          |
//! | `GET  /status`          | scheduler state                |
//! | `GET  /events`          | every stored event             |
//! | `GET  /events/counts`   | stored events per type         |
//! | `GET  /events/actors`   | distinct stored actor logins   |
//! | `POST /fetch`           | run one cycle now              |
//! | `POST /retention`       | delete expired stored events   |
//! | `POST /shutdown`        | request graceful shutdown      |

pub mod handlers;

use crate::pipeline::{EventAggregator, EventStore, FetchScheduler};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::Notify;
use warp::{Filter, Rejection, Reply};

/// Shared handles injected into every route
#[derive(Clone)]
pub struct ApiState {
    pub aggregator: Arc<EventAggregator>,
    pub store: Arc<dyn EventStore>,
    pub scheduler: Arc<FetchScheduler>,
    pub retention: chrono::Duration,
    pub shutdown: Arc<Notify>,
}

fn with_state(
    state: ApiState,
) -> impl Filter<Extract = (ApiState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// All routes of the read API
pub fn routes(state: ApiState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let event_counts = warp::get()
        .and(warp::path("event-counts"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .map(handlers::event_counts);

    let unique_actors = warp::get()
        .and(warp::path("unique-actors"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .map(handlers::unique_actors);

    let unique_repo_urls = warp::get()
        .and(warp::path("unique-repo-urls"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .map(handlers::unique_repo_urls);

    let unique_emails = warp::get()
        .and(warp::path("unique-emails"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .map(handlers::unique_emails);

    let summary = warp::get()
        .and(warp::path("summary"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .map(handlers::summary);

    let status = warp::get()
        .and(warp::path("status"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .map(handlers::status);

    let events = warp::get()
        .and(warp::path("events"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .and_then(handlers::list_events);

    let stored_counts = warp::get()
        .and(warp::path("events"))
        .and(warp::path("counts"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .and_then(handlers::stored_counts);

    let stored_actors = warp::get()
        .and(warp::path("events"))
        .and(warp::path("actors"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .and_then(handlers::stored_actors);

    let fetch = warp::post()
        .and(warp::path("fetch"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .and_then(handlers::trigger_fetch);

    let retention = warp::post()
        .and(warp::path("retention"))
        .and(warp::path::end())
        .and(with_state(state.clone()))
        .and_then(handlers::retention_sweep);

    let shutdown = warp::post()
        .and(warp::path("shutdown"))
        .and(warp::path::end())
        .and(with_state(state))
        .map(handlers::shutdown);

    event_counts
        .or(unique_actors)
        .or(unique_repo_urls)
        .or(unique_emails)
        .or(summary)
        .or(status)
        .or(events)
        .or(stored_counts)
        .or(stored_actors)
        .or(fetch)
        .or(retention)
        .or(shutdown)
        .with(warp::log("ghflow::api"))
}
