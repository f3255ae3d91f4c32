//! Event endpoints: paged query and live SSE stream

use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::{stream, StreamExt};
use serde::Deserialize;
use std::time::Duration;

use super::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::control_plane::ControlPlane;
use crate::types::{Event, EventType};

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    /// Only events with a greater id.
    pub since: Option<u64>,
    pub limit: Option<usize>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
}

fn parse_type(raw: Option<&str>) -> Result<Option<EventType>, Response> {
    match raw {
        None => Ok(None),
        Some(s) => EventType::parse(s).map(Some).ok_or_else(|| {
            ApiErrorResponse::bad_request(format!("Unknown event type '{s}'"))
        }),
    }
}

/// GET /api/v1/events?since=ID&limit=N&type=T - oldest first
///
/// Without `since`, returns the newest `limit` events.
pub async fn list_events(
    State(plane): State<ControlPlane>,
    Query(q): Query<EventQuery>,
) -> Response {
    let event_type = match parse_type(q.event_type.as_deref()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let events: Vec<Event> = match q.since {
        Some(after) => plane
            .events_since(after, plane.events().capacity())
            .into_iter()
            .filter(|e| event_type.map_or(true, |t| e.event_type == t))
            .take(limit)
            .collect(),
        None => plane.recent_events(limit, event_type),
    };
    ApiResponse::ok(events)
}

fn to_sse(event: &Event) -> Result<SseEvent, axum::Error> {
    SseEvent::default()
        .id(event.id.to_string())
        .event(event.event_type.as_str())
        .json_data(event)
}

/// GET /api/v1/events/stream?since=ID&type=T
///
/// Server-sent events. Replays retained events after `since` (if given),
/// then follows the log live. The subscription is taken before the replay
/// is read, so nothing falls in between.
pub async fn stream_events(
    State(plane): State<ControlPlane>,
    Query(q): Query<EventQuery>,
) -> Response {
    let event_type = match parse_type(q.event_type.as_deref()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    let subscription = plane.subscribe();
    let backlog = q
        .since
        .map(|after| plane.events_since(after, plane.events().capacity()))
        .unwrap_or_default();
    let replayed_up_to = backlog
        .last()
        .map_or(q.since.unwrap_or(0), |e| e.id);

    let live = subscription
        .into_stream()
        .filter(move |e| futures::future::ready(e.id > replayed_up_to));
    let sse_stream = stream::iter(backlog)
        .chain(live)
        .filter(move |e| futures::future::ready(event_type.map_or(true, |t| e.event_type == t)))
        .map(|e| to_sse(&e));

    Sse::new(sse_stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}
