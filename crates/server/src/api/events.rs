//! Server-sent event stream of release events for the admin console.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::{convert::Infallible, time::Duration};
use tokio::sync::broadcast::error::RecvError;

use super::auth::AdminAuth;
use super::SharedState;

const HEARTBEAT: Duration = Duration::from_secs(15);

/// SSE endpoint with a heartbeat comment every 15 seconds
pub async fn events(
    _: AdminAuth,
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match tokio::time::timeout(HEARTBEAT, rx.recv()).await {
            Ok(Ok(event)) => {
                let sse = Event::default()
                    .event(event_name(&event.kind))
                    .id(event.id.clone())
                    .json_data(&event)
                    .unwrap_or_else(|_| Event::default().comment("unencodable event"));
                Some((Ok(sse), rx))
            }
            Ok(Err(RecvError::Lagged(skipped))) => {
                tracing::warn!(skipped, "Event stream subscriber lagged");
                Some((Ok(Event::default().comment("lagged")), rx))
            }
            Ok(Err(RecvError::Closed)) => None,
            Err(_) => Some((Ok(Event::default().comment("heartbeat")), rx)),
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn event_name(kind: &pressroom_core::pipeline::ReleaseEventKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "release".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pressroom_core::pipeline::ReleaseEventKind;

    #[test]
    fn test_event_names_are_snake_case() {
        assert_eq!(event_name(&ReleaseEventKind::DraftCompleted), "draft_completed");
        assert_eq!(event_name(&ReleaseEventKind::DistributionQueued), "distribution_queued");
    }
}
