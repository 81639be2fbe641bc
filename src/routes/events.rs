use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::{middleware::auth::Claims, AppState};

/// Server-sent stream of live inbox events, limited to the caller's company.
pub async fn stream_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.live_events.subscribe();
    let viewer_company = claims.company_id;
    let events = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) if !event.visible_to(viewer_company) => continue,
                Ok(event) => {
                    let sse = Event::default()
                        .event("message_received")
                        .json_data(&event)
                        .unwrap_or_else(|_| Event::default().comment("unserializable event"));
                    return Some((Ok(sse), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Live event subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => {
                    debug!("Live event channel closed");
                    return None;
                }
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
