// Server-Sent Events streaming of field updates
use crate::domain::field::FieldUpdate;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast::{self, error::RecvError};

/// Event name for an update whose value moved since the last observation
pub const CHANGED_EVENT: &str = "changed";
pub const UPDATE_EVENT: &str = "update";

pub fn event_for(update: &FieldUpdate) -> Result<Event, axum::Error> {
    let name = if update.changed { CHANGED_EVENT } else { UPDATE_EVENT };
    Event::default().event(name).json_data(update)
}

/// Helper to create an SSE response from a poller subscription
pub fn sse_from_receiver(
    mut rx: broadcast::Receiver<FieldUpdate>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(update) => match event_for(&update) {
                    Ok(event) => {
                        yield Ok::<Event, Infallible>(event);
                    }
                    Err(e) => tracing::warn!("Dropping update for {}: {}", update.key, e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("SSE client lagging, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::FieldKey;
    use chrono::Utc;

    #[test]
    fn test_event_for_serializes_update() {
        let key = FieldKey::new("mall", "door", "person_in");
        assert!(event_for(&FieldUpdate::new(key.clone(), None, 1.0, Utc::now())).is_ok());
        assert!(event_for(&FieldUpdate::new(key, Some(1.0), 2.0, Utc::now())).is_ok());
    }
}
