use super::test_helpers::*;
use crate::types::{
    ArchiveOutcome, Channel, Event, FailureKind, PublicationPreference, PublicationStatus,
    Recipient, SkipReason,
};

mod admin;

fn alice() -> Recipient {
    Recipient::new("alice@example.com")
}

/// Notifications off, drop-off into "/Bob"
fn bob() -> Recipient {
    let mut entry = PublicationPreference::new("mf");
    entry.notify_enabled = Some(false);
    entry.dropoff_enabled = Some(true);
    entry.custom_dropoff_destination = Some("/Bob".to_string());
    Recipient::new("bob@example.com").with_preferences(vec![entry])
}

fn carol() -> Recipient {
    Recipient::new("carol@example.com")
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn failure_kind(status: &PublicationStatus) -> Option<FailureKind> {
    match status {
        PublicationStatus::Failed { kind, .. } => Some(*kind),
        _ => None,
    }
}
