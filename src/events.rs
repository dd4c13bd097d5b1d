// Event history extraction
use tracing::debug;

use crate::normalize::TrackingEvent;
use crate::tree::Children;

// Collects the attributes of each raw event node, oldest first.
//
// The carrier lists events newest first, so the collected sequence is
// reversed. A missing or empty list yields no events.
pub fn extract_events(raw_events: Option<&Children>) -> Vec<TrackingEvent> {
    let Some(raw_events) = raw_events else {
        return Vec::new();
    };

    let mut events: Vec<TrackingEvent> = raw_events
        .nodes()
        .iter()
        .enumerate()
        .filter_map(|(index, node)| match node.attributes() {
            Some(attributes) => Some(attributes.clone()),
            None => {
                debug!(index, "Dropping event without attributes");
                None
            }
        })
        .collect();
    events.reverse();
    events
}
