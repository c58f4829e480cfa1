//! 变更事件去重
//!
//! Reduces a page of change events to the latest event per object while
//! keeping chronological order.

use std::collections::HashSet;

use crate::models::ChangeEvent;

/// Latest event per object id, oldest first.
///
/// Walks the page from newest to oldest, keeps the first event seen for each
/// object and reverses the result back into log order.
pub fn extract_latest(events: &[ChangeEvent]) -> Vec<ChangeEvent> {
    let mut seen = HashSet::with_capacity(events.len());
    let mut latest: Vec<ChangeEvent> = events
        .iter()
        .rev()
        .filter(|event| seen.insert(event.object_id.as_str()))
        .cloned()
        .collect();
    latest.reverse();
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChangeType;
    use proptest::prelude::*;

    #[test]
    fn test_superseded_events_are_dropped() {
        let events = vec![
            ChangeEvent::new("X", ChangeType::Updated, 1),
            ChangeEvent::new("Y", ChangeType::Created, 2),
            ChangeEvent::new("X", ChangeType::Deleted, 3),
        ];
        assert_eq!(
            extract_latest(&events),
            vec![
                ChangeEvent::new("Y", ChangeType::Created, 2),
                ChangeEvent::new("X", ChangeType::Deleted, 3),
            ]
        );
    }

    #[test]
    fn test_empty_page() {
        assert!(extract_latest(&[]).is_empty());
    }

    fn change_type() -> impl Strategy<Value = ChangeType> {
        prop_oneof![
            Just(ChangeType::Created),
            Just(ChangeType::Updated),
            Just(ChangeType::Deleted),
        ]
    }

    proptest! {
        #[test]
        fn prop_one_event_per_object_in_input_order(
            raw in prop::collection::vec(("[a-e]", change_type()), 0..40)
        ) {
            let events: Vec<ChangeEvent> = raw
                .into_iter()
                .enumerate()
                .map(|(i, (id, t))| ChangeEvent::new(id, t, i as u64))
                .collect();
            let latest = extract_latest(&events);

            let distinct: HashSet<&str> = events.iter().map(|e| e.object_id.as_str()).collect();
            prop_assert_eq!(latest.len(), distinct.len());

            for window in latest.windows(2) {
                prop_assert!(window[0].position < window[1].position);
            }
            for kept in &latest {
                let newest = events
                    .iter()
                    .filter(|e| e.object_id == kept.object_id)
                    .map(|e| e.position)
                    .max();
                prop_assert_eq!(Some(kept.position), newest);
            }
        }
    }
}
