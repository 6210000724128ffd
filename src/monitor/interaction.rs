use std::sync::{Mutex, PoisonError};

use crate::platform::page::ElementInfo;

/// A user interaction observed by the interaction listener.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Interaction {
    pub event_type: String,
    /// Event target and its ancestors, innermost first.
    pub path: Vec<ElementInfo>,
}

/// Remembers the most recent user interaction so errors can point at what the user
/// last touched.
#[derive(Debug, Default)]
pub struct LastEventTracker {
    last: Mutex<Option<Interaction>>,
}

impl LastEventTracker {
    pub fn record(&self, interaction: Interaction) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(interaction);
    }

    pub fn last(&self) -> Option<Interaction> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_latest_interaction() {
        let tracker = LastEventTracker::default();
        assert!(tracker.last().is_none());
        tracker.record(Interaction {
            event_type: "click".into(),
            path: vec![ElementInfo::new("BUTTON")],
        });
        tracker.record(Interaction {
            event_type: "keydown".into(),
            path: vec![ElementInfo::new("INPUT")],
        });
        assert_eq!(tracker.last().unwrap().event_type, "keydown");
        tracker.clear();
        assert!(tracker.last().is_none());
    }
}
