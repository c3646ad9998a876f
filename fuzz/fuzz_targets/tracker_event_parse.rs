#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_session::{EventVerbosity, Tracker, TrackerEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let Some(event) = TrackerEvent::from_parameters(&payload) else {
        return;
    };
    let mut tracker = Tracker::new("fuzz");
    tracker.update(event);
    let state = tracker.current_state(EventVerbosity::All);
    assert_eq!(state["sender_id"], "fuzz");
    assert!(tracker.travel_back_in_time(f64::MAX).events().len() <= 1);
});
