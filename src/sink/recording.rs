//! Sink that records everything it is told.
//!
//! Clones share one log, so a test can hand one clone to the poll loop and inspect
//! another.

use crate::error::SinkError;
use crate::keys::KeyCode;
use crate::lines::KeyTransition;
use crate::sink::{DeviceIdentity, ReportingSink};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One call made on the sink, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Declare(KeyCode),
    /// Registration attempt with the device name, recorded even when refused
    Register(String),
    /// Accepted report; rejected reports are not recorded
    Report(KeyTransition),
    Synchronize,
    Unregister,
}

/// Sink for tests: records calls and synchronized frames.
///
/// Reports are rejected unless the sink is registered, like a real device.
#[derive(Clone, Default)]
pub struct RecordingSink {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<RecState>,
    synced: Condvar,
}

#[derive(Default)]
struct RecState {
    calls: Vec<SinkCall>,
    pending: Vec<KeyTransition>,
    frames: Vec<Vec<KeyTransition>>,
    registered: bool,
    refuse_registration: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `register` calls fail.
    pub fn refuse_registration(&self) {
        self.shared.state.lock().refuse_registration = true;
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<SinkCall> {
        self.shared.state.lock().calls.clone()
    }

    /// Synchronized frames in order.
    pub fn frames(&self) -> Vec<Vec<KeyTransition>> {
        self.shared.state.lock().frames.clone()
    }

    /// All synchronized transitions, flattened.
    pub fn events(&self) -> Vec<KeyTransition> {
        self.shared.state.lock().frames.concat()
    }

    /// Declared keys in declaration order, duplicates included.
    pub fn declared(&self) -> Vec<KeyCode> {
        self.shared
            .state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SinkCall::Declare(key) => Some(*key),
                _ => None,
            })
            .collect()
    }

    pub fn is_registered(&self) -> bool {
        self.shared.state.lock().registered
    }

    /// How many recorded calls equal `wanted`.
    pub fn count(&self, wanted: &SinkCall) -> usize {
        self.shared
            .state
            .lock()
            .calls
            .iter()
            .filter(|call| *call == wanted)
            .count()
    }

    /// Block until at least `count` transitions were synchronized or `timeout` passes.
    pub fn wait_for_events(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.frames.iter().map(Vec::len).sum::<usize>() < count {
            if self.shared.synced.wait_until(&mut state, deadline).timed_out() {
                return state.frames.iter().map(Vec::len).sum::<usize>() >= count;
            }
        }
        true
    }
}

impl ReportingSink for RecordingSink {
    fn declare_capability(&mut self, key: KeyCode) {
        self.shared.state.lock().calls.push(SinkCall::Declare(key));
    }

    fn register(&mut self, identity: &DeviceIdentity) -> Result<(), SinkError> {
        let mut state = self.shared.state.lock();
        state.calls.push(SinkCall::Register(identity.name.clone()));
        if state.refuse_registration {
            return Err(SinkError::registration("registration refused"));
        }
        state.registered = true;
        Ok(())
    }

    fn report_key(&mut self, key: KeyCode, pressed: bool) -> Result<(), SinkError> {
        let mut state = self.shared.state.lock();
        if !state.registered {
            return Err(SinkError::report("sink is not registered"));
        }
        let transition = KeyTransition { key, pressed };
        state.calls.push(SinkCall::Report(transition));
        state.pending.push(transition);
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), SinkError> {
        let mut state = self.shared.state.lock();
        state.calls.push(SinkCall::Synchronize);
        if !state.pending.is_empty() {
            let frame = std::mem::take(&mut state.pending);
            state.frames.push(frame);
        }
        drop(state);
        self.shared.synced.notify_all();
        Ok(())
    }

    fn unregister(&mut self) {
        let mut state = self.shared.state.lock();
        state.calls.push(SinkCall::Unregister);
        state.registered = false;
        state.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_group_reports_between_synchronize_calls() {
        let mut sink = RecordingSink::new();
        let observer = sink.clone();
        sink.register(&DeviceIdentity::default()).unwrap();

        sink.report_key(KeyCode::KEY_A, true).unwrap();
        sink.synchronize().unwrap();
        sink.synchronize().unwrap();
        sink.report_key(KeyCode::KEY_A, false).unwrap();
        sink.report_key(KeyCode::KEY_B, true).unwrap();
        sink.synchronize().unwrap();

        let frames = observer.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].len(), 2);
        assert_eq!(observer.count(&SinkCall::Synchronize), 3);
    }

    #[test]
    fn reports_before_register_are_rejected() {
        let mut sink = RecordingSink::new();
        assert!(sink.report_key(KeyCode::KEY_A, true).is_err());
    }

    #[test]
    fn wait_for_events_times_out() {
        let sink = RecordingSink::new();
        assert!(!sink.wait_for_events(1, Duration::from_millis(10)));
        assert!(sink.wait_for_events(0, Duration::from_millis(10)));
    }
}
