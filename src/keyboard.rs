//! Host lifecycle: bring the whole keyboard up and tear it down again.
//!
//! Startup order is: declare key capabilities, claim every line, register the sink,
//! launch the poll loop. Teardown runs in reverse and is the same routine whether it
//! follows a clean run or a failure halfway through startup.

use crate::config::KeyboardConfig;
use crate::error::{PollkbError, Result};
use crate::keys::{KeyCode, UDEV_FILLER_KEYS};
use crate::lines::{LineAccess, LineDescriptor, LineTable};
use crate::poll::{LoopState, PollLoop, PollLoopHandle, SleepBand};
use crate::sink::ReportingSink;
use log::{error, info, warn};
use std::collections::BTreeSet;

/// A running (or torn down) polling keyboard.
///
/// Each resource lives in an optional slot; whatever is present is unwound by
/// [`teardown`](Self::teardown). While the loop runs, the table and sink are owned by
/// the worker thread and the slots are empty.
pub struct PollingKeyboard<A: LineAccess, S: ReportingSink> {
    name: String,
    table: Option<LineTable<A>>,
    sink: Option<S>,
    sink_registered: bool,
    worker: Option<PollLoopHandle<A, S>>,
}

impl<A, S> PollingKeyboard<A, S>
where
    A: LineAccess + 'static,
    S: ReportingSink + 'static,
{
    /// Bring the keyboard up.
    ///
    /// On failure everything acquired so far is released before the error is returned.
    pub fn start(config: &KeyboardConfig, access: A, sink: S) -> Result<Self> {
        config.validate()?;
        let band = SleepBand::for_frequency(config.frequency_hz)?;

        let mut keyboard = Self {
            name: config.device.name.clone(),
            table: Some(LineTable::new(access, config.descriptors())),
            sink: Some(sink),
            sink_registered: false,
            worker: None,
        };

        match keyboard.bring_up(config, band) {
            Ok(()) => {
                info!("{} initialized.", keyboard.name);
                Ok(keyboard)
            }
            Err(err) => {
                error!("{} failed to start: {}", keyboard.name, err);
                keyboard.teardown();
                Err(err)
            }
        }
    }

    fn bring_up(&mut self, config: &KeyboardConfig, band: SleepBand) -> Result<()> {
        let (Some(table), Some(sink)) = (self.table.as_mut(), self.sink.as_mut()) else {
            return Err(PollkbError::config("keyboard was already started"));
        };

        let mut keys: BTreeSet<KeyCode> =
            table.lines().iter().map(LineDescriptor::key).collect();
        if config.udev_filler_keys {
            keys.extend(UDEV_FILLER_KEYS.iter().copied());
        }
        for key in keys {
            sink.declare_capability(key);
        }

        table.claim_all()?;

        sink.register(&config.device)?;
        self.sink_registered = true;

        let (Some(table), Some(sink)) = (self.table.take(), self.sink.take()) else {
            return Err(PollkbError::config("keyboard was already started"));
        };
        let mut poll = PollLoop::new(table, sink, band);
        if let Some(bytes) = config.worker_stack_size {
            poll = poll.with_stack_size(bytes);
        }
        match poll.spawn() {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err((err, poll)) => {
                let (table, sink) = poll.into_parts();
                self.table = Some(table);
                self.sink = Some(sink);
                Err(err)
            }
        }
    }
}

impl<A: LineAccess, S: ReportingSink> PollingKeyboard<A, S> {
    /// Device name from the configuration, used in lifecycle logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Running` while the poll loop is active.
    pub fn state(&self) -> LoopState {
        self.worker
            .as_ref()
            .map_or(LoopState::Stopped, PollLoopHandle::state)
    }

    /// The line table, once the loop no longer owns it.
    pub fn table(&self) -> Option<&LineTable<A>> {
        self.table.as_ref()
    }

    /// The sink, once the loop no longer owns it.
    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }

    /// Stop the loop, unregister the sink, and release every line.
    ///
    /// Works from any partially started state and may be called repeatedly.
    pub fn teardown(&mut self) {
        if let Some(worker) = self.worker.take() {
            match worker.stop() {
                Some(poll) => {
                    let (table, sink) = poll.into_parts();
                    self.table = Some(table);
                    self.sink = Some(sink);
                }
                // The loop's table released its lines while unwinding
                None => error!("Poll loop did not exit cleanly"),
            }
        }

        if self.sink_registered {
            match self.sink.as_mut() {
                Some(sink) => sink.unregister(),
                None => warn!(
                    "{}: sink was lost with the poll loop, skipping unregister",
                    self.name
                ),
            }
            self.sink_registered = false;
        }

        if let Some(table) = self.table.as_mut() {
            table.release_all();
        }
    }

    /// Tear down and log the exit.
    pub fn stop(mut self) {
        self.teardown();
        info!("{} exiting.", self.name);
    }
}

impl<A: LineAccess, S: ReportingSink> Drop for PollingKeyboard<A, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
