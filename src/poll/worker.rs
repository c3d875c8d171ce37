//! Poll loop and its dedicated worker thread.
//!
//! One cycle reads every claimed line, reports each transition to the sink and
//! synchronizes it so consumers see it immediately. The worker checks its shutdown
//! flag only between cycles, so a stop never interrupts a report, and
//! [`PollLoopHandle::stop`] joins the thread before handing the table and sink back.
//!
//! ## Ownership handoff
//! The loop is moved to the worker through a oneshot channel only after the thread
//! exists. If the thread cannot be created the caller gets the loop back, with its
//! lines still claimed and its sink still registered, and unwinds it like any other
//! startup failure.

use crate::error::PollkbError;
use crate::lines::{LineAccess, LineTable};
use crate::poll::SleepBand;
use crate::sink::ReportingSink;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

/// Name given to the worker thread.
pub const THREAD_NAME: &str = "pollkb-poll-0";

/// Lifecycle of the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// The worker thread is sampling lines
    Running,
    /// The worker has exited or was never started
    Stopped,
}

/// Owns the claimed line table and the registered sink while sampling.
pub struct PollLoop<A: LineAccess, S: ReportingSink> {
    table: LineTable<A>,
    sink: S,
    band: SleepBand,
    rng: StdRng,
    cycles: u64,
    /// Worker stack size; the platform default when `None`
    stack_size: Option<usize>,
}

impl<A: LineAccess, S: ReportingSink> PollLoop<A, S> {
    /// The table's lines should already be claimed and the sink registered.
    pub fn new(table: LineTable<A>, sink: S, band: SleepBand) -> Self {
        Self {
            table,
            sink,
            band,
            rng: StdRng::from_entropy(),
            cycles: 0,
            stack_size: None,
        }
    }

    /// Use a fixed seed for the sleep jitter.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Request a stack size in bytes for the worker thread.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// The table as of the last completed cycle.
    pub fn table(&self) -> &LineTable<A> {
        &self.table
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Sleep band drawn from between cycles.
    pub fn band(&self) -> SleepBand {
        self.band
    }

    /// Completed cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Give back the table and sink, for teardown.
    pub fn into_parts(self) -> (LineTable<A>, S) {
        (self.table, self.sink)
    }

    /// Run one sampling pass and return the number of transitions forwarded.
    pub fn run_cycle(&mut self) -> usize {
        let mut forwarded = 0;

        for transition in self.table.sample_and_diff() {
            debug!(
                "{} {}",
                transition.key,
                if transition.pressed { "down" } else { "up" }
            );

            if let Err(err) = self.sink.report_key(transition.key, transition.pressed) {
                warn!("Dropping transition for {}: {}", transition.key, err);
                continue;
            }
            if let Err(err) = self.sink.synchronize() {
                warn!("Synchronize after {} failed: {}", transition.key, err);
            }
            forwarded += 1;
        }

        self.cycles += 1;
        forwarded
    }

    fn run(mut self, shutdown: &AtomicBool) -> Self {
        while !shutdown.load(Ordering::SeqCst) {
            self.run_cycle();
            let pause = self.band.draw(&mut self.rng);
            thread::sleep(pause);
        }
        info!("Poll loop stopped after {} cycles", self.cycles);
        self
    }
}

impl<A, S> PollLoop<A, S>
where
    A: LineAccess + 'static,
    S: ReportingSink + 'static,
{
    /// Launch the loop on its own thread.
    ///
    /// On failure the loop is handed back untouched so the caller can unwind it.
    pub fn spawn(self) -> std::result::Result<PollLoopHandle<A, S>, (PollkbError, Self)> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let (handoff_tx, handoff_rx) = oneshot::channel::<Self>();

        let mut builder = thread::Builder::new().name(THREAD_NAME.to_string());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        let spawned =
            builder.spawn(move || handoff_rx.blocking_recv().ok().map(|poll| poll.run(&flag)));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => return Err((PollkbError::task_launch(err), self)),
        };

        let band = self.band;
        if let Err(poll) = handoff_tx.send(self) {
            // The thread only drops the receiver by exiting, which it cannot do first.
            let _ = thread.join();
            return Err((
                PollkbError::task_launch(std::io::Error::other("poll thread exited early")),
                poll,
            ));
        }

        info!(
            "Poll loop running at {} Hz (sleep {:?}..={:?})",
            band.frequency_hz(),
            band.min(),
            band.max()
        );
        Ok(PollLoopHandle {
            shutdown,
            thread: Some(thread),
        })
    }
}

/// Control handle of a running [`PollLoop`].
///
/// Dropping the handle stops and joins the thread.
pub struct PollLoopHandle<A: LineAccess, S: ReportingSink> {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<Option<PollLoop<A, S>>>>,
}

impl<A: LineAccess, S: ReportingSink> PollLoopHandle<A, S> {
    /// `Running` until the worker thread has exited.
    pub fn state(&self) -> LoopState {
        match &self.thread {
            Some(thread) if !thread.is_finished() => LoopState::Running,
            _ => LoopState::Stopped,
        }
    }

    /// Request a stop, wait for the thread to exit, and return the loop.
    ///
    /// Returns `None` only if the worker panicked.
    pub fn stop(mut self) -> Option<PollLoop<A, S>> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> Option<PollLoop<A, S>> {
        let thread = self.thread.take()?;
        self.shutdown.store(true, Ordering::SeqCst);
        match thread.join() {
            Ok(poll) => poll,
            Err(_) => {
                error!("Poll loop thread panicked");
                None
            }
        }
    }
}

impl<A: LineAccess, S: ReportingSink> Drop for PollLoopHandle<A, S> {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyCode;
    use crate::lines::{KeyTransition, LineDescriptor, SimulatedLines};
    use crate::sink::{DeviceIdentity, RecordingSink, SinkCall};
    use std::time::Duration;

    fn poll_loop(
        sim: &SimulatedLines,
        sink: &RecordingSink,
    ) -> PollLoop<SimulatedLines, RecordingSink> {
        let mut table = LineTable::new(
            sim.clone(),
            [
                LineDescriptor::new("A", 5, KeyCode::KEY_A),
                LineDescriptor::new("B", 6, KeyCode::KEY_B),
            ],
        );
        table.claim_all().unwrap();

        let mut sink = sink.clone();
        sink.declare_capability(KeyCode::KEY_A);
        sink.declare_capability(KeyCode::KEY_B);
        sink.register(&DeviceIdentity::default()).unwrap();

        PollLoop::new(table, sink, SleepBand::for_frequency(5000).unwrap()).with_seed(7)
    }

    #[test]
    fn level_sequence_produces_expected_events() {
        let sim = SimulatedLines::new();
        let sink = RecordingSink::new();
        let mut poll = poll_loop(&sim, &sink);

        sim.script_levels(5, [true, true, false, false, true]);
        sim.set_level(6, true);

        let per_cycle: Vec<usize> = (0..5).map(|_| poll.run_cycle()).collect();
        assert_eq!(per_cycle, vec![0, 0, 1, 0, 1]);
        assert_eq!(
            sink.events(),
            vec![
                KeyTransition {
                    key: KeyCode::KEY_A,
                    pressed: true
                },
                KeyTransition {
                    key: KeyCode::KEY_A,
                    pressed: false
                },
            ]
        );
        assert_eq!(poll.cycles(), 5);
    }

    #[test]
    fn every_report_is_followed_by_synchronize() {
        let sim = SimulatedLines::new();
        let sink = RecordingSink::new();
        let mut poll = poll_loop(&sim, &sink);

        sim.set_pressed(5, true);
        sim.set_pressed(6, true);
        assert_eq!(poll.run_cycle(), 2);

        let tail: Vec<SinkCall> = sink
            .calls()
            .into_iter()
            .skip_while(|call| !matches!(call, SinkCall::Report(_)))
            .collect();
        assert_eq!(
            tail,
            vec![
                SinkCall::Report(KeyTransition {
                    key: KeyCode::KEY_A,
                    pressed: true
                }),
                SinkCall::Synchronize,
                SinkCall::Report(KeyTransition {
                    key: KeyCode::KEY_B,
                    pressed: true
                }),
                SinkCall::Synchronize,
            ]
        );
        assert_eq!(sink.frames().len(), 2);
    }

    #[test]
    fn rejected_report_is_not_counted() {
        let sim = SimulatedLines::new();
        let sink = RecordingSink::new();
        let mut poll = poll_loop(&sim, &sink);
        let mut unregister = sink.clone();
        unregister.unregister();

        sim.set_pressed(5, true);
        assert_eq!(poll.run_cycle(), 0);
        // the line state still advanced, so the press is not re-reported
        assert!(poll.table().lines()[0].is_pressed());
    }

    #[test]
    fn spawned_loop_reports_and_stops() {
        let sim = SimulatedLines::new();
        let sink = RecordingSink::new();
        let handle = poll_loop(&sim, &sink).spawn().map_err(|(err, _)| err).unwrap();
        assert_eq!(handle.state(), LoopState::Running);

        sim.set_pressed(6, true);
        assert!(sink.wait_for_events(1, Duration::from_secs(2)));

        let poll = handle.stop().expect("worker exited cleanly");
        assert!(poll.cycles() > 0);
        assert_eq!(
            sink.events(),
            vec![KeyTransition {
                key: KeyCode::KEY_B,
                pressed: true
            }]
        );

        // stop() joined: nothing samples the lines any more
        let reads = sim.read_count();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(sim.read_count(), reads);

        let (table, _sink) = poll.into_parts();
        assert_eq!(table.claimed_count(), 2);
    }

    #[test]
    fn dropping_the_handle_stops_the_thread() {
        let sim = SimulatedLines::new();
        let sink = RecordingSink::new();
        let handle = poll_loop(&sim, &sink).spawn().map_err(|(err, _)| err).unwrap();
        drop(handle);

        // the loop and its table were dropped on join, releasing the lines
        assert!(sim.reserved_lines().is_empty());
    }

    /// Page aligned, but larger than any address space can map.
    const UNMAPPABLE_STACK: usize = isize::MAX as usize & !0xffff;

    #[test]
    fn failed_spawn_hands_the_loop_back() {
        let sim = SimulatedLines::new();
        let sink = RecordingSink::new();

        let (err, poll) = match poll_loop(&sim, &sink)
            .with_stack_size(UNMAPPABLE_STACK)
            .spawn()
        {
            Ok(_) => panic!("spawning with an impossible stack must fail"),
            Err(failed) => failed,
        };

        assert!(matches!(err, PollkbError::TaskLaunchFailed { .. }));
        assert_eq!(poll.cycles(), 0);
        assert_eq!(poll.table().claimed_count(), 2);
        assert!(sink.is_registered());
        assert_eq!(sim.read_count(), 0);
    }
}
