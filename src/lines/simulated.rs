//! In-memory line backend.
//!
//! `SimulatedLines` is cheap to clone; all clones share one state, so a test can keep
//! a handle and drive levels while the poll loop owns another clone.

use crate::error::LineError;
use crate::lines::{LineAccess, LineId, INACTIVE_LEVEL};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Lines whose levels are set by the test or the binary's `--simulate` mode.
///
/// Unset lines read [`INACTIVE_LEVEL`].
#[derive(Clone, Default)]
pub struct SimulatedLines {
    inner: Arc<Mutex<SimState>>,
}

#[derive(Default)]
struct SimState {
    levels: HashMap<LineId, LevelSource>,
    reserved: BTreeSet<LineId>,
    busy: HashSet<LineId>,
    failing_configure: HashSet<LineId>,
    failing_reads: HashSet<LineId>,
    reserve_calls: usize,
    release_calls: usize,
    read_calls: usize,
}

/// Scripted levels are consumed one per read; the last one sticks.
struct LevelSource {
    script: VecDeque<bool>,
    current: bool,
}

impl Default for LevelSource {
    fn default() -> Self {
        Self {
            script: VecDeque::new(),
            current: INACTIVE_LEVEL,
        }
    }
}

impl LevelSource {
    fn next(&mut self) -> bool {
        if let Some(level) = self.script.pop_front() {
            self.current = level;
        }
        self.current
    }
}

impl SimulatedLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the raw level of a line, discarding any pending script.
    pub fn set_level(&self, line: LineId, level: bool) {
        let mut state = self.inner.lock();
        let source = state.levels.entry(line).or_default();
        source.script.clear();
        source.current = level;
    }

    /// Set the key state of an active-low line.
    pub fn set_pressed(&self, line: LineId, pressed: bool) {
        self.set_level(line, !pressed);
    }

    /// Queue raw levels returned by successive reads of `line`.
    pub fn script_levels(&self, line: LineId, levels: impl IntoIterator<Item = bool>) {
        let mut state = self.inner.lock();
        state
            .levels
            .entry(line)
            .or_default()
            .script
            .extend(levels);
    }

    /// Make `reserve` report the line as owned by someone else.
    pub fn mark_busy(&self, line: LineId) {
        self.inner.lock().busy.insert(line);
    }

    /// Make `configure_as_input` fail for `line`.
    pub fn fail_configure(&self, line: LineId) {
        self.inner.lock().failing_configure.insert(line);
    }

    /// Toggle read failures for `line`.
    pub fn fail_reads(&self, line: LineId, failing: bool) {
        let mut state = self.inner.lock();
        if failing {
            state.failing_reads.insert(line);
        } else {
            state.failing_reads.remove(&line);
        }
    }

    pub fn is_reserved(&self, line: LineId) -> bool {
        self.inner.lock().reserved.contains(&line)
    }

    /// Currently reserved lines in ascending order.
    pub fn reserved_lines(&self) -> Vec<LineId> {
        self.inner.lock().reserved.iter().copied().collect()
    }

    /// Number of `reserve` calls, successful or not.
    pub fn reserve_count(&self) -> usize {
        self.inner.lock().reserve_calls
    }

    /// Number of `release` calls that released a reserved line.
    pub fn release_count(&self) -> usize {
        self.inner.lock().release_calls
    }

    /// Number of `read_level` calls, successful or not.
    pub fn read_count(&self) -> usize {
        self.inner.lock().read_calls
    }
}

impl LineAccess for SimulatedLines {
    fn reserve(&mut self, line: LineId, label: &str) -> Result<(), LineError> {
        let mut state = self.inner.lock();
        state.reserve_calls += 1;

        if state.busy.contains(&line) || !state.reserved.insert(line) {
            return Err(LineError::AlreadyInUse {
                line,
                label: label.to_string(),
            });
        }
        Ok(())
    }

    fn configure_as_input(&mut self, line: LineId) -> Result<(), LineError> {
        let state = self.inner.lock();
        if !state.reserved.contains(&line) {
            return Err(LineError::config_failed(line, "line is not reserved"));
        }
        if state.failing_configure.contains(&line) {
            return Err(LineError::config_failed(line, "simulated direction failure"));
        }
        Ok(())
    }

    fn read_level(&mut self, line: LineId) -> Result<bool, LineError> {
        let mut state = self.inner.lock();
        state.read_calls += 1;

        if state.failing_reads.contains(&line) {
            return Err(LineError::read_failed(line, "simulated read failure"));
        }
        Ok(state.levels.entry(line).or_default().next())
    }

    fn release(&mut self, line: LineId) {
        let mut state = self.inner.lock();
        if state.reserved.remove(&line) {
            state.release_calls += 1;
        }
    }
}
