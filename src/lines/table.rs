//! Fixed table of line descriptors with claim/sample/release operations.
//!
//! The table is built once at startup and never grows or shrinks. During steady-state
//! operation it is owned by the poll loop thread, so none of its state is locked.
//!
//! ## Debounce
//! No debounce filtering happens here: every level change observed since the previous
//! cycle is reported. Contact bounce is only hidden when the sampling interval is long
//! compared to the bounce time. Callers that need debouncing must filter the
//! transitions themselves.
//!
//! ## Failed reads
//! A read error leaves the line's stored state untouched, so the change is picked up
//! by the next good read. A line that keeps failing is logged once when it starts
//! failing and once when it recovers, never once per cycle.

use crate::error::LineError;
use crate::keys::KeyCode;
use crate::lines::{LineAccess, LineId};
use log::{debug, info, warn};

/// Raw level of a released key (switches pull the line low when pressed).
pub const INACTIVE_LEVEL: bool = true;

/// One physical switch bound to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDescriptor {
    label: String,
    line: LineId,
    key: KeyCode,
    /// Last processed raw level
    raw_state: bool,
    claimed: bool,
    /// Set while reads keep failing, so the failure is logged only once
    read_failing: bool,
}

impl LineDescriptor {
    pub fn new(label: impl Into<String>, line: LineId, key: KeyCode) -> Self {
        Self {
            label: label.into(),
            line,
            key,
            raw_state: INACTIVE_LEVEL,
            claimed: false,
            read_failing: false,
        }
    }

    /// Informational name, passed to the backend when the line is reserved.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Physical line this switch is wired to.
    pub fn line(&self) -> LineId {
        self.line
    }

    /// Key reported when the switch changes state.
    pub fn key(&self) -> KeyCode {
        self.key
    }

    /// Last processed raw level.
    pub fn raw_state(&self) -> bool {
        self.raw_state
    }

    /// Whether the last processed sample reported the key as pressed.
    pub fn is_pressed(&self) -> bool {
        !self.raw_state
    }

    /// Whether the line is currently reserved and configured as an input.
    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// Whether the most recent read of this line failed.
    pub fn is_read_failing(&self) -> bool {
        self.read_failing
    }
}

/// A reported change of a key's pressed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub key: KeyCode,
    /// `true` for a press, `false` for a release
    pub pressed: bool,
}

/// Owned, fixed-size collection of line descriptors plus the backend that reads them.
///
/// Dropping the table releases every claimed line.
pub struct LineTable<A: LineAccess> {
    access: A,
    lines: Box<[LineDescriptor]>,
}

impl<A: LineAccess> LineTable<A> {
    /// Build a table. Declaration order is preserved and fixes the event order.
    pub fn new(access: A, lines: impl IntoIterator<Item = LineDescriptor>) -> Self {
        Self {
            access,
            lines: lines.into_iter().collect(),
        }
    }

    /// Descriptors in declaration order.
    pub fn lines(&self) -> &[LineDescriptor] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The backend the table drives.
    pub fn access(&self) -> &A {
        &self.access
    }

    /// Number of lines currently claimed.
    pub fn claimed_count(&self) -> usize {
        self.lines.iter().filter(|desc| desc.claimed).count()
    }

    /// Reserve every line and put it into input mode.
    ///
    /// Either every line ends up claimed or none of the lines claimed by this call
    /// remain claimed. Each newly claimed line starts at [`INACTIVE_LEVEL`] whatever
    /// its physical level, so a key held down at startup is reported on the first cycle.
    pub fn claim_all(&mut self) -> Result<(), LineError> {
        let mut claimed_now = Vec::with_capacity(self.lines.len());

        for index in 0..self.lines.len() {
            if self.lines[index].claimed {
                continue;
            }

            if let Err(err) = self.claim_one(index) {
                for &undo in claimed_now.iter().rev() {
                    self.release_one(undo);
                }
                return Err(err);
            }
            claimed_now.push(index);
        }

        Ok(())
    }

    fn claim_one(&mut self, index: usize) -> Result<(), LineError> {
        let desc = &mut self.lines[index];

        self.access.reserve(desc.line, &desc.label)?;
        if let Err(err) = self.access.configure_as_input(desc.line) {
            self.access.release(desc.line);
            return Err(err);
        }

        desc.raw_state = INACTIVE_LEVEL;
        desc.read_failing = false;
        desc.claimed = true;
        debug!(
            "Claimed line {} ({}) for {}",
            desc.line, desc.label, desc.key
        );
        Ok(())
    }

    /// Release every claimed line. Safe to call any number of times.
    pub fn release_all(&mut self) {
        for index in 0..self.lines.len() {
            self.release_one(index);
        }
    }

    fn release_one(&mut self, index: usize) {
        let desc = &mut self.lines[index];
        if desc.claimed {
            self.access.release(desc.line);
            desc.claimed = false;
            debug!("Released line {} ({})", desc.line, desc.label);
        }
    }

    /// Sample every claimed line and yield one transition per changed line.
    ///
    /// Lines are visited lazily in declaration order; a line's stored state is
    /// updated as its transition is yielded. A failed read counts as "no change".
    pub fn sample_and_diff(&mut self) -> Transitions<'_, A> {
        Transitions {
            access: &mut self.access,
            lines: self.lines.iter_mut(),
        }
    }
}

impl<A: LineAccess> Drop for LineTable<A> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Lazy sequence of transitions produced by [`LineTable::sample_and_diff`].
pub struct Transitions<'a, A: LineAccess> {
    access: &'a mut A,
    lines: std::slice::IterMut<'a, LineDescriptor>,
}

impl<A: LineAccess> Iterator for Transitions<'_, A> {
    type Item = KeyTransition;

    fn next(&mut self) -> Option<KeyTransition> {
        for desc in self.lines.by_ref() {
            if !desc.claimed {
                continue;
            }

            let level = match self.access.read_level(desc.line) {
                Ok(level) => {
                    if desc.read_failing {
                        desc.read_failing = false;
                        info!("Line {} ({}) is readable again", desc.line, desc.label);
                    }
                    level
                }
                Err(err) => {
                    if !desc.read_failing {
                        desc.read_failing = true;
                        warn!(
                            "Treating samples of line {} ({}) as unchanged until reads recover: {}",
                            desc.line, desc.label, err
                        );
                    }
                    continue;
                }
            };

            if level != desc.raw_state {
                desc.raw_state = level;
                return Some(KeyTransition {
                    key: desc.key,
                    pressed: !level,
                });
            }
        }
        None
    }
}

impl<A: LineAccess> std::iter::FusedIterator for Transitions<'_, A> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::SimulatedLines;

    fn table(sim: &SimulatedLines) -> LineTable<SimulatedLines> {
        LineTable::new(
            sim.clone(),
            [
                LineDescriptor::new("A", 5, KeyCode::KEY_A),
                LineDescriptor::new("B", 6, KeyCode::KEY_B),
                LineDescriptor::new("C", 13, KeyCode::KEY_C),
            ],
        )
    }

    fn cycle<A: LineAccess>(table: &mut LineTable<A>) -> Vec<KeyTransition> {
        table.sample_and_diff().collect()
    }

    fn press(key: KeyCode) -> KeyTransition {
        KeyTransition { key, pressed: true }
    }

    fn release(key: KeyCode) -> KeyTransition {
        KeyTransition {
            key,
            pressed: false,
        }
    }

    #[test]
    fn quiescent_lines_emit_nothing() {
        let sim = SimulatedLines::new();
        let mut table = table(&sim);
        table.claim_all().unwrap();

        for _ in 0..50 {
            assert!(cycle(&mut table).is_empty());
        }
    }

    #[test]
    fn press_and_release_emit_exactly_once() {
        let sim = SimulatedLines::new();
        let mut table = table(&sim);
        table.claim_all().unwrap();

        sim.set_pressed(6, true);
        assert_eq!(cycle(&mut table), vec![press(KeyCode::KEY_B)]);
        assert!(cycle(&mut table).is_empty());
        assert!(table.lines()[1].is_pressed());

        sim.set_pressed(6, false);
        assert_eq!(cycle(&mut table), vec![release(KeyCode::KEY_B)]);
        assert!(cycle(&mut table).is_empty());
    }

    #[test]
    fn key_held_at_claim_is_reported_on_first_cycle() {
        let sim = SimulatedLines::new();
        sim.set_pressed(5, true);

        let mut table = table(&sim);
        table.claim_all().unwrap();
        assert!(table
            .lines()
            .iter()
            .all(|desc| desc.raw_state() == INACTIVE_LEVEL));

        assert_eq!(cycle(&mut table), vec![press(KeyCode::KEY_A)]);
        assert!(cycle(&mut table).is_empty());
    }

    #[test]
    fn transitions_follow_declaration_order() {
        let sim = SimulatedLines::new();
        let mut table = table(&sim);
        table.claim_all().unwrap();

        sim.set_pressed(13, true);
        sim.set_pressed(5, true);
        assert_eq!(
            cycle(&mut table),
            vec![press(KeyCode::KEY_A), press(KeyCode::KEY_C)]
        );
    }

    #[test]
    fn release_all_is_idempotent() {
        let sim = SimulatedLines::new();
        let mut table = table(&sim);
        table.claim_all().unwrap();
        assert_eq!(table.claimed_count(), 3);

        table.release_all();
        assert_eq!(table.claimed_count(), 0);
        assert!(sim.reserved_lines().is_empty());
        let releases = sim.release_count();

        table.release_all();
        assert_eq!(table.claimed_count(), 0);
        assert_eq!(sim.release_count(), releases);
    }

    #[test]
    fn release_all_on_never_claimed_table_is_noop() {
        let sim = SimulatedLines::new();
        let mut table = table(&sim);
        table.release_all();
        assert_eq!(sim.release_count(), 0);
    }

    #[test]
    fn failed_reserve_rolls_back_earlier_claims() {
        let sim = SimulatedLines::new();
        sim.mark_busy(6);

        let mut table = table(&sim);
        let err = table.claim_all().unwrap_err();

        assert!(matches!(err, LineError::AlreadyInUse { line: 6, .. }));
        assert_eq!(table.claimed_count(), 0);
        assert!(sim.reserved_lines().is_empty());
        // line 13 was never attempted
        assert_eq!(sim.reserve_count(), 2);
    }

    #[test]
    fn failed_configure_releases_the_reserved_line() {
        let sim = SimulatedLines::new();
        sim.fail_configure(13);

        let mut table = table(&sim);
        let err = table.claim_all().unwrap_err();

        assert!(matches!(err, LineError::ConfigFailed { line: 13, .. }));
        assert_eq!(table.claimed_count(), 0);
        assert!(sim.reserved_lines().is_empty());
    }

    #[test]
    fn failed_read_counts_as_no_change() {
        let sim = SimulatedLines::new();
        let mut table = table(&sim);
        table.claim_all().unwrap();

        sim.set_pressed(5, true);
        sim.set_pressed(6, true);
        sim.fail_reads(5, true);
        assert_eq!(cycle(&mut table), vec![press(KeyCode::KEY_B)]);
        assert!(!table.lines()[0].is_pressed());

        sim.fail_reads(5, false);
        assert_eq!(cycle(&mut table), vec![press(KeyCode::KEY_A)]);
    }

    #[test]
    fn read_failure_flag_tracks_the_latest_read() {
        let sim = SimulatedLines::new();
        let mut table = table(&sim);
        table.claim_all().unwrap();

        sim.fail_reads(6, true);
        for _ in 0..10 {
            assert!(cycle(&mut table).is_empty());
        }
        assert!(table.lines()[1].is_read_failing());
        assert!(!table.lines()[0].is_read_failing());

        sim.fail_reads(6, false);
        assert!(cycle(&mut table).is_empty());
        assert!(!table.lines()[1].is_read_failing());
    }

    #[test]
    fn unclaimed_lines_are_not_sampled() {
        let sim = SimulatedLines::new();
        let mut table = table(&sim);
        sim.set_pressed(5, true);

        assert!(cycle(&mut table).is_empty());
        assert_eq!(sim.read_count(), 0);
    }

    #[test]
    fn dropping_the_table_releases_lines() {
        let sim = SimulatedLines::new();
        {
            let mut table = table(&sim);
            table.claim_all().unwrap();
            assert_eq!(sim.reserved_lines(), vec![5, 6, 13]);
        }
        assert!(sim.reserved_lines().is_empty());
    }

    #[test]
    fn sampling_is_lazy() {
        let sim = SimulatedLines::new();
        let mut table = table(&sim);
        table.claim_all().unwrap();
        sim.set_pressed(5, true);
        sim.set_pressed(13, true);

        let first = table.sample_and_diff().next();
        assert_eq!(first, Some(press(KeyCode::KEY_A)));
        // only line 5 was read before the iterator was dropped
        assert_eq!(sim.read_count(), 1);
        assert!(!table.lines()[2].is_pressed());

        assert_eq!(cycle(&mut table), vec![press(KeyCode::KEY_C)]);
    }
}
