use std::sync::Mutex;

use sel_types::temporal::wall_clock_ms;
use sel_types::TemporalAnchor;

struct HlcState {
    physical_ms: u64,
    logical: u32,
}

/// Hybrid logical clock stamping store commits.
///
/// `physical = max(wall_clock, last.physical)`; if physical did not advance
/// the logical counter increments, otherwise it resets to zero. Every value
/// returned is strictly greater than the previous one, even if the wall
/// clock steps backwards.
pub struct HybridLogicalClock {
    node_id: u16,
    state: Mutex<HlcState>,
}

impl HybridLogicalClock {
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id,
            state: Mutex::new(HlcState {
                physical_ms: 0,
                logical: 0,
            }),
        }
    }

    /// Next monotonic timestamp.
    pub fn now(&self) -> TemporalAnchor {
        self.tick(wall_clock_ms())
    }

    fn tick(&self, wall: u64) -> TemporalAnchor {
        let mut state = self.state.lock().expect("HLC mutex poisoned");
        let physical = wall.max(state.physical_ms);
        let logical = if physical > state.physical_ms {
            0
        } else {
            state.logical + 1
        };
        state.physical_ms = physical;
        state.logical = logical;
        TemporalAnchor::new(physical, logical, self.node_id)
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }
}

impl std::fmt::Debug for HybridLogicalClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridLogicalClock")
            .field("node_id", &self.node_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_monotonic() {
        let clock = HybridLogicalClock::new(1);
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn wall_clock_regression_bumps_logical() {
        let clock = HybridLogicalClock::new(2);
        let a = clock.tick(5_000);
        let b = clock.tick(4_000);
        assert_eq!(b.physical_ms, 5_000);
        assert_eq!(b.logical, a.logical + 1);
        assert_eq!(b.node_id, 2);
    }

    #[test]
    fn advancing_wall_clock_resets_logical() {
        let clock = HybridLogicalClock::new(0);
        clock.tick(100);
        clock.tick(100);
        let c = clock.tick(200);
        assert_eq!(c, TemporalAnchor::new(200, 0, 0));
    }
}
