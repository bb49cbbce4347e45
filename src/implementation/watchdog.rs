// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module provides a cutoff guarding the search against memory
//! exhaustion. Nonconcave instances with very many segments accumulate
//! envelopes with many pieces in every open node, and a best-first frontier
//! can grow large before the gap closes; on such regimes the search
//! periodically polls the machine's memory usage and gives up before the
//! process gets killed. The polling interval tunes itself: the fuller the
//! memory, the sooner the next look.

use std::time::Duration;

use sysinfo::System;

/// The verdict of one memory probe.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MemoryVerdict {
    /// Carry on searching.
    Proceed,
    /// Memory is essentially exhausted: give up the search.
    Abort,
}

/// A self-tuning memory guard. After an initial grace period it polls the
/// system memory whenever the search has run past the next scheduled check,
/// and schedules the following check based on how full the memory is.
pub struct MemoryWatchdog {
    system: System,
    next_check: Duration,
}

impl MemoryWatchdog {
    /// No probing happens before this much of the search has elapsed.
    pub const GRACE: Duration = Duration::from_secs(300);

    pub fn new() -> Self {
        Self { system: System::new(), next_check: Self::GRACE }
    }

    /// Probes the system memory if the next check is due. Returns `Abort`
    /// when usage leaves no room to continue.
    pub fn probe(&mut self, elapsed: Duration) -> MemoryVerdict {
        if elapsed < self.next_check {
            return MemoryVerdict::Proceed;
        }
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let percent = if total == 0 {
            0.0
        } else {
            self.system.used_memory() as f64 * 100.0 / total as f64
        };
        match Self::reprieve(percent) {
            Some(delay) => {
                self.next_check += delay;
                MemoryVerdict::Proceed
            }
            None => MemoryVerdict::Abort,
        }
    }

    /// How long the next check can wait given the current usage percentage,
    /// or `None` when the search must stop.
    fn reprieve(percent: f64) -> Option<Duration> {
        if percent >= 98.0 {
            None
        } else if percent >= 95.0 {
            Some(Duration::from_secs(10))
        } else if percent >= 90.0 {
            Some(Duration::from_secs(30))
        } else if percent >= 80.0 {
            Some(Duration::from_secs(60))
        } else {
            Some(Duration::from_secs(120))
        }
    }
}

impl Default for MemoryWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_watchdog {
    use super::*;

    #[test]
    fn nothing_happens_during_the_grace_period() {
        let mut dog = MemoryWatchdog::new();
        assert_eq!(
            MemoryVerdict::Proceed,
            dog.probe(MemoryWatchdog::GRACE - Duration::from_secs(1))
        );
        // still pointed at the end of the grace period: no probe occurred
        assert_eq!(MemoryWatchdog::GRACE, dog.next_check);
    }

    #[test]
    fn a_due_probe_schedules_a_later_check() {
        let mut dog = MemoryWatchdog::new();
        let verdict = dog.probe(MemoryWatchdog::GRACE);
        if verdict == MemoryVerdict::Proceed {
            assert!(dog.next_check > MemoryWatchdog::GRACE);
        }
    }

    #[test]
    fn the_reprieve_shrinks_as_memory_fills_up() {
        assert_eq!(Some(Duration::from_secs(120)), MemoryWatchdog::reprieve(10.0));
        assert_eq!(Some(Duration::from_secs(120)), MemoryWatchdog::reprieve(79.9));
        assert_eq!(Some(Duration::from_secs(60)), MemoryWatchdog::reprieve(80.0));
        assert_eq!(Some(Duration::from_secs(30)), MemoryWatchdog::reprieve(90.0));
        assert_eq!(Some(Duration::from_secs(10)), MemoryWatchdog::reprieve(95.0));
        assert_eq!(None, MemoryWatchdog::reprieve(98.0));
        assert_eq!(None, MemoryWatchdog::reprieve(100.0));
    }
}
