//! Mutation watcher: throttled and debounced rescans on structural changes.
//!
//! # Policy
//!
//! Batches that add no element with real text are ignored. For the rest:
//!
//! - at least `throttle` since the last scan: scan each distinct changed
//!   element right away (throttle)
//! - otherwise: (re)start a `debounce` timer that rescans the whole
//!   document when it fires (debounce)
//!
//! # Transitions
//!
//! | state     | event                           | action                               | next      |
//! |-----------|---------------------------------|--------------------------------------|-----------|
//! | `Idle`    | qualifying batch, window open   | scan targets, stamp `last_run`       | `Idle`    |
//! | `Idle`    | qualifying batch, window closed | schedule timer                       | `Pending` |
//! | `Pending` | qualifying batch, window open   | cancel timer, scan targets, stamp    | `Idle`    |
//! | `Pending` | qualifying batch, window closed | cancel timer, schedule a new one     | `Pending` |
//! | `Pending` | timer fires                     | stamp `last_run`, scan whole document| `Idle`    |
//! | any       | `force_scan`                    | cancel timer, stamp, scan root       | `Idle`    |
//! | any       | non-qualifying batch            | nothing                              | unchanged |

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::dom::{ChangeRecord, Clock, FrameScheduler, TimerScheduler, TreeQuery};
use crate::scanner::BatchScanner;

/// Whether a deferred whole-document scan is waiting on a timer.
#[derive(Debug)]
pub enum DebounceState<H> {
    Idle,
    Pending(H),
}

impl<H> Default for DebounceState<H> {
    fn default() -> Self {
        DebounceState::Idle
    }
}

impl<H> DebounceState<H> {
    pub fn is_pending(&self) -> bool {
        matches!(self, DebounceState::Pending(_))
    }
}

/// What [`MutationWatcher::handle_mutations`] did with a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchDecision {
    /// No change in the batch added text.
    Ignored,
    /// Scanned `targets` distinct changed elements right away.
    Immediate { targets: usize },
    /// Scheduled (or rescheduled) a whole-document scan.
    Deferred,
}

struct WatchState<H> {
    /// When the last scan was started. `None` until the first one, so the
    /// first qualifying batch is always handled immediately.
    last_run: Option<Duration>,
    debounce: DebounceState<H>,
}

/// Reacts to change batches by rescanning, within throttle/debounce limits.
pub struct MutationWatcher<T, F, S: TimerScheduler, C> {
    scanner: BatchScanner<T, F>,
    timers: Rc<S>,
    clock: Rc<C>,
    state: Rc<RefCell<WatchState<S::Handle>>>,
}

impl<T, F, S: TimerScheduler, C> Clone for MutationWatcher<T, F, S, C> {
    fn clone(&self) -> Self {
        Self {
            scanner: self.scanner.clone(),
            timers: Rc::clone(&self.timers),
            clock: Rc::clone(&self.clock),
            state: Rc::clone(&self.state),
        }
    }
}

impl<T, F, S: TimerScheduler, C> MutationWatcher<T, F, S, C> {
    /// Cancel a deferred scan, if any. Returns whether one was pending.
    pub fn cancel_pending(&self) -> bool {
        let previous = std::mem::take(&mut self.state.borrow_mut().debounce);
        match previous {
            DebounceState::Pending(handle) => {
                self.timers.cancel(handle);
                true
            }
            DebounceState::Idle => false,
        }
    }
}

impl<T, F, S, C> MutationWatcher<T, F, S, C>
where
    T: TreeQuery + 'static,
    F: FrameScheduler + 'static,
    S: TimerScheduler + 'static,
    C: Clock + 'static,
{
    pub fn new(scanner: BatchScanner<T, F>, timers: Rc<S>, clock: Rc<C>) -> Self {
        Self {
            scanner,
            timers,
            clock,
            state: Rc::new(RefCell::new(WatchState {
                last_run: None,
                debounce: DebounceState::Idle,
            })),
        }
    }

    pub fn scanner(&self) -> &BatchScanner<T, F> {
        &self.scanner
    }

    /// Whether a deferred scan is waiting.
    pub fn is_pending(&self) -> bool {
        self.state.borrow().debounce.is_pending()
    }

    /// Start time of the most recent scan this watcher ran.
    pub fn last_run(&self) -> Option<Duration> {
        self.state.borrow().last_run
    }

    /// Handle one batch of change notifications.
    pub fn handle_mutations(&self, records: &[ChangeRecord<T::Element>]) -> WatchDecision {
        if !records.iter().any(ChangeRecord::adds_text) {
            tracing::trace!(records = records.len(), "handle_mutations: no text added");
            return WatchDecision::Ignored;
        }

        let now = self.clock.now();
        self.cancel_pending();

        let throttle = self.scanner.config().throttle();
        let window_open = {
            let mut state = self.state.borrow_mut();
            let open = state
                .last_run
                .is_none_or(|last| now.saturating_sub(last) >= throttle);
            if open {
                state.last_run = Some(now);
            }
            open
        };

        if window_open {
            let targets = distinct_targets(records);
            tracing::debug!(targets = targets.len(), "handle_mutations: immediate scan");
            for target in &targets {
                self.scanner.scan(Some(target));
            }
            WatchDecision::Immediate {
                targets: targets.len(),
            }
        } else {
            self.schedule_deferred();
            tracing::debug!("handle_mutations: deferred whole-document scan");
            WatchDecision::Deferred
        }
    }

    /// Scan `root` (default: body) now, dropping any deferred scan.
    pub fn force_scan(&self, root: Option<&T::Element>) {
        self.cancel_pending();
        self.state.borrow_mut().last_run = Some(self.clock.now());
        self.scanner.scan(root);
    }

    fn schedule_deferred(&self) {
        let watcher = self.clone();
        let handle = self.timers.schedule(
            self.scanner.config().debounce(),
            Box::new(move || watcher.run_deferred()),
        );
        self.state.borrow_mut().debounce = DebounceState::Pending(handle);
    }

    fn run_deferred(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.debounce = DebounceState::Idle;
            state.last_run = Some(self.clock.now());
        }
        tracing::debug!("deferred whole-document scan firing");
        self.scanner.scan(None);
    }
}

/// Element targets of `records`, first occurrence order, duplicates dropped.
///
/// Every record counts here, not only those that added text.
fn distinct_targets<E: Clone + PartialEq>(records: &[ChangeRecord<E>]) -> Vec<E> {
    let mut targets: Vec<E> = Vec::new();
    for target in records.iter().filter_map(|r| r.target.as_ref()) {
        if !targets.contains(target) {
            targets.push(target.clone());
        }
    }
    targets
}
