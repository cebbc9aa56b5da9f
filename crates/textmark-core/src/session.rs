//! A running highlighter: initial scan on readiness plus live mutation handling.

use std::cell::Cell;
use std::rc::Rc;

use crate::config::HighlightConfig;
use crate::dom::{ChangeNotifier, ChangeRecord, Clock, FrameScheduler, TimerScheduler, TreeQuery};
use crate::error::HighlightError;
use crate::scanner::BatchScanner;
use crate::watcher::MutationWatcher;

/// Everything the host provides to a highlighter.
pub struct Capabilities<T, F, S, N, C> {
    pub tree: Rc<T>,
    pub frames: Rc<F>,
    pub timers: Rc<S>,
    pub notifier: Rc<N>,
    pub clock: Rc<C>,
}

/// Highlighting session bound to one document.
///
/// Dropping it stops mutation handling and cancels any deferred scan. Frame
/// batches already in flight still run to completion.
pub struct Highlighter<T, F, S, N, C>
where
    T: TreeQuery,
    S: TimerScheduler,
    N: ChangeNotifier<T::Element>,
{
    watcher: MutationWatcher<T, F, S, C>,
    subscription: Option<N::Subscription>,
    active: Rc<Cell<bool>>,
}

impl<T, F, S, N, C> Highlighter<T, F, S, N, C>
where
    T: TreeQuery + 'static,
    F: FrameScheduler + 'static,
    S: TimerScheduler + 'static,
    N: ChangeNotifier<T::Element>,
    C: Clock + 'static,
{
    /// Validate `config`, subscribe to changes under the body, and queue the
    /// initial whole-document scan for when the document is ready.
    pub fn start(
        caps: Capabilities<T, F, S, N, C>,
        config: HighlightConfig,
    ) -> Result<Self, HighlightError> {
        config.validate()?;

        let body = caps
            .tree
            .body()
            .ok_or(HighlightError::Unavailable("document body"))?;

        let scanner = BatchScanner::new(Rc::clone(&caps.tree), caps.frames, Rc::new(config));
        let watcher = MutationWatcher::new(scanner, caps.timers, caps.clock);
        let active = Rc::new(Cell::new(true));

        let handler = watcher.clone();
        let subscription = caps.notifier.subscribe(
            &body,
            Box::new(move |records: Vec<ChangeRecord<T::Element>>| {
                handler.handle_mutations(&records);
            }),
        )?;

        let initial = watcher.scanner().clone();
        let still_active = Rc::clone(&active);
        caps.notifier.on_ready(Box::new(move || {
            if still_active.get() {
                tracing::debug!("document ready, running initial scan");
                initial.scan(None);
            }
        }));

        tracing::debug!("highlighter started");
        Ok(Self {
            watcher,
            subscription: Some(subscription),
            active,
        })
    }

    /// Highlight text under `root` (default: body) right away.
    pub fn scan(&self, root: Option<&T::Element>) {
        if self.is_running() {
            self.watcher.force_scan(root);
        }
    }

    pub fn watcher(&self) -> &MutationWatcher<T, F, S, C> {
        &self.watcher
    }

    pub fn is_running(&self) -> bool {
        self.active.get()
    }

    /// Stop reacting to changes. Idempotent.
    pub fn stop(&mut self) {
        shutdown(self);
    }
}

fn shutdown<T, F, S, N, C>(highlighter: &mut Highlighter<T, F, S, N, C>)
where
    T: TreeQuery,
    S: TimerScheduler,
    N: ChangeNotifier<T::Element>,
{
    if !highlighter.active.replace(false) {
        return;
    }
    highlighter.subscription = None;
    highlighter.watcher.cancel_pending();
    tracing::debug!("highlighter stopped");
}

impl<T, F, S, N, C> Drop for Highlighter<T, F, S, N, C>
where
    T: TreeQuery,
    S: TimerScheduler,
    N: ChangeNotifier<T::Element>,
{
    fn drop(&mut self) {
        shutdown(self);
    }
}
