//! "Copied" feedback for copy buttons
//!
//! [`CopyIndicator::copy`] hands the text to the host clipboard and shows a
//! copied state that reverts after a fixed window. Copying again inside the
//! window restarts it.

use refraction_core::{Clipboard, Listeners, SchedulerHandle, Subscription, TimerId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// How long the copied state is shown
pub const DEFAULT_REVERT_MS: u32 = 2000;

struct IndicatorState {
    copied: bool,
    timer: Option<TimerId>,
}

struct Shared {
    handle: SchedulerHandle,
    clipboard: Arc<dyn Clipboard>,
    revert_ms: u32,
    listeners: Listeners<bool>,
    state: Mutex<IndicatorState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, IndicatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Copy-to-clipboard with a temporary copied flag
pub struct CopyIndicator {
    shared: Arc<Shared>,
}

impl CopyIndicator {
    pub fn new(handle: &SchedulerHandle, clipboard: Arc<dyn Clipboard>) -> Self {
        Self::with_revert(handle, clipboard, DEFAULT_REVERT_MS)
    }

    pub fn with_revert(
        handle: &SchedulerHandle,
        clipboard: Arc<dyn Clipboard>,
        revert_ms: u32,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                handle: handle.clone(),
                clipboard,
                revert_ms,
                listeners: Listeners::new(),
                state: Mutex::new(IndicatorState {
                    copied: false,
                    timer: None,
                }),
            }),
        }
    }

    /// Write `text` to the clipboard and show the copied state
    pub fn copy(&self, text: &str) {
        self.shared.clipboard.write_text(text);

        let changed = {
            let mut state = self.shared.lock();
            if let Some(id) = state.timer.take() {
                self.shared.handle.clear_timer(id);
            }
            let weak = Arc::downgrade(&self.shared);
            state.timer = self
                .shared
                .handle
                .set_timeout(self.shared.revert_ms, move || revert(&weak));
            !std::mem::replace(&mut state.copied, true)
        };

        if changed {
            self.shared.listeners.emit(&true);
        }
    }

    pub fn is_copied(&self) -> bool {
        self.shared.lock().copied
    }

    /// Observe copied state changes
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(listener)
    }
}

impl Drop for CopyIndicator {
    fn drop(&mut self) {
        if let Some(id) = self.shared.lock().timer.take() {
            self.shared.handle.clear_timer(id);
        }
    }
}

fn revert(weak: &Weak<Shared>) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    {
        let mut state = shared.lock();
        state.timer = None;
        state.copied = false;
    }
    shared.listeners.emit(&false);
}
