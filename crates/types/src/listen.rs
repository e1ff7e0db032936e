//! Subscription options for state listeners.

use std::time::Duration;

/// Debounce behavior applied to loading transitions for one listener.
///
/// Terminal transitions are never debounced; the knob exists so UI
/// subscribers can avoid flashing a spinner for operations that settle
/// quickly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Debounce {
    /// Deliver every transition immediately.
    #[default]
    Off,
    /// Postpone a loading delivery by this long; a terminal state arriving
    /// first cancels it entirely.
    Delay(Duration),
    /// Never deliver loading transitions, only terminal states.
    SkipLoading,
}

/// Options for a single listener registration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenOptions {
    /// Deliver the current state synchronously, exactly once, at
    /// registration time. Immediate delivery bypasses debounce.
    pub immediate: bool,
    /// Also deliver progress-only updates while loading.
    pub notify_on_progress: bool,
    /// Debounce applied to loading transitions.
    pub debounce: Debounce,
}

impl ListenOptions {
    /// Options requesting an immediate replay of the current state.
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Self::default()
        }
    }

    /// Enable progress-only notifications.
    #[must_use]
    pub fn with_progress(mut self) -> Self {
        self.notify_on_progress = true;
        self
    }

    /// Set the loading debounce.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Debounce) -> Self {
        self.debounce = debounce;
        self
    }
}
