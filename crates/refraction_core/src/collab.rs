//! Collaborator surfaces owned by the host
//!
//! The identity provider and the system clipboard live outside this
//! workspace. The core only talks to them through these traits and never
//! waits on them.

use crate::subscription::lock;
use std::sync::Mutex;

/// System clipboard write access
pub trait Clipboard: Send + Sync {
    /// Fire-and-forget copy; success is not reported back
    fn write_text(&self, text: &str);
}

/// An in-memory clipboard
#[derive(Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<String> {
        lock(&self.contents).clone()
    }

    pub fn write_count(&self) -> usize {
        *lock(&self.writes)
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) {
        *lock(&self.contents) = Some(text.to_string());
        *lock(&self.writes) += 1;
    }
}

/// Signed-in state exposed by the identity provider
pub trait IdentityState: Send + Sync {
    /// `None` while the provider has not resolved the session yet
    fn is_signed_in(&self) -> Option<bool>;
}

/// Which auth affordances the page should show
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthView {
    /// Session unknown; render neither set of buttons
    Pending,
    /// Sign-in / sign-up buttons
    SignedOut,
    /// Account button and the "system active" badge
    SignedIn,
}

impl AuthView {
    pub fn resolve(identity: &dyn IdentityState) -> Self {
        match identity.is_signed_in() {
            None => AuthView::Pending,
            Some(false) => AuthView::SignedOut,
            Some(true) => AuthView::SignedIn,
        }
    }
}

/// Identity provider with a fixed answer
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticIdentity(pub Option<bool>);

impl IdentityState for StaticIdentity {
    fn is_signed_in(&self) -> Option<bool> {
        self.0
    }
}
