//! Refraction Core Runtime
//!
//! Foundational primitives for the Refraction motion layer:
//!
//! - **Scheduler**: a virtual millisecond clock with revocable timeouts,
//!   intervals and frame callbacks
//! - **Input Sources**: injectable pointer and scroll capabilities
//! - **Subscriptions**: scoped registrations released on drop
//! - **Collaborators**: clipboard and identity surfaces owned by the host
//!
//! # Example
//!
//! ```rust
//! use refraction_core::Scheduler;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! let scheduler = Scheduler::new();
//! let frames = Arc::new(AtomicU32::new(0));
//!
//! let count = Arc::clone(&frames);
//! let sub = scheduler
//!     .handle()
//!     .frame_subscription(move |_dt| {
//!         count.fetch_add(1, Ordering::Relaxed);
//!     });
//!
//! scheduler.advance(16.0);
//! drop(sub);
//! scheduler.advance(16.0);
//!
//! assert_eq!(frames.load(Ordering::Relaxed), 1);
//! assert_eq!(scheduler.pending_work(), 0);
//! ```

pub mod collab;
pub mod error;
pub mod input;
pub mod scheduler;
pub mod subscription;

pub use collab::{AuthView, Clipboard, IdentityState, MemoryClipboard, StaticIdentity};
pub use error::{ConfigError, Result};
pub use input::{
    ManualPointer, ManualScroll, Point, PointerEvent, PointerInput, Rect, ScrollInput,
    ScrollMetrics,
};
pub use scheduler::{FrameCallback, FrameId, Scheduler, SchedulerHandle, TimerCallback, TimerId};
pub use subscription::{ListenerId, Listeners, Subscription};
