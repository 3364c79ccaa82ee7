//! Frame loop for terminal demos

use refraction_core::Scheduler;
use std::thread;
use std::time::{Duration, Instant};

/// Drives a [`Scheduler`] at a fixed frame rate
pub struct FrameDriver {
    scheduler: Scheduler,
    frame: Duration,
    /// Advance the virtual clock by exactly one frame without sleeping
    instant: bool,
}

impl FrameDriver {
    pub fn new(fps: u32, instant: bool) -> Self {
        Self {
            scheduler: Scheduler::new(),
            frame: Duration::from_micros(1_000_000 / fps.max(1) as u64),
            instant,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn frame_ms(&self) -> f32 {
        self.frame.as_micros() as f32 / 1000.0
    }

    /// Run one frame
    pub fn step(&self) {
        if self.instant {
            self.scheduler.advance(self.frame_ms());
            return;
        }

        let start = Instant::now();
        self.scheduler.tick();
        let elapsed = start.elapsed();
        if elapsed < self.frame {
            thread::sleep(self.frame - elapsed);
        }
    }

    /// Step frames until `done` returns true or `limit_ms` of virtual time pass
    ///
    /// Returns the number of frames run.
    pub fn run_until(&self, limit_ms: f64, mut done: impl FnMut(&Scheduler) -> bool) -> u64 {
        let start_ms = self.scheduler.now_ms();
        let mut frames = 0;
        while !done(&self.scheduler) {
            if self.scheduler.now_ms() - start_ms >= limit_ms {
                tracing::warn!("Stopped after {} ms without finishing", limit_ms);
                break;
            }
            self.step();
            frames += 1;
        }
        frames
    }
}
