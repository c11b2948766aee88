use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Dependency-injected time source.
///
/// Tool handlers, the session selector's `auto` id derivation, and the
/// store's event timestamps all go through this trait instead of calling
/// the wall clock directly, so tests get deterministic `now_ms`/`now_us`
/// (spec §4.2: "Timestamps ... are the handler's configured `now_ms`
/// (dependency-injected), not the wall clock").
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> i64;
    fn now_us(&self) -> i64 {
        self.now_ms() * 1000
    }
}

/// Real wall-clock time source used outside of tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn now_us(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0)
    }
}

impl TimeSource for Arc<dyn TimeSource> {
    fn now_ms(&self) -> i64 {
        self.as_ref().now_ms()
    }
    fn now_us(&self) -> i64 {
        self.as_ref().now_us()
    }
}
