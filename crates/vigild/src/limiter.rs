use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Maximum consecutive gate failures before lockout.
const MAX_FAILURES: u32 = 5;
/// Sliding window over which failures are counted.
const WINDOW: Duration = Duration::from_secs(60);
/// Lockout duration after exceeding MAX_FAILURES.
const LOCKOUT: Duration = Duration::from_secs(300);

struct StudentRecord {
    failures: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

/// Per-student attempt limiter for attendance marking.
///
/// After MAX_FAILURES liveness-gate rejections within WINDOW seconds the
/// student is locked out for LOCKOUT seconds. Engine and store errors are
/// not counted as failures; only a deliberate gate rejection (spoofing
/// flagged, score floors missed, not live) increments the counter.
pub struct AttemptLimiter {
    records: HashMap<String, StudentRecord>,
}

impl AttemptLimiter {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Return `Ok(())` if the student may attempt marking, `Err(message)`
    /// if currently locked out.
    pub fn check(&mut self, student: &str) -> Result<(), String> {
        let now = Instant::now();
        let record = self
            .records
            .entry(student.to_string())
            .or_insert(StudentRecord {
                failures: 0,
                window_start: now,
                locked_until: None,
            });

        if let Some(locked_until) = record.locked_until {
            if now < locked_until {
                let remaining = locked_until.duration_since(now).as_secs();
                return Err(format!(
                    "too many rejected attempts; try again in {remaining}s"
                ));
            }
            // Lockout expired
            *record = StudentRecord {
                failures: 0,
                window_start: now,
                locked_until: None,
            };
        } else if now.duration_since(record.window_start) >= WINDOW {
            // Sliding window expired
            record.failures = 0;
            record.window_start = now;
        }

        Ok(())
    }

    /// Record a gate rejection. May trigger a lockout.
    pub fn record_failure(&mut self, student: &str) {
        let now = Instant::now();
        let record = self
            .records
            .entry(student.to_string())
            .or_insert(StudentRecord {
                failures: 0,
                window_start: now,
                locked_until: None,
            });

        if now.duration_since(record.window_start) >= WINDOW {
            record.failures = 0;
            record.window_start = now;
        }

        record.failures += 1;
        if record.failures >= MAX_FAILURES {
            record.locked_until = Some(now + LOCKOUT);
            tracing::warn!(
                student,
                failures = record.failures,
                lockout_secs = LOCKOUT.as_secs(),
                "attempt limit triggered, locking student out"
            );
        } else {
            tracing::debug!(
                student,
                failures = record.failures,
                max = MAX_FAILURES,
                "attendance gate rejected, counting failure"
            );
        }
    }

    /// Record a successful marking: clears the failure counter.
    pub fn record_success(&mut self, student: &str) {
        self.records.remove(student);
    }
}

impl Default for AttemptLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_under_limit() {
        let mut limiter = AttemptLimiter::new();
        for _ in 0..4 {
            assert!(limiter.check("s-204").is_ok());
            limiter.record_failure("s-204");
        }
        assert!(limiter.check("s-204").is_ok());
    }

    #[test]
    fn locks_after_max_failures() {
        let mut limiter = AttemptLimiter::new();
        for _ in 0..MAX_FAILURES {
            limiter.record_failure("s-204");
        }
        assert!(limiter.check("s-204").is_err());
    }

    #[test]
    fn success_clears_counter() {
        let mut limiter = AttemptLimiter::new();
        for _ in 0..4 {
            limiter.record_failure("s-204");
        }
        limiter.record_success("s-204");
        assert!(limiter.check("s-204").is_ok());
    }

    #[test]
    fn students_are_independent() {
        let mut limiter = AttemptLimiter::new();
        for _ in 0..MAX_FAILURES {
            limiter.record_failure("s-204");
        }
        assert!(limiter.check("s-117").is_ok());
        assert!(limiter.check("s-204").is_err());
    }
}
