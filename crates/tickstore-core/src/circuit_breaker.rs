use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive upstream failures that open the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before letting one probe through.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

/// Stops calling a provider that keeps failing, so one outage does not burn
/// the retry budget of every remaining security in a batch.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    phase: Mutex<Phase>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            phase: Mutex::new(Phase::Closed { failures: 0 }),
        }
    }

    // Every phase is valid on its own, so a poisoned lock is still usable.
    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a call may go out now. An open circuit past its cooldown
    /// moves to half-open and admits exactly this call.
    pub fn allow_request(&self) -> bool {
        let mut phase = self.phase();
        match *phase {
            Phase::Closed { .. } | Phase::HalfOpen => true,
            Phase::Open { since } if since.elapsed() >= self.config.cooldown => {
                *phase = Phase::HalfOpen;
                true
            }
            Phase::Open { .. } => false,
        }
    }

    /// Time left before an open circuit admits a probe; `None` unless open.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        match *self.phase() {
            Phase::Open { since } => Some(self.config.cooldown.saturating_sub(since.elapsed())),
            Phase::Closed { .. } | Phase::HalfOpen => None,
        }
    }

    pub fn record_success(&self) {
        *self.phase() = Phase::Closed { failures: 0 };
    }

    pub fn record_failure(&self) {
        let mut phase = self.phase();
        *phase = match *phase {
            Phase::Closed { failures } if failures + 1 < self.config.failure_threshold => {
                Phase::Closed {
                    failures: failures + 1,
                }
            }
            Phase::Open { since } => Phase::Open { since },
            Phase::Closed { .. } | Phase::HalfOpen => Phase::Open {
                since: Instant::now(),
            },
        };
    }

    pub fn state(&self) -> CircuitState {
        match *self.phase() {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen => CircuitState::HalfOpen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_probe_reopens_and_successful_probe_closes() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            cooldown: Duration::ZERO,
        });
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(breaker.allow_request());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn open_circuit_rejects_and_reports_its_cooldown() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(3600),
        });
        assert_eq!(breaker.cooldown_remaining(), None);

        breaker.record_failure();

        assert!(!breaker.allow_request());
        let remaining = breaker.cooldown_remaining().expect("open");
        assert!(remaining > Duration::from_secs(3500));
    }

    #[test]
    fn success_resets_the_failure_count() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            cooldown: Duration::from_secs(60),
        });
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
