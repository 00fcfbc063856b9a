//! Per-partner circuit breaker. One circuit per partner per process;
//! replicas learn independently. State and counters live behind a single
//! mutex so transitions and consecutive-failure counts are always
//! observed together.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::Display;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the circuit closes
    pub success_threshold: u32,
    /// How long an open circuit waits before probing
    #[serde(with = "humantime_serde")]
    pub open_timeout: Duration,
    /// In-flight cap, 0 = unlimited
    pub max_concurrent: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
            max_concurrent: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerError {
    /// The circuit is open; the call was rejected without being made
    Open,
    /// The in-flight cap was hit
    Capacity,
}

impl fmt::Display for BreakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open => write!(f, "circuit open"),
            BreakerError::Capacity => write!(f, "circuit at max concurrent calls"),
        }
    }
}

impl std::error::Error for BreakerError {}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub in_flight: u32,
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejected: u64,
    /// Seconds since the last state transition
    pub since_transition_secs: u64,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    in_flight: u32,
    transitioned_at: Instant,
    total_requests: u64,
    total_successes: u64,
    total_failures: u64,
    total_rejected: u64,
}

type TransitionHook = Box<dyn Fn(&str, CircuitState, CircuitState) + Send + Sync>;

pub struct CircuitBreaker {
    name: String,
    cfg: BreakerConfig,
    inner: Mutex<Inner>,
    on_transition: Option<TransitionHook>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, cfg: BreakerConfig) -> Self {
        Self::with_hook(name, cfg, None)
    }

    pub fn with_hook(
        name: impl Into<String>,
        cfg: BreakerConfig,
        on_transition: Option<TransitionHook>,
    ) -> Self {
        CircuitBreaker {
            name: name.into(),
            cfg,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                in_flight: 0,
                transitioned_at: Instant::now(),
                total_requests: 0,
                total_successes: 0,
                total_failures: 0,
                total_rejected: 0,
            }),
            on_transition,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admission check for one call. On success the caller owes exactly
    /// one matching [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure).
    pub fn try_acquire(&self) -> Result<(), BreakerError> {
        let transition;

        {
            let mut inner = self.inner.lock();

            if inner.state == CircuitState::Open {
                if inner.transitioned_at.elapsed() < self.cfg.open_timeout {
                    inner.total_rejected += 1;
                    return Err(BreakerError::Open);
                }

                transition = Self::transition(&mut inner, CircuitState::HalfOpen);
            } else {
                transition = None;
            }

            if self.cfg.max_concurrent > 0 && inner.in_flight >= self.cfg.max_concurrent {
                inner.total_rejected += 1;
                drop(inner);
                self.fire(transition);
                return Err(BreakerError::Capacity);
            }

            inner.in_flight += 1;
            inner.total_requests += 1;
        }

        self.fire(transition);
        Ok(())
    }

    pub fn record_success(&self) {
        let transition;

        {
            let mut inner = self.inner.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            inner.total_successes += 1;
            inner.consecutive_failures = 0;

            transition = match inner.state {
                CircuitState::HalfOpen => {
                    inner.consecutive_successes += 1;
                    if inner.consecutive_successes >= self.cfg.success_threshold {
                        Self::transition(&mut inner, CircuitState::Closed)
                    } else {
                        None
                    }
                }
                _ => None,
            };
        }

        self.fire(transition);
    }

    pub fn record_failure(&self) {
        let transition;

        {
            let mut inner = self.inner.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            inner.total_failures += 1;
            inner.consecutive_successes = 0;
            inner.consecutive_failures += 1;

            transition = match inner.state {
                CircuitState::HalfOpen => Self::transition(&mut inner, CircuitState::Open),
                CircuitState::Closed
                    if inner.consecutive_failures >= self.cfg.failure_threshold =>
                {
                    Self::transition(&mut inner, CircuitState::Open)
                }
                _ => None,
            };
        }

        self.fire(transition);
    }

    /// Guard a single async call. An open circuit rejects without
    /// invoking `f`.
    pub async fn execute<T, F, Fut>(&self, f: F) -> Result<T, anyhow::Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, anyhow::Error>>,
    {
        self.try_acquire()?;

        match f().await {
            Ok(v) => {
                self.record_success();
                Ok(v)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    pub fn force_open(&self) {
        let transition;
        {
            let mut inner = self.inner.lock();
            transition = Self::transition(&mut inner, CircuitState::Open);
        }
        self.fire(transition);
    }

    pub fn reset(&self) {
        let transition;
        {
            let mut inner = self.inner.lock();
            inner.consecutive_failures = 0;
            inner.consecutive_successes = 0;
            transition = Self::transition(&mut inner, CircuitState::Closed);
        }
        self.fire(transition);
    }

    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();

        // an expired open circuit is reported as probe-ready
        if inner.state == CircuitState::Open
            && inner.transitioned_at.elapsed() >= self.cfg.open_timeout
        {
            return CircuitState::HalfOpen;
        }

        inner.state
    }

    pub fn stats(&self) -> CircuitStats {
        let inner = self.inner.lock();

        CircuitStats {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            in_flight: inner.in_flight,
            total_requests: inner.total_requests,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_rejected: inner.total_rejected,
            since_transition_secs: inner.transitioned_at.elapsed().as_secs(),
        }
    }

    fn transition(
        inner: &mut Inner,
        to: CircuitState,
    ) -> Option<(CircuitState, CircuitState)> {
        if inner.state == to {
            return None;
        }

        let from = inner.state;
        inner.state = to;
        inner.transitioned_at = Instant::now();

        if to == CircuitState::HalfOpen {
            inner.consecutive_successes = 0;
        }

        Some((from, to))
    }

    // callbacks run outside the lock
    fn fire(&self, transition: Option<(CircuitState, CircuitState)>) {
        if let Some((from, to)) = transition {
            info!("Circuit {} transitioned {} -> {}", self.name, from, to);

            if let Some(hook) = &self.on_transition {
                hook(&self.name, from, to);
            }
        }
    }
}

type SharedTransitionHook = Arc<dyn Fn(&str, CircuitState, CircuitState) + Send + Sync>;

/// Process-wide registry, one circuit per partner code. Circuits are
/// created lazily on first use and live for the process lifetime.
pub struct CircuitRegistry {
    cfg: BreakerConfig,
    circuits: DashMap<String, Arc<CircuitBreaker>>,
    hook: Option<SharedTransitionHook>,
}

impl CircuitRegistry {
    pub fn new(cfg: BreakerConfig) -> Self {
        CircuitRegistry {
            cfg,
            circuits: DashMap::new(),
            hook: None,
        }
    }

    /// Registry whose circuits all share one transition observer
    /// (e.g. a metrics recorder).
    pub fn with_transition_hook(cfg: BreakerConfig, hook: SharedTransitionHook) -> Self {
        CircuitRegistry {
            cfg,
            circuits: DashMap::new(),
            hook: Some(hook),
        }
    }

    pub fn get(&self, partner: &str) -> Arc<CircuitBreaker> {
        self.circuits
            .entry(partner.to_string())
            .or_insert_with(|| {
                let hook = self.hook.clone().map(|hook| {
                    Box::new(move |name: &str, from: CircuitState, to: CircuitState| {
                        hook(name, from, to)
                    }) as TransitionHook
                });

                Arc::new(CircuitBreaker::with_hook(
                    partner.to_string(),
                    self.cfg.clone(),
                    hook,
                ))
            })
            .clone()
    }

    pub fn stats(&self) -> Vec<(String, CircuitStats)> {
        let mut all: Vec<(String, CircuitStats)> = self
            .circuits
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect();

        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn reset(&self, partner: &str) -> bool {
        match self.circuits.get(partner) {
            Some(circuit) => {
                circuit.reset();
                true
            }
            None => false,
        }
    }

    pub fn force_open(&self, partner: &str) -> bool {
        match self.circuits.get(partner) {
            Some(circuit) => {
                circuit.force_open();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        for entry in self.circuits.iter() {
            entry.value().reset();
        }
    }
}
