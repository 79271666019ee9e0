// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Position sources: where route start/finish fixes come from.

use crate::error::TrackerError;
use crate::models::Position;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Asynchronous access to the device's current coordinates.
pub trait PositionSource: Send + Sync {
    /// Wait up to `timeout` for a fix.
    ///
    /// Fails with `PositionUnavailable` if the sensor is disabled or no fix
    /// arrives in time.
    fn current_position(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Position, TrackerError>> + Send;
}

impl<T: PositionSource> PositionSource for Arc<T> {
    fn current_position(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Position, TrackerError>> + Send {
        (**self).current_position(timeout)
    }
}

#[derive(Debug, Clone, Copy)]
struct Fix {
    position: Position,
    received_at: Instant,
}

/// Position source fed by fixes the device reports.
///
/// Requests are coalesced: every waiter receives the next reported fix.
#[derive(Clone)]
pub struct PositionFeed {
    latest: Arc<watch::Sender<Option<Fix>>>,
    enabled: Arc<AtomicBool>,
    max_fix_age: Duration,
}

impl PositionFeed {
    /// A fix younger than `max_fix_age` answers requests immediately.
    pub fn new(max_fix_age: Duration) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            latest: Arc::new(latest),
            enabled: Arc::new(AtomicBool::new(true)),
            max_fix_age,
        }
    }

    /// Record a new fix and wake any pending requests.
    pub fn report(&self, position: Position) {
        self.latest.send_replace(Some(Fix {
            position,
            received_at: Instant::now(),
        }));
    }

    /// Enable or disable the underlying sensor (location services off).
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Most recently reported position, regardless of age.
    pub fn last_known(&self) -> Option<Position> {
        self.latest.borrow().map(|fix| fix.position)
    }
}

impl PositionSource for PositionFeed {
    async fn current_position(&self, timeout: Duration) -> Result<Position, TrackerError> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Err(TrackerError::PositionUnavailable(
                "location sensor disabled".to_string(),
            ));
        }

        let mut rx = self.latest.subscribe();
        let latest = *rx.borrow_and_update();
        if let Some(fix) = latest {
            if fix.received_at.elapsed() <= self.max_fix_age {
                return Ok(fix.position);
            }
        }

        match tokio::time::timeout(timeout, rx.changed()).await {
            Ok(Ok(())) => {
                let fix = *rx.borrow();
                fix.map(|f| f.position).ok_or_else(|| {
                    TrackerError::PositionUnavailable("empty fix reported".to_string())
                })
            }
            Ok(Err(_)) => Err(TrackerError::PositionUnavailable(
                "position feed closed".to_string(),
            )),
            Err(_) => Err(TrackerError::PositionUnavailable(format!(
                "no fix within {:?}",
                timeout
            ))),
        }
    }
}

/// Replays a fixed script of fixes and failures, one per request.
///
/// Runs dry with `PositionUnavailable`. An optional delay is applied before
/// each answer and is subject to the request timeout.
#[derive(Default)]
pub struct ScriptedPositionSource {
    script: Mutex<VecDeque<Result<Position, TrackerError>>>,
    delay: Option<Duration>,
    requests: AtomicUsize,
}

impl ScriptedPositionSource {
    pub fn new(fixes: impl IntoIterator<Item = Position>) -> Self {
        Self {
            script: Mutex::new(fixes.into_iter().map(Ok).collect()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue another answer.
    pub fn push(&self, answer: Result<Position, TrackerError>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(answer);
    }

    /// Number of `current_position` calls so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PositionSource for ScriptedPositionSource {
    async fn current_position(&self, timeout: Duration) -> Result<Position, TrackerError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(TrackerError::PositionUnavailable(format!(
                    "no fix within {:?}",
                    timeout
                )));
            }
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| {
                Err(TrackerError::PositionUnavailable(
                    "no scripted fix left".to_string(),
                ))
            })
    }
}
