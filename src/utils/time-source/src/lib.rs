// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dill::*;
use tokio::sync::oneshot;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Abstracts access to the wall clock, so that retry schedules and polling
/// loops can be driven deterministically in tests
#[async_trait::async_trait]
pub trait SystemTimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct SystemTimeSourceDefault;

#[component(pub)]
#[interface(dyn SystemTimeSource)]
#[scope(Singleton)]
impl SystemTimeSourceDefault {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl SystemTimeSource for SystemTimeSourceDefault {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Time source that only moves when told to.
///
/// Sleepers are resolved by [`FakeSystemTimeSource::advance`] once their
/// deadline is reached.
#[derive(Clone)]
pub struct FakeSystemTimeSource {
    state: Arc<Mutex<FakeSystemTimeSourceState>>,
}

struct FakeSystemTimeSourceState {
    now: DateTime<Utc>,
    sleepers: Vec<FakeSleeper>,
}

struct FakeSleeper {
    deadline: DateTime<Utc>,
    waker: oneshot::Sender<()>,
}

impl FakeSystemTimeSource {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeSystemTimeSourceState {
                now,
                sleepers: Vec::new(),
            })),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        assert!(now >= state.now, "Fake time cannot move backwards");
        state.now = now;
        Self::wake_due_sleepers(&mut state);
    }

    pub fn advance(&self, duration: Duration) -> DateTime<Utc> {
        let mut state = self.state.lock().unwrap();
        state.now += to_time_delta(duration);
        Self::wake_due_sleepers(&mut state);
        state.now
    }

    /// Number of sleepers still waiting for their deadline
    pub fn pending_sleepers(&self) -> usize {
        let state = self.state.lock().unwrap();
        state
            .sleepers
            .iter()
            .filter(|sleeper| !sleeper.waker.is_closed())
            .count()
    }

    fn wake_due_sleepers(state: &mut FakeSystemTimeSourceState) {
        let now = state.now;
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.sleepers)
            .into_iter()
            .partition(|sleeper| sleeper.deadline <= now);

        state.sleepers = pending;
        for sleeper in due {
            // Receiver may be gone if the sleeping future was dropped
            let _ = sleeper.waker.send(());
        }
    }
}

#[async_trait::async_trait]
impl SystemTimeSource for FakeSystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().unwrap().now
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        let rx = {
            let mut state = self.state.lock().unwrap();
            let (tx, rx) = oneshot::channel();
            let deadline = state.now + to_time_delta(duration);
            state.sleepers.push(FakeSleeper {
                deadline,
                waker: tx,
            });
            rx
        };

        // Sender is only dropped together with the time source itself
        let _ = rx.await;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

fn to_time_delta(duration: Duration) -> chrono::TimeDelta {
    chrono::TimeDelta::from_std(duration).unwrap_or(chrono::TimeDelta::MAX)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
