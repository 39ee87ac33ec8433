// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    NonRetriableFailurePolicy,
    PartitionId,
    ProcessorFailure,
    RetryContext,
    RetryPolicy,
    StreamEvent,
    StreamPosition,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailingPartitionState {
    /// Position of the event that has to be processed again
    pub position: StreamPosition,
    /// Earliest time of the next attempt. [`DateTime::<Utc>::MAX_UTC`] parks
    /// the partition.
    pub retry_time: DateTime<Utc>,
    pub reason: String,
    pub retry_count: u32,
    /// Whether the processor itself considered the failure retriable
    pub retriable: bool,
}

impl FailingPartitionState {
    pub fn is_parked(&self) -> bool {
        self.retry_time == DateTime::<Utc>::MAX_UTC
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_parked() && self.retry_time <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailingPartition {
    pub partition: PartitionId,
    pub state: FailingPartitionState,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Persisted progress of one stream processor for one tenant.
///
/// `position` is the next position the main cursor reads. On unpartitioned
/// streams a failure blocks the cursor, so the only failing entry sits at
/// `position`. On partitioned streams the cursor moves on, and every failing
/// entry sits strictly below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamProcessorState {
    pub position: StreamPosition,
    /// Ordered by the time each partition started failing
    pub failing_partitions: Vec<FailingPartition>,
    pub last_successfully_processed: Option<DateTime<Utc>>,
}

impl StreamProcessorState {
    pub fn new(position: StreamPosition) -> Self {
        Self {
            position,
            failing_partitions: Vec::new(),
            last_successfully_processed: None,
        }
    }

    pub fn failing_partition(&self, partition: &PartitionId) -> Option<&FailingPartitionState> {
        self.failing_partitions
            .iter()
            .find(|f| &f.partition == partition)
            .map(|f| &f.state)
    }

    pub fn is_failing(&self, partition: &PartitionId) -> bool {
        self.failing_partition(partition).is_some()
    }

    /// Picks what to do next: due failing partitions first, lowest position
    /// first and earliest failure on ties, then the main cursor. A failing
    /// unpartitioned stream has no other work than its retry.
    pub fn next_work(&self, now: DateTime<Utc>, partitioned: bool) -> WorkSelection {
        let earliest_retry_time = self
            .failing_partitions
            .iter()
            .filter(|f| !f.state.is_parked() && !f.state.is_due(now))
            .map(|f| f.state.retry_time)
            .min();

        let due = self
            .failing_partitions
            .iter()
            .enumerate()
            .filter(|(_, f)| f.state.is_due(now))
            .min_by_key(|(i, f)| (f.state.position, *i))
            .map(|(_, f)| f);

        let work = if let Some(failing) = due {
            Some(StreamProcessorWork::Retry {
                partition: failing.partition.clone(),
                position: failing.state.position,
                retry: RetryContext {
                    retry_count: failing.state.retry_count,
                    failure_reason: failing.state.reason.clone(),
                },
            })
        } else if !partitioned && !self.failing_partitions.is_empty() {
            None
        } else {
            Some(StreamProcessorWork::Continue {
                position: self.position,
            })
        };

        WorkSelection {
            work,
            earliest_retry_time,
        }
    }

    /// Moves the cursor past an event that belongs to a failing partition
    pub fn skip(&mut self, event: &StreamEvent) {
        self.advance_past(event.position);
    }

    /// Records a successful dispatch of the event at the main cursor
    pub fn record_processed(&mut self, event: &StreamEvent, now: DateTime<Utc>) {
        self.advance_past(event.position);
        self.last_successfully_processed = Some(now);
    }

    /// Records a successful retry of a failing partition.
    ///
    /// `next_in_partition` is the position of the next event of the partition
    /// after the retried one. If the cursor has already skipped it, the
    /// partition stays in the failing list to catch up, due immediately and
    /// with its retry count reset.
    pub fn record_retry_succeeded(
        &mut self,
        event: &StreamEvent,
        partitioned: bool,
        next_in_partition: Option<StreamPosition>,
        now: DateTime<Utc>,
    ) {
        self.last_successfully_processed = Some(now);

        if !partitioned {
            self.remove_failing(&event.partition);
            self.advance_past(event.position);
            return;
        }

        let cursor = self.position;
        match next_in_partition {
            Some(next) if next < cursor => {
                if let Some(failing) = self.failing_entry_mut(&event.partition) {
                    failing.position = next;
                    failing.retry_time = now;
                    failing.retry_count = 0;
                    failing.retriable = true;
                }
            }
            _ => {
                self.remove_failing(&event.partition);
            }
        }
    }

    /// Records a failed dispatch, scheduling the next attempt of the event's
    /// partition. Returns the updated failing entry.
    pub fn record_failure(
        &mut self,
        event: &StreamEvent,
        partitioned: bool,
        failure: &ProcessorFailure,
        now: DateTime<Utc>,
        retry_policy: &RetryPolicy,
        non_retriable_policy: NonRetriableFailurePolicy,
    ) -> &FailingPartitionState {
        let retry_count = self
            .failing_partition(&event.partition)
            .map_or(1, |f| f.retry_count.saturating_add(1));

        let schedule_retry =
            failure.retry || non_retriable_policy == NonRetriableFailurePolicy::RetryWithBackoff;

        let retry_time = if schedule_retry {
            let delay = match failure.retry_timeout {
                Some(timeout) if !timeout.is_zero() => timeout,
                _ => retry_policy.delay_for(retry_count),
            };
            add_delay(now, delay)
        } else {
            DateTime::<Utc>::MAX_UTC
        };

        let new_state = FailingPartitionState {
            position: event.position,
            retry_time,
            reason: failure.reason.clone(),
            retry_count,
            retriable: failure.retry,
        };

        if partitioned {
            self.advance_past(event.position);
        } else {
            self.position = event.position;
        }

        let index = match self
            .failing_partitions
            .iter()
            .position(|f| f.partition == event.partition)
        {
            Some(index) => {
                self.failing_partitions[index].state = new_state;
                index
            }
            None => {
                self.failing_partitions.push(FailingPartition {
                    partition: event.partition.clone(),
                    state: new_state,
                });
                self.failing_partitions.len() - 1
            }
        };

        &self.failing_partitions[index].state
    }

    /// Forgets a failing partition without touching the cursor
    pub fn remove_failing(&mut self, partition: &PartitionId) -> bool {
        let len_before = self.failing_partitions.len();
        self.failing_partitions.retain(|f| &f.partition != partition);
        len_before != self.failing_partitions.len()
    }

    /// Moves the cursor for replay. Failing partitions at or after the new
    /// position are dropped, since the cursor will reach their events again.
    /// An unpartitioned stream forgets its failure in any case: the failing
    /// event is the one that blocked the old cursor.
    pub fn set_to_position(&mut self, position: StreamPosition, partitioned: bool) {
        self.position = position;
        if partitioned {
            self.failing_partitions
                .retain(|f| f.state.position < position);
        } else {
            self.failing_partitions.clear();
        }
    }

    pub fn reset(&mut self) {
        self.position = StreamPosition::initial();
        self.failing_partitions.clear();
    }

    fn advance_past(&mut self, position: StreamPosition) {
        let next = position.increment();
        if next > self.position {
            self.position = next;
        }
    }

    fn failing_entry_mut(&mut self, partition: &PartitionId) -> Option<&mut FailingPartitionState> {
        self.failing_partitions
            .iter_mut()
            .find(|f| &f.partition == partition)
            .map(|f| &mut f.state)
    }
}

fn add_delay(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamProcessorWork {
    /// Process the next event at or after the main cursor
    Continue { position: StreamPosition },
    /// Process the event of a failing partition again
    Retry {
        partition: PartitionId,
        position: StreamPosition,
        retry: RetryContext,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkSelection {
    pub work: Option<StreamProcessorWork>,
    /// Earliest time a currently waiting partition becomes due
    pub earliest_retry_time: Option<DateTime<Utc>>,
}

impl WorkSelection {
    /// How long to wait when there is nothing to do right now
    pub fn idle_wait(&self, now: DateTime<Utc>, poll_interval: Duration) -> Duration {
        match self.earliest_retry_time {
            Some(retry_time) => (retry_time - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(poll_interval),
            None => poll_interval,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
