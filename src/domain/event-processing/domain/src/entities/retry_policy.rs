// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use serde::{Deserialize, Serialize};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryBackoffType {
    Fixed,
    Linear,
    Exponential,
}

/// Computes how long a failing partition waits before its next attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub backoff_type: RetryBackoffType,
}

impl RetryPolicy {
    pub fn new(min_delay: Duration, max_delay: Duration, backoff_type: RetryBackoffType) -> Self {
        Self {
            min_delay,
            max_delay,
            backoff_type,
        }
    }

    /// Delay before attempt number `retry_count` (1 for the first retry).
    /// Non-decreasing in `retry_count` and never above `max_delay`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let retry_count = retry_count.max(1);

        let delay = match self.backoff_type {
            RetryBackoffType::Fixed => self.min_delay,
            RetryBackoffType::Linear => self.min_delay.saturating_mul(retry_count),
            RetryBackoffType::Exponential => self
                .min_delay
                .saturating_mul(2u32.saturating_pow(retry_count - 1)),
        };

        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_secs(5 * 60),
            RetryBackoffType::Exponential,
        )
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// What happens to a partition whose processor reports a failure that should
/// not be retried
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonRetriableFailurePolicy {
    /// Park the partition until its position is changed explicitly
    #[default]
    StopPartition,
    /// Treat it like any other failure
    RetryWithBackoff,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
