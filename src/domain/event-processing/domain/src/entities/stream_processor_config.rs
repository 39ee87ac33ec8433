// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use serde::Deserialize;

use crate::{NonRetriableFailurePolicy, RetryBackoffType, RetryPolicy};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamProcessorConfig {
    /// How long an idle processor waits before looking for new events again
    pub poll_interval: Duration,
    pub retry_policy: RetryPolicy,
    pub non_retriable_failure_policy: NonRetriableFailurePolicy,
}

impl StreamProcessorConfig {
    pub fn new(
        poll_interval: Duration,
        retry_policy: RetryPolicy,
        non_retriable_failure_policy: NonRetriableFailurePolicy,
    ) -> Self {
        Self {
            poll_interval,
            retry_policy,
            non_retriable_failure_policy,
        }
    }

    pub fn test_default() -> Self {
        Self::new(
            Duration::from_millis(10),
            RetryPolicy::new(
                Duration::from_millis(10),
                Duration::from_millis(100),
                RetryBackoffType::Fixed,
            ),
            NonRetriableFailurePolicy::StopPartition,
        )
    }
}

impl Default for StreamProcessorConfig {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(1),
            RetryPolicy::default(),
            NonRetriableFailurePolicy::default(),
        )
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
