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

use crate::PartitionId;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Failure reported by an event processor for a single event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorFailure {
    pub reason: String,
    pub retry: bool,
    /// Overrides the retry policy delay when set and non-zero
    pub retry_timeout: Option<Duration>,
}

impl ProcessorFailure {
    pub fn retriable(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retry: true,
            retry_timeout: None,
        }
    }

    pub fn non_retriable(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retry: false,
            retry_timeout: None,
        }
    }

    #[must_use]
    pub fn with_retry_timeout(mut self, retry_timeout: Duration) -> Self {
        self.retry_timeout = Some(retry_timeout);
        self
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult {
    Succeeded,
    Failed(ProcessorFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterResult {
    Succeeded {
        is_included: bool,
        partition: PartitionId,
    },
    Failed(ProcessorFailure),
}

impl FilterResult {
    pub fn included(partition: PartitionId) -> Self {
        Self::Succeeded {
            is_included: true,
            partition,
        }
    }

    pub fn excluded() -> Self {
        Self::Succeeded {
            is_included: false,
            partition: PartitionId::none(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Passed along with an event that is being processed again after a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryContext {
    pub retry_count: u32,
    pub failure_reason: String,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
