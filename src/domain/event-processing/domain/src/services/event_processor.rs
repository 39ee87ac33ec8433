// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use execution_context::TenantId;
use internal_error::InternalError;
use reverse_calls::CallError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{EventProcessorId, ProcessingResult, RetryContext, StreamEvent, TenantStorage};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Target a stream processor dispatches events to.
///
/// Per-event problems are reported as [`ProcessingResult::Failed`], an `Err`
/// stops the whole stream processor.
#[async_trait::async_trait]
pub trait EventProcessor: Send + Sync {
    fn id(&self) -> EventProcessorId;

    async fn process(
        &self,
        event: &StreamEvent,
        retry: Option<&RetryContext>,
        cancellation: &CancellationToken,
    ) -> Result<ProcessingResult, EventProcessorError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Creates the event processor of one tenant
pub trait EventProcessorFactory: Send + Sync {
    fn create(&self, tenant: TenantId, storage: &TenantStorage) -> Arc<dyn EventProcessor>;
}

impl<F> EventProcessorFactory for F
where
    F: Fn(TenantId, &TenantStorage) -> Arc<dyn EventProcessor> + Send + Sync,
{
    fn create(&self, tenant: TenantId, storage: &TenantStorage) -> Arc<dyn EventProcessor> {
        self(tenant, storage)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum EventProcessorError {
    /// Dispatch was interrupted, nothing is known about the outcome
    #[error("Event processing was cancelled")]
    Cancelled,

    #[error(transparent)]
    Dispatch(CallError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<CallError> for EventProcessorError {
    fn from(value: CallError) -> Self {
        match value {
            CallError::Cancelled(_) => Self::Cancelled,
            CallError::Internal(e) => Self::Internal(e),
            e @ (CallError::NotAccepted(_) | CallError::ConnectionClosed(_)) => Self::Dispatch(e),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
