// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tokio_util::sync::CancellationToken;

use crate::{
    CommittedEvent,
    EventProcessorError,
    FilterResult,
    RetryContext,
    ScopeId,
    StreamDefinition,
    StreamProcessorId,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Decides which events of the event log belong to a derived stream
#[async_trait::async_trait]
pub trait FilterProcessor: Send + Sync {
    fn scope(&self) -> ScopeId;

    fn definition(&self) -> &StreamDefinition;

    async fn filter(
        &self,
        event: &CommittedEvent,
        retry: Option<&RetryContext>,
        cancellation: &CancellationToken,
    ) -> Result<FilterResult, EventProcessorError>;

    fn stream_processor_id(&self) -> StreamProcessorId {
        StreamProcessorId::for_filter(self.scope(), self.definition().target_stream())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
