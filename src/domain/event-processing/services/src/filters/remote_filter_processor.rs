// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use evrt_event_processing::*;
use reverse_calls::ReverseCallDispatcher;
use tokio_util::sync::CancellationToken;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Filter implemented by a client and reached over its reverse-call
/// connection
pub struct RemoteFilterProcessor {
    scope: ScopeId,
    definition: StreamDefinition,
    dispatcher: Arc<ReverseCallDispatcher<FilterProtocol>>,
}

impl RemoteFilterProcessor {
    pub fn new(
        scope: ScopeId,
        definition: StreamDefinition,
        dispatcher: Arc<ReverseCallDispatcher<FilterProtocol>>,
    ) -> Self {
        Self {
            scope,
            definition,
            dispatcher,
        }
    }
}

#[async_trait::async_trait]
impl FilterProcessor for RemoteFilterProcessor {
    fn scope(&self) -> ScopeId {
        self.scope
    }

    fn definition(&self) -> &StreamDefinition {
        &self.definition
    }

    async fn filter(
        &self,
        event: &CommittedEvent,
        retry: Option<&RetryContext>,
        cancellation: &CancellationToken,
    ) -> Result<FilterResult, EventProcessorError> {
        // Public filters never get to see private events
        if self.definition.public() && !event.public {
            return Ok(FilterResult::excluded());
        }

        let response = self
            .dispatcher
            .call(
                FilterEventRequest {
                    scope: self.scope,
                    event: event.clone(),
                    retry: retry.cloned(),
                },
                event.execution_context.clone(),
                cancellation,
            )
            .await?;

        Ok(response.into_filter_result(self.definition.partitioned()))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
