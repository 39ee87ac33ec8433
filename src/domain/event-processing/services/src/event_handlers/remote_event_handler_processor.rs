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

/// Event handler implemented by a client and reached over its reverse-call
/// connection
pub struct RemoteEventHandlerProcessor {
    scope: ScopeId,
    handler_id: EventProcessorId,
    dispatcher: Arc<ReverseCallDispatcher<EventHandlerProtocol>>,
}

impl RemoteEventHandlerProcessor {
    pub fn new(
        scope: ScopeId,
        handler_id: EventProcessorId,
        dispatcher: Arc<ReverseCallDispatcher<EventHandlerProtocol>>,
    ) -> Self {
        Self {
            scope,
            handler_id,
            dispatcher,
        }
    }
}

#[async_trait::async_trait]
impl EventProcessor for RemoteEventHandlerProcessor {
    fn id(&self) -> EventProcessorId {
        self.handler_id
    }

    async fn process(
        &self,
        event: &StreamEvent,
        retry: Option<&RetryContext>,
        cancellation: &CancellationToken,
    ) -> Result<ProcessingResult, EventProcessorError> {
        let response = self
            .dispatcher
            .call(
                HandleEventRequest {
                    scope: self.scope,
                    event: event.clone(),
                    retry: retry.cloned(),
                },
                event.event.execution_context.clone(),
                cancellation,
            )
            .await?;

        Ok(match response.failure {
            None => ProcessingResult::Succeeded,
            Some(failure) => ProcessingResult::Failed(failure),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
