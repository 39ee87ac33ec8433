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
use internal_error::ErrorIntoInternal;
use tokio_util::sync::CancellationToken;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Runs a filter over the event log and writes what it includes into the
/// filter's target stream
pub struct FilterEventProcessor {
    filter: Arc<dyn FilterProcessor>,
    writer: Arc<dyn EventWriter>,
}

impl FilterEventProcessor {
    pub fn new(filter: Arc<dyn FilterProcessor>, writer: Arc<dyn EventWriter>) -> Self {
        Self { filter, writer }
    }
}

#[async_trait::async_trait]
impl EventProcessor for FilterEventProcessor {
    fn id(&self) -> EventProcessorId {
        EventProcessorId::from(self.filter.definition().target_stream())
    }

    async fn process(
        &self,
        event: &StreamEvent,
        retry: Option<&RetryContext>,
        cancellation: &CancellationToken,
    ) -> Result<ProcessingResult, EventProcessorError> {
        let partition = match self.filter.filter(&event.event, retry, cancellation).await? {
            FilterResult::Failed(failure) => return Ok(ProcessingResult::Failed(failure)),
            FilterResult::Succeeded {
                is_included: false,
                ..
            } => return Ok(ProcessingResult::Succeeded),
            FilterResult::Succeeded {
                is_included: true,
                partition,
            } => partition,
        };

        let target = self.filter.definition().target_stream();

        match self
            .writer
            .append(self.filter.scope(), target, &event.event, &partition)
            .await
        {
            Ok(position) => {
                tracing::debug!(
                    %target,
                    %position,
                    %partition,
                    sequence_number = %event.event.event_log_sequence_number,
                    "Filtered event written"
                );
                Ok(ProcessingResult::Succeeded)
            }
            Err(AppendEventError::PositionOccupied(e)) => {
                Ok(ProcessingResult::Failed(ProcessorFailure::retriable(e.to_string())))
            }
            Err(AppendEventError::NonWriteableStream(e)) => Err(e.int_err().into()),
            Err(AppendEventError::Internal(e)) => Err(e.into()),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
