// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use dill::*;
use evrt_event_processing::*;
use internal_error::ResultIntoInternal;
use tokio_util::sync::CancellationToken;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Replays the already filtered prefix of the event log through the new
/// filter and compares its decisions with what the target stream holds
pub struct FilterValidatorImpl;

#[component(pub)]
#[interface(dyn FilterValidator)]
impl FilterValidatorImpl {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl FilterValidator for FilterValidatorImpl {
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(scope = %filter.scope(), stream = %filter.definition().target_stream())
    )]
    async fn validate(
        &self,
        storage: &TenantStorage,
        filter: &dyn FilterProcessor,
        cancellation: &CancellationToken,
    ) -> Result<(), FilterValidationError> {
        let scope = filter.scope();
        let definition = filter.definition();
        let target = definition.target_stream();
        let fail = |reason: String| -> FilterValidationError {
            FilterValidationFailedError::new(target, reason).into()
        };

        let Some(persisted) = storage.definitions.load(scope, target).await.int_err()? else {
            tracing::debug!("No persisted filter definition, nothing to validate");
            return Ok(());
        };

        if persisted.partitioned() != definition.partitioned() {
            return Err(fail(format!(
                "Filter changed from {} to {}",
                partitioning_name(persisted.partitioned()),
                partitioning_name(definition.partitioned()),
            )));
        }

        if matches!(definition.filter, FilterDefinition::TypeFilter { .. }) && persisted == *definition
        {
            tracing::debug!("Type filter definition is unchanged");
            return Ok(());
        }

        let filtered_up_to = storage
            .states
            .load(&filter.stream_processor_id())
            .await
            .int_err()?
            .map(|state| state.position)
            .unwrap_or_default();

        if filtered_up_to.is_initial() {
            tracing::debug!("Nothing has been filtered yet");
            return Ok(());
        }

        let num_recorded = storage.events.tail_position(scope, target).await.int_err()?;

        tracing::debug!(
            %filtered_up_to,
            %num_recorded,
            "Replaying filtered events through the new filter"
        );

        let mut recorded = storage
            .events
            .fetch_next(scope, target, StreamPosition::initial())
            .await
            .int_err()?;
        let mut num_included: u64 = 0;
        let mut source_position = StreamPosition::initial();

        while source_position < filtered_up_to {
            let Some(source) = storage
                .events
                .fetch_next(scope, StreamId::event_log(), source_position)
                .await
                .int_err()?
            else {
                break;
            };
            if source.position >= filtered_up_to {
                break;
            }
            source_position = source.position.increment();

            let sequence_number = source.event.event_log_sequence_number;

            let (is_included, partition) =
                match filter.filter(&source.event, None, cancellation).await {
                    Ok(FilterResult::Succeeded {
                        is_included,
                        partition,
                    }) => (is_included, partition),
                    Ok(FilterResult::Failed(failure)) => {
                        return Err(fail(format!(
                            "Filtering event {sequence_number} failed: {}",
                            failure.reason
                        )));
                    }
                    Err(e) => {
                        return Err(fail(format!("Filtering event {sequence_number} failed: {e}")));
                    }
                };

            let recorded_here = match recorded.take() {
                Some(r) if r.event.event_log_sequence_number == sequence_number => Some(r),
                other => {
                    recorded = other;
                    None
                }
            };

            match (is_included, recorded_here) {
                (true, Some(r)) => {
                    if r.partition != partition {
                        return Err(fail(format!(
                            "Event {sequence_number} was filtered into partition '{}', now it \
                             goes to '{partition}'",
                            r.partition
                        )));
                    }
                    num_included += 1;
                    recorded = storage
                        .events
                        .fetch_next(scope, target, r.position.increment())
                        .await
                        .int_err()?;
                }
                (true, None) => {
                    return Err(fail(format!(
                        "Event {sequence_number} was not included before, now it is"
                    )));
                }
                (false, Some(_)) => {
                    return Err(fail(format!(
                        "Event {sequence_number} was included before, now it is not"
                    )));
                }
                (false, None) => {}
            }
        }

        if num_included != num_recorded.value() {
            return Err(fail(format!(
                "Filter includes {num_included} of the events that produced the {num_recorded} \
                 events of the stream"
            )));
        }

        tracing::debug!(num_included, "Filter is compatible with its history");
        Ok(())
    }
}

fn partitioning_name(partitioned: bool) -> &'static str {
    if partitioned { "partitioned" } else { "unpartitioned" }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
