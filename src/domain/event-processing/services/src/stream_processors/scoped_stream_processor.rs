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
use execution_context::TenantId;
use internal_error::{InternalError, ResultIntoInternal};
use time_source::SystemTimeSource;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

const COMMANDS_BUFFER: usize = 16;

enum StreamProcessorCommand {
    SetToPosition {
        position: StreamPosition,
        applied: oneshot::Sender<()>,
    },
    Reset {
        applied: oneshot::Sender<()>,
    },
}

enum Step {
    Progressed,
    Idle,
    Cancelled,
}

enum Wakeup {
    Cancelled,
    Command(StreamProcessorCommand),
    Timer,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Loop of one stream processor for one tenant. Owns the state exclusively,
/// the rest of the system sees it through a [`ScopedStreamProcessorHandle`].
pub(crate) struct ScopedStreamProcessor {
    id: StreamProcessorId,
    tenant: TenantId,
    stream: StreamId,
    partitioned: bool,
    processor: Arc<dyn EventProcessor>,
    storage: TenantStorage,
    time_source: Arc<dyn SystemTimeSource>,
    config: Arc<StreamProcessorConfig>,
    state: StreamProcessorState,
    state_tx: watch::Sender<StreamProcessorState>,
    commands_rx: mpsc::Receiver<StreamProcessorCommand>,
}

impl ScopedStreamProcessor {
    /// Loads the persisted state of the tenant. `source` is the definition of
    /// the stream being read.
    pub async fn load(
        id: StreamProcessorId,
        tenant: TenantId,
        source: &StreamDefinition,
        processor: Arc<dyn EventProcessor>,
        storage: TenantStorage,
        time_source: Arc<dyn SystemTimeSource>,
        config: Arc<StreamProcessorConfig>,
    ) -> Result<(Self, ScopedStreamProcessorHandle), InternalError> {
        let state = storage.states.load(&id).await.int_err()?.unwrap_or_default();

        tracing::debug!(
            %id,
            %tenant,
            position = %state.position,
            num_failing_partitions = state.failing_partitions.len(),
            "Loaded stream processor state"
        );

        let (state_tx, state_rx) = watch::channel(state.clone());
        let (commands_tx, commands_rx) = mpsc::channel(COMMANDS_BUFFER);

        let runner = Self {
            id,
            tenant,
            stream: source.stream_id,
            partitioned: source.partitioned(),
            processor,
            storage,
            time_source,
            config,
            state,
            state_tx,
            commands_rx,
        };

        let handle = ScopedStreamProcessorHandle {
            id,
            state_rx,
            commands_tx,
        };

        Ok((runner, handle))
    }

    /// Runs until cancelled or failed. The state is persisted once more on the
    /// way out.
    pub async fn run(mut self, cancellation: CancellationToken) -> Result<(), StreamProcessorError> {
        tracing::info!(
            id = %self.id,
            tenant = %self.tenant,
            stream = %self.stream,
            partitioned = self.partitioned,
            "Starting stream processor"
        );

        let res = self.run_loop(&cancellation).await;

        if let Err(e) = self.persist_state().await {
            tracing::error!(
                id = %self.id,
                tenant = %self.tenant,
                error = ?e,
                error_msg = %e,
                "Failed to persist stream processor state on stop"
            );
            if res.is_ok() {
                return Err(e.into());
            }
        }

        match &res {
            Ok(()) => tracing::info!(id = %self.id, tenant = %self.tenant, "Stream processor stopped"),
            Err(e) => tracing::error!(
                id = %self.id,
                tenant = %self.tenant,
                error = ?e,
                error_msg = %e,
                "Stream processor failed"
            ),
        }

        res
    }

    async fn run_loop(&mut self, cancellation: &CancellationToken) -> Result<(), StreamProcessorError> {
        loop {
            if cancellation.is_cancelled() {
                return Ok(());
            }

            while let Ok(command) = self.commands_rx.try_recv() {
                self.apply_command(command).await?;
            }

            let now = self.time_source.now();
            let selection = self.state.next_work(now, self.partitioned);

            let step = match selection.work.clone() {
                Some(StreamProcessorWork::Continue { position }) => self.process_next(position).await?,
                Some(StreamProcessorWork::Retry {
                    partition,
                    position,
                    retry,
                }) => {
                    self.retry_partition(partition, position, retry).await?
                }
                None => Step::Idle,
            };

            match step {
                Step::Progressed => continue,
                Step::Cancelled => return Ok(()),
                Step::Idle => {}
            }

            let wait = selection.idle_wait(now, self.config.poll_interval);
            let time_source = self.time_source.clone();

            let wakeup = tokio::select! {
                () = cancellation.cancelled() => Wakeup::Cancelled,
                Some(command) = self.commands_rx.recv() => Wakeup::Command(command),
                () = time_source.sleep(wait) => Wakeup::Timer,
            };

            match wakeup {
                Wakeup::Cancelled => return Ok(()),
                Wakeup::Command(command) => self.apply_command(command).await?,
                Wakeup::Timer => {}
            }
        }
    }

    async fn process_next(&mut self, position: StreamPosition) -> Result<Step, StreamProcessorError> {
        let maybe_event = self
            .storage
            .events
            .fetch_next(self.processor_scope(), self.stream, position)
            .await
            .int_err()?;

        let Some(event) = maybe_event else {
            return Ok(Step::Idle);
        };

        if self.partitioned && self.state.is_failing(&event.partition) {
            tracing::debug!(
                id = %self.id,
                position = %event.position,
                partition = %event.partition,
                "Skipping event of a failing partition"
            );
            self.state.skip(&event);
            self.persist_state().await?;
            return Ok(Step::Progressed);
        }

        self.dispatch(&event, None).await
    }

    async fn retry_partition(
        &mut self,
        partition: PartitionId,
        position: StreamPosition,
        retry: RetryContext,
    ) -> Result<Step, StreamProcessorError> {
        let scope = self.processor_scope();

        let fetched = if self.partitioned {
            self.storage
                .events
                .fetch_next_in_partition(scope, self.stream, &partition, position)
                .await
        } else {
            self.storage
                .events
                .fetch_next(scope, self.stream, position)
                .await
        };
        let maybe_event = fetched.int_err()?;

        match maybe_event {
            Some(event) if !self.partitioned || event.position < self.state.position => {
                tracing::debug!(
                    id = %self.id,
                    position = %event.position,
                    partition = %partition,
                    retry_count = retry.retry_count,
                    "Retrying failing partition"
                );
                self.dispatch(&event, Some(retry)).await
            }
            _ => {
                // The main cursor will reach whatever is left of the partition
                tracing::debug!(
                    id = %self.id,
                    partition = %partition,
                    "Failing partition has nothing left to retry"
                );
                self.state.remove_failing(&partition);
                self.persist_state().await?;
                Ok(Step::Progressed)
            }
        }
    }

    async fn dispatch(
        &mut self,
        event: &StreamEvent,
        retry: Option<RetryContext>,
    ) -> Result<Step, StreamProcessorError> {
        // Stopping the loop never interrupts a dispatch. The loop observes its
        // cancellation only after the outcome is recorded, and a remote
        // dispatch ends at the latest when its connection closes.
        let dispatch_cancellation = CancellationToken::new();

        let res = self
            .processor
            .process(event, retry.as_ref(), &dispatch_cancellation)
            .await;

        let now = self.time_source.now();

        match res {
            Err(EventProcessorError::Cancelled) => {
                tracing::debug!(
                    id = %self.id,
                    position = %event.position,
                    "Dispatch cancelled, the event will be processed again"
                );
                return Ok(Step::Cancelled);
            }
            Err(e) => return Err(e.into()),
            Ok(ProcessingResult::Succeeded) if retry.is_some() => {
                let next_in_partition = if self.partitioned {
                    self.storage
                        .events
                        .find_next_position(
                            self.processor_scope(),
                            self.stream,
                            &event.partition,
                            event.position.increment(),
                        )
                        .await
                        .int_err()?
                } else {
                    None
                };

                self.state
                    .record_retry_succeeded(event, self.partitioned, next_in_partition, now);
            }
            Ok(ProcessingResult::Succeeded) => {
                self.state.record_processed(event, now);
            }
            Ok(ProcessingResult::Failed(failure)) => {
                let failing = self.state.record_failure(
                    event,
                    self.partitioned,
                    &failure,
                    now,
                    &self.config.retry_policy,
                    self.config.non_retriable_failure_policy,
                );

                tracing::warn!(
                    id = %self.id,
                    tenant = %self.tenant,
                    position = %event.position,
                    partition = %event.partition,
                    reason = %failure.reason,
                    retriable = failure.retry,
                    retry_count = failing.retry_count,
                    retry_time = %failing.retry_time,
                    "Event processing failed"
                );
            }
        }

        self.persist_state().await?;
        Ok(Step::Progressed)
    }

    async fn apply_command(&mut self, command: StreamProcessorCommand) -> Result<(), InternalError> {
        let applied = match command {
            StreamProcessorCommand::SetToPosition { position, applied } => {
                tracing::info!(
                    id = %self.id,
                    tenant = %self.tenant,
                    %position,
                    "Setting stream processor position"
                );
                self.state.set_to_position(position, self.partitioned);
                applied
            }
            StreamProcessorCommand::Reset { applied } => {
                tracing::info!(id = %self.id, tenant = %self.tenant, "Resetting stream processor");
                self.state.reset();
                applied
            }
        };

        self.persist_state().await?;

        // The caller may have given up waiting
        let _ = applied.send(());
        Ok(())
    }

    async fn persist_state(&self) -> Result<(), InternalError> {
        self.storage
            .states
            .persist(&self.id, &self.state)
            .await
            .int_err()?;

        self.state_tx.send_replace(self.state.clone());
        Ok(())
    }

    fn processor_scope(&self) -> ScopeId {
        self.id.scope
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Read access to the state of a [`ScopedStreamProcessor`] and its mailbox
#[derive(Clone)]
pub(crate) struct ScopedStreamProcessorHandle {
    id: StreamProcessorId,
    state_rx: watch::Receiver<StreamProcessorState>,
    commands_tx: mpsc::Sender<StreamProcessorCommand>,
}

impl ScopedStreamProcessorHandle {
    pub fn current_state(&self) -> StreamProcessorState {
        self.state_rx.borrow().clone()
    }

    /// Resolves once the loop has applied and persisted the new position
    pub async fn set_to_position(
        &self,
        position: StreamPosition,
    ) -> Result<(), StreamProcessorStoppedError> {
        let (applied, applied_rx) = oneshot::channel();
        self.send(StreamProcessorCommand::SetToPosition { position, applied }, applied_rx)
            .await
    }

    pub async fn reset(&self) -> Result<(), StreamProcessorStoppedError> {
        let (applied, applied_rx) = oneshot::channel();
        self.send(StreamProcessorCommand::Reset { applied }, applied_rx)
            .await
    }

    async fn send(
        &self,
        command: StreamProcessorCommand,
        applied_rx: oneshot::Receiver<()>,
    ) -> Result<(), StreamProcessorStoppedError> {
        if self.commands_tx.send(command).await.is_err() {
            return Err(StreamProcessorStoppedError { id: self.id });
        }

        applied_rx
            .await
            .map_err(|_| StreamProcessorStoppedError { id: self.id })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
