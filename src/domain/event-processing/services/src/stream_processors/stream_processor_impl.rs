// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_utils::{TaskGroup, TaskGroupError};
use evrt_event_processing::*;
use execution_context::TenantId;
use internal_error::InternalError;
use time_source::SystemTimeSource;
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use super::{ScopedStreamProcessor, ScopedStreamProcessorHandle};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Runs one [`ScopedStreamProcessor`] per tenant known when it starts.
///
/// The tenant loops live and die together: the first one to fail stops the
/// others.
pub struct StreamProcessorImpl {
    id: StreamProcessorId,
    source: StreamDefinition,
    processor_factory: Arc<dyn EventProcessorFactory>,
    tenant_storage_provider: Arc<dyn TenantStorageProvider>,
    time_source: Arc<dyn SystemTimeSource>,
    config: Arc<StreamProcessorConfig>,
    started: AtomicBool,
    tenants: Mutex<Option<HashMap<TenantId, ScopedStreamProcessorHandle>>>,
}

impl StreamProcessorImpl {
    pub fn new(
        id: StreamProcessorId,
        source: StreamDefinition,
        processor_factory: Arc<dyn EventProcessorFactory>,
        tenant_storage_provider: Arc<dyn TenantStorageProvider>,
        time_source: Arc<dyn SystemTimeSource>,
        config: Arc<StreamProcessorConfig>,
    ) -> Self {
        Self {
            id,
            source,
            processor_factory,
            tenant_storage_provider,
            time_source,
            config,
            started: AtomicBool::new(false),
            tenants: Mutex::new(None),
        }
    }

    fn tenant_handles(
        &self,
    ) -> Result<HashMap<TenantId, ScopedStreamProcessorHandle>, StreamProcessorNotStartedError> {
        self.tenants
            .lock()
            .unwrap()
            .clone()
            .ok_or(StreamProcessorNotStartedError { id: self.id })
    }

    async fn start_tenants(
        &self,
        group: &mut TaskGroup<StreamProcessorError>,
        cancellation: &CancellationToken,
    ) -> Result<(), InternalError> {
        let tenants = self.tenant_storage_provider.list_tenants().await?;
        let mut handles = HashMap::with_capacity(tenants.len());

        for tenant in tenants {
            let storage = self.tenant_storage_provider.storage_for(tenant).await?;
            let processor = self.processor_factory.create(tenant, &storage);

            let (runner, handle) = ScopedStreamProcessor::load(
                self.id,
                tenant,
                &self.source,
                processor,
                storage,
                self.time_source.clone(),
                self.config.clone(),
            )
            .await?;

            let span = tracing::debug_span!("ScopedStreamProcessor", id = %self.id, %tenant);
            group.spawn(
                format!("{} for tenant {tenant}", self.id),
                runner.run(cancellation.clone()).instrument(span),
            );
            handles.insert(tenant, handle);
        }

        *self.tenants.lock().unwrap() = Some(handles);
        Ok(())
    }
}

#[async_trait::async_trait]
impl StreamProcessor for StreamProcessorImpl {
    fn id(&self) -> &StreamProcessorId {
        &self.id
    }

    fn source_definition(&self) -> &StreamDefinition {
        &self.source
    }

    #[tracing::instrument(level = "debug", skip_all, fields(id = %self.id))]
    async fn run(&self, cancellation: CancellationToken) -> Result<(), StreamProcessorError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(StreamProcessorAlreadyStartedError { id: self.id }.into());
        }

        let group_cancellation = cancellation.child_token();
        let mut group = TaskGroup::new();

        if let Err(e) = self.start_tenants(&mut group, &group_cancellation).await {
            // Loops of the tenants that did start must not outlive the call
            group_cancellation.cancel();
            let _ = group.wait_for_all_cancelling_on_first(&group_cancellation).await;
            return Err(e.into());
        }

        tracing::debug!(num_tenants = group.len(), "Stream processor started for all tenants");

        group
            .wait_for_all_cancelling_on_first(&group_cancellation)
            .await
            .map_err(|e| match e {
                TaskGroupError::TaskFailed { error, .. } => error,
                TaskGroupError::TaskPanicked { task_name } => {
                    InternalError::new(format!("Stream processor task '{task_name}' panicked")).into()
                }
            })
    }

    fn get_current_state(
        &self,
    ) -> Result<HashMap<TenantId, StreamProcessorState>, GetStreamProcessorStateError> {
        let handles = self.tenant_handles()?;

        Ok(handles
            .into_iter()
            .map(|(tenant, handle)| (tenant, handle.current_state()))
            .collect())
    }

    async fn set_to_position(
        &self,
        tenant: TenantId,
        position: StreamPosition,
    ) -> Result<(), SetStreamProcessorPositionError> {
        let handles = self.tenant_handles()?;

        let Some(handle) = handles.get(&tenant) else {
            return Err(TenantNotFoundError {
                id: self.id,
                tenant,
            }
            .into());
        };

        handle.set_to_position(position).await?;
        Ok(())
    }

    async fn set_to_initial_position_for_all_tenants(
        &self,
    ) -> Result<(), SetStreamProcessorPositionError> {
        let handles = self.tenant_handles()?;

        for handle in handles.values() {
            handle.reset().await?;
        }

        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
