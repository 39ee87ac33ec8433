// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use async_utils::{TaskGroup, TaskGroupError};
use dill::*;
use evrt_event_processing::*;
use execution_context::TenantId;
use internal_error::ResultIntoInternal;
use reverse_calls::ReverseCallDispatcher;
use time_source::SystemTimeSource;
use tokio_util::sync::CancellationToken;

use crate::{FilterEventProcessor, RemoteFilterProcessor, StreamProcessorImpl};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct FiltersServiceImpl {
    registry: Arc<dyn StreamProcessorRegistry>,
    validator: Arc<dyn FilterValidator>,
    tenant_storage_provider: Arc<dyn TenantStorageProvider>,
    time_source: Arc<dyn SystemTimeSource>,
    config: Arc<StreamProcessorConfig>,
}

#[component(pub)]
#[interface(dyn FiltersService)]
impl FiltersServiceImpl {
    pub fn new(
        registry: Arc<dyn StreamProcessorRegistry>,
        validator: Arc<dyn FilterValidator>,
        tenant_storage_provider: Arc<dyn TenantStorageProvider>,
        time_source: Arc<dyn SystemTimeSource>,
        config: Arc<StreamProcessorConfig>,
    ) -> Self {
        Self {
            registry,
            validator,
            tenant_storage_provider,
            time_source,
            config,
        }
    }

    /// Claims the stream processor id of the filter without looking at the
    /// history of its target stream
    pub(crate) fn register_unvalidated(
        &self,
        filter: Arc<dyn FilterProcessor>,
    ) -> Result<FilterRegistration, RegisterFilterError> {
        let target = filter.definition().target_stream();
        if target.is_non_writeable() {
            return Err(NonWriteableStreamError { stream: target }.into());
        }

        let id = filter.stream_processor_id();
        let processor_factory =
            move |_tenant: TenantId, storage: &TenantStorage| -> Arc<dyn EventProcessor> {
                Arc::new(FilterEventProcessor::new(
                    filter.clone(),
                    storage.writer.clone(),
                ))
            };

        let stream_processor = Arc::new(StreamProcessorImpl::new(
            id,
            StreamDefinition::event_log(),
            Arc::new(processor_factory),
            self.tenant_storage_provider.clone(),
            self.time_source.clone(),
            self.config.clone(),
        ));

        Ok(StreamProcessorRegistration::try_register(
            self.registry.clone(),
            stream_processor,
        )?)
    }

    pub(crate) fn filter_validation(&self) -> FilterValidation {
        FilterValidation {
            validator: self.validator.clone(),
            tenant_storage_provider: self.tenant_storage_provider.clone(),
        }
    }
}

#[async_trait::async_trait]
impl FiltersService for FiltersServiceImpl {
    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(
            scope = %filter.scope(),
            stream = %filter.definition().target_stream(),
            kind = filter.definition().filter.kind(),
        )
    )]
    async fn register(
        &self,
        filter: Arc<dyn FilterProcessor>,
        cancellation: &CancellationToken,
    ) -> Result<FilterRegistration, RegisterFilterError> {
        let registration = self.register_unvalidated(filter.clone())?;

        // Dropping the registration on failure releases the id again
        self.filter_validation()
            .validate_and_persist(filter.as_ref(), cancellation)
            .await?;

        tracing::info!(id = %registration.id(), "Filter registered");
        Ok(registration)
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn handle_remote_filter(
        &self,
        dispatcher: Arc<ReverseCallDispatcher<FilterProtocol>>,
        cancellation: &CancellationToken,
    ) -> Result<RemoteRegistrationOutcome, HandleRemoteRegistrationError> {
        let arguments = dispatcher.receive_arguments(cancellation).await?;
        let registration_arguments = arguments.arguments;

        tracing::info!(
            scope = %registration_arguments.scope,
            stream = %registration_arguments.filter_id,
            partitioned = registration_arguments.partitioned,
            public = registration_arguments.public,
            tenant = %arguments.execution_context.tenant,
            "Received remote filter registration"
        );

        let filter: Arc<dyn FilterProcessor> = Arc::new(RemoteFilterProcessor::new(
            registration_arguments.scope,
            registration_arguments.stream_definition(),
            dispatcher.clone(),
        ));

        let registration = match self.register_unvalidated(filter.clone()) {
            Ok(registration) => registration,
            Err(e) => {
                let failure = e.to_registration_failure();
                tracing::warn!(error = ?e, error_msg = %e, "Rejecting remote filter");
                dispatcher
                    .reject(RegistrationResponse::rejected(failure.clone()))
                    .await?;
                return Ok(RemoteRegistrationOutcome::Rejected(failure));
            }
        };

        let group_cancellation = cancellation.child_token();
        // Closed once the filter loop has stopped, so that a dispatch in
        // flight still receives its response
        let connection_cancellation = CancellationToken::new();
        let mut group = TaskGroup::<RegistrationTaskError>::new();

        {
            let dispatcher = dispatcher.clone();
            let cancellation = connection_cancellation.clone();
            group.spawn("accept filter connection", async move {
                dispatcher
                    .accept(RegistrationResponse::accepted(), &cancellation)
                    .await
                    .map_err(RegistrationTaskError::from)
            });
        }

        {
            // The client has to be connected to take part in the validation
            let validation = self.filter_validation();
            let processor = registration.processor().clone();
            let cancellation = group_cancellation.clone();
            let connection_guard = connection_cancellation.clone().drop_guard();
            group.spawn("run filter", async move {
                let _connection_guard = connection_guard;
                validation
                    .validate_and_persist(filter.as_ref(), &cancellation)
                    .await?;
                processor.run(cancellation).await?;
                Ok::<_, RegistrationTaskError>(())
            });
        }

        let res = group.wait_for_all_cancelling_on_first(&group_cancellation).await;
        drop(registration);

        res.map_err(into_handle_registration_error)?;
        Ok(RemoteRegistrationOutcome::Completed)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Validates a filter for every tenant, then persists its definition for every
/// tenant. Nothing is persisted unless all tenants pass.
pub(crate) struct FilterValidation {
    validator: Arc<dyn FilterValidator>,
    tenant_storage_provider: Arc<dyn TenantStorageProvider>,
}

impl FilterValidation {
    pub async fn validate_and_persist(
        &self,
        filter: &dyn FilterProcessor,
        cancellation: &CancellationToken,
    ) -> Result<(), FilterValidationError> {
        let mut storages = Vec::new();
        for tenant in self.tenant_storage_provider.list_tenants().await? {
            let storage = self.tenant_storage_provider.storage_for(tenant).await?;
            self.validator
                .validate(&storage, filter, cancellation)
                .await
                .inspect_err(|e| {
                    tracing::warn!(%tenant, error = ?e, error_msg = %e, "Filter validation failed");
                })?;
            storages.push(storage);
        }

        let definition = filter.definition();
        for storage in storages {
            storage
                .definitions
                .persist(filter.scope(), definition)
                .await
                .int_err()?;
        }

        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) fn into_handle_registration_error(
    e: TaskGroupError<RegistrationTaskError>,
) -> HandleRemoteRegistrationError {
    match e {
        TaskGroupError::TaskFailed { task_name, error } => {
            HandleRemoteRegistrationError::TaskFailed { task_name, error }
        }
        TaskGroupError::TaskPanicked { task_name } => {
            HandleRemoteRegistrationError::TaskPanicked { task_name }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
