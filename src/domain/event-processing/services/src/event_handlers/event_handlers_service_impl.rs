// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use async_utils::TaskGroup;
use dill::*;
use evrt_event_processing::*;
use execution_context::TenantId;
use reverse_calls::ReverseCallDispatcher;
use time_source::SystemTimeSource;
use tokio_util::sync::CancellationToken;

use crate::{
    RemoteEventHandlerProcessor,
    StreamProcessorImpl,
    TypeFilterProcessor,
    into_handle_registration_error,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct EventHandlersServiceImpl {
    filters_service: Arc<dyn FiltersService>,
    registry: Arc<dyn StreamProcessorRegistry>,
    tenant_storage_provider: Arc<dyn TenantStorageProvider>,
    time_source: Arc<dyn SystemTimeSource>,
    config: Arc<StreamProcessorConfig>,
}

#[component(pub)]
#[interface(dyn EventHandlersService)]
impl EventHandlersServiceImpl {
    pub fn new(
        filters_service: Arc<dyn FiltersService>,
        registry: Arc<dyn StreamProcessorRegistry>,
        tenant_storage_provider: Arc<dyn TenantStorageProvider>,
        time_source: Arc<dyn SystemTimeSource>,
        config: Arc<StreamProcessorConfig>,
    ) -> Self {
        Self {
            filters_service,
            registry,
            tenant_storage_provider,
            time_source,
            config,
        }
    }

    /// Registers the type filter that fills the handler's stream, then the
    /// stream processor that hands the stream over to the client
    async fn register(
        &self,
        arguments: &EventHandlerRegistrationArguments,
        dispatcher: &Arc<ReverseCallDispatcher<EventHandlerProtocol>>,
        cancellation: &CancellationToken,
    ) -> Result<(FilterRegistration, StreamProcessorRegistration), RegistrationFailure> {
        if arguments.event_types.is_empty() {
            return Err(RegistrationFailure::new(
                RegistrationFailureCode::InvalidArguments,
                "Event handler must handle at least one event type",
            ));
        }

        let scope = arguments.scope;
        let handler_id = arguments.handler_id;
        let stream = StreamId::from(handler_id);

        let filter = Arc::new(TypeFilterProcessor::new(
            scope,
            stream,
            arguments.event_types.iter().copied(),
            arguments.partitioned,
        ));
        let source = filter.definition().clone();

        let filter_registration = self
            .filters_service
            .register(filter, cancellation)
            .await
            .map_err(|e| e.to_registration_failure())?;

        let processor_factory = {
            let dispatcher = dispatcher.clone();
            move |_tenant: TenantId, _storage: &TenantStorage| -> Arc<dyn EventProcessor> {
                Arc::new(RemoteEventHandlerProcessor::new(
                    scope,
                    handler_id,
                    dispatcher.clone(),
                ))
            }
        };

        let handler_processor = Arc::new(StreamProcessorImpl::new(
            StreamProcessorId::new(scope, handler_id, stream),
            source,
            Arc::new(processor_factory),
            self.tenant_storage_provider.clone(),
            self.time_source.clone(),
            self.config.clone(),
        ));

        let handler_registration =
            StreamProcessorRegistration::try_register(self.registry.clone(), handler_processor)
                .map_err(|e| {
                    RegistrationFailure::new(
                        RegistrationFailureCode::AlreadyRegistered,
                        e.to_string(),
                    )
                })?;

        Ok((filter_registration, handler_registration))
    }
}

#[async_trait::async_trait]
impl EventHandlersService for EventHandlersServiceImpl {
    #[tracing::instrument(level = "info", skip_all)]
    async fn handle_remote_event_handler(
        &self,
        dispatcher: Arc<ReverseCallDispatcher<EventHandlerProtocol>>,
        cancellation: &CancellationToken,
    ) -> Result<RemoteRegistrationOutcome, HandleRemoteRegistrationError> {
        let arguments = dispatcher.receive_arguments(cancellation).await?;
        let registration_arguments = arguments.arguments;

        tracing::info!(
            scope = %registration_arguments.scope,
            handler_id = %registration_arguments.handler_id,
            num_event_types = registration_arguments.event_types.len(),
            partitioned = registration_arguments.partitioned,
            tenant = %arguments.execution_context.tenant,
            "Received remote event handler registration"
        );

        let (filter_registration, handler_registration) = match self
            .register(&registration_arguments, &dispatcher, cancellation)
            .await
        {
            Ok(registrations) => registrations,
            Err(failure) => {
                tracing::warn!(%failure, "Rejecting remote event handler");
                dispatcher
                    .reject(RegistrationResponse::rejected(failure.clone()))
                    .await?;
                return Ok(RemoteRegistrationOutcome::Rejected(failure));
            }
        };

        let group_cancellation = cancellation.child_token();
        // Closed once the handler loop has stopped, so that a dispatch in
        // flight still receives its response
        let connection_cancellation = CancellationToken::new();
        let mut group = TaskGroup::<RegistrationTaskError>::new();

        {
            let dispatcher = dispatcher.clone();
            let cancellation = connection_cancellation.clone();
            group.spawn("accept event handler connection", async move {
                dispatcher
                    .accept(RegistrationResponse::accepted(), &cancellation)
                    .await
                    .map_err(RegistrationTaskError::from)
            });
        }

        {
            let processor = filter_registration.processor().clone();
            let cancellation = group_cancellation.clone();
            group.spawn("run event handler filter", async move {
                processor
                    .run(cancellation)
                    .await
                    .map_err(RegistrationTaskError::from)
            });
        }

        {
            let processor = handler_registration.processor().clone();
            let cancellation = group_cancellation.clone();
            let connection_guard = connection_cancellation.clone().drop_guard();
            group.spawn("run event handler", async move {
                let _connection_guard = connection_guard;
                processor
                    .run(cancellation)
                    .await
                    .map_err(RegistrationTaskError::from)
            });
        }

        let handler_id = registration_arguments.handler_id;
        group.on_all_tasks_completed(move || {
            tracing::debug!(%handler_id, "Event handler tasks completed");
        });

        let res = group.wait_for_all_cancelling_on_first(&group_cancellation).await;
        drop(handler_registration);
        drop(filter_registration);

        res.map_err(into_handle_registration_error)?;
        Ok(RemoteRegistrationOutcome::Completed)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
