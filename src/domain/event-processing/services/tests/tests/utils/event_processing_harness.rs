// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;
use std::time::Duration;

use dill::{Catalog, CatalogBuilder};
use evrt_event_processing::*;
use evrt_event_processing_inmem::*;
use evrt_event_processing_services::*;
use execution_context::{ExecutionContext, TenantId};
use reverse_calls::{
    ReverseCallClient,
    ReverseCallDispatcher,
    ReverseCallDispatcherConfig,
    ReverseCallProtocol,
    in_memory_channel_pair,
};
use time_source::{SystemTimeSource, SystemTimeSourceDefault};
use tokio_util::sync::CancellationToken;

use super::RecordingEventProcessor;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const WAIT_STEP: Duration = Duration::from_millis(5);

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) struct EventProcessingHarness {
    pub catalog: Catalog,
    pub scope: ScopeId,
    pub tenant: TenantId,
    pub tenant_storage_provider: Arc<InMemoryTenantStorageProvider>,
    pub filters_service: Arc<dyn FiltersService>,
    pub event_handlers_service: Arc<dyn EventHandlersService>,
    pub stream_processor_service: Arc<dyn StreamProcessorService>,
    pub registry: Arc<dyn StreamProcessorRegistry>,
}

impl EventProcessingHarness {
    pub fn new() -> Self {
        let catalog = {
            let mut b = CatalogBuilder::new();
            b.add::<SystemTimeSourceDefault>()
                .add_value(StreamProcessorConfig::test_default())
                .add::<InMemoryTenantStorageProvider>();

            register_dependencies(&mut b);

            b.build()
        };

        let tenant_storage_provider = catalog.get_one::<InMemoryTenantStorageProvider>().unwrap();
        let tenant = TenantId::new_random();
        tenant_storage_provider.add_tenant(tenant);

        Self {
            scope: ScopeId::default_scope(),
            tenant,
            tenant_storage_provider,
            filters_service: catalog.get_one().unwrap(),
            event_handlers_service: catalog.get_one().unwrap(),
            stream_processor_service: catalog.get_one().unwrap(),
            registry: catalog.get_one().unwrap(),
            catalog,
        }
    }

    /// Tenants have to be added before the stream processors that should see
    /// them are started
    pub fn add_tenant(&self) -> TenantId {
        let tenant = TenantId::new_random();
        self.tenant_storage_provider.add_tenant(tenant);
        tenant
    }

    pub fn storage(&self, tenant: TenantId) -> TenantStorage {
        self.tenant_storage_provider.add_tenant(tenant)
    }

    pub fn commit(
        &self,
        tenant: TenantId,
        events: &[(EventSourceId, ArtifactId)],
    ) -> Vec<CommittedEvent> {
        let store = self.tenant_storage_provider.event_store(tenant).unwrap();

        store.commit(
            self.scope,
            &ExecutionContext::system().for_tenant(tenant),
            events
                .iter()
                .map(|(event_source, event_type)| UncommittedEvent {
                    event_source: *event_source,
                    event_type: Artifact::new(*event_type, 1),
                    public: false,
                    content: serde_json::json!({}),
                }),
        )
    }

    pub fn stream_events(&self, tenant: TenantId, stream: StreamId) -> Vec<StreamEvent> {
        self.tenant_storage_provider
            .event_store(tenant)
            .unwrap()
            .stream_events(self.scope, stream)
    }

    /// Stream processor reading `source` and dispatching to `processor` for
    /// every tenant
    pub fn stream_processor(
        &self,
        source: StreamDefinition,
        processor: Arc<RecordingEventProcessor>,
    ) -> Arc<StreamProcessorImpl> {
        let id = StreamProcessorId::new(self.scope, processor.id(), source.stream_id);
        let processor_factory =
            move |_tenant: TenantId, _storage: &TenantStorage| -> Arc<dyn EventProcessor> {
                processor.clone()
            };

        Arc::new(StreamProcessorImpl::new(
            id,
            source,
            Arc::new(processor_factory),
            self.tenant_storage_provider.clone(),
            self.catalog.get_one::<dyn SystemTimeSource>().unwrap(),
            Arc::new(StreamProcessorConfig::test_default()),
        ))
    }

    pub fn register_stream_processor(
        &self,
        source: StreamDefinition,
        processor: Arc<RecordingEventProcessor>,
    ) -> StreamProcessorRegistration {
        StreamProcessorRegistration::try_register(
            self.registry.clone(),
            self.stream_processor(source, processor),
        )
        .unwrap()
    }

    pub async fn register_type_filter(
        &self,
        target: StreamId,
        types: &[ArtifactId],
        partitioned: bool,
    ) -> Result<FilterRegistration, RegisterFilterError> {
        let filter = Arc::new(TypeFilterProcessor::new(
            self.scope,
            target,
            types.iter().copied(),
            partitioned,
        ));
        self.filters_service
            .register(filter, &CancellationToken::new())
            .await
    }

    pub async fn wait_for_state(
        &self,
        id: &StreamProcessorId,
        tenant: TenantId,
        predicate: impl Fn(&StreamProcessorState) -> bool,
    ) -> StreamProcessorState {
        wait_until(|| {
            self.stream_processor_service
                .get_current_state(id)
                .ok()
                .and_then(|mut states| states.remove(&tenant))
                .filter(|state| predicate(state))
        })
        .await
    }

    pub async fn wait_for_stream_len(
        &self,
        tenant: TenantId,
        stream: StreamId,
        len: usize,
    ) -> Vec<StreamEvent> {
        wait_until(|| {
            let events = self.stream_events(tenant, stream);
            (events.len() >= len).then_some(events)
        })
        .await
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) fn reverse_call_pair<P: ReverseCallProtocol>()
-> (Arc<ReverseCallDispatcher<P>>, Arc<ReverseCallClient<P>>) {
    let config = Arc::new(ReverseCallDispatcherConfig::test_default());
    let (runtime_channel, client_channel) = in_memory_channel_pair(16);

    (
        Arc::new(ReverseCallDispatcher::new(runtime_channel, config.clone())),
        Arc::new(ReverseCallClient::new(client_channel, config)),
    )
}

/// Runs the processor in the background until `cancellation` fires
pub(crate) fn spawn_run(
    processor: &Arc<dyn StreamProcessor>,
    cancellation: &CancellationToken,
) -> tokio::task::JoinHandle<Result<(), StreamProcessorError>> {
    let processor = processor.clone();
    let cancellation = cancellation.clone();
    tokio::spawn(async move { processor.run(cancellation).await })
}

/// Polls until `check` yields a value, panicking after a few seconds
pub(crate) async fn wait_until<T>(mut check: impl FnMut() -> Option<T>) -> T {
    let waiting = async {
        loop {
            if let Some(value) = check() {
                return value;
            }
            tokio::time::sleep(WAIT_STEP).await;
        }
    };

    tokio::time::timeout(WAIT_TIMEOUT, waiting)
        .await
        .expect("Condition not reached in time")
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
