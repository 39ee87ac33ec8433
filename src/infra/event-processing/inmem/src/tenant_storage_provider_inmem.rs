// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use dill::{component, interface, scope, Singleton};
use evrt_event_processing::*;
use execution_context::TenantId;
use internal_error::InternalError;
use time_source::SystemTimeSource;

use crate::{
    InMemoryEventStore,
    InMemoryStreamDefinitionRepository,
    InMemoryStreamProcessorStateRepository,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Keeps the storage of every known tenant in memory. Tenants are added
/// explicitly and never removed.
pub struct InMemoryTenantStorageProvider {
    time_source: Arc<dyn SystemTimeSource>,
    tenants: Arc<Mutex<BTreeMap<TenantId, TenantState>>>,
}

#[derive(Clone)]
struct TenantState {
    event_store: Arc<InMemoryEventStore>,
    storage: TenantStorage,
}

impl TenantState {
    fn new(time_source: Arc<dyn SystemTimeSource>) -> Self {
        let event_store = Arc::new(InMemoryEventStore::new(time_source));
        let storage = TenantStorage {
            events: event_store.clone(),
            writer: event_store.clone(),
            states: Arc::new(InMemoryStreamProcessorStateRepository::new()),
            definitions: Arc::new(InMemoryStreamDefinitionRepository::new()),
        };
        Self {
            event_store,
            storage,
        }
    }
}

#[component(pub)]
#[interface(dyn TenantStorageProvider)]
#[scope(Singleton)]
impl InMemoryTenantStorageProvider {
    pub fn new(time_source: Arc<dyn SystemTimeSource>) -> Self {
        Self {
            time_source,
            tenants: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl InMemoryTenantStorageProvider {
    /// Registers the tenant, returning its storage. Adding a known tenant
    /// returns the existing storage.
    pub fn add_tenant(&self, tenant: TenantId) -> TenantStorage {
        let mut guard = self.tenants.lock().unwrap();
        guard
            .entry(tenant)
            .or_insert_with(|| {
                tracing::debug!(%tenant, "Adding tenant");
                TenantState::new(self.time_source.clone())
            })
            .storage
            .clone()
    }

    /// Event store of a known tenant, used to commit events to its log
    pub fn event_store(&self, tenant: TenantId) -> Option<Arc<InMemoryEventStore>> {
        let guard = self.tenants.lock().unwrap();
        guard.get(&tenant).map(|state| state.event_store.clone())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
impl TenantStorageProvider for InMemoryTenantStorageProvider {
    async fn list_tenants(&self) -> Result<Vec<TenantId>, InternalError> {
        let guard = self.tenants.lock().unwrap();
        Ok(guard.keys().copied().collect())
    }

    async fn storage_for(&self, tenant: TenantId) -> Result<TenantStorage, InternalError> {
        let guard = self.tenants.lock().unwrap();
        guard
            .get(&tenant)
            .map(|state| state.storage.clone())
            .ok_or_else(|| InternalError::new(format!("Unknown tenant: {tenant}")))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
