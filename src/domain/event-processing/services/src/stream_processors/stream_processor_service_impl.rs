// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::Arc;

use dill::*;
use evrt_event_processing::*;
use execution_context::TenantId;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct StreamProcessorServiceImpl {
    registry: Arc<dyn StreamProcessorRegistry>,
}

#[component(pub)]
#[interface(dyn StreamProcessorService)]
impl StreamProcessorServiceImpl {
    pub fn new(registry: Arc<dyn StreamProcessorRegistry>) -> Self {
        Self { registry }
    }

    fn get_processor(
        &self,
        id: &StreamProcessorId,
    ) -> Result<Arc<dyn StreamProcessor>, StreamProcessorNotRegisteredError> {
        self.registry
            .get(id)
            .ok_or(StreamProcessorNotRegisteredError { id: *id })
    }
}

#[async_trait::async_trait]
impl StreamProcessorService for StreamProcessorServiceImpl {
    fn get_current_state(
        &self,
        id: &StreamProcessorId,
    ) -> Result<HashMap<TenantId, StreamProcessorState>, GetStreamProcessorStateError> {
        self.get_processor(id)?.get_current_state()
    }

    #[tracing::instrument(level = "info", skip_all, fields(%id, %tenant, %position))]
    async fn set_to_position(
        &self,
        id: &StreamProcessorId,
        tenant: TenantId,
        position: StreamPosition,
    ) -> Result<(), SetStreamProcessorPositionError> {
        self.get_processor(id)?
            .set_to_position(tenant, position)
            .await
    }

    #[tracing::instrument(level = "info", skip_all, fields(%id))]
    async fn set_to_initial_position_for_all_tenants(
        &self,
        id: &StreamProcessorId,
    ) -> Result<(), SetStreamProcessorPositionError> {
        self.get_processor(id)?
            .set_to_initial_position_for_all_tenants()
            .await
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
