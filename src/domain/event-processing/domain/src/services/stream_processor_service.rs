// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;

use execution_context::TenantId;

use crate::{
    GetStreamProcessorStateError,
    SetStreamProcessorPositionError,
    StreamPosition,
    StreamProcessorId,
    StreamProcessorState,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations on registered stream processors, addressed by id
#[cfg_attr(any(feature = "testing", test), mockall::automock)]
#[async_trait::async_trait]
pub trait StreamProcessorService: Send + Sync {
    fn get_current_state(
        &self,
        id: &StreamProcessorId,
    ) -> Result<HashMap<TenantId, StreamProcessorState>, GetStreamProcessorStateError>;

    async fn set_to_position(
        &self,
        id: &StreamProcessorId,
        tenant: TenantId,
        position: StreamPosition,
    ) -> Result<(), SetStreamProcessorPositionError>;

    async fn set_to_initial_position_for_all_tenants(
        &self,
        id: &StreamProcessorId,
    ) -> Result<(), SetStreamProcessorPositionError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
