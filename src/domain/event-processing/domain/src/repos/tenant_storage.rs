// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use execution_context::TenantId;
use internal_error::InternalError;

use crate::{EventFetcher, EventWriter, StreamDefinitionRepository, StreamProcessorStateRepository};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Storage collaborators of a single tenant
#[derive(Clone)]
pub struct TenantStorage {
    pub events: Arc<dyn EventFetcher>,
    pub writer: Arc<dyn EventWriter>,
    pub states: Arc<dyn StreamProcessorStateRepository>,
    pub definitions: Arc<dyn StreamDefinitionRepository>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg_attr(any(feature = "testing", test), mockall::automock)]
#[async_trait::async_trait]
pub trait TenantStorageProvider: Send + Sync {
    async fn list_tenants(&self) -> Result<Vec<TenantId>, InternalError>;

    async fn storage_for(&self, tenant: TenantId) -> Result<TenantStorage, InternalError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
