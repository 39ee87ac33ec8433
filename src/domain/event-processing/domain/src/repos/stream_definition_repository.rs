// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use internal_error::InternalError;
use thiserror::Error;

use crate::{ScopeId, StreamDefinition, StreamId};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Definitions of the derived streams, keyed by their target stream
#[cfg_attr(any(feature = "testing", test), mockall::automock)]
#[async_trait::async_trait]
pub trait StreamDefinitionRepository: Send + Sync {
    async fn load(
        &self,
        scope: ScopeId,
        stream: StreamId,
    ) -> Result<Option<StreamDefinition>, LoadStreamDefinitionError>;

    async fn persist(
        &self,
        scope: ScopeId,
        definition: &StreamDefinition,
    ) -> Result<(), PersistStreamDefinitionError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum LoadStreamDefinitionError {
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Error, Debug)]
pub enum PersistStreamDefinitionError {
    #[error(transparent)]
    Internal(#[from] InternalError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
