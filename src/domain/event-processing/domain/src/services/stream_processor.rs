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
use internal_error::InternalError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{EventProcessorError, StreamDefinition, StreamPosition, StreamProcessorId, StreamProcessorState};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Runs the fetch, dispatch and advance loop of one processor over one stream,
/// for every tenant
#[async_trait::async_trait]
pub trait StreamProcessor: Send + Sync {
    fn id(&self) -> &StreamProcessorId;

    fn source_definition(&self) -> &StreamDefinition;

    /// Runs until `cancellation` fires or one of the tenant loops fails. May
    /// only be called once.
    async fn run(&self, cancellation: CancellationToken) -> Result<(), StreamProcessorError>;

    /// Snapshot of the in-memory state of every tenant
    fn get_current_state(
        &self,
    ) -> Result<HashMap<TenantId, StreamProcessorState>, GetStreamProcessorStateError>;

    async fn set_to_position(
        &self,
        tenant: TenantId,
        position: StreamPosition,
    ) -> Result<(), SetStreamProcessorPositionError>;

    async fn set_to_initial_position_for_all_tenants(
        &self,
    ) -> Result<(), SetStreamProcessorPositionError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum StreamProcessorError {
    #[error(transparent)]
    AlreadyStarted(#[from] StreamProcessorAlreadyStartedError),

    #[error(transparent)]
    EventProcessor(#[from] EventProcessorError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Error, Debug)]
pub enum GetStreamProcessorStateError {
    #[error(transparent)]
    NotRegistered(#[from] StreamProcessorNotRegisteredError),

    #[error(transparent)]
    NotStarted(#[from] StreamProcessorNotStartedError),
}

#[derive(Error, Debug)]
pub enum SetStreamProcessorPositionError {
    #[error(transparent)]
    NotRegistered(#[from] StreamProcessorNotRegisteredError),

    #[error(transparent)]
    NotStarted(#[from] StreamProcessorNotStartedError),

    #[error(transparent)]
    TenantNotFound(#[from] TenantNotFoundError),

    #[error(transparent)]
    Stopped(#[from] StreamProcessorStoppedError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
#[error("Stream processor {id} is already running")]
pub struct StreamProcessorAlreadyStartedError {
    pub id: StreamProcessorId,
}

#[derive(Error, Debug)]
#[error("Stream processor {id} is not registered")]
pub struct StreamProcessorNotRegisteredError {
    pub id: StreamProcessorId,
}

#[derive(Error, Debug)]
#[error("Stream processor {id} has not been started")]
pub struct StreamProcessorNotStartedError {
    pub id: StreamProcessorId,
}

#[derive(Error, Debug)]
#[error("Stream processor {id} does not run for tenant {tenant}")]
pub struct TenantNotFoundError {
    pub id: StreamProcessorId,
    pub tenant: TenantId,
}

#[derive(Error, Debug)]
#[error("Stream processor {id} has stopped")]
pub struct StreamProcessorStoppedError {
    pub id: StreamProcessorId,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
