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
use tokio_util::sync::CancellationToken;

use crate::{FilterProcessor, StreamId, TenantStorage};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Checks that a filter agrees with what the previously persisted filter of
/// the same target stream has already written
#[async_trait::async_trait]
pub trait FilterValidator: Send + Sync {
    async fn validate(
        &self,
        storage: &TenantStorage,
        filter: &dyn FilterProcessor,
        cancellation: &CancellationToken,
    ) -> Result<(), FilterValidationError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum FilterValidationError {
    #[error(transparent)]
    Failed(#[from] FilterValidationFailedError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Filter of stream {stream} is incompatible with its history: {reason}")]
pub struct FilterValidationFailedError {
    pub stream: StreamId,
    pub reason: String,
}

impl FilterValidationFailedError {
    pub fn new(stream: StreamId, reason: impl Into<String>) -> Self {
        Self {
            stream,
            reason: reason.into(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
