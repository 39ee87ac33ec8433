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

use crate::{StreamProcessorId, StreamProcessorState};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg_attr(any(feature = "testing", test), mockall::automock)]
#[async_trait::async_trait]
pub trait StreamProcessorStateRepository: Send + Sync {
    async fn load(
        &self,
        id: &StreamProcessorId,
    ) -> Result<Option<StreamProcessorState>, LoadStreamProcessorStateError>;

    async fn persist(
        &self,
        id: &StreamProcessorId,
        state: &StreamProcessorState,
    ) -> Result<(), PersistStreamProcessorStateError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum LoadStreamProcessorStateError {
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Error, Debug)]
pub enum PersistStreamProcessorStateError {
    #[error(transparent)]
    Internal(#[from] InternalError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
