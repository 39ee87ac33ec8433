// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{StreamProcessor, StreamProcessorError, StreamProcessorId};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Table of the stream processors that are currently active
#[cfg_attr(any(feature = "testing", test), mockall::automock)]
pub trait StreamProcessorRegistry: Send + Sync {
    /// Inserts the processor unless its id is already taken
    fn try_register(
        &self,
        processor: Arc<dyn StreamProcessor>,
    ) -> Result<(), StreamProcessorAlreadyRegisteredError>;

    /// Returns whether an entry was removed
    fn unregister(&self, id: &StreamProcessorId) -> bool;

    fn get(&self, id: &StreamProcessorId) -> Option<Arc<dyn StreamProcessor>>;

    fn registered_ids(&self) -> Vec<StreamProcessorId>;
}

#[derive(Error, Debug)]
#[error("Stream processor {id} is already registered")]
pub struct StreamProcessorAlreadyRegisteredError {
    pub id: StreamProcessorId,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Keeps a stream processor registered for as long as it is alive
pub struct StreamProcessorRegistration {
    processor: Arc<dyn StreamProcessor>,
    registry: Arc<dyn StreamProcessorRegistry>,
}

pub type FilterRegistration = StreamProcessorRegistration;

impl StreamProcessorRegistration {
    pub fn try_register(
        registry: Arc<dyn StreamProcessorRegistry>,
        processor: Arc<dyn StreamProcessor>,
    ) -> Result<Self, StreamProcessorAlreadyRegisteredError> {
        registry.try_register(processor.clone())?;

        tracing::debug!(id = %processor.id(), "Stream processor registered");

        Ok(Self {
            processor,
            registry,
        })
    }

    pub fn id(&self) -> &StreamProcessorId {
        self.processor.id()
    }

    pub fn processor(&self) -> &Arc<dyn StreamProcessor> {
        &self.processor
    }

    pub async fn run(&self, cancellation: CancellationToken) -> Result<(), StreamProcessorError> {
        self.processor.run(cancellation).await
    }
}

impl Drop for StreamProcessorRegistration {
    fn drop(&mut self) {
        if self.registry.unregister(self.processor.id()) {
            tracing::debug!(id = %self.processor.id(), "Stream processor unregistered");
        }
    }
}

impl std::fmt::Debug for StreamProcessorRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProcessorRegistration")
            .field("id", self.processor.id())
            .finish_non_exhaustive()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
