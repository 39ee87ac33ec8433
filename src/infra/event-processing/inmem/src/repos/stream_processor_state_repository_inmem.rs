// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use evrt_event_processing::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Default)]
pub struct InMemoryStreamProcessorStateRepository {
    state: Arc<Mutex<HashMap<StreamProcessorId, StreamProcessorState>>>,
}

impl InMemoryStreamProcessorStateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
impl StreamProcessorStateRepository for InMemoryStreamProcessorStateRepository {
    async fn load(
        &self,
        id: &StreamProcessorId,
    ) -> Result<Option<StreamProcessorState>, LoadStreamProcessorStateError> {
        let guard = self.state.lock().unwrap();
        Ok(guard.get(id).cloned())
    }

    async fn persist(
        &self,
        id: &StreamProcessorId,
        state: &StreamProcessorState,
    ) -> Result<(), PersistStreamProcessorStateError> {
        let mut guard = self.state.lock().unwrap();
        guard.insert(*id, state.clone());
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
