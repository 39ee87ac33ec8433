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
pub struct InMemoryStreamDefinitionRepository {
    state: Arc<Mutex<HashMap<(ScopeId, StreamId), StreamDefinition>>>,
}

impl InMemoryStreamDefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
impl StreamDefinitionRepository for InMemoryStreamDefinitionRepository {
    async fn load(
        &self,
        scope: ScopeId,
        stream: StreamId,
    ) -> Result<Option<StreamDefinition>, LoadStreamDefinitionError> {
        let guard = self.state.lock().unwrap();
        Ok(guard.get(&(scope, stream)).cloned())
    }

    async fn persist(
        &self,
        scope: ScopeId,
        definition: &StreamDefinition,
    ) -> Result<(), PersistStreamDefinitionError> {
        let mut guard = self.state.lock().unwrap();
        guard.insert((scope, definition.target_stream()), definition.clone());
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
