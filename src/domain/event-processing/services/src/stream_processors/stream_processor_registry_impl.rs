// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};

use dill::*;
use evrt_event_processing::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct StreamProcessorRegistryImpl {
    processors: Mutex<HashMap<StreamProcessorId, Arc<dyn StreamProcessor>>>,
}

#[component(pub)]
#[interface(dyn StreamProcessorRegistry)]
#[scope(Singleton)]
impl StreamProcessorRegistryImpl {
    pub fn new() -> Self {
        Self {
            processors: Mutex::new(HashMap::new()),
        }
    }
}

impl StreamProcessorRegistry for StreamProcessorRegistryImpl {
    fn try_register(
        &self,
        processor: Arc<dyn StreamProcessor>,
    ) -> Result<(), StreamProcessorAlreadyRegisteredError> {
        let id = *processor.id();

        match self.processors.lock().unwrap().entry(id) {
            Entry::Occupied(_) => {
                tracing::warn!(%id, "Stream processor is already registered");
                Err(StreamProcessorAlreadyRegisteredError { id })
            }
            Entry::Vacant(entry) => {
                entry.insert(processor);
                Ok(())
            }
        }
    }

    fn unregister(&self, id: &StreamProcessorId) -> bool {
        self.processors.lock().unwrap().remove(id).is_some()
    }

    fn get(&self, id: &StreamProcessorId) -> Option<Arc<dyn StreamProcessor>> {
        self.processors.lock().unwrap().get(id).cloned()
    }

    fn registered_ids(&self) -> Vec<StreamProcessorId> {
        let mut ids: Vec<_> = self.processors.lock().unwrap().keys().copied().collect();
        ids.sort();
        ids
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
