// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use evrt_event_processing::*;
use tokio_util::sync::CancellationToken;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Selects events by their type. Partitioned type filters put each event
/// into the partition of its event source.
pub struct TypeFilterProcessor {
    scope: ScopeId,
    definition: StreamDefinition,
    types: BTreeSet<ArtifactId>,
    partitioned: bool,
}

impl TypeFilterProcessor {
    pub fn new(
        scope: ScopeId,
        target_stream: StreamId,
        types: impl IntoIterator<Item = ArtifactId>,
        partitioned: bool,
    ) -> Self {
        let types: BTreeSet<_> = types.into_iter().collect();

        Self {
            scope,
            definition: StreamDefinition::new(
                target_stream,
                FilterDefinition::TypeFilter {
                    types: types.clone(),
                    partitioned,
                },
            ),
            types,
            partitioned,
        }
    }
}

#[async_trait::async_trait]
impl FilterProcessor for TypeFilterProcessor {
    fn scope(&self) -> ScopeId {
        self.scope
    }

    fn definition(&self) -> &StreamDefinition {
        &self.definition
    }

    async fn filter(
        &self,
        event: &CommittedEvent,
        _retry: Option<&RetryContext>,
        _cancellation: &CancellationToken,
    ) -> Result<FilterResult, EventProcessorError> {
        if !self.types.contains(&event.event_type.id) {
            return Ok(FilterResult::excluded());
        }

        let partition = if self.partitioned {
            PartitionId::from(event.event_source)
        } else {
            PartitionId::none()
        };

        Ok(FilterResult::included(partition))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
