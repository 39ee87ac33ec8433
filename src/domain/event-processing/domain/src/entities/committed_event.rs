// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use chrono::{DateTime, Utc};
use execution_context::ExecutionContext;
use serde::{Deserialize, Serialize};

use crate::{ArtifactId, EventSourceId, PartitionId, StreamPosition};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub generation: u32,
}

impl Artifact {
    pub fn new(id: ArtifactId, generation: u32) -> Self {
        Self { id, generation }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// An event as it was committed to the event log. Never modified after commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedEvent {
    pub event_log_sequence_number: StreamPosition,
    pub occurred: DateTime<Utc>,
    pub event_source: EventSourceId,
    pub execution_context: ExecutionContext,
    pub event_type: Artifact,
    pub public: bool,
    pub content: serde_json::Value,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// An event at a given position of some stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub event: CommittedEvent,
    pub position: StreamPosition,
    pub partition: PartitionId,
}

impl StreamEvent {
    pub fn new(event: CommittedEvent, position: StreamPosition, partition: PartitionId) -> Self {
        Self {
            event,
            position,
            partition,
        }
    }

    /// Entry of the event log itself, where positions are sequence numbers and
    /// there is no partitioning
    pub fn from_event_log(event: CommittedEvent) -> Self {
        let position = event.event_log_sequence_number;
        Self::new(event, position, PartitionId::none())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
