// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ArtifactId, StreamId};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// How the events of a stream are selected from the event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FilterDefinition {
    /// The event log itself
    Unfiltered,

    /// In-process selection by event type
    TypeFilter {
        types: BTreeSet<ArtifactId>,
        partitioned: bool,
    },

    /// Selection made by client code reached through a reverse call
    Remote { partitioned: bool },

    /// Like [`FilterDefinition::Remote`], but only ever sees public events
    Public,
}

impl FilterDefinition {
    pub fn partitioned(&self) -> bool {
        match self {
            Self::Unfiltered => false,
            Self::TypeFilter { partitioned, .. } | Self::Remote { partitioned } => *partitioned,
            Self::Public => true,
        }
    }

    pub fn public(&self) -> bool {
        matches!(self, Self::Public)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unfiltered => "unfiltered",
            Self::TypeFilter { .. } => "type filter",
            Self::Remote { .. } => "remote filter",
            Self::Public => "public filter",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDefinition {
    pub stream_id: StreamId,
    pub filter: FilterDefinition,
}

impl StreamDefinition {
    pub fn new(stream_id: StreamId, filter: FilterDefinition) -> Self {
        Self { stream_id, filter }
    }

    pub fn event_log() -> Self {
        Self::new(StreamId::event_log(), FilterDefinition::Unfiltered)
    }

    pub fn source_stream(&self) -> StreamId {
        match self.filter {
            FilterDefinition::Unfiltered => self.stream_id,
            _ => StreamId::event_log(),
        }
    }

    pub fn target_stream(&self) -> StreamId {
        self.stream_id
    }

    pub fn partitioned(&self) -> bool {
        self.filter.partitioned()
    }

    pub fn public(&self) -> bool {
        self.filter.public()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
