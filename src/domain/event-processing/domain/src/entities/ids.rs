// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub const fn new(id: Uuid) -> Self {
                Self(id)
            }

            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_newtype!(
    /// Separates the local event log from logs received from other
    /// microservices
    ScopeId
);
uuid_newtype!(EventProcessorId);
uuid_newtype!(StreamId);
uuid_newtype!(EventSourceId);
uuid_newtype!(
    /// Identifies the type of an event
    ArtifactId
);

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

impl ScopeId {
    pub const fn default_scope() -> Self {
        Self::new(Uuid::nil())
    }

    pub fn is_default(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::default_scope()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

impl StreamId {
    const PUBLIC_EVENT_LOG: Uuid = Uuid::from_u128(0xffff_ffff_ffff_ffff_ffff_ffff_ffff_ffff);

    /// The committed events themselves
    pub const fn event_log() -> Self {
        Self::new(Uuid::nil())
    }

    /// Public events of the event log
    pub const fn public_event_log() -> Self {
        Self::new(Self::PUBLIC_EVENT_LOG)
    }

    pub fn is_event_log(&self) -> bool {
        self.0.is_nil()
    }

    /// Reserved streams are produced by the runtime and can never be the
    /// target of a filter
    pub fn is_non_writeable(&self) -> bool {
        self.is_event_log() || self.0 == Self::PUBLIC_EVENT_LOG
    }
}

impl From<EventProcessorId> for StreamId {
    fn from(value: EventProcessorId) -> Self {
        Self(value.0)
    }
}

impl From<StreamId> for EventProcessorId {
    fn from(value: StreamId) -> Self {
        Self(value.0)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(String);

impl PartitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The single implicit partition of an unpartitioned stream
    pub fn none() -> Self {
        Self(String::new())
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<EventSourceId> for PartitionId {
    fn from(value: EventSourceId) -> Self {
        Self(value.0.to_string())
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("<none>")
        } else {
            f.write_str(&self.0)
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StreamPosition(u64);

impl StreamPosition {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn initial() -> Self {
        Self(0)
    }

    pub fn is_initial(&self) -> bool {
        self.0 == 0
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn increment(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl From<u64> for StreamPosition {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Identity of a stream processor: which processor reads which stream, and
/// in which scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamProcessorId {
    pub scope: ScopeId,
    pub event_processor_id: EventProcessorId,
    pub source_stream_id: StreamId,
}

impl StreamProcessorId {
    pub fn new(scope: ScopeId, event_processor_id: EventProcessorId, source_stream_id: StreamId) -> Self {
        Self {
            scope,
            event_processor_id,
            source_stream_id,
        }
    }

    /// A filter is identified by the stream it writes to and always reads the
    /// event log
    pub fn for_filter(scope: ScopeId, target_stream_id: StreamId) -> Self {
        Self::new(scope, target_stream_id.into(), StreamId::event_log())
    }
}

impl fmt::Display for StreamProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.scope, self.event_processor_id, self.source_stream_id
        )
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
