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

use crate::{CommittedEvent, PartitionId, ScopeId, StreamId, StreamPosition};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Appends filtered events to derived streams
#[cfg_attr(any(feature = "testing", test), mockall::automock)]
#[async_trait::async_trait]
pub trait EventWriter: Send + Sync {
    /// Appends the event at the tail of the stream and returns its position.
    ///
    /// Appending an event that the stream already holds is a no-op returning
    /// its existing position. If the tail holds a later event of the event
    /// log, another writer got there first and
    /// [`AppendEventError::PositionOccupied`] is returned.
    async fn append(
        &self,
        scope: ScopeId,
        stream: StreamId,
        event: &CommittedEvent,
        partition: &PartitionId,
    ) -> Result<StreamPosition, AppendEventError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum AppendEventError {
    #[error(transparent)]
    PositionOccupied(#[from] PositionOccupiedError),

    #[error(transparent)]
    NonWriteableStream(#[from] NonWriteableStreamError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Error, Debug)]
#[error("Position {position} of stream {stream} is already occupied")]
pub struct PositionOccupiedError {
    pub stream: StreamId,
    pub position: StreamPosition,
}

#[derive(Error, Debug)]
#[error("Stream {stream} is reserved and cannot be written to")]
pub struct NonWriteableStreamError {
    pub stream: StreamId,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
