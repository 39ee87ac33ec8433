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

use crate::{PartitionId, ScopeId, StreamEvent, StreamId, StreamPosition};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Read access to the event log and the streams derived from it
#[cfg_attr(any(feature = "testing", test), mockall::automock)]
#[async_trait::async_trait]
pub trait EventFetcher: Send + Sync {
    /// Returns the first event at or after `from`
    async fn fetch_next(
        &self,
        scope: ScopeId,
        stream: StreamId,
        from: StreamPosition,
    ) -> Result<Option<StreamEvent>, FetchEventError>;

    /// Returns the first event of `partition` at or after `from`
    async fn fetch_next_in_partition(
        &self,
        scope: ScopeId,
        stream: StreamId,
        partition: &PartitionId,
        from: StreamPosition,
    ) -> Result<Option<StreamEvent>, FetchEventError>;

    /// Returns the position of the first event of `partition` at or after
    /// `from`, without loading it
    async fn find_next_position(
        &self,
        scope: ScopeId,
        stream: StreamId,
        partition: &PartitionId,
        from: StreamPosition,
    ) -> Result<Option<StreamPosition>, FetchEventError>;

    /// Returns the position the next event appended to the stream would get,
    /// which is also the number of events in it
    async fn tail_position(
        &self,
        scope: ScopeId,
        stream: StreamId,
    ) -> Result<StreamPosition, FetchEventError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum FetchEventError {
    #[error(transparent)]
    Internal(#[from] InternalError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
