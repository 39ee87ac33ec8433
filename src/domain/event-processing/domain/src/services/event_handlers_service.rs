// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use reverse_calls::ReverseCallDispatcher;
use tokio_util::sync::CancellationToken;

use crate::{EventHandlerProtocol, HandleRemoteRegistrationError, RemoteRegistrationOutcome};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
pub trait EventHandlersService: Send + Sync {
    /// Serves an event handler hosted by a client for the lifetime of its
    /// connection. The handler gets its own type filtered stream, which is
    /// filled and processed while the connection stays up.
    async fn handle_remote_event_handler(
        &self,
        dispatcher: Arc<ReverseCallDispatcher<EventHandlerProtocol>>,
        cancellation: &CancellationToken,
    ) -> Result<RemoteRegistrationOutcome, HandleRemoteRegistrationError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
