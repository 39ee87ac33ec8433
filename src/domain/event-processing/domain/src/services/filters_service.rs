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

use crate::{
    FilterProcessor,
    FilterProtocol,
    FilterRegistration,
    HandleRemoteRegistrationError,
    RegisterFilterError,
    RemoteRegistrationOutcome,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
pub trait FiltersService: Send + Sync {
    /// Registers an in-process filter after validating it against the history
    /// of its target stream in every tenant. The filter runs once the
    /// returned registration is run, and is unregistered when it is dropped.
    async fn register(
        &self,
        filter: Arc<dyn FilterProcessor>,
        cancellation: &CancellationToken,
    ) -> Result<FilterRegistration, RegisterFilterError>;

    /// Serves a filter hosted by a client for the lifetime of its connection
    async fn handle_remote_filter(
        &self,
        dispatcher: Arc<ReverseCallDispatcher<FilterProtocol>>,
        cancellation: &CancellationToken,
    ) -> Result<RemoteRegistrationOutcome, HandleRemoteRegistrationError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
