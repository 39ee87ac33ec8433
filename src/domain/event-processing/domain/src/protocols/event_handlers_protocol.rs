// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use reverse_calls::ReverseCallProtocol;
use serde::{Deserialize, Serialize};

use crate::{
    ArtifactId,
    EventProcessorId,
    ProcessorFailure,
    RegistrationResponse,
    RetryContext,
    ScopeId,
    StreamEvent,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Event handlers hosted by a client
#[derive(Debug)]
pub struct EventHandlerProtocol;

impl ReverseCallProtocol for EventHandlerProtocol {
    type ConnectArguments = EventHandlerRegistrationArguments;
    type ConnectResponse = RegistrationResponse;
    type Request = HandleEventRequest;
    type Response = HandleEventResponse;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHandlerRegistrationArguments {
    pub scope: ScopeId,
    pub handler_id: EventProcessorId,
    pub event_types: Vec<ArtifactId>,
    pub partitioned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleEventRequest {
    pub scope: ScopeId,
    pub event: StreamEvent,
    pub retry: Option<RetryContext>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleEventResponse {
    pub failure: Option<ProcessorFailure>,
}

impl HandleEventResponse {
    pub fn succeeded() -> Self {
        Self { failure: None }
    }

    pub fn failed(failure: ProcessorFailure) -> Self {
        Self {
            failure: Some(failure),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
