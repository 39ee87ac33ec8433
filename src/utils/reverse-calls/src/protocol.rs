// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;
use std::fmt::Debug;
use std::time::Duration;

use execution_context::ExecutionContext;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Payload types exchanged over one kind of reverse-call connection.
///
/// Filters, event handlers and any other remotely hosted callbacks are all
/// served by the same generic dispatcher; they only differ in the protocol
/// they plug into it.
pub trait ReverseCallProtocol: Debug + Send + Sync + 'static {
    /// Registration sent by the connecting client
    type ConnectArguments: Debug + Clone + Send + Sync + 'static;

    /// Acceptance or rejection of the registration
    type ConnectResponse: Debug + Clone + Send + Sync + 'static;

    /// Unit of work sent by the runtime
    type Request: Debug + Clone + Send + Sync + 'static;

    /// Outcome of a unit of work
    type Response: Debug + Clone + Send + Sync + 'static;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone)]
pub struct ReverseCallArguments<A> {
    /// Keep-alive interval requested by the client
    pub ping_interval: Duration,
    pub execution_context: ExecutionContext,
    pub arguments: A,
}

#[derive(Debug, Clone)]
pub struct ReverseCallRequest<R> {
    pub call_id: CallId,
    pub execution_context: ExecutionContext,
    pub payload: R,
}

#[derive(Debug, Clone)]
pub struct ReverseCallResponse<R> {
    pub call_id: CallId,
    pub payload: R,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub enum ClientToRuntimeMessage<P: ReverseCallProtocol> {
    Connect(ReverseCallArguments<P::ConnectArguments>),
    Pong,
    Response(ReverseCallResponse<P::Response>),
}

impl<P: ReverseCallProtocol> ClientToRuntimeMessage<P> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "Connect",
            Self::Pong => "Pong",
            Self::Response(_) => "Response",
        }
    }
}

#[derive(Debug)]
pub enum RuntimeToClientMessage<P: ReverseCallProtocol> {
    ConnectResponse(P::ConnectResponse),
    Ping,
    Request(ReverseCallRequest<P::Request>),
}

impl<P: ReverseCallProtocol> RuntimeToClientMessage<P> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectResponse(_) => "ConnectResponse",
            Self::Ping => "Ping",
            Self::Request(_) => "Request",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
