// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
#[error("Connection ended before registration arguments were received")]
pub struct NoRegistrationReceivedError;

#[derive(Error, Debug)]
#[error("Malformed handshake: {reason}")]
pub struct MalformedHandshakeError {
    pub reason: String,
}

#[derive(Error, Debug)]
#[error("No message received from the other side within {timeout:?}")]
pub struct PingTimedOutError {
    pub timeout: Duration,
}

#[derive(Error, Debug)]
#[error("Connection closed")]
pub struct ConnectionClosedError;

#[derive(Error, Debug)]
#[error("Operation cancelled")]
pub struct ReverseCallCancelledError;

#[derive(Error, Debug)]
#[error("Requests are already being handled on this connection")]
pub struct AlreadyHandlingError;

#[derive(Error, Debug)]
#[error("Connection is {actual}, but the operation requires it to be {expected}")]
pub struct ConnectionStateError {
    pub expected: &'static str,
    pub actual: &'static str,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
