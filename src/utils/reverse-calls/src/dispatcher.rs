// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use execution_context::ExecutionContext;
use internal_error::InternalError;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::pending_calls::PendingCalls;
use crate::transport::SerializedWriter;
use crate::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatcherPhase {
    Unconnected,
    ReceivingArguments,
    AwaitingAcceptance { ping_interval: Duration },
    Accepting,
    Accepted,
    Closed,
}

impl DispatcherPhase {
    fn name(self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::ReceivingArguments => "receiving arguments",
            Self::AwaitingAcceptance { .. } => "awaiting acceptance",
            Self::Accepting => "accepting",
            Self::Accepted => "accepted",
            Self::Closed => "closed",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Runtime side of one reverse-call connection.
///
/// The lifecycle is: [`Self::receive_arguments`] once, then either
/// [`Self::reject`] or [`Self::accept`]. While `accept` is running the
/// connection is kept alive with pings, and [`Self::call`] may be used
/// concurrently to send requests to the client and await their responses.
/// Calls made before the connect response went out wait for it.
pub struct ReverseCallDispatcher<P: ReverseCallProtocol> {
    config: Arc<ReverseCallDispatcherConfig>,
    inbound: Mutex<Option<MessageStream<ClientToRuntimeMessage<P>>>>,
    writer: SerializedWriter<RuntimeToClientMessage<P>>,
    phase: Mutex<DispatcherPhase>,
    phase_changed: Notify,
    pending_calls: PendingCalls<P::Response>,
}

impl<P: ReverseCallProtocol> ReverseCallDispatcher<P> {
    pub fn new(channel: RuntimeChannel<P>, config: Arc<ReverseCallDispatcherConfig>) -> Self {
        Self {
            config,
            inbound: Mutex::new(Some(channel.inbound)),
            writer: SerializedWriter::new(channel.outbound),
            phase: Mutex::new(DispatcherPhase::Unconnected),
            phase_changed: Notify::new(),
            pending_calls: PendingCalls::new(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        *self.phase.lock().unwrap() == DispatcherPhase::Accepted
    }

    pub fn num_pending_calls(&self) -> usize {
        self.pending_calls.len()
    }

    /// Waits for the first message of the connection, which must carry the
    /// registration arguments
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn receive_arguments(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<ReverseCallArguments<P::ConnectArguments>, ReceiveArgumentsError> {
        self.advance_phase(
            |phase| matches!(phase, DispatcherPhase::Unconnected),
            "unconnected",
            DispatcherPhase::ReceivingArguments,
        )?;

        let mut inbound = self.take_inbound()?;

        let first_message = tokio::select! {
            biased;
            () = cancellation.cancelled() => {
                self.set_phase(DispatcherPhase::Closed);
                return Err(ReverseCallCancelledError.into());
            }
            message = inbound.next() => message,
        };

        *self.inbound.lock().unwrap() = Some(inbound);

        let mut arguments = match first_message {
            None => {
                self.set_phase(DispatcherPhase::Closed);
                return Err(NoRegistrationReceivedError.into());
            }
            Some(Err(e)) => {
                self.set_phase(DispatcherPhase::Closed);
                return Err(e.into());
            }
            Some(Ok(ClientToRuntimeMessage::Connect(arguments))) => arguments,
            Some(Ok(other)) => {
                self.set_phase(DispatcherPhase::Closed);
                return Err(MalformedHandshakeError {
                    reason: format!("Expected Connect as the first message, got {}", other.kind()),
                }
                .into());
            }
        };

        if arguments.ping_interval.is_zero() {
            self.set_phase(DispatcherPhase::Closed);
            return Err(MalformedHandshakeError {
                reason: "Ping interval must be greater than zero".to_string(),
            }
            .into());
        }

        if arguments.ping_interval > self.config.max_ping_interval {
            tracing::debug!(
                requested = ?arguments.ping_interval,
                max = ?self.config.max_ping_interval,
                "Requested ping interval is too long, using the maximum",
            );
            arguments.ping_interval = self.config.max_ping_interval;
        }

        self.set_phase(DispatcherPhase::AwaitingAcceptance {
            ping_interval: arguments.ping_interval,
        });

        tracing::debug!(
            ping_interval = ?arguments.ping_interval,
            tenant = %arguments.execution_context.tenant,
            "Received reverse call arguments",
        );

        Ok(arguments)
    }

    /// Sends the negative connect response and ends the connection
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn reject(&self, response: P::ConnectResponse) -> Result<(), RejectError> {
        self.advance_phase(
            |phase| matches!(phase, DispatcherPhase::AwaitingAcceptance { .. }),
            "awaiting acceptance",
            DispatcherPhase::Closed,
        )?;

        let res = self
            .writer
            .write(RuntimeToClientMessage::ConnectResponse(response))
            .await;

        self.shutdown().await;
        res?;

        tracing::debug!("Rejected reverse call connection");
        Ok(())
    }

    /// Sends the positive connect response and keeps serving the connection
    /// until `cancellation` fires or the connection fails.
    ///
    /// Returns `Ok` only on cancellation. Losing the connection, or not
    /// hearing from the client for the ping timeout, is an error.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn accept(
        &self,
        response: P::ConnectResponse,
        cancellation: &CancellationToken,
    ) -> Result<(), AcceptError> {
        let ping_interval = {
            let mut phase = self.phase.lock().unwrap();
            match *phase {
                DispatcherPhase::AwaitingAcceptance { ping_interval } => {
                    *phase = DispatcherPhase::Accepting;
                    ping_interval
                }
                other => {
                    return Err(ConnectionStateError {
                        expected: "awaiting acceptance",
                        actual: other.name(),
                    }
                    .into());
                }
            }
        };

        let res = match self.take_inbound() {
            Ok(inbound) => {
                match self
                    .writer
                    .write(RuntimeToClientMessage::ConnectResponse(response))
                    .await
                {
                    Ok(()) => {
                        self.set_phase(DispatcherPhase::Accepted);
                        tracing::debug!(?ping_interval, "Accepted reverse call connection");
                        self.serve(inbound, ping_interval, cancellation).await
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        };

        self.shutdown().await;

        match &res {
            Ok(()) => tracing::debug!("Reverse call connection closed by cancellation"),
            Err(e) => tracing::warn!(error = ?e, error_msg = %e, "Reverse call connection failed"),
        }

        res
    }

    /// Sends a request to the client and waits for the correlated response
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn call(
        &self,
        request: P::Request,
        execution_context: ExecutionContext,
        cancellation: &CancellationToken,
    ) -> Result<P::Response, CallError> {
        self.wait_until_accepted(cancellation).await?;

        let call_id = CallId::new_random();
        let Some(response_rx) = self.pending_calls.register(call_id) else {
            return Err(ConnectionClosedError.into());
        };

        if let Err(e) = self
            .writer
            .write(RuntimeToClientMessage::Request(ReverseCallRequest {
                call_id,
                execution_context,
                payload: request,
            }))
            .await
        {
            self.pending_calls.forget(call_id);
            return Err(e.into());
        }

        tracing::debug!(%call_id, "Reverse call request sent");

        tokio::select! {
            biased;
            () = cancellation.cancelled() => {
                self.pending_calls.forget(call_id);
                Err(CallError::from(ReverseCallCancelledError))
            }
            response = response_rx => response.map_err(|_| CallError::from(ConnectionClosedError)),
        }
    }

    async fn wait_until_accepted(&self, cancellation: &CancellationToken) -> Result<(), CallError> {
        loop {
            let phase_changed = self.phase_changed.notified();
            tokio::pin!(phase_changed);
            phase_changed.as_mut().enable();

            let phase = *self.phase.lock().unwrap();
            match phase {
                DispatcherPhase::Accepted => return Ok(()),
                DispatcherPhase::Closed => return Err(ConnectionClosedError.into()),
                DispatcherPhase::AwaitingAcceptance { .. } | DispatcherPhase::Accepting => {
                    tokio::select! {
                        biased;
                        () = cancellation.cancelled() => {
                            return Err(ReverseCallCancelledError.into());
                        }
                        () = &mut phase_changed => {}
                    }
                }
                other => {
                    return Err(ConnectionStateError {
                        expected: "accepted",
                        actual: other.name(),
                    }
                    .into());
                }
            }
        }
    }

    async fn serve(
        &self,
        mut inbound: MessageStream<ClientToRuntimeMessage<P>>,
        ping_interval: Duration,
        cancellation: &CancellationToken,
    ) -> Result<(), AcceptError> {
        let ping_timeout = self.config.ping_timeout(ping_interval);

        let mut ping_ticker = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
        ping_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_activity = Instant::now();

        loop {
            tokio::select! {
                biased;
                () = cancellation.cancelled() => return Ok(()),
                () = tokio::time::sleep_until(last_activity + ping_timeout) => {
                    return Err(PingTimedOutError { timeout: ping_timeout }.into());
                }
                _ = ping_ticker.tick() => {
                    self.writer.write(RuntimeToClientMessage::Ping).await?;
                }
                message = inbound.next() => match message {
                    None => return Err(ConnectionClosedError.into()),
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(message)) => {
                        last_activity = Instant::now();
                        self.on_message(message);
                    }
                },
            }
        }
    }

    fn on_message(&self, message: ClientToRuntimeMessage<P>) {
        match message {
            ClientToRuntimeMessage::Pong => tracing::trace!("Pong received"),
            ClientToRuntimeMessage::Response(response) => {
                let call_id = response.call_id;
                if !self.pending_calls.complete(call_id, response.payload) {
                    tracing::warn!(%call_id, "Dropping response to an unknown call");
                }
            }
            ClientToRuntimeMessage::Connect(_) => {
                tracing::warn!("Ignoring repeated connect message on an accepted connection");
            }
        }
    }

    async fn shutdown(&self) {
        self.set_phase(DispatcherPhase::Closed);

        let num_failed = self.pending_calls.close();
        if num_failed != 0 {
            tracing::debug!(num_failed, "Failing pending calls of a closed connection");
        }

        self.writer.close().await;
    }

    fn take_inbound(
        &self,
    ) -> Result<MessageStream<ClientToRuntimeMessage<P>>, ConnectionStateError> {
        self.inbound
            .lock()
            .unwrap()
            .take()
            .ok_or(ConnectionStateError {
                expected: "readable",
                actual: "already being read",
            })
    }

    fn set_phase(&self, phase: DispatcherPhase) {
        *self.phase.lock().unwrap() = phase;
        self.phase_changed.notify_waiters();
    }

    /// Moves to `next` if the current phase satisfies `allowed`
    fn advance_phase(
        &self,
        allowed: impl FnOnce(&DispatcherPhase) -> bool,
        expected: &'static str,
        next: DispatcherPhase,
    ) -> Result<(), ConnectionStateError> {
        {
            let mut phase = self.phase.lock().unwrap();
            if !allowed(&phase) {
                return Err(ConnectionStateError {
                    expected,
                    actual: phase.name(),
                });
            }
            *phase = next;
        }
        self.phase_changed.notify_waiters();
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum ReceiveArgumentsError {
    #[error(transparent)]
    NoRegistrationReceived(#[from] NoRegistrationReceivedError),

    #[error(transparent)]
    MalformedHandshake(#[from] MalformedHandshakeError),

    #[error(transparent)]
    Cancelled(#[from] ReverseCallCancelledError),

    #[error(transparent)]
    InvalidState(#[from] ConnectionStateError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<TransportError> for ReceiveArgumentsError {
    fn from(value: TransportError) -> Self {
        match value {
            // The client went away before saying anything
            TransportError::Closed => Self::NoRegistrationReceived(NoRegistrationReceivedError),
            TransportError::Internal(e) => Self::Internal(e),
        }
    }
}

#[derive(Error, Debug)]
pub enum RejectError {
    #[error(transparent)]
    ConnectionClosed(#[from] ConnectionClosedError),

    #[error(transparent)]
    InvalidState(#[from] ConnectionStateError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<TransportError> for RejectError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Closed => Self::ConnectionClosed(ConnectionClosedError),
            TransportError::Internal(e) => Self::Internal(e),
        }
    }
}

#[derive(Error, Debug)]
pub enum AcceptError {
    #[error(transparent)]
    PingTimedOut(#[from] PingTimedOutError),

    #[error(transparent)]
    ConnectionClosed(#[from] ConnectionClosedError),

    #[error(transparent)]
    InvalidState(#[from] ConnectionStateError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<TransportError> for AcceptError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Closed => Self::ConnectionClosed(ConnectionClosedError),
            TransportError::Internal(e) => Self::Internal(e),
        }
    }
}

#[derive(Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    NotAccepted(#[from] ConnectionStateError),

    #[error(transparent)]
    ConnectionClosed(#[from] ConnectionClosedError),

    #[error(transparent)]
    Cancelled(#[from] ReverseCallCancelledError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<TransportError> for CallError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Closed => Self::ConnectionClosed(ConnectionClosedError),
            TransportError::Internal(e) => Self::Internal(e),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
