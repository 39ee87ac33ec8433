// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use execution_context::ExecutionContext;
use internal_error::InternalError;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::transport::SerializedWriter;
use crate::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientPhase {
    Unconnected,
    Connecting,
    Connected { ping_interval: Duration },
    Closed,
}

impl ClientPhase {
    fn name(self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::Connecting => "connecting",
            Self::Connected { .. } => "connected",
            Self::Closed => "closed",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Connection-initiating side of a reverse call: registers with the runtime
/// and then serves the requests the runtime sends back
pub struct ReverseCallClient<P: ReverseCallProtocol> {
    config: Arc<ReverseCallDispatcherConfig>,
    inbound: Mutex<Option<MessageStream<RuntimeToClientMessage<P>>>>,
    writer: SerializedWriter<ClientToRuntimeMessage<P>>,
    phase: Mutex<ClientPhase>,
    handling: AtomicBool,
}

impl<P: ReverseCallProtocol> ReverseCallClient<P> {
    pub fn new(channel: ClientChannel<P>, config: Arc<ReverseCallDispatcherConfig>) -> Self {
        Self {
            config,
            inbound: Mutex::new(Some(channel.inbound)),
            writer: SerializedWriter::new(channel.outbound),
            phase: Mutex::new(ClientPhase::Unconnected),
            handling: AtomicBool::new(false),
        }
    }

    pub async fn connect(
        &self,
        arguments: P::ConnectArguments,
        execution_context: ExecutionContext,
        cancellation: &CancellationToken,
    ) -> Result<P::ConnectResponse, ConnectError> {
        self.connect_with_ping_interval(
            arguments,
            self.config.default_ping_interval,
            execution_context,
            cancellation,
        )
        .await
    }

    #[tracing::instrument(level = "debug", skip_all, fields(ping_interval = ?ping_interval))]
    pub async fn connect_with_ping_interval(
        &self,
        arguments: P::ConnectArguments,
        ping_interval: Duration,
        execution_context: ExecutionContext,
        cancellation: &CancellationToken,
    ) -> Result<P::ConnectResponse, ConnectError> {
        {
            let mut phase = self.phase.lock().unwrap();
            if *phase != ClientPhase::Unconnected {
                return Err(ConnectionStateError {
                    expected: "unconnected",
                    actual: phase.name(),
                }
                .into());
            }
            *phase = ClientPhase::Connecting;
        }

        let res = self
            .perform_handshake(arguments, ping_interval, execution_context, cancellation)
            .await;

        match &res {
            Ok(_) => self.set_phase(ClientPhase::Connected { ping_interval }),
            Err(e) => {
                tracing::debug!(error = ?e, error_msg = %e, "Reverse call handshake failed");
                self.set_phase(ClientPhase::Closed);
                self.writer.close().await;
            }
        }

        res
    }

    async fn perform_handshake(
        &self,
        arguments: P::ConnectArguments,
        ping_interval: Duration,
        execution_context: ExecutionContext,
        cancellation: &CancellationToken,
    ) -> Result<P::ConnectResponse, ConnectError> {
        self.writer
            .write(ClientToRuntimeMessage::Connect(ReverseCallArguments {
                ping_interval,
                execution_context,
                arguments,
            }))
            .await?;

        let Some(mut inbound) = self.inbound.lock().unwrap().take() else {
            return Err(ConnectionStateError {
                expected: "readable",
                actual: "already being read",
            }
            .into());
        };

        let first_message = tokio::select! {
            biased;
            () = cancellation.cancelled() => return Err(ReverseCallCancelledError.into()),
            message = inbound.next() => message,
        };

        *self.inbound.lock().unwrap() = Some(inbound);

        match first_message {
            None => Err(ConnectionClosedError.into()),
            Some(Err(e)) => Err(e.into()),
            Some(Ok(RuntimeToClientMessage::ConnectResponse(response))) => Ok(response),
            Some(Ok(other)) => Err(MalformedHandshakeError {
                reason: format!(
                    "Expected ConnectResponse as the first message, got {}",
                    other.kind()
                ),
            }
            .into()),
        }
    }

    /// Serves requests from the runtime until `cancellation` fires or the
    /// runtime ends the connection.
    ///
    /// Requests are processed one at a time, in arrival order, while pings
    /// keep being answered. Each callback runs within the execution context
    /// of its request. On cancellation the request in flight is abandoned and
    /// its response is never written.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn handle<F, Fut>(
        &self,
        callback: F,
        cancellation: &CancellationToken,
    ) -> Result<(), HandleError>
    where
        F: Fn(P::Request, CancellationToken) -> Fut,
        Fut: Future<Output = P::Response>,
    {
        if self.handling.swap(true, Ordering::SeqCst) {
            return Err(AlreadyHandlingError.into());
        }

        let phase = *self.phase.lock().unwrap();
        let ClientPhase::Connected { ping_interval } = phase else {
            return Err(ConnectionStateError {
                expected: "connected",
                actual: phase.name(),
            }
            .into());
        };

        let Some(inbound) = self.inbound.lock().unwrap().take() else {
            return Err(ConnectionStateError {
                expected: "readable",
                actual: "already being read",
            }
            .into());
        };

        let ping_timeout = self.config.ping_timeout(ping_interval);
        let (work_tx, work_rx) = mpsc::unbounded_channel();

        let res = tokio::select! {
            res = self.read_loop(inbound, work_tx, ping_timeout, cancellation) => res,
            res = self.work_loop(work_rx, &callback, cancellation) => res,
        };

        self.set_phase(ClientPhase::Closed);
        self.writer.close().await;

        match &res {
            Ok(()) => tracing::debug!("Stopped handling reverse calls"),
            Err(e) => tracing::warn!(error = ?e, error_msg = %e, "Handling reverse calls failed"),
        }

        res
    }

    async fn read_loop(
        &self,
        mut inbound: MessageStream<RuntimeToClientMessage<P>>,
        work_tx: mpsc::UnboundedSender<ReverseCallRequest<P::Request>>,
        ping_timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<(), HandleError> {
        let mut last_activity = Instant::now();

        loop {
            tokio::select! {
                biased;
                () = cancellation.cancelled() => return Ok(()),
                () = tokio::time::sleep_until(last_activity + ping_timeout) => {
                    return Err(PingTimedOutError { timeout: ping_timeout }.into());
                }
                message = inbound.next() => match message {
                    None => {
                        tracing::debug!("Runtime ended the connection");
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(message)) => {
                        last_activity = Instant::now();
                        match message {
                            RuntimeToClientMessage::Ping => {
                                self.writer.write(ClientToRuntimeMessage::Pong).await?;
                            }
                            RuntimeToClientMessage::Request(request) => {
                                tracing::debug!(call_id = %request.call_id, "Reverse call request received");
                                if work_tx.send(request).is_err() {
                                    return Ok(());
                                }
                            }
                            RuntimeToClientMessage::ConnectResponse(_) => {
                                tracing::warn!("Ignoring repeated connect response");
                            }
                        }
                    }
                },
            }
        }
    }

    async fn work_loop<F, Fut>(
        &self,
        mut work_rx: mpsc::UnboundedReceiver<ReverseCallRequest<P::Request>>,
        callback: &F,
        cancellation: &CancellationToken,
    ) -> Result<(), HandleError>
    where
        F: Fn(P::Request, CancellationToken) -> Fut,
        Fut: Future<Output = P::Response>,
    {
        while let Some(request) = work_rx.recv().await {
            let call_id = request.call_id;

            let payload = request
                .execution_context
                .scope(callback(request.payload, cancellation.child_token()))
                .await;

            if cancellation.is_cancelled() {
                break;
            }

            self.writer
                .write(ClientToRuntimeMessage::Response(ReverseCallResponse {
                    call_id,
                    payload,
                }))
                .await?;
        }

        // Only reachable once the read loop has dropped its sender
        std::future::pending().await
    }

    fn set_phase(&self, phase: ClientPhase) {
        *self.phase.lock().unwrap() = phase;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error(transparent)]
    ConnectionClosed(#[from] ConnectionClosedError),

    #[error(transparent)]
    MalformedHandshake(#[from] MalformedHandshakeError),

    #[error(transparent)]
    Cancelled(#[from] ReverseCallCancelledError),

    #[error(transparent)]
    InvalidState(#[from] ConnectionStateError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<TransportError> for ConnectError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Closed => Self::ConnectionClosed(ConnectionClosedError),
            TransportError::Internal(e) => Self::Internal(e),
        }
    }
}

#[derive(Error, Debug)]
pub enum HandleError {
    #[error(transparent)]
    AlreadyHandling(#[from] AlreadyHandlingError),

    #[error(transparent)]
    NotConnected(#[from] ConnectionStateError),

    #[error(transparent)]
    PingTimedOut(#[from] PingTimedOutError),

    #[error(transparent)]
    ConnectionClosed(#[from] ConnectionClosedError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<TransportError> for HandleError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Closed => Self::ConnectionClosed(ConnectionClosedError),
            TransportError::Internal(e) => Self::Internal(e),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
