// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::pin::Pin;

use internal_error::InternalError;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::{ClientToRuntimeMessage, ReverseCallProtocol, RuntimeToClientMessage};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Inbound half of a connection
pub type MessageStream<T> =
    Pin<Box<dyn tokio_stream::Stream<Item = Result<T, TransportError>> + Send + 'static>>;

/// Outbound half of a connection
#[async_trait::async_trait]
pub trait MessageSink<T>: Send {
    async fn send(&mut self, message: T) -> Result<(), TransportError>;
}

#[async_trait::async_trait]
impl<T: Send + 'static> MessageSink<T> for mpsc::Sender<T> {
    async fn send(&mut self, message: T) -> Result<(), TransportError> {
        mpsc::Sender::send(self, message)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection closed by the other side")]
    Closed,

    #[error(transparent)]
    Internal(#[from] InternalError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct ReverseCallChannel<In, Out> {
    pub inbound: MessageStream<In>,
    pub outbound: Box<dyn MessageSink<Out>>,
}

impl<In, Out> ReverseCallChannel<In, Out> {
    pub fn new(inbound: MessageStream<In>, outbound: Box<dyn MessageSink<Out>>) -> Self {
        Self { inbound, outbound }
    }
}

/// Channel as seen by the runtime
pub type RuntimeChannel<P> =
    ReverseCallChannel<ClientToRuntimeMessage<P>, RuntimeToClientMessage<P>>;

/// Channel as seen by the connecting client
pub type ClientChannel<P> =
    ReverseCallChannel<RuntimeToClientMessage<P>, ClientToRuntimeMessage<P>>;

/// Creates two connected in-process channel ends
pub fn in_memory_channel_pair<P: ReverseCallProtocol>(
    buffer: usize,
) -> (RuntimeChannel<P>, ClientChannel<P>) {
    let (to_runtime_tx, to_runtime_rx) = mpsc::channel(buffer);
    let (to_client_tx, to_client_rx) = mpsc::channel(buffer);

    let runtime = ReverseCallChannel::new(
        Box::pin(ReceiverStream::new(to_runtime_rx).map(Ok::<_, TransportError>)),
        Box::new(to_client_tx),
    );
    let client = ReverseCallChannel::new(
        Box::pin(ReceiverStream::new(to_client_rx).map(Ok::<_, TransportError>)),
        Box::new(to_runtime_tx),
    );

    (runtime, client)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Outbound half shared between the read loop and concurrent callers.
/// Each message is written as a whole before the next one is started.
pub(crate) struct SerializedWriter<T> {
    sink: Mutex<Option<Box<dyn MessageSink<T>>>>,
}

impl<T: Send + 'static> SerializedWriter<T> {
    pub fn new(sink: Box<dyn MessageSink<T>>) -> Self {
        Self {
            sink: Mutex::new(Some(sink)),
        }
    }

    pub async fn write(&self, message: T) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        match sink.as_mut() {
            Some(sink) => sink.send(message).await,
            None => Err(TransportError::Closed),
        }
    }

    /// Drops the outbound half, signalling the end of the stream to the other side
    pub async fn close(&self) {
        self.sink.lock().await.take();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
