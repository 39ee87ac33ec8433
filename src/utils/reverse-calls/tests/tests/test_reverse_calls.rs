// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use execution_context::ExecutionContext;
use reverse_calls::*;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
struct DoublingProtocol;

impl ReverseCallProtocol for DoublingProtocol {
    type ConnectArguments = String;
    type ConnectResponse = Result<(), String>;
    type Request = u32;
    type Response = u32;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_call_roundtrip_survives_keep_alive() {
    let harness = ReverseCallHarness::new();
    let runtime_ct = CancellationToken::new();
    let client_ct = CancellationToken::new();

    let client_task = {
        let client = harness.client.clone();
        let client_ct = client_ct.clone();
        tokio::spawn(async move {
            let response = client
                .connect("doubling".to_string(), ExecutionContext::system(), &client_ct)
                .await
                .unwrap();
            assert_eq!(response, Ok(()));

            client
                .handle(
                    |n: u32, _ct| async move {
                        assert!(ExecutionContext::current().is_some());
                        n * 2
                    },
                    &client_ct,
                )
                .await
        })
    };

    let arguments = harness
        .dispatcher
        .receive_arguments(&runtime_ct)
        .await
        .unwrap();
    assert_eq!(arguments.arguments, "doubling");
    assert_eq!(arguments.ping_interval, Duration::from_millis(50));

    let accept_task = {
        let dispatcher = harness.dispatcher.clone();
        let runtime_ct = runtime_ct.clone();
        tokio::spawn(async move { dispatcher.accept(Ok(()), &runtime_ct).await })
    };

    // Several ping intervals pass without any calls
    tokio::time::sleep(Duration::from_millis(300)).await;

    let response = harness
        .dispatcher
        .call(21, ExecutionContext::system(), &runtime_ct)
        .await
        .unwrap();
    assert_eq!(response, 42);

    let response = harness
        .dispatcher
        .call(5, ExecutionContext::system(), &runtime_ct)
        .await
        .unwrap();
    assert_eq!(response, 10);

    runtime_ct.cancel();
    assert!(accept_task.await.unwrap().is_ok());

    // Runtime closing its side ends the client loop gracefully
    assert!(client_task.await.unwrap().is_ok());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_call_before_accept_waits_for_acceptance() {
    let harness = ReverseCallHarness::new();
    let runtime_ct = CancellationToken::new();
    let client_ct = CancellationToken::new();

    let client_task = {
        let client = harness.client.clone();
        let client_ct = client_ct.clone();
        tokio::spawn(async move {
            client
                .connect("doubling".to_string(), ExecutionContext::system(), &client_ct)
                .await
                .unwrap()
                .unwrap();

            client
                .handle(|n: u32, _ct| async move { n * 2 }, &client_ct)
                .await
        })
    };

    harness
        .dispatcher
        .receive_arguments(&runtime_ct)
        .await
        .unwrap();

    let call_task = {
        let dispatcher = harness.dispatcher.clone();
        let runtime_ct = runtime_ct.clone();
        tokio::spawn(async move {
            dispatcher
                .call(4, ExecutionContext::system(), &runtime_ct)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!call_task.is_finished());

    let accept_task = {
        let dispatcher = harness.dispatcher.clone();
        let runtime_ct = runtime_ct.clone();
        tokio::spawn(async move { dispatcher.accept(Ok(()), &runtime_ct).await })
    };

    assert_eq!(call_task.await.unwrap().unwrap(), 8);

    runtime_ct.cancel();
    assert!(accept_task.await.unwrap().is_ok());
    assert!(client_task.await.unwrap().is_ok());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_second_handle_fails_with_already_handling() {
    let harness = ReverseCallHarness::new();
    let runtime_ct = CancellationToken::new();
    let client_ct = CancellationToken::new();

    let connect_task = {
        let client = harness.client.clone();
        let client_ct = client_ct.clone();
        tokio::spawn(async move {
            client
                .connect("doubling".to_string(), ExecutionContext::system(), &client_ct)
                .await
        })
    };

    harness
        .dispatcher
        .receive_arguments(&runtime_ct)
        .await
        .unwrap();

    let accept_task = {
        let dispatcher = harness.dispatcher.clone();
        let runtime_ct = runtime_ct.clone();
        tokio::spawn(async move { dispatcher.accept(Ok(()), &runtime_ct).await })
    };
    connect_task.await.unwrap().unwrap().unwrap();

    let first_handle = {
        let client = harness.client.clone();
        let client_ct = client_ct.clone();
        tokio::spawn(async move { client.handle(|n: u32, _ct| async move { n }, &client_ct).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let second = harness
        .client
        .handle(|n: u32, _ct| async move { n }, &client_ct)
        .await;
    assert!(
        matches!(second, Err(HandleError::AlreadyHandling(_))),
        "{second:?}"
    );

    // The first loop is unaffected
    let response = harness
        .dispatcher
        .call(7, ExecutionContext::system(), &runtime_ct)
        .await
        .unwrap();
    assert_eq!(response, 7);

    client_ct.cancel();
    assert!(first_handle.await.unwrap().is_ok());

    // Client going away ends the acceptance, unless the runtime stops first
    runtime_ct.cancel();
    let accepted = accept_task.await.unwrap();
    assert!(
        matches!(accepted, Ok(()) | Err(AcceptError::ConnectionClosed(_))),
        "{accepted:?}"
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_handle_rejected_before_connect_is_still_single_use() {
    let harness = ReverseCallHarness::new();
    let ct = CancellationToken::new();

    let first = harness
        .client
        .handle(|n: u32, _ct| async move { n }, &ct)
        .await;
    assert!(matches!(first, Err(HandleError::NotConnected(_))), "{first:?}");

    let second = harness
        .client
        .handle(|n: u32, _ct| async move { n }, &ct)
        .await;
    assert!(
        matches!(second, Err(HandleError::AlreadyHandling(_))),
        "{second:?}"
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_client_times_out_without_pings() {
    let (mut runtime, client_channel) = in_memory_channel_pair::<DoublingProtocol>(16);
    let client = ReverseCallClient::new(
        client_channel,
        Arc::new(ReverseCallDispatcherConfig::test_default()),
    );
    let ct = CancellationToken::new();

    let silent_runtime = async {
        let first = runtime.inbound.next().await;
        assert!(matches!(first, Some(Ok(ClientToRuntimeMessage::Connect(_)))));
        runtime
            .outbound
            .send(RuntimeToClientMessage::ConnectResponse(Ok(())))
            .await
            .unwrap();
    };
    let ((), response) = tokio::join!(
        silent_runtime,
        client.connect_with_ping_interval(
            "doubling".to_string(),
            Duration::from_millis(20),
            ExecutionContext::system(),
            &ct,
        )
    );
    response.unwrap().unwrap();

    let num_calls = AtomicUsize::new(0);
    let res = client
        .handle(
            |n: u32, _ct| {
                num_calls.fetch_add(1, Ordering::SeqCst);
                async move { n }
            },
            &ct,
        )
        .await;

    match res {
        Err(HandleError::PingTimedOut(e)) => assert_eq!(e.timeout, Duration::from_millis(60)),
        other => panic!("Expected ping timeout, got {other:?}"),
    }
    assert_eq!(num_calls.load(Ordering::SeqCst), 0);

    // The runtime side stays open for the whole test
    drop(runtime);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_dispatcher_times_out_without_pongs() {
    let (runtime_channel, mut client) = in_memory_channel_pair::<DoublingProtocol>(16);
    let dispatcher = ReverseCallDispatcher::new(
        runtime_channel,
        Arc::new(ReverseCallDispatcherConfig::test_default()),
    );
    let ct = CancellationToken::new();

    client
        .outbound
        .send(ClientToRuntimeMessage::Connect(ReverseCallArguments {
            ping_interval: Duration::from_millis(20),
            execution_context: ExecutionContext::system(),
            arguments: "doubling".to_string(),
        }))
        .await
        .unwrap();

    dispatcher.receive_arguments(&ct).await.unwrap();

    let res = dispatcher.accept(Ok(()), &ct).await;
    assert!(matches!(res, Err(AcceptError::PingTimedOut(_))), "{res:?}");

    // The client saw the response and then only pings
    assert!(matches!(
        client.inbound.next().await,
        Some(Ok(RuntimeToClientMessage::ConnectResponse(Ok(()))))
    ));
    assert!(matches!(
        client.inbound.next().await,
        Some(Ok(RuntimeToClientMessage::Ping))
    ));
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_no_registration_received() {
    let (runtime_channel, client_channel) = in_memory_channel_pair::<DoublingProtocol>(16);
    let dispatcher = ReverseCallDispatcher::new(
        runtime_channel,
        Arc::new(ReverseCallDispatcherConfig::test_default()),
    );

    drop(client_channel);

    let res = dispatcher.receive_arguments(&CancellationToken::new()).await;
    assert!(
        matches!(res, Err(ReceiveArgumentsError::NoRegistrationReceived(_))),
        "{res:?}"
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_zero_ping_interval_is_malformed_handshake() {
    let (runtime_channel, mut client) = in_memory_channel_pair::<DoublingProtocol>(16);
    let dispatcher = ReverseCallDispatcher::new(
        runtime_channel,
        Arc::new(ReverseCallDispatcherConfig::test_default()),
    );

    client
        .outbound
        .send(ClientToRuntimeMessage::Connect(ReverseCallArguments {
            ping_interval: Duration::ZERO,
            execution_context: ExecutionContext::system(),
            arguments: "doubling".to_string(),
        }))
        .await
        .unwrap();

    let res = dispatcher.receive_arguments(&CancellationToken::new()).await;
    assert!(
        matches!(res, Err(ReceiveArgumentsError::MalformedHandshake(_))),
        "{res:?}"
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_pending_call_fails_when_connection_closes() {
    let (runtime_channel, mut client) = in_memory_channel_pair::<DoublingProtocol>(16);
    let dispatcher = Arc::new(ReverseCallDispatcher::new(
        runtime_channel,
        Arc::new(ReverseCallDispatcherConfig::test_default()),
    ));
    let ct = CancellationToken::new();

    client
        .outbound
        .send(ClientToRuntimeMessage::Connect(ReverseCallArguments {
            ping_interval: Duration::from_secs(1),
            execution_context: ExecutionContext::system(),
            arguments: "doubling".to_string(),
        }))
        .await
        .unwrap();
    dispatcher.receive_arguments(&ct).await.unwrap();

    let accept_task = {
        let dispatcher = dispatcher.clone();
        let ct = ct.clone();
        tokio::spawn(async move { dispatcher.accept(Ok(()), &ct).await })
    };
    let call_task = {
        let dispatcher = dispatcher.clone();
        let ct = ct.clone();
        tokio::spawn(async move {
            // Give the acceptance a head start
            tokio::time::sleep(Duration::from_millis(20)).await;
            dispatcher.call(1, ExecutionContext::system(), &ct).await
        })
    };

    assert!(matches!(
        client.inbound.next().await,
        Some(Ok(RuntimeToClientMessage::ConnectResponse(_)))
    ));
    assert!(matches!(
        client.inbound.next().await,
        Some(Ok(RuntimeToClientMessage::Request(_)))
    ));
    assert_eq!(dispatcher.num_pending_calls(), 1);

    drop(client);

    let accepted = accept_task.await.unwrap();
    assert!(
        matches!(accepted, Err(AcceptError::ConnectionClosed(_))),
        "{accepted:?}"
    );

    let called = call_task.await.unwrap();
    assert!(
        matches!(called, Err(CallError::ConnectionClosed(_))),
        "{called:?}"
    );

    let after_close = dispatcher.call(2, ExecutionContext::system(), &ct).await;
    assert!(matches!(after_close, Err(CallError::ConnectionClosed(_))));
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_cancelled_call_is_forgotten() {
    let (runtime_channel, mut client) = in_memory_channel_pair::<DoublingProtocol>(16);
    let dispatcher = Arc::new(ReverseCallDispatcher::new(
        runtime_channel,
        Arc::new(ReverseCallDispatcherConfig::test_default()),
    ));
    let connection_ct = CancellationToken::new();

    client
        .outbound
        .send(ClientToRuntimeMessage::Connect(ReverseCallArguments {
            ping_interval: Duration::from_secs(1),
            execution_context: ExecutionContext::system(),
            arguments: "doubling".to_string(),
        }))
        .await
        .unwrap();
    dispatcher.receive_arguments(&connection_ct).await.unwrap();

    let accept_task = {
        let dispatcher = dispatcher.clone();
        let ct = connection_ct.clone();
        tokio::spawn(async move { dispatcher.accept(Ok(()), &ct).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let call_ct = connection_ct.child_token();
    let (res, ()) = tokio::join!(
        dispatcher.call(3, ExecutionContext::system(), &call_ct),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            call_ct.cancel();
        }
    );
    assert!(matches!(res, Err(CallError::Cancelled(_))), "{res:?}");
    assert_eq!(dispatcher.num_pending_calls(), 0);

    // A late response to the forgotten call is dropped
    let Some(Ok(RuntimeToClientMessage::ConnectResponse(_))) = client.inbound.next().await else {
        panic!("Expected connect response");
    };
    let Some(Ok(RuntimeToClientMessage::Request(request))) = client.inbound.next().await else {
        panic!("Expected request");
    };
    client
        .outbound
        .send(ClientToRuntimeMessage::Response(ReverseCallResponse {
            call_id: request.call_id,
            payload: 6,
        }))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(dispatcher.is_accepted());

    connection_ct.cancel();
    assert!(accept_task.await.unwrap().is_ok());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_rejected_connection() {
    let harness = ReverseCallHarness::new();
    let ct = CancellationToken::new();

    let client = harness.client.clone();
    let client_ct = ct.clone();
    let connect_task = tokio::spawn(async move {
        client
            .connect("doubling".to_string(), ExecutionContext::system(), &client_ct)
            .await
    });

    harness.dispatcher.receive_arguments(&ct).await.unwrap();
    harness
        .dispatcher
        .reject(Err("filter is not compatible".to_string()))
        .await
        .unwrap();

    let response = connect_task.await.unwrap().unwrap();
    assert_eq!(response, Err("filter is not compatible".to_string()));

    let res = harness
        .dispatcher
        .call(1, ExecutionContext::system(), &ct)
        .await;
    assert!(matches!(res, Err(CallError::ConnectionClosed(_))), "{res:?}");

    let res = harness.dispatcher.accept(Ok(()), &ct).await;
    assert!(matches!(res, Err(AcceptError::InvalidState(_))), "{res:?}");
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Harness
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

struct ReverseCallHarness {
    dispatcher: Arc<ReverseCallDispatcher<DoublingProtocol>>,
    client: Arc<ReverseCallClient<DoublingProtocol>>,
}

impl ReverseCallHarness {
    fn new() -> Self {
        let config = Arc::new(ReverseCallDispatcherConfig::test_default());
        let (runtime_channel, client_channel) = in_memory_channel_pair(16);

        Self {
            dispatcher: Arc::new(ReverseCallDispatcher::new(runtime_channel, config.clone())),
            client: Arc::new(ReverseCallClient::new(client_channel, config)),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
