// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use evrt_event_processing::*;
use execution_context::ExecutionContext;
use pretty_assertions::{assert_eq, assert_matches};
use tokio_util::sync::CancellationToken;

use crate::tests::utils::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_remote_event_handler_receives_its_events() {
    let harness = EventProcessingHarness::new();
    let handled_type = ArtifactId::new_random();
    let other_type = ArtifactId::new_random();
    let first_source = EventSourceId::new_random();
    let second_source = EventSourceId::new_random();
    let handler_id = EventProcessorId::new_random();

    let (dispatcher, client) = reverse_call_pair::<EventHandlerProtocol>();
    let runtime_cancellation = CancellationToken::new();
    let client_cancellation = CancellationToken::new();
    let received = Arc::new(Mutex::new(Vec::<HandleEventRequest>::new()));

    let runtime_task = {
        let event_handlers_service = harness.event_handlers_service.clone();
        let cancellation = runtime_cancellation.clone();
        tokio::spawn(async move {
            event_handlers_service
                .handle_remote_event_handler(dispatcher, &cancellation)
                .await
        })
    };

    let client_task = {
        let scope = harness.scope;
        let cancellation = client_cancellation.clone();
        let received = received.clone();
        let failed_once = Arc::new(AtomicBool::new(false));
        tokio::spawn(async move {
            let response = client
                .connect(
                    EventHandlerRegistrationArguments {
                        scope,
                        handler_id,
                        event_types: vec![handled_type],
                        partitioned: true,
                    },
                    ExecutionContext::system(),
                    &cancellation,
                )
                .await
                .unwrap();
            assert!(response.is_accepted());

            client
                .handle(
                    move |request: HandleEventRequest, _ct| {
                        let received = received.clone();
                        let failed_once = failed_once.clone();
                        async move {
                            received.lock().unwrap().push(request);
                            if failed_once.swap(true, Ordering::SeqCst) {
                                HandleEventResponse::succeeded()
                            } else {
                                HandleEventResponse::failed(ProcessorFailure::retriable("warming up"))
                            }
                        }
                    },
                    &cancellation,
                )
                .await
        })
    };

    harness.commit(
        harness.tenant,
        &[
            (first_source, handled_type),
            (first_source, other_type),
            (second_source, handled_type),
        ],
    );

    let handler_stream = StreamId::from(handler_id);
    let handler_processor_id = StreamProcessorId::new(harness.scope, handler_id, handler_stream);
    harness
        .wait_for_state(&handler_processor_id, harness.tenant, |s| {
            s.position == StreamPosition::new(2) && s.failing_partitions.is_empty()
        })
        .await;

    runtime_cancellation.cancel();
    assert_matches!(
        runtime_task.await.unwrap(),
        Ok(RemoteRegistrationOutcome::Completed)
    );
    client_cancellation.cancel();
    assert!(client_task.await.unwrap().is_ok());

    let received = received.lock().unwrap().clone();
    let first_source_attempts: Vec<_> = received
        .iter()
        .filter(|r| r.event.partition == PartitionId::from(first_source))
        .map(|r| r.retry.as_ref().map(|retry| retry.retry_count))
        .collect();
    assert_eq!(first_source_attempts.first(), Some(&None));
    assert!(first_source_attempts.contains(&Some(1)));
    assert!(received.iter().all(|r| r.event.event.event_type.id == handled_type));
    assert!(received.iter().all(|r| r.scope == harness.scope));

    let handled_positions: Vec<_> = harness
        .stream_events(harness.tenant, handler_stream)
        .into_iter()
        .map(|e| e.event.event_log_sequence_number.value())
        .collect();
    assert_eq!(handled_positions, vec![0, 2]);

    // Both registrations are released once the connection is done
    assert!(harness.registry.registered_ids().is_empty());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_stopping_event_handler_waits_for_event_in_flight() {
    let harness = EventProcessingHarness::new();
    let handled_type = ArtifactId::new_random();
    let handler_id = EventProcessorId::new_random();

    let (dispatcher, client) = reverse_call_pair::<EventHandlerProtocol>();
    let runtime_cancellation = CancellationToken::new();
    let client_cancellation = CancellationToken::new();
    let started = Arc::new(AtomicBool::new(false));
    let handled = Arc::new(AtomicUsize::new(0));

    let runtime_task = {
        let event_handlers_service = harness.event_handlers_service.clone();
        let cancellation = runtime_cancellation.clone();
        tokio::spawn(async move {
            event_handlers_service
                .handle_remote_event_handler(dispatcher, &cancellation)
                .await
        })
    };

    let client_task = {
        let scope = harness.scope;
        let cancellation = client_cancellation.clone();
        let started = started.clone();
        let handled = handled.clone();
        tokio::spawn(async move {
            let response = client
                .connect(
                    EventHandlerRegistrationArguments {
                        scope,
                        handler_id,
                        event_types: vec![handled_type],
                        partitioned: false,
                    },
                    ExecutionContext::system(),
                    &cancellation,
                )
                .await
                .unwrap();
            assert!(response.is_accepted());

            client
                .handle(
                    move |_request: HandleEventRequest, _ct| {
                        let started = started.clone();
                        let handled = handled.clone();
                        async move {
                            started.store(true, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(300)).await;
                            handled.fetch_add(1, Ordering::SeqCst);
                            HandleEventResponse::succeeded()
                        }
                    },
                    &cancellation,
                )
                .await
        })
    };

    harness.commit(harness.tenant, &[(EventSourceId::new_random(), handled_type)]);

    wait_until(|| started.load(Ordering::SeqCst).then_some(())).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    runtime_cancellation.cancel();

    assert_matches!(
        runtime_task.await.unwrap(),
        Ok(RemoteRegistrationOutcome::Completed)
    );
    assert_eq!(handled.load(Ordering::SeqCst), 1);

    // The outcome of the event was recorded, it is not dispatched again
    let handler_stream = StreamId::from(handler_id);
    let handler_processor_id = StreamProcessorId::new(harness.scope, handler_id, handler_stream);
    let state = harness
        .storage(harness.tenant)
        .states
        .load(&handler_processor_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.position, StreamPosition::new(1));
    assert!(state.failing_partitions.is_empty());

    client_cancellation.cancel();
    let _ = client_task.await.unwrap();
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_event_handler_without_event_types_is_rejected() {
    let harness = EventProcessingHarness::new();
    let (dispatcher, client) = reverse_call_pair::<EventHandlerProtocol>();
    let cancellation = CancellationToken::new();

    let runtime_task = {
        let event_handlers_service = harness.event_handlers_service.clone();
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            event_handlers_service
                .handle_remote_event_handler(dispatcher, &cancellation)
                .await
        })
    };

    let response = client
        .connect(
            EventHandlerRegistrationArguments {
                scope: harness.scope,
                handler_id: EventProcessorId::new_random(),
                event_types: Vec::new(),
                partitioned: false,
            },
            ExecutionContext::system(),
            &cancellation,
        )
        .await
        .unwrap();

    assert_eq!(
        response.failure.map(|f| f.code),
        Some(RegistrationFailureCode::InvalidArguments)
    );
    assert_matches!(
        runtime_task.await.unwrap(),
        Ok(RemoteRegistrationOutcome::Rejected(_))
    );
    assert!(harness.registry.registered_ids().is_empty());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
