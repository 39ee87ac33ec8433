// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use evrt_event_processing::*;
use execution_context::ExecutionContext;
use pretty_assertions::{assert_eq, assert_matches};
use tokio_util::sync::CancellationToken;

use crate::tests::utils::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_type_filter_writes_matching_events() {
    let harness = EventProcessingHarness::new();
    let wanted = ArtifactId::new_random();
    let other = ArtifactId::new_random();
    let first_source = EventSourceId::new_random();
    let second_source = EventSourceId::new_random();
    let stream = StreamId::new_random();

    let registration = harness
        .register_type_filter(stream, &[wanted], true)
        .await
        .unwrap();
    assert_eq!(
        *registration.id(),
        StreamProcessorId::for_filter(harness.scope, stream)
    );

    let persisted = harness
        .storage(harness.tenant)
        .definitions
        .load(harness.scope, stream)
        .await
        .unwrap()
        .unwrap();
    assert!(persisted.partitioned());

    let cancellation = CancellationToken::new();
    let run = spawn_run(registration.processor(), &cancellation);

    harness.commit(
        harness.tenant,
        &[
            (first_source, wanted),
            (first_source, other),
            (second_source, wanted),
        ],
    );

    let events = harness.wait_for_stream_len(harness.tenant, stream, 2).await;
    harness
        .wait_for_state(registration.id(), harness.tenant, |s| {
            s.position == StreamPosition::new(3)
        })
        .await;

    cancellation.cancel();
    run.await.unwrap().unwrap();

    assert_eq!(
        events
            .iter()
            .map(|e| (
                e.position.value(),
                e.event.event_log_sequence_number.value(),
                e.partition.clone()
            ))
            .collect::<Vec<_>>(),
        vec![
            (0, 0, PartitionId::from(first_source)),
            (1, 2, PartitionId::from(second_source)),
        ]
    );
    assert_eq!(harness.stream_events(harness.tenant, stream).len(), 2);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_filter_cannot_target_reserved_streams() {
    let harness = EventProcessingHarness::new();

    for stream in [StreamId::event_log(), StreamId::public_event_log()] {
        assert_matches!(
            harness
                .register_type_filter(stream, &[ArtifactId::new_random()], false)
                .await,
            Err(RegisterFilterError::NonWriteableStream(_))
        );
    }

    assert!(harness.registry.registered_ids().is_empty());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_concurrent_registrations_of_one_stream() {
    let harness = EventProcessingHarness::new();
    let stream = StreamId::new_random();
    let event_type = ArtifactId::new_random();

    let types = [event_type];

    let (first, second) = tokio::join!(
        harness.register_type_filter(stream, &types, false),
        harness.register_type_filter(stream, &types, false),
    );

    let (registered, rejected): (Vec<_>, Vec<_>) =
        [first, second].into_iter().partition(Result::is_ok);
    assert_eq!(registered.len(), 1);
    assert_eq!(rejected.len(), 1);
    assert_matches!(
        rejected.into_iter().next(),
        Some(Err(RegisterFilterError::AlreadyRegistered(_)))
    );

    // Dropping the registration frees the stream again
    drop(registered);
    harness
        .register_type_filter(stream, &[event_type], false)
        .await
        .unwrap();
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_remote_filter_flow() {
    let harness = EventProcessingHarness::new();
    let wanted = ArtifactId::new_random();
    let other = ArtifactId::new_random();
    let stream = StreamId::new_random();

    let (dispatcher, client) = reverse_call_pair::<FilterProtocol>();
    let runtime_cancellation = CancellationToken::new();
    let client_cancellation = CancellationToken::new();

    let runtime_task = {
        let filters_service = harness.filters_service.clone();
        let cancellation = runtime_cancellation.clone();
        tokio::spawn(async move {
            filters_service
                .handle_remote_filter(dispatcher, &cancellation)
                .await
        })
    };

    let client_task = {
        let scope = harness.scope;
        let cancellation = client_cancellation.clone();
        tokio::spawn(async move {
            let response = client
                .connect(
                    FilterRegistrationArguments {
                        scope,
                        filter_id: stream,
                        partitioned: true,
                        public: false,
                    },
                    ExecutionContext::system(),
                    &cancellation,
                )
                .await
                .unwrap();
            assert!(response.is_accepted());

            client
                .handle(
                    move |request: FilterEventRequest, _ct| async move {
                        if request.event.event_type.id == wanted {
                            FilterEventResponse::included(PartitionId::new("remote"))
                        } else {
                            FilterEventResponse::excluded()
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
            (EventSourceId::new_random(), wanted),
            (EventSourceId::new_random(), other),
            (EventSourceId::new_random(), wanted),
        ],
    );

    let events = harness.wait_for_stream_len(harness.tenant, stream, 2).await;
    assert!(events.iter().all(|e| e.partition == PartitionId::new("remote")));
    assert_eq!(
        events
            .iter()
            .map(|e| e.event.event_log_sequence_number.value())
            .collect::<Vec<_>>(),
        vec![0, 2]
    );

    let persisted = harness
        .storage(harness.tenant)
        .definitions
        .load(harness.scope, stream)
        .await
        .unwrap();
    assert_eq!(
        persisted.map(|d| d.filter),
        Some(FilterDefinition::Remote { partitioned: true })
    );

    runtime_cancellation.cancel();
    assert_matches!(
        runtime_task.await.unwrap(),
        Ok(RemoteRegistrationOutcome::Completed)
    );

    client_cancellation.cancel();
    assert!(client_task.await.unwrap().is_ok());

    assert!(
        harness
            .registry
            .get(&StreamProcessorId::for_filter(harness.scope, stream))
            .is_none()
    );
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_remote_filter_rejections() {
    let harness = EventProcessingHarness::new();
    let taken_stream = StreamId::new_random();
    let _registration = harness
        .register_type_filter(taken_stream, &[ArtifactId::new_random()], false)
        .await
        .unwrap();

    for (stream, expected_code) in [
        (StreamId::event_log(), RegistrationFailureCode::NonWriteableStream),
        (taken_stream, RegistrationFailureCode::AlreadyRegistered),
    ] {
        let (dispatcher, client) = reverse_call_pair::<FilterProtocol>();
        let cancellation = CancellationToken::new();

        let runtime_task = {
            let filters_service = harness.filters_service.clone();
            let cancellation = cancellation.clone();
            tokio::spawn(async move {
                filters_service
                    .handle_remote_filter(dispatcher, &cancellation)
                    .await
            })
        };

        let response = client
            .connect(
                FilterRegistrationArguments {
                    scope: harness.scope,
                    filter_id: stream,
                    partitioned: false,
                    public: false,
                },
                ExecutionContext::system(),
                &cancellation,
            )
            .await
            .unwrap();

        let failure = response.failure.unwrap();
        assert_eq!(failure.code, expected_code);

        assert_matches!(
            runtime_task.await.unwrap(),
            Ok(RemoteRegistrationOutcome::Rejected(f)) if f.code == expected_code
        );
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
