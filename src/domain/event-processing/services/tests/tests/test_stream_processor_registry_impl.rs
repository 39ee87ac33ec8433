// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use evrt_event_processing::*;
use evrt_event_processing_services::*;
use pretty_assertions::{assert_eq, assert_matches};

use crate::tests::utils::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_registration_claims_the_id_until_dropped() {
    let harness = EventProcessingHarness::new();
    let registry: Arc<dyn StreamProcessorRegistry> = Arc::new(StreamProcessorRegistryImpl::new());
    let processor = Arc::new(RecordingEventProcessor::new());

    let first = harness.stream_processor(StreamDefinition::event_log(), processor.clone());
    let second = harness.stream_processor(StreamDefinition::event_log(), processor.clone());
    let id = *first.id();

    let registration = StreamProcessorRegistration::try_register(registry.clone(), first).unwrap();
    assert_eq!(registry.registered_ids(), vec![id]);
    assert!(registry.get(&id).is_some());

    assert_matches!(
        StreamProcessorRegistration::try_register(registry.clone(), second.clone()),
        Err(StreamProcessorAlreadyRegisteredError { id: taken }) if taken == id
    );

    drop(registration);
    assert!(registry.registered_ids().is_empty());
    assert!(!registry.unregister(&id));

    let _registration =
        StreamProcessorRegistration::try_register(registry.clone(), second).unwrap();
    assert!(registry.get(&id).is_some());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_registered_ids_are_sorted() {
    let harness = EventProcessingHarness::new();
    let registry: Arc<dyn StreamProcessorRegistry> = Arc::new(StreamProcessorRegistryImpl::new());

    let registrations: Vec<_> = (0..5)
        .map(|_| {
            let processor = harness.stream_processor(
                StreamDefinition::event_log(),
                Arc::new(RecordingEventProcessor::new()),
            );
            StreamProcessorRegistration::try_register(registry.clone(), processor).unwrap()
        })
        .collect();

    let mut expected: Vec<_> = registrations.iter().map(|r| *r.id()).collect();
    expected.sort();

    assert_eq!(registry.registered_ids(), expected);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
