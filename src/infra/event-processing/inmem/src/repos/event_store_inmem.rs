// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use evrt_event_processing::*;
use execution_context::ExecutionContext;
use time_source::SystemTimeSource;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Event about to be committed to the event log
#[derive(Debug, Clone)]
pub struct UncommittedEvent {
    pub event_source: EventSourceId,
    pub event_type: Artifact,
    pub public: bool,
    pub content: serde_json::Value,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Event log and derived streams of one tenant, kept in memory
pub struct InMemoryEventStore {
    time_source: Arc<dyn SystemTimeSource>,
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    scopes: HashMap<ScopeId, ScopeState>,
}

#[derive(Default)]
struct ScopeState {
    event_log: Vec<CommittedEvent>,
    streams: HashMap<StreamId, Vec<StreamEvent>>,
}

impl ScopeState {
    fn stream_events(&self, stream: StreamId) -> Vec<StreamEvent> {
        if stream.is_event_log() {
            self.event_log
                .iter()
                .cloned()
                .map(StreamEvent::from_event_log)
                .collect()
        } else {
            self.streams.get(&stream).cloned().unwrap_or_default()
        }
    }

    fn find_from(
        &self,
        stream: StreamId,
        from: StreamPosition,
        predicate: impl Fn(&StreamEvent) -> bool,
    ) -> Option<StreamEvent> {
        let Ok(from) = usize::try_from(from.value()) else {
            return None;
        };

        if stream.is_event_log() {
            return self
                .event_log
                .iter()
                .skip(from)
                .map(|event| StreamEvent::from_event_log(event.clone()))
                .find(|event| predicate(event));
        }

        self.streams
            .get(&stream)?
            .iter()
            .skip(from)
            .find(|event| predicate(event))
            .cloned()
    }

    fn tail_position(&self, stream: StreamId) -> StreamPosition {
        let len = if stream.is_event_log() {
            self.event_log.len()
        } else {
            self.streams.get(&stream).map_or(0, Vec::len)
        };
        StreamPosition::new(len as u64)
    }
}

impl InMemoryEventStore {
    pub fn new(time_source: Arc<dyn SystemTimeSource>) -> Self {
        Self {
            time_source,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Appends events to the event log of the scope, all under the same
    /// execution context
    pub fn commit(
        &self,
        scope: ScopeId,
        execution_context: &ExecutionContext,
        events: impl IntoIterator<Item = UncommittedEvent>,
    ) -> Vec<CommittedEvent> {
        let occurred = self.time_source.now();
        let mut state = self.state.lock().unwrap();
        let event_log = &mut state.scopes.entry(scope).or_default().event_log;

        let committed: Vec<_> = events
            .into_iter()
            .map(|event| {
                let committed = CommittedEvent {
                    event_log_sequence_number: StreamPosition::new(event_log.len() as u64),
                    occurred,
                    event_source: event.event_source,
                    execution_context: execution_context.clone(),
                    event_type: event.event_type,
                    public: event.public,
                    content: event.content,
                };
                event_log.push(committed.clone());
                committed
            })
            .collect();

        tracing::debug!(%scope, num_events = committed.len(), "Committed events");
        committed
    }

    /// All events of a stream in order of their positions
    pub fn stream_events(&self, scope: ScopeId, stream: StreamId) -> Vec<StreamEvent> {
        let state = self.state.lock().unwrap();
        state
            .scopes
            .get(&scope)
            .map(|scope_state| scope_state.stream_events(stream))
            .unwrap_or_default()
    }

    fn with_scope<R>(&self, scope: ScopeId, f: impl FnOnce(&ScopeState) -> R) -> Option<R> {
        let state = self.state.lock().unwrap();
        state.scopes.get(&scope).map(f)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
impl EventFetcher for InMemoryEventStore {
    async fn fetch_next(
        &self,
        scope: ScopeId,
        stream: StreamId,
        from: StreamPosition,
    ) -> Result<Option<StreamEvent>, FetchEventError> {
        Ok(self
            .with_scope(scope, |s| s.find_from(stream, from, |_| true))
            .flatten())
    }

    async fn fetch_next_in_partition(
        &self,
        scope: ScopeId,
        stream: StreamId,
        partition: &PartitionId,
        from: StreamPosition,
    ) -> Result<Option<StreamEvent>, FetchEventError> {
        Ok(self
            .with_scope(scope, |s| {
                s.find_from(stream, from, |event| &event.partition == partition)
            })
            .flatten())
    }

    async fn find_next_position(
        &self,
        scope: ScopeId,
        stream: StreamId,
        partition: &PartitionId,
        from: StreamPosition,
    ) -> Result<Option<StreamPosition>, FetchEventError> {
        let next = self.fetch_next_in_partition(scope, stream, partition, from).await?;
        Ok(next.map(|event| event.position))
    }

    async fn tail_position(
        &self,
        scope: ScopeId,
        stream: StreamId,
    ) -> Result<StreamPosition, FetchEventError> {
        Ok(self
            .with_scope(scope, |s| s.tail_position(stream))
            .unwrap_or_default())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait::async_trait]
impl EventWriter for InMemoryEventStore {
    async fn append(
        &self,
        scope: ScopeId,
        stream: StreamId,
        event: &CommittedEvent,
        partition: &PartitionId,
    ) -> Result<StreamPosition, AppendEventError> {
        if stream.is_non_writeable() {
            return Err(NonWriteableStreamError { stream }.into());
        }

        let mut state = self.state.lock().unwrap();
        let events = state
            .scopes
            .entry(scope)
            .or_default()
            .streams
            .entry(stream)
            .or_default();

        let sequence_number = event.event_log_sequence_number;

        // Events are written in event log order, so the stream is sorted by
        // sequence number
        match events.binary_search_by_key(&sequence_number, |e| e.event.event_log_sequence_number) {
            Ok(index) => return Ok(events[index].position),
            Err(index) if index < events.len() => {
                return Err(PositionOccupiedError {
                    stream,
                    position: events[index].position,
                }
                .into());
            }
            Err(_) => {}
        }

        let position = StreamPosition::new(events.len() as u64);
        events.push(StreamEvent::new(event.clone(), position, partition.clone()));

        Ok(position)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
