// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::CallId;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Calls written to the connection that still wait for their response
pub(crate) struct PendingCalls<R> {
    state: Mutex<PendingCallsState<R>>,
}

struct PendingCallsState<R> {
    waiters: HashMap<CallId, oneshot::Sender<R>>,
    closed: bool,
}

impl<R> PendingCalls<R> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PendingCallsState {
                waiters: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Returns `None` when the connection has already ended
    pub fn register(&self, call_id: CallId) -> Option<oneshot::Receiver<R>> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        state.waiters.insert(call_id, tx);
        Some(rx)
    }

    /// Returns `false` if nobody waits for this call
    pub fn complete(&self, call_id: CallId, response: R) -> bool {
        let waiter = self.state.lock().unwrap().waiters.remove(&call_id);
        match waiter {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    pub fn forget(&self, call_id: CallId) {
        self.state.lock().unwrap().waiters.remove(&call_id);
    }

    /// Drops every waiter so that their receivers observe the closed connection
    pub fn close(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        let num_pending = state.waiters.len();
        state.waiters.clear();
        num_pending
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().waiters.len()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
