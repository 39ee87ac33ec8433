// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::future::Future;

use crate::ExecutionContext;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

tokio::task_local! {
    static CURRENT_EXECUTION_CONTEXT: ExecutionContext;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

impl ExecutionContext {
    /// Returns the context of the enclosing [`ExecutionContext::scope`], if any
    pub fn current() -> Option<ExecutionContext> {
        CURRENT_EXECUTION_CONTEXT.try_with(Clone::clone).ok()
    }

    pub fn current_or_system() -> ExecutionContext {
        Self::current().unwrap_or_else(Self::system)
    }

    /// Runs the future with this context installed as the ambient one.
    /// Nested scopes shadow the outer context until they complete.
    pub async fn scope<F: Future>(self, f: F) -> F::Output {
        CURRENT_EXECUTION_CONTEXT.scope(self, f).await
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
