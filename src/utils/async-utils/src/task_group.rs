// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

type TaskOutcome<E> = (String, Result<(), TaskFailureKind<E>>);

enum TaskFailureKind<E> {
    Failed(E),
    Panicked,
}

type FirstFailureListener<E> = Box<dyn FnOnce(&TaskGroupError<E>) + Send>;
type CompletionListener = Box<dyn FnOnce() + Send>;

/// A set of long-lived tasks that live and die together.
///
/// Each task receives its cancellation token from the caller, usually a child
/// of the token passed to [`TaskGroup::wait_for_all_cancelling_on_first`], so
/// that the first failure stops all the others at their next safe point.
pub struct TaskGroup<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    tasks: JoinSet<TaskOutcome<E>>,
    first_failure_listeners: Vec<FirstFailureListener<E>>,
    completion_listeners: Vec<CompletionListener>,
}

impl<E> TaskGroup<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            first_failure_listeners: Vec::new(),
            completion_listeners: Vec::new(),
        }
    }

    pub fn spawn<F>(&mut self, task_name: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        let task_name = task_name.into();
        tracing::debug!(%task_name, "Spawning grouped task");

        self.tasks.spawn(async move {
            let outcome = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(TaskFailureKind::Failed(e)),
                Err(_) => Err(TaskFailureKind::Panicked),
            };
            (task_name, outcome)
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Registers a callback invoked once, with the error of the first task
    /// that failed or panicked
    pub fn on_first_task_failure(
        &mut self,
        listener: impl FnOnce(&TaskGroupError<E>) + Send + 'static,
    ) {
        self.first_failure_listeners.push(Box::new(listener));
    }

    /// Registers a callback invoked once all tasks have finished, regardless
    /// of their outcome
    pub fn on_all_tasks_completed(&mut self, listener: impl FnOnce() + Send + 'static) {
        self.completion_listeners.push(Box::new(listener));
    }

    /// Awaits all tasks. The first task to fail or panic cancels
    /// `cancellation`, and its error is returned once every other task has
    /// observed the cancellation and finished.
    pub async fn wait_for_all_cancelling_on_first(
        mut self,
        cancellation: &CancellationToken,
    ) -> Result<(), TaskGroupError<E>> {
        let mut first_failure: Option<TaskGroupError<E>> = None;

        while let Some(joined) = self.tasks.join_next().await {
            let (task_name, outcome) = match joined {
                Ok(res) => res,
                // Panics are caught inside the task, so only aborts could reach here
                Err(join_error) => (
                    "<aborted>".to_string(),
                    if join_error.is_panic() {
                        Err(TaskFailureKind::Panicked)
                    } else {
                        Ok(())
                    },
                ),
            };

            let failure = match outcome {
                Ok(()) => {
                    tracing::debug!(%task_name, "Grouped task completed");
                    continue;
                }
                Err(TaskFailureKind::Failed(error)) => TaskGroupError::TaskFailed { task_name, error },
                Err(TaskFailureKind::Panicked) => TaskGroupError::TaskPanicked { task_name },
            };

            if first_failure.is_some() {
                tracing::debug!(
                    error = ?failure,
                    error_msg = %failure,
                    "Grouped task failed after the group was already cancelled"
                );
                continue;
            }

            tracing::warn!(
                error = ?failure,
                error_msg = %failure,
                remaining_tasks = self.tasks.len(),
                "Grouped task failed, cancelling the remaining tasks"
            );

            cancellation.cancel();
            for listener in self.first_failure_listeners.drain(..) {
                listener(&failure);
            }
            first_failure = Some(failure);
        }

        for listener in self.completion_listeners.drain(..) {
            listener();
        }

        match first_failure {
            None => Ok(()),
            Some(failure) => Err(failure),
        }
    }
}

impl<E> Default for TaskGroup<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum TaskGroupError<E>
where
    E: std::error::Error + 'static,
{
    #[error("Task '{task_name}' failed")]
    TaskFailed {
        task_name: String,
        #[source]
        error: E,
    },

    #[error("Task '{task_name}' panicked")]
    TaskPanicked { task_name: String },
}

impl<E> TaskGroupError<E>
where
    E: std::error::Error + 'static,
{
    pub fn task_name(&self) -> &str {
        match self {
            Self::TaskFailed { task_name, .. } | Self::TaskPanicked { task_name } => task_name,
        }
    }

    pub fn into_task_error(self) -> Option<E> {
        match self {
            Self::TaskFailed { error, .. } => Some(error),
            Self::TaskPanicked { .. } => None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
