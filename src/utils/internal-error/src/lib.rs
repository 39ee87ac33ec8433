// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// An error that is not expected to be handled by the caller.
///
/// Stream processing code returns it from every fallible collaborator call
/// that has no meaningful recovery path other than stopping the current
/// operation and reporting the failure upstream.
#[derive(Error, Debug)]
#[error("Internal error")]
pub struct InternalError {
    #[source]
    source: BoxedError,
}

impl InternalError {
    pub fn new<E: Into<BoxedError>>(e: E) -> Self {
        Self { source: e.into() }
    }

    pub fn bail<T>(reason: impl Into<String>) -> Result<T, Self> {
        Err(Self::new(InternalErrorBail {
            reason: reason.into(),
        }))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
#[error("{reason}")]
struct InternalErrorBail {
    reason: String,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub trait ErrorIntoInternal {
    fn int_err(self) -> InternalError;
}

impl<E> ErrorIntoInternal for E
where
    E: Into<BoxedError>,
{
    fn int_err(self) -> InternalError {
        InternalError::new(self)
    }
}

pub trait ResultIntoInternal<OK> {
    fn int_err(self) -> Result<OK, InternalError>;
}

impl<OK, E> ResultIntoInternal<OK> for Result<OK, E>
where
    E: Into<BoxedError>,
{
    fn int_err(self) -> Result<OK, InternalError> {
        self.map_err(ErrorIntoInternal::int_err)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
