// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use internal_error::InternalError;
use reverse_calls::{AcceptError, ReceiveArgumentsError, RejectError};
use thiserror::Error;

use crate::{
    FilterValidationError,
    FilterValidationFailedError,
    NonWriteableStreamError,
    RegistrationFailure,
    RegistrationFailureCode,
    StreamProcessorAlreadyRegisteredError,
    StreamProcessorError,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum RegisterFilterError {
    #[error(transparent)]
    NonWriteableStream(#[from] NonWriteableStreamError),

    #[error(transparent)]
    AlreadyRegistered(#[from] StreamProcessorAlreadyRegisteredError),

    #[error(transparent)]
    ValidationFailed(#[from] FilterValidationFailedError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<FilterValidationError> for RegisterFilterError {
    fn from(value: FilterValidationError) -> Self {
        match value {
            FilterValidationError::Failed(e) => Self::ValidationFailed(e),
            FilterValidationError::Internal(e) => Self::Internal(e),
        }
    }
}

impl RegisterFilterError {
    /// Structured reason reported back to a client
    pub fn to_registration_failure(&self) -> RegistrationFailure {
        let code = match self {
            Self::NonWriteableStream(_) => RegistrationFailureCode::NonWriteableStream,
            Self::AlreadyRegistered(_) => RegistrationFailureCode::AlreadyRegistered,
            Self::ValidationFailed(_) => RegistrationFailureCode::FilterValidationFailed,
            Self::Internal(_) => RegistrationFailureCode::Internal,
        };
        RegistrationFailure::new(code, self.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRegistrationOutcome {
    /// The registration was refused and the client was told why
    Rejected(RegistrationFailure),
    /// The registration ran until the connection or the runtime shut down
    Completed,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum HandleRemoteRegistrationError {
    #[error(transparent)]
    ReceiveArguments(#[from] ReceiveArgumentsError),

    #[error(transparent)]
    Reject(#[from] RejectError),

    #[error("Registration task '{task_name}' failed")]
    TaskFailed {
        task_name: String,
        #[source]
        error: RegistrationTaskError,
    },

    #[error("Registration task '{task_name}' panicked")]
    TaskPanicked { task_name: String },

    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// Failure of one of the tasks serving an accepted registration
#[derive(Error, Debug)]
pub enum RegistrationTaskError {
    #[error(transparent)]
    Connection(#[from] AcceptError),

    #[error(transparent)]
    ValidationFailed(#[from] FilterValidationFailedError),

    #[error(transparent)]
    StreamProcessor(#[from] StreamProcessorError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<FilterValidationError> for RegistrationTaskError {
    fn from(value: FilterValidationError) -> Self {
        match value {
            FilterValidationError::Failed(e) => Self::ValidationFailed(e),
            FilterValidationError::Internal(e) => Self::Internal(e),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
