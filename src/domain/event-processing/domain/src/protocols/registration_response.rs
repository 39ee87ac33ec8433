// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use serde::{Deserialize, Serialize};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationFailureCode {
    AlreadyRegistered,
    NonWriteableStream,
    FilterValidationFailed,
    InvalidArguments,
    Internal,
}

impl fmt::Display for RegistrationFailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AlreadyRegistered => "AlreadyRegistered",
            Self::NonWriteableStream => "NonWriteableStream",
            Self::FilterValidationFailed => "FilterValidationFailed",
            Self::InvalidArguments => "InvalidArguments",
            Self::Internal => "Internal",
        };
        f.write_str(s)
    }
}

/// Reason a registration was refused, sent back to the client instead of an
/// error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationFailure {
    pub code: RegistrationFailureCode,
    pub reason: String,
}

impl RegistrationFailure {
    pub fn new(code: RegistrationFailureCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RegistrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.reason)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub failure: Option<RegistrationFailure>,
}

impl RegistrationResponse {
    pub fn accepted() -> Self {
        Self { failure: None }
    }

    pub fn rejected(failure: RegistrationFailure) -> Self {
        Self {
            failure: Some(failure),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.failure.is_none()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
