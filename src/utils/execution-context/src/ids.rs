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
use uuid::Uuid;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Identifies the tenant whose event log and processing state an operation
/// belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    const SYSTEM: Uuid = Uuid::from_u128(0x0883_1584_e016_42f6_bc5e_c6f7_98b3_e1be);

    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Tenant used by the runtime itself for work not owned by any customer
    pub fn system() -> Self {
        Self(Self::SYSTEM)
    }

    pub fn is_system(&self) -> bool {
        self.0 == Self::SYSTEM
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TenantId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub name: String,
    pub value: String,
    pub value_type: String,
}

impl Claim {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        value_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            value_type: value_type.into(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
