// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

use crate::{Claim, CorrelationId, TenantId};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Who an operation is performed for, and which causal chain it belongs to.
///
/// Every committed event records the context it was produced in, and every
/// reverse call carries the context the remote callback must run under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub tenant: TenantId,
    pub correlation_id: CorrelationId,
    pub claims: Vec<Claim>,
}

impl ExecutionContext {
    pub fn new(tenant: TenantId, correlation_id: CorrelationId, claims: Vec<Claim>) -> Self {
        Self {
            tenant,
            correlation_id,
            claims,
        }
    }

    /// Context of the runtime itself, with a fresh correlation
    pub fn system() -> Self {
        Self::new(TenantId::system(), CorrelationId::new_random(), Vec::new())
    }

    pub fn for_tenant(&self, tenant: TenantId) -> Self {
        Self {
            tenant,
            ..self.clone()
        }
    }

    pub fn with_correlation(&self, correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            ..self.clone()
        }
    }

    pub fn with_claims(&self, claims: Vec<Claim>) -> Self {
        Self {
            claims,
            ..self.clone()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
