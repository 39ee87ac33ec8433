// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use reverse_calls::ReverseCallProtocol;
use serde::{Deserialize, Serialize};

use crate::{
    CommittedEvent,
    FilterDefinition,
    FilterResult,
    PartitionId,
    ProcessorFailure,
    RegistrationResponse,
    RetryContext,
    ScopeId,
    StreamDefinition,
    StreamId,
};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Filters hosted by a client
#[derive(Debug)]
pub struct FilterProtocol;

impl ReverseCallProtocol for FilterProtocol {
    type ConnectArguments = FilterRegistrationArguments;
    type ConnectResponse = RegistrationResponse;
    type Request = FilterEventRequest;
    type Response = FilterEventResponse;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRegistrationArguments {
    pub scope: ScopeId,
    /// The stream the filter writes to
    pub filter_id: StreamId,
    pub partitioned: bool,
    pub public: bool,
}

impl FilterRegistrationArguments {
    pub fn stream_definition(&self) -> StreamDefinition {
        let filter = if self.public {
            FilterDefinition::Public
        } else {
            FilterDefinition::Remote {
                partitioned: self.partitioned,
            }
        };
        StreamDefinition::new(self.filter_id, filter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEventRequest {
    pub scope: ScopeId,
    pub event: CommittedEvent,
    pub retry: Option<RetryContext>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEventResponse {
    pub is_included: bool,
    pub partition: PartitionId,
    pub failure: Option<ProcessorFailure>,
}

impl FilterEventResponse {
    pub fn included(partition: PartitionId) -> Self {
        Self {
            is_included: true,
            partition,
            failure: None,
        }
    }

    pub fn excluded() -> Self {
        Self {
            is_included: false,
            partition: PartitionId::none(),
            failure: None,
        }
    }

    pub fn failed(failure: ProcessorFailure) -> Self {
        Self {
            is_included: false,
            partition: PartitionId::none(),
            failure: Some(failure),
        }
    }

    /// Unpartitioned filters ignore the partition chosen by the client
    pub fn into_filter_result(self, partitioned: bool) -> FilterResult {
        if let Some(failure) = self.failure {
            return FilterResult::Failed(failure);
        }

        FilterResult::Succeeded {
            is_included: self.is_included,
            partition: if partitioned {
                self.partition
            } else {
                PartitionId::none()
            },
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
