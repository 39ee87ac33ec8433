// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod filter_event_processor;
mod filter_validator_impl;
mod filters_service_impl;
mod remote_filter_processor;
mod type_filter_processor;

pub use filter_event_processor::*;
pub use filter_validator_impl::*;
pub use filters_service_impl::*;
pub use remote_filter_processor::*;
pub use type_filter_processor::*;
