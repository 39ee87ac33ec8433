// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod committed_event;
mod ids;
mod processing_result;
mod retry_policy;
mod stream_definition;
mod stream_processor_config;
mod stream_processor_state;

pub use committed_event::*;
pub use ids::*;
pub use processing_result::*;
pub use retry_policy::*;
pub use stream_definition::*;
pub use stream_processor_config::*;
pub use stream_processor_state::*;
