// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod event_handlers_service;
mod event_processor;
mod filter_processor;
mod filter_validator;
mod filters_service;
mod registration_errors;
mod stream_processor;
mod stream_processor_registry;
mod stream_processor_service;

pub use event_handlers_service::*;
pub use event_processor::*;
pub use filter_processor::*;
pub use filter_validator::*;
pub use filters_service::*;
pub use registration_errors::*;
pub use stream_processor::*;
pub use stream_processor_registry::*;
pub use stream_processor_service::*;
