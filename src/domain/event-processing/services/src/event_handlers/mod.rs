// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod event_handlers_service_impl;
mod remote_event_handler_processor;

pub use event_handlers_service_impl::*;
pub use remote_event_handler_processor::*;
