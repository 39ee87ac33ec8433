// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod scoped_stream_processor;
mod stream_processor_impl;
mod stream_processor_registry_impl;
mod stream_processor_service_impl;

pub(crate) use scoped_stream_processor::*;
pub use stream_processor_impl::*;
pub use stream_processor_registry_impl::*;
pub use stream_processor_service_impl::*;
