// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod event_store_inmem;
mod stream_definition_repository_inmem;
mod stream_processor_state_repository_inmem;

pub use event_store_inmem::*;
pub use stream_definition_repository_inmem::*;
pub use stream_processor_state_repository_inmem::*;
