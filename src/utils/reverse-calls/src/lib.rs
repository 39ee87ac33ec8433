// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod client;
mod config;
mod dispatcher;
mod errors;
mod pending_calls;
mod protocol;
mod transport;

pub use client::*;
pub use config::*;
pub use dispatcher::*;
pub use errors::*;
pub use protocol::*;
pub use transport::*;
