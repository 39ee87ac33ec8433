// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use serde::Deserialize;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReverseCallDispatcherConfig {
    /// Keep-alive interval a client uses when it does not pick its own
    pub default_ping_interval: Duration,
    /// Upper bound for the keep-alive interval a client may request
    pub max_ping_interval: Duration,
    /// Number of missed keep-alive intervals after which a connection is
    /// considered dead
    pub ping_timeout_multiplier: u32,
}

impl ReverseCallDispatcherConfig {
    pub fn new(
        default_ping_interval: Duration,
        max_ping_interval: Duration,
        ping_timeout_multiplier: u32,
    ) -> Self {
        Self {
            default_ping_interval,
            max_ping_interval,
            ping_timeout_multiplier,
        }
    }

    pub fn test_default() -> Self {
        Self::new(Duration::from_millis(50), Duration::from_secs(1), 3)
    }

    pub fn ping_timeout(&self, ping_interval: Duration) -> Duration {
        ping_interval.saturating_mul(self.ping_timeout_multiplier.max(1))
    }
}

impl Default for ReverseCallDispatcherConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(60), 3)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
