//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use async_trait::async_trait;
use nosconf_gnmi::Client;
use serde_json::Value;
use tokio::time::Instant;

/// A named unit of reconciliation work.
///
/// The step name is the key under which its done marker is stored, so it must
/// be unique within a pass and stable across passes.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Declared configuration of the step.
    ///
    /// Any change in the returned value makes the step run again on the next
    /// pass.
    fn config(&self) -> Result<Value, serde_json::Error>;

    /// External references whose current version is folded into the change
    /// detection hash.
    fn deps(&self) -> Vec<String> {
        vec![]
    }

    /// Applies the step to the device.
    async fn exec(
        &self,
        deadline: Instant,
        client: &Client,
    ) -> Result<(), nosconf_gnmi::Error>;
}
