// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent channel transport.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use kl_core::Request;
use serde_json::Value;

use super::RequestTransport;
use crate::batch::{BatchPlan, BatchResults};
use crate::connection::ConnectionManager;
use crate::error::{ClientResult, TransportKind};

/// Sends requests over the [`ConnectionManager`]'s channel.
pub struct ChannelTransport {
    manager: ConnectionManager,
    timeout: Duration,
}

impl ChannelTransport {
    pub fn new(manager: ConnectionManager, timeout: Duration) -> Self {
        ChannelTransport { manager, timeout }
    }
}

impl RequestTransport for ChannelTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Channel
    }

    fn request<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, ClientResult<Value>> {
        self.manager.request(request, self.timeout).boxed()
    }

    fn batch<'a>(&'a self, requests: &'a [Request]) -> BoxFuture<'a, ClientResult<BatchResults>> {
        async move {
            let plan = BatchPlan::new(requests);
            let items = self.manager.batch(&plan, self.timeout).await?;
            Ok(plan.fan_out(items))
        }
        .boxed()
    }
}
