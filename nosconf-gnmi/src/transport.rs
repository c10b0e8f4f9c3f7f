//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;

use async_trait::async_trait;
use tokio::time::Instant;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Response, Status};

use crate::proto;
use crate::proto::g_nmi_client::GNmiClient;

/// The gNMI RPCs used by the client.
///
/// Mirrors the generated tonic client so that tests can substitute an
/// in-memory device.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn capabilities(
        &self,
        request: Request<proto::CapabilityRequest>,
    ) -> Result<Response<proto::CapabilityResponse>, Status>;

    async fn get(
        &self,
        request: Request<proto::GetRequest>,
    ) -> Result<Response<proto::GetResponse>, Status>;

    async fn set(
        &self,
        request: Request<proto::SetRequest>,
    ) -> Result<Response<proto::SetResponse>, Status>;
}

/// gNMI transport over a tonic channel.
#[derive(Clone, Debug)]
pub struct GrpcTransport {
    client: GNmiClient<Channel>,
}

// ===== impl GrpcTransport =====

impl GrpcTransport {
    pub fn new(channel: Channel) -> GrpcTransport {
        GrpcTransport {
            client: GNmiClient::new(channel),
        }
    }

    pub async fn connect(
        endpoint: Endpoint,
    ) -> Result<GrpcTransport, tonic::transport::Error> {
        let channel = endpoint.connect().await?;
        Ok(GrpcTransport::new(channel))
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    async fn capabilities(
        &self,
        request: Request<proto::CapabilityRequest>,
    ) -> Result<Response<proto::CapabilityResponse>, Status> {
        self.client.clone().capabilities(request).await
    }

    async fn get(
        &self,
        request: Request<proto::GetRequest>,
    ) -> Result<Response<proto::GetResponse>, Status> {
        self.client.clone().get(request).await
    }

    async fn set(
        &self,
        request: Request<proto::SetRequest>,
    ) -> Result<Response<proto::SetResponse>, Status> {
        self.client.clone().set(request).await
    }
}

// ===== global functions =====

// Builds an RPC request advertising the remaining time as its gRPC timeout.
pub(crate) fn rpc_request<T>(message: T, deadline: Instant) -> Request<T> {
    let mut request = Request::new(message);
    request.set_timeout(deadline.saturating_duration_since(Instant::now()));
    request
}

// Aborts the RPC once the deadline expires.
pub(crate) async fn rpc_with_deadline<T, F>(
    deadline: Instant,
    rpc: F,
) -> Result<T, Status>
where
    F: Future<Output = Result<T, Status>>,
{
    tokio::time::timeout_at(deadline, rpc)
        .await
        .unwrap_or_else(|_| {
            Err(Status::deadline_exceeded("RPC deadline expired"))
        })
}
