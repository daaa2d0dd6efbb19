/*
 * Copyright (c) 2022 Yunshan Networks
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::time::Duration;

use log::info;
use tonic::transport::{Channel, Endpoint};

use public::proto::ris::{
    routing_information_service_client::RoutingInformationServiceClient, LpmRequest, LpmResponse,
};

use crate::annotator::RoutingInformation;
use crate::error::{Error, Result};

/// Client of a routing information service (`bio.ris`).
///
/// The connection is made on first use and reestablished by the channel
/// when it breaks, every call is bounded by `timeout`.
#[derive(Clone)]
pub struct RisClient {
    client: RoutingInformationServiceClient<Channel>,
}

impl RisClient {
    // must be called within a tokio runtime
    pub fn new(server: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Endpoint::from_shared(server.to_owned())
            .map_err(|e| Error::InvalidServerAddress(server.to_owned(), e.to_string()))?
            .connect_timeout(timeout)
            .timeout(timeout);
        info!("routing information service at {}", server);
        Ok(Self {
            client: RoutingInformationServiceClient::new(endpoint.connect_lazy()),
        })
    }
}

#[tonic::async_trait]
impl RoutingInformation for RisClient {
    async fn lpm(&self, request: LpmRequest) -> Result<LpmResponse, tonic::Status> {
        let mut client = self.client.clone();
        client
            .lpm(request)
            .await
            .map(tonic::Response::into_inner)
    }
}
