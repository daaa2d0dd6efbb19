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

use std::sync::Arc;

use log::debug;
use tonic::{Request, Response, Status};

use public::proto::netflow::{self, annotator_server::Annotator};

use crate::annotator::{RouteAnnotator, RoutingInformation};
use crate::common::Flow;
use crate::error::Error;

/// `netflow.Annotator` backed by a route annotator.
pub struct AnnotatorService<C> {
    annotator: Arc<RouteAnnotator<C>>,
}

impl<C> AnnotatorService<C> {
    pub fn new(annotator: Arc<RouteAnnotator<C>>) -> Self {
        Self { annotator }
    }
}

fn to_status(e: Error) -> Status {
    let message = e.to_string();
    match e {
        Error::InvalidAddress(_) => Status::invalid_argument(message),
        Error::PrefixNotFound { .. } => Status::not_found(message),
        Error::LookupFailed { .. } => Status::unavailable(message),
        _ => Status::internal(message),
    }
}

#[tonic::async_trait]
impl<C: RoutingInformation> Annotator for AnnotatorService<C> {
    async fn annotate(
        &self,
        request: Request<netflow::Flow>,
    ) -> Result<Response<netflow::Flow>, Status> {
        let mut flow = Flow::from(request.into_inner());
        if let Err(e) = self.annotator.annotate(&mut flow).await {
            debug!("annotate {} failed: {}", flow, e);
            return Err(to_status(e));
        }
        Ok(Response::new(flow.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            to_status(Error::InvalidAddress(vec![1])).code(),
            tonic::Code::InvalidArgument
        );
        let not_found = to_status(Error::PrefixNotFound {
            addr: "203.0.113.9".to_owned(),
            router: "192.0.2.1".to_owned(),
            vrf: "0:0".to_owned(),
        });
        assert_eq!(not_found.code(), tonic::Code::NotFound);
        assert!(not_found.message().contains("addr=203.0.113.9"));
        assert!(not_found.message().contains("router=192.0.2.1"));
        assert_eq!(
            to_status(Error::LookupFailed {
                status: Status::deadline_exceeded("timeout"),
                request: "{}".to_owned(),
            })
            .code(),
            tonic::Code::Unavailable
        );
        assert_eq!(
            to_status(Error::MalformedRoute("route without prefix".to_owned())).code(),
            tonic::Code::Internal
        );
    }
}
