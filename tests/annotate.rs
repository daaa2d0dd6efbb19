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

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::{net::TcpListener, runtime::Runtime};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server as TonicServer, Code, Status};

use flow_annotator::{
    annotator::{RouteAnnotator, RouteAnnotatorConfig, RoutingInformation},
    rpc::{AnnotatorService, RisClient},
};

use public::proto::{
    netflow::{self, annotator_client::AnnotatorClient, annotator_server::AnnotatorServer},
    ris::{self, ip::Version, AsPathSegment, BgpPath, LpmRequest, LpmResponse, Path, Route},
};

// routes 10.0.0.0/8 learned from AS64510 via AS64500
struct StaticRis;

#[tonic::async_trait]
impl RoutingInformation for StaticRis {
    async fn lpm(&self, request: LpmRequest) -> Result<LpmResponse, Status> {
        if request.router != "192.0.2.1" || request.vrf_id != (65000 << 32) + 1 {
            return Err(Status::invalid_argument("unknown router or vrf"));
        }
        let lower = request
            .pfx
            .and_then(|p| p.address)
            .map(|a| a.lower)
            .unwrap_or_default();
        if lower >> 24 != 10 {
            return Ok(LpmResponse::default());
        }
        Ok(LpmResponse {
            routes: vec![Route {
                pfx: Some(ris::Prefix {
                    address: Some(ris::Ip {
                        higher: 0,
                        lower: 10 << 24,
                        version: Version::IPv4 as i32,
                    }),
                    length: 8,
                }),
                paths: vec![Path {
                    r#type: ris::path::Type::Bgp as i32,
                    bgp_path: Some(BgpPath {
                        as_path: vec![AsPathSegment {
                            as_sequence: true,
                            asns: vec![64500, 64510],
                        }],
                        ..Default::default()
                    }),
                }],
            }],
        })
    }
}

fn serve<C: RoutingInformation>(rt: &Runtime, client: C) -> SocketAddr {
    let listener = rt.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
    let addr = listener.local_addr().unwrap();
    let annotator = Arc::new(RouteAnnotator::new(
        client,
        RouteAnnotatorConfig {
            vrf: "65000:1".parse().unwrap(),
            extract_asn: true,
        },
    ));
    rt.spawn(
        TonicServer::builder()
            .add_service(AnnotatorServer::new(AnnotatorService::new(annotator)))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    addr
}

fn flow(dst: Vec<u8>) -> netflow::Flow {
    netflow::Flow {
        router: vec![192, 0, 2, 1],
        family: 4,
        src_addr: vec![10, 1, 1, 1],
        dst_addr: dst,
        protocol: 6,
        src_port: 43210,
        dst_port: 443,
        timestamp: 960,
        packets: 3,
        size: 1500,
        ..Default::default()
    }
}

async fn annotate(addr: SocketAddr, flow: netflow::Flow) -> Result<netflow::Flow, Status> {
    let mut client = AnnotatorClient::connect(format!("http://{}", addr))
        .await
        .unwrap();
    client.annotate(flow).await.map(|r| r.into_inner())
}

#[test]
fn annotate_over_grpc() {
    let rt = Runtime::new().unwrap();
    let addr = serve(&rt, StaticRis);

    let annotated = rt
        .block_on(annotate(addr, flow(vec![10, 2, 2, 2])))
        .unwrap();
    let eight = netflow::Pfx {
        ip: vec![10, 0, 0, 0],
        mask: vec![255, 0, 0, 0],
    };
    assert_eq!(annotated.dst_pfx, Some(eight.clone()));
    assert_eq!(annotated.src_pfx, Some(eight));
    assert_eq!(annotated.dst_as, 64510);
    assert_eq!(annotated.next_hop_as, 64500);
    assert_eq!(annotated.src_as, 64510);
    // everything else is passed through
    assert_eq!(
        netflow::Flow {
            src_pfx: None,
            dst_pfx: None,
            src_as: 0,
            dst_as: 0,
            next_hop_as: 0,
            ..annotated
        },
        flow(vec![10, 2, 2, 2])
    );
}

#[test]
fn errors_carry_status_codes() {
    let rt = Runtime::new().unwrap();
    let addr = serve(&rt, StaticRis);

    let status = rt
        .block_on(annotate(addr, flow(vec![192, 168, 1, 1])))
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
    assert!(status.message().contains("192.168.1.1"), "{}", status.message());
    assert!(status.message().contains("65000:1"), "{}", status.message());

    let status = rt
        .block_on(annotate(addr, flow(vec![10, 2, 2])))
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let mut unknown_router = flow(vec![10, 2, 2, 2]);
    unknown_router.router = vec![192, 0, 2, 2];
    let status = rt.block_on(annotate(addr, unknown_router)).unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    assert!(status.message().contains("LPM failed"), "{}", status.message());
}

#[test]
fn unreachable_ris_is_unavailable() {
    let rt = Runtime::new().unwrap();
    let client = {
        let _guard = rt.enter();
        // nothing listens on the discard port
        RisClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap()
    };
    let addr = serve(&rt, client);

    let status = rt
        .block_on(annotate(addr, flow(vec![10, 2, 2, 2])))
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
}
