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

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;
use log::debug;

use public::proto::ris::{self, ip::Version, LpmRequest, LpmResponse, Route};

use super::Vrf;
use crate::common::flow::{format_addr, ip_from_bytes, Flow};
use crate::error::{Error, Result};

/// Longest prefix match against a routing information service.
#[tonic::async_trait]
pub trait RoutingInformation: Send + Sync + 'static {
    async fn lpm(&self, request: LpmRequest) -> Result<LpmResponse, tonic::Status>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RouteAnnotatorConfig {
    pub vrf: Vrf,
    // fill src_as, dst_as and next_hop_as from the AS path
    pub extract_asn: bool,
}

/// Fills the source and destination prefixes of a flow, and optionally
/// the AS numbers, from the routes its router knows.
///
/// Both directions are looked up before the flow is touched, so a failed
/// lookup leaves the flow as it was.
pub struct RouteAnnotator<C> {
    client: C,
    config: RouteAnnotatorConfig,
}

struct Annotation {
    prefix: IpNet,
    origin_asn: u32,
    next_hop_asn: u32,
}

impl<C: RoutingInformation> RouteAnnotator<C> {
    pub fn new(client: C, config: RouteAnnotatorConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RouteAnnotatorConfig {
        &self.config
    }

    pub async fn annotate(&self, flow: &mut Flow) -> Result<()> {
        let router = format_addr(&flow.router);
        let dst = self.lookup(&router, &flow.dst_addr).await?;
        let src = self.lookup(&router, &flow.src_addr).await?;

        flow.dst_pfx = Some(dst.prefix);
        flow.src_pfx = Some(src.prefix);
        if self.config.extract_asn {
            flow.dst_as = dst.origin_asn;
            flow.next_hop_as = dst.next_hop_asn;
            flow.src_as = src.origin_asn;
        }
        Ok(())
    }

    async fn lookup(&self, router: &str, addr: &[u8]) -> Result<Annotation> {
        let ip = ip_from_bytes(addr).ok_or_else(|| Error::InvalidAddress(addr.to_vec()))?;
        let request = LpmRequest {
            router: router.to_owned(),
            vrf_id: self.config.vrf.into(),
            pfx: Some(ris::Prefix {
                address: Some(ip_to_proto(ip)),
                length: host_prefix_len(ip),
            }),
            ..Default::default()
        };

        let response = match self.client.lpm(request.clone()).await {
            Ok(r) => r,
            Err(status) => {
                return Err(Error::LookupFailed {
                    status,
                    request: serde_json::to_string(&request).unwrap_or_default(),
                })
            }
        };
        // routes come ordered by specificity, the last one is the best match
        let Some(route) = response.routes.last() else {
            return Err(Error::PrefixNotFound {
                addr: ip.to_string(),
                router: router.to_owned(),
                vrf: self.config.vrf.to_string(),
            });
        };
        let prefix = route_prefix(route)?;
        debug!("lpm {} via {} matched {}", ip, router, prefix);

        Ok(Annotation {
            prefix,
            origin_asn: origin_asn(route),
            next_hop_asn: next_hop_asn(route),
        })
    }
}

fn host_prefix_len(ip: IpAddr) -> u32 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn ip_to_proto(ip: IpAddr) -> ris::Ip {
    match ip {
        IpAddr::V4(ip) => ris::Ip {
            higher: 0,
            lower: u32::from(ip) as u64,
            version: Version::IPv4 as i32,
        },
        IpAddr::V6(ip) => {
            let n = u128::from(ip);
            ris::Ip {
                higher: (n >> 64) as u64,
                lower: n as u64,
                version: Version::IPv6 as i32,
            }
        }
    }
}

fn ip_from_proto(ip: &ris::Ip) -> Option<IpAddr> {
    match Version::try_from(ip.version).ok()? {
        Version::IPv4 => u32::try_from(ip.lower)
            .ok()
            .map(|n| IpAddr::V4(Ipv4Addr::from(n))),
        Version::IPv6 => Some(IpAddr::V6(Ipv6Addr::from(
            (ip.higher as u128) << 64 | ip.lower as u128,
        ))),
    }
}

fn route_prefix(route: &Route) -> Result<IpNet> {
    let pfx = route
        .pfx
        .as_ref()
        .ok_or_else(|| Error::MalformedRoute("route without prefix".to_owned()))?;
    let addr = pfx
        .address
        .as_ref()
        .and_then(ip_from_proto)
        .ok_or_else(|| Error::MalformedRoute(format!("bad prefix address {:?}", pfx.address)))?;
    u8::try_from(pfx.length)
        .ok()
        .and_then(|len| IpNet::new(addr, len).ok())
        .map(|net| net.trunc())
        .ok_or_else(|| Error::MalformedRoute(format!("bad prefix length {}/{}", addr, pfx.length)))
}

// AS_SEQUENCE segments of the first path, AS_SETs carry no order
fn sequences(route: &Route) -> impl Iterator<Item = &ris::AsPathSegment> {
    route
        .paths
        .first()
        .and_then(|p| p.bgp_path.as_ref())
        .into_iter()
        .flat_map(|b| b.as_path.iter())
        .filter(|s| s.as_sequence)
}

/// The AS that originated the route, last AS of the last sequence.
pub fn origin_asn(route: &Route) -> u32 {
    sequences(route)
        .last()
        .and_then(|s| s.asns.last().copied())
        .unwrap_or_default()
}

/// The neighbour AS traffic is handed to, first AS of the first sequence.
pub fn next_hop_asn(route: &Route) -> u32 {
    sequences(route)
        .next()
        .and_then(|s| s.asns.first().copied())
        .unwrap_or_default()
}
