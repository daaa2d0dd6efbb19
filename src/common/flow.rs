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

use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;

use public::proto::netflow;

/// One flow record as it travels through the annotation stages.
///
/// Addresses are kept as the raw bytes received from the capture stage, so
/// a record with a malformed address can still be carried and reported.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Flow {
    pub router: Vec<u8>,
    pub family: u32,
    pub src_addr: Vec<u8>,
    pub dst_addr: Vec<u8>,
    pub protocol: u32,
    pub int_in: u32,
    pub int_out: u32,
    pub next_hop: Vec<u8>,
    pub src_as: u32,
    pub dst_as: u32,
    pub next_hop_as: u32,
    // seconds since epoch
    pub timestamp: i64,
    pub src_pfx: Option<IpNet>,
    pub dst_pfx: Option<IpNet>,
    pub src_port: u32,
    pub dst_port: u32,
    pub samplerate: u64,
    pub packets: u64,
    pub size: u64,
}

impl Flow {
    pub fn src_ip(&self) -> Option<IpAddr> {
        ip_from_bytes(&self.src_addr)
    }

    pub fn dst_ip(&self) -> Option<IpAddr> {
        ip_from_bytes(&self.dst_addr)
    }

    pub fn router_ip(&self) -> Option<IpAddr> {
        ip_from_bytes(&self.router)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ts={} router={} {}:{} -> {}:{} proto={} if={}->{} src_pfx={} dst_pfx={} src_as={} dst_as={} next_hop_as={} packets={} size={}",
            self.timestamp,
            format_addr(&self.router),
            format_addr(&self.src_addr),
            self.src_port,
            format_addr(&self.dst_addr),
            self.dst_port,
            self.protocol,
            self.int_in,
            self.int_out,
            OptionalPrefix(&self.src_pfx),
            OptionalPrefix(&self.dst_pfx),
            self.src_as,
            self.dst_as,
            self.next_hop_as,
            self.packets,
            self.size,
        )
    }
}

struct OptionalPrefix<'a>(&'a Option<IpNet>);

impl fmt::Display for OptionalPrefix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(p) => write!(f, "{}", p),
            None => write!(f, "-"),
        }
    }
}

/// Parses 4 or 16 raw bytes as an IP address.
pub fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    }
}

/// Renders raw address bytes, `?` followed by hex when they are not an address.
pub fn format_addr(bytes: &[u8]) -> String {
    match ip_from_bytes(bytes) {
        Some(ip) => ip.to_string(),
        None if bytes.is_empty() => "<nil>".to_owned(),
        None => bytes
            .iter()
            .fold(String::from("?"), |s, b| s + &format!("{:02x}", b)),
    }
}

// prefix length of a contiguous netmask
fn mask_to_prefix_len(mask: &[u8]) -> Option<u8> {
    let mut len = 0u8;
    let mut ended = false;
    for b in mask {
        if ended {
            if *b != 0 {
                return None;
            }
            continue;
        }
        let ones = b.leading_ones() as u8;
        if ones < 8 {
            if b.checked_shl(ones as u32).unwrap_or(0) != 0 {
                return None;
            }
            ended = true;
        }
        len += ones;
    }
    Some(len)
}

fn pfx_to_proto(p: IpNet) -> netflow::Pfx {
    let (ip, mask) = match p {
        IpNet::V4(n) => (n.network().octets().to_vec(), n.netmask().octets().to_vec()),
        IpNet::V6(n) => (n.network().octets().to_vec(), n.netmask().octets().to_vec()),
    };
    netflow::Pfx { ip, mask }
}

fn prefix_from_proto(p: &netflow::Pfx) -> Option<IpNet> {
    let ip = ip_from_bytes(&p.ip)?;
    if p.mask.len() != p.ip.len() {
        return None;
    }
    IpNet::new(ip, mask_to_prefix_len(&p.mask)?).ok()
}

impl From<netflow::Flow> for Flow {
    fn from(f: netflow::Flow) -> Self {
        Flow {
            src_pfx: f.src_pfx.as_ref().and_then(prefix_from_proto),
            dst_pfx: f.dst_pfx.as_ref().and_then(prefix_from_proto),
            router: f.router,
            family: f.family,
            src_addr: f.src_addr,
            dst_addr: f.dst_addr,
            protocol: f.protocol,
            int_in: f.int_in,
            int_out: f.int_out,
            next_hop: f.next_hop,
            src_as: f.src_as,
            dst_as: f.dst_as,
            next_hop_as: f.next_hop_as,
            timestamp: f.timestamp,
            src_port: f.src_port,
            dst_port: f.dst_port,
            samplerate: f.samplerate,
            packets: f.packets,
            size: f.size,
        }
    }
}

impl From<Flow> for netflow::Flow {
    fn from(f: Flow) -> Self {
        netflow::Flow {
            router: f.router,
            family: f.family,
            src_addr: f.src_addr,
            dst_addr: f.dst_addr,
            protocol: f.protocol,
            int_in: f.int_in,
            int_out: f.int_out,
            next_hop: f.next_hop,
            src_as: f.src_as,
            dst_as: f.dst_as,
            next_hop_as: f.next_hop_as,
            timestamp: f.timestamp,
            src_pfx: f.src_pfx.map(pfx_to_proto),
            dst_pfx: f.dst_pfx.map(pfx_to_proto),
            src_port: f.src_port,
            dst_port: f.dst_port,
            samplerate: f.samplerate,
            packets: f.packets,
            size: f.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    #[test]
    fn address_lengths() {
        assert_eq!(
            ip_from_bytes(&[10, 0, 0, 1]),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
        );
        assert_eq!(
            ip_from_bytes(&Ipv6Addr::LOCALHOST.octets()),
            Some(IpAddr::V6(Ipv6Addr::LOCALHOST))
        );
        assert_eq!(ip_from_bytes(&[]), None);
        assert_eq!(ip_from_bytes(&[1, 2, 3]), None);
        assert_eq!(format_addr(&[1, 2, 3]), "?010203");
        assert_eq!(format_addr(&[]), "<nil>");
    }

    #[test]
    fn netmask_prefix_length() {
        assert_eq!(mask_to_prefix_len(&[255, 255, 255, 0]), Some(24));
        assert_eq!(mask_to_prefix_len(&[255, 255, 240, 0]), Some(20));
        assert_eq!(mask_to_prefix_len(&[0, 0, 0, 0]), Some(0));
        assert_eq!(mask_to_prefix_len(&[255; 16]), Some(128));
        assert_eq!(mask_to_prefix_len(&[255, 0, 255, 0]), None);
        assert_eq!(mask_to_prefix_len(&[255, 0b1011_0000, 0, 0]), None);
    }

    #[test]
    fn proto_conversion_keeps_prefixes() {
        let flow = Flow {
            router: vec![192, 0, 2, 1],
            src_addr: vec![198, 51, 100, 7],
            dst_addr: vec![203, 0, 113, 9],
            timestamp: 1234,
            src_pfx: Some("198.51.100.0/24".parse().unwrap()),
            dst_pfx: Some("2001:db8::/32".parse().unwrap()),
            dst_as: 65001,
            ..Default::default()
        };
        let pb: netflow::Flow = flow.clone().into();
        assert_eq!(pb.src_pfx.as_ref().unwrap().mask, vec![255, 255, 255, 0]);
        assert_eq!(pb.dst_pfx.as_ref().unwrap().mask.len(), 16);
        assert_eq!(Flow::from(pb), flow);
    }

    #[test]
    fn prefix_to_proto_uses_network_address() {
        let pfx = pfx_to_proto("10.1.2.3/16".parse().unwrap());
        assert_eq!(pfx.ip, vec![10, 1, 0, 0]);
        assert_eq!(pfx.mask, vec![255, 255, 0, 0]);

        let pfx = pfx_to_proto("2001:db8::1/128".parse().unwrap());
        assert_eq!(pfx.ip, "2001:db8::1".parse::<Ipv6Addr>().unwrap().octets().to_vec());
        assert_eq!(pfx.mask, vec![255; 16]);
    }

    #[test]
    fn malformed_proto_prefix_is_dropped() {
        let pb = netflow::Flow {
            src_pfx: Some(netflow::Pfx {
                ip: vec![10, 0, 0, 0],
                mask: vec![255, 0, 255, 0],
            }),
            dst_pfx: Some(netflow::Pfx {
                ip: vec![10, 0, 0, 0],
                mask: vec![255, 0],
            }),
            ..Default::default()
        };
        let flow = Flow::from(pb);
        assert_eq!(flow.src_pfx, None);
        assert_eq!(flow.dst_pfx, None);
    }
}
