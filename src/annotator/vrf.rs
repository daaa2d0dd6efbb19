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
use std::str::FromStr;

use crate::error::Error;

/// Routing table id, `ASN * 2^32 + value`. Zero is the global table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vrf(u64);

impl Vrf {
    pub const GLOBAL: Vrf = Vrf(0);

    pub fn new(asn: u32, value: u32) -> Self {
        Vrf((asn as u64) << 32 | value as u64)
    }

    pub fn asn(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn value(&self) -> u32 {
        self.0 as u32
    }
}

impl From<Vrf> for u64 {
    fn from(v: Vrf) -> Self {
        v.0
    }
}

impl From<u64> for Vrf {
    fn from(id: u64) -> Self {
        Vrf(id)
    }
}

impl FromStr for Vrf {
    type Err = Error;

    // "ASN:value", empty for the global table
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::GLOBAL);
        }
        let invalid = |reason: String| Error::InvalidVrf(s.to_owned(), reason);
        let mut parts = s.split(':');
        let (Some(asn), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid("expected ASN:value".to_owned()));
        };
        let asn = asn
            .parse::<u32>()
            .map_err(|e| invalid(format!("invalid ASN {:?}: {}", asn, e)))?;
        let value = value
            .parse::<u32>()
            .map_err(|e| invalid(format!("invalid value {:?}: {}", value, e)))?;
        Ok(Vrf::new(asn, value))
    }
}

impl fmt::Display for Vrf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asn(), self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        let vrf: Vrf = "65000:100".parse().unwrap();
        assert_eq!(u64::from(vrf), 65000 * (1u64 << 32) + 100);
        assert_eq!(vrf.asn(), 65000);
        assert_eq!(vrf.value(), 100);
        assert_eq!(vrf.to_string(), "65000:100");

        assert_eq!("".parse::<Vrf>().unwrap(), Vrf::GLOBAL);
        assert_eq!(u64::from(Vrf::GLOBAL), 0);
        assert_eq!(
            u64::from("4294967295:4294967295".parse::<Vrf>().unwrap()),
            u64::MAX
        );
    }

    #[test]
    fn parse_invalid() {
        for s in ["abc:1", "1:abc", "1:2:3", "100", ":", "1:", "-1:2", "4294967296:0"] {
            assert!(
                matches!(s.parse::<Vrf>(), Err(Error::InvalidVrf(ref v, _)) if v == s),
                "{:?} should be rejected",
                s
            );
        }
    }
}
