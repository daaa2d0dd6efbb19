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

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use log::debug;
use snmp::{SyncSession, Value};

use super::{DevicePoller, PollValue, WalkEntry};
use crate::config::Device;
use crate::error::{Error, Result};

const SNMP_PORT: u16 = 161;
const MAX_REPETITIONS: u32 = 32;

/// SNMPv2c walker built on GETBULK.
pub struct SnmpPoller {
    timeout: Duration,
}

impl SnmpPoller {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn snmp_address(address: &str) -> String {
    match address.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, SNMP_PORT).to_string(),
        Err(_) if address.contains(':') => address.to_owned(),
        Err(_) => format!("{}:{}", address, SNMP_PORT),
    }
}

/// One decoded GETBULK response.
#[derive(Debug, Default)]
struct Page {
    error_status: u32,
    error_index: u32,
    varbinds: Vec<(Vec<u32>, PollValue)>,
}

// Pages through `root` until a varbind leaves the subtree or fails to move
// past the cursor. An agent at end of MIB either repeats the requested name
// or sends an exception value snmp 0.2 cannot decode, which ends the page.
fn walk_pages<F>(device: &Device, root: &[u32], mut get_bulk: F) -> Result<Vec<WalkEntry>>
where
    F: FnMut(&[u32]) -> Result<Page>,
{
    let mut entries = vec![];
    let mut cursor = root.to_vec();
    'walk: loop {
        let page = get_bulk(&cursor)?;
        if page.error_status != 0 {
            return Err(Error::DeviceUnreachable {
                device: device.name.clone(),
                reason: format!(
                    "error status {} at index {}",
                    page.error_status, page.error_index
                ),
            });
        }

        let mut advanced = false;
        for (oid, value) in page.varbinds {
            // left the subtree, or the agent is looping
            if !oid.starts_with(root) || oid <= cursor {
                break 'walk;
            }
            cursor = oid.clone();
            advanced = true;
            entries.push(WalkEntry { oid, value });
        }
        if !advanced {
            break;
        }
    }
    Ok(entries)
}

impl DevicePoller for SnmpPoller {
    fn walk(&self, device: &Device, root: &[u32]) -> Result<Vec<WalkEntry>> {
        let unreachable = |reason: String| Error::DeviceUnreachable {
            device: device.name.clone(),
            reason,
        };
        let malformed = |reason: String| Error::MalformedPollResponse {
            device: device.name.clone(),
            reason,
        };

        let mut session = SyncSession::new(
            snmp_address(&device.address),
            device.snmp_community.as_bytes(),
            Some(self.timeout),
            0,
        )
        .map_err(|e| unreachable(e.to_string()))?;

        let entries = walk_pages(device, root, |cursor| {
            let pdu = session
                .getbulk(&[cursor], 0, MAX_REPETITIONS)
                .map_err(|e| unreachable(format!("{:?}", e)))?;
            let mut page = Page {
                error_status: pdu.error_status,
                error_index: pdu.error_index,
                varbinds: vec![],
            };
            let mut buf = [0u32; 128];
            for (oid, value) in pdu.varbinds {
                let name = oid
                    .read_name(&mut buf)
                    .map_err(|e| malformed(format!("{:?}", e)))?;
                let value = match value {
                    Value::OctetString(s) => PollValue::OctetString(s.to_vec()),
                    v => PollValue::Other(format!("{:?}", v)),
                };
                page.varbinds.push((name.to_vec(), value));
            }
            Ok(page)
        })?;
        debug!(
            "snmp walk of {:?} on {} returned {} entries",
            root,
            device.name,
            entries.len()
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intf_mapper::IF_NAME_OID;

    fn device() -> Device {
        Device {
            name: "core01".to_owned(),
            address: "192.0.2.1".to_owned(),
            snmp_community: "public".to_owned(),
        }
    }

    fn oid(index: u32) -> Vec<u32> {
        let mut oid = IF_NAME_OID.to_vec();
        oid.push(index);
        oid
    }

    fn name(s: &str) -> PollValue {
        PollValue::OctetString(s.as_bytes().to_vec())
    }

    // Answers GETBULK from a sorted table, `repetitions` varbinds per page.
    fn agent(
        table: Vec<(Vec<u32>, PollValue)>,
        repetitions: usize,
        requests: &mut Vec<Vec<u32>>,
    ) -> impl FnMut(&[u32]) -> Result<Page> + '_ {
        move |cursor| {
            requests.push(cursor.to_vec());
            Ok(Page {
                varbinds: table
                    .iter()
                    .filter(|(oid, _)| oid.as_slice() > cursor)
                    .take(repetitions)
                    .cloned()
                    .collect(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn address_with_default_port() {
        assert_eq!(snmp_address("192.0.2.1"), "192.0.2.1:161");
        assert_eq!(snmp_address("2001:db8::1"), "[2001:db8::1]:161");
        assert_eq!(snmp_address("192.0.2.1:1161"), "192.0.2.1:1161");
        assert_eq!(snmp_address("core01.example.net"), "core01.example.net:161");
    }

    #[test]
    fn walk_advances_across_pages() {
        let table = (1..=5)
            .map(|i| (oid(i), name(&format!("et-0/0/{}", i))))
            .collect::<Vec<_>>();
        let mut requests = vec![];
        let entries = walk_pages(&device(), IF_NAME_OID, agent(table, 2, &mut requests)).unwrap();

        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].oid, oid(1));
        assert_eq!(entries[4].oid, oid(5));
        assert_eq!(entries[4].value, name("et-0/0/5"));
        // the last page comes back empty
        assert_eq!(requests, vec![IF_NAME_OID.to_vec(), oid(2), oid(4), oid(5)]);
    }

    #[test]
    fn walk_stops_at_subtree_end() {
        let mut table = vec![(oid(1), name("xe-0/0/0")), (oid(2), name("xe-0/0/1"))];
        // first row of the next ifXTable column
        let mut next_column = IF_NAME_OID.to_vec();
        *next_column.last_mut().unwrap() += 1;
        next_column.push(1);
        table.push((next_column, name("uplink")));

        let mut requests = vec![];
        let entries = walk_pages(&device(), IF_NAME_OID, agent(table, 32, &mut requests)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn walk_stops_on_looping_agent() {
        let mut pages = 0;
        let entries = walk_pages(&device(), IF_NAME_OID, |_| {
            pages += 1;
            // the same varbinds whatever the cursor
            Ok(Page {
                varbinds: vec![(oid(1), name("ge-0/0/0")), (oid(2), name("ge-0/0/1"))],
                ..Default::default()
            })
        })
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(pages, 2);

        // end of MIB repeats the requested name
        let entries = walk_pages(&device(), IF_NAME_OID, |cursor| {
            Ok(Page {
                varbinds: vec![(cursor.to_vec(), PollValue::Other("end".to_owned()))],
                ..Default::default()
            })
        })
        .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn walk_fails_on_error_status() {
        let mut pages = 0;
        let result = walk_pages(&device(), IF_NAME_OID, |cursor| {
            pages += 1;
            if pages == 1 {
                return Ok(Page {
                    varbinds: vec![(oid(1), name("ge-0/0/0"))],
                    ..Default::default()
                });
            }
            assert_eq!(cursor, oid(1).as_slice());
            Ok(Page {
                error_status: 5,
                error_index: 1,
                ..Default::default()
            })
        });
        match result {
            Err(Error::DeviceUnreachable { device, reason }) => {
                assert_eq!(device, "core01");
                assert_eq!(reason, "error status 5 at index 1");
            }
            r => panic!("unexpected result {:?}", r),
        }
    }

    #[test]
    fn walk_keeps_non_string_values() {
        let table = vec![
            (oid(1), name("lo0")),
            (oid(2), PollValue::Other("Integer(7)".to_owned())),
        ];
        let mut requests = vec![];
        let entries = walk_pages(&device(), IF_NAME_OID, agent(table, 32, &mut requests)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].value, PollValue::Other("Integer(7)".to_owned()));
    }
}
