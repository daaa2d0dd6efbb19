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

mod snmp_poller;

pub use snmp_poller::SnmpPoller;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::config::Device;
use crate::error::{Error, Result};

// IF-MIB::ifName
pub const IF_NAME_OID: &[u32] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 1];

pub type InterfaceIdByName = HashMap<String, u32>;
pub type InterfaceNameById = HashMap<u32, String>;

#[derive(Clone, Debug, PartialEq)]
pub enum PollValue {
    OctetString(Vec<u8>),
    // any other type, rendered for error messages
    Other(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct WalkEntry {
    pub oid: Vec<u32>,
    pub value: PollValue,
}

/// Walks a subtree of a device's management tree.
pub trait DevicePoller: Send + Sync + 'static {
    fn walk(&self, device: &Device, root: &[u32]) -> Result<Vec<WalkEntry>>;
}

#[derive(Clone, Debug, Default)]
struct Mapping {
    by_name: InterfaceIdByName,
    by_id: InterfaceNameById,
}

struct DeviceState {
    device: Device,
    mapping: RwLock<Mapping>,
}

struct Shared<P> {
    poller: P,
    devices: HashMap<String, DeviceState>,

    running: Mutex<bool>,
    timer: Condvar,
}

/// Interface name and index tables of the monitored routers.
///
/// Every device is polled once when the mapper is built and then again
/// every `renew_interval` by a thread of its own. A failed renew keeps the
/// previous tables. Reads return copies and never fail, a device that is
/// not configured reads as empty.
pub struct InterfaceMapper<P: DevicePoller> {
    shared: Arc<Shared<P>>,
    thread_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<P: DevicePoller> InterfaceMapper<P> {
    pub fn new(devices: Vec<Device>, renew_interval: Duration, poller: P) -> Result<Self> {
        let mut states = HashMap::with_capacity(devices.len());
        for device in devices {
            let mapping = fetch(&poller, &device).map_err(|e| Error::InitialMapping {
                device: device.name.clone(),
                source: Box::new(e),
            })?;
            info!(
                "interface mapper got {} interfaces of {}",
                mapping.by_name.len(),
                device.name
            );
            states.insert(
                device.name.clone(),
                DeviceState {
                    device,
                    mapping: RwLock::new(mapping),
                },
            );
        }

        let mapper = Self {
            shared: Arc::new(Shared {
                poller,
                devices: states,
                running: Mutex::new(true),
                timer: Condvar::new(),
            }),
            thread_handles: Mutex::new(vec![]),
        };
        for name in mapper.shared.devices.keys() {
            let shared = mapper.shared.clone();
            let name = name.clone();
            let handle = thread::Builder::new()
                .name(format!("intf-renew-{}", name))
                .spawn(move || renew(shared, name, renew_interval))?;
            mapper.thread_handles.lock().push(handle);
        }
        Ok(mapper)
    }

    pub fn devices(&self) -> Vec<String> {
        let mut names = self.shared.devices.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn interface_id_by_name(&self, device: &str) -> InterfaceIdByName {
        self.shared
            .devices
            .get(device)
            .map(|s| s.mapping.read().by_name.clone())
            .unwrap_or_default()
    }

    pub fn interface_name_by_id(&self, device: &str) -> InterfaceNameById {
        self.shared
            .devices
            .get(device)
            .map(|s| s.mapping.read().by_id.clone())
            .unwrap_or_default()
    }

    pub fn stop(&self) {
        {
            let mut running = self.shared.running.lock();
            if !*running {
                return;
            }
            *running = false;
        }
        self.shared.timer.notify_all();
        for handle in self.thread_handles.lock().drain(..) {
            let _ = handle.join();
        }
        info!("interface mapper stopped");
    }
}

impl<P: DevicePoller> Drop for InterfaceMapper<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

// returns true when stopped
fn wait_timeout(running: &Mutex<bool>, timer: &Condvar, interval: Duration) -> bool {
    let mut guard = running.lock();
    if !*guard {
        return true;
    }
    timer.wait_for(&mut guard, interval);
    !*guard
}

fn renew<P: DevicePoller>(shared: Arc<Shared<P>>, name: String, interval: Duration) {
    let Some(state) = shared.devices.get(&name) else {
        return;
    };
    while !wait_timeout(&shared.running, &shared.timer, interval) {
        match fetch(&shared.poller, &state.device) {
            Ok(mapping) => {
                debug!(
                    "renewed interface mapping of {}: {} interfaces",
                    name,
                    mapping.by_name.len()
                );
                *state.mapping.write() = mapping;
            }
            Err(e) => warn!("unable to renew interface mapping for {}: {}", name, e),
        }
    }
    debug!("interface mapping renew of {} exited", name);
}

fn fetch<P: DevicePoller>(poller: &P, device: &Device) -> Result<Mapping> {
    let entries = poller.walk(device, IF_NAME_OID)?;
    let malformed = |reason: String| Error::MalformedPollResponse {
        device: device.name.clone(),
        reason,
    };

    let mut by_name = InterfaceIdByName::with_capacity(entries.len());
    for entry in entries {
        if entry.oid.len() != IF_NAME_OID.len() + 1 || !entry.oid.starts_with(IF_NAME_OID) {
            return Err(malformed(format!("unexpected oid {:?}", entry.oid)));
        }
        let id = entry.oid[IF_NAME_OID.len()];
        let name = match entry.value {
            PollValue::OctetString(s) => String::from_utf8_lossy(&s).into_owned(),
            PollValue::Other(v) => {
                return Err(malformed(format!("interface {} name is {}", id, v)));
            }
        };
        by_name.insert(name, id);
    }
    let by_id = by_name
        .iter()
        .map(|(name, id)| (*id, name.clone()))
        .collect();
    Ok(Mapping { by_name, by_id })
}
