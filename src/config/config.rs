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

use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::annotator::Vrf;

pub const DEFAULT_LOG_FILE: &str = "/var/log/flow-annotator/flow-annotator.log";
const DEFAULT_SNMP_COMMUNITY: &str = "public";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("yaml config invalid: {0}")]
    YamlConfigInvalid(String),
    #[error("aggregation-period must be positive, got {0}")]
    AggregationPeriodInvalid(i64),
    #[error("bucketer-workers must be positive")]
    BucketerWorkersInvalid,
    #[error("queue-size must be positive")]
    QueueSizeInvalid,
    #[error("vrf invalid: {0}")]
    VrfInvalid(String),
    #[error("grpc-listen invalid: {0}")]
    GrpcListenInvalid(String),
    #[error("interface-mapper renew-interval must be positive")]
    RenewIntervalInvalid,
    #[error("device {0:?} configured more than once")]
    DeviceDuplicated(String),
    #[error("device {0:?} has no address")]
    DeviceAddressEmpty(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    // empty disables file logging
    pub log_file: String,
    pub log_level: String,
    pub grpc_listen: String,
    pub ris_server: String,
    #[serde(with = "humantime_serde")]
    pub ris_timeout: Duration,
    // "ASN:value", empty for the default table
    pub vrf: String,
    pub extract_asn: bool,
    // seconds
    pub aggregation_period: i64,
    pub bucketer_workers: usize,
    pub bucketer_debug: bool,
    pub queue_size: usize,
    pub interface_mapper: InterfaceMapperConfig,
}

impl Config {
    pub fn load_from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|e| ConfigError::YamlConfigInvalid(e.to_string()))?;
        Self::load(&contents)
    }

    pub fn load<C: AsRef<str>>(contents: C) -> Result<Self, ConfigError> {
        let contents = contents.as_ref();
        if contents.trim().is_empty() {
            // parsing empty string leads to EOF error
            return Ok(Self::default());
        }
        let cfg: Self = serde_yaml::from_str(contents)
            .map_err(|e| ConfigError::YamlConfigInvalid(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.aggregation_period <= 0 {
            return Err(ConfigError::AggregationPeriodInvalid(
                self.aggregation_period,
            ));
        }
        if self.bucketer_workers == 0 {
            return Err(ConfigError::BucketerWorkersInvalid);
        }
        if self.queue_size == 0 {
            return Err(ConfigError::QueueSizeInvalid);
        }
        self.vrf()?;
        self.grpc_listen_addr()?;
        self.interface_mapper.validate()
    }

    pub fn vrf(&self) -> Result<Vrf, ConfigError> {
        self.vrf
            .parse()
            .map_err(|e: crate::error::Error| ConfigError::VrfInvalid(e.to_string()))
    }

    pub fn grpc_listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.grpc_listen
            .parse()
            .map_err(|_| ConfigError::GrpcListenInvalid(self.grpc_listen.clone()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: DEFAULT_LOG_FILE.into(),
            log_level: "info".into(),
            grpc_listen: "0.0.0.0:5432".into(),
            ris_server: "http://localhost:4321".into(),
            ris_timeout: Duration::from_secs(5),
            vrf: "".into(),
            extract_asn: true,
            aggregation_period: 60,
            bucketer_workers: 1,
            bucketer_debug: false,
            queue_size: 65536,
            interface_mapper: InterfaceMapperConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct InterfaceMapperConfig {
    #[serde(with = "humantime_serde")]
    pub renew_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub devices: Vec<Device>,
}

impl InterfaceMapperConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.renew_interval.is_zero() {
            return Err(ConfigError::RenewIntervalInvalid);
        }
        let mut names = HashSet::new();
        for device in self.devices.iter() {
            if !names.insert(device.name.as_str()) {
                return Err(ConfigError::DeviceDuplicated(device.name.clone()));
            }
            if device.address.is_empty() {
                return Err(ConfigError::DeviceAddressEmpty(device.name.clone()));
            }
        }
        Ok(())
    }
}

impl Default for InterfaceMapperConfig {
    fn default() -> Self {
        Self {
            renew_interval: Duration::from_secs(3600),
            timeout: Duration::from_secs(5),
            devices: vec![],
        }
    }
}

/// A monitored router polled for its interface table.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub struct Device {
    pub name: String,
    // host or host:port, port 161 when omitted
    pub address: String,
    #[serde(default = "default_snmp_community")]
    pub snmp_community: String,
}

fn default_snmp_community() -> String {
    DEFAULT_SNMP_COMMUNITY.to_owned()
}
