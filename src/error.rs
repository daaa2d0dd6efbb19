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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid IP: {0:?}")]
    InvalidAddress(Vec<u8>),
    #[error("invalid VRF {0:?}: {1}")]
    InvalidVrf(String, String),
    #[error("LPM failed: {status} (req: {request})")]
    LookupFailed {
        status: tonic::Status,
        request: String,
    },
    #[error("prefix not found (addr={addr}, router={router}, vrf={vrf})")]
    PrefixNotFound {
        addr: String,
        router: String,
        vrf: String,
    },
    #[error("malformed route in LPM response: {0}")]
    MalformedRoute(String),
    #[error("invalid RIS server address {0}: {1}")]
    InvalidServerAddress(String, String),
    #[error("device {device} unreachable: {reason}")]
    DeviceUnreachable { device: String, reason: String },
    #[error("malformed poll response from {device}: {reason}")]
    MalformedPollResponse { device: String, reason: String },
    #[error("unable to get interface mapping for {device}: {source}")]
    InitialMapping {
        device: String,
        #[source]
        source: Box<Error>,
    },
    #[error("aggregation period must be positive, got {0}")]
    InvalidPeriod(i64),
    #[error("worker count must be positive")]
    InvalidWorkerCount,
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
