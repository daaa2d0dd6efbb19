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

mod pipeline;
mod route;
mod time_bucketer;
mod vrf;

pub use pipeline::{AnnotateCounter, Pipeline, PipelineConfig};
pub use route::{
    next_hop_asn, origin_asn, RouteAnnotator, RouteAnnotatorConfig, RoutingInformation,
};
pub use time_bucketer::{bucket, TimeBucketer, TimeBucketerCounter};
pub use vrf::Vrf;
