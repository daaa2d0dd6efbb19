/*
 * Copyright (c) 2024 Yunshan Networks
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

use std::error::Error;

const SERIALIZE: &str = "#[derive(serde::Serialize)]";

fn generate_protobuf() -> Result<(), Box<dyn Error>> {
    tonic_build::configure()
        .out_dir("src/proto")
        .type_attribute(".netflow.Pfx", SERIALIZE)
        .type_attribute(".netflow.Flow", SERIALIZE)
        .compile(&["message/netflow.proto"], &["message"])?;
    // lookups only, the routing information service runs elsewhere
    tonic_build::configure()
        .build_server(false)
        .out_dir("src/proto")
        .type_attribute(".bio.ris.IP", SERIALIZE)
        .type_attribute(".bio.ris.Prefix", SERIALIZE)
        .type_attribute(".bio.ris.LPMRequest", SERIALIZE)
        .compile(&["message/ris.proto"], &["message"])?;

    println!("cargo:rerun-if-changed=message");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    generate_protobuf()?;
    Ok(())
}
