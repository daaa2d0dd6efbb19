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

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::info;
use signal_hook::{consts::TERM_SIGNALS, iterator::Signals};
use tokio::{runtime::Builder, sync::oneshot};
use tonic::transport::Server;

use ::flow_annotator::{
    annotator::{RouteAnnotator, RouteAnnotatorConfig},
    config::Config,
    intf_mapper::{InterfaceMapper, SnmpPoller},
    rpc::{AnnotatorService, RisClient},
    utils::{logger, stats::Collector},
};
use public::counter::Countable;
use public::proto::netflow::annotator_server::AnnotatorServer;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
struct Opts {
    /// Specify config file location
    #[clap(short = 'f', long, default_value = "/etc/flow-annotator.yaml")]
    config_file: String,

    /// Display the version
    #[clap(short, long, action = ArgAction::SetTrue)]
    version: bool,

    /// Dump the interface tables of the configured devices and exit
    #[clap(long = "dump-interfaces")]
    dump_interfaces: bool,
}

fn dump_interfaces(config: &Config) -> Result<()> {
    let mapper_config = &config.interface_mapper;
    let mapper = InterfaceMapper::new(
        mapper_config.devices.clone(),
        mapper_config.renew_interval,
        SnmpPoller::new(mapper_config.timeout),
    )?;
    for device in mapper.devices() {
        println!("{}:", device);
        let mut interfaces = mapper
            .interface_name_by_id(&device)
            .into_iter()
            .collect::<Vec<_>>();
        interfaces.sort();
        for (id, name) in interfaces {
            println!("{:>8} {}", id, name);
        }
    }
    mapper.stop();
    Ok(())
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    if opts.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let config = Config::load_from_file(&opts.config_file)
        .with_context(|| format!("failed to load config {}", opts.config_file))?;
    let (_logger_handle, log_level_counter) = logger::init(&config)?;
    if opts.dump_interfaces {
        return dump_interfaces(&config);
    }

    let stats_collector = Collector::new(STATS_INTERVAL);
    stats_collector.register_countable(
        "log_counter",
        Countable::Owned(Box::new(log_level_counter)),
    );
    stats_collector.start()?;

    let annotator_config = RouteAnnotatorConfig {
        vrf: config.vrf()?,
        extract_asn: config.extract_asn,
    };
    let listen_addr = config.grpc_listen_addr()?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut signals = Signals::new(TERM_SIGNALS)?;
    let signals_handle = signals.handle();
    thread::Builder::new()
        .name("signal".to_owned())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!("received signal {}, stopping", signal);
            }
            let _ = stop_tx.send(());
        })?;

    let rt = Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async {
        let client = RisClient::new(&config.ris_server, config.ris_timeout)?;
        let annotator = Arc::new(RouteAnnotator::new(client, annotator_config));
        info!(
            "flow annotator listening on {}, vrf {}, extract asn {}",
            listen_addr, annotator_config.vrf, annotator_config.extract_asn
        );
        Server::builder()
            .add_service(AnnotatorServer::new(AnnotatorService::new(annotator)))
            .serve_with_shutdown(listen_addr, async {
                let _ = stop_rx.await;
            })
            .await?;
        Ok::<_, anyhow::Error>(())
    })?;
    signals_handle.close();
    stats_collector.stop();
    info!("flow annotator stopped");

    Ok(())
}
