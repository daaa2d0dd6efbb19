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

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::runtime::Builder;

use public::counter::{Counter, CounterType, CounterValue, RefCountable};
use public::queue::{self, Error as QueueError, Receiver, Sender, StatsHandle};

use super::{RouteAnnotator, RoutingInformation, TimeBucketer, TimeBucketerCounter};
use crate::common::Flow;
use crate::error::Result;

const QUEUE_READ_TIMEOUT: Duration = Duration::from_secs(1);
const QUEUE_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    pub aggregation_period: i64,
    pub bucketer_workers: usize,
    pub bucketer_debug: bool,
    // between the bucketer and the route annotation stage
    pub queue_size: usize,
}

#[derive(Default)]
pub struct AnnotateCounter {
    pub annotated: AtomicU64,
    pub annotate_failed: AtomicU64,
    pub dropped: AtomicU64,
}

impl RefCountable for AnnotateCounter {
    fn get_counters(&self) -> Vec<Counter> {
        vec![
            (
                "annotated",
                CounterType::Counted,
                CounterValue::Unsigned(self.annotated.swap(0, Ordering::Relaxed)),
            ),
            (
                "annotate_failed",
                CounterType::Counted,
                CounterValue::Unsigned(self.annotate_failed.swap(0, Ordering::Relaxed)),
            ),
            (
                "dropped",
                CounterType::Counted,
                CounterValue::Unsigned(self.dropped.swap(0, Ordering::Relaxed)),
            ),
        ]
    }
}

/// input -> time bucketer -> route annotation -> output
///
/// Flows whose route lookup fails are forwarded bucketed but unannotated.
/// The pipeline drains and exits once the input queue terminates, which in
/// turn terminates the output queue. `stop` returns even when nobody reads the
/// output, dropping the flows held by the stages.
pub struct Pipeline<C> {
    bucketer: TimeBucketer,
    annotator: Arc<RouteAnnotator<C>>,

    // taken by start
    queues: Option<(Receiver<Flow>, Sender<Flow>)>,
    bucketed_stats: StatsHandle<Flow>,
    thread_handle: Option<JoinHandle<()>>,

    running: Arc<AtomicBool>,
    counter: Arc<AnnotateCounter>,
}

impl<C: RoutingInformation> Pipeline<C> {
    pub fn new(
        config: PipelineConfig,
        annotator: Arc<RouteAnnotator<C>>,
        input: Receiver<Flow>,
        output: Sender<Flow>,
    ) -> Result<Self> {
        let (bucketed_tx, bucketed_rx, bucketed_stats) = queue::bounded(config.queue_size);
        let bucketer = TimeBucketer::new(
            0,
            input,
            bucketed_tx,
            config.aggregation_period,
            config.bucketer_debug,
            config.bucketer_workers,
        )?;
        Ok(Self {
            bucketer,
            annotator,
            queues: Some((bucketed_rx, output)),
            bucketed_stats,
            thread_handle: None,
            running: Arc::new(AtomicBool::new(false)),
            counter: Arc::new(AnnotateCounter::default()),
        })
    }

    pub fn counter(&self) -> Arc<AnnotateCounter> {
        self.counter.clone()
    }

    pub fn bucketer_counter(&self) -> Arc<TimeBucketerCounter> {
        self.bucketer.counter()
    }

    pub fn bucketed_queue_counters(&self) -> Vec<Counter> {
        self.bucketed_stats.counters()
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::Relaxed) {
            warn!("pipeline already started, do nothing.");
            return Ok(());
        }
        let Some((input, output)) = self.queues.take() else {
            warn!("pipeline cannot be restarted.");
            self.running.store(false, Ordering::Relaxed);
            return Ok(());
        };

        let mut stage = AnnotateStage {
            input,
            output,
            annotator: self.annotator.clone(),
            running: self.running.clone(),
            counter: self.counter.clone(),
        };
        self.thread_handle = Some(
            thread::Builder::new()
                .name("route-annotate".to_owned())
                .spawn(move || stage.run())?,
        );
        self.bucketer.start()?;
        info!("pipeline started");
        Ok(())
    }

    /// Waits until the input queue terminates and every flow has been forwarded.
    pub fn join(&mut self) {
        self.bucketer.join();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.running.store(false, Ordering::Relaxed);
        info!("pipeline finished");
    }

    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            warn!("pipeline already stopped, do nothing.");
            return;
        }
        info!("stopping pipeline");
        self.bucketer.stop();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        info!("stopped pipeline");
    }
}

struct AnnotateStage<C> {
    input: Receiver<Flow>,
    output: Sender<Flow>,
    annotator: Arc<RouteAnnotator<C>>,
    running: Arc<AtomicBool>,
    counter: Arc<AnnotateCounter>,
}

impl<C: RoutingInformation> AnnotateStage<C> {
    fn run(&mut self) {
        let rt = match Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                warn!("route annotate runtime creation failed: {}", e);
                return;
            }
        };
        while self.running.load(Ordering::Relaxed) {
            match self.input.recv(Some(QUEUE_READ_TIMEOUT)) {
                Ok(mut flow) => {
                    match rt.block_on(self.annotator.annotate(&mut flow)) {
                        Ok(_) => {
                            self.counter.annotated.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            debug!("annotate {} failed: {}", flow, e);
                            self.counter.annotate_failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    if !self.forward(flow) {
                        break;
                    }
                }
                Err(QueueError::Timeout) => continue,
                Err(_) => break,
            }
        }
        debug!("route annotate stage exited");
    }

    // Returns false when the stage should exit.
    fn forward(&self, mut flow: Flow) -> bool {
        loop {
            match self.output.send_timeout(flow, QUEUE_WRITE_TIMEOUT) {
                Ok(_) => return true,
                Err(QueueError::Full(f)) if self.running.load(Ordering::Relaxed) => flow = f,
                Err(QueueError::Full(_)) => {
                    self.counter.dropped.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                Err(_) => {
                    info!("route annotate output terminated");
                    return false;
                }
            }
        }
    }
}
