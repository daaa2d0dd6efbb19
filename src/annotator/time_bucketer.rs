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

use public::counter::{Counter, CounterType, CounterValue, RefCountable};
use public::queue::{Error as QueueError, Receiver, Sender};

use crate::common::Flow;
use crate::error::{Error, Result};

const QUEUE_READ_TIMEOUT: Duration = Duration::from_secs(1);
const QUEUE_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Rounds `timestamp` down to a multiple of `period`.
///
/// Negative timestamps floor toward negative infinity, so `bucket(-1, 60)`
/// is `-60`. `period` must be positive.
pub fn bucket(timestamp: i64, period: i64) -> i64 {
    timestamp.div_euclid(period) * period
}

#[derive(Default)]
pub struct TimeBucketerCounter {
    pub input: AtomicU64,
    pub output: AtomicU64,
    // records held by a worker when it was stopped
    pub dropped: AtomicU64,
}

impl RefCountable for TimeBucketerCounter {
    fn get_counters(&self) -> Vec<Counter> {
        vec![
            (
                "in",
                CounterType::Counted,
                CounterValue::Unsigned(self.input.swap(0, Ordering::Relaxed)),
            ),
            (
                "out",
                CounterType::Counted,
                CounterValue::Unsigned(self.output.swap(0, Ordering::Relaxed)),
            ),
            (
                "dropped",
                CounterType::Counted,
                CounterValue::Unsigned(self.dropped.swap(0, Ordering::Relaxed)),
            ),
        ]
    }
}

/// Rewrites the timestamp of every flow to the start of its aggregation
/// period, fanned out over `worker_count` threads.
///
/// Workers run until the input queue terminates, the output queue is gone
/// or `stop` is called. With one worker the output order is the input order.
/// A worker stopped while waiting on a full output queue drops the record
/// it holds.
pub struct TimeBucketer {
    id: usize,
    period: i64,
    debug: bool,
    worker_count: usize,

    // taken by start, workers own the queue ends afterwards
    queues: Option<(Receiver<Flow>, Sender<Flow>)>,
    thread_handles: Vec<JoinHandle<()>>,

    running: Arc<AtomicBool>,
    counter: Arc<TimeBucketerCounter>,
}

impl TimeBucketer {
    pub fn new(
        id: usize,
        input: Receiver<Flow>,
        output: Sender<Flow>,
        period: i64,
        debug: bool,
        worker_count: usize,
    ) -> Result<Self> {
        if period <= 0 {
            return Err(Error::InvalidPeriod(period));
        }
        if worker_count == 0 {
            return Err(Error::InvalidWorkerCount);
        }
        Ok(Self {
            id,
            period,
            debug,
            worker_count,
            queues: Some((input, output)),
            thread_handles: vec![],
            running: Arc::new(AtomicBool::new(false)),
            counter: Arc::new(TimeBucketerCounter::default()),
        })
    }

    pub fn counter(&self) -> Arc<TimeBucketerCounter> {
        self.counter.clone()
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::Relaxed) {
            warn!("time bucketer id: {} already started, do nothing.", self.id);
            return Ok(());
        }
        let Some((input, output)) = self.queues.take() else {
            warn!("time bucketer id: {} cannot be restarted.", self.id);
            self.running.store(false, Ordering::Relaxed);
            return Ok(());
        };

        for index in 0..self.worker_count {
            let mut worker = Worker {
                id: self.id,
                index,
                input: input.clone(),
                output: output.clone(),
                period: self.period,
                debug: self.debug,
                running: self.running.clone(),
                counter: self.counter.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("time-bucketer-{}", index))
                .spawn(move || worker.run())?;
            self.thread_handles.push(handle);
        }
        info!(
            "time bucketer id: {} started with {} workers, period {}s",
            self.id, self.worker_count, self.period
        );
        Ok(())
    }

    /// Waits for all workers to exit after the input queue terminates.
    pub fn join(&mut self) {
        for handle in self.thread_handles.drain(..) {
            let _ = handle.join();
        }
        self.running.store(false, Ordering::Relaxed);
        info!("time bucketer id: {} finished", self.id);
    }

    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            warn!("time bucketer id: {} already stopped, do nothing.", self.id);
            return;
        }
        info!("stopping time bucketer: {}", self.id);
        for handle in self.thread_handles.drain(..) {
            let _ = handle.join();
        }
        info!("stopped time bucketer: {}", self.id);
    }
}

struct Worker {
    id: usize,
    index: usize,
    input: Receiver<Flow>,
    output: Sender<Flow>,
    period: i64,
    debug: bool,
    running: Arc<AtomicBool>,
    counter: Arc<TimeBucketerCounter>,
}

impl Worker {
    fn run(&mut self) {
        while self.running.load(Ordering::Relaxed) {
            match self.input.recv(Some(QUEUE_READ_TIMEOUT)) {
                Ok(mut flow) => {
                    self.counter.input.fetch_add(1, Ordering::Relaxed);
                    flow.timestamp = bucket(flow.timestamp, self.period);
                    if self.debug {
                        debug!("time bucketer {}/{}: {}", self.id, self.index, flow);
                    }
                    if !self.forward(flow) {
                        break;
                    }
                }
                Err(QueueError::Timeout) => continue,
                Err(_) => break,
            }
        }
        debug!("time bucketer {}/{} exited", self.id, self.index);
    }

    // Returns false when the worker should exit.
    fn forward(&self, mut flow: Flow) -> bool {
        loop {
            match self.output.send_timeout(flow, QUEUE_WRITE_TIMEOUT) {
                Ok(_) => {
                    self.counter.output.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(QueueError::Full(f)) if self.running.load(Ordering::Relaxed) => flow = f,
                Err(QueueError::Full(_)) => {
                    self.counter.dropped.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                Err(_) => {
                    info!(
                        "time bucketer {}/{} output terminated",
                        self.id, self.index
                    );
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use public::counter::find;
    use public::queue;

    use super::*;

    fn flow(id: u64, timestamp: i64) -> Flow {
        Flow {
            packets: id,
            timestamp,
            ..Default::default()
        }
    }

    fn drain(rx: &Receiver<Flow>) -> Vec<Flow> {
        let mut flows = vec![];
        loop {
            match rx.recv(Some(Duration::from_secs(5))) {
                Ok(f) => flows.push(f),
                Err(QueueError::Terminated(_)) => return flows,
                Err(e) => panic!("bucketer output stalled: {}", e),
            }
        }
    }

    #[test]
    fn bucket_floors_to_period() {
        assert_eq!(bucket(1000, 60), 960);
        assert_eq!(bucket(1234, 60), 1200);
        assert_eq!(bucket(0, 60), 0);
        assert_eq!(bucket(59, 60), 0);
        assert_eq!(bucket(60, 60), 60);
        assert_eq!(bucket(1234, 1), 1234);
        for ts in [0, 1, 59, 60, 61, 3599, 1_700_000_123] {
            let b = bucket(ts, 60);
            assert_eq!(b % 60, 0);
            assert!(b <= ts && ts < b + 60);
            assert_eq!(bucket(b, 60), b);
        }
    }

    #[test]
    fn bucket_negative_floors_down() {
        assert_eq!(bucket(-1, 60), -60);
        assert_eq!(bucket(-60, 60), -60);
        assert_eq!(bucket(-61, 60), -120);
    }

    #[test]
    fn invalid_arguments() {
        let (tx, rx, _) = queue::bounded(1);
        assert!(matches!(
            TimeBucketer::new(0, rx.clone(), tx.clone(), 0, false, 1),
            Err(Error::InvalidPeriod(0))
        ));
        assert!(matches!(
            TimeBucketer::new(0, rx, tx, 60, false, 0),
            Err(Error::InvalidWorkerCount)
        ));
    }

    #[test]
    fn single_worker_keeps_order() {
        let (in_tx, in_rx, _) = queue::bounded(16);
        let (out_tx, out_rx, _) = queue::bounded(16);
        let mut bucketer = TimeBucketer::new(0, in_rx, out_tx, 60, true, 1).unwrap();
        let counter = bucketer.counter();
        bucketer.start().unwrap();

        let producer = thread::spawn(move || {
            for i in 0..100 {
                in_tx.send(flow(i, 1000 + i as i64 * 7)).unwrap();
            }
        });
        let flows = drain(&out_rx);
        producer.join().unwrap();
        bucketer.join();

        assert_eq!(flows.len(), 100);
        for (i, f) in flows.iter().enumerate() {
            assert_eq!(f.packets, i as u64);
            assert_eq!(f.timestamp, bucket(1000 + i as i64 * 7, 60));
        }
        let counters = counter.get_counters();
        assert_eq!(find(&counters, "in"), Some(CounterValue::Unsigned(100)));
        assert_eq!(find(&counters, "out"), Some(CounterValue::Unsigned(100)));
    }

    #[test]
    fn workers_forward_every_record_once() {
        const PRODUCERS: u64 = 4;
        const RECORDS: u64 = 500;

        let (in_tx, in_rx, _) = queue::bounded(64);
        let (out_tx, out_rx, _) = queue::bounded(64);
        let mut bucketer = TimeBucketer::new(1, in_rx, out_tx, 60, false, 4).unwrap();
        bucketer.start().unwrap();

        let producers = (0..PRODUCERS)
            .map(|p| {
                let tx = in_tx.clone();
                thread::spawn(move || {
                    for i in 0..RECORDS {
                        tx.send(flow(p * RECORDS + i, 1234)).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        drop(in_tx);

        let flows = drain(&out_rx);
        for p in producers {
            p.join().unwrap();
        }
        bucketer.join();

        let total = PRODUCERS * RECORDS;
        assert_eq!(flows.len() as u64, total);
        let ids = flows.iter().map(|f| f.packets).collect::<HashSet<_>>();
        assert_eq!(ids.len() as u64, total);
        assert_eq!(ids.iter().sum::<u64>(), total * (total - 1) / 2);
        assert!(flows.iter().all(|f| f.timestamp == 1200));
    }

    #[test]
    fn stop_while_input_open() {
        let (in_tx, in_rx, _) = queue::bounded(4);
        let (out_tx, out_rx, _) = queue::bounded(4);
        let mut bucketer = TimeBucketer::new(2, in_rx, out_tx, 60, false, 2).unwrap();
        bucketer.start().unwrap();
        in_tx.send(flow(0, 61)).unwrap();
        assert_eq!(
            out_rx.recv(Some(Duration::from_secs(5))).unwrap().timestamp,
            60
        );
        bucketer.stop();
        // workers dropped their output ends
        assert!(matches!(
            out_rx.recv(Some(Duration::from_secs(1))),
            Err(QueueError::Terminated(_))
        ));
    }

    #[test]
    fn stop_with_full_output() {
        let (in_tx, in_rx, _) = queue::bounded(4);
        // nobody reads the output
        let (out_tx, _out_rx, _) = queue::bounded(1);
        let mut bucketer = TimeBucketer::new(3, in_rx, out_tx, 60, false, 1).unwrap();
        let counter = bucketer.counter();
        bucketer.start().unwrap();
        for i in 0..3 {
            in_tx.send(flow(i, 1000)).unwrap();
        }
        // the first record fills the output, the worker blocks on the second
        thread::sleep(Duration::from_millis(500));

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let stopper = thread::spawn(move || {
            bucketer.stop();
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        stopper.join().unwrap();

        let counters = counter.get_counters();
        assert_eq!(find(&counters, "in"), Some(CounterValue::Unsigned(2)));
        assert_eq!(find(&counters, "out"), Some(CounterValue::Unsigned(1)));
        assert_eq!(find(&counters, "dropped"), Some(CounterValue::Unsigned(1)));
    }
}
