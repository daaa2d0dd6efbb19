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

use std::fmt::Write;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use parking_lot::{Condvar, Mutex};

use public::counter::{Countable, CounterValue};

struct Source {
    module: &'static str,
    countable: Countable,
}

/// Periodically logs the counters of registered components.
///
/// Closed countables are dropped on the next tick and counters that read
/// zero are left out of the log line.
pub struct Collector {
    interval: Duration,
    sources: Arc<Mutex<Vec<Source>>>,
    running: Arc<(Mutex<bool>, Condvar)>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Collector {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            sources: Default::default(),
            running: Default::default(),
            thread: Mutex::new(None),
        }
    }

    pub fn register_countable(&self, module: &'static str, countable: Countable) {
        let mut sources = self.sources.lock();
        sources.retain(|s| !s.countable.closed());
        if sources.iter().any(|s| s.module == module) {
            warn!("found duplicated counter source {}, replacing it", module);
            sources.retain(|s| s.module != module);
        }
        sources.push(Source { module, countable });
    }

    pub fn start(&self) -> std::io::Result<()> {
        {
            let mut started = self.running.0.lock();
            if *started {
                return Ok(());
            }
            *started = true;
        }

        let running = self.running.clone();
        let sources = self.sources.clone();
        let interval = self.interval;
        *self.thread.lock() = Some(
            thread::Builder::new()
                .name("stats-collector".to_owned())
                .spawn(move || loop {
                    let (running, timer) = &*running;
                    {
                        let mut running = running.lock();
                        if !*running {
                            break;
                        }
                        timer.wait_for(&mut running, interval);
                        if !*running {
                            break;
                        }
                    }
                    for line in collect(&sources) {
                        info!("{}", line);
                    }
                })?,
        );
        Ok(())
    }

    pub fn stop(&self) {
        {
            let (running, timer) = &*self.running;
            *running.lock() = false;
            timer.notify_all();
        }
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

// One line per source with at least one non-zero counter.
fn collect(sources: &Mutex<Vec<Source>>) -> Vec<String> {
    let mut sources = sources.lock();
    sources.retain(|s| !s.countable.closed());
    let mut lines = vec![];
    for source in sources.iter() {
        let mut line = String::new();
        for (name, _, value) in source.countable.get_counters() {
            let _ = match value {
                CounterValue::Signed(0) | CounterValue::Unsigned(0) => continue,
                CounterValue::Signed(v) => write!(line, " {}={}", name, v),
                CounterValue::Unsigned(v) => write!(line, " {}={}", name, v),
            };
        }
        if !line.is_empty() {
            lines.push(format!("stats {}:{}", source.module, line));
        }
    }
    lines
}
