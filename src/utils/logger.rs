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

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use flexi_logger::{
    colored_opt_format, writers::LogWriter, Age, Cleanup, Criterion, DeferredNow, Duplicate,
    FileSpec, FlexiLoggerError, Level, Logger, LoggerHandle, Naming, Record,
};

use public::counter::{Counter as StatsCounter, CounterType, CounterValue, OwnedCountable};

use crate::config::Config;

const DEFAULT_LOG_RETENTION: usize = 7;

#[derive(Default)]
struct Counter {
    error: AtomicU64,
    warning: AtomicU64,
}

// A writer calculating log count by level without actually writing log
pub struct LogLevelWriter(Arc<Counter>);

impl LogLevelWriter {
    pub fn new() -> (Self, LogLevelCounter) {
        let c = Arc::new(Counter::default());
        (Self(c.clone()), LogLevelCounter(Arc::downgrade(&c)))
    }
}

impl LogWriter for LogLevelWriter {
    fn write(&self, _: &mut DeferredNow, record: &Record<'_>) -> io::Result<()> {
        match record.level() {
            Level::Error => &self.0.error,
            Level::Warn => &self.0.warning,
            _ => return Ok(()),
        }
        .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Error and warning counts, e.g. failed interface renews.
pub struct LogLevelCounter(Weak<Counter>);

impl OwnedCountable for LogLevelCounter {
    fn get_counters(&self) -> Vec<StatsCounter> {
        match self.0.upgrade() {
            Some(counters) => vec![
                (
                    "error",
                    CounterType::Counted,
                    CounterValue::Unsigned(counters.error.swap(0, Ordering::Relaxed)),
                ),
                (
                    "warning",
                    CounterType::Counted,
                    CounterValue::Unsigned(counters.warning.swap(0, Ordering::Relaxed)),
                ),
            ],
            None => vec![],
        }
    }

    fn closed(&self) -> bool {
        self.0.strong_count() == 0
    }
}

fn log_dir_writable(log_file: &str) -> bool {
    let Some(base_path) = Path::new(log_file).parent() else {
        return false;
    };
    if base_path.as_os_str().is_empty() {
        return true;
    }
    if base_path.exists() {
        base_path
            .metadata()
            .ok()
            .map(|meta| !meta.permissions().readonly())
            .unwrap_or(false)
    } else {
        fs::create_dir_all(base_path).is_ok()
    }
}

/// Starts logging to `log-file` with daily rotation, duplicated to stderr.
/// Logs go to stderr only when `log-file` is empty or its folder is not writable.
pub fn init(config: &Config) -> Result<(LoggerHandle, LogLevelCounter), FlexiLoggerError> {
    let (log_level_writer, log_level_counter) = LogLevelWriter::new();
    let logger = Logger::try_with_env_or_str(&config.log_level)?.format(colored_opt_format);

    let logger = if !config.log_file.is_empty() && log_dir_writable(&config.log_file) {
        logger
            .log_to_file_and_writer(
                FileSpec::try_from(&config.log_file)?,
                Box::new(log_level_writer),
            )
            .rotate(
                Criterion::Age(Age::Day),
                Naming::Timestamps,
                Cleanup::KeepLogFiles(DEFAULT_LOG_RETENTION),
            )
            .create_symlink(&config.log_file)
            .append()
    } else {
        if !config.log_file.is_empty() {
            eprintln!(
                "Log file path '{}' access denied, logs will not be written to file",
                &config.log_file
            );
        }
        logger.log_to_writer(Box::new(log_level_writer))
    };
    let handle = logger.duplicate_to_stderr(Duplicate::All).start()?;
    Ok((handle, log_level_counter))
}
