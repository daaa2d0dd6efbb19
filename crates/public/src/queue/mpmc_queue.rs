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

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use crossbeam_channel::{
    Receiver as CReceiver, RecvTimeoutError, SendTimeoutError, Sender as CSender,
};

use super::Error;
use crate::counter as stats;

// Blocking MPMC queue. Senders block while the queue is full, so a slow
// consumer stalls its producers instead of losing messages.
pub fn bounded<T>(size: usize) -> (Sender<T>, Receiver<T>, StatsHandle<T>) {
    let (s, r) = crossbeam_channel::bounded(size);
    let shared = Arc::new(Shared::default());
    (
        Sender {
            inner: s,
            shared: shared.clone(),
        },
        Receiver {
            inner: r,
            shared: shared.clone(),
        },
        StatsHandle {
            shared,
            _marker: Default::default(),
        },
    )
}

#[derive(Debug, Default)]
pub struct Counter {
    pub input: AtomicU64,
    pub output: AtomicU64,
    pub pending: AtomicU64,
}

#[derive(Debug, Default)]
struct Shared {
    counter: Counter,
    terminated: AtomicBool,
}

pub struct Sender<T> {
    inner: CSender<T>,
    shared: Arc<Shared>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<T> Sender<T> {
    pub fn terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::Relaxed)
    }

    // Fails only when every receiver is gone, handing the message back.
    pub fn send(&self, msg: T) -> Result<(), Error<T>> {
        let counter = &self.shared.counter;
        // counted before the message becomes visible to receivers
        counter.pending.fetch_add(1, Ordering::Relaxed);
        match self.inner.send(msg) {
            Ok(_) => {
                counter.input.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                counter.pending.fetch_sub(1, Ordering::Relaxed);
                self.shared.terminated.store(true, Ordering::Release);
                Err(Error::Terminated(Some(e.into_inner())))
            }
        }
    }

    // Like `send`, but gives up once the queue stays full for `timeout` and
    // hands the message back in `Error::Full`.
    pub fn send_timeout(&self, msg: T, timeout: Duration) -> Result<(), Error<T>> {
        let counter = &self.shared.counter;
        counter.pending.fetch_add(1, Ordering::Relaxed);
        match self.inner.send_timeout(msg, timeout) {
            Ok(_) => {
                counter.input.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(SendTimeoutError::Timeout(msg)) => {
                counter.pending.fetch_sub(1, Ordering::Relaxed);
                Err(Error::Full(msg))
            }
            Err(SendTimeoutError::Disconnected(msg)) => {
                counter.pending.fetch_sub(1, Ordering::Relaxed);
                self.shared.terminated.store(true, Ordering::Release);
                Err(Error::Terminated(Some(msg)))
            }
        }
    }

    // This method clears the Vec on success; on failure the undelivered
    // messages stay in it
    pub fn send_all(&self, msgs: &mut Vec<T>) -> Result<(), Error<T>> {
        let mut pending = std::mem::take(msgs).into_iter();
        while let Some(msg) = pending.next() {
            if let Err(Error::Terminated(msg)) = self.send(msg) {
                msgs.extend(msg);
                msgs.extend(pending);
                return Err(Error::Terminated(None));
            }
        }
        Ok(())
    }
}

pub struct Receiver<T> {
    inner: CReceiver<T>,
    shared: Arc<Shared>,
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<T> Receiver<T> {
    pub fn terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::Relaxed)
    }

    // `Terminated` is returned only after all senders are dropped and every
    // queued message has been received.
    pub fn recv(&self, timeout: Option<Duration>) -> Result<T, Error<T>> {
        let res = match timeout {
            Some(t) => self.inner.recv_timeout(t),
            None => self
                .inner
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        match res {
            Ok(v) => {
                self.shared.counter.output.fetch_add(1, Ordering::Relaxed);
                self.shared.counter.pending.fetch_sub(1, Ordering::Relaxed);
                Ok(v)
            }
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                self.shared.terminated.store(true, Ordering::Release);
                Err(Error::Terminated(None))
            }
        }
    }

    pub fn recv_n(&self, n: usize, timeout: Option<Duration>) -> Result<Vec<T>, Error<T>> {
        assert!(n > 0);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.recv(timeout) {
                Ok(v) => out.push(v),
                Err(Error::Timeout) if out.is_empty() => return Err(Error::Timeout),
                Err(Error::Timeout) => break,
                Err(Error::Terminated(_)) if !out.is_empty() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

pub struct StatsHandle<T> {
    shared: Arc<Shared>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> StatsHandle<T> {
    pub fn counters(&self) -> Vec<stats::Counter> {
        let counter = &self.shared.counter;
        vec![
            (
                "in",
                stats::CounterType::Counted,
                stats::CounterValue::Unsigned(counter.input.swap(0, Ordering::Relaxed)),
            ),
            (
                "out",
                stats::CounterType::Counted,
                stats::CounterValue::Unsigned(counter.output.swap(0, Ordering::Relaxed)),
            ),
            (
                "pending",
                stats::CounterType::Gauged,
                stats::CounterValue::Unsigned(counter.pending.load(Ordering::Relaxed)),
            ),
        ]
    }
}

impl<T> stats::OwnedCountable for StatsHandle<T> {
    fn get_counters(&self) -> Vec<stats::Counter> {
        self.counters()
    }

    fn closed(&self) -> bool {
        self.shared.terminated.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::counter::{find, CounterValue};

    #[test]
    fn terminated_after_drain() {
        let (s, r, _) = bounded(4);
        s.send(1).unwrap();
        s.send(2).unwrap();
        drop(s);

        assert_eq!(r.recv(None), Ok(1));
        assert_eq!(r.recv(Some(Duration::from_millis(10))), Ok(2));
        assert_eq!(r.recv(None), Err(Error::Terminated(None)));
        assert!(r.terminated());
    }

    #[test]
    fn send_to_dropped_receiver_returns_message() {
        let (s, r, _) = bounded(4);
        drop(r);
        assert_eq!(s.send(7), Err(Error::Terminated(Some(7))));

        let mut batch = vec![1, 2, 3];
        assert_eq!(s.send_all(&mut batch), Err(Error::Terminated(None)));
        assert_eq!(batch, vec![1, 2, 3]);
    }

    #[test]
    fn recv_timeout() {
        let (_s, r, _) = bounded::<u32>(1);
        assert_eq!(
            r.recv(Some(Duration::from_millis(10))),
            Err(Error::Timeout)
        );
    }

    #[test]
    fn full_queue_blocks_sender() {
        let (s, r, stats) = bounded(1);
        s.send(0u32).unwrap();
        let handle = thread::spawn(move || {
            // blocks until the consumer below makes room
            s.send(1).unwrap();
        });
        thread::sleep(Duration::from_millis(50));
        assert_eq!(r.len(), 1);
        assert_eq!(r.recv(None), Ok(0));
        handle.join().unwrap();
        assert_eq!(r.recv(None), Ok(1));

        let counters = stats.counters();
        assert_eq!(find(&counters, "in"), Some(CounterValue::Unsigned(2)));
        assert_eq!(find(&counters, "out"), Some(CounterValue::Unsigned(2)));
        assert_eq!(find(&counters, "pending"), Some(CounterValue::Unsigned(0)));
    }

    #[test]
    fn send_timeout_on_full_queue() {
        let (s, r, stats) = bounded(1);
        s.send_timeout(0u32, Duration::from_millis(10)).unwrap();
        assert_eq!(s.send_timeout(1, Duration::from_millis(10)), Err(Error::Full(1)));
        assert!(!s.terminated());
        assert_eq!(r.recv(None), Ok(0));
        s.send_timeout(2, Duration::from_millis(10)).unwrap();
        assert_eq!(r.recv(None), Ok(2));

        let counters = stats.counters();
        assert_eq!(find(&counters, "in"), Some(CounterValue::Unsigned(2)));
        assert_eq!(find(&counters, "pending"), Some(CounterValue::Unsigned(0)));

        drop(r);
        assert_eq!(
            s.send_timeout(3, Duration::from_millis(10)),
            Err(Error::Terminated(Some(3)))
        );
        assert!(s.terminated());
    }

    #[test]
    fn recv_n_stops_at_termination() {
        let (s, r, _) = bounded(8);
        let mut batch = vec![1, 2, 3];
        s.send_all(&mut batch).unwrap();
        assert!(batch.is_empty());
        drop(s);
        assert_eq!(r.recv_n(5, None), Ok(vec![1, 2, 3]));
        assert_eq!(r.recv_n(5, None), Err(Error::Terminated(None)));
    }
}
