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

use std::sync::Weak;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CounterType {
    Counted,
    Gauged,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CounterValue {
    Signed(i64),
    Unsigned(u64),
}

pub type Counter = (&'static str, CounterType, CounterValue);

/// Counters owned by a long living component, read through a `Weak`.
pub trait RefCountable: Send + Sync {
    fn get_counters(&self) -> Vec<Counter>;
}

/// Counters owned by the reader, e.g. a queue stats handle.
pub trait OwnedCountable: Send + Sync {
    fn get_counters(&self) -> Vec<Counter>;
    fn closed(&self) -> bool;
}

pub enum Countable {
    Owned(Box<dyn OwnedCountable>),
    Ref(Weak<dyn RefCountable>),
}

impl Countable {
    pub fn get_counters(&self) -> Vec<Counter> {
        match self {
            Countable::Owned(c) => c.get_counters(),
            Countable::Ref(c) => c.upgrade().map(|c| c.get_counters()).unwrap_or_default(),
        }
    }

    pub fn closed(&self) -> bool {
        match self {
            Countable::Owned(c) => c.closed(),
            Countable::Ref(c) => c.strong_count() == 0,
        }
    }
}

/// Finds a counter by name, mostly useful for tests and debug dumps.
pub fn find(counters: &[Counter], name: &str) -> Option<CounterValue> {
    counters.iter().find(|c| c.0 == name).map(|c| c.2)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    use super::*;

    #[derive(Default)]
    struct Hits(AtomicU64);

    impl RefCountable for Hits {
        fn get_counters(&self) -> Vec<Counter> {
            vec![(
                "hits",
                CounterType::Counted,
                CounterValue::Unsigned(self.0.swap(0, Ordering::Relaxed)),
            )]
        }
    }

    #[test]
    fn ref_countable_closes_with_owner() {
        let hits = Arc::new(Hits::default());
        hits.0.fetch_add(3, Ordering::Relaxed);
        let countable = Countable::Ref(Arc::downgrade(&hits) as Weak<dyn RefCountable>);

        assert!(!countable.closed());
        assert_eq!(
            find(&countable.get_counters(), "hits"),
            Some(CounterValue::Unsigned(3))
        );
        // counted values are reset on read
        assert_eq!(
            find(&countable.get_counters(), "hits"),
            Some(CounterValue::Unsigned(0))
        );

        drop(hits);
        assert!(countable.closed());
        assert!(countable.get_counters().is_empty());
    }
}
