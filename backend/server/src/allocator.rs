//! # Id allocation
//!
//! Strategies, picked with `ID_STRATEGY`:
//!
//! - **counter** (default): read the counter, add one, write it back. Not atomic, two
//!   concurrent creates can read the same value and hand out the same id.
//! - **scan**: one more than the largest id among the records. Keeps no counter.
//! - **transactional**: the counter read with its version and written with `set_if`,
//!   then every id of the block claimed with a placeholder record. A conflict on either
//!   step starts over from the counter.
//!
//! After a delete the counter is recomputed from the remaining records, so the next
//! id reuses numbers freed at the top of the range. Placeholders count as records, so a
//! transactional id handed out but not yet written is never freed this way.
use std::str::FromStr;

use serde_json::json;
use store::{RecordStore, StoreError};
use tracing::debug;

use crate::namespace::{Namespace, as_id};

const MAX_ATTEMPTS: usize = 25;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdStrategy {
    #[default]
    Counter,
    Scan,
    Transactional,
}

impl IdStrategy {
    pub fn tracks_counter(self) -> bool {
        self != Self::Scan
    }
}

impl FromStr for IdStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(Self::Counter),
            "scan" => Ok(Self::Scan),
            "transactional" => Ok(Self::Transactional),
            other => Err(format!("unknown id strategy {other}")),
        }
    }
}

fn first_after(counter: Option<&serde_json::Value>) -> u64 {
    counter.and_then(as_id).map_or(1, |last| last + 1)
}

/// Reserves `count` consecutive ids and returns the first one.
pub async fn allocate(
    store: &dyn RecordStore,
    namespace: &Namespace,
    strategy: IdStrategy,
    count: u64,
) -> Result<u64, StoreError> {
    let span = count.max(1) - 1;
    let counter = namespace.counter_path();

    match strategy {
        IdStrategy::Counter => {
            let first = first_after(store.get(&counter).await?.as_ref());
            store.set(&counter, &json!(first + span)).await?;

            Ok(first)
        }
        IdStrategy::Scan => Ok(max_id(store, namespace).await? + 1),
        IdStrategy::Transactional => {
            for attempt in 1..=MAX_ATTEMPTS {
                let read = store.get_versioned(&counter).await?;
                let first = first_after(read.value.as_ref());

                if store.set_if(&counter, &json!(first + span), &read.version).await?
                    && claim_block(store, namespace, first, first + span).await?
                {
                    return Ok(first);
                }

                debug!(attempt, "Allocation on {} conflicted, retrying", namespace.counter_key());
            }

            Err(StoreError::Contention(MAX_ATTEMPTS))
        }
    }
}

/// Claims every id in `first..=last`, releasing what was taken if any slot is occupied.
async fn claim_block(
    store: &dyn RecordStore,
    namespace: &Namespace,
    first: u64,
    last: u64,
) -> Result<bool, StoreError> {
    let mut claimed = Vec::new();

    for id in first..=last {
        match namespace.claim(store, id).await? {
            Some(path) => claimed.push(path),
            None => {
                debug!(id, "Slot already taken");
                for path in &claimed {
                    store.delete(path).await?;
                }
                return Ok(false);
            }
        }
    }

    Ok(true)
}

/// Largest id among the records, 0 when there are none.
pub async fn max_id(store: &dyn RecordStore, namespace: &Namespace) -> Result<u64, StoreError> {
    Ok(namespace.ids(store).await?.into_iter().max().unwrap_or(0))
}

/// Resets the counter to the largest remaining id and returns it.
pub async fn reconcile_counter(
    store: &dyn RecordStore,
    namespace: &Namespace,
    strategy: IdStrategy,
) -> Result<u64, StoreError> {
    let counter = namespace.counter_path();

    if strategy != IdStrategy::Transactional {
        let max = max_id(store, namespace).await?;
        store.set(&counter, &json!(max)).await?;
        return Ok(max);
    }

    for _ in 0..MAX_ATTEMPTS {
        let read = store.get_versioned(&counter).await?;
        let max = max_id(store, namespace).await?;

        if store.set_if(&counter, &json!(max), &read.version).await? {
            return Ok(max);
        }
    }

    Err(StoreError::Contention(MAX_ATTEMPTS))
}
