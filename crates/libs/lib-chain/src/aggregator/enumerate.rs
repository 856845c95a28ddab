//! Enumeration of on-chain collections that expose only per-item getters.

use crate::contracts::{CallError, CallResult};
use std::future::Future;
use tracing::{debug, warn};

/// Consecutive non-range faults after which an index-array walk gives up.
pub const MAX_CONSECUTIVE_FAULTS: usize = 3;

/// Walk a 0-based indexed getter until it reports [`CallError::OutOfRange`].
///
/// Any other fault is logged and the index skipped. Items keep index order.
pub async fn enumerate_indexed<T, F, Fut>(collection: &str, mut fetch: F) -> Vec<T>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = CallResult<T>>,
{
    let mut items = Vec::new();
    let mut consecutive_faults = 0;
    let mut index = 0u64;

    loop {
        match fetch(index).await {
            Ok(item) => {
                items.push(item);
                consecutive_faults = 0;
            }
            Err(CallError::OutOfRange) => break,
            Err(err) => {
                consecutive_faults += 1;
                warn!(collection, index, error = %err, "skipping unreadable entry");
                if consecutive_faults >= MAX_CONSECUTIVE_FAULTS {
                    warn!(collection, index, "too many consecutive faults, stopping enumeration");
                    break;
                }
            }
        }
        index += 1;
    }

    debug!(collection, count = items.len(), "enumerated");
    items
}

/// Walk a count-bounded getter over `1..=count`, skipping faulty items.
pub async fn enumerate_counted<T, F, Fut>(collection: &str, count: u64, mut fetch: F) -> Vec<T>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = CallResult<T>>,
{
    let mut items = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
    for index in 1..=count {
        match fetch(index).await {
            Ok(item) => items.push(item),
            Err(err) => warn!(collection, index, error = %err, "skipping unreadable entry"),
        }
    }
    debug!(collection, count = items.len(), "enumerated");
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(len: u64, faulty: &'static [u64]) -> impl FnMut(u64) -> std::future::Ready<CallResult<u64>> {
        move |index| {
            std::future::ready(if faulty.contains(&index) {
                Err(CallError::Transport("malformed".into()))
            } else if index < len {
                Ok(index * 10)
            } else {
                Err(CallError::OutOfRange)
            })
        }
    }

    #[tokio::test]
    async fn stops_at_first_out_of_range() {
        let items = enumerate_indexed("ids", source(4, &[])).await;
        assert_eq!(items, vec![0, 10, 20, 30]);
    }

    #[tokio::test]
    async fn empty_collection() {
        let items = enumerate_indexed("ids", source(0, &[])).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn skips_faulty_items_and_continues() {
        let items = enumerate_indexed("ids", source(5, &[1, 3])).await;
        assert_eq!(items, vec![0, 20, 40]);
    }

    #[tokio::test]
    async fn gives_up_after_consecutive_faults() {
        let mut calls = 0;
        let items = enumerate_indexed("ids", |_| {
            calls += 1;
            std::future::ready(Err::<u64, _>(CallError::Transport("node unreachable".into())))
        })
        .await;
        assert!(items.is_empty());
        assert_eq!(calls, MAX_CONSECUTIVE_FAULTS);
    }

    #[tokio::test]
    async fn counted_form_is_one_based_and_inclusive() {
        let mut seen = Vec::new();
        let items = enumerate_counted("projects", 3, |id| {
            seen.push(id);
            std::future::ready(if id == 2 {
                Err(CallError::Reverted("bad record".into()))
            } else {
                Ok(id)
            })
        })
        .await;
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(items, vec![1, 3]);
    }
}
