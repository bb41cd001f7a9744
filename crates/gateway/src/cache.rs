//! Request correlation cache
//!
//! Maps a correlation key to the callback of a pending user request and a
//! handler-defined accumulator. Node responses are folded into the
//! accumulator one at a time; the first terminal result (aggregation or
//! timeout) is written to the callback and the entry is removed. Each
//! callback therefore receives exactly one payload.
//!
//! Locking: the table lock only guards insert/lookup/remove. Aggregation runs
//! under the entry's own lock, so different keys never block each other.
//! Lock order is entry, then table.

use crate::error::CacheError;
use dongate_core::{ErrorCode, UserCallbackPayload};
use dongate_ports::Callback;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Result of folding one response into an accumulator
#[derive(Debug)]
pub enum Aggregation<S> {
    /// Done: write this payload and drop the entry
    Final(UserCallbackPayload),
    /// Not yet: keep the entry with the new accumulator
    Pending(S),
}

struct EntryState<S> {
    /// `None` once the entry has been finalized
    callback: Option<Callback>,
    accumulator: S,
}

struct PendingRequest<S> {
    key: String,
    created_at: Instant,
    state: Mutex<EntryState<S>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<S> PendingRequest<S> {
    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
    }
}

type Table<S> = Arc<Mutex<HashMap<String, Arc<PendingRequest<S>>>>>;

/// Keyed table of pending requests with timeout eviction and a capacity bound
pub struct RequestCache<S> {
    timeout: Duration,
    max_pending: usize,
    entries: Table<S>,
}

impl<S: Send + 'static> RequestCache<S> {
    pub fn new(timeout: Duration, max_pending: usize) -> Self {
        Self {
            timeout,
            max_pending,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Admit a request. Starts its timeout timer; must be called inside a tokio runtime.
    pub fn new_request(
        &self,
        key: &str,
        callback: Callback,
        initial: S,
    ) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Err(CacheError::DuplicateKey(key.to_string()));
        }
        if entries.len() >= self.max_pending {
            return Err(CacheError::Capacity(self.max_pending));
        }

        let entry = Arc::new(PendingRequest {
            key: key.to_string(),
            created_at: Instant::now(),
            state: Mutex::new(EntryState {
                callback: Some(callback),
                accumulator: initial,
            }),
            timer: Mutex::new(None),
        });

        let deadline = entry.created_at + self.timeout;
        let table = Arc::clone(&self.entries);
        let timed = Arc::clone(&entry);
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            expire(&table, &timed);
        });
        *entry.timer.lock() = Some(timer);

        entries.insert(key.to_string(), entry);
        debug!("Pending request {} admitted ({} pending)", key, entries.len());
        Ok(())
    }

    /// Fold one response into the entry for `key`.
    ///
    /// Unknown or already finalized keys are a silent no-op. An aggregation
    /// error leaves the entry untouched and is returned to the caller.
    pub fn process_response<E, F>(&self, key: &str, aggregate: F) -> Result<(), E>
    where
        F: FnOnce(&S) -> Result<Aggregation<S>, E>,
    {
        let entry = match self.entries.lock().get(key) {
            Some(entry) => Arc::clone(entry),
            None => {
                debug!("No pending request for {}, dropping response", key);
                return Ok(());
            }
        };

        let mut state = entry.state.lock();
        if state.callback.is_none() {
            return Ok(());
        }

        match aggregate(&state.accumulator)? {
            Aggregation::Pending(next) => {
                state.accumulator = next;
            }
            Aggregation::Final(payload) => {
                let callback = state.callback.take();
                remove_entry(&self.entries, &entry);
                entry.cancel_timer();
                if let Some(callback) = callback {
                    if callback.send(payload).is_err() {
                        debug!("Caller for {} is gone, response discarded", key);
                    }
                }
                debug!(
                    "Pending request {} finalized after {:?}",
                    key,
                    entry.created_at.elapsed()
                );
            }
        }
        Ok(())
    }

    /// Drop a pending entry without writing to its callback
    pub fn remove(&self, key: &str) -> bool {
        let entry = self.entries.lock().remove(key);
        match entry {
            Some(entry) => {
                entry.cancel_timer();
                entry.state.lock().callback.take();
                true
            }
            None => false,
        }
    }

    /// Answer every pending request with `error_code` and empty the table
    pub fn abort_all(&self, error_code: ErrorCode, message: &str) {
        let drained: Vec<_> = self.entries.lock().drain().map(|(_, e)| e).collect();
        for entry in drained {
            entry.cancel_timer();
            let callback = entry.state.lock().callback.take();
            if let Some(callback) = callback {
                let _ = callback.send(UserCallbackPayload::error(&entry.key, error_code, message));
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }
}

impl<S> Drop for RequestCache<S> {
    fn drop(&mut self) {
        for entry in self.entries.lock().values() {
            entry.cancel_timer();
        }
    }
}

fn expire<S>(table: &Table<S>, entry: &Arc<PendingRequest<S>>) {
    let mut state = entry.state.lock();
    let Some(callback) = state.callback.take() else {
        return;
    };
    remove_entry(table, entry);
    drop(state);

    warn!(
        "Request {} timed out after {:?}",
        entry.key,
        entry.created_at.elapsed()
    );
    let _ = callback.send(UserCallbackPayload::timeout(&entry.key));
}

/// Remove `entry` from the table unless the key was reused by a newer entry
fn remove_entry<S>(table: &Table<S>, entry: &Arc<PendingRequest<S>>) {
    let mut entries = table.lock();
    if let Some(current) = entries.get(&entry.key) {
        if Arc::ptr_eq(current, entry) {
            entries.remove(&entry.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dongate_core::codec::decode_response;
    use dongate_ports::callback_channel;

    fn counting(target: u32, key: &str) -> impl FnOnce(&u32) -> Result<Aggregation<u32>, String> {
        let key = key.to_string();
        move |count: &u32| {
            let count = count + 1;
            if count >= target {
                let raw = format!(r#"{{"jsonrpc":"2.0","id":"{}","result":{}}}"#, key, count);
                Ok(Aggregation::Final(UserCallbackPayload::success(raw.into_bytes())))
            } else {
                Ok(Aggregation::Pending(count))
            }
        }
    }

    #[tokio::test]
    async fn test_finalizes_at_third_response() {
        let cache = RequestCache::new(Duration::from_secs(10), 10);
        let (tx, mut rx) = callback_channel();
        cache.new_request("abc", tx, 0u32).unwrap();

        cache.process_response("abc", counting(3, "abc")).unwrap();
        cache.process_response("abc", counting(3, "abc")).unwrap();
        assert!(rx.try_recv().is_err());
        assert!(cache.contains("abc"));

        cache.process_response("abc", counting(3, "abc")).unwrap();
        let payload = rx.try_recv().unwrap();
        assert_eq!(payload.error_code, ErrorCode::NoError);
        let resp = decode_response(&payload.raw_response).unwrap();
        assert_eq!(resp.result, Some(serde_json::json!(3)));
        assert!(!cache.contains("abc"));

        // Late response
        cache.process_response("abc", counting(3, "abc")).unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_key_is_noop() {
        let cache: RequestCache<u32> = RequestCache::new(Duration::from_secs(1), 1);
        let called = std::cell::Cell::new(false);
        let result: Result<(), String> = cache.process_response("missing", |_| {
            called.set(true);
            Ok(Aggregation::Pending(0))
        });
        assert!(result.is_ok());
        assert!(!called.get());
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let cache = RequestCache::new(Duration::from_secs(10), 3);
        let mut receivers = Vec::new();
        for i in 0..3 {
            let (tx, rx) = callback_channel();
            cache.new_request(&format!("k{}", i), tx, ()).unwrap();
            receivers.push(rx);
        }

        let (tx, _rx) = callback_channel();
        assert_eq!(cache.new_request("k3", tx, ()), Err(CacheError::Capacity(3)));
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_key() {
        let cache = RequestCache::new(Duration::from_secs(10), 3);
        let (tx1, _rx1) = callback_channel();
        let (tx2, _rx2) = callback_channel();
        cache.new_request("k", tx1, ()).unwrap();
        assert_eq!(
            cache.new_request("k", tx2, ()),
            Err(CacheError::DuplicateKey("k".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_eviction() {
        let cache = RequestCache::new(Duration::from_millis(100), 10);
        let (tx, rx) = callback_channel();
        cache.new_request("slow", tx, 0u32).unwrap();

        let started = Instant::now();
        let payload = rx.await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(payload.error_code, ErrorCode::RequestTimeoutError);
        assert_eq!(decode_response(&payload.raw_response).unwrap().id, "slow");
        assert!(cache.is_empty());

        // Responses after the timeout are ignored
        cache.process_response("slow", counting(1, "slow")).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalize_cancels_timeout() {
        let cache = RequestCache::new(Duration::from_millis(100), 10);
        let (tx, mut rx) = callback_channel();
        cache.new_request("fast", tx, 0u32).unwrap();
        cache.process_response("fast", counting(1, "fast")).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rx.try_recv().unwrap().error_code, ErrorCode::NoError);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_aggregation_error_keeps_entry() {
        let cache = RequestCache::new(Duration::from_secs(10), 10);
        let (tx, mut rx) = callback_channel();
        cache.new_request("k", tx, 5u32).unwrap();

        let result = cache.process_response("k", |_: &u32| Err("bad response".to_string()));
        assert_eq!(result, Err("bad response".to_string()));
        assert!(cache.contains("k"));

        // Accumulator unchanged, a later response can still finalize
        cache
            .process_response("k", |count: &u32| -> Result<_, String> {
                assert_eq!(*count, 5);
                Ok(Aggregation::Final(UserCallbackPayload::success(b"{}".to_vec())))
            })
            .unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_skips_callback_and_timer() {
        let cache = RequestCache::new(Duration::from_millis(50), 10);
        let (tx, rx) = callback_channel();
        cache.new_request("k", tx, ()).unwrap();

        assert!(cache.remove("k"));
        assert!(!cache.remove("k"));
        // Sender dropped without a write
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_abort_all() {
        let cache = RequestCache::new(Duration::from_secs(10), 10);
        let (tx1, rx1) = callback_channel();
        let (tx2, rx2) = callback_channel();
        cache.new_request("a", tx1, ()).unwrap();
        cache.new_request("b", tx2, ()).unwrap();

        cache.abort_all(ErrorCode::FatalError, "shutting down");
        assert!(cache.is_empty());
        assert_eq!(rx1.await.unwrap().error_code, ErrorCode::FatalError);
        assert_eq!(rx2.await.unwrap().error_code, ErrorCode::FatalError);
    }
}
