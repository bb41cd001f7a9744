//! Concurrency test: exactly one callback write per admitted request
//!
//! Many tasks race to answer the same keys while short timeouts fire. Every
//! callback must receive exactly one payload and the table must end empty.

use dongate_core::{ErrorCode, UserCallbackPayload};
use dongate_gateway::{Aggregation, CacheError, RequestCache};
use dongate_ports::callback_channel;
use std::sync::Arc;
use std::time::Duration;

const KEYS: usize = 200;
const RESPONDERS: usize = 8;

/// Finalizes after `target` responses
fn count_to(target: usize) -> impl Fn(&usize) -> Result<Aggregation<usize>, String> {
    move |count: &usize| {
        let count = count + 1;
        if count >= target {
            Ok(Aggregation::Final(UserCallbackPayload::success(
                count.to_string().into_bytes(),
            )))
        } else {
            Ok(Aggregation::Pending(count))
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_responses_deliver_once() {
    let _ = env_logger::try_init();
    let cache = Arc::new(RequestCache::new(Duration::from_secs(30), KEYS));

    let mut receivers = Vec::with_capacity(KEYS);
    for i in 0..KEYS {
        let (tx, rx) = callback_channel();
        cache.new_request(&format!("key-{}", i), tx, 0usize).unwrap();
        receivers.push(rx);
    }

    let mut tasks = Vec::new();
    for _ in 0..RESPONDERS {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            for i in 0..KEYS {
                cache
                    .process_response(&format!("key-{}", i), count_to(3))
                    .unwrap();
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for rx in receivers {
        let payload = rx.await.unwrap();
        assert_eq!(payload.error_code, ErrorCode::NoError);
        assert_eq!(payload.raw_response, b"3");
    }
    assert!(cache.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_responses_racing_timeouts_deliver_once() {
    let cache = Arc::new(RequestCache::new(Duration::from_millis(5), KEYS));

    let mut receivers = Vec::with_capacity(KEYS);
    for i in 0..KEYS {
        let (tx, rx) = callback_channel();
        cache.new_request(&format!("key-{}", i), tx, 0usize).unwrap();
        receivers.push(rx);
    }

    let mut tasks = Vec::new();
    for r in 0..RESPONDERS {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            for i in 0..KEYS {
                let _ = cache.process_response(&format!("key-{}", i), count_to(RESPONDERS));
                if (i + r) % 16 == 0 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Whichever side won, each caller sees one payload
    for rx in receivers {
        let payload = rx.await.unwrap();
        assert!(matches!(
            payload.error_code,
            ErrorCode::NoError | ErrorCode::RequestTimeoutError
        ));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_capacity_frees_after_finalize() {
    let cache = RequestCache::new(Duration::from_secs(30), 2);
    let (tx1, rx1) = callback_channel();
    let (tx2, _rx2) = callback_channel();
    let (tx3, _rx3) = callback_channel();

    cache.new_request("a", tx1, 0usize).unwrap();
    cache.new_request("b", tx2, 0usize).unwrap();
    let (tx4, _rx4) = callback_channel();
    assert_eq!(cache.new_request("c", tx4, 0usize), Err(CacheError::Capacity(2)));

    cache.process_response("a", count_to(1)).unwrap();
    assert!(rx1.await.is_ok());
    cache.new_request("c", tx3, 0usize).unwrap();
    assert_eq!(cache.len(), 2);
}
