use futures::StreamExt;

use mongodb_operations::{CancellationToken, Error, Result};
use mongodb_operations::cursor::CursorEnumerable;

use crate::support::MockBatchCursor;

use std::sync::atomic::Ordering;

fn batches() -> Vec<Vec<&'static str>> {
    vec![vec![], vec!["a", "b"], vec![], vec!["c"]]
}

#[test]
fn skips_empty_batches() {
    let cursor = MockBatchCursor::new(batches());
    let fetches = cursor.fetches.clone();
    let disposals = cursor.disposals.clone();

    let mut enumerable = CursorEnumerable::new(cursor);
    let items: Vec<_> = enumerable.enumerate().unwrap().collect::<Result<_>>().unwrap();

    assert_eq!(items, vec!["a", "b", "c"]);
    // Four batches, then the exhaustion signal.
    assert_eq!(fetches.load(Ordering::SeqCst), 5);
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
}

#[test]
fn current_follows_move_next() {
    let mut enumerable = CursorEnumerable::new(MockBatchCursor::new(batches()));
    let mut enumerator = enumerable.enumerate().unwrap();

    assert!(enumerator.current().unwrap_err().is_usage_error());

    let mut seen = Vec::new();
    while enumerator.move_next().unwrap() {
        seen.push(*enumerator.current().unwrap());
    }

    assert_eq!(seen, vec!["a", "b", "c"]);
    assert!(enumerator.current().unwrap_err().is_usage_error());
    assert!(!enumerator.move_next().unwrap());
}

#[test]
fn batch_is_consumed_before_fetching() {
    let cursor = MockBatchCursor::new(vec![vec![1, 2, 3], vec![4]]);
    let fetches = cursor.fetches.clone();

    let mut enumerable = CursorEnumerable::new(cursor);
    let mut enumerator = enumerable.enumerate().unwrap();

    for _ in 0..3 {
        assert!(enumerator.move_next().unwrap());
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    assert!(enumerator.move_next().unwrap());
    assert_eq!(*enumerator.current().unwrap(), 4);
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[test]
fn second_enumeration_is_rejected() {
    let mut enumerable = CursorEnumerable::new(MockBatchCursor::new(batches()));
    let _first = enumerable.enumerate().unwrap();

    match enumerable.enumerate() {
        Err(Error::AlreadyEnumerated) => (),
        Err(error) => panic!("expected AlreadyEnumerated, got {:?}", error),
        Ok(_) => panic!("expected the second enumeration to fail"),
    }
}

#[test]
fn dispose_is_idempotent() {
    let cursor = MockBatchCursor::new(batches());
    let disposals = cursor.disposals.clone();

    let mut enumerable = CursorEnumerable::new(cursor);
    let mut enumerator = enumerable.enumerate().unwrap();
    assert!(enumerator.move_next().unwrap());

    enumerator.dispose();
    enumerator.dispose();
    assert_eq!(disposals.load(Ordering::SeqCst), 1);

    match enumerator.move_next() {
        Err(Error::Disposed(_)) => (),
        other => panic!("expected Disposed, got {:?}", other),
    }
    assert!(enumerator.current().unwrap_err().is_usage_error());

    drop(enumerator);
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
}

#[test]
fn iterating_a_disposed_enumerator_is_an_error() {
    let mut enumerable = CursorEnumerable::new(MockBatchCursor::new(batches()));
    let mut enumerator = enumerable.enumerate().unwrap();
    assert_eq!(enumerator.next().unwrap().unwrap(), "a");

    enumerator.dispose();

    match enumerator.next() {
        Some(Err(Error::Disposed(_))) => (),
        other => panic!("expected Disposed, got {:?}", other),
    }
    assert!(enumerator.next().is_none());
}

#[test]
fn reset_is_not_supported() {
    let mut enumerable = CursorEnumerable::new(MockBatchCursor::new(batches()));
    let mut enumerator = enumerable.enumerate().unwrap();

    match enumerator.reset() {
        Err(error @ Error::ResetNotSupported(_)) => assert!(error.is_usage_error()),
        other => panic!("expected ResetNotSupported, got {:?}", other),
    }
}

#[test]
fn dropping_releases_the_cursor() {
    let cursor = MockBatchCursor::new(batches());
    let disposals = cursor.disposals.clone();
    drop(CursorEnumerable::new(cursor));
    assert_eq!(disposals.load(Ordering::SeqCst), 1);

    let cursor = MockBatchCursor::new(batches());
    let disposals = cursor.disposals.clone();
    let mut enumerable = CursorEnumerable::new(cursor);
    let mut enumerator = enumerable.enumerate().unwrap();
    assert!(enumerator.move_next().unwrap());
    drop(enumerator);
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
    drop(enumerable);
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
}

#[test]
fn iterator_ends_after_an_error() {
    let cursor = MockBatchCursor::new(vec![vec!["a"]]).failing_after("connection reset");
    let disposals = cursor.disposals.clone();

    let mut enumerable = CursorEnumerable::new(cursor);
    let mut enumerator = enumerable.enumerate().unwrap();

    assert_eq!(enumerator.next().unwrap().unwrap(), "a");
    assert!(enumerator.next().unwrap().is_err());
    assert!(enumerator.next().is_none());
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn async_and_stream_views_match_blocking() {
    let mut enumerable = CursorEnumerable::new(MockBatchCursor::new(batches()));
    let mut enumerator = enumerable.enumerate().unwrap();
    let cancel = CancellationToken::new();

    let mut seen = Vec::new();
    while enumerator.move_next_async(&cancel).await.unwrap() {
        seen.push(*enumerator.current().unwrap());
    }
    assert_eq!(seen, vec!["a", "b", "c"]);

    let mut enumerable = CursorEnumerable::new(MockBatchCursor::new(batches()));
    let streamed: Vec<_> = enumerable.enumerate().unwrap().into_stream().collect().await;
    let streamed: Vec<_> = streamed.into_iter().map(|item| item.unwrap()).collect();
    assert_eq!(streamed, seen);
}

#[tokio::test]
async fn stream_ends_after_an_error() {
    let cursor = MockBatchCursor::new(vec![vec![1], vec![]]).failing_after("connection reset");
    let mut enumerable = CursorEnumerable::new(cursor);

    let items: Vec<_> = enumerable.enumerate().unwrap().into_stream().collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(*items[0].as_ref().unwrap(), 1);
    assert!(items[1].is_err());
}

#[test]
fn cancelled_token_ends_iteration() {
    let cursor = MockBatchCursor::new(batches());
    let disposals = cursor.disposals.clone();
    let cancel = CancellationToken::new();
    let mut enumerable = CursorEnumerable::with_cancellation(cursor, cancel.clone());
    let mut enumerator = enumerable.enumerate().unwrap();

    assert_eq!(enumerator.next().unwrap().unwrap(), "a");
    cancel.cancel();
    // The buffered item is still delivered without a fetch.
    assert_eq!(enumerator.next().unwrap().unwrap(), "b");
    assert!(enumerator.next().unwrap().unwrap_err().is_cancelled());
    assert!(enumerator.next().is_none());
    assert_eq!(disposals.load(Ordering::SeqCst), 1);
}
