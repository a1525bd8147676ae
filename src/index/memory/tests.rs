use super::*;
use std::sync::Arc;

fn entry(title: &str, text: &str) -> CorpusEntry {
    CorpusEntry::new(title, text, "test")
}

#[test]
fn cosine_distance_bounds() {
    assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
    assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
    assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    assert!((cosine_distance(&[0.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn empty_index_returns_nothing() {
    let index = MemoryIndex::new();
    let results = index.query(&[1.0, 0.0], 5).await.expect("query works");
    assert!(results.is_empty());
    assert_eq!(index.count().await.expect("count works"), 0);
}

#[tokio::test]
async fn query_orders_by_ascending_distance() {
    let index = MemoryIndex::new();
    index
        .upsert(
            &[entry("far", "x"), entry("near", "y"), entry("middle", "z")],
            &[vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
        )
        .await
        .expect("upsert works");

    let results = index.query(&[1.0, 0.0], 10).await.expect("query works");
    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["near", "middle", "far"]);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));

    let limited = index.query(&[1.0, 0.0], 2).await.expect("query works");
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn upsert_overwrites_by_id() {
    let index = MemoryIndex::new();
    index
        .upsert(&[entry("Café", "old")], &[vec![1.0, 0.0]])
        .await
        .expect("first upsert");
    index
        .upsert(&[entry("Cafè", "new")], &[vec![0.0, 1.0]])
        .await
        .expect("second upsert");

    assert_eq!(index.count().await.expect("count works"), 1);
    let results = index.query(&[0.0, 1.0], 1).await.expect("query works");
    assert_eq!(results[0].text, "new");
    assert!(results[0].distance.abs() < 1e-6);
}

#[tokio::test]
async fn dimension_mismatch_is_rejected() {
    let index = MemoryIndex::new();
    index
        .upsert(&[entry("a", "a")], &[vec![1.0, 0.0]])
        .await
        .expect("upsert works");

    assert!(
        index
            .upsert(&[entry("b", "b")], &[vec![1.0, 0.0, 0.0]])
            .await
            .is_err()
    );
    assert!(index.query(&[1.0], 3).await.is_err());
}

#[tokio::test]
async fn mismatched_lengths_are_rejected() {
    let index = MemoryIndex::new();
    assert!(index.upsert(&[entry("a", "a")], &[]).await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_upserts_to_one_id_keep_a_single_row() {
    let index = Arc::new(MemoryIndex::new());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let index = Arc::clone(&index);
            tokio::spawn(async move {
                let text = format!("version {}", i);
                index
                    .upsert(&[entry("Shared", &text)], &[vec![1.0, i as f32]])
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle
            .await
            .expect("task should not panic")
            .expect("upsert should succeed");
    }

    assert_eq!(index.count().await.expect("count works"), 1);
    let results = index.query(&[1.0, 0.0], 5).await.expect("query works");
    assert_eq!(results.len(), 1);
    assert!(results[0].text.starts_with("version "));
}
