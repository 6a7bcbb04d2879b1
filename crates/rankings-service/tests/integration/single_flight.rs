use std::time::Duration;

use rankings_service::caching::ComputationError;
use rankings_service::types::{BusinessRecord, Provenance, RankingKind, RankingPayload};

use crate::{counting_service, read_records, write_generated};

use rankings_test as test;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_load_once() {
    let dir = test::tempdir();
    let path = dir.path().join("data.json");
    write_generated(&path, 500);

    let (source, service) = counting_service(&path, |_| {});
    source.set_delay(Duration::from_millis(200));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.get_ranking(RankingKind::TopCities, false).await })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.source, Provenance::Live);
        assert_eq!(response.payload.len(), 10);
    }
    assert_eq!(source.loads(), 1);

    // later requests are served from the cache
    let response = service
        .get_ranking(RankingKind::TopCities, false)
        .await
        .unwrap();
    assert_eq!(response.source, Provenance::Cache);
    assert_eq!(source.loads(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_kinds_do_not_share_computations() {
    let dir = test::tempdir();
    let path = dir.path().join("data.json");
    write_generated(&path, 500);

    let (source, service) = counting_service(&path, |_| {});
    source.set_delay(Duration::from_millis(100));

    let handles: Vec<_> = RankingKind::ALL
        .into_iter()
        .cycle()
        .take(12)
        .map(|kind| {
            let service = service.clone();
            tokio::spawn(async move { service.get_ranking(kind, false).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(source.loads(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_forced_refreshes_load_once() {
    let dir = test::tempdir();
    let path = dir.path().join("data.json");
    write_generated(&path, 500);

    let (source, service) = counting_service(&path, |_| {});
    service
        .get_ranking(RankingKind::TopRevenue, false)
        .await
        .unwrap();
    assert_eq!(source.loads(), 1);

    source.set_delay(Duration::from_millis(200));
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.get_ranking(RankingKind::TopRevenue, true).await })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_ne!(response.source, Provenance::Cache);
    }
    // the first forced request starts a load, the ones arriving during it share one follow-up
    assert!((2..=3).contains(&source.loads()), "{}", source.loads());
    assert!(!service.cache().is_computing(RankingKind::TopRevenue));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_forced_refresh_sees_records_written_during_load() {
    let dir = test::tempdir();
    let path = dir.path().join("data.json");
    test::write_json(&path, &test_records(1.0));

    let (source, service) = counting_service(&path, |_| {});
    source.set_delay(Duration::from_millis(300));

    let stale = tokio::spawn({
        let service = service.clone();
        async move { service.get_ranking(RankingKind::TopRevenue, false).await }
    });
    // give the first load time to read the file before it is rewritten
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.loads(), 1);
    test::write_json(&path, &test_records(2.0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.get_ranking(RankingKind::TopRevenue, true).await })
        })
        .collect();

    let stale = stale.await.unwrap().unwrap();
    assert_eq!(top_revenue(&stale.payload), 1.0);

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.source, Provenance::Live);
        assert_eq!(top_revenue(&response.payload), 2.0);
    }
    assert_eq!(source.loads(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeout_releases_waiters() {
    let dir = test::tempdir();
    let path = dir.path().join("data.json");
    write_generated(&path, 100);

    let (source, service) = counting_service(&path, |config| {
        config.caches.computation_timeout = Duration::from_millis(100);
    });
    source.set_delay(Duration::from_millis(500));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.get_ranking(RankingKind::TopCategories, false).await })
        })
        .collect();

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err.cause(), ComputationError::Timeout(_)), "{err:?}");
    }
    assert_eq!(source.loads(), 1);
    assert!(!service.cache().is_computing(RankingKind::TopCategories));
    assert!(service.cache().expires_at(RankingKind::TopCategories).is_none());

    // the timed out load still occupies its thread, so a retry waits for it instead of loading
    source.set_delay(Duration::ZERO);
    let err = service
        .get_ranking(RankingKind::TopCategories, false)
        .await
        .unwrap_err();
    assert!(matches!(err.cause(), ComputationError::Timeout(_)), "{err:?}");
    assert_eq!(source.loads(), 1);

    // once it returned, a later request retries
    tokio::time::sleep(Duration::from_millis(500)).await;
    let response = service
        .get_ranking(RankingKind::TopCategories, false)
        .await
        .unwrap();
    assert_eq!(response.source, Provenance::Live);
    assert_eq!(source.loads(), 2);
}

/// Ten records that all have the given revenue.
fn test_records(revenue: f64) -> Vec<BusinessRecord> {
    let dir = test::tempdir();
    let path = dir.path().join("template.json");
    write_generated(&path, 10);

    let mut records = read_records(&path);
    for record in &mut records {
        record.financials.gross_revenue = revenue;
    }
    records
}

fn top_revenue(payload: &RankingPayload) -> f64 {
    match payload {
        RankingPayload::TopBusinesses { top_10_comercios } => {
            top_10_comercios[0].financials.gross_revenue
        }
        other => panic!("unexpected payload {other:?}"),
    }
}
