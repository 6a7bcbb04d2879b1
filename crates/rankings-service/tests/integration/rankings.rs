use std::collections::BTreeMap;
use std::sync::Arc;

use rankings_service::aggregation::AggregationError;
use rankings_service::caching::ComputationError;
use rankings_service::store::StoreError;
use rankings_service::types::{BusinessRecord, Provenance, RankingKind, RankingPayload};

use rankings_test as test;

use crate::{assert_close, data_path, read_records, setup_services, write_generated};

/// Parses currency text like `R$ 1.234,56` back into a number.
fn parse_brl(text: &str) -> f64 {
    let digits = text
        .strip_prefix("R$ ")
        .unwrap()
        .replace('.', "")
        .replace(',', ".");
    digits.parse().unwrap()
}

fn sum_by<F>(records: &[BusinessRecord], key: F) -> BTreeMap<String, f64>
where
    F: Fn(&BusinessRecord) -> &str,
{
    let mut sums = BTreeMap::new();
    for record in records {
        *sums.entry(key(record).to_owned()).or_default() += record.revenue();
    }
    sums
}

#[tokio::test]
async fn test_rankings_from_data_file() {
    let (services, dir) = setup_services(|_| {});
    write_generated(&data_path(&dir), 1_000);
    let records = read_records(&data_path(&dir));

    let response = services
        .rankings
        .get_ranking(RankingKind::TopRevenue, false)
        .await
        .unwrap();
    assert_eq!(response.source, Provenance::Live);
    let RankingPayload::TopBusinesses { top_10_comercios } = &*response.payload else {
        panic!("unexpected payload: {:?}", response.payload);
    };
    let mut expected: Vec<_> = records.iter().map(BusinessRecord::revenue).collect();
    expected.sort_by(|a, b| b.total_cmp(a));
    let returned: Vec<_> = top_10_comercios.iter().map(BusinessRecord::revenue).collect();
    assert_eq!(returned, &expected[..10]);

    let response = services
        .rankings
        .get_ranking(RankingKind::TopCities, false)
        .await
        .unwrap();
    let RankingPayload::TopCities { top_10_cidades } = &*response.payload else {
        panic!("unexpected payload: {:?}", response.payload);
    };
    let city_sums = sum_by(&records, |r| &r.location.city);
    assert_eq!(top_10_cidades.len(), 10);
    for entry in top_10_cidades {
        // rendered amounts are rounded to cents
        let expected = city_sums[&entry.city];
        assert!((parse_brl(&entry.revenue) - expected).abs() <= 0.01);
    }

    let response = services
        .rankings
        .get_ranking(RankingKind::TopCategories, false)
        .await
        .unwrap();
    let RankingPayload::TopCategories { top_10_categorias } = &*response.payload else {
        panic!("unexpected payload: {:?}", response.payload);
    };
    let category_sums = sum_by(&records, |r| &r.activity.category);
    // only five categories are ever generated
    assert_eq!(top_10_categorias.len(), category_sums.len());
    let rendered_total: f64 = top_10_categorias
        .iter()
        .map(|entry| parse_brl(&entry.revenue))
        .sum();
    let total: f64 = records.iter().map(BusinessRecord::revenue).sum();
    assert!((rendered_total - total).abs() <= 0.01 * top_10_categorias.len() as f64);
    assert_close(category_sums.values().sum(), total);
}

#[tokio::test]
async fn test_cache_survives_store_outage() {
    let (services, dir) = setup_services(|_| {});
    write_generated(&data_path(&dir), 100);

    let live = services
        .rankings
        .get_ranking(RankingKind::TopCategories, false)
        .await
        .unwrap();
    assert_eq!(live.source, Provenance::Live);

    std::fs::remove_file(data_path(&dir)).unwrap();

    // the fresh entry is still served
    let cached = services
        .rankings
        .get_ranking(RankingKind::TopCategories, false)
        .await
        .unwrap();
    assert_eq!(cached.source, Provenance::Cache);
    assert!(Arc::ptr_eq(&live.payload, &cached.payload));

    // but a forced refresh has to go to the store
    let err = services
        .rankings
        .get_ranking(RankingKind::TopCategories, true)
        .await
        .unwrap_err();
    assert!(
        matches!(err.cause(), ComputationError::Store(StoreError::Unavailable { .. })),
        "{err:?}"
    );

    // the failed refresh did not touch the entry
    let cached = services
        .rankings
        .get_ranking(RankingKind::TopCategories, false)
        .await
        .unwrap();
    assert_eq!(cached.source, Provenance::Cache);
}

#[tokio::test]
async fn test_corrupt_store() {
    let (services, dir) = setup_services(|_| {});
    std::fs::write(data_path(&dir), "[{}]").unwrap();

    for kind in RankingKind::ALL {
        let err = services.rankings.get_ranking(kind, false).await.unwrap_err();
        assert!(
            matches!(err.cause(), ComputationError::Store(StoreError::Corrupt { .. })),
            "{err:?}"
        );
    }

    // valid JSON in the wrong shape is just as corrupt
    test::write_json(
        data_path(&dir),
        &serde_json::json!({ "top_10_comercios": [] }),
    );
    let err = services
        .rankings
        .get_ranking(RankingKind::TopCategories, true)
        .await
        .unwrap_err();
    assert!(matches!(
        err.cause(),
        ComputationError::Store(StoreError::Corrupt { .. })
    ));
}

#[tokio::test]
async fn test_short_collections() {
    let (services, dir) = setup_services(|_| {});
    write_generated(&data_path(&dir), 5);

    let err = services
        .rankings
        .get_ranking(RankingKind::TopRevenue, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err.cause(),
        ComputationError::Aggregation(AggregationError::InsufficientData {
            required: 10,
            available: 5
        })
    ));

    let err = services
        .rankings
        .get_ranking(RankingKind::TopCities, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err.cause(),
        ComputationError::Aggregation(AggregationError::InsufficientData { .. })
    ));

    // categories tolerate short collections
    let response = services
        .rankings
        .get_ranking(RankingKind::TopCategories, false)
        .await
        .unwrap();
    assert!((1..=5).contains(&response.payload.len()));
}

#[tokio::test]
async fn test_generated_records_are_not_served_until_refresh() {
    let (services, dir) = setup_services(|config| config.generator.batch_size = 30);
    write_generated(&data_path(&dir), 10);

    let first = services
        .rankings
        .get_ranking(RankingKind::TopRevenue, false)
        .await
        .unwrap();
    assert_eq!(first.source, Provenance::Live);

    let generated = services.generator.append(None).await.unwrap();
    assert_eq!(generated.total_records, 40);

    let cached = services
        .rankings
        .get_ranking(RankingKind::TopRevenue, false)
        .await
        .unwrap();
    assert_eq!(cached.source, Provenance::Cache);

    let refreshed = services
        .rankings
        .get_ranking(RankingKind::TopRevenue, true)
        .await
        .unwrap();
    assert_eq!(refreshed.source, Provenance::Live);
    let RankingPayload::TopBusinesses { top_10_comercios } = &*refreshed.payload else {
        panic!("unexpected payload: {:?}", refreshed.payload);
    };
    let records = read_records(&data_path(&dir));
    let max = records
        .iter()
        .map(BusinessRecord::revenue)
        .fold(f64::MIN, f64::max);
    assert_eq!(top_10_comercios[0].revenue(), max);
}
