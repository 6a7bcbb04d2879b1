//! Generation of synthetic business records.
//!
//! The distributions roughly model small and medium businesses in the state of São Paulo. They are
//! meant for load testing and demos, not for statistics.

use chrono::{Days, Months, NaiveDate, Utc};
use rand::Rng;

use crate::types::{Activity, BusinessRecord, Coordinates, Financials, Location};

/// The fiscal year all generated financials are reported for.
pub const FISCAL_YEAR: i32 = 2024;

/// `(id, category, subcategory)` of every generated line of business.
const BRANCHES: &[(&str, &str, &str)] = &[
    ("FOOD001", "Alimentação", "Padaria/Confeitaria"),
    ("FOOD002", "Alimentação", "Restaurante/Lanchonete"),
    ("RET001", "Varejo", "Loja de Roupas"),
    ("RET002", "Varejo", "Eletrônicos"),
    ("SERV001", "Serviços", "Consultoria"),
    ("SERV002", "Serviços", "Beleza/Estética"),
    ("AUTO001", "Automotivo", "Oficina Mecânica"),
    ("HEAL001", "Saúde", "Farmácia"),
];

/// Company size tiers with the range of their gross annual revenue.
const SIZES: &[(&str, f64, f64)] = &[
    ("MEI", 60_000.0, 81_000.0),
    ("Pequena", 200_000.0, 4_800_000.0),
    ("Média", 5_000_000.0, 35_000_000.0),
    ("Grande", 10_000_000.0, 35_000_000.0),
];

const CITY_COUNT: u32 = 100;

const LATITUDE: (f64, f64) = (-23.8, -22.5);
const LONGITUDE: (f64, f64) = (-47.0, -43.0);

fn pick<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> &'a T {
    &items[rng.random_range(0..items.len())]
}

/// Picks an opening date up to ten years before `today`.
fn opening_date<R: Rng + ?Sized>(rng: &mut R, today: NaiveDate) -> NaiveDate {
    let months = rng.random_range(0..10) * 12 + rng.random_range(0..12);
    let days = rng.random_range(0..28);
    today
        .checked_sub_months(Months::new(months))
        .and_then(|date| date.checked_sub_days(Days::new(days)))
        .unwrap_or(today)
}

/// Generates a single record with the given id.
pub fn generate_record<R: Rng + ?Sized>(rng: &mut R, id: u64, today: NaiveDate) -> BusinessRecord {
    let &(branch_id, category, subcategory) = pick(rng, BRANCHES);
    let &(size, min_revenue, max_revenue) = pick(rng, SIZES);

    let gross_revenue = rng.random_range(min_revenue..max_revenue);
    let operating_costs = gross_revenue * rng.random_range(0.4..0.6);
    let taxes_paid = gross_revenue * rng.random_range(0.05..0.15);

    let coordinates = Coordinates {
        latitude: rng.random_range(LATITUDE.0..LATITUDE.1),
        longitude: rng.random_range(LONGITUDE.0..LONGITUDE.1),
    };

    // one in ten businesses is closed
    let status = if rng.random_range(0..10) == 0 {
        "Fechado"
    } else {
        "Ativo"
    };

    BusinessRecord {
        id,
        name: format!("Comercio {id}"),
        activity: Activity {
            id: branch_id.to_owned(),
            category: category.to_owned(),
            subcategory: subcategory.to_owned(),
        },
        financials: Financials {
            gross_revenue,
            operating_costs,
            taxes_paid,
            net_margin: gross_revenue - operating_costs - taxes_paid,
            fiscal_year: FISCAL_YEAR,
        },
        location: Location {
            address: format!("Rua {id}, {}", rng.random_range(0..1000)),
            city: format!("Cidade {}", rng.random_range(0..CITY_COUNT)),
            state: "SP".to_owned(),
            postal_code: format!("{:05}-000", rng.random_range(0..99_999)),
            coordinates,
            region: "Sudeste".to_owned(),
        },
        size: size.to_owned(),
        opened_on: opening_date(rng, today).format("%Y-%m-%d").to_string(),
        status: status.to_owned(),
    }
}

/// Generates `count` records with consecutive ids starting at `first_id`.
pub fn generate_records(first_id: u64, count: usize) -> Vec<BusinessRecord> {
    let mut rng = rand::rng();
    let today = Utc::now().date_naive();
    (first_id..)
        .take(count)
        .map(|id| generate_record(&mut rng, id, today))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_consecutive_ids() {
        let records = generate_records(11, 5);
        let ids: Vec<_> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, [11, 12, 13, 14, 15]);
        assert_eq!(records[0].name, "Comercio 11");
        assert!(records[0].location.address.starts_with("Rua 11, "));
    }

    #[test]
    fn test_distributions() {
        let mut rng = StdRng::seed_from_u64(7);
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let oldest = NaiveDate::from_ymd_opt(2015, 3, 1).unwrap();

        let mut categories = BTreeSet::new();
        let mut statuses = BTreeSet::new();

        for id in 1..=2_000 {
            let record = generate_record(&mut rng, id, today);
            let financials = &record.financials;

            let (_, min, max) = SIZES
                .iter()
                .find(|(size, _, _)| *size == record.size)
                .unwrap();
            assert!((*min..*max).contains(&financials.gross_revenue));
            assert!(financials.operating_costs >= financials.gross_revenue * 0.4);
            assert!(financials.operating_costs <= financials.gross_revenue * 0.6);
            assert!(financials.taxes_paid >= financials.gross_revenue * 0.05);
            assert!(financials.taxes_paid <= financials.gross_revenue * 0.15);
            assert_eq!(financials.fiscal_year, 2024);

            let coordinates = record.location.coordinates;
            assert!((-23.8..-22.5).contains(&coordinates.latitude));
            assert!((-47.0..-43.0).contains(&coordinates.longitude));
            assert_eq!(record.location.state, "SP");
            assert_eq!(record.location.region, "Sudeste");
            assert!(record.location.postal_code.ends_with("-000"));
            assert_eq!(record.location.postal_code.len(), 9);

            let opened_on = NaiveDate::parse_from_str(&record.opened_on, "%Y-%m-%d").unwrap();
            assert!(opened_on <= today && opened_on >= oldest, "{opened_on}");

            categories.insert(record.activity.category);
            statuses.insert(record.status);
        }

        assert_eq!(categories.len(), 5);
        assert_eq!(
            statuses,
            BTreeSet::from(["Ativo".to_owned(), "Fechado".to_owned()])
        );
    }
}
