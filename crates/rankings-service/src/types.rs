//! Data model shared between the record store, the aggregations and the HTTP layer.
//!
//! The serialized field names are the ones used by the persisted data file and by the public API,
//! which is why they differ from the Rust field names.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The line of business a record belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "subcategoria")]
    pub subcategory: String,
}

/// Yearly financial figures of a business.
///
/// All values are independent. The system does not enforce any relation between them, even though
/// generated records derive the net margin from the other figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    #[serde(rename = "faturamento_anual_bruto")]
    pub gross_revenue: f64,
    #[serde(rename = "custos_operacionais_anual")]
    pub operating_costs: f64,
    #[serde(rename = "imposto_total_pago_anual")]
    pub taxes_paid: f64,
    #[serde(rename = "margem_lucro_liquida")]
    pub net_margin: f64,
    #[serde(rename = "ano_fiscal")]
    pub fiscal_year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "endereco")]
    pub address: String,
    #[serde(rename = "cidade")]
    pub city: String,
    #[serde(rename = "estado")]
    pub state: String,
    #[serde(rename = "cep")]
    pub postal_code: String,
    #[serde(rename = "coordenadas")]
    pub coordinates: Coordinates,
    #[serde(rename = "regiao_geografica")]
    pub region: String,
}

/// A single business as stored in the record collection.
///
/// Records are immutable once loaded. Gross annual revenue is the only sort and aggregation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    #[serde(rename = "id_comercio")]
    pub id: u64,
    #[serde(rename = "nome_fantasia")]
    pub name: String,
    #[serde(rename = "ramo_atividade")]
    pub activity: Activity,
    #[serde(rename = "dados_financeiros")]
    pub financials: Financials,
    #[serde(rename = "localizacao")]
    pub location: Location,
    #[serde(rename = "porte_empresa")]
    pub size: String,
    /// Opening date, formatted as `YYYY-MM-DD`.
    #[serde(rename = "data_abertura")]
    pub opened_on: String,
    #[serde(rename = "status_operacional")]
    pub status: String,
}

impl BusinessRecord {
    /// The gross annual revenue of this business.
    pub fn revenue(&self) -> f64 {
        self.financials.gross_revenue
    }
}

/// The analytical views that can be requested.
///
/// Every kind owns exactly one slot in the [`RankingCache`](crate::caching::RankingCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RankingKind {
    /// The businesses with the highest gross revenue.
    TopRevenue,
    /// The cities with the highest summed revenue.
    TopCities,
    /// The activity categories with the highest summed revenue.
    TopCategories,
}

impl RankingKind {
    pub const ALL: [RankingKind; 3] = [Self::TopRevenue, Self::TopCities, Self::TopCategories];

    /// A stable name used in logs and metric tags.
    pub fn name(self) -> &'static str {
        match self {
            Self::TopRevenue => "top_revenue",
            Self::TopCities => "top_cities",
            Self::TopCategories => "top_categories",
        }
    }

    /// The HTTP route serving this ranking.
    pub fn path(self) -> &'static str {
        match self {
            Self::TopRevenue => "/top10-faturamento",
            Self::TopCities => "/top10-cidades",
            Self::TopCategories => "/top10-categorias",
        }
    }
}

impl fmt::Display for RankingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Summed revenue of a city, rendered as currency text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityRevenue {
    #[serde(rename = "cidade")]
    pub city: String,
    #[serde(rename = "faturamento")]
    pub revenue: String,
}

/// Summed revenue of an activity category, rendered as currency text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRevenue {
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "faturamento")]
    pub revenue: String,
}

/// The computed body of a ranking, without any per-response metadata.
///
/// There is one variant per [`RankingKind`], so the payload type of every cache slot is known
/// statically and never needs to be checked at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RankingPayload {
    TopBusinesses {
        top_10_comercios: Vec<BusinessRecord>,
    },
    TopCities {
        top_10_cidades: Vec<CityRevenue>,
    },
    TopCategories {
        top_10_categorias: Vec<CategoryRevenue>,
    },
}

impl RankingPayload {
    /// The ranking kind this payload was computed for.
    pub fn kind(&self) -> RankingKind {
        match self {
            Self::TopBusinesses { .. } => RankingKind::TopRevenue,
            Self::TopCities { .. } => RankingKind::TopCities,
            Self::TopCategories { .. } => RankingKind::TopCategories,
        }
    }

    /// The number of ranked entries.
    pub fn len(&self) -> usize {
        match self {
            Self::TopBusinesses { top_10_comercios } => top_10_comercios.len(),
            Self::TopCities { top_10_cidades } => top_10_cidades.len(),
            Self::TopCategories { top_10_categorias } => top_10_categorias.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where the payload of a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    /// Served from a still valid cache entry.
    #[serde(rename = "Cache")]
    Cache,
    /// Computed from the record store for this request, or by a computation this request joined.
    #[serde(rename = "Processamento ao Vivo")]
    Live,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "Cache",
            Self::Live => "Processamento ao Vivo",
        }
    }
}

/// Renders an elapsed time the way it is reported in API responses, e.g. `1.234567ms`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{elapsed:?}")
}

/// The JSON body of a ranking response.
#[derive(Debug, Clone, Serialize)]
pub struct RankingResponse {
    #[serde(flatten)]
    pub payload: Arc<RankingPayload>,
    #[serde(rename = "tempo_processamento")]
    pub elapsed: String,
    #[serde(rename = "fonte_dados")]
    pub source: Provenance,
}

/// The JSON body of a data generation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(rename = "mensagem")]
    pub message: String,
    #[serde(rename = "tempo_processamento")]
    pub elapsed: String,
    /// The total number of records in the store after generation.
    #[serde(rename = "registros_gerados")]
    pub total_records: usize,
}
