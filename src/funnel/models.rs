use serde::{Deserialize, Serialize};

/// One normalized supplier price-list row.
///
/// `catalog_id` is already cleaned by the loader: blanks and sentinel values
/// (`Sin ID`, `n/a`, ...) arrive here as `None`, so the engine never has to
/// re-interpret raw spreadsheet text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceListEntry {
    pub catalog_id: Option<String>,
    pub supplier_part: String,
    pub description: String,
    pub vendor_name: String,
    pub vendor_part: String,
    pub customer_price: f64,
    pub available_quantity: u32,
    pub creation_reason: String,
    pub category: String,
    pub subcategory: String,
}

/// Catalog record returned by the retailer API for a found product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub is_wholesale: bool,
    /// Publication channel as text; `"1"` is the live wholesale list.
    pub wholesale_list: String,
    pub own_stock: i64,
    /// Raw approximate stock as reported by the API (may carry a `+`).
    pub own_stock_raw: String,
    pub name: String,
    pub normal_price: i64,
    pub offer_price: i64,
    /// Raw description, may contain markup.
    pub description: String,
}

/// Outcome of querying the retailer catalog for one identifier.
///
/// `NoIdentifier` (nothing to look up) and `NotFound` (looked up, catalog has
/// no such product) are deliberately distinct states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CatalogLookupResult {
    Found(CatalogRecord),
    NotFound,
    NoIdentifier,
}

/// What the pipeline actually hands the engine for one entry.
///
/// `Failed` is a transport-level failure and is never folded into `NotFound`;
/// `Skipped` is the `--skip-api` mode.
#[derive(Debug, Clone)]
pub enum LookupState {
    Done(CatalogLookupResult),
    Skipped,
    Failed(String),
}

/// The nine mutually-exclusive per-entry publication-status buckets.
///
/// The first seven are substantive funnel outcomes. `LookupSkipped` and
/// `LookupFailed` sit outside the funnel identity and are reported
/// separately, so a skipped or failed lookup can never corrupt the
/// eligible arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    NoSupplierStock,
    Clearance,
    Published,
    OwnStock,
    CreationRequired,
    ReadyToPublish,
    MissingDescription,
    LookupSkipped,
    LookupFailed,
}

impl Bucket {
    pub const ALL: [Bucket; 9] = [
        Bucket::NoSupplierStock,
        Bucket::Clearance,
        Bucket::Published,
        Bucket::OwnStock,
        Bucket::CreationRequired,
        Bucket::ReadyToPublish,
        Bucket::MissingDescription,
        Bucket::LookupSkipped,
        Bucket::LookupFailed,
    ];

    /// Stable name, also the key used in the JSON report.
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::NoSupplierStock => "no_supplier_stock",
            Bucket::Clearance => "clearance",
            Bucket::Published => "published",
            Bucket::OwnStock => "own_stock",
            Bucket::CreationRequired => "creation_required",
            Bucket::ReadyToPublish => "ready_to_publish",
            Bucket::MissingDescription => "missing_description",
            Bucket::LookupSkipped => "lookup_skipped",
            Bucket::LookupFailed => "lookup_failed",
        }
    }

    /// True for the seven buckets that participate in the funnel tree.
    pub fn is_substantive(&self) -> bool {
        !matches!(self, Bucket::LookupSkipped | Bucket::LookupFailed)
    }

    /// The three sub-buckets whose sum defines the eligible total.
    pub fn is_eligible(&self) -> bool {
        matches!(
            self,
            Bucket::ReadyToPublish | Bucket::MissingDescription | Bucket::CreationRequired
        )
    }
}

/// One entry's resolved state. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedProduct {
    pub entry: PriceListEntry,
    pub bucket: Bucket,
    /// Catalog record kept for drill-through rendering, when the lookup
    /// found one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<CatalogRecord>,
    /// Failure detail for `LookupFailed` entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// A row excluded from classification, surfaced in the report instead of
/// being silently dropped.
#[derive(Debug, Clone, Serialize)]
pub struct EntryError {
    pub supplier_part: String,
    pub detail: String,
}
