pub mod aggregate;
pub mod classify;
pub mod models;

pub use aggregate::{FunnelNode, FunnelReport, aggregate};
pub use classify::{ClassifyError, classify};
pub use models::{Bucket, CatalogLookupResult, ClassifiedProduct, LookupState, PriceListEntry};
