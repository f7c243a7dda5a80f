use crate::funnel::models::{Bucket, CatalogLookupResult, LookupState, PriceListEntry};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Supplier liquidation marker, matched case-sensitively as supplied.
pub const CLEARANCE_MARKER: &str = "CLEARANCE";

/// Minimum stripped-description length for a catalog record to count as
/// having real content. The bound is inclusive.
pub const MIN_DESCRIPTION_CHARS: usize = 20;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

#[derive(Debug, Error)]
pub enum ClassifyError {
    /// An entry passed every gate yet matched no rule. Indicates a gap in
    /// rule coverage (in practice: a catalog record with negative own
    /// stock); never defaulted to a bucket.
    #[error("no classification rule matched entry `{supplier_part}` (own_stock={own_stock})")]
    RuleGap {
        supplier_part: String,
        own_stock: i64,
    },
}

/// Classify one price-list entry against its lookup state.
///
/// Pure and total over valid inputs: rules are evaluated in fixed precedence
/// order and the first match wins. Rules 1 and 2 need no lookup, so they
/// apply even when the lookup was skipped or failed; an entry with no
/// identifier routes to `CreationRequired` without the lookup collaborator
/// ever being consulted.
pub fn classify(entry: &PriceListEntry, lookup: &LookupState) -> Result<Bucket, ClassifyError> {
    // Rule 1: stock gate.
    if entry.available_quantity == 0 {
        return Ok(Bucket::NoSupplierStock);
    }

    // Rule 2: clearance dominates everything downstream of the stock gate.
    if entry.creation_reason.contains(CLEARANCE_MARKER) {
        return Ok(Bucket::Clearance);
    }

    // Rule 5, no-identifier arm: decidable without any lookup.
    if entry.catalog_id.is_none() {
        return Ok(Bucket::CreationRequired);
    }

    let result = match lookup {
        LookupState::Done(result) => result,
        LookupState::Skipped => return Ok(Bucket::LookupSkipped),
        LookupState::Failed(_) => return Ok(Bucket::LookupFailed),
    };

    let record = match result {
        CatalogLookupResult::Found(record) => record,
        // Rule 5: catalog explicitly has no product for this identifier.
        CatalogLookupResult::NotFound | CatalogLookupResult::NoIdentifier => {
            return Ok(Bucket::CreationRequired);
        }
    };

    // Rule 3: live on the wholesale channel. A wholesale flag on any other
    // list number falls through.
    if record.is_wholesale && record.wholesale_list == "1" {
        return Ok(Bucket::Published);
    }

    // Rule 4: retailer already holds stock; excluded from eligibility.
    if record.own_stock > 0 {
        return Ok(Bucket::OwnStock);
    }

    // Rules 6/7: not published (by rule 3 precedence), no retailer stock;
    // split on whether the record carries a usable description.
    if record.own_stock == 0 {
        if stripped_len(&record.description) >= MIN_DESCRIPTION_CHARS {
            return Ok(Bucket::ReadyToPublish);
        }
        return Ok(Bucket::MissingDescription);
    }

    // Rule 8: negative own stock can only come from an upstream parsing
    // defect; fail loudly rather than pick a bucket.
    Err(ClassifyError::RuleGap {
        supplier_part: entry.supplier_part.clone(),
        own_stock: record.own_stock,
    })
}

/// True when the lookup-free rules (stock gate, clearance, missing
/// identifier) cannot already decide this entry, i.e. a catalog lookup is
/// actually worth performing.
pub fn needs_lookup(entry: &PriceListEntry) -> bool {
    entry.available_quantity > 0
        && !entry.creation_reason.contains(CLEARANCE_MARKER)
        && entry.catalog_id.is_some()
}

/// Length of a description after stripping markup and collapsing whitespace.
pub fn stripped_len(raw: &str) -> usize {
    let text = TAG_RE.replace_all(raw, "");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().count()
}
