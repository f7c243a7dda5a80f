use crate::funnel::models::{EntryError, PriceListEntry};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Identifier sentinels the supplier export uses for "no catalog id".
const ID_SENTINELS: [&str; 5] = ["sin id", "n/a", "na", "-", "none"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read price list: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed price list: {0}")]
    Csv(#[from] csv::Error),
    #[error("no price list found in `{0}`")]
    NoPriceFile(String),
    #[error("cannot fetch price sheet: {0}")]
    Fetch(String),
}

/// Normalized rows plus the rows rejected during normalization. Rejected
/// rows are reported, never silently dropped.
#[derive(Debug)]
pub struct LoadedPriceList {
    pub entries: Vec<PriceListEntry>,
    pub input_errors: Vec<EntryError>,
    pub source_name: String,
}

// Column access is by header name, not position, so re-exported files with
// reordered columns still load.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "ID", default)]
    catalog_id: String,
    #[serde(rename = "Supplier Part Number", default)]
    supplier_part: String,
    #[serde(rename = "Part Description", default)]
    description: String,
    #[serde(rename = "Vendor Name", default)]
    vendor_name: String,
    #[serde(rename = "Vendor Part Number", default)]
    vendor_part: String,
    #[serde(rename = "Customer Price", default)]
    customer_price: String,
    #[serde(rename = "Available Quantity", default)]
    available_quantity: String,
    #[serde(rename = "Creation Reason Value", default)]
    creation_reason: String,
    #[serde(rename = "Category Description", default)]
    category: String,
    #[serde(rename = "Sub Category Description", default)]
    subcategory: String,
}

pub fn load(path: &Path) -> Result<LoadedPriceList, LoadError> {
    let file = File::open(path)?;
    let source_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let loaded = load_from_reader(file, source_name)?;
    info!(
        target = "catmon.loader",
        source = %loaded.source_name,
        entries = loaded.entries.len(),
        rejected = loaded.input_errors.len(),
        "price list loaded"
    );
    Ok(loaded)
}

pub fn load_from_reader<R: Read>(
    reader: R,
    source_name: String,
) -> Result<LoadedPriceList, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut entries = Vec::new();
    let mut input_errors = Vec::new();

    for (index, row) in csv_reader.deserialize::<RawRow>().enumerate() {
        let line = index + 2; // header is line 1
        let raw = match row {
            Ok(raw) => raw,
            Err(err) => {
                input_errors.push(EntryError {
                    supplier_part: format!("line {line}"),
                    detail: format!("unreadable row: {err}"),
                });
                continue;
            }
        };
        match normalize_row(raw) {
            Ok(entry) => entries.push(entry),
            Err(error) => input_errors.push(error),
        }
    }

    Ok(LoadedPriceList {
        entries,
        input_errors,
        source_name,
    })
}

/// Pick the most recently modified `*.csv` in a directory, mirroring how the
/// supplier drops dated exports into one folder.
pub fn latest_price_file(dir: &Path) -> Result<PathBuf, LoadError> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for dir_entry in std::fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            continue;
        }
        let modified = dir_entry.metadata()?.modified()?;
        if newest.as_ref().is_none_or(|(best, _)| modified > *best) {
            newest = Some((modified, path));
        }
    }
    match newest {
        Some((_, path)) => {
            debug!(target = "catmon.loader", file = %path.display(), "picked newest price file");
            Ok(path)
        }
        None => Err(LoadError::NoPriceFile(dir.display().to_string())),
    }
}

/// CSV export endpoint for a published Google Sheet worksheet.
pub fn sheet_export_url(sheet_id: &str, gid: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{sheet_id}/gviz/tq?tqx=out:csv&gid={gid}")
}

/// Fetch a published Google Sheet as CSV and feed it through the regular
/// row normalization. Columns are matched by header name, so the sheet and
/// the file export share one code path.
pub async fn load_sheet(
    client: &reqwest::Client,
    url: &str,
) -> Result<LoadedPriceList, LoadError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| LoadError::Fetch(err.to_string()))?;
    if !response.status().is_success() {
        return Err(LoadError::Fetch(format!(
            "HTTP {}",
            response.status().as_u16()
        )));
    }
    let body = response
        .text()
        .await
        .map_err(|err| LoadError::Fetch(err.to_string()))?;
    let loaded = load_from_reader(body.as_bytes(), "google sheet".to_string())?;
    info!(
        target = "catmon.loader",
        entries = loaded.entries.len(),
        rejected = loaded.input_errors.len(),
        "price sheet fetched"
    );
    Ok(loaded)
}

fn normalize_row(raw: RawRow) -> Result<PriceListEntry, EntryError> {
    let supplier_part = raw.supplier_part.trim().to_string();
    let quantity_raw = raw.available_quantity.trim();
    // Blank quantity means zero stock, same as the source's fillna(0).
    let quantity = if quantity_raw.is_empty() {
        0.0
    } else {
        quantity_raw.parse::<f64>().map_err(|_| EntryError {
            supplier_part: supplier_part.clone(),
            detail: format!("unparseable quantity `{quantity_raw}`"),
        })?
    };
    if quantity < 0.0 {
        return Err(EntryError {
            supplier_part,
            detail: format!("negative quantity `{quantity_raw}`"),
        });
    }
    if quantity.fract() != 0.0 || quantity > f64::from(u32::MAX) {
        return Err(EntryError {
            supplier_part,
            detail: format!("quantity `{quantity_raw}` is not a whole in-range number"),
        });
    }

    let customer_price = raw.customer_price.trim().parse::<f64>().unwrap_or(0.0);

    Ok(PriceListEntry {
        catalog_id: normalize_identifier(&raw.catalog_id),
        supplier_part,
        description: raw.description.trim().to_string(),
        vendor_name: raw.vendor_name.trim().to_string(),
        vendor_part: raw.vendor_part.trim().to_string(),
        customer_price,
        available_quantity: quantity as u32,
        creation_reason: raw.creation_reason.trim().to_string(),
        category: raw.category.trim().to_string(),
        subcategory: raw.subcategory.trim().to_string(),
    })
}

/// Collapse the export's loosely-typed identifier column into a clean
/// `Option`: blanks, sentinel texts and non-numeric junk all mean "no
/// identifier assigned". Numeric values are canonicalized ("123.0" → "123").
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if ID_SENTINELS.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }
    let numeric = trimmed.parse::<f64>().ok()?;
    if !numeric.is_finite() || numeric < 0.0 {
        return None;
    }
    let id = numeric as i64;
    // Values that do not round-trip through i64 (overflow, fractions) are
    // junk, not identifiers.
    if id as f64 != numeric {
        return None;
    }
    Some(id.to_string())
}
