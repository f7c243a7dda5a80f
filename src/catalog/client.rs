use crate::catalog::config::API_BASE;
use crate::funnel::models::{CatalogLookupResult, CatalogRecord};
use crate::http::build_client;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use urlencoding::encode;

/// Client for the retailer product-catalog API.
///
/// Maps exactly one response shape per lookup state: HTTP 200 → `Found`,
/// HTTP 404 → `NotFound`. Transport failures and every other status are
/// errors, never lookup results, so a flaky upstream can't masquerade as
/// "product does not exist". No retries here; concurrency is bounded by the
/// caller.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    base_url: String,
    http: Client,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status: HTTP {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    Deserialize(String),
}

#[derive(Debug, Deserialize)]
struct ProductPayload {
    #[serde(default)]
    mayorista: bool,
    #[serde(default, rename = "listaMayorista")]
    lista_mayorista: Option<serde_json::Value>,
    #[serde(default)]
    stock: Option<StockPayload>,
    #[serde(default)]
    nombre: String,
    #[serde(default, rename = "precioNormal")]
    precio_normal: i64,
    #[serde(default, rename = "precioOferta")]
    precio_oferta: i64,
    #[serde(default)]
    descripcion: String,
}

#[derive(Debug, Deserialize)]
struct StockPayload {
    #[serde(default)]
    aproximado: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: build_client(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(API_BASE.clone())
    }

    pub async fn fetch_product(&self, catalog_id: &str) -> Result<CatalogLookupResult, CatalogError> {
        let url = format!("{}/{}", self.base_url, encode(catalog_id));
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| CatalogError::Request(err.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(CatalogLookupResult::NotFound),
            status if status.is_success() => {
                let payload: ProductPayload = response
                    .json()
                    .await
                    .map_err(|err| CatalogError::Deserialize(err.to_string()))?;
                Ok(CatalogLookupResult::Found(record_from_payload(payload)))
            }
            status => Err(CatalogError::Status(status.as_u16())),
        }
    }
}

fn record_from_payload(payload: ProductPayload) -> CatalogRecord {
    let own_stock_raw = payload
        .stock
        .map(|stock| stock.aproximado)
        .unwrap_or_default();
    CatalogRecord {
        is_wholesale: payload.mayorista,
        wholesale_list: wholesale_list_from(payload.lista_mayorista.as_ref(), payload.mayorista),
        own_stock: parse_approx_stock(&own_stock_raw),
        own_stock_raw,
        name: payload.nombre,
        normal_price: payload.precio_normal,
        offer_price: payload.precio_oferta,
        description: payload.descripcion,
    }
}

/// The list number arrives as a string or a bare number depending on the API
/// version. When absent, a wholesale record is assumed to sit on the live
/// list ("1"), matching observed API behavior.
fn wholesale_list_from(raw: Option<&serde_json::Value>, is_wholesale: bool) -> String {
    match raw {
        Some(serde_json::Value::String(value)) => value.trim().to_string(),
        Some(serde_json::Value::Number(value)) => value.to_string(),
        _ if is_wholesale => "1".to_string(),
        _ => "0".to_string(),
    }
}

/// Approximate stock strings may carry a leading `+` ("+500"); anything
/// unparseable counts as zero.
pub fn parse_approx_stock(raw: &str) -> i64 {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    digits.parse::<i64>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_stock_handles_plus_prefix() {
        assert_eq!(parse_approx_stock("+500"), 500);
        assert_eq!(parse_approx_stock("12"), 12);
        assert_eq!(parse_approx_stock(" 7 "), 7);
        assert_eq!(parse_approx_stock(""), 0);
        assert_eq!(parse_approx_stock("n/a"), 0);
        assert_eq!(parse_approx_stock("-3"), -3);
    }

    #[test]
    fn payload_maps_to_record() {
        let payload: ProductPayload = serde_json::from_str(
            r#"{
                "mayorista": true,
                "listaMayorista": "1",
                "stock": {"aproximado": "+20"},
                "nombre": "Widget",
                "precioNormal": 19990,
                "precioOferta": 17990,
                "descripcion": "<p>desc</p>"
            }"#,
        )
        .unwrap();
        let record = record_from_payload(payload);
        assert!(record.is_wholesale);
        assert_eq!(record.wholesale_list, "1");
        assert_eq!(record.own_stock, 20);
        assert_eq!(record.own_stock_raw, "+20");
        assert_eq!(record.normal_price, 19990);
    }

    #[test]
    fn numeric_list_field_is_normalized() {
        let payload: ProductPayload =
            serde_json::from_str(r#"{"mayorista": true, "listaMayorista": 2}"#).unwrap();
        let record = record_from_payload(payload);
        assert_eq!(record.wholesale_list, "2");
    }

    #[test]
    fn absent_list_defaults_by_wholesale_flag() {
        let wholesale: ProductPayload = serde_json::from_str(r#"{"mayorista": true}"#).unwrap();
        assert_eq!(record_from_payload(wholesale).wholesale_list, "1");

        let retail: ProductPayload = serde_json::from_str(r#"{"mayorista": false}"#).unwrap();
        assert_eq!(record_from_payload(retail).wholesale_list, "0");
    }

    #[test]
    fn sparse_payload_deserializes_with_defaults() {
        let payload: ProductPayload = serde_json::from_str("{}").unwrap();
        let record = record_from_payload(payload);
        assert!(!record.is_wholesale);
        assert_eq!(record.own_stock, 0);
        assert!(record.description.is_empty());
    }
}
