use crate::funnel::models::{Bucket, ClassifiedProduct};
use crate::funnel::{FunnelNode, FunnelReport};
use crate::pipeline::RunOutcome;
use chrono::Utc;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Renders the run as a single self-contained HTML page. No scripts, no
/// external assets: the page must open from a file:// URL on an offline
/// machine.
pub fn render(outcome: &RunOutcome) -> String {
    let report = &outcome.report;
    let mut page = String::with_capacity(16 * 1024);

    let _ = write!(
        page,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Catalog Monitor</title>\n<style>{}</style>\n</head>\n<body>\n\
         <h1>Catalog Monitor</h1>\n\
         <p class=\"meta\">source: {} &middot; generated {} UTC &middot; consistency: {}</p>\n",
        STYLE,
        escape(&outcome.source_name),
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        if report.consistent { "ok" } else { "BROKEN" },
    );

    page.push_str("<section class=\"stats\">\n");
    stat_card(&mut page, "Total rows", report.total, "total");
    stat_card(
        &mut page,
        "With supplier stock",
        report.with_supplier_stock,
        "total",
    );
    stat_card(&mut page, "Eligible", report.eligible, "eligible");
    for bucket in Bucket::ALL {
        stat_card(
            &mut page,
            bucket.name(),
            report.counts.get(bucket),
            bucket_class(bucket),
        );
    }
    page.push_str("</section>\n");

    page.push_str("<h2>Funnel (resolved entries)</h2>\n");
    render_node(&mut page, &report.tree);
    let unresolved = report.counts.lookup_skipped + report.counts.lookup_failed;
    if unresolved > 0 {
        let _ = write!(
            page,
            "<p class=\"meta\">{unresolved} entries with skipped or failed lookups count toward \
             the totals above but not in the funnel.</p>\n"
        );
    }

    for bucket in Bucket::ALL {
        let members: Vec<&ClassifiedProduct> = report
            .products
            .iter()
            .filter(|p| p.bucket == bucket)
            .collect();
        if members.is_empty() {
            continue;
        }
        let _ = write!(
            page,
            "<h2>{} ({})</h2>\n<table>\n<tr><th>Supplier part</th><th>Catalog id</th>\
             <th>Description</th><th>Qty</th><th>Price</th><th>Detail</th></tr>\n",
            escape(bucket.name()),
            members.len()
        );
        for product in members {
            let entry = &product.entry;
            let _ = write!(
                page,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{}</td></tr>\n",
                escape(&entry.supplier_part),
                escape(entry.catalog_id.as_deref().unwrap_or("-")),
                escape(&entry.description),
                entry.available_quantity,
                entry.customer_price,
                escape(product.failure.as_deref().unwrap_or("")),
            );
        }
        page.push_str("</table>\n");
    }

    if !report.input_errors.is_empty() {
        let _ = write!(
            page,
            "<h2>Input errors ({})</h2>\n<table>\n<tr><th>Supplier part</th><th>Detail</th></tr>\n",
            report.input_errors.len()
        );
        for err in &report.input_errors {
            let _ = write!(
                page,
                "<tr><td>{}</td><td>{}</td></tr>\n",
                escape(&err.supplier_part),
                escape(&err.detail)
            );
        }
        page.push_str("</table>\n");
    }

    page.push_str("</body>\n</html>\n");
    page
}

pub fn write_html(outcome: &RunOutcome, path: &Path) -> std::io::Result<()> {
    std::fs::write(path, render(outcome))?;
    info!(target = "catmon.report", path = %path.display(), "html dashboard written");
    Ok(())
}

fn stat_card(page: &mut String, label: &str, count: usize, class: &str) {
    let _ = write!(
        page,
        "<div class=\"card {class}\"><div class=\"count\">{count}</div>\
         <div class=\"label\">{}</div></div>\n",
        escape(label)
    );
}

fn render_node(page: &mut String, node: &FunnelNode) {
    let _ = write!(
        page,
        "<ul class=\"funnel\"><li><span>{}</span> <b>{}</b>",
        escape(node.label),
        node.count
    );
    for child in &node.children {
        render_node(page, child);
    }
    page.push_str("</li></ul>\n");
}

fn bucket_class(bucket: Bucket) -> &'static str {
    if bucket.is_eligible() {
        "eligible"
    } else {
        match bucket {
            Bucket::LookupFailed => "failed",
            Bucket::Published => "published",
            _ => "neutral",
        }
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;color:#1a1a2e}\
h1{margin-bottom:0}.meta{color:#666}\
.stats{display:flex;flex-wrap:wrap;gap:.75rem;margin:1rem 0}\
.card{border:1px solid #ddd;border-radius:8px;padding:.75rem 1.25rem;min-width:8rem;text-align:center}\
.card .count{font-size:1.6rem;font-weight:700}.card .label{color:#555;font-size:.85rem}\
.card.eligible{border-color:#2e7d32;background:#f0f8f1}\
.card.published{border-color:#1565c0;background:#eef4fb}\
.card.failed{border-color:#c62828;background:#fdf0f0}\
.funnel{list-style:none;padding-left:1.25rem;border-left:2px solid #ddd;margin:.25rem 0}\
.funnel span{color:#444}\
table{border-collapse:collapse;margin:.5rem 0 1.5rem}\
th,td{border:1px solid #ddd;padding:.35rem .6rem;font-size:.9rem;text-align:left}\
th{background:#f5f5f7}";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::aggregate;
    use crate::funnel::models::{EntryError, PriceListEntry};
    use crate::pipeline::RunOutcome;

    fn entry(part: &str, description: &str) -> PriceListEntry {
        PriceListEntry {
            catalog_id: None,
            supplier_part: part.to_string(),
            description: description.to_string(),
            vendor_name: "Acme".to_string(),
            vendor_part: "AC-9".to_string(),
            customer_price: 99.9,
            available_quantity: 3,
            creation_reason: "NORMAL".to_string(),
            category: "Widgets".to_string(),
            subcategory: "Small".to_string(),
        }
    }

    #[test]
    fn page_escapes_untrusted_fields() {
        let product = ClassifiedProduct {
            entry: entry("SUP-<b>1</b>", "5\" bracket & clamp"),
            bucket: Bucket::CreationRequired,
            record: None,
            failure: None,
        };
        let outcome = RunOutcome {
            report: aggregate(vec![product], Vec::new(), Vec::new()),
            stages: Vec::new(),
            source_name: "list<script>.csv".to_string(),
        };

        let page = render(&outcome);
        assert!(page.contains("SUP-&lt;b&gt;1&lt;/b&gt;"));
        assert!(page.contains("5&quot; bracket &amp; clamp"));
        assert!(page.contains("list&lt;script&gt;.csv"));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn empty_buckets_render_no_table() {
        let outcome = RunOutcome {
            report: aggregate(Vec::new(), Vec::new(), Vec::new()),
            stages: Vec::new(),
            source_name: "empty.csv".to_string(),
        };
        let page = render(&outcome);
        assert!(!page.contains("<table>"));
        assert!(page.contains("consistency: ok"));
    }

    #[test]
    fn unresolved_lookups_are_flagged_next_to_the_funnel() {
        let mut skipped = ClassifiedProduct {
            entry: entry("SUP-1", "Widget"),
            bucket: Bucket::LookupSkipped,
            record: None,
            failure: None,
        };
        skipped.entry.catalog_id = Some("1001".to_string());
        let outcome = RunOutcome {
            report: aggregate(vec![skipped], Vec::new(), Vec::new()),
            stages: Vec::new(),
            source_name: "list.csv".to_string(),
        };
        let page = render(&outcome);
        assert!(page.contains("Funnel (resolved entries)"));
        assert!(page.contains("1 entries with skipped or failed lookups"));
    }

    #[test]
    fn input_errors_get_their_own_section() {
        let outcome = RunOutcome {
            report: aggregate(
                Vec::new(),
                vec![EntryError {
                    supplier_part: "SUP-7".to_string(),
                    detail: "bad quantity".to_string(),
                }],
                Vec::new(),
            ),
            stages: Vec::new(),
            source_name: "list.csv".to_string(),
        };
        let page = render(&outcome);
        assert!(page.contains("Input errors (1)"));
        assert!(page.contains("bad quantity"));
    }
}
