use crate::funnel::models::{Bucket, ClassifiedProduct, EntryError};
use serde::Serialize;

/// Per-bucket counts. Field order mirrors rule precedence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    pub no_supplier_stock: usize,
    pub clearance: usize,
    pub published: usize,
    pub own_stock: usize,
    pub creation_required: usize,
    pub ready_to_publish: usize,
    pub missing_description: usize,
    pub lookup_skipped: usize,
    pub lookup_failed: usize,
}

impl BucketCounts {
    fn bump(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::NoSupplierStock => self.no_supplier_stock += 1,
            Bucket::Clearance => self.clearance += 1,
            Bucket::Published => self.published += 1,
            Bucket::OwnStock => self.own_stock += 1,
            Bucket::CreationRequired => self.creation_required += 1,
            Bucket::ReadyToPublish => self.ready_to_publish += 1,
            Bucket::MissingDescription => self.missing_description += 1,
            Bucket::LookupSkipped => self.lookup_skipped += 1,
            Bucket::LookupFailed => self.lookup_failed += 1,
        }
    }

    pub fn get(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::NoSupplierStock => self.no_supplier_stock,
            Bucket::Clearance => self.clearance,
            Bucket::Published => self.published,
            Bucket::OwnStock => self.own_stock,
            Bucket::CreationRequired => self.creation_required,
            Bucket::ReadyToPublish => self.ready_to_publish,
            Bucket::MissingDescription => self.missing_description,
            Bucket::LookupSkipped => self.lookup_skipped,
            Bucket::LookupFailed => self.lookup_failed,
        }
    }

    fn sum(&self) -> usize {
        Bucket::ALL.iter().map(|bucket| self.get(*bucket)).sum()
    }
}

/// One node of the funnel breakdown. Carries the supplier part numbers it
/// contains so the renderer can offer drill-through.
#[derive(Debug, Clone, Serialize)]
pub struct FunnelNode {
    pub label: &'static str,
    pub count: usize,
    pub members: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FunnelNode>,
}

impl FunnelNode {
    fn leaf(label: &'static str, members: Vec<String>) -> Self {
        Self {
            label,
            count: members.len(),
            members,
            children: Vec::new(),
        }
    }

    fn branch(label: &'static str, children: Vec<FunnelNode>) -> Self {
        let mut members = Vec::new();
        for child in &children {
            members.extend(child.members.iter().cloned());
        }
        Self {
            label,
            count: members.len(),
            members,
            children,
        }
    }
}

/// Aggregate result of one classification run.
///
/// `eligible` is always the sum of its three sub-buckets; there is no second
/// filter path that could drift from it.
#[derive(Debug, Clone, Serialize)]
pub struct FunnelReport {
    pub total: usize,
    pub with_supplier_stock: usize,
    pub eligible: usize,
    pub counts: BucketCounts,
    pub consistent: bool,
    pub tree: FunnelNode,
    pub products: Vec<ClassifiedProduct>,
    pub input_errors: Vec<EntryError>,
    pub rule_gaps: Vec<EntryError>,
}

impl FunnelReport {
    /// Entries resolved into one bucket, for drill-through tables.
    pub fn bucket_members(&self, bucket: Bucket) -> Vec<&ClassifiedProduct> {
        self.products
            .iter()
            .filter(|product| product.bucket == bucket)
            .collect()
    }
}

/// Single-pass reduction over an immutable classified collection.
///
/// Input errors and rule gaps ride along for reporting; they were never
/// classified and do not participate in any bucket count.
pub fn aggregate(
    products: Vec<ClassifiedProduct>,
    input_errors: Vec<EntryError>,
    rule_gaps: Vec<EntryError>,
) -> FunnelReport {
    let mut counts = BucketCounts::default();
    for product in &products {
        counts.bump(product.bucket);
    }

    let total = products.len();
    let with_supplier_stock = total - counts.no_supplier_stock;
    // The funnel identity holds by construction: eligible is the sum of its
    // partition, never an independently filtered count.
    let eligible = counts.ready_to_publish + counts.missing_description + counts.creation_required;

    let tree = build_tree(&products);
    let substantive: usize = Bucket::ALL
        .iter()
        .filter(|bucket| bucket.is_substantive())
        .map(|bucket| counts.get(*bucket))
        .sum();
    let consistent = counts.sum() == total
        && eligible
            == counts.get(Bucket::ReadyToPublish)
                + counts.get(Bucket::MissingDescription)
                + counts.get(Bucket::CreationRequired)
        && tree.count == substantive
        && substantive + counts.lookup_skipped + counts.lookup_failed == total;

    FunnelReport {
        total,
        with_supplier_stock,
        eligible,
        counts,
        consistent,
        tree,
        products,
        input_errors,
        rule_gaps,
    }
}

/// `Total -> (NoSupplierStock | WithSupplierStock)`,
/// `WithSupplierStock -> (Clearance | NonClearance)`,
/// `NonClearance -> (Published | Eligible | OwnStock)`,
/// `Eligible -> (ReadyToPublish | MissingDescription | CreationRequired)`.
///
/// Only substantive buckets appear in the tree; skipped and failed lookups
/// are reported beside it. Every substantive entry lands in exactly one leaf
/// and every ancestor of that leaf.
fn build_tree(products: &[ClassifiedProduct]) -> FunnelNode {
    let members_of = |bucket: Bucket| -> Vec<String> {
        products
            .iter()
            .filter(|product| product.bucket == bucket)
            .map(|product| product.entry.supplier_part.clone())
            .collect()
    };

    let eligible = FunnelNode::branch(
        "eligible",
        vec![
            FunnelNode::leaf("ready_to_publish", members_of(Bucket::ReadyToPublish)),
            FunnelNode::leaf("missing_description", members_of(Bucket::MissingDescription)),
            FunnelNode::leaf("creation_required", members_of(Bucket::CreationRequired)),
        ],
    );
    let non_clearance = FunnelNode::branch(
        "non_clearance",
        vec![
            FunnelNode::leaf("published", members_of(Bucket::Published)),
            eligible,
            FunnelNode::leaf("own_stock", members_of(Bucket::OwnStock)),
        ],
    );
    let with_stock = FunnelNode::branch(
        "with_supplier_stock",
        vec![
            FunnelNode::leaf("clearance", members_of(Bucket::Clearance)),
            non_clearance,
        ],
    );
    FunnelNode::branch(
        "total",
        vec![
            FunnelNode::leaf("no_supplier_stock", members_of(Bucket::NoSupplierStock)),
            with_stock,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::models::PriceListEntry;
    use proptest::prelude::*;

    fn classified(part: &str, bucket: Bucket) -> ClassifiedProduct {
        ClassifiedProduct {
            entry: PriceListEntry {
                catalog_id: Some("1".to_string()),
                supplier_part: part.to_string(),
                description: String::new(),
                vendor_name: String::new(),
                vendor_part: String::new(),
                customer_price: 0.0,
                available_quantity: 1,
                creation_reason: "NORMAL".to_string(),
                category: String::new(),
                subcategory: String::new(),
            },
            bucket,
            record: None,
            failure: None,
        }
    }

    #[test]
    fn empty_run_is_consistent() {
        let report = aggregate(Vec::new(), Vec::new(), Vec::new());
        assert_eq!(report.total, 0);
        assert_eq!(report.eligible, 0);
        assert!(report.consistent);
    }

    #[test]
    fn eligible_is_the_sum_of_its_partition() {
        let products = vec![
            classified("a", Bucket::ReadyToPublish),
            classified("b", Bucket::ReadyToPublish),
            classified("c", Bucket::MissingDescription),
            classified("d", Bucket::CreationRequired),
            classified("e", Bucket::Published),
            classified("f", Bucket::OwnStock),
        ];
        let report = aggregate(products, Vec::new(), Vec::new());
        assert_eq!(report.eligible, 4);
        assert_eq!(report.counts.ready_to_publish, 2);
        assert!(report.consistent);
    }

    #[test]
    fn with_supplier_stock_excludes_only_the_stock_gate() {
        let products = vec![
            classified("a", Bucket::NoSupplierStock),
            classified("b", Bucket::NoSupplierStock),
            classified("c", Bucket::Clearance),
            classified("d", Bucket::LookupSkipped),
        ];
        let report = aggregate(products, Vec::new(), Vec::new());
        assert_eq!(report.total, 4);
        assert_eq!(report.with_supplier_stock, 2);
    }

    #[test]
    fn tree_places_each_entry_in_one_leaf_and_all_ancestors() {
        let products = vec![
            classified("a", Bucket::NoSupplierStock),
            classified("b", Bucket::Clearance),
            classified("c", Bucket::Published),
            classified("d", Bucket::ReadyToPublish),
            classified("e", Bucket::MissingDescription),
            classified("f", Bucket::CreationRequired),
            classified("g", Bucket::OwnStock),
        ];
        let report = aggregate(products, Vec::new(), Vec::new());
        let tree = &report.tree;
        assert_eq!(tree.label, "total");
        assert_eq!(tree.count, 7);
        assert!(tree.members.contains(&"a".to_string()));

        let with_stock = &tree.children[1];
        assert_eq!(with_stock.label, "with_supplier_stock");
        assert_eq!(with_stock.count, 6);
        assert!(!with_stock.members.contains(&"a".to_string()));

        let non_clearance = &with_stock.children[1];
        assert_eq!(non_clearance.count, 5);

        let eligible = &non_clearance.children[1];
        assert_eq!(eligible.label, "eligible");
        assert_eq!(eligible.count, 3);
        assert_eq!(eligible.count, report.eligible);

        // Each entry appears in exactly one leaf.
        let mut leaf_members: Vec<&String> = Vec::new();
        fn collect<'a>(node: &'a FunnelNode, out: &mut Vec<&'a String>) {
            if node.children.is_empty() {
                out.extend(node.members.iter());
            } else {
                for child in &node.children {
                    collect(child, out);
                }
            }
        }
        collect(tree, &mut leaf_members);
        assert_eq!(leaf_members.len(), 7);
    }

    #[test]
    fn non_substantive_buckets_stay_out_of_the_tree() {
        let products = vec![
            classified("a", Bucket::LookupSkipped),
            classified("b", Bucket::LookupFailed),
            classified("c", Bucket::Published),
        ];
        let report = aggregate(products, Vec::new(), Vec::new());
        assert_eq!(report.tree.count, 1);
        assert_eq!(report.counts.lookup_skipped, 1);
        assert_eq!(report.counts.lookup_failed, 1);
        assert!(report.consistent);

        // The headline stat counts unresolved entries too; the tree's
        // `with_supplier_stock` node holds only resolved ones.
        assert_eq!(report.with_supplier_stock, 3);
        assert_eq!(report.tree.children[1].count, 1);
    }

    #[test]
    fn errors_ride_along_without_touching_counts() {
        let errors = vec![EntryError {
            supplier_part: "bad".to_string(),
            detail: "negative quantity".to_string(),
        }];
        let report = aggregate(vec![classified("a", Bucket::Published)], errors, Vec::new());
        assert_eq!(report.total, 1);
        assert_eq!(report.input_errors.len(), 1);
        assert!(report.consistent);
    }

    fn arb_bucket() -> impl Strategy<Value = Bucket> {
        prop::sample::select(Bucket::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn funnel_identity_holds_for_random_inputs(buckets in prop::collection::vec(arb_bucket(), 0..200)) {
            let products: Vec<ClassifiedProduct> = buckets
                .iter()
                .enumerate()
                .map(|(i, bucket)| classified(&format!("p{i}"), *bucket))
                .collect();
            let report = aggregate(products, Vec::new(), Vec::new());

            prop_assert!(report.consistent);
            prop_assert_eq!(
                report.eligible,
                report.counts.ready_to_publish
                    + report.counts.missing_description
                    + report.counts.creation_required
            );
            // Totality: bucket counts partition the input.
            let sum: usize = Bucket::ALL.iter().map(|b| report.counts.get(*b)).sum();
            prop_assert_eq!(sum, report.total);
            prop_assert_eq!(
                report.with_supplier_stock,
                report.total - report.counts.no_supplier_stock
            );
        }
    }
}
