//! Co-purchase affinity between products bought in the same sale.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::facts::SaleBasket;

/// A product and the neighbour it was most often bought with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_name: String,
    pub recommended_product: String,
    pub co_count: u32,
}

/// Symmetric co-occurrence counts keyed by product name.
///
/// Both directions of a pair are always incremented together. Maps are
/// ordered so that ties resolve to the lexicographically smallest neighbour
/// and report rows come out in product-name order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoPurchaseGraph {
    counts: BTreeMap<String, BTreeMap<String, u32>>,
}

impl CoPurchaseGraph {
    pub fn from_baskets(baskets: &[SaleBasket]) -> Self {
        let mut graph = Self::default();
        for basket in baskets {
            graph.record_basket(&basket.product_names);
        }
        graph
    }

    /// Adds one basket. Repeated names count once; baskets with fewer than
    /// two distinct products add nothing.
    pub fn record_basket(&mut self, product_names: &[String]) {
        let distinct: BTreeSet<&str> = product_names.iter().map(String::as_str).collect();
        if distinct.len() < 2 {
            return;
        }

        let products: Vec<&str> = distinct.into_iter().collect();
        for (index, first) in products.iter().enumerate() {
            for second in &products[index + 1..] {
                self.increment(first, second);
                self.increment(second, first);
            }
        }
    }

    fn increment(&mut self, from: &str, to: &str) {
        *self
            .counts
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert(0) += 1;
    }

    pub fn co_count(&self, first: &str, second: &str) -> u32 {
        self.counts.get(first).and_then(|neighbours| neighbours.get(second)).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Highest-count neighbour of `product_name`; ties go to the smallest name.
    pub fn best_match(&self, product_name: &str) -> Option<(&str, u32)> {
        let neighbours = self.counts.get(product_name)?;
        let mut best: Option<(&str, u32)> = None;
        for (name, count) in neighbours {
            if best.map_or(true, |(_, best_count)| *count > best_count) {
                best = Some((name.as_str(), *count));
            }
        }
        best
    }

    /// One row per product that co-occurred with anything, in name order.
    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.counts
            .keys()
            .filter_map(|product| {
                self.best_match(product).map(|(recommended, co_count)| Recommendation {
                    product_name: product.clone(),
                    recommended_product: recommended.to_string(),
                    co_count,
                })
            })
            .collect()
    }

    /// Checkout mode: best matches for just the purchased products, without
    /// duplicates, in the order they were first produced.
    pub fn recommend_for(&self, purchased: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        purchased
            .iter()
            .filter_map(|product| self.best_match(product))
            .filter(|(recommended, _)| seen.insert(*recommended))
            .map(|(recommended, _)| recommended.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::CoPurchaseGraph;
    use crate::analytics::facts::SaleBasket;
    use crate::domain::sale::SaleId;

    fn basket(id: i64, names: &[&str]) -> SaleBasket {
        SaleBasket {
            sale_id: SaleId(id),
            product_names: names.iter().map(|name| name.to_string()).collect(),
        }
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn three_item_basket_counts_every_pair_once() {
        let graph = CoPurchaseGraph::from_baskets(&[basket(1, &["A", "B", "C"])]);

        assert_eq!(graph.co_count("A", "B"), 1);
        assert_eq!(graph.co_count("B", "C"), 1);
        assert_eq!(graph.co_count("A", "C"), 1);
    }

    #[test]
    fn ties_break_to_the_smallest_name() {
        let graph = CoPurchaseGraph::from_baskets(&[basket(1, &["C", "B", "A"])]);

        let rows = graph.recommendations();
        let pairs: Vec<(&str, &str)> = rows
            .iter()
            .map(|row| (row.product_name.as_str(), row.recommended_product.as_str()))
            .collect();
        assert_eq!(pairs, vec![("A", "B"), ("B", "A"), ("C", "A")]);
    }

    #[test]
    fn counts_are_symmetric_across_many_baskets() {
        let graph = CoPurchaseGraph::from_baskets(&[
            basket(1, &["Bread", "Milk", "Eggs"]),
            basket(2, &["Milk", "Bread"]),
            basket(3, &["Eggs", "Jam", "Milk"]),
            basket(4, &["Jam"]),
        ]);

        for first in ["Bread", "Milk", "Eggs", "Jam"] {
            for second in ["Bread", "Milk", "Eggs", "Jam"] {
                assert_eq!(graph.co_count(first, second), graph.co_count(second, first));
            }
        }
        assert_eq!(graph.co_count("Bread", "Milk"), 2);
        assert_eq!(graph.best_match("Bread"), Some(("Milk", 2)));
    }

    #[test]
    fn duplicate_names_in_a_basket_count_once() {
        let graph = CoPurchaseGraph::from_baskets(&[
            basket(1, &["Soap", "Soap"]),
            basket(2, &["Soap", "Towel", "Towel"]),
        ]);

        assert_eq!(graph.co_count("Soap", "Soap"), 0);
        assert_eq!(graph.co_count("Soap", "Towel"), 1);
    }

    #[test]
    fn products_never_bought_together_have_no_recommendation() {
        let graph = CoPurchaseGraph::from_baskets(&[basket(1, &["Solo"]), basket(2, &["X", "Y"])]);

        assert!(graph.best_match("Solo").is_none());
        assert_eq!(graph.recommendations().len(), 2);
    }

    #[test]
    fn checkout_mode_limits_to_purchased_products_and_deduplicates() {
        let graph = CoPurchaseGraph::from_baskets(&[
            basket(1, &["Pasta", "Sauce"]),
            basket(2, &["Cheese", "Sauce"]),
            basket(3, &["Pasta", "Sauce", "Cheese"]),
            basket(4, &["Wine", "Cheese"]),
        ]);

        let recommended = graph.recommend_for(&names(&["Pasta", "Cheese", "Unknown"]));

        assert_eq!(recommended, names(&["Sauce"]));
    }

    #[test]
    fn no_baskets_yield_no_recommendations() {
        let graph = CoPurchaseGraph::from_baskets(&[]);

        assert!(graph.is_empty());
        assert!(graph.recommendations().is_empty());
        assert!(graph.recommend_for(&names(&["Anything"])).is_empty());
    }
}
