//! Place detail parser
//!
//! Turns the embedded state of a place detail view into [`PlaceDetail`]:
//! name, rating, visitor and blog review counts, menu and average main-menu
//! price. Only a missing root record or a malformed number fails the parse.

use serde_json::Value;
use tracing::debug;

use super::config::StateSchema;
use super::embedded_state::{parse_price, EmbeddedState};
use super::{ParsingError, ParsingResult, StateParser};
use crate::domain::record::{MenuItem, PlaceDetail};

const FIELD_NAME: &str = "name";
const FIELD_VISITOR_REVIEWS: &str = "visitorReviewsTotal";
const FIELD_RATING: &str = "visitorReviewsScore";
const FIELD_BLOG_TOTAL: &str = "total";
const FIELD_PRICE: &str = "price";

/// Parser for the place detail embedded state
#[derive(Debug, Clone, Default)]
pub struct PlaceDetailParser {
    schema: StateSchema,
}

impl PlaceDetailParser {
    pub fn new(schema: StateSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    fn blog_reviews(&self, state: &EmbeddedState) -> ParsingResult<i64> {
        let aggregate = state
            .record(&self.schema.root_query_key)
            .and_then(|query| query.nested_with_prefix(&self.schema.blog_review_prefix));

        match aggregate {
            Some(entry) => entry.count(FIELD_BLOG_TOTAL),
            None => {
                debug!("Blog review aggregate not present, counting 0");
                Ok(0)
            }
        }
    }

    fn menu_items(&self, state: &EmbeddedState) -> Vec<MenuItem> {
        state
            .records_of_type(&self.schema.menu_type)
            .filter_map(|menu| {
                Some(MenuItem {
                    item: menu.text(FIELD_NAME)?,
                    price: menu.text(FIELD_PRICE)?,
                })
            })
            .collect()
    }

    /// Mean of main-menu prices rounded half-to-even to 2 decimals, 0.0 when none qualify
    pub fn average_price(&self, menu_items: &[MenuItem]) -> f64 {
        let range = self.schema.min_main_price..=self.schema.max_main_price;
        let prices: Vec<i64> = menu_items
            .iter()
            .filter_map(|menu| parse_price(&menu.price))
            .filter(|price| range.contains(price))
            .collect();

        if prices.is_empty() {
            return 0.0;
        }
        let mean = prices.iter().sum::<i64>() as f64 / prices.len() as f64;
        (mean * 100.0).round_ties_even() / 100.0
    }
}

impl StateParser for PlaceDetailParser {
    type Output = PlaceDetail;

    fn parse(&self, value: &Value) -> ParsingResult<PlaceDetail> {
        let state = EmbeddedState::from_value(value)?;
        let root = state
            .record_with_prefix(&self.schema.root_prefix)
            .ok_or_else(|| ParsingError::root_record_missing(&self.schema.root_prefix))?;

        let name = root
            .str_field(FIELD_NAME)
            .unwrap_or(self.schema.unknown_name.as_str())
            .to_string();
        let visitor_reviews = root.count(FIELD_VISITOR_REVIEWS)?;
        let rating = root.number(FIELD_RATING)?;
        let blog_reviews = self.blog_reviews(&state)?;
        let menu_items = self.menu_items(&state);
        let avg_price = self.average_price(&menu_items);

        debug!(
            "Parsed '{}' from {} state entries ({} menu items)",
            name,
            state.len(),
            menu_items.len()
        );

        Ok(PlaceDetail {
            name,
            rating,
            visitor_reviews,
            blog_reviews,
            menu_items,
            avg_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_state() -> Value {
        json!({
            "PlaceDetailBase:1658029392": {
                "__typename": "PlaceDetailBase",
                "name": "토속촌 삼계탕",
                "visitorReviewsTotal": "12,345",
                "visitorReviewsScore": 4.42
            },
            "Menu:1658029392_0": { "__typename": "Menu", "name": "삼계탕", "price": "20,000" },
            "Menu:1658029392_1": { "__typename": "Menu", "name": "오골계 삼계탕", "price": "29000" },
            "Menu:1658029392_2": { "__typename": "Menu", "name": "전기구이 통닭", "price": "" },
            "Menu:1658029392_3": { "__typename": "Menu", "name": "단체 코스", "price": "150,000" },
            "ROOT_QUERY": {
                "__typename": "Query",
                "fsasReviews({\"input\":{\"businessId\":\"1658029392\"}})": {
                    "__typename": "FsasReviewsResult",
                    "total": "3,210"
                }
            }
        })
    }

    fn menu(prices: &[&str]) -> Vec<MenuItem> {
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| MenuItem {
                item: format!("menu {i}"),
                price: (*price).to_string(),
            })
            .collect()
    }

    #[test]
    fn test_parses_complete_state() {
        let detail = PlaceDetailParser::default().parse(&sample_state()).unwrap();

        assert_eq!(detail.name, "토속촌 삼계탕");
        assert_eq!(detail.visitor_reviews, 12_345);
        assert_eq!(detail.rating, 4.42);
        assert_eq!(detail.blog_reviews, 3_210);
        assert_eq!(detail.menu_items.len(), 3);
        assert_eq!(detail.menu_items[0].item, "삼계탕");
        assert_eq!(detail.menu_items[2].price, "150,000");
        assert_eq!(detail.avg_price, 24_500.0);
    }

    #[test]
    fn test_average_price_keeps_main_menu_range() {
        let parser = PlaceDetailParser::default();
        let items = menu(&["3000", "15000", "90000", "42000"]);
        assert_eq!(parser.average_price(&items), 28_500.0);
    }

    #[test]
    fn test_average_price_rounds_to_two_decimals() {
        let parser = PlaceDetailParser::default();
        let items = menu(&["10000", "10000", "10001"]);
        assert_eq!(parser.average_price(&items), 10_000.33);
    }

    #[test]
    fn test_average_price_rounds_exact_ties_to_even() {
        let parser = PlaceDetailParser::default();
        // 평균 10000.125 → 10000.12
        let mut prices = vec!["10001"];
        prices.extend(["10000"; 7]);
        assert_eq!(parser.average_price(&menu(&prices)), 10_000.12);
        // 평균 10000.375 → 10000.38
        let mut prices = vec!["10003"];
        prices.extend(["10000"; 7]);
        assert_eq!(parser.average_price(&menu(&prices)), 10_000.38);
    }

    #[test]
    fn test_average_price_without_qualifying_prices() {
        let parser = PlaceDetailParser::default();
        assert_eq!(parser.average_price(&menu(&["1000", "시가"])), 0.0);
        assert_eq!(parser.average_price(&[]), 0.0);
    }

    #[test]
    fn test_missing_blog_aggregate_counts_zero() {
        let mut state = sample_state();
        state.as_object_mut().unwrap().remove("ROOT_QUERY");

        let detail = PlaceDetailParser::default().parse(&state).unwrap();
        assert_eq!(detail.blog_reviews, 0);
        assert_eq!(detail.visitor_reviews, 12_345);
        assert_eq!(detail.menu_items.len(), 3);
    }

    #[test]
    fn test_missing_root_record_fails() {
        let state = json!({ "Menu:1": { "__typename": "Menu", "name": "a", "price": "9000" } });
        let err = PlaceDetailParser::default().parse(&state).unwrap_err();
        assert!(matches!(err, ParsingError::RootRecordMissing { .. }));
    }

    #[test]
    fn test_defaults_for_sparse_root_record() {
        let state = json!({ "PlaceDetailBase:9": { "__typename": "PlaceDetailBase" } });
        let detail = PlaceDetailParser::default().parse(&state).unwrap();

        assert_eq!(detail.name, "unknown");
        assert_eq!(detail.visitor_reviews, 0);
        assert_eq!(detail.rating, 0.0);
        assert!(detail.menu_items.is_empty());
        assert_eq!(detail.avg_price, 0.0);
    }

    #[test]
    fn test_malformed_review_count_fails() {
        let state = json!({ "PlaceDetailBase:9": { "visitorReviewsTotal": "lots" } });
        let err = PlaceDetailParser::default().parse(&state).unwrap_err();
        assert!(matches!(err, ParsingError::InvalidNumber { .. }));
    }
}
