//! Parsing configuration for the map application
//!
//! Centralized configuration for page selectors and embedded-state keys.

use serde::{Deserialize, Serialize};

/// CSS selectors of the search and detail views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSelectors {
    /// Frame holding the search result list
    pub search_frame: String,

    /// One entry of the search result list
    pub result_entry: String,

    /// Address fragment inside an entry
    pub result_address: String,

    /// Link opening the detail view, inside an entry
    pub result_link: String,

    /// Frame holding the detail view
    pub detail_frame: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            search_frame: "#searchIframe".to_string(),
            result_entry: "#_pcmap_list_scroll_container > ul > li".to_string(),
            result_address: "span.CTXwV".to_string(),
            result_link: "a.place_bluelink".to_string(),
            detail_frame: "#entryIframe".to_string(),
        }
    }
}

/// Keys, prefixes and type tags of the embedded state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSchema {
    /// Global variable holding the state
    pub global_name: String,

    /// Key prefix of the root place-detail record
    pub root_prefix: String,

    /// Top-level query-result entry
    pub root_query_key: String,

    /// Key prefix of the aggregate blog review entry inside the query result
    pub blog_review_prefix: String,

    /// `__typename` of menu entries
    pub menu_type: String,

    /// Name used when the root record has none
    pub unknown_name: String,

    /// Inclusive bounds of prices counted into the average (excludes set menus)
    pub min_main_price: i64,
    pub max_main_price: i64,
}

impl Default for StateSchema {
    fn default() -> Self {
        Self {
            global_name: "__APOLLO_STATE__".to_string(),
            root_prefix: "PlaceDetailBase:".to_string(),
            root_query_key: "ROOT_QUERY".to_string(),
            blog_review_prefix: "fsasReviews({".to_string(),
            menu_type: "Menu".to_string(),
            unknown_name: "unknown".to_string(),
            min_main_price: 5_000,
            max_main_price: 80_000,
        }
    }
}

impl StateSchema {
    /// Expression evaluating to the embedded state, `null` when absent
    pub fn read_expression(&self) -> String {
        format!("window.{} || null", self.global_name)
    }

    /// Expression that is `true` once the embedded state holds at least one key
    pub fn ready_expression(&self) -> String {
        format!(
            "(() => {{ const s = window.{}; return !!s && Object.keys(s).length > 0; }})()",
            self.global_name
        )
    }
}
