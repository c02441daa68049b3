//! Derive the visible part of the collection from the search box and the
//! cuisine selector.
//!
//! A restaurant is visible when it passes every active criterion:
//! - search term: case-insensitive substring of the name, the cuisine type, or
//!   the name of any of its dishes
//! - cuisine filter: case-insensitive substring of the cuisine type
//!
//! An empty criterion is inactive. Survivors keep their collection order.

use crate::data::Restaurant;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    search: String,
    cuisine: String,
}

impl Filter {
    pub fn new(search: impl Into<String>, cuisine: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            cuisine: cuisine.into(),
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn cuisine(&self) -> &str {
        &self.cuisine
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn set_cuisine(&mut self, cuisine: impl Into<String>) {
        self.cuisine = cuisine.into();
    }

    pub fn is_active(&self) -> bool {
        !self.search.is_empty() || !self.cuisine.is_empty()
    }

    /// Indexes of the matching restaurants, ascending.
    pub fn positions(&self, restaurants: &[Restaurant]) -> Vec<usize> {
        let search = self.search.to_lowercase();
        let cuisine = self.cuisine.to_lowercase();
        restaurants
            .iter()
            .enumerate()
            .filter(|(_, restaurant)| matches_lowered(restaurant, &search, &cuisine))
            .map(|(idx, _)| idx)
            .collect()
    }
}

fn matches_lowered(restaurant: &Restaurant, search: &str, cuisine: &str) -> bool {
    let search_hit = search.is_empty()
        || contains_lowered(&restaurant.name, search)
        || contains_lowered(&restaurant.cuisine_type, search)
        || restaurant
            .dishes
            .iter()
            .any(|dish| contains_lowered(&dish.name, search));

    let cuisine_hit = cuisine.is_empty() || contains_lowered(&restaurant.cuisine_type, cuisine);

    search_hit && cuisine_hit
}

/// `needle` must already be lowercase.
pub(crate) fn contains_lowered(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Distinct non-empty cuisine types, in order of first appearance.
pub fn cuisine_types(restaurants: &[Restaurant]) -> Vec<String> {
    distinct_non_empty(restaurants.iter().map(|r| r.cuisine_type.as_str()))
}

pub(crate) fn distinct_non_empty<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        if !value.is_empty() && !seen.iter().any(|s| s == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DishFormBuilder, RestaurantFormBuilder};

    fn restaurant(name: &str, cuisine: &str, dishes: &[&str]) -> Restaurant {
        let mut r = RestaurantFormBuilder::default()
            .name(name)
            .cuisine_type(cuisine)
            .location("San Francisco")
            .build()
            .unwrap()
            .submit()
            .unwrap();
        for dish in dishes {
            r.dishes.push(
                DishFormBuilder::default()
                    .name(*dish)
                    .build()
                    .unwrap()
                    .submit()
                    .unwrap(),
            );
        }
        r
    }

    fn names(filter: Filter, all: &[Restaurant]) -> Vec<&str> {
        filter
            .positions(all)
            .into_iter()
            .map(|idx| all[idx].name.as_str())
            .collect()
    }

    fn sample() -> Vec<Restaurant> {
        vec![
            restaurant("Sushi Zen", "Japanese", &[]),
            restaurant("Cafe Matcha", "Cafe", &[]),
            restaurant("Taco Spot", "Mexican", &[]),
        ]
    }

    #[test]
    fn search_matches_name() {
        let all = sample();
        assert_eq!(names(Filter::new("matcha", ""), &all), vec!["Cafe Matcha"]);
    }

    #[test]
    fn search_matches_dish_names() {
        let mut all = sample();
        all.push(restaurant("Harbor Grill", "Seafood", &["Sushi Platter"]));

        assert_eq!(names(Filter::new("sushi", ""), &all), vec!["Sushi Zen", "Harbor Grill"]);
    }

    #[test]
    fn search_matches_cuisine_case_insensitively() {
        let all = sample();
        assert_eq!(names(Filter::new("MEXICAN", ""), &all), vec!["Taco Spot"]);
    }

    #[test]
    fn cuisine_filter_alone() {
        let mut all = sample();
        all.push(restaurant("Ramen Ya", "Japanese Noodles", &[]));

        assert_eq!(names(Filter::new("", "jap"), &all), vec!["Sushi Zen", "Ramen Ya"]);
    }

    #[test]
    fn both_criteria_must_hold() {
        let mut all = sample();
        all.push(restaurant("Matcha Bar", "Japanese", &[]));

        assert_eq!(names(Filter::new("matcha", "japanese"), &all), vec!["Matcha Bar"]);

        assert!(names(Filter::new("taco", "cafe"), &all).is_empty());
    }

    #[test]
    fn inactive_filter_keeps_everything_in_order() {
        let all = sample();
        let filter = Filter::default();
        assert!(!filter.is_active());
        assert_eq!(filter.positions(&all), vec![0, 1, 2]);
    }

    #[test]
    fn distinct_cuisines() {
        let mut all = sample();
        all.push(restaurant("Sushi Two", "Japanese", &[]));
        let mut blank = restaurant("Mystery", "x", &[]);
        blank.cuisine_type.clear();
        all.push(blank);

        assert_eq!(cuisine_types(&all), vec!["Japanese", "Cafe", "Mexican"]);
    }
}
