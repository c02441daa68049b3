use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RestaurantId = Uuid;
pub type DishId = Uuid;

/// Everything a form or an edit can reject before it reaches the collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("rating must be between 0 and 5, got {0}")]
    RatingOutOfRange(u8),
    #[error("invalid visit date {0:?}, expected YYYY-MM-DD")]
    InvalidVisitDate(String),
    #[error("no visit date at position {0}")]
    NoSuchVisitDate(usize),
    #[error("unknown price range {0:?}, expected one of $, $$, $$$, $$$$")]
    InvalidPriceRange(String),
    #[error("a restaurant with id {0} already exists")]
    DuplicateId(RestaurantId),
}

/// Star rating, 0 means unrated.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MAX: u8 = 5;

    pub fn new(stars: u8) -> Result<Self, ValidationError> {
        if stars > Self::MAX {
            return Err(ValidationError::RatingOutOfRange(stars));
        }
        Ok(Self(stars))
    }

    /// Round a fractional score (as reported by discovery sources) into the
    /// star range.
    pub fn from_score(score: f64) -> Self {
        if !score.is_finite() || score <= 0.0 {
            return Self(0);
        }
        Self(score.round().min(Self::MAX as f64) as u8)
    }

    pub fn stars(self) -> u8 {
        self.0
    }

    pub fn is_rated(self) -> bool {
        self.0 > 0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ValidationError;

    fn try_from(stars: u8) -> Result<Self, Self::Error> {
        Self::new(stars)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for star in 1..=Self::MAX {
            f.write_str(if star <= self.0 { "★" } else { "☆" })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceRange {
    #[default]
    #[serde(rename = "")]
    Unset,
    #[serde(rename = "$")]
    Budget,
    #[serde(rename = "$$")]
    Moderate,
    #[serde(rename = "$$$")]
    Expensive,
    #[serde(rename = "$$$$")]
    VeryExpensive,
}

impl PriceRange {
    /// Map a price tier to the matching run of `$`. Tiers above 4 saturate.
    pub fn from_tier(tier: u8) -> Self {
        match tier {
            0 => Self::Unset,
            1 => Self::Budget,
            2 => Self::Moderate,
            3 => Self::Expensive,
            _ => Self::VeryExpensive,
        }
    }

    pub fn tier(self) -> u8 {
        self.as_str().len() as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Budget => "$",
            Self::Moderate => "$$",
            Self::Expensive => "$$$",
            Self::VeryExpensive => "$$$$",
        }
    }
}

impl FromStr for PriceRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Ok(Self::Unset),
            "$" => Ok(Self::Budget),
            "$$" => Ok(Self::Moderate),
            "$$$" => Ok(Self::Expensive),
            "$$$$" => Ok(Self::VeryExpensive),
            other => Err(ValidationError::InvalidPriceRange(other.to_string())),
        }
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub cuisine_type: String,
    pub location: String,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub price_range: PriceRange,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub visit_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub dishes: Vec<Dish>,
    /// Set only for restaurants imported from discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foursquare_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub id: DishId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub notes: String,
}

impl Restaurant {
    pub fn dish(&self, id: DishId) -> Option<&Dish> {
        self.dishes.iter().find(|dish| dish.id == id)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        required("name", &self.name)?;
        required("cuisine type", &self.cuisine_type)?;
        required("location", &self.location)?;
        Ok(())
    }

    /// Produce a new record with one field changed, keeping identity and dishes.
    pub fn edited(&self, edit: RestaurantEdit) -> Result<Restaurant, ValidationError> {
        let mut next = self.clone();
        match edit {
            RestaurantEdit::Name(name) => next.name = required("name", &name)?,
            RestaurantEdit::CuisineType(cuisine) => {
                next.cuisine_type = required("cuisine type", &cuisine)?
            }
            RestaurantEdit::Location(location) => {
                next.location = required("location", &location)?
            }
            RestaurantEdit::Rating(rating) => next.rating = rating,
            RestaurantEdit::PriceRange(price) => next.price_range = price,
            RestaurantEdit::Notes(notes) => next.notes = notes,
            RestaurantEdit::AddVisitDate(date) => next.visit_dates.push(date),
            RestaurantEdit::RemoveVisitDate(index) => {
                if index >= next.visit_dates.len() {
                    return Err(ValidationError::NoSuchVisitDate(index));
                }
                next.visit_dates.remove(index);
            }
        }
        Ok(next)
    }
}

impl Dish {
    pub fn edited(&self, edit: DishEdit) -> Result<Dish, ValidationError> {
        let mut next = self.clone();
        match edit {
            DishEdit::Name(name) => next.name = required("dish name", &name)?,
            DishEdit::Description(description) => next.description = description,
            DishEdit::Rating(rating) => next.rating = rating,
            DishEdit::Notes(notes) => next.notes = notes,
        }
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestaurantEdit {
    Name(String),
    CuisineType(String),
    Location(String),
    Rating(Rating),
    PriceRange(PriceRange),
    Notes(String),
    AddVisitDate(NaiveDate),
    /// Position in `visit_dates`, duplicates make the date alone ambiguous.
    RemoveVisitDate(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DishEdit {
    Name(String),
    Description(String),
    Rating(Rating),
    Notes(String),
}

/// The fields a user fills in to create or replace a restaurant.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct RestaurantForm {
    name: String,
    cuisine_type: String,
    location: String,
    #[builder(default)]
    rating: Rating,
    #[builder(default)]
    price_range: PriceRange,
    #[builder(default)]
    notes: String,
    #[builder(default)]
    visit_dates: Vec<NaiveDate>,
}

impl RestaurantForm {
    pub fn from_restaurant(restaurant: &Restaurant) -> Self {
        Self {
            name: restaurant.name.clone(),
            cuisine_type: restaurant.cuisine_type.clone(),
            location: restaurant.location.clone(),
            rating: restaurant.rating,
            price_range: restaurant.price_range,
            notes: restaurant.notes.clone(),
            visit_dates: restaurant.visit_dates.clone(),
        }
    }

    pub fn submit(self) -> Result<Restaurant, ValidationError> {
        self.into_restaurant(Uuid::new_v4(), Vec::new(), None)
    }

    /// Replace `original`'s editable fields, keeping its id, dishes and origin.
    pub fn submit_edit(self, original: &Restaurant) -> Result<Restaurant, ValidationError> {
        self.into_restaurant(
            original.id,
            original.dishes.clone(),
            original.foursquare_id.clone(),
        )
    }

    fn into_restaurant(
        self,
        id: RestaurantId,
        dishes: Vec<Dish>,
        foursquare_id: Option<String>,
    ) -> Result<Restaurant, ValidationError> {
        Ok(Restaurant {
            id,
            name: required("name", &self.name)?,
            cuisine_type: required("cuisine type", &self.cuisine_type)?,
            location: required("location", &self.location)?,
            rating: self.rating,
            price_range: self.price_range,
            notes: self.notes,
            visit_dates: self.visit_dates,
            dishes,
            foursquare_id,
        })
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct DishForm {
    name: String,
    #[builder(default)]
    description: String,
    #[builder(default)]
    rating: Rating,
    #[builder(default)]
    notes: String,
}

impl DishForm {
    pub fn submit(self) -> Result<Dish, ValidationError> {
        self.into_dish(Uuid::new_v4())
    }

    pub fn submit_edit(self, original: &Dish) -> Result<Dish, ValidationError> {
        self.into_dish(original.id)
    }

    fn into_dish(self, id: DishId) -> Result<Dish, ValidationError> {
        Ok(Dish {
            id,
            name: required("dish name", &self.name)?,
            description: self.description,
            rating: self.rating,
            notes: self.notes,
        })
    }
}

pub fn parse_visit_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidVisitDate(s.to_string()))
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(value.to_string())
}
