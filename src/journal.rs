use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    data::{Dish, DishId, Restaurant, RestaurantId, ValidationError},
    db,
    filter::{self, Filter},
};

pub const SNAPSHOT_KEY: &str = "restaurants";

/// The user's restaurants in insertion order.
///
/// Every mutator leaves `self` untouched and hands back the next collection.
/// Operations aimed at an id that is not present return an identical copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection {
    restaurants: Vec<Restaurant>,
}

impl Collection {
    pub fn new(restaurants: Vec<Restaurant>) -> Self {
        Self { restaurants }
    }

    pub fn restaurants(&self) -> &[Restaurant] {
        &self.restaurants
    }

    pub fn len(&self) -> usize {
        self.restaurants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restaurants.is_empty()
    }

    pub fn get(&self, id: RestaurantId) -> Option<&Restaurant> {
        self.restaurants.iter().find(|r| r.id == id)
    }

    pub fn contains_foursquare_id(&self, foursquare_id: &str) -> bool {
        self.restaurants
            .iter()
            .any(|r| r.foursquare_id.as_deref() == Some(foursquare_id))
    }

    pub fn with_restaurant(&self, restaurant: Restaurant) -> Result<Self, ValidationError> {
        restaurant.validate()?;
        if self.get(restaurant.id).is_some() {
            return Err(ValidationError::DuplicateId(restaurant.id));
        }
        let mut next = self.restaurants.clone();
        next.push(restaurant);
        Ok(Self::new(next))
    }

    pub fn with_updated_restaurant(&self, restaurant: Restaurant) -> Self {
        self.map_restaurant(restaurant.id, |_| restaurant.clone())
    }

    pub fn without_restaurant(&self, id: RestaurantId) -> Self {
        Self::new(
            self.restaurants
                .iter()
                .filter(|r| r.id != id)
                .cloned()
                .collect(),
        )
    }

    /// Appends `dish`; a dish id already used by this restaurant is ignored.
    pub fn with_dish(&self, restaurant_id: RestaurantId, dish: Dish) -> Self {
        self.map_restaurant(restaurant_id, |r| {
            let mut next = r.clone();
            if r.dish(dish.id).is_none() {
                next.dishes.push(dish.clone());
            }
            next
        })
    }

    pub fn with_updated_dish(&self, restaurant_id: RestaurantId, dish: Dish) -> Self {
        self.map_restaurant(restaurant_id, |r| {
            let mut next = r.clone();
            next.dishes = r
                .dishes
                .iter()
                .map(|d| if d.id == dish.id { dish.clone() } else { d.clone() })
                .collect();
            next
        })
    }

    pub fn without_dish(&self, restaurant_id: RestaurantId, dish_id: DishId) -> Self {
        self.map_restaurant(restaurant_id, |r| {
            let mut next = r.clone();
            next.dishes.retain(|d| d.id != dish_id);
            next
        })
    }

    fn map_restaurant(&self, id: RestaurantId, f: impl Fn(&Restaurant) -> Restaurant) -> Self {
        Self::new(
            self.restaurants
                .iter()
                .map(|r| if r.id == id { f(r) } else { r.clone() })
                .collect(),
        )
    }
}

/// Owns the collection, keeps its snapshot in sync and maintains the view
/// derived from the current [`Filter`].
pub struct Journal {
    db_conn: SqlitePool,
    collection: Collection,
    filter: Filter,
    visible: Vec<usize>,
    cuisines: Vec<String>,
}

impl Journal {
    /// Read the snapshot. A missing, unreadable or corrupt snapshot gives an
    /// empty journal.
    pub async fn load(db_conn: SqlitePool) -> Self {
        let collection = match db::read_snapshot(&db_conn, SNAPSHOT_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Collection>(&raw) {
                Ok(collection) => collection,
                Err(e) => {
                    tracing::warn!("snapshot is corrupt, starting with an empty journal: {e}");
                    Collection::default()
                }
            },
            Ok(None) => Collection::default(),
            Err(e) => {
                tracing::warn!("fail to read snapshot, starting with an empty journal: {e:#}");
                Collection::default()
            }
        };
        tracing::debug!("loaded {} restaurants", collection.len());

        let mut journal = Self {
            db_conn,
            collection,
            filter: Filter::default(),
            visible: Vec::new(),
            cuisines: Vec::new(),
        };
        journal.refresh();
        journal
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Restaurants passing the current filter, in collection order.
    pub fn visible(&self) -> Vec<&Restaurant> {
        let all = self.collection.restaurants();
        self.visible.iter().map(|&idx| &all[idx]).collect()
    }

    pub fn cuisine_types(&self) -> &[String] {
        &self.cuisines
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filter.set_search(search);
        self.refresh();
    }

    pub fn set_cuisine_filter(&mut self, cuisine: impl Into<String>) {
        self.filter.set_cuisine(cuisine);
        self.refresh();
    }

    pub async fn save(&self) -> anyhow::Result<()> {
        let raw = serde_json::to_string(&self.collection).context("fail to encode journal")?;
        db::write_snapshot(&self.db_conn, SNAPSHOT_KEY, &raw).await
    }

    pub async fn add_restaurant(&mut self, restaurant: Restaurant) -> anyhow::Result<()> {
        let name = restaurant.name.clone();
        let next = self
            .collection
            .with_restaurant(restaurant)
            .with_context(|| format!("fail to add restaurant {name}"))?;
        self.commit(next).await?;
        Ok(())
    }

    /// Returns whether a restaurant with the same id was replaced.
    pub async fn update_restaurant(&mut self, restaurant: Restaurant) -> anyhow::Result<bool> {
        let next = self.collection.with_updated_restaurant(restaurant);
        self.commit(next).await
    }

    pub async fn delete_restaurant(&mut self, id: RestaurantId) -> anyhow::Result<bool> {
        let next = self.collection.without_restaurant(id);
        self.commit(next).await
    }

    pub async fn add_dish(&mut self, restaurant_id: RestaurantId, dish: Dish) -> anyhow::Result<bool> {
        let next = self.collection.with_dish(restaurant_id, dish);
        self.commit(next).await
    }

    pub async fn update_dish(
        &mut self,
        restaurant_id: RestaurantId,
        dish: Dish,
    ) -> anyhow::Result<bool> {
        let next = self.collection.with_updated_dish(restaurant_id, dish);
        self.commit(next).await
    }

    pub async fn delete_dish(
        &mut self,
        restaurant_id: RestaurantId,
        dish_id: DishId,
    ) -> anyhow::Result<bool> {
        let next = self.collection.without_dish(restaurant_id, dish_id);
        self.commit(next).await
    }

    async fn commit(&mut self, next: Collection) -> anyhow::Result<bool> {
        if next == self.collection {
            return Ok(false);
        }
        self.collection = next;
        self.refresh();
        self.save().await?;
        Ok(true)
    }

    fn refresh(&mut self) {
        self.visible = self.filter.positions(self.collection.restaurants());
        self.cuisines = filter::cuisine_types(self.collection.restaurants());
    }
}
