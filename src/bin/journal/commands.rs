use std::io::{self, Write};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use foodie_journal::{
    data::{
        parse_visit_date, Dish, DishEdit, DishFormBuilder, PriceRange, Rating, Restaurant,
        RestaurantEdit, RestaurantFormBuilder,
    },
    discover::{self, DiscoverView, DiscoveryClient, SortBy, Suggestion, DEFAULT_AREA, SOURCE_NAME},
    journal::{Collection, Journal},
};
use fuzzy_matcher::{skim::SkimMatcherV2, FuzzyMatcher};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "journal", version, about = "A cozy journal of favorite restaurants and dishes")]
pub(super) struct Cli {
    #[command(subcommand)]
    pub(super) command: Command,
}

#[derive(Subcommand)]
pub(super) enum Command {
    /// Show the restaurants passing the search term and cuisine filter
    List {
        /// Matches restaurant names, cuisine types and dish names
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long, default_value = "")]
        cuisine: String,
        /// Also print every dish
        #[arg(long)]
        dishes: bool,
    },
    /// Show one restaurant with its dishes
    Show { restaurant: String },
    /// List the cuisine types present in the journal
    Cuisines,
    /// Add a restaurant
    Add(NewRestaurant),
    /// Change fields of a restaurant
    Edit {
        restaurant: String,
        #[command(flatten)]
        changes: RestaurantChanges,
    },
    /// Remove a restaurant together with its dishes
    Delete {
        restaurant: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Manage the dishes of a restaurant
    #[command(subcommand)]
    Dish(DishCommand),
    /// List the neighborhoods discover can search
    Areas,
    /// Browse nearby suggestions
    Discover(DiscoverArgs),
    /// Add a suggestion to the journal
    Import {
        /// Suggestion id or name
        suggestion: String,
        #[arg(long, default_value = DEFAULT_AREA)]
        area: String,
    },
}

#[derive(Args)]
pub(super) struct NewRestaurant {
    #[arg(long)]
    name: String,
    #[arg(long)]
    cuisine: String,
    #[arg(long)]
    location: String,
    #[arg(long, value_parser = parse_rating, default_value = "0")]
    rating: Rating,
    /// One of $, $$, $$$, $$$$
    #[arg(long, default_value = "")]
    price: PriceRange,
    #[arg(long, default_value = "")]
    notes: String,
    /// YYYY-MM-DD, repeatable
    #[arg(long = "visited", value_parser = parse_date)]
    visit_dates: Vec<NaiveDate>,
}

#[derive(Args)]
pub(super) struct RestaurantChanges {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    cuisine: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long, value_parser = parse_rating)]
    rating: Option<Rating>,
    #[arg(long)]
    price: Option<PriceRange>,
    #[arg(long)]
    notes: Option<String>,
    /// Record a visit, YYYY-MM-DD, repeatable
    #[arg(long = "visited", value_parser = parse_date)]
    add_visits: Vec<NaiveDate>,
    /// Forget the visit at this position (starting at 0), repeatable
    #[arg(long = "forget-visit")]
    forget_visits: Vec<usize>,
}

impl RestaurantChanges {
    fn into_edits(self) -> Vec<RestaurantEdit> {
        let mut edits = Vec::new();
        if let Some(name) = self.name {
            edits.push(RestaurantEdit::Name(name));
        }
        if let Some(cuisine) = self.cuisine {
            edits.push(RestaurantEdit::CuisineType(cuisine));
        }
        if let Some(location) = self.location {
            edits.push(RestaurantEdit::Location(location));
        }
        if let Some(rating) = self.rating {
            edits.push(RestaurantEdit::Rating(rating));
        }
        if let Some(price) = self.price {
            edits.push(RestaurantEdit::PriceRange(price));
        }
        if let Some(notes) = self.notes {
            edits.push(RestaurantEdit::Notes(notes));
        }

        // highest first so earlier removals do not shift later positions
        let mut forget = self.forget_visits;
        forget.sort_unstable_by(|a, b| b.cmp(a));
        forget.dedup();
        edits.extend(forget.into_iter().map(RestaurantEdit::RemoveVisitDate));
        edits.extend(self.add_visits.into_iter().map(RestaurantEdit::AddVisitDate));
        edits
    }
}

#[derive(Subcommand)]
pub(super) enum DishCommand {
    /// Add a dish to a restaurant
    Add {
        restaurant: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_parser = parse_rating, default_value = "0")]
        rating: Rating,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Change fields of a dish
    Edit {
        restaurant: String,
        dish: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_rating)]
        rating: Option<Rating>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Remove a dish
    Delete { restaurant: String, dish: String },
}

#[derive(Args)]
pub(super) struct DiscoverArgs {
    /// Neighborhood key, see `journal areas`
    #[arg(long, default_value = DEFAULT_AREA)]
    area: String,
    /// rating or distance
    #[arg(long, default_value = "rating")]
    sort: SortBy,
    #[arg(long, default_value = "")]
    cuisine: String,
    /// Drop the server's cached results first
    #[arg(long)]
    refresh: bool,
}

fn parse_rating(s: &str) -> Result<Rating, String> {
    let stars: u8 = s
        .parse()
        .map_err(|_| format!("{s:?} is not a number of stars"))?;
    Rating::new(stars).map_err(|e| e.to_string())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    parse_visit_date(s).map_err(|e| e.to_string())
}

pub(super) async fn run(
    command: Command,
    mut journal: Journal,
    client: &DiscoveryClient,
) -> anyhow::Result<()> {
    match command {
        Command::List {
            search,
            cuisine,
            dishes,
        } => {
            journal.set_search(search);
            journal.set_cuisine_filter(cuisine);
            let visible = journal.visible();
            if visible.is_empty() {
                if journal.collection().is_empty() {
                    println!("The journal is empty. Add your first restaurant with `journal add`.");
                } else {
                    println!("No restaurants match.");
                }
                return Ok(());
            }
            let shown = visible.len();
            for restaurant in visible {
                println!("{}", render_restaurant(restaurant, dishes));
            }
            if journal.filter().is_active() {
                println!("{shown} of {} restaurants match.", journal.collection().len());
            }
        }
        Command::Show { restaurant } => {
            let restaurant = find_restaurant(journal.collection(), &restaurant)?;
            println!("{}", render_restaurant(restaurant, true));
        }
        Command::Cuisines => {
            for cuisine in journal.cuisine_types() {
                println!("{cuisine}");
            }
        }
        Command::Add(new) => {
            let restaurant = RestaurantFormBuilder::default()
                .name(new.name)
                .cuisine_type(new.cuisine)
                .location(new.location)
                .rating(new.rating)
                .price_range(new.price)
                .notes(new.notes)
                .visit_dates(new.visit_dates)
                .build()?
                .submit()?;
            let id = restaurant.id;
            journal.add_restaurant(restaurant).await?;
            println!("Added. id: {id}");
        }
        Command::Edit {
            restaurant,
            changes,
        } => {
            let original = find_restaurant(journal.collection(), &restaurant)?.clone();
            let edited = changes
                .into_edits()
                .into_iter()
                .try_fold(original, |current, edit| current.edited(edit))?;
            report(journal.update_restaurant(edited).await?);
        }
        Command::Delete { restaurant, yes } => {
            let target = find_restaurant(journal.collection(), &restaurant)?;
            let (id, name) = (target.id, target.name.clone());
            let prompt = format!(
                "Are you sure you want to delete {name} and its {} dishes?",
                target.dishes.len()
            );
            if !yes && !confirm(&prompt)? {
                println!("Kept {name}.");
                return Ok(());
            }
            report(journal.delete_restaurant(id).await?);
        }
        Command::Dish(action) => run_dish(action, &mut journal).await?,
        Command::Areas => {
            for area in discover::AREAS {
                println!(
                    "{:<12} {} ({:.1} km around {}, {})",
                    area.key,
                    area.name,
                    area.radius as f64 / 1000.0,
                    area.lat,
                    area.lon
                );
            }
        }
        Command::Discover(args) => {
            let mut view = fetch_view(&args.area, args.refresh, client).await?;
            view.set_sort(args.sort);
            view.set_cuisine_filter(args.cuisine);
            print_suggestions(&view, journal.collection());
        }
        Command::Import { suggestion, area } => {
            let view = fetch_view(&area, false, client).await?;
            let found = view
                .suggestion(&suggestion)
                .or_else(|| {
                    view.suggestions()
                        .iter()
                        .find(|s| s.name.eq_ignore_ascii_case(&suggestion))
                })
                .with_context(|| {
                    format!("no suggestion {suggestion:?} in {}", view.area().name)
                })?;

            if discover::is_already_favorite(found, journal.collection()) {
                println!("{} is already in your favorites.", found.name);
                return Ok(());
            }
            let restaurant = discover::to_favorite(found);
            let id = restaurant.id;
            journal.add_restaurant(restaurant).await?;
            println!("Added {} to your favorites. id: {id}", found.name);
        }
    }

    Ok(())
}

async fn run_dish(action: DishCommand, journal: &mut Journal) -> anyhow::Result<()> {
    match action {
        DishCommand::Add {
            restaurant,
            name,
            description,
            rating,
            notes,
        } => {
            let restaurant_id = find_restaurant(journal.collection(), &restaurant)?.id;
            let dish = DishFormBuilder::default()
                .name(name)
                .description(description)
                .rating(rating)
                .notes(notes)
                .build()?
                .submit()?;
            let id = dish.id;
            journal.add_dish(restaurant_id, dish).await?;
            println!("Added. id: {id}");
        }
        DishCommand::Edit {
            restaurant,
            dish,
            name,
            description,
            rating,
            notes,
        } => {
            let parent = find_restaurant(journal.collection(), &restaurant)?;
            let original = find_dish(parent, &dish)?.clone();
            let restaurant_id = parent.id;

            let edits = [
                name.map(DishEdit::Name),
                description.map(DishEdit::Description),
                rating.map(DishEdit::Rating),
                notes.map(DishEdit::Notes),
            ];
            let edited = edits
                .into_iter()
                .flatten()
                .try_fold(original, |current, edit| current.edited(edit))?;
            report(journal.update_dish(restaurant_id, edited).await?);
        }
        DishCommand::Delete { restaurant, dish } => {
            let parent = find_restaurant(journal.collection(), &restaurant)?;
            let dish_id = find_dish(parent, &dish)?.id;
            let restaurant_id = parent.id;
            report(journal.delete_dish(restaurant_id, dish_id).await?);
        }
    }
    Ok(())
}

/// Fetch the suggestions of one neighborhood. A failed fetch becomes an error
/// telling the user how to retry.
async fn fetch_view(
    area_key: &str,
    refresh: bool,
    client: &DiscoveryClient,
) -> anyhow::Result<DiscoverView> {
    let area = discover::area(area_key)
        .with_context(|| format!("unknown area {area_key:?}, see `journal areas`"))?;
    let mut view = DiscoverView::new(area);
    let Some(ticket) = view.refresh() else {
        anyhow::bail!("a discover request is already running");
    };

    let params = view.params();
    let outcome = if refresh {
        client.clear_cache(&params).await
    } else {
        client.fetch_suggestions(&params).await
    };
    view.finish(ticket, outcome);

    if let Some(err) = view.error() {
        anyhow::bail!(
            "{err}\nMake sure the discovery server is running at {} and try again.",
            client.base_url()
        );
    }
    Ok(view)
}

fn print_suggestions(view: &DiscoverView, collection: &Collection) {
    let shown = view.displayed();
    println!("Exploring {}", view.area().name);
    if view.is_cached() {
        println!("(cached results)");
    }
    println!();

    if shown.is_empty() {
        println!("No restaurants found. Try other filters or --refresh.");
    }
    for suggestion in &shown {
        println!(
            "{}",
            render_suggestion(suggestion, discover::is_already_favorite(suggestion, collection))
        );
    }

    let cuisines = view.cuisines();
    if !cuisines.is_empty() {
        println!("Cuisines: {}", cuisines.join(", "));
    }
    println!(
        "Found {} restaurant{} • Powered by {SOURCE_NAME}",
        shown.len(),
        if shown.len() == 1 { "" } else { "s" }
    );
}

fn render_suggestion(suggestion: &Suggestion, favorite: bool) -> String {
    let mut out = format!(
        "{}  [{}]  {:.1}/5  {}  {} mi\n  📍 {}\n",
        suggestion.name,
        suggestion.cuisine,
        suggestion.rating,
        suggestion.price_range(),
        suggestion.distance,
        suggestion.address
    );
    if let Some(neighborhood) = suggestion.neighborhood.as_deref().filter(|n| !n.is_empty()) {
        out.push_str(&format!("  🏘️ {neighborhood}\n"));
    }
    if favorite {
        out.push_str("  ✓ Already in favorites\n");
    } else {
        out.push_str(&format!("  import: journal import {}\n", suggestion.id));
    }
    out
}

fn render_restaurant(restaurant: &Restaurant, with_dishes: bool) -> String {
    let mut out = format!(
        "{}  [{}]  {}  {}\n  🏮 {}\n",
        restaurant.name,
        restaurant.cuisine_type,
        restaurant.rating,
        restaurant.price_range,
        restaurant.location
    );
    if !restaurant.notes.is_empty() {
        out.push_str(&format!("  {}\n", restaurant.notes));
    }
    if !restaurant.visit_dates.is_empty() {
        let dates: Vec<String> = restaurant
            .visit_dates
            .iter()
            .map(|d| d.to_string())
            .collect();
        out.push_str(&format!("  Visited: {}\n", dates.join(", ")));
    }
    out.push_str(&format!("  Favorite dishes: {}\n", restaurant.dishes.len()));
    if with_dishes {
        for dish in &restaurant.dishes {
            out.push_str(&render_dish(dish));
        }
    }
    out.push_str(&format!("  id: {}\n", restaurant.id));
    out
}

fn render_dish(dish: &Dish) -> String {
    let mut out = format!("    - {}  {}\n", dish.name, dish.rating);
    if !dish.description.is_empty() {
        out.push_str(&format!("      {}\n", dish.description));
    }
    if !dish.notes.is_empty() {
        out.push_str(&format!("      ({})\n", dish.notes));
    }
    out.push_str(&format!("      id: {}\n", dish.id));
    out
}

fn report(changed: bool) {
    if changed {
        println!("Saved.");
    } else {
        println!("Nothing changed.");
    }
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

fn find_restaurant<'a>(collection: &'a Collection, query: &str) -> anyhow::Result<&'a Restaurant> {
    resolve(
        collection.restaurants(),
        query,
        |r| r.id,
        |r| r.name.as_str(),
    )
    .with_context(|| format!("no restaurant matches {query:?}"))
}

fn find_dish<'a>(restaurant: &'a Restaurant, query: &str) -> anyhow::Result<&'a Dish> {
    resolve(&restaurant.dishes, query, |d| d.id, |d| d.name.as_str())
        .with_context(|| format!("{} has no dish matching {query:?}", restaurant.name))
}

/// Look an item up by id, then by exact name, then by best fuzzy name match.
fn resolve<'a, T>(
    items: &'a [T],
    query: &str,
    id: impl Fn(&T) -> Uuid,
    name: impl Fn(&'a T) -> &'a str,
) -> Option<&'a T> {
    if let Ok(wanted) = query.parse::<Uuid>() {
        return items.iter().find(|item| id(*item) == wanted);
    }
    if let Some(exact) = items.iter().find(|item| name(*item).eq_ignore_ascii_case(query)) {
        return Some(exact);
    }

    let matcher = SkimMatcherV2::default();
    items
        .iter()
        .filter_map(|item| matcher.fuzzy_match(name(item), query).map(|score| (score, item)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, item)| item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restaurant(name: &str) -> Restaurant {
        RestaurantFormBuilder::default()
            .name(name)
            .cuisine_type("Japanese")
            .location("San Francisco")
            .build()
            .unwrap()
            .submit()
            .unwrap()
    }

    fn collection() -> Collection {
        Collection::default()
            .with_restaurant(restaurant("Sushi Zen"))
            .unwrap()
            .with_restaurant(restaurant("Cafe Matcha"))
            .unwrap()
            .with_restaurant(restaurant("Taco Spot"))
            .unwrap()
    }

    #[test]
    fn resolves_by_id_exact_and_fuzzy_name() {
        let all = collection();
        let matcha = &all.restaurants()[1];

        assert_eq!(find_restaurant(&all, &matcha.id.to_string()).unwrap().id, matcha.id);
        assert_eq!(find_restaurant(&all, "taco spot").unwrap().name, "Taco Spot");
        assert_eq!(find_restaurant(&all, "mtcha").unwrap().name, "Cafe Matcha");
        assert!(find_restaurant(&all, "zzzz").is_err());
        assert!(find_restaurant(&all, &Uuid::new_v4().to_string()).is_err());
    }

    #[test]
    fn edits_remove_visits_from_the_back() {
        let changes = RestaurantChanges {
            name: None,
            cuisine: None,
            location: None,
            rating: None,
            price: None,
            notes: Some("Cash only".into()),
            add_visits: vec![parse_visit_date("2024-06-01").unwrap()],
            forget_visits: vec![0, 2, 2],
        };
        let edits = changes.into_edits();
        assert_eq!(
            edits,
            vec![
                RestaurantEdit::Notes("Cash only".into()),
                RestaurantEdit::RemoveVisitDate(2),
                RestaurantEdit::RemoveVisitDate(0),
                RestaurantEdit::AddVisitDate(parse_visit_date("2024-06-01").unwrap()),
            ]
        );
    }

    #[test]
    fn rating_arguments() {
        assert_eq!(parse_rating("4").unwrap().stars(), 4);
        assert!(parse_rating("6").is_err());
        assert!(parse_rating("four").is_err());
    }

    #[test]
    fn cli_parses_add() {
        let cli = Cli::try_parse_from([
            "journal", "add", "--name", "Sushi Zen", "--cuisine", "Japanese", "--location",
            "Japantown", "--price", "$$$", "--visited", "2024-01-02", "--visited", "2024-01-02",
        ])
        .unwrap();
        let Command::Add(new) = cli.command else {
            panic!("expected add");
        };
        assert_eq!(new.price, PriceRange::Expensive);
        assert_eq!(new.visit_dates.len(), 2);
        assert!(!new.rating.is_rated());
    }

    #[test]
    fn cli_parses_discover_sort() {
        let cli = Cli::try_parse_from(["journal", "discover", "--sort", "distance"]).unwrap();
        let Command::Discover(args) = cli.command else {
            panic!("expected discover");
        };
        assert_eq!(args.sort, SortBy::Distance);
        assert_eq!(args.area, DEFAULT_AREA);
        assert!(Cli::try_parse_from(["journal", "discover", "--sort", "price"]).is_err());
    }

    #[test]
    fn rendered_card_lists_dishes() {
        let mut r = restaurant("Sushi Zen");
        r.dishes.push(
            DishFormBuilder::default()
                .name("Sushi Platter")
                .description("Chef's choice")
                .build()
                .unwrap()
                .submit()
                .unwrap(),
        );
        let card = render_restaurant(&r, true);
        assert!(card.contains("Favorite dishes: 1"));
        assert!(card.contains("- Sushi Platter"));
        assert!(!render_restaurant(&r, false).contains("Sushi Platter"));
    }
}
