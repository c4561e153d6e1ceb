//! Anime Explorer CLI.
//!
//! A thin front end over the catalog data layer: it reads the persisted
//! browse state, turns user intents into setter calls, and prints whatever
//! the query cache returns.

use anime_catalog::{
    CacheSettings, CancelToken, DetailPage, DetailSection, FavoritesStore, JikanClient, ListMode,
    ListSnapshot, QueryCache, SectionData, ViewState,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::{
    AiringStatus, AnimeType, Config, DataPaths, Database, FavoriteRecord, FavoriteSort, LocalStorage,
    MemoryStorage, OrderBy, Rating, SortDirection, ViewMode,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "anime-explorer")]
#[command(author, version, about = "Search, filter and favorite anime from the Jikan API")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Keep state in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List anime using the persisted filters, optionally changing them
    Browse(BrowseArgs),

    /// Show one anime and optionally one of its sections
    Show {
        mal_id: u32,

        /// characters, media, statistics or related
        #[arg(long)]
        section: Option<DetailSection>,
    },

    /// Manage favorites
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },

    /// Inspect or reset the persisted filters
    Filters {
        #[command(subcommand)]
        action: FiltersAction,
    },

    /// Change presentation settings
    View {
        /// grid or list
        #[arg(long)]
        mode: Option<ViewMode>,

        /// Hide explicit content
        #[arg(long)]
        safe_mode: Option<bool>,

        /// Accumulate pages instead of paging
        #[arg(long)]
        infinite: Option<bool>,
    },
}

#[derive(clap::Args, Debug)]
struct BrowseArgs {
    /// Shared URL query string, e.g. "query=bebop&type=tv"
    #[arg(long)]
    url_query: Option<String>,

    /// Search text
    #[arg(short, long)]
    query: Option<String>,

    #[arg(long = "type")]
    anime_type: Option<AnimeType>,

    #[arg(long)]
    status: Option<AiringStatus>,

    #[arg(long)]
    rating: Option<Rating>,

    #[arg(long)]
    order_by: Option<OrderBy>,

    #[arg(long)]
    sort: Option<SortDirection>,

    /// Add a genre id to the selection (repeatable)
    #[arg(long)]
    genre: Vec<u32>,

    /// Remove a genre id from the selection (repeatable)
    #[arg(long)]
    without_genre: Vec<u32>,

    /// Jump to a page
    #[arg(long)]
    page: Option<u32>,

    /// Number of pages to load in this run
    #[arg(long, default_value = "1")]
    pages: u32,
}

#[derive(Subcommand, Debug)]
enum FavoritesAction {
    /// List favorites
    List {
        /// Only titles containing this text
        #[arg(long, default_value = "")]
        search: String,

        /// recent, title, score or type
        #[arg(long, default_value = "recent")]
        sort: FavoriteSort,
    },
    /// Add an anime by id
    Add { mal_id: u32 },
    /// Remove an anime by id
    Remove { mal_id: u32 },
    /// Add if absent, remove if present
    Toggle { mal_id: u32 },
    /// Write favorites to a JSON file under the exports directory
    Export {
        #[arg(default_value = "favorites")]
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum FiltersAction {
    /// Print the persisted browse state
    Show,
    /// Reset search, filters and genres
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let mut log_config = shared::LogConfig::from_settings(&config.logging, &config.log_dir(), "anime-explorer");
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!("Anime Explorer starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    // Initialize data paths
    let data_paths = DataPaths::new(config.data_dir());
    data_paths
        .create_dirs()
        .context("Failed to create data directories")?;

    let app = App {
        config,
        data_paths,
        ephemeral: args.ephemeral,
    };

    match args.command {
        Command::Browse(browse) => app.browse(browse).await,
        Command::Show { mal_id, section } => app.show(mal_id, section).await,
        Command::Favorites { action } => app.favorites(action).await,
        Command::Filters { action } => app.filters(action),
        Command::View {
            mode,
            safe_mode,
            infinite,
        } => app.view(mode, safe_mode, infinite),
    }
}

struct App {
    config: Config,
    data_paths: DataPaths,
    ephemeral: bool,
}

impl App {
    /// Open a handle on local storage. Each store owns its own handle.
    fn storage(&self) -> Result<Box<dyn LocalStorage>> {
        if self.ephemeral {
            return Ok(Box::new(MemoryStorage::new()));
        }
        let db_path = self.config.database_path();
        info!(db_path = %db_path.display(), "Opening storage");
        let database = Database::open(&db_path).context("Failed to open storage database")?;
        Ok(Box::new(database))
    }

    fn cache(&self) -> Result<QueryCache> {
        let client = JikanClient::from_config(&self.config.api).context("Failed to create Jikan client")?;
        Ok(QueryCache::new(Arc::new(client), CacheSettings::from(&self.config.cache)))
    }

    fn view_state(&self, url_query: Option<&str>) -> Result<ViewState<Box<dyn LocalStorage>>> {
        Ok(ViewState::load(
            self.storage()?,
            url_query,
            self.config.view.search_debounce(),
        ))
    }

    async fn browse(&self, args: BrowseArgs) -> Result<()> {
        let mut state = self.view_state(args.url_query.as_deref())?;

        if let Some(text) = args.query {
            state.set_search(text);
            state.settle_search().await;
        }
        if args.anime_type.is_some() {
            state.set_type(args.anime_type);
        }
        if args.status.is_some() {
            state.set_status(args.status);
        }
        if args.rating.is_some() {
            state.set_rating(args.rating);
        }
        if args.order_by.is_some() {
            state.set_order_by(args.order_by);
        }
        if args.sort.is_some() {
            state.set_sort(args.sort);
        }
        for genre in args.genre {
            state.select_genre(genre);
        }
        for genre in args.without_genre {
            state.remove_genre(genre);
        }
        if let Some(page) = args.page {
            state.set_page(page);
        }

        let favorites = FavoritesStore::load(self.storage()?);
        let cache = self.cache()?;
        let token = CancelToken::new();
        let mode = state.list_mode();

        info!(mode = ?mode, query = ?state.descriptor(), "Browsing");

        let Some(mut snapshot) = cache
            .list(&state.descriptor(), mode, &token)
            .await
            .context("Failed to load anime list")?
        else {
            return Ok(());
        };

        for _ in 1..args.pages.max(1) {
            if !snapshot.has_next_page() {
                break;
            }
            let Some(next) = cache
                .fetch_next_page(&state.descriptor(), mode, &token)
                .await
                .context("Failed to load next page")?
            else {
                break;
            };
            snapshot = next;
            if mode == ListMode::Paged {
                state.set_page(snapshot.current_page());
            }
        }

        print_list(&snapshot, &favorites, state.view_mode());

        let url = state.to_url_query();
        if !url.is_empty() {
            println!("Share: ?{}", url);
        }

        let stats = cache.stats();
        info!(entries = stats.entries, in_flight = stats.in_flight, "Cache statistics");
        Ok(())
    }

    async fn show(&self, mal_id: u32, section: Option<DetailSection>) -> Result<()> {
        let favorites = FavoritesStore::load(self.storage()?);
        let page = DetailPage::new(self.cache()?, mal_id);

        let Some(anime) = page.overview().await.context("Failed to load anime")? else {
            return Ok(());
        };
        let anime = anime.value;

        let heart = if favorites.is_favorite(mal_id) { "♥ " } else { "" };
        println!("{}{} (#{})", heart, anime.display_title(), anime.mal_id);
        if let Some(japanese) = &anime.title_japanese {
            println!("  {}", japanese);
        }
        println!(
            "  {} | {} episodes | {} | score {}",
            anime.anime_type.as_deref().unwrap_or("?"),
            anime.episodes.map(|e| e.to_string()).unwrap_or_else(|| "?".into()),
            anime.status.as_deref().unwrap_or("?"),
            anime.score.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "-".into()),
        );
        if !anime.genres.is_empty() {
            let genres: Vec<&str> = anime.genres.iter().map(|g| g.name.as_str()).collect();
            println!("  Genres: {}", genres.join(", "));
        }
        if let Some(synopsis) = &anime.synopsis {
            println!();
            println!("{}", synopsis);
        }

        let Some(section) = section else {
            return Ok(());
        };
        let Some(view) = page.open(section).await.context("Failed to load section")? else {
            return Ok(());
        };

        println!();
        println!("== {} ==", section);
        match view.data {
            SectionData::Characters(roles) => {
                for role in roles.iter() {
                    match &role.role {
                        Some(kind) => println!("  {} ({})", role.character.name, kind),
                        None => println!("  {}", role.character.name),
                    }
                }
            }
            SectionData::Media { pictures, videos } => {
                println!("  {} pictures", pictures.len());
                for promo in &videos.promo {
                    println!("  Promo: {}", promo.title);
                }
                println!("  {} episode videos", videos.episodes.len());
            }
            SectionData::Statistics(stats) => {
                println!("  In lists: {}", stats.list_total());
                println!("  Score votes: {}", stats.score_votes());
                if let Some(rate) = stats.completion_rate() {
                    println!("  Completion rate: {:.1}%", rate);
                }
                if let Some(rate) = stats.drop_rate() {
                    println!("  Drop rate: {:.1}%", rate);
                }
            }
            SectionData::Related(relations) => {
                for relation in relations.iter() {
                    let names: Vec<&str> = relation.entry.iter().map(|e| e.name.as_str()).collect();
                    println!("  {}: {}", relation.relation, names.join(", "));
                }
            }
        }

        Ok(())
    }

    async fn favorites(&self, action: FavoritesAction) -> Result<()> {
        let mut favorites = FavoritesStore::load(self.storage()?);

        match action {
            FavoritesAction::List { search, sort } => {
                let view = favorites.view(&search, sort);
                if view.is_empty() {
                    println!("No favorites");
                }
                for record in view {
                    print_favorite(record);
                }
            }
            FavoritesAction::Add { mal_id } => {
                let record = self.fetch_record(mal_id).await?;
                if favorites.add(record) {
                    println!("Added #{}", mal_id);
                } else {
                    println!("#{} is already a favorite", mal_id);
                }
            }
            FavoritesAction::Remove { mal_id } => {
                if favorites.remove(mal_id) {
                    println!("Removed #{}", mal_id);
                } else {
                    println!("#{} is not a favorite", mal_id);
                }
            }
            FavoritesAction::Toggle { mal_id } => {
                let record = match favorites.get(mal_id).cloned() {
                    Some(record) => record,
                    None => self.fetch_record(mal_id).await?,
                };
                let now_favorite = favorites.toggle(record);
                println!("#{} {}", mal_id, if now_favorite { "added" } else { "removed" });
            }
            FavoritesAction::Export { name } => {
                let path = self.data_paths.favorites_export(&name);
                favorites.export(&path)?;
                println!("Wrote {} favorites to {}", favorites.len(), path.display());
            }
        }

        Ok(())
    }

    async fn fetch_record(&self, mal_id: u32) -> Result<FavoriteRecord> {
        let cache = self.cache()?;
        let anime = cache
            .anime(mal_id, &CancelToken::new())
            .await
            .with_context(|| format!("Failed to load anime #{}", mal_id))?
            .with_context(|| format!("Loading anime #{} was cancelled", mal_id))?;
        Ok(FavoriteRecord::from(anime.value.as_ref()))
    }

    fn filters(&self, action: FiltersAction) -> Result<()> {
        let mut state = self.view_state(None)?;

        match action {
            FiltersAction::Show => {
                let filters = state.filters();
                let show = |value: Option<&str>| value.unwrap_or("any").to_string();
                println!("Search:    {}", state.search_query());
                println!("Type:      {}", show(filters.anime_type.map(|v| v.as_str())));
                println!("Status:    {}", show(filters.status.map(|v| v.as_str())));
                println!("Rating:    {}", show(filters.rating.map(|v| v.as_str())));
                println!("Order by:  {}", show(filters.order_by.map(|v| v.as_str())));
                println!("Sort:      {}", show(filters.sort.map(|v| v.as_str())));
                println!("Genres:    {:?}", state.selected_genres());
                println!("View:      {}", state.view_mode());
                println!("Safe mode: {}", state.safe_mode());
                println!("Infinite:  {}", state.infinite_scroll());
                println!("Page:      {}", state.current_page());
            }
            FiltersAction::Clear => {
                state.clear_filters();
                println!("Filters cleared");
            }
        }

        Ok(())
    }

    fn view(&self, mode: Option<ViewMode>, safe_mode: Option<bool>, infinite: Option<bool>) -> Result<()> {
        let mut state = self.view_state(None)?;

        if let Some(mode) = mode {
            state.set_view_mode(mode);
        }
        if let Some(safe_mode) = safe_mode {
            state.set_safe_mode(safe_mode);
        }
        if let Some(infinite) = infinite {
            state.set_infinite_scroll(infinite);
        }

        println!(
            "View: {}, safe mode: {}, infinite scroll: {}",
            state.view_mode(),
            state.safe_mode(),
            state.infinite_scroll()
        );
        Ok(())
    }
}

fn print_list<S: LocalStorage>(snapshot: &ListSnapshot, favorites: &FavoritesStore<S>, view_mode: ViewMode) {
    if snapshot.is_empty() {
        println!("No anime found");
        return;
    }

    for anime in snapshot.items() {
        let heart = if favorites.is_favorite(anime.mal_id) { "♥" } else { " " };
        let score = anime.score.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "-".into());
        match view_mode {
            ViewMode::Grid => println!("{} {:>6}  {:<50} {}", heart, anime.mal_id, anime.display_title(), score),
            ViewMode::List => {
                println!(
                    "{} #{} {} [{} | {} eps | {}] score {}",
                    heart,
                    anime.mal_id,
                    anime.display_title(),
                    anime.anime_type.as_deref().unwrap_or("?"),
                    anime.episodes.map(|e| e.to_string()).unwrap_or_else(|| "?".into()),
                    anime.year.map(|y| y.to_string()).unwrap_or_else(|| "?".into()),
                    score,
                );
                if let Some(synopsis) = &anime.synopsis {
                    let short: String = synopsis.chars().take(160).collect();
                    println!("      {}", short);
                }
            }
        }
    }

    let total = snapshot
        .total_items()
        .map(|t| format!(", {} total", t))
        .unwrap_or_default();
    let position = match snapshot.mode {
        ListMode::Paged => format!("Page {} of {}", snapshot.current_page(), snapshot.last_visible_page()),
        ListMode::Infinite => format!(
            "{} loaded from {} of {} pages",
            snapshot.len(),
            snapshot.pages_loaded(),
            snapshot.last_visible_page()
        ),
    };
    println!(
        "{}{}{}{}",
        position,
        total,
        if snapshot.has_next_page() { ", more available" } else { "" },
        if snapshot.is_stale { " (stale)" } else { "" },
    );
}

fn print_favorite(record: &FavoriteRecord) {
    println!(
        "#{} {} [{} | {} eps | {}] score {}",
        record.mal_id,
        record.title,
        record.anime_type.as_deref().unwrap_or("?"),
        record.episodes.map(|e| e.to_string()).unwrap_or_else(|| "?".into()),
        record.year.map(|y| y.to_string()).unwrap_or_else(|| "?".into()),
        record.score.map(|s| format!("{:.2}", s)).unwrap_or_else(|| "-".into()),
    );
}
