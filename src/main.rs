use clap::{Parser, Subcommand};
use placefinder::config::Config;
use placefinder::place::discovery::discover;
use placefinder::place::suggest::{suggest, SuggestionView};
use placefinder::place::{
    BoundingBox, Coordinate, PlaceError, PlaceResolver, PlaceStore, Resolution, ResultSlot,
    SavedSet, Services,
};
use placefinder::server::{self, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;

/// placefinder: resolve places from free text, map points and viewports.
///
/// Results print as JSON on stdout; a short summary goes to stderr.
///
/// Examples:
///   placefinder search "Tiong Bahru Bakery"
///   placefinder save "376 Joo Chiat Rd"
///   placefinder reverse --lat 1.2868 --lng 103.8545
///   placefinder discover --south 1.27 --west 103.84 --north 1.30 --east 103.87
///   placefinder saved list
///   placefinder serve --port 8080
#[derive(Parser)]
#[command(name = "placefinder", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug logging (RUST_LOG overrides).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Region appended to directory queries (e.g. "Singapore").
    #[arg(long, global = true)]
    region: Option<String>,

    /// Config file (defaults to ~/.placefinder/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Saved places file (defaults to ~/.placefinder/places.json).
    #[arg(long, global = true)]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve free text to a single place.
    Search { query: String },
    /// Resolve free text and add the result to the saved places.
    Save { query: String },
    /// Describe a map point.
    Reverse {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// List named places inside a bounding box, minus saved ones.
    Discover {
        #[arg(long, allow_hyphen_values = true)]
        south: f64,
        #[arg(long, allow_hyphen_values = true)]
        west: f64,
        #[arg(long, allow_hyphen_values = true)]
        north: f64,
        #[arg(long, allow_hyphen_values = true)]
        east: f64,
    },
    /// Autocomplete suggestions for partial input.
    Suggest { text: String },
    /// Manage saved places.
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },
    /// Run the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Subcommand)]
enum SavedAction {
    List,
    Remove { id: String },
    /// Toggle the visited flag.
    Visited { id: String },
    /// Move the place at FROM to position TO (zero-based).
    Reorder { from: usize, to: usize },
    /// Set a 1-5 rating; omit to clear it.
    Rate { id: String, rating: Option<u8> },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    if let Err(e) = placefinder::init_logging(level) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), PlaceError> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(region) = &cli.region {
        config.region = region.clone();
    }
    let store = match &cli.store {
        Some(path) => PlaceStore::at(path.clone()),
        None => PlaceStore::open(),
    };

    if let Command::Saved { action } = &cli.command {
        return saved_command(&store, action);
    }

    let saved = Arc::new(store.load_set()?);
    let services = Services::http(&config);
    let resolver = PlaceResolver::new(config, services, Arc::clone(&saved))?;

    match cli.command {
        Command::Search { query } => {
            let resolution = resolver.resolve(&query)?;
            print_banner(&resolution);
            print_json(&resolution)
        }
        Command::Save { query } => {
            let slot = ResultSlot::new();
            let (resolution, _) = resolver.resolve_into(&query, &slot)?;
            print_banner(&resolution);
            if resolution.candidate().is_none() {
                return Err(PlaceError::NotFound(query));
            }
            let place = slot.promote(&saved)?;
            store.save_set(&saved)?;
            eprintln!("  Saved as '{}'", place.id);
            print_json(&place)
        }
        Command::Reverse { lat, lng } => {
            let resolution = resolver.reverse(Coordinate::new(lat, lng)?);
            print_banner(&resolution);
            print_json(&resolution)
        }
        Command::Discover { south, west, north, east } => {
            let bbox = BoundingBox::new(south, west, north, east)?;
            let found = discover(
                resolver.services().area.as_ref(),
                &bbox,
                &saved.snapshot(),
                &resolver.config().image_base,
            );
            eprintln!("  {} new place(s) in view", found.len());
            print_json(&found)
        }
        Command::Suggest { text } => {
            let config = resolver.config();
            let found = suggest(
                resolver.services().directory.as_ref(),
                &text,
                config.suggest_min_chars,
                config.suggest_limit,
            )?;
            let views: Vec<SuggestionView> = found.iter().map(SuggestionView::from).collect();
            print_json(&views)
        }
        Command::Serve { host, port } => {
            let state = Arc::new(AppState::new(resolver, Some(store)));
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::start(&host, port, state))
        }
        Command::Saved { .. } => Ok(()),
    }
}

fn saved_command(store: &PlaceStore, action: &SavedAction) -> Result<(), PlaceError> {
    let saved: SavedSet = store.load_set()?;
    match action {
        SavedAction::List => {
            for (i, place) in saved.snapshot().iter().enumerate() {
                eprintln!("  {:>2}. {}", i, place.display_line());
            }
            return print_json(&saved.snapshot().to_vec());
        }
        SavedAction::Remove { id } => {
            let removed = saved.remove(id)?;
            eprintln!("  Removed '{}'", removed.name);
        }
        SavedAction::Visited { id } => {
            let visited = saved.toggle_visited(id)?;
            eprintln!("  '{}' visited: {}", id, visited);
        }
        SavedAction::Reorder { from, to } => saved.reorder(*from, *to)?,
        SavedAction::Rate { id, rating } => saved.set_rating(id, *rating)?,
    }
    store.save_set(&saved)
}

fn print_banner(resolution: &Resolution) {
    match resolution {
        Resolution::Found { candidate, .. } => {
            eprintln!("  {} {}", "\u{1F4CD}", candidate.display_line());
        }
        Resolution::NotFound { .. } => {}
    }
    for notice in resolution.notices() {
        eprintln!("  \u{26A0}\u{FE0F}  {}", notice);
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), PlaceError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
