use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use feedshelf::config::Config;
use feedshelf::feed::{SortMethod, SortOrder, Sorting};
use feedshelf::reader::FeedReader;
use feedshelf::storage::FeedUpdate;

/// Get the config directory path (~/.config/feedshelf/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedshelf"))
}

#[derive(Parser, Debug)]
#[command(name = "feedshelf", about = "Subscribe to RSS/Atom feeds and read their entries")]
struct Args {
    /// Config file (default: ~/.config/feedshelf/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feeds document (overrides `feeds_file` from the config)
    #[arg(long, global = true, value_name = "FILE")]
    feeds: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to a feed
    Add {
        url: String,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Unsubscribe every feed with this URL
    Remove { url: String },
    /// Change a feed's category or enabled flag
    Update {
        url: String,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
    },
    /// List subscribed feeds
    List {
        #[arg(short, long)]
        category: Option<String>,
        /// Show disabled feeds instead of enabled ones
        #[arg(long)]
        disabled: bool,
    },
    /// List categories in use
    Categories,
    /// Show a feed's entries
    Entries {
        url: String,
        #[arg(long)]
        sort: Option<SortMethod>,
        #[arg(long)]
        order: Option<SortOrder>,
        /// Read the entries saved by the last refresh instead of fetching
        #[arg(long)]
        cached: bool,
    },
    /// Show one entry's details
    Show { url: String, entry_id: String },
    /// Drop one entry from the saved entries of a feed
    Forget { url: String, entry_id: String },
    /// Fetch every feed and save the results
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let feeds_path = args
        .feeds
        .clone()
        .unwrap_or_else(|| config.feeds_path(&config_dir));
    let fetcher = config.fetcher().context("Failed to create HTTP client")?;
    let reader = FeedReader::open(&feeds_path, fetcher)
        .with_context(|| format!("Failed to open feeds file {}", feeds_path.display()))?
        .with_concurrency(config.max_concurrent_fetches);

    run(args.command, &reader, &config).await
}

async fn run(command: Command, reader: &FeedReader, config: &Config) -> Result<()> {
    match command {
        Command::Add { url, category } => {
            let feed = reader.add_feed(&url, category).await?;
            reader.persist().await.context("Failed to save feeds")?;
            println!("Added {}", feed.url);
        }
        Command::Remove { url } => {
            let removed = reader.remove_feed(&url).await;
            reader.persist().await.context("Failed to save feeds")?;
            if removed == 0 {
                println!("No feed with URL {url}");
            } else {
                println!("Removed {url}");
            }
        }
        Command::Update {
            url,
            category,
            enabled,
        } => {
            let feed = reader
                .update_feed(&url, FeedUpdate { category, enabled })
                .await?;
            reader.persist().await.context("Failed to save feeds")?;
            if !feed.enabled {
                eprintln!("Note: the enabled flag is not stored in the feeds file");
            }
            println!("Updated {}", feed.url);
        }
        Command::List { category, disabled } => {
            let feeds = reader.feeds(category.as_deref(), !disabled).await;
            if feeds.is_empty() {
                eprintln!("No matching feeds");
            }
            for feed in feeds {
                match feed.category {
                    Some(category) => println!("{} - {}", feed.url, category),
                    None => println!("{}", feed.url),
                }
            }
        }
        Command::Categories => {
            for category in reader.categories().await {
                println!("{category}");
            }
        }
        Command::Entries {
            url,
            sort,
            order,
            cached,
        } => {
            let defaults = config.sorting();
            let sorting = Sorting::new(
                sort.unwrap_or(defaults.method),
                order.unwrap_or(defaults.order),
            );
            if cached {
                for entry in reader.cached_entries(&url, sorting).await {
                    println!("{}  {}  {}", entry.id(), entry.published, entry.title);
                }
            } else {
                let entries = reader
                    .entries(&url, sorting)
                    .await
                    .with_context(|| format!("Failed to retrieve entries from {url}"))?;
                for entry in entries {
                    println!("{}  {}  {}", entry.id, entry.published, entry.title);
                }
            }
        }
        Command::Show { url, entry_id } => {
            let details = reader
                .entry_details(&url, &entry_id)
                .await
                .with_context(|| format!("Failed to retrieve entries from {url}"))?
                .with_context(|| format!("No entry {entry_id} in {url}"))?;
            println!("Title: {}", details.title);
            println!("Link: {}", details.link);
            println!("Published: {}", details.published);
            println!("Summary: {}", details.summary);
        }
        Command::Forget { url, entry_id } => {
            if reader.remove_entry(&url, &entry_id).await {
                reader.persist().await.context("Failed to save feeds")?;
                println!("Forgot {entry_id}");
            } else {
                println!("No saved entry {entry_id} in {url}");
            }
        }
        Command::Refresh => {
            let document = reader.refresh().await.context("Failed to save feeds")?;
            let saved: usize = document
                .categories
                .values()
                .flat_map(|c| c.entries.values())
                .map(Vec::len)
                .sum();
            println!(
                "Saved {} entries to {}",
                saved,
                reader.path().display()
            );
        }
    }
    Ok(())
}
