use anyhow::Result;
use clap::{Parser, Subcommand};
use likesort::categorize::{BatchCategorizer, LabelMode};
use likesort::config::Config;
use likesort::ledger::Ledger;
use likesort::llm::OpenAiClient;
use likesort::playlists::{self, PlaylistCache};
use likesort::progress;
use likesort::spotify::SpotifyClient;
use likesort::store;
use likesort::summary;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LIKED_SONGS_FILE: &str = "spotify_liked_songs.json";
const SONG_CATEGORIES_FILE: &str = "song_categories.json";
const SUMMARY_FILE: &str = "categorization_summary.json";
const PLAYLIST_CACHE_FILE: &str = "playlist_cache.json";
const TOKEN_CACHE_FILE: &str = ".spotify_token.json";

#[derive(Parser)]
#[command(name = "likesort")]
#[command(about = "Categorize Spotify liked songs with an LLM, optionally as playlists")]
struct Cli {
    /// Directory holding the JSON caches and outputs
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Hide progress bars for tail-friendly output
    #[arg(long)]
    log_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch liked songs, categorize them, and write a summary
    Categorize {
        /// Ask for ONE category per song instead of 2-4
        #[arg(long)]
        single_label: bool,
    },
    /// Categorize, then materialize each category as a private playlist
    Organize {
        /// Ask for 2-4 categories per song instead of one
        #[arg(long)]
        multi_label: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    progress::set_log_only(cli.log_only);

    // Config is validated in full before any network call; a missing
    // credential aborts here with every absent variable named.
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let (mode, materialize) = match cli.command {
        Command::Categorize { single_label } => (
            if single_label { LabelMode::Single } else { LabelMode::Multi },
            false,
        ),
        Command::Organize { multi_label } => (
            if multi_label { LabelMode::Multi } else { LabelMode::Single },
            true,
        ),
    };

    let start = Instant::now();
    info!("Starting likesort");

    run(&config, &cli.data_dir, mode, materialize)?;

    println!("\n{:=<60}", "");
    if materialize {
        println!("Playlist organization complete!");
    } else {
        println!("Music categorization complete! Results saved to disk.");
    }
    println!("  Elapsed: {:.2}s", start.elapsed().as_secs_f64());
    println!("{:=<60}", "");
    Ok(())
}

fn run(config: &Config, data_dir: &Path, mode: LabelMode, materialize: bool) -> Result<()> {
    let mut client = SpotifyClient::connect(config, &data_dir.join(TOKEN_CACHE_FILE))?;

    let tracks = store::load_or_fetch(&mut client, &data_dir.join(LIKED_SONGS_FILE))?;

    let mut ledger = Ledger::load(&data_dir.join(SONG_CATEGORIES_FILE))?;
    let labeler = OpenAiClient::new(&config.openai_api_key, &config.openai_model)?;
    let categorizer = BatchCategorizer::new(&labeler, mode);
    categorizer.run(&tracks, &mut ledger)?;

    let summary = summary::build(ledger.entries(), &tracks);
    summary::write_and_report(&summary, &data_dir.join(SUMMARY_FILE))?;

    if materialize {
        let mut cache = PlaylistCache::load(&data_dir.join(PLAYLIST_CACHE_FILE))?;
        playlists::materialize(&mut client, ledger.entries(), &tracks, &mut cache)?;
    }

    Ok(())
}
