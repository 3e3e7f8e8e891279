//! Wiring behind each `genrefm` subcommand.
//!
//! Every command loads `~/.genrefm/config.yaml` first and bails out with a hint
//! when it has not been created yet.

use crate::api_client::LastfmClient;
use crate::cache::{GenreCache, GenreSource, HttpGenreSource, RefreshEvent, Served};
use crate::configuration::{self, CacheBackend, ConfigFolder, Settings};
use crate::foundation::database::{CacheStore, MemoryStore, SledStore};
use crate::foundation::models::{Genre, Period};
use crate::process::GenreAggregator;
use crate::server::{self, AppState};
use anyhow::{anyhow, Context};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// How long `genres` waits for background refreshes before exiting.
const REFRESH_WAIT: Duration = Duration::from_secs(60);

/// What the listening-history subcommands print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryView {
    Tracks { period: Period, limit: u32 },
    Albums { period: Period, limit: u32 },
    Loved { limit: u32, page: u32 },
    Profile,
    /// Artist and track charts for the most recent week Last.fm has a chart for.
    Weekly { limit: usize },
}

/// Options for the `genres` subcommand.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenresOptions {
    pub period: Period,
    pub remote: bool,
    pub prefetch: bool,
}

pub async fn run_genres(cfg_folder: ConfigFolder, options: GenresOptions) -> anyhow::Result<()> {
    let Some(settings) = load_settings(&cfg_folder)? else {
        return Ok(());
    };

    let source = build_source(&settings, options.remote)?;
    let store = open_store(&settings, &cfg_folder)?;
    let cache = GenreCache::new(source, store, &settings.cache);
    let mut events = cache.subscribe();

    println!(
        "\x1b[1m\x1b[34mAnalyzing genres for period '{}'...\x1b[0m",
        options.period
    );

    let lookup = match cache.get_genres(options.period).await {
        Ok(lookup) => lookup,
        Err(e) => {
            eprintln!("\x1b[1m\x1b[31mUnable to load genres: {}\x1b[0m", e);
            return Ok(());
        }
    };

    match lookup.served {
        Served::Fallback => {
            println!("\x1b[33mLast.fm is unreachable, showing expired data.\x1b[0m")
        }
        Served::Revalidating => {
            println!("\x1b[33mShowing cached data while it refreshes in the background.\x1b[0m")
        }
        Served::Cached | Served::Fetched => {}
    }
    print_genres(&lookup.genres);

    let mut pending = Vec::new();
    if lookup.served == Served::Revalidating {
        pending.push(options.period);
    }
    if options.prefetch {
        pending.extend(cache.prefetch_adjacent());
    }

    await_refreshes(&mut events, pending).await;
    Ok(())
}

pub async fn run_server(cfg_folder: ConfigFolder) -> anyhow::Result<()> {
    let Some(settings) = load_settings(&cfg_folder)? else {
        return Ok(());
    };

    let source = build_source(&settings, false)?;
    let listener = TcpListener::bind(&settings.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind_address))?;

    println!(
        "\x1b[1m\x1b[34mServing genre analysis on http://{}/genre-analysis\x1b[0m",
        settings.server.bind_address
    );
    server::serve(listener, AppState::new(source)).await?;
    Ok(())
}

pub async fn run_now_playing(cfg_folder: ConfigFolder) -> anyhow::Result<()> {
    let Some(settings) = load_settings(&cfg_folder)? else {
        return Ok(());
    };

    let client = LastfmClient::new(&settings.lastfm)?;
    match client.now_playing().await? {
        Some(track) => {
            let album = track
                .album
                .map(|album| format!(" \x1b[2m({album})\x1b[0m"))
                .unwrap_or_default();
            println!(
                "\x1b[32m♪ Now playing:\x1b[0m \x1b[1m{}\x1b[0m by {}{}",
                track.name, track.artist, album
            );
        }
        None => println!("\x1b[33mNothing is playing right now.\x1b[0m"),
    }
    Ok(())
}

pub async fn run_library(cfg_folder: ConfigFolder, view: LibraryView) -> anyhow::Result<()> {
    let Some(settings) = load_settings(&cfg_folder)? else {
        return Ok(());
    };

    let client = LastfmClient::new(&settings.lastfm)?;
    match view {
        LibraryView::Tracks { period, limit } => {
            println!("\x1b[1m\x1b[34mTop tracks for '{}'\x1b[0m", period);
            for (rank, track) in client.top_tracks(period, limit).await?.iter().enumerate() {
                println!(
                    "  {:>3}. \x1b[1m{}\x1b[0m by {} \x1b[2m({} plays)\x1b[0m",
                    rank + 1,
                    track.name,
                    track.artist,
                    track.playcount
                );
            }
        }
        LibraryView::Albums { period, limit } => {
            println!("\x1b[1m\x1b[34mTop albums for '{}'\x1b[0m", period);
            for album in client.top_albums(period, limit).await? {
                println!(
                    "  {:>3}. \x1b[1m{}\x1b[0m by {} \x1b[2m({} plays)\x1b[0m",
                    album.rank, album.name, album.artist, album.playcount
                );
                if let Some(artwork) = album.artwork {
                    println!("       \x1b[36m{}\x1b[0m", artwork);
                }
            }
        }
        LibraryView::Loved { limit, page } => {
            let loved = client.loved_tracks(limit, page).await?;
            if loved.is_empty() {
                println!("\x1b[33mNo loved tracks on page {}.\x1b[0m", page);
            }
            for track in loved {
                println!("  \x1b[31m♥\x1b[0m \x1b[1m{}\x1b[0m by {}", track.name, track.artist);
            }
        }
        LibraryView::Profile => {
            let info = client.user_info().await?;
            println!(
                "\x1b[1m\x1b[34m{}\x1b[0m{}",
                info.name,
                info.realname
                    .map(|realname| format!(" ({realname})"))
                    .unwrap_or_default()
            );
            if let Some(country) = info.country {
                println!("  Country:   {}", country);
            }
            println!("  Scrobbles: {}", info.playcount);
            println!("  Profile:   {}", info.url);

            let tags = client.user_top_tags(10).await?;
            if !tags.is_empty() {
                let names: Vec<&str> = tags.iter().map(|tag| tag.name.as_str()).collect();
                println!("  Tags:      {}", names.join(", "));
            }
        }
        LibraryView::Weekly { limit } => {
            let Some(week) = client.weekly_chart_list().await?.last().copied() else {
                println!("\x1b[33mLast.fm has no weekly charts for this user yet.\x1b[0m");
                return Ok(());
            };

            println!("\x1b[1m\x1b[34mWeekly chart {} to {}\x1b[0m", week.from, week.to);
            println!("\x1b[32mArtists\x1b[0m");
            for artist in client.weekly_artist_chart(Some(week)).await?.iter().take(limit) {
                println!("  {} \x1b[2m({} plays)\x1b[0m", artist.name, artist.playcount);
            }
            println!("\x1b[32mTracks\x1b[0m");
            for track in client.weekly_track_chart(Some(week)).await?.iter().take(limit) {
                println!(
                    "  {} by {} \x1b[2m({} plays)\x1b[0m",
                    track.name, track.artist, track.playcount
                );
            }
        }
    }
    Ok(())
}

fn load_settings(cfg_folder: &ConfigFolder) -> anyhow::Result<Option<Settings>> {
    if !cfg_folder.config_dir.exists() || !cfg_folder.config_file.exists() {
        eprintln!(
            "\x1b[1m\x1b[31mConfiguration folder or config.yaml not found. Please run 'genrefm config' first.\x1b[0m"
        );
        return Ok(None);
    }

    let config_file = cfg_folder
        .config_file
        .to_str()
        .ok_or_else(|| anyhow!("configuration path is not valid UTF-8"))?;

    let settings = configuration::get_configuration(config_file)
        .context("Unable to parse configuration file")?;
    Ok(Some(settings))
}

fn build_source(settings: &Settings, remote: bool) -> anyhow::Result<Arc<dyn GenreSource>> {
    if remote {
        let url = settings
            .cache
            .remote_url
            .as_deref()
            .ok_or_else(|| anyhow!("--remote needs cache.remote_url in config.yaml"))?;
        info!(url, "Using remote genre analysis");
        return Ok(Arc::new(HttpGenreSource::new(url)?));
    }

    let client = LastfmClient::new(&settings.lastfm)?;
    Ok(Arc::new(GenreAggregator::new(
        client,
        settings.aggregation.clone(),
    )))
}

fn open_store(settings: &Settings, cfg_folder: &ConfigFolder) -> anyhow::Result<Arc<dyn CacheStore>> {
    match settings.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        CacheBackend::Sled => {
            let path = cfg_folder
                .cache_db
                .to_str()
                .ok_or_else(|| anyhow!("Failed to convert the cache path to a string"))?;
            Ok(Arc::new(SledStore::open(path)?))
        }
    }
}

/// Waits (bounded) for the background refreshes of `pending` so a short-lived CLI
/// process does not exit before they land in the store.
async fn await_refreshes(events: &mut broadcast::Receiver<RefreshEvent>, mut pending: Vec<Period>) {
    let deadline = tokio::time::Instant::now() + REFRESH_WAIT;

    while !pending.is_empty() {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Ok(event)) => {
                pending.retain(|period| *period != event.period());
                match event {
                    RefreshEvent::Refreshed { period, genres } => println!(
                        "\x1b[32mCache refreshed for '{}' ({} genres).\x1b[0m",
                        period,
                        genres.len()
                    ),
                    RefreshEvent::Failed { period, error } => {
                        eprintln!("\x1b[31mRefresh for '{}' failed: {}\x1b[0m", period, error)
                    }
                }
            }
            Ok(Err(broadcast::error::RecvError::Lagged(missed))) => {
                warn!(missed, "Missed refresh events");
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => break,
            Err(_) => {
                warn!(?pending, "Gave up waiting for background refreshes");
                break;
            }
        }
    }
}

fn print_genres(genres: &[Genre]) {
    if genres.is_empty() {
        println!("\x1b[33mNo genre data available.\x1b[0m");
        return;
    }

    let total: f64 = genres.iter().map(|genre| genre.count).sum();
    let name_width = genres.iter().map(|genre| genre.name.chars().count()).max().unwrap_or(0);

    for genre in genres {
        let share = if total > 0.0 { genre.count / total * 100.0 } else { 0.0 };
        let bar = "█".repeat((share / 2.5).round() as usize);
        println!(
            "  \x1b[1m{:<width$}\x1b[0m \x1b[36m{:<40}\x1b[0m {:>5.1}%",
            genre.name,
            bar,
            share,
            width = name_width
        );
    }
}
