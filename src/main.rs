use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use genrefm::configuration::{create_config, ConfigFolder};
use genrefm::startup::{
    run_genres, run_library, run_now_playing, run_server, GenresOptions, LibraryView,
};
use genrefm::Period;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Command::new("genrefm")
        .about("🎧 Genre breakdowns from your Last.fm listening history 🎧")
        .subcommand(
            Command::new("genres")
                .about("📊 Show your top genres for a listening period")
                .arg(period_arg())
                .arg(
                    Arg::new("remote")
                        .long("remote")
                        .help("Ask a running 'genrefm serve' instead of Last.fm directly")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("prefetch")
                        .long("prefetch")
                        .help("Also warm the cache for the configured adjacent periods")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("serve").about("🌐 Serve the /genre-analysis HTTP endpoint"))
        .subcommand(Command::new("now").about("🎵 Show the track you are scrobbling right now"))
        .subcommand(
            Command::new("tracks")
                .about("🎶 Show your top tracks for a listening period")
                .arg(period_arg())
                .arg(limit_arg("10")),
        )
        .subcommand(
            Command::new("albums")
                .about("💿 Show your top albums and their artwork")
                .arg(period_arg())
                .arg(limit_arg("25")),
        )
        .subcommand(
            Command::new("loved")
                .about("❤️ Show your loved tracks")
                .arg(limit_arg("50"))
                .arg(
                    Arg::new("page")
                        .long("page")
                        .value_parser(value_parser!(u32))
                        .default_value("1"),
                ),
        )
        .subcommand(Command::new("profile").about("👤 Show your Last.fm profile and top tags"))
        .subcommand(
            Command::new("weekly")
                .about("🗓️ Show last week's artist and track charts")
                .arg(limit_arg("10")),
        )
        .subcommand(
            Command::new("config").about("🛠️ Create or update configuration file for genrefm"),
        )
        .get_matches();

    let cfg_folder = ConfigFolder::new()?;

    match args.subcommand() {
        Some(("genres", sub)) => {
            let options = GenresOptions {
                period: period_of(sub),
                remote: sub.get_flag("remote"),
                prefetch: sub.get_flag("prefetch"),
            };
            run_genres(cfg_folder, options).await
        }
        Some(("serve", _)) => run_server(cfg_folder).await,
        Some(("now", _)) => run_now_playing(cfg_folder).await,
        Some(("tracks", sub)) => {
            let view = LibraryView::Tracks {
                period: period_of(sub),
                limit: limit_of(sub),
            };
            run_library(cfg_folder, view).await
        }
        Some(("albums", sub)) => {
            let view = LibraryView::Albums {
                period: period_of(sub),
                limit: limit_of(sub),
            };
            run_library(cfg_folder, view).await
        }
        Some(("loved", sub)) => {
            let view = LibraryView::Loved {
                limit: limit_of(sub),
                page: sub.get_one::<u32>("page").copied().unwrap_or(1),
            };
            run_library(cfg_folder, view).await
        }
        Some(("profile", _)) => run_library(cfg_folder, LibraryView::Profile).await,
        Some(("weekly", sub)) => {
            let view = LibraryView::Weekly {
                limit: limit_of(sub) as usize,
            };
            run_library(cfg_folder, view).await
        }
        Some(("config", _)) => {
            println!("\x1b[1m\x1b[34mConfiguring genrefm...\x1b[0m");
            create_config(cfg_folder)
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn period_arg() -> Arg {
    Arg::new("period")
        .short('p')
        .long("period")
        .help("overall, 7day, 1month, 3month, 6month or 12month")
        .value_parser(value_parser!(Period))
        .default_value("1month")
}

fn limit_arg(default: &'static str) -> Arg {
    Arg::new("limit")
        .short('l')
        .long("limit")
        .value_parser(value_parser!(u32))
        .default_value(default)
}

fn period_of(matches: &ArgMatches) -> Period {
    matches.get_one::<Period>("period").copied().unwrap_or_default()
}

fn limit_of(matches: &ArgMatches) -> u32 {
    matches.get_one::<u32>("limit").copied().unwrap_or(10)
}

fn print_usage() {
    println!("\x1b[1m\x1b[31mInvalid command!\x1b[0m\n");
    println!("📖 Available Commands:");
    println!("  \x1b[1m\x1b[32mgenrefm genres [-p 7day]\x1b[0m - 📊 Show top genres for a period");
    println!("  \x1b[1m\x1b[32mgenrefm serve\x1b[0m            - 🌐 Serve /genre-analysis");
    println!("  \x1b[1m\x1b[32mgenrefm now\x1b[0m              - 🎵 Show what is playing");
    println!("  \x1b[1m\x1b[32mgenrefm tracks [-p 7day]\x1b[0m - 🎶 Show top tracks");
    println!("  \x1b[1m\x1b[32mgenrefm albums [-p 7day]\x1b[0m - 💿 Show top albums");
    println!("  \x1b[1m\x1b[32mgenrefm loved [--page 2]\x1b[0m - ❤️  Show loved tracks");
    println!("  \x1b[1m\x1b[32mgenrefm profile\x1b[0m          - 👤 Show profile and top tags");
    println!("  \x1b[1m\x1b[32mgenrefm weekly\x1b[0m           - 🗓️  Show last week's charts");
    println!("  \x1b[1m\x1b[32mgenrefm config\x1b[0m           - 🛠️  Create or update configuration file");
    println!("\x1b[33mRun 'genrefm config' first, then add your Last.fm API key.\x1b[0m\n");
}
