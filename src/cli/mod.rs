use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

use crate::{
    config,
    http::server::HttpServer,
    storage::{art::ArtStore, fs::scan_music_files, operations::Library},
    tagging::{download::DownloadTagger, fetch::HttpFetcher, lofty_codec::LoftyCodec},
};

#[derive(Parser)]
#[command(name = "muselib")]
#[command(version = "0.1")]
#[command(about = "Personal music library server")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run http server hosting the library
    Serve,
    /// Register a user, or replace the token of an existing one
    AddUser { username: String, token: String },
    /// Import every audio file under a directory, using the files' own tags
    Import {
        dir: PathBuf,
        /// User the imported tracks belong to
        #[arg(short, long)]
        owner: String,
        #[arg(long)]
        follow_symlinks: bool,
    },
    /// List the tracks of a user
    List {
        #[arg(short, long)]
        owner: String,
    },
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = config::Config::load(&cli.config)?;
    let art = ArtStore::new(&cfg.art.dir);
    let mut library =
        Library::new(&cfg.database, art.clone()).context("Failed to initialize library")?;

    match cli.command {
        Commands::Serve => {
            let tagger = DownloadTagger::new(
                HttpFetcher::new(cfg.download.temp_dir()),
                LoftyCodec,
                art,
            );
            let http_server = HttpServer::new(library, tagger, cfg.http);

            info!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
        }

        Commands::AddUser { username, token } => {
            let user = library.add_user(&username, &token)?;
            println!("User {} registered", user.username);
        }

        Commands::Import {
            dir,
            owner,
            follow_symlinks,
        } => {
            let user = library.get_user(&owner)?;
            let files = scan_music_files(&dir, follow_symlinks);
            info!("Found {} music files in {}", files.len(), dir.to_string_lossy());

            let mut imported = 0;
            for path in &files {
                match library.import_file(&user, &LoftyCodec, path) {
                    Ok(track) => {
                        imported += 1;
                        println!(
                            "    - {} {} - {}",
                            track.id, track.metadata.artist, track.metadata.title
                        );
                    }
                    Err(e) => warn!("skipping {}: {e}", path.to_string_lossy()),
                }
            }
            println!("Imported {imported} of {} files", files.len());
        }

        Commands::List { owner } => {
            let tracks = library.list_tracks(&owner)?;
            for track in tracks {
                let m = &track.metadata;
                println!("Track {}: {} - {}", track.id, m.artist, m.title);
                println!("  album: {} ({}), art {}", m.album, m.album_artist, m.album_hash);
                println!("  listen: {}", m.listen);
            }
        }
    }
    Ok(())
}
