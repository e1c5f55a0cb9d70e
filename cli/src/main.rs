mod commands;
mod config;
mod prompt;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use jellytidy::{
    JellyfinClientBuilder, PlaylistFileCleaner, Services, ServicesBuilder, SpotifyClient,
};
use shared::{catalog::EntryKind, discovery::PlaylistStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::commands::{MergeArgs, PlaylistArgs};
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "jellytidy", version)]
#[command(about = "Find and merge duplicate artists and tracks in a Jellyfin music library", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Artist,
    Track,
}

impl From<KindArg> for EntryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Artist => EntryKind::Artist,
            KindArg::Track => EntryKind::Track,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Connects to the configured services and prints library counts
    Status,
    /// Lists duplicate groups with the reason each member matched
    Scan {
        #[arg(long, value_enum, default_value_t = KindArg::Artist)]
        kind: KindArg,
        /// Similarity threshold (0.0 - 1.0), DUPLICATE_THRESHOLD by default
        #[arg(long)]
        threshold: Option<f64>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reviews duplicate groups one by one and merges the accepted ones
    Merge {
        #[arg(long, value_enum, default_value_t = KindArg::Artist)]
        kind: KindArg,
        #[arg(long)]
        threshold: Option<f64>,
        /// Rename duplicates to the kept name instead of merging them
        #[arg(long)]
        rename_only: bool,
        /// Accept every group that is not flagged for review
        #[arg(long, short = 'y')]
        yes: bool,
        /// Apply the plans to an in-memory copy of the library
        #[arg(long)]
        dry_run: bool,
    },
    /// Lists artists that are import artifacts ("Unknown Artist", "???")
    Junk {
        /// Delete junk artists that own no tracks
        #[arg(long)]
        delete: bool,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Builds a playlist from the artists' most popular tracks in the library
    Playlist {
        /// Artist names, e.g. "Blur, Oasis & Pulp"
        #[arg(value_name = "ARTISTS")]
        artists: String,
        /// experience, bangers or slaps
        #[arg(long, default_value = "slaps")]
        style: PlaylistStyle,
        #[arg(long, short = 'n', default_value_t = 20)]
        count: usize,
        #[arg(long)]
        from_year: Option<i32>,
        #[arg(long)]
        to_year: Option<i32>,
        /// Create the playlist instead of only previewing it
        #[arg(long)]
        save: bool,
    },
    /// Manages .m3u/.m3u8 files on the media server over SSH
    PlaylistFiles {
        #[command(subcommand)]
        action: FilesAction,
    },
    /// Triggers a metadata refresh of one item or a full library scan
    Refresh {
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Subcommand)]
enum FilesAction {
    List,
    Delete {
        /// Files to delete; every playlist file under MUSIC_PATH when empty
        #[arg(value_name = "PATH")]
        paths: Vec<String>,
        /// Trigger a library scan afterwards
        #[arg(long)]
        refresh: bool,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

async fn connect(config: &AppConfig) -> Result<Services> {
    let jellyfin = JellyfinClientBuilder::new()
        .base_url(&config.jellyfin_url)
        .api_key(&config.jellyfin_api_key)
        .user_id(config.jellyfin_user_id.as_deref())
        .connect()
        .await
        .with_context(|| format!("connecting to Jellyfin at {}", config.jellyfin_url))?;

    let mut builder = ServicesBuilder::new().catalog(jellyfin);

    if let Some(spotify) = &config.spotify {
        builder = builder.add_discovery(SpotifyClient::new(
            &spotify.client_id,
            &spotify.client_secret,
        )?);
    }

    let cleaner = config.ssh.as_ref().map(|ssh| {
        PlaylistFileCleaner::new(&ssh.host, &ssh.user)
            .port(ssh.port)
            .identity_file(ssh.key_path.as_deref().and_then(|p| p.to_str()))
    });

    Ok(builder.file_cleaner(cleaner).build()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // A .env file is optional
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let services = connect(&config).await?;
    info!("Connected to {}", services.catalog().name());

    match cli.command {
        Commands::Status => commands::status(&services).await,
        Commands::Scan {
            kind,
            threshold,
            json,
        } => {
            let threshold = threshold.unwrap_or(config.duplicate_threshold);
            commands::scan(&services, kind.into(), threshold, json).await
        }
        Commands::Merge {
            kind,
            threshold,
            rename_only,
            yes,
            dry_run,
        } => {
            let args = MergeArgs {
                kind: kind.into(),
                threshold: threshold.unwrap_or(config.duplicate_threshold),
                rename_only,
                yes,
                dry_run,
            };
            commands::merge(&services, args).await
        }
        Commands::Junk { delete, yes } => commands::junk(&services, delete, yes).await,
        Commands::Playlist {
            artists,
            style,
            count,
            from_year,
            to_year,
            save,
        } => {
            let args = PlaylistArgs {
                artists,
                style,
                count,
                from_year,
                to_year,
                save,
            };
            commands::playlist(&services, args).await
        }
        Commands::PlaylistFiles { action } => match action {
            FilesAction::List => commands::list_playlist_files(&services, &config.music_path).await,
            FilesAction::Delete {
                paths,
                refresh,
                yes,
            } => {
                commands::delete_playlist_files(&services, &config.music_path, paths, refresh, yes)
                    .await
            }
        },
        Commands::Refresh { id } => commands::refresh(&services, id.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_playlist_arguments() {
        let cli = Cli::try_parse_from([
            "jellytidy", "playlist", "Blur & Oasis", "--style", "bangers", "-n", "10", "--from-year", "1994",
        ])
        .unwrap();
        match cli.command {
            Commands::Playlist {
                artists,
                style,
                count,
                from_year,
                to_year,
                save,
            } => {
                assert_eq!(artists, "Blur & Oasis");
                assert_eq!(style, PlaylistStyle::Bangers);
                assert_eq!(count, 10);
                assert_eq!(from_year, Some(1994));
                assert_eq!(to_year, None);
                assert!(!save);
            }
            _ => panic!("expected the playlist command"),
        }
    }

    #[test]
    fn merge_defaults_to_artists() {
        let cli = Cli::try_parse_from(["jellytidy", "merge", "--yes", "--dry-run"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Merge {
                kind: KindArg::Artist,
                yes: true,
                dry_run: true,
                rename_only: false,
                ..
            }
        ));
    }
}
