mod decoder;
mod display;
mod output;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use rhythm_player_core::{
    format_duration, Collaborators, JsonFileStorage, LoadOutcome, MusicPlayer, PlaybackEngine,
    PlayerConfig, PlayerError, SystemClock, TrackList,
};
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

use crate::decoder::SymphoniaLoader;
use crate::display::status_line;
use crate::output::ConsoleDevice;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

fn main() -> rhythm_player_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            runtime.block_on(run_play(args))
        }
        Commands::Tracks { catalog } => run_tracks(&catalog),
        Commands::Format { seconds } => {
            println!("{}", format_duration(seconds));
            Ok(())
        }
    }
}

async fn run_play(args: PlayArgs) -> rhythm_player_core::Result<()> {
    let config = match &args.config {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };
    let tracks = TrackList::load(&args.catalog)?;
    if tracks.is_empty() {
        return Err(PlayerError::InvalidInput("catalog has no tracks"));
    }

    let media_root = args
        .media_root
        .clone()
        .or_else(|| args.catalog.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let state = args.state.clone().unwrap_or_else(default_state_path);
    tracing::info!(
        catalog = %args.catalog.display(),
        media_root = %media_root.display(),
        state = %state.display(),
        tracks = tracks.len(),
        "starting playback"
    );

    let parts = Collaborators {
        device: Box::new(ConsoleDevice),
        loader: Arc::new(SymphoniaLoader::new(media_root)),
        storage: Arc::new(JsonFileStorage::new(state)),
        clock: Arc::new(SystemClock::new()),
    };
    let mut engine = PlaybackEngine::new(config, parts, Handle::current())?;
    engine.initialize();
    engine.set_tracks(tracks.into_tracks());
    if let Some(volume) = args.volume {
        engine.set_volume(volume);
    }
    engine.play_track_by_index(args.index);

    let run_for = Duration::from_secs_f64(args.seconds);
    let skip_every = args
        .skip_every
        .filter(|seconds| *seconds > 0.0)
        .map(Duration::from_secs_f64);

    let started = Instant::now();
    let mut last_skip = started;
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    let mut stdout = std::io::stdout();

    while started.elapsed() < run_for {
        frames.tick().await;

        for outcome in engine.pump() {
            if let LoadOutcome::Failed { track_id, .. } = outcome {
                tracing::warn!(%track_id, "track failed to load; waiting for the next request");
            }
        }

        if let Some(every) = skip_every {
            if last_skip.elapsed() >= every {
                engine.skip_to_next();
                last_skip = Instant::now();
            }
        }

        let line = status_line(&mut MusicPlayer::new(&mut engine), args.bars);
        write!(stdout, "\r\x1b[2K{line}")?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    engine.flush_persistence().await;
    engine.dispose();
    Ok(())
}

fn run_tracks(catalog: &Path) -> rhythm_player_core::Result<()> {
    let tracks = TrackList::load(catalog)?;
    for (index, track) in tracks.tracks.iter().enumerate() {
        let preview = if track.preview_offset_ms < 0 {
            "-".to_string()
        } else {
            format_duration(track.preview_offset_seconds())
        };
        println!(
            "{index:>3}  {:<12} {} — {}  (preview {preview})",
            track.id, track.title, track.artist
        );
    }
    Ok(())
}

/// Clap parser for time flags: only values a `Duration` can hold.
fn parse_seconds(raw: &str) -> Result<f64, String> {
    let seconds: f64 = raw
        .parse()
        .map_err(|err| format!("`{raw}` is not a number: {err}"))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|err| format!("`{raw}` is not a usable number of seconds: {err}"))?;
    Ok(seconds)
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".rhythm-player").join("settings.json")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Rhythm game menu audio player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play tracks from a catalog, rendering progress and a spectrum meter.
    Play(PlayArgs),
    /// List the tracks in a catalog.
    Tracks {
        /// Catalog JSON (`{ "tracks": [...] }`).
        #[arg(short, long)]
        catalog: PathBuf,
    },
    /// Print a number of seconds the way the player bar shows it.
    Format {
        #[arg(allow_negative_numbers = true)]
        seconds: f64,
    },
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Catalog JSON (`{ "tracks": [...] }`).
    #[arg(short, long)]
    catalog: PathBuf,
    /// Directory audio URLs are resolved against. Defaults to the catalog's directory.
    #[arg(long)]
    media_root: Option<PathBuf>,
    /// Track to start with.
    #[arg(short, long, default_value_t = 0)]
    index: usize,
    /// How long to run before exiting.
    #[arg(short, long, default_value_t = 30.0, value_parser = parse_seconds)]
    seconds: f64,
    /// Skip to the next track every this many seconds.
    #[arg(long, value_parser = parse_seconds)]
    skip_every: Option<f64>,
    /// Volume percent to set on startup (persisted).
    #[arg(long)]
    volume: Option<f64>,
    /// Settings file holding the persisted volume.
    #[arg(long)]
    state: Option<PathBuf>,
    /// Player configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of spectrum bars in the status line.
    #[arg(long, default_value_t = 24)]
    bars: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_arguments_parse() {
        let cli = Cli::try_parse_from([
            "rhythm-player",
            "play",
            "--catalog",
            "tracks.json",
            "--index",
            "2",
            "--skip-every",
            "1.5",
            "--volume",
            "40",
        ])
        .unwrap();

        let Commands::Play(args) = cli.command else {
            panic!("expected the play command");
        };
        assert_eq!(args.catalog, PathBuf::from("tracks.json"));
        assert_eq!(args.index, 2);
        assert_eq!(args.skip_every, Some(1.5));
        assert_eq!(args.volume, Some(40.0));
        assert_eq!(args.seconds, 30.0);
        assert_eq!(args.bars, 24);
    }

    #[test]
    fn time_flags_reject_values_a_duration_cannot_hold() {
        for bad in ["inf", "NaN", "-1", "1e300"] {
            assert!(
                Cli::try_parse_from(["rhythm-player", "play", "-c", "t.json", "--seconds", bad])
                    .is_err(),
                "--seconds {bad} was accepted"
            );
            assert!(
                Cli::try_parse_from(["rhythm-player", "play", "-c", "t.json", "--skip-every", bad])
                    .is_err(),
                "--skip-every {bad} was accepted"
            );
        }

        let cli =
            Cli::try_parse_from(["rhythm-player", "play", "-c", "t.json", "--seconds", "2.5"])
                .unwrap();
        let Commands::Play(args) = cli.command else {
            panic!("expected the play command");
        };
        assert_eq!(args.seconds, 2.5);
    }

    #[test]
    fn tracks_lists_a_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("tracks.json");
        std::fs::write(
            &catalog,
            r#"{"tracks":[{"id":"1","title":"Song","artist":"Band","audioUrl":"/a.ogg","backgroundUrl":"/a.jpg","previewTime":61000}]}"#,
        )
        .unwrap();

        run_tracks(&catalog).unwrap();
    }

    #[test]
    fn unreadable_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_tracks(&dir.path().join("missing.json")).is_err());
    }
}
