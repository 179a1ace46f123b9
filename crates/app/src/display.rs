//! Terminal rendering of the player bar.

use rhythm_player_core::{MusicPlayer, PlayState};

const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Collapses byte frequency data into `bars` block characters, averaging
/// neighbouring bins.
pub fn bar_meter(data: &[u8], bars: usize) -> String {
    if bars == 0 {
        return String::new();
    }
    if data.is_empty() {
        return " ".repeat(bars);
    }

    (0..bars)
        .map(|bar| {
            let start = bar * data.len() / bars;
            let end = ((bar + 1) * data.len() / bars).max(start + 1).min(data.len());
            let slice = &data[start..end];
            let mean = slice.iter().map(|v| u32::from(*v)).sum::<u32>() / slice.len() as u32;
            LEVELS[(mean as usize * (LEVELS.len() - 1) + 127) / 255]
        })
        .collect()
}

/// One-line player bar: title and artist, elapsed and total time, volume
/// and the spectrum meter. The play state stands in for the title while
/// nothing is attached.
pub fn status_line(player: &mut MusicPlayer<'_>, bars: usize) -> String {
    let label = match (player.play_state(), player.current_track()) {
        (PlayState::Loading, _) => "loading…".to_string(),
        (_, Some(track)) => format!("{} — {}", track.title, track.artist),
        (_, None) => "idle".to_string(),
    };
    let paused = if player.play_state() == PlayState::Paused {
        " (paused)"
    } else {
        ""
    };
    let volume = if player.is_muted() {
        "muted".to_string()
    } else {
        format!("vol {}", player.volume())
    };
    let meter = bar_meter(&player.frequency_data(), bars);

    format!(
        "{label}{paused}  {} / {}  {volume}  [{meter}]",
        player.formatted_current_time(),
        player.formatted_duration(),
    )
}
