//! Line-oriented command console on stdin.
//!
//! Every command maps onto one core operation and prints a one-line result.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    audio::{noise::NoiseColor, NoiseSession},
    catalog::Track,
    current_quote, next_quote,
    playback::{commands as playback_commands, coordinator::ChannelStatus, Category},
    refresh_catalog,
    settings::CatalogSettings,
    start_noise, stop_noise,
    timer::{commands as timer_commands, IntervalSnapshot, Phase},
    AppState,
};

const HELP: &str = "\
commands:
  status | start | pause | reset
  focus [minutes]        switch to focus, or set its length
  break [minutes]        switch to break, or set its length
  noise white|brown|off
  music|speech play|pause|stop|next|mute|now|list
  music|speech select <n>
  refresh                re-fetch the speech catalog
  catalog [id [url]]     show or change the speech catalog source
  quote [next]
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackAction {
    Play,
    Pause,
    Stop,
    Next,
    Mute,
    Now,
    List,
    Select(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Start,
    Pause,
    Reset,
    SwitchPhase(Phase),
    SetLength(Phase, String),
    Noise(Option<NoiseColor>),
    Track(Category, TrackAction),
    Refresh,
    Catalog {
        id: Option<String>,
        base_url: Option<String>,
    },
    Quote { advance: bool },
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".into());
    };
    let head = head.to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match (head.as_str(), args.as_slice()) {
        ("status", []) => Command::Status,
        ("start", []) => Command::Start,
        ("pause", []) => Command::Pause,
        ("reset", []) => Command::Reset,
        ("focus" | "break", rest) => {
            let phase = Phase::parse(&head).ok_or_else(|| format!("unknown phase '{head}'"))?;
            match rest {
                [] => Command::SwitchPhase(phase),
                [minutes] => Command::SetLength(phase, minutes.to_string()),
                _ => return Err(format!("usage: {head} [minutes]")),
            }
        }
        ("noise", ["off" | "stop"]) => Command::Noise(None),
        ("noise", [color]) => Command::Noise(Some(
            NoiseColor::parse(color).ok_or_else(|| format!("unknown noise color '{color}'"))?,
        )),
        ("music" | "speech", [action, rest @ ..]) => {
            let category =
                Category::parse(&head).ok_or_else(|| format!("unknown channel '{head}'"))?;
            Command::Track(category, parse_track_action(action, rest)?)
        }
        ("refresh", []) => Command::Refresh,
        ("catalog", rest) => match rest {
            [] => Command::Catalog { id: None, base_url: None },
            [id] => Command::Catalog { id: Some(id.to_string()), base_url: None },
            [id, base_url] => Command::Catalog {
                id: Some(id.to_string()),
                base_url: Some(base_url.trim_end_matches('/').to_string()),
            },
            _ => return Err("usage: catalog [id [url]]".into()),
        },
        ("quote", []) => Command::Quote { advance: false },
        ("quote", ["next"]) => Command::Quote { advance: true },
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ => return Err(format!("unrecognized command '{}'; try 'help'", line.trim())),
    };
    Ok(command)
}

fn parse_track_action(action: &str, rest: &[&str]) -> Result<TrackAction, String> {
    let action = match (action.to_ascii_lowercase().as_str(), rest) {
        ("play", []) => TrackAction::Play,
        ("pause", []) => TrackAction::Pause,
        ("stop", []) => TrackAction::Stop,
        ("next", []) => TrackAction::Next,
        ("mute" | "unmute", []) => TrackAction::Mute,
        ("now", []) => TrackAction::Now,
        ("list", []) => TrackAction::List,
        ("select", [position]) => TrackAction::Select(
            position
                .parse()
                .map_err(|_| format!("'{position}' is not a track number"))?,
        ),
        _ => return Err(format!("unknown track action '{action}'")),
    };
    Ok(action)
}

/// Runs one command. `Ok(None)` asks the console to exit.
pub async fn execute(state: &AppState, command: Command) -> Result<Option<String>, String> {
    let output = match command {
        Command::Status => describe_timer(&timer_commands::get_timer_state(state).await?),
        Command::Start => describe_timer(&timer_commands::start_timer(state).await?),
        Command::Pause => describe_timer(&timer_commands::pause_timer(state).await?),
        Command::Reset => describe_timer(&timer_commands::reset_timer(state).await?),
        Command::SwitchPhase(phase) => {
            describe_timer(&timer_commands::switch_phase(state, phase).await?)
        }
        Command::SetLength(phase, minutes) => {
            describe_timer(&timer_commands::set_phase_length(state, phase, &minutes).await?)
        }
        Command::Noise(Some(color)) => describe_noise(start_noise(state, color).await?),
        Command::Noise(None) => describe_noise(stop_noise(state)?),
        Command::Track(category, action) => run_track_action(state, category, action).await?,
        Command::Refresh => {
            if refresh_catalog(state).await? {
                "catalog refresh started".to_string()
            } else {
                "catalog refresh already running".to_string()
            }
        }
        Command::Catalog { id, base_url } => set_catalog(state, id, base_url)?,
        Command::Quote { advance } => {
            let quote = if advance {
                next_quote(state)?
            } else {
                current_quote(state)?
            };
            quote.to_string()
        }
        Command::Help => HELP.to_string(),
        Command::Quit => return Ok(None),
    };
    Ok(Some(output))
}

async fn run_track_action(
    state: &AppState,
    category: Category,
    action: TrackAction,
) -> Result<String, String> {
    let status = match action {
        TrackAction::Play => playback_commands::play_track(state, category).await?,
        TrackAction::Pause => playback_commands::pause_track(state, category).await?,
        TrackAction::Stop => playback_commands::stop_track(state, category).await?,
        TrackAction::Next => playback_commands::next_track(state, category).await?,
        TrackAction::Mute => playback_commands::toggle_mute(state, category).await?,
        TrackAction::Now => playback_commands::now_playing(state, category).await?,
        TrackAction::Select(position) => {
            playback_commands::select_track(state, category, position).await?
        }
        TrackAction::List => {
            let tracks = playback_commands::list_tracks(state, category).await?;
            let current = playback_commands::now_playing(state, category).await?;
            return Ok(describe_tracks(&tracks, current.index));
        }
    };
    Ok(describe_channel(&status))
}

/// Persists a new catalog source. The running session keeps its resolver,
/// so the change applies from the next launch.
fn set_catalog(
    state: &AppState,
    id: Option<String>,
    base_url: Option<String>,
) -> Result<String, String> {
    let current = state.settings.catalog();
    let Some(id) = id else {
        return Ok(format!("catalog {} at {}", current.catalog_id, current.base_url));
    };
    let updated = CatalogSettings {
        base_url: base_url.unwrap_or(current.base_url),
        catalog_id: id,
    };
    state
        .settings
        .update_catalog(updated.clone())
        .map_err(|e| format!("{e:#}"))?;
    Ok(format!(
        "catalog set to {} at {}; restart to apply",
        updated.catalog_id, updated.base_url
    ))
}

fn describe_timer(snapshot: &IntervalSnapshot) -> String {
    format!(
        "{} {} {} (focus {}m, break {}m)",
        snapshot.state.phase.as_str(),
        snapshot.remaining,
        if snapshot.state.running { "running" } else { "paused" },
        snapshot.config.focus_minutes,
        snapshot.config.break_minutes,
    )
}

fn describe_noise(session: NoiseSession) -> String {
    match session.color {
        Some(color) if session.active => format!("{} noise on", color.as_str()),
        _ => "noise off".to_string(),
    }
}

fn describe_channel(status: &ChannelStatus) -> String {
    let mut flags = Vec::new();
    if status.playing {
        flags.push("playing");
    }
    if status.muted {
        flags.push("muted");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    format!(
        "{} {}/{}: {}{}",
        status.category.as_str(),
        status.index + 1,
        status.total,
        status.title,
        flags
    )
}

fn describe_tracks(tracks: &[Track], selected: usize) -> String {
    tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let marker = if i == selected { '*' } else { ' ' };
            format!("{marker}{:>3}. {}", i + 1, track.title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads commands from stdin until `quit` or end of input.
pub async fn run_console(state: &AppState) -> Result<()> {
    println!("FocusFlow ready. Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let result = match parse_command(&line) {
            Ok(command) => execute(state, command).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(Some(output)) => println!("{output}"),
            Ok(None) => break,
            Err(err) => eprintln!("error: {err}"),
        }
    }
    Ok(())
}
