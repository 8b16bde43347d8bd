//! Interactive command loop

use std::sync::Arc;

use parking_lot::RwLock;
use sublink_core::api::ApiClient;
use sublink_core::navigation::{NavOutcome, NavigationController};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::activity::Activity;

const HELP: &str = "\
commands:
  n, next            next line
  p, prev            previous line
  j, jump <line>     go to a line (1-based)
  play / pause       auto-advance
  speed <ms>         auto-advance interval
  online / offline   report connectivity
  hide / show        simulate the window losing focus
  replay             retry queued progress writes
  status             session summary
  dropped            progress writes that were given up on
  log                recent activity
  recent [n]         recently studied content
  q, quit            save and exit";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Next,
    Previous,
    Jump(i64),
    Play,
    Pause,
    Speed(u64),
    Online(bool),
    Hidden(bool),
    Replay,
    Status,
    Dropped,
    Log,
    Recent(Option<u32>),
    Help,
    Quit,
}

impl Command {
    /// `Ok(None)` for a blank line
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();

        let command = match (word, arg) {
            ("n" | "next", None) => Command::Next,
            ("p" | "prev", None) => Command::Previous,
            ("j" | "jump", Some(line)) => {
                let line: i64 = line.parse().map_err(|_| format!("not a line number: {}", line))?;
                Command::Jump(line.saturating_sub(1))
            }
            ("play", None) => Command::Play,
            ("pause", None) => Command::Pause,
            ("speed", Some(ms)) => Command::Speed(ms.parse().map_err(|_| format!("not a number: {}", ms))?),
            ("online", None) => Command::Online(true),
            ("offline", None) => Command::Online(false),
            ("hide", None) => Command::Hidden(true),
            ("show", None) => Command::Hidden(false),
            ("replay", None) => Command::Replay,
            ("status", None) => Command::Status,
            ("dropped", None) => Command::Dropped,
            ("log", None) => Command::Log,
            ("recent", n) => Command::Recent(
                n.map(|n| n.parse().map_err(|_| format!("not a number: {}", n)))
                    .transpose()?,
            ),
            ("h" | "help" | "?", None) => Command::Help,
            ("q" | "quit" | "exit", None) => Command::Quit,
            _ => return Err(format!("unknown command: {} (try help)", line.trim())),
        };
        Ok(Some(command))
    }
}

/// Read commands from stdin until quit, EOF or Ctrl-C
pub async fn run(
    controller: &NavigationController,
    client: &ApiClient,
    activity: &Arc<RwLock<Activity>>,
) -> anyhow::Result<()> {
    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let command = match Command::parse(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };

        if let Err(e) = execute(controller, client, activity, command).await {
            println!("Error: {}", e);
        }
    }
    Ok(())
}

async fn execute(
    controller: &NavigationController,
    client: &ApiClient,
    activity: &Arc<RwLock<Activity>>,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Next => report_move(controller.next().await?),
        Command::Previous => report_move(controller.previous().await?),
        Command::Jump(index) => report_move(controller.jump_to(index).await?),
        Command::Play => {
            if !controller.start_playback().await? {
                println!("Already playing or at the end");
            }
        }
        Command::Pause => {
            controller.pause().await?;
        }
        Command::Speed(ms) => {
            controller.set_speed(ms).await?;
        }
        Command::Online(online) => {
            if let Some(report) = controller.set_online(online).await? {
                println!("{} queued write(s) delivered", report.delivered);
            }
        }
        Command::Hidden(hidden) => controller.on_visibility_changed(hidden).await?,
        Command::Replay => match controller.replay_queue().await? {
            Some(report) => println!(
                "{} delivered, {} waiting, {} superseded, {} dropped",
                report.delivered,
                report.retained,
                report.superseded,
                report.dropped.len()
            ),
            None => println!("A replay is already running"),
        },
        Command::Status => {
            let s = controller.snapshot();
            let position = s
                .current_index
                .map(|i| format!("{}/{}", i + 1, s.total_count))
                .unwrap_or_else(|| "-".to_string());
            println!("content:   {}", s.content_id);
            println!("position:  {} ({:.2}%)", position, s.completion_percentage);
            println!(
                "playback:  {} at {}ms",
                if s.is_playing { "playing" } else { "paused" },
                s.speed_ms
            );
            println!(
                "sync:      {}, {} queued{}",
                if s.online { "online" } else { "offline" },
                s.pending_writes,
                if s.unsaved_changes { ", unsaved changes" } else { "" }
            );
        }
        Command::Dropped => {
            let letters = controller.dead_letters();
            if letters.is_empty() {
                println!("Nothing dropped");
            }
            for letter in letters {
                println!(
                    "{}  line {}  {:?}  {}",
                    letter.dropped_at.format("%H:%M:%S"),
                    letter.item.payload.current_alignment_index + 1,
                    letter.reason,
                    letter.last_error.unwrap_or_default()
                );
            }
        }
        Command::Log => {
            for entry in activity.read().tail(20) {
                println!(
                    "{} {:5} {}",
                    entry.timestamp.format("%H:%M:%S"),
                    entry.kind.as_str(),
                    entry.message.lines().next().unwrap_or_default()
                );
            }
        }
        Command::Recent(limit) => print_recent(client, limit).await?,
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}

fn report_move(outcome: NavOutcome) {
    if outcome == NavOutcome::OutOfRange {
        println!("No line there");
    }
}

/// Print the recent-progress listing
pub async fn print_recent(client: &ApiClient, limit: Option<u32>) -> anyhow::Result<()> {
    let records = client.recent_progress(limit).await?;
    if records.is_empty() {
        println!("No recent activity");
    }
    for record in records {
        println!(
            "{:>8}  {:>6.2}%  line {}/{}  {} min",
            record
                .content_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "?".to_string()),
            record.completion_percentage(),
            record.current_index + 1,
            record.total_count,
            record.session_duration
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("n"), Ok(Some(Command::Next)));
        assert_eq!(Command::parse("  prev "), Ok(Some(Command::Previous)));
        assert_eq!(Command::parse("jump 74"), Ok(Some(Command::Jump(73))));
        assert_eq!(Command::parse("speed 2000"), Ok(Some(Command::Speed(2_000))));
        assert_eq!(Command::parse("recent"), Ok(Some(Command::Recent(None))));
        assert_eq!(Command::parse("recent 5"), Ok(Some(Command::Recent(Some(5)))));
        assert_eq!(Command::parse("offline"), Ok(Some(Command::Online(false))));
        assert_eq!(Command::parse(""), Ok(None));
    }

    #[test]
    fn test_jump_to_lowest_line_does_not_overflow() {
        assert_eq!(
            Command::parse("jump -9223372036854775808"),
            Ok(Some(Command::Jump(i64::MIN)))
        );
        assert_eq!(Command::parse("j 0"), Ok(Some(Command::Jump(-1))));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("jump").is_err());
        assert!(Command::parse("jump x").is_err());
        assert!(Command::parse("speed fast").is_err());
        assert!(Command::parse("dance").is_err());
    }
}
