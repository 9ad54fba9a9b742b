//! Console stand-in for the saved-texts screen and the camera tap surface.

use anyhow::Result;
use chrono::Local;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use crate::{
    models::RecognizedTextRecord,
    scan::{
        spawn_focus_subscriber, spawn_scan_subscriber, InputBus, PermissionStatus, ScanOutcome,
        TapEvent,
    },
    AppState,
};

const HELP: &str = "\
commands:
  tap X Y     focus at (X, Y) and scan
  scan        scan without focusing
  cancel      cancel the scan in progress
  list        show saved texts, newest first
  delete N    delete the N-th text of the list
  clear       delete every saved text
  status      show whether a scan is running
  permission  ask for camera access
  quit";

const PERMISSION_REQUIRED: &str =
    "Camera permission is required to use this feature. Type `permission` to grant it.";

const SCAN_IN_PROGRESS: &str = "Scan already in progress";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Tap(TapEvent),
    Scan,
    Cancel,
    List,
    /// 1-based position in the displayed list.
    Delete(usize),
    Clear,
    Status,
    Permission,
    Help,
    Quit,
}

/// `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let Some(name) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();

    let command = match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("tap", [x, y]) => {
            let x = x.parse().map_err(|_| format!("invalid x coordinate '{x}'"))?;
            let y = y.parse().map_err(|_| format!("invalid y coordinate '{y}'"))?;
            Command::Tap(TapEvent::at(x, y))
        }
        ("tap", _) => return Err("usage: tap X Y".into()),
        ("scan", []) => Command::Scan,
        ("cancel", []) => Command::Cancel,
        ("list" | "ls", []) => Command::List,
        ("delete" | "rm", [n]) => match n.parse::<usize>() {
            Ok(n) if n >= 1 => Command::Delete(n),
            _ => return Err(format!("invalid position '{n}', positions start at 1")),
        },
        ("delete" | "rm", _) => return Err("usage: delete N".into()),
        ("clear", []) => Command::Clear,
        ("status", []) => Command::Status,
        ("permission", []) => Command::Permission,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        (other, _) => return Err(format!("unknown command '{other}', try `help`")),
    };

    Ok(Some(command))
}

pub fn render_list(records: &[RecognizedTextRecord]) -> String {
    if records.is_empty() {
        return "No texts recognized yet\nTap to scan text".into();
    }

    let mut out = format!("Recognized Texts ({})", records.len());
    for (position, record) in records.iter().enumerate() {
        let local = record.timestamp.with_timezone(&Local);
        out.push_str(&format!(
            "\n{:>3}. {}\n     {}",
            position + 1,
            record.text.replace('\n', "\n     "),
            local.format("%x %X")
        ));
    }
    out
}

pub fn describe_outcome(outcome: &ScanOutcome) -> Option<String> {
    match outcome {
        ScanOutcome::Saved(record) => Some(format!("Saved: {}", record.text)),
        ScanOutcome::NothingRecognized => Some("No text recognized".into()),
        ScanOutcome::PermissionDenied => Some(PERMISSION_REQUIRED.into()),
        ScanOutcome::Cancelled => Some("Scan cancelled".into()),
        ScanOutcome::Failed(_) => Some("Scan failed, nothing saved".into()),
        ScanOutcome::Ignored => None,
    }
}

/// Whether a tap or scan should be forwarded, or the message to show instead.
pub fn gate_activation(permission: PermissionStatus, busy: bool) -> Result<(), &'static str> {
    if !permission.is_granted() {
        return Err(PERMISSION_REQUIRED);
    }
    if busy {
        return Err(SCAN_IN_PROGRESS);
    }
    Ok(())
}

pub async fn run_console(app: &AppState) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

    let bus = InputBus::new(16);
    let focus = spawn_focus_subscriber(&bus, app.capture.clone());
    let scan = spawn_scan_subscriber(&bus, app.scanner.clone(), outcome_tx.clone());

    if !app.scanner.permission().await.is_granted() {
        println!("{PERMISSION_REQUIRED}");
    }
    println!("{}", render_list(&app.store.list_all_sorted_newest_first().await));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = match parse_command(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };

                match command {
                    Command::Tap(_) | Command::Scan => {
                        let permission = app.scanner.permission().await;
                        if let Err(message) = gate_activation(permission, app.scanner.is_busy()) {
                            println!("{message}");
                            continue;
                        }
                        if let Command::Tap(tap) = command {
                            bus.publish(tap);
                        } else {
                            let scanner = app.scanner.clone();
                            let tx = outcome_tx.clone();
                            tokio::spawn(async move {
                                let _ = tx.send(scanner.activate().await);
                            });
                        }
                        println!("Processing...");
                    }
                    Command::Cancel => {
                        if !app.scanner.cancel() {
                            println!("No scan in progress");
                        }
                    }
                    Command::List => {
                        println!("{}", render_list(&app.store.list_all_sorted_newest_first().await));
                    }
                    Command::Delete(position) => match app.store.delete_at(position - 1).await {
                        Ok(Some(removed)) => println!("Deleted: {}", removed.text),
                        Ok(None) => println!("No text at position {position}"),
                        Err(err) => {
                            log::error!("Error deleting item: {err}");
                            println!("Delete failed");
                        }
                    },
                    Command::Clear => {
                        if app.store.list_all_sorted_newest_first().await.is_empty() {
                            println!("Nothing to clear");
                            continue;
                        }
                        println!("Are you sure you want to clear all recognized texts? [y/N]");
                        let answer = lines.next_line().await?.unwrap_or_default();
                        if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
                            continue;
                        }
                        match app.store.clear_all().await {
                            Ok(()) => println!("{}", render_list(&[])),
                            Err(err) => {
                                log::error!("Error clearing texts: {err}");
                                println!("Clear failed");
                            }
                        }
                    }
                    Command::Status => {
                        let state = app.scanner.state();
                        println!("{} ({} scan(s) finished)", state.status.as_str(), state.completed_cycles);
                    }
                    Command::Permission => {
                        let status = app.scanner.request_permission().await;
                        if status.is_granted() {
                            println!("Camera access granted");
                        } else {
                            println!("{PERMISSION_REQUIRED}");
                        }
                    }
                    Command::Help => println!("{HELP}"),
                    Command::Quit => break,
                }
            }
            Some(outcome) = outcome_rx.recv() => {
                if let Some(message) = describe_outcome(&outcome) {
                    println!("{message}");
                }
                if outcome.saved().is_some() {
                    println!("{}", render_list(&app.store.list_all_sorted_newest_first().await));
                }
            }
        }
    }

    drop(bus);
    let _ = tokio::join!(focus, scan);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(
            parse_command("tap 10 20.5"),
            Ok(Some(Command::Tap(TapEvent::at(10.0, 20.5))))
        );
        assert_eq!(parse_command("SCAN"), Ok(Some(Command::Scan)));
        assert_eq!(parse_command("delete 2"), Ok(Some(Command::Delete(2))));
        assert_eq!(parse_command("quit"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_command("tap 10").is_err());
        assert!(parse_command("tap x 1").is_err());
        assert!(parse_command("delete 0").is_err());
        assert!(parse_command("delete").is_err());
        assert!(parse_command("scan now").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn empty_list_shows_hint() {
        let rendered = render_list(&[]);
        assert!(rendered.starts_with("No texts recognized yet"));
    }

    #[test]
    fn list_is_numbered_in_given_order() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let records = vec![
            RecognizedTextRecord::new("Second", at).unwrap(),
            RecognizedTextRecord::new("Hello\nworld", at).unwrap(),
        ];

        let rendered = render_list(&records);
        let second = rendered.find("  1. Second").unwrap();
        let first = rendered.find("  2. Hello\n     world").unwrap();
        assert!(second < first);
    }

    #[test]
    fn activation_is_gated_on_permission_then_busy() {
        assert_eq!(gate_activation(PermissionStatus::Granted, false), Ok(()));
        assert_eq!(
            gate_activation(PermissionStatus::Granted, true),
            Err(SCAN_IN_PROGRESS)
        );
        assert_eq!(
            gate_activation(PermissionStatus::Denied, true),
            Err(PERMISSION_REQUIRED)
        );
        assert_eq!(
            gate_activation(PermissionStatus::NotDetermined, false),
            Err(PERMISSION_REQUIRED)
        );
    }

    #[test]
    fn ignored_outcome_is_silent() {
        assert!(describe_outcome(&ScanOutcome::Ignored).is_none());
        assert!(describe_outcome(&ScanOutcome::NothingRecognized).is_some());
    }
}
