//! Desktop notification when a recording is saved
//!
//! macOS goes through `osascript`, Linux through `notify-send`. Other
//! platforms only log.

use anyhow::Result;
use std::path::Path;
use tracing::info;

use super::Notifier;

const TITLE: &str = "GifCast";

#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }
}

fn message_for(location: &Path) -> String {
    let name = location
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| location.display().to_string());
    format!("Saved {}", name)
}

/// Quote a string for an AppleScript string literal
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn applescript_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(target_os = "macos")]
fn show(message: &str) -> Result<()> {
    let script = format!(
        "display notification {} with title {}",
        applescript_quote(message),
        applescript_quote(TITLE)
    );
    let status = std::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .status()?;
    anyhow::ensure!(status.success(), "osascript exited with {}", status);
    Ok(())
}

#[cfg(target_os = "linux")]
fn show(message: &str) -> Result<()> {
    let status = std::process::Command::new("notify-send")
        .arg(TITLE)
        .arg(message)
        .status()?;
    anyhow::ensure!(status.success(), "notify-send exited with {}", status);
    Ok(())
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn show(message: &str) -> Result<()> {
    info!("{}: {}", TITLE, message);
    Ok(())
}

impl Notifier for DesktopNotifier {
    fn notify_saved(&self, location: &Path) -> Result<()> {
        let message = message_for(location);
        show(&message)?;
        info!("Notified: {}", message);
        Ok(())
    }
}
