//! Ledger captures: JSONL dumps of a run's frames for audit and replay.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::core::types::Frame;

/// `<dir>/<run_id>.jsonl`. Path separators in the id are replaced.
pub fn capture_path(dir: &Path, run_id: &str) -> PathBuf {
    let safe: String = run_id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect();
    dir.join(format!("{safe}.jsonl"))
}

/// Atomically write frames as JSONL, one frame per line.
pub fn write_capture(path: &Path, frames: &[Frame]) -> Result<()> {
    debug!(path = %path.display(), frames = frames.len(), "writing capture");
    let mut buf = String::new();
    for frame in frames {
        buf.push_str(&serde_json::to_string(frame).context("serialize frame")?);
        buf.push('\n');
    }
    super::write_atomic(path, &buf)
}

/// Read frames written by [`write_capture`].
pub fn read_capture(path: &Path) -> Result<Vec<Frame>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read capture {}", path.display()))?;
    let mut frames = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let frame: Frame = serde_json::from_str(line)
            .with_context(|| format!("parse {} line {}", path.display(), idx + 1))?;
        frames.push(frame);
    }
    debug!(path = %path.display(), frames = frames.len(), "capture loaded");
    Ok(frames)
}

/// Read a log of raw WebSocket messages, one per non-empty line.
pub fn read_raw_messages(path: &Path) -> Result<Vec<String>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read messages {}", path.display()))?;
    let messages: Vec<String> = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();
    if messages.is_empty() {
        bail!("no messages in {}", path.display());
    }
    Ok(messages)
}
