//! Terminal feedback for `viewportd`: a spinner when stderr is a TTY, plain
//! `==>` lines otherwise.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    pub fn is_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.is_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    progress: Progress,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        let progress = Progress {
            name: Arc::from(name.as_str()),
            frames: Arc::new(AtomicU64::new(0)),
            spinner: spinner.clone(),
        };
        Self {
            name,
            start: Instant::now(),
            spinner,
            progress,
        }
    }

    /// Handle that can be moved onto a worker thread.
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!(
            "✔ {} ({} frames, {})",
            self.name,
            self.progress.frames(),
            format_duration(elapsed)
        );
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

/// Frame counter shared with the stage spinner.
#[derive(Clone)]
pub struct Progress {
    name: Arc<str>,
    frames: Arc<AtomicU64>,
    spinner: Option<ProgressBar>,
}

impl Progress {
    pub fn frame_done(&self, frame_id: u64) {
        let done = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(spinner) = &self.spinner {
            spinner.set_message(format!("{}… {} frames (last #{})", self.name, done, frame_id));
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
