//! Classification of the extraction tool's combined output.
//!
//! Every line is one of: a download progress report, a path to the produced
//! file, an identifier, or blank. Paths and identifiers come in two flavours:
//! *tagged* lines produced by our own `--print` templates (see
//! [`crate::command`]) and *untagged* lines recognised heuristically. A tagged
//! signal always beats an untagged one; within a flavour the last line wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::media::looks_like_media_path;

/// Prefix of the line carrying the final file path after post-processing.
pub const PATH_TAG: &str = "[reelfetch:path] ";

/// Prefix of the line carrying the extraction identifier.
pub const ID_TAG: &str = "[reelfetch:id] ";

/// `[download]  42.5% of 10.2MiB at 1.1MiB/s ETA 00:03`; speed and ETA are
/// optional, percent and size are required.
static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\[download\]\s+(\d+(?:\.\d+)?)%.*?of\s+~?\s*([0-9.]+[KMGT]?i?B)(?:.*?at\s+([0-9.]+[KMGT]?i?B/s))?(?:.*?ETA\s+([0-9:]+))?",
    )
    .expect("valid regex")
});

/// One parsed progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Completion percentage, clamped to 0-100.
    pub percent: f64,
    /// Total size token as printed, e.g. `10.2MiB`.
    pub total: String,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

/// Parse a progress line. Returns `None` when the line is not progress.
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let caps = PROGRESS_RE.captures(line)?;
    let percent: f64 = caps.get(1)?.as_str().parse().ok()?;
    let total = caps.get(2)?.as_str().to_string();
    Some(ProgressUpdate {
        percent: percent.clamp(0.0, 100.0),
        total,
        speed: caps.get(3).map(|m| m.as_str().to_string()),
        eta: caps.get(4).map(|m| m.as_str().to_string()),
    })
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// What a single output line means to the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(ProgressUpdate),
    Path { value: String, tagged: bool },
    Identifier { value: String, tagged: bool },
    Blank,
}

/// Classify one line of tool output.
pub fn classify_line(raw: &str) -> OutputLine {
    let line = raw.trim();
    if line.is_empty() {
        return OutputLine::Blank;
    }
    if let Some(update) = parse_progress_line(line) {
        return OutputLine::Progress(update);
    }
    if let Some(value) = line.strip_prefix(PATH_TAG.trim_end()) {
        return tagged(value, |value| OutputLine::Path { value, tagged: true });
    }
    if let Some(value) = line.strip_prefix(ID_TAG.trim_end()) {
        return tagged(value, |value| OutputLine::Identifier { value, tagged: true });
    }
    if looks_like_media_path(line) {
        return OutputLine::Path {
            value: line.to_string(),
            tagged: false,
        };
    }
    OutputLine::Identifier {
        value: line.to_string(),
        tagged: false,
    }
}

fn tagged(value: &str, build: impl FnOnce(String) -> OutputLine) -> OutputLine {
    let value = value.trim();
    if value.is_empty() || value == "NA" {
        OutputLine::Blank
    } else {
        build(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Accumulated signals
// ---------------------------------------------------------------------------

/// Candidate result signals gathered over a whole run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResultSignals {
    tagged_path: Option<String>,
    untagged_path: Option<String>,
    tagged_id: Option<String>,
    untagged_id: Option<String>,
}

impl ResultSignals {
    /// Record a classified line. Progress and blank lines are ignored.
    pub fn record(&mut self, line: &OutputLine) {
        match line {
            OutputLine::Path { value, tagged: true } => self.tagged_path = Some(value.clone()),
            OutputLine::Path { value, tagged: false } => self.untagged_path = Some(value.clone()),
            OutputLine::Identifier { value, tagged: true } => self.tagged_id = Some(value.clone()),
            OutputLine::Identifier { value, tagged: false } => {
                self.untagged_id = Some(value.clone())
            }
            OutputLine::Progress(_) | OutputLine::Blank => {}
        }
    }

    /// Candidate final path.
    pub fn final_path(&self) -> Option<&str> {
        self.tagged_path.as_deref().or(self.untagged_path.as_deref())
    }

    /// Candidate identifier.
    pub fn identifier(&self) -> Option<&str> {
        self.tagged_id.as_deref().or(self.untagged_id.as_deref())
    }
}
