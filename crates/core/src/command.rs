//! Argument list construction for the external extraction tool (`yt-dlp`).
//!
//! [`build_args`] is a pure function of its [`ExternalCommandSpec`]. The
//! result is wrapped in an [`ExternalCommand`] together with the program to
//! run and the working directory the tool writes into.

use std::path::{Path, PathBuf};

use crate::platform::Platform;
use crate::progress::{ID_TAG, PATH_TAG};

/// Program used when no override is configured.
pub const DEFAULT_PROGRAM: &str = "yt-dlp";

/// Browser user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Output filename template; the embedded `%(id)s` is what tier-2 file
/// resolution searches for.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "%(uploader|clean)s-%(title).160s-%(id)s.%(ext)s";

/// Container all merged streams are written to.
pub const MERGE_FORMAT: &str = "mp4";

// ---------------------------------------------------------------------------
// Spec
// ---------------------------------------------------------------------------

/// Everything needed to build one invocation. Derived per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommandSpec {
    pub platform: Platform,
    pub url: String,
    pub user_agent: String,
    pub output_template: String,
    pub cookie_header: Option<String>,
    pub cookie_file: Option<PathBuf>,
}

impl ExternalCommandSpec {
    /// Spec with the default user agent and output template.
    pub fn new(platform: Platform, url: impl Into<String>) -> Self {
        Self {
            platform,
            url: url.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output_template: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            cookie_header: None,
            cookie_file: None,
        }
    }

    /// Attach a raw `Cookie:` header value. Blank values are ignored.
    pub fn with_cookie_header(mut self, header: Option<String>) -> Self {
        self.cookie_header = header
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        self
    }

    /// Attach a Netscape-format cookies file.
    pub fn with_cookie_file(mut self, path: Option<PathBuf>) -> Self {
        self.cookie_file = path;
        self
    }
}

/// Build the ordered argument list for the tool.
pub fn build_args(spec: &ExternalCommandSpec) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--no-playlist".into(),
        "--restrict-filenames".into(),
        "--merge-output-format".into(),
        MERGE_FORMAT.into(),
        "--add-header".into(),
        format!("User-Agent: {}", spec.user_agent),
        "--geo-bypass".into(),
        // One progress line per update instead of carriage-return redraws.
        "--newline".into(),
        // `--print` implies `--quiet`, which would otherwise hide progress.
        "--progress".into(),
        "-o".into(),
        spec.output_template.clone(),
        "--print".into(),
        format!("after_move:{PATH_TAG}%(filepath)s"),
        "--print".into(),
        format!("{ID_TAG}%(id)s"),
    ];

    if let Some(extractor_args) = spec.platform.extractor_args() {
        args.push("--extractor-args".into());
        args.push(extractor_args.into());
    }

    args.push("-f".into());
    args.push(spec.platform.format_selector().into());
    args.push("--add-header".into());
    args.push(format!("Referer: {}", spec.platform.referer()));

    if let Some(cookie) = &spec.cookie_header {
        args.push("--add-header".into());
        args.push(format!("Cookie: {cookie}"));
    }
    if let Some(path) = &spec.cookie_file {
        args.push("--cookies".into());
        args.push(path.to_string_lossy().into_owned());
    }

    args.push(spec.url.clone());
    args
}

// ---------------------------------------------------------------------------
// Tool + command
// ---------------------------------------------------------------------------

/// How the tool is launched: a program plus arguments placed before the
/// generated ones (e.g. `python3 -m yt_dlp`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub leading_args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a whitespace-separated command line such as `python3 -m yt_dlp`.
    ///
    /// Returns `None` for a blank string.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).with_leading_args(parts))
    }
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

/// A fully built invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>, working_dir: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    /// Combine a tool launcher with the arguments built from `spec`.
    pub fn from_spec(tool: &ToolCommand, spec: &ExternalCommandSpec, working_dir: &Path) -> Self {
        let mut args = tool.leading_args.clone();
        args.extend(build_args(spec));
        Self::new(tool.program.clone(), args, working_dir)
    }
}
