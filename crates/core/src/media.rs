//! Recognised media artifact extensions.

use std::path::Path;

/// Extensions (lowercase, no dot) the extraction tool may produce.
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov"];

/// Whether `path` ends in a recognised media extension (case-insensitive).
pub fn has_media_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            MEDIA_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Whether a raw output line looks like a filesystem path to a media file.
///
/// Requires a path separator so a bare identifier such as `abc.mp4` printed by
/// the tool is not mistaken for a path.
pub fn looks_like_media_path(line: &str) -> bool {
    let line = line.trim();
    if !(line.contains('/') || line.contains('\\')) {
        return false;
    }
    let lower = line.to_ascii_lowercase();
    MEDIA_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
}

/// MIME type for a media artifact, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}
