//! Timed text overlays rendered with `drawtext`.
//!
//! Overlay text is read from a file (`textfile=`) rather than inlined, so
//! arbitrary user text never has to survive filtergraph escaping.

use std::path::{Path, PathBuf};

use reel_models::{OverlayPosition, TextOverlay};

/// Appearance of overlay text.
///
/// ```ignore
/// let style = TextStyle::default().with_font_size(64).with_margin(0.1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_size: u32,
    pub font_color: String,
    pub border_width: u32,
    pub border_color: String,
    /// Distance from the top/bottom edge as a fraction of frame height
    pub margin: f64,
    /// Font file; FFmpeg's default font when unset
    pub font_file: Option<PathBuf>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 56,
            font_color: "white".to_string(),
            border_width: 3,
            border_color: "black".to_string(),
            margin: 0.08,
            font_file: None,
        }
    }
}

impl TextStyle {
    pub fn with_font_size(mut self, size: u32) -> Self {
        self.font_size = size;
        self
    }

    /// Set edge margin (clamped to 0.0..=0.45 of frame height).
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin.clamp(0.0, 0.45);
        self
    }

    pub fn with_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_file = Some(path.into());
        self
    }
}

/// Escape a path for use inside a single-quoted filter option.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

fn y_expression(position: OverlayPosition, margin: f64) -> String {
    match position {
        OverlayPosition::Top => format!("h*{:.3}", margin),
        OverlayPosition::Center => "(h-text_h)/2".to_string(),
        OverlayPosition::Bottom => format!("h-text_h-h*{:.3}", margin),
    }
}

/// One `drawtext` filter for `overlay`, reading its text from `text_file`.
pub fn drawtext_filter(overlay: &TextOverlay, text_file: &Path, style: &TextStyle) -> String {
    let mut options = vec![format!("textfile='{}'", escape_filter_path(text_file))];
    if let Some(font) = &style.font_file {
        options.push(format!("fontfile='{}'", escape_filter_path(font)));
    }
    options.extend([
        "expansion=none".to_string(),
        format!("fontsize={}", style.font_size),
        format!("fontcolor={}", style.font_color),
        format!("borderw={}", style.border_width),
        format!("bordercolor={}", style.border_color),
        "x=(w-text_w)/2".to_string(),
        format!("y={}", y_expression(overlay.position, style.margin)),
        format!(
            "enable='between(t,{:.3},{:.3})'",
            overlay.start,
            overlay.end()
        ),
    ]);
    format!("drawtext={}", options.join(":"))
}

/// Comma-joined `drawtext` chain for all overlays, in order.
///
/// `text_files[i]` must hold the text of `overlays[i]`.
pub fn overlay_filter_chain(
    overlays: &[TextOverlay],
    text_files: &[PathBuf],
    style: &TextStyle,
) -> Option<String> {
    if overlays.is_empty() {
        return None;
    }
    Some(
        overlays
            .iter()
            .zip(text_files)
            .map(|(overlay, file)| drawtext_filter(overlay, file, style))
            .collect::<Vec<_>>()
            .join(","),
    )
}
