//! Audio helpers: tempo chains and layer mixing graphs.

use std::path::PathBuf;

/// Narrowest per-filter range accepted by every FFmpeg build of `atempo`.
pub const ATEMPO_MIN: f64 = 0.5;
pub const ATEMPO_MAX: f64 = 2.0;

/// Music layers fade out over this many seconds before the video ends.
pub const MUSIC_FADE_OUT_SECS: f64 = 1.0;

/// Factors closer to 1.0 than this are treated as no change.
const TEMPO_TOLERANCE: f64 = 1e-3;

/// Decompose a tempo `factor` into `atempo` steps, each within
/// [`ATEMPO_MIN`, `ATEMPO_MAX`], whose product is `factor`.
///
/// Returns an empty chain for factors that are effectively 1.0 or not
/// positive and finite.
pub fn atempo_chain(factor: f64) -> Vec<f64> {
    if !factor.is_finite() || factor <= 0.0 || (factor - 1.0).abs() < TEMPO_TOLERANCE {
        return Vec::new();
    }

    let mut steps = Vec::new();
    let mut remaining = factor;
    while remaining > ATEMPO_MAX {
        steps.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        steps.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    if (remaining - 1.0).abs() >= TEMPO_TOLERANCE {
        steps.push(remaining);
    }
    steps
}

/// `atempo=a,atempo=b` filter for `factor`, or `None` when no change is needed.
pub fn atempo_filter(factor: f64) -> Option<String> {
    let chain = atempo_chain(factor);
    if chain.is_empty() {
        return None;
    }
    Some(
        chain
            .iter()
            .map(|step| format!("atempo={:.4}", step))
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// One audio file placed on the output timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct MixInput {
    pub path: PathBuf,
    /// Offset from the start of the video (seconds)
    pub delay: f64,
    /// Linear gain
    pub volume: f64,
    /// Fade the layer out over the last second of the video
    pub fade_out: bool,
}

/// Filter graph mixing the video's own audio (input 0) with `layers`
/// (inputs 1..). The result is labeled `[aout]`.
///
/// The video track is scaled by `base_volume`; layers are delayed, scaled and
/// optionally faded, then summed without normalization so gains are absolute.
pub fn mix_filter_graph(layers: &[MixInput], base_volume: f64, total_duration: f64) -> String {
    let mut chains = vec![format!("[0:a]volume={:.3}[a0]", base_volume)];
    let fade_start = (total_duration - MUSIC_FADE_OUT_SECS).max(0.0);

    for (i, layer) in layers.iter().enumerate() {
        let idx = i + 1;
        let delay_ms = (layer.delay.max(0.0) * 1000.0).round() as u64;
        let mut filters = vec![
            "aformat=sample_rates=48000:channel_layouts=stereo".to_string(),
            format!("adelay={delay_ms}|{delay_ms}"),
            format!("volume={:.3}", layer.volume),
        ];
        if layer.fade_out {
            filters.push(format!(
                "afade=t=out:st={:.3}:d={:.3}",
                fade_start, MUSIC_FADE_OUT_SECS
            ));
        }
        chains.push(format!("[{idx}:a]{}[a{idx}]", filters.join(",")));
    }

    let labels: String = (0..=layers.len()).map(|i| format!("[a{i}]")).collect();
    chains.push(format!(
        "{labels}amix=inputs={}:duration=first:dropout_transition=0:normalize=0[aout]",
        layers.len() + 1
    ));
    chains.join(";")
}
