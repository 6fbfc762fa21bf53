//! Neuroglancer shader parameters.

use serde::Serialize;

use crate::histogram::RobustStats;

/// Default multiple of the MAD either side of the median used for display windows.
pub const DEFAULT_MAD_SCALE: f64 = 3.0;

/// Colors assigned to channels in order; also bounds the channel count.
pub const PALETTE: [&str; 6] = ["red", "green", "blue", "cyan", "yellow", "magenta"];

/// How an image is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShaderType {
    #[serde(rename = "RGB")]
    Rgb,
    Grayscale,
    MultiChannel,
}

impl std::fmt::Display for ShaderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Rgb => "RGB",
            Self::Grayscale => "Grayscale",
            Self::MultiChannel => "MultiChannel",
        };
        f.write_str(s)
    }
}

/// Display window and full data range, in integral intensity units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowRange {
    pub window: [i64; 2],
    pub range: [i64; 2],
}

impl WindowRange {
    /// Window `median ± mad_scale * mad` clamped to the data range, rounded outwards.
    pub fn from_stats(stats: &RobustStats, mad_scale: f64) -> Self {
        let (lo, hi) = stats.window(mad_scale);
        Self {
            window: [lo.floor() as i64, hi.ceil() as i64],
            range: [stats.min.floor() as i64, stats.max.ceil() as i64],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelParameters {
    pub window: [i64; 2],
    pub range: [i64; 2],
    pub name: String,
    pub color: String,
    pub channel: usize,
    pub clamp: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiChannelParameters {
    pub brightness: f64,
    pub contrast: f64,
    #[serde(rename = "channelArray")]
    pub channel_array: Vec<ChannelParameters>,
}

impl MultiChannelParameters {
    /// Build from per-channel names and statistics, in channel order.
    pub fn new(
        path: &str,
        channels: impl IntoIterator<Item = (String, RobustStats)>,
        mad_scale: f64,
    ) -> crate::Result<Self> {
        let mut channel_array = Vec::new();
        for (idx, (name, stats)) in channels.into_iter().enumerate() {
            let Some(color) = PALETTE.get(idx) else {
                return Err(crate::Error::consistency(
                    path,
                    format!("too many channels for the {} color palette", PALETTE.len()),
                ));
            };
            let WindowRange { window, range } = WindowRange::from_stats(&stats, mad_scale);
            channel_array.push(ChannelParameters {
                window,
                range,
                name: sanitize_name(&name),
                color: color.to_string(),
                channel: idx,
                clamp: false,
                enabled: true,
            });
        }
        Ok(Self {
            brightness: 0.0,
            contrast: 0.0,
            channel_array,
        })
    }
}

/// Parameters serialised as the JSON object Neuroglancer expects for each [`ShaderType`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ShaderParameters {
    Rgb(RgbParameters),
    Grayscale(WindowRange),
    MultiChannel(MultiChannelParameters),
}

/// RGB images need no parameters; serialises as `{}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RgbParameters {}

impl ShaderParameters {
    pub fn shader_type(&self) -> ShaderType {
        match self {
            Self::Rgb(_) => ShaderType::Rgb,
            Self::Grayscale(_) => ShaderType::Grayscale,
            Self::MultiChannel(_) => ShaderType::MultiChannel,
        }
    }

    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Lowercase, with every run of non-alphanumeric characters replaced by `_`.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}
