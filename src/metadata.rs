use serde::{Deserialize, Serialize};

/// Attribute holding the multiscale descriptors of an image group.
pub const MULTISCALES_KEY: &str = "multiscales";

/// Namespace attribute used by NGFF 0.5 to nest its metadata.
pub const OME_NAMESPACE_KEY: &str = "ome";

/// Storage index of the channel axis, when the image has one.
///
/// NGFF orders axes as `[t][c][z]yx`; images are expected to carry a time
/// axis ahead of the channel axis, as bioformats2raw writes them.
pub const CHANNEL_AXIS_INDEX: usize = 1;

/// Axis labels which are always kept when collapsing dimensions.
pub const SPATIAL_LABELS: [char; 2] = ['X', 'Y'];

/// The kind of an NGFF axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AxisType {
    Space,
    Time,
    Channel,
}

/// An entry of the `axes` list of a multiscale descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Axis {
    pub name: String,
    /// Optional in NGFF 0.4, but every axis written by bioformats2raw carries one.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub axis_type: Option<AxisType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Axis {
    pub fn new(name: impl Into<String>, axis_type: AxisType) -> Self {
        Self {
            name: name.into(),
            axis_type: Some(axis_type),
            unit: None,
        }
    }

    /// Upper-case single-character label, e.g. `X` or `C`.
    pub fn label(&self) -> String {
        self.name.to_uppercase()
    }

    pub fn is_space(&self) -> bool {
        self.axis_type == Some(AxisType::Space)
    }

    pub fn is_channel(&self) -> bool {
        self.axis_type == Some(AxisType::Channel) || self.label() == "C"
    }
}

/// One resolution level of a multiscale image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    /// Path of the level's array relative to the image group.
    pub path: String,
    /// Unstructured remainder, e.g. `coordinateTransformations`.
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// A multiscale descriptor; `datasets` are ordered from full resolution down.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Multiscale {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub axes: Vec<Axis>,
    pub datasets: Vec<Dataset>,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Multiscale {
    /// Axis labels in storage order, e.g. `TCZYX`.
    pub fn axis_labels(&self) -> String {
        self.axes.iter().map(Axis::label).collect()
    }

    /// Index of the channel axis, if any.
    pub fn channel_axis(&self) -> Option<usize> {
        self.axes.iter().position(Axis::is_channel)
    }

    /// Check the axis invariants this crate relies on.
    ///
    /// `path` is only used for error context.
    pub fn validate(&self, path: &str) -> crate::Result<()> {
        if self.axes.is_empty() {
            return Err(crate::Error::malformed(path, "multiscale has no axes"));
        }
        if self.datasets.is_empty() {
            return Err(crate::Error::malformed(path, "multiscale has no datasets"));
        }

        let labels: Vec<String> = self.axes.iter().map(Axis::label).collect();
        for (idx, label) in labels.iter().enumerate() {
            if labels[..idx].contains(label) {
                return Err(crate::Error::malformed(
                    path,
                    format!("duplicate axis \"{label}\""),
                ));
            }
        }

        for spatial in SPATIAL_LABELS {
            let Some(axis) = self.axes.iter().find(|a| a.label() == spatial.to_string()) else {
                return Err(crate::Error::malformed(
                    path,
                    format!("missing spatial axis \"{spatial}\""),
                ));
            };
            if axis.axis_type.is_some_and(|t| t != AxisType::Space) {
                return Err(crate::Error::malformed(
                    path,
                    format!("axis \"{spatial}\" is not of type space"),
                ));
            }
        }

        let channels: Vec<usize> = self
            .axes
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_channel())
            .map(|(idx, _)| idx)
            .collect();
        match channels.as_slice() {
            [] => {}
            [CHANNEL_AXIS_INDEX] => {}
            [idx] => {
                return Err(crate::Error::malformed(
                    path,
                    format!(
                        "channel axis at index {idx}, expected index {CHANNEL_AXIS_INDEX} of \"{}\"",
                        self.axis_labels()
                    ),
                ));
            }
            _ => {
                return Err(crate::Error::malformed(
                    path,
                    format!("more than one channel axis in \"{}\"", self.axis_labels()),
                ));
            }
        }
        Ok(())
    }
}

/// Extract the multiscale descriptors from a group's attributes.
///
/// Both the NGFF 0.4 location (`multiscales`) and the 0.5 location
/// (`ome.multiscales`) are recognised.
pub fn parse_multiscales(
    path: &str,
    attributes: &serde_json::Map<String, serde_json::Value>,
) -> crate::Result<Vec<Multiscale>> {
    let value = attributes
        .get(MULTISCALES_KEY)
        .or_else(|| {
            attributes
                .get(OME_NAMESPACE_KEY)
                .and_then(|ome| ome.get(MULTISCALES_KEY))
        })
        .ok_or_else(|| {
            crate::Error::malformed(path, format!("no \"{MULTISCALES_KEY}\" attribute"))
        })?;
    let multiscales: Vec<Multiscale> = serde_json::from_value(value.clone())
        .map_err(|e| crate::Error::malformed(path, format!("invalid multiscales: {e}")))?;
    if multiscales.is_empty() {
        return Err(crate::Error::malformed(path, "empty multiscales list"));
    }
    for multiscale in &multiscales {
        multiscale.validate(path)?;
    }
    Ok(multiscales)
}

/// Collapse storage axis labels to the used display dimensions.
///
/// Axes are kept if spatial (X/Y) or longer than 1,
/// then reversed as display order is the reverse of storage order.
pub fn collapse_dims(labels: &str, shape: &[u64]) -> String {
    let kept: Vec<char> = labels
        .chars()
        .zip(shape)
        .filter(|&(label, &extent)| SPATIAL_LABELS.contains(&label) || extent > 1)
        .map(|(label, _)| label)
        .collect();
    kept.into_iter().rev().collect()
}
