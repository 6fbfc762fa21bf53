use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use zarrs::{array::Array, filesystem::FilesystemStore};

use crate::{
    extract::{ExtractRequest, PlaneExtractor},
    histogram::{HistogramOptions, RobustStats},
    metadata::{Axis, Multiscale, collapse_dims, parse_multiscales},
    ome_xml::OmeInfo,
    rechunk::{RechunkOutcome, rechunk_array},
    shader::{
        MultiChannelParameters, PALETTE, RgbParameters, ShaderParameters, ShaderType, WindowRange,
    },
    storage::{NgffStore, join_node_path},
};

/// Axis labels which must have extent 1 for an image to be treated as 2D.
const NON_PLANAR_LABELS: [&str; 2] = ["Z", "T"];

/// An OME-NGFF multiscale image: one group whose datasets are the levels of a pyramid.
///
/// The first multiscale descriptor of the group defines the image;
/// rechunking covers every descriptor.
#[derive(Debug, Clone)]
pub struct PyramidImage {
    store: Arc<NgffStore>,
    group_path: String,
    /// Never empty.
    multiscales: Vec<Multiscale>,
    shape: Vec<u64>,
    ome: Option<Arc<OmeInfo>>,
    ome_index: Option<usize>,
}

impl PyramidImage {
    /// Open the image group at `group_path`.
    ///
    /// `ome` and `ome_index` locate the image's entry in the OME-XML, if there is one.
    pub fn open(
        store: Arc<NgffStore>,
        group_path: &str,
        ome: Option<Arc<OmeInfo>>,
        ome_index: Option<usize>,
    ) -> crate::Result<Self> {
        let attributes = store
            .group_attributes(group_path)?
            .ok_or_else(|| crate::Error::malformed(group_path, "not a group"))?;
        let multiscales = parse_multiscales(group_path, &attributes)?;
        let multiscale = &multiscales[0];

        let mut level_shapes: Vec<Vec<u64>> = Vec::with_capacity(multiscale.datasets.len());
        for dataset in &multiscale.datasets {
            let array_path = join_node_path(group_path, &dataset.path);
            let array = store.open_array(&array_path)?;
            let shape = array.shape().to_vec();
            if shape.len() != multiscale.axes.len() {
                return Err(crate::Error::malformed(
                    &array_path,
                    format!(
                        "array has {} dimensions but axes are \"{}\"",
                        shape.len(),
                        multiscale.axis_labels()
                    ),
                ));
            }
            if let Some(previous) = level_shapes.last() {
                if shape.iter().zip(previous).any(|(s, p)| s > p) {
                    return Err(crate::Error::malformed(
                        &array_path,
                        format!("level shape {shape:?} is larger than its predecessor {previous:?}"),
                    ));
                }
            }
            level_shapes.push(shape);
        }
        let shape = level_shapes.swap_remove(0);

        Ok(Self {
            store,
            group_path: group_path.to_string(),
            multiscales,
            shape,
            ome,
            ome_index,
        })
    }

    /// Filesystem path of the image group.
    pub fn path(&self) -> PathBuf {
        self.store.node_fspath(&self.group_path)
    }

    /// Node path of the image group within the hierarchy.
    pub fn group_path(&self) -> &str {
        &self.group_path
    }

    pub fn multiscale(&self) -> &Multiscale {
        &self.multiscales[0]
    }

    pub fn multiscales(&self) -> &[Multiscale] {
        &self.multiscales
    }

    pub fn axes(&self) -> &[Axis] {
        &self.multiscale().axes
    }

    /// Upper-case axis labels in storage order, e.g. `TCZYX`.
    pub fn ngff_dims(&self) -> String {
        self.multiscale().axis_labels()
    }

    pub fn level_count(&self) -> usize {
        self.multiscale().datasets.len()
    }

    /// Node path of the array of a resolution level.
    pub fn level_path(&self, level: usize) -> crate::Result<String> {
        let dataset = self.multiscale().datasets.get(level).ok_or_else(|| {
            crate::Error::general(format!(
                "level {level} out of range for {} levels of \"{}\"",
                self.level_count(),
                self.group_path
            ))
        })?;
        Ok(join_node_path(&self.group_path, &dataset.path))
    }

    pub fn level_array(&self, level: usize) -> crate::Result<Array<FilesystemStore>> {
        self.store.open_array(&self.level_path(level)?)
    }

    /// Extents of the full resolution level.
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// The used display dimensions, e.g. `XY` or `XYC`.
    ///
    /// Non-spatial axes of extent 1 are dropped and the order is reversed from storage order.
    pub fn dims(&self) -> String {
        collapse_dims(&self.ngff_dims(), &self.shape)
    }

    pub fn channel_axis(&self) -> Option<usize> {
        self.multiscale().channel_axis()
    }

    /// Extent of the channel axis, 1 if there is none.
    pub fn channel_count(&self) -> u64 {
        self.channel_axis().map_or(1, |idx| self.shape[idx])
    }

    /// Position of this image in the OME-XML image list.
    pub fn ome_index(&self) -> Option<usize> {
        self.ome_index
    }

    pub fn ome_info(&self) -> Option<&OmeInfo> {
        self.ome.as_deref()
    }

    pub fn shader_type(&self) -> ShaderType {
        let rgb = match (self.ome.as_deref(), self.ome_index) {
            (Some(ome), Some(idx)) => ome.maybe_rgb(idx),
            _ => false,
        };
        if rgb {
            ShaderType::Rgb
        } else if self.channel_count() == 1 {
            ShaderType::Grayscale
        } else {
            ShaderType::MultiChannel
        }
    }

    /// Channel names from the OME-XML, or `channel_<c>` without one.
    pub fn channel_names(&self) -> crate::Result<Vec<String>> {
        match (self.ome.as_deref(), self.ome_index) {
            (Some(ome), Some(idx)) => ome.channel_names(idx),
            _ => Ok((0..self.channel_count())
                .map(|c| format!("channel_{c}"))
                .collect()),
        }
    }

    /// Robust statistics of the full resolution level, or of one channel of it.
    pub fn visual_range(&self, channel: Option<u64>) -> crate::Result<RobustStats> {
        self.visual_range_opt(channel, &HistogramOptions::default())
    }

    /// Explicit options version of [`visual_range`](PyramidImage::visual_range).
    pub fn visual_range_opt(
        &self,
        channel: Option<u64>,
        options: &HistogramOptions,
    ) -> crate::Result<RobustStats> {
        if channel.is_some() && self.channel_axis().is_none() {
            return Err(crate::Error::computation(
                &self.group_path,
                format!("image with axes \"{}\" has no channel axis", self.ngff_dims()),
            ));
        }
        let array = self.level_array(0)?;
        log::info!("Building histogram for \"{}\"...", self.path().display());
        if let Some(c) = channel {
            log::info!("Extracting channel {c}..");
        }
        crate::stats::robust_stats(&array, channel, options)
    }

    /// Neuroglancer shader parameters for this image.
    pub fn shader_parameters(&self, mad_scale: f64) -> crate::Result<ShaderParameters> {
        self.shader_parameters_opt(mad_scale, &HistogramOptions::default())
    }

    pub fn shader_parameters_opt(
        &self,
        mad_scale: f64,
        options: &HistogramOptions,
    ) -> crate::Result<ShaderParameters> {
        match self.shader_type() {
            ShaderType::Rgb => Ok(ShaderParameters::Rgb(RgbParameters {})),
            ShaderType::Grayscale => {
                let stats = self.visual_range_opt(None, options)?;
                Ok(ShaderParameters::Grayscale(WindowRange::from_stats(
                    &stats, mad_scale,
                )))
            }
            ShaderType::MultiChannel => {
                let names = self.channel_names()?;
                let count = self.channel_count();
                if names.len() as u64 != count {
                    return Err(crate::Error::consistency(
                        &self.group_path,
                        format!("{} channel names for {count} channels", names.len()),
                    ));
                }
                if count > PALETTE.len() as u64 {
                    return Err(crate::Error::consistency(
                        &self.group_path,
                        format!(
                            "{count} channels exceed the {} color palette",
                            PALETTE.len()
                        ),
                    ));
                }
                let mut channels = Vec::with_capacity(names.len());
                for (c, name) in (0..count).zip(names) {
                    log::debug!("Processing channel: {name}");
                    channels.push((name, self.visual_range_opt(Some(c), options)?));
                }
                Ok(ShaderParameters::MultiChannel(MultiChannelParameters::new(
                    &self.group_path,
                    channels,
                    mad_scale,
                )?))
            }
        }
    }

    /// Rechunk every level of every multiscale descriptor; see [`rechunk_array`].
    ///
    /// Must not run concurrently with any other operation on this image.
    pub fn rechunk(&self, chunk_size: u64) -> crate::Result<Vec<RechunkOutcome>> {
        log::info!("Processing group: \"{}\"...", self.group_path);
        let mut outcomes = Vec::new();
        for multiscale in &self.multiscales {
            for dataset in &multiscale.datasets {
                let array_path = join_node_path(&self.group_path, &dataset.path);
                outcomes.push(rechunk_array(
                    &self.store,
                    &array_path,
                    &multiscale.axes,
                    chunk_size,
                )?);
            }
        }
        Ok(outcomes)
    }

    /// Extract a resized 2D image using `extractor`.
    ///
    /// Fails unless every Z and T axis has extent 1; all channels are extracted.
    pub fn extract_2d<E: PlaneExtractor>(
        &self,
        extractor: &E,
        target_width: u64,
        target_height: u64,
        size_factor: f64,
        output: Option<&Path>,
    ) -> crate::Result<Option<E::Image>> {
        for (axis, &extent) in self.axes().iter().zip(&self.shape) {
            let label = axis.label();
            if NON_PLANAR_LABELS.contains(&label.as_str()) && extent != 1 {
                return Err(crate::Error::consistency(
                    &self.group_path,
                    format!("axis \"{label}\" has extent {extent}, expected a 2D image"),
                ));
            }
        }
        let mut request = ExtractRequest::new(self.path(), target_width, target_height)
            .with_size_factor(size_factor);
        if let Some(output) = output {
            request = request.with_output(output);
        }
        extractor.extract(&request)
    }
}
