use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    image::PyramidImage,
    ome_xml::{OME_GROUP, OME_XML_FILE, OmeInfo, SERIES_ATTRIBUTE},
    storage::{NgffStore, join_node_path},
};

/// The images of an OME-NGFF hierarchy, addressed by series name.
///
/// Names come from the OME-XML document if the hierarchy has one,
/// otherwise from the child groups of the root.
#[derive(Debug, Clone)]
pub struct ImageCatalog {
    store: Arc<NgffStore>,
    ome: Option<Arc<OmeInfo>>,
}

impl ImageCatalog {
    /// Open the hierarchy rooted at `path`, reading its OME-XML if present.
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        Self::from_store(Arc::new(NgffStore::open(path)?))
    }

    pub fn from_store(store: Arc<NgffStore>) -> crate::Result<Self> {
        let ome = match store.get(&format!("{OME_GROUP}/{OME_XML_FILE}"))? {
            Some(bytes) => {
                let xml = std::str::from_utf8(&bytes).map_err(|e| {
                    crate::Error::malformed(OME_XML_FILE, format!("not UTF-8: {e}"))
                })?;
                let info = OmeInfo::from_xml(xml)?;
                log::info!(
                    "Read {} images from \"{}\"",
                    info.len(),
                    store.node_fspath(OME_GROUP).join(OME_XML_FILE).display()
                );
                Some(Arc::new(info))
            }
            None => None,
        };
        Ok(Self { store, ome })
    }

    pub fn store(&self) -> &Arc<NgffStore> {
        &self.store
    }

    /// Path of the OME-XML document, if the hierarchy has one.
    pub fn ome_xml_path(&self) -> Option<PathBuf> {
        let path = self.store.node_fspath(OME_GROUP).join(OME_XML_FILE);
        path.is_file().then_some(path)
    }

    pub fn ome_info(&self) -> Option<&OmeInfo> {
        self.ome.as_deref()
    }

    /// Series names: OME-XML image names in document order,
    /// else the root's child groups other than [`OME_GROUP`].
    pub fn list_series(&self) -> crate::Result<Vec<String>> {
        match &self.ome {
            Some(ome) => Ok(ome.image_names()),
            None => Ok(self
                .store
                .child_groups("/")?
                .into_iter()
                .filter(|name| name != OME_GROUP)
                .collect()),
        }
    }

    /// Open the image of a series.
    pub fn get(&self, name: &str) -> crate::Result<PyramidImage> {
        let Some(ome) = &self.ome else {
            if name == OME_GROUP || !self.store.child_groups("/")?.iter().any(|g| g == name) {
                return Err(crate::Error::SeriesNotFound(name.to_string()));
            }
            return PyramidImage::open(self.store.clone(), &join_node_path("/", name), None, None);
        };

        let Some(ordinal) = ome.image_names().iter().position(|n| n == name) else {
            return Err(crate::Error::SeriesNotFound(name.to_string()));
        };
        let group = self.series_group(ordinal)?;
        PyramidImage::open(
            self.store.clone(),
            &join_node_path("/", &group),
            Some(ome.clone()),
            Some(ordinal),
        )
    }

    /// Group path of the series at `ordinal` in the OME-XML.
    ///
    /// Without a `series` attribute, series are stored in groups named by their ordinal.
    fn series_group(&self, ordinal: usize) -> crate::Result<String> {
        let attributes = self
            .store
            .group_attributes(&join_node_path("/", OME_GROUP))?
            .unwrap_or_default();
        let Some(series) = attributes.get(SERIES_ATTRIBUTE) else {
            log::debug!("No \"{SERIES_ATTRIBUTE}\" attribute, using series {ordinal} as group path");
            return Ok(ordinal.to_string());
        };
        let series: Vec<String> = serde_json::from_value(series.clone()).map_err(|e| {
            crate::Error::malformed(
                OME_GROUP,
                format!("invalid \"{SERIES_ATTRIBUTE}\" attribute: {e}"),
            )
        })?;
        series.get(ordinal).cloned().ok_or_else(|| {
            crate::Error::consistency(
                OME_GROUP,
                format!(
                    "OME-XML image {ordinal} has no entry in \"{SERIES_ATTRIBUTE}\" of length {}",
                    series.len()
                ),
            )
        })
    }

    /// Iterate over `(name, image)` for every series, opening images lazily.
    pub fn iter_series(
        &self,
    ) -> crate::Result<impl Iterator<Item = (String, crate::Result<PyramidImage>)> + '_> {
        Ok(self.list_series()?.into_iter().map(|name| {
            let image = self.get(&name);
            (name, image)
        }))
    }
}
