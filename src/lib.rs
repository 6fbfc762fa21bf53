//! Inspection, visualization statistics and in-place rechunking of
//! OME-NGFF multiscale images stored in Zarr hierarchies.
pub mod catalog;
pub mod chunk;
mod element;
mod error;
pub mod extract;
pub mod histogram;
pub mod image;
pub mod metadata;
pub mod ome_xml;
pub mod rechunk;
pub mod shader;
pub mod stats;
pub mod storage;

pub use zarrs;

pub use catalog::ImageCatalog;
pub use element::ElementKind;
pub use error::{Error, Result};
pub use image::PyramidImage;
pub use shader::{DEFAULT_MAD_SCALE, ShaderParameters, ShaderType};
