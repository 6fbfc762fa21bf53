use zarrs::array::{Array, ArrayMetadata, ArraySubset};

use crate::metadata::Axis;

/// Chunk request sentinel meaning "the whole axis".
pub const WHOLE_AXIS: i64 = -1;

/// Per-axis chunk request: `chunk_size` along space axes, the whole axis otherwise.
pub fn chunk_request(axes: &[Axis], chunk_size: u64) -> Vec<i64> {
    axes.iter()
        .map(|a| {
            if a.is_space() {
                i64::try_from(chunk_size).unwrap_or(i64::MAX)
            } else {
                WHOLE_AXIS
            }
        })
        .collect()
}

/// Resolve one requested chunk extent against the array extent.
pub fn resolve_chunk_dim(request: i64, extent: u64) -> u64 {
    match u64::try_from(request) {
        Ok(r) if r > 0 && r < extent => r,
        _ => extent.max(1),
    }
}

/// Resolve a chunk request against an array shape.
pub fn resolve_chunks(request: &[i64], shape: &[u64]) -> Vec<u64> {
    request
        .iter()
        .zip(shape)
        .map(|(&r, &s)| resolve_chunk_dim(r, s))
        .collect()
}

/// The regular chunking of an array: its shape and the shape of each chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLayout {
    shape: Vec<u64>,
    chunks: Vec<u64>,
}

impl ChunkLayout {
    pub fn new(shape: Vec<u64>, chunks: Vec<u64>) -> crate::Result<Self> {
        if shape.len() != chunks.len() {
            return Err(crate::Error::general(format!(
                "chunk shape {chunks:?} does not match array shape {shape:?}"
            )));
        }
        if chunks.contains(&0) {
            return Err(crate::Error::general(format!("zero chunk extent in {chunks:?}")));
        }
        Ok(Self { shape, chunks })
    }

    /// Read the layout from array metadata (Zarr V2 or V3).
    pub fn from_metadata(metadata: &ArrayMetadata) -> crate::Result<Self> {
        let value = serde_json::to_value(metadata)?;
        let shape: Vec<u64> = serde_json::from_value(
            value
                .get("shape")
                .cloned()
                .ok_or_else(|| crate::Error::general("array metadata has no shape"))?,
        )?;
        let chunks: Vec<u64> = serde_json::from_value(
            chunk_shape_value(&value)
                .cloned()
                .ok_or_else(|| crate::Error::general("array metadata has no regular chunk shape"))?,
        )?;
        Self::new(shape, chunks)
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn chunks(&self) -> &[u64] {
        &self.chunks
    }
}

/// Every chunk of `array` as a subset bounded by the array shape, in C order.
pub fn chunk_subsets<S: ?Sized>(array: &Array<S>) -> crate::Result<Vec<ArraySubset>> {
    ArraySubset::new_with_shape(array.chunk_grid_shape().to_vec())
        .indices()
        .into_iter()
        .map(|chunk_indices| {
            array
                .chunk_subset_bounded(&chunk_indices)
                .map_err(crate::Error::from)
        })
        .collect()
}

/// Return a copy of `metadata` whose regular chunk shape is `chunks`.
///
/// Every other field (data type, fill value, compressor, filters,
/// dimension separator, codecs, attributes) is carried over unchanged.
pub fn with_chunk_shape(metadata: &ArrayMetadata, chunks: &[u64]) -> crate::Result<ArrayMetadata> {
    let mut value = serde_json::to_value(metadata)?;
    let slot = chunk_shape_value_mut(&mut value)
        .ok_or_else(|| crate::Error::general("array metadata has no regular chunk shape"))?;
    *slot = serde_json::to_value(chunks)?;
    Ok(serde_json::from_value(value)?)
}

fn is_v2(value: &serde_json::Value) -> bool {
    value.get("zarr_format").and_then(serde_json::Value::as_u64) == Some(2)
}

fn chunk_shape_value(value: &serde_json::Value) -> Option<&serde_json::Value> {
    if is_v2(value) {
        value.get("chunks")
    } else {
        value.pointer("/chunk_grid/configuration/chunk_shape")
    }
}

fn chunk_shape_value_mut(value: &mut serde_json::Value) -> Option<&mut serde_json::Value> {
    if is_v2(value) {
        value.get_mut("chunks")
    } else {
        value.pointer_mut("/chunk_grid/configuration/chunk_shape")
    }
}
