//! In-place rechunking of stored arrays.
//!
//! An array is rewritten into a sibling `<name>.temp` node with the new chunk shape,
//! flushed to disk and verified; only then is the original erased
//! and the sibling renamed into its place.

use rayon::prelude::*;
use zarrs::{
    array::{Array, ArrayBytes, ArrayMetadataOptions, ArraySubset},
    filesystem::FilesystemStore,
};

use crate::{
    chunk::{ChunkLayout, chunk_request, resolve_chunks, with_chunk_shape},
    metadata::Axis,
    storage::NgffStore,
};

/// Suffix of the sibling node an array is rewritten into.
pub const TEMP_SUFFIX: &str = ".temp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RechunkOutcome {
    /// The array already had the requested chunk shape.
    Unchanged,
    Rewritten { from: Vec<u64>, to: Vec<u64> },
}

/// Path of the temporary sibling of `node_path`.
pub fn temp_path(node_path: &str) -> String {
    format!("{}{TEMP_SUFFIX}", node_path.trim_end_matches('/'))
}

/// Rechunk the array at `node_path` so that space axes have chunks of `chunk_size`
/// (capped at their extent) and every other axis is a single chunk.
pub fn rechunk_array(
    store: &NgffStore,
    node_path: &str,
    axes: &[Axis],
    chunk_size: u64,
) -> crate::Result<RechunkOutcome> {
    log::info!("Processing array: \"{node_path}\"...");
    let array = store.open_array(node_path)?;
    let shape = array.shape().to_vec();
    if shape.len() != axes.len() {
        return Err(crate::Error::malformed(
            node_path,
            format!(
                "array has {} dimensions but {} axes are declared",
                shape.len(),
                axes.len()
            ),
        ));
    }

    let current = ChunkLayout::from_metadata(array.metadata())?;
    let chunks = resolve_chunks(&chunk_request(axes, chunk_size), &shape);
    log::debug!(
        "shape {shape:?}, chunks {:?} -> {chunks:?}",
        current.chunks()
    );
    if current.chunks() == chunks.as_slice() {
        log::info!("Chunks already requested size");
        return Ok(RechunkOutcome::Unchanged);
    }

    let temp = temp_path(node_path);
    if store.node_fspath(&temp).exists() {
        return Err(crate::Error::consistency(
            &temp,
            "orphaned temporary array from an interrupted rechunk; remove or restore it first",
        ));
    }

    if let Err(e) = write_temp(store, &array, &temp, &chunks) {
        log::warn!("Rechunk of \"{node_path}\" failed, removing \"{temp}\"");
        if let Err(cleanup) = store.erase_node(&temp) {
            log::warn!("Could not remove \"{temp}\": {cleanup}");
        }
        return Err(e);
    }
    drop(array);

    log::debug!("replace: \"{temp}\" -> \"{node_path}\"");
    store.erase_node(node_path)?;
    store.rename_node(&temp, node_path)?;

    Ok(RechunkOutcome::Rewritten {
        from: current.chunks().to_vec(),
        to: chunks,
    })
}

/// Copy `source` into a new array at `temp` with chunk shape `chunks`, flush and verify it.
///
/// Elements are copied as raw bytes, so any data type is supported.
fn write_temp(
    store: &NgffStore,
    source: &Array<FilesystemStore>,
    temp: &str,
    chunks: &[u64],
) -> crate::Result<()> {
    let metadata = with_chunk_shape(source.metadata(), chunks)?;
    let target = Array::new_with_metadata(store.storage(), temp, metadata)?;
    target.store_metadata_opt(
        &ArrayMetadataOptions::default().with_include_zarrs_metadata(false),
    )?;

    let grid = ArraySubset::new_with_shape(target.chunk_grid_shape().to_vec());
    log::info!("Copying {} chunks to \"{temp}\"", grid.num_elements());
    grid.indices().into_par_iter().try_for_each(|chunk_indices| {
        let subset = target.chunk_subset_bounded(&chunk_indices)?;
        let bytes: ArrayBytes<'static> = source.retrieve_array_subset(&subset)?;
        target.store_array_subset(&subset, bytes)?;
        Ok::<_, crate::Error>(())
    })?;

    store.sync_node(temp)?;

    let layout = ChunkLayout::new(source.shape().to_vec(), chunks.to_vec())?;
    let written = store.open_array(temp)?;
    let written_layout = ChunkLayout::from_metadata(written.metadata())?;
    if written_layout != layout {
        return Err(crate::Error::consistency(
            temp,
            format!(
                "expected shape {:?} with chunks {:?}, found shape {:?} with chunks {:?}",
                layout.shape(),
                layout.chunks(),
                written_layout.shape(),
                written_layout.chunks()
            ),
        ));
    }
    Ok(())
}
