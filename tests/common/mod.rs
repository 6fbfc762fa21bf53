#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;
use zarrs::array::{Array, Element, ElementOwned};
use zarrs::filesystem::FilesystemStore;

/// A Zarr hierarchy in a temporary directory, written by hand.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        env_logger::try_init().ok();
        Self {
            dir: tempfile::tempdir().expect("create temporary directory"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn fspath(&self, node: &str) -> PathBuf {
        self.root().join(node.trim_matches('/'))
    }

    pub fn write_json(&self, key: &str, value: &Value) {
        let path = self.fspath(key);
        std::fs::create_dir_all(path.parent().expect("key has a parent")).expect("create node");
        std::fs::write(&path, serde_json::to_vec_pretty(value).expect("serialize"))
            .expect("write metadata");
    }

    pub fn read_json(&self, key: &str) -> Value {
        let bytes = std::fs::read(self.fspath(key)).expect("read metadata");
        serde_json::from_slice(&bytes).expect("parse metadata")
    }

    pub fn write_text(&self, key: &str, text: &str) {
        let path = self.fspath(key);
        std::fs::create_dir_all(path.parent().expect("key has a parent")).expect("create node");
        std::fs::write(path, text).expect("write file");
    }

    pub fn group_v2(&self, node: &str, attributes: Value) {
        self.write_json(&format!("{node}/.zgroup"), &json!({"zarr_format": 2}));
        self.write_json(&format!("{node}/.zattrs"), &attributes);
    }

    /// A `<u2` array with `/` separated chunk keys.
    pub fn array_v2(&self, node: &str, shape: &[u64], chunks: &[u64], compressor: Value) {
        self.array_v2_typed(node, shape, chunks, "<u2", compressor);
    }

    pub fn array_v2_typed(
        &self,
        node: &str,
        shape: &[u64],
        chunks: &[u64],
        dtype: &str,
        compressor: Value,
    ) {
        self.write_json(
            &format!("{node}/.zarray"),
            &json!({
                "zarr_format": 2,
                "shape": shape,
                "chunks": chunks,
                "dtype": dtype,
                "compressor": compressor,
                "fill_value": 0,
                "order": "C",
                "filters": null,
                "dimension_separator": "/"
            }),
        );
    }

    pub fn group_v3(&self, node: &str, attributes: Value) {
        self.write_json(
            &format!("{node}/zarr.json"),
            &json!({"zarr_format": 3, "node_type": "group", "attributes": attributes}),
        );
    }

    /// A `uint16` array with the default chunk key encoding.
    pub fn array_v3(&self, node: &str, shape: &[u64], chunks: &[u64]) {
        self.array_v3_typed(node, shape, chunks, "uint16", json!(0));
    }

    pub fn array_v3_typed(
        &self,
        node: &str,
        shape: &[u64],
        chunks: &[u64],
        data_type: &str,
        fill_value: Value,
    ) {
        let bytes = match data_type {
            "bool" | "int8" | "uint8" => json!({"name": "bytes"}),
            _ => json!({"name": "bytes", "configuration": {"endian": "little"}}),
        };
        self.write_json(
            &format!("{node}/zarr.json"),
            &json!({
                "zarr_format": 3,
                "node_type": "array",
                "shape": shape,
                "data_type": data_type,
                "chunk_grid": {"name": "regular", "configuration": {"chunk_shape": chunks}},
                "chunk_key_encoding": {"name": "default", "configuration": {"separator": "/"}},
                "fill_value": fill_value,
                "codecs": [bytes],
                "attributes": {}
            }),
        );
    }

    pub fn storage(&self) -> Arc<FilesystemStore> {
        Arc::new(FilesystemStore::new(self.root()).expect("open store"))
    }

    /// Overwrite the whole of a `uint16` array with `data` in C order.
    pub fn fill(&self, node: &str, data: Vec<u16>) {
        self.fill_with(node, data);
    }

    pub fn fill_with<T: Element>(&self, node: &str, data: Vec<T>) {
        let array = Array::open(self.storage(), node).expect("open array");
        array
            .store_array_subset(&array.subset_all(), data)
            .expect("store data");
    }

    pub fn read(&self, node: &str) -> Vec<u16> {
        self.read_as(node)
    }

    pub fn read_as<T: ElementOwned>(&self, node: &str) -> Vec<T> {
        let array = Array::open(self.storage(), node).expect("open array");
        array
            .retrieve_array_subset(&array.subset_all())
            .expect("retrieve data")
    }
}

pub fn tczyx() -> Value {
    json!([
        {"name": "t", "type": "time"},
        {"name": "c", "type": "channel"},
        {"name": "z", "type": "space"},
        {"name": "y", "type": "space"},
        {"name": "x", "type": "space"}
    ])
}

pub fn yx() -> Value {
    json!([
        {"name": "y", "type": "space"},
        {"name": "x", "type": "space"}
    ])
}

pub fn multiscales(axes: Value, paths: &[&str]) -> Value {
    let datasets: Vec<Value> = paths.iter().map(|p| json!({"path": p})).collect();
    json!({
        "multiscales": [{
            "version": "0.4",
            "axes": axes,
            "datasets": datasets
        }]
    })
}

/// OME-XML with one image per `(name, pixel type, channels)`;
/// a channel is `(name, samples per pixel)`.
pub fn ome_xml(images: &[(&str, &str, &[(&str, u32)])]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06">
"#,
    );
    for (i, (name, pixel_type, channels)) in images.iter().enumerate() {
        xml.push_str(&format!(
            "<Image ID=\"Image:{i}\" Name=\"{name}\"><Pixels ID=\"Pixels:{i}\" Type=\"{pixel_type}\" SizeC=\"{}\">",
            channels.len()
        ));
        for (c, (channel, spp)) in channels.iter().enumerate() {
            xml.push_str(&format!(
                "<Channel ID=\"Channel:{i}:{c}\" Name=\"{channel}\" SamplesPerPixel=\"{spp}\"/>"
            ));
        }
        xml.push_str("</Pixels></Image>\n");
    }
    xml.push_str("</OME>\n");
    xml
}
