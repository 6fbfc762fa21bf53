mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::{Fixture, multiscales, ome_xml, tczyx, yx};
use ngff_pyramid::{
    Error, PyramidImage, ShaderParameters, ShaderType,
    extract::{ExtractRequest, PlaneExtractor},
    histogram::HistogramOptions,
    ome_xml::OmeInfo,
    rechunk::RechunkOutcome,
    storage::NgffStore,
};
use serde_json::json;

fn open(fixture: &Fixture, group: &str) -> PyramidImage {
    open_with_ome(fixture, group, None, None)
}

fn open_with_ome(
    fixture: &Fixture,
    group: &str,
    ome: Option<OmeInfo>,
    index: Option<usize>,
) -> PyramidImage {
    let store = Arc::new(NgffStore::open(fixture.root()).expect("open store"));
    PyramidImage::open(store, group, ome.map(Arc::new), index).expect("open image")
}

/// 2D image of 64x48 with values cycling through 0..100.
fn grayscale(fixture: &Fixture) {
    fixture.group_v2("/img", multiscales(yx(), &["0", "1"]));
    fixture.array_v2("/img/0", &[48, 64], &[16, 16], json!(null));
    fixture.array_v2("/img/1", &[24, 32], &[16, 16], json!(null));
    fixture.fill("/img/0", (0..48 * 64).map(|i| (i % 100) as u16).collect());
}

/// TCZYX image with `channels` constant channels, channel c holding `10 * (c + 1)`.
fn multichannel(fixture: &Fixture, channels: u64) {
    let (y, x) = (20, 30);
    fixture.group_v2("/0", multiscales(tczyx(), &["0"]));
    fixture.array_v2("/0/0", &[1, channels, 1, y, x], &[1, 1, 1, 8, 8], json!(null));
    let data = (0..channels)
        .flat_map(|c| std::iter::repeat_n(10 * (c as u16 + 1), (y * x) as usize))
        .collect();
    fixture.fill("/0/0", data);
}

#[test]
fn grayscale_dims_and_shader() {
    let fixture = Fixture::new();
    grayscale(&fixture);
    let image = open(&fixture, "/img");

    assert_eq!(image.dims(), "XY");
    assert_eq!(image.ngff_dims(), "YX");
    assert_eq!(image.shape(), &[48, 64]);
    assert_eq!(image.level_count(), 2);
    assert_eq!(image.level_array(1).unwrap().shape(), &[24, 32]);
    assert_eq!(image.shader_type(), ShaderType::Grayscale);
    assert_eq!(image.path(), fixture.fspath("/img"));

    let ShaderParameters::Grayscale(params) = image.shader_parameters(3.0).unwrap() else {
        panic!("expected grayscale parameters");
    };
    assert_eq!(params.range, [0, 99]);
    assert!(params.window[0] >= 0 && params.window[1] <= 99);
    assert!(params.window[0] <= params.window[1]);
}

#[test]
fn grayscale_stats() {
    let fixture = Fixture::new();
    grayscale(&fixture);
    let image = open(&fixture, "/img");

    let stats = image.visual_range(None).unwrap();
    assert_eq!(stats.count, 48 * 64);
    assert_eq!((stats.min, stats.max), (0.0, 99.0));
    assert!((stats.median - 49.5).abs() <= 1.0, "median {}", stats.median);
    assert!((stats.mad - 25.0).abs() <= 1.0, "mad {}", stats.mad);

    let coarse = image
        .visual_range_opt(None, &HistogramOptions::default().with_bin_edges(vec![0.0, 50.0, 100.0]))
        .unwrap();
    assert_eq!(coarse.count, 48 * 64);
}

#[test]
fn constant_image_collapses_window() {
    let fixture = Fixture::new();
    fixture.group_v2("/img", multiscales(yx(), &["0"]));
    fixture.array_v2("/img/0", &[10, 10], &[5, 5], json!(null));
    fixture.fill("/img/0", vec![7; 100]);

    let image = open(&fixture, "/img");
    let stats = image.visual_range(None).unwrap();
    assert_eq!(stats.mad, 0.0);
    let json = image.shader_parameters(3.0).unwrap().to_json().unwrap();
    assert_eq!(json, json!({"window": [7, 7], "range": [7, 7]}));
}

#[test]
fn float_stats_skip_nan() {
    let fixture = Fixture::new();
    fixture.group_v3("/", multiscales(yx(), &["0"]));
    fixture.array_v3_typed("/0", &[10, 10], &[5, 5], "float32", json!(0.0));
    let data: Vec<f32> = (0..100)
        .map(|i| if i % 10 == 0 { f32::NAN } else { i as f32 })
        .collect();
    fixture.fill_with("/0", data);

    let stats = open(&fixture, "/").visual_range(None).unwrap();
    let width = 98.0 / 1024.0;
    assert_eq!(stats.count, 90);
    assert!((stats.min - 1.0).abs() <= width, "min {}", stats.min);
    assert!((stats.max - 99.0).abs() <= width, "max {}", stats.max);
    assert!((stats.median - 50.0).abs() <= 1.0, "median {}", stats.median);
}

#[test]
fn signed_integer_stats() {
    let fixture = Fixture::new();
    fixture.group_v2("/img", multiscales(yx(), &["0"]));
    fixture.array_v2_typed("/img/0", &[10, 10], &[4, 4], "<i2", json!(null));
    fixture.fill_with("/img/0", (-50..50).collect::<Vec<i16>>());

    let image = open(&fixture, "/img");
    let stats = image.visual_range(None).unwrap();
    assert_eq!(stats.count, 100);
    assert_eq!((stats.min, stats.max), (-50.0, 49.0));
    assert_eq!(stats.median, -0.5);

    let ShaderParameters::Grayscale(params) = image.shader_parameters(3.0).unwrap() else {
        panic!("expected grayscale parameters");
    };
    assert_eq!(params.range, [-50, 49]);
}

#[test]
fn large_values_keep_a_window() {
    let fixture = Fixture::new();
    fixture.group_v3("/", multiscales(yx(), &["0"]));
    fixture.array_v3_typed("/0", &[8, 8], &[4, 4], "float64", json!(0.0));
    fixture.fill_with("/0", vec![1e17_f64; 64]);

    let image = open(&fixture, "/");
    let stats = image.visual_range(None).unwrap();
    assert_eq!(stats.count, 64);
    assert_eq!(stats.mad, 0.0);
    assert!((stats.median - 1e17).abs() <= 64.0, "median {}", stats.median);

    let ShaderParameters::Grayscale(params) = image.shader_parameters(3.0).unwrap() else {
        panic!("expected grayscale parameters");
    };
    assert_eq!(params.window[0], params.window[1]);
    assert_eq!(params.range[0], params.range[1]);
    assert!((params.range[0] - 100_000_000_000_000_000).abs() <= 64);

    let narrow: Vec<f64> = (0..64).map(|i| 1e17 + if i < 32 { 0.0 } else { 64.0 }).collect();
    fixture.fill_with("/0", narrow);
    let stats = image.visual_range(None).unwrap();
    assert_eq!(stats.count, 64);
    assert!((stats.min - 1e17).abs() <= 64.0, "min {}", stats.min);
    assert!((stats.max - (1e17 + 64.0)).abs() <= 64.0, "max {}", stats.max);
}

#[test]
fn channel_on_image_without_channel_axis() {
    let fixture = Fixture::new();
    grayscale(&fixture);
    let image = open(&fixture, "/img");
    assert!(matches!(
        image.visual_range(Some(0)),
        Err(Error::Computation { .. })
    ));
}

#[test]
fn multichannel_shader() {
    let fixture = Fixture::new();
    multichannel(&fixture, 3);
    let xml = ome_xml(&[(
        "cells",
        "uint16",
        &[("DAPI", 1), ("Alexa Fluor 488", 1), ("Cy5", 1)],
    )]);
    let ome = OmeInfo::from_xml(&xml).unwrap();
    let image = open_with_ome(&fixture, "/0", Some(ome), Some(0));

    assert_eq!(image.dims(), "XYC");
    assert_eq!(image.channel_count(), 3);
    assert_eq!(image.shader_type(), ShaderType::MultiChannel);
    assert_eq!(image.visual_range(Some(1)).unwrap().median, 20.0);
    assert!(matches!(
        image.visual_range(Some(3)),
        Err(Error::Computation { .. })
    ));

    let json = image.shader_parameters(3.0).unwrap().to_json().unwrap();
    let channel = |c: usize, v: i64, name: &str, color: &str| {
        json!({
            "window": [v, v], "range": [v, v], "name": name, "color": color,
            "channel": c, "clamp": false, "enabled": true
        })
    };
    assert_eq!(
        json,
        json!({
            "brightness": 0.0,
            "contrast": 0.0,
            "channelArray": [
                channel(0, 10, "dapi", "red"),
                channel(1, 20, "alexa_fluor_488", "green"),
                channel(2, 30, "cy5", "blue"),
            ]
        })
    );
}

#[test]
fn multichannel_without_ome_uses_default_names() {
    let fixture = Fixture::new();
    multichannel(&fixture, 2);
    let image = open(&fixture, "/0");
    let ShaderParameters::MultiChannel(params) = image.shader_parameters(3.0).unwrap() else {
        panic!("expected multichannel parameters");
    };
    let names: Vec<_> = params.channel_array.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["channel_0", "channel_1"]);
}

#[test]
fn multichannel_name_count_mismatch() {
    let fixture = Fixture::new();
    multichannel(&fixture, 4);
    let xml = ome_xml(&[("cells", "uint16", &[("a", 1), ("b", 1), ("c", 1)])]);
    let image = open_with_ome(&fixture, "/0", Some(OmeInfo::from_xml(&xml).unwrap()), Some(0));
    assert!(matches!(
        image.shader_parameters(3.0),
        Err(Error::Consistency { .. })
    ));
}

#[test]
fn multichannel_too_many_channels() {
    let fixture = Fixture::new();
    multichannel(&fixture, 7);
    let image = open(&fixture, "/0");
    assert!(matches!(
        image.shader_parameters(3.0),
        Err(Error::Consistency { .. })
    ));
}

#[test]
fn rgb_shader() {
    let fixture = Fixture::new();
    multichannel(&fixture, 3);
    let xml = ome_xml(&[("label image", "uint8", &[("rgb", 3)])]);
    let image = open_with_ome(&fixture, "/0", Some(OmeInfo::from_xml(&xml).unwrap()), Some(0));
    assert_eq!(image.shader_type(), ShaderType::Rgb);
    assert_eq!(
        image.shader_parameters(3.0).unwrap().to_json().unwrap(),
        json!({})
    );
}

#[test]
fn single_channel_is_grayscale() {
    let fixture = Fixture::new();
    multichannel(&fixture, 1);
    let image = open(&fixture, "/0");
    assert_eq!(image.dims(), "XY");
    assert_eq!(image.shader_type(), ShaderType::Grayscale);
    let json = image.shader_parameters(3.0).unwrap().to_json().unwrap();
    assert_eq!(json, json!({"window": [10, 10], "range": [10, 10]}));
}

#[test]
fn rechunk_preserves_data_and_metadata() {
    let fixture = Fixture::new();
    let shape = [1, 3, 1, 100, 80];
    fixture.group_v2("/0", multiscales(tczyx(), &["0"]));
    fixture.array_v2("/0/0", &shape, &[1, 1, 1, 100, 80], json!({"id": "gzip", "level": 1}));
    fixture.write_json("/0/0/.zattrs", &json!({"note": "kept"}));
    let data: Vec<u16> = (0..shape.iter().product::<u64>()).map(|i| (i % 65521) as u16).collect();
    fixture.fill("/0/0", data.clone());

    let image = open(&fixture, "/0");
    let outcomes = image.rechunk(64).unwrap();
    assert_eq!(
        outcomes,
        vec![RechunkOutcome::Rewritten {
            from: vec![1, 1, 1, 100, 80],
            to: vec![1, 3, 1, 64, 64],
        }]
    );

    let zarray = fixture.read_json("/0/0/.zarray");
    assert_eq!(zarray["chunks"], json!([1, 3, 1, 64, 64]));
    assert_eq!(zarray["shape"], json!(shape));
    assert_eq!(zarray["compressor"]["id"], json!("gzip"));
    assert_eq!(zarray["dimension_separator"], json!("/"));
    assert_eq!(fixture.read_json("/0/0/.zattrs"), json!({"note": "kept"}));
    assert!(!fixture.fspath("/0/0.temp").exists());
    assert_eq!(fixture.read("/0/0"), data);

    assert_eq!(image.rechunk(64).unwrap(), vec![RechunkOutcome::Unchanged]);
}

#[test]
fn rechunk_caps_at_extent() {
    let fixture = Fixture::new();
    grayscale(&fixture);
    let image = open(&fixture, "/img");
    image.rechunk(512).unwrap();
    assert_eq!(fixture.read_json("/img/0/.zarray")["chunks"], json!([48, 64]));
    assert_eq!(fixture.read_json("/img/1/.zarray")["chunks"], json!([24, 32]));
    assert_eq!(
        fixture.read("/img/0"),
        (0..48 * 64).map(|i| (i % 100) as u16).collect::<Vec<_>>()
    );
}

#[test]
fn rechunk_refuses_orphaned_temp() {
    let fixture = Fixture::new();
    grayscale(&fixture);
    fixture.write_text("/img/0.temp/leftover", "partial");
    let image = open(&fixture, "/img");

    let err = image.rechunk(8).unwrap_err();
    assert!(matches!(err, Error::Consistency { ref path, .. } if path == "/img/0.temp"));
    assert_eq!(fixture.read_json("/img/0/.zarray")["chunks"], json!([16, 16]));
}

#[test]
fn rechunk_v3() {
    let fixture = Fixture::new();
    fixture.group_v3("/", multiscales(yx(), &["0"]));
    fixture.array_v3("/0", &[40, 30], &[40, 30]);
    let data: Vec<u16> = (0..1200).collect();
    fixture.fill("/0", data.clone());

    let image = open(&fixture, "/");
    image.rechunk(16).unwrap();
    let zarr_json = fixture.read_json("/0/zarr.json");
    assert_eq!(
        zarr_json["chunk_grid"]["configuration"]["chunk_shape"],
        json!([16, 16])
    );
    assert_eq!(fixture.read("/0"), data);
    let max = image.visual_range(None).unwrap().max;
    assert!((max - 1199.0).abs() <= 1199.0 / 1024.0, "max {max}");
}

#[test]
fn rechunk_copies_non_numeric_arrays() {
    let fixture = Fixture::new();
    fixture.group_v3("/", multiscales(yx(), &["0"]));
    fixture.array_v3_typed("/0", &[32, 32], &[32, 32], "bool", json!(false));
    let mut zarr_json = fixture.read_json("/0/zarr.json");
    zarr_json["attributes"] = json!({"note": "kept"});
    fixture.write_json("/0/zarr.json", &zarr_json);
    let data: Vec<bool> = (0..32 * 32).map(|i| i % 3 == 0).collect();
    fixture.fill_with("/0", data.clone());

    let image = open(&fixture, "/");
    assert_eq!(
        image.rechunk(8).unwrap(),
        vec![RechunkOutcome::Rewritten {
            from: vec![32, 32],
            to: vec![8, 8],
        }]
    );
    let zarr_json = fixture.read_json("/0/zarr.json");
    assert_eq!(
        zarr_json["chunk_grid"]["configuration"]["chunk_shape"],
        json!([8, 8])
    );
    assert_eq!(zarr_json["data_type"], json!("bool"));
    assert_eq!(zarr_json["attributes"], json!({"note": "kept"}));
    assert_eq!(fixture.read_as::<bool>("/0"), data);
}

#[test]
fn failed_rechunk_keeps_original() {
    let fixture = Fixture::new();
    fixture.group_v2("/img", multiscales(yx(), &["0"]));
    fixture.array_v2("/img/0", &[32, 32], &[16, 16], json!({"id": "gzip", "level": 1}));
    fixture.fill("/img/0", (0..32 * 32).map(|i| i as u16).collect());
    fixture.write_text("/img/0/1/1", "not gzip");
    let intact = std::fs::read(fixture.fspath("/img/0/0/0")).unwrap();

    let image = open(&fixture, "/img");
    assert!(image.rechunk(8).is_err());

    assert!(!fixture.fspath("/img/0.temp").exists());
    assert_eq!(fixture.read_json("/img/0/.zarray")["chunks"], json!([16, 16]));
    assert_eq!(std::fs::read(fixture.fspath("/img/0/0/0")).unwrap(), intact);
    assert_eq!(
        std::fs::read_to_string(fixture.fspath("/img/0/1/1")).unwrap(),
        "not gzip"
    );
}

#[test]
fn ngff_05_attributes() {
    let fixture = Fixture::new();
    let ms = multiscales(yx(), &["0"]);
    fixture.group_v3("/", json!({"ome": {"version": "0.5", "multiscales": ms["multiscales"]}}));
    fixture.array_v3("/0", &[4, 4], &[4, 4]);
    let image = open(&fixture, "/");
    assert_eq!(image.ngff_dims(), "YX");
}

#[test]
fn malformed_images() {
    let fixture = Fixture::new();
    let store = Arc::new(NgffStore::open(fixture.root()).unwrap());

    fixture.group_v2("/missing", multiscales(yx(), &["0"]));
    fixture.group_v2("/growing", multiscales(yx(), &["0", "1"]));
    fixture.array_v2("/growing/0", &[8, 8], &[8, 8], json!(null));
    fixture.array_v2("/growing/1", &[8, 16], &[8, 8], json!(null));
    fixture.group_v2("/rank", multiscales(tczyx(), &["0"]));
    fixture.array_v2("/rank/0", &[8, 8], &[8, 8], json!(null));
    fixture.group_v2("/plain", json!({}));

    for group in ["/missing", "/growing", "/rank", "/plain", "/absent"] {
        let result = PyramidImage::open(store.clone(), group, None, None);
        assert!(
            matches!(result, Err(Error::MalformedMetadata { .. })),
            "{group}: {result:?}"
        );
    }
}

struct RecordingExtractor;

impl PlaneExtractor for RecordingExtractor {
    type Image = ExtractRequest;

    fn extract(&self, request: &ExtractRequest) -> ngff_pyramid::Result<Option<ExtractRequest>> {
        Ok(Some(request.clone()))
    }
}

#[test]
fn extract_2d_forwards_request() {
    let fixture = Fixture::new();
    multichannel(&fixture, 3);
    let image = open(&fixture, "/0");
    let output = PathBuf::from("out.png");
    let request = image
        .extract_2d(&RecordingExtractor, 256, 128, 2.0, Some(output.as_path()))
        .unwrap()
        .unwrap();
    assert_eq!(request.path, fixture.fspath("/0"));
    assert_eq!((request.target_width, request.target_height), (256, 128));
    assert_eq!(request.size_factor, 2.0);
    assert_eq!(request.output, Some(output));
}

#[test]
fn extract_2d_rejects_volumes() {
    let fixture = Fixture::new();
    fixture.group_v2("/0", multiscales(tczyx(), &["0"]));
    fixture.array_v2("/0/0", &[1, 1, 5, 8, 8], &[1, 1, 1, 8, 8], json!(null));
    let image = open(&fixture, "/0");
    assert!(matches!(
        image.extract_2d(&RecordingExtractor, 64, 64, 1.5, None),
        Err(Error::Consistency { .. })
    ));
}
