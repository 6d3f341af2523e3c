use approx::assert_abs_diff_eq;
use dimap::core::geocoding::{AffineTransform, CrsGeoCoding};
use dimap::core::{Band, GeoCoding, Mask, MetadataAttribute, MetadataElement, Product, TiePointGrid};
use dimap::core::{SampleCoding, SampleCodingKind};
use dimap::io::{DimapProductReader, DimapProductWriter, RasterBuffer, ReaderConfig, WriterConfig};
use dimap::{DataType, ProgressMonitor};
use ndarray::Array2;
use std::sync::Arc;
use tempfile::TempDir;

const WGS84_WKT: &str =
    "GEOGCS[\"WGS84(DD)\", DATUM[\"WGS84\", SPHEROID[\"WGS84\", 6378137.0, 298.257223563]]]";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sample_product() -> Product {
    let mut product = Product::new("MER_RR_test", "MER_RR__1P", 16, 12);
    product.description = Some("round trip fixture".to_string());

    let mut flags = SampleCoding::new("l1_flags", SampleCodingKind::Flag);
    flags.add_entry("INVALID", 1, "No data");
    flags.add_entry("LAND", 2, "Land pixel");
    product.add_sample_coding(flags).unwrap();

    let mut radiance = Band::new("radiance_1", DataType::UInt16, 16, 12);
    radiance.scaling_factor = 0.0234;
    radiance.scaling_offset = -1.5;
    radiance.unit = Some("mW/(m^2*sr*nm)".to_string());
    radiance.spectral.wavelength = 412.5;
    radiance.spectral.bandwidth = 10.0;
    product.add_band(radiance).unwrap();

    let mut reflectance = Band::new("reflec", DataType::Float32, 16, 12);
    reflectance.no_data_value_used = true;
    reflectance.no_data_value = -9999.0;
    reflectance.valid_pixel_expression = Some("radiance_1 > 0".to_string());
    product.add_band(reflectance).unwrap();

    let mut flag_band = Band::new("l1_flags", DataType::UInt8, 16, 12);
    flag_band.sample_coding = Some("l1_flags".to_string());
    product.add_band(flag_band).unwrap();

    product
        .add_band(Band::virtual_band("ratio", DataType::Float32, 16, 12, "reflec / radiance_1"))
        .unwrap();

    let lat = TiePointGrid::new("latitude", 3, 3, 0.5, 0.5, 7.5, 5.5)
        .with_data(Array2::from_shape_fn((3, 3), |(r, _)| 45.0 - r as f32))
        .unwrap();
    let lon = TiePointGrid::new("longitude", 3, 3, 0.5, 0.5, 7.5, 5.5)
        .with_data(Array2::from_shape_fn((3, 3), |(_, c)| 5.0 + c as f32))
        .unwrap();
    product.add_tie_point_grid(lat).unwrap();
    product.add_tie_point_grid(lon).unwrap();

    product
        .add_mask(Mask::maths("cloud", "l1_flags > 1", 16, 12))
        .unwrap();

    let transform = AffineTransform::from_flat(&[0.01, 0.0, 0.0, -0.01, 5.0, 45.0]).unwrap();
    product.set_scene_geocoding(Arc::new(GeoCoding::Crs(CrsGeoCoding {
        wkt: WGS84_WKT.to_string(),
        image_to_map: transform,
        geographic: true,
    })));

    let mut sph = MetadataElement::new("SPH");
    sph.add_attribute(MetadataAttribute::ascii("PRODUCT", "MER_RR__1P_TEST"));
    product.metadata.add_element(sph);
    product
}

#[test]
fn test_write_then_read_preserves_product() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("MER_RR_test.dim");
    let monitor = ProgressMonitor::new();

    let mut original = sample_product();
    let mut writer = DimapProductWriter::new(WriterConfig::default());
    let outcome = writer.write(&mut original, &path, &monitor).unwrap();
    println!("Layout: {:?}", outcome.layout);

    // three stored bands plus two tie-point grids; the virtual band has no sidecar
    assert_eq!(outcome.layout.len(), 5);
    assert!(dir.path().join("MER_RR_test.data/radiance_1.img").exists());
    assert!(dir.path().join("MER_RR_test.data/radiance_1.hdr").exists());
    assert!(dir.path().join("MER_RR_test.data/tie_point_grids/latitude.img").exists());
    assert!(!dir.path().join("MER_RR_test.data/ratio.img").exists());

    let values: Vec<f64> = (0..16 * 12).map(|i| (i % 1000) as f64).collect();
    writer
        .write_band_rasters(
            &mut original,
            &[("radiance_1".to_string(), RasterBuffer::from_f64(DataType::UInt16, &values))],
            &monitor,
        )
        .unwrap();
    writer.close().unwrap();

    let reader = DimapProductReader::open(&path, &ReaderConfig::default(), &monitor).unwrap();
    for d in reader.diagnostics() {
        println!("diagnostic: {}", d);
    }
    let restored = reader.product();

    assert_eq!(restored.name, original.name);
    assert_eq!(restored.product_type, original.product_type);
    assert_eq!(restored.scene_width(), 16);
    assert_eq!(restored.scene_height(), 12);
    assert_eq!(restored.bands().len(), original.bands().len());

    for band in original.bands() {
        let other = restored
            .band(&band.name)
            .unwrap_or_else(|| panic!("band {} missing", band.name));
        assert_eq!(other.data_type, band.data_type, "{}", band.name);
        assert_eq!((other.width, other.height), (band.width, band.height));
        assert_abs_diff_eq!(other.scaling_factor, band.scaling_factor, epsilon = 1e-12);
        assert_abs_diff_eq!(other.scaling_offset, band.scaling_offset, epsilon = 1e-12);
        assert_eq!(other.no_data_value_used, band.no_data_value_used);
        if band.no_data_value_used {
            assert_abs_diff_eq!(other.no_data_value, band.no_data_value);
        }
        assert_eq!(other.expression(), band.expression());
        assert_eq!(other.sample_coding, band.sample_coding);
    }
    assert_eq!(restored.band("reflec").unwrap().valid_pixel_expression.as_deref(), Some("radiance_1 > 0"));
    assert_abs_diff_eq!(restored.band("radiance_1").unwrap().spectral.wavelength, 412.5);

    assert_eq!(restored.tie_point_grids().len(), 2);
    let lat = restored.tie_point_grid("latitude").unwrap();
    assert_eq!(lat.data.as_ref().unwrap()[[2, 0]], 43.0);

    assert!(restored.mask("cloud").is_some());
    let coding = restored.sample_coding("l1_flags").unwrap();
    assert_eq!(coding.entry("LAND").unwrap().value, 2);
    assert!(restored.metadata.element("SPH").is_some());

    let gc = restored.scene_geocoding.as_ref().expect("geocoding restored");
    assert!(gc.is_equivalent(original.scene_geocoding.as_ref().unwrap()));

    let data = reader.read_band_raster("radiance_1", &monitor).unwrap();
    assert_eq!(data.len(), 16 * 12);
    assert_eq!(data.get_f64(17), Some(17.0));
}

#[test]
fn test_per_band_geocodings_round_trip() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("multi.dim");
    let monitor = ProgressMonitor::new();

    let mut product = Product::new("multi", "TEST", 8, 8);
    let shared = Arc::new(GeoCoding::Crs(CrsGeoCoding {
        wkt: WGS84_WKT.to_string(),
        image_to_map: AffineTransform::from_flat(&[1.0, 0.0, 0.0, -1.0, 0.0, 8.0]).unwrap(),
        geographic: true,
    }));
    let other = Arc::new(GeoCoding::Crs(CrsGeoCoding {
        wkt: WGS84_WKT.to_string(),
        image_to_map: AffineTransform::from_flat(&[2.0, 0.0, 0.0, -2.0, 0.0, 16.0]).unwrap(),
        geographic: true,
    }));
    for (name, gc) in [("a", &shared), ("b", &shared), ("c", &other)] {
        let mut band = Band::new(name, DataType::Float32, 8, 8);
        band.geocoding = Some(Arc::clone(gc));
        product.add_band(band).unwrap();
    }
    assert!(!product.is_using_single_geocoding());

    DimapProductWriter::new(WriterConfig::default())
        .write(&mut product, &path, &monitor)
        .unwrap();
    let reader = DimapProductReader::open(&path, &ReaderConfig::default(), &monitor).unwrap();
    let restored = reader.product();

    let a = restored.band("a").unwrap().geocoding.clone().unwrap();
    let b = restored.band("b").unwrap().geocoding.clone().unwrap();
    let c = restored.band("c").unwrap().geocoding.clone().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(a.is_equivalent(&shared));
    assert!(c.is_equivalent(&other));
    assert!(!a.is_equivalent(&c));
}

#[test]
fn test_vector_data_listing_and_pruning() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vec.dim");
    let monitor = ProgressMonitor::new();

    let mut product = Product::new("vec", "TEST", 4, 4);
    product.add_band(Band::new("b1", DataType::UInt8, 4, 4)).unwrap();
    let mut writer = DimapProductWriter::new(WriterConfig::default());
    writer.write(&mut product, &path, &monitor).unwrap();

    let vectors = dir.path().join("vec.data/vector_data");
    std::fs::create_dir_all(&vectors).unwrap();
    std::fs::write(vectors.join("pins.csv"), "").unwrap();
    std::fs::write(vectors.join("coastline.csv"), "").unwrap();

    let mut reopened = DimapProductReader::open(&path, &ReaderConfig::default(), &monitor)
        .unwrap()
        .into_product();
    assert_eq!(reopened.vector_data, vec!["coastline", "pins"]);

    reopened.vector_data.retain(|v| v != "coastline");
    writer.write(&mut reopened, &path, &monitor).unwrap();
    assert!(!vectors.join("coastline.csv").exists());
    assert!(vectors.join("pins.csv").exists());
}
