use dimap::core::geocoding::{
    AffineTransform, CrsGeoCoding, GcpGeoCoding, GcpMethod, Placemark, Polynomial,
};
use dimap::core::{Band, Datum, GeoCoding, Product, TiePointGrid};
use dimap::io::{DimapProductReader, DimapProductWriter, Document, ProductBuilder, ReaderConfig, WriterConfig};
use dimap::{DataType, DiagnosticKind, ProgressMonitor};
use ndarray::array;
use std::sync::Arc;
use tempfile::TempDir;

const WGS84_WKT: &str =
    "GEOGCS[\"WGS84(DD)\", DATUM[\"WGS84\", SPHEROID[\"WGS84\", 6378137.0, 298.257223563]]]";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn header(geocoding: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
         <Dimap_Document name=\"poly.dim\">\
           <Dataset_Id><DATASET_NAME>poly</DATASET_NAME></Dataset_Id>\
           <Production><PRODUCT_TYPE>TEST</PRODUCT_TYPE></Production>\
           {}\
           <Raster_Dimensions><NCOLS>100</NCOLS><NROWS>50</NROWS><NBANDS>0</NBANDS></Raster_Dimensions>\
         </Dimap_Document>",
        geocoding
    )
}

fn polynomial_header(lc: &str, ic: &str) -> String {
    header(&format!(
        "<Coordinate_Reference_System><Horizontal_CS><HORIZONTAL_CS_TYPE>GEOGRAPHIC</HORIZONTAL_CS_TYPE>\
           <Geographic_CS><Horizontal_Datum><HORIZONTAL_DATUM_NAME>WGS84</HORIZONTAL_DATUM_NAME>\
             <Ellipsoid><ELLIPSOID_NAME>WGS84</ELLIPSOID_NAME><Ellipsoid_Parameters>\
               <ELLIPSOID_MAJ_AXIS unit=\"M\">6378137.0</ELLIPSOID_MAJ_AXIS>\
               <ELLIPSOID_MIN_AXIS unit=\"M\">6356752.3</ELLIPSOID_MIN_AXIS>\
             </Ellipsoid_Parameters></Ellipsoid>\
           </Horizontal_Datum></Geographic_CS></Horizontal_CS></Coordinate_Reference_System>\
         <Geoposition>\
           <Geoposition_Insert><ULXMAP>0.5</ULXMAP><ULYMAP>0.5</ULYMAP><XDIM>1.0</XDIM><YDIM>1.0</YDIM></Geoposition_Insert>\
           <Simplified_Location_Model>\
             <Direct_Location_Model order=\"1\">\
               <lc_List>{lc}</lc_List>\
               <pc_List><pc index=\"0\">45.0</pc><pc index=\"1\">0.0</pc><pc index=\"2\">-0.01</pc></pc_List>\
             </Direct_Location_Model>\
             <Reverse_Location_Model order=\"1\">\
               <ic_List>{ic}</ic_List>\
               <jc_List><jc index=\"0\">4500.0</jc><jc index=\"1\">0.0</jc><jc index=\"2\">-100.0</jc></jc_List>\
             </Reverse_Location_Model>\
           </Simplified_Location_Model>\
         </Geoposition>",
        lc = lc,
        ic = ic
    ))
}

#[test]
fn test_coefficient_index_order_independence() {
    init_logging();
    let canonical = polynomial_header(
        "<lc index=\"0\">5.0</lc><lc index=\"1\">0.01</lc><lc index=\"2\">0.0</lc>",
        "<ic index=\"0\">-500.0</ic><ic index=\"1\">100.0</ic><ic index=\"2\">0.0</ic>",
    );
    let shuffled = polynomial_header(
        "<lc index=\"2\">0.0</lc><lc index=\"0\">5.0</lc><lc index=\"1\">0.01</lc>",
        "<ic index=\"1\">100.0</ic><ic index=\"2\">0.0</ic><ic index=\"0\">-500.0</ic>",
    );

    let config = ReaderConfig::default();
    let monitor = ProgressMonitor::new();
    let decode = |xml: &str| {
        let doc = Document::parse_str(xml).unwrap();
        let outcome = ProductBuilder::build(&doc, &config, &monitor).unwrap();
        outcome.product.scene_geocoding.clone().expect("polynomial geocoding")
    };

    let a = decode(&canonical);
    let b = decode(&shuffled);
    assert!(a.is_equivalent(&b));
    match &*b {
        GeoCoding::Polynomial(p) => {
            assert_eq!(p.lambda.coefficients, vec![5.0, 0.01, 0.0]);
            assert_eq!(p.x.coefficients, vec![-500.0, 100.0, 0.0]);
        }
        other => panic!("expected a polynomial geocoding, got {:?}", other),
    }

    let pos = b.pixel_to_geo(10.0, 20.0).unwrap();
    println!("pixel (10, 20) -> {:?}", pos);
    assert!((pos.lon - 5.105).abs() < 1e-9);
    assert!((pos.lat - 44.795).abs() < 1e-9);
}

#[test]
fn test_crs_preferred_over_tie_point_grids() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("both.dim");
    let monitor = ProgressMonitor::new();

    let mut product = Product::new("both", "TEST", 20, 20);
    product.add_band(Band::new("b1", DataType::Float32, 20, 20)).unwrap();
    product
        .add_tie_point_grid(
            TiePointGrid::new("latitude", 2, 2, 0.5, 0.5, 19.0, 19.0)
                .with_data(array![[50.0f32, 50.0], [49.0, 49.0]])
                .unwrap(),
        )
        .unwrap();
    product
        .add_tie_point_grid(
            TiePointGrid::new("longitude", 2, 2, 0.5, 0.5, 19.0, 19.0)
                .with_data(array![[10.0f32, 11.0], [10.0, 11.0]])
                .unwrap(),
        )
        .unwrap();
    product.set_scene_geocoding(Arc::new(GeoCoding::Crs(CrsGeoCoding {
        wkt: WGS84_WKT.to_string(),
        image_to_map: AffineTransform::from_flat(&[0.05, 0.0, 0.0, -0.05, 10.0, 50.0]).unwrap(),
        geographic: true,
    })));

    DimapProductWriter::new(WriterConfig::default())
        .write(&mut product, &path, &monitor)
        .unwrap();

    // add a tie-point description next to the CRS one
    let text = std::fs::read_to_string(&path).unwrap();
    let patched = text.replacen(
        "</IMAGE_TO_MODEL_TRANSFORM>",
        "</IMAGE_TO_MODEL_TRANSFORM><Geoposition_Points>\
           <TIE_POINT_GRID_NAME_LAT>latitude</TIE_POINT_GRID_NAME_LAT>\
           <TIE_POINT_GRID_NAME_LON>longitude</TIE_POINT_GRID_NAME_LON></Geoposition_Points>",
        1,
    );
    assert_ne!(text, patched);
    std::fs::write(&path, patched).unwrap();

    let reader = DimapProductReader::open(&path, &ReaderConfig::default(), &monitor).unwrap();
    let gc = reader.product().scene_geocoding.clone().unwrap();
    assert!(matches!(*gc, GeoCoding::Crs(_)), "got {}", gc.variant_name());
}

#[test]
fn test_tie_point_geocoding_without_crs() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tp.dim");
    let monitor = ProgressMonitor::new();

    let mut product = Product::new("tp", "TEST", 20, 20);
    product
        .add_tie_point_grid(
            TiePointGrid::new("latitude", 2, 2, 0.5, 0.5, 19.0, 19.0)
                .with_data(array![[50.0f32, 50.0], [49.0, 49.0]])
                .unwrap(),
        )
        .unwrap();
    product
        .add_tie_point_grid(
            TiePointGrid::new("longitude", 2, 2, 0.5, 0.5, 19.0, 19.0)
                .with_data(array![[179.5f32, -179.5], [179.5, -179.5]])
                .unwrap(),
        )
        .unwrap();
    DimapProductWriter::new(WriterConfig::default())
        .write(&mut product, &path, &monitor)
        .unwrap();

    let reader = DimapProductReader::open(&path, &ReaderConfig::default(), &monitor).unwrap();
    let gc = reader.product().scene_geocoding.clone().expect("tie-point fallback");
    match &*gc {
        GeoCoding::TiePoint(tp) => {
            assert_eq!(tp.lat_grid, "latitude");
            assert_eq!(tp.discontinuity, dimap::core::Discontinuity::At180);
        }
        other => panic!("expected a tie-point geocoding, got {:?}", other),
    }

    // without grid payloads there is nothing to resolve
    let config = ReaderConfig {
        load_tie_point_grids: false,
        ..ReaderConfig::default()
    };
    let reader = DimapProductReader::open(&path, &config, &monitor).unwrap();
    assert!(reader.product().scene_geocoding.is_none());
    assert!(reader
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagnosticKind::GeocodingUnresolved));
}

#[test]
fn test_degenerate_gcp_geocoding_falls_back_to_original() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gcp.dim");
    let monitor = ProgressMonitor::new();

    let mut product = Product::new("gcp", "TEST", 30, 30);
    product.add_band(Band::new("b1", DataType::Float32, 30, 30)).unwrap();
    // collinear points cannot support a second-order model
    product.gcps = vec![
        Placemark::new("gcp_1", 0.5, 0.5, 50.0, 10.0),
        Placemark::new("gcp_2", 10.5, 10.5, 49.9, 10.1),
        Placemark::new("gcp_3", 20.5, 20.5, 49.8, 10.2),
        Placemark::new("gcp_4", 25.5, 25.5, 49.75, 10.25),
        Placemark::new("gcp_5", 28.5, 28.5, 49.72, 10.28),
        Placemark::new("gcp_6", 29.5, 29.5, 49.71, 10.29),
    ];
    let original = GeoCoding::Crs(CrsGeoCoding {
        wkt: WGS84_WKT.to_string(),
        image_to_map: AffineTransform::from_flat(&[0.01, 0.0, 0.0, -0.01, 10.0, 50.0]).unwrap(),
        geographic: true,
    });
    let gcp = GcpGeoCoding {
        method: GcpMethod::Polynomial2,
        points: product.gcps.clone(),
        datum: Datum::wgs84(),
        lon_model: Polynomial::new(2, vec![0.0; 6]),
        lat_model: Polynomial::new(2, vec![0.0; 6]),
        original: Some(Box::new(original.clone())),
    };
    product.set_scene_geocoding(Arc::new(GeoCoding::Gcp(gcp)));

    DimapProductWriter::new(WriterConfig::default())
        .write(&mut product, &path, &monitor)
        .unwrap();
    let reader = DimapProductReader::open(&path, &ReaderConfig::default(), &monitor).unwrap();
    assert_eq!(reader.product().gcps.len(), 6);

    let gc = reader.product().scene_geocoding.clone().expect("original geocoding");
    assert!(gc.is_equivalent(&original), "got {}", gc.variant_name());
}
