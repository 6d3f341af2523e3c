//! Product graph to DIMAP header document

use crate::core::geocoding::{GeoCoding, MapGeoCoding, Polynomial};
use crate::core::metadata::MetadataElement;
use crate::core::product::{
    Band, BandKind, FilterOperation, Kernel, Mask, MaskKind, Product, SampleCodingKind,
};
use crate::core::progress::ProgressMonitor;
use crate::core::registry::{Datum, ReferenceSystemRegistry};
use crate::io::constants::*;
use crate::io::document::{Document, NodeId};
use crate::types::{format_utc, Color, DimapResult, RasterNodeId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where one raster node's payload must be stored, relative to the header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarEntry {
    pub node: RasterNodeId,
    pub path: PathBuf,
}

/// Sidecar files allocated by a header write
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarLayout {
    pub entries: Vec<SidecarEntry>,
}

impl SidecarLayout {
    pub fn path_for(&self, node: &RasterNodeId) -> Option<&PathBuf> {
        self.entries.iter().find(|e| &e.node == node).map(|e| &e.path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Relative sidecar base path (without extension) of a band
pub fn band_file_base(data_dir_name: &str, band_name: &str) -> String {
    format!("{}/{}", data_dir_name, band_name)
}

/// Relative sidecar base path (without extension) of a tie-point grid
pub fn tie_point_grid_file_base(data_dir_name: &str, grid_name: &str) -> String {
    format!("{}/{}/{}", data_dir_name, TIE_POINT_GRID_DIR_NAME, grid_name)
}

pub(crate) fn join_csv<T: ToString>(values: &[T]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

/// Emits the header document for a product
pub struct HeaderWriter<'a> {
    registry: &'a dyn ReferenceSystemRegistry,
}

impl<'a> HeaderWriter<'a> {
    pub fn new(registry: &'a dyn ReferenceSystemRegistry) -> Self {
        Self { registry }
    }

    /// Build the header document and allocate a sidecar path for every
    /// stored band and tie-point grid. `data_dir_name` is the sidecar
    /// directory name relative to the header, e.g. `scene.data`.
    pub fn write(
        &self,
        product: &Product,
        data_dir_name: &str,
        monitor: &ProgressMonitor,
    ) -> DimapResult<(Document, SidecarLayout)> {
        log::info!("Writing DIMAP header for product '{}'", product.name);
        let (mut doc, root) = Document::with_root(TAG_ROOT);
        doc.add_attribute(root, ATTRIB_NAME, format!("{}{}", product.name, HEADER_FILE_EXTENSION));

        monitor.check()?;
        self.write_identity(&mut doc, root, product);
        self.write_production(&mut doc, root, product);

        monitor.check()?;
        self.write_geocodings(&mut doc, root, product);
        write_gcp_group(&mut doc, root, product);

        monitor.check()?;
        write_sample_codings(&mut doc, root, product);
        write_raster_dimensions(&mut doc, root, product);

        monitor.check()?;
        let layout = write_data_access(&mut doc, root, product, data_dir_name);
        write_tie_point_grids(&mut doc, root, product);

        monitor.check()?;
        write_image_display(&mut doc, root, product);
        write_masks(&mut doc, root, product);

        monitor.check()?;
        write_image_interpretation(&mut doc, root, product);

        monitor.check()?;
        write_metadata(&mut doc, root, &product.metadata);

        log::debug!(
            "Header for '{}' allocates {} sidecar file(s)",
            product.name,
            layout.len()
        );
        Ok((doc, layout))
    }

    fn write_identity(&self, doc: &mut Document, root: NodeId, product: &Product) {
        let metadata_id = doc.add_element(root, TAG_METADATA_ID);
        let format = doc.add_text_element(metadata_id, TAG_METADATA_FORMAT, DIMAP_FORMAT_NAME);
        doc.add_attribute(format, ATTRIB_VERSION, DIMAP_CURRENT_VERSION);
        doc.add_text_element(metadata_id, TAG_METADATA_PROFILE, DIMAP_METADATA_PROFILE);

        let dataset_id = doc.add_element(root, TAG_DATASET_ID);
        doc.add_text_element(dataset_id, TAG_DATASET_SERIES, DIMAP_DATASET_SERIES);
        doc.add_text_element(dataset_id, TAG_DATASET_NAME, &product.name);

        if product.description.is_some() || product.auto_grouping.is_some() {
            let dataset_use = doc.add_element(root, TAG_DATASET_USE);
            if let Some(description) = &product.description {
                doc.add_text_element(dataset_use, TAG_DATASET_COMMENTS, description);
            }
            if let Some(grouping) = &product.auto_grouping {
                doc.add_text_element(dataset_use, TAG_DATASET_AUTO_GROUPING, grouping);
            }
        }
    }

    fn write_production(&self, doc: &mut Document, root: NodeId, product: &Product) {
        let production = doc.add_element(root, TAG_PRODUCTION);
        doc.add_text_element(
            production,
            TAG_DATASET_PRODUCER_NAME,
            product.producer.as_deref().unwrap_or(" "),
        );
        doc.add_text_element(production, TAG_PRODUCT_TYPE, &product.product_type);
        if let Some(start) = &product.start_time {
            doc.add_text_element(production, TAG_PRODUCT_SCENE_RASTER_START_TIME, format_utc(start));
        }
        if let Some(stop) = &product.stop_time {
            doc.add_text_element(production, TAG_PRODUCT_SCENE_RASTER_STOP_TIME, format_utc(stop));
        }
        if let Some(quicklook) = &product.quicklook_band {
            doc.add_text_element(production, TAG_QUICKLOOK_BAND_NAME, quicklook);
        }
    }

    fn write_geocodings(&self, doc: &mut Document, root: NodeId, product: &Product) {
        if product.is_using_single_geocoding() {
            if let Some(gc) = &product.scene_geocoding {
                log::debug!("Writing product-wide {} geocoding", gc.variant_name());
                self.write_geocoding(doc, root, gc, None);
            }
            return;
        }
        for (index, band) in product.bands().iter().enumerate() {
            if let Some(gc) = &band.geocoding {
                self.write_geocoding(doc, root, gc, Some(index));
            }
        }
    }

    /// Append one Coordinate_Reference_System / Geoposition pair to `parent`
    fn write_geocoding(&self, doc: &mut Document, parent: NodeId, gc: &GeoCoding, band_index: Option<usize>) {
        let crs = doc.add_element(parent, TAG_COORDINATE_REFERENCE_SYSTEM);
        match gc {
            GeoCoding::Crs(g) => {
                doc.add_text_element(crs, TAG_WKT, &g.wkt);
            }
            GeoCoding::MapProjection(g) => self.write_legacy_map(doc, crs, g),
            other => write_datum_block(doc, crs, other.datum().cloned().unwrap_or_default()),
        }

        let geopos = doc.add_element(parent, TAG_GEOPOSITION);
        if let Some(index) = band_index {
            doc.add_text_element(geopos, TAG_BAND_INDEX, index);
        }
        match gc {
            GeoCoding::Crs(g) => {
                doc.add_text_element(geopos, TAG_IMAGE_TO_MODEL_TRANSFORM, join_csv(&g.image_to_map.to_flat()));
            }
            GeoCoding::TiePoint(g) => {
                let points = doc.add_element(geopos, TAG_GEOPOSITION_POINTS);
                doc.add_text_element(points, TAG_TIE_POINT_GRID_NAME_LAT, &g.lat_grid);
                doc.add_text_element(points, TAG_TIE_POINT_GRID_NAME_LON, &g.lon_grid);
            }
            GeoCoding::Polynomial(g) => {
                let insert = doc.add_element(geopos, TAG_GEOPOSITION_INSERT);
                doc.add_text_element(insert, TAG_ULX_MAP, g.insert.ul_x);
                doc.add_text_element(insert, TAG_ULY_MAP, g.insert.ul_y);
                doc.add_text_element(insert, TAG_X_DIM, g.insert.x_dim);
                doc.add_text_element(insert, TAG_Y_DIM, g.insert.y_dim);

                let model = doc.add_element(geopos, TAG_SIMPLIFIED_LOCATION_MODEL);
                let direct = doc.add_element(model, TAG_DIRECT_LOCATION_MODEL);
                doc.add_attribute(direct, ATTRIB_ORDER, g.lambda.order);
                write_coefficients(doc, direct, TAG_LC_LIST, TAG_LC, &g.lambda);
                write_coefficients(doc, direct, TAG_PC_LIST, TAG_PC, &g.phi);
                let reverse = doc.add_element(model, TAG_REVERSE_LOCATION_MODEL);
                doc.add_attribute(reverse, ATTRIB_ORDER, g.x.order);
                write_coefficients(doc, reverse, TAG_IC_LIST, TAG_IC, &g.x);
                write_coefficients(doc, reverse, TAG_JC_LIST, TAG_JC, &g.y);
            }
            GeoCoding::Gcp(g) => {
                let points = doc.add_element(geopos, TAG_GEOPOSITION_POINTS);
                doc.add_text_element(points, TAG_INTERPOLATION_METHOD, g.method.name());
                if let Some(original) = &g.original {
                    let nested = doc.add_element(points, TAG_ORIGINAL_GEOCODING);
                    self.write_geocoding(doc, nested, original, None);
                }
            }
            GeoCoding::PixelLookup(g) => {
                doc.add_text_element(geopos, TAG_LATITUDE_BAND, &g.lat_band);
                doc.add_text_element(geopos, TAG_LONGITUDE_BAND, &g.lon_band);
                if let Some(mask) = &g.valid_mask {
                    doc.add_text_element(geopos, TAG_VALID_MASK_EXPRESSION, mask);
                }
                doc.add_text_element(geopos, TAG_SEARCH_RADIUS, g.search_radius);
                if let Some(estimator) = &g.estimator {
                    let nested = doc.add_element(geopos, TAG_PIXEL_POSITION_ESTIMATOR);
                    self.write_geocoding(doc, nested, estimator, None);
                }
            }
            GeoCoding::MapProjection(_) => {}
        }
    }

    fn write_legacy_map(&self, doc: &mut Document, crs: NodeId, g: &MapGeoCoding) {
        let tables = doc.add_text_element(crs, TAG_GEO_TABLES, "CUSTOM");
        doc.add_attribute(tables, ATTRIB_VERSION, "1.0");

        let hcs = doc.add_element(crs, TAG_HORIZONTAL_CS);
        doc.add_text_element(hcs, TAG_HORIZONTAL_CS_TYPE, "PROJECTED");
        doc.add_text_element(hcs, TAG_HORIZONTAL_CS_NAME, &g.projection.name);

        let geo_cs = doc.add_element(hcs, TAG_GEOGRAPHIC_CS);
        doc.add_text_element(geo_cs, TAG_GEOGRAPHIC_CS_NAME, &g.datum.name);
        write_horizontal_datum(doc, geo_cs, &g.datum);

        let projection = doc.add_element(hcs, TAG_PROJECTION);
        doc.add_text_element(projection, TAG_PROJECTION_NAME, &g.projection.name);
        let method = doc.add_element(projection, TAG_PROJECTION_CT_METHOD);
        doc.add_text_element(method, TAG_PROJECTION_CT_NAME, &g.projection.method);
        let params = doc.add_element(method, TAG_PROJECTION_PARAMETERS);
        let schema = self
            .registry
            .projection_parameters(&g.projection.method)
            .unwrap_or_default();
        for (i, param) in g.projection.parameters.iter().enumerate() {
            let node = doc.add_element(params, TAG_PROJECTION_PARAMETER);
            doc.add_attribute(node, ATTRIB_INDEX, i);
            let name = if param.name.is_empty() {
                schema.get(i).cloned().unwrap_or_default()
            } else {
                param.name.clone()
            };
            doc.add_text_element(node, TAG_PROJECTION_PARAMETER_NAME, name);
            let value = doc.add_text_element(node, TAG_PROJECTION_PARAMETER_VALUE, param.value);
            if let Some(unit) = &param.unit {
                doc.add_attribute(value, ATTRIB_UNIT, unit);
            }
        }

        let info = &g.map_info;
        let map_info = doc.add_element(hcs, TAG_MAP_INFO);
        let mut value_element = |name: &str, value: String| {
            let node = doc.add_element(map_info, name);
            doc.add_attribute(node, ATTRIB_VALUE, value);
        };
        value_element(TAG_MAP_INFO_PIXEL_X, info.pixel_x.to_string());
        value_element(TAG_MAP_INFO_PIXEL_Y, info.pixel_y.to_string());
        value_element(TAG_MAP_INFO_EASTING, info.easting.to_string());
        value_element(TAG_MAP_INFO_NORTHING, info.northing.to_string());
        value_element(TAG_MAP_INFO_ORIENTATION, info.orientation.to_string());
        value_element(TAG_MAP_INFO_PIXELSIZE_X, info.pixel_size_x.to_string());
        value_element(TAG_MAP_INFO_PIXELSIZE_Y, info.pixel_size_y.to_string());
        value_element(TAG_MAP_INFO_NODATA_VALUE, info.no_data_value.to_string());
        value_element(TAG_MAP_INFO_MAPUNIT, g.projection.map_unit.clone());
        value_element(TAG_MAP_INFO_ORTHORECTIFIED, info.orthorectified.to_string());
        if let Some(dem) = &info.elevation_model {
            value_element(TAG_MAP_INFO_ELEVATION_MODEL, dem.clone());
        }
        value_element(TAG_MAP_INFO_SCENE_FITTED, info.scene_fitted.to_string());
        value_element(TAG_MAP_INFO_SCENE_WIDTH, info.scene_width.to_string());
        value_element(TAG_MAP_INFO_SCENE_HEIGHT, info.scene_height.to_string());
        value_element(TAG_MAP_INFO_RESAMPLING, info.resampling.clone());
    }
}

fn write_datum_block(doc: &mut Document, crs: NodeId, datum: Datum) {
    let hcs = doc.add_element(crs, TAG_HORIZONTAL_CS);
    doc.add_text_element(hcs, TAG_HORIZONTAL_CS_TYPE, "GEOGRAPHIC");
    let geo_cs = doc.add_element(hcs, TAG_GEOGRAPHIC_CS);
    write_horizontal_datum(doc, geo_cs, &datum);
}

fn write_horizontal_datum(doc: &mut Document, geo_cs: NodeId, datum: &Datum) {
    let hd = doc.add_element(geo_cs, TAG_HORIZONTAL_DATUM);
    doc.add_text_element(hd, TAG_HORIZONTAL_DATUM_NAME, &datum.name);
    let ellipsoid = doc.add_element(hd, TAG_ELLIPSOID);
    doc.add_text_element(ellipsoid, TAG_ELLIPSOID_NAME, &datum.ellipsoid.name);
    let params = doc.add_element(ellipsoid, TAG_ELLIPSOID_PARAMETERS);
    let major = doc.add_text_element(params, TAG_ELLIPSOID_MAJ_AXIS, datum.ellipsoid.semi_major);
    doc.add_attribute(major, ATTRIB_UNIT, "M");
    let minor = doc.add_text_element(params, TAG_ELLIPSOID_MIN_AXIS, datum.ellipsoid.semi_minor);
    doc.add_attribute(minor, ATTRIB_UNIT, "M");
}

/// Coefficients are always index-tagged; readers place them by index
fn write_coefficients(doc: &mut Document, parent: NodeId, list_tag: &str, tag: &str, poly: &Polynomial) {
    let list = doc.add_element(parent, list_tag);
    for (i, c) in poly.coefficients.iter().enumerate() {
        let node = doc.add_text_element(list, tag, c);
        doc.add_attribute(node, ATTRIB_INDEX, i);
    }
}

fn write_gcp_group(doc: &mut Document, root: NodeId, product: &Product) {
    if product.gcps.is_empty() {
        return;
    }
    let group = doc.add_element(root, TAG_GCP_GROUP);
    for gcp in &product.gcps {
        let node = doc.add_element(group, TAG_PLACEMARK);
        doc.add_attribute(node, ATTRIB_NAME, &gcp.name);
        doc.add_text_element(node, TAG_LABEL, &gcp.label);
        doc.add_text_element(node, TAG_DESCRIPTION, &gcp.description);
        doc.add_text_element(node, TAG_PLACEMARK_LATITUDE, gcp.lat);
        doc.add_text_element(node, TAG_PLACEMARK_LONGITUDE, gcp.lon);
        doc.add_text_element(node, TAG_PLACEMARK_PIXEL_X, gcp.pixel_x);
        doc.add_text_element(node, TAG_PLACEMARK_PIXEL_Y, gcp.pixel_y);
    }
}

fn write_sample_codings(doc: &mut Document, root: NodeId, product: &Product) {
    let flags = product
        .sample_codings()
        .iter()
        .filter(|c| c.kind == SampleCodingKind::Flag);
    for coding in flags {
        let node = doc.add_element(root, TAG_FLAG_CODING);
        doc.add_attribute(node, ATTRIB_NAME, &coding.name);
        for entry in &coding.entries {
            let flag = doc.add_element(node, TAG_FLAG);
            doc.add_text_element(flag, TAG_FLAG_NAME, &entry.name);
            doc.add_text_element(flag, TAG_FLAG_INDEX, entry.value);
            doc.add_text_element(flag, TAG_FLAG_DESCRIPTION, &entry.description);
        }
    }

    let indexes = product
        .sample_codings()
        .iter()
        .filter(|c| c.kind == SampleCodingKind::Index);
    for coding in indexes {
        let node = doc.add_element(root, TAG_INDEX_CODING);
        doc.add_attribute(node, ATTRIB_NAME, &coding.name);
        for entry in &coding.entries {
            let index = doc.add_element(node, TAG_INDEX);
            doc.add_text_element(index, TAG_INDEX_NAME, &entry.name);
            doc.add_text_element(index, TAG_INDEX_VALUE, entry.value);
            doc.add_text_element(index, TAG_INDEX_DESCRIPTION, &entry.description);
        }
    }
}

fn write_raster_dimensions(doc: &mut Document, root: NodeId, product: &Product) {
    let dims = doc.add_element(root, TAG_RASTER_DIMENSIONS);
    doc.add_text_element(dims, TAG_NCOLS, product.scene_width());
    doc.add_text_element(dims, TAG_NROWS, product.scene_height());
    doc.add_text_element(dims, TAG_NBANDS, product.bands().len());
}

fn write_data_access(doc: &mut Document, root: NodeId, product: &Product, data_dir_name: &str) -> SidecarLayout {
    let mut layout = SidecarLayout::default();
    let access = doc.add_element(root, TAG_DATA_ACCESS);
    doc.add_text_element(access, TAG_DATA_FILE_FORMAT, DATA_FILE_FORMAT);
    doc.add_text_element(access, TAG_DATA_FILE_FORMAT_DESC, DATA_FILE_FORMAT_DESCRIPTION);
    doc.add_text_element(access, TAG_DATA_FILE_ORGANISATION, DATA_FILE_ORGANISATION);

    for (index, band) in product.bands().iter().enumerate() {
        if !band.is_stored() {
            continue;
        }
        let base = band_file_base(data_dir_name, &band.name);
        let file = doc.add_element(access, TAG_DATA_FILE);
        let path = doc.add_element(file, TAG_DATA_FILE_PATH);
        doc.add_attribute(path, ATTRIB_HREF, format!("{}{}", base, ENVI_HEADER_EXTENSION));
        doc.add_text_element(file, TAG_BAND_INDEX, index);
        layout.entries.push(SidecarEntry {
            node: RasterNodeId::Band(band.name.clone()),
            path: PathBuf::from(format!("{}{}", base, IMAGE_FILE_EXTENSION)),
        });
    }

    for (index, grid) in product.tie_point_grids().iter().enumerate() {
        let base = tie_point_grid_file_base(data_dir_name, &grid.name);
        let file = doc.add_element(access, TAG_TIE_POINT_GRID_FILE);
        let path = doc.add_element(file, TAG_TIE_POINT_GRID_FILE_PATH);
        doc.add_attribute(path, ATTRIB_HREF, format!("{}{}", base, ENVI_HEADER_EXTENSION));
        doc.add_text_element(file, TAG_TIE_POINT_GRID_INDEX, index);
        layout.entries.push(SidecarEntry {
            node: RasterNodeId::TiePointGrid(grid.name.clone()),
            path: PathBuf::from(format!("{}{}", base, IMAGE_FILE_EXTENSION)),
        });
    }
    layout
}

fn write_tie_point_grids(doc: &mut Document, root: NodeId, product: &Product) {
    let grids = product.tie_point_grids();
    if grids.is_empty() {
        return;
    }
    let section = doc.add_element(root, TAG_TIE_POINT_GRIDS);
    doc.add_text_element(section, TAG_NUM_TIE_POINT_GRIDS, grids.len());
    for (index, grid) in grids.iter().enumerate() {
        let info = doc.add_element(section, TAG_TIE_POINT_GRID_INFO);
        doc.add_text_element(info, TAG_TIE_POINT_GRID_INDEX, index);
        doc.add_text_element(info, TAG_TIE_POINT_DESCRIPTION, grid.description.as_deref().unwrap_or(""));
        doc.add_text_element(info, TAG_PHYSICAL_UNIT, grid.unit.as_deref().unwrap_or(""));
        doc.add_text_element(info, TAG_TIE_POINT_GRID_NAME, &grid.name);
        doc.add_text_element(info, TAG_DATA_TYPE, grid.data_type.name());
        doc.add_text_element(info, TAG_NCOLS, grid.grid_width);
        doc.add_text_element(info, TAG_NROWS, grid.grid_height);
        doc.add_text_element(info, TAG_OFFSET_X, grid.offset_x);
        doc.add_text_element(info, TAG_OFFSET_Y, grid.offset_y);
        doc.add_text_element(info, TAG_STEP_X, grid.sub_sampling_x);
        doc.add_text_element(info, TAG_STEP_Y, grid.sub_sampling_y);
        doc.add_text_element(info, TAG_CYCLIC, grid.is_cyclic());
    }
}

fn add_color(doc: &mut Document, parent: NodeId, tag: &str, color: &Color) -> NodeId {
    let node = doc.add_element(parent, tag);
    doc.add_attribute(node, ATTRIB_RED, color.red);
    doc.add_attribute(node, ATTRIB_GREEN, color.green);
    doc.add_attribute(node, ATTRIB_BLUE, color.blue);
    doc.add_attribute(node, ATTRIB_ALPHA, color.alpha);
    node
}

fn write_image_display(doc: &mut Document, root: NodeId, product: &Product) {
    let has_display = product
        .bands()
        .iter()
        .any(|b| b.image_info.is_some() || b.stx.is_some() || !b.overlay_masks.is_empty())
        || product.tie_point_grids().iter().any(|g| !g.overlay_masks.is_empty());
    if !has_display {
        return;
    }
    let display = doc.add_element(root, TAG_IMAGE_DISPLAY);

    for (index, band) in product.bands().iter().enumerate() {
        if band.image_info.is_none() && band.stx.is_none() {
            continue;
        }
        let stats = doc.add_element(display, TAG_BAND_STATISTICS);
        doc.add_text_element(stats, TAG_BAND_INDEX, index);
        if let Some(stx) = &band.stx {
            doc.add_text_element(stats, TAG_STX_MIN, stx.minimum);
            doc.add_text_element(stats, TAG_STX_MAX, stx.maximum);
            doc.add_text_element(stats, TAG_STX_MEAN, stx.mean);
            doc.add_text_element(stats, TAG_STX_STDDEV, stx.std_dev);
            doc.add_text_element(stats, TAG_STX_LEVEL, stx.resolution_level);
            if !stx.histogram.is_empty() {
                doc.add_text_element(stats, TAG_HISTOGRAM, join_csv(&stx.histogram));
            }
        }
        if let Some(info) = &band.image_info {
            doc.add_text_element(stats, TAG_NUM_COLORS, info.palette.len());
            for point in &info.palette {
                let node = doc.add_element(stats, TAG_COLOR_PALETTE_POINT);
                doc.add_text_element(node, TAG_SAMPLE, point.sample);
                if let Some(label) = &point.label {
                    doc.add_text_element(node, TAG_LABEL, label);
                }
                add_color(doc, node, TAG_COLOR, &point.color);
            }
            if let Some(color) = &info.no_data_color {
                add_color(doc, stats, TAG_NO_DATA_COLOR, color);
            }
            doc.add_text_element(stats, TAG_HISTOGRAM_MATCHING, &info.histogram_matching);
        }
    }

    for (index, band) in product.bands().iter().enumerate() {
        if band.overlay_masks.is_empty() {
            continue;
        }
        let usage = doc.add_element(display, TAG_MASK_USAGE);
        doc.add_text_element(usage, TAG_BAND_INDEX, index);
        let overlay = doc.add_element(usage, TAG_OVERLAY);
        doc.add_attribute(overlay, ATTRIB_NAMES, band.overlay_masks.join(","));
    }
    for (index, grid) in product.tie_point_grids().iter().enumerate() {
        if grid.overlay_masks.is_empty() {
            continue;
        }
        let usage = doc.add_element(display, TAG_MASK_USAGE);
        doc.add_text_element(usage, TAG_TIE_POINT_GRID_INDEX, index);
        let overlay = doc.add_element(usage, TAG_OVERLAY);
        doc.add_attribute(overlay, ATTRIB_NAMES, grid.overlay_masks.join(","));
    }
}

fn value_child(doc: &mut Document, parent: NodeId, tag: &str, value: impl ToString) {
    let node = doc.add_element(parent, tag);
    doc.add_attribute(node, ATTRIB_VALUE, value);
}

fn write_mask(doc: &mut Document, parent: NodeId, mask: &Mask) {
    let node = doc.add_element(parent, TAG_MASK);
    let type_name = match mask.kind {
        MaskKind::Maths { .. } => MASK_TYPE_MATHS,
        MaskKind::Range { .. } => MASK_TYPE_RANGE,
    };
    doc.add_attribute(node, ATTRIB_TYPE, type_name);
    value_child(doc, node, TAG_NAME, &mask.name);
    value_child(doc, node, TAG_MASK_RASTER_WIDTH, mask.width);
    value_child(doc, node, TAG_MASK_RASTER_HEIGHT, mask.height);
    value_child(doc, node, TAG_DESCRIPTION, &mask.description);
    add_color(doc, node, TAG_COLOR, &mask.color);
    value_child(doc, node, TAG_TRANSPARENCY, mask.transparency);
    match &mask.kind {
        MaskKind::Maths { expression } => value_child(doc, node, TAG_EXPRESSION, expression),
        MaskKind::Range {
            raster,
            minimum,
            maximum,
        } => {
            value_child(doc, node, TAG_MINIMUM, minimum);
            value_child(doc, node, TAG_MAXIMUM, maximum);
            value_child(doc, node, TAG_RASTER, raster);
        }
    }
}

fn write_masks(doc: &mut Document, root: NodeId, product: &Product) {
    if product.masks().is_empty() {
        return;
    }
    let masks = doc.add_element(root, TAG_MASKS);
    for mask in product.masks() {
        write_mask(doc, masks, mask);
    }
}

fn write_kernel(doc: &mut Document, parent: NodeId, kernel: &Kernel) {
    let node = doc.add_element(parent, TAG_FILTER_KERNEL);
    doc.add_text_element(node, TAG_KERNEL_WIDTH, kernel.width);
    doc.add_text_element(node, TAG_KERNEL_HEIGHT, kernel.height);
    doc.add_text_element(node, TAG_KERNEL_X_ORIGIN, kernel.x_origin);
    doc.add_text_element(node, TAG_KERNEL_Y_ORIGIN, kernel.y_origin);
    doc.add_text_element(node, TAG_KERNEL_FACTOR, kernel.factor);
    doc.add_text_element(node, TAG_KERNEL_DATA, join_csv(&kernel.data));
}

fn write_band_info(doc: &mut Document, parent: NodeId, index: usize, band: &Band, product: &Product) {
    let info = doc.add_element(parent, TAG_SPECTRAL_BAND_INFO);
    doc.add_text_element(info, TAG_BAND_INDEX, index);
    doc.add_text_element(info, TAG_BAND_DESCRIPTION, band.description.as_deref().unwrap_or(""));
    doc.add_text_element(info, TAG_BAND_NAME, &band.name);
    doc.add_text_element(info, TAG_BAND_RASTER_WIDTH, band.width);
    doc.add_text_element(info, TAG_BAND_RASTER_HEIGHT, band.height);
    doc.add_text_element(info, TAG_DATA_TYPE, band.data_type.name());
    if let Some(unit) = band.unit.as_deref().filter(|u| !u.is_empty()) {
        doc.add_text_element(info, TAG_PHYSICAL_UNIT, unit);
    }
    doc.add_text_element(info, TAG_SOLAR_FLUX, band.spectral.solar_flux);
    if let Some(spectral_index) = band.spectral.spectral_band_index.filter(|i| *i > -1) {
        doc.add_text_element(info, TAG_SPECTRAL_BAND_INDEX, spectral_index);
    }
    doc.add_text_element(info, TAG_BAND_WAVELEN, band.spectral.wavelength);
    doc.add_text_element(info, TAG_BANDWIDTH, band.spectral.bandwidth);

    if let Some(coding) = band.sample_coding.as_deref().and_then(|n| product.sample_coding(n)) {
        let tag = match coding.kind {
            SampleCodingKind::Flag => TAG_FLAG_CODING_NAME,
            SampleCodingKind::Index => TAG_INDEX_CODING_NAME,
        };
        doc.add_text_element(info, tag, &coding.name);
    }

    doc.add_text_element(info, TAG_SCALING_FACTOR, band.scaling_factor);
    doc.add_text_element(info, TAG_SCALING_OFFSET, band.scaling_offset);
    doc.add_text_element(info, TAG_SCALING_LOG_10, band.log10_scaled);
    doc.add_text_element(info, TAG_NO_DATA_VALUE_USED, band.no_data_value_used);
    doc.add_text_element(info, TAG_NO_DATA_VALUE, band.no_data_value);

    match &band.kind {
        BandKind::Stored => {}
        BandKind::Virtual { expression } => {
            doc.add_text_element(info, TAG_VIRTUAL_BAND, true);
            doc.add_text_element(info, TAG_EXPRESSION, expression);
        }
        BandKind::Filter(filter) => {
            let node = doc.add_element(info, TAG_FILTER_BAND_INFO);
            match &filter.operation {
                FilterOperation::General { op_type, kernel } => {
                    doc.add_attribute(node, ATTRIB_BAND_TYPE, BAND_TYPE_GENERAL_FILTER);
                    doc.add_attribute(node, ATTRIB_VERSION, GENERAL_FILTER_VERSION);
                    doc.add_text_element(node, TAG_FILTER_SOURCE, &filter.source);
                    doc.add_text_element(node, TAG_FILTER_OP_TYPE, op_type);
                    write_kernel(doc, node, kernel);
                }
                FilterOperation::Convolution { kernel } => {
                    doc.add_attribute(node, ATTRIB_BAND_TYPE, BAND_TYPE_CONVOLUTION_FILTER);
                    doc.add_text_element(node, TAG_FILTER_SOURCE, &filter.source);
                    write_kernel(doc, node, kernel);
                }
            }
        }
    }

    if let Some(expr) = band.valid_pixel_expression.as_deref().filter(|e| !e.trim().is_empty()) {
        doc.add_text_element(info, TAG_VALID_MASK_TERM, expr);
    }
    for relation in &band.ancillary_relations {
        doc.add_text_element(info, TAG_ANCILLARY_RELATION, relation);
    }
    for variable in &band.ancillary_variables {
        doc.add_text_element(info, TAG_ANCILLARY_VARIABLE, variable);
    }
    if let Some(transform) = band.image_to_model.filter(|t| !t.is_identity()) {
        doc.add_text_element(info, TAG_IMAGE_TO_MODEL_TRANSFORM, join_csv(&transform.to_flat()));
    }
}

fn write_image_interpretation(doc: &mut Document, root: NodeId, product: &Product) {
    if product.bands().is_empty() {
        return;
    }
    let section = doc.add_element(root, TAG_IMAGE_INTERPRETATION);
    for (index, band) in product.bands().iter().enumerate() {
        write_band_info(doc, section, index, band, product);
    }
}

fn write_metadata_element(doc: &mut Document, parent: NodeId, element: &MetadataElement) {
    let node = doc.add_element(parent, TAG_METADATA_ELEMENT);
    doc.add_attribute(node, ATTRIB_NAME, &element.name);
    if let Some(desc) = &element.description {
        doc.add_attribute(node, ATTRIB_DESCRIPTION, desc);
    }
    for child in &element.elements {
        write_metadata_element(doc, node, child);
    }
    for attr in &element.attributes {
        let a = doc.add_text_element(node, TAG_METADATA_ATTRIBUTE, &attr.value);
        doc.add_attribute(a, ATTRIB_NAME, &attr.name);
        if let Some(desc) = &attr.description {
            doc.add_attribute(a, ATTRIB_DESCRIPTION, desc);
        }
        if let Some(unit) = &attr.unit {
            doc.add_attribute(a, ATTRIB_UNIT, unit);
        }
        doc.add_attribute(a, ATTRIB_TYPE, &attr.type_name);
        if !attr.read_only {
            doc.add_attribute(a, ATTRIB_MODE, "rw");
        }
        if attr.num_elems > 1 && !attr.is_ascii() {
            doc.add_attribute(a, ATTRIB_ELEMS, attr.num_elems);
        }
    }
}

fn write_metadata(doc: &mut Document, root: NodeId, metadata: &MetadataElement) {
    if metadata.elements.is_empty() && metadata.attributes.is_empty() {
        return;
    }
    let sources = doc.add_element(root, TAG_DATASET_SOURCES);
    write_metadata_element(doc, sources, metadata);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geocoding::{GeopositionInsert, PolynomialGeoCoding};
    use crate::core::product::TiePointGrid;
    use crate::core::registry::DefaultRegistry;
    use crate::types::DataType;
    use std::sync::Arc;

    fn product() -> Product {
        let mut p = Product::new("scene", "TEST_TYPE", 8, 6);
        p.add_band(Band::new("b1", DataType::UInt16, 8, 6)).unwrap();
        p.add_band(Band::virtual_band("v1", DataType::Float32, 8, 6, "b1 / 2"))
            .unwrap();
        p.add_band(Band::new("b2", DataType::Float32, 8, 6)).unwrap();
        p.add_tie_point_grid(TiePointGrid::new("sza", 3, 2, 0.5, 0.5, 4.0, 4.0))
            .unwrap();
        p
    }

    #[test]
    fn test_section_order() {
        let registry = DefaultRegistry;
        let (doc, _) = HeaderWriter::new(&registry)
            .write(&product(), "scene.data", &ProgressMonitor::new())
            .unwrap();
        let root = doc.root().unwrap();
        let names: Vec<&str> = doc.children(root).iter().map(|c| doc.name(*c)).collect();
        assert_eq!(
            names,
            vec![
                TAG_METADATA_ID,
                TAG_DATASET_ID,
                TAG_PRODUCTION,
                TAG_RASTER_DIMENSIONS,
                TAG_DATA_ACCESS,
                TAG_TIE_POINT_GRIDS,
                TAG_IMAGE_INTERPRETATION,
            ]
        );
        assert_eq!(doc.attribute(root, ATTRIB_NAME), Some("scene.dim"));
    }

    #[test]
    fn test_virtual_bands_get_no_sidecar() {
        let registry = DefaultRegistry;
        let (doc, layout) = HeaderWriter::new(&registry)
            .write(&product(), "scene.data", &ProgressMonitor::new())
            .unwrap();
        assert_eq!(layout.len(), 3);
        assert!(layout.path_for(&RasterNodeId::Band("v1".into())).is_none());
        assert_eq!(
            layout.path_for(&RasterNodeId::Band("b2".into())).unwrap(),
            &PathBuf::from("scene.data/b2.img")
        );

        let access = doc.find_child(doc.root().unwrap(), TAG_DATA_ACCESS).unwrap();
        let files = doc.find_children(access, TAG_DATA_FILE);
        let indices: Vec<&str> = files
            .iter()
            .map(|f| doc.child_text(*f, TAG_BAND_INDEX).unwrap())
            .collect();
        assert_eq!(indices, vec!["0", "2"]);
    }

    #[test]
    fn test_coefficients_are_index_tagged() {
        let mut p = product();
        let poly = PolynomialGeoCoding {
            insert: GeopositionInsert {
                ul_x: 0.0,
                ul_y: 0.0,
                x_dim: 1.0,
                y_dim: 1.0,
            },
            lambda: Polynomial::new(1, vec![10.0, 0.1, 0.0]),
            phi: Polynomial::new(1, vec![50.0, 0.0, -0.1]),
            x: Polynomial::new(1, vec![-100.0, 10.0, 0.0]),
            y: Polynomial::new(1, vec![500.0, 0.0, -10.0]),
            datum: Datum::wgs84(),
        };
        p.set_scene_geocoding(Arc::new(GeoCoding::Polynomial(poly)));

        let registry = DefaultRegistry;
        let (doc, _) = HeaderWriter::new(&registry)
            .write(&p, "scene.data", &ProgressMonitor::new())
            .unwrap();
        let root = doc.root().unwrap();
        let lc_list = doc.find_descendant(root, TAG_LC_LIST).unwrap();
        let lcs = doc.find_children(lc_list, TAG_LC);
        assert_eq!(lcs.len(), 3);
        assert_eq!(doc.attribute(lcs[2], ATTRIB_INDEX), Some("2"));
        assert_eq!(doc.text(lcs[0]), Some("10"));
    }

    #[test]
    fn test_cancelled_write() {
        let registry = DefaultRegistry;
        let pm = ProgressMonitor::new();
        pm.cancel();
        let result = HeaderWriter::new(&registry).write(&product(), "scene.data", &pm);
        assert!(matches!(result, Err(crate::types::DimapError::UserCancelled)));
    }
}
