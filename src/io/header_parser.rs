//! DIMAP header document to product graph.
//!
//! Structural problems (missing identity, dimensions or product type) are
//! fatal. Everything below node level is recovered: a field that fails to
//! parse keeps its default and is reported as a [`Diagnostic`].

use crate::core::geocoding::{AffineTransform, Discontinuity, Placemark};
use crate::core::metadata::{MetadataAttribute, MetadataElement};
use crate::core::product::{
    Band, BandKind, FilterBandInfo, FilterOperation, ImageInfo, Kernel, Mask, MaskKind,
    PalettePoint, Product, SampleCoding, SampleCodingKind, Stx, TiePointGrid,
};
use crate::core::progress::ProgressMonitor;
use crate::io::constants::*;
use crate::io::document::{Document, NodeId};
use crate::io::geocoding_resolver::{GeocodingResolver, ResolvedGeocoding};
use crate::io::product_io::ReaderConfig;
use crate::types::{
    parse_utc, Color, DataType, Diagnostic, DiagnosticKind, DimapError, DimapResult,
};
use std::collections::HashMap;
use std::str::FromStr;

/// Product built from a header plus the problems recovered on the way
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub product: Product,
    pub diagnostics: Vec<Diagnostic>,
}

/// Document BAND_INDEX to band name, from the Spectral_Band_Info entries
pub(crate) fn band_index_table(doc: &Document, root: NodeId) -> HashMap<usize, String> {
    index_table(
        doc,
        root,
        TAG_IMAGE_INTERPRETATION,
        TAG_SPECTRAL_BAND_INFO,
        TAG_BAND_INDEX,
        TAG_BAND_NAME,
    )
}

/// Document TIE_POINT_GRID_INDEX to grid name
pub(crate) fn grid_index_table(doc: &Document, root: NodeId) -> HashMap<usize, String> {
    index_table(
        doc,
        root,
        TAG_TIE_POINT_GRIDS,
        TAG_TIE_POINT_GRID_INFO,
        TAG_TIE_POINT_GRID_INDEX,
        TAG_TIE_POINT_GRID_NAME,
    )
}

fn index_table(
    doc: &Document,
    root: NodeId,
    section: &str,
    entry: &str,
    index_tag: &str,
    name_tag: &str,
) -> HashMap<usize, String> {
    let mut table = HashMap::new();
    if let Some(section) = doc.find_child(root, section) {
        for node in doc.find_children(section, entry) {
            let index = doc.child_text(node, index_tag).and_then(|t| t.parse::<usize>().ok());
            if let (Some(index), Some(name)) = (index, doc.child_text(node, name_tag)) {
                table.insert(index, name.to_string());
            }
        }
    }
    table
}

/// Field access that records parse failures instead of aborting
struct Fields<'d> {
    doc: &'d Document,
    diagnostics: Vec<Diagnostic>,
}

impl<'d> Fields<'d> {
    fn new(doc: &'d Document) -> Self {
        Self {
            doc,
            diagnostics: Vec::new(),
        }
    }

    fn report(&mut self, tag: &str, text: &str) {
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::FieldParse,
            format!("cannot parse <{}> value '{}'", tag, text),
        ));
    }

    fn text(&self, node: NodeId, tag: &str) -> Option<&'d str> {
        self.doc.child_text(node, tag)
    }

    fn optional<T: FromStr>(&mut self, node: NodeId, tag: &str) -> Option<T> {
        let text = self.doc.child_text(node, tag)?;
        match text.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.report(tag, text);
                None
            }
        }
    }

    fn number<T: FromStr>(&mut self, node: NodeId, tag: &str, default: T) -> T {
        self.optional(node, tag).unwrap_or(default)
    }

    /// `<tag value="..."/>` child
    fn value_attr(&self, node: NodeId, tag: &str) -> Option<&'d str> {
        self.doc
            .find_child(node, tag)
            .and_then(|c| self.doc.attribute(c, ATTRIB_VALUE))
    }

    fn value_number<T: FromStr>(&mut self, node: NodeId, tag: &str, default: T) -> T {
        match self.value_attr(node, tag) {
            Some(text) => match text.trim().parse::<T>() {
                Ok(v) => v,
                Err(_) => {
                    self.report(tag, text);
                    default
                }
            },
            None => default,
        }
    }

    fn flag(&self, node: NodeId, tag: &str) -> bool {
        self.text(node, tag)
            .map(|t| t.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn color(&mut self, node: NodeId, tag: &str) -> Option<Color> {
        let c = self.doc.find_child(node, tag)?;
        let mut channel = |name: &str, default: u8| match self.doc.attribute(c, name) {
            Some(text) => text.trim().parse::<u8>().unwrap_or_else(|_| {
                self.report(tag, text);
                default
            }),
            None => default,
        };
        Some(Color {
            red: channel(ATTRIB_RED, 0),
            green: channel(ATTRIB_GREEN, 0),
            blue: channel(ATTRIB_BLUE, 0),
            alpha: channel(ATTRIB_ALPHA, 255),
        })
    }
}

/// Builds a [`Product`] from a parsed header document
pub struct ProductBuilder;

impl ProductBuilder {
    /// Build the complete product, geocoding included
    pub fn build(doc: &Document, config: &ReaderConfig, monitor: &ProgressMonitor) -> DimapResult<BuildOutcome> {
        let mut outcome = Self::build_nodes(doc, config, monitor)?;
        Self::resolve_geocoding(doc, config, &mut outcome)?;
        Ok(outcome)
    }

    /// Everything except geocoding resolution, which the reader runs once
    /// tie-point grid payloads are loaded
    pub fn build_nodes(doc: &Document, config: &ReaderConfig, monitor: &ProgressMonitor) -> DimapResult<BuildOutcome> {
        let root = doc
            .root()
            .filter(|r| doc.name(*r) == TAG_ROOT)
            .ok_or_else(|| DimapError::Format(format!("missing <{}> root element", TAG_ROOT)))?;

        let mut fields = Fields::new(doc);
        let mut product = create_product(doc, root)?;
        log::info!(
            "Building product '{}' ({}x{}) from header",
            product.name,
            product.scene_width(),
            product.scene_height()
        );

        monitor.check()?;
        read_times(&mut fields, root, &mut product);
        read_dataset_use(doc, root, &mut product);

        monitor.check()?;
        read_masks(&mut fields, root, &mut product);
        read_bitmask_definitions(&mut fields, root, &mut product);
        read_sample_codings(&mut fields, root, &mut product);

        monitor.check()?;
        read_bands(&mut fields, root, &mut product);
        read_tie_point_grids(&mut fields, root, &mut product);

        monitor.check()?;
        read_image_display(&mut fields, root, &mut product);
        read_bitmask_overlays(&fields, root, &mut product);
        read_gcps(&mut fields, root, &mut product);

        monitor.check()?;
        read_metadata(doc, root, &mut product);
        link_ancillary_variables(doc, root, &mut product);

        let mut diagnostics = fields.diagnostics;
        if config.check_expressions {
            diagnostics.extend(check_expressions(&mut product));
        }

        log::debug!(
            "Product '{}' has {} band(s), {} tie-point grid(s), {} mask(s)",
            product.name,
            product.bands().len(),
            product.tie_point_grids().len(),
            product.masks().len()
        );
        Ok(BuildOutcome { product, diagnostics })
    }

    /// Decode and attach the geocoding; an unresolved geocoding is a
    /// diagnostic, not an error
    pub fn resolve_geocoding(doc: &Document, config: &ReaderConfig, outcome: &mut BuildOutcome) -> DimapResult<()> {
        let root = doc
            .root()
            .ok_or_else(|| DimapError::Format("document has no root".to_string()))?;
        let resolved = GeocodingResolver::new(config.registry.as_ref()).resolve(doc, root, &outcome.product);
        match &resolved {
            ResolvedGeocoding::None => outcome.diagnostics.push(Diagnostic::new(
                DiagnosticKind::GeocodingUnresolved,
                format!("no geocoding could be resolved for '{}'", outcome.product.name),
            )),
            ResolvedGeocoding::Product(gc) => {
                log::info!("Product geocoding: {}", gc.variant_name());
            }
            ResolvedGeocoding::PerBand(list) => {
                log::info!("Resolved {} per-band geocoding(s)", list.len());
            }
        }
        resolved.apply(&mut outcome.product);
        Ok(())
    }
}

fn create_product(doc: &Document, root: NodeId) -> DimapResult<Product> {
    let name = doc
        .find_child(root, TAG_DATASET_ID)
        .and_then(|n| doc.child_text(n, TAG_DATASET_NAME))
        .ok_or_else(|| DimapError::Format(format!("missing {}/{}", TAG_DATASET_ID, TAG_DATASET_NAME)))?;
    let product_type = doc
        .find_child(root, TAG_PRODUCTION)
        .and_then(|n| doc.child_text(n, TAG_PRODUCT_TYPE))
        .ok_or_else(|| DimapError::Format(format!("missing {}/{}", TAG_PRODUCTION, TAG_PRODUCT_TYPE)))?;
    let dims = doc
        .find_child(root, TAG_RASTER_DIMENSIONS)
        .ok_or_else(|| DimapError::Format(format!("missing <{}>", TAG_RASTER_DIMENSIONS)))?;
    let dimension = |tag: &str| -> DimapResult<usize> {
        doc.child_text(dims, tag)
            .and_then(|t| t.parse::<usize>().ok())
            .ok_or_else(|| DimapError::Format(format!("missing or invalid {}/{}", TAG_RASTER_DIMENSIONS, tag)))
    };
    let width = dimension(TAG_NCOLS)?;
    let height = dimension(TAG_NROWS)?;

    let mut product = Product::new(name, product_type, width, height);
    product.producer = doc
        .find_child(root, TAG_PRODUCTION)
        .and_then(|n| doc.child_text(n, TAG_DATASET_PRODUCER_NAME))
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    Ok(product)
}

fn read_times(fields: &mut Fields, root: NodeId, product: &mut Product) {
    let Some(production) = fields.doc.find_child(root, TAG_PRODUCTION) else {
        return;
    };
    let mut time = |primary: &str, legacy: &str| {
        let (tag, text) = match fields.text(production, primary) {
            Some(t) => (primary, t),
            None => (legacy, fields.text(production, legacy)?),
        };
        let parsed = parse_utc(text);
        if parsed.is_none() {
            fields.report(tag, text);
        }
        parsed
    };
    product.start_time = time(TAG_PRODUCT_SCENE_RASTER_START_TIME, TAG_OLD_SCENE_RASTER_START_TIME);
    product.stop_time = time(TAG_PRODUCT_SCENE_RASTER_STOP_TIME, TAG_OLD_SCENE_RASTER_STOP_TIME);
}

fn read_dataset_use(doc: &Document, root: NodeId, product: &mut Product) {
    let dataset_use = doc.find_child(root, TAG_DATASET_USE);
    let production = doc.find_child(root, TAG_PRODUCTION);
    if let Some(node) = dataset_use {
        product.description = doc.child_text(node, TAG_DATASET_COMMENTS).map(str::to_string);
        product.auto_grouping = doc
            .child_text(node, TAG_DATASET_AUTO_GROUPING)
            .filter(|g| !g.is_empty())
            .map(str::to_string);
    }
    product.quicklook_band = [production, dataset_use]
        .into_iter()
        .flatten()
        .find_map(|n| doc.child_text(n, TAG_QUICKLOOK_BAND_NAME))
        .filter(|q| !q.is_empty())
        .map(str::to_string);
}

fn read_mask(fields: &mut Fields, node: NodeId, product: &Product) -> Option<Mask> {
    let doc = fields.doc;
    let type_name = doc.attribute(node, ATTRIB_TYPE)?;
    let name = fields.value_attr(node, TAG_NAME)?.to_string();
    let kind = match type_name {
        MASK_TYPE_MATHS => MaskKind::Maths {
            expression: fields.value_attr(node, TAG_EXPRESSION)?.to_string(),
        },
        MASK_TYPE_RANGE => MaskKind::Range {
            raster: fields.value_attr(node, TAG_RASTER)?.to_string(),
            minimum: fields.value_number(node, TAG_MINIMUM, 0.0),
            maximum: fields.value_number(node, TAG_MAXIMUM, 0.0),
        },
        other => {
            log::warn!("Skipping mask '{}' of unknown type '{}'", name, other);
            return None;
        }
    };
    Some(Mask {
        description: fields.value_attr(node, TAG_DESCRIPTION).unwrap_or("").to_string(),
        color: fields.color(node, TAG_COLOR).unwrap_or_default(),
        transparency: fields.value_number(node, TAG_TRANSPARENCY, 0.5),
        width: fields.value_number(node, TAG_MASK_RASTER_WIDTH, product.scene_width()),
        height: fields.value_number(node, TAG_MASK_RASTER_HEIGHT, product.scene_height()),
        name,
        kind,
    })
}

fn read_masks(fields: &mut Fields, root: NodeId, product: &mut Product) {
    let Some(section) = fields.doc.find_child(root, TAG_MASKS) else {
        return;
    };
    for node in fields.doc.find_children(section, TAG_MASK) {
        if let Some(mask) = read_mask(fields, node, product) {
            if let Err(e) = product.add_mask(mask) {
                log::warn!("{}", e);
            }
        }
    }
}

/// Legacy bitmask definitions become maths masks
fn read_bitmask_definitions(fields: &mut Fields, root: NodeId, product: &mut Product) {
    let doc = fields.doc;
    let definitions = match doc.find_child(root, TAG_BITMASK_DEFINITIONS) {
        Some(section) => doc.find_children(section, TAG_BITMASK_DEFINITION),
        None => doc.find_children(root, TAG_BITMASK_DEFINITION),
    };
    for node in definitions {
        let (Some(name), Some(expression)) = (
            doc.attribute(node, ATTRIB_NAME),
            fields.value_attr(node, TAG_EXPRESSION),
        ) else {
            continue;
        };
        if product.mask(name).is_some() {
            continue;
        }
        let mut mask = Mask::maths(name, expression, product.scene_width(), product.scene_height());
        mask.description = fields.value_attr(node, TAG_DESCRIPTION).unwrap_or("").to_string();
        if let Some(color) = fields.color(node, TAG_COLOR) {
            mask.color = color;
        }
        mask.transparency = fields.value_number(node, TAG_TRANSPARENCY, 0.5);
        log::debug!("Converted bitmask definition '{}' to a mask", name);
        if let Err(e) = product.add_mask(mask) {
            log::warn!("{}", e);
        }
    }
}

fn read_sample_codings(fields: &mut Fields, root: NodeId, product: &mut Product) {
    let doc = fields.doc;
    let kinds = [
        (TAG_FLAG_CODING, TAG_FLAG, TAG_FLAG_NAME, TAG_FLAG_INDEX, TAG_FLAG_DESCRIPTION, SampleCodingKind::Flag),
        (TAG_INDEX_CODING, TAG_INDEX, TAG_INDEX_NAME, TAG_INDEX_VALUE, TAG_INDEX_DESCRIPTION, SampleCodingKind::Index),
    ];
    for (section_tag, entry_tag, name_tag, value_tag, desc_tag, kind) in kinds {
        for node in doc.find_children(root, section_tag) {
            let Some(name) = doc.attribute(node, ATTRIB_NAME) else {
                log::warn!("Skipping unnamed <{}>", section_tag);
                continue;
            };
            let mut coding = SampleCoding::new(name, kind);
            for entry in doc.find_children(node, entry_tag) {
                let Some(entry_name) = fields.text(entry, name_tag) else {
                    continue;
                };
                let value = fields.number(entry, value_tag, 0i32);
                coding.add_entry(entry_name, value, fields.text(entry, desc_tag).unwrap_or(""));
            }
            if let Err(e) = product.add_sample_coding(coding) {
                log::warn!("{}", e);
            }
        }
    }
}

fn read_kernel(fields: &mut Fields, node: NodeId) -> Option<Kernel> {
    let k = fields.doc.find_child(node, TAG_FILTER_KERNEL)?;
    let width = fields.number(k, TAG_KERNEL_WIDTH, 0usize);
    let height = fields.number(k, TAG_KERNEL_HEIGHT, 0usize);
    let data: Vec<f64> = fields
        .text(k, TAG_KERNEL_DATA)
        .unwrap_or("")
        .split(',')
        .filter_map(|v| v.trim().parse::<f64>().ok())
        .collect();
    if width == 0 || height == 0 || width.checked_mul(height) != Some(data.len()) {
        log::warn!("Filter kernel has {} value(s) for {}x{}", data.len(), width, height);
        return None;
    }
    Some(Kernel {
        width,
        height,
        x_origin: fields.number(k, TAG_KERNEL_X_ORIGIN, width / 2),
        y_origin: fields.number(k, TAG_KERNEL_Y_ORIGIN, height / 2),
        factor: fields.number(k, TAG_KERNEL_FACTOR, 1.0),
        data,
    })
}

fn read_filter_info(fields: &mut Fields, node: NodeId) -> Option<FilterBandInfo> {
    let doc = fields.doc;
    let source = fields.text(node, TAG_FILTER_SOURCE)?.to_string();
    let operation = match doc.attribute(node, ATTRIB_BAND_TYPE)? {
        BAND_TYPE_GENERAL_FILTER => {
            let op_type = fields.text(node, TAG_FILTER_OP_TYPE)?.to_string();
            let kernel = if doc.attribute(node, ATTRIB_VERSION).is_some() {
                read_kernel(fields, node)?
            } else {
                // pre-1.2 headers only carry a square window size
                let size = fields.optional::<usize>(node, TAG_FILTER_SUB_WINDOW_SIZE)?;
                Kernel::square(size)
            };
            FilterOperation::General { op_type, kernel }
        }
        BAND_TYPE_CONVOLUTION_FILTER => FilterOperation::Convolution {
            kernel: read_kernel(fields, node)?,
        },
        other => {
            log::warn!("Unknown filter band type '{}'", other);
            return None;
        }
    };
    Some(FilterBandInfo { source, operation })
}

fn read_band(fields: &mut Fields, node: NodeId, product: &Product) -> Option<Band> {
    let doc = fields.doc;
    let name = fields.text(node, TAG_BAND_NAME)?;
    let data_type_text = fields.text(node, TAG_DATA_TYPE).unwrap_or("");
    let Some(data_type) = DataType::from_name(data_type_text) else {
        fields.report(TAG_DATA_TYPE, data_type_text);
        log::warn!("Skipping band '{}' with unsupported data type", name);
        return None;
    };
    let width = fields.number(node, TAG_BAND_RASTER_WIDTH, product.scene_width());
    let height = fields.number(node, TAG_BAND_RASTER_HEIGHT, product.scene_height());

    let mut band = if let Some(filter_node) = doc.find_child(node, TAG_FILTER_BAND_INFO) {
        let Some(info) = read_filter_info(fields, filter_node) else {
            fields.report(TAG_FILTER_BAND_INFO, name);
            return None;
        };
        Band::filter_band(name, width, height, info)
    } else if fields.flag(node, TAG_VIRTUAL_BAND) {
        let expression = fields.text(node, TAG_EXPRESSION).unwrap_or("");
        Band::virtual_band(name, data_type, width, height, expression)
    } else {
        Band::new(name, data_type, width, height)
    };

    band.description = fields.text(node, TAG_BAND_DESCRIPTION).filter(|d| !d.is_empty()).map(str::to_string);
    band.unit = fields.text(node, TAG_PHYSICAL_UNIT).filter(|u| !u.is_empty()).map(str::to_string);
    band.spectral.wavelength = fields.number(node, TAG_BAND_WAVELEN, 0.0);
    band.spectral.bandwidth = fields.number(node, TAG_BANDWIDTH, 0.0);
    band.spectral.solar_flux = fields.number(node, TAG_SOLAR_FLUX, 0.0);
    band.spectral.spectral_band_index = fields.optional::<i32>(node, TAG_SPECTRAL_BAND_INDEX).filter(|i| *i > -1);
    band.scaling_factor = fields.number(node, TAG_SCALING_FACTOR, 1.0);
    band.scaling_offset = fields.number(node, TAG_SCALING_OFFSET, 0.0);
    band.log10_scaled = fields.flag(node, TAG_SCALING_LOG_10);
    band.no_data_value_used = fields.flag(node, TAG_NO_DATA_VALUE_USED);
    if let Some(value) = fields.optional::<f64>(node, TAG_NO_DATA_VALUE) {
        band.no_data_value = value;
    }
    band.valid_pixel_expression = fields
        .text(node, TAG_VALID_MASK_TERM)
        .filter(|e| !e.is_empty())
        .map(str::to_string);

    let coding = fields
        .text(node, TAG_FLAG_CODING_NAME)
        .or_else(|| fields.text(node, TAG_INDEX_CODING_NAME));
    if let Some(coding) = coding {
        if product.sample_coding(coding).is_some() {
            band.sample_coding = Some(coding.to_string());
        } else {
            log::warn!("Band '{}' refers to unknown sample coding '{}'", name, coding);
        }
    }

    band.ancillary_relations = doc
        .find_children(node, TAG_ANCILLARY_RELATION)
        .into_iter()
        .filter_map(|n| doc.text(n).map(|t| t.trim().to_string()))
        .filter(|t| !t.is_empty())
        .collect();

    if let Some(text) = fields.text(node, TAG_IMAGE_TO_MODEL_TRANSFORM) {
        let values: Vec<f64> = text.split(',').filter_map(|v| v.trim().parse().ok()).collect();
        match AffineTransform::from_flat(&values) {
            Some(t) => band.image_to_model = Some(t),
            None => fields.report(TAG_IMAGE_TO_MODEL_TRANSFORM, text),
        }
    }
    band.modified = false;
    Some(band)
}

/// Stored bands first, then virtual bands, then filter bands, each group in
/// document order
fn read_bands(fields: &mut Fields, root: NodeId, product: &mut Product) {
    let Some(section) = fields.doc.find_child(root, TAG_IMAGE_INTERPRETATION) else {
        return;
    };
    let mut stored = Vec::new();
    let mut virtual_bands = Vec::new();
    let mut filters = Vec::new();
    for node in fields.doc.find_children(section, TAG_SPECTRAL_BAND_INFO) {
        let Some(band) = read_band(fields, node, product) else {
            continue;
        };
        if band.is_stored() {
            stored.push(band);
        } else if band.is_virtual() {
            virtual_bands.push(band);
        } else {
            filters.push(band);
        }
    }

    for band in stored.into_iter().chain(virtual_bands) {
        if let Err(e) = product.add_band(band) {
            log::warn!("{}", e);
        }
    }
    for band in filters {
        let source_known = match &band.kind {
            BandKind::Filter(info) => product.contains_raster(&info.source),
            _ => true,
        };
        if !source_known {
            fields.diagnostics.push(Diagnostic::new(
                DiagnosticKind::IncompatibleExpression,
                format!("filter band '{}' refers to a missing source raster", band.name),
            ));
            continue;
        }
        if let Err(e) = product.add_band(band) {
            log::warn!("{}", e);
        }
    }
}

fn read_tie_point_grids(fields: &mut Fields, root: NodeId, product: &mut Product) {
    let Some(section) = fields.doc.find_child(root, TAG_TIE_POINT_GRIDS) else {
        return;
    };
    for node in fields.doc.find_children(section, TAG_TIE_POINT_GRID_INFO) {
        let Some(name) = fields.text(node, TAG_TIE_POINT_GRID_NAME) else {
            continue;
        };
        let (Some(width), Some(height)) = (
            fields.optional::<usize>(node, TAG_NCOLS),
            fields.optional::<usize>(node, TAG_NROWS),
        ) else {
            log::warn!("Skipping tie-point grid '{}' without dimensions", name);
            continue;
        };
        let mut grid = TiePointGrid::new(
            name,
            width,
            height,
            fields.number(node, TAG_OFFSET_X, 0.0),
            fields.number(node, TAG_OFFSET_Y, 0.0),
            fields.number(node, TAG_STEP_X, 1.0),
            fields.number(node, TAG_STEP_Y, 1.0),
        );
        if let Some(dt) = fields.text(node, TAG_DATA_TYPE).and_then(DataType::from_name) {
            grid.data_type = dt;
        }
        grid.description = fields.text(node, TAG_TIE_POINT_DESCRIPTION).filter(|d| !d.is_empty()).map(str::to_string);
        grid.unit = fields.text(node, TAG_PHYSICAL_UNIT).filter(|u| !u.is_empty()).map(str::to_string);
        // refined from the values once the payload is loaded
        if fields.flag(node, TAG_CYCLIC) {
            grid.discontinuity = Discontinuity::At180;
        }
        grid.modified = false;
        if let Err(e) = product.add_tie_point_grid(grid) {
            log::warn!("{}", e);
        }
    }
}

fn read_stx(fields: &mut Fields, node: NodeId) -> Option<Stx> {
    let minimum = fields.optional::<f64>(node, TAG_STX_MIN)?;
    let maximum = fields.optional::<f64>(node, TAG_STX_MAX)?;
    let histogram = fields
        .text(node, TAG_HISTOGRAM)
        .map(|t| t.split(',').filter_map(|v| v.trim().parse::<i64>().ok()).collect())
        .unwrap_or_default();
    Some(Stx {
        minimum,
        maximum,
        mean: fields.number(node, TAG_STX_MEAN, f64::NAN),
        std_dev: fields.number(node, TAG_STX_STDDEV, f64::NAN),
        resolution_level: fields.number(node, TAG_STX_LEVEL, 0),
        histogram,
    })
}

fn read_image_info(fields: &mut Fields, node: NodeId) -> Option<ImageInfo> {
    let doc = fields.doc;
    let points = doc.find_children(node, TAG_COLOR_PALETTE_POINT);
    if points.is_empty() {
        return None;
    }
    let declared = fields.optional::<usize>(node, TAG_NUM_COLORS);
    let mut palette = Vec::with_capacity(points.len());
    for point in points {
        let Some(sample) = fields.optional::<f64>(point, TAG_SAMPLE) else {
            continue;
        };
        palette.push(PalettePoint {
            sample,
            label: fields.text(point, TAG_LABEL).map(str::to_string),
            color: fields.color(point, TAG_COLOR).unwrap_or_default(),
        });
    }
    if let Some(n) = declared.filter(|n| *n != palette.len()) {
        log::warn!("Palette declares {} colour(s) but has {}", n, palette.len());
    }
    Some(ImageInfo {
        palette,
        no_data_color: fields.color(node, TAG_NO_DATA_COLOR),
        histogram_matching: fields
            .text(node, TAG_HISTOGRAM_MATCHING)
            .unwrap_or("None")
            .to_string(),
    })
}

fn parse_names(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

/// Target of a display entry, addressed by BAND_INDEX or TIE_POINT_GRID_INDEX
enum DisplayTarget {
    Band(String),
    Grid(String),
}

fn display_target(
    doc: &Document,
    node: NodeId,
    bands: &HashMap<usize, String>,
    grids: &HashMap<usize, String>,
) -> Option<DisplayTarget> {
    let lookup = |tag: &str, table: &HashMap<usize, String>| {
        doc.child_text(node, tag)
            .and_then(|t| t.parse::<usize>().ok())
            .and_then(|i| table.get(&i).cloned())
    };
    lookup(TAG_BAND_INDEX, bands)
        .map(DisplayTarget::Band)
        .or_else(|| lookup(TAG_TIE_POINT_GRID_INDEX, grids).map(DisplayTarget::Grid))
}

fn add_overlays(product: &mut Product, target: DisplayTarget, names: Vec<String>) {
    let known: Vec<String> = names
        .into_iter()
        .filter(|n| {
            let exists = product.mask(n).is_some();
            if !exists {
                log::warn!("Overlay refers to unknown mask '{}'", n);
            }
            exists
        })
        .collect();
    let overlays = match target {
        DisplayTarget::Band(name) => product.band_mut(&name).map(|b| &mut b.overlay_masks),
        DisplayTarget::Grid(name) => product.tie_point_grid_mut(&name).map(|g| &mut g.overlay_masks),
    };
    if let Some(overlays) = overlays {
        for name in known {
            if !overlays.contains(&name) {
                overlays.push(name);
            }
        }
    }
}

fn read_image_display(fields: &mut Fields, root: NodeId, product: &mut Product) {
    let doc = fields.doc;
    let Some(display) = doc.find_child(root, TAG_IMAGE_DISPLAY) else {
        return;
    };
    let bands = band_index_table(doc, root);
    let grids = grid_index_table(doc, root);

    for node in doc.find_children(display, TAG_BAND_STATISTICS) {
        let Some(DisplayTarget::Band(name)) = display_target(doc, node, &bands, &HashMap::new()) else {
            continue;
        };
        let stx = read_stx(fields, node);
        let info = read_image_info(fields, node);
        if let Some(band) = product.band_mut(&name) {
            band.stx = stx;
            band.image_info = info;
        }
    }

    for node in doc.find_children(display, TAG_MASK_USAGE) {
        let names = doc
            .find_children(node, TAG_OVERLAY)
            .into_iter()
            .filter_map(|o| doc.attribute(o, ATTRIB_NAMES))
            .flat_map(parse_names)
            .collect::<Vec<_>>();
        if let Some(target) = display_target(doc, node, &bands, &grids) {
            add_overlays(product, target, names);
        }
    }
}

fn read_bitmask_overlays(fields: &Fields, root: NodeId, product: &mut Product) {
    let doc = fields.doc;
    let Some(display) = doc.find_child(root, TAG_IMAGE_DISPLAY) else {
        return;
    };
    let overlays = doc.find_children(display, TAG_BITMASK_OVERLAY);
    if overlays.is_empty() {
        return;
    }
    let bands = band_index_table(doc, root);
    let grids = grid_index_table(doc, root);
    for node in overlays {
        let names = doc
            .find_child(node, TAG_BITMASK)
            .and_then(|b| doc.attribute(b, ATTRIB_NAMES))
            .map(parse_names)
            .unwrap_or_default();
        if names.is_empty() {
            continue;
        }
        if let Some(target) = display_target(doc, node, &bands, &grids) {
            add_overlays(product, target, names);
        }
    }
}

fn read_gcps(fields: &mut Fields, root: NodeId, product: &mut Product) {
    let Some(group) = fields.doc.find_child(root, TAG_GCP_GROUP) else {
        return;
    };
    for node in fields.doc.find_children(group, TAG_PLACEMARK) {
        let Some(name) = fields
            .doc
            .attribute(node, ATTRIB_NAME)
            .or_else(|| fields.text(node, TAG_NAME))
        else {
            continue;
        };
        let (Some(px), Some(py)) = (
            fields.optional::<f64>(node, TAG_PLACEMARK_PIXEL_X),
            fields.optional::<f64>(node, TAG_PLACEMARK_PIXEL_Y),
        ) else {
            log::warn!("Skipping GCP '{}' without pixel position", name);
            continue;
        };
        let lat = fields.number(node, TAG_PLACEMARK_LATITUDE, f64::NAN);
        let lon = fields.number(node, TAG_PLACEMARK_LONGITUDE, f64::NAN);
        let mut gcp = Placemark::new(name, px, py, lat, lon);
        gcp.label = fields.text(node, TAG_LABEL).unwrap_or(name).to_string();
        gcp.description = fields.text(node, TAG_DESCRIPTION).unwrap_or("").to_string();
        product.gcps.push(gcp);
    }
}

fn read_metadata_element(doc: &Document, node: NodeId) -> MetadataElement {
    let mut element = MetadataElement::new(doc.attribute(node, ATTRIB_NAME).unwrap_or(""));
    element.description = doc.attribute(node, ATTRIB_DESCRIPTION).map(str::to_string);
    for child in doc.children(node) {
        let child = *child;
        if doc.name(child) == TAG_METADATA_ELEMENT {
            element.add_element(read_metadata_element(doc, child));
        } else if doc.name(child) == TAG_METADATA_ATTRIBUTE {
            if let Some(attr) = read_metadata_attribute(doc, child) {
                element.add_attribute(attr);
            }
        }
    }
    element
}

/// Attributes without a name, type or value are dropped
fn read_metadata_attribute(doc: &Document, node: NodeId) -> Option<MetadataAttribute> {
    let name = doc.attribute(node, ATTRIB_NAME).filter(|n| !n.is_empty())?;
    let type_name = doc.attribute(node, ATTRIB_TYPE).filter(|t| !t.is_empty())?;
    let value = doc.text(node).map(str::trim).filter(|v| !v.is_empty())?;
    let num_elems = doc
        .attribute(node, ATTRIB_ELEMS)
        .and_then(|e| e.trim().parse::<usize>().ok())
        .unwrap_or(1);
    Some(MetadataAttribute {
        name: name.to_string(),
        type_name: type_name.to_string(),
        value: value.to_string(),
        num_elems,
        unit: doc.attribute(node, ATTRIB_UNIT).map(str::to_string),
        description: doc.attribute(node, ATTRIB_DESCRIPTION).map(str::to_string),
        read_only: doc.attribute(node, ATTRIB_MODE) != Some("rw"),
    })
}

fn read_metadata(doc: &Document, root: NodeId, product: &mut Product) {
    let Some(sources) = doc.find_child(root, TAG_DATASET_SOURCES) else {
        return;
    };
    let mut elements: Vec<MetadataElement> = doc
        .find_children(sources, TAG_METADATA_ELEMENT)
        .into_iter()
        .map(|n| read_metadata_element(doc, n))
        .collect();
    if elements.len() == 1 && elements[0].name == product.metadata.name {
        product.metadata = elements.remove(0);
        return;
    }
    for element in elements {
        product.metadata.add_element(element);
    }
}

/// Ancillary variables are linked once all bands exist
fn link_ancillary_variables(doc: &Document, root: NodeId, product: &mut Product) {
    let Some(section) = doc.find_child(root, TAG_IMAGE_INTERPRETATION) else {
        return;
    };
    for node in doc.find_children(section, TAG_SPECTRAL_BAND_INFO) {
        let Some(name) = doc.child_text(node, TAG_BAND_NAME) else {
            continue;
        };
        let variables: Vec<String> = doc
            .find_children(node, TAG_ANCILLARY_VARIABLE)
            .into_iter()
            .filter_map(|n| doc.text(n).map(|t| t.trim().to_string()))
            .filter(|v| {
                let known = product.band(v).is_some();
                if !known {
                    log::warn!("Band '{}' lists unknown ancillary variable '{}'", name, v);
                }
                known
            })
            .collect();
        if let Some(band) = product.band_mut(name) {
            band.ancillary_variables = variables;
        }
    }
}

/// Drop virtual bands and masks whose expressions reference unknown
/// rasters, filter bands whose source was dropped, and clear invalid
/// valid-pixel expressions. Repeats until stable since a dropped node may
/// break further references.
fn check_expressions(product: &mut Product) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    loop {
        let mut changed = false;

        let bad_band = product.bands().iter().find_map(|b| {
            let expr = b.expression()?;
            product.check_expression(expr).err().map(|msg| (b.name.clone(), msg))
        });
        if let Some((name, msg)) = bad_band {
            product.remove_band(&name);
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::IncompatibleExpression,
                format!("virtual band '{}' dropped: {}", name, msg),
            ));
            changed = true;
        }

        let orphan_filter = product.bands().iter().find_map(|b| match &b.kind {
            BandKind::Filter(info) if !product.contains_raster(&info.source) => {
                Some((b.name.clone(), info.source.clone()))
            }
            _ => None,
        });
        if let Some((name, source)) = orphan_filter {
            product.remove_band(&name);
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::IncompatibleExpression,
                format!("filter band '{}' dropped: source raster '{}' is gone", name, source),
            ));
            changed = true;
        }

        let bad_mask = product.masks().iter().find_map(|m| {
            product.check_expression(&m.expression()).err().map(|msg| (m.name.clone(), msg))
        });
        if let Some((name, msg)) = bad_mask {
            product.remove_mask(&name);
            for band in product.bands_mut() {
                band.overlay_masks.retain(|m| m != &name);
            }
            for grid in product.tie_point_grids_mut() {
                grid.overlay_masks.retain(|m| m != &name);
            }
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::IncompatibleExpression,
                format!("mask '{}' dropped: {}", name, msg),
            ));
            changed = true;
        }

        if !changed {
            break;
        }
    }

    let invalid: Vec<(String, String)> = product
        .bands()
        .iter()
        .filter_map(|b| {
            let expr = b.valid_pixel_expression.as_deref()?;
            product.check_expression(expr).err().map(|msg| (b.name.clone(), msg))
        })
        .collect();
    for (name, msg) in invalid {
        if let Some(band) = product.band_mut(&name) {
            band.valid_pixel_expression = None;
        }
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::IncompatibleExpression,
            format!("valid-pixel expression of '{}' cleared: {}", name, msg),
        ));
    }
    diagnostics
}
