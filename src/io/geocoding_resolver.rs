//! Reconstruction of geocodings from the header document.
//!
//! A header may describe its spatial referencing in several historical
//! forms. Each `Geoposition` element (paired by position with a
//! `Coordinate_Reference_System` sibling) is decoded on its own, trying in
//! order: pixel lookup, CRS, polynomial, GCP and tie-point. GCP and
//! pixel-lookup elements may embed another geocoding, which is decoded
//! recursively with the nested element as scope. Documents without any
//! `Geoposition` go through the legacy map and tie-point fallbacks.

use crate::core::geocoding::{
    AffineTransform, CrsGeoCoding, Discontinuity, GcpGeoCoding, GcpMethod, GeoCoding,
    GeopositionInsert, MapGeoCoding, MapInfo, MapProjection, PixelGeoCoding, Polynomial,
    PolynomialGeoCoding, ProjectionParameter, TiePointGeoCoding, TiePointSampling,
};
use crate::core::product::Product;
use crate::core::registry::{Datum, ReferenceSystemRegistry};
use crate::io::constants::*;
use crate::io::document::{Document, NodeId};
use crate::io::header_parser::band_index_table;
use std::collections::HashMap;
use std::sync::Arc;

/// Search radius used when a header stores 0
pub const DEFAULT_SEARCH_RADIUS: u32 = 6;

/// Result of geocoding resolution
#[derive(Debug, Clone)]
pub enum ResolvedGeocoding {
    /// One geocoding shared by the whole product
    Product(Arc<GeoCoding>),
    /// Band index and geocoding, for bands that have one
    PerBand(Vec<(usize, Arc<GeoCoding>)>),
    None,
}

impl ResolvedGeocoding {
    pub fn is_none(&self) -> bool {
        matches!(self, ResolvedGeocoding::None)
    }

    /// Attach the geocodings to the product and its bands
    pub fn apply(&self, product: &mut Product) {
        match self {
            ResolvedGeocoding::Product(gc) => product.set_scene_geocoding(Arc::clone(gc)),
            ResolvedGeocoding::PerBand(list) => {
                for (index, gc) in list {
                    if let Some(band) = product.bands_mut().get_mut(*index) {
                        band.geocoding = Some(Arc::clone(gc));
                    }
                }
                if let Some((_, first)) = list.first() {
                    product.scene_geocoding = Some(Arc::clone(first));
                }
            }
            ResolvedGeocoding::None => {}
        }
    }
}

pub struct GeocodingResolver<'a> {
    registry: &'a dyn ReferenceSystemRegistry,
}

impl<'a> GeocodingResolver<'a> {
    pub fn new(registry: &'a dyn ReferenceSystemRegistry) -> Self {
        Self { registry }
    }

    /// Resolve the geocoding(s) described below `root`. Tie-point grids
    /// must already hold their data for tie-point variants to resolve.
    pub fn resolve(&self, doc: &Document, root: NodeId, product: &Product) -> ResolvedGeocoding {
        let geopositions = doc.find_children(root, TAG_GEOPOSITION);
        let crs_elements = doc.find_children(root, TAG_COORDINATE_REFERENCE_SYSTEM);
        let fallback_datum = self.document_datum(doc, root);

        if !geopositions.is_empty() {
            let resolved = self.resolve_elements(doc, root, &geopositions, &crs_elements, &fallback_datum, product);
            if !resolved.is_none() {
                return resolved;
            }
        }

        if let Some(gc) = self.resolve_fallbacks(doc, &crs_elements, &fallback_datum, product) {
            log::debug!("Resolved {} geocoding through a fallback path", gc.variant_name());
            return ResolvedGeocoding::Product(Arc::new(gc));
        }
        ResolvedGeocoding::None
    }

    fn resolve_elements(
        &self,
        doc: &Document,
        root: NodeId,
        geopositions: &[NodeId],
        crs_elements: &[NodeId],
        fallback_datum: &Datum,
        product: &Product,
    ) -> ResolvedGeocoding {
        let mut cache: HashMap<String, Arc<GeoCoding>> = HashMap::new();
        let mut decode = |geopos: NodeId, crs: Option<NodeId>| -> Option<Arc<GeoCoding>> {
            let key = format!(
                "{} {}",
                crs.map(|c| describe(doc, c)).unwrap_or_default(),
                describe(doc, geopos)
            );
            if let Some(shared) = cache.get(&key) {
                return Some(Arc::clone(shared));
            }
            let gc = Arc::new(self.decode_element(doc, geopos, crs, fallback_datum, product)?);
            cache.insert(key, Arc::clone(&gc));
            Some(gc)
        };

        if geopositions.len() == 1 && doc.find_child(geopositions[0], TAG_BAND_INDEX).is_none() {
            return match decode(geopositions[0], crs_elements.first().copied()) {
                Some(gc) => ResolvedGeocoding::Product(gc),
                None => ResolvedGeocoding::None,
            };
        }

        let band_names = band_index_table(doc, root);
        let mut per_band = Vec::new();
        for (i, &geopos) in geopositions.iter().enumerate() {
            let document_index = match doc
                .child_text(geopos, TAG_BAND_INDEX)
                .and_then(|t| t.parse::<usize>().ok())
            {
                Some(index) => index,
                None => {
                    log::warn!("Skipping Geoposition #{} without a valid BAND_INDEX", i);
                    continue;
                }
            };
            let position = match band_names.get(&document_index) {
                Some(name) => product.band_index(name),
                None => Some(document_index).filter(|i| *i < product.bands().len()),
            };
            let Some(band_index) = position else {
                log::warn!("Geoposition refers to unknown band index {}", document_index);
                continue;
            };
            let crs = crs_elements.get(i).or(crs_elements.first()).copied();
            if let Some(gc) = decode(geopos, crs) {
                per_band.push((band_index, gc));
            }
        }
        if per_band.is_empty() {
            ResolvedGeocoding::None
        } else {
            ResolvedGeocoding::PerBand(per_band)
        }
    }

    /// Decode the first CRS/Geoposition pair below a nested scope element
    /// such as `Original_Geocoding` or `Pixel_Position_Estimator`
    fn decode_scope(&self, doc: &Document, scope: NodeId, fallback_datum: &Datum, product: &Product) -> Option<GeoCoding> {
        let geopos = doc.find_child(scope, TAG_GEOPOSITION)?;
        let crs = doc.find_child(scope, TAG_COORDINATE_REFERENCE_SYSTEM);
        self.decode_element(doc, geopos, crs, fallback_datum, product)
    }

    fn decode_element(
        &self,
        doc: &Document,
        geopos: NodeId,
        crs: Option<NodeId>,
        fallback_datum: &Datum,
        product: &Product,
    ) -> Option<GeoCoding> {
        let datum = crs
            .and_then(|c| self.decode_datum(doc, c))
            .unwrap_or_else(|| fallback_datum.clone());

        if let Some(gc) = self.decode_pixel(doc, geopos, fallback_datum, product) {
            return Some(gc);
        }
        if let Some(gc) = crs.and_then(|c| self.decode_crs(doc, c, geopos)) {
            return Some(gc);
        }
        if let Some(gc) = decode_polynomial(doc, geopos, &datum) {
            return Some(gc);
        }
        if let Some(points) = doc.find_child(geopos, TAG_GEOPOSITION_POINTS) {
            if let Some(gc) = self.decode_gcp(doc, points, &datum, fallback_datum, product) {
                return Some(gc);
            }
            if let Some(gc) = decode_tie_point(doc, points, &datum, product) {
                return Some(gc);
            }
        }
        if let Some(gc) = crs.and_then(|c| self.decode_legacy_map(doc, c, product)) {
            return Some(gc);
        }
        log::debug!("No geocoding variant matched Geoposition element");
        None
    }

    fn decode_pixel(&self, doc: &Document, geopos: NodeId, fallback_datum: &Datum, product: &Product) -> Option<GeoCoding> {
        let lat_band = doc.child_text(geopos, TAG_LATITUDE_BAND)?;
        let lon_band = doc.child_text(geopos, TAG_LONGITUDE_BAND)?;
        let radius_text = doc.child_text(geopos, TAG_SEARCH_RADIUS)?;
        if product.band(lat_band).is_none() || product.band(lon_band).is_none() {
            log::warn!(
                "Pixel geocoding refers to missing band '{}' or '{}'",
                lat_band,
                lon_band
            );
            return None;
        }
        let radius = radius_text.parse::<u32>().ok()?;
        let search_radius = if radius == 0 { DEFAULT_SEARCH_RADIUS } else { radius };
        let estimator = doc
            .find_child(geopos, TAG_PIXEL_POSITION_ESTIMATOR)
            .and_then(|scope| self.decode_scope(doc, scope, fallback_datum, product))
            .map(Box::new);
        Some(GeoCoding::PixelLookup(PixelGeoCoding {
            lat_band: lat_band.to_string(),
            lon_band: lon_band.to_string(),
            valid_mask: doc
                .child_text(geopos, TAG_VALID_MASK_EXPRESSION)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            search_radius,
            estimator,
        }))
    }

    fn decode_crs(&self, doc: &Document, crs: NodeId, geopos: NodeId) -> Option<GeoCoding> {
        let wkt_text = doc.child_text(crs, TAG_WKT)?;
        let transform_text = doc.child_text(geopos, TAG_IMAGE_TO_MODEL_TRANSFORM)?;
        let wkt = match self.registry.parse_wkt(wkt_text) {
            Some(wkt) => wkt,
            None => {
                log::warn!("Unparsable WKT in Coordinate_Reference_System");
                return None;
            }
        };
        let transform = match parse_transform(transform_text) {
            Some(t) if t.is_invertible() => t,
            _ => {
                log::warn!("Malformed or non-invertible image-to-model transform '{}'", transform_text);
                return None;
            }
        };
        Some(GeoCoding::Crs(CrsGeoCoding {
            geographic: self.registry.is_geographic(&wkt),
            wkt,
            image_to_map: transform,
        }))
    }

    fn decode_gcp(
        &self,
        doc: &Document,
        points: NodeId,
        datum: &Datum,
        fallback_datum: &Datum,
        product: &Product,
    ) -> Option<GeoCoding> {
        let method_text = doc.child_text(points, TAG_INTERPOLATION_METHOD)?;
        let original = doc
            .find_child(points, TAG_ORIGINAL_GEOCODING)
            .and_then(|scope| self.decode_scope(doc, scope, fallback_datum, product));

        let gcp = GcpMethod::from_name(method_text)
            .and_then(|method| GcpGeoCoding::new(method, product.gcps.clone(), datum.clone()));
        match gcp {
            Some(mut gcp) => {
                gcp.original = original.map(Box::new);
                Some(GeoCoding::Gcp(gcp))
            }
            None => {
                log::warn!(
                    "Cannot build {} GCP geocoding from {} placemark(s), using original geocoding",
                    method_text,
                    product.gcps.len()
                );
                original
            }
        }
    }

    fn decode_legacy_map(&self, doc: &Document, crs: NodeId, product: &Product) -> Option<GeoCoding> {
        let hcs = doc.find_child(crs, TAG_HORIZONTAL_CS)?;
        let projection_node = doc.find_child(hcs, TAG_PROJECTION)?;
        let datum = self.decode_datum(doc, crs).unwrap_or_default();

        let method_node = doc.find_child(projection_node, TAG_PROJECTION_CT_METHOD)?;
        let method = doc.child_text(method_node, TAG_PROJECTION_CT_NAME)?.to_string();
        let schema = self.registry.projection_parameters(&method).unwrap_or_default();

        let mut indexed: Vec<(usize, ProjectionParameter)> = Vec::new();
        if let Some(params) = doc.find_child(method_node, TAG_PROJECTION_PARAMETERS) {
            for (position, node) in doc.find_children(params, TAG_PROJECTION_PARAMETER).into_iter().enumerate() {
                let index = doc
                    .attribute(node, ATTRIB_INDEX)
                    .and_then(|i| i.trim().parse::<usize>().ok())
                    .unwrap_or(position);
                let value_node = doc.find_child(node, TAG_PROJECTION_PARAMETER_VALUE)?;
                let value = doc.text(value_node)?.trim().parse::<f64>().ok()?;
                let name = doc
                    .child_text(node, TAG_PROJECTION_PARAMETER_NAME)
                    .map(str::to_string)
                    .or_else(|| schema.get(index).cloned())
                    .unwrap_or_default();
                indexed.push((
                    index,
                    ProjectionParameter {
                        name,
                        value,
                        unit: doc.attribute(value_node, ATTRIB_UNIT).map(str::to_string),
                    },
                ));
            }
        }
        indexed.sort_by_key(|(i, _)| *i);

        let map_info_node = doc.find_child(hcs, TAG_MAP_INFO)?;
        let (map_info, map_unit) = decode_map_info(doc, map_info_node, product)?;
        Some(GeoCoding::MapProjection(MapGeoCoding {
            map_info,
            projection: MapProjection {
                name: doc
                    .child_text(projection_node, TAG_PROJECTION_NAME)
                    .unwrap_or(&method)
                    .to_string(),
                method,
                parameters: indexed.into_iter().map(|(_, p)| p).collect(),
                map_unit,
            },
            datum,
        }))
    }

    /// Product-wide fallbacks for documents without a usable Geoposition
    fn resolve_fallbacks(
        &self,
        doc: &Document,
        crs_elements: &[NodeId],
        datum: &Datum,
        product: &Product,
    ) -> Option<GeoCoding> {
        if crs_elements.len() == 1 {
            let crs = crs_elements[0];
            if doc.find_child(crs, TAG_HORIZONTAL_CS).is_some() {
                if let Some(gc) = self.decode_legacy_map(doc, crs, product) {
                    return Some(gc);
                }
            }
            if let Some(tpg) = doc.find_child(crs, TAG_GEOCODING_TIE_POINT_GRIDS) {
                if let Some(gc) = decode_tie_point(doc, tpg, datum, product) {
                    return Some(gc);
                }
            }
            if let Some(map) = doc.find_child(crs, TAG_GEOCODING_MAP) {
                if let Some(gc) = self.decode_old_map(doc, map, product) {
                    return Some(gc);
                }
            }
        }

        if let Some(gc) = tie_point_geocoding("latitude", "longitude", datum, product) {
            return Some(gc);
        }
        if product.band("latitude").is_some() && product.band("longitude").is_some() {
            return Some(GeoCoding::PixelLookup(PixelGeoCoding {
                lat_band: "latitude".to_string(),
                lon_band: "longitude".to_string(),
                valid_mask: None,
                search_radius: DEFAULT_SEARCH_RADIUS,
                estimator: None,
            }));
        }
        None
    }

    /// `Geocoding_Map/MAP_INFO` as comma-separated text:
    /// projection, ref x, ref y, easting, northing, pixel w, pixel h, datum,
    /// units[, scene width, scene height]
    fn decode_old_map(&self, doc: &Document, map: NodeId, product: &Product) -> Option<GeoCoding> {
        let text = doc.child_text(map, TAG_MAP_INFO)?;
        let tokens: Vec<&str> = text.split(',').map(str::trim).collect();
        if tokens.len() < 9 {
            log::warn!("Missing map-info parameters in Geocoding_Map");
            return None;
        }
        let method = tokens[0];
        let Some(schema) = self.registry.projection_parameters(method) else {
            log::warn!("Unknown map projection '{}'", method);
            return None;
        };
        let datum = self.registry.datum(tokens[7])?;
        if !datum.is_equivalent(&Datum::wgs84()) {
            log::warn!("Unsupported map datum '{}'", tokens[7]);
            return None;
        }
        let number = |i: usize| tokens[i].parse::<f64>().ok();
        let (scene_width, scene_height) = if tokens.len() >= 11 {
            (tokens[9].parse().ok()?, tokens[10].parse().ok()?)
        } else {
            (product.scene_width(), product.scene_height())
        };
        let map_info = MapInfo {
            pixel_x: number(1)?,
            pixel_y: number(2)?,
            easting: number(3)?,
            northing: number(4)?,
            pixel_size_x: number(5)?,
            pixel_size_y: number(6)?,
            scene_width,
            scene_height,
            ..MapInfo::default()
        };
        Some(GeoCoding::MapProjection(MapGeoCoding {
            map_info,
            projection: MapProjection {
                name: method.to_string(),
                method: method.to_string(),
                parameters: schema
                    .into_iter()
                    .map(|name| ProjectionParameter {
                        name,
                        value: 0.0,
                        unit: None,
                    })
                    .collect(),
                map_unit: tokens[8].trim_start_matches("units=").to_string(),
            },
            datum,
        }))
    }

    /// Datum described by a CRS element's Horizontal_Datum block
    fn decode_datum(&self, doc: &Document, crs: NodeId) -> Option<Datum> {
        let hd = doc.find_descendant(crs, TAG_HORIZONTAL_DATUM)?;
        let name = doc.child_text(hd, TAG_HORIZONTAL_DATUM_NAME)?;
        let ellipsoid = doc.find_child(hd, TAG_ELLIPSOID);
        let axes = ellipsoid
            .and_then(|e| doc.find_child(e, TAG_ELLIPSOID_PARAMETERS))
            .and_then(|p| {
                let major = doc.child_text(p, TAG_ELLIPSOID_MAJ_AXIS)?.parse::<f64>().ok()?;
                let minor = doc.child_text(p, TAG_ELLIPSOID_MIN_AXIS)?.parse::<f64>().ok()?;
                Some((major, minor))
            });
        match axes {
            Some((major, minor)) => {
                let ellipsoid_name = ellipsoid
                    .and_then(|e| doc.child_text(e, TAG_ELLIPSOID_NAME))
                    .unwrap_or(name);
                Some(Datum::new(name, ellipsoid_name, major, minor))
            }
            None => self.registry.datum(name),
        }
    }

    /// First datum found anywhere in the top-level CRS elements
    fn document_datum(&self, doc: &Document, root: NodeId) -> Datum {
        doc.find_children(root, TAG_COORDINATE_REFERENCE_SYSTEM)
            .into_iter()
            .find_map(|crs| self.decode_datum(doc, crs))
            .unwrap_or_default()
    }
}

/// Text of a subtree, used as cache key; band indices are excluded so that
/// identical descriptions for different bands share one instance
fn describe(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    for n in std::iter::once(node).chain(doc.descendants(node)) {
        if doc.name(n) == TAG_BAND_INDEX {
            continue;
        }
        out.push_str(doc.name(n));
        for (k, v) in doc.attributes(n) {
            out.push_str(&format!(" {}={}", k, v));
        }
        if let Some(text) = doc.text(n) {
            out.push('=');
            out.push_str(text.trim());
        }
        out.push(';');
    }
    out
}

fn parse_transform(text: &str) -> Option<AffineTransform> {
    let values: Result<Vec<f64>, _> = text.split(',').map(|v| v.trim().parse::<f64>()).collect();
    match values {
        Ok(values) if values.len() == 6 => AffineTransform::from_flat(&values),
        _ => None,
    }
}

/// Coefficients placed by their `index` attribute; elements without one
/// take their document position
fn read_coefficients(doc: &Document, list: NodeId, tag: &str) -> Option<Vec<f64>> {
    let nodes = doc.find_children(list, tag);
    let mut values: Vec<Option<f64>> = vec![None; nodes.len()];
    for (position, node) in nodes.into_iter().enumerate() {
        let index = doc
            .attribute(node, ATTRIB_INDEX)
            .and_then(|i| i.trim().parse::<usize>().ok())
            .unwrap_or(position);
        let Some(slot) = values.get_mut(index) else {
            log::warn!("Coefficient index {} out of range in <{}>", index, tag);
            return None;
        };
        if slot.is_some() {
            log::warn!("Duplicate coefficient index {} in <{}>", index, tag);
            return None;
        }
        *slot = Some(doc.text(node)?.trim().parse::<f64>().ok()?);
    }
    values.into_iter().collect()
}

fn read_model(doc: &Document, model: NodeId, first: (&str, &str), second: (&str, &str)) -> Option<(Polynomial, Polynomial)> {
    let order = doc
        .attribute(model, ATTRIB_ORDER)
        .and_then(|o| o.trim().parse::<u32>().ok())?;
    let a = read_coefficients(doc, doc.find_child(model, first.0)?, first.1)?;
    let b = read_coefficients(doc, doc.find_child(model, second.0)?, second.1)?;
    Some((Polynomial::new(order, a), Polynomial::new(order, b)))
}

fn decode_polynomial(doc: &Document, geopos: NodeId, datum: &Datum) -> Option<GeoCoding> {
    let insert_node = doc.find_child(geopos, TAG_GEOPOSITION_INSERT)?;
    let model = doc.find_child(geopos, TAG_SIMPLIFIED_LOCATION_MODEL)?;
    let number = |tag: &str| doc.child_text(insert_node, tag).and_then(|t| t.parse::<f64>().ok());
    let insert = GeopositionInsert {
        ul_x: number(TAG_ULX_MAP)?,
        ul_y: number(TAG_ULY_MAP)?,
        x_dim: number(TAG_X_DIM)?,
        y_dim: number(TAG_Y_DIM)?,
    };
    let direct = doc.find_child(model, TAG_DIRECT_LOCATION_MODEL)?;
    let reverse = doc.find_child(model, TAG_REVERSE_LOCATION_MODEL)?;
    let (lambda, phi) = read_model(doc, direct, (TAG_LC_LIST, TAG_LC), (TAG_PC_LIST, TAG_PC))?;
    let (x, y) = read_model(doc, reverse, (TAG_IC_LIST, TAG_IC), (TAG_JC_LIST, TAG_JC))?;
    Some(GeoCoding::Polynomial(PolynomialGeoCoding {
        insert,
        lambda,
        phi,
        x,
        y,
        datum: datum.clone(),
    }))
}

fn decode_tie_point(doc: &Document, points: NodeId, datum: &Datum, product: &Product) -> Option<GeoCoding> {
    let lat = doc.child_text(points, TAG_TIE_POINT_GRID_NAME_LAT)?;
    let lon = doc.child_text(points, TAG_TIE_POINT_GRID_NAME_LON)?;
    tie_point_geocoding(lat, lon, datum, product)
}

/// Tie-point geocoding over two loaded grids; the discontinuity is derived
/// from the longitude values rather than the CYCLIC flag
fn tie_point_geocoding(lat: &str, lon: &str, datum: &Datum, product: &Product) -> Option<GeoCoding> {
    let lat_grid = product.tie_point_grid(lat)?;
    let lon_grid = product.tie_point_grid(lon)?;
    let (Some(lat_data), Some(lon_data)) = (&lat_grid.data, &lon_grid.data) else {
        log::warn!("Tie-point grids '{}'/'{}' have no data loaded", lat, lon);
        return None;
    };
    let discontinuity = Discontinuity::derive(lon_data);
    if discontinuity != lon_grid.discontinuity {
        log::debug!(
            "Longitude grid '{}' discontinuity re-derived as {:?}",
            lon,
            discontinuity
        );
    }
    Some(GeoCoding::TiePoint(TiePointGeoCoding {
        lat_grid: lat.to_string(),
        lon_grid: lon.to_string(),
        datum: datum.clone(),
        discontinuity,
        sampling: Some(TiePointSampling {
            offset_x: lon_grid.offset_x,
            offset_y: lon_grid.offset_y,
            sub_sampling_x: lon_grid.sub_sampling_x,
            sub_sampling_y: lon_grid.sub_sampling_y,
            lat: Arc::clone(lat_data),
            lon: Arc::clone(lon_data),
        }),
    }))
}

/// MAP_INFO either as `value`-attributed children or as legacy
/// comma-separated text; returns the info and its map unit
fn decode_map_info(doc: &Document, node: NodeId, product: &Product) -> Option<(MapInfo, String)> {
    let text = doc.text(node).map(str::trim).unwrap_or("");
    if !text.is_empty() {
        let tokens: Vec<&str> = text.split(',').map(str::trim).collect();
        let offs = tokens.len() % 11;
        let number = |i: usize| tokens.get(i + offs).and_then(|t| t.parse::<f64>().ok());
        let info = MapInfo {
            pixel_x: number(1)?,
            pixel_y: number(2)?,
            easting: number(3)?,
            northing: number(4)?,
            pixel_size_x: number(5)?,
            pixel_size_y: number(6)?,
            scene_width: product.scene_width(),
            scene_height: product.scene_height(),
            ..MapInfo::default()
        };
        let unit = tokens.get(8 + offs)?.trim_start_matches("units=").to_string();
        return Some((info, unit));
    }

    let value = |tag: &str| {
        doc.find_child(node, tag)
            .and_then(|c| doc.attribute(c, ATTRIB_VALUE))
            .map(str::trim)
    };
    let number = |tag: &str| value(tag).and_then(|v| v.parse::<f64>().ok());
    let defaults = MapInfo::default();
    let info = MapInfo {
        pixel_x: number(TAG_MAP_INFO_PIXEL_X)?,
        pixel_y: number(TAG_MAP_INFO_PIXEL_Y)?,
        easting: number(TAG_MAP_INFO_EASTING)?,
        northing: number(TAG_MAP_INFO_NORTHING)?,
        orientation: number(TAG_MAP_INFO_ORIENTATION).unwrap_or(0.0),
        pixel_size_x: number(TAG_MAP_INFO_PIXELSIZE_X)?,
        pixel_size_y: number(TAG_MAP_INFO_PIXELSIZE_Y)?,
        no_data_value: number(TAG_MAP_INFO_NODATA_VALUE).unwrap_or(defaults.no_data_value),
        orthorectified: value(TAG_MAP_INFO_ORTHORECTIFIED) == Some("true"),
        elevation_model: value(TAG_MAP_INFO_ELEVATION_MODEL).map(str::to_string),
        scene_fitted: value(TAG_MAP_INFO_SCENE_FITTED) == Some("true"),
        scene_width: value(TAG_MAP_INFO_SCENE_WIDTH)
            .and_then(|v| v.parse().ok())
            .unwrap_or(product.scene_width()),
        scene_height: value(TAG_MAP_INFO_SCENE_HEIGHT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(product.scene_height()),
        resampling: value(TAG_MAP_INFO_RESAMPLING)
            .map(str::to_string)
            .unwrap_or(defaults.resampling.clone()),
    };
    let unit = value(TAG_MAP_INFO_MAPUNIT).unwrap_or("meter").to_string();
    Some((info, unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geocoding::Placemark;
    use crate::core::product::{Band, TiePointGrid};
    use crate::core::registry::DefaultRegistry;
    use crate::types::DataType;
    use ndarray::array;

    const WKT: &str = "GEOGCS[\"WGS84(DD)\", DATUM[\"WGS84\", SPHEROID[\"WGS84\", 6378137.0, 298.257223563]]]";

    fn product_with_grids() -> Product {
        let mut p = Product::new("p", "T", 20, 20);
        p.add_band(Band::new("b1", DataType::Float32, 20, 20)).unwrap();
        p.add_band(Band::new("b2", DataType::Float32, 20, 20)).unwrap();
        let lat = TiePointGrid::new("latitude", 2, 2, 0.5, 0.5, 19.0, 19.0)
            .with_data(array![[50.0f32, 50.0], [49.0, 49.0]])
            .unwrap();
        let lon = TiePointGrid::new("longitude", 2, 2, 0.5, 0.5, 19.0, 19.0)
            .with_data(array![[10.0f32, 11.0], [10.0, 11.0]])
            .unwrap();
        p.add_tie_point_grid(lat).unwrap();
        p.add_tie_point_grid(lon).unwrap();
        p
    }

    fn parse(xml: &str) -> (Document, NodeId) {
        let doc = Document::parse_str(xml).unwrap();
        let root = doc.root().unwrap();
        (doc, root)
    }

    #[test]
    fn test_crs_takes_priority_over_tie_points() {
        let xml = format!(
            "<Dimap_Document>\
               <Coordinate_Reference_System><WKT>{}</WKT></Coordinate_Reference_System>\
               <Geoposition>\
                 <IMAGE_TO_MODEL_TRANSFORM>0.1,0.0,0.0,-0.1,10.0,50.0</IMAGE_TO_MODEL_TRANSFORM>\
                 <Geoposition_Points>\
                   <TIE_POINT_GRID_NAME_LAT>latitude</TIE_POINT_GRID_NAME_LAT>\
                   <TIE_POINT_GRID_NAME_LON>longitude</TIE_POINT_GRID_NAME_LON>\
                 </Geoposition_Points>\
               </Geoposition>\
             </Dimap_Document>",
            WKT
        );
        let (doc, root) = parse(&xml);
        let registry = DefaultRegistry;
        match GeocodingResolver::new(&registry).resolve(&doc, root, &product_with_grids()) {
            ResolvedGeocoding::Product(gc) => assert!(matches!(*gc, GeoCoding::Crs(_))),
            other => panic!("expected product-wide CRS geocoding, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_transform_falls_through_to_tie_points() {
        let xml = format!(
            "<Dimap_Document>\
               <Coordinate_Reference_System><WKT>{}</WKT></Coordinate_Reference_System>\
               <Geoposition>\
                 <IMAGE_TO_MODEL_TRANSFORM>1.0,2.0,2.0,4.0,0.0,0.0</IMAGE_TO_MODEL_TRANSFORM>\
                 <Geoposition_Points>\
                   <TIE_POINT_GRID_NAME_LAT>latitude</TIE_POINT_GRID_NAME_LAT>\
                   <TIE_POINT_GRID_NAME_LON>longitude</TIE_POINT_GRID_NAME_LON>\
                 </Geoposition_Points>\
               </Geoposition>\
             </Dimap_Document>",
            WKT
        );
        let (doc, root) = parse(&xml);
        let registry = DefaultRegistry;
        match GeocodingResolver::new(&registry).resolve(&doc, root, &product_with_grids()) {
            ResolvedGeocoding::Product(gc) => assert!(matches!(*gc, GeoCoding::TiePoint(_))),
            other => panic!("expected tie-point geocoding, got {:?}", other),
        }
    }

    #[test]
    fn test_identical_band_descriptions_share_instance() {
        let xml = format!(
            "<Dimap_Document>\
               <Coordinate_Reference_System><WKT>{wkt}</WKT></Coordinate_Reference_System>\
               <Geoposition><BAND_INDEX>0</BAND_INDEX>\
                 <IMAGE_TO_MODEL_TRANSFORM>1,0,0,-1,5,5</IMAGE_TO_MODEL_TRANSFORM></Geoposition>\
               <Coordinate_Reference_System><WKT>{wkt}</WKT></Coordinate_Reference_System>\
               <Geoposition><BAND_INDEX>1</BAND_INDEX>\
                 <IMAGE_TO_MODEL_TRANSFORM>1,0,0,-1,5,5</IMAGE_TO_MODEL_TRANSFORM></Geoposition>\
             </Dimap_Document>",
            wkt = WKT
        );
        let (doc, root) = parse(&xml);
        let registry = DefaultRegistry;
        match GeocodingResolver::new(&registry).resolve(&doc, root, &product_with_grids()) {
            ResolvedGeocoding::PerBand(list) => {
                assert_eq!(list.len(), 2);
                assert!(Arc::ptr_eq(&list[0].1, &list[1].1));
            }
            other => panic!("expected per-band geocodings, got {:?}", other),
        }
    }

    #[test]
    fn test_shuffled_coefficient_indices() {
        let model = |lc: &str| {
            format!(
                "<Dimap_Document><Geoposition>\
                   <Geoposition_Insert><ULXMAP>0</ULXMAP><ULYMAP>0</ULYMAP><XDIM>1</XDIM><YDIM>1</YDIM></Geoposition_Insert>\
                   <Simplified_Location_Model>\
                     <Direct_Location_Model order=\"1\">\
                       <lc_List>{}</lc_List>\
                       <pc_List><pc index=\"0\">50</pc><pc index=\"1\">0</pc><pc index=\"2\">-0.1</pc></pc_List>\
                     </Direct_Location_Model>\
                     <Reverse_Location_Model order=\"1\">\
                       <ic_List><ic index=\"0\">-100</ic><ic index=\"1\">10</ic><ic index=\"2\">0</ic></ic_List>\
                       <jc_List><jc index=\"0\">500</jc><jc index=\"1\">0</jc><jc index=\"2\">-10</jc></jc_List>\
                     </Reverse_Location_Model>\
                   </Simplified_Location_Model>\
                 </Geoposition></Dimap_Document>",
                lc
            )
        };
        let canonical = model("<lc index=\"0\">10</lc><lc index=\"1\">0.1</lc><lc index=\"2\">0</lc>");
        let shuffled = model("<lc index=\"2\">0</lc><lc index=\"0\">10</lc><lc index=\"1\">0.1</lc>");

        let registry = DefaultRegistry;
        let resolver = GeocodingResolver::new(&registry);
        let product = product_with_grids();
        let decode = |xml: &str| {
            let (doc, root) = parse(xml);
            match resolver.resolve(&doc, root, &product) {
                ResolvedGeocoding::Product(gc) => gc,
                other => panic!("expected polynomial geocoding, got {:?}", other),
            }
        };
        let a = decode(&canonical);
        let b = decode(&shuffled);
        assert!(a.is_equivalent(&b));
        match &*b {
            GeoCoding::Polynomial(p) => assert_eq!(p.lambda.coefficients, vec![10.0, 0.1, 0.0]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_failed_gcp_yields_original() {
        let xml = format!(
            "<Dimap_Document>\
               <Coordinate_Reference_System><Horizontal_CS><HORIZONTAL_CS_TYPE>GEOGRAPHIC</HORIZONTAL_CS_TYPE></Horizontal_CS></Coordinate_Reference_System>\
               <Geoposition><Geoposition_Points>\
                 <INTERPOLATION_METHOD>POLYNOMIAL2</INTERPOLATION_METHOD>\
                 <Original_Geocoding>\
                   <Coordinate_Reference_System><WKT>{}</WKT></Coordinate_Reference_System>\
                   <Geoposition><IMAGE_TO_MODEL_TRANSFORM>1,0,0,-1,0,0</IMAGE_TO_MODEL_TRANSFORM></Geoposition>\
                 </Original_Geocoding>\
               </Geoposition_Points></Geoposition>\
             </Dimap_Document>",
            WKT
        );
        let (doc, root) = parse(&xml);
        let mut product = product_with_grids();
        // three collinear points cannot support a second-order model
        product.gcps = vec![
            Placemark::new("g1", 0.0, 0.0, 50.0, 10.0),
            Placemark::new("g2", 1.0, 1.0, 49.9, 10.1),
            Placemark::new("g3", 2.0, 2.0, 49.8, 10.2),
        ];
        let registry = DefaultRegistry;
        match GeocodingResolver::new(&registry).resolve(&doc, root, &product) {
            ResolvedGeocoding::Product(gc) => assert!(matches!(*gc, GeoCoding::Crs(_))),
            other => panic!("expected the original CRS geocoding, got {:?}", other),
        }
    }

    #[test]
    fn test_latitude_longitude_grid_fallback() {
        let (doc, root) = parse("<Dimap_Document><Raster_Dimensions/></Dimap_Document>");
        let registry = DefaultRegistry;
        match GeocodingResolver::new(&registry).resolve(&doc, root, &product_with_grids()) {
            ResolvedGeocoding::Product(gc) => {
                let pos = gc.pixel_to_geo(0.5, 0.5).unwrap();
                assert!((pos.lat - 50.0).abs() < 1e-6);
                assert!((pos.lon - 10.0).abs() < 1e-6);
            }
            other => panic!("expected tie-point fallback, got {:?}", other),
        }

        let empty = Product::new("p", "T", 4, 4);
        assert!(GeocodingResolver::new(&registry).resolve(&doc, root, &empty).is_none());
    }

    #[test]
    fn test_coefficients_by_index() {
        let (doc, root) = parse(
            "<lc_List><lc index=\"2\">NaN</lc><lc index=\"0\">5.0</lc><lc index=\"1\">0.5</lc></lc_List>",
        );
        let values = read_coefficients(&doc, root, "lc").unwrap();
        assert_eq!(values[..2], [5.0, 0.5]);
        assert!(values[2].is_nan());

        let (doc, root) = parse("<lc_List><lc index=\"0\">1.0</lc><lc index=\"0\">2.0</lc></lc_List>");
        assert!(read_coefficients(&doc, root, "lc").is_none());
        let (doc, root) = parse("<lc_List><lc index=\"3\">1.0</lc></lc_List>");
        assert!(read_coefficients(&doc, root, "lc").is_none());
    }
}
