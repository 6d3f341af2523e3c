//! In-memory product graph: bands, tie-point grids, masks, sample codings,
//! metadata and geocodings

use crate::core::geocoding::{AffineTransform, Discontinuity, GeoCoding, Placemark};
use crate::core::metadata::MetadataElement;
use crate::types::{Color, DataType, DimapError, DimapResult, RasterNodeId};
use chrono::NaiveDateTime;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleCodingKind {
    Flag,
    Index,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingEntry {
    pub name: String,
    pub value: i32,
    pub description: String,
}

/// Named flag or index enumeration referenced by integer bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleCoding {
    pub name: String,
    pub kind: SampleCodingKind,
    pub entries: Vec<CodingEntry>,
}

impl SampleCoding {
    pub fn new(name: &str, kind: SampleCodingKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            entries: Vec::new(),
        }
    }

    pub fn add_entry(&mut self, name: &str, value: i32, description: &str) {
        self.entries.push(CodingEntry {
            name: name.to_string(),
            value,
            description: description.to_string(),
        });
    }

    pub fn entry(&self, name: &str) -> Option<&CodingEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaskKind {
    /// Band-maths predicate
    Maths { expression: String },
    /// `minimum <= raster <= maximum`
    Range {
        raster: String,
        minimum: f64,
        maximum: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    pub name: String,
    pub description: String,
    pub color: Color,
    pub transparency: f64,
    pub width: usize,
    pub height: usize,
    pub kind: MaskKind,
}

impl Mask {
    pub fn maths(name: &str, expression: &str, width: usize, height: usize) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            color: Color::RED,
            transparency: 0.5,
            width,
            height,
            kind: MaskKind::Maths {
                expression: expression.to_string(),
            },
        }
    }

    /// Expression-like text of the mask, used for compatibility checks
    pub fn expression(&self) -> String {
        match &self.kind {
            MaskKind::Maths { expression } => expression.clone(),
            MaskKind::Range { raster, .. } => raster.clone(),
        }
    }
}

/// Neighbourhood kernel of a filter band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    pub width: usize,
    pub height: usize,
    pub x_origin: usize,
    pub y_origin: usize,
    pub factor: f64,
    pub data: Vec<f64>,
}

impl Kernel {
    /// Square all-ones structuring element with a centred origin
    pub fn square(size: usize) -> Self {
        Self {
            width: size,
            height: size,
            x_origin: size / 2,
            y_origin: size / 2,
            factor: 1.0,
            data: vec![1.0; size * size],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterOperation {
    /// Statistical operator (MEAN, MEDIAN, MIN, MAX, ...) over a structuring element
    General { op_type: String, kernel: Kernel },
    Convolution { kernel: Kernel },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterBandInfo {
    pub source: String,
    pub operation: FilterOperation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BandKind {
    Stored,
    Virtual { expression: String },
    Filter(FilterBandInfo),
}

/// Where a raster node's binary payload lives
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SidecarState {
    #[default]
    Unbound,
    Bound(PathBuf),
    /// Declared but missing, unreadable or too short
    Unreadable(PathBuf),
}

impl SidecarState {
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            SidecarState::Unbound => None,
            SidecarState::Bound(p) | SidecarState::Unreadable(p) => Some(p),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stx {
    pub minimum: f64,
    pub maximum: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub resolution_level: i32,
    pub histogram: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PalettePoint {
    pub sample: f64,
    pub label: Option<String>,
    pub color: Color,
}

/// Display settings of a band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub palette: Vec<PalettePoint>,
    pub no_data_color: Option<Color>,
    pub histogram_matching: String,
}

impl Default for ImageInfo {
    fn default() -> Self {
        Self {
            palette: Vec::new(),
            no_data_color: None,
            histogram_matching: "None".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectralInfo {
    pub wavelength: f64,
    pub bandwidth: f64,
    pub solar_flux: f64,
    pub spectral_band_index: Option<i32>,
}

/// A band raster node
#[derive(Debug, Clone)]
pub struct Band {
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub data_type: DataType,
    pub width: usize,
    pub height: usize,
    pub scaling_factor: f64,
    pub scaling_offset: f64,
    pub log10_scaled: bool,
    pub no_data_value_used: bool,
    pub no_data_value: f64,
    pub valid_pixel_expression: Option<String>,
    /// Name of a flag or index coding owned by the product
    pub sample_coding: Option<String>,
    pub geocoding: Option<Arc<GeoCoding>>,
    pub kind: BandKind,
    pub spectral: SpectralInfo,
    pub image_info: Option<ImageInfo>,
    pub stx: Option<Stx>,
    pub overlay_masks: Vec<String>,
    pub ancillary_variables: Vec<String>,
    pub ancillary_relations: Vec<String>,
    pub image_to_model: Option<AffineTransform>,
    pub modified: bool,
    /// Generated by the reader rather than stored in the product
    pub synthetic: bool,
    pub sidecar: SidecarState,
}

impl Band {
    pub fn new(name: &str, data_type: DataType, width: usize, height: usize) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            unit: None,
            data_type,
            width,
            height,
            scaling_factor: 1.0,
            scaling_offset: 0.0,
            log10_scaled: false,
            no_data_value_used: false,
            no_data_value: 0.0,
            valid_pixel_expression: None,
            sample_coding: None,
            geocoding: None,
            kind: BandKind::Stored,
            spectral: SpectralInfo::default(),
            image_info: None,
            stx: None,
            overlay_masks: Vec::new(),
            ancillary_variables: Vec::new(),
            ancillary_relations: Vec::new(),
            image_to_model: None,
            modified: true,
            synthetic: false,
            sidecar: SidecarState::Unbound,
        }
    }

    pub fn virtual_band(name: &str, data_type: DataType, width: usize, height: usize, expression: &str) -> Self {
        let mut band = Self::new(name, data_type, width, height);
        band.kind = BandKind::Virtual {
            expression: expression.to_string(),
        };
        band
    }

    pub fn filter_band(name: &str, width: usize, height: usize, info: FilterBandInfo) -> Self {
        let mut band = Self::new(name, DataType::Float32, width, height);
        band.no_data_value_used = true;
        band.no_data_value = f64::NAN;
        band.kind = BandKind::Filter(info);
        band
    }

    /// Has a binary payload of its own
    pub fn is_stored(&self) -> bool {
        matches!(self.kind, BandKind::Stored)
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, BandKind::Virtual { .. })
    }

    pub fn is_filter(&self) -> bool {
        matches!(self.kind, BandKind::Filter(_))
    }

    pub fn expression(&self) -> Option<&str> {
        match &self.kind {
            BandKind::Virtual { expression } => Some(expression),
            _ => None,
        }
    }

    /// Convert a raw sample to its geophysical value
    pub fn scale(&self, raw: f64) -> f64 {
        let v = raw * self.scaling_factor + self.scaling_offset;
        if self.log10_scaled {
            10f64.powf(v)
        } else {
            v
        }
    }

    pub fn is_scaled(&self) -> bool {
        self.scaling_factor != 1.0 || self.scaling_offset != 0.0 || self.log10_scaled
    }
}

/// Coarse raster sampled on a regular sub-grid of the scene
#[derive(Debug, Clone)]
pub struct TiePointGrid {
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub data_type: DataType,
    pub grid_width: usize,
    pub grid_height: usize,
    pub offset_x: f64,
    pub offset_y: f64,
    pub sub_sampling_x: f64,
    pub sub_sampling_y: f64,
    pub discontinuity: Discontinuity,
    /// Grid values, `grid_height` rows by `grid_width` columns
    pub data: Option<Arc<Array2<f32>>>,
    pub overlay_masks: Vec<String>,
    pub modified: bool,
    pub sidecar: SidecarState,
}

impl TiePointGrid {
    pub fn new(
        name: &str,
        grid_width: usize,
        grid_height: usize,
        offset_x: f64,
        offset_y: f64,
        sub_sampling_x: f64,
        sub_sampling_y: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            unit: None,
            data_type: DataType::Float32,
            grid_width,
            grid_height,
            offset_x,
            offset_y,
            sub_sampling_x,
            sub_sampling_y,
            discontinuity: Discontinuity::None,
            data: None,
            overlay_masks: Vec::new(),
            modified: true,
            sidecar: SidecarState::Unbound,
        }
    }

    /// Attach grid values; the shape must match the grid dimensions
    pub fn with_data(mut self, data: Array2<f32>) -> DimapResult<Self> {
        self.set_data(data)?;
        Ok(self)
    }

    pub fn set_data(&mut self, data: Array2<f32>) -> DimapResult<()> {
        if data.dim() != (self.grid_height, self.grid_width) {
            return Err(DimapError::Format(format!(
                "tie-point grid '{}' expects {}x{} values, got {}x{}",
                self.name,
                self.grid_width,
                self.grid_height,
                data.ncols(),
                data.nrows()
            )));
        }
        self.data = Some(Arc::new(data));
        self.modified = true;
        Ok(())
    }

    pub fn is_cyclic(&self) -> bool {
        self.discontinuity != Discontinuity::None
    }
}

/// Geo-referenced raster data product
#[derive(Debug, Clone)]
pub struct Product {
    pub name: String,
    pub product_type: String,
    pub description: Option<String>,
    scene_width: usize,
    scene_height: usize,
    pub start_time: Option<NaiveDateTime>,
    pub stop_time: Option<NaiveDateTime>,
    pub auto_grouping: Option<String>,
    pub quicklook_band: Option<String>,
    pub producer: Option<String>,
    bands: Vec<Band>,
    tie_point_grids: Vec<TiePointGrid>,
    masks: Vec<Mask>,
    sample_codings: Vec<SampleCoding>,
    pub metadata: MetadataElement,
    pub scene_geocoding: Option<Arc<GeoCoding>>,
    pub gcps: Vec<Placemark>,
    /// File names of vector layers under `vector_data/`
    pub vector_data: Vec<String>,
    pending_removals: Vec<RasterNodeId>,
    pub file_location: Option<PathBuf>,
}

impl Product {
    pub fn new(name: &str, product_type: &str, scene_width: usize, scene_height: usize) -> Self {
        Self {
            name: name.to_string(),
            product_type: product_type.to_string(),
            description: None,
            scene_width,
            scene_height,
            start_time: None,
            stop_time: None,
            auto_grouping: None,
            quicklook_band: None,
            producer: None,
            bands: Vec::new(),
            tie_point_grids: Vec::new(),
            masks: Vec::new(),
            sample_codings: Vec::new(),
            metadata: MetadataElement::new("metadata"),
            scene_geocoding: None,
            gcps: Vec::new(),
            vector_data: Vec::new(),
            pending_removals: Vec::new(),
            file_location: None,
        }
    }

    pub fn scene_width(&self) -> usize {
        self.scene_width
    }

    pub fn scene_height(&self) -> usize {
        self.scene_height
    }

    /// Whether `name` is taken by a band or tie-point grid
    pub fn contains_raster(&self, name: &str) -> bool {
        self.band(name).is_some() || self.tie_point_grid(name).is_some()
    }

    fn check_unique(&self, name: &str) -> DimapResult<()> {
        if name.trim().is_empty() {
            return Err(DimapError::Format("raster node name must not be empty".to_string()));
        }
        if self.contains_raster(name) {
            return Err(DimapError::Format(format!(
                "product '{}' already contains a raster named '{}'",
                self.name, name
            )));
        }
        Ok(())
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn bands_mut(&mut self) -> &mut [Band] {
        &mut self.bands
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn band_mut(&mut self, name: &str) -> Option<&mut Band> {
        self.bands.iter_mut().find(|b| b.name == name)
    }

    pub fn band_index(&self, name: &str) -> Option<usize> {
        self.bands.iter().position(|b| b.name == name)
    }

    pub fn add_band(&mut self, band: Band) -> DimapResult<()> {
        self.check_unique(&band.name)?;
        self.bands.push(band);
        Ok(())
    }

    /// Remove a band; its sidecar files are deleted on the next write
    pub fn remove_band(&mut self, name: &str) -> Option<Band> {
        let index = self.band_index(name)?;
        let band = self.bands.remove(index);
        if band.is_stored() {
            self.pending_removals.push(RasterNodeId::Band(band.name.clone()));
        }
        Some(band)
    }

    pub fn tie_point_grids(&self) -> &[TiePointGrid] {
        &self.tie_point_grids
    }

    pub fn tie_point_grid(&self, name: &str) -> Option<&TiePointGrid> {
        self.tie_point_grids.iter().find(|g| g.name == name)
    }

    pub fn tie_point_grid_mut(&mut self, name: &str) -> Option<&mut TiePointGrid> {
        self.tie_point_grids.iter_mut().find(|g| g.name == name)
    }

    pub fn tie_point_grids_mut(&mut self) -> &mut [TiePointGrid] {
        &mut self.tie_point_grids
    }

    pub fn tie_point_grid_index(&self, name: &str) -> Option<usize> {
        self.tie_point_grids.iter().position(|g| g.name == name)
    }

    pub fn add_tie_point_grid(&mut self, grid: TiePointGrid) -> DimapResult<()> {
        self.check_unique(&grid.name)?;
        self.tie_point_grids.push(grid);
        Ok(())
    }

    pub fn remove_tie_point_grid(&mut self, name: &str) -> Option<TiePointGrid> {
        let index = self.tie_point_grid_index(name)?;
        let grid = self.tie_point_grids.remove(index);
        self.pending_removals
            .push(RasterNodeId::TiePointGrid(grid.name.clone()));
        Some(grid)
    }

    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    pub fn mask(&self, name: &str) -> Option<&Mask> {
        self.masks.iter().find(|m| m.name == name)
    }

    pub fn add_mask(&mut self, mask: Mask) -> DimapResult<()> {
        if self.mask(&mask.name).is_some() {
            return Err(DimapError::Format(format!("duplicate mask '{}'", mask.name)));
        }
        self.masks.push(mask);
        Ok(())
    }

    pub fn remove_mask(&mut self, name: &str) -> Option<Mask> {
        let index = self.masks.iter().position(|m| m.name == name)?;
        Some(self.masks.remove(index))
    }

    pub fn sample_codings(&self) -> &[SampleCoding] {
        &self.sample_codings
    }

    pub fn sample_coding(&self, name: &str) -> Option<&SampleCoding> {
        self.sample_codings.iter().find(|c| c.name == name)
    }

    pub fn add_sample_coding(&mut self, coding: SampleCoding) -> DimapResult<()> {
        if self.sample_coding(&coding.name).is_some() {
            return Err(DimapError::Format(format!(
                "duplicate sample coding '{}'",
                coding.name
            )));
        }
        self.sample_codings.push(coding);
        Ok(())
    }

    /// Set one geocoding for the whole product and every band
    pub fn set_scene_geocoding(&mut self, geocoding: Arc<GeoCoding>) {
        for band in &mut self.bands {
            band.geocoding = Some(Arc::clone(&geocoding));
        }
        self.scene_geocoding = Some(geocoding);
    }

    /// True unless some band carries a geocoding that differs from the
    /// scene geocoding
    pub fn is_using_single_geocoding(&self) -> bool {
        let scene = self.scene_geocoding.as_ref();
        self.bands.iter().all(|b| match (&b.geocoding, scene) {
            (None, _) => true,
            (Some(gc), Some(scene)) => Arc::ptr_eq(gc, scene) || gc.is_equivalent(scene),
            (Some(_), None) => false,
        })
    }

    /// Raster nodes removed since the last write
    pub fn pending_removals(&self) -> &[RasterNodeId] {
        &self.pending_removals
    }

    pub fn clear_pending_removals(&mut self) {
        self.pending_removals.clear();
    }

    /// Clear the modified flag of every raster node
    pub fn mark_saved(&mut self) {
        for band in &mut self.bands {
            band.modified = false;
        }
        for grid in &mut self.tie_point_grids {
            grid.modified = false;
        }
    }

    pub fn sidecar_state(&self, id: &RasterNodeId) -> Option<&SidecarState> {
        match id {
            RasterNodeId::Band(name) => self.band(name).map(|b| &b.sidecar),
            RasterNodeId::TiePointGrid(name) => self.tie_point_grid(name).map(|g| &g.sidecar),
        }
    }

    pub fn set_sidecar_state(&mut self, id: &RasterNodeId, state: SidecarState) {
        match id {
            RasterNodeId::Band(name) => {
                if let Some(b) = self.band_mut(name) {
                    b.sidecar = state;
                }
            }
            RasterNodeId::TiePointGrid(name) => {
                if let Some(g) = self.tie_point_grid_mut(name) {
                    g.sidecar = state;
                }
            }
        }
    }

    /// Check that an expression only references rasters and masks of this
    /// product; the error is a human-readable message
    pub fn check_expression(&self, expression: &str) -> Result<(), String> {
        crate::core::expression::check_symbols(expression, |name| {
            self.contains_raster(name) || self.mask(name).is_some()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn sample_product() -> Product {
        let mut product = Product::new("test", "MER_RR__2P", 20, 30);
        product
            .add_band(Band::new("b1", DataType::Int16, 20, 30))
            .unwrap();
        product
            .add_band(Band::virtual_band("vb1", DataType::Float32, 20, 30, "b1 * 0.4 + 1"))
            .unwrap();
        product
    }

    #[test]
    fn test_raster_names_are_unique() {
        let mut product = sample_product();
        assert!(matches!(
            product.add_band(Band::new("b1", DataType::UInt8, 20, 30)),
            Err(DimapError::Format(_))
        ));
        let grid = TiePointGrid::new("b1", 3, 4, 0.5, 0.5, 10.0, 10.0);
        assert!(product.add_tie_point_grid(grid).is_err());
        assert_eq!(product.bands().len(), 2);
    }

    #[test]
    fn test_remove_schedules_sidecar_cleanup() {
        let mut product = sample_product();
        product.remove_band("vb1").unwrap();
        assert!(product.pending_removals().is_empty());

        product.remove_band("b1").unwrap();
        assert_eq!(product.pending_removals(), &[RasterNodeId::Band("b1".to_string())]);
        assert!(product.remove_band("b1").is_none());
    }

    #[test]
    fn test_tie_point_data_shape_checked() {
        let grid = TiePointGrid::new("lat", 3, 2, 0.5, 0.5, 10.0, 10.0);
        assert!(grid.clone().with_data(Array2::zeros((2, 3))).is_ok());
        assert!(grid.with_data(Array2::zeros((3, 2))).is_err());
    }

    #[test]
    fn test_band_scaling() {
        let mut band = Band::new("b", DataType::UInt16, 1, 1);
        assert!(!band.is_scaled());
        band.scaling_factor = 0.5;
        band.scaling_offset = 1.0;
        assert_eq!(band.scale(4.0), 3.0);
        band.log10_scaled = true;
        assert!((band.scale(0.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_expression_check_uses_product_names() {
        let product = sample_product();
        assert!(product.check_expression("b1 > 0 && vb1 < 5").is_ok());
        let err = product.check_expression("b7 * 2").unwrap_err();
        assert!(err.contains("b7"));
    }
}
