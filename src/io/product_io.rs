//! Reading and writing DIMAP products on disk: the `.dim` header plus the
//! `.data` sidecar directory.

use crate::core::geocoding::Discontinuity;
use crate::core::product::{Product, SidecarState};
use crate::core::progress::ProgressMonitor;
use crate::core::registry::{DefaultRegistry, ReferenceSystemRegistry};
use crate::io::band_binder::BandFileBinder;
use crate::io::constants::*;
use crate::io::document::Document;
use crate::io::envi_header::EnviHeader;
use crate::io::header_parser::ProductBuilder;
use crate::io::header_writer::{
    band_file_base, tie_point_grid_file_base, HeaderWriter, SidecarLayout,
};
use crate::io::raster_io::{NodeLayout, RasterBuffer, RasterIo};
use crate::io::vector_data::{list_vector_data, prune_vector_data};
use crate::io::write_planner::{IncrementalWritePlanner, NodeWriteState};
use crate::types::{Diagnostic, DimapError, DimapResult, RasterNodeId};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;

/// Reader configuration
#[derive(Clone)]
pub struct ReaderConfig {
    pub registry: Arc<dyn ReferenceSystemRegistry>,
    /// Load tie-point grid payloads; tie-point geocodings need them
    pub load_tie_point_grids: bool,
    /// Drop virtual bands, masks and valid-pixel expressions that reference
    /// unknown rasters
    pub check_expressions: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            registry: Arc::new(DefaultRegistry),
            load_tie_point_grids: true,
            check_expressions: true,
        }
    }
}

impl std::fmt::Debug for ReaderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderConfig")
            .field("load_tie_point_grids", &self.load_tie_point_grids)
            .field("check_expressions", &self.check_expressions)
            .finish_non_exhaustive()
    }
}

/// Writer configuration
#[derive(Clone)]
pub struct WriterConfig {
    pub registry: Arc<dyn ReferenceSystemRegistry>,
    /// Skip payloads of unmodified nodes whose sidecar already exists
    pub incremental: bool,
    pub write_envi_headers: bool,
    /// Write independent payloads on the rayon pool
    pub parallel: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            registry: Arc::new(DefaultRegistry),
            incremental: true,
            write_envi_headers: true,
            parallel: cfg!(feature = "parallel"),
        }
    }
}

impl std::fmt::Debug for WriterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterConfig")
            .field("incremental", &self.incremental)
            .field("write_envi_headers", &self.write_envi_headers)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

/// `scene.dim` -> (`scene`, `<dir>/scene.data`)
fn product_paths(header_path: &Path) -> DimapResult<(String, PathBuf, PathBuf)> {
    let stem = header_path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            DimapError::Format(format!("invalid product path {}", header_path.display()))
        })?
        .to_string();
    let base_dir = header_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let data_dir = base_dir.join(format!("{}{}", stem, DATA_DIRECTORY_EXTENSION));
    Ok((stem, base_dir, data_dir))
}

fn with_extension(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension.trim_start_matches('.'))
}

/// What one call to [`DimapProductWriter::write`] produced
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    pub header_path: PathBuf,
    pub layout: SidecarLayout,
    /// Nodes whose payload file was (re)allocated or written
    pub written: Vec<RasterNodeId>,
    /// Stored bands left untouched by an incremental write
    pub skipped: Vec<RasterNodeId>,
    pub removed_files: usize,
}

/// Writes a product as header plus sidecars. Band payloads are supplied
/// after [`write`](Self::write) through the region methods, which address
/// the sidecars allocated by the last write.
#[derive(Debug)]
pub struct DimapProductWriter {
    config: WriterConfig,
    raster_io: RasterIo,
}

impl DimapProductWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config,
            raster_io: RasterIo::writable(),
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Write the header of `product` to `path` (a `.dim` file) and prepare
    /// its sidecar directory. The header only replaces an existing one once
    /// every sidecar step succeeded.
    pub fn write(
        &mut self,
        product: &mut Product,
        path: &Path,
        monitor: &ProgressMonitor,
    ) -> DimapResult<WriteOutcome> {
        let start = Instant::now();
        let header_path = with_extension(path, HEADER_FILE_EXTENSION);
        let (stem, base_dir, data_dir) = product_paths(&header_path)?;
        let data_dir_name = format!("{}{}", stem, DATA_DIRECTORY_EXTENSION);
        log::info!(
            "Writing product '{}' to {} (incremental: {})",
            product.name,
            header_path.display(),
            self.config.incremental
        );

        let (doc, layout) =
            HeaderWriter::new(self.config.registry.as_ref()).write(product, &data_dir_name, monitor)?;
        std::fs::create_dir_all(&base_dir)?;
        let staged = stage_header(&doc, &header_path)?;

        std::fs::create_dir_all(&data_dir)?;
        std::fs::create_dir_all(data_dir.join(TIE_POINT_GRID_DIR_NAME))?;

        let mut outcome = WriteOutcome {
            header_path: header_path.clone(),
            ..WriteOutcome::default()
        };

        // Register every sidecar; decide which ones to (re)allocate
        let planner = IncrementalWritePlanner::new(self.config.incremental);
        self.raster_io = RasterIo::writable();
        let mut grids = Vec::new();
        for entry in &layout.entries {
            let sidecar = base_dir.join(&entry.path);
            match &entry.node {
                RasterNodeId::Band(name) => {
                    let Some(band) = product.band(name) else { continue };
                    if self.config.write_envi_headers {
                        EnviHeader::for_band(band)
                            .write_to(&with_extension(&sidecar, ENVI_HEADER_EXTENSION))?;
                    }
                    let state = NodeWriteState::of_band(band, &sidecar);
                    self.raster_io.register(
                        entry.node.clone(),
                        NodeLayout {
                            width: band.width,
                            height: band.height,
                            data_type: band.data_type,
                            sidecar: SidecarState::Bound(sidecar.clone()),
                        },
                    );
                    if planner.should_write(&state) {
                        outcome.written.push(entry.node.clone());
                    } else {
                        log::debug!("Band '{}' is up to date, skipping payload", name);
                        outcome.skipped.push(entry.node.clone());
                    }
                }
                RasterNodeId::TiePointGrid(name) => {
                    let Some(grid) = product.tie_point_grid(name) else { continue };
                    if self.config.write_envi_headers {
                        EnviHeader::for_tie_point_grid(grid)
                            .write_to(&with_extension(&sidecar, ENVI_HEADER_EXTENSION))?;
                    }
                    let state = NodeWriteState::of_tie_point_grid(grid, &sidecar);
                    self.raster_io.register(
                        entry.node.clone(),
                        NodeLayout {
                            width: grid.grid_width,
                            height: grid.grid_height,
                            data_type: grid.data_type,
                            sidecar: SidecarState::Bound(sidecar.clone()),
                        },
                    );
                    if planner.always_rewrite_tie_point_grids() || planner.should_write(&state) {
                        let values = grid
                            .data
                            .as_ref()
                            .map(|d| d.iter().map(|v| *v as f64).collect::<Vec<_>>());
                        if values.is_none() {
                            log::warn!("Tie-point grid '{}' has no data, writing zeros", name);
                        }
                        grids.push((entry.node.clone(), grid.data_type, values));
                        outcome.written.push(entry.node.clone());
                    }
                }
            }
        }

        monitor.check()?;
        self.allocate_all(&outcome.written)?;
        for (node, data_type, values) in &grids {
            if let (Some(values), Some(layout)) = (values, self.raster_io.layout(node)) {
                let buffer = RasterBuffer::from_f64(*data_type, values);
                let (w, h) = (layout.width, layout.height);
                self.raster_io.write_region(node, 0, 0, w, h, &buffer, monitor)?;
            }
        }

        if data_dir.is_dir() {
            let pruned = prune_vector_data(&data_dir, &product.vector_data)?;
            if pruned > 0 {
                log::info!("Pruned {} vector data file(s)", pruned);
            }
        }

        monitor.check()?;
        staged
            .persist(&header_path)
            .map_err(|e| DimapError::Io(e.error))?;

        for entry in &layout.entries {
            product.set_sidecar_state(&entry.node, SidecarState::Bound(base_dir.join(&entry.path)));
        }
        product.mark_saved();
        // allocated band payloads stay modified until they are supplied
        for node in &outcome.written {
            if let RasterNodeId::Band(name) = node {
                if let Some(band) = product.band_mut(name) {
                    band.modified = true;
                }
            }
        }
        product.file_location = Some(header_path);

        // the previous header referenced these files until the persist above
        outcome.removed_files = remove_pending_sidecars(product, &base_dir, &data_dir_name, &layout)?;
        product.clear_pending_removals();
        outcome.layout = layout;

        log::info!(
            "Wrote '{}' in {:.3}s: {} payload(s) written, {} skipped, {} stale file(s) removed",
            product.name,
            start.elapsed().as_secs_f64(),
            outcome.written.len(),
            outcome.skipped.len(),
            outcome.removed_files
        );
        Ok(outcome)
    }

    fn allocate_all(&self, nodes: &[RasterNodeId]) -> DimapResult<()> {
        #[cfg(feature = "parallel")]
        if self.config.parallel {
            use rayon::prelude::*;
            return nodes
                .par_iter()
                .map(|node| self.raster_io.allocate(node))
                .collect::<DimapResult<Vec<_>>>()
                .map(|_| ());
        }

        for node in nodes {
            self.raster_io.allocate(node)?;
        }
        Ok(())
    }

    /// Write a region of a band written by the last [`write`](Self::write).
    /// A region spanning the whole band clears its modified flag; partial
    /// regions leave the band to be reallocated by the next incremental
    /// write, which keeps the samples already on disk.
    #[allow(clippy::too_many_arguments)]
    pub fn write_band_region(
        &self,
        product: &mut Product,
        band: &str,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        buffer: &RasterBuffer,
        monitor: &ProgressMonitor,
    ) -> DimapResult<()> {
        let node = RasterNodeId::Band(band.to_string());
        self.raster_io.write_region(&node, x, y, w, h, buffer, monitor)?;
        let whole = self
            .raster_io
            .layout(&node)
            .map_or(false, |l| x == 0 && y == 0 && w == l.width && h == l.height);
        if whole {
            mark_supplied(product, band);
        }
        Ok(())
    }

    /// Write complete band rasters, in parallel when enabled
    pub fn write_band_rasters(
        &self,
        product: &mut Product,
        rasters: &[(String, RasterBuffer)],
        monitor: &ProgressMonitor,
    ) -> DimapResult<()> {
        self.write_rasters(rasters, monitor)?;
        for (name, _) in rasters {
            mark_supplied(product, name);
        }
        Ok(())
    }

    fn write_rasters(&self, rasters: &[(String, RasterBuffer)], monitor: &ProgressMonitor) -> DimapResult<()> {
        let write_one = |(name, buffer): &(String, RasterBuffer)| -> DimapResult<()> {
            let node = RasterNodeId::Band(name.clone());
            let layout = self
                .raster_io
                .layout(&node)
                .ok_or_else(|| DimapError::Format(format!("{} was not written", node)))?;
            let (w, h) = (layout.width, layout.height);
            self.raster_io.write_region(&node, 0, 0, w, h, buffer, monitor)?;
            monitor.worked(1);
            Ok(())
        };

        #[cfg(feature = "parallel")]
        if self.config.parallel {
            use rayon::prelude::*;
            return rasters
                .par_iter()
                .map(write_one)
                .collect::<DimapResult<Vec<_>>>()
                .map(|_| ());
        }

        rasters.iter().try_for_each(write_one)
    }

    /// Release the sidecar file handles
    pub fn close(&self) -> DimapResult<()> {
        self.raster_io.close()
    }
}

fn stage_header(doc: &Document, header_path: &Path) -> DimapResult<NamedTempFile> {
    let dir = header_path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut staged = match dir {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new_in(".")?,
    };
    staged.write_all(&doc.to_xml_bytes()?)?;
    staged.flush()?;
    Ok(staged)
}

fn mark_supplied(product: &mut Product, band: &str) {
    if let Some(band) = product.band_mut(band) {
        band.modified = false;
    }
}

/// Delete the sidecars of removed nodes, except those a node of the same
/// name in `layout` now owns
fn remove_pending_sidecars(
    product: &Product,
    base_dir: &Path,
    data_dir_name: &str,
    layout: &SidecarLayout,
) -> DimapResult<usize> {
    let mut removed = 0;
    for node in product.pending_removals() {
        if layout.entries.iter().any(|e| &e.node == node) {
            continue;
        }
        let base = match node {
            RasterNodeId::Band(name) => band_file_base(data_dir_name, name),
            RasterNodeId::TiePointGrid(name) => tie_point_grid_file_base(data_dir_name, name),
        };
        for extension in [ENVI_HEADER_EXTENSION, IMAGE_FILE_EXTENSION] {
            let file = base_dir.join(format!("{}{}", base, extension));
            if file.is_file() {
                std::fs::remove_file(&file)?;
                log::debug!("Removed sidecar {} of {}", file.display(), node);
                removed += 1;
            }
        }
    }
    Ok(removed)
}

/// An opened product with its recovered problems and raster access
#[derive(Debug)]
pub struct DimapProductReader {
    header_path: PathBuf,
    product: Product,
    diagnostics: Vec<Diagnostic>,
    raster_io: RasterIo,
}

impl DimapProductReader {
    /// Open the product whose header is at `path`
    pub fn open(path: &Path, config: &ReaderConfig, monitor: &ProgressMonitor) -> DimapResult<Self> {
        let start = Instant::now();
        let header_path = with_extension(path, HEADER_FILE_EXTENSION);
        let (_, base_dir, data_dir) = product_paths(&header_path)?;
        log::info!("Opening DIMAP product {}", header_path.display());

        let bytes = std::fs::read(&header_path)?;
        let doc = Document::parse(&bytes)?;
        let mut outcome = ProductBuilder::build_nodes(&doc, config, monitor)?;

        monitor.check()?;
        let bound = BandFileBinder::bind(&mut outcome.product, &doc, &base_dir)?;
        outcome.diagnostics.extend(bound.diagnostics);

        let raster_io = RasterIo::for_product(&outcome.product);
        if config.load_tie_point_grids {
            load_tie_point_grids(&mut outcome.product, &raster_io, monitor)?;
        }

        ProductBuilder::resolve_geocoding(&doc, config, &mut outcome)?;

        let mut product = outcome.product;
        product.vector_data = list_vector_data(&data_dir)?;
        product.file_location = Some(header_path.clone());
        product.mark_saved();

        log::info!(
            "Opened '{}' in {:.3}s with {} diagnostic(s)",
            product.name,
            start.elapsed().as_secs_f64(),
            outcome.diagnostics.len()
        );
        Ok(Self {
            header_path,
            product,
            diagnostics: outcome.diagnostics,
            raster_io,
        })
    }

    pub fn header_path(&self) -> &Path {
        &self.header_path
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn product_mut(&mut self) -> &mut Product {
        &mut self.product
    }

    pub fn into_product(self) -> Product {
        self.product
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[allow(clippy::too_many_arguments)]
    pub fn read_band_region(
        &self,
        band: &str,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        step_x: usize,
        step_y: usize,
        monitor: &ProgressMonitor,
    ) -> DimapResult<RasterBuffer> {
        let node = RasterNodeId::Band(band.to_string());
        self.raster_io.read_region(&node, x, y, w, h, step_x, step_y, monitor)
    }

    pub fn read_band_raster(&self, band: &str, monitor: &ProgressMonitor) -> DimapResult<RasterBuffer> {
        self.raster_io.read_all(&RasterNodeId::Band(band.to_string()), monitor)
    }

    pub fn close(&self) -> DimapResult<()> {
        self.raster_io.close()
    }
}

fn load_tie_point_grids(product: &mut Product, raster_io: &RasterIo, monitor: &ProgressMonitor) -> DimapResult<()> {
    for grid in product.tie_point_grids_mut() {
        if !matches!(grid.sidecar, SidecarState::Bound(_)) {
            continue;
        }
        let node = RasterNodeId::TiePointGrid(grid.name.clone());
        let values = raster_io
            .read_all(&node, monitor)?
            .to_array2(grid.grid_width, grid.grid_height)?
            .mapv(|v| v as f32);
        if grid.is_cyclic() {
            grid.discontinuity = match Discontinuity::derive(&values) {
                Discontinuity::None => Discontinuity::At180,
                derived => derived,
            };
        }
        grid.set_data(values)?;
        grid.modified = false;
        log::debug!("Loaded tie-point grid '{}'", grid.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::product::{Band, TiePointGrid};
    use crate::types::DataType;
    use ndarray::Array2;
    use tempfile::TempDir;

    #[test]
    fn test_product_paths() {
        let (stem, base, data) = product_paths(Path::new("/tmp/out/scene.dim")).unwrap();
        assert_eq!(stem, "scene");
        assert_eq!(base, PathBuf::from("/tmp/out"));
        assert_eq!(data, PathBuf::from("/tmp/out/scene.data"));
        assert!(product_paths(Path::new("/")).is_err());
    }

    #[test]
    fn test_cancelled_write_leaves_no_header() {
        let dir = TempDir::new().unwrap();
        let mut product = Product::new("scene", "TEST", 4, 4);
        product.add_band(Band::new("b1", DataType::UInt8, 4, 4)).unwrap();

        let monitor = ProgressMonitor::new();
        monitor.cancel();
        let mut writer = DimapProductWriter::new(WriterConfig::default());
        let result = writer.write(&mut product, &dir.path().join("scene.dim"), &monitor);
        assert!(matches!(result, Err(DimapError::UserCancelled)));
        assert!(!dir.path().join("scene.dim").exists());
    }

    #[test]
    fn test_removed_band_sidecars_deleted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene.dim");
        let mut product = Product::new("scene", "TEST", 3, 2);
        product.add_band(Band::new("b1", DataType::Int16, 3, 2)).unwrap();
        product.add_band(Band::new("b2", DataType::Int16, 3, 2)).unwrap();

        let monitor = ProgressMonitor::new();
        let mut writer = DimapProductWriter::new(WriterConfig::default());
        writer.write(&mut product, &path, &monitor).unwrap();
        let b2 = dir.path().join("scene.data").join("b2.img");
        assert!(b2.exists());

        product.remove_band("b2").unwrap();
        let outcome = writer.write(&mut product, &path, &monitor).unwrap();
        assert_eq!(outcome.removed_files, 2);
        assert!(!b2.exists());
        assert!(product.pending_removals().is_empty());
    }

    #[test]
    fn test_failed_write_keeps_removed_sidecars() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene.dim");
        let mut product = Product::new("scene", "TEST", 3, 2);
        product.add_band(Band::new("b1", DataType::Int16, 3, 2)).unwrap();
        product.add_band(Band::new("b2", DataType::Int16, 3, 2)).unwrap();

        let monitor = ProgressMonitor::new();
        let mut writer = DimapProductWriter::new(WriterConfig::default());
        writer.write(&mut product, &path, &monitor).unwrap();
        writer.close().unwrap();

        product.remove_band("b2").unwrap();
        // a directory in place of the b1 ENVI header fails the write after staging
        let b1_hdr = dir.path().join("scene.data").join("b1.hdr");
        std::fs::remove_file(&b1_hdr).unwrap();
        std::fs::create_dir(&b1_hdr).unwrap();
        assert!(writer.write(&mut product, &path, &monitor).is_err());
        assert_eq!(product.pending_removals().len(), 1);
        assert!(dir.path().join("scene.data").join("b2.img").exists());

        let reader = DimapProductReader::open(&path, &ReaderConfig::default(), &monitor).unwrap();
        assert_eq!(reader.product().bands().len(), 2);
        for band in reader.product().bands() {
            assert!(matches!(band.sidecar, SidecarState::Bound(_)), "{} not bound", band.name);
        }
    }

    #[test]
    fn test_readded_band_keeps_new_sidecar() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene.dim");
        let mut product = Product::new("scene", "TEST", 3, 2);
        product.add_band(Band::new("b1", DataType::Int16, 3, 2)).unwrap();

        let monitor = ProgressMonitor::new();
        let mut writer = DimapProductWriter::new(WriterConfig::default());
        writer.write(&mut product, &path, &monitor).unwrap();

        product.remove_band("b1").unwrap();
        product.add_band(Band::new("b1", DataType::Float32, 3, 2)).unwrap();
        let outcome = writer.write(&mut product, &path, &monitor).unwrap();
        assert_eq!(outcome.removed_files, 0);
        let img = dir.path().join("scene.data").join("b1.img");
        assert_eq!(std::fs::metadata(img).unwrap().len(), 3 * 2 * 4);
    }

    #[test]
    fn test_unsupplied_payload_stays_modified() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene.dim");
        let mut product = Product::new("scene", "TEST", 4, 4);
        product.add_band(Band::new("b1", DataType::UInt8, 4, 4)).unwrap();
        product.add_band(Band::new("b2", DataType::UInt8, 4, 4)).unwrap();

        let monitor = ProgressMonitor::new();
        let mut writer = DimapProductWriter::new(WriterConfig::default());
        writer.write(&mut product, &path, &monitor).unwrap();
        assert!(product.band("b1").unwrap().modified);
        assert!(product.band("b2").unwrap().modified);

        writer
            .write_band_rasters(&mut product, &[("b1".to_string(), RasterBuffer::UInt8(vec![1; 16]))], &monitor)
            .unwrap();
        writer
            .write_band_region(&mut product, "b2", 0, 0, 2, 2, &RasterBuffer::UInt8(vec![9; 4]), &monitor)
            .unwrap();
        assert!(!product.band("b1").unwrap().modified);
        assert!(product.band("b2").unwrap().modified);

        let outcome = writer.write(&mut product, &path, &monitor).unwrap();
        let b1 = RasterNodeId::Band("b1".to_string());
        let b2 = RasterNodeId::Band("b2".to_string());
        assert!(outcome.skipped.contains(&b1));
        assert!(outcome.written.contains(&b2));

        // reallocation keeps the samples already supplied
        let reader = DimapProductReader::open(&path, &ReaderConfig::default(), &monitor).unwrap();
        let value = reader.read_band_region("b2", 1, 1, 1, 1, 1, 1, &monitor).unwrap();
        assert_eq!(value.get_f64(0), Some(9.0));
        let value = reader.read_band_region("b1", 3, 3, 1, 1, 1, 1, &monitor).unwrap();
        assert_eq!(value.get_f64(0), Some(1.0));
    }

    #[test]
    fn test_cyclic_grid_rederived_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene.dim");
        let mut product = Product::new("scene", "TEST", 20, 20);
        let mut lon = TiePointGrid::new("lon", 2, 2, 0.5, 0.5, 19.0, 19.0)
            .with_data(Array2::from_shape_vec((2, 2), vec![170.0, 190.0, 171.0, 191.0]).unwrap())
            .unwrap();
        lon.discontinuity = Discontinuity::At180;
        product.add_tie_point_grid(lon).unwrap();

        let monitor = ProgressMonitor::new();
        DimapProductWriter::new(WriterConfig::default())
            .write(&mut product, &path, &monitor)
            .unwrap();
        let reader = DimapProductReader::open(&path, &ReaderConfig::default(), &monitor).unwrap();
        let grid = reader.product().tie_point_grid("lon").unwrap();
        assert_eq!(grid.discontinuity, Discontinuity::At360);
        assert!(!grid.modified);
        assert_eq!(grid.data.as_ref().unwrap()[[1, 1]], 191.0);
    }
}
