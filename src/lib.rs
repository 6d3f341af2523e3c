//! dimap: reader and writer for BEAM-DIMAP raster product containers
//!
//! A product is stored as a `.dim` XML header describing bands, tie-point
//! grids, masks, sample codings, geocoding and metadata, next to a `.data`
//! directory holding one flat big-endian `.img` payload (plus ENVI `.hdr`)
//! per stored raster.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    Color, DataType, Diagnostic, DiagnosticKind, DimapError, DimapResult, RasterNodeId,
};

pub use crate::core::{
    Band, GeoCoding, MetadataElement, Product, ProgressMonitor, ReferenceSystemRegistry,
    TiePointGrid,
};
pub use io::{
    DimapProductReader, DimapProductWriter, Document, RasterBuffer, ReaderConfig, WriterConfig,
};
