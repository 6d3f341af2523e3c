//! DIMAP container I/O: header document, codec and sidecar access

pub mod band_binder;
pub mod constants;
pub mod document;
pub mod envi_header;
pub mod geocoding_resolver;
pub mod header_parser;
pub mod header_writer;
pub mod product_io;
pub mod raster_io;
pub mod vector_data;
pub mod write_planner;

// Re-export main types
pub use band_binder::{resolve_href, BandFileBinder, BindOutcome};
pub use document::{Document, NodeId};
pub use envi_header::EnviHeader;
pub use geocoding_resolver::{GeocodingResolver, ResolvedGeocoding, DEFAULT_SEARCH_RADIUS};
pub use header_parser::{BuildOutcome, ProductBuilder};
pub use header_writer::{HeaderWriter, SidecarEntry, SidecarLayout};
pub use product_io::{
    DimapProductReader, DimapProductWriter, ReaderConfig, WriteOutcome, WriterConfig,
};
pub use raster_io::{NodeLayout, RasterBuffer, RasterIo, Sample};
pub use vector_data::{list_vector_data, prune_vector_data};
pub use write_planner::{IncrementalWritePlanner, NodeWriteState};
