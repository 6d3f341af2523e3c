//! Product model, geocodings and shared services

pub mod expression;
pub mod geocoding;
pub mod metadata;
pub mod product;
pub mod progress;
pub mod registry;

// Re-export main types
pub use geocoding::{
    AffineTransform, CrsGeoCoding, Discontinuity, GcpGeoCoding, GcpMethod, GeoCoding, GeoPos,
    GeopositionInsert, MapGeoCoding, MapInfo, MapProjection, PixelGeoCoding, Placemark,
    Polynomial, PolynomialGeoCoding, ProjectionParameter, TiePointGeoCoding, TiePointSampling,
};
pub use metadata::{MetadataAttribute, MetadataElement};
pub use product::{
    Band, BandKind, CodingEntry, FilterBandInfo, FilterOperation, ImageInfo, Kernel, Mask,
    MaskKind, PalettePoint, Product, SampleCoding, SampleCodingKind, SidecarState,
    SpectralInfo, Stx, TiePointGrid,
};
pub use progress::ProgressMonitor;
pub use registry::{Datum, DefaultRegistry, Ellipsoid, ReferenceSystemRegistry};
