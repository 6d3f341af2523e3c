use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Sample types a raster node can be stored with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl DataType {
    /// Type name as it appears in DATA_TYPE and MDATTR type attributes
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int8 => "int8",
            DataType::UInt8 => "uint8",
            DataType::Int16 => "int16",
            DataType::UInt16 => "uint16",
            DataType::Int32 => "int32",
            DataType::UInt32 => "uint32",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int8" => Some(DataType::Int8),
            "uint8" => Some(DataType::UInt8),
            "int16" => Some(DataType::Int16),
            "uint16" => Some(DataType::UInt16),
            "int32" => Some(DataType::Int32),
            "uint32" => Some(DataType::UInt32),
            "float32" => Some(DataType::Float32),
            "float64" => Some(DataType::Float64),
            _ => None,
        }
    }

    /// Element size in bytes
    pub fn size(&self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }

    /// ENVI `data type` code
    pub fn envi_code(&self) -> u32 {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 => 2,
            DataType::Int32 => 3,
            DataType::Float32 => 4,
            DataType::Float64 => 5,
            DataType::UInt16 => 12,
            DataType::UInt32 => 13,
        }
    }

    pub fn from_envi_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(DataType::UInt8),
            2 => Some(DataType::Int16),
            3 => Some(DataType::Int32),
            4 => Some(DataType::Float32),
            5 => Some(DataType::Float64),
            12 => Some(DataType::UInt16),
            13 => Some(DataType::UInt32),
            _ => None,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// RGBA colour used by masks, palettes and no-data display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

impl Color {
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue, alpha: 255 }
    }

    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
}

impl Default for Color {
    fn default() -> Self {
        Color::RED
    }
}

/// Handle identifying a raster node inside a product
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RasterNodeId {
    Band(String),
    TiePointGrid(String),
}

impl RasterNodeId {
    pub fn name(&self) -> &str {
        match self {
            RasterNodeId::Band(name) | RasterNodeId::TiePointGrid(name) => name,
        }
    }
}

impl std::fmt::Display for RasterNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RasterNodeId::Band(name) => write!(f, "band '{}'", name),
            RasterNodeId::TiePointGrid(name) => write!(f, "tie-point grid '{}'", name),
        }
    }
}

/// Error types for DIMAP encoding and decoding
#[derive(Debug, thiserror::Error)]
pub enum DimapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid product format: {0}")]
    Format(String),

    #[error("Field parse error: {0}")]
    FieldParse(String),

    #[error("Geocoding unresolved: {0}")]
    GeocodingUnresolved(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("Incompatible expression: {0}")]
    IncompatibleExpression(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),
}

/// Result type for DIMAP operations
pub type DimapResult<T> = Result<T, DimapError>;

/// Category of a recovered problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    FieldParse,
    GeocodingUnresolved,
    DataUnavailable,
    IncompatibleExpression,
}

/// A problem that was recovered from locally and is reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        let message = message.into();
        log::warn!("{:?}: {}", kind, message);
        Self { kind, message }
    }

    /// The error this diagnostic would have been had it not been recovered
    pub fn to_error(&self) -> DimapError {
        match self.kind {
            DiagnosticKind::FieldParse => DimapError::FieldParse(self.message.clone()),
            DiagnosticKind::GeocodingUnresolved => {
                DimapError::GeocodingUnresolved(self.message.clone())
            }
            DiagnosticKind::DataUnavailable => DimapError::DataUnavailable(self.message.clone()),
            DiagnosticKind::IncompatibleExpression => {
                DimapError::IncompatibleExpression(self.message.clone())
            }
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_error())
    }
}

const UTC_FORMAT_OUT: &str = "%d-%b-%Y %H:%M:%S%.6f";

/// Parse a product time in the `dd-MMM-yyyy HH:mm:ss.ffffff` form.
/// ISO-8601 is accepted as well since some producers write it.
pub fn parse_utc(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    let formats = [
        "%d-%b-%Y %H:%M:%S%.f",
        "%d-%b-%Y %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%d %H:%M:%S%.f",
    ];
    formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

/// Format a product time, e.g. `19-MAY-2003 00:34:05.000034`
pub fn format_utc(time: &NaiveDateTime) -> String {
    time.format(UTC_FORMAT_OUT).to_string().to_uppercase()
}
