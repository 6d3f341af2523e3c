//! ENVI text headers written next to every `.img` payload so that the
//! sidecars can be opened by ENVI-aware tools without the DIMAP header

use crate::core::product::{Band, TiePointGrid};
use crate::types::{DataType, DimapError, DimapResult};
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

const DESCRIPTION: &str = "DIMAP raster product sidecar";

#[derive(Debug, Clone, PartialEq)]
pub struct EnviHeader {
    pub description: String,
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
    pub header_offset: usize,
    pub data_type: DataType,
    /// 1 means big-endian
    pub byte_order: u8,
    pub band_names: Vec<String>,
    pub wavelength: Option<f64>,
    pub gain: f64,
    pub offset: f64,
}

impl EnviHeader {
    fn new(name: &str, samples: usize, lines: usize, data_type: DataType) -> Self {
        Self {
            description: format!("{} {}", DESCRIPTION, name),
            samples,
            lines,
            bands: 1,
            header_offset: 0,
            data_type,
            byte_order: 1,
            band_names: vec![name.to_string()],
            wavelength: None,
            gain: 1.0,
            offset: 0.0,
        }
    }

    pub fn for_band(band: &Band) -> Self {
        let mut header = Self::new(&band.name, band.width, band.height, band.data_type);
        header.gain = band.scaling_factor;
        header.offset = band.scaling_offset;
        if band.spectral.wavelength > 0.0 {
            header.wavelength = Some(band.spectral.wavelength);
        }
        header
    }

    pub fn for_tie_point_grid(grid: &TiePointGrid) -> Self {
        Self::new(&grid.name, grid.grid_width, grid.grid_height, grid.data_type)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::from("ENVI\n");
        // writing to a String cannot fail
        let _ = writeln!(out, "description = {{{}}}", self.description);
        let _ = writeln!(out, "samples = {}", self.samples);
        let _ = writeln!(out, "lines = {}", self.lines);
        let _ = writeln!(out, "bands = {}", self.bands);
        let _ = writeln!(out, "header offset = {}", self.header_offset);
        let _ = writeln!(out, "file type = ENVI Standard");
        let _ = writeln!(out, "data type = {}", self.data_type.envi_code());
        let _ = writeln!(out, "interleave = bsq");
        let _ = writeln!(out, "byte order = {}", self.byte_order);
        let _ = writeln!(out, "band names = {{ {} }}", self.band_names.join(", "));
        if let Some(wavelength) = self.wavelength {
            let _ = writeln!(out, "wavelength units = nm");
            let _ = writeln!(out, "wavelength = {{ {} }}", wavelength);
        }
        let _ = writeln!(out, "data gain values = {{ {} }}", self.gain);
        let _ = writeln!(out, "data offset values = {{ {} }}", self.offset);
        out
    }

    pub fn write_to(&self, path: &Path) -> DimapResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_text())?;
        log::debug!("Wrote ENVI header {}", path.display());
        Ok(())
    }

    pub fn parse(text: &str) -> DimapResult<Self> {
        if !text.trim_start().starts_with("ENVI") {
            return Err(DimapError::Format("ENVI header must start with 'ENVI'".to_string()));
        }
        let entries = parse_entries(text)?;
        let get = |key: &str| entries.get(key).map(String::as_str);
        let number = |key: &str| -> DimapResult<usize> {
            get(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or_else(|| DimapError::Format(format!("ENVI header lacks a valid '{}'", key)))
        };
        let list = |key: &str| -> Vec<String> {
            get(key)
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        };
        let first_f64 = |key: &str| list(key).first().and_then(|v| v.parse::<f64>().ok());

        let code = number("data type")? as u32;
        let data_type = DataType::from_envi_code(code)
            .ok_or_else(|| DimapError::Format(format!("unsupported ENVI data type {}", code)))?;
        Ok(Self {
            description: get("description").unwrap_or("").trim().to_string(),
            samples: number("samples")?,
            lines: number("lines")?,
            bands: number("bands").unwrap_or(1),
            header_offset: number("header offset").unwrap_or(0),
            data_type,
            byte_order: number("byte order").unwrap_or(0) as u8,
            band_names: list("band names"),
            wavelength: first_f64("wavelength"),
            gain: first_f64("data gain values").unwrap_or(1.0),
            offset: first_f64("data offset values").unwrap_or(0.0),
        })
    }

    pub fn read_from(path: &Path) -> DimapResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

/// `key = value` pairs; `{...}` values may span lines
fn parse_entries(text: &str) -> DimapResult<HashMap<String, String>> {
    let re = Regex::new(r"(?ms)^\s*([A-Za-z][A-Za-z0-9 _]*?)\s*=\s*(\{[^}]*\}|[^\r\n]*)")
        .map_err(|e| DimapError::Format(format!("ENVI header pattern: {}", e)))?;
    let mut entries = HashMap::new();
    for caps in re.captures_iter(text) {
        let key = caps[1].trim().to_ascii_lowercase();
        let raw = caps[2].trim();
        let value = raw
            .strip_prefix('{')
            .and_then(|v| v.strip_suffix('}'))
            .unwrap_or(raw)
            .replace(['\r', '\n'], " ");
        entries.insert(key, value.trim().to_string());
    }
    Ok(entries)
}
