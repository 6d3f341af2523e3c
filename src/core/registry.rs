//! Reference-system services used while decoding and encoding geocodings.
//!
//! WKT parsing, datum tables and projection-parameter schemas are looked up
//! through a [`ReferenceSystemRegistry`] passed in explicitly, so tests can
//! substitute their own tables.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub name: String,
    pub semi_major: f64,
    pub semi_minor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    pub name: String,
    pub ellipsoid: Ellipsoid,
}

impl Datum {
    pub fn new(name: &str, ellipsoid_name: &str, semi_major: f64, semi_minor: f64) -> Self {
        Self {
            name: name.to_string(),
            ellipsoid: Ellipsoid {
                name: ellipsoid_name.to_string(),
                semi_major,
                semi_minor,
            },
        }
    }

    pub fn wgs84() -> Self {
        Self::new("WGS84", "WGS_84", 6378137.0, 6356752.3142451793)
    }

    /// Same name (case-insensitive) and axes within a millimetre
    pub fn is_equivalent(&self, other: &Datum) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && approx::abs_diff_eq!(self.ellipsoid.semi_major, other.ellipsoid.semi_major, epsilon = 1e-3)
            && approx::abs_diff_eq!(self.ellipsoid.semi_minor, other.ellipsoid.semi_minor, epsilon = 1e-3)
    }
}

impl Default for Datum {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// Lookup services for coordinate reference systems
pub trait ReferenceSystemRegistry: Send + Sync {
    /// Validate a WKT description, returning its normalised text
    fn parse_wkt(&self, wkt: &str) -> Option<String>;

    /// Whether a normalised WKT describes a geographic (lat/lon) system
    fn is_geographic(&self, wkt: &str) -> bool {
        let upper = wkt.trim_start().to_ascii_uppercase();
        upper.starts_with("GEOGCS") || upper.starts_with("GEOGCRS") || upper.starts_with("GEODCRS")
    }

    fn datum(&self, name: &str) -> Option<Datum>;

    /// Parameter names of a projection method, in index order
    fn projection_parameters(&self, method: &str) -> Option<Vec<String>>;
}

/// Built-in registry with a small datum table and common projection schemas
#[derive(Debug, Clone, Default)]
pub struct DefaultRegistry;

const WKT_KEYWORDS: &[&str] = &[
    "GEOGCS", "PROJCS", "GEOCCS", "COMPD_CS", "LOCAL_CS", "VERT_CS", "GEOGCRS", "GEODCRS",
    "PROJCRS", "COMPOUNDCRS", "ENGCRS", "VERTCRS",
];

impl ReferenceSystemRegistry for DefaultRegistry {
    fn parse_wkt(&self, wkt: &str) -> Option<String> {
        let normalised = wkt.split_whitespace().collect::<Vec<_>>().join(" ");
        let keyword: String = normalised
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if !WKT_KEYWORDS.contains(&keyword.to_ascii_uppercase().as_str()) {
            return None;
        }

        let mut depth = 0i32;
        for c in normalised.chars() {
            match c {
                '[' | '(' => depth += 1,
                ']' | ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return None;
                    }
                }
                _ => {}
            }
        }
        if depth != 0 || !normalised.contains('[') && !normalised.contains('(') {
            return None;
        }
        Some(normalised)
    }

    fn datum(&self, name: &str) -> Option<Datum> {
        let key = name.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match key.as_str() {
            "WGS84" | "WGS_84" | "WORLD_GEODETIC_SYSTEM_1984" => Some(Datum::wgs84()),
            "WGS72" | "WGS_72" => Some(Datum::new("WGS72", "WGS_72", 6378135.0, 6356750.520016094)),
            "ED50" | "EUROPEAN_DATUM_1950" => {
                Some(Datum::new("ED50", "International_1924", 6378388.0, 6356911.9461279465))
            }
            "NAD27" | "NORTH_AMERICAN_DATUM_1927" => {
                Some(Datum::new("NAD27", "Clarke_1866", 6378206.4, 6356583.8))
            }
            "NAD83" | "NORTH_AMERICAN_DATUM_1983" => {
                Some(Datum::new("NAD83", "GRS_1980", 6378137.0, 6356752.314140356))
            }
            _ => None,
        }
    }

    fn projection_parameters(&self, method: &str) -> Option<Vec<String>> {
        let names: &[&str] = match method {
            "Transverse_Mercator" | "UTM_Zone" => &[
                "semi_major",
                "semi_minor",
                "latitude_of_origin",
                "central_meridian",
                "scale_factor",
                "false_easting",
                "false_northing",
            ],
            "Mercator_1SP" => &[
                "semi_major",
                "semi_minor",
                "latitude_of_origin",
                "central_meridian",
                "scale_factor",
                "false_easting",
                "false_northing",
            ],
            "Lambert_Conformal_Conic_2SP" => &[
                "semi_major",
                "semi_minor",
                "latitude_of_origin",
                "central_meridian",
                "standard_parallel_1",
                "standard_parallel_2",
                "false_easting",
                "false_northing",
            ],
            "Stereographic" | "Polar_Stereographic" => &[
                "semi_major",
                "semi_minor",
                "latitude_of_origin",
                "central_meridian",
                "scale_factor",
                "false_easting",
                "false_northing",
            ],
            "Identity" | "Geographic_Lat_Lon" => &[],
            _ => return None,
        };
        Some(names.iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wkt_validation() {
        let reg = DefaultRegistry;
        let wkt = "GEOGCS[\"WGS84(DD)\",\n   DATUM[\"WGS84\", SPHEROID[\"WGS84\", 6378137.0, 298.257223563]],\n   UNIT[\"degree\", 0.017453292519943295]]";
        let parsed = reg.parse_wkt(wkt).unwrap();
        assert!(!parsed.contains('\n'));
        assert!(reg.is_geographic(&parsed));

        assert!(reg.parse_wkt("PROJCS[\"UTM\", GEOGCS[\"x\"]").is_none());
        assert!(reg.parse_wkt("not a crs").is_none());
        assert!(reg.parse_wkt("GEOGCS").is_none());
    }

    #[test]
    fn test_datum_table() {
        let reg = DefaultRegistry;
        assert!(reg.datum("wgs-84").unwrap().is_equivalent(&Datum::wgs84()));
        assert_eq!(reg.datum("ED50").unwrap().ellipsoid.semi_major, 6378388.0);
        assert!(reg.datum("Mars_2000").is_none());
    }

    #[test]
    fn test_projection_schema() {
        let reg = DefaultRegistry;
        let params = reg.projection_parameters("Transverse_Mercator").unwrap();
        assert_eq!(params[3], "central_meridian");
        assert!(reg.projection_parameters("Unknown").is_none());
    }
}
