//! Geocoding representations and their pixel/geographic math

use crate::core::registry::Datum;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
}

/// 2-D affine transform in the flat order `m00 m10 m01 m11 m02 m12`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m11: f64,
    pub m02: f64,
    pub m12: f64,
}

impl AffineTransform {
    pub const IDENTITY: AffineTransform = AffineTransform {
        m00: 1.0,
        m10: 0.0,
        m01: 0.0,
        m11: 1.0,
        m02: 0.0,
        m12: 0.0,
    };

    /// Build from 4 (no translation) or 6 flat matrix values
    pub fn from_flat(values: &[f64]) -> Option<Self> {
        if values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        match values.len() {
            4 | 6 => Some(Self {
                m00: values[0],
                m10: values[1],
                m01: values[2],
                m11: values[3],
                m02: values.get(4).copied().unwrap_or(0.0),
                m12: values.get(5).copied().unwrap_or(0.0),
            }),
            _ => None,
        }
    }

    pub fn to_flat(&self) -> [f64; 6] {
        [self.m00, self.m10, self.m01, self.m11, self.m02, self.m12]
    }

    pub fn determinant(&self) -> f64 {
        self.m00 * self.m11 - self.m01 * self.m10
    }

    pub fn is_invertible(&self) -> bool {
        self.determinant().abs() > EPS
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.m00 * x + self.m01 * y + self.m02,
            self.m10 * x + self.m11 * y + self.m12,
        )
    }

    pub fn inverse_transform(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.determinant();
        if det.abs() <= EPS {
            return None;
        }
        let dx = x - self.m02;
        let dy = y - self.m12;
        Some((
            (self.m11 * dx - self.m01 * dy) / det,
            (-self.m10 * dx + self.m00 * dy) / det,
        ))
    }

    pub fn is_equivalent(&self, other: &AffineTransform) -> bool {
        self.to_flat()
            .iter()
            .zip(other.to_flat().iter())
            .all(|(a, b)| approx::relative_eq!(*a, *b, epsilon = 1e-12, max_relative = 1e-9))
    }
}

/// Longitude wrap-around handling of a tie-point grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discontinuity {
    None,
    /// Values in [-180, 180] jumping across the antimeridian
    At180,
    /// Values in [0, 360]
    At360,
}

impl Discontinuity {
    /// Derive the discontinuity from grid values: values above 180 mean a
    /// 0..360 grid, a neighbour jump of at least 180 degrees means a
    /// -180..180 grid crossing the antimeridian.
    pub fn derive(values: &Array2<f32>) -> Self {
        if values.iter().any(|v| *v > 180.0) {
            return Discontinuity::At360;
        }
        let (rows, cols) = values.dim();
        for r in 0..rows {
            for c in 0..cols {
                let v = values[[r, c]];
                let right = if c + 1 < cols { Some(values[[r, c + 1]]) } else { None };
                let below = if r + 1 < rows { Some(values[[r + 1, c]]) } else { None };
                if [right, below]
                    .iter()
                    .flatten()
                    .any(|n| (n - v).abs() >= 180.0)
                {
                    return Discontinuity::At180;
                }
            }
        }
        Discontinuity::None
    }
}

/// Polynomial in two variables with terms ordered
/// `1, x, y, x^2, xy, y^2, x^3, x^2y, xy^2, y^3, ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    pub order: u32,
    pub coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(order: u32, coefficients: Vec<f64>) -> Self {
        Self { order, coefficients }
    }

    /// Number of terms of a full polynomial of the given order
    pub fn term_count(order: u32) -> usize {
        let n = order as usize + 1;
        n * (n + 1) / 2
    }

    fn terms(x: f64, y: f64, count: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(count);
        let mut degree = 0i32;
        while out.len() < count {
            for i in (0..=degree).rev() {
                if out.len() == count {
                    break;
                }
                out.push(x.powi(i) * y.powi(degree - i));
            }
            degree += 1;
        }
        out
    }

    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        Self::terms(x, y, self.coefficients.len())
            .iter()
            .zip(&self.coefficients)
            .map(|(t, c)| t * c)
            .sum()
    }

    /// Least-squares fit of `z = f(x, y)`; `None` for an under-determined
    /// or degenerate point set
    pub fn fit(order: u32, samples: &[(f64, f64, f64)]) -> Option<Self> {
        let n = Self::term_count(order);
        if samples.len() < n {
            return None;
        }
        let mut ata = vec![vec![0.0f64; n]; n];
        let mut atb = vec![0.0f64; n];
        for &(x, y, z) in samples {
            let t = Self::terms(x, y, n);
            for i in 0..n {
                atb[i] += t[i] * z;
                for j in 0..n {
                    ata[i][j] += t[i] * t[j];
                }
            }
        }
        solve_linear(ata, atb).map(|c| Self::new(order, c))
    }

    fn is_equivalent(&self, other: &Polynomial) -> bool {
        self.order == other.order
            && self.coefficients.len() == other.coefficients.len()
            && self
                .coefficients
                .iter()
                .zip(&other.coefficients)
                .all(|(a, b)| approx::relative_eq!(*a, *b, epsilon = 1e-12, max_relative = 1e-9))
    }
}

/// Gaussian elimination with partial pivoting
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |m, v| m.max(v.abs()))
        .max(1.0);
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() <= 1e-10 * scale {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        let pivot_row = a[col].clone();
        let pivot_b = b[col];
        for row in col + 1..n {
            let factor = a[row][col] / pivot_row[col];
            for k in col..n {
                a[row][k] -= factor * pivot_row[k];
            }
            b[row] -= factor * pivot_b;
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let sum: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - sum) / a[row][row];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// Map CRS given as WKT plus an image-to-map affine transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsGeoCoding {
    pub wkt: String,
    pub image_to_map: AffineTransform,
    pub geographic: bool,
}

/// Sampling geometry and data of the lat/lon tie-point grids
#[derive(Debug, Clone, PartialEq)]
pub struct TiePointSampling {
    pub offset_x: f64,
    pub offset_y: f64,
    pub sub_sampling_x: f64,
    pub sub_sampling_y: f64,
    pub lat: Arc<Array2<f32>>,
    pub lon: Arc<Array2<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TiePointGeoCoding {
    pub lat_grid: String,
    pub lon_grid: String,
    pub datum: Datum,
    pub discontinuity: Discontinuity,
    pub sampling: Option<TiePointSampling>,
}

/// Pixel offset and size applied before evaluating a location model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeopositionInsert {
    pub ul_x: f64,
    pub ul_y: f64,
    pub x_dim: f64,
    pub y_dim: f64,
}

/// Direct (pixel to lon/lat) and reverse (lon/lat to pixel) polynomial model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialGeoCoding {
    pub insert: GeopositionInsert,
    pub lambda: Polynomial,
    pub phi: Polynomial,
    pub x: Polynomial,
    pub y: Polynomial,
    pub datum: Datum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GcpMethod {
    Polynomial1,
    Polynomial2,
    Polynomial3,
}

impl GcpMethod {
    pub fn name(&self) -> &'static str {
        match self {
            GcpMethod::Polynomial1 => "POLYNOMIAL1",
            GcpMethod::Polynomial2 => "POLYNOMIAL2",
            GcpMethod::Polynomial3 => "POLYNOMIAL3",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "POLYNOMIAL1" => Some(GcpMethod::Polynomial1),
            "POLYNOMIAL2" => Some(GcpMethod::Polynomial2),
            "POLYNOMIAL3" => Some(GcpMethod::Polynomial3),
            _ => None,
        }
    }

    pub fn order(&self) -> u32 {
        match self {
            GcpMethod::Polynomial1 => 1,
            GcpMethod::Polynomial2 => 2,
            GcpMethod::Polynomial3 => 3,
        }
    }

    /// Minimum number of ground control points
    pub fn term_count(&self) -> usize {
        Polynomial::term_count(self.order())
    }
}

/// Ground control point placemark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placemark {
    pub name: String,
    pub label: String,
    pub description: String,
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub lat: f64,
    pub lon: f64,
}

impl Placemark {
    pub fn new(name: &str, pixel_x: f64, pixel_y: f64, lat: f64, lon: f64) -> Self {
        Self {
            name: name.to_string(),
            label: name.to_string(),
            description: String::new(),
            pixel_x,
            pixel_y,
            lat,
            lon,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GcpGeoCoding {
    pub method: GcpMethod,
    pub points: Vec<Placemark>,
    pub datum: Datum,
    pub lon_model: Polynomial,
    pub lat_model: Polynomial,
    pub original: Option<Box<GeoCoding>>,
}

impl GcpGeoCoding {
    /// Fit the interpolation models; fails when there are fewer points than
    /// the method needs or the points are degenerate (e.g. collinear)
    pub fn new(method: GcpMethod, points: Vec<Placemark>, datum: Datum) -> Option<Self> {
        if points.len() < method.term_count() {
            log::debug!(
                "{} needs {} GCPs, got {}",
                method.name(),
                method.term_count(),
                points.len()
            );
            return None;
        }
        let lon_samples: Vec<_> = points.iter().map(|p| (p.pixel_x, p.pixel_y, p.lon)).collect();
        let lat_samples: Vec<_> = points.iter().map(|p| (p.pixel_x, p.pixel_y, p.lat)).collect();
        let lon_model = Polynomial::fit(method.order(), &lon_samples)?;
        let lat_model = Polynomial::fit(method.order(), &lat_samples)?;
        Some(Self {
            method,
            points,
            datum,
            lon_model,
            lat_model,
            original: None,
        })
    }
}

/// Per-pixel lookup through explicit latitude/longitude bands
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGeoCoding {
    pub lat_band: String,
    pub lon_band: String,
    pub valid_mask: Option<String>,
    pub search_radius: u32,
    pub estimator: Option<Box<GeoCoding>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionParameter {
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapProjection {
    pub name: String,
    /// Projection method identifier, e.g. `Transverse_Mercator`
    pub method: String,
    pub parameters: Vec<ProjectionParameter>,
    pub map_unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInfo {
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub easting: f64,
    pub northing: f64,
    pub orientation: f64,
    pub pixel_size_x: f64,
    pub pixel_size_y: f64,
    pub no_data_value: f64,
    pub orthorectified: bool,
    pub elevation_model: Option<String>,
    pub scene_fitted: bool,
    pub scene_width: usize,
    pub scene_height: usize,
    pub resampling: String,
}

impl Default for MapInfo {
    fn default() -> Self {
        Self {
            pixel_x: 0.5,
            pixel_y: 0.5,
            easting: 0.0,
            northing: 0.0,
            orientation: 0.0,
            pixel_size_x: 1.0,
            pixel_size_y: 1.0,
            no_data_value: 1e-5,
            orthorectified: false,
            elevation_model: None,
            scene_fitted: false,
            scene_width: 0,
            scene_height: 0,
            resampling: "NEAREST_NEIGHBOUR".to_string(),
        }
    }
}

impl MapInfo {
    /// Pixel to map coordinates, honouring the orientation angle (degrees)
    pub fn pixel_to_map(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = (x - self.pixel_x) * self.pixel_size_x;
        let dy = (y - self.pixel_y) * self.pixel_size_y;
        let theta = self.orientation.to_radians();
        let (sin, cos) = theta.sin_cos();
        (
            self.easting + dx * cos + dy * sin,
            self.northing + dx * sin - dy * cos,
        )
    }
}

/// Legacy map-projection description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapGeoCoding {
    pub map_info: MapInfo,
    pub projection: MapProjection,
    pub datum: Datum,
}

/// Mapping between raster pixels and geographic coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum GeoCoding {
    Crs(CrsGeoCoding),
    TiePoint(TiePointGeoCoding),
    Polynomial(PolynomialGeoCoding),
    Gcp(GcpGeoCoding),
    PixelLookup(PixelGeoCoding),
    MapProjection(MapGeoCoding),
}

impl GeoCoding {
    pub fn variant_name(&self) -> &'static str {
        match self {
            GeoCoding::Crs(_) => "CRS",
            GeoCoding::TiePoint(_) => "tie-point",
            GeoCoding::Polynomial(_) => "polynomial",
            GeoCoding::Gcp(_) => "GCP",
            GeoCoding::PixelLookup(_) => "pixel-lookup",
            GeoCoding::MapProjection(_) => "map-projection",
        }
    }

    pub fn datum(&self) -> Option<&Datum> {
        match self {
            GeoCoding::Crs(_) => None,
            GeoCoding::TiePoint(g) => Some(&g.datum),
            GeoCoding::Polynomial(g) => Some(&g.datum),
            GeoCoding::Gcp(g) => Some(&g.datum),
            GeoCoding::PixelLookup(g) => g.estimator.as_deref().and_then(|e| e.datum()),
            GeoCoding::MapProjection(g) => Some(&g.datum),
        }
    }

    /// Same variant and equivalent parameters
    pub fn is_equivalent(&self, other: &GeoCoding) -> bool {
        match (self, other) {
            (GeoCoding::Crs(a), GeoCoding::Crs(b)) => {
                a.wkt == b.wkt && a.image_to_map.is_equivalent(&b.image_to_map)
            }
            (GeoCoding::TiePoint(a), GeoCoding::TiePoint(b)) => {
                a.lat_grid == b.lat_grid
                    && a.lon_grid == b.lon_grid
                    && a.datum.is_equivalent(&b.datum)
            }
            (GeoCoding::Polynomial(a), GeoCoding::Polynomial(b)) => {
                a.insert == b.insert
                    && a.lambda.is_equivalent(&b.lambda)
                    && a.phi.is_equivalent(&b.phi)
                    && a.x.is_equivalent(&b.x)
                    && a.y.is_equivalent(&b.y)
                    && a.datum.is_equivalent(&b.datum)
            }
            (GeoCoding::Gcp(a), GeoCoding::Gcp(b)) => {
                a.method == b.method
                    && a.points.len() == b.points.len()
                    && a.datum.is_equivalent(&b.datum)
                    && match (&a.original, &b.original) {
                        (Some(x), Some(y)) => x.is_equivalent(y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (GeoCoding::PixelLookup(a), GeoCoding::PixelLookup(b)) => {
                a.lat_band == b.lat_band
                    && a.lon_band == b.lon_band
                    && a.valid_mask == b.valid_mask
                    && a.search_radius == b.search_radius
                    && match (&a.estimator, &b.estimator) {
                        (Some(x), Some(y)) => x.is_equivalent(y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (GeoCoding::MapProjection(a), GeoCoding::MapProjection(b)) => {
                a.projection.method == b.projection.method
                    && a.projection.parameters.len() == b.projection.parameters.len()
                    && a
                        .projection
                        .parameters
                        .iter()
                        .zip(&b.projection.parameters)
                        .all(|(p, q)| approx::abs_diff_eq!(p.value, q.value, epsilon = 1e-9))
                    && approx::abs_diff_eq!(a.map_info.easting, b.map_info.easting, epsilon = 1e-6)
                    && approx::abs_diff_eq!(a.map_info.northing, b.map_info.northing, epsilon = 1e-6)
                    && a.datum.is_equivalent(&b.datum)
            }
            _ => false,
        }
    }

    /// Geographic position of a pixel, when this geocoding can compute one
    /// without access to band data
    pub fn pixel_to_geo(&self, x: f64, y: f64) -> Option<GeoPos> {
        match self {
            GeoCoding::Crs(g) => {
                if !g.geographic {
                    return None;
                }
                let (lon, lat) = g.image_to_map.transform(x, y);
                Some(GeoPos { lat, lon })
            }
            GeoCoding::TiePoint(g) => tie_point_geo(g, x, y),
            GeoCoding::Polynomial(g) => {
                let mx = g.insert.ul_x + g.insert.x_dim * x;
                let my = g.insert.ul_y + g.insert.y_dim * y;
                Some(GeoPos {
                    lat: g.phi.evaluate(mx, my),
                    lon: g.lambda.evaluate(mx, my),
                })
            }
            GeoCoding::Gcp(g) => Some(GeoPos {
                lat: g.lat_model.evaluate(x, y),
                lon: g.lon_model.evaluate(x, y),
            }),
            GeoCoding::PixelLookup(g) => g.estimator.as_ref().and_then(|e| e.pixel_to_geo(x, y)),
            GeoCoding::MapProjection(g) => {
                if g.projection.method != "Identity" && g.projection.method != "Geographic_Lat_Lon" {
                    return None;
                }
                let (lon, lat) = g.map_info.pixel_to_map(x, y);
                Some(GeoPos { lat, lon })
            }
        }
    }

    /// Pixel position of a geographic location, for the invertible variants
    pub fn geo_to_pixel(&self, pos: GeoPos) -> Option<(f64, f64)> {
        match self {
            GeoCoding::Crs(g) if g.geographic => g.image_to_map.inverse_transform(pos.lon, pos.lat),
            GeoCoding::Polynomial(g) => {
                let mx = g.x.evaluate(pos.lon, pos.lat);
                let my = g.y.evaluate(pos.lon, pos.lat);
                if g.insert.x_dim.abs() <= EPS || g.insert.y_dim.abs() <= EPS {
                    return None;
                }
                Some((
                    (mx - g.insert.ul_x) / g.insert.x_dim,
                    (my - g.insert.ul_y) / g.insert.y_dim,
                ))
            }
            GeoCoding::Gcp(g) => g.original.as_ref().and_then(|o| o.geo_to_pixel(pos)),
            GeoCoding::PixelLookup(g) => g.estimator.as_ref().and_then(|e| e.geo_to_pixel(pos)),
            _ => None,
        }
    }
}

fn tie_point_geo(g: &TiePointGeoCoding, x: f64, y: f64) -> Option<GeoPos> {
    let s = g.sampling.as_ref()?;
    let lat = bilinear(&s.lat, s, x, y, false)?;
    let mut lon = bilinear(&s.lon, s, x, y, g.discontinuity == Discontinuity::At180)?;
    if g.discontinuity == Discontinuity::At360 && lon > 180.0 {
        lon -= 360.0;
    }
    Some(GeoPos { lat, lon })
}

fn bilinear(grid: &Array2<f32>, s: &TiePointSampling, x: f64, y: f64, unwrap_180: bool) -> Option<f64> {
    let (rows, cols) = grid.dim();
    if rows == 0 || cols == 0 || s.sub_sampling_x <= 0.0 || s.sub_sampling_y <= 0.0 {
        return None;
    }
    let gx = ((x - s.offset_x) / s.sub_sampling_x).clamp(0.0, (cols - 1) as f64);
    let gy = ((y - s.offset_y) / s.sub_sampling_y).clamp(0.0, (rows - 1) as f64);
    let c0 = (gx.floor() as usize).min(cols.saturating_sub(2));
    let r0 = (gy.floor() as usize).min(rows.saturating_sub(2));
    let c1 = (c0 + 1).min(cols - 1);
    let r1 = (r0 + 1).min(rows - 1);
    let wx = gx - c0 as f64;
    let wy = gy - r0 as f64;

    let fetch = |r: usize, c: usize| {
        let v = grid[[r, c]] as f64;
        if unwrap_180 && v < 0.0 {
            v + 360.0
        } else {
            v
        }
    };
    let top = fetch(r0, c0) * (1.0 - wx) + fetch(r0, c1) * wx;
    let bottom = fetch(r1, c0) * (1.0 - wx) + fetch(r1, c1) * wx;
    let mut v = top * (1.0 - wy) + bottom * wy;
    if unwrap_180 && v > 180.0 {
        v -= 360.0;
    }
    Some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_affine_inverse() {
        let t = AffineTransform::from_flat(&[0.5, 0.0, 0.0, -0.5, 10.0, 50.0]).unwrap();
        let (mx, my) = t.transform(4.0, 6.0);
        assert_abs_diff_eq!(mx, 12.0);
        assert_abs_diff_eq!(my, 47.0);
        let (px, py) = t.inverse_transform(mx, my).unwrap();
        assert_abs_diff_eq!(px, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(py, 6.0, epsilon = 1e-12);

        let singular = AffineTransform::from_flat(&[1.0, 2.0, 2.0, 4.0, 0.0, 0.0]).unwrap();
        assert!(!singular.is_invertible());
        assert!(AffineTransform::from_flat(&[1.0, 2.0, 3.0]).is_none());
        assert!(AffineTransform::from_flat(&[1.0, 0.0, 0.0, f64::NAN]).is_none());
    }

    #[test]
    fn test_discontinuity_derivation() {
        let plain = array![[10.0f32, 11.0], [10.5, 11.5]];
        assert_eq!(Discontinuity::derive(&plain), Discontinuity::None);

        let crossing = array![[178.0f32, -179.0], [178.5, -178.5]];
        assert_eq!(Discontinuity::derive(&crossing), Discontinuity::At180);

        let east = array![[350.0f32, 355.0], [351.0, 356.0]];
        assert_eq!(Discontinuity::derive(&east), Discontinuity::At360);
    }

    #[test]
    fn test_polynomial_terms() {
        // 1 + 2x + 3y + 4x^2 + 5xy + 6y^2
        let p = Polynomial::new(2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_abs_diff_eq!(p.evaluate(2.0, 3.0), 1.0 + 4.0 + 9.0 + 16.0 + 30.0 + 54.0);
        assert_eq!(Polynomial::term_count(3), 10);
    }

    #[test]
    fn test_polynomial_fit_exact_plane() {
        let samples: Vec<_> = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]
            .iter()
            .map(|&(x, y)| (x, y, 5.0 + 0.1 * x - 0.2 * y))
            .collect();
        let p = Polynomial::fit(1, &samples).unwrap();
        assert_abs_diff_eq!(p.coefficients[0], 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.coefficients[1], 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(p.coefficients[2], -0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_gcp_rejects_collinear_points() {
        let points = vec![
            Placemark::new("p1", 0.0, 0.0, 50.0, 10.0),
            Placemark::new("p2", 5.0, 5.0, 49.0, 11.0),
            Placemark::new("p3", 10.0, 10.0, 48.0, 12.0),
        ];
        assert!(GcpGeoCoding::new(GcpMethod::Polynomial1, points, Datum::wgs84()).is_none());

        let too_few = vec![Placemark::new("p1", 0.0, 0.0, 50.0, 10.0)];
        assert!(GcpGeoCoding::new(GcpMethod::Polynomial1, too_few, Datum::wgs84()).is_none());
    }

    #[test]
    fn test_gcp_interpolation() {
        let points = vec![
            Placemark::new("p1", 0.0, 0.0, 50.0, 10.0),
            Placemark::new("p2", 100.0, 0.0, 50.0, 11.0),
            Placemark::new("p3", 0.0, 100.0, 49.0, 10.0),
        ];
        let gc = GcpGeoCoding::new(GcpMethod::Polynomial1, points, Datum::wgs84()).unwrap();
        let pos = GeoCoding::Gcp(gc).pixel_to_geo(50.0, 50.0).unwrap();
        assert_abs_diff_eq!(pos.lat, 49.5, epsilon = 1e-9);
        assert_abs_diff_eq!(pos.lon, 10.5, epsilon = 1e-9);
    }

    #[test]
    fn test_tie_point_interpolation_across_antimeridian() {
        let lat = Arc::new(array![[10.0f32, 10.0], [0.0, 0.0]]);
        let lon = Arc::new(array![[179.0f32, -179.0], [179.0, -179.0]]);
        let gc = GeoCoding::TiePoint(TiePointGeoCoding {
            lat_grid: "latitude".to_string(),
            lon_grid: "longitude".to_string(),
            datum: Datum::wgs84(),
            discontinuity: Discontinuity::derive(&lon),
            sampling: Some(TiePointSampling {
                offset_x: 0.5,
                offset_y: 0.5,
                sub_sampling_x: 10.0,
                sub_sampling_y: 10.0,
                lat,
                lon,
            }),
        });
        let pos = gc.pixel_to_geo(5.5, 5.5).unwrap();
        assert_abs_diff_eq!(pos.lat, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pos.lon.abs(), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_equivalence_is_per_variant() {
        let crs = GeoCoding::Crs(CrsGeoCoding {
            wkt: "GEOGCS[\"WGS84\"]".to_string(),
            image_to_map: AffineTransform::IDENTITY,
            geographic: true,
        });
        let mut other = crs.clone();
        assert!(crs.is_equivalent(&other));
        if let GeoCoding::Crs(ref mut g) = other {
            g.image_to_map.m02 = 1.0;
        }
        assert!(!crs.is_equivalent(&other));
    }
}
