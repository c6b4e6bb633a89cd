//! Planar CRS projection for WGS84 input coordinates.
//!
//! Linear referencing and step distances are computed in meters, so every
//! geometry (route, stops, fixes) is projected into one planar CRS before any
//! matching runs. The CRS is resolved once from an EPSG code; an unsupported
//! code is a fatal configuration error, surfaced before processing begins.
//!
//! Supported codes:
//! - **EPSG:3857** Web Mercator (spherical formulas)
//! - **EPSG:32601-32660 / 32701-32760** WGS84 UTM zones (northern / southern)

use geo::Coord;

use crate::error::{Result, StopMatchError};

/// WGS84 equatorial radius in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// WGS84 flattening.
const FLATTENING: f64 = 1.0 / 298.257_223_563;

/// UTM central meridian scale factor.
const UTM_SCALE: f64 = 0.9996;

/// UTM false easting / southern-hemisphere false northing in meters.
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING: f64 = 10_000_000.0;

/// A planar coordinate reference system resolved from an EPSG code.
///
/// All projection in a run goes through a single `PlanarCrs` value, so the
/// route, the stops and the fixes are guaranteed to agree on the CRS by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanarCrs {
    /// EPSG:3857
    WebMercator,
    /// EPSG:326xx (north) / 327xx (south)
    Utm { zone: u8, south: bool },
}

impl PlanarCrs {
    /// Resolve a planar CRS from an EPSG code.
    ///
    /// # Example
    /// ```
    /// use stop_matcher::PlanarCrs;
    /// assert!(PlanarCrs::from_epsg(3857).is_ok());
    /// assert!(PlanarCrs::from_epsg(32650).is_ok()); // UTM zone 50N
    /// assert!(PlanarCrs::from_epsg(4326).is_err()); // not planar
    /// ```
    pub fn from_epsg(epsg: u32) -> Result<Self> {
        match epsg {
            3857 => Ok(PlanarCrs::WebMercator),
            32601..=32660 => Ok(PlanarCrs::Utm {
                zone: (epsg - 32600) as u8,
                south: false,
            }),
            32701..=32760 => Ok(PlanarCrs::Utm {
                zone: (epsg - 32700) as u8,
                south: true,
            }),
            _ => Err(StopMatchError::UnsupportedCrs { epsg }),
        }
    }

    /// Project a WGS84 (longitude, latitude) pair to planar meters.
    pub fn project(&self, lon: f64, lat: f64) -> Coord<f64> {
        match *self {
            PlanarCrs::WebMercator => lon_lat_to_web_merc(lon, lat),
            PlanarCrs::Utm { zone, south } => lon_lat_to_utm(lon, lat, zone, south),
        }
    }
}

/// Convert lon/lat (EPSG:4326) to Web Mercator (EPSG:3857) meters.
fn lon_lat_to_web_merc(lon: f64, lat: f64) -> Coord<f64> {
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Coord { x, y }
}

/// Convert lon/lat to UTM meters using the standard WGS84 transverse
/// Mercator series expansion.
fn lon_lat_to_utm(lon: f64, lat: f64, zone: u8, south: bool) -> Coord<f64> {
    let e2 = FLATTENING * (2.0 - FLATTENING);
    let ep2 = e2 / (1.0 - e2);

    let phi = lat.to_radians();
    let lon0 = (zone as f64 * 6.0 - 183.0).to_radians();

    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let tan_phi = phi.tan();

    let n = EARTH_RADIUS / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * (lon.to_radians() - lon0);

    // Meridional arc length
    let m = EARTH_RADIUS
        * ((1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e2 * e2 / 32.0 + 45.0 * e2 * e2 * e2 / 1024.0)
                * (2.0 * phi).sin()
            + (15.0 * e2 * e2 / 256.0 + 45.0 * e2 * e2 * e2 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e2 * e2 * e2 / 3072.0) * (6.0 * phi).sin());

    let x = UTM_SCALE
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;

    let mut y = UTM_SCALE
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    if south {
        y += UTM_FALSE_NORTHING;
    }

    Coord { x, y }
}
