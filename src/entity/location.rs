//! Fixed-point coordinates

/// Nanodegrees per degree, the resolution coordinates are stored at on the
/// wire before granularity scaling.
pub const NANODEGREE_RESOLUTION: i64 = 1_000_000_000;

/// Fixed-point scale of decoded coordinates. One unit is 1e-7 degrees,
/// roughly 1.11cm at the equator.
pub const COORDINATE_PRECISION: i64 = 10_000_000;

const UNDEFINED: i32 = i32::MAX;

/// A longitude/latitude pair in fixed-point 1e-7 degree units.
///
/// Invisible nodes carry the undefined sentinel; check [`Location::is_defined`]
/// before interpreting the coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    lon: i32,
    lat: i32,
}

impl Location {
    #[inline]
    pub const fn new(lon: i32, lat: i32) -> Location {
        Location { lon, lat }
    }

    #[inline]
    pub const fn undefined() -> Location {
        Location {
            lon: UNDEFINED,
            lat: UNDEFINED,
        }
    }

    #[inline]
    pub const fn is_defined(&self) -> bool {
        self.lon != UNDEFINED || self.lat != UNDEFINED
    }

    /// Raw fixed-point longitude.
    #[inline]
    pub const fn lon_fixed(&self) -> i32 {
        self.lon
    }

    /// Raw fixed-point latitude.
    #[inline]
    pub const fn lat_fixed(&self) -> i32 {
        self.lat
    }

    /// Longitude in degrees.
    #[inline]
    pub fn lon(&self) -> f64 {
        self.lon as f64 / COORDINATE_PRECISION as f64
    }

    /// Latitude in degrees.
    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat as f64 / COORDINATE_PRECISION as f64
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::undefined()
    }
}
