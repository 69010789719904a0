//! Manisa service-area locations for realistic fixtures.
//!
//! Raw appointment sheets write coordinates latitude first, often with
//! trailing zeros and a `;` separator; [`Site::raw`] reproduces that form.

#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub name: &'static str,
    pub zone: &'static str,
    pub lat: f64,
    pub lon: f64,
}

impl Site {
    pub const fn new(name: &'static str, zone: &'static str, lat: f64, lon: f64) -> Self {
        Self { name, zone, lat, lon }
    }

    /// `"lat;lon"` with seven decimals, as exported by the report.
    pub fn raw(&self) -> String {
        format!("{:.7};{:.7}", self.lat, self.lon)
    }

    /// Canonical `"lon,lat"` key.
    pub fn key(&self) -> String {
        dispatch_prep::coordinate::canonical_from_lat_lon(&self.raw()).expect("fixture coordinate")
    }
}

/// Dispatch office, `"lon,lat"`.
pub const OFFICE: &str = "27.436587,38.626512";
pub const OFFICE_ZONE: &str = "ŞEHZADELER";

pub const SITES: &[Site] = &[
    Site::new("Sehzadeler Merkez", "ŞEHZADELER", 38.6138, 27.4296),
    Site::new("Yunusemre Muradiye", "YUNUSEMRE", 38.6562, 27.3528),
    Site::new("Yunusemre Laleli", "YUNUSEMRE", 38.6205, 27.4019),
    Site::new("Turgutlu Merkez", "TURGUTLU", 38.4956, 27.7047),
    Site::new("Akhisar Merkez", "AKHİSAR", 38.9187, 27.8389),
    Site::new("Salihli Merkez", "SALİHLİ", 38.4833, 28.1378),
];
