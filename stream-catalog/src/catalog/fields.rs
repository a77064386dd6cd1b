//! Typed per-star columns.
//!
//! Nullable measurements are `Option` values; `None` means "not measured"
//! and is never conflated with a measured zero.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::schema::BIBCODE_LEN;

/// Variability flag of a star. 0 is not variable, 1 is variable; other codes
/// are reserved for finer classifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariabilityCode(pub u16);

impl VariabilityCode {
    pub const NOT_VARIABLE: Self = Self(0);
    pub const VARIABLE: Self = Self(1);

    pub fn is_variable(self) -> bool {
        self != Self::NOT_VARIABLE
    }
}

/// ADS bibcode (or other short citation key) of at most 19 ASCII bytes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bibcode(String);

impl Bibcode {
    pub fn new(code: impl Into<String>) -> Result<Self, CatalogError> {
        let code = code.into();
        if code.is_empty() || code.len() > BIBCODE_LEN || !code.is_ascii() {
            return Err(CatalogError::InvalidBibcode(code));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Bibcode {
    type Error = CatalogError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

impl From<Bibcode> for String {
    fn from(code: Bibcode) -> Self {
        code.0
    }
}

impl fmt::Display for Bibcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Measurement category a citation supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RefCategory {
    #[serde(rename = "distance")]
    Distance,
    #[serde(rename = "rv")]
    RadialVelocity,
    #[serde(rename = "feh")]
    Metallicity,
    #[serde(rename = "alpha")]
    Alpha,
    #[serde(rename = "variability")]
    Variability,
    #[serde(rename = "extinction")]
    Extinction,
}

impl RefCategory {
    pub const ALL: [RefCategory; 6] = [
        RefCategory::Distance,
        RefCategory::RadialVelocity,
        RefCategory::Metallicity,
        RefCategory::Alpha,
        RefCategory::Variability,
        RefCategory::Extinction,
    ];

    /// Name of the matching `refs.*` schema field
    pub fn field_name(self) -> &'static str {
        match self {
            RefCategory::Distance => "distance",
            RefCategory::RadialVelocity => "rv",
            RefCategory::Metallicity => "feh",
            RefCategory::Alpha => "alpha",
            RefCategory::Variability => "variability",
            RefCategory::Extinction => "extinction",
        }
    }
}

/// Per-star citation lists for every [`RefCategory`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct References {
    by_category: BTreeMap<RefCategory, Vec<Vec<Bibcode>>>,
}

impl References {
    /// Empty citation lists for `nstars` stars in every category
    pub fn new(nstars: usize) -> Self {
        let by_category = RefCategory::ALL
            .iter()
            .map(|&category| (category, vec![Vec::new(); nstars]))
            .collect();
        Self { by_category }
    }

    /// Citation lists of one category, indexed by star
    pub fn category(&self, category: RefCategory) -> &[Vec<Bibcode>] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Citations of one category for one star
    pub fn get(&self, category: RefCategory, index: usize) -> &[Bibcode] {
        self.category(category)
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn set(&mut self, category: RefCategory, index: usize, citations: Vec<Bibcode>) {
        if let Some(slot) = self
            .by_category
            .get_mut(&category)
            .and_then(|column| column.get_mut(index))
        {
            *slot = citations;
        }
    }

    /// Length check used when restoring from disk
    pub(crate) fn check_len(&self, nstars: usize) -> Result<(), CatalogError> {
        for category in RefCategory::ALL {
            match self.by_category.get(&category) {
                Some(column) if column.len() == nstars => {}
                Some(column) => {
                    return Err(CatalogError::CorruptCatalog(format!(
                        "refs.{} has {} entries, expected {nstars}",
                        category.field_name(),
                        column.len()
                    )))
                }
                None => {
                    return Err(CatalogError::CorruptCatalog(format!(
                        "refs.{} missing",
                        category.field_name()
                    )))
                }
            }
        }
        Ok(())
    }
}

/// Consensus chemistry, one nullable value per star in each column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chemistry {
    /// Iron abundance as [Fe/H]
    pub feh: Vec<Option<f32>>,
    /// Sun-independent iron abundance
    pub feh_logeps: Vec<Option<f32>>,
    /// Solar iron value adopted for this star
    pub feh_solar: Vec<Option<f32>>,
    /// Sun-independent alpha abundance
    pub alpha_logeps: Vec<Option<f32>>,
    /// Alpha abundance as [alpha/Fe]
    pub alpha_fe: Vec<Option<f32>>,
    /// Solar alpha value adopted for this star
    pub alpha_solar: Vec<Option<f32>>,
}

impl Chemistry {
    pub fn empty(nstars: usize) -> Self {
        Self {
            feh: vec![None; nstars],
            feh_logeps: vec![None; nstars],
            feh_solar: vec![None; nstars],
            alpha_logeps: vec![None; nstars],
            alpha_fe: vec![None; nstars],
            alpha_solar: vec![None; nstars],
        }
    }

    /// Columns with their schema names
    pub fn columns(&self) -> [(&'static str, &[Option<f32>]); 6] {
        [
            ("feh", self.feh.as_slice()),
            ("feh_logeps", self.feh_logeps.as_slice()),
            ("feh_solar", self.feh_solar.as_slice()),
            ("alpha_logeps", self.alpha_logeps.as_slice()),
            ("alpha_fe", self.alpha_fe.as_slice()),
            ("alpha_solar", self.alpha_solar.as_slice()),
        ]
    }
}

/// Astrometry and phase-space coordinates. Positions in degrees, proper
/// motions in mas/yr, parallax in mas, radial velocity in km/s.
///
/// `phi1`/`phi2` are stream-frame coordinates precomputed by the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpace {
    pub ra: Vec<Option<f64>>,
    pub dec: Vec<Option<f64>>,
    pub pmra: Vec<Option<f64>>,
    pub pmdec: Vec<Option<f64>>,
    pub parallax: Vec<Option<f64>>,
    pub radial_velocity: Vec<Option<f64>>,
    pub ra_error: Vec<Option<f64>>,
    pub dec_error: Vec<Option<f64>>,
    pub pmra_error: Vec<Option<f64>>,
    pub pmdec_error: Vec<Option<f64>>,
    pub parallax_error: Vec<Option<f64>>,
    pub radial_velocity_error: Vec<Option<f64>>,
    pub phi1: Vec<Option<f64>>,
    pub phi2: Vec<Option<f64>>,
}

impl PhaseSpace {
    pub fn empty(nstars: usize) -> Self {
        Self {
            ra: vec![None; nstars],
            dec: vec![None; nstars],
            pmra: vec![None; nstars],
            pmdec: vec![None; nstars],
            parallax: vec![None; nstars],
            radial_velocity: vec![None; nstars],
            ra_error: vec![None; nstars],
            dec_error: vec![None; nstars],
            pmra_error: vec![None; nstars],
            pmdec_error: vec![None; nstars],
            parallax_error: vec![None; nstars],
            radial_velocity_error: vec![None; nstars],
            phi1: vec![None; nstars],
            phi2: vec![None; nstars],
        }
    }

    /// Columns with their schema names
    pub fn columns(&self) -> [(&'static str, &[Option<f64>]); 14] {
        [
            ("ra", self.ra.as_slice()),
            ("dec", self.dec.as_slice()),
            ("pmra", self.pmra.as_slice()),
            ("pmdec", self.pmdec.as_slice()),
            ("parallax", self.parallax.as_slice()),
            ("radial_velocity", self.radial_velocity.as_slice()),
            ("ra_error", self.ra_error.as_slice()),
            ("dec_error", self.dec_error.as_slice()),
            ("pmra_error", self.pmra_error.as_slice()),
            ("pmdec_error", self.pmdec_error.as_slice()),
            ("parallax_error", self.parallax_error.as_slice()),
            ("radial_velocity_error", self.radial_velocity_error.as_slice()),
            ("phi1", self.phi1.as_slice()),
            ("phi2", self.phi2.as_slice()),
        ]
    }

    fn columns_mut(&mut self) -> [&mut Vec<Option<f64>>; 14] {
        [
            &mut self.ra,
            &mut self.dec,
            &mut self.pmra,
            &mut self.pmdec,
            &mut self.parallax,
            &mut self.radial_velocity,
            &mut self.ra_error,
            &mut self.dec_error,
            &mut self.pmra_error,
            &mut self.pmdec_error,
            &mut self.parallax_error,
            &mut self.radial_velocity_error,
            &mut self.phi1,
            &mut self.phi2,
        ]
    }

    /// Replace NaN and infinite values with `None` in every column
    pub(crate) fn null_non_finite(&mut self) {
        for column in self.columns_mut() {
            for value in column.iter_mut() {
                if matches!(value, Some(x) if !x.is_finite()) {
                    *value = None;
                }
            }
        }
    }

    /// Name of the first column whose length differs from `nstars`
    pub(crate) fn mismatched_column(&self, nstars: usize) -> Option<&'static str> {
        self.columns()
            .into_iter()
            .find(|(_, column)| column.len() != nstars)
            .map(|(name, _)| name)
    }
}

/// Magnitude, uncertainty and extinction of one band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandPhotometry {
    pub mag: Vec<Option<f32>>,
    pub mag_uncert: Vec<Option<f32>>,
    pub ext: Vec<Option<f32>>,
}

impl BandPhotometry {
    pub fn empty(nstars: usize) -> Self {
        Self {
            mag: vec![None; nstars],
            mag_uncert: vec![None; nstars],
            ext: vec![None; nstars],
        }
    }

    pub(crate) fn has_len(&self, nstars: usize) -> bool {
        self.mag.len() == nstars && self.mag_uncert.len() == nstars && self.ext.len() == nstars
    }
}
