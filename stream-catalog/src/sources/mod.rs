//! External data sources consumed by the catalog.
//!
//! Each collaborator is a trait so catalogs can be built from a live archive,
//! a directory of JSON files ([`JsonDirectorySource`]) or fixtures held in
//! memory ([`InMemorySource`]). Every call is a blocking round trip; retries
//! belong to the caller.

mod json;
mod memory;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{Bibcode, PhaseSpace, RefCategory, VariabilityCode};
use crate::footprint::Footprint;

pub use json::JsonDirectorySource;
pub use memory::InMemorySource;

/// Failure reported by an external source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Source id {source_id} is not a member of stream {stream_id}")]
    ForeignStar { stream_id: String, source_id: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Resolves the ordered member list of a stream
pub trait MembershipSource: Send + Sync {
    fn lookup_members(&self, stream_id: &str) -> Result<Vec<u64>, SourceError>;
}

/// Resolves the footprint of a (stream, pawprint) pair
pub trait FootprintSource: Send + Sync {
    fn lookup_footprint(
        &self,
        stream_id: &str,
        pawprint_id: &str,
    ) -> Result<Box<dyn Footprint>, SourceError>;
}

/// Astrometry and phase-space coordinates, aligned with the requested ids
pub trait PhaseSpaceSource: Send + Sync {
    fn fetch_phase_space(&self, source_ids: &[u64]) -> Result<PhaseSpace, SourceError>;
}

/// Gaia photometry for the requested bands, aligned with the requested ids
pub trait PhotometrySource: Send + Sync {
    fn fetch_photometry(
        &self,
        source_ids: &[u64],
        bands: &[String],
    ) -> Result<PhotometryResult, SourceError>;
}

/// Sparse spectroscopic abundances
pub trait AbundanceSource: Send + Sync {
    fn fetch_abundances(&self, source_ids: &[u64]) -> Result<Vec<AbundanceRecord>, SourceError>;
}

/// Sparse identifiers of the same stars in other surveys
pub trait CrossmatchSource: Send + Sync {
    fn fetch_crossmatches(&self, source_ids: &[u64])
        -> Result<Vec<CrossmatchRecord>, SourceError>;
}

/// Magnitudes of one band, one entry per requested star
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandMeasurements {
    pub mag: Vec<Option<f32>>,
    pub mag_uncert: Vec<Option<f32>>,
}

/// Response of a [`PhotometrySource`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotometryResult {
    /// Per band; a band the source does not carry is absent
    pub bands: BTreeMap<String, BandMeasurements>,
    /// Gaia variability flags, when the source provides them
    #[serde(default)]
    pub variability: Option<Vec<VariabilityCode>>,
}

/// Chemistry of one star from a spectroscopic table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbundanceRecord {
    pub source_id: u64,
    #[serde(default)]
    pub feh: Option<f32>,
    #[serde(default)]
    pub feh_logeps: Option<f32>,
    #[serde(default)]
    pub feh_solar: Option<f32>,
    #[serde(default)]
    pub alpha_logeps: Option<f32>,
    #[serde(default)]
    pub alpha_fe: Option<f32>,
    #[serde(default)]
    pub alpha_solar: Option<f32>,
    /// Citations for the measurements in this record
    #[serde(default)]
    pub refs: BTreeMap<RefCategory, Vec<Bibcode>>,
}

impl AbundanceRecord {
    pub fn new(source_id: u64) -> Self {
        Self {
            source_id,
            ..Default::default()
        }
    }
}

/// Identifier of a star in another survey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossmatchRecord {
    pub source_id: u64,
    pub survey: String,
    pub external_id: String,
}

/// Phase-space measurements of one star, keyed by source id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseSpaceRow {
    pub source_id: u64,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
    pub pmra: Option<f64>,
    pub pmdec: Option<f64>,
    pub parallax: Option<f64>,
    pub radial_velocity: Option<f64>,
    pub ra_error: Option<f64>,
    pub dec_error: Option<f64>,
    pub pmra_error: Option<f64>,
    pub pmdec_error: Option<f64>,
    pub parallax_error: Option<f64>,
    pub radial_velocity_error: Option<f64>,
    pub phi1: Option<f64>,
    pub phi2: Option<f64>,
}

/// Photometry of one star, keyed by source id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotometryRow {
    pub source_id: u64,
    pub mags: BTreeMap<String, f32>,
    pub mag_uncert: BTreeMap<String, f32>,
    pub variability: Option<VariabilityCode>,
}

/// Key rows by source id. A star with two rows is malformed rather than
/// resolved by picking one of them.
fn index_rows<T>(
    rows: Vec<T>,
    source_id: impl Fn(&T) -> u64,
) -> Result<HashMap<u64, T>, SourceError> {
    let mut indexed = HashMap::with_capacity(rows.len());
    for row in rows {
        let id = source_id(&row);
        if indexed.insert(id, row).is_some() {
            return Err(SourceError::Malformed(format!(
                "duplicate row for source id {id}"
            )));
        }
    }
    Ok(indexed)
}

/// Align keyed phase-space rows with `source_ids`; stars without a row stay null
fn phase_space_from_rows(source_ids: &[u64], rows: &HashMap<u64, PhaseSpaceRow>) -> PhaseSpace {
    let mut phase_space = PhaseSpace::empty(source_ids.len());
    for (i, id) in source_ids.iter().enumerate() {
        let Some(row) = rows.get(id) else {
            continue;
        };
        phase_space.ra[i] = row.ra;
        phase_space.dec[i] = row.dec;
        phase_space.pmra[i] = row.pmra;
        phase_space.pmdec[i] = row.pmdec;
        phase_space.parallax[i] = row.parallax;
        phase_space.radial_velocity[i] = row.radial_velocity;
        phase_space.ra_error[i] = row.ra_error;
        phase_space.dec_error[i] = row.dec_error;
        phase_space.pmra_error[i] = row.pmra_error;
        phase_space.pmdec_error[i] = row.pmdec_error;
        phase_space.parallax_error[i] = row.parallax_error;
        phase_space.radial_velocity_error[i] = row.radial_velocity_error;
        phase_space.phi1[i] = row.phi1;
        phase_space.phi2[i] = row.phi2;
    }
    phase_space
}

/// Align keyed photometry rows with `source_ids`.
///
/// A band appears in the result only if at least one row carries it, so a
/// source that never measured a band reports it as missing.
fn photometry_from_rows(
    source_ids: &[u64],
    bands: &[String],
    rows: &HashMap<u64, PhotometryRow>,
) -> PhotometryResult {
    let mut result = PhotometryResult::default();

    for band in bands {
        if !rows.values().any(|row| row.mags.contains_key(band)) {
            continue;
        }
        let mut mag = Vec::with_capacity(source_ids.len());
        let mut mag_uncert = Vec::with_capacity(source_ids.len());
        for id in source_ids {
            let row = rows.get(id);
            mag.push(row.and_then(|r| r.mags.get(band).copied()));
            mag_uncert.push(row.and_then(|r| r.mag_uncert.get(band).copied()));
        }
        result
            .bands
            .insert(band.clone(), BandMeasurements { mag, mag_uncert });
    }

    if rows.values().any(|row| row.variability.is_some()) {
        result.variability = Some(
            source_ids
                .iter()
                .map(|id| {
                    rows.get(id)
                        .and_then(|row| row.variability)
                        .unwrap_or(VariabilityCode::NOT_VARIABLE)
                })
                .collect(),
        );
    }

    result
}

/// Borrowed set of every source needed to build a fully populated catalog
#[derive(Clone, Copy)]
pub struct DataSources<'a> {
    pub membership: &'a dyn MembershipSource,
    pub footprints: &'a dyn FootprintSource,
    pub phase_space: &'a dyn PhaseSpaceSource,
    pub photometry: &'a dyn PhotometrySource,
    pub abundances: &'a dyn AbundanceSource,
    pub crossmatches: Option<&'a dyn CrossmatchSource>,
}

impl<'a> DataSources<'a> {
    /// Use one object for every collaborator
    pub fn uniform<S>(source: &'a S) -> Self
    where
        S: MembershipSource
            + FootprintSource
            + PhaseSpaceSource
            + PhotometrySource
            + AbundanceSource
            + CrossmatchSource,
    {
        Self {
            membership: source,
            footprints: source,
            phase_space: source,
            photometry: source,
            abundances: source,
            crossmatches: Some(source),
        }
    }
}
