//! JSON persistence of stream catalogs.
//!
//! Every per-star array, the population flags and the derived masks are
//! written. The pawprint is stored by ID only and resolved again through a
//! [`FootprintSource`] on load.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::{
    index_source_ids, BandPhotometry, Chemistry, DerivedCatalog, PhaseSpace, References,
    StarCatalog, StreamCatalog, VariabilityCode,
};
use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::sources::FootprintSource;

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    stream_id: String,
    pawprint_id: String,
    source_id_version: u16,
    source_id: Vec<u64>,
    bands: Vec<String>,
    crossmatches: Vec<BTreeMap<String, String>>,
    coordinates_populated: bool,
    phase_space: PhaseSpace,
    photometry_populated: bool,
    photometry: BTreeMap<String, BandPhotometry>,
    variability: Vec<VariabilityCode>,
    chemistry: Chemistry,
    refs: References,
    #[serde(default)]
    masks: BTreeMap<String, Vec<bool>>,
}

fn corrupt(msg: String) -> CatalogError {
    CatalogError::CorruptCatalog(msg)
}

fn check_len(name: &str, len: usize, nstars: usize) -> Result<(), CatalogError> {
    if len != nstars {
        return Err(corrupt(format!(
            "{name} has {len} entries, expected {nstars}"
        )));
    }
    Ok(())
}

impl CatalogFile {
    fn from_catalog(catalog: &StreamCatalog) -> Self {
        let data = &catalog.data;
        Self {
            stream_id: data.stream_id.clone(),
            pawprint_id: data.pawprint_id.clone(),
            source_id_version: data.source_id_version,
            source_id: data.source_id.clone(),
            bands: data.bands.clone(),
            crossmatches: data.crossmatches.clone(),
            coordinates_populated: data.coordinates_populated,
            phase_space: data.phase_space.clone(),
            photometry_populated: data.photometry_populated,
            photometry: data.photometry.clone(),
            variability: data.variability.clone(),
            chemistry: data.chemistry.clone(),
            refs: data.refs.clone(),
            masks: catalog.derived.masks.clone(),
        }
    }

    /// Reject files whose arrays disagree with the member list
    fn validate(&self) -> Result<HashMap<u64, usize>, CatalogError> {
        let nstars = self.source_id.len();
        let index = index_source_ids(&self.source_id)
            .map_err(|dup| corrupt(format!("duplicate source id {dup}")))?;

        CatalogConfig {
            source_id_version: self.source_id_version,
            bands: self.bands.clone(),
        }
        .validate()?;

        check_len("crossmatches", self.crossmatches.len(), nstars)?;
        check_len("variability", self.variability.len(), nstars)?;
        if let Some(column) = self.phase_space.mismatched_column(nstars) {
            return Err(corrupt(format!(
                "phase space column {column} does not have {nstars} entries"
            )));
        }
        for (name, column) in self.chemistry.columns() {
            check_len(name, column.len(), nstars)?;
        }
        self.refs.check_len(nstars)?;

        if self.photometry.len() != self.bands.len() {
            return Err(corrupt(format!(
                "photometry bands {:?} do not match configured bands {:?}",
                self.photometry.keys().collect::<Vec<_>>(),
                self.bands
            )));
        }
        for band in &self.bands {
            let photometry = self
                .photometry
                .get(band)
                .ok_or_else(|| corrupt(format!("photometry for band {band} missing")))?;
            if !photometry.has_len(nstars) {
                return Err(corrupt(format!(
                    "photometry for band {band} does not have {nstars} entries"
                )));
            }
        }

        for (criterion, mask) in &self.masks {
            check_len(&format!("mask {criterion:?}"), mask.len(), nstars)?;
        }
        Ok(index)
    }
}

impl StreamCatalog {
    /// Save catalog and derived masks to a JSON file, creating parent directories
    pub fn save_to_file(&self, path: &Path) -> Result<(), CatalogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&CatalogFile::from_catalog(self))?;
        std::fs::write(path, json)?;
        info!(
            "Saved {}/{} ({} stars) to {}",
            self.data.stream_id,
            self.data.pawprint_id,
            self.data.nstars(),
            path.display()
        );
        Ok(())
    }

    /// Load a catalog saved with [`StreamCatalog::save_to_file`].
    ///
    /// # Errors
    ///
    /// * `CorruptCatalog` - array lengths disagree or source ids repeat
    /// * `PawprintNotFound` - the pawprint can no longer be resolved
    pub fn from_file(path: &Path, footprints: &dyn FootprintSource) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&json)?;
        let index = file.validate()?;

        let pawprint = footprints
            .lookup_footprint(&file.stream_id, &file.pawprint_id)
            .map_err(|source| CatalogError::PawprintNotFound {
                stream_id: file.stream_id.clone(),
                pawprint_id: file.pawprint_id.clone(),
                source,
            })?;

        let nstars = file.source_id.len();
        let derived = DerivedCatalog {
            stream_id: file.stream_id.clone(),
            pawprint_id: file.pawprint_id.clone(),
            nstars,
            masks: file.masks,
        };
        let data = StarCatalog {
            stream_id: file.stream_id,
            pawprint_id: file.pawprint_id,
            source_id_version: file.source_id_version,
            source_id: file.source_id,
            index,
            bands: file.bands,
            crossmatches: file.crossmatches,
            phase_space: file.phase_space,
            coordinates_populated: file.coordinates_populated,
            photometry: file.photometry,
            photometry_populated: file.photometry_populated,
            variability: file.variability,
            chemistry: file.chemistry,
            refs: file.refs,
            pawprint,
        };

        info!(
            "Loaded {}/{} ({nstars} stars) from {}",
            data.stream_id,
            data.pawprint_id,
            path.display()
        );
        Ok(Self { data, derived })
    }
}
