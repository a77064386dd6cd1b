//! Source backed by a directory of JSON files, one subdirectory per stream.
//!
//! ```text
//! <root>/<stream_id>/members.json          [source_id, ...]
//! <root>/<stream_id>/pawprints/<id>.json   Pawprint
//! <root>/<stream_id>/phase_space.json      [PhaseSpaceRow, ...]
//! <root>/<stream_id>/photometry.json       [PhotometryRow, ...]
//! <root>/<stream_id>/abundances.json       [AbundanceRecord, ...]   (optional)
//! <root>/<stream_id>/crossmatches.json     [CrossmatchRecord, ...]  (optional)
//! ```
//!
//! Per-star tables are looked up by source id, so the source must be bound
//! to one stream with [`JsonDirectorySource::for_stream`] before fetching.
//! Every requested id must be listed in the bound stream's `members.json`;
//! a source bound to another stream fails with [`SourceError::ForeignStar`].
//! A star with two rows in one table is a malformed table.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::{
    index_rows, phase_space_from_rows, photometry_from_rows, AbundanceRecord, AbundanceSource,
    CrossmatchRecord, CrossmatchSource, FootprintSource, MembershipSource, PhaseSpaceRow,
    PhaseSpaceSource, PhotometryResult, PhotometryRow, PhotometrySource, SourceError,
};
use crate::catalog::PhaseSpace;
use crate::footprint::{Footprint, Pawprint};

#[derive(Debug, Clone)]
pub struct JsonDirectorySource {
    root: PathBuf,
    stream_id: Option<String>,
}

impl JsonDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stream_id: None,
        }
    }

    /// Bind per-star lookups to one stream's tables
    pub fn for_stream(&self, stream_id: &str) -> Self {
        Self {
            root: self.root.clone(),
            stream_id: Some(stream_id.to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stream_dir(&self, stream_id: &str) -> PathBuf {
        self.root.join(stream_id)
    }

    /// Path of a per-star table of the bound stream, once every requested
    /// star is known to belong to that stream
    fn table_path(&self, file_name: &str, source_ids: &[u64]) -> Result<PathBuf, SourceError> {
        let stream_id = self.stream_id.as_deref().ok_or_else(|| {
            SourceError::Unavailable("JSON source is not bound to a stream".to_string())
        })?;

        let members: Vec<u64> = Self::read_json(&self.stream_dir(stream_id).join("members.json"))?;
        let members: HashSet<u64> = members.into_iter().collect();
        if let Some(&source_id) = source_ids.iter().find(|id| !members.contains(id)) {
            return Err(SourceError::ForeignStar {
                stream_id: stream_id.to_string(),
                source_id,
            });
        }
        Ok(self.stream_dir(stream_id).join(file_name))
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SourceError> {
        if !path.exists() {
            return Err(SourceError::NotFound(path.display().to_string()));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Read a table that may legitimately be absent
    fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SourceError> {
        match Self::read_json(path) {
            Err(SourceError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }
}

impl MembershipSource for JsonDirectorySource {
    fn lookup_members(&self, stream_id: &str) -> Result<Vec<u64>, SourceError> {
        Self::read_json(&self.stream_dir(stream_id).join("members.json"))
    }
}

impl FootprintSource for JsonDirectorySource {
    fn lookup_footprint(
        &self,
        stream_id: &str,
        pawprint_id: &str,
    ) -> Result<Box<dyn Footprint>, SourceError> {
        let path = self
            .stream_dir(stream_id)
            .join("pawprints")
            .join(format!("{pawprint_id}.json"));
        let pawprint: Pawprint = Self::read_json(&path)?;

        if pawprint.stream_id != stream_id || pawprint.pawprint_id != pawprint_id {
            return Err(SourceError::Malformed(format!(
                "{} describes {}/{}",
                path.display(),
                pawprint.stream_id,
                pawprint.pawprint_id
            )));
        }
        Ok(Box::new(pawprint))
    }
}

impl PhaseSpaceSource for JsonDirectorySource {
    fn fetch_phase_space(&self, source_ids: &[u64]) -> Result<PhaseSpace, SourceError> {
        let rows: Vec<PhaseSpaceRow> =
            Self::read_json(&self.table_path("phase_space.json", source_ids)?)?;
        let rows = index_rows(rows, |row| row.source_id)?;
        Ok(phase_space_from_rows(source_ids, &rows))
    }
}

impl PhotometrySource for JsonDirectorySource {
    fn fetch_photometry(
        &self,
        source_ids: &[u64],
        bands: &[String],
    ) -> Result<PhotometryResult, SourceError> {
        let rows: Vec<PhotometryRow> =
            Self::read_json(&self.table_path("photometry.json", source_ids)?)?;
        let rows = index_rows(rows, |row| row.source_id)?;
        Ok(photometry_from_rows(source_ids, bands, &rows))
    }
}

impl AbundanceSource for JsonDirectorySource {
    fn fetch_abundances(&self, source_ids: &[u64]) -> Result<Vec<AbundanceRecord>, SourceError> {
        let records: Vec<AbundanceRecord> =
            Self::read_optional(&self.table_path("abundances.json", source_ids)?)?;
        let wanted: HashSet<u64> = source_ids.iter().copied().collect();
        Ok(records
            .into_iter()
            .filter(|record| wanted.contains(&record.source_id))
            .collect())
    }
}

impl CrossmatchSource for JsonDirectorySource {
    fn fetch_crossmatches(
        &self,
        source_ids: &[u64],
    ) -> Result<Vec<CrossmatchRecord>, SourceError> {
        let records: Vec<CrossmatchRecord> =
            Self::read_optional(&self.table_path("crossmatches.json", source_ids)?)?;
        let wanted: HashSet<u64> = source_ids.iter().copied().collect();
        Ok(records
            .into_iter()
            .filter(|record| wanted.contains(&record.source_id))
            .collect())
    }
}
