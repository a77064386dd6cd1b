//! Source backed by in-process tables.

use std::collections::{HashMap, HashSet};

use super::{
    index_rows, phase_space_from_rows, photometry_from_rows, AbundanceRecord, AbundanceSource,
    CrossmatchRecord, CrossmatchSource, FootprintSource, MembershipSource, PhaseSpaceRow,
    PhaseSpaceSource, PhotometryResult, PhotometryRow, PhotometrySource, SourceError,
};
use crate::catalog::PhaseSpace;
use crate::footprint::{Footprint, Pawprint};

/// Every collaborator held in memory.
///
/// Useful for fixtures and for callers that already hold query results.
/// Individual collaborators can be switched to failing with the `fail_*`
/// builders. Rows are kept as added, so a star given two phase-space or
/// photometry rows makes the fetch fail as malformed.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    members: HashMap<String, Vec<u64>>,
    pawprints: HashMap<(String, String), Pawprint>,
    phase_space: Vec<PhaseSpaceRow>,
    photometry: Vec<PhotometryRow>,
    abundances: HashMap<u64, AbundanceRecord>,
    crossmatches: Vec<CrossmatchRecord>,
    fail_phase_space: bool,
    fail_photometry: bool,
    fail_abundances: bool,
    fail_crossmatches: bool,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, stream_id: &str, members: Vec<u64>) -> Self {
        self.members.insert(stream_id.to_string(), members);
        self
    }

    pub fn with_pawprint(mut self, pawprint: Pawprint) -> Self {
        let key = (pawprint.stream_id.clone(), pawprint.pawprint_id.clone());
        self.pawprints.insert(key, pawprint);
        self
    }

    pub fn with_phase_space(mut self, row: PhaseSpaceRow) -> Self {
        self.phase_space.push(row);
        self
    }

    /// Record a sky position and proper motion for one star
    pub fn with_position(self, source_id: u64, ra: f64, dec: f64, pmra: f64, pmdec: f64) -> Self {
        self.with_phase_space(PhaseSpaceRow {
            source_id,
            ra: Some(ra),
            dec: Some(dec),
            pmra: Some(pmra),
            pmdec: Some(pmdec),
            ..Default::default()
        })
    }

    /// Record one band measurement for one star, extending its existing row
    pub fn with_magnitude(mut self, source_id: u64, band: &str, mag: f32, uncert: f32) -> Self {
        let position = match self.photometry.iter().position(|r| r.source_id == source_id) {
            Some(position) => position,
            None => {
                self.photometry.push(PhotometryRow {
                    source_id,
                    ..Default::default()
                });
                self.photometry.len() - 1
            }
        };
        let row = &mut self.photometry[position];
        row.mags.insert(band.to_string(), mag);
        row.mag_uncert.insert(band.to_string(), uncert);
        self
    }

    pub fn with_photometry(mut self, row: PhotometryRow) -> Self {
        self.photometry.push(row);
        self
    }

    pub fn with_abundance(mut self, record: AbundanceRecord) -> Self {
        self.abundances.insert(record.source_id, record);
        self
    }

    pub fn with_crossmatch(mut self, source_id: u64, survey: &str, external_id: &str) -> Self {
        self.crossmatches.push(CrossmatchRecord {
            source_id,
            survey: survey.to_string(),
            external_id: external_id.to_string(),
        });
        self
    }

    pub fn fail_phase_space(mut self) -> Self {
        self.fail_phase_space = true;
        self
    }

    pub fn fail_photometry(mut self) -> Self {
        self.fail_photometry = true;
        self
    }

    pub fn fail_abundances(mut self) -> Self {
        self.fail_abundances = true;
        self
    }

    pub fn fail_crossmatches(mut self) -> Self {
        self.fail_crossmatches = true;
        self
    }
}

impl MembershipSource for InMemorySource {
    fn lookup_members(&self, stream_id: &str) -> Result<Vec<u64>, SourceError> {
        self.members
            .get(stream_id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("stream {stream_id}")))
    }
}

impl FootprintSource for InMemorySource {
    fn lookup_footprint(
        &self,
        stream_id: &str,
        pawprint_id: &str,
    ) -> Result<Box<dyn Footprint>, SourceError> {
        self.pawprints
            .get(&(stream_id.to_string(), pawprint_id.to_string()))
            .map(|pawprint| Box::new(pawprint.clone()) as Box<dyn Footprint>)
            .ok_or_else(|| SourceError::NotFound(format!("pawprint {stream_id}/{pawprint_id}")))
    }
}

impl PhaseSpaceSource for InMemorySource {
    fn fetch_phase_space(&self, source_ids: &[u64]) -> Result<PhaseSpace, SourceError> {
        if self.fail_phase_space {
            return Err(SourceError::Unavailable("phase-space table".to_string()));
        }
        let rows = index_rows(self.phase_space.clone(), |row| row.source_id)?;
        Ok(phase_space_from_rows(source_ids, &rows))
    }
}

impl PhotometrySource for InMemorySource {
    fn fetch_photometry(
        &self,
        source_ids: &[u64],
        bands: &[String],
    ) -> Result<PhotometryResult, SourceError> {
        if self.fail_photometry {
            return Err(SourceError::Unavailable("photometry table".to_string()));
        }
        let rows = index_rows(self.photometry.clone(), |row| row.source_id)?;
        Ok(photometry_from_rows(source_ids, bands, &rows))
    }
}

impl AbundanceSource for InMemorySource {
    fn fetch_abundances(&self, source_ids: &[u64]) -> Result<Vec<AbundanceRecord>, SourceError> {
        if self.fail_abundances {
            return Err(SourceError::Unavailable("abundance table".to_string()));
        }
        Ok(source_ids
            .iter()
            .filter_map(|id| self.abundances.get(id).cloned())
            .collect())
    }
}

impl CrossmatchSource for InMemorySource {
    fn fetch_crossmatches(
        &self,
        source_ids: &[u64],
    ) -> Result<Vec<CrossmatchRecord>, SourceError> {
        if self.fail_crossmatches {
            return Err(SourceError::Unavailable("crossmatch table".to_string()));
        }
        let wanted: HashSet<u64> = source_ids.iter().copied().collect();
        Ok(self
            .crossmatches
            .iter()
            .filter(|record| wanted.contains(&record.source_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitudes_extend_one_row() {
        let source = InMemorySource::new()
            .with_magnitude(7, "gaia_g", 18.0, 0.01)
            .with_magnitude(7, "gaia_rp", 17.1, 0.02);
        let bands = vec!["gaia_g".to_string(), "gaia_rp".to_string()];
        let result = source.fetch_photometry(&[7], &bands).unwrap();
        assert_eq!(result.bands["gaia_g"].mag, vec![Some(18.0)]);
        assert_eq!(result.bands["gaia_rp"].mag, vec![Some(17.1)]);
    }

    #[test]
    fn test_repeated_phase_space_row_is_malformed() {
        let source = InMemorySource::new()
            .with_position(1, 10.0, 0.0, 1.0, 1.0)
            .with_position(1, 99.0, -5.0, 1.0, 1.0);
        assert!(matches!(
            source.fetch_phase_space(&[1]),
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn test_repeated_photometry_row_is_malformed() {
        let row = PhotometryRow {
            source_id: 3,
            ..Default::default()
        };
        let source = InMemorySource::new()
            .with_photometry(row.clone())
            .with_photometry(row);
        assert!(matches!(
            source.fetch_photometry(&[3], &["gaia_g".to_string()]),
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn test_failing_crossmatches() {
        let source = InMemorySource::new()
            .with_crossmatch(1, "2mass", "J1")
            .fail_crossmatches();
        assert!(matches!(
            source.fetch_crossmatches(&[1]),
            Err(SourceError::Unavailable(_))
        ));
    }
}
