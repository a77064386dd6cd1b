//! Per-stream star catalogs.
//!
//! A [`StarCatalog`] owns the measured per-star arrays of one
//! (stream, pawprint) pair. Its length is fixed at construction from the
//! stream membership list and every array keeps exactly that many entries:
//! index `i` always refers to `source_ids()[i]`.
//!
//! Population calls are all-or-nothing. Results are validated and staged
//! before anything is swapped in, so a failing source leaves the catalog as
//! it was.

mod fields;
mod io;

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, info, warn};

use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::footprint::Footprint;
use crate::mask::compute_mask;
use crate::sources::{
    AbundanceSource, CrossmatchSource, DataSources, FootprintSource, MembershipSource,
    PhaseSpaceSource, PhotometrySource, SourceError,
};

pub use fields::{
    BandPhotometry, Bibcode, Chemistry, PhaseSpace, RefCategory, References, VariabilityCode,
};

/// Map each source id to its position, failing on the first duplicate
fn index_source_ids(source_ids: &[u64]) -> Result<HashMap<u64, usize>, u64> {
    let mut index = HashMap::with_capacity(source_ids.len());
    for (i, &id) in source_ids.iter().enumerate() {
        if index.insert(id, i).is_some() {
            return Err(id);
        }
    }
    Ok(index)
}

/// Non-finite measurements are stored as "not measured"
fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|x| x.is_finite())
}

fn finite_or_null(values: Vec<Option<f32>>) -> Vec<Option<f32>> {
    values.into_iter().map(finite).collect()
}

/// Measured attributes of the stars of one stream inside one pawprint
#[derive(Debug)]
pub struct StarCatalog {
    stream_id: String,
    pawprint_id: String,
    source_id_version: u16,
    source_id: Vec<u64>,
    index: HashMap<u64, usize>,
    bands: Vec<String>,
    crossmatches: Vec<BTreeMap<String, String>>,
    phase_space: PhaseSpace,
    coordinates_populated: bool,
    photometry: BTreeMap<String, BandPhotometry>,
    photometry_populated: bool,
    variability: Vec<VariabilityCode>,
    chemistry: Chemistry,
    refs: References,
    pawprint: Box<dyn Footprint>,
}

impl StarCatalog {
    /// Construct with the default configuration (Gaia DR3, Gaia G and RP)
    pub fn new(
        stream_id: &str,
        pawprint_id: &str,
        membership: &dyn MembershipSource,
        footprints: &dyn FootprintSource,
    ) -> Result<Self, CatalogError> {
        Self::with_config(
            stream_id,
            pawprint_id,
            membership,
            footprints,
            &CatalogConfig::default(),
        )
    }

    /// Resolve the stream members and the pawprint, then allocate every
    /// per-star array with null sentinels.
    ///
    /// # Errors
    ///
    /// * `MembershipLookup` - the stream is unknown, the source failed, or it
    ///   returned duplicate source ids
    /// * `PawprintNotFound` - no footprint exists for the pair
    /// * `UnknownField` - the config names an unregistered band
    pub fn with_config(
        stream_id: &str,
        pawprint_id: &str,
        membership: &dyn MembershipSource,
        footprints: &dyn FootprintSource,
        config: &CatalogConfig,
    ) -> Result<Self, CatalogError> {
        config.validate()?;

        let membership_error = |source| CatalogError::MembershipLookup {
            stream_id: stream_id.to_string(),
            source,
        };

        let source_id = membership
            .lookup_members(stream_id)
            .map_err(membership_error)?;
        let index = index_source_ids(&source_id).map_err(|dup| {
            membership_error(SourceError::Malformed(format!(
                "duplicate source id {dup}"
            )))
        })?;

        let pawprint = footprints
            .lookup_footprint(stream_id, pawprint_id)
            .map_err(|source| CatalogError::PawprintNotFound {
                stream_id: stream_id.to_string(),
                pawprint_id: pawprint_id.to_string(),
                source,
            })?;

        let nstars = source_id.len();
        info!(
            "Allocated catalog for {stream_id}/{pawprint_id}: {nstars} stars, {} regions",
            pawprint.region_count()
        );

        Ok(Self {
            stream_id: stream_id.to_string(),
            pawprint_id: pawprint_id.to_string(),
            source_id_version: config.source_id_version,
            source_id,
            index,
            bands: config.bands.clone(),
            crossmatches: vec![BTreeMap::new(); nstars],
            phase_space: PhaseSpace::empty(nstars),
            coordinates_populated: false,
            photometry: config
                .bands
                .iter()
                .map(|band| (band.clone(), BandPhotometry::empty(nstars)))
                .collect(),
            photometry_populated: false,
            variability: vec![VariabilityCode::NOT_VARIABLE; nstars],
            chemistry: Chemistry::empty(nstars),
            refs: References::new(nstars),
            pawprint,
        })
    }

    /// Fill astrometry and phase-space coordinates. Non-finite values are
    /// stored as "not measured".
    pub fn populate_phase_space(
        &mut self,
        source: &dyn PhaseSpaceSource,
    ) -> Result<(), CatalogError> {
        let mut phase_space = source
            .fetch_phase_space(&self.source_id)
            .map_err(CatalogError::PhaseSpaceSource)?;

        if let Some(column) = phase_space.mismatched_column(self.nstars()) {
            return Err(CatalogError::PhaseSpaceSource(SourceError::Malformed(
                format!("column {column} does not have {} entries", self.nstars()),
            )));
        }
        phase_space.null_non_finite();

        let positioned = phase_space
            .ra
            .iter()
            .zip(&phase_space.dec)
            .filter(|(ra, dec)| ra.is_some() && dec.is_some())
            .count();
        info!(
            "Populated phase space for {}/{}: {positioned}/{} stars with positions",
            self.stream_id,
            self.pawprint_id,
            self.nstars()
        );

        self.phase_space = phase_space;
        self.coordinates_populated = true;
        Ok(())
    }

    /// Fill magnitudes and uncertainties for every configured band.
    ///
    /// Magnitudes are stored as 32-bit floats; non-finite values are stored
    /// as "not measured". Variability flags are updated when the source
    /// provides them. Extinction is left untouched.
    pub fn populate_photometry(&mut self, source: &dyn PhotometrySource) -> Result<(), CatalogError> {
        let nstars = self.nstars();
        let malformed =
            |msg: String| CatalogError::PhotometrySource(SourceError::Malformed(msg));

        let mut result = source
            .fetch_photometry(&self.source_id, &self.bands)
            .map_err(CatalogError::PhotometrySource)?;

        let mut staged = BTreeMap::new();
        for band in &self.bands {
            let measured = result
                .bands
                .remove(band)
                .ok_or_else(|| malformed(format!("band {band} missing from response")))?;
            if measured.mag.len() != nstars || measured.mag_uncert.len() != nstars {
                return Err(malformed(format!(
                    "band {band} does not have {nstars} entries"
                )));
            }

            let ext = self
                .photometry
                .get(band)
                .map(|p| p.ext.clone())
                .unwrap_or_else(|| vec![None; nstars]);
            staged.insert(
                band.clone(),
                BandPhotometry {
                    mag: finite_or_null(measured.mag),
                    mag_uncert: finite_or_null(measured.mag_uncert),
                    ext,
                },
            );
        }

        let variability = match result.variability {
            Some(flags) if flags.len() != nstars => {
                return Err(malformed(format!(
                    "variability does not have {nstars} entries"
                )))
            }
            Some(flags) => flags,
            None => self.variability.clone(),
        };

        if !result.bands.is_empty() {
            debug!(
                "Ignoring unrequested bands: {:?}",
                result.bands.keys().collect::<Vec<_>>()
            );
        }
        info!(
            "Populated photometry for {}/{}: bands {:?}",
            self.stream_id, self.pawprint_id, self.bands
        );

        self.photometry = staged;
        self.variability = variability;
        self.photometry_populated = true;
        Ok(())
    }

    /// Fill chemistry and citations for stars with spectroscopic measurements.
    ///
    /// Stars without a record keep their current values. Records for stars
    /// outside the catalog are ignored.
    pub fn populate_abundances(&mut self, source: &dyn AbundanceSource) -> Result<(), CatalogError> {
        let records = source
            .fetch_abundances(&self.source_id)
            .map_err(CatalogError::AbundanceSource)?;

        let mut chemistry = self.chemistry.clone();
        let mut refs = self.refs.clone();
        let mut seen = HashSet::new();
        let mut matched = 0usize;

        for record in records {
            if !seen.insert(record.source_id) {
                return Err(CatalogError::AbundanceSource(SourceError::Malformed(
                    format!("duplicate record for source id {}", record.source_id),
                )));
            }
            let Some(&i) = self.index.get(&record.source_id) else {
                warn!(
                    "Ignoring abundances for source id {} outside stream {}",
                    record.source_id, self.stream_id
                );
                continue;
            };

            chemistry.feh[i] = finite(record.feh);
            chemistry.feh_logeps[i] = finite(record.feh_logeps);
            chemistry.feh_solar[i] = finite(record.feh_solar);
            chemistry.alpha_logeps[i] = finite(record.alpha_logeps);
            chemistry.alpha_fe[i] = finite(record.alpha_fe);
            chemistry.alpha_solar[i] = finite(record.alpha_solar);
            for (category, citations) in record.refs {
                refs.set(category, i, citations);
            }
            matched += 1;
        }

        info!(
            "Populated abundances for {}/{}: {matched}/{} stars matched",
            self.stream_id,
            self.pawprint_id,
            self.nstars()
        );

        self.chemistry = chemistry;
        self.refs = refs;
        Ok(())
    }

    /// Record identifiers of the catalog stars in other surveys
    pub fn populate_crossmatches(
        &mut self,
        source: &dyn CrossmatchSource,
    ) -> Result<(), CatalogError> {
        let records = source
            .fetch_crossmatches(&self.source_id)
            .map_err(CatalogError::CrossmatchSource)?;

        let mut crossmatches = self.crossmatches.clone();
        for record in records {
            match self.index.get(&record.source_id) {
                Some(&i) => {
                    crossmatches[i].insert(record.survey, record.external_id);
                }
                None => warn!(
                    "Ignoring {} crossmatch for source id {} outside stream {}",
                    record.survey, record.source_id, self.stream_id
                ),
            }
        }

        self.crossmatches = crossmatches;
        Ok(())
    }

    /// Boolean selection over the stars, see [`compute_mask`]
    pub fn make_mask(&self, criterion: &str) -> Result<Vec<bool>, CatalogError> {
        compute_mask(self, criterion)
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn pawprint_id(&self) -> &str {
        &self.pawprint_id
    }

    /// Gaia data release the source ids refer to
    pub fn source_id_version(&self) -> u16 {
        self.source_id_version
    }

    /// Number of stars; fixed for the life of the catalog
    pub fn nstars(&self) -> usize {
        self.source_id.len()
    }

    pub fn source_ids(&self) -> &[u64] {
        &self.source_id
    }

    /// Position of a star in every per-star array
    pub fn index_of(&self, source_id: u64) -> Option<usize> {
        self.index.get(&source_id).copied()
    }

    /// Configured photometric bands
    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    pub fn photometry(&self, band: &str) -> Option<&BandPhotometry> {
        self.photometry.get(band)
    }

    pub fn mags(&self, band: &str) -> Option<&[Option<f32>]> {
        self.photometry(band).map(|p| p.mag.as_slice())
    }

    pub fn mag_uncert(&self, band: &str) -> Option<&[Option<f32>]> {
        self.photometry(band).map(|p| p.mag_uncert.as_slice())
    }

    pub fn ext(&self, band: &str) -> Option<&[Option<f32>]> {
        self.photometry(band).map(|p| p.ext.as_slice())
    }

    pub fn variability(&self) -> &[VariabilityCode] {
        &self.variability
    }

    pub fn chemistry(&self) -> &Chemistry {
        &self.chemistry
    }

    pub fn refs(&self) -> &References {
        &self.refs
    }

    pub fn phase_space(&self) -> &PhaseSpace {
        &self.phase_space
    }

    /// Survey name to external identifier, one map per star
    pub fn crossmatches(&self) -> &[BTreeMap<String, String>] {
        &self.crossmatches
    }

    pub fn pawprint(&self) -> &dyn Footprint {
        self.pawprint.as_ref()
    }

    /// Whether phase-space coordinates have been populated
    pub fn coordinates_populated(&self) -> bool {
        self.coordinates_populated
    }

    /// Whether photometry has been populated
    pub fn photometry_populated(&self) -> bool {
        self.photometry_populated
    }
}

/// Computed (not measured) quantities for one (stream, pawprint) pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedCatalog {
    stream_id: String,
    pawprint_id: String,
    nstars: usize,
    masks: BTreeMap<String, Vec<bool>>,
}

impl DerivedCatalog {
    pub fn new(stream_id: &str, pawprint_id: &str, nstars: usize) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            pawprint_id: pawprint_id.to_string(),
            nstars,
            masks: BTreeMap::new(),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn pawprint_id(&self) -> &str {
        &self.pawprint_id
    }

    /// Stored mask for a criterion
    pub fn mask(&self, criterion: &str) -> Option<&[bool]> {
        self.masks.get(criterion).map(Vec::as_slice)
    }

    /// All stored masks keyed by criterion
    pub fn masks(&self) -> &BTreeMap<String, Vec<bool>> {
        &self.masks
    }

    pub(crate) fn insert_mask(
        &mut self,
        criterion: &str,
        mask: Vec<bool>,
    ) -> Result<(), CatalogError> {
        if mask.len() != self.nstars {
            return Err(CatalogError::CorruptCatalog(format!(
                "mask {criterion:?} has {} entries, expected {}",
                mask.len(),
                self.nstars
            )));
        }
        self.masks.insert(criterion.to_string(), mask);
        Ok(())
    }
}

/// Measured and derived catalogs of one (stream, pawprint) pair
#[derive(Debug)]
pub struct StreamCatalog {
    data: StarCatalog,
    derived: DerivedCatalog,
}

impl StreamCatalog {
    /// Allocate an unpopulated catalog
    pub fn new(
        stream_id: &str,
        pawprint_id: &str,
        membership: &dyn MembershipSource,
        footprints: &dyn FootprintSource,
        config: &CatalogConfig,
    ) -> Result<Self, CatalogError> {
        let data = StarCatalog::with_config(stream_id, pawprint_id, membership, footprints, config)?;
        let derived = DerivedCatalog::new(stream_id, pawprint_id, data.nstars());
        Ok(Self { data, derived })
    }

    /// Construct and populate every measured field from `sources`
    pub fn build(
        stream_id: &str,
        pawprint_id: &str,
        sources: &DataSources<'_>,
        config: &CatalogConfig,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new(
            stream_id,
            pawprint_id,
            sources.membership,
            sources.footprints,
            config,
        )?;
        catalog.data.populate_phase_space(sources.phase_space)?;
        catalog.data.populate_photometry(sources.photometry)?;
        catalog.data.populate_abundances(sources.abundances)?;
        if let Some(crossmatches) = sources.crossmatches {
            catalog.data.populate_crossmatches(crossmatches)?;
        }
        Ok(catalog)
    }

    pub fn data(&self) -> &StarCatalog {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut StarCatalog {
        &mut self.data
    }

    pub fn derived(&self) -> &DerivedCatalog {
        &self.derived
    }

    /// Compute a mask and keep it in the derived catalog
    pub fn derive_mask(&mut self, criterion: &str) -> Result<&[bool], CatalogError> {
        let mask = self.data.make_mask(criterion)?;
        self.derived.insert_mask(criterion, mask)?;
        Ok(self.derived.mask(criterion).unwrap_or(&[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footprint::{Pawprint, SkyRegion};
    use crate::sources::{AbundanceRecord, InMemorySource};
    use approx::assert_relative_eq;

    fn three_star_source() -> InMemorySource {
        InMemorySource::new()
            .with_stream("S1", vec![101, 102, 103])
            .with_pawprint(Pawprint::new("S1", "P1").with_sky_region(SkyRegion::Circle {
                ra: 20.0,
                dec: 0.0,
                radius: 1.0,
            }))
            .with_position(101, 10.0, 0.0, -1.0, 2.0)
            .with_position(102, 20.0, 0.0, -1.5, 2.5)
            .with_position(103, 30.0, 0.0, -2.0, 3.0)
            .with_magnitude(101, "gaia_g", 15.0, 0.01)
            .with_magnitude(102, "gaia_g", 16.0, 0.02)
            .with_magnitude(103, "gaia_g", 17.0, 0.03)
            .with_magnitude(101, "gaia_rp", 14.5, 0.01)
            .with_magnitude(103, "gaia_rp", 16.4, 0.03)
    }

    fn catalog(source: &InMemorySource) -> StarCatalog {
        StarCatalog::new("S1", "P1", source, source).unwrap()
    }

    fn assert_all_lengths(catalog: &StarCatalog) {
        let n = catalog.nstars();
        assert_eq!(catalog.source_ids().len(), n);
        assert_eq!(catalog.crossmatches().len(), n);
        assert_eq!(catalog.variability().len(), n);
        assert!(catalog.phase_space().mismatched_column(n).is_none());
        for (_, column) in catalog.chemistry().columns() {
            assert_eq!(column.len(), n);
        }
        for band in catalog.bands() {
            assert!(catalog.photometry(band).unwrap().has_len(n));
        }
        assert!(catalog.refs().check_len(n).is_ok());
    }

    #[test]
    fn test_construct_allocates_null_arrays() {
        let source = three_star_source();
        let catalog = catalog(&source);

        assert_eq!(catalog.nstars(), 3);
        assert_eq!(catalog.source_ids(), &[101, 102, 103]);
        assert_eq!(catalog.source_id_version(), 3);
        assert_all_lengths(&catalog);

        assert!(catalog.mags("gaia_g").unwrap().iter().all(Option::is_none));
        assert!(catalog.chemistry().feh.iter().all(Option::is_none));
        assert!(catalog.variability().iter().all(|v| !v.is_variable()));
        assert!(!catalog.coordinates_populated());
        assert!(!catalog.photometry_populated());
        assert_eq!(catalog.index_of(103), Some(2));
        assert_eq!(catalog.index_of(999), None);
    }

    #[test]
    fn test_unknown_stream_fails() {
        let source = three_star_source();
        match StarCatalog::new("S2", "P1", &source, &source) {
            Err(CatalogError::MembershipLookup { stream_id, .. }) => assert_eq!(stream_id, "S2"),
            other => panic!("expected MembershipLookup, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_members_fail() {
        let source = three_star_source().with_stream("S1", vec![1, 2, 1]);
        assert!(matches!(
            StarCatalog::new("S1", "P1", &source, &source),
            Err(CatalogError::MembershipLookup { .. })
        ));
    }

    #[test]
    fn test_missing_pawprint_fails() {
        let source = three_star_source();
        match StarCatalog::new("S1", "P9", &source, &source) {
            Err(CatalogError::PawprintNotFound { pawprint_id, .. }) => {
                assert_eq!(pawprint_id, "P9")
            }
            other => panic!("expected PawprintNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_photometry_fills_registered_bands() {
        let source = three_star_source();
        let mut catalog = catalog(&source);
        catalog.populate_photometry(&source).unwrap();

        let g = catalog.mags("gaia_g").unwrap();
        assert_relative_eq!(g[1].unwrap(), 16.0);
        assert_relative_eq!(catalog.mag_uncert("gaia_g").unwrap()[2].unwrap(), 0.03);
        assert_eq!(catalog.mags("gaia_rp").unwrap()[1], None);
        assert!(catalog.ext("gaia_g").unwrap().iter().all(Option::is_none));
        assert!(catalog.photometry_populated());
        assert_all_lengths(&catalog);
    }

    #[test]
    fn test_photometry_idempotent() {
        let source = three_star_source();
        let mut catalog = catalog(&source);
        catalog.populate_photometry(&source).unwrap();
        let first = catalog.photometry("gaia_g").cloned();
        catalog.populate_photometry(&source).unwrap();
        assert_eq!(catalog.photometry("gaia_g").cloned(), first);
    }

    #[test]
    fn test_photometry_failure_leaves_state() {
        let source = three_star_source();
        let mut catalog = catalog(&source);

        let failing = three_star_source().fail_photometry();
        assert!(matches!(
            catalog.populate_photometry(&failing),
            Err(CatalogError::PhotometrySource(_))
        ));
        assert!(catalog.mags("gaia_g").unwrap().iter().all(Option::is_none));
        assert!(!catalog.photometry_populated());
    }

    #[test]
    fn test_photometry_missing_band_is_not_partial() {
        let source = three_star_source();
        let mut catalog = catalog(&source);

        // G is present but RP is not; G must not be written either
        let g_only = InMemorySource::new()
            .with_magnitude(101, "gaia_g", 15.0, 0.01)
            .with_magnitude(102, "gaia_g", 16.0, 0.02);
        assert!(matches!(
            catalog.populate_photometry(&g_only),
            Err(CatalogError::PhotometrySource(SourceError::Malformed(_)))
        ));
        assert!(catalog.mags("gaia_g").unwrap().iter().all(Option::is_none));
    }

    #[test]
    fn test_non_finite_magnitudes_are_null() {
        let source = three_star_source().with_magnitude(102, "gaia_rp", f32::NAN, 0.1);
        let mut catalog = catalog(&source);
        catalog.populate_photometry(&source).unwrap();
        assert_eq!(catalog.mags("gaia_rp").unwrap()[1], None);
    }

    #[test]
    fn test_abundances_sparse_fill() {
        let mut record = AbundanceRecord::new(102);
        record.feh = Some(0.0);
        record.alpha_fe = Some(0.3);
        record.refs.insert(
            RefCategory::Metallicity,
            vec![Bibcode::new("2019ApJ...880...39S").unwrap()],
        );
        let mut stray = AbundanceRecord::new(999);
        stray.feh = Some(-2.0);

        let source = three_star_source()
            .with_abundance(record)
            .with_abundance(stray);
        let mut catalog = catalog(&source);
        catalog.populate_abundances(&source).unwrap();

        let chemistry = catalog.chemistry();
        // A measured zero is distinct from "not measured"
        assert_eq!(chemistry.feh, vec![None, Some(0.0), None]);
        assert_eq!(chemistry.alpha_fe, vec![None, Some(0.3), None]);
        assert_eq!(chemistry.feh_solar, vec![None, None, None]);
        assert_eq!(
            catalog.refs().get(RefCategory::Metallicity, 1)[0].as_str(),
            "2019ApJ...880...39S"
        );
        assert!(catalog.refs().get(RefCategory::Metallicity, 0).is_empty());
        assert_all_lengths(&catalog);
    }

    #[test]
    fn test_abundance_failure_leaves_state() {
        let source = three_star_source();
        let mut catalog = catalog(&source);
        let failing = three_star_source().fail_abundances();
        assert!(matches!(
            catalog.populate_abundances(&failing),
            Err(CatalogError::AbundanceSource(_))
        ));
        assert_eq!(catalog.chemistry(), &Chemistry::empty(3));
    }

    #[test]
    fn test_phase_space_and_crossmatches() {
        let source = three_star_source()
            .with_crossmatch(101, "2mass", "J00400000+0000000")
            .with_crossmatch(555, "2mass", "J99999999+0000000");
        let mut catalog = catalog(&source);

        catalog.populate_phase_space(&source).unwrap();
        assert!(catalog.coordinates_populated());
        assert_eq!(catalog.phase_space().ra[2], Some(30.0));
        assert_eq!(catalog.phase_space().pmdec[0], Some(2.0));

        catalog.populate_crossmatches(&source).unwrap();
        assert_eq!(
            catalog.crossmatches()[0].get("2mass").map(String::as_str),
            Some("J00400000+0000000")
        );
        assert!(catalog.crossmatches()[1].is_empty());
        assert_all_lengths(&catalog);
    }

    #[test]
    fn test_non_finite_phase_space_is_null() {
        let source = InMemorySource::new()
            .with_stream("S1", vec![101, 102])
            .with_pawprint(Pawprint::new("S1", "P1"))
            .with_phase_space(crate::sources::PhaseSpaceRow {
                source_id: 101,
                ra: Some(f64::NAN),
                dec: Some(0.5),
                parallax: Some(f64::INFINITY),
                ..Default::default()
            })
            .with_position(102, 20.0, 0.0, -1.5, 2.5);
        let mut catalog = catalog(&source);
        catalog.populate_phase_space(&source).unwrap();

        assert_eq!(catalog.phase_space().ra, vec![None, Some(20.0)]);
        assert_eq!(catalog.phase_space().dec, vec![Some(0.5), Some(0.0)]);
        assert_eq!(catalog.phase_space().parallax, vec![None, None]);
    }

    #[test]
    fn test_non_finite_abundances_are_null() {
        let mut record = AbundanceRecord::new(103);
        record.feh = Some(f32::NAN);
        record.alpha_fe = Some(f32::INFINITY);
        record.feh_solar = Some(7.5);
        let source = three_star_source().with_abundance(record);
        let mut catalog = catalog(&source);
        catalog.populate_abundances(&source).unwrap();

        let chemistry = catalog.chemistry();
        assert_eq!(chemistry.feh, vec![None, None, None]);
        assert_eq!(chemistry.alpha_fe, vec![None, None, None]);
        assert_eq!(chemistry.feh_solar, vec![None, None, Some(7.5)]);
    }

    #[test]
    fn test_crossmatch_failure_leaves_state() {
        let source = three_star_source().with_crossmatch(102, "2mass", "J01200000+0000000");
        let mut catalog = catalog(&source);
        catalog.populate_crossmatches(&source).unwrap();
        let before = catalog.crossmatches().to_vec();

        let failing = three_star_source()
            .with_crossmatch(101, "sdss", "1237648720693755918")
            .fail_crossmatches();
        assert!(matches!(
            catalog.populate_crossmatches(&failing),
            Err(CatalogError::CrossmatchSource(SourceError::Unavailable(_)))
        ));
        assert_eq!(catalog.crossmatches(), before.as_slice());
        assert!(catalog.crossmatches()[0].is_empty());
    }

    #[test]
    fn test_phase_space_failure_leaves_state() {
        let source = three_star_source();
        let mut catalog = catalog(&source);
        let failing = three_star_source().fail_phase_space();
        assert!(catalog.populate_phase_space(&failing).is_err());
        assert!(!catalog.coordinates_populated());
        assert_eq!(catalog.phase_space(), &PhaseSpace::empty(3));
    }

    #[test]
    fn test_stream_catalog_build_and_derive() {
        let source = three_star_source();
        let mut stream = StreamCatalog::build(
            "S1",
            "P1",
            &DataSources::uniform(&source),
            &CatalogConfig::default(),
        )
        .unwrap();

        assert_eq!(stream.derived().stream_id(), "S1");
        let mask = stream.derive_mask("sky").unwrap().to_vec();
        assert_eq!(mask, vec![false, true, false]);
        assert_eq!(stream.derived().mask("sky"), Some(mask.as_slice()));
        assert_eq!(stream.derived().mask("proper_motion"), None);
    }

    #[test]
    fn test_derived_catalog_rejects_wrong_length() {
        let mut derived = DerivedCatalog::new("S1", "P1", 2);
        assert!(derived.insert_mask("sky", vec![true]).is_err());
        assert!(derived.insert_mask("sky", vec![true, false]).is_ok());
    }
}
