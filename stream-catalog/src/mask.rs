//! Boolean selections of catalog stars against their pawprint.
//!
//! A criterion string activates selection domains by keyword. Each active
//! domain produces its own per-star mask and the results are combined with
//! logical OR, so a star selected by two domains is simply selected.

use log::debug;

use crate::catalog::StarCatalog;
use crate::error::CatalogError;

/// Bands defining the colour-magnitude plane: colour is `blue - red`,
/// magnitude is `blue`.
pub const CMD_BANDS: (&str, &str) = ("gaia_g", "gaia_rp");

/// Selection space a criterion can activate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionDomain {
    /// Sky position against the pawprint's sky regions
    Sky,
    /// Proper motion against the proper-motion polygons
    ProperMotion,
    /// Colour and magnitude against the colour-magnitude polygons
    ColorMagnitude,
}

impl SelectionDomain {
    pub const ALL: [SelectionDomain; 3] = [
        SelectionDomain::Sky,
        SelectionDomain::ProperMotion,
        SelectionDomain::ColorMagnitude,
    ];

    /// Keyword that activates this domain inside a criterion
    pub fn keyword(self) -> &'static str {
        match self {
            SelectionDomain::Sky => "sky",
            SelectionDomain::ProperMotion => "proper_motion",
            SelectionDomain::ColorMagnitude => "color_magnitude",
        }
    }

    /// Domains whose keyword occurs anywhere in `criterion`.
    ///
    /// `"sky"`, `"sky+proper_motion"` and `"sky_and_color_magnitude"` are all
    /// valid. A criterion without any keyword is an error.
    pub fn parse_criterion(criterion: &str) -> Result<Vec<SelectionDomain>, CatalogError> {
        let domains: Vec<_> = Self::ALL
            .into_iter()
            .filter(|domain| criterion.contains(domain.keyword()))
            .collect();
        if domains.is_empty() {
            return Err(CatalogError::UnknownSelectionDomain(criterion.to_string()));
        }
        Ok(domains)
    }
}

/// Compute the selection mask of `catalog` for `criterion`.
///
/// The result has one entry per star, in catalog order. Stars whose values
/// for a domain are null are never selected by that domain.
///
/// # Errors
///
/// * `UnknownSelectionDomain` - no keyword recognized
/// * `MissingCoordinateData` - sky or proper motion requested before phase
///   space was populated
/// * `MissingPhotometryData` - colour-magnitude requested before photometry
///   was populated, or a required band is not configured
pub fn compute_mask(catalog: &StarCatalog, criterion: &str) -> Result<Vec<bool>, CatalogError> {
    let domains = SelectionDomain::parse_criterion(criterion)?;

    let mut mask = vec![false; catalog.nstars()];
    for domain in domains {
        let selected = domain_mask(catalog, domain)?;
        debug!(
            "{} domain selects {}/{} stars",
            domain.keyword(),
            selected.iter().filter(|&&s| s).count(),
            selected.len()
        );
        for (combined, hit) in mask.iter_mut().zip(selected) {
            *combined |= hit;
        }
    }
    Ok(mask)
}

fn domain_mask(catalog: &StarCatalog, domain: SelectionDomain) -> Result<Vec<bool>, CatalogError> {
    let pawprint = catalog.pawprint();
    match domain {
        SelectionDomain::Sky => {
            let phase_space = coordinates(catalog, domain)?;
            Ok(select_pairs(&phase_space.ra, &phase_space.dec, |ra, dec| {
                pawprint.point_in_region(ra, dec)
            }))
        }
        SelectionDomain::ProperMotion => {
            let phase_space = coordinates(catalog, domain)?;
            Ok(select_pairs(&phase_space.pmra, &phase_space.pmdec, |pmra, pmdec| {
                pawprint.pm_in_region(pmra, pmdec)
            }))
        }
        SelectionDomain::ColorMagnitude => {
            let (blue_band, red_band) = CMD_BANDS;
            let blue = magnitudes(catalog, blue_band)?;
            let red = magnitudes(catalog, red_band)?;
            Ok(blue
                .iter()
                .zip(red)
                .map(|pair| match pair {
                    (Some(b), Some(r)) => {
                        let (b, r) = (f64::from(*b), f64::from(*r));
                        pawprint.cmd_in_region(b - r, b)
                    }
                    _ => false,
                })
                .collect())
        }
    }
}

fn coordinates(
    catalog: &StarCatalog,
    domain: SelectionDomain,
) -> Result<&crate::catalog::PhaseSpace, CatalogError> {
    if !catalog.coordinates_populated() {
        return Err(CatalogError::MissingCoordinateData(domain.keyword()));
    }
    Ok(catalog.phase_space())
}

fn magnitudes<'a>(catalog: &'a StarCatalog, band: &str) -> Result<&'a [Option<f32>], CatalogError> {
    if !catalog.photometry_populated() {
        return Err(CatalogError::MissingPhotometryData(band.to_string()));
    }
    catalog
        .mags(band)
        .ok_or_else(|| CatalogError::MissingPhotometryData(band.to_string()))
}

/// Apply `inside` to every star with both values measured
fn select_pairs(
    xs: &[Option<f64>],
    ys: &[Option<f64>],
    inside: impl Fn(f64, f64) -> bool,
) -> Vec<bool> {
    xs.iter()
        .zip(ys)
        .map(|pair| match pair {
            (Some(x), Some(y)) => inside(*x, *y),
            _ => false,
        })
        .collect()
}
