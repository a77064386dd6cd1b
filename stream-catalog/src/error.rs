//! Error types for catalog construction, population and selection.

use thiserror::Error;

use crate::sources::SourceError;

/// Errors surfaced by the catalog, the schema registry and the mask builder.
///
/// Source failures are wrapped unmodified; nothing in this crate retries.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Unknown catalog field: {0}")]
    UnknownField(String),

    #[error("Membership lookup failed for stream {stream_id}")]
    MembershipLookup {
        stream_id: String,
        #[source]
        source: SourceError,
    },

    #[error("No pawprint {pawprint_id} for stream {stream_id}")]
    PawprintNotFound {
        stream_id: String,
        pawprint_id: String,
        #[source]
        source: SourceError,
    },

    #[error("Phase-space source failed")]
    PhaseSpaceSource(#[source] SourceError),

    #[error("Photometry source failed")]
    PhotometrySource(#[source] SourceError),

    #[error("Abundance source failed")]
    AbundanceSource(#[source] SourceError),

    #[error("Crossmatch source failed")]
    CrossmatchSource(#[source] SourceError),

    #[error("No recognized selection domain in criterion {0:?}")]
    UnknownSelectionDomain(String),

    #[error("Coordinate data for the {0} domain was never populated")]
    MissingCoordinateData(&'static str),

    #[error("Photometry for band {0} was never populated")]
    MissingPhotometryData(String),

    #[error("Invalid bibcode {0:?}: must be 1 to 19 ASCII characters")]
    InvalidBibcode(String),

    #[error("Corrupt catalog file: {0}")]
    CorruptCatalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
