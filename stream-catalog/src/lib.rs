//! Star catalogs for stellar streams.
//!
//! A [`StarCatalog`] holds index-aligned per-star measurements for the members
//! of one stream as seen through one pawprint. Arrays are sized once from the
//! stream membership list and filled from external [`sources`]. The
//! [`mask`] module turns a pawprint into boolean selections over those stars.

pub mod catalog;
pub mod config;
pub mod error;
pub mod footprint;
pub mod mask;
pub mod schema;
pub mod sources;

pub use catalog::{
    BandPhotometry, Bibcode, Chemistry, DerivedCatalog, PhaseSpace, RefCategory, References,
    StarCatalog, StreamCatalog, VariabilityCode,
};
pub use config::CatalogConfig;
pub use error::CatalogError;
pub use footprint::{Footprint, Pawprint, PlanarPolygon, SkyRegion};
pub use mask::{compute_mask, SelectionDomain};
pub use schema::{resolve_field_type, StorageType};
