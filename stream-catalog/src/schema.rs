//! Canonical per-star field registry.
//!
//! Every array a [`crate::StarCatalog`] allocates is declared here together
//! with its storage type. The registry is built once on first use and has no
//! mutation API.

use once_cell::sync::Lazy;

use crate::error::CatalogError;

/// Length of an ADS bibcode in bytes
pub const BIBCODE_LEN: usize = 19;

/// Photometric bands with registered magnitude, uncertainty and extinction arrays.
///
/// Names follow `[survey]_[filter]`.
pub const PHOTOMETRIC_BANDS: [&str; 2] = ["gaia_g", "gaia_rp"];

/// Storage type of a registered field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    /// Unsigned 64-bit integer
    U64,
    /// Unsigned 16-bit integer
    U16,
    /// String of at most `n` bytes
    FixedString(usize),
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Mapping of named sub-fields, one level deep. An empty list means the
    /// keys are only known at runtime (e.g. crossmatch survey names).
    Nested(Vec<SchemaField>),
    /// List of strings of at most `n` bytes each
    FixedStringList(usize),
}

/// One entry of the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: &'static str,
    pub storage: StorageType,
    /// Whether a star may lack a value ("not measured")
    pub nullable: bool,
}

impl SchemaField {
    fn new(name: &'static str, storage: StorageType, nullable: bool) -> Self {
        Self {
            name,
            storage,
            nullable,
        }
    }
}

/// Immutable registry of star fields
#[derive(Debug)]
pub struct SchemaRegistry {
    fields: Vec<SchemaField>,
}

static REGISTRY: Lazy<SchemaRegistry> = Lazy::new(SchemaRegistry::standard);

impl SchemaRegistry {
    /// Process-wide registry
    pub fn global() -> &'static SchemaRegistry {
        &REGISTRY
    }

    fn standard() -> Self {
        use StorageType::*;

        let mut fields = vec![
            SchemaField::new("source_id", U64, false),
            SchemaField::new("source_id_version", U16, false),
            SchemaField::new("stream_id", FixedString(10), false),
            SchemaField::new("pawprint_id", FixedString(10), false),
            SchemaField::new("crossmatches", Nested(Vec::new()), true),
        ];

        for name in [
            "ra",
            "dec",
            "pmra",
            "pmdec",
            "parallax",
            "radial_velocity",
            "ra_error",
            "dec_error",
            "pmra_error",
            "pmdec_error",
            "parallax_error",
            "radial_velocity_error",
            "phi1",
            "phi2",
        ] {
            fields.push(SchemaField::new(name, F64, true));
        }

        fields.push(SchemaField::new("variability", U16, false));

        let per_band = || {
            PHOTOMETRIC_BANDS
                .iter()
                .map(|&band| SchemaField::new(band, F32, true))
                .collect::<Vec<_>>()
        };
        fields.push(SchemaField::new("mags", Nested(per_band()), true));
        fields.push(SchemaField::new("mag_uncert", Nested(per_band()), true));
        fields.push(SchemaField::new("ext", Nested(per_band()), true));

        for name in [
            "feh",
            "feh_logeps",
            "feh_solar",
            "alpha_logeps",
            "alpha_fe",
            "alpha_solar",
        ] {
            fields.push(SchemaField::new(name, F32, true));
        }

        let refs = ["distance", "rv", "feh", "alpha", "variability", "extinction"]
            .into_iter()
            .map(|name| SchemaField::new(name, FixedStringList(BIBCODE_LEN), false))
            .collect();
        fields.push(SchemaField::new("refs", Nested(refs), false));

        Self { fields }
    }

    /// All top-level fields in declaration order
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Look up a field by name. Dotted names (`refs.feh`, `mags.gaia_g`)
    /// resolve one level into nested fields.
    pub fn field(&self, name: &str) -> Result<&SchemaField, CatalogError> {
        let unknown = || CatalogError::UnknownField(name.to_string());

        let (head, child) = match name.split_once('.') {
            Some((head, child)) => (head, Some(child)),
            None => (name, None),
        };

        let field = self
            .fields
            .iter()
            .find(|f| f.name == head)
            .ok_or_else(unknown)?;

        match child {
            None => Ok(field),
            Some(child) => match &field.storage {
                StorageType::Nested(children) => {
                    children.iter().find(|f| f.name == child).ok_or_else(unknown)
                }
                _ => Err(unknown()),
            },
        }
    }

    /// Storage type of a registered field
    pub fn resolve_field_type(&self, name: &str) -> Result<&StorageType, CatalogError> {
        self.field(name).map(|f| &f.storage)
    }

    /// Whether a registered field may hold "not measured"
    pub fn is_nullable(&self, name: &str) -> Result<bool, CatalogError> {
        self.field(name).map(|f| f.nullable)
    }
}

/// Storage type of a registered field in the process-wide registry
pub fn resolve_field_type(name: &str) -> Result<&'static StorageType, CatalogError> {
    SchemaRegistry::global().resolve_field_type(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    #[rstest]
    #[case("source_id", StorageType::U64)]
    #[case("source_id_version", StorageType::U16)]
    #[case("stream_id", StorageType::FixedString(10))]
    #[case("variability", StorageType::U16)]
    #[case("phi1", StorageType::F64)]
    #[case("feh", StorageType::F32)]
    #[case("mags.gaia_g", StorageType::F32)]
    #[case("ext.gaia_rp", StorageType::F32)]
    #[case("refs.distance", StorageType::FixedStringList(BIBCODE_LEN))]
    fn test_resolve_registered_fields(#[case] name: &str, #[case] expected: StorageType) {
        assert_eq!(resolve_field_type(name).unwrap(), &expected);
    }

    #[rstest]
    #[case("magnitude")]
    #[case("refs.photometry")]
    #[case("feh.solar")]
    #[case("mags.sdss_r")]
    #[case("")]
    fn test_resolve_unknown_fields(#[case] name: &str) {
        match resolve_field_type(name) {
            Err(CatalogError::UnknownField(field)) => assert_eq!(field, name),
            other => panic!("expected UnknownField, got {other:?}"),
        }
    }

    #[test]
    fn test_field_names_unique() {
        let registry = SchemaRegistry::global();
        let mut seen = HashSet::new();
        for field in registry.fields() {
            assert!(seen.insert(field.name), "duplicate field {}", field.name);
            if let StorageType::Nested(children) = &field.storage {
                let mut child_names = HashSet::new();
                for child in children {
                    assert!(child_names.insert(child.name));
                    // Nesting only recurses one level
                    assert!(!matches!(child.storage, StorageType::Nested(_)));
                }
            }
        }
    }

    #[test]
    fn test_chemistry_is_nullable() {
        let registry = SchemaRegistry::global();
        for name in ["feh", "feh_logeps", "feh_solar", "alpha_logeps", "alpha_fe", "alpha_solar"] {
            assert!(registry.is_nullable(name).unwrap());
        }
        assert!(!registry.is_nullable("source_id").unwrap());
    }

    #[test]
    fn test_every_band_registered() {
        for band in PHOTOMETRIC_BANDS {
            for table in ["mags", "mag_uncert", "ext"] {
                assert!(resolve_field_type(&format!("{table}.{band}")).is_ok());
            }
        }
    }
}
