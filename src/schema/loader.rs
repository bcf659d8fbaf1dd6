//! Loading schemas from TOML and assembling their data type catalog.
//!
//! ```toml
//! [enums]
//! status = ["Draft", "Active"]
//!
//! [objects.Widget]
//! table = "widgets"
//! fields = [
//!     { name = "id", type = "integer", queryable = true },
//!     { name = "status", type = "status" },
//! ]
//! relationships = [
//!     { name = "owner", target = "User", join = { parent = "owner_id", child = "id" } },
//! ]
//! collections = [
//!     { name = "tags", item = { kind = "scalar", type = "string" } },
//! ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{CollectionItem, Schema, SchemaIssue};
use crate::types::{
    CatalogBuilder, CatalogError, DataTypeCatalog, PolymorphicBranch, StaticEnumResolver,
};

/// Errors raised while loading a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Schema file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read schema file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse schema: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Schema is invalid:\n{}", format_issues(.0))]
    Invalid(Vec<SchemaIssue>),
}

fn format_issues(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {}", issue))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Schema {
    /// Parse a schema from TOML text.
    pub fn from_toml_str(source: &str) -> Result<Self, SchemaError> {
        Ok(toml::from_str(source)?)
    }

    /// Load a schema from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SchemaError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Build the catalog for this schema: enum tables, polymorphic types, and
    /// every parametrised type a field or collection names.
    pub fn build_catalog(&self) -> Result<DataTypeCatalog, CatalogError> {
        self.catalog_builder()?.build()
    }

    /// A builder holding everything this schema declares, for callers that
    /// need to declare further type expressions before building.
    pub fn catalog_builder(&self) -> Result<CatalogBuilder, CatalogError> {
        let mut resolver = StaticEnumResolver::new();
        for (name, table) in &self.enums {
            resolver.insert(name.clone(), table.clone());
        }
        let mut builder = CatalogBuilder::new().with_enum_resolver(Arc::new(resolver));

        for name in self.enums.keys() {
            builder.register_enum(name.clone(), name.clone())?;
        }
        for (name, def) in &self.polymorphic {
            let branches = def
                .branches
                .iter()
                .map(|(value, representation)| PolymorphicBranch {
                    value: value.clone(),
                    representation: representation.clone(),
                })
                .collect();
            builder.register_polymorphic(name.clone(), def.discriminator.clone(), branches)?;
        }

        let object_fields = self.objects.values().flat_map(|o| o.fields.iter());
        let representation_fields = self.representations.values().flat_map(|r| r.fields.iter());
        for field in object_fields.chain(representation_fields) {
            builder.declare(&field.data_type)?;
        }
        for collection in self.objects.values().flat_map(|o| o.collections.iter()) {
            if let CollectionItem::Scalar { data_type } = &collection.item {
                builder.declare(data_type)?;
            }
        }

        Ok(builder)
    }

    /// Load, build the catalog, and validate in one step.
    pub fn load_validated(source: &str) -> Result<(Self, DataTypeCatalog), SchemaError> {
        let schema = Self::from_toml_str(source)?;
        let catalog = schema.build_catalog()?;
        schema.validate(&catalog).map_err(SchemaError::Invalid)?;
        Ok((schema, catalog))
    }
}
