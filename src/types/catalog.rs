//! Registry resolving type names to shared data type instances.
//!
//! The catalog is assembled once at startup through [`CatalogBuilder`] and is
//! read-only afterwards. Parametrised types are declared with type
//! expressions:
//!
//! ```text
//! integer            built-in scalar
//! array<string>      list of strings
//! array<integer, 1>  non-empty list of integers
//! map<float>         string-keyed floats
//! one_of<integer>    integer or list of integers
//! ref<Address>       embedded Address representation
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::collection::{ArrayType, MapType};
use super::composite::{
    BooleanOrStringType, OneOfType, PolymorphicBranch, PolymorphicType,
    RepresentationReferenceType,
};
use super::enumeration::{EnumResolver, EnumType};
use super::error::CatalogError;
use super::scalar::{BooleanType, FloatType, IntegerType, StringType};
use super::temporal::{DateTimeType, DateType, TimeType};
use super::DataType;

// =============================================================================
// Type expressions
// =============================================================================

/// A parsed type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Named(String),
    Array { inner: Box<TypeExpr>, min_items: usize },
    Map { inner: Box<TypeExpr>, min_entries: usize },
    OneOf(Box<TypeExpr>),
    Reference(String),
}

impl TypeExpr {
    pub fn parse(expr: &str) -> Result<Self, CatalogError> {
        let malformed = |reason: &str| CatalogError::MalformedExpression {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let text = expr.trim();
        if text.is_empty() {
            return Err(malformed("empty type name"));
        }

        let Some(open) = text.find('<') else {
            if text.contains(['>', ',']) {
                return Err(malformed("unbalanced brackets"));
            }
            return Ok(TypeExpr::Named(text.to_string()));
        };
        if !text.ends_with('>') {
            return Err(malformed("missing closing '>'"));
        }

        let head = text[..open].trim();
        let body = &text[open + 1..text.len() - 1];
        let (inner_text, bound) = split_bound(body).ok_or_else(|| malformed("unbalanced brackets"))?;
        let bound = match bound {
            Some(b) => Some(
                b.trim()
                    .parse::<usize>()
                    .map_err(|_| malformed("bound must be a non-negative integer"))?,
            ),
            None => None,
        };

        match head {
            "array" => Ok(TypeExpr::Array {
                inner: Box::new(TypeExpr::parse(inner_text)?),
                min_items: bound.unwrap_or(0),
            }),
            "map" => Ok(TypeExpr::Map {
                inner: Box::new(TypeExpr::parse(inner_text)?),
                min_entries: bound.unwrap_or(0),
            }),
            "one_of" if bound.is_none() => Ok(TypeExpr::OneOf(Box::new(TypeExpr::parse(inner_text)?))),
            "ref" if bound.is_none() && !inner_text.trim().is_empty() => {
                Ok(TypeExpr::Reference(inner_text.trim().to_string()))
            }
            "one_of" | "ref" => Err(malformed("unexpected argument")),
            other => Err(malformed(&format!("unknown type constructor '{}'", other))),
        }
    }
}

/// Split `inner[, bound]` at the last top-level comma.
fn split_bound(body: &str) -> Option<(&str, Option<&str>)> {
    let mut depth = 0i32;
    let mut split_at = None;
    for (i, c) in body.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => split_at = Some(i),
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    Some(match split_at {
        Some(i) => (&body[..i], Some(&body[i + 1..])),
        None => (body, None),
    })
}

impl fmt::Display for TypeExpr {
    /// Canonical form, identical to the registered type's name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named(name) => write!(f, "{}", name),
            TypeExpr::Array { inner, min_items: 0 } => write!(f, "array<{}>", inner),
            TypeExpr::Array { inner, min_items } => write!(f, "array<{}, {}>", inner, min_items),
            TypeExpr::Map { inner, min_entries: 0 } => write!(f, "map<{}>", inner),
            TypeExpr::Map { inner, min_entries } => write!(f, "map<{}, {}>", inner, min_entries),
            TypeExpr::OneOf(inner) => write!(f, "one_of<{}>", inner),
            TypeExpr::Reference(rep) => write!(f, "ref<{}>", rep),
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Immutable name → data type registry.
#[derive(Debug, Clone)]
pub struct DataTypeCatalog {
    types: HashMap<String, Arc<dyn DataType>>,
    polymorphic: HashMap<String, Arc<PolymorphicType>>,
}

impl DataTypeCatalog {
    /// Catalog holding only the built-in scalar types.
    pub fn builtin() -> Self {
        // Built-ins carry no enums, so building cannot fail.
        let builder = CatalogBuilder::new();
        Self {
            types: builder.types,
            polymorphic: builder.polymorphic,
        }
    }

    /// Look up a type by its canonical name or by a type expression.
    pub fn get(&self, name: &str) -> Result<Arc<dyn DataType>, CatalogError> {
        if let Some(found) = self.types.get(name) {
            return Ok(Arc::clone(found));
        }
        let canonical = TypeExpr::parse(name)?.to_string();
        self.types
            .get(&canonical)
            .cloned()
            .ok_or(CatalogError::UnknownType(canonical))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    pub fn polymorphic(&self, name: &str) -> Option<&Arc<PolymorphicType>> {
        self.polymorphic.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Assembles a [`DataTypeCatalog`].
#[derive(Debug)]
pub struct CatalogBuilder {
    types: HashMap<String, Arc<dyn DataType>>,
    polymorphic: HashMap<String, Arc<PolymorphicType>>,
    enums: Vec<Arc<EnumType>>,
    enum_resolver: Option<Arc<dyn EnumResolver>>,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogBuilder {
    /// A builder pre-populated with the built-in scalar types.
    pub fn new() -> Self {
        let builtins: [Arc<dyn DataType>; 8] = [
            Arc::new(BooleanType),
            Arc::new(IntegerType),
            Arc::new(FloatType),
            Arc::new(StringType),
            Arc::new(DateType),
            Arc::new(TimeType),
            Arc::new(DateTimeType),
            Arc::new(BooleanOrStringType::default()),
        ];
        let types = builtins
            .into_iter()
            .map(|t| (t.name().to_string(), t))
            .collect();
        Self {
            types,
            polymorphic: HashMap::new(),
            enums: Vec::new(),
            enum_resolver: None,
        }
    }

    pub fn with_enum_resolver(mut self, resolver: Arc<dyn EnumResolver>) -> Self {
        self.enum_resolver = Some(resolver);
        self
    }

    /// Register a type under its own name.
    pub fn register(&mut self, data_type: Arc<dyn DataType>) -> Result<&mut Self, CatalogError> {
        let name = data_type.name().to_string();
        self.register_as(name, data_type)
    }

    /// Register a type under an alias.
    pub fn register_as(
        &mut self,
        name: impl Into<String>,
        data_type: Arc<dyn DataType>,
    ) -> Result<&mut Self, CatalogError> {
        let name = name.into();
        if self.types.contains_key(&name) {
            return Err(CatalogError::DuplicateType(name));
        }
        self.types.insert(name, data_type);
        Ok(self)
    }

    /// Register an enum whose table is supplied by the enum resolver.
    pub fn register_enum(
        &mut self,
        name: impl Into<String>,
        enum_id: impl Into<String>,
    ) -> Result<&mut Self, CatalogError> {
        let name = name.into();
        let resolver = self.enum_resolver.clone().ok_or_else(|| CatalogError::InvalidEnum {
            name: name.clone(),
            reason: "no enum resolver configured".into(),
        })?;
        let enum_type = Arc::new(EnumType::new(name.clone(), enum_id, resolver));
        self.enums.push(Arc::clone(&enum_type));
        self.register_as(name, enum_type)
    }

    /// Register a polymorphic type.
    pub fn register_polymorphic(
        &mut self,
        name: impl Into<String>,
        discriminator: impl Into<String>,
        branches: Vec<PolymorphicBranch>,
    ) -> Result<&mut Self, CatalogError> {
        let name = name.into();
        let poly = PolymorphicType::new(name.clone(), discriminator, branches).map_err(|source| {
            CatalogError::InvalidType {
                name: name.clone(),
                source,
            }
        })?;
        let poly = Arc::new(poly);
        self.polymorphic.insert(name.clone(), Arc::clone(&poly));
        self.register_as(name, poly)
    }

    /// Resolve a type expression, constructing and registering any
    /// parametrised types it names.
    pub fn declare(&mut self, expr: &str) -> Result<Arc<dyn DataType>, CatalogError> {
        let parsed = TypeExpr::parse(expr)?;
        self.declare_expr(&parsed)
    }

    fn declare_expr(&mut self, expr: &TypeExpr) -> Result<Arc<dyn DataType>, CatalogError> {
        let canonical = expr.to_string();
        if let Some(found) = self.types.get(&canonical) {
            return Ok(Arc::clone(found));
        }

        let invalid = |source| CatalogError::InvalidType {
            name: canonical.clone(),
            source,
        };
        let created: Arc<dyn DataType> = match expr {
            TypeExpr::Named(name) => return Err(CatalogError::UnknownType(name.clone())),
            TypeExpr::Array { inner, min_items } => {
                let inner = self.declare_expr(inner)?;
                Arc::new(ArrayType::new(inner, *min_items).map_err(invalid)?)
            }
            TypeExpr::Map { inner, min_entries } => {
                let inner = self.declare_expr(inner)?;
                Arc::new(MapType::new(inner, *min_entries))
            }
            TypeExpr::OneOf(inner) => {
                let inner = self.declare_expr(inner)?;
                Arc::new(OneOfType::new(inner).map_err(invalid)?)
            }
            TypeExpr::Reference(rep) => Arc::new(RepresentationReferenceType::new(rep.clone())),
        };

        tracing::debug!(data_type = %canonical, "declared parametrised type");
        self.types.insert(canonical, Arc::clone(&created));
        Ok(created)
    }

    /// Finish the catalog, resolving every enum table.
    pub fn build(self) -> Result<DataTypeCatalog, CatalogError> {
        for enum_type in &self.enums {
            enum_type.preload()?;
        }
        Ok(DataTypeCatalog {
            types: self.types,
            polymorphic: self.polymorphic,
        })
    }
}
