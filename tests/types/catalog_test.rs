//! Tests for catalog construction, type expressions and enums.

use std::sync::Arc;

use chrono_tz::Tz;
use serde_json::json;
use strata::context::{ApiVersion, ConversionContext};
use strata::types::{
    CatalogBuilder, CatalogError, DataType, DataTypeCatalog, ServerValue, StaticEnumResolver,
    TypeExpr,
};

fn ctx() -> ConversionContext {
    ConversionContext::new(ApiVersion::LATEST, Tz::UTC)
}

fn catalog_with_enum(table: serde_json::Value) -> Result<DataTypeCatalog, CatalogError> {
    let resolver = StaticEnumResolver::new().with_table("status", table);
    let mut builder = CatalogBuilder::new().with_enum_resolver(Arc::new(resolver));
    builder.register_enum("status", "status")?;
    builder.build()
}

#[test]
fn test_enum_api_values_are_lowercase_names() {
    let catalog = catalog_with_enum(json!({"1": "Draft", "2": "Active", "7": "ARCHIVED"})).unwrap();
    let status = catalog.get("status").unwrap();

    for (code, name) in [(1, "draft"), (2, "active"), (7, "archived")] {
        assert_eq!(
            status
                .convert_server_value_to_api_value(&ServerValue::Int(code), &ctx())
                .unwrap(),
            json!(name)
        );
    }
}

#[test]
fn test_enum_lookup_is_case_insensitive() {
    let catalog = catalog_with_enum(json!(["Draft", "Active"])).unwrap();
    let status = catalog.get("status").unwrap();

    assert_eq!(
        status
            .convert_user_parameter_value_to_server_value("ACTIVE", &ctx())
            .unwrap(),
        ServerValue::Int(1)
    );
    assert!(status.validate_user_parameter_value("deleted", &ctx()).is_err());
    assert!(status.convert_database_value_to_server_value(&json!(9)).is_err());
}

#[test]
fn test_duplicate_enum_names_fail_construction() {
    let err = catalog_with_enum(json!(["Active", "ACTIVE"])).unwrap_err();
    assert!(matches!(err, CatalogError::InvalidEnum { .. }));
}

#[test]
fn test_null_enum_name_fails_construction() {
    assert!(catalog_with_enum(json!(["Draft", null])).is_err());
}

#[test]
fn test_unknown_type_is_an_error() {
    let catalog = DataTypeCatalog::builtin();
    assert!(matches!(
        catalog.get("money"),
        Err(CatalogError::UnknownType(_))
    ));
    assert!(catalog.get("array<integer>").is_err());
}

#[test]
fn test_type_expressions_are_canonical() {
    let parsed = TypeExpr::parse("array< integer ,3 >").unwrap();
    assert_eq!(parsed.to_string(), "array<integer, 3>");
    assert!(TypeExpr::parse("array<integer").is_err());

    let mut builder = CatalogBuilder::new();
    let declared = builder.declare("map<one_of<string>>").unwrap();
    assert_eq!(declared.name(), "map<one_of<string>>");
    let catalog = builder.build().unwrap();
    assert!(catalog.contains("map<one_of<string>>"));
    assert!(catalog.contains("one_of<string>"));
}

#[test]
fn test_duplicate_registration() {
    let mut builder = CatalogBuilder::new();
    let integer = DataTypeCatalog::builtin().get("integer").unwrap();
    assert!(matches!(
        builder.register(integer),
        Err(CatalogError::DuplicateType(name)) if name == "integer"
    ));
}

#[test]
fn test_declared_expressions_convert_parameters() {
    let mut builder = CatalogBuilder::new();
    builder.declare("array<integer, 1>").unwrap();
    builder.declare("one_of<integer>").unwrap();
    let catalog = builder.build().unwrap();

    let array = catalog.get("array<integer, 1>").unwrap();
    let server = array
        .convert_user_parameter_value_to_server_value("1,2,3", &ctx())
        .unwrap();
    assert_eq!(
        array.convert_server_value_to_api_value(&server, &ctx()).unwrap(),
        json!([1, 2, 3])
    );
    assert!(array.validate_user_parameter_value("", &ctx()).is_err());

    let one_of = catalog.get("one_of<integer>").unwrap();
    assert_eq!(
        one_of
            .convert_user_parameter_value_to_server_value("5", &ctx())
            .unwrap(),
        ServerValue::Int(5)
    );
}
