//! Tests for loading and validating schema files.

use std::fs;

use strata::schema::{Schema, SchemaError, SchemaIssue};

#[test]
fn test_load_from_file() {
    let dir = std::env::temp_dir().join(format!("strata-schema-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("schema.toml");
    fs::write(
        &path,
        r#"
[objects.Note]
table = "notes"
fields = [{ name = "id", type = "integer" }, { name = "body", type = "string" }]
"#,
    )
    .unwrap();

    let schema = Schema::from_file(&path).unwrap();
    let catalog = schema.build_catalog().unwrap();
    assert_eq!(schema.object("Note").unwrap().table, "notes");
    assert!(catalog.contains("integer"));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        Schema::from_file("/nonexistent/strata/schema.toml"),
        Err(SchemaError::FileNotFound(_))
    ));
}

#[test]
fn test_unknown_type_fails_catalog() {
    let err = Schema::load_validated(
        r#"
[objects.Note]
table = "notes"
fields = [{ name = "price", type = "money" }]
"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::Catalog(_)));
}

#[test]
fn test_reports_every_issue() {
    let err = Schema::load_validated(
        r#"
[objects.Note]
table = "notes"
fields = [
    { name = "id", type = "integer" },
    { name = "id", type = "string" },
    { name = "author", type = "ref<Person>" },
]
relationships = [
    { name = "folder", target = "Folder", join = { parent = "folder_id", child = "id" } },
]
"#,
    )
    .unwrap_err();

    let SchemaError::Invalid(issues) = &err else {
        panic!("expected validation issues, got {err}");
    };
    assert!(issues
        .iter()
        .any(|i| matches!(i, SchemaIssue::DuplicateMember { name, .. } if name == "id")));
    assert!(issues.iter().any(|i| matches!(
        i,
        SchemaIssue::UndefinedRepresentation { representation, .. } if representation == "Person"
    )));
    assert!(issues
        .iter()
        .any(|i| matches!(i, SchemaIssue::UndefinedTarget { target, .. } if target == "Folder")));
}

#[test]
fn test_catalog_builder_accepts_further_declarations() {
    let schema = Schema::from_toml_str(
        r#"
[enums]
color = ["Red", "Green"]
"#,
    )
    .unwrap();

    let mut builder = schema.catalog_builder().unwrap();
    builder.declare("array<color>").unwrap();
    let catalog = builder.build().unwrap();
    assert!(catalog.contains("color"));
    assert!(catalog.contains("array<color>"));
}
