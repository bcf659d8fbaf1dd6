//! End-to-end tests: schema, selections, raw record, projected output.

use chrono_tz::Tz;
use serde_json::{json, Map, Value as Json};
use strata::context::{ApiVersion, ConversionContext};
use strata::projection::{
    record_to_json, DerivedFields, Projected, ProjectionError, ProjectionResult, Record,
    RecordProjector,
};
use strata::schema::Schema;
use strata::selection::SelectionSet;
use strata::types::{DataTypeCatalog, JsonObjectWriter};

const SCHEMA: &str = r#"
[enums]
status = ["Draft", "Live", "Retired"]

[polymorphic.pricing]
discriminator = "model"
branches = { flat = "FlatPrice", tiered = "TieredPrice" }

[representations.FlatPrice]
fields = [{ name = "amount", type = "float" }]

[representations.TieredPrice]
fields = [{ name = "tiers", type = "array<integer, 1>" }]

[objects.Widget]
table = "widgets"
fields = [
    { name = "id", type = "integer" },
    { name = "name", type = "string" },
    { name = "createdAt", type = "datetime", column = "created_at" },
    { name = "status", type = "status" },
    { name = "slug", type = "string", derived = true, depends_on = ["name"] },
    { name = "pricing", type = "pricing", column = "pricing_json" },
]
relationships = [
    { name = "owner", target = "User", join = { parent = "owner_id", child = "id" } },
]
collections = [
    { name = "tags", item = { kind = "scalar", type = "string" } },
]

[objects.User]
table = "users"
fields = [{ name = "name", type = "string" }]
"#;

struct Fixture {
    schema: Schema,
    catalog: DataTypeCatalog,
    derived: DerivedFields,
}

impl Fixture {
    fn new() -> Self {
        let (schema, catalog) = Schema::load_validated(SCHEMA).unwrap();
        let mut derived = DerivedFields::new();
        derived.register("Widget", "slug", |raw: &Map<String, Json>| -> Result<Json, String> {
            let name = raw
                .get("name")
                .and_then(Json::as_str)
                .ok_or_else(|| "name is missing".to_string())?;
            Ok(json!(name.to_lowercase().replace(' ', "-")))
        });
        Self {
            schema,
            catalog,
            derived,
        }
    }

    fn projector(&self) -> RecordProjector<'_> {
        RecordProjector::new(&self.catalog, &self.derived)
    }

    fn select(&self, paths: &[&str]) -> SelectionSet {
        SelectionSet::build(&self.schema, "Widget", paths).unwrap()
    }
}

fn raw(value: Json) -> Map<String, Json> {
    match value {
        Json::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

fn utc_latest() -> ConversionContext {
    ConversionContext::new(ApiVersion::LATEST, Tz::UTC)
}

#[test]
fn test_widget_projects_to_api_values() {
    let fixture = Fixture::new();
    let selections = fixture.select(&["id", "name", "createdAt", "owner.name"]);
    let row = raw(json!({
        "id": 1,
        "name": "A",
        "created_at": "2024-01-01 00:00:00",
        "owner": {"name": "Bob"}
    }));

    let projected = fixture
        .projector()
        .project_api(&selections, &row, None, &utc_latest())
        .unwrap();

    assert_eq!(
        record_to_json(&projected),
        json!({
            "id": 1,
            "name": "A",
            "createdAt": "2024-01-01T00:00:00+00:00",
            "owner": {"name": "Bob"}
        })
    );
}

#[test]
fn test_older_versions_keep_legacy_datetimes() {
    let fixture = Fixture::new();
    let selections = fixture.select(&["createdAt"]);
    let row = raw(json!({"created_at": "2024-01-01 00:00:00"}));
    let ctx = ConversionContext::new(ApiVersion::new(4).unwrap(), Tz::Europe__Paris);

    let projected = fixture
        .projector()
        .project_api(&selections, &row, None, &ctx)
        .unwrap();
    assert_eq!(
        record_to_json(&projected),
        json!({"createdAt": "2024-01-01 01:00:00"})
    );
}

#[test]
fn test_server_keys_are_a_subset_of_api_keys() {
    let fixture = Fixture::new();
    let selections = fixture.select(&["id", "name", "status", "slug", "owner", "tags"]);
    let row = raw(json!({"id": 7, "name": "Blue Widget", "status": 1, "owner": null}));
    let projector = fixture.projector();

    let server = projector.project_server(&selections, &row, None).unwrap();
    let api = projector
        .project_api(&selections, &row, None, &utc_latest())
        .unwrap();

    assert!(server.keys().all(|key| api.contains_key(key)));
    assert_eq!(
        record_to_json(&api),
        json!({
            "id": 7,
            "name": "Blue Widget",
            "status": "live",
            "slug": "blue-widget",
            "owner": null
        })
    );
}

#[test]
fn test_augmented_collection_absent_versus_null() {
    let fixture = Fixture::new();
    let selections = fixture.select(&["id", "tags"]);
    let row = raw(json!({"id": 1}));
    let projector = fixture.projector();
    let ctx = utc_latest();

    let untouched = |_: &SelectionSet, _: &mut Record<Json>| -> ProjectionResult<()> { Ok(()) };
    let projected = projector
        .project_api(&selections, &row, Some(&untouched), &ctx)
        .unwrap();
    assert!(!projected.contains_key("tags"));

    let nulled = |_: &SelectionSet, record: &mut Record<Json>| -> ProjectionResult<()> {
        record.insert("tags".into(), Projected::Null);
        Ok(())
    };
    let projected = projector
        .project_api(&selections, &row, Some(&nulled), &ctx)
        .unwrap();
    assert_eq!(record_to_json(&projected), json!({"id": 1, "tags": null}));

    let filled = |_: &SelectionSet, record: &mut Record<Json>| -> ProjectionResult<()> {
        record.insert("tags".into(), Projected::from_json(json!(["red", "small"])));
        Ok(())
    };
    let projected = projector
        .project_api(&selections, &row, Some(&filled), &ctx)
        .unwrap();
    assert_eq!(
        record_to_json(&projected),
        json!({"id": 1, "tags": ["red", "small"]})
    );
}

#[test]
fn test_polymorphic_representation_follows_discriminator() {
    let fixture = Fixture::new();
    let selections = fixture.select(&["pricing"]);
    let projector = fixture.projector();
    let ctx = utc_latest();

    let flat = raw(json!({"pricing_json": "{\"model\":\"flat\",\"amount\":9.5}"}));
    let projected = projector.project_api(&selections, &flat, None, &ctx).unwrap();
    assert_eq!(
        record_to_json(&projected),
        json!({"pricing": {"model": "flat", "amount": 9.5}})
    );

    let tiered = raw(json!({"pricing_json": {"model": "tiered", "tiers": "10;20"}}));
    let projected = projector.project_api(&selections, &tiered, None, &ctx).unwrap();
    assert_eq!(
        record_to_json(&projected),
        json!({"pricing": {"model": "tiered", "tiers": [10, 20]}})
    );

    let unknown = raw(json!({"pricing_json": {"model": "auction"}}));
    let err = projector
        .project_api(&selections, &unknown, None, &ctx)
        .unwrap_err();
    assert!(matches!(err, ProjectionError::Discriminator { ref field, .. } if field == "pricing"));
}

#[test]
fn test_conversion_failures_name_the_field() {
    let fixture = Fixture::new();
    let selections = fixture.select(&["createdAt"]);
    let row = raw(json!({"created_at": "yesterday"}));

    let err = fixture
        .projector()
        .project_api(&selections, &row, None, &utc_latest())
        .unwrap_err();
    assert!(matches!(err, ProjectionError::Conversion { ref field, .. } if field == "createdAt"));
    assert!(!err.is_programming_error());
}

#[test]
fn test_writes_into_an_api_writer() {
    let fixture = Fixture::new();
    let selections = fixture.select(&["id", "owner"]);
    let row = raw(json!({"id": 3, "owner": null}));
    let projected = fixture
        .projector()
        .project_api(&selections, &row, None, &utc_latest())
        .unwrap();

    let mut writer = JsonObjectWriter::new();
    strata::projection::write_record(&mut writer, &projected);
    assert_eq!(writer.into_json(), json!({"id": 3, "owner": null}));
}
