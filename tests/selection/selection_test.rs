//! Tests for resolving selection paths against a schema.

use insta::assert_snapshot;
use strata::planner::AliasOptions;
use strata::schema::Schema;
use strata::selection::{
    CollectionSelection, RepresentationSelection, Selection, SelectionError, SelectionSet,
};

const SCHEMA: &str = r#"
[representations.Geo]
fields = [{ name = "lat", type = "float" }, { name = "lng", type = "float" }]

[objects.Order]
table = "orders"
fields = [
    { name = "id", type = "integer" },
    { name = "placedAt", type = "datetime", column = "placed_at" },
    { name = "total", type = "float", derived = true, depends_on = ["subtotal", "tax"] },
    { name = "note", type = "string", custom = true },
    { name = "origin", type = "ref<Geo>", column = "origin_json" },
]
relationships = [
    { name = "customer", target = "Customer", join = { parent = "customer_id", child = "id" } },
    { name = "invoices", target = "Invoice", join = { parent = "id", child = "order_id" }, bulk_loaded = true },
]
collections = [
    { name = "lines", item = { kind = "object", target = "Line" } },
    { name = "labels", item = { kind = "scalar", type = "string" } },
]

[objects.Customer]
table = "customers"
fields = [{ name = "id", type = "integer" }, { name = "name", type = "string" }]
relationships = [
    { name = "company", target = "Company", join = { parent = "company_id", child = "id" } },
]

[objects.Company]
table = "companies"
fields = [{ name = "name", type = "string" }]

[objects.Invoice]
table = "invoices"
fields = [{ name = "number", type = "string" }]

[objects.Line]
table = "order_lines"
fields = [{ name = "sku", type = "string" }, { name = "qty", type = "integer" }]
"#;

fn schema() -> Schema {
    Schema::load_validated(SCHEMA).unwrap().0
}

#[test]
fn test_selection_kinds() {
    let set = SelectionSet::build(
        &schema(),
        "Order",
        &["id", "total", "note", "origin", "lines", "labels", "invoices.number"],
    )
    .unwrap();

    assert!(matches!(set.get("id"), Some(Selection::Field(_))));
    assert!(matches!(set.get("total"), Some(Selection::Derived(_))));
    assert!(matches!(set.get("note"), Some(Selection::BulkLoaded(_))));
    assert!(matches!(
        set.get("origin"),
        Some(Selection::Representation {
            target: RepresentationSelection::Fixed(_),
            ..
        })
    ));
    assert!(matches!(
        set.get("lines"),
        Some(Selection::Collection {
            items: CollectionSelection::Object(_),
            ..
        })
    ));
    assert!(matches!(
        set.get("labels"),
        Some(Selection::Collection {
            items: CollectionSelection::Scalar { .. },
            ..
        })
    ));
    assert!(matches!(
        set.get("invoices"),
        Some(Selection::Relationship { def, .. }) if def.bulk_loaded
    ));
}

#[test]
fn test_selection_order_follows_first_mention() {
    let mut set = SelectionSet::build(&schema(), "Order", &["customer.name", "id"]).unwrap();
    set.add_path(&schema(), "customer.company.name").unwrap();
    set.add_path(&schema(), "placedAt").unwrap();
    assert_eq!(set.names(), ["customer", "id", "placedAt"]);
}

#[test]
fn test_path_errors() {
    let schema = schema();
    assert!(matches!(
        SelectionSet::build(&schema, "Order", &["customer.age"]),
        Err(SelectionError::UnknownMember { owner, member }) if owner == "Customer" && member == "age"
    ));
    assert!(matches!(
        SelectionSet::build(&schema, "Order", &["origin.lat.deg"]),
        Err(SelectionError::NotTraversable { .. })
    ));
    assert!(matches!(
        SelectionSet::build(&schema, "Order", &[""]),
        Err(SelectionError::InvalidPath(_))
    ));
}

#[test]
fn test_fetch_plan_skips_augmented_members() {
    let set = SelectionSet::build(
        &schema(),
        "Order",
        &[
            "id",
            "placedAt",
            "total",
            "note",
            "origin.lat",
            "lines",
            "invoices",
            "customer.name",
            "customer.company.name",
        ],
    )
    .unwrap();

    let plan = set.fetch_plan("o", AliasOptions::default()).unwrap();
    assert_snapshot!(plan.to_string(), @r"
    SELECT o.id, o.placed_at, o.subtotal, o.tax, o.origin_json, oc.name, occ.name
    FROM orders AS o
    LEFT JOIN customers AS oc ON o.customer_id = oc.id
    LEFT JOIN companies AS occ ON oc.company_id = occ.id
    ");
}

#[test]
fn test_representation_has_no_table() {
    let set = SelectionSet::build(&schema(), "Order", &["origin"]).unwrap();
    let Some(Selection::Representation {
        target: RepresentationSelection::Fixed(origin),
        ..
    }) = set.get("origin")
    else {
        panic!("origin should be a fixed representation");
    };
    assert_eq!(origin.table(), None);
    assert!(matches!(
        origin.fetch_plan("o", AliasOptions::default()),
        Err(SelectionError::NotAnObject(name)) if name == "Geo"
    ));
}
