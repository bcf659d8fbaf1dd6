//! Tests for the selection tree and alias planner.

use insta::assert_snapshot;
use serde_json::json;
use strata::planner::{
    AliasAllocator, AliasOptions, FetchNode, FetchPlan, JoinLink, PlanError, Predicate,
};

fn contact_tree() -> FetchNode {
    let mut root = FetchNode::new();
    root.add_field("id");
    for (name, table) in [("Email", "emails"), ("Event", "events"), ("Export", "exports")] {
        root.add_relationship(name, JoinLink::new(table, "id", "visitor_id"), None)
            .add_field("id");
    }
    root
}

#[test]
fn test_sibling_aliases_share_a_prefix() {
    let plan = FetchPlan::build(&contact_tree(), "visitors", "v", AliasOptions::default()).unwrap();

    assert_eq!(plan.alias_for(&[]), Some("v"));
    assert_eq!(plan.alias_for(&["Email"]), Some("ve"));
    assert_eq!(plan.alias_for(&["Event"]), Some("vev"));
    assert_eq!(plan.alias_for(&["Export"]), Some("vex"));
}

#[test]
fn test_aliases_are_unique_across_the_plan() {
    let mut root = contact_tree();
    root.get_child_mut("Email")
        .unwrap()
        .add_relationship("Event", JoinLink::new("events", "event_id", "id"), None);

    let plan = FetchPlan::build(&root, "visitors", "v", AliasOptions::default()).unwrap();
    let mut aliases: Vec<&str> = plan.joins.iter().map(|j| j.table.alias.as_str()).collect();
    aliases.push(&plan.root.alias);
    let count = aliases.len();
    aliases.sort_unstable();
    aliases.dedup();
    assert_eq!(aliases.len(), count);
    assert_eq!(plan.alias_for(&["Email", "Event"]), Some("vee"));
}

#[test]
fn test_adding_a_relationship_twice_joins_once() {
    let mut root = FetchNode::new();
    root.add_relationship("Email", JoinLink::new("emails", "id", "visitor_id"), None)
        .add_field("address");
    root.add_relationship("Email", JoinLink::new("emails", "id", "visitor_id"), None)
        .add_field("verified");

    let plan = FetchPlan::build(&root, "visitors", "v", AliasOptions::default()).unwrap();
    assert_eq!(plan.joins.len(), 1);
    assert_eq!(root.get_child("Email").unwrap().fields(), ["address", "verified"]);
}

#[test]
fn test_unknown_child_is_an_error() {
    let root = contact_tree();
    assert_eq!(
        root.get_child("Invoice").unwrap_err(),
        PlanError::UnknownRelationship("Invoice".into())
    );
}

#[test]
fn test_allocator_falls_back_to_numbers() {
    let mut aliases = AliasAllocator::new("o", AliasOptions::default());
    assert_eq!(aliases.allocate("o", "A").unwrap(), "oa");
    assert_eq!(aliases.allocate("o", "a").unwrap(), "oa0");
    assert_eq!(aliases.allocate("o", "A").unwrap(), "oa1");
}

#[test]
fn test_plan_rendering() {
    let mut root = FetchNode::new();
    root.add_field("id").add_field("name");
    root.add_relationship(
        "rel_address",
        JoinLink::new("addresses", "id", "user_id"),
        Some(Predicate::child_equals("kind", json!("home"))),
    )
    .add_field("city");
    root.add_relationship("Owner", JoinLink::new("users", "owner_id", "id"), None)
        .add_field("name");

    let plan = FetchPlan::build(&root, "users", "u", AliasOptions::default()).unwrap();
    assert_snapshot!(plan.to_string(), @r"
    SELECT u.id, u.name, ua.city, uo.name
    FROM users AS u
    LEFT JOIN addresses AS ua ON u.id = ua.user_id AND ua.kind = 'home'
    LEFT JOIN users AS uo ON u.owner_id = uo.id
    ");
}
