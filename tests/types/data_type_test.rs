//! Tests for the built-in data types and their conversion pipeline.

use chrono_tz::Tz;
use serde_json::{json, Value as Json};
use strata::context::{ApiVersion, ConversionContext};
use strata::types::{
    DataType, DataTypeCatalog, DataTypeError, JsonObjectWriter, ServerValue,
};

fn ctx() -> ConversionContext {
    ConversionContext::new(ApiVersion::LATEST, Tz::UTC)
}

fn legacy(tz: Tz) -> ConversionContext {
    ConversionContext::new(ApiVersion::new(4).unwrap(), tz)
}

fn catalog() -> DataTypeCatalog {
    DataTypeCatalog::builtin()
}

/// Parameter → server → API must agree with database → API.
fn assert_round_trip(type_name: &str, parameter: &str, stored: Json) {
    let data_type = catalog().get(type_name).unwrap();
    let ctx = ctx();
    assert!(
        data_type.validate_user_parameter_value(parameter, &ctx).is_ok(),
        "{} should accept {:?}",
        type_name,
        parameter
    );
    let server = data_type
        .convert_user_parameter_value_to_server_value(parameter, &ctx)
        .unwrap();
    assert!(data_type.is_server_value_type(&server));
    let from_user = data_type.convert_server_value_to_api_value(&server, &ctx).unwrap();
    let from_storage = data_type.convert_database_value_to_api_value(&stored, &ctx).unwrap();
    assert_eq!(from_user, from_storage, "{} round trip", type_name);
}

#[test]
fn test_primitive_round_trips() {
    assert_round_trip("boolean", "true", json!(1));
    assert_round_trip("boolean", "0", json!("0"));
    assert_round_trip("integer", "42", json!(42));
    assert_round_trip("integer", "-7", json!("-7"));
    assert_round_trip("float", "2.5", json!(2.5));
    assert_round_trip("string", "hello", json!("hello"));
    assert_round_trip("date", "2024-02-29", json!("2024-02-29"));
    assert_round_trip("time", "13:45:10", json!("13:45:10.123456"));
    assert_round_trip("datetime", "2024-01-01T00:00:00+00:00", json!("2024-01-01 00:00:00"));
}

#[test]
fn test_boolean_json_is_strict() {
    let boolean = catalog().get("boolean").unwrap();
    assert!(boolean.validate_user_json_value(&json!(true), &ctx()).is_ok());
    assert!(boolean.validate_user_json_value(&json!(1), &ctx()).is_err());
    assert!(boolean.validate_user_json_value(&json!("true"), &ctx()).is_err());
    assert!(boolean.convert_database_value_to_server_value(&json!(2)).is_err());
}

#[test]
fn test_time_truncates_fraction() {
    let time = catalog().get("time").unwrap();
    let server = time
        .convert_database_value_to_server_value(&json!("08:30:15.999"))
        .unwrap();
    assert_eq!(
        time.convert_server_value_to_api_value(&server, &ctx()).unwrap(),
        json!("08:30:15")
    );
    assert!(time.validate_user_parameter_value("8:30", &ctx()).is_err());
}

#[test]
fn test_datetime_strict_input_keeps_offset() {
    let datetime = catalog().get("datetime").unwrap();
    let ctx = ctx();

    assert!(datetime
        .validate_user_parameter_value("2024-06-01 12:00:00", &ctx)
        .is_err());
    let server = datetime
        .convert_user_parameter_value_to_server_value("2024-06-01T12:00:00+02:00", &ctx)
        .unwrap();
    match &server {
        ServerValue::DateTime(dt) => assert_eq!(dt.offset().local_minus_utc(), 7200),
        other => panic!("expected a datetime, got {:?}", other),
    }
    assert_eq!(
        datetime.convert_server_value_to_database_value(&server).unwrap(),
        json!("2024-06-01 10:00:00")
    );
    assert_eq!(
        datetime.convert_server_value_to_api_value(&server, &ctx).unwrap(),
        json!("2024-06-01T10:00:00+00:00")
    );
}

#[test]
fn test_datetime_version_fork() {
    let datetime = catalog().get("datetime").unwrap();
    let stored = json!("2024-01-01 00:00:00");

    let paris_v5 = ConversionContext::new(ApiVersion::LATEST, Tz::Europe__Paris);
    assert_eq!(
        datetime.convert_database_value_to_api_value(&stored, &paris_v5).unwrap(),
        json!("2024-01-01T01:00:00+01:00")
    );

    let paris_v4 = legacy(Tz::Europe__Paris);
    assert_eq!(
        datetime.convert_database_value_to_api_value(&stored, &paris_v4).unwrap(),
        json!("2024-01-01 01:00:00")
    );

    // Legacy input is read in the context zone.
    let server = datetime
        .convert_user_parameter_value_to_server_value("2024-01-01 01:00:00", &paris_v4)
        .unwrap();
    assert_eq!(
        datetime.convert_server_value_to_database_value(&server).unwrap(),
        stored
    );
}

#[test]
fn test_datetime_rejects_unexpected_storage() {
    let datetime = catalog().get("datetime").unwrap();
    let err = datetime
        .convert_database_value_to_server_value(&json!(1700000000))
        .unwrap_err();
    assert!(matches!(err, DataTypeError::Conversion(_)));
}

#[test]
fn test_array_rules() {
    let mut builder = strata::types::CatalogBuilder::new();
    let array = builder.declare("array<integer, 2>").unwrap();
    let ctx = ctx();

    assert!(array.validate_user_json_value(&json!({"a": 1}), &ctx).is_err());
    assert!(array.validate_user_json_value(&json!([1]), &ctx).is_err());
    assert!(array.validate_user_json_value(&json!([1, 2]), &ctx).is_ok());
    assert!(array.validate_user_json_value(&json!([[1], [2]]), &ctx).is_err());

    assert!(array.validate_user_parameter_value("1,2", &ctx).is_ok());
    assert!(array.validate_user_parameter_value("1,\n2", &ctx).is_err());
    assert!(array.validate_user_parameter_value("1,x", &ctx).is_err());

    let server = array
        .convert_user_parameter_value_to_server_value("1,2,3", &ctx)
        .unwrap();
    assert_eq!(
        array.convert_server_value_to_database_value(&server).unwrap(),
        json!("1;2;3")
    );
    assert_eq!(
        array.convert_database_value_to_api_value(&json!("1;2;3"), &ctx).unwrap(),
        json!([1, 2, 3])
    );
}

#[test]
fn test_array_of_arrays_is_refused() {
    let mut builder = strata::types::CatalogBuilder::new();
    assert!(builder.declare("array<array<integer>>").is_err());
    assert!(builder.declare("array<one_of<integer>>").is_err());
}

#[test]
fn test_array_flat_form_escapes_delimiter() {
    let mut builder = strata::types::CatalogBuilder::new();
    let array = builder.declare("array<string>").unwrap();
    let server = ServerValue::List(vec!["a;b".into(), "c\\d".into()]);
    let stored = array.convert_server_value_to_database_value(&server).unwrap();
    assert_eq!(stored, json!("a\\;b;c\\\\d"));
    assert_eq!(
        array.convert_database_value_to_server_value(&stored).unwrap(),
        server
    );
}

#[test]
fn test_array_flat_form_reads_strings_literally() {
    let mut builder = strata::types::CatalogBuilder::new();
    let array = builder.declare("array<string>").unwrap();

    for items in [vec!["[x", "y"], vec![r#"["a","b"]"#], vec!["[]"]] {
        let server = ServerValue::List(items.into_iter().map(ServerValue::from).collect());
        let stored = array.convert_server_value_to_database_value(&server).unwrap();
        assert!(stored.is_string());
        assert_eq!(
            array.convert_database_value_to_server_value(&stored).unwrap(),
            server
        );
    }
}

#[test]
fn test_array_empty_list_and_empty_item_stay_distinct() {
    let mut builder = strata::types::CatalogBuilder::new();
    let array = builder.declare("array<string>").unwrap();

    let empty = ServerValue::List(vec![]);
    let stored_empty = array.convert_server_value_to_database_value(&empty).unwrap();
    assert_eq!(stored_empty, json!([]));

    let blank = ServerValue::List(vec!["".into()]);
    let stored_blank = array.convert_server_value_to_database_value(&blank).unwrap();
    assert_eq!(stored_blank, json!(""));

    assert_ne!(stored_empty, stored_blank);
    assert_eq!(
        array.convert_database_value_to_server_value(&stored_empty).unwrap(),
        empty
    );
    assert_eq!(
        array.convert_database_value_to_server_value(&stored_blank).unwrap(),
        blank
    );
}

#[test]
fn test_map_rules() {
    let mut builder = strata::types::CatalogBuilder::new();
    let map = builder.declare("map<string, 1>").unwrap();
    let ctx = ctx();

    assert!(map.validate_user_json_value(&json!({"": "x"}), &ctx).is_err());
    assert!(map.validate_user_json_value(&json!({"  ": "x"}), &ctx).is_err());
    assert!(map.convert_database_value_to_server_value(&json!({" ": "x"})).is_err());
    let blank_key = ServerValue::Map([(" ".to_string(), ServerValue::from("x"))].into());
    assert!(!map.is_server_value_type(&blank_key));
    assert!(map.validate_user_json_value(&json!({}), &ctx).is_err());
    assert!(map.validate_user_json_value(&json!({"a": "x"}), &ctx).is_ok());
    assert!(map.validate_user_json_value(&json!(["a"]), &ctx).is_err());

    assert!(map.validate_user_parameter_value("a=x", &ctx).is_err());
    assert!(matches!(
        map.convert_user_parameter_value_to_server_value("a=x", &ctx),
        Err(DataTypeError::Unsupported { .. })
    ));
}

#[test]
fn test_one_of_disambiguation() {
    let mut builder = strata::types::CatalogBuilder::new();
    let one_of = builder.declare("one_of<integer>").unwrap();
    let ctx = ctx();

    assert_eq!(
        one_of
            .convert_user_parameter_value_to_server_value("5", &ctx)
            .unwrap(),
        ServerValue::Int(5)
    );
    assert_eq!(
        one_of
            .convert_user_parameter_value_to_server_value("5,6", &ctx)
            .unwrap(),
        ServerValue::List(vec![ServerValue::Int(5), ServerValue::Int(6)])
    );
    assert_eq!(
        one_of
            .convert_user_json_value_to_server_value(&json!([5]), &ctx)
            .unwrap(),
        ServerValue::List(vec![ServerValue::Int(5)])
    );

    assert!(one_of.validate_user_json_value(&json!([]), &ctx).is_err());
    assert!(matches!(
        one_of.convert_user_json_value_to_server_value(&json!({}), &ctx),
        Err(DataTypeError::Configuration(_))
    ));
}

#[test]
fn test_boolean_or_string() {
    let data_type = catalog().get("boolean_or_string").unwrap();
    let ctx = ctx();
    assert_eq!(
        data_type
            .convert_user_parameter_value_to_server_value("true", &ctx)
            .unwrap(),
        ServerValue::Bool(true)
    );
    assert_eq!(
        data_type
            .convert_user_parameter_value_to_server_value("maybe", &ctx)
            .unwrap(),
        ServerValue::String("maybe".into())
    );
}

#[test]
fn test_representation_reference_is_not_convertible() {
    let mut builder = strata::types::CatalogBuilder::new();
    let reference = builder.declare("ref<Address>").unwrap();
    let err = reference
        .convert_database_value_to_server_value(&json!({"city": "Lyon"}))
        .unwrap_err();
    assert!(err.is_programming_error());
}

#[test]
fn test_write_api_value_is_null_safe() {
    let integer = catalog().get("integer").unwrap();
    let mut writer = JsonObjectWriter::new();
    integer
        .write_api_value(&mut writer, &ctx(), "count", Some(&ServerValue::Int(3)))
        .unwrap();
    integer.write_api_value(&mut writer, &ctx(), "missing", None).unwrap();
    assert!(integer
        .write_api_value(&mut writer, &ctx(), "bad", Some(&ServerValue::Bool(true)))
        .is_err());
    assert_eq!(writer.into_json(), json!({"count": 3, "missing": null}));
}
