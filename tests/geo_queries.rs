use std::path::PathBuf;

use spectql::spectql::{execute, parse_query, ErrorKind, Interpreter, Record};
use spectql::storage::{Catalog, TableManager, Value};

fn load_test_manager() -> TableManager {
    let catalog_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("samples")
        .join("catalog.toml");
    let catalog = Catalog::load(&catalog_path).expect("Failed to load samples/catalog.toml");
    TableManager::new(catalog)
}

fn query(query: &str) -> Vec<Record> {
    let manager = load_test_manager();
    execute(&manager, query).unwrap()
}

fn number(record: &Record, name: &str) -> f64 {
    record
        .get(name)
        .and_then(Value::as_float)
        .unwrap_or_else(|| panic!("{} is not numeric in {:?}", name, record))
}

fn text_column(records: &[Record], name: &str) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get(name).map(|v| v.to_string()).unwrap_or_default())
        .collect()
}

#[test]
fn test_wildcard_returns_every_row_in_schema_order() {
    let records = query("tabular/geo{*}");

    assert_eq!(records.len(), 12);
    assert_eq!(
        serde_json::to_string(&records[0]).unwrap(),
        r#"{"lon":"61.33","lat":"32.4","Unit_Type":"District","Dist_Name":"Qala-e-Kah","Prov_Name":"Farah","Dist_ID":"3106","Prov_ID":"31"}"#
    );
}

#[test]
fn test_leading_slash_and_format_tag() {
    let manager = load_test_manager();
    let parsed = parse_query("/tabular/geo{Dist_Name}?Prov_Name=='Kabul':json").unwrap();
    assert_eq!(parsed.format.as_deref(), Some("json"));

    let result = Interpreter::new(&manager).interpret(&parsed).unwrap();
    assert_eq!(result.row_count(), 2);
}

#[test]
fn test_count() {
    let records = query("tabular/geo{count(lat)}?Prov_Name=='Uruzgan'");

    assert_eq!(records.len(), 1);
    assert_eq!(serde_json::to_string(&records[0]).unwrap(), r#"{"count_lat":5}"#);
}

#[test]
fn test_avg_sum_min_max_on_filtered_rows() {
    let records = query(
        "tabular/geo{avg(lat),sum(lat),max(lat),min(lat)}?Prov_Name=='Uruzgan'",
    );

    assert_eq!(records.len(), 1);
    let names: Vec<&str> = records[0].names().collect();
    assert_eq!(names, vec!["avg_lat", "sum_lat", "max_lat", "min_lat"]);
    assert!((number(&records[0], "avg_lat") - 32.822).abs() < 1e-9);
    assert!((number(&records[0], "sum_lat") - 164.11).abs() < 1e-9);
    assert_eq!(number(&records[0], "max_lat"), 33.0);
    assert_eq!(number(&records[0], "min_lat"), 32.58);
}

#[test]
fn test_text_extremes_serialize_like_the_source_cell() {
    let records = query("tabular/geo{max(lat),min(lat),max(Dist_ID)}?Prov_Name=='Uruzgan'");

    assert_eq!(
        serde_json::to_string(&records[0]).unwrap(),
        r#"{"max_lat":33,"min_lat":32.58,"max_Dist_ID":2505}"#
    );
}

#[test]
fn test_aggregates_over_all_rows() {
    let records = query("tabular/geo{max(lat),min(lat),avg(lon),count(Dist_Name)}");
    let record = &records[0];

    assert_eq!(number(record, "max_lat"), 38.23);
    assert_eq!(number(record, "min_lat"), 29.88);
    assert!((number(record, "avg_lon") - 66.195).abs() < 1e-9);
    assert_eq!(record.get("count_Dist_Name"), Some(&Value::Integer(12)));
}

#[test]
fn test_text_min_max_fall_back_to_lexicographic() {
    let records = query("tabular/geo{min(Dist_Name),max(Unit_Type)}");

    assert_eq!(
        records[0].get("min_Dist_Name"),
        Some(&Value::String("Chora".to_string()))
    );
    assert_eq!(
        records[0].get("max_Unit_Type"),
        Some(&Value::String("Provincial Center".to_string()))
    );
}

#[test]
fn test_ucase() {
    let records = query("tabular/geo{ucase(Prov_Name)}?Prov_Name=='Uruzgan'");

    assert_eq!(records.len(), 5);
    for record in &records {
        assert_eq!(
            serde_json::to_string(record).unwrap(),
            r#"{"uppercase_Prov_Name":"URUZGAN"}"#
        );
    }
}

#[test]
fn test_lcase_and_len() {
    let records = query("tabular/geo{lcase(Dist_Name),len(Prov_Name)}");

    assert_eq!(records.len(), 12);
    assert_eq!(
        serde_json::to_string(&records[0]).unwrap(),
        r#"{"lowercase_Dist_Name":"qala-e-kah","length_Prov_Name":5}"#
    );
}

#[test]
fn test_equality_is_case_sensitive() {
    assert!(query("tabular/geo{*}?Prov_Name=='uruzgan'").is_empty());
    assert_eq!(query("tabular/geo{*}?Prov_Name!='Uruzgan'").len(), 7);
}

#[test]
fn test_numeric_comparison_on_text_columns() {
    let records = query("tabular/geo{Dist_Name}?lat==33");
    assert_eq!(
        text_column(&records, "Dist_Name"),
        vec!["Khas Uruzgan", "Shahidi Hassas"]
    );

    let records = query("tabular/geo{Dist_Name}?Prov_ID<1");
    assert_eq!(text_column(&records, "Dist_Name"), vec!["Kabul", "Paghman"]);
}

#[test]
fn test_ordering_operators_are_inclusive() {
    let records = query("tabular/geo{Dist_Name}?Unit_Type>'District'&Dist_Name>'Pusht Rod'");

    assert_eq!(
        text_column(&records, "Dist_Name"),
        vec!["Qala-e-Kah", "Tirin Kot", "Shahidi Hassas", "Wakhan"]
    );
}

#[test]
fn test_projection_order_follows_query() {
    let records = query("tabular/geo{Prov_Name,lat,Dist_Name}?Dist_ID=='2503'");

    assert_eq!(records.len(), 1);
    assert_eq!(
        serde_json::to_string(&records[0]).unwrap(),
        r#"{"Prov_Name":"Uruzgan","lat":"32.58","Dist_Name":"Chora"}"#
    );
}

#[test]
fn test_interpretation_is_idempotent() {
    let manager = load_test_manager();
    let q = "tabular/geo{Dist_Name,lat}?Prov_Name!='Kabul'&lat>32.5";

    assert_eq!(execute(&manager, q).unwrap(), execute(&manager, q).unwrap());
}

#[test]
fn test_reprinted_query_gives_same_result() {
    let manager = load_test_manager();
    let parsed = parse_query("tabular/geo { Dist_Name , len(Prov_Name) } ? Prov_Name == 'Helmand'").unwrap();
    let reprinted = parsed.to_string();

    assert_eq!(parse_query(&reprinted).unwrap(), parsed);
    assert_eq!(
        execute(&manager, &reprinted).unwrap(),
        Interpreter::new(&manager)
            .interpret(&parsed)
            .map(spectql::spectql::convert)
            .unwrap()
    );
}

#[test]
fn test_errors() {
    let manager = load_test_manager();
    let kind = |q: &str| execute(&manager, q).unwrap_err().kind();

    assert_eq!(kind("tabular/nowhere{*}"), ErrorKind::SourceUnavailable);
    assert_eq!(kind("tabular/geo{nosuchfn(lat)}"), ErrorKind::UnknownFunction);
    assert_eq!(kind("tabular/geo{elevation}"), ErrorKind::UnknownColumn);
    assert_eq!(kind("tabular/geo{count(lat),Dist_Name}"), ErrorKind::MixedProjection);
    assert_eq!(kind("tabular/geo{*}?lat=33"), ErrorKind::SyntaxError);
    assert_eq!(kind("tabular/geo{}"), ErrorKind::ParseError);
    assert_eq!(kind("geo{*}"), ErrorKind::ParseError);
}
