use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

use spectql::spectql::execute;
use spectql::storage::{Catalog, TableManager};

const GEO: &[(&str, f64, &str)] = &[
    ("Tirin Kot", 32.7, "Uruzgan"),
    ("Chora", 32.58, "Uruzgan"),
    ("Khas Uruzgan", 33.0, "Uruzgan"),
    ("Kabul", 34.53, "Kabul"),
];

fn load_test_manager(dir: &TempDir) -> TableManager {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("districts").unwrap();
    sheet.write_string(0, 0, "Source: AIMS").unwrap();
    for (col, name) in ["Dist_Name", "lat", "Prov_Name"].iter().enumerate() {
        sheet.write_string(1, col as u16, *name).unwrap();
    }
    for (i, (name, lat, province)) in GEO.iter().enumerate() {
        let row = i as u32 + 2;
        sheet.write_string(row, 0, *name).unwrap();
        sheet.write_number(row, 1, *lat).unwrap();
        sheet.write_string(row, 2, *province).unwrap();
    }
    workbook.save(dir.path().join("geo.xlsx")).unwrap();

    let catalog_path = dir.path().join("catalog.toml");
    std::fs::write(
        &catalog_path,
        r#"
[[dataset]]
path = "sheets/geo"
type = "xlsx"
uri = "geo.xlsx"
sheet = "districts"
start_row = 2
[dataset.aliases]
Dist_Name = "district"
"#,
    )
    .unwrap();

    TableManager::new(Catalog::load(&catalog_path).unwrap())
}

#[test]
fn test_projection_and_filter() {
    let dir = TempDir::new().unwrap();
    let manager = load_test_manager(&dir);

    let records = execute(&manager, "sheets/geo{district,lat}?Prov_Name=='Uruzgan'&lat>32.6").unwrap();
    assert_eq!(
        serde_json::to_string(&records).unwrap(),
        r#"[{"district":"Tirin Kot","lat":"32.7"},{"district":"Khas Uruzgan","lat":"33"}]"#
    );
}

#[test]
fn test_aggregates() {
    let dir = TempDir::new().unwrap();
    let manager = load_test_manager(&dir);

    let records = execute(&manager, "sheets/geo{count(district),max(lat)}?Prov_Name=='Uruzgan'").unwrap();
    assert_eq!(
        serde_json::to_string(&records).unwrap(),
        r#"[{"count_district":3,"max_lat":33}]"#
    );
}
