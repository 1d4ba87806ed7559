#[path = "../support/mod.rs"]
mod support;

use std::path::{Path, PathBuf};

use hqlt::config::{Settings, SettingsError};
use hqlt::translator::{QuerySource, QueryTranslator};
use hqlt::Dialect;

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn test_settings_file_drives_translation() {
    std::env::set_var("HQLT_TEST_FIXTURES", fixtures_dir());
    let settings = Settings::from_file(fixtures_dir().join("hqlt.toml")).unwrap();

    let options = settings.translation_options().unwrap();
    assert_eq!(options.dialect, Dialect::MySql);
    assert!(options.strict_jpql_compliance);
    assert!(!options.format_sql);

    let metamodel = settings.load_metamodel().unwrap();
    let tenant = settings.filter("tenant").cloned().unwrap();
    let translator = QueryTranslator::new(&metamodel, options);
    let result = translator
        .translate(&QuerySource::new("select o.code from Order o where o.code = :code").with_filter(tenant))
        .unwrap();

    insta::assert_snapshot!(result.sql, @"SELECT o1_0.code AS col_0_0_ FROM orders AS o1_0 WHERE (o1_0.tenant_code = ?) AND o1_0.code = ?");
}

#[test]
fn test_missing_file() {
    let err = Settings::from_file(fixtures_dir().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SettingsError::FileNotFound(_)));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let err = Settings::from_toml_str("[translator\ndialect = 1").unwrap_err();
    assert!(matches!(err, SettingsError::ParseError(_)));
}

#[test]
fn test_partial_sections_fall_back_to_defaults() {
    let settings = Settings::from_toml_str("[translator]\nformat_sql = false\n").unwrap();
    assert_eq!(settings.translator.dialect, "duckdb");
    assert!(!settings.translator.format_sql);
    assert!(settings.filters.is_empty());
}

#[test]
fn test_unset_variable_in_metamodel_path() {
    let settings =
        Settings::from_toml_str("[metamodel]\npath = \"${HQLT_UNSET_VARIABLE_FOR_TEST}/model.toml\"\n").unwrap();
    let err = settings.load_metamodel().unwrap_err();
    assert!(matches!(err, SettingsError::MissingEnvVar(name) if name == "HQLT_UNSET_VARIABLE_FOR_TEST"));
}

#[test]
fn test_settings_round_trip_through_toml() {
    let settings = Settings::from_file(fixtures_dir().join("hqlt.toml")).unwrap();
    let text = toml::to_string(&settings).unwrap();
    assert_eq!(Settings::from_toml_str(&text).unwrap(), settings);
}
