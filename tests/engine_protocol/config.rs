//! Registry loading from `quarry.toml`

use std::sync::Arc;

use quarry::engines::{self, FileEngineConfig};
use quarry::{
    EngineRegistry, Error, ExecContext, Executor, FieldType, PluginConfig, ScanExecutor, TableInfo,
    CONFIG_FILE_NAME, DEFAULT_BATCH_CAPACITY,
};
use tempfile::TempDir;

#[test]
fn test_default_config_enables_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    PluginConfig::write_default_if_missing(&path).unwrap();

    let config = PluginConfig::from_file(&path).unwrap();
    assert_eq!(config.batch_capacity, DEFAULT_BATCH_CAPACITY);

    let registry = EngineRegistry::load(&config, engines::builtin_manifests(FileEngineConfig::new(dir.path()))).unwrap();
    assert!(registry.is_empty());
}

#[test]
fn test_config_file_selects_engines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        r#"
plugins = ["file-1", "memory-1"]
batch_capacity = 64
"#,
    )
    .unwrap();

    let config = PluginConfig::from_file(&path).unwrap();
    let registry = EngineRegistry::load(&config, engines::builtin_manifests(FileEngineConfig::new(dir.path()))).unwrap();
    assert_eq!(registry.names(), vec!["file", "memory"]);
    assert_eq!(config.batch_capacity, 64);
    registry.shutdown().unwrap();
    assert!(registry.is_empty());
}

#[test]
fn test_configured_batch_capacity_sizes_scan_batches() {
    let config = PluginConfig::from_toml_str(
        r#"
plugins = ["memory-1"]
batch_capacity = 4
"#,
    )
    .unwrap();
    let registry = Arc::new(
        EngineRegistry::load(&config, engines::builtin_manifests(FileEngineConfig::default())).unwrap(),
    );
    let table = Arc::new(
        TableInfo::new("users")
            .column("id", FieldType::Int)
            .engine("memory"),
    );

    let ctx = ExecContext::new();
    let mut scan = ScanExecutor::for_table(registry, table).unwrap();
    scan.open(&ctx).unwrap();
    let mut batch = scan.default_batch();
    assert_eq!(batch.capacity(), 4);

    let mut sizes = Vec::new();
    loop {
        scan.next(&ctx, &mut batch).unwrap();
        if batch.is_empty() {
            break;
        }
        sizes.push(batch.num_rows());
    }
    scan.close().unwrap();
    assert_eq!(sizes, vec![4, 4, 2]);
}

#[test]
fn test_version_mismatch_rejected() {
    let config = PluginConfig::from_toml_str(r#"plugins = ["search-2"]"#).unwrap();
    let result = EngineRegistry::load(&config, engines::builtin_manifests(FileEngineConfig::default()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_override_of_disabled_plugin_variable_rejected() {
    let config = PluginConfig::from_toml_str(
        r#"
plugins = ["file-1"]

[sys_vars]
search_key = "v2"
"#,
    )
    .unwrap();
    let result = EngineRegistry::load(&config, engines::builtin_manifests(FileEngineConfig::default()));
    assert!(matches!(result, Err(Error::Config(ref msg)) if msg.contains("search_key")));
}

#[test]
fn test_empty_search_key_fails_validation() {
    let config = PluginConfig::from_toml_str(
        r#"
plugins = ["search-1"]

[sys_vars]
search_key = "  "
"#,
    )
    .unwrap();
    let result = EngineRegistry::load(&config, engines::builtin_manifests(FileEngineConfig::default()));
    assert!(matches!(result, Err(Error::InvalidManifest { .. })));
}
