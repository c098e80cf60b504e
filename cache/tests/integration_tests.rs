use std::path::Path;

use command_runtime_cache::{
    CacheError, CacheSource, ManifestCache, RuntimeConfig, generate_manifest, load_manifest,
    save_manifest,
};
use command_runtime_core::{
    CommandDescriptor, ErrorKind, FlagDescriptor, ManifestBundle, PluginManifest, PluginRecord,
    PluginType,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sealed(name: &str, plugin_type: PluginType, ids: &[&str]) -> PluginManifest {
    let plugin = ids.iter().fold(PluginRecord::new(name, plugin_type), |p, id| {
        p.with_command(CommandDescriptor::new(id).with_flag(FlagDescriptor::boolean("force")))
    });
    generate_manifest(plugin, "1.0.0").unwrap()
}

fn write_bundle(path: &Path, manifests: Vec<PluginManifest>) {
    let mut bundle = ManifestBundle::new("1.0.0", "2024-01-01T00:00:00Z");
    bundle.manifests = manifests;
    std::fs::write(path, serde_json::to_string_pretty(&bundle).unwrap()).unwrap();
}

// ---------------------------------------------------------------------------
// Directory and bundle loading
// ---------------------------------------------------------------------------

#[test]
fn test_directory_loading() {
    let dir = tempfile::tempdir().unwrap();
    save_manifest(&sealed("mycli", PluginType::Core, &["hello", "deploy:app"]), dir.path().join("a.json")).unwrap();
    save_manifest(&sealed("plugin-x", PluginType::User, &["hello"]), dir.path().join("b.json")).unwrap();

    let cache = ManifestCache::from_dir(dir.path()).unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.commands().count(), 3);
    assert_eq!(cache.get("plugin-x").unwrap().command_count(), 1);
    assert!(cache.get("missing").is_none());
}

#[test]
fn test_bundle_keeps_file_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifests.json");
    write_bundle(
        &path,
        vec![
            sealed("zeta", PluginType::User, &["z"]),
            sealed("alpha", PluginType::User, &["a"]),
        ],
    );

    let cache = ManifestCache::from_bundle(&path).unwrap();
    let names: Vec<String> = cache.plugins().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["zeta", "alpha"]);
}

#[test]
fn test_bundle_round_trip_through_save() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ManifestCache::from_manifests(vec![sealed("mycli", PluginType::Core, &["a"])]).unwrap();
    let path = dir.path().join("out.json");
    cache.save_bundle(&path, "2.0.0").unwrap();

    let reloaded = ManifestCache::from_bundle(&path).unwrap();
    assert_eq!(reloaded.manifests(), cache.manifests());
}

#[test]
fn test_tampered_manifest_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mycli.json");
    let mut manifest = sealed("mycli", PluginType::Core, &["hello"]);
    manifest.plugin.commands[0].aliases.push("hi".into());
    save_manifest(&manifest, &path).unwrap();

    let err = load_manifest(&path).unwrap_err();
    assert!(matches!(err, CacheError::InvalidChecksum { .. }));
    assert!(ManifestCache::from_dir(dir.path()).is_err());
}

#[test]
fn test_hand_written_manifest_without_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hand.json");
    let json = r#"{
        "version": "0.1.0",
        "generated_at": "2024-01-01T00:00:00Z",
        "plugin": {
            "name": "hand",
            "type": "link",
            "commands": [
                {"id": "greet", "aliases": ["hi"], "flags": {
                    "name": {"name": "name", "type": "option", "char": "n"}
                }}
            ]
        }
    }"#;
    std::fs::write(&path, json).unwrap();

    let manifest = load_manifest(&path).unwrap();
    let cmd = &manifest.plugin.commands[0];
    assert_eq!(cmd.plugin_alias.as_deref(), Some("hand"));
    assert_eq!(cmd.plugin_type, Some(PluginType::Link));
    assert_eq!(cmd.flag("name").unwrap().short, Some('n'));
}

// ---------------------------------------------------------------------------
// Builder fallback chain
// ---------------------------------------------------------------------------

#[test]
fn test_builder_falls_back_to_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifests.json");
    write_bundle(&path, vec![sealed("mycli", PluginType::Core, &["a"])]);

    let cache = ManifestCache::builder()
        .from_dir(dir.path().join("missing"))
        .from_bundle(&path)
        .build()
        .unwrap();
    assert_eq!(cache.len(), 1);
    assert!(matches!(cache.source(), CacheSource::Multiple(sources) if sources.len() == 2));
}

// ---------------------------------------------------------------------------
// Runtime config
// ---------------------------------------------------------------------------

#[test]
fn test_config_yaml_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let yaml_path = dir.path().join("mycli.yml");
    std::fs::write(
        &yaml_path,
        r#"
bin: mycli
plugins:
  - "@mycli/plugin-help"
flexible_taxonomy: true
topic_separator: " "
exit_codes:
  requiredArgs: 105
  notAKind: 9
hook_timeout_ms: 250
"#,
    )
    .unwrap();

    let config = RuntimeConfig::load(&yaml_path).unwrap();
    assert_eq!(config.bin, "mycli");
    assert_eq!(config.plugins, vec!["@mycli/plugin-help"]);
    assert!(config.flexible_taxonomy);
    assert_eq!(config.topic_separator, ' ');
    assert_eq!(config.exit_codes.exit_for(ErrorKind::RequiredArgs), 105);
    assert_eq!(config.exit_codes.unknown_keys(), vec!["notAKind"]);
    assert_eq!(config.hook_timeout_ms, Some(250));

    let json_path = dir.path().join("mycli.json");
    config.save(&json_path).unwrap();
    assert!(std::fs::read_to_string(&json_path).unwrap().trim_start().starts_with('{'));
    assert_eq!(RuntimeConfig::load(&json_path).unwrap(), config);
}

#[test]
fn test_config_rejects_bad_separator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"topic_separator": "/"}"#).unwrap();
    assert!(matches!(
        RuntimeConfig::load(&path),
        Err(CacheError::InvalidConfig(_))
    ));
}
