//! Tests for the rule loader module.

use std::fs;

use tempfile::TempDir;

use super::*;

const VALID_RULE_YAML: &str = r#"
apiVersion: v1
kind: ThresholdRule
metadata:
  id: thread-parks
  name: Thread Parking
  topic: threads
spec:
  event_type: jdk.ThreadPark
  metric: count
  warning: 100
  summary: "{{ value }} park events"
"#;

fn temp_loader() -> (TempDir, RuleLoader) {
    let dir = TempDir::new().expect("create tempdir");
    let loader = RuleLoader::new(dir.path().to_path_buf());
    (dir, loader)
}

fn loaded_ids(results: &[LoadResult]) -> Vec<&str> {
    results
        .iter()
        .filter_map(|r| match &r.status {
            LoadStatus::Loaded { rule_id } => Some(rule_id.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn load_rule_from_file() {
    let (dir, loader) = temp_loader();
    let rule_path = dir.path().join("thread-parks.yml");
    fs::write(&rule_path, VALID_RULE_YAML).unwrap();

    let rule = loader.load_file(&rule_path).unwrap();
    assert_eq!(rule.metadata().id, "thread-parks");
    assert_eq!(rule.metadata().name, "Thread Parking");
}

#[test]
fn load_all_skips_dotfiles_and_non_yaml() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("rule1.yml"), VALID_RULE_YAML).unwrap();
    fs::write(dir.path().join(".hidden.yml"), VALID_RULE_YAML).unwrap();
    fs::write(dir.path().join("readme.txt"), "not a rule").unwrap();

    let results = loader.load_all().unwrap();

    assert_eq!(loaded_ids(&results), vec!["thread-parks"]);
    let skipped = results
        .iter()
        .filter(|r| matches!(r.status, LoadStatus::Skipped { .. }))
        .count();
    assert_eq!(skipped, 2);
    assert_eq!(loader.len(), 1);
}

#[test]
fn load_all_recurses_into_subdirectories() {
    let (dir, loader) = temp_loader();
    let nested = dir.path().join("gc").join("extra");
    fs::create_dir_all(&nested).unwrap();
    fs::write(
        nested.join("nested.yaml"),
        VALID_RULE_YAML.replace("thread-parks", "nested-rule"),
    )
    .unwrap();

    let results = loader.load_all().unwrap();
    assert_eq!(loaded_ids(&results), vec!["nested-rule"]);
}

#[test]
fn bad_file_does_not_abort_scan() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("a-broken.yml"), "apiVersion: v1\nkind: [unclosed").unwrap();
    fs::write(dir.path().join("b-good.yml"), VALID_RULE_YAML).unwrap();

    let results = loader.load_all().unwrap();
    assert_eq!(loaded_ids(&results), vec!["thread-parks"]);
    assert!(results
        .iter()
        .any(|r| matches!(r.status, LoadStatus::Failed { .. })));
}

#[test]
fn unknown_kind_rejected() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("other.yml");
    fs::write(&path, VALID_RULE_YAML.replace("ThresholdRule", "AnomalyRule")).unwrap();
    assert!(matches!(loader.load_file(&path), Err(RuleError::Validation(_))));
}

#[test]
fn invalid_template_rejected() {
    let (dir, loader) = temp_loader();
    let path = dir.path().join("bad-template.yml");
    fs::write(
        &path,
        VALID_RULE_YAML.replace("\"{{ value }} park events\"", "\"{{ value \""),
    )
    .unwrap();
    assert!(matches!(loader.load_file(&path), Err(RuleError::Template(_))));
}

#[test]
fn disabled_rules_are_skipped() {
    let (dir, loader) = temp_loader();
    fs::write(
        dir.path().join("off.yml"),
        VALID_RULE_YAML.replace("  topic: threads\n", "  topic: threads\n  enabled: false\n"),
    )
    .unwrap();

    let results = loader.load_all().unwrap();
    assert!(loaded_ids(&results).is_empty());
    assert!(loader.is_empty());
}

#[test]
fn duplicate_ids_reported_as_failures() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("one.yml"), VALID_RULE_YAML).unwrap();
    fs::write(dir.path().join("two.yml"), VALID_RULE_YAML).unwrap();

    let results = loader.load_all().unwrap();
    assert_eq!(loaded_ids(&results), vec!["thread-parks"]);
    assert_eq!(loader.len(), 1);
}

#[test]
fn registry_contains_loaded_rules() {
    let (dir, loader) = temp_loader();
    fs::write(dir.path().join("a.yml"), VALID_RULE_YAML).unwrap();
    fs::write(
        dir.path().join("b.yml"),
        VALID_RULE_YAML.replace("thread-parks", "more-parks"),
    )
    .unwrap();
    loader.load_all().unwrap();

    let registry = loader.registry().unwrap();
    let ids: Vec<&str> = registry.rules().iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec!["more-parks", "thread-parks"]);
}

#[test]
fn missing_directory_is_an_error() {
    let loader = RuleLoader::new("/definitely/not/here".into());
    assert!(loader.load_all().is_err());
}
