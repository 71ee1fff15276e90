//! Every shipped scenario file must load and validate.

use review_load_test::scenarios::review_workflow;
use review_load_test::TestConfig;
use std::path::PathBuf;

fn scenarios_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios")
}

#[test]
fn test_all_scenarios_validate() {
    let mut seen = 0;
    for entry in std::fs::read_dir(scenarios_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|s| s.to_str()) != Some("yaml") {
            continue;
        }
        let config = TestConfig::from_file(&path)
            .unwrap_or_else(|e| panic!("{} failed to parse: {}", path.display(), e));
        config
            .validate()
            .unwrap_or_else(|e| panic!("{} failed to validate: {}", path.display(), e));
        seen += 1;
    }
    assert!(seen >= 3);
}

#[test]
fn test_pr_review_file_matches_builtin_workflow() {
    let config = TestConfig::from_file(scenarios_dir().join("pr_review.yaml")).unwrap();
    assert_eq!(config.concurrency, 5);
    assert_eq!(config.iterations_per_client, 50);

    let from_file = config.workflow().unwrap();
    let builtin = review_workflow().unwrap();
    assert_eq!(from_file.name(), builtin.name());
    assert_eq!(from_file.seeds(), builtin.seeds());
    assert_eq!(from_file.steps(), builtin.steps());
}

#[test]
fn test_reassign_scenario_tolerates_conflict() {
    let config = TestConfig::from_file(scenarios_dir().join("pr_reassign.yaml")).unwrap();
    let workflow = config.workflow().unwrap();
    let reassign = workflow
        .steps()
        .iter()
        .find(|s| s.name == "reassign-reviewer")
        .unwrap();
    assert_eq!(
        reassign.expect,
        review_load_test::Expectation::StatusIn(vec![200, 409])
    );
    assert!(reassign.required_keys().unwrap().contains("first_reviewer"));
}
