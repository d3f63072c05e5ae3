use crate::helpers::utilities::read_repository_file;
use serde_yaml::Value;

fn workflow() -> Value {
    serde_yaml::from_str(&read_repository_file(".github/workflows/deploy.yml")).expect("workflow is valid yaml")
}

fn steps(workflow: &Value) -> Vec<Value> {
    workflow["jobs"]["deploy"]["steps"]
        .as_sequence()
        .cloned()
        .unwrap_or_default()
}

fn step_named(steps: &[Value], name: &str) -> (usize, Value) {
    steps
        .iter()
        .enumerate()
        .find(|(_, s)| s["name"].as_str().is_some_and(|n| n.contains(name)))
        .map(|(i, s)| (i, s.clone()))
        .unwrap_or_else(|| panic!("no step named {}", name))
}

#[test]
fn test_triggers_only_on_push_to_master() {
    let workflow = workflow();
    let on = workflow["on"].as_mapping().expect("`on` must be a mapping");

    assert_eq!(on.len(), 1);
    assert_eq!(
        workflow["on"]["push"]["branches"],
        serde_yaml::to_value(vec!["master"]).unwrap()
    );
}

#[test]
fn test_permissions() {
    let workflow = workflow();
    let expected = btreemap! {
        "id-token".to_string() => "write".to_string(),
        "contents".to_string() => "read".to_string(),
    };

    let permissions: std::collections::BTreeMap<String, String> =
        serde_yaml::from_value(workflow["permissions"].clone()).unwrap();
    assert_eq!(permissions, expected);
}

#[test]
fn test_consumes_secrets() {
    let content = read_repository_file(".github/workflows/deploy.yml");
    for secret in [
        "AWS_GITHUB_ROLE",
        "AWS_GITHUB_ROLE_SESSION_ROLE",
        "AWS_REGION",
        "AWS_ECR_REPOSITORY",
    ] {
        assert!(
            content.contains(&format!("secrets.{} }}", secret)),
            "secret {} is not used",
            secret
        );
    }
}

#[test]
fn test_build_step_pushes_computed_tags() {
    let workflow = workflow();
    let steps = steps(&workflow);
    let (build_index, build) = step_named(&steps, "push image");
    let (tests_index, _) = step_named(&steps, "Run tests");

    assert!(tests_index < build_index, "tests must run before the image is pushed");

    let env = build["env"].as_mapping().expect("build step has env");
    assert!(env.contains_key("ECR_REGISTRY"));
    assert!(env.contains_key("ECR_REPOSITORY"));

    let run = build["run"].as_str().unwrap_or_default();
    assert!(run.contains("publish"));
    assert!(run.contains("$ECR_REGISTRY"));
    assert!(run.contains("$ECR_REPOSITORY"));
    assert!(run.contains("--sha"));
    assert!(!run.contains("--no-latest"));
}
