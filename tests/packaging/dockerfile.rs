use crate::helpers::utilities::read_repository_file;

/// Instructions of the last stage, the one shipped as the image.
fn final_stage_instructions() -> Vec<(String, String)> {
    let dockerfile = read_repository_file("Dockerfile");
    let mut stages: Vec<Vec<(String, String)>> = vec![];

    for line in dockerfile.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (instruction, arguments) = line.split_once(' ').unwrap_or((line, ""));
        let instruction = instruction.to_uppercase();
        if instruction == "FROM" {
            stages.push(vec![]);
        }
        if let Some(stage) = stages.last_mut() {
            stage.push((instruction, arguments.trim().to_string()));
        }
    }

    assert!(stages.len() >= 2, "expected a multi-stage build");
    stages.pop().unwrap_or_default()
}

fn arguments_of(instructions: &[(String, String)], instruction: &str) -> Vec<String> {
    instructions
        .iter()
        .filter(|(i, _)| i == instruction)
        .map(|(_, args)| args.clone())
        .collect()
}

#[test]
fn test_workdir_is_app() {
    let instructions = final_stage_instructions();
    assert_eq!(arguments_of(&instructions, "WORKDIR"), vec!["/app".to_string()]);
}

#[test]
fn test_exposes_port_80() {
    let instructions = final_stage_instructions();
    assert_eq!(arguments_of(&instructions, "EXPOSE"), vec!["80".to_string()]);

    let envs = arguments_of(&instructions, "ENV");
    assert!(envs.contains(&"PORT=80".to_string()));
}

#[test]
fn test_starts_http_server() {
    let instructions = final_stage_instructions();
    let cmd = arguments_of(&instructions, "CMD");
    assert_eq!(cmd.len(), 1);

    let cmd: Vec<String> = serde_json::from_str(&cmd[0]).expect("CMD must use the exec form");
    assert_eq!(cmd, vec!["dynamo-etl".to_string(), "serve".to_string()]);
}

#[test]
fn test_no_cloud_cli_installed() {
    let dockerfile = read_repository_file("Dockerfile").to_lowercase();
    assert!(!dockerfile.contains("awscli"));
    assert!(!dockerfile.contains("aws/install"));
}
