use dynamo_etl::config::{ConfigError, Environment, EtlConfig, ServerConfig};
use std::collections::HashMap;
use std::path::PathBuf;

fn vars() -> HashMap<String, String> {
    hashmap! {
        "dbname".to_string() => "analytics".to_string(),
        "host".to_string() => "cluster.abc.eu-west-3.redshift.amazonaws.com".to_string(),
        "user".to_string() => "etl".to_string(),
        "password".to_string() => "s3cr3t-p4ss".to_string(),
        "redshift_copy_arn".to_string() => "arn:aws:iam::123456789012:role/redshift-copy".to_string(),
        "data_bucket".to_string() => "data-lake".to_string(),
    }
}

#[test]
fn test_etl_config_defaults() {
    crate::helpers::utilities::init();
    let config = EtlConfig::from_vars(&vars()).unwrap();

    assert_eq!(config.redshift.port, 5439);
    assert_eq!(config.environment, Environment::Dev);
    assert_eq!(config.local_storage_dir, PathBuf::from("raw"));
    assert!(config.aws_credentials.is_none());
    assert!(!format!("{:?}", config).contains("s3cr3t-p4ss"));
}

#[test]
fn test_etl_config_missing_bucket() {
    let mut vars = vars();
    vars.remove("data_bucket");

    assert_eq!(
        EtlConfig::from_vars(&vars).unwrap_err(),
        ConfigError::MissingVariable {
            name: "data_bucket".to_string()
        }
    );
}

#[test]
fn test_server_config_from_vars() {
    let config = ServerConfig::from_vars(&hashmap! {
        "PORT".to_string() => "8080".to_string(),
        "BIND_ADDRESS".to_string() => "127.0.0.1".to_string(),
    })
    .unwrap();

    assert_eq!(config.port, 8080);
    assert_eq!(config.bind_address.to_string(), "127.0.0.1");
    assert_eq!(ServerConfig::from_vars(&HashMap::new()).unwrap().port, 80);
}
