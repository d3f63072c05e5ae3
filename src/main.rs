#[macro_use]
extern crate tracing;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::Parser;

use dynamo_etl::aws::{load_sdk_config, resolve_sdk_config};
use dynamo_etl::cli::{Cli, Commands};
use dynamo_etl::cmd::docker::Docker;
use dynamo_etl::config::{Environment, EtlConfig, ServerConfig};
use dynamo_etl::extraction::{DataExtraction, ExtractionSettings};
use dynamo_etl::redshift::RedshiftConnector;
use dynamo_etl::release::{PublishConfig, publish, resolve_commit_sha};
use dynamo_etl::{logger, runtime, server};

fn main() -> anyhow::Result<()> {
    logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = ServerConfig::from_env()?;
            runtime::block_on(server::serve(config)).context("http server failed")?;
        }
        Commands::Extract { bucket, environment } => {
            runtime::block_on(extract(bucket, environment))?;
        }
        Commands::Publish {
            registry,
            repository,
            sha,
            dockerfile,
            context,
            no_latest,
            region,
        } => {
            let config = PublishConfig {
                registry,
                repository,
                commit_sha: resolve_commit_sha(sha)?,
                dockerfile,
                context,
                include_latest: !no_latest,
            };
            let sdk_config = runtime::block_on(load_sdk_config(region.as_deref()));
            let image = publish(&config, &sdk_config, &Docker::new(None), &Utc::now())?;
            info!("published {} with tags {}", image.repository(), image.tags.join(", "));
        }
    }

    Ok(())
}

async fn extract(bucket: Option<String>, environment: Option<Environment>) -> anyhow::Result<()> {
    let mut config = EtlConfig::from_env()?;
    if let Some(bucket) = bucket {
        config.data_bucket = bucket;
    }
    if let Some(environment) = environment {
        config.environment = environment;
    }

    let sdk_config = resolve_sdk_config(config.aws_credentials.as_ref(), config.aws_region.as_deref()).await;
    let warehouse = RedshiftConnector::connect(&config.redshift).await?;

    let settings = ExtractionSettings {
        environment: config.environment.clone(),
        copy_role_arn: config.copy_role_arn.clone(),
        local_storage_dir: config.local_storage_dir.clone(),
    };
    let report = DataExtraction::new(&sdk_config, &sdk_config, &warehouse, settings)
        .extract_and_load(&config.data_bucket)
        .await;
    warehouse.close().await;

    let report = report?;
    if !report.is_success() {
        let failed: Vec<&str> = report.failed.iter().map(|(table, _)| table.as_str()).collect();
        bail!("extraction failed for {} table(s): {}", failed.len(), failed.join(", "));
    }

    Ok(())
}
