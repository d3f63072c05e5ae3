use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Environment;

#[derive(Parser, Debug)]
#[command(name = "dynamo-etl", version, about = "DynamoDB to Redshift loader and its web service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the HTTP server.
    Serve,
    /// Run one extraction of every eligible table.
    Extract {
        #[arg(long, help = "Bucket receiving the csv exports, overrides `data_bucket`")]
        bucket: Option<String>,
        #[arg(long = "env", help = "Environment, overrides `env`")]
        environment: Option<Environment>,
    },
    /// Build the image and push it with its computed tags.
    Publish {
        #[arg(long, env = "ECR_REGISTRY")]
        registry: Option<String>,
        #[arg(long, env = "ECR_REPOSITORY")]
        repository: String,
        #[arg(long, env = "GITHUB_SHA", help = "Commit sha, `git rev-parse HEAD` when unset")]
        sha: Option<String>,
        #[arg(long, default_value = "Dockerfile")]
        dockerfile: PathBuf,
        #[arg(long, default_value = ".")]
        context: PathBuf,
        #[arg(long, default_value_t = false, help = "Do not tag the image as `latest`")]
        no_latest: bool,
        #[arg(long, env = "AWS_REGION")]
        region: Option<String>,
    },
}
