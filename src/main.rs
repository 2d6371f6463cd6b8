use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aws_web_pub::assembly::{self, SynthContext};
use aws_web_pub::cdk::{app_command, CdkDriver, ProcessRunner};

#[derive(Parser)]
#[command(name = "aws-web-pub")]
#[command(about = "Publish a static website to S3 and CloudFront", long_about = None)]
#[command(version)]
struct Cli {
    /// AWS profile handed to cdk
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the website stack and upload the publish directory
    #[command(visible_alias = "deploy")]
    Publish {
        /// Directory containing .aws-web-pub.json
        #[arg(default_value = ".")]
        project_dir: PathBuf,
    },
    /// Delete the website stack and everything in it
    #[command(visible_alias = "destroy")]
    Unpublish {
        /// Directory containing .aws-web-pub.json
        #[arg(default_value = ".")]
        project_dir: PathBuf,
    },
    /// Write the cloud assembly, run by cdk
    #[command(hide = true)]
    Synth,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout belongs to cdk when it runs us as its app
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Publish { project_dir } => {
            let mut cdk = driver(cli.profile)?;
            cdk.publish(&project_dir)
                .with_context(|| format!("failed to publish {}", project_dir.display()))?;
        }
        Commands::Unpublish { project_dir } => {
            let mut cdk = driver(cli.profile)?;
            cdk.unpublish(&project_dir)
                .with_context(|| format!("failed to unpublish {}", project_dir.display()))?;
        }
        Commands::Synth => {
            let ctx = SynthContext::from_env()?;
            assembly::synth(&ctx).context("failed to synthesize the website stack")?;
        }
    }
    Ok(())
}

fn driver(profile: Option<String>) -> anyhow::Result<CdkDriver<ProcessRunner>> {
    let exe = std::env::current_exe().context("cannot locate the aws-web-pub executable")?;
    Ok(CdkDriver::new(ProcessRunner, profile, app_command(&exe)))
}
