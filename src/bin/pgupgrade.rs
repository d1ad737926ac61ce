//! pgupgrade - request, inspect and remove in-place cluster upgrades.
//!
//! Creating an upgrade records an intent; the operator performs the upgrade.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::Client;
use tracing::{debug, error};

use pgupgrade_operator::client::{KubeClusters, KubeIntentStore, KubeWorkloads};
use pgupgrade_operator::controller::{
    CreateOutcome, TargetQuery, create_intents, delete_intents, resolve_targets, show_intents,
};
use pgupgrade_operator::crd::UpgradeType;
use pgupgrade_operator::report::format_intent;
use pgupgrade_operator::{Error, UpgradeConfig};

/// Exit status for operational failures
const EXIT_FAILURE: i32 = 1;
/// Exit status when an image tag cannot be parsed
const EXIT_FATAL: i32 = 2;

/// Request in-place upgrades of PostgreSQL clusters.
#[derive(Parser, Debug, Clone)]
#[command(name = "pgupgrade")]
#[command(about = "Request in-place upgrades of PostgreSQL clusters")]
#[command(version)]
struct Args {
    /// Namespace to operate in [default: the kubeconfig namespace]
    #[arg(short, long, global = true, env = "PGUPGRADE_NAMESPACE")]
    namespace: Option<String>,

    /// Path to the pgo.yaml configuration file
    #[arg(long, global = true, env = "PGUPGRADE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "PGUPGRADE_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Request an upgrade of one or more clusters
    #[command(after_help = r#"Examples:
  pgupgrade create mycluster
  pgupgrade create mycluster -t major -c centos7-10.1-1.7.0
  pgupgrade create -s project=rlz"#)]
    Create {
        /// Clusters to upgrade
        #[arg(value_name = "CLUSTER", required_unless_present = "selector")]
        clusters: Vec<String>,

        /// The upgrade type to perform, either minor or major
        #[arg(short = 't', long, default_value = "minor")]
        upgrade_type: UpgradeType,

        /// The image tag to use as the upgrade target
        #[arg(short, long)]
        ccp_image_tag: Option<String>,

        /// Label selector used to pick clusters instead of names
        #[arg(short, long)]
        selector: Option<String>,
    },

    /// Show upgrades and their conversion job pods (use 'all' for every upgrade)
    Show {
        #[arg(value_name = "NAME|all", required = true)]
        names: Vec<String>,
    },

    /// Delete upgrades (use 'all' for every upgrade)
    Delete {
        #[arg(value_name = "NAME|all", required = true)]
        names: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_tracing(&args.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(EXIT_FAILURE);
    }

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        let fatal = e
            .downcast_ref::<Error>()
            .is_some_and(|err| err.is_fatal());
        std::process::exit(if fatal { EXIT_FATAL } else { EXIT_FAILURE });
    }
}

async fn run(args: Args) -> Result<()> {
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let namespace = args
        .namespace
        .unwrap_or_else(|| client.default_namespace().to_string());
    debug!(namespace = %namespace, "using namespace");

    let intents = KubeIntentStore::new(client.clone(), &namespace);

    match args.command {
        Command::Create {
            clusters,
            upgrade_type,
            ccp_image_tag,
            selector,
        } => {
            let config = UpgradeConfig::load(args.config.as_deref())?;
            let cluster_source = KubeClusters::new(client.clone(), &namespace);
            let targets = resolve_targets(
                &cluster_source,
                &intents,
                TargetQuery::Clusters {
                    names: &clusters,
                    selector: selector.as_deref(),
                },
            )
            .await?;

            let outcomes = create_intents(
                &cluster_source,
                &intents,
                &config,
                &targets,
                upgrade_type,
                ccp_image_tag,
            )
            .await?;
            for outcome in &outcomes {
                match outcome {
                    CreateOutcome::Created(_) | CreateOutcome::Ineligible(_) => {
                        println!("{outcome}")
                    }
                    CreateOutcome::ClusterNotFound(_) | CreateOutcome::Rejected { .. } => {
                        error!("{outcome}")
                    }
                }
            }
        }
        Command::Show { names } => {
            let workloads = KubeWorkloads::new(client.clone(), &namespace);
            let (found, missing) = show_intents(&intents, &workloads, &names).await?;
            for name in missing {
                println!("pgupgrade {name} not found ");
            }
            for view in found {
                print!("{}", format_intent(&view.upgrade, &view.pods));
                println!();
            }
        }
        Command::Delete { names } => {
            for outcome in delete_intents(&intents, &names).await? {
                println!("{outcome}");
            }
        }
    }

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to initialize log filter: {}", e))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
