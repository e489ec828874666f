use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use kbindex_core::config::{ENV_INDEX_ENDPOINT, ENV_REGION};
use kbindex_core::{Config, ResourceChangeEvent};
use kbindex_indexhub::{HttpIndexStore, Unsigned};
use kbindex_ingest::{HttpIngestionApi, IngestionTrigger};
use kbindex_policy::{ArnResolver, Collection, CollectionProps};
use kbindex_reconcile::IndexReconciler;
use tokio::signal;
use tracing::{error, info, warn};
use uuid::Uuid;

mod input;

use input::{parse_doc, read_source, Access, GrantSpec};

#[derive(Parser, Debug)]
#[command(name = "kbindexctl", version, about = "kbindex CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Index-store endpoint (overrides OPENSEARCH_DOMAIN)
    #[arg(long = "endpoint", global = true)]
    endpoint: Option<String>,

    /// Region (overrides AWS_REGION)
    #[arg(long = "region", global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply one resource change event to the index store
    Reconcile {
        /// Event file (JSON or YAML); "-" reads stdin
        #[arg(long = "event", default_value = "-")]
        event: PathBuf,
    },
    /// Start a data-source ingestion job, once or on an interval
    Ingest {
        #[arg(long = "knowledge-base")]
        knowledge_base: String,
        #[arg(long = "data-source")]
        data_source: String,
        /// Fire every N seconds until Ctrl-C
        #[arg(long = "every")]
        every: Option<u64>,
    },
    /// Render the access, encryption and network policies for a collection
    Policy {
        #[arg(long = "collection")]
        collection: String,
        /// Grant list file: [{access: read|read_write, principal: {type: ..., ...}}]
        #[arg(long = "grants")]
        grants: PathBuf,
        /// Account id for service principals
        #[arg(long = "account", env = "AWS_ACCOUNT_ID")]
        account: Option<String>,
        /// Customer-managed KMS key ARN
        #[arg(long = "kms-key")]
        kms_key: Option<String>,
        #[arg(long = "public", action = ArgAction::SetTrue)]
        public: bool,
        #[arg(long = "vpc-endpoint")]
        vpc_endpoints: Vec<String>,
        #[arg(long = "source-service")]
        source_services: Vec<String>,
    },
}

fn init_tracing() {
    let env = std::env::var("KBINDEX_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KBINDEX_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid KBINDEX_METRICS_ADDR; expected host:port");
        }
    }
}

/// Environment config with CLI overrides; missing endpoint/region is fatal here.
fn load_config(cli: &Cli) -> Result<Config> {
    let endpoint = cli.endpoint.clone();
    let region = cli.region.clone();
    Config::from_lookup(|k| match k {
        ENV_INDEX_ENDPOINT if endpoint.is_some() => endpoint.clone(),
        ENV_REGION if region.is_some() => region.clone(),
        _ => std::env::var(k).ok(),
    })
    .context("loading configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Reconcile { event } => {
            let cfg = load_config(&cli)?;
            let text = read_source(event)?;
            // Properties stay undecoded here so a malformed bag is still answered.
            let ev: ResourceChangeEvent<serde_json::Value> = parse_doc(&text, "event")?;
            info!(request_id = %ev.request_id, change = %ev.change_type, "reconcile invoked");
            let store = HttpIndexStore::from_config(&cfg, Arc::new(Unsigned))?;
            let reconciler = IndexReconciler::new(Arc::new(store));
            let (result, outcome) = reconciler.reconcile_raw(ev).await;
            match cli.output {
                Output::Human => {
                    match &outcome {
                        Ok(o) => println!("{:?} {} ({:?})", result.status, result.physical_id, o),
                        Err(e) => {
                            println!("{:?} {}", result.status, result.physical_id);
                            eprintln!("warning: index change not applied: {}", e);
                        }
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&result)?),
            }
        }
        Commands::Ingest { knowledge_base, data_source, every } => {
            let cfg = load_config(&cli)?;
            let api = HttpIngestionApi::from_config(&cfg, Arc::new(Unsigned))?;
            let trigger = IngestionTrigger::new(Arc::new(api));
            let run = Uuid::new_v4();
            match every {
                None => {
                    info!(run = %run, kb = %knowledge_base, ds = %data_source, "ingest invoked");
                    trigger.trigger(knowledge_base, data_source).await?;
                    if cli.output == Output::Human {
                        println!("ingestion started for {}/{}", knowledge_base, data_source);
                    }
                }
                Some(0) => return Err(anyhow!("--every must be at least 1 second")),
                Some(secs) => {
                    info!(run = %run, kb = %knowledge_base, ds = %data_source, every_secs = *secs, "scheduled ingest started");
                    let mut ticker = tokio::time::interval(Duration::from_secs(*secs));
                    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    loop {
                        tokio::select! {
                            _ = ticker.tick() => {
                                // Next tick is the retry; a failed firing does not stop the schedule.
                                if let Err(e) = trigger.trigger(knowledge_base, data_source).await {
                                    error!(run = %run, error = %e, "scheduled ingestion failed");
                                }
                            }
                            _ = signal::ctrl_c() => {
                                info!("Ctrl-C received; stopping schedule");
                                break;
                            }
                        }
                    }
                    warn!(run = %run, "scheduled ingest ended");
                }
            }
        }
        Commands::Policy { collection, grants, account, kms_key, public, vpc_endpoints, source_services } => {
            let text = read_source(grants)?;
            let specs: Vec<GrantSpec> = parse_doc(&text, "grants")?;
            let resolver = match account {
                Some(a) => ArnResolver::new(a.clone()),
                None => ArnResolver::default(),
            };
            let props = CollectionProps {
                name: collection.clone(),
                kms_key_arn: kms_key.clone(),
                allow_public_access: *public,
                vpc_endpoints: vpc_endpoints.clone(),
                source_services: source_services.clone(),
                ..Default::default()
            };
            let mut coll = Collection::new(props, resolver);
            let mut iam = Vec::with_capacity(specs.len());
            for (i, g) in specs.iter().enumerate() {
                let grant = match g.access {
                    Access::Read => coll.grant_read(&g.principal),
                    Access::ReadWrite => coll.grant_read_write(&g.principal),
                }
                .with_context(|| format!("grant #{}", i + 1))?;
                iam.push(grant);
            }
            info!(collection = %coll.name(), grants = iam.len(), "policy rendered");
            let data_access: serde_json::Value = serde_json::from_str(coll.data_access_policy().published())?;
            match cli.output {
                Output::Human => {
                    println!("# data access ({})", coll.name());
                    println!("{}", serde_json::to_string_pretty(&data_access)?);
                    println!("# encryption");
                    println!("{}", serde_json::to_string_pretty(&coll.encryption_policy())?);
                    match coll.network_policy() {
                        Some(net) => {
                            println!("# network");
                            println!("{}", serde_json::to_string_pretty(&net)?);
                        }
                        None => println!("# network: (none, collection not reachable)"),
                    }
                    for g in iam.iter() {
                        println!("# iam {} -> {} on {}", g.principal_arn, g.actions.join(","), g.resources.join(","));
                    }
                }
                Output::Json => {
                    let out = serde_json::json!({
                        "collection": coll.name(),
                        "dataAccess": data_access,
                        "encryption": coll.encryption_policy(),
                        "network": coll.network_policy(),
                        "iamGrants": iam,
                    });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
            }
        }
    }

    Ok(())
}
