use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Parser, Subcommand};
use configs::{AppConfig, LogConfig, LogFormat, StorageBackend};
use dotenvy::dotenv;
use serde_json::json;
use service::{
    project_client::project_client_cache, Actor, ConfigRepository, ScopeContextResolver, StorageFacade,
};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Inspect and edit per-channel workspace/project bindings.
#[derive(Debug, Parser)]
#[command(name = "storectl", version)]
struct Cli {
    /// Storage backend; overrides STORAGE_TYPE.
    #[arg(long, global = true)]
    backend: Option<String>,
    /// Storage file; overrides STORAGE_PATH.
    #[arg(long, global = true)]
    path: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bind a scope to a workspace/project.
    Set {
        tenant: String,
        scope: String,
        workspace: String,
        project: String,
        #[arg(long, default_value = "storectl")]
        actor_id: String,
        #[arg(long, default_value = "storectl")]
        actor_tag: String,
    },
    /// Show a scope's binding.
    Get { tenant: String, scope: String },
    /// Remove a scope's binding.
    Remove { tenant: String, scope: String },
    /// List every bound scope of a tenant.
    List { tenant: String },
    /// Show a scope's binding together with its API endpoints.
    Context { tenant: String, scope: String },
}

/// Configuration from file and env, with the CLI flags applied last.
///
/// Any bad setting fails the run; falling back to defaults would point the
/// tool at a different store than the configured one.
fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    dotenv().ok();
    apply_cli(cli, AppConfig::load_unvalidated()?)
}

fn apply_cli(cli: &Cli, mut cfg: AppConfig) -> anyhow::Result<AppConfig> {
    if let Some(raw) = &cli.backend {
        cfg.storage.backend = StorageBackend::parse_lenient(raw);
    }
    if let Some(path) = &cli.path {
        cfg.storage.path = Some(path.clone());
    }
    cfg.normalize_and_validate()?;
    Ok(cfg)
}

fn init_logging(cfg: &AppConfig) {
    match cfg.log.format {
        LogFormat::Compact => common::utils::logging::init_logging_default(&cfg.log.level),
        LogFormat::Json => common::utils::logging::init_logging_json(&cfg.log.level),
    }
    info!(service = "storectl", event = "logger_init", "tracing subscriber initialized");
}

async fn run(command: Command, repo: ConfigRepository, cfg: &AppConfig) -> anyhow::Result<()> {
    let output = match command {
        Command::Set { tenant, scope, workspace, project, actor_id, actor_tag } => {
            let actor = Actor::new(actor_id, actor_tag);
            json!(repo.set_config(&tenant, &scope, &workspace, &project, &actor).await?)
        }
        Command::Get { tenant, scope } => json!(repo.get_config(&tenant, &scope).await?),
        Command::Remove { tenant, scope } => json!({ "removed": repo.remove_config(&tenant, &scope).await? }),
        Command::List { tenant } => {
            let scopes: serde_json::Map<String, serde_json::Value> = repo
                .list_scope_configs(&tenant)
                .await?
                .into_iter()
                .map(|(scope, config)| Ok((scope, serde_json::to_value(config)?)))
                .collect::<Result<_, serde_json::Error>>()?;
            serde_json::Value::Object(scopes)
        }
        Command::Context { tenant, scope } => {
            let cache = Arc::new(project_client_cache(cfg.api.clone()));
            let resolver = ScopeContextResolver::new(repo, cache);
            match resolver.resolve(&tenant, &scope).await? {
                Some(ctx) => json!({
                    "config": ctx.config,
                    "projectUrl": ctx.client.project_url(),
                    "issuesUrl": ctx.client.issues_url(),
                    "hasCredentials": ctx.client.has_credentials(),
                }),
                None => serde_json::Value::Null,
            }
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            common::utils::logging::init_logging_default(&LogConfig::default().level);
            error!(service = "storectl", event = "config_invalid", error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&cfg);

    let run_id = Uuid::new_v4();
    let pid = std::process::id();

    std::panic::set_hook(Box::new(move |info| {
        error!(service = "storectl", event = "panic", %run_id, pid, message = %info, "unhandled panic occurred");
    }));

    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "storectl", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(async move {
        let facade = Arc::new(StorageFacade::new());
        if let Err(e) = facade.create_storage(&cfg.storage).await {
            error!(service = "storectl", event = "storage_init_failed", %run_id, error = %e, "cannot open storage");
            return ExitCode::FAILURE;
        }
        info!(service = "storectl", event = "start", %run_id, pid, backend = %cfg.storage.backend, "storage ready");

        let repo = ConfigRepository::new(Arc::clone(&facade));
        let code = match run(cli.command, repo, &cfg).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(service = "storectl", event = "command_failed", %run_id, error = %e, "command failed");
                ExitCode::FAILURE
            }
        };

        if let Err(e) = facade.close_storage().await {
            warn!(service = "storectl", event = "close_failed", error = %e, "storage close failed");
        }
        code
    })
}
