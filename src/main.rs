use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use gh_project_export::ExportError;
use gh_project_export::cancel::CancelFlag;
use gh_project_export::config::loader;
use gh_project_export::config::types::AppConfig;
use gh_project_export::export::{ExportRequest, ExportSummary, run_export, view_filter};
use gh_project_export::github::auth;
use gh_project_export::github::rate_limit::{format_rate_limit_message, is_rate_limited};
use gh_project_export::github::{GraphQlClient, resolve_project};
use gh_project_export::types::{Owner, ProjectDescriptor};

#[derive(Parser)]
#[command(
    name = "gh-project-export",
    version,
    about = "Export a GitHub project board to a CSV snapshot"
)]
struct Cli {
    /// Path to config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging to debug.log.
    #[arg(long, global = true)]
    debug: bool,

    /// GitHub token (falls back to GH_TOKEN, then `gh auth token`).
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Login of the user or organization owning the project.
    #[arg(long, env = "GITHUB_USER", global = true)]
    owner: Option<String>,

    /// Whether the owner is a user or an organization.
    #[arg(long, value_enum, default_value_t = OwnerType::User, global = true)]
    owner_type: OwnerType,

    /// Project number, as shown in the project URL.
    #[arg(long, env = "PROJECT_NUMBER", global = true)]
    project: Option<String>,

    /// Saved view whose filter should be applied (case-insensitive).
    #[arg(long, env = "VIEW_NAME", global = true)]
    view: Option<String>,

    /// Output file (default: project_<N>_export.csv).
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export all project items to CSV (default).
    Export,
    /// List the project's saved views and how their filters are handled.
    Views,
    /// List the project's custom fields.
    Fields,
}

#[derive(Clone, Copy, ValueEnum)]
enum OwnerType {
    User,
    Org,
}

/// Inputs needed by every command, validated up front.
struct Target {
    owner: Owner,
    number: u32,
}

fn parse_project_number(raw: Option<&str>) -> Result<u32, ExportError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        ExportError::Configuration(
            "project number is required (--project or PROJECT_NUMBER)".to_owned(),
        )
    })?;
    match raw.parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ExportError::Configuration(format!(
            "project number must be an integer >= 1, got {raw:?}"
        ))),
    }
}

fn target(cli: &Cli) -> Result<Target, ExportError> {
    let login = cli
        .owner
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ExportError::Configuration(
                "owner login is required (--owner or GITHUB_USER)".to_owned(),
            )
        })?;
    Ok(Target {
        owner: match cli.owner_type {
            OwnerType::User => Owner::user(login),
            OwnerType::Org => Owner::organization(login),
        },
        number: parse_project_number(cli.project.as_deref())?,
    })
}

fn init_tracing(debug: bool) -> Result<()> {
    let filter = |default: &str| {
        tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
    };
    if debug {
        let file = std::fs::File::create("debug.log").context("creating debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(file)
            .with_ansi(false)
            .with_env_filter(filter("debug"))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_env_filter(filter("warn"))
            .init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let config = loader::load_config(cli.config.as_deref())?;

    // The whole run is sequential; the runtime only drives the HTTP client.
    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    let result = runtime.block_on(run(&cli, &config));

    if let Err(e) = &result
        && is_rate_limited(e)
    {
        eprintln!("hint: {}", format_rate_limit_message(e));
    }
    result.map_err(anyhow::Error::from)
}

async fn run(cli: &Cli, config: &AppConfig) -> Result<(), ExportError> {
    let target = target(cli)?;
    let token = auth::resolve_token(cli.token.as_deref(), &config.github.host)?;
    let client = GraphQlClient::new(
        &token,
        config.github.api_base().as_deref(),
        config.github.timeout(),
    )?;

    match cli.command {
        None | Some(Commands::Export) => export(cli, config, &client, target).await,
        Some(Commands::Views) => {
            let project = resolve(&client, config, &target).await?;
            print_views(&project);
            Ok(())
        }
        Some(Commands::Fields) => {
            let project = resolve(&client, config, &target).await?;
            print_fields(&project);
            Ok(())
        }
    }
}

async fn resolve(
    client: &GraphQlClient,
    config: &AppConfig,
    target: &Target,
) -> Result<ProjectDescriptor, ExportError> {
    resolve_project(
        client,
        &target.owner,
        target.number,
        config.export.resolve_limits(),
    )
    .await
}

async fn export(
    cli: &Cli,
    config: &AppConfig,
    client: &GraphQlClient,
    target: Target,
) -> Result<(), ExportError> {
    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received; stopping before the next page");
            on_interrupt.cancel();
        }
    });

    let request = ExportRequest {
        owner: target.owner,
        project_number: target.number,
        view_name: cli.view.clone(),
        output: cli.output.clone(),
    };

    let summary = run_export(client, &config.export, &request, &cancel).await?;
    print_summary(&summary, request.view_name.as_deref());
    Ok(())
}

fn print_summary(summary: &ExportSummary, requested_view: Option<&str>) {
    println!(
        "[INFO] Project: {} (#{})",
        summary.project.title, summary.project.number
    );
    let requested_view = requested_view.map(str::trim).filter(|v| !v.is_empty());
    match (&summary.view, requested_view) {
        (Some(view), _) => println!("[INFO] View: {}", view.name),
        (None, Some(name)) => println!("[INFO] View {name:?} not found; exporting all items"),
        (None, None) => println!("[INFO] View: (all)"),
    }
    if let Some(expr) = summary.view.as_ref().and_then(|v| v.filter.as_deref())
        && !expr.trim().is_empty()
    {
        println!("[INFO] View filter: {expr}");
    }
    if let Some(filter) = &summary.filter
        && !filter.ignored().is_empty()
    {
        println!(
            "[INFO] Unsupported filter terms ignored: {}",
            filter.ignored().join(" ")
        );
    }
    if summary.total_items == 0 {
        println!("[INFO] No items found.");
    }
    println!(
        "[OK] Exported: {}  ({} rows)",
        summary.output.display(),
        summary.rows_written
    );
}

fn print_views(project: &ProjectDescriptor) {
    println!("{} (#{})", project.title, project.number);
    if project.views.is_empty() {
        println!("  (no saved views)");
    }
    for view in &project.views {
        let expr = view.filter.as_deref().unwrap_or("").trim();
        if expr.is_empty() {
            println!("  {}: no filter", view.name);
            continue;
        }
        println!("  {}: {expr}", view.name);
        let Some(filter) = view_filter(view, project.viewer_login.as_deref()) else {
            continue;
        };
        for (kind, values) in [
            ("status", filter.status_values()),
            ("assignee", filter.assignee_values()),
            ("label", filter.label_values()),
        ] {
            if !values.is_empty() {
                println!("      {kind}: {}", values.join(", "));
            }
        }
        if !filter.ignored().is_empty() {
            println!("      ignored: {}", filter.ignored().join(" "));
        }
    }
}

fn print_fields(project: &ProjectDescriptor) {
    println!("{} (#{})", project.title, project.number);
    for field in &project.fields {
        match &field.options {
            Some(options) if !options.is_empty() => {
                let names: Vec<_> = options.iter().map(|o| o.name.as_str()).collect();
                println!(
                    "  {} [{}]: {}",
                    field.name,
                    field.data_type.as_str(),
                    names.join(", ")
                );
            }
            _ => println!("  {} [{}]", field.name, field.data_type.as_str()),
        }
    }
}
