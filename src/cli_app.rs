//! Top-level CLI definition and dispatch.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;

use crate::compiler::descriptor::validate_service_dictionary;
use crate::compiler::item::{CompilerContext, ConfigItemBuilder, ExprOp, ObjectKind};
use crate::core::config::EngineConfig;
use crate::core::errors::{MseError, Result};
use crate::core::values;
use crate::engine::MonitorCore;

/// Monitor State Engine — inspect and validate monitoring object files.
#[derive(Parser)]
#[command(name = "mse", version, about)]
pub struct Cli {
    /// Engine configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of human output.
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Compile and commit an object file, reporting compiler errors.
    Validate {
        /// Declarative object file (JSON).
        objects: PathBuf,
    },
    /// Commit an object file and print per-host state.
    Status {
        /// Declarative object file (JSON).
        objects: PathBuf,
    },
    /// Show the services generated for one host.
    Expand {
        /// Declarative object file (JSON).
        objects: PathBuf,
        /// Host name.
        host: String,
    },
}

/// One entry of the declarative object file.
#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    #[serde(default)]
    template: bool,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    attrs: serde_json::Map<String, serde_json::Value>,
}

/// Dispatch CLI commands. Returns the process exit code.
pub fn run(cli: &Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let core = MonitorCore::new(config)?;

    match &cli.command {
        Command::Validate { objects } => {
            let ctx = commit_file(&core, objects)?;
            report_validation(&core, &ctx, cli.json);
            Ok(i32::from(!ctx.errors().is_empty()))
        }
        Command::Status { objects } => {
            let ctx = commit_file(&core, objects)?;
            report_status(&core, cli.json)?;
            Ok(i32::from(ctx.has_fatal()))
        }
        Command::Expand { objects, host } => {
            let _ctx = commit_file(&core, objects)?;
            report_expansion(&core, host, cli.json)?;
            Ok(0)
        }
    }
}

/// Load an object file and commit every item, collecting errors instead of
/// stopping: one bad item must not abort the reload.
fn commit_file(core: &MonitorCore, path: &Path) -> Result<CompilerContext> {
    let raw = std::fs::read_to_string(path).map_err(|source| MseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let items: Vec<RawItem> = serde_json::from_str(&raw)?;

    let mut ctx = CompilerContext::new();
    for (index, raw_item) in items.iter().enumerate() {
        let source = format!("{}:{}", path.display(), index + 1);
        let kind: ObjectKind = match raw_item.kind.parse() {
            Ok(kind) => kind,
            Err(details) => {
                ctx.add_error(false, format!("{source}: {details}"));
                continue;
            }
        };
        let mut builder =
            ConfigItemBuilder::new(kind, &raw_item.name, &source).template(raw_item.template);
        for parent in &raw_item.parents {
            builder.add_parent(parent);
        }
        for (attribute, value) in &raw_item.attrs {
            builder.add_expression(attribute, ExprOp::Set, value.clone());
        }
        // Commit failures land in the context; keep going.
        let _ = core.commit(&builder, &mut ctx);
    }

    // Cross-check every host's service dictionary now that all items are
    // known.
    {
        let items_index = core.items().read();
        for raw_item in &items {
            if raw_item.kind != "Host" {
                continue;
            }
            if let Some(services) = values::get_object(&raw_item.attrs, "services") {
                validate_service_dictionary(&mut ctx, &items_index, &raw_item.name, services);
            }
        }
    }
    Ok(ctx)
}

fn report_validation(core: &MonitorCore, ctx: &CompilerContext, json: bool) {
    if json {
        let payload = serde_json::json!({
            "command": "validate",
            "hosts": core.registry().host_count(),
            "services": core.registry().service_count(),
            "errors": ctx.errors().iter().map(|e| {
                serde_json::json!({"fatal": e.fatal, "message": e.message})
            }).collect::<Vec<_>>(),
        });
        println!("{payload}");
        return;
    }
    for error in ctx.errors() {
        let label = if error.fatal {
            "fatal".red()
        } else {
            "error".yellow()
        };
        println!("{label}: {}", error.message);
    }
    let summary = format!(
        "{} hosts, {} services committed",
        core.registry().host_count(),
        core.registry().service_count()
    );
    if ctx.errors().is_empty() {
        println!("{} {summary}", "ok:".green());
    } else {
        println!(
            "{} {summary}, {} problem(s)",
            "done:".yellow(),
            ctx.errors().len()
        );
    }
}

fn report_status(core: &MonitorCore, json: bool) -> Result<()> {
    let mut rows = Vec::new();
    for host in core.registry().hosts() {
        let target = core.host_ref(host.name())?;
        let up = core.is_up(&host)?;
        let reachable = match core.is_reachable(&host) {
            Ok(reachable) => Some(reachable),
            Err(MseError::DependencyCycle { .. }) => None,
            Err(err) => return Err(err),
        };
        rows.push((
            host.name().to_string(),
            host.alias(),
            up,
            reachable,
            core.services_of(host.name()).len(),
            core.is_flapping(&target),
            core.is_in_downtime(&target),
        ));
    }

    if json {
        let payload: Vec<_> = rows
            .iter()
            .map(
                |(name, alias, up, reachable, services, flapping, downtime)| {
                    serde_json::json!({
                        "host": name,
                        "alias": alias,
                        "state": if *up { "up" } else { "down" },
                        "reachable": reachable,
                        "services": services,
                        "flapping": flapping,
                        "in_downtime": downtime,
                    })
                },
            )
            .collect();
        println!(
            "{}",
            serde_json::json!({"command": "status", "hosts": payload})
        );
        return Ok(());
    }

    for (name, alias, up, reachable, services, flapping, downtime) in rows {
        let state = if up { "up".green() } else { "down".red() };
        let reach = match reachable {
            Some(true) => "reachable".normal(),
            Some(false) => "unreachable".red(),
            None => "dependency cycle".red().bold(),
        };
        let mut notes = Vec::new();
        if flapping {
            notes.push("flapping");
        }
        if downtime {
            notes.push("in downtime");
        }
        let notes = if notes.is_empty() {
            String::new()
        } else {
            format!(" [{}]", notes.join(", "))
        };
        println!("{name} ({alias}): {state}, {reach}, {services} service(s){notes}");
    }
    Ok(())
}

fn report_expansion(core: &MonitorCore, host_name: &str, json: bool) -> Result<()> {
    let host = core.registry().expect_host(host_name)?;
    let generated: Vec<String> = host.lock().generated_services.iter().cloned().collect();

    if json {
        let payload = serde_json::json!({
            "command": "expand",
            "host": host_name,
            "services": generated,
        });
        println!("{payload}");
        return Ok(());
    }

    if generated.is_empty() {
        println!("{host_name}: no generated services");
        return Ok(());
    }
    println!("{host_name}:");
    for name in generated {
        let service = core.registry().expect_service(&name)?;
        let alias = service.alias();
        let interval = service
            .lock()
            .check_interval
            .map_or_else(|| "default".to_string(), |v| format!("{v}s"));
        println!("  {} (alias {alias}, interval {interval})", name.bold());
    }
    Ok(())
}
