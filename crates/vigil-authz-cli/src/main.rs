// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `vigil-authz`: validate rule files and query decisions from the command line.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vigil_authz_core::{ActionNamespace, Effect, NamespaceRegistry};
use vigil_server_authz::{
	load_config, load_config_with_file, AuthzConfig, PermissionsService, RoleRulesFileSource,
};

/// Vigil authorization rules tool
#[derive(Parser, Debug)]
#[command(name = "vigil-authz", version, about, long_about = None)]
struct Args {
	/// Path to the authorization config file
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// TOML file declaring the action namespaces
	#[arg(short, long, env = "VIGIL_AUTHZ_NAMESPACES")]
	namespaces: PathBuf,

	/// Directory of `<role>.json` rule files (overrides config)
	#[arg(long)]
	rules_dir: Option<PathBuf>,

	/// Role whose rule file is loaded; repeat for several (overrides config)
	#[arg(long = "load-role")]
	load_roles: Vec<String>,

	/// Log level, used when RUST_LOG is unset
	#[arg(short, long, default_value = "warn")]
	log_level: String,

	/// Output logs as JSON
	#[arg(long)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Parse every rule file and report what was loaded
	Validate,
	/// List the registered actions and their parameters
	Actions,
	/// Print the actions granted to a caller, or check required actions
	Check {
		#[command(flatten)]
		caller: Caller,
		/// Actions that must all be granted; exit status 1 otherwise
		required: Vec<String>,
	},
	/// Print the winning decision and rule for every decided action
	Explain {
		#[command(flatten)]
		caller: Caller,
		/// Print JSON instead of a table
		#[arg(long)]
		json: bool,
	},
}

#[derive(ClapArgs, Debug)]
struct Caller {
	/// Principal id
	#[arg(short, long)]
	principal: String,

	/// Role held by the principal; repeat for several
	#[arg(short, long = "role")]
	roles: Vec<String>,

	/// Request parameter as `name=value`; repeat for several
	#[arg(long = "param", value_parser = parse_param)]
	params: Vec<(String, String)>,
}

impl Caller {
	fn roles(&self) -> BTreeSet<String> {
		self.roles.iter().cloned().collect()
	}

	fn params(&self) -> BTreeMap<String, String> {
		let mut params = BTreeMap::new();
		for (name, value) in &self.params {
			params.entry(name.clone()).or_insert_with(|| value.clone());
		}
		params
	}
}

#[derive(Deserialize)]
struct NamespaceFile {
	#[serde(default, rename = "namespace")]
	namespaces: Vec<ActionNamespace>,
}

#[derive(Serialize)]
struct ExplainedDecision<'a> {
	action: &'a str,
	effect: Effect,
	rule_id: u64,
	rule: &'a str,
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
	match raw.split_once('=') {
		Some((name, value)) if !name.trim().is_empty() => {
			Ok((name.trim().to_string(), value.trim().to_string()))
		}
		_ => Err(format!("expected name=value, got '{raw}'")),
	}
}

fn init_logging(level: &str, json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	if json {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.init();
	} else {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().compact().with_writer(std::io::stderr))
			.init();
	}
}

fn load_registry(path: &Path) -> Result<NamespaceRegistry> {
	let content = std::fs::read_to_string(path)
		.with_context(|| format!("failed to read namespaces from {}", path.display()))?;
	let file: NamespaceFile = toml::from_str(&content)
		.with_context(|| format!("failed to parse namespaces from {}", path.display()))?;
	debug!(path = %path.display(), namespaces = file.namespaces.len(), "read namespace definitions");
	NamespaceRegistry::from_definitions(file.namespaces)
		.with_context(|| format!("invalid namespaces in {}", path.display()))
}

fn resolve_config(args: &Args) -> Result<AuthzConfig> {
	let mut config = match &args.config {
		Some(path) => load_config_with_file(path)?,
		None => load_config()?,
	};
	if let Some(rules_dir) = &args.rules_dir {
		config.rules_dir = rules_dir.clone();
	}
	if !args.load_roles.is_empty() {
		config.roles = args.load_roles.clone();
	}
	Ok(config)
}

async fn build_service(args: &Args) -> Result<PermissionsService> {
	let registry = Arc::new(load_registry(&args.namespaces)?);
	let config = resolve_config(args)?;
	let source = RoleRulesFileSource::new(config.rules_dir.clone(), config.roles.clone());
	debug!(
		rules_dir = %config.rules_dir.display(),
		roles = config.roles.len(),
		"loading role rule files"
	);
	let service = PermissionsService::new(registry, config).with_source(Arc::new(source));
	let generation = service.initialize().await.context("failed to load rules")?;
	info!(generation, rules = service.snapshot().rules().len(), "rules loaded");
	Ok(service)
}

fn print_actions(registry: &NamespaceRegistry) {
	for name in registry.namespaces() {
		let Some(namespace) = registry.namespace(name) else {
			continue;
		};
		println!("{name}");
		for action in namespace.action_names() {
			let params = namespace
				.action(action)
				.map(|a| a.params.join(", "))
				.unwrap_or_default();
			if params.is_empty() {
				println!("  {}", namespace.full_name(action));
			} else {
				println!("  {} [{params}]", namespace.full_name(action));
			}
		}
	}
}

async fn run(args: Args) -> Result<ExitCode> {
	match &args.command {
		Command::Actions => {
			print_actions(&load_registry(&args.namespaces)?);
		}
		Command::Validate => {
			let service = build_service(&args).await?;
			let snapshot = service.snapshot();
			println!(
				"ok: {} rules from {} role files, {} decisions across {} namespaces",
				snapshot.rules().len(),
				service.config().roles.len(),
				snapshot.tree().len(),
				snapshot.tree().namespaces().count(),
			);
		}
		Command::Check { caller, required } => {
			let service = build_service(&args).await?;
			let allowed = service
				.allowed_actions(&caller.principal, &caller.roles(), &caller.params())
				.await;
			if required.is_empty() {
				for action in &allowed {
					println!("{action}");
				}
			} else {
				let missing: Vec<&String> = required.iter().filter(|a| !allowed.contains(*a)).collect();
				if !missing.is_empty() {
					for action in missing {
						println!("denied: {action}");
					}
					return Ok(ExitCode::from(1));
				}
				println!("allowed");
			}
		}
		Command::Explain { caller, json } => {
			let service = build_service(&args).await?;
			let snapshot = service.snapshot();
			let roles: Vec<String> = caller.roles().into_iter().collect();
			let decisions = snapshot.resolve_decisions(&caller.principal, &roles, &caller.params());

			let explained: Vec<ExplainedDecision<'_>> = decisions
				.iter()
				.map(|(action, decision)| ExplainedDecision {
					action,
					effect: decision.effect,
					rule_id: decision.rule.get(),
					rule: snapshot
						.rule(decision.rule)
						.map(|r| r.name())
						.unwrap_or("<unknown>"),
				})
				.collect();

			if *json {
				println!("{}", serde_json::to_string_pretty(&explained)?);
			} else {
				for entry in &explained {
					println!(
						"{:<40} {:<5} #{} {}",
						entry.action,
						entry.effect.as_str(),
						entry.rule_id,
						entry.rule
					);
				}
			}
		}
	}
	Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
	let args = Args::parse();
	init_logging(&args.log_level, args.json_logs);
	run(args).await
}
