// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permissions service configuration.
//!
//! Layered from multiple sources (defaults, TOML file, environment) with
//! `VIGIL_AUTHZ_*` environment variables taking precedence.

mod sources;

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

const DEFAULT_RULES_DIR: &str = "rules";
const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("invalid configuration: {0}")]
	Validation(String),
}

/// Permissions service configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzConfig {
	/// When false, `initialize` leaves the current snapshot in place.
	pub parsing_enabled: bool,
	/// When false, `is_allowed` grants everything.
	pub permissions_check_enabled: bool,
	pub cache_enabled: bool,
	/// Inserted into every cache key after the `actions` namespace.
	pub cache_prefix: Option<String>,
	/// Directory holding one `<role>.json` rule file per role.
	pub rules_dir: PathBuf,
	/// Roles whose rule files are loaded.
	pub roles: Vec<String>,
	pub source_timeout: Duration,
}

impl Default for AuthzConfig {
	fn default() -> Self {
		Self {
			parsing_enabled: true,
			permissions_check_enabled: true,
			cache_enabled: true,
			cache_prefix: None,
			rules_dir: PathBuf::from(DEFAULT_RULES_DIR),
			roles: Vec::new(),
			source_timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
		}
	}
}

/// Permissions service configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthzConfigLayer {
	#[serde(default)]
	pub parsing_enabled: Option<bool>,
	#[serde(default)]
	pub permissions_check_enabled: Option<bool>,
	#[serde(default)]
	pub cache_enabled: Option<bool>,
	#[serde(default)]
	pub cache_prefix: Option<String>,
	#[serde(default)]
	pub rules_dir: Option<String>,
	#[serde(default)]
	pub roles: Option<Vec<String>>,
	#[serde(default)]
	pub source_timeout_secs: Option<u64>,
}

impl AuthzConfigLayer {
	pub fn merge(&mut self, other: AuthzConfigLayer) {
		if other.parsing_enabled.is_some() {
			self.parsing_enabled = other.parsing_enabled;
		}
		if other.permissions_check_enabled.is_some() {
			self.permissions_check_enabled = other.permissions_check_enabled;
		}
		if other.cache_enabled.is_some() {
			self.cache_enabled = other.cache_enabled;
		}
		if other.cache_prefix.is_some() {
			self.cache_prefix = other.cache_prefix;
		}
		if other.rules_dir.is_some() {
			self.rules_dir = other.rules_dir;
		}
		if other.roles.is_some() {
			self.roles = other.roles;
		}
		if other.source_timeout_secs.is_some() {
			self.source_timeout_secs = other.source_timeout_secs;
		}
	}

	pub fn finalize(self) -> Result<AuthzConfig, ConfigError> {
		let source_timeout_secs = self.source_timeout_secs.unwrap_or(DEFAULT_SOURCE_TIMEOUT_SECS);
		if source_timeout_secs == 0 {
			return Err(ConfigError::Validation(
				"source_timeout_secs must be greater than zero".to_string(),
			));
		}

		Ok(AuthzConfig {
			parsing_enabled: self.parsing_enabled.unwrap_or(true),
			permissions_check_enabled: self.permissions_check_enabled.unwrap_or(true),
			cache_enabled: self.cache_enabled.unwrap_or(true),
			cache_prefix: self.cache_prefix.filter(|p| !p.is_empty()),
			rules_dir: PathBuf::from(self.rules_dir.as_deref().unwrap_or(DEFAULT_RULES_DIR)),
			roles: self.roles.unwrap_or_default(),
			source_timeout: Duration::from_secs(source_timeout_secs),
		})
	}
}

/// Load configuration from defaults and the environment.
pub fn load_config() -> Result<AuthzConfig, ConfigError> {
	load_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource)])
}

/// Load configuration with a TOML file between defaults and the environment.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<AuthzConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(EnvSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(DefaultsSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<AuthzConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = AuthzConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	let config = merged.finalize()?;
	info!(
		parsing_enabled = config.parsing_enabled,
		permissions_check_enabled = config.permissions_check_enabled,
		cache_enabled = config.cache_enabled,
		rules_dir = %config.rules_dir.display(),
		roles = config.roles.len(),
		"Authorization configuration loaded"
	);
	Ok(config)
}
