// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::path::PathBuf;

use tracing::{debug, trace};

use super::{AuthzConfigLayer, ConfigError};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<AuthzConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<AuthzConfigLayer, ConfigError> {
		Ok(AuthzConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<AuthzConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(AuthzConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: AuthzConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: VIGIL_AUTHZ_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<AuthzConfigLayer, ConfigError> {
		load_from(|name| std::env::var(name).ok())
	}
}

fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<AuthzConfigLayer, ConfigError> {
	let var = |name: &str| lookup(name).filter(|s| !s.is_empty());
	let flag = |name: &str| var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1");

	let source_timeout_secs = match var("VIGIL_AUTHZ_SOURCE_TIMEOUT_SECS") {
		Some(v) => Some(v.parse().map_err(|_| ConfigError::InvalidValue {
			key: "VIGIL_AUTHZ_SOURCE_TIMEOUT_SECS".to_string(),
			message: format!("invalid u64 value '{v}'"),
		})?),
		None => None,
	};

	let roles = var("VIGIL_AUTHZ_ROLES").map(|s| {
		s.split(',')
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	});

	Ok(AuthzConfigLayer {
		parsing_enabled: flag("VIGIL_AUTHZ_PARSING_ENABLED"),
		permissions_check_enabled: flag("VIGIL_AUTHZ_PERMISSIONS_CHECK_ENABLED"),
		cache_enabled: flag("VIGIL_AUTHZ_CACHE_ENABLED"),
		cache_prefix: var("VIGIL_AUTHZ_CACHE_PREFIX"),
		rules_dir: var("VIGIL_AUTHZ_RULES_DIR"),
		roles,
		source_timeout_secs,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| vars.get(name).cloned()
	}

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/authz.toml").load().unwrap();
		assert!(layer.rules_dir.is_none());
	}

	#[test]
	fn test_toml_source_rejects_bad_types() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("authz.toml");
		std::fs::write(&path, "cache_enabled = \"sometimes\"").unwrap();
		let err = TomlSource::new(&path).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_env_values() {
		let layer = load_from(env(&[
			("VIGIL_AUTHZ_PARSING_ENABLED", "0"),
			("VIGIL_AUTHZ_CACHE_ENABLED", "TRUE"),
			("VIGIL_AUTHZ_CACHE_PREFIX", "svc"),
			("VIGIL_AUTHZ_ROLES", "admin, viewer,,"),
			("VIGIL_AUTHZ_SOURCE_TIMEOUT_SECS", "12"),
		]))
		.unwrap();

		assert_eq!(layer.parsing_enabled, Some(false));
		assert_eq!(layer.cache_enabled, Some(true));
		assert_eq!(layer.permissions_check_enabled, None);
		assert_eq!(layer.cache_prefix.as_deref(), Some("svc"));
		assert_eq!(
			layer.roles,
			Some(vec!["admin".to_string(), "viewer".to_string()])
		);
		assert_eq!(layer.source_timeout_secs, Some(12));
	}

	#[test]
	fn test_env_rejects_bad_timeout() {
		let err = load_from(env(&[("VIGIL_AUTHZ_SOURCE_TIMEOUT_SECS", "soon")])).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "VIGIL_AUTHZ_SOURCE_TIMEOUT_SECS"));
	}

	#[test]
	fn test_empty_env_values_are_unset() {
		let layer = load_from(env(&[("VIGIL_AUTHZ_RULES_DIR", "")])).unwrap();
		assert!(layer.rules_dir.is_none());
	}
}
