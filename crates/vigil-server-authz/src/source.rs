// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rule sources feeding the permissions service.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use vigil_authz_core::{rules_from_json, NamespaceRegistry, PermissionsRule, ROLE_PREFIX};

use crate::error::{AuthzServiceError, Result};

/// Supplies rules for a snapshot rebuild.
///
/// Sources are asked in registration order on every rebuild. Rules carry
/// their global ids, so a source may return the same rules each time.
#[async_trait]
pub trait RuleSource: Send + Sync {
	fn name(&self) -> &str;

	async fn rules(&self, registry: &NamespaceRegistry) -> Result<Vec<PermissionsRule>>;
}

/// Rules held in memory.
pub struct StaticRuleSource {
	name: String,
	rules: Vec<PermissionsRule>,
}

impl StaticRuleSource {
	pub fn new(name: impl Into<String>, rules: Vec<PermissionsRule>) -> Self {
		Self {
			name: name.into(),
			rules,
		}
	}
}

#[async_trait]
impl RuleSource for StaticRuleSource {
	fn name(&self) -> &str {
		&self.name
	}

	async fn rules(&self, _registry: &NamespaceRegistry) -> Result<Vec<PermissionsRule>> {
		Ok(self.rules.clone())
	}
}

/// One `<role>.json` rule file per role; every rule in a file targets
/// `role:<role>`. Roles without a file are skipped.
pub struct RoleRulesFileSource {
	rules_dir: PathBuf,
	roles: Vec<String>,
}

impl RoleRulesFileSource {
	pub fn new(rules_dir: impl Into<PathBuf>, roles: Vec<String>) -> Self {
		Self {
			rules_dir: rules_dir.into(),
			roles,
		}
	}

	pub fn rules_dir(&self) -> &Path {
		&self.rules_dir
	}

	async fn load_role(&self, registry: &NamespaceRegistry, role: &str) -> Result<Vec<PermissionsRule>> {
		let path = self.rules_dir.join(format!("{role}.json"));
		let content = match tokio::fs::read_to_string(&path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!(role, path = %path.display(), "no rule file for role, skipping");
				return Ok(Vec::new());
			}
			Err(source) => return Err(AuthzServiceError::Io { path, source }),
		};

		let value: serde_json::Value = serde_json::from_str(&content)
			.map_err(|source| AuthzServiceError::Json { path: path.clone(), source })?;
		let rules = rules_from_json(registry, &value, &format!("{ROLE_PREFIX}{role}"))?;
		debug!(role, rules = rules.len(), path = %path.display(), "loaded role rule file");
		Ok(rules)
	}
}

#[async_trait]
impl RuleSource for RoleRulesFileSource {
	fn name(&self) -> &str {
		"role-rule-files"
	}

	async fn rules(&self, registry: &NamespaceRegistry) -> Result<Vec<PermissionsRule>> {
		let mut rules = Vec::new();
		for role in &self.roles {
			rules.extend(self.load_role(registry, role).await?);
		}
		Ok(rules)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::test_registry;
	use vigil_authz_core::{AuthzError, Effect, Target};

	fn write(dir: &Path, file: &str, content: &str) {
		std::fs::write(dir.join(file), content).unwrap();
	}

	#[tokio::test]
	async fn loads_one_file_per_role() {
		let dir = tempfile::tempdir().unwrap();
		write(
			dir.path(),
			"admin.json",
			r#"[
				{"name": "Admins", "effect": "allow", "action": ["prj:*"]},
				{"name": "No deletes", "effect": "deny", "action": ["prj:DeleteProject/project_id=1"]}
			]"#,
		);
		write(
			dir.path(),
			"viewer.json",
			r#"[{"Name": "Viewers", "Effect": "Allow", "Action": ["prj:ListProjects"]}]"#,
		);

		let source = RoleRulesFileSource::new(
			dir.path(),
			vec!["admin".to_string(), "viewer".to_string(), "ghost".to_string()],
		);
		let rules = source.rules(&test_registry()).await.unwrap();

		assert_eq!(rules.len(), 3);
		assert_eq!(rules[0].target(), &Target::Role("admin".to_string()));
		assert_eq!(rules[1].effect(), Effect::Deny);
		assert_eq!(rules[2].target(), &Target::Role("viewer".to_string()));
	}

	#[tokio::test]
	async fn namespace_wildcard_with_params_loads_from_file() {
		let dir = tempfile::tempdir().unwrap();
		write(
			dir.path(),
			"admin.json",
			r#"[{"name": "Project 1 admins", "effect": "allow", "action": ["prj:*/project_id=1"]}]"#,
		);

		let source = RoleRulesFileSource::new(dir.path(), vec!["admin".to_string()]);
		let rules = source.rules(&test_registry()).await.unwrap();

		assert_eq!(rules.len(), 1);
		let action = &rules[0].actions()[0];
		assert!(action.is_wildcard());
		assert_eq!(action.param("project_id"), "1");
		assert_eq!(rules[0].target(), &Target::Role("admin".to_string()));
	}

	#[tokio::test]
	async fn malformed_json_names_the_file() {
		let dir = tempfile::tempdir().unwrap();
		write(dir.path(), "admin.json", "[{");

		let source = RoleRulesFileSource::new(dir.path(), vec!["admin".to_string()]);
		let err = source.rules(&test_registry()).await.unwrap_err();
		match err {
			AuthzServiceError::Json { path, .. } => assert!(path.ends_with("admin.json")),
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn unregistered_action_is_a_rule_error() {
		let dir = tempfile::tempdir().unwrap();
		write(
			dir.path(),
			"admin.json",
			r#"[{"name": "Broken", "effect": "allow", "action": ["prj:Archive"]}]"#,
		);

		let source = RoleRulesFileSource::new(dir.path(), vec!["admin".to_string()]);
		let err = source.rules(&test_registry()).await.unwrap_err();
		assert!(matches!(
			err,
			AuthzServiceError::Authz(AuthzError::RuleDefinition { ref rule, .. }) if rule == "Broken"
		));
	}

	#[tokio::test]
	async fn static_source_returns_the_same_rules() {
		let registry = test_registry();
		let rules = rules_from_json(
			&registry,
			&serde_json::json!([{"name": "All", "effect": "allow", "action": ["prj:*"]}]),
			"*",
		)
		.unwrap();
		let source = StaticRuleSource::new("inline", rules);

		let first = source.rules(&registry).await.unwrap();
		let second = source.rules(&registry).await.unwrap();
		assert_eq!(first, second);
		assert_eq!(source.name(), "inline");
	}
}
