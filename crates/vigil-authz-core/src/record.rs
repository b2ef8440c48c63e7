// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Declarative rule records as stored in rule files.
//!
//! ```json
//! {
//!   "name": "Project admins",
//!   "effect": "allow",
//!   "action": ["prj:*", "ent:RetrieveEntity/project_id=1"]
//! }
//! ```
//!
//! The target is not part of the record; the rule source supplies it (one
//! file per role, for example). Keys are matched case-insensitively.

use serde_json::{Map, Value};

use crate::action::ParsedAction;
use crate::error::{AuthzError, Result};
use crate::namespace::NamespaceRegistry;
use crate::rule::PermissionsRule;

/// A structurally valid rule record that has not been bound to a target yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
	pub name: String,
	pub effect: String,
	pub actions: Vec<String>,
}

impl RuleRecord {
	/// Checks the record shape: `name`, `effect` and `action` are required,
	/// with string, string and array-of-strings values.
	pub fn from_value(value: &Value) -> Result<Self> {
		let object = value
			.as_object()
			.ok_or_else(|| AuthzError::rule_definition("<unnamed>", "rule record must be an object"))?;
		let fields: Map<String, Value> = object
			.iter()
			.map(|(k, v)| (k.to_lowercase(), v.clone()))
			.collect();

		let name = match fields.get("name") {
			Some(Value::String(name)) => name.clone(),
			Some(_) => return Err(AuthzError::rule_definition("<unnamed>", "'name' must be a string")),
			None => return Err(AuthzError::rule_definition("<unnamed>", "missing 'name'")),
		};

		let effect = match fields.get("effect") {
			Some(Value::String(effect)) => effect.clone(),
			Some(_) => return Err(AuthzError::rule_definition(&name, "'effect' must be a string")),
			None => return Err(AuthzError::rule_definition(&name, "missing 'effect'")),
		};

		let actions = match fields.get("action") {
			Some(Value::Array(items)) => items
				.iter()
				.map(|item| match item {
					Value::String(action) => Ok(action.clone()),
					_ => Err(AuthzError::rule_definition(&name, "'action' entries must be strings")),
				})
				.collect::<Result<Vec<_>>>()?,
			Some(_) => return Err(AuthzError::rule_definition(&name, "'action' must be an array")),
			None => return Err(AuthzError::rule_definition(&name, "missing 'action'")),
		};

		Ok(Self {
			name,
			effect,
			actions,
		})
	}

	/// Validates every action against the registry and builds the rule.
	pub fn into_rule(self, registry: &NamespaceRegistry, target: &str) -> Result<PermissionsRule> {
		let actions = self
			.actions
			.iter()
			.map(|raw| {
				registry.validate_action(raw)?;
				ParsedAction::parse(registry, raw)
			})
			.collect::<Result<Vec<_>>>()
			.map_err(|e| e.in_rule(&self.name))?;
		PermissionsRule::new(self.name, &self.effect, actions, target)
	}
}

/// Parses a JSON array of rule records into rules for one target.
pub fn rules_from_json(
	registry: &NamespaceRegistry,
	value: &Value,
	target: &str,
) -> Result<Vec<PermissionsRule>> {
	let records = value
		.as_array()
		.ok_or_else(|| AuthzError::rule_definition("<file>", "rule file must contain an array"))?;
	records
		.iter()
		.map(|record| RuleRecord::from_value(record)?.into_rule(registry, target))
		.collect()
}
