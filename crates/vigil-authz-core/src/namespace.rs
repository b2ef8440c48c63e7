// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Action namespaces and the registry that holds them.
//!
//! A namespace groups the actions of one resource type (`prj:RetrieveProject`,
//! `prj:UpdateProject`, ...) and declares, per action, the ordered list of
//! parameters a rule may pin (`project_id`). The registry is populated once
//! at startup through explicit [`NamespaceRegistry::register`] calls and is
//! read-only afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};

/// The action or parameter value that matches anything.
pub const WILDCARD: &str = "*";

/// Separates the namespace from the action in a full action name.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Separates the action name from its parameter list in a rule action string.
pub const PARAMS_SEPARATOR: char = '/';

const RESERVED_CHARS: &[char] = &[':', '/', '*', '=', ',', '&'];

/// One action of a namespace together with its declared parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
	pub name: String,
	#[serde(default)]
	pub params: Vec<String>,
}

/// A named group of actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionNamespace {
	name: String,
	#[serde(default)]
	actions: Vec<ActionDefinition>,
}

impl ActionNamespace {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			actions: Vec::new(),
		}
	}

	/// Adds an action with its ordered parameter names.
	pub fn with_action<I, S>(mut self, name: impl Into<String>, params: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.actions.push(ActionDefinition {
			name: name.into(),
			params: params.into_iter().map(Into::into).collect(),
		});
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Plain action names in declaration order.
	pub fn action_names(&self) -> impl Iterator<Item = &str> {
		self.actions.iter().map(|a| a.name.as_str())
	}

	pub fn action(&self, name: &str) -> Option<&ActionDefinition> {
		self.actions.iter().find(|a| a.name == name)
	}

	pub fn has_action(&self, name: &str) -> bool {
		self.action(name).is_some()
	}

	/// `"<namespace>:<action>"`.
	pub fn full_name(&self, action: &str) -> String {
		format!("{}{NAMESPACE_SEPARATOR}{action}", self.name)
	}

	/// Ordered, de-duplicated union of every action's parameters.
	pub fn all_params(&self) -> Vec<String> {
		let mut params: Vec<String> = Vec::new();
		for action in &self.actions {
			for param in &action.params {
				if !params.contains(param) {
					params.push(param.clone());
				}
			}
		}
		params
	}

	fn validate(&self) -> Result<()> {
		validate_identifier("namespace", &self.name)?;
		if self.actions.is_empty() {
			return Err(AuthzError::configuration(format!(
				"namespace '{}' declares no actions",
				self.name
			)));
		}
		for (i, action) in self.actions.iter().enumerate() {
			validate_identifier("action", &action.name)?;
			if self.actions[..i].iter().any(|a| a.name == action.name) {
				return Err(AuthzError::configuration(format!(
					"action '{}' is declared twice in namespace '{}'",
					action.name, self.name
				)));
			}
			for (j, param) in action.params.iter().enumerate() {
				validate_identifier("parameter", param)?;
				if action.params[..j].contains(param) {
					return Err(AuthzError::configuration(format!(
						"parameter '{param}' is declared twice for '{}'",
						self.full_name(&action.name)
					)));
				}
			}
		}
		Ok(())
	}
}

fn validate_identifier(kind: &str, value: &str) -> Result<()> {
	if value.is_empty() {
		return Err(AuthzError::configuration(format!("{kind} name is empty")));
	}
	if value
		.chars()
		.any(|c| c.is_whitespace() || RESERVED_CHARS.contains(&c))
	{
		return Err(AuthzError::configuration(format!(
			"{kind} name '{value}' contains a reserved character"
		)));
	}
	Ok(())
}

/// Splits `"<namespace>:<action>"` into its two halves.
pub fn split_full_name(full_name: &str) -> Result<(&str, &str)> {
	match full_name.split_once(NAMESPACE_SEPARATOR) {
		Some((namespace, action))
			if !namespace.is_empty()
				&& !action.is_empty()
				&& !action.contains(NAMESPACE_SEPARATOR) =>
		{
			Ok((namespace, action))
		}
		_ => Err(AuthzError::InvalidAction(full_name.to_string())),
	}
}

/// Holds every registered namespace.
///
/// Duplicate namespace names are rejected rather than overwritten, so a
/// registry built at startup cannot silently change shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceRegistry {
	namespaces: Vec<ActionNamespace>,
	index: HashMap<String, usize>,
}

impl NamespaceRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a registry from deserialized namespace definitions.
	pub fn from_definitions(definitions: impl IntoIterator<Item = ActionNamespace>) -> Result<Self> {
		let mut registry = Self::new();
		for namespace in definitions {
			registry.register(namespace)?;
		}
		Ok(registry)
	}

	pub fn register(&mut self, namespace: ActionNamespace) -> Result<()> {
		namespace.validate()?;
		if self.index.contains_key(namespace.name()) {
			return Err(AuthzError::configuration(format!(
				"namespace '{}' is already registered",
				namespace.name()
			)));
		}
		tracing::debug!(
			namespace = namespace.name(),
			actions = namespace.actions.len(),
			"registered action namespace"
		);
		self
			.index
			.insert(namespace.name().to_string(), self.namespaces.len());
		self.namespaces.push(namespace);
		Ok(())
	}

	pub fn namespace(&self, name: &str) -> Option<&ActionNamespace> {
		self.index.get(name).map(|&i| &self.namespaces[i])
	}

	/// Namespace names in registration order.
	pub fn namespaces(&self) -> impl Iterator<Item = &str> {
		self.namespaces.iter().map(|n| n.name())
	}

	pub fn is_empty(&self) -> bool {
		self.namespaces.is_empty()
	}

	fn require(&self, name: &str) -> Result<&ActionNamespace> {
		self
			.namespace(name)
			.ok_or_else(|| AuthzError::NotFound(name.to_string()))
	}

	/// Actions of a namespace, either as full names or plain action names.
	pub fn actions_by_namespace(&self, name: &str, with_prefix: bool) -> Result<Vec<String>> {
		let namespace = self.require(name)?;
		Ok(namespace
			.action_names()
			.map(|action| {
				if with_prefix {
					namespace.full_name(action)
				} else {
					action.to_string()
				}
			})
			.collect())
	}

	/// Every registered action across all namespaces.
	pub fn all_actions(&self, with_prefix: bool) -> Vec<String> {
		self
			.namespaces
			.iter()
			.flat_map(|namespace| {
				namespace.action_names().map(move |action| {
					if with_prefix {
						namespace.full_name(action)
					} else {
						action.to_string()
					}
				})
			})
			.collect()
	}

	/// True when `full_name` names a registered concrete action.
	pub fn contains_action(&self, full_name: &str) -> bool {
		match split_full_name(full_name) {
			Ok((namespace, action)) => self
				.namespace(namespace)
				.map(|n| n.has_action(action))
				.unwrap_or(false),
			Err(_) => false,
		}
	}

	/// Checks a rule action string and returns its bare action name.
	///
	/// Accepts `"ns:Action"`, `"ns:*"` and either followed by
	/// `"/param=value,..."`. Strings ending in `*` are returned verbatim; the
	/// bare `ns:*` of a parameterised wildcard needs a registered namespace.
	pub fn validate_action(&self, raw: &str) -> Result<String> {
		let raw = raw.trim();
		if raw.ends_with(WILDCARD) {
			return Ok(raw.to_string());
		}
		let mut parts = raw.split(PARAMS_SEPARATOR);
		let action_name = parts.next().unwrap_or_default();
		if parts.count() > 1 {
			return Err(AuthzError::InvalidAction(format!(
				"{raw}: an action may contain only one '{PARAMS_SEPARATOR}'"
			)));
		}
		if let Ok((namespace, WILDCARD)) = split_full_name(action_name) {
			if self.namespace(namespace).is_some() {
				return Ok(action_name.to_string());
			}
			return Err(AuthzError::InvalidAction(action_name.to_string()));
		}
		if !self.contains_action(action_name) {
			return Err(AuthzError::InvalidAction(action_name.to_string()));
		}
		Ok(action_name.to_string())
	}

	/// Declared parameters of an action; for `ns:*` the union over the namespace.
	pub fn action_params(&self, full_name: &str) -> Result<Vec<String>> {
		let (namespace, action) = split_full_name(full_name)?;
		let namespace = self.require(namespace)?;
		if action == WILDCARD {
			return Ok(namespace.all_params());
		}
		namespace
			.action(action)
			.map(|a| a.params.clone())
			.ok_or_else(|| AuthzError::InvalidAction(full_name.to_string()))
	}

	/// Keeps the actions that belong to `namespace`.
	pub fn filter_actions<'a, S: AsRef<str>>(&self, namespace: &str, actions: &'a [S]) -> Vec<&'a str> {
		let prefix = format!("{namespace}{NAMESPACE_SEPARATOR}");
		actions
			.iter()
			.map(|a| a.as_ref())
			.filter(|a| a.starts_with(prefix.as_str()))
			.collect()
	}
}
