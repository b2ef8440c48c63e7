// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structured action references used inside rules.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, Result};
use crate::namespace::{NamespaceRegistry, NAMESPACE_SEPARATOR, PARAMS_SEPARATOR, WILDCARD};

/// Either one concrete action of a namespace or all of them (`*`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ActionKey {
	Any,
	Named(String),
}

impl ActionKey {
	pub fn is_wildcard(&self) -> bool {
		matches!(self, Self::Any)
	}

	pub fn as_str(&self) -> &str {
		match self {
			Self::Any => WILDCARD,
			Self::Named(name) => name,
		}
	}
}

impl From<&str> for ActionKey {
	fn from(value: &str) -> Self {
		if value == WILDCARD {
			Self::Any
		} else {
			Self::Named(value.to_string())
		}
	}
}

impl From<String> for ActionKey {
	fn from(value: String) -> Self {
		if value == WILDCARD {
			Self::Any
		} else {
			Self::Named(value)
		}
	}
}

impl From<ActionKey> for String {
	fn from(value: ActionKey) -> Self {
		value.as_str().to_string()
	}
}

impl fmt::Display for ActionKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One action entry of a rule: namespace, action (or `*`) and pinned
/// parameter values.
///
/// Construction validates the action and every parameter key against the
/// registry, so a `ParsedAction` always refers to a registered action and
/// only carries declared parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedAction {
	namespace: String,
	action: ActionKey,
	params: BTreeMap<String, String>,
}

impl ParsedAction {
	/// Builds an action entry; parameter values are coerced to strings.
	pub fn new<I, K, V>(
		registry: &NamespaceRegistry,
		namespace: &str,
		action: &str,
		params: I,
	) -> Result<Self>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: ToString,
	{
		let definition = registry
			.namespace(namespace)
			.ok_or_else(|| AuthzError::NotFound(namespace.to_string()))?;
		let action = ActionKey::from(action);
		if let ActionKey::Named(name) = &action {
			if !definition.has_action(name) {
				return Err(AuthzError::InvalidAction(definition.full_name(name)));
			}
		}

		let full_name = definition.full_name(action.as_str());
		let declared = registry.action_params(&full_name)?;
		let mut values = BTreeMap::new();
		for (key, value) in params {
			let key = key.into();
			if !declared.contains(&key) {
				return Err(AuthzError::InvalidAction(format!(
					"{full_name}: parameter '{key}' is not declared"
				)));
			}
			values.entry(key).or_insert_with(|| value.to_string());
		}

		Ok(Self {
			namespace: namespace.to_string(),
			action,
			params: values,
		})
	}

	/// Parses `"ns:Action"` or `"ns:Action/p1=v1,p2=v2"`.
	///
	/// Parameter pairs are separated by `,` or `&`. When a key repeats, the
	/// first value wins.
	pub fn parse(registry: &NamespaceRegistry, raw: &str) -> Result<Self> {
		let raw = raw.trim();
		let (namespace, rest) = raw
			.split_once(NAMESPACE_SEPARATOR)
			.ok_or_else(|| AuthzError::InvalidAction(raw.to_string()))?;

		let mut parts = rest.split(PARAMS_SEPARATOR);
		let action = parts.next().unwrap_or_default();
		let query = parts.next();
		if parts.next().is_some() {
			return Err(AuthzError::InvalidAction(format!(
				"{raw}: an action may contain only one '{PARAMS_SEPARATOR}'"
			)));
		}

		let mut params = Vec::new();
		if let Some(query) = query {
			for pair in query.split([',', '&']).filter(|p| !p.is_empty()) {
				match pair.split_once('=') {
					Some((key, value)) if !key.is_empty() => {
						params.push((key.to_string(), value.to_string()));
					}
					_ => {
						return Err(AuthzError::InvalidAction(format!(
							"{raw}: malformed parameter '{pair}'"
						)));
					}
				}
			}
		}

		Self::new(registry, namespace, action, params)
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	pub fn action(&self) -> &ActionKey {
		&self.action
	}

	pub fn is_wildcard(&self) -> bool {
		self.action.is_wildcard()
	}

	pub fn params(&self) -> &BTreeMap<String, String> {
		&self.params
	}

	/// `"<namespace>:<action>"`.
	pub fn full_name(&self) -> String {
		format!("{}{NAMESPACE_SEPARATOR}{}", self.namespace, self.action)
	}

	/// The pinned value of `param`, or `*` when the entry leaves it open.
	pub fn param(&self, param: &str) -> &str {
		self.params.get(param).map(String::as_str).unwrap_or(WILDCARD)
	}

	/// One value per declared parameter, in declaration order.
	pub fn param_path(&self, declared: &[String]) -> Vec<String> {
		declared.iter().map(|p| self.param(p).to_string()).collect()
	}
}

impl fmt::Display for ParsedAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.full_name())?;
		if !self.params.is_empty() {
			let pairs: Vec<String> = self.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
			write!(f, "{PARAMS_SEPARATOR}{}", pairs.join(","))?;
		}
		Ok(())
	}
}
