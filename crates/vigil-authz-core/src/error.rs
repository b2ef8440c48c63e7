// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for namespace registration, rule parsing and lookups.

use thiserror::Error;

/// Errors raised by the authorization core.
///
/// Resolution itself never fails: the absence of a decision is the deny
/// signal. Every variant here is raised while registering namespaces,
/// building rules or querying the registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
	/// Malformed namespace or action registration.
	#[error("configuration error: {0}")]
	Configuration(String),

	/// Malformed rule record, unregistered action or bad action syntax.
	#[error("invalid rule '{rule}': {message}")]
	RuleDefinition { rule: String, message: String },

	/// An action string that does not name a registered action.
	#[error("invalid action: {0}")]
	InvalidAction(String),

	/// Query against an unregistered namespace.
	#[error("namespace not found: {0}")]
	NotFound(String),
}

impl AuthzError {
	pub fn configuration(message: impl Into<String>) -> Self {
		Self::Configuration(message.into())
	}

	pub fn rule_definition(rule: impl Into<String>, message: impl Into<String>) -> Self {
		Self::RuleDefinition {
			rule: rule.into(),
			message: message.into(),
		}
	}

	/// Attach a rule name to an error raised while building that rule.
	///
	/// `NotFound` and `InvalidAction` are promoted to `RuleDefinition` so a
	/// failed parse always reports which rule was at fault.
	pub fn in_rule(self, rule: &str) -> Self {
		match self {
			Self::RuleDefinition { message, .. } => Self::rule_definition(rule, message),
			Self::InvalidAction(action) => {
				Self::rule_definition(rule, format!("invalid action '{action}'"))
			}
			Self::NotFound(namespace) => {
				Self::rule_definition(rule, format!("namespace '{namespace}' is not registered"))
			}
			other => other,
		}
	}
}

pub type Result<T> = std::result::Result<T, AuthzError>;
