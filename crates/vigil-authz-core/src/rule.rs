// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission rules and their building blocks.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::action::ParsedAction;
use crate::error::{AuthzError, Result};
use crate::namespace::WILDCARD;

/// Prefix marking a role target (`role:<name>`).
pub const ROLE_PREFIX: &str = "role:";

static NEXT_RULE_ID: AtomicU64 = AtomicU64::new(1);

/// Position of a rule in the global creation order.
///
/// Ids come from one process-wide counter that is never reset, so rules from
/// different sources stay totally ordered. A greater id always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(u64);

impl RuleId {
	/// Draws the next id from the global counter.
	pub fn next() -> Self {
		Self(NEXT_RULE_ID.fetch_add(1, Ordering::Relaxed))
	}

	pub fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for RuleId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Outcome a rule assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
	Allow,
	Deny,
}

impl Effect {
	pub const ALL: [Effect; 2] = [Effect::Allow, Effect::Deny];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Allow => "allow",
			Self::Deny => "deny",
		}
	}
}

impl FromStr for Effect {
	type Err = AuthzError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_lowercase().as_str() {
			"allow" => Ok(Self::Allow),
			"deny" => Ok(Self::Deny),
			other => Err(AuthzError::rule_definition(
				"",
				format!("effect must be 'allow' or 'deny', got '{other}'"),
			)),
		}
	}
}

impl fmt::Display for Effect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Who a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
	/// `*`: every principal.
	Everyone,
	/// `role:<name>`: principals holding the role.
	Role(String),
	/// A single principal id.
	Principal(String),
}

impl Target {
	/// Parses a target string; input is lower-cased first.
	pub fn parse(raw: &str) -> Result<Self> {
		let raw = raw.trim().to_lowercase();
		if raw.is_empty() {
			return Err(AuthzError::rule_definition("", "target is empty"));
		}
		if raw == WILDCARD {
			return Ok(Self::Everyone);
		}
		match raw.strip_prefix(ROLE_PREFIX) {
			Some("") => Err(AuthzError::rule_definition("", "role target has no role name")),
			Some(role) => Ok(Self::Role(role.to_string())),
			None => Ok(Self::Principal(raw)),
		}
	}

	pub fn role(role: &str) -> Self {
		Self::Role(role.to_lowercase())
	}
}

impl fmt::Display for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Everyone => f.write_str(WILDCARD),
			Self::Role(role) => write!(f, "{ROLE_PREFIX}{role}"),
			Self::Principal(id) => f.write_str(id),
		}
	}
}

impl Serialize for Target {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

/// An immutable access rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionsRule {
	id: RuleId,
	name: String,
	effect: Effect,
	actions: Vec<ParsedAction>,
	target: Target,
}

impl PermissionsRule {
	/// Builds a rule and assigns it the next global id.
	///
	/// `effect` and `target` are case-normalized.
	pub fn new(
		name: impl Into<String>,
		effect: &str,
		actions: Vec<ParsedAction>,
		target: &str,
	) -> Result<Self> {
		let name = name.into();
		let effect = effect.parse::<Effect>().map_err(|e| e.in_rule(&name))?;
		let target = Target::parse(target).map_err(|e| e.in_rule(&name))?;
		Ok(Self {
			id: RuleId::next(),
			name,
			effect,
			actions,
			target,
		})
	}

	pub fn id(&self) -> RuleId {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn effect(&self) -> Effect {
		self.effect
	}

	pub fn actions(&self) -> &[ParsedAction] {
		&self.actions
	}

	pub fn target(&self) -> &Target {
		&self.target
	}
}
