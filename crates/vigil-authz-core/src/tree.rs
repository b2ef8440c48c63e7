// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The precedence tree: the single recorded decision per
//! (namespace, action, target, effect, parameter path).
//!
//! ```text
//! namespace ─┬─ action | * ─┬─ direct ── "*" | principal ─┐
//!            │              └─ roles ─── role ────────────┴─ effect ── [v1, v2, ..] → RuleId
//! ```
//!
//! Parameter paths hold one value per declared parameter of the action key,
//! `*` standing for "any value". A leaf's presence is a decision; an absent
//! leaf is no decision.

use std::collections::BTreeMap;

use crate::action::ActionKey;
use crate::namespace::WILDCARD;
use crate::rule::{Effect, RuleId, Target};

/// One value per declared parameter, in declaration order.
pub type ParamPath = Vec<String>;

/// Where a rule's target lives inside an action node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetScope<'a> {
	/// `*` or a principal id.
	Direct(&'a str),
	/// A role name.
	Role(&'a str),
}

impl<'a> From<&'a Target> for TargetScope<'a> {
	fn from(target: &'a Target) -> Self {
		match target {
			Target::Everyone => Self::Direct(WILDCARD),
			Target::Principal(id) => Self::Direct(id),
			Target::Role(role) => Self::Role(role),
		}
	}
}

/// Decisions recorded for one target of one action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetNode {
	effects: BTreeMap<Effect, BTreeMap<ParamPath, RuleId>>,
}

impl TargetNode {
	pub fn get(&self, effect: Effect, path: &[String]) -> Option<RuleId> {
		self.effects.get(&effect)?.get(path).copied()
	}

	pub fn insert(&mut self, effect: Effect, path: ParamPath, rule: RuleId) {
		self.effects.entry(effect).or_default().insert(path, rule);
	}

	/// Removes every leaf, of any effect, whose path matches `remove`.
	pub fn remove_where(&mut self, mut remove: impl FnMut(&[String]) -> bool) -> usize {
		let mut removed = 0;
		for paths in self.effects.values_mut() {
			let before = paths.len();
			paths.retain(|path, _| !remove(path));
			removed += before - paths.len();
		}
		self.effects.retain(|_, paths| !paths.is_empty());
		removed
	}

	pub fn is_empty(&self) -> bool {
		self.effects.is_empty()
	}

	pub fn len(&self) -> usize {
		self.effects.values().map(BTreeMap::len).sum()
	}

	pub fn leaves(&self) -> impl Iterator<Item = (Effect, &ParamPath, RuleId)> {
		self
			.effects
			.iter()
			.flat_map(|(effect, paths)| paths.iter().map(move |(path, rule)| (*effect, path, *rule)))
	}
}

/// Targets recorded for one action key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionNode {
	direct: BTreeMap<String, TargetNode>,
	roles: BTreeMap<String, TargetNode>,
}

impl ActionNode {
	pub fn target(&self, scope: TargetScope<'_>) -> Option<&TargetNode> {
		match scope {
			TargetScope::Direct(key) => self.direct.get(key),
			TargetScope::Role(role) => self.roles.get(role),
		}
	}

	pub fn target_entry(&mut self, scope: TargetScope<'_>) -> &mut TargetNode {
		match scope {
			TargetScope::Direct(key) => self.direct.entry(key.to_string()).or_default(),
			TargetScope::Role(role) => self.roles.entry(role.to_string()).or_default(),
		}
	}

	/// The target nodes a rule for `target` overrides.
	///
	/// `*` covers every direct target (everyone and each principal) but not
	/// the role sub-tree.
	pub fn overridden_targets_mut<'s>(
		&'s mut self,
		target: &'s Target,
	) -> Box<dyn Iterator<Item = &'s mut TargetNode> + 's> {
		match target {
			Target::Everyone => Box::new(self.direct.values_mut()),
			Target::Principal(id) => Box::new(self.direct.get_mut(id.as_str()).into_iter()),
			Target::Role(role) => Box::new(self.roles.get_mut(role.as_str()).into_iter()),
		}
	}

	/// Drops target nodes that no longer hold any decision.
	pub fn prune(&mut self) {
		self.direct.retain(|_, node| !node.is_empty());
		self.roles.retain(|_, node| !node.is_empty());
	}

	pub fn is_empty(&self) -> bool {
		self.direct.is_empty() && self.roles.is_empty()
	}

	pub fn len(&self) -> usize {
		self.direct.values().chain(self.roles.values()).map(TargetNode::len).sum()
	}
}

/// The full decision structure, keyed by namespace then action key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecedenceTree {
	namespaces: BTreeMap<String, BTreeMap<ActionKey, ActionNode>>,
}

impl PrecedenceTree {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.namespaces.values().all(|actions| actions.values().all(ActionNode::is_empty))
	}

	/// Number of recorded decisions.
	pub fn len(&self) -> usize {
		self
			.namespaces
			.values()
			.flat_map(BTreeMap::values)
			.map(ActionNode::len)
			.sum()
	}

	pub fn namespaces(&self) -> impl Iterator<Item = (&str, &BTreeMap<ActionKey, ActionNode>)> {
		self.namespaces.iter().map(|(name, actions)| (name.as_str(), actions))
	}

	pub fn action(&self, namespace: &str, key: &ActionKey) -> Option<&ActionNode> {
		self.namespaces.get(namespace)?.get(key)
	}

	pub fn action_mut(&mut self, namespace: &str, key: &ActionKey) -> Option<&mut ActionNode> {
		self.namespaces.get_mut(namespace)?.get_mut(key)
	}

	pub fn action_entry(&mut self, namespace: &str, key: &ActionKey) -> &mut ActionNode {
		self
			.namespaces
			.entry(namespace.to_string())
			.or_default()
			.entry(key.clone())
			.or_default()
	}

	/// The rule recorded at an exact position, if any.
	pub fn decision(
		&self,
		namespace: &str,
		key: &ActionKey,
		target: &Target,
		effect: Effect,
		path: &[&str],
	) -> Option<RuleId> {
		let path: ParamPath = path.iter().map(|v| v.to_string()).collect();
		self
			.action(namespace, key)?
			.target(TargetScope::from(target))?
			.get(effect, &path)
	}
}
