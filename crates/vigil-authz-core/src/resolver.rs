// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Answers "which actions may this caller perform?" against a precedence tree.
//!
//! Every action key of every namespace is evaluated on its own. For each
//! target candidate (`*`, then each role, then the principal) the resolver
//! walks the key's declared parameters, trying the caller's value before `*`
//! at every position. The decision with the greatest rule id wins per
//! concrete action; decisions recorded under the namespace wildcard key
//! compete with the concrete ones. Only allow decisions are granted.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::instrument;

use crate::action::ActionKey;
use crate::namespace::{ActionNamespace, NamespaceRegistry, WILDCARD};
use crate::rule::{Effect, RuleId};
use crate::tree::{ActionNode, PrecedenceTree, TargetNode, TargetScope};

/// The winning decision for one concrete action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
	pub effect: Effect,
	pub rule: RuleId,
}

impl Decision {
	pub fn is_allow(&self) -> bool {
		self.effect == Effect::Allow
	}

	fn newer(self, other: Option<Decision>) -> Decision {
		match other {
			Some(other) if other.rule > self.rule => other,
			_ => self,
		}
	}
}

/// Read-only resolver over a registry and the tree built against it.
#[derive(Debug, Clone, Copy)]
pub struct DecisionResolver<'a> {
	registry: &'a NamespaceRegistry,
	tree: &'a PrecedenceTree,
}

impl<'a> DecisionResolver<'a> {
	pub fn new(registry: &'a NamespaceRegistry, tree: &'a PrecedenceTree) -> Self {
		Self { registry, tree }
	}

	/// Full action names granted to the caller.
	pub fn resolve(
		&self,
		principal: &str,
		roles: &[String],
		params: &BTreeMap<String, String>,
	) -> BTreeSet<String> {
		self
			.resolve_decisions(principal, roles, params)
			.into_iter()
			.filter(|(_, decision)| decision.is_allow())
			.map(|(action, _)| action)
			.collect()
	}

	/// The winning decision, allow or deny, for every action that has one.
	#[instrument(level = "debug", skip(self, roles, params), fields(roles = roles.len()))]
	pub fn resolve_decisions(
		&self,
		principal: &str,
		roles: &[String],
		params: &BTreeMap<String, String>,
	) -> BTreeMap<String, Decision> {
		let principal = principal.to_lowercase();
		let roles: Vec<String> = roles.iter().map(|r| r.to_lowercase()).collect();

		let mut candidates = Vec::with_capacity(roles.len() + 2);
		candidates.push(TargetScope::Direct(WILDCARD));
		candidates.extend(roles.iter().map(|r| TargetScope::Role(r)));
		candidates.push(TargetScope::Direct(&principal));

		let mut decisions = BTreeMap::new();
		for (name, actions) in self.tree.namespaces() {
			let Some(namespace) = self.registry.namespace(name) else {
				continue;
			};
			for (key, node) in actions {
				let Some(declared) = declared_params(namespace, key) else {
					continue;
				};
				let Some(decision) = best_for_key(node, &candidates, &declared, params) else {
					continue;
				};
				for action in covered_actions(namespace, key) {
					let full_name = namespace.full_name(action);
					let current = decisions.get(&full_name).copied();
					decisions.insert(full_name, decision.newer(current));
				}
			}
		}
		decisions
	}
}

fn declared_params(namespace: &ActionNamespace, key: &ActionKey) -> Option<Vec<String>> {
	match key {
		ActionKey::Any => Some(namespace.all_params()),
		ActionKey::Named(name) => namespace.action(name).map(|a| a.params.clone()),
	}
}

fn covered_actions<'n>(namespace: &'n ActionNamespace, key: &'n ActionKey) -> Vec<&'n str> {
	match key {
		ActionKey::Any => namespace.action_names().collect(),
		ActionKey::Named(name) => vec![name.as_str()],
	}
}

fn best_for_key(
	node: &ActionNode,
	candidates: &[TargetScope<'_>],
	declared: &[String],
	params: &BTreeMap<String, String>,
) -> Option<Decision> {
	let mut best: Option<Decision> = None;
	for scope in candidates {
		let Some(target) = node.target(*scope) else {
			continue;
		};
		for effect in Effect::ALL {
			let mut path = Vec::with_capacity(declared.len());
			if let Some(rule) = walk(target, effect, declared, params, &mut path) {
				best = Some(Decision { effect, rule }.newer(best));
			}
		}
	}
	best
}

/// Depth-first over the caller value then `*` at each parameter position;
/// returns the greatest rule id among fully matched paths.
fn walk(
	target: &TargetNode,
	effect: Effect,
	declared: &[String],
	params: &BTreeMap<String, String>,
	path: &mut Vec<String>,
) -> Option<RuleId> {
	let Some((param, rest)) = declared.split_first() else {
		return target.get(effect, path);
	};

	let mut best = None;
	let supplied = params.get(param).filter(|v| v.as_str() != WILDCARD);
	for value in supplied.map(String::as_str).into_iter().chain([WILDCARD]) {
		path.push(value.to_string());
		let found = walk(target, effect, rest, params, path);
		path.pop();
		best = best.max(found);
	}
	best
}
