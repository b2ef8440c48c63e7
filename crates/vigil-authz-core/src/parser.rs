// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Folds ordered rules into the precedence tree.
//!
//! Rules are applied in ascending id order. Before a rule entry records its
//! own decision it clears every older decision it subsumes, so the tree only
//! ever holds the most recent decision for any point it covers:
//!
//! 1. **Scope**: the overridden action keys (the action itself, or for `ns:*`
//!    every concrete action plus `*`), the overridden targets (`*` covers all
//!    direct targets, `role:r` only that role) and the pinned parameters.
//! 2. **Clear**: within that scope, remove every leaf (any effect) whose path
//!    carries each pinned value at the pinned parameter's position. A fully
//!    open entry clears the whole target node; an entry pinning `k=v` leaves
//!    sibling values and `*` branches alone.
//! 3. **Write**: record the entry's own decision at its exact path.

use tracing::{debug, instrument};

use crate::action::{ActionKey, ParsedAction};
use crate::error::Result;
use crate::namespace::NamespaceRegistry;
use crate::rule::{Effect, PermissionsRule, RuleId, Target};
use crate::tree::{PrecedenceTree, TargetScope};

/// Applies rules to a precedence tree against one namespace registry.
#[derive(Debug, Clone, Copy)]
pub struct OverrideParser<'a> {
	registry: &'a NamespaceRegistry,
}

/// A rule entry with every registry lookup already done.
struct PlannedEntry<'r> {
	rule: RuleId,
	effect: Effect,
	target: &'r Target,
	action: &'r ParsedAction,
	path: Vec<String>,
	overridden: Vec<(ActionKey, Vec<String>)>,
}

impl<'a> OverrideParser<'a> {
	pub fn new(registry: &'a NamespaceRegistry) -> Self {
		Self { registry }
	}

	/// Sorts `rules` by id and folds them into `tree`.
	///
	/// Every entry is checked against the registry before the first write,
	/// so on error `tree` is left exactly as it was. Returns the rules in the
	/// order they were applied.
	#[instrument(level = "debug", skip_all, fields(rules = rules.len()))]
	pub fn parse(
		&self,
		tree: &mut PrecedenceTree,
		mut rules: Vec<PermissionsRule>,
	) -> Result<Vec<PermissionsRule>> {
		rules.sort_by_key(PermissionsRule::id);

		let mut plan = Vec::new();
		for rule in &rules {
			for action in rule.actions() {
				plan.push(self.plan(rule, action).map_err(|e| e.in_rule(rule.name()))?);
			}
		}

		for entry in &plan {
			let cleared = clear_subsumed(tree, entry);
			write_decision(tree, entry);
			debug!(
				rule = %entry.rule,
				action = %entry.action,
				target = %entry.target,
				effect = %entry.effect,
				cleared,
				"applied rule entry"
			);
		}

		Ok(rules)
	}

	fn plan<'r>(
		&self,
		rule: &'r PermissionsRule,
		action: &'r ParsedAction,
	) -> Result<PlannedEntry<'r>> {
		let declared = self.registry.action_params(&action.full_name())?;
		let path = action.param_path(&declared);

		let mut overridden = vec![(action.action().clone(), declared)];
		if action.is_wildcard() {
			for name in self.registry.actions_by_namespace(action.namespace(), false)? {
				let key = ActionKey::Named(name);
				let params = self
					.registry
					.action_params(&format!("{}:{}", action.namespace(), key))?;
				overridden.push((key, params));
			}
		}

		Ok(PlannedEntry {
			rule: rule.id(),
			effect: rule.effect(),
			target: rule.target(),
			action,
			path,
			overridden,
		})
	}
}

/// True when every parameter pinned by `action` is declared in `declared`
/// and `path` carries the pinned value at that position.
fn subsumes(action: &ParsedAction, declared: &[String], path: &[String]) -> bool {
	action.params().iter().all(|(param, value)| {
		declared
			.iter()
			.position(|p| p == param)
			.map(|i| path.get(i) == Some(value))
			.unwrap_or(false)
	})
}

fn clear_subsumed(tree: &mut PrecedenceTree, entry: &PlannedEntry<'_>) -> usize {
	let mut cleared = 0;
	for (key, declared) in &entry.overridden {
		let Some(node) = tree.action_mut(entry.action.namespace(), key) else {
			continue;
		};
		for target in node.overridden_targets_mut(entry.target) {
			cleared += target.remove_where(|path| subsumes(entry.action, declared, path));
		}
		node.prune();
	}
	cleared
}

fn write_decision(tree: &mut PrecedenceTree, entry: &PlannedEntry<'_>) {
	tree
		.action_entry(entry.action.namespace(), entry.action.action())
		.target_entry(TargetScope::from(entry.target))
		.insert(entry.effect, entry.path.clone(), entry.rule);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::AuthzError;
	use crate::namespace::tests::test_registry;

	const USER: &str = "some-user-id";

	fn action(registry: &NamespaceRegistry, name: &str, project_id: Option<u32>) -> ParsedAction {
		ParsedAction::new(
			registry,
			"prj",
			name,
			project_id.map(|id| ("project_id", id)),
		)
		.unwrap()
	}

	fn rule(effect: &str, action: ParsedAction, target: &str) -> PermissionsRule {
		PermissionsRule::new(format!("{effect} {action} for {target}"), effect, vec![action], target)
			.unwrap()
	}

	fn parse(registry: &NamespaceRegistry, rules: Vec<PermissionsRule>) -> PrecedenceTree {
		let mut tree = PrecedenceTree::new();
		OverrideParser::new(registry).parse(&mut tree, rules).unwrap();
		tree
	}

	fn lookup(
		tree: &PrecedenceTree,
		action: &str,
		target: &str,
		effect: Effect,
		path: &[&str],
	) -> Option<RuleId> {
		tree.decision(
			"prj",
			&ActionKey::from(action),
			&Target::parse(target).unwrap(),
			effect,
			path,
		)
	}

	#[test]
	fn returns_rules_in_id_order() {
		let registry = test_registry();
		let first = rule("allow", action(&registry, "ListProjects", None), "*");
		let second = rule("deny", action(&registry, "ListProjects", None), "*");
		let (first_id, second_id) = (first.id(), second.id());

		let mut tree = PrecedenceTree::new();
		let applied = OverrideParser::new(&registry)
			.parse(&mut tree, vec![second, first])
			.unwrap();
		let ids: Vec<_> = applied.iter().map(PermissionsRule::id).collect();
		assert_eq!(ids, vec![first_id, second_id]);
		assert_eq!(
			lookup(&tree, "ListProjects", "*", Effect::Deny, &[]),
			Some(second_id)
		);
		assert_eq!(lookup(&tree, "ListProjects", "*", Effect::Allow, &[]), None);
	}

	#[test]
	fn failed_parse_leaves_tree_untouched() {
		let registry = test_registry();
		let mut tree = parse(
			&registry,
			vec![rule("allow", action(&registry, "ListProjects", None), "*")],
		);
		let before = tree.clone();

		let mut other = NamespaceRegistry::new();
		other
			.register(
				crate::namespace::ActionNamespace::new("other").with_action("Read", Vec::<String>::new()),
			)
			.unwrap();
		let foreign = PermissionsRule::new(
			"Foreign",
			"allow",
			vec![ParsedAction::parse(&other, "other:Read").unwrap()],
			"*",
		)
		.unwrap();
		let valid = rule("deny", action(&registry, "ListProjects", None), "*");

		let err = OverrideParser::new(&registry)
			.parse(&mut tree, vec![valid, foreign])
			.unwrap_err();
		assert!(matches!(err, AuthzError::RuleDefinition { ref rule, .. } if rule == "Foreign"));
		assert_eq!(tree, before);
	}

	mod broader_overrides_narrower {
		use super::*;

		#[test]
		fn target_wide_overrides_target_object_wide() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "RetrieveProject", Some(1)), USER),
					rule("allow", action(&registry, "RetrieveProject", Some(2)), USER),
					rule("deny", action(&registry, "RetrieveProject", None), USER),
				],
			);

			assert!(lookup(&tree, "RetrieveProject", USER, Effect::Allow, &["1"]).is_none());
			assert!(lookup(&tree, "RetrieveProject", USER, Effect::Allow, &["2"]).is_none());
			assert!(lookup(&tree, "RetrieveProject", USER, Effect::Deny, &["*"]).is_some());
		}

		#[test]
		fn object_wide_does_not_override_target_wide() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "RetrieveProject", None), USER),
					rule("deny", action(&registry, "RetrieveProject", Some(1)), "*"),
				],
			);

			assert!(lookup(&tree, "RetrieveProject", USER, Effect::Allow, &["*"]).is_some());
			assert!(lookup(&tree, "RetrieveProject", "*", Effect::Deny, &["1"]).is_some());
		}

		#[test]
		fn action_wide_overrides_object_wide() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "RetrieveProject", Some(1)), "*"),
					rule("deny", action(&registry, "RetrieveProject", None), "*"),
				],
			);

			assert!(lookup(&tree, "RetrieveProject", "*", Effect::Allow, &["1"]).is_none());
			assert!(lookup(&tree, "RetrieveProject", "*", Effect::Deny, &["*"]).is_some());
		}

		#[test]
		fn namespace_target_object_wide_keeps_action_wide() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "RetrieveProject", None), "*"),
					rule("deny", action(&registry, "*", Some(1)), USER),
				],
			);

			assert!(lookup(&tree, "RetrieveProject", "*", Effect::Allow, &["*"]).is_some());
			assert!(lookup(&tree, "*", USER, Effect::Deny, &["1"]).is_some());
		}

		#[test]
		fn namespace_target_wide_overrides_namespace_target_object_wide() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "*", Some(1)), USER),
					rule("deny", action(&registry, "*", None), USER),
				],
			);

			assert!(lookup(&tree, "*", USER, Effect::Allow, &["1"]).is_none());
			assert!(lookup(&tree, "*", USER, Effect::Deny, &["1"]).is_none());
			assert!(lookup(&tree, "*", USER, Effect::Deny, &["*"]).is_some());
		}

		#[test]
		fn namespace_object_wide_keeps_namespace_target_wide() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "*", None), USER),
					rule("deny", action(&registry, "*", Some(1)), "*"),
				],
			);

			assert!(lookup(&tree, "*", USER, Effect::Allow, &["*"]).is_some());
			assert!(lookup(&tree, "*", "*", Effect::Deny, &["1"]).is_some());
		}

		#[test]
		fn namespace_wide_overrides_namespace_object_wide() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "*", Some(1)), "*"),
					rule("deny", action(&registry, "*", None), "*"),
				],
			);

			assert!(lookup(&tree, "*", "*", Effect::Allow, &["1"]).is_none());
			assert!(lookup(&tree, "*", "*", Effect::Deny, &["*"]).is_some());
		}

		#[test]
		fn action_wide_overrides_target_wide() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "RetrieveProject", None), USER),
					rule("deny", action(&registry, "RetrieveProject", None), "*"),
				],
			);

			assert!(lookup(&tree, "RetrieveProject", USER, Effect::Allow, &["*"]).is_none());
			assert!(lookup(&tree, "RetrieveProject", "*", Effect::Deny, &["*"]).is_some());
		}

		#[test]
		fn namespace_wide_overrides_action_wide() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "RetrieveProject", None), "*"),
					rule("deny", action(&registry, "*", None), "*"),
				],
			);

			assert!(lookup(&tree, "RetrieveProject", "*", Effect::Allow, &["*"]).is_none());
			assert!(lookup(&tree, "*", "*", Effect::Deny, &["*"]).is_some());
		}

		#[test]
		fn role_rules_only_override_their_role() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "RetrieveProject", None), "role:dev"),
					rule("allow", action(&registry, "RetrieveProject", None), "role:ops"),
					rule("deny", action(&registry, "RetrieveProject", None), "role:dev"),
					rule("deny", action(&registry, "RetrieveProject", None), "*"),
				],
			);

			assert!(lookup(&tree, "RetrieveProject", "role:dev", Effect::Allow, &["*"]).is_none());
			assert!(lookup(&tree, "RetrieveProject", "role:dev", Effect::Deny, &["*"]).is_some());
			assert!(lookup(&tree, "RetrieveProject", "role:ops", Effect::Allow, &["*"]).is_some());
		}
	}

	mod same_width {
		use super::*;

		fn assert_overridden(name: &str, project_id: Option<u32>, target: &str) {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, name, project_id), target),
					rule("deny", action(&registry, name, project_id), target),
				],
			);
			let value = project_id.map(|id| id.to_string()).unwrap_or_else(|| "*".into());

			assert!(lookup(&tree, name, target, Effect::Allow, &[value.as_str()]).is_none());
			assert!(lookup(&tree, name, target, Effect::Deny, &[value.as_str()]).is_some());
		}

		#[test]
		fn target_object_wide() {
			assert_overridden("RetrieveProject", Some(1), USER);
		}

		#[test]
		fn target_wide() {
			assert_overridden("RetrieveProject", None, USER);
		}

		#[test]
		fn object_wide() {
			assert_overridden("RetrieveProject", Some(1), "*");
		}

		#[test]
		fn action_wide() {
			assert_overridden("RetrieveProject", None, "*");
		}

		#[test]
		fn namespace_target_object_wide() {
			assert_overridden("*", Some(1), USER);
		}

		#[test]
		fn namespace_target_wide() {
			assert_overridden("*", None, USER);
		}

		#[test]
		fn namespace_object_wide() {
			assert_overridden("*", Some(1), "*");
		}

		#[test]
		fn namespace_wide() {
			assert_overridden("*", None, "*");
		}
	}

	mod non_destruction {
		use super::*;

		#[test]
		fn pinned_deny_keeps_sibling_allow() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "RetrieveProject", Some(2)), USER),
					rule("deny", action(&registry, "RetrieveProject", Some(1)), USER),
				],
			);

			assert!(lookup(&tree, "RetrieveProject", USER, Effect::Allow, &["2"]).is_some());
			assert!(lookup(&tree, "RetrieveProject", USER, Effect::Deny, &["1"]).is_some());
		}

		#[test]
		fn pinned_rule_only_clears_matching_value_in_multi_param_actions() {
			let registry = test_registry();
			let entity = |effect: &str, project: &str, entity: &str| {
				let mut params = Vec::new();
				if project != "*" {
					params.push(("project_id", project));
				}
				if entity != "*" {
					params.push(("entity_id", entity));
				}
				let action = ParsedAction::new(&registry, "ent", "RetrieveEntity", params).unwrap();
				PermissionsRule::new("entity", effect, vec![action], USER).unwrap()
			};

			let mut tree = PrecedenceTree::new();
			OverrideParser::new(&registry)
				.parse(
					&mut tree,
					vec![
						entity("allow", "1", "10"),
						entity("allow", "1", "11"),
						entity("allow", "2", "10"),
						entity("allow", "*", "10"),
						entity("deny", "1", "*"),
					],
				)
				.unwrap();

			let key = ActionKey::from("RetrieveEntity");
			let user = Target::parse(USER).unwrap();
			assert!(tree.decision("ent", &key, &user, Effect::Allow, &["1", "10"]).is_none());
			assert!(tree.decision("ent", &key, &user, Effect::Allow, &["1", "11"]).is_none());
			assert!(tree.decision("ent", &key, &user, Effect::Allow, &["2", "10"]).is_some());
			assert!(tree.decision("ent", &key, &user, Effect::Allow, &["*", "10"]).is_some());
			assert!(tree.decision("ent", &key, &user, Effect::Deny, &["1", "*"]).is_some());
		}

		#[test]
		fn wildcard_rule_pinning_undeclared_param_keeps_concrete_decisions() {
			let registry = test_registry();
			let tree = parse(
				&registry,
				vec![
					rule("allow", action(&registry, "ListProjects", None), "*"),
					rule("deny", action(&registry, "*", Some(1)), "*"),
				],
			);

			assert!(lookup(&tree, "ListProjects", "*", Effect::Allow, &[]).is_some());
			assert!(lookup(&tree, "*", "*", Effect::Deny, &["1"]).is_some());
		}
	}
}
