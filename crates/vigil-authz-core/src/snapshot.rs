// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Immutable policy snapshots.
//!
//! A snapshot pairs the registry with a tree built against it. It is built
//! off to the side and never mutated afterwards, so readers holding one see a
//! consistent policy for as long as they keep it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::namespace::NamespaceRegistry;
use crate::parser::OverrideParser;
use crate::resolver::{Decision, DecisionResolver};
use crate::rule::{PermissionsRule, RuleId};
use crate::tree::PrecedenceTree;

#[derive(Debug, Clone)]
pub struct PolicySnapshot {
	generation: u64,
	registry: Arc<NamespaceRegistry>,
	tree: PrecedenceTree,
	rules: Vec<PermissionsRule>,
}

impl PolicySnapshot {
	/// A snapshot with no rules; it grants nothing.
	pub fn empty(registry: Arc<NamespaceRegistry>) -> Self {
		Self {
			generation: 0,
			registry,
			tree: PrecedenceTree::new(),
			rules: Vec::new(),
		}
	}

	/// Folds every batch into one tree.
	///
	/// Batches usually come one per rule source. Rule ids are global, so the
	/// rules of all batches are applied together in creation order rather
	/// than batch by batch.
	pub fn build<I>(registry: Arc<NamespaceRegistry>, generation: u64, batches: I) -> Result<Self>
	where
		I: IntoIterator<Item = Vec<PermissionsRule>>,
	{
		let mut tree = PrecedenceTree::new();
		let rules = OverrideParser::new(&registry)
			.parse(&mut tree, batches.into_iter().flatten().collect())?;

		info!(
			generation,
			rules = rules.len(),
			decisions = tree.len(),
			namespaces = tree.namespaces().count(),
			"built policy snapshot"
		);

		Ok(Self {
			generation,
			registry,
			tree,
			rules,
		})
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn registry(&self) -> &Arc<NamespaceRegistry> {
		&self.registry
	}

	pub fn tree(&self) -> &PrecedenceTree {
		&self.tree
	}

	/// Rules the tree was built from, in ascending id order.
	pub fn rules(&self) -> &[PermissionsRule] {
		&self.rules
	}

	pub fn rule(&self, id: RuleId) -> Option<&PermissionsRule> {
		self
			.rules
			.binary_search_by_key(&id, PermissionsRule::id)
			.ok()
			.map(|i| &self.rules[i])
	}

	pub fn resolve(
		&self,
		principal: &str,
		roles: &[String],
		params: &BTreeMap<String, String>,
	) -> BTreeSet<String> {
		DecisionResolver::new(&self.registry, &self.tree).resolve(principal, roles, params)
	}

	pub fn resolve_decisions(
		&self,
		principal: &str,
		roles: &[String],
		params: &BTreeMap<String, String>,
	) -> BTreeMap<String, Decision> {
		DecisionResolver::new(&self.registry, &self.tree).resolve_decisions(principal, roles, params)
	}
}
