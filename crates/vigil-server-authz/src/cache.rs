// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decision cache boundary.
//!
//! Keys follow one layout so that a whole service, or one principal, can be
//! invalidated by prefix:
//!
//! ```text
//! actions[_<prefix>].<principal>.uaa.<generation>[.<role>,<role>][.<k>=<v>&<k>=<v>]   allowed actions
//! actions[_<prefix>].<principal>.aur[.<k>=<v>&<k>=<v>]                                resolved roles
//! ```
//!
//! Every component is percent-encoded, `.` included, so keys are injective.
//! Principals and roles are lower-cased the way the resolver matches them.
//! Values are JSON arrays of strings.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CacheError;

const KEY_NAMESPACE: &str = "actions";

#[async_trait]
pub trait DecisionCache: Send + Sync {
	async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

	async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;

	/// Removes every entry whose key starts with `prefix`; returns how many.
	async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

/// Process-local cache backed by a hash map.
#[derive(Debug, Default)]
pub struct InMemoryDecisionCache {
	entries: RwLock<HashMap<String, String>>,
}

impl InMemoryDecisionCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}
}

#[async_trait]
impl DecisionCache for InMemoryDecisionCache {
	async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
		Ok(self.entries.read().await.get(key).cloned())
	}

	async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
		self.entries.write().await.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
		let mut entries = self.entries.write().await;
		let before = entries.len();
		entries.retain(|key, _| !key.starts_with(prefix));
		Ok(before - entries.len())
	}
}

/// Builds cache keys for one service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
	namespace: String,
}

impl CacheKeys {
	pub fn new(prefix: Option<&str>) -> Self {
		let namespace = match prefix {
			Some(prefix) => format!("{KEY_NAMESPACE}_{}", escape(prefix)),
			None => KEY_NAMESPACE.to_string(),
		};
		Self { namespace }
	}

	/// Prefix shared by every key of this instance.
	pub fn all(&self) -> String {
		format!("{}.", self.namespace)
	}

	/// Prefix shared by every key of one principal.
	pub fn principal(&self, principal: &str) -> String {
		format!("{}.{}.", self.namespace, escape(&principal.to_lowercase()))
	}

	/// Key for the actions granted under one snapshot generation.
	pub fn allowed_actions(
		&self,
		principal: &str,
		generation: u64,
		roles: &BTreeSet<String>,
		params: &BTreeMap<String, String>,
	) -> String {
		let mut key = format!("{}uaa.{generation}", self.principal(principal));
		if !roles.is_empty() {
			let roles: BTreeSet<String> = roles.iter().map(|r| escape(&r.to_lowercase())).collect();
			key.push('.');
			key.push_str(&roles.into_iter().collect::<Vec<_>>().join(","));
		}
		push_params(&mut key, params);
		key
	}

	pub fn user_roles(&self, principal: &str, params: &BTreeMap<String, String>) -> String {
		let mut key = format!("{}aur", self.principal(principal));
		push_params(&mut key, params);
		key
	}
}

fn escape(component: &str) -> String {
	urlencoding::encode(component).replace('.', "%2E")
}

fn push_params(key: &mut String, params: &BTreeMap<String, String>) {
	if params.is_empty() {
		return;
	}
	let pairs: Vec<String> = params
		.iter()
		.map(|(k, v)| format!("{}={}", escape(k), escape(v)))
		.collect();
	key.push('.');
	key.push_str(&pairs.join("&"));
}

pub(crate) fn encode(values: &BTreeSet<String>) -> Result<String, CacheError> {
	Ok(serde_json::to_string(values)?)
}

pub(crate) fn decode(value: &str) -> Result<BTreeSet<String>, CacheError> {
	Ok(serde_json::from_str(value)?)
}
