// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The permissions service: snapshot publishing, cached resolution and
//! permission checks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use vigil_authz_core::{NamespaceRegistry, PolicySnapshot};

use crate::cache::{self, CacheKeys, DecisionCache, InMemoryDecisionCache};
use crate::config::AuthzConfig;
use crate::error::{AuthzServiceError, Result};
use crate::roles::{RoleProvider, RoleResolver};
use crate::source::RuleSource;

/// Publishes policy snapshots and answers authorization queries.
///
/// Readers load the current snapshot without locking; `initialize` builds a
/// new one off to the side and swaps it in with a single store. Concurrent
/// rebuilds are serialized.
pub struct PermissionsService {
	config: AuthzConfig,
	registry: Arc<NamespaceRegistry>,
	snapshot: ArcSwap<PolicySnapshot>,
	sources: Vec<Arc<dyn RuleSource>>,
	roles: RoleResolver,
	cache: Option<Arc<dyn DecisionCache>>,
	keys: CacheKeys,
	rebuild: Mutex<()>,
}

impl PermissionsService {
	/// Creates a service with an empty snapshot and, when caching is enabled,
	/// an in-memory decision cache.
	pub fn new(registry: Arc<NamespaceRegistry>, config: AuthzConfig) -> Self {
		let cache: Option<Arc<dyn DecisionCache>> = if config.cache_enabled {
			Some(Arc::new(InMemoryDecisionCache::new()))
		} else {
			None
		};
		Self {
			keys: CacheKeys::new(config.cache_prefix.as_deref()),
			snapshot: ArcSwap::from_pointee(PolicySnapshot::empty(registry.clone())),
			registry,
			config,
			sources: Vec::new(),
			roles: RoleResolver::default(),
			cache,
			rebuild: Mutex::new(()),
		}
	}

	pub fn with_source(mut self, source: Arc<dyn RuleSource>) -> Self {
		self.sources.push(source);
		self
	}

	pub fn with_role_provider(mut self, provider: Arc<dyn RoleProvider>) -> Self {
		self.roles.push(provider);
		self
	}

	/// Replaces the decision cache. Ignored when caching is disabled.
	pub fn with_cache(mut self, cache: Arc<dyn DecisionCache>) -> Self {
		if self.config.cache_enabled {
			self.cache = Some(cache);
		}
		self
	}

	pub fn config(&self) -> &AuthzConfig {
		&self.config
	}

	pub fn registry(&self) -> &Arc<NamespaceRegistry> {
		&self.registry
	}

	/// The currently published snapshot.
	pub fn snapshot(&self) -> Arc<PolicySnapshot> {
		self.snapshot.load_full()
	}

	/// Rebuilds the snapshot from every source and publishes it.
	///
	/// Returns the generation now published. When parsing is disabled the
	/// current snapshot stays in place. On error nothing is published.
	#[instrument(skip(self), fields(sources = self.sources.len()))]
	pub async fn initialize(&self) -> Result<u64> {
		if !self.config.parsing_enabled {
			info!("rule parsing disabled, keeping current snapshot");
			return Ok(self.snapshot.load().generation());
		}

		let _guard = self.rebuild.lock().await;

		let mut batches = Vec::with_capacity(self.sources.len());
		for source in &self.sources {
			let rules = tokio::time::timeout(self.config.source_timeout, source.rules(&self.registry))
				.await
				.map_err(|_| AuthzServiceError::SourceTimeout {
					source_name: source.name().to_string(),
					timeout: self.config.source_timeout,
				})??;
			debug!(source = source.name(), rules = rules.len(), "loaded rule source");
			batches.push(rules);
		}

		let generation = self.snapshot.load().generation() + 1;
		let snapshot = PolicySnapshot::build(self.registry.clone(), generation, batches)?;
		self.snapshot.store(Arc::new(snapshot));
		self.clear_cache().await;

		info!(generation, "published policy snapshot");
		Ok(generation)
	}

	/// Full action names the caller may perform, read through the cache.
	#[instrument(skip(self, roles, params), fields(roles = roles.len()))]
	pub async fn allowed_actions(
		&self,
		principal: &str,
		roles: &BTreeSet<String>,
		params: &BTreeMap<String, String>,
	) -> BTreeSet<String> {
		let snapshot = self.snapshot.load_full();
		let key = self
			.keys
			.allowed_actions(principal, snapshot.generation(), roles, params);
		if let Some(actions) = self.cached(&key).await {
			return actions;
		}

		let roles: Vec<String> = roles.iter().cloned().collect();
		let actions = snapshot.resolve(principal, &roles, params);
		self.store(&key, &actions).await;
		actions
	}

	/// Roles the caller holds for the given parameters, read through the cache.
	///
	/// Providers are asked with the lower-cased principal id.
	pub async fn roles_for(
		&self,
		principal: &str,
		params: &BTreeMap<String, String>,
	) -> Result<BTreeSet<String>> {
		let key = self.keys.user_roles(principal, params);
		if let Some(roles) = self.cached(&key).await {
			return Ok(roles);
		}

		let principal = principal.to_lowercase();
		let roles = self.roles.roles_for(&principal, params).await?;
		self.store(&key, &roles).await;
		Ok(roles)
	}

	/// True when every required action is granted to the caller.
	///
	/// Always true when permission checks are disabled.
	#[instrument(skip(self, required, params))]
	pub async fn is_allowed<S: AsRef<str>>(
		&self,
		principal: &str,
		required: &[S],
		params: &BTreeMap<String, String>,
	) -> Result<bool> {
		if !self.config.permissions_check_enabled {
			return Ok(true);
		}

		let roles = self.roles_for(principal, params).await?;
		let allowed = self.allowed_actions(principal, &roles, params).await;
		Ok(required.iter().all(|action| allowed.contains(action.as_ref())))
	}

	/// Drops every cached decision of this service.
	pub async fn clear_cache(&self) {
		self.invalidate(&self.keys.all()).await;
	}

	/// Drops the cached decisions of one principal.
	pub async fn clear_user_cache(&self, principal: &str) {
		self.invalidate(&self.keys.principal(principal)).await;
	}

	async fn invalidate(&self, prefix: &str) {
		let Some(cache) = &self.cache else {
			return;
		};
		match cache.delete_prefix(prefix).await {
			Ok(removed) => debug!(prefix, removed, "invalidated cached decisions"),
			Err(e) => warn!(prefix, error = %e, "failed to invalidate cached decisions"),
		}
	}

	async fn cached(&self, key: &str) -> Option<BTreeSet<String>> {
		let cache = self.cache.as_ref()?;
		let value = match cache.get(key).await {
			Ok(Some(value)) => value,
			Ok(None) => {
				debug!(key, "decision cache miss");
				return None;
			}
			Err(e) => {
				warn!(key, error = %e, "decision cache read failed");
				return None;
			}
		};
		match cache::decode(&value) {
			Ok(values) => {
				debug!(key, "decision cache hit");
				Some(values)
			}
			Err(e) => {
				warn!(key, error = %e, "ignoring undecodable cache entry");
				None
			}
		}
	}

	async fn store(&self, key: &str, values: &BTreeSet<String>) {
		let Some(cache) = &self.cache else {
			return;
		};
		let result = match cache::encode(values) {
			Ok(value) => cache.set(key, value).await,
			Err(e) => Err(e),
		};
		if let Err(e) = result {
			warn!(key, error = %e, "decision cache write failed");
		}
	}
}
