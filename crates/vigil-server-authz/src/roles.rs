// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role lookups keyed by request parameters.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::error::Result;

/// Answers which roles a principal holds for one parameter value, such as
/// the roles of a user within `project_id=7`.
#[async_trait]
pub trait RoleProvider: Send + Sync {
	/// The request parameter this provider is consulted for.
	fn parameter_key(&self) -> &str;

	async fn roles_for_parameter(
		&self,
		principal: &str,
		name: &str,
		value: &str,
	) -> Result<BTreeSet<String>>;
}

/// Role assignments held in memory.
pub struct StaticRoleProvider {
	parameter_key: String,
	assignments: HashMap<(String, String), BTreeSet<String>>,
}

impl StaticRoleProvider {
	pub fn new(parameter_key: impl Into<String>) -> Self {
		Self {
			parameter_key: parameter_key.into(),
			assignments: HashMap::new(),
		}
	}

	pub fn with_roles<I, S>(mut self, principal: &str, value: &str, roles: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self
			.assignments
			.entry((principal.to_string(), value.to_string()))
			.or_default()
			.extend(roles.into_iter().map(Into::into));
		self
	}
}

#[async_trait]
impl RoleProvider for StaticRoleProvider {
	fn parameter_key(&self) -> &str {
		&self.parameter_key
	}

	async fn roles_for_parameter(
		&self,
		principal: &str,
		_name: &str,
		value: &str,
	) -> Result<BTreeSet<String>> {
		Ok(self
			.assignments
			.get(&(principal.to_string(), value.to_string()))
			.cloned()
			.unwrap_or_default())
	}
}

/// Combines providers into the role set for a request.
///
/// Providers registered for the same parameter must all agree, so their
/// answers are intersected. Answers for different parameters are unioned.
#[derive(Clone, Default)]
pub struct RoleResolver {
	providers: Vec<Arc<dyn RoleProvider>>,
}

impl RoleResolver {
	pub fn new(providers: Vec<Arc<dyn RoleProvider>>) -> Self {
		Self { providers }
	}

	pub fn push(&mut self, provider: Arc<dyn RoleProvider>) {
		self.providers.push(provider);
	}

	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}

	pub async fn roles_for(
		&self,
		principal: &str,
		params: &BTreeMap<String, String>,
	) -> Result<BTreeSet<String>> {
		let mut roles = BTreeSet::new();
		for (name, value) in params {
			let mut agreed: Option<BTreeSet<String>> = None;
			for provider in self.providers.iter().filter(|p| p.parameter_key() == name) {
				let found = provider.roles_for_parameter(principal, name, value).await?;
				agreed = Some(match agreed {
					Some(previous) => previous.intersection(&found).cloned().collect(),
					None => found,
				});
			}
			if let Some(agreed) = agreed {
				trace!(principal, parameter = %name, roles = agreed.len(), "resolved parameter roles");
				roles.extend(agreed);
			}
		}
		Ok(roles)
	}
}
