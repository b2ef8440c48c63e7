// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization decision core for Vigil.
//!
//! This crate provides:
//! - An action-namespace registry describing every valid action and its
//!   parameters
//! - An override-resolving parser that folds ordered rules into a precedence
//!   tree, a newer rule erasing the older decisions it subsumes
//! - A decision resolver answering which actions a principal may perform
//!
//! Everything here is synchronous and free of I/O. Rule sources, role
//! lookups and caching live in `vigil-server-authz`.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use vigil_authz_core::{ActionNamespace, NamespaceRegistry, PolicySnapshot, rules_from_json};
//!
//! let mut registry = NamespaceRegistry::new();
//! registry.register(ActionNamespace::new("prj").with_action("RetrieveProject", ["project_id"]))?;
//! let registry = Arc::new(registry);
//!
//! let rules = rules_from_json(&registry, &json, "role:admin")?;
//! let snapshot = PolicySnapshot::build(registry, 1, [rules])?;
//! let allowed = snapshot.resolve("user-1", &["admin".into()], &params);
//! ```

pub mod action;
pub mod error;
pub mod namespace;
pub mod parser;
pub mod record;
pub mod resolver;
pub mod rule;
pub mod snapshot;
pub mod tree;

pub use action::{ActionKey, ParsedAction};
pub use error::{AuthzError, Result};
pub use namespace::{
	ActionDefinition, ActionNamespace, NamespaceRegistry, NAMESPACE_SEPARATOR, PARAMS_SEPARATOR,
	WILDCARD,
};
pub use parser::OverrideParser;
pub use record::{rules_from_json, RuleRecord};
pub use resolver::{Decision, DecisionResolver};
pub use rule::{Effect, PermissionsRule, RuleId, Target, ROLE_PREFIX};
pub use snapshot::PolicySnapshot;
pub use tree::{ActionNode, PrecedenceTree, TargetNode, TargetScope};
