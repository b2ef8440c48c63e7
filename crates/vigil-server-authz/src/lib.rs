// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permissions service for Vigil.
//!
//! This crate provides:
//! - Rule sources (in-memory and one JSON rule file per role)
//! - Role lookups keyed by request parameters
//! - A decision cache boundary with an in-memory implementation
//! - Layered configuration (defaults, TOML file, `VIGIL_AUTHZ_*` environment)
//! - [`PermissionsService`], which publishes policy snapshots atomically and
//!   answers permission checks
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use vigil_server_authz::{load_config, PermissionsService, RoleRulesFileSource};
//!
//! let config = load_config()?;
//! let source = RoleRulesFileSource::new(&config.rules_dir, config.roles.clone());
//! let service = PermissionsService::new(Arc::new(registry), config).with_source(Arc::new(source));
//! service.initialize().await?;
//!
//! if service.is_allowed("user-1", &["prj:RetrieveProject"], &params).await? {
//!     // ...
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod roles;
pub mod service;
pub mod source;

#[cfg(test)]
mod testing;

pub use cache::{CacheKeys, DecisionCache, InMemoryDecisionCache};
pub use config::{load_config, load_config_with_file, AuthzConfig, AuthzConfigLayer, ConfigError};
pub use error::{AuthzServiceError, CacheError, Result};
pub use roles::{RoleProvider, RoleResolver, StaticRoleProvider};
pub use service::PermissionsService;
pub use source::{RoleRulesFileSource, RuleSource, StaticRuleSource};
