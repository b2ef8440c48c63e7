// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the permissions service.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use vigil_authz_core::AuthzError;

/// Result type for permissions service operations.
pub type Result<T> = std::result::Result<T, AuthzServiceError>;

/// Errors that can occur while loading rules or answering queries.
#[derive(Debug, Error)]
pub enum AuthzServiceError {
	#[error(transparent)]
	Authz(#[from] AuthzError),

	#[error("rule source '{source_name}' failed: {message}")]
	Source { source_name: String, message: String },

	#[error("rule source '{source_name}' timed out after {timeout:?}")]
	SourceTimeout { source_name: String, timeout: Duration },

	#[error("role provider for '{parameter}' failed: {message}")]
	RoleProvider { parameter: String, message: String },

	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse {path}: {source}")]
	Json {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}

/// Errors raised by a decision cache backend.
///
/// The service never surfaces these; a failing cache only costs a
/// recomputation.
#[derive(Debug, Error)]
pub enum CacheError {
	#[error("cache backend unavailable: {0}")]
	Unavailable(String),

	#[error("cache entry is not valid JSON: {0}")]
	Serialization(#[from] serde_json::Error),
}
