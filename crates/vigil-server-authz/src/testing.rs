// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use vigil_authz_core::{ActionNamespace, NamespaceRegistry};

pub(crate) fn test_registry() -> NamespaceRegistry {
	NamespaceRegistry::from_definitions([
		ActionNamespace::new("prj")
			.with_action("ListProjects", Vec::<String>::new())
			.with_action("CreateProject", Vec::<String>::new())
			.with_action("RetrieveProject", ["project_id"])
			.with_action("UpdateProject", ["project_id"])
			.with_action("DeleteProject", ["project_id"]),
		ActionNamespace::new("ent")
			.with_action("ListEntities", ["project_id"])
			.with_action("RetrieveEntity", ["project_id", "entity_id"]),
	])
	.expect("test namespaces are valid")
}
