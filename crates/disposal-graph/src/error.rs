// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Graph construction and configuration errors.

use thiserror::Error;

use crate::NodeId;

/// Known-type configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed known-type table: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("known-type table names an empty {field}")]
    EmptyName { field: &'static str },
}

/// A graph under construction is structurally invalid.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    #[error("node {child:?} is claimed by both {first:?} and {second:?}")]
    SharedChild {
        child: NodeId,
        first: NodeId,
        second: NodeId,
    },

    #[error("node {parent:?} refers to missing child {child:?}")]
    MissingChild { parent: NodeId, child: NodeId },
}
