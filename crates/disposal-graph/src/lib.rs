// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Program graph consumed by the disposal analyses.
//!
//! This crate defines the read-only view of a bound program that the
//! ownership engine works on: syntax nodes with parent links, resolved
//! symbols, a nominal type table, and the known-type allow-lists.

pub mod span;
pub mod syntax;
pub mod symbol;
pub mod types;
pub mod known;
pub mod program;
pub mod graph;
pub mod builder;
pub mod prelude;
mod error;

use serde::{Deserialize, Serialize};

pub use builder::{GraphBuilder, Param};
pub use error::{BuildError, ConfigError};
pub use graph::SyntaxGraph;
pub use known::{KnownTypes, MemberRef, OwnershipSwitch, WrapperRule};
pub use prelude::Prelude;
pub use program::{ProgramGraph, Resolution};
pub use span::Span;
pub use symbol::{Accessibility, MethodFlags, MethodKind, Symbol, SymbolId, SymbolKind};
pub use syntax::{Literal, Node, NodeKind, RefKind, UnaryOp};
pub use types::{TypeDef, TypeId, TypeKind};

/// Unique identifier for a syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);
