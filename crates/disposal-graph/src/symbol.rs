// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Symbol definitions and symbol table.

use serde::{Deserialize, Serialize};

use crate::syntax::{Literal, RefKind};
use crate::types::TypeId;
use crate::NodeId;

/// Unique identifier for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

/// Declared accessibility of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accessibility {
    Public,
    Protected,
    Internal,
    #[default]
    Private,
}

/// What flavor of method a method symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Ordinary,
    Constructor,
    LocalFunction,
}

/// Method modifiers relevant to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodFlags {
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_abstract: bool,
    pub is_static: bool,
}

/// The kind of symbol.
#[derive(Debug, Clone)]
pub enum SymbolKind {
    /// A local variable.
    Local,
    /// A method parameter.
    Parameter {
        ordinal: usize,
        ref_kind: RefKind,
        /// `params T[] xs`: absorbs every trailing positional argument.
        is_params: bool,
        /// Default value of an optional parameter.
        default: Option<Literal>,
    },
    Field {
        is_readonly: bool,
    },
    Property {
        has_setter: bool,
    },
    /// Method, constructor, or local function. `ty` of the symbol is the
    /// return type.
    Method {
        params: Vec<SymbolId>,
        kind: MethodKind,
        flags: MethodFlags,
        type_params: Vec<TypeId>,
    },
}

/// A declared symbol.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    /// Value type for locals/parameters/fields/properties, return type for
    /// methods. `None` for `void`.
    pub ty: Option<TypeId>,
    /// Type that declares this symbol (for members) or that declares the
    /// containing method (for locals and parameters).
    pub containing_type: Option<TypeId>,
    /// Method owning a local or parameter.
    pub containing_symbol: Option<SymbolId>,
    /// Declaring nodes. Empty when the symbol comes from metadata only.
    pub declarations: Vec<NodeId>,
    pub accessibility: Accessibility,
}

impl Symbol {
    /// Whether source is available for this symbol.
    pub fn is_available(&self) -> bool {
        !self.declarations.is_empty()
    }

    pub fn is_local(&self) -> bool {
        matches!(self.kind, SymbolKind::Local)
    }

    pub fn is_member(&self) -> bool {
        matches!(self.kind, SymbolKind::Field { .. } | SymbolKind::Property { .. })
    }

    pub fn is_method(&self) -> bool {
        matches!(self.kind, SymbolKind::Method { .. })
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.kind, SymbolKind::Method { kind: MethodKind::Constructor, .. })
    }

    /// Parameter ref kind, `None` for anything but parameters.
    pub fn ref_kind(&self) -> Option<RefKind> {
        match self.kind {
            SymbolKind::Parameter { ref_kind, .. } => Some(ref_kind),
            _ => None,
        }
    }

    pub fn default_value(&self) -> Option<&Literal> {
        match &self.kind {
            SymbolKind::Parameter { default, .. } => default.as_ref(),
            _ => None,
        }
    }

    pub fn params(&self) -> &[SymbolId] {
        match &self.kind {
            SymbolKind::Method { params, .. } => params,
            _ => &[],
        }
    }

    pub fn method_flags(&self) -> MethodFlags {
        match &self.kind {
            SymbolKind::Method { flags, .. } => *flags,
            _ => MethodFlags::default(),
        }
    }

    /// Methods without a return value. Constructors count as void.
    pub fn returns_void(&self) -> bool {
        self.is_method() && (self.ty.is_none() || self.is_constructor())
    }
}

/// Table of all symbols in a program.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { symbols: Vec::new() }
    }

    /// Insert a new symbol and return its ID.
    pub fn insert(
        &mut self,
        name: String,
        kind: SymbolKind,
        ty: Option<TypeId>,
        containing_type: Option<TypeId>,
    ) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            id,
            name,
            kind,
            ty,
            containing_type,
            containing_symbol: None,
            declarations: Vec::new(),
            accessibility: Accessibility::default(),
        });
        id
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
