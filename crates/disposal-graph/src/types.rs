// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Nominal type table with assignability queries.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::symbol::SymbolId;

/// Unique identifier for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// The kind of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Struct,
    /// A generic type parameter; assignability goes through its constraints.
    TypeParameter,
    /// `bool`, `int`, `string`, ...
    Primitive,
}

/// A type definition or a constructed generic type.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub id: TypeId,
    /// Fully qualified name. Generic definitions use arity suffixes
    /// (`System.Threading.Tasks.Task`1`).
    pub name: String,
    pub kind: TypeKind,
    pub base: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    /// Constraints of a type parameter.
    pub constraints: Vec<TypeId>,
    /// Generic definition this type was constructed from.
    pub definition: Option<TypeId>,
    pub type_args: Vec<TypeId>,
    pub members: Vec<SymbolId>,
    pub is_sealed: bool,
}

impl TypeDef {
    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Primitive)
    }
}

/// Registry of all types known to the graph.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: Vec<TypeDef>,
    by_name: HashMap<String, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type. Re-registering a name returns the existing id.
    pub fn insert(&mut self, name: &str, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeDef {
            id,
            name: name.to_string(),
            kind,
            base: None,
            interfaces: Vec::new(),
            constraints: Vec::new(),
            definition: None,
            type_args: Vec::new(),
            members: Vec::new(),
            is_sealed: false,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Construct `definition<args>`, reusing an existing construction.
    ///
    /// The constructed type shares the definition's base and interfaces;
    /// members are looked up on the definition.
    pub fn construct(&mut self, definition: TypeId, args: &[TypeId]) -> TypeId {
        let name = {
            let base = self.name(definition);
            let base = base.split('`').next().unwrap_or(base);
            let args: Vec<&str> = args.iter().map(|&a| self.name(a)).collect();
            format!("{}<{}>", base, args.join(", "))
        };
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let (kind, base, interfaces) = match self.get(definition) {
            Some(def) => (def.kind, def.base, def.interfaces.clone()),
            None => (TypeKind::Class, None, Vec::new()),
        };
        let id = self.insert(&name, kind);
        if let Some(def) = self.get_mut(id) {
            def.base = base;
            def.interfaces = interfaces;
            def.definition = Some(definition);
            def.type_args = args.to_vec();
        }
        id
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: TypeId) -> Option<&mut TypeDef> {
        self.types.get_mut(id.0 as usize)
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: TypeId) -> &str {
        self.get(id).map(|t| t.name.as_str()).unwrap_or("<error>")
    }

    /// Name of the generic definition, or the type's own name.
    pub fn definition_name(&self, id: TypeId) -> &str {
        match self.get(id).and_then(|t| t.definition) {
            Some(def) => self.name(def),
            None => self.name(id),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.iter()
    }

    /// Whether a value of `ty` can be stored in a location of `candidate`.
    ///
    /// Walks base classes, interfaces, generic definitions and type parameter
    /// constraints. Malformed (cyclic) hierarchies terminate.
    pub fn is_assignable_to(&self, ty: TypeId, candidate: TypeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![ty];
        while let Some(current) = stack.pop() {
            if current == candidate {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            let Some(def) = self.get(current) else {
                continue;
            };
            if def.definition == Some(candidate) {
                return true;
            }
            stack.extend(def.base);
            stack.extend(def.interfaces.iter().copied());
            stack.extend(def.constraints.iter().copied());
        }
        false
    }
}
