// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Incremental construction of a [`SyntaxGraph`].
//!
//! Children are built before their parents; adding a node wires the parent
//! link of every child and records declaring nodes on their symbols. Spans are
//! synthesized from construction order, so a parent always covers its
//! children.

use std::collections::HashMap;

use crate::error::BuildError;
use crate::graph::SyntaxGraph;
use crate::program::{ProgramGraph, Resolution};
use crate::symbol::{Accessibility, MethodFlags, MethodKind, Symbol, SymbolId, SymbolKind};
use crate::syntax::{Literal, Node, NodeKind, RefKind, UnaryOp};
use crate::types::{TypeId, TypeKind, TypeTable};
use crate::{NodeId, Span};

/// Parameter description for [`GraphBuilder::method`].
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
    pub ref_kind: RefKind,
    pub is_params: bool,
    pub default: Option<Literal>,
}

impl Param {
    pub fn new(name: &str, ty: TypeId) -> Self {
        Self {
            name: name.to_string(),
            ty,
            ref_kind: RefKind::None,
            is_params: false,
            default: None,
        }
    }

    pub fn out(mut self) -> Self {
        self.ref_kind = RefKind::Out;
        self
    }

    pub fn by_ref(mut self) -> Self {
        self.ref_kind = RefKind::Ref;
        self
    }

    pub fn by_in(mut self) -> Self {
        self.ref_kind = RefKind::In;
        self
    }

    pub fn params(mut self) -> Self {
        self.is_params = true;
        self
    }

    pub fn default(mut self, value: Literal) -> Self {
        self.default = Some(value);
        self
    }
}

/// Builds a [`SyntaxGraph`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: SyntaxGraph,
    errors: Vec<BuildError>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and return the graph.
    pub fn finish(mut self) -> Result<SyntaxGraph, BuildError> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        self.graph.assign_local_owners();
        Ok(self.graph)
    }

    /// Read access to the graph under construction.
    pub fn graph(&self) -> &SyntaxGraph {
        &self.graph
    }

    // ── Types ───────────────────────────────────────────────────

    pub fn types(&self) -> &TypeTable {
        &self.graph.types
    }

    pub fn lookup_type(&self, name: &str) -> Option<TypeId> {
        self.graph.types.lookup(name)
    }

    pub fn class(&mut self, name: &str) -> TypeId {
        self.graph.types.insert(name, TypeKind::Class)
    }

    pub fn interface(&mut self, name: &str) -> TypeId {
        self.graph.types.insert(name, TypeKind::Interface)
    }

    pub fn struct_type(&mut self, name: &str) -> TypeId {
        self.graph.types.insert(name, TypeKind::Struct)
    }

    pub fn primitive(&mut self, name: &str) -> TypeId {
        self.graph.types.insert(name, TypeKind::Primitive)
    }

    pub fn type_param(&mut self, name: &str, constraints: &[TypeId]) -> TypeId {
        let id = self.graph.types.insert(name, TypeKind::TypeParameter);
        if let Some(def) = self.graph.types.get_mut(id) {
            def.constraints.extend_from_slice(constraints);
        }
        id
    }

    pub fn inherit(&mut self, ty: TypeId, base: TypeId) {
        if let Some(def) = self.graph.types.get_mut(ty) {
            def.base = Some(base);
        }
    }

    pub fn implement(&mut self, ty: TypeId, interface: TypeId) {
        if let Some(def) = self.graph.types.get_mut(ty) {
            if !def.interfaces.contains(&interface) {
                def.interfaces.push(interface);
            }
        }
    }

    pub fn seal(&mut self, ty: TypeId) {
        if let Some(def) = self.graph.types.get_mut(ty) {
            def.is_sealed = true;
        }
    }

    pub fn construct(&mut self, definition: TypeId, args: &[TypeId]) -> TypeId {
        self.graph.types.construct(definition, args)
    }

    // ── Symbols ─────────────────────────────────────────────────

    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.graph.symbols.get(id)
    }

    fn member_symbol(&mut self, owner: TypeId, name: &str, kind: SymbolKind, ty: Option<TypeId>) -> SymbolId {
        let id = self.graph.symbols.insert(name.to_string(), kind, ty, Some(owner));
        if let Some(def) = self.graph.types.get_mut(owner) {
            def.members.push(id);
        }
        id
    }

    fn method_symbol(
        &mut self,
        owner: TypeId,
        name: &str,
        kind: MethodKind,
        params: Vec<Param>,
        ret: Option<TypeId>,
    ) -> SymbolId {
        let method = self.member_symbol(
            owner,
            name,
            SymbolKind::Method {
                params: Vec::new(),
                kind,
                flags: MethodFlags::default(),
                type_params: Vec::new(),
            },
            ret,
        );
        let ids: Vec<SymbolId> = params
            .into_iter()
            .enumerate()
            .map(|(ordinal, p)| {
                let id = self.graph.symbols.insert(
                    p.name,
                    SymbolKind::Parameter {
                        ordinal,
                        ref_kind: p.ref_kind,
                        is_params: p.is_params,
                        default: p.default,
                    },
                    Some(p.ty),
                    Some(owner),
                );
                if let Some(sym) = self.graph.symbols.get_mut(id) {
                    sym.containing_symbol = Some(method);
                }
                id
            })
            .collect();
        if let Some(Symbol { kind: SymbolKind::Method { params, .. }, .. }) =
            self.graph.symbols.get_mut(method)
        {
            *params = ids;
        }
        method
    }

    pub fn method(&mut self, owner: TypeId, name: &str, params: Vec<Param>, ret: Option<TypeId>) -> SymbolId {
        self.method_symbol(owner, name, MethodKind::Ordinary, params, ret)
    }

    pub fn constructor(&mut self, owner: TypeId, params: Vec<Param>) -> SymbolId {
        self.method_symbol(owner, ".ctor", MethodKind::Constructor, params, None)
    }

    pub fn local_function(&mut self, owner: TypeId, name: &str, params: Vec<Param>, ret: Option<TypeId>) -> SymbolId {
        self.method_symbol(owner, name, MethodKind::LocalFunction, params, ret)
    }

    pub fn field(&mut self, owner: TypeId, name: &str, ty: TypeId) -> SymbolId {
        self.member_symbol(owner, name, SymbolKind::Field { is_readonly: false }, Some(ty))
    }

    pub fn readonly_field(&mut self, owner: TypeId, name: &str, ty: TypeId) -> SymbolId {
        self.member_symbol(owner, name, SymbolKind::Field { is_readonly: true }, Some(ty))
    }

    pub fn property(&mut self, owner: TypeId, name: &str, ty: TypeId, has_setter: bool) -> SymbolId {
        self.member_symbol(owner, name, SymbolKind::Property { has_setter }, Some(ty))
    }

    /// A local variable. Its owner is filled in when the graph is finished.
    pub fn local(&mut self, name: &str, ty: Option<TypeId>) -> SymbolId {
        self.graph.symbols.insert(name.to_string(), SymbolKind::Local, ty, None)
    }

    /// A lambda parameter.
    pub fn lambda_param(&mut self, name: &str, ty: Option<TypeId>, ordinal: usize) -> SymbolId {
        self.graph.symbols.insert(
            name.to_string(),
            SymbolKind::Parameter {
                ordinal,
                ref_kind: RefKind::None,
                is_params: false,
                default: None,
            },
            ty,
            None,
        )
    }

    /// Parameter `index` of a method.
    pub fn param(&self, method: SymbolId, index: usize) -> Option<SymbolId> {
        self.graph.symbols.get(method)?.params().get(index).copied()
    }

    pub fn set_flags(&mut self, method: SymbolId, new_flags: MethodFlags) {
        if let Some(Symbol { kind: SymbolKind::Method { flags, .. }, .. }) = self.graph.symbols.get_mut(method) {
            *flags = new_flags;
        }
    }

    pub fn set_type_params(&mut self, method: SymbolId, params: Vec<TypeId>) {
        if let Some(Symbol { kind: SymbolKind::Method { type_params, .. }, .. }) =
            self.graph.symbols.get_mut(method)
        {
            *type_params = params;
        }
    }

    pub fn set_accessibility(&mut self, symbol: SymbolId, accessibility: Accessibility) {
        if let Some(sym) = self.graph.symbols.get_mut(symbol) {
            sym.accessibility = accessibility;
        }
    }

    // ── Nodes ───────────────────────────────────────────────────

    /// Add a node, adopting its children.
    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.graph.nodes.len() as u32);
        let position = self.graph.nodes.len() * 2;
        let mut span = Span::new(position, position + 1);
        for child in kind.children() {
            match self.graph.nodes.get_mut(child.0 as usize) {
                Some(node) => {
                    if let Some(first) = node.parent {
                        self.errors.push(BuildError::SharedChild { child, first, second: id });
                    } else {
                        node.parent = Some(id);
                    }
                    span = span.to(node.span);
                }
                None => self.errors.push(BuildError::MissingChild { parent: id, child }),
            }
        }
        if let Some(symbol) = kind.declared_symbol() {
            if let Some(sym) = self.graph.symbols.get_mut(symbol) {
                sym.declarations.push(id);
            }
        }
        self.graph.nodes.push(Node { id, kind, span, parent: None });
        id
    }

    /// Record the static type of an expression, overriding the derived one.
    pub fn set_type(&mut self, node: NodeId, ty: TypeId) {
        self.graph.node_types.insert(node, ty);
    }

    pub fn resolve_to(&mut self, node: NodeId, resolution: Resolution) {
        self.graph.resolutions.insert(node, resolution);
    }

    // Literals and names

    pub fn literal(&mut self, value: Literal) -> NodeId {
        self.add(NodeKind::Literal(value))
    }

    pub fn null(&mut self) -> NodeId {
        self.literal(Literal::Null)
    }

    pub fn bool_lit(&mut self, value: bool) -> NodeId {
        self.literal(Literal::Bool(value))
    }

    pub fn str_lit(&mut self, value: &str) -> NodeId {
        self.literal(Literal::Str(value.to_string()))
    }

    /// Identifier bound to `symbol`.
    pub fn ident(&mut self, symbol: SymbolId) -> NodeId {
        let name = self.symbol(symbol).map(|s| s.name.clone()).unwrap_or_default();
        let id = self.add(NodeKind::Identifier { name });
        self.resolve_to(id, Resolution::Single(symbol));
        id
    }

    /// Identifier with an explicit resolution (unresolved or ambiguous).
    pub fn ident_with(&mut self, name: &str, resolution: Resolution) -> NodeId {
        let id = self.add(NodeKind::Identifier { name: name.to_string() });
        self.resolve_to(id, resolution);
        id
    }

    pub fn this(&mut self) -> NodeId {
        self.add(NodeKind::This)
    }

    pub fn base(&mut self) -> NodeId {
        self.add(NodeKind::Base)
    }

    fn access(&mut self, receiver: NodeId, symbol: SymbolId, conditional: bool) -> NodeId {
        let name = self.symbol(symbol).map(|s| s.name.clone()).unwrap_or_default();
        let id = self.add(NodeKind::MemberAccess { receiver, name, conditional });
        self.resolve_to(id, Resolution::Single(symbol));
        id
    }

    /// `receiver.member`
    pub fn member(&mut self, receiver: NodeId, symbol: SymbolId) -> NodeId {
        self.access(receiver, symbol, false)
    }

    /// `receiver?.member`
    pub fn member_conditional(&mut self, receiver: NodeId, symbol: SymbolId) -> NodeId {
        self.access(receiver, symbol, true)
    }

    /// `this.member`
    pub fn this_member(&mut self, symbol: SymbolId) -> NodeId {
        let this = self.this();
        self.member(this, symbol)
    }

    // Calls

    fn as_argument(&mut self, expr: NodeId) -> NodeId {
        match self.graph.node(expr).map(|n| &n.kind) {
            Some(NodeKind::Argument { .. }) => expr,
            _ => self.argument(expr),
        }
    }

    pub fn argument(&mut self, expr: NodeId) -> NodeId {
        self.add(NodeKind::Argument { name: None, ref_kind: RefKind::None, expr })
    }

    pub fn named_arg(&mut self, name: &str, expr: NodeId) -> NodeId {
        self.add(NodeKind::Argument {
            name: Some(name.to_string()),
            ref_kind: RefKind::None,
            expr,
        })
    }

    pub fn ref_arg(&mut self, ref_kind: RefKind, expr: NodeId) -> NodeId {
        self.add(NodeKind::Argument { name: None, ref_kind, expr })
    }

    /// Invocation of `callee`; resolves like the callee does. Plain expressions
    /// in `args` become positional arguments.
    pub fn call(&mut self, callee: NodeId, args: Vec<NodeId>) -> NodeId {
        let args = args.into_iter().map(|a| self.as_argument(a)).collect();
        let resolution = self.graph.resolve(callee);
        let id = self.add(NodeKind::Invocation { callee, args });
        self.resolve_to(id, resolution);
        id
    }

    /// `receiver.method(args)`
    pub fn call_member(&mut self, receiver: NodeId, method: SymbolId, args: Vec<NodeId>) -> NodeId {
        let callee = self.member(receiver, method);
        self.call(callee, args)
    }

    /// `receiver?.method(args)`
    pub fn call_conditional(&mut self, receiver: NodeId, method: SymbolId, args: Vec<NodeId>) -> NodeId {
        let callee = self.member_conditional(receiver, method);
        self.call(callee, args)
    }

    /// `method(args)` with an implicit receiver.
    pub fn call_named(&mut self, method: SymbolId, args: Vec<NodeId>) -> NodeId {
        let callee = self.ident(method);
        self.call(callee, args)
    }

    /// `new T(args)`
    pub fn new_object(&mut self, ty: TypeId, ctor: Option<SymbolId>, args: Vec<NodeId>) -> NodeId {
        self.new_object_with(ty, ctor, args, Vec::new())
    }

    /// `new T(args) { items }`
    pub fn new_object_with(
        &mut self,
        ty: TypeId,
        ctor: Option<SymbolId>,
        args: Vec<NodeId>,
        initializer: Vec<NodeId>,
    ) -> NodeId {
        let args = args.into_iter().map(|a| self.as_argument(a)).collect();
        let id = self.add(NodeKind::ObjectCreation { ty, args, initializer });
        if let Some(ctor) = ctor {
            self.resolve_to(id, Resolution::Single(ctor));
        }
        id
    }

    // Other expressions

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.add(NodeKind::Assignment { target, value })
    }

    pub fn discard(&mut self) -> NodeId {
        self.add(NodeKind::Discard)
    }

    pub fn await_expr(&mut self, expr: NodeId) -> NodeId {
        self.add(NodeKind::Await { expr })
    }

    pub fn cast(&mut self, expr: NodeId, ty: TypeId) -> NodeId {
        self.add(NodeKind::Cast { expr, ty })
    }

    pub fn conditional(&mut self, condition: NodeId, when_true: NodeId, when_false: NodeId) -> NodeId {
        self.add(NodeKind::Conditional { condition, when_true, when_false })
    }

    pub fn coalesce(&mut self, value: NodeId, fallback: NodeId) -> NodeId {
        self.add(NodeKind::Coalesce { value, fallback })
    }

    pub fn not(&mut self, operand: NodeId) -> NodeId {
        self.add(NodeKind::Unary { op: UnaryOp::Not, operand })
    }

    pub fn lambda(&mut self, params: &[SymbolId], body: NodeId) -> NodeId {
        let params = params
            .iter()
            .map(|&symbol| self.add(NodeKind::Parameter { symbol, default: None }))
            .collect();
        self.add(NodeKind::Lambda { params, body })
    }

    // Statements

    pub fn expr_stmt(&mut self, expr: NodeId) -> NodeId {
        self.add(NodeKind::ExprStmt { expr })
    }

    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        self.add(NodeKind::Return { value })
    }

    pub fn local_decl(&mut self, symbol: SymbolId, initializer: Option<NodeId>) -> NodeId {
        self.add(NodeKind::LocalDecl { symbol, initializer, is_using: false })
    }

    /// `using var x = init;`
    pub fn using_local(&mut self, symbol: SymbolId, initializer: NodeId) -> NodeId {
        self.add(NodeKind::LocalDecl {
            symbol,
            initializer: Some(initializer),
            is_using: true,
        })
    }

    /// `using (resource) { body }`
    pub fn using_stmt(&mut self, resource: NodeId, body: NodeId) -> NodeId {
        self.add(NodeKind::Using { resource, body })
    }

    pub fn block(&mut self, statements: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::Block { statements })
    }

    pub fn if_stmt(&mut self, condition: NodeId, then_branch: NodeId, else_branch: Option<NodeId>) -> NodeId {
        self.add(NodeKind::If { condition, then_branch, else_branch })
    }

    pub fn loop_stmt(&mut self, header: Option<NodeId>, body: NodeId) -> NodeId {
        self.add(NodeKind::Loop { header, body })
    }

    // Declarations

    fn param_nodes(&mut self, method: SymbolId) -> Vec<NodeId> {
        let params: Vec<SymbolId> = self
            .symbol(method)
            .map(|s| s.params().to_vec())
            .unwrap_or_default();
        params
            .into_iter()
            .map(|symbol| {
                let default = self
                    .symbol(symbol)
                    .and_then(|s| s.default_value().cloned())
                    .map(|lit| self.literal(lit));
                self.add(NodeKind::Parameter { symbol, default })
            })
            .collect()
    }

    /// Declaration with a body: a block, or an expression for arrow bodies.
    pub fn method_decl(&mut self, method: SymbolId, body: NodeId) -> NodeId {
        let params = self.param_nodes(method);
        self.add(NodeKind::MethodDecl { symbol: method, params, body: Some(body) })
    }

    /// Abstract or interface declaration without a body.
    pub fn abstract_decl(&mut self, method: SymbolId) -> NodeId {
        let params = self.param_nodes(method);
        self.add(NodeKind::MethodDecl { symbol: method, params, body: None })
    }

    pub fn property_decl(&mut self, property: SymbolId, getter: Option<NodeId>, setter: Option<NodeId>) -> NodeId {
        self.add(NodeKind::PropertyDecl {
            symbol: property,
            getter,
            setter,
            initializer: None,
        })
    }

    /// `public T P { get; } = initializer;`
    pub fn auto_property(&mut self, property: SymbolId, initializer: Option<NodeId>) -> NodeId {
        self.add(NodeKind::PropertyDecl {
            symbol: property,
            getter: None,
            setter: None,
            initializer,
        })
    }

    pub fn field_decl(&mut self, field: SymbolId, initializer: Option<NodeId>) -> NodeId {
        self.add(NodeKind::FieldDecl { symbol: field, initializer })
    }

    pub fn type_decl(&mut self, ty: TypeId, members: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::TypeDecl { ty, members })
    }
}

impl SyntaxGraph {
    /// Fill in the owning method and type of locals and lambda parameters.
    fn assign_local_owners(&mut self) {
        let mut owners: HashMap<SymbolId, (Option<SymbolId>, Option<TypeId>)> = HashMap::new();
        for node in &self.nodes {
            let symbol = match node.kind {
                NodeKind::LocalDecl { symbol, .. } => symbol,
                NodeKind::Parameter { symbol, .. } => symbol,
                _ => continue,
            };
            if self.symbols.get(symbol).is_some_and(|s| s.containing_symbol.is_some()) {
                continue;
            }
            let owner = self
                .first_ancestor(node.id, |k| {
                    matches!(k, NodeKind::MethodDecl { .. } | NodeKind::PropertyDecl { .. })
                })
                .and_then(|decl| self.kind(decl)?.declared_symbol());
            let ty = owner.and_then(|o| self.symbols.get(o)?.containing_type);
            owners.insert(symbol, (owner, ty));
        }
        for (symbol, (owner, ty)) in owners {
            if let Some(sym) = self.symbols.get_mut(symbol) {
                sym.containing_symbol = owner;
                sym.containing_type = ty;
            }
        }
    }
}
