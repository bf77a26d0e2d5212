// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Engine tests: build small programs and query them through [`Engine`].

use disposal_graph::{
    GraphBuilder, KnownTypes, Literal, MethodFlags, NodeId, Param, Prelude, ProgramGraph, RefKind,
    Resolution, SymbolId, SyntaxGraph, TypeId,
};

use crate::{AnalysisError, CancellationToken, Engine, Escape, Outcome, PatternViolation, RoutineKind};

// ── Program construction helpers ────────────────────────────

struct Fixture {
    b: GraphBuilder,
    p: Prelude,
    widget: TypeId,
}

impl Fixture {
    fn new() -> Self {
        let mut b = GraphBuilder::new();
        let p = Prelude::install(&mut b);
        let widget = b.class("Demo.Widget");
        b.inherit(widget, p.object);
        Self { b, p, widget }
    }

    /// `new MemoryStream()`
    fn memory_stream(&mut self) -> NodeId {
        self.b.new_object(self.p.memory_stream, Some(self.p.memory_stream_new), vec![])
    }

    /// `File.OpenRead("data.bin")`
    fn open_read(&mut self) -> NodeId {
        let path = self.b.str_lit("data.bin");
        self.b.call_named(self.p.open_read, vec![path])
    }

    /// `symbol.Dispose();`
    fn release(&mut self, symbol: SymbolId) -> NodeId {
        let receiver = self.b.ident(symbol);
        let call = self.b.call_member(receiver, self.p.dispose, vec![]);
        self.b.expr_stmt(call)
    }

    /// `symbol?.Dispose();`
    fn release_conditional(&mut self, symbol: SymbolId) -> NodeId {
        let receiver = self.b.ident(symbol);
        let call = self.b.call_conditional(receiver, self.p.dispose, vec![]);
        self.b.expr_stmt(call)
    }

    /// `symbol = value;`, returning the assignment and its statement.
    fn assign(&mut self, symbol: SymbolId, value: NodeId) -> (NodeId, NodeId) {
        let target = self.b.ident(symbol);
        let assign = self.b.assign(target, value);
        let stmt = self.b.expr_stmt(assign);
        (assign, stmt)
    }

    /// `void name() { statements }` on the widget type.
    fn void_method(&mut self, name: &str, statements: Vec<NodeId>) -> NodeId {
        let method = self.b.method(self.widget, name, vec![], None);
        let body = self.b.block(statements);
        self.b.method_decl(method, body)
    }

    fn finish(mut self, members: Vec<NodeId>) -> SyntaxGraph {
        self.b.type_decl(self.widget, members);
        self.b.finish().expect("well-formed graph")
    }
}

fn with_engine<R>(graph: &SyntaxGraph, run: impl FnOnce(&Engine<'_, SyntaxGraph>, &CancellationToken) -> R) -> R {
    let known = KnownTypes::default();
    let cancel = CancellationToken::new();
    let engine = Engine::new(graph, &known);
    run(&engine, &cancel)
}

// ═══════════════════════════════════════════════════════════
// Creation
// ═══════════════════════════════════════════════════════════

#[test]
fn factory_returning_new_instance_is_a_creation() {
    // Stream Make() { return new MemoryStream(); }
    // Stream Empty() { return null; }
    let mut f = Fixture::new();
    let make = f.b.method(f.widget, "Make", vec![], Some(f.p.stream));
    let created = f.memory_stream();
    let ret = f.b.ret(Some(created));
    let body = f.b.block(vec![ret]);
    let make_decl = f.b.method_decl(make, body);

    let empty = f.b.method(f.widget, "Empty", vec![], Some(f.p.stream));
    let null = f.b.null();
    let ret = f.b.ret(Some(null));
    let body = f.b.block(vec![ret]);
    let empty_decl = f.b.method_decl(empty, body);

    let make_call = f.b.call_named(make, vec![]);
    let empty_call = f.b.call_named(empty, vec![]);
    let s1 = f.b.expr_stmt(make_call);
    let s2 = f.b.expr_stmt(empty_call);
    let run = f.void_method("Run", vec![s1, s2]);
    let graph = f.finish(vec![make_decl, empty_decl, run]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.is_creation(created, cancel), Ok(Outcome::Yes));
        assert_eq!(engine.is_creation(make_call, cancel), Ok(Outcome::Yes));
        assert_eq!(engine.is_creation(empty_call, cancel), Ok(Outcome::No));
        assert_eq!(engine.returns_creation(make_decl, cancel), Ok(Outcome::Yes));
        assert_eq!(engine.returns_creation(empty_decl, cancel), Ok(Outcome::No));
        // The returned instance leaves with the return value.
        assert_eq!(engine.escapes_or_is_disposed(created, cancel).map(|e| e.outcome), Ok(Outcome::Yes));
    });
}

#[test]
fn metadata_only_factory_is_assumed() {
    let mut f = Fixture::new();
    let open = f.open_read();
    let stmt = f.b.expr_stmt(open);
    let shared = f.b.ident(f.p.console_out);
    let stmt2 = f.b.expr_stmt(shared);
    let run = f.void_method("Run", vec![stmt, stmt2]);
    let graph = f.finish(vec![run]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.is_creation(open, cancel), Ok(Outcome::AssumeYes));
        assert_eq!(engine.is_creation(shared, cancel), Ok(Outcome::No));
    });
}

#[test]
fn awaited_task_of_resource_is_assumed() {
    // Task<Stream> OpenAsync();  await OpenAsync();
    let mut f = Fixture::new();
    let task_of_stream = f.b.construct(f.p.task_of, &[f.p.stream]);
    let open_async = f.b.method(f.widget, "OpenAsync", vec![], Some(task_of_stream));
    let call = f.b.call_named(open_async, vec![]);
    let awaited = f.b.await_expr(call);
    let stmt = f.b.expr_stmt(awaited);
    let run = f.void_method("Run", vec![stmt]);
    let graph = f.finish(vec![run]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.is_creation(awaited, cancel), Ok(Outcome::AssumeYes));
        // The task itself is not a resource.
        assert_eq!(engine.is_creation(call, cancel), Ok(Outcome::No));
    });
}

#[test]
fn out_argument_written_by_callee_is_a_creation() {
    // bool TryOpen(out Stream s) { s = new MemoryStream(); return true; }
    let mut f = Fixture::new();
    let try_open = f.b.method(
        f.widget,
        "TryOpen",
        vec![Param::new("s", f.p.stream).out()],
        Some(f.p.boolean),
    );
    let s = f.b.param(try_open, 0).expect("parameter");
    let created = f.memory_stream();
    let (written, write_stmt) = f.assign(s, created);
    let yes = f.b.bool_lit(true);
    let ret = f.b.ret(Some(yes));
    let body = f.b.block(vec![write_stmt, ret]);
    let try_decl = f.b.method_decl(try_open, body);

    let local = f.b.local("stream", Some(f.p.stream));
    let decl = f.b.local_decl(local, None);
    let out_target = f.b.ident(local);
    let out_arg = f.b.ref_arg(RefKind::Out, out_target);
    let call = f.b.call_named(try_open, vec![out_arg]);
    let stmt = f.b.expr_stmt(call);
    let run = f.void_method("Run", vec![decl, stmt]);
    let graph = f.finish(vec![try_decl, run]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.is_creation(out_arg, cancel), Ok(Outcome::Yes));
        assert_eq!(engine.should_release(local, out_arg, cancel), Ok(true));
        // Inside the callee the value flows to the caller.
        let escape = engine.escapes_or_is_disposed(created, cancel).unwrap();
        assert_eq!(escape.outcome, Outcome::Yes);
        assert_eq!(escape.owner, Some(written));
        assert_eq!(engine.is_released(s, cancel), Ok(Outcome::Yes));
    });
}

#[test]
fn self_referential_property_terminates() {
    // Stream P => P;  _f = P;  Dispose() { _f.Dispose(); }
    let mut f = Fixture::new();
    let field = f.b.field(f.widget, "_f", f.p.stream);
    let field_decl = f.b.field_decl(field, None);
    let prop = f.b.property(f.widget, "RecursiveProperty", f.p.stream, false);
    let getter = f.b.ident(prop);
    let prop_decl = f.b.property_decl(prop, Some(getter), None);

    let read = f.b.ident(prop);
    let (store, store_stmt) = f.assign(field, read);
    let run = f.void_method("Run", vec![store_stmt]);
    let release = f.release(field);
    let dispose = f.void_method("Dispose", vec![release]);
    let graph = f.finish(vec![field_decl, prop_decl, run, dispose]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.is_creation(read, cancel), Ok(Outcome::AssumeNo));
        assert_eq!(engine.disposed_by_return_value(read, cancel), Ok(Escape::retained()));
        assert_eq!(engine.should_release(field, store, cancel), Ok(false));
        assert_eq!(engine.is_member_released(field, cancel), Ok(Outcome::Yes));
    });
}

#[test]
fn mutually_recursive_callee_terminates_deterministically() {
    // Stream Loop(Stream s) => Loop(s);  Loop(new MemoryStream());
    let mut f = Fixture::new();
    let looped = f.b.method(f.widget, "Loop", vec![Param::new("s", f.p.stream)], Some(f.p.stream));
    let s = f.b.param(looped, 0).expect("parameter");
    let inner = f.b.ident(s);
    let body = f.b.call_named(looped, vec![inner]);
    let loop_decl = f.b.method_decl(looped, body);

    let created = f.memory_stream();
    let call = f.b.call_named(looped, vec![created]);
    let stmt = f.b.expr_stmt(call);
    let run = f.void_method("Run", vec![stmt]);
    let graph = f.finish(vec![loop_decl, run]);

    with_engine(&graph, |engine, cancel| {
        let first = engine.escapes_or_is_disposed(created, cancel);
        let second = engine.escapes_or_is_disposed(created, cancel);
        assert_eq!(first, second);
        // The cycle is cut without inventing evidence either way.
        assert_eq!(first.map(|e| e.outcome), Ok(Outcome::No));
        assert_eq!(engine.is_creation(call, cancel), engine.is_creation(call, cancel));

        let adopted = engine.disposed_by_return_value(created, cancel);
        assert_eq!(adopted, engine.disposed_by_return_value(created, cancel));
        assert_eq!(adopted.map(|e| e.outcome), Ok(Outcome::No));
    });
}

#[test]
fn constrained_generic_factory_is_assumed() {
    // T Create<T>() where T : IDisposable;  U Get<U>();
    let mut f = Fixture::new();
    let t = f.b.type_param("T", &[f.p.disposable]);
    let create = f.b.method(f.widget, "Create", vec![], Some(t));
    f.b.set_type_params(create, vec![t]);
    let u = f.b.type_param("U", &[]);
    let get = f.b.method(f.widget, "Get", vec![], Some(u));
    f.b.set_type_params(get, vec![u]);

    let created = f.b.call_named(create, vec![]);
    let fetched = f.b.call_named(get, vec![]);
    let s1 = f.b.expr_stmt(created);
    let s2 = f.b.expr_stmt(fetched);
    let run = f.void_method("Run", vec![s1, s2]);
    let graph = f.finish(vec![run]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.is_creation(created, cancel), Ok(Outcome::AssumeYes));
        assert_eq!(engine.is_creation(fetched, cancel), Ok(Outcome::No));
    });
}

#[test]
fn ambiguous_call_is_assumed_not_to_create() {
    // Stream Open(); Stream Open(int size);  Open(new MemoryStream()) binds to neither.
    let mut f = Fixture::new();
    let first = f.b.method(f.widget, "Open", vec![], Some(f.p.stream));
    let second = f.b.method(f.widget, "Open", vec![Param::new("size", f.p.int32)], Some(f.p.stream));
    let callee = f.b.ident_with("Open", Resolution::Ambiguous(vec![first, second]));
    let created = f.memory_stream();
    let call = f.b.call(callee, vec![created]);
    let stmt = f.b.expr_stmt(call);
    let run = f.void_method("Run", vec![stmt]);
    let graph = f.finish(vec![run]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.is_creation(call, cancel), Ok(Outcome::AssumeNo));
        assert_eq!(engine.escapes_or_is_disposed(created, cancel), Ok(Escape::new(Outcome::AssumeNo, None)));
        assert_eq!(engine.disposed_by_return_value(created, cancel), Ok(Escape::new(Outcome::AssumeNo, None)));
    });
}

// ═══════════════════════════════════════════════════════════
// Escape
// ═══════════════════════════════════════════════════════════

/// `new StreamReader(new MemoryStream(), ...)` with an optional `leaveOpen`.
fn reader_over_stream(leave_open: Option<bool>) -> (SyntaxGraph, NodeId, NodeId) {
    let mut f = Fixture::new();
    let created = f.memory_stream();
    let mut args = vec![created];
    if let Some(value) = leave_open {
        let flag = f.b.bool_lit(value);
        args.push(f.b.named_arg("leaveOpen", flag));
    }
    let reader = f.b.new_object(f.p.stream_reader, Some(f.p.stream_reader_new), args);
    let stmt = f.b.expr_stmt(reader);
    let run = f.void_method("Run", vec![stmt]);
    (f.finish(vec![run]), created, reader)
}

#[test]
fn leave_open_true_keeps_ownership_with_caller() {
    let (graph, created, _) = reader_over_stream(Some(true));
    with_engine(&graph, |engine, cancel| {
        let escape = engine.escapes_or_is_disposed(created, cancel).unwrap();
        assert_eq!(escape.outcome, Outcome::No);
        assert_eq!(escape.owner, None);
    });
}

#[test]
fn leave_open_false_or_omitted_transfers_to_wrapper() {
    for leave_open in [Some(false), None] {
        let (graph, created, reader) = reader_over_stream(leave_open);
        with_engine(&graph, |engine, cancel| {
            let escape = engine.escapes_or_is_disposed(created, cancel).unwrap();
            assert_eq!(escape.outcome, Outcome::Yes, "leaveOpen = {leave_open:?}");
            assert_eq!(escape.owner, Some(reader));
            let adopted = engine.disposed_by_return_value(created, cancel).unwrap();
            assert_eq!(adopted.owner, Some(reader));
        });
    }
}

#[test]
fn unbound_wrapper_constructor_ignores_the_switch() {
    // new StreamReader(new MemoryStream(), leaveOpen: true) with no single constructor.
    for ambiguous in [false, true] {
        let mut f = Fixture::new();
        let overload = f.b.constructor(f.p.stream_reader, vec![Param::new("size", f.p.int32)]);
        let created = f.memory_stream();
        let flag = f.b.bool_lit(true);
        let switch = f.b.named_arg("leaveOpen", flag);
        let reader = f.b.new_object(f.p.stream_reader, None, vec![created, switch]);
        if ambiguous {
            f.b.resolve_to(reader, Resolution::Ambiguous(vec![f.p.stream_reader_new, overload]));
        }
        let stmt = f.b.expr_stmt(reader);
        let run = f.void_method("Run", vec![stmt]);
        let graph = f.finish(vec![run]);

        with_engine(&graph, |engine, cancel| {
            let unknown = Escape::new(Outcome::AssumeNo, None);
            assert_eq!(engine.escapes_or_is_disposed(created, cancel), Ok(unknown), "ambiguous = {ambiguous}");
            assert_eq!(engine.disposed_by_return_value(created, cancel), Ok(unknown), "ambiguous = {ambiguous}");
        });
    }
}

#[test]
fn callee_returning_a_wrapper_adopts_its_argument() {
    // StreamReader Wrap(Stream s) => new StreamReader(s[, leaveOpen: true]);  Wrap(new MemoryStream());
    for leave_open in [false, true] {
        let mut f = Fixture::new();
        let wrap = f.b.method(f.widget, "Wrap", vec![Param::new("s", f.p.stream)], Some(f.p.stream_reader));
        let s = f.b.param(wrap, 0).expect("parameter");
        let read = f.b.ident(s);
        let mut args = vec![read];
        if leave_open {
            let flag = f.b.bool_lit(true);
            args.push(f.b.named_arg("leaveOpen", flag));
        }
        let reader = f.b.new_object(f.p.stream_reader, Some(f.p.stream_reader_new), args);
        let wrap_decl = f.b.method_decl(wrap, reader);

        let created = f.memory_stream();
        let call = f.b.call_named(wrap, vec![created]);
        let stmt = f.b.expr_stmt(call);
        let run = f.void_method("Run", vec![stmt]);
        let graph = f.finish(vec![wrap_decl, run]);

        with_engine(&graph, |engine, cancel| {
            let adopted = engine.disposed_by_return_value(created, cancel).unwrap();
            let escape = engine.escapes_or_is_disposed(created, cancel).unwrap();
            if leave_open {
                assert_eq!(adopted, Escape::retained());
                assert_eq!(escape.outcome, Outcome::No);
            } else {
                assert_eq!(adopted, Escape::new(Outcome::Yes, Some(call)));
                assert_eq!(escape.outcome, Outcome::Yes);
            }
        });
    }
}

#[test]
fn non_literal_switch_is_assumed() {
    let mut f = Fixture::new();
    let keep = f.b.local("keep", Some(f.p.boolean));
    let no = f.b.bool_lit(false);
    let keep_decl = f.b.local_decl(keep, Some(no));
    let created = f.memory_stream();
    let keep_read = f.b.ident(keep);
    let switch = f.b.named_arg("leaveOpen", keep_read);
    let reader = f.b.new_object(f.p.stream_reader, Some(f.p.stream_reader_new), vec![created, switch]);
    let stmt = f.b.expr_stmt(reader);
    let run = f.void_method("Run", vec![keep_decl, stmt]);
    let graph = f.finish(vec![run]);

    with_engine(&graph, |engine, cancel| {
        let escape = engine.escapes_or_is_disposed(created, cancel).unwrap();
        assert_eq!(escape.outcome, Outcome::AssumeYes);
        assert_eq!(escape.owner, Some(reader));
    });
}

#[test]
fn http_client_switch_retains_when_false() {
    for (dispose_handler, expected) in [(Some(false), Outcome::No), (Some(true), Outcome::Yes), (None, Outcome::Yes)] {
        let mut f = Fixture::new();
        let handler = f.b.new_object(f.p.client_handler, Some(f.p.client_handler_new), vec![]);
        let mut args = vec![handler];
        if let Some(value) = dispose_handler {
            let flag = f.b.bool_lit(value);
            args.push(f.b.named_arg("disposeHandler", flag));
        }
        let client = f.b.new_object(f.p.http_client, Some(f.p.http_client_new), args);
        let stmt = f.b.expr_stmt(client);
        let run = f.void_method("Run", vec![stmt]);
        let graph = f.finish(vec![run]);

        with_engine(&graph, |engine, cancel| {
            let escape = engine.escapes_or_is_disposed(handler, cancel).unwrap();
            assert_eq!(escape.outcome, expected, "disposeHandler = {dispose_handler:?}");
        });
    }
}

#[test]
fn disposing_containers_adopt_items_and_arguments() {
    // new CompositeDisposable(a, b) { c }
    let mut f = Fixture::new();
    let a = f.memory_stream();
    let b = f.memory_stream();
    let c = f.memory_stream();
    let composite = f.b.new_object_with(f.p.composite, Some(f.p.composite_new), vec![a, b], vec![c]);
    let stmt = f.b.expr_stmt(composite);
    let run = f.void_method("Run", vec![stmt]);
    let graph = f.finish(vec![run]);

    with_engine(&graph, |engine, cancel| {
        for item in [a, b, c] {
            let escape = engine.escapes_or_is_disposed(item, cancel).unwrap();
            assert_eq!(escape.outcome, Outcome::Yes);
            assert_eq!(escape.owner, Some(composite));
        }
    });
}

#[test]
fn storing_in_collection_is_assumed() {
    // var list = new List<Stream>(); list.Add(new MemoryStream());
    let mut f = Fixture::new();
    let list_ty = f.b.construct(f.p.list_of, &[f.p.stream]);
    let list = f.b.local("list", Some(list_ty));
    let new_list = f.b.new_object(list_ty, None, vec![]);
    let decl = f.b.local_decl(list, Some(new_list));
    let receiver = f.b.ident(list);
    let created = f.memory_stream();
    let add = f.b.call_member(receiver, f.p.list_add, vec![created]);
    let stmt = f.b.expr_stmt(add);
    let run = f.void_method("Run", vec![decl, stmt]);
    let graph = f.finish(vec![run]);

    with_engine(&graph, |engine, cancel| {
        let escape = engine.escapes_or_is_disposed(created, cancel).unwrap();
        assert_eq!(escape.outcome, Outcome::AssumeYes);
        assert_eq!(escape.owner, Some(add));
    });
}

#[test]
fn passthrough_result_follows_the_call() {
    // Task<Stream> Load() { return Task.FromResult(new MemoryStream()); }
    let mut f = Fixture::new();
    let task_of_stream = f.b.construct(f.p.task_of, &[f.p.stream]);
    let load = f.b.method(f.widget, "Load", vec![], Some(task_of_stream));
    let created = f.memory_stream();
    let wrapped = f.b.call_named(f.p.from_result, vec![created]);
    let ret = f.b.ret(Some(wrapped));
    let body = f.b.block(vec![ret]);
    let load_decl = f.b.method_decl(load, body);
    let graph = f.finish(vec![load_decl]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.escapes_or_is_disposed(created, cancel).map(|e| e.outcome), Ok(Outcome::Yes));
        let adopted = engine.disposed_by_return_value(created, cancel).unwrap();
        assert_eq!(adopted.outcome, Outcome::Yes);
        assert_eq!(adopted.owner, Some(wrapped));
    });
}

#[test]
fn source_wrapper_adopts_through_released_field() {
    // class Holder { Stream _s; Holder(Stream s) { _s = s; } void Dispose() { _s.Dispose(); } }
    let mut f = Fixture::new();
    let holder = f.b.class("Demo.Holder");
    f.b.inherit(holder, f.p.object);
    f.b.implement(holder, f.p.disposable);
    let held = f.b.field(holder, "_s", f.p.stream);
    let held_decl = f.b.field_decl(held, None);
    let ctor = f.b.constructor(holder, vec![Param::new("s", f.p.stream)]);
    let s = f.b.param(ctor, 0).expect("parameter");
    let s_read = f.b.ident(s);
    let (_, store) = f.assign(held, s_read);
    let body = f.b.block(vec![store]);
    let ctor_decl = f.b.method_decl(ctor, body);
    let dispose = f.b.method(holder, "Dispose", vec![], None);
    let release = f.release(held);
    let body = f.b.block(vec![release]);
    let dispose_decl = f.b.method_decl(dispose, body);
    f.b.type_decl(holder, vec![held_decl, ctor_decl, dispose_decl]);

    // Widget: new Holder(new MemoryStream()); Log(new MemoryStream());
    let created = f.memory_stream();
    let wrapper = f.b.new_object(holder, Some(ctor), vec![created]);
    let s1 = f.b.expr_stmt(wrapper);

    let log = f.b.method(f.widget, "Log", vec![Param::new("s", f.p.stream)], None);
    let log_param = f.b.param(log, 0).expect("parameter");
    let release = f.release(log_param);
    let body = f.b.block(vec![release]);
    let log_decl = f.b.method_decl(log, body);
    let logged = f.memory_stream();
    let log_call = f.b.call_named(log, vec![logged]);
    let s2 = f.b.expr_stmt(log_call);

    let run = f.void_method("Run", vec![s1, s2]);
    let graph = f.finish(vec![log_decl, run]);

    with_engine(&graph, |engine, cancel| {
        let escape = engine.escapes_or_is_disposed(created, cancel).unwrap();
        assert_eq!(escape.outcome, Outcome::Yes);
        assert_eq!(escape.owner, Some(wrapper));
        assert_eq!(engine.disposed_by_return_value(created, cancel).unwrap().owner, Some(wrapper));

        // Released by the callee, but not tied to the call's result.
        assert_eq!(engine.escapes_or_is_disposed(logged, cancel).map(|e| e.outcome), Ok(Outcome::Yes));
        assert_eq!(engine.disposed_by_return_value(logged, cancel).map(|e| e.outcome), Ok(Outcome::No));
    });
}

#[test]
fn field_of_own_type_takes_the_instance() {
    let mut f = Fixture::new();
    let field = f.b.field(f.widget, "_stream", f.p.stream);
    let field_decl = f.b.field_decl(field, None);
    let created = f.memory_stream();
    let (store, stmt) = f.assign(field, created);
    let run = f.void_method("Run", vec![stmt]);
    let graph = f.finish(vec![field_decl, run]);

    with_engine(&graph, |engine, cancel| {
        let escape = engine.escapes_or_is_disposed(created, cancel).unwrap();
        assert_eq!(escape.outcome, Outcome::Yes);
        assert_eq!(escape.owner, Some(store));
        assert_eq!(engine.should_release(field, store, cancel), Ok(true));
        // Nothing in the type releases it.
        assert_eq!(engine.is_member_released(field, cancel), Ok(Outcome::No));
    });
}

// ═══════════════════════════════════════════════════════════
// Obligations
// ═══════════════════════════════════════════════════════════

#[test]
fn straight_line_create_then_release() {
    // Stream stream; stream = File.OpenRead(..); stream.Dispose();
    let mut f = Fixture::new();
    let stream = f.b.local("stream", Some(f.p.stream));
    let decl = f.b.local_decl(stream, None);
    let open = f.open_read();
    let (assign, stmt) = f.assign(stream, open);
    let release = f.release(stream);
    let run = f.void_method("Run", vec![decl, stmt, release]);
    let graph = f.finish(vec![run]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.should_release(stream, assign, cancel), Ok(true));
        assert_eq!(engine.is_released(stream, cancel), Ok(Outcome::Yes));
        // Same answer on a second run.
        assert_eq!(engine.is_released(stream, cancel), Ok(Outcome::Yes));
    });
}

#[test]
fn unreleased_local_is_not_released() {
    let mut f = Fixture::new();
    let stream = f.b.local("stream", Some(f.p.stream));
    let created = f.memory_stream();
    let decl = f.b.local_decl(stream, Some(created));
    let run = f.void_method("Run", vec![decl]);
    let graph = f.finish(vec![run]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.should_release(stream, decl, cancel), Ok(true));
        assert_eq!(engine.is_released(stream, cancel), Ok(Outcome::No));
    });
}

#[test]
fn scoped_and_parameter_bindings_carry_no_obligation() {
    // using var scoped = new MemoryStream();  void Run(Stream p) { p = new MemoryStream(); }
    let mut f = Fixture::new();
    let run = f.b.method(f.widget, "Run", vec![Param::new("p", f.p.stream)], None);
    let p = f.b.param(run, 0).expect("parameter");
    let scoped = f.b.local("scoped", Some(f.p.stream));
    let created = f.memory_stream();
    let using = f.b.using_local(scoped, created);
    let value = f.memory_stream();
    let (overwrite, stmt) = f.assign(p, value);
    let body = f.b.block(vec![using, stmt]);
    let run_decl = f.b.method_decl(run, body);
    let graph = f.finish(vec![run_decl]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.should_release(scoped, using, cancel), Ok(false));
        assert_eq!(engine.escapes_or_is_disposed(created, cancel).map(|e| e.outcome), Ok(Outcome::Yes));
        assert_eq!(engine.should_release(p, overwrite, cancel), Ok(false));
    });
}

/// `stream = null; loop { [stream?.Dispose();] stream = File.OpenRead(..); } stream?.Dispose();`
fn loop_reassignment(release_first: bool) -> (SyntaxGraph, SymbolId) {
    let mut f = Fixture::new();
    let stream = f.b.local("stream", Some(f.p.stream));
    let null = f.b.null();
    let decl = f.b.local_decl(stream, Some(null));
    let mut body = Vec::new();
    if release_first {
        body.push(f.release_conditional(stream));
    }
    let open = f.open_read();
    let (_, stmt) = f.assign(stream, open);
    body.push(stmt);
    let body = f.b.block(body);
    let lp = f.b.loop_stmt(None, body);
    let after = f.release_conditional(stream);
    let run = f.void_method("Run", vec![decl, lp, after]);
    (f.finish(vec![run]), stream)
}

#[test]
fn loop_overwrite_without_release_leaks() {
    let (graph, stream) = loop_reassignment(false);
    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.is_released(stream, cancel), Ok(Outcome::No));
    });
}

#[test]
fn loop_release_before_overwrite_is_released() {
    let (graph, stream) = loop_reassignment(true);
    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.is_released(stream, cancel), Ok(Outcome::Yes));
    });
}

#[test]
fn sequential_overwrite_before_release_leaks() {
    // var s = new MemoryStream(); [s.Dispose();] s = new MemoryStream(); s.Dispose();
    for release_between in [false, true] {
        let mut f = Fixture::new();
        let s = f.b.local("s", Some(f.p.stream));
        let first = f.memory_stream();
        let decl = f.b.local_decl(s, Some(first));
        let mut statements = vec![decl];
        if release_between {
            statements.push(f.release(s));
        }
        let second = f.memory_stream();
        let (_, stmt) = f.assign(s, second);
        statements.push(stmt);
        statements.push(f.release(s));
        let run = f.void_method("Run", statements);
        let graph = f.finish(vec![run]);

        let expected = if release_between { Outcome::Yes } else { Outcome::No };
        with_engine(&graph, |engine, cancel| {
            assert_eq!(engine.is_released(s, cancel), Ok(expected), "release between = {release_between}");
        });
    }
}

#[test]
fn returned_local_is_released_to_caller() {
    // Stream Make() { var s = new MemoryStream(); return s; }
    let mut f = Fixture::new();
    let make = f.b.method(f.widget, "Make", vec![], Some(f.p.stream));
    let s = f.b.local("s", Some(f.p.stream));
    let created = f.memory_stream();
    let decl = f.b.local_decl(s, Some(created));
    let read = f.b.ident(s);
    let ret = f.b.ret(Some(read));
    let body = f.b.block(vec![decl, ret]);
    let make_decl = f.b.method_decl(make, body);
    let call = f.b.call_named(make, vec![]);
    let stmt = f.b.expr_stmt(call);
    let run = f.void_method("Run", vec![stmt]);
    let graph = f.finish(vec![make_decl, run]);

    with_engine(&graph, |engine, cancel| {
        assert_eq!(engine.is_released(s, cancel), Ok(Outcome::Yes));
        assert_eq!(engine.is_creation(call, cancel), Ok(Outcome::Yes));
    });
}

#[test]
fn returning_a_released_local() {
    // Stream A() { var s = new MemoryStream(); s.Dispose(); return s; }
    // Stream B() { var s = new MemoryStream(); s.Dispose(); s = new MemoryStream(); return s; }
    // Stream C() { using (var s = new MemoryStream()) { return s; } }
    // Stream D() { var s = new MemoryStream(); return s; }
    let mut f = Fixture::new();
    let mut returns = Vec::new();
    let mut members = Vec::new();
    for name in ["A", "B", "C", "D"] {
        let method = f.b.method(f.widget, name, vec![], Some(f.p.stream));
        let s = f.b.local("s", Some(f.p.stream));
        let created = f.memory_stream();
        let decl = f.b.local_decl(s, Some(created));
        let read = f.b.ident(s);
        let ret = f.b.ret(Some(read));
        let statements = match name {
            "A" => vec![decl, f.release(s), ret],
            "B" => {
                let release = f.release(s);
                let fresh = f.memory_stream();
                let (_, reassign) = f.assign(s, fresh);
                vec![decl, release, reassign, ret]
            }
            "C" => {
                let body = f.b.block(vec![ret]);
                vec![f.b.using_stmt(decl, body)]
            }
            _ => vec![decl, ret],
        };
        let body = f.b.block(statements);
        members.push(f.b.method_decl(method, body));
        returns.push(ret);
    }
    let graph = f.finish(members);

    with_engine(&graph, |engine, cancel| {
        let verdicts: Vec<Outcome> = returns
            .iter()
            .map(|&ret| engine.returns_released(ret, cancel).unwrap())
            .collect();
        assert_eq!(verdicts, vec![Outcome::Yes, Outcome::No, Outcome::Yes, Outcome::No]);
    });
}

#[test]
fn cancelled_query_reports_cancellation() {
    let mut f = Fixture::new();
    let created = f.memory_stream();
    let stmt = f.b.expr_stmt(created);
    let run = f.void_method("Run", vec![stmt]);
    let graph = f.finish(vec![run]);

    let known = KnownTypes::default();
    let engine = Engine::new(&graph, &known);
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert_eq!(engine.is_creation(created, &cancel), Err(AnalysisError::Cancelled));
    assert_eq!(engine.escapes_or_is_disposed(created, &cancel), Err(AnalysisError::Cancelled));
}

#[test]
fn missing_capability_classifies_nothing() {
    let mut b = GraphBuilder::new();
    let ty = b.class("Demo.Plain");
    let created = b.new_object(ty, None, vec![]);
    let graph = b.finish().expect("well-formed graph");

    with_engine(&graph, |engine, cancel| {
        assert!(!engine.is_resource_type(ty));
        assert_eq!(engine.is_creation(created, cancel), Ok(Outcome::No));
    });
}

// ═══════════════════════════════════════════════════════════
// Release routines
// ═══════════════════════════════════════════════════════════

struct Routine {
    graph: SyntaxGraph,
    owner: TypeId,
    derived: TypeId,
    stream: SymbolId,
    extra: SymbolId,
}

/// A two-phase owner type and a subtype overriding its core:
///
/// ```text
/// class Owner : IDisposable {
///     bool _disposed; Stream _stream;
///     public void Dispose() { Dispose(true); }
///     protected virtual void Dispose(bool disposing) {
///         if (_disposed) return;            // when `guarded`
///         _disposed = true;                 // after the release when `!flag_first`
///         if (disposing) { _stream.Dispose(); }
///     }
/// }
/// class Derived : Owner {
///     bool _released; Stream _extra;
///     protected override void Dispose(bool disposing) {
///         if (_released) return;
///         _released = true;                 // after the release when `!flag_first`
///         _extra.Dispose();
///         base.Dispose(disposing);          // when `base_call`
///     }
/// }
/// ```
fn two_phase(guarded: bool, base_call: bool, flag_first: bool) -> Routine {
    let mut f = Fixture::new();
    let p = f.p;

    let owner = f.b.class("Demo.Owner");
    f.b.inherit(owner, p.object);
    f.b.implement(owner, p.disposable);
    let disposed = f.b.field(owner, "_disposed", p.boolean);
    let stream = f.b.field(owner, "_stream", p.stream);
    let entry = f.b.method(owner, "Dispose", vec![], None);
    let core = f.b.method(owner, "Dispose", vec![Param::new("disposing", p.boolean)], None);
    f.b.set_flags(core, MethodFlags { is_virtual: true, ..MethodFlags::default() });

    let disposed_decl = f.b.field_decl(disposed, None);
    let stream_decl = f.b.field_decl(stream, None);
    let yes = f.b.bool_lit(true);
    let delegate = f.b.call_named(core, vec![yes]);
    let delegate = f.b.expr_stmt(delegate);
    let body = f.b.block(vec![delegate]);
    let entry_decl = f.b.method_decl(entry, body);

    let mut statements = Vec::new();
    if guarded {
        let flag = f.b.ident(disposed);
        let ret = f.b.ret(None);
        statements.push(f.b.if_stmt(flag, ret, None));
    }
    let disposing = f.b.param(core, 0).expect("parameter");
    let cond = f.b.ident(disposing);
    let release = f.release(stream);
    let then = f.b.block(vec![release]);
    let release = f.b.if_stmt(cond, then, None);
    let yes = f.b.bool_lit(true);
    let (_, set) = f.assign(disposed, yes);
    if flag_first {
        statements.extend([set, release]);
    } else {
        statements.extend([release, set]);
    }
    let body = f.b.block(statements);
    let core_decl = f.b.method_decl(core, body);
    f.b.type_decl(owner, vec![disposed_decl, stream_decl, entry_decl, core_decl]);

    let derived = f.b.class("Demo.Derived");
    f.b.inherit(derived, owner);
    let released = f.b.field(derived, "_released", p.boolean);
    let extra = f.b.field(derived, "_extra", p.stream);
    let over = f.b.method(derived, "Dispose", vec![Param::new("disposing", p.boolean)], None);
    f.b.set_flags(over, MethodFlags { is_override: true, ..MethodFlags::default() });
    let released_decl = f.b.field_decl(released, None);
    let extra_decl = f.b.field_decl(extra, None);

    let flag = f.b.ident(released);
    let ret = f.b.ret(None);
    let mut statements = vec![f.b.if_stmt(flag, ret, None)];
    let release = f.release(extra);
    let yes = f.b.bool_lit(true);
    let (_, set) = f.assign(released, yes);
    if flag_first {
        statements.extend([set, release]);
    } else {
        statements.extend([release, set]);
    }
    if base_call {
        let base = f.b.base();
        let disposing = f.b.param(over, 0).expect("parameter");
        let arg = f.b.ident(disposing);
        let call = f.b.call_member(base, core, vec![arg]);
        statements.push(f.b.expr_stmt(call));
    }
    let body = f.b.block(statements);
    let over_decl = f.b.method_decl(over, body);
    f.b.type_decl(derived, vec![released_decl, extra_decl, over_decl]);

    Routine { graph: f.finish(vec![]), owner, derived, stream, extra }
}

#[test]
fn conforming_two_phase_routine() {
    let r = two_phase(true, true, true);
    with_engine(&r.graph, |engine, cancel| {
        let routine = engine.release_routine(r.owner, cancel).unwrap();
        assert_eq!(routine.kind, RoutineKind::TwoPhase);
        assert!(routine.entry.is_some() && routine.core.is_some());
        assert!(routine.is_conforming(), "{:?}", routine.violations);
        assert_eq!(engine.is_member_released(r.stream, cancel), Ok(Outcome::Yes));

        let derived = engine.release_routine(r.derived, cancel).unwrap();
        assert!(derived.is_conforming(), "{:?}", derived.violations);
        assert_eq!(engine.is_member_released(r.extra, cancel), Ok(Outcome::Yes));
    });
}

#[test]
fn unguarded_routine_releases_only_by_assumption() {
    let r = two_phase(false, true, true);
    with_engine(&r.graph, |engine, cancel| {
        let routine = engine.release_routine(r.owner, cancel).unwrap();
        assert_eq!(
            routine.violations,
            vec![PatternViolation::ReleaseBeforeGuard, PatternViolation::MissingIdempotencyGuard]
        );
        assert_eq!(engine.is_member_released(r.stream, cancel), Ok(Outcome::AssumeYes));
    });
}

#[test]
fn flag_set_after_release_breaks_the_pattern() {
    let r = two_phase(true, true, false);
    with_engine(&r.graph, |engine, cancel| {
        for (ty, member) in [(r.owner, r.stream), (r.derived, r.extra)] {
            let routine = engine.release_routine(ty, cancel).unwrap();
            assert_eq!(routine.kind, RoutineKind::TwoPhase);
            assert_eq!(routine.violations, vec![PatternViolation::ReleaseBeforeFlagSet]);
            assert!(!routine.is_conforming());
            assert_eq!(engine.is_member_released(member, cancel), Ok(Outcome::AssumeYes));
        }
    });
}

#[test]
fn overriding_core_must_call_base() {
    let r = two_phase(true, false, true);
    with_engine(&r.graph, |engine, cancel| {
        let routine = engine.release_routine(r.derived, cancel).unwrap();
        assert_eq!(routine.kind, RoutineKind::TwoPhase);
        assert_eq!(routine.entry, None);
        assert_eq!(routine.violations, vec![PatternViolation::MissingBaseCall]);
        assert_eq!(engine.is_member_released(r.extra, cancel), Ok(Outcome::AssumeYes));
    });
}

#[test]
fn type_without_release_method_has_no_routine() {
    let mut f = Fixture::new();
    let widget = f.widget;
    let default_arg = f.b.method(widget, "Configure", vec![Param::new("size", f.p.int32).default(Literal::Int(4))], None);
    let body = f.b.block(vec![]);
    let decl = f.b.method_decl(default_arg, body);
    let graph = f.finish(vec![decl]);

    with_engine(&graph, |engine, cancel| {
        let routine = engine.release_routine(widget, cancel).unwrap();
        assert_eq!(routine.kind, RoutineKind::None);
        assert!(!routine.is_conforming());
        assert!(graph.lookup_type("Demo.Widget").is_some());
    });
}
