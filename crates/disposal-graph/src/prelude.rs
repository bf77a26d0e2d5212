// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Metadata-only declarations of common library types.
//!
//! Front ends that bind against the real base class library do not need
//! this. It gives hosts and tests a small, consistent library surface: the
//! types carry members but no declarations, so their bodies are unavailable
//! to analysis.

use crate::builder::{GraphBuilder, Param};
use crate::symbol::{MethodFlags, SymbolId};
use crate::syntax::Literal;
use crate::types::TypeId;

/// Handles to the declared library surface.
#[derive(Debug, Clone, Copy)]
pub struct Prelude {
    pub object: TypeId,
    pub boolean: TypeId,
    pub int32: TypeId,
    pub string: TypeId,
    pub disposable: TypeId,
    pub stream: TypeId,
    pub file_stream: TypeId,
    pub memory_stream: TypeId,
    pub text_reader: TypeId,
    pub text_writer: TypeId,
    pub stream_reader: TypeId,
    pub stream_writer: TypeId,
    pub file: TypeId,
    pub console: TypeId,
    pub message_handler: TypeId,
    pub client_handler: TypeId,
    pub http_client: TypeId,
    pub composite: TypeId,
    pub serial: TypeId,
    pub single_assignment: TypeId,
    pub task: TypeId,
    /// `Task<T>` definition.
    pub task_of: TypeId,
    /// `List<T>` definition.
    pub list_of: TypeId,

    /// `IDisposable.Dispose()`
    pub dispose: SymbolId,
    /// `File.OpenRead(string)`
    pub open_read: SymbolId,
    pub memory_stream_new: SymbolId,
    /// `StreamReader(Stream stream, Encoding encoding = null,
    /// bool detectEncodingFromByteOrderMarks = true, int bufferSize = -1,
    /// bool leaveOpen = false)`
    pub stream_reader_new: SymbolId,
    /// `StreamWriter(Stream stream, Encoding encoding = null,
    /// int bufferSize = -1, bool leaveOpen = false)`
    pub stream_writer_new: SymbolId,
    /// `StreamReader.BaseStream`
    pub base_stream: SymbolId,
    /// `HttpClient(HttpMessageHandler handler, bool disposeHandler = true)`
    pub http_client_new: SymbolId,
    pub client_handler_new: SymbolId,
    /// `CompositeDisposable(params IDisposable[] disposables)`
    pub composite_new: SymbolId,
    /// `SerialDisposable()`
    pub serial_new: SymbolId,
    /// `SingleAssignmentDisposable()`
    pub single_assignment_new: SymbolId,
    /// `Task.FromResult<T>(T result)`
    pub from_result: SymbolId,
    /// `List<T>.Add(T item)`
    pub list_add: SymbolId,
    /// `Console.Out`
    pub console_out: SymbolId,
    /// `Stream.Null`
    pub stream_null: SymbolId,
}

impl Prelude {
    /// Declare the library surface in `b`.
    pub fn install(b: &mut GraphBuilder) -> Prelude {
        let object = b.class("System.Object");
        let boolean = b.primitive("System.Boolean");
        let int32 = b.primitive("System.Int32");
        let string = b.primitive("System.String");
        let encoding = b.class("System.Text.Encoding");

        let disposable = b.interface("System.IDisposable");
        let dispose = b.method(disposable, "Dispose", vec![], None);
        b.set_flags(dispose, MethodFlags { is_abstract: true, ..MethodFlags::default() });

        let resource_class = |b: &mut GraphBuilder, name: &str, base: TypeId| {
            let ty = b.class(name);
            b.inherit(ty, base);
            b.implement(ty, disposable);
            ty
        };

        let stream = resource_class(b, "System.IO.Stream", object);
        let stream_null = b.readonly_field(stream, "Null", stream);
        let file_stream = resource_class(b, "System.IO.FileStream", stream);
        let memory_stream = resource_class(b, "System.IO.MemoryStream", stream);
        let memory_stream_new = b.constructor(memory_stream, vec![]);

        let text_reader = resource_class(b, "System.IO.TextReader", object);
        let text_writer = resource_class(b, "System.IO.TextWriter", object);
        let stream_reader = resource_class(b, "System.IO.StreamReader", text_reader);
        let stream_reader_new = b.constructor(
            stream_reader,
            vec![
                Param::new("stream", stream),
                Param::new("encoding", encoding).default(Literal::Null),
                Param::new("detectEncodingFromByteOrderMarks", boolean).default(Literal::Bool(true)),
                Param::new("bufferSize", int32).default(Literal::Int(-1)),
                Param::new("leaveOpen", boolean).default(Literal::Bool(false)),
            ],
        );
        let stream_writer = resource_class(b, "System.IO.StreamWriter", text_writer);
        let stream_writer_new = b.constructor(
            stream_writer,
            vec![
                Param::new("stream", stream),
                Param::new("encoding", encoding).default(Literal::Null),
                Param::new("bufferSize", int32).default(Literal::Int(-1)),
                Param::new("leaveOpen", boolean).default(Literal::Bool(false)),
            ],
        );
        let base_stream = b.property(stream_reader, "BaseStream", stream, false);

        let file = b.class("System.IO.File");
        let open_read = b.method(file, "OpenRead", vec![Param::new("path", string)], Some(file_stream));
        b.set_flags(open_read, MethodFlags { is_static: true, ..MethodFlags::default() });

        let console = b.class("System.Console");
        let console_out = b.property(console, "Out", text_writer, false);

        let message_handler = resource_class(b, "System.Net.Http.HttpMessageHandler", object);
        let client_handler = b.class("System.Net.Http.HttpClientHandler");
        b.inherit(client_handler, message_handler);
        let client_handler_new = b.constructor(client_handler, vec![]);
        let http_client = resource_class(b, "System.Net.Http.HttpClient", object);
        let http_client_new = b.constructor(
            http_client,
            vec![
                Param::new("handler", message_handler),
                Param::new("disposeHandler", boolean).default(Literal::Bool(true)),
            ],
        );

        let disposable_array = b.class("System.IDisposable[]");
        let composite = resource_class(b, "System.Reactive.Disposables.CompositeDisposable", object);
        let composite_new = b.constructor(composite, vec![Param::new("disposables", disposable_array).params()]);
        let serial = resource_class(b, "System.Reactive.Disposables.SerialDisposable", object);
        let serial_new = b.constructor(serial, vec![]);
        let single_assignment =
            resource_class(b, "System.Reactive.Disposables.SingleAssignmentDisposable", object);
        let single_assignment_new = b.constructor(single_assignment, vec![]);

        let task = b.class("System.Threading.Tasks.Task");
        b.inherit(task, object);
        let task_of = b.class("System.Threading.Tasks.Task`1");
        b.inherit(task_of, task);
        let result = b.type_param("TResult", &[]);
        let task_of_result = b.construct(task_of, &[result]);
        let from_result = b.method(task, "FromResult", vec![Param::new("result", result)], Some(task_of_result));
        b.set_flags(from_result, MethodFlags { is_static: true, ..MethodFlags::default() });
        b.set_type_params(from_result, vec![result]);

        let list_of = b.class("System.Collections.Generic.List`1");
        b.inherit(list_of, object);
        let item = b.type_param("T", &[]);
        let list_add = b.method(list_of, "Add", vec![Param::new("item", item)], None);

        Prelude {
            object,
            boolean,
            int32,
            string,
            disposable,
            stream,
            file_stream,
            memory_stream,
            text_reader,
            text_writer,
            stream_reader,
            stream_writer,
            file,
            console,
            message_handler,
            client_handler,
            http_client,
            composite,
            serial,
            single_assignment,
            task,
            task_of,
            list_of,
            dispose,
            open_read,
            memory_stream_new,
            stream_reader_new,
            stream_writer_new,
            base_stream,
            http_client_new,
            client_handler_new,
            composite_new,
            serial_new,
            single_assignment_new,
            from_result,
            list_add,
            console_out,
            stream_null,
        }
    }
}
