//! The API pass: a handler trait and a route registration function per service.

use std::collections::HashSet;

use prost_types::{MethodDescriptorProto, ServiceDescriptorProto};

use crate::{
    annotations::Route,
    case::{is_keyword, to_pascal_case, to_snake_case},
    descriptor::{Object, FILE_SERVICE, SERVICE_METHOD},
    directive::{Binding, Directives},
    error::{Error, ErrorKind},
};

use super::{string_literal, FileContext, Printer};

const EMPTY: &str = ".google.protobuf.Empty";

/// Everything needed to print one route.
#[derive(Debug)]
struct Method {
    name: String,
    input: String,
    output: String,
    /// Whether the input message has any fields to bind.
    bind: bool,
    verb: &'static str,
    path: String,
    directives: Directives,
    wraps_response: bool,
    comment: Option<String>,
}

/// Generates the API file, returning its source and the names of the services it registers.
pub(super) fn generate(ctx: &mut FileContext<'_, '_>) -> Result<(String, Vec<String>), Error> {
    let graph = ctx.graph();
    let file = graph.file(ctx.file);

    let mut body = Printer::default();
    let mut services = Vec::with_capacity(file.proto.service.len());
    for (index, service) in file.proto.service.iter().enumerate() {
        let path = format!("{},{}", FILE_SERVICE, index);
        let methods = service_methods(ctx, service, &path)?;
        print_handler_trait(ctx, &mut body, service, &path, &methods);
        print_register_fn(ctx, &mut body, service, &methods);
        services.push(to_pascal_case(service.name()));
    }

    let mut printer = Printer::default();
    ctx.print_header(&mut printer);
    if !services.is_empty() {
        let router = ctx.router_path();
        printer.line(format!("use {};", router));
        if ctx.imports.binding {
            printer.line(format!("use {}::binding;", router));
        }
    }
    if ctx.imports.handlers {
        printer.line("use std::future::Future;");
        printer.line("use std::sync::Arc;");
    }
    ctx.print_package_imports(&mut printer);
    printer.blank();
    printer.append(body);
    Ok((printer.finish(), services))
}

fn service_methods(
    ctx: &mut FileContext<'_, '_>,
    service: &ServiceDescriptorProto,
    service_path: &str,
) -> Result<Vec<Method>, Error> {
    let package = ctx.graph().file(ctx.file).proto.package();
    let mut used = HashSet::new();

    let mut methods = Vec::with_capacity(service.method.len());
    for (index, method) in service.method.iter().enumerate() {
        let full_name = if package.is_empty() {
            format!("{}.{}", service.name(), method.name())
        } else {
            format!("{}.{}.{}", package, service.name(), method.name())
        };

        let rule = ctx.gen.rules.get(&full_name);
        let route = rule.and_then(|rule| rule.route()).ok_or_else(|| {
            Error::from_kind(ErrorKind::HttpMappingNotFound {
                method: full_name.clone(),
            })
        })?;
        let (verb, path) = match route {
            Route::Get(path) => ("Get", path.to_owned()),
            Route::Post(path) => ("Post", path.to_owned()),
        };

        let comment = ctx.comment(&format!("{},{},{}", service_path, SERVICE_METHOD, index));
        let directives = comment.map(Directives::parse).unwrap_or_default();

        let (input, bind) = message_type(ctx, method.input_type())?;
        let (output, _) = message_type(ctx, method.output_type())?;

        methods.push(Method {
            name: method_name(&mut used, method),
            input,
            output,
            bind,
            verb,
            path,
            directives,
            wraps_response: rule.map_or(true, |rule| rule.wraps_response()),
            comment: comment.map(ToOwned::to_owned),
        });
    }
    Ok(methods)
}

/// The Rust type of a method's input or output, and whether it has any fields.
fn message_type(ctx: &mut FileContext<'_, '_>, type_name: &str) -> Result<(String, bool), Error> {
    if type_name == EMPTY {
        return Ok(("router::Empty".to_owned(), false));
    }

    let object = ctx.lookup(type_name)?;
    let has_fields = match object {
        Object::Message(id) => !ctx.graph().message(id).proto.field.is_empty(),
        _ => true,
    };
    Ok((ctx.type_ref(object), has_fields))
}

fn method_name(used: &mut HashSet<String>, method: &MethodDescriptorProto) -> String {
    let mut name = to_snake_case(method.name());
    while is_keyword(&name) || !used.insert(name.clone()) {
        name.push('_');
    }
    name
}

fn print_handler_trait(
    ctx: &mut FileContext<'_, '_>,
    printer: &mut Printer,
    service: &ServiceDescriptorProto,
    service_path: &str,
    methods: &[Method],
) {
    let deprecated = service
        .options
        .as_ref()
        .map_or(false, |options| options.deprecated());
    if !methods.is_empty() {
        ctx.imports.handlers = true;
    }

    printer.comment(ctx.comment(service_path), deprecated);
    printer.line(format!(
        "pub trait {}Handler: Send + Sync + 'static {{",
        to_pascal_case(service.name())
    ));
    printer.indent();
    for method in methods {
        printer.comment(method.comment.as_deref(), false);
        printer.line(format!("fn {}(", method.name));
        printer.indent();
        printer.line("&self,");
        printer.line("ctx: router::Context,");
        printer.line(format!("input: &{},", method.input));
        printer.line(format!("output: &mut {},", method.output));
        printer.outdent();
        printer.line(") -> impl Future<Output = Result<(), router::Error>> + Send;");
    }
    printer.outdent();
    printer.line("}");
    printer.blank();
}

fn print_register_fn(
    ctx: &mut FileContext<'_, '_>,
    printer: &mut Printer,
    service: &ServiceDescriptorProto,
    methods: &[Method],
) {
    let service_name = to_pascal_case(service.name());
    printer.doc(&format!(
        "Registers the routes of `{}` on `g`, dispatching requests to `h`.",
        service_name
    ));

    let register = format!("register_{}_handler", to_snake_case(service.name()));
    if methods.is_empty() {
        printer.line(format!(
            "pub fn {}<H: {}Handler>(_g: &mut router::Engine, _h: H) {{}}",
            register, service_name
        ));
        printer.blank();
        return;
    }

    printer.line(format!(
        "pub fn {}<H: {}Handler>(g: &mut router::Engine, h: H) {{",
        register, service_name
    ));
    printer.indent();
    printer.line("let h = Arc::new(h);");
    for method in methods {
        printer.line("{");
        printer.indent();
        printer.line("let h = Arc::clone(&h);");
        print_route(ctx, printer, method);
        printer.outdent();
        printer.line("}");
    }
    printer.outdent();
    printer.line("}");
    printer.blank();
}

fn print_route(ctx: &mut FileContext<'_, '_>, printer: &mut Printer, method: &Method) {
    let path = string_literal(&method.path);
    let middleware = &method.directives.middleware;

    if middleware.is_empty() {
        printer.line(format!(
            "g.{}({}, move |ctx: router::Context| {{",
            method.verb.to_ascii_lowercase(),
            path
        ));
        printer.indent();
        print_route_body(ctx, printer, method);
        printer.outdent();
        printer.line("});");
        return;
    }

    let names: Vec<String> = middleware.iter().map(|name| string_literal(name)).collect();
    printer.line(format!("match g.middlewares(&[{}]) {{", names.join(", ")));
    printer.indent();

    printer.line("router::Resolved::Chain(chain) => {");
    printer.indent();
    printer.line(format!(
        "g.handle(router::Method::{}, {}, chain, move |ctx: router::Context| {{",
        method.verb, path
    ));
    printer.indent();
    print_route_body(ctx, printer, method);
    printer.outdent();
    printer.line("});");
    printer.outdent();
    printer.line("}");

    printer.line("router::Resolved::Missing(name) => {");
    printer.indent();
    printer.line(format!(
        "g.handle(router::Method::{}, {}, router::Chain::default(), move |ctx: router::Context| {{",
        method.verb, path
    ));
    printer.indent();
    printer.line("let err = router::Error::missing_middleware(&name);");
    printer.line(format!(
        "async move {{ router::error(&ctx, {}, err) }}",
        ctx.gen.config.error_code
    ));
    printer.outdent();
    printer.line("});");
    printer.outdent();
    printer.line("}");

    printer.outdent();
    printer.line("}");
}

/// Prints the body of a route closure: bind the input, call the handler, write the envelope.
fn print_route_body(ctx: &mut FileContext<'_, '_>, printer: &mut Printer, method: &Method) {
    let code = ctx.gen.config.error_code;

    printer.line("let h = Arc::clone(&h);");
    printer.line("async move {");
    printer.indent();
    let mutable = if method.bind { "mut " } else { "" };
    printer.line(format!("let {}input = {}::default();", mutable, method.input));
    printer.line(format!("let mut output = {}::default();", method.output));

    if method.bind {
        let bind = match (method.verb, method.directives.binding) {
            ("Get", _) => "ctx.bind_query(&mut input)".to_owned(),
            (_, Binding::Json) => {
                ctx.imports.binding = true;
                "ctx.bind_body_with(&mut input, binding::Json).await".to_owned()
            }
            (_, binding) => {
                ctx.imports.binding = true;
                format!(
                    "ctx.bind_with(&mut input, binding::{}).await",
                    binding.type_name()
                )
            }
        };
        if method.directives.bindcheck {
            printer.line(format!("if let Err(err) = {} {{", bind));
            printer.indent();
            printer.line(format!("return router::error(&ctx, {}, err);", code));
            printer.outdent();
            printer.line("}");
        } else {
            printer.line(format!("let _ = {};", bind));
        }
    }

    let call = format!(
        "h.{}(ctx.clone(), &input, &mut output).await",
        method.name
    );
    if method.wraps_response {
        printer.line(format!("if let Err(err) = {} {{", call));
        printer.indent();
        printer.line(format!("return router::error(&ctx, {}, err);", code));
        printer.outdent();
        printer.line("}");
        printer.line("router::json(&ctx, &output)");
    } else {
        printer.line(format!("let _ = {};", call));
        printer.line("ctx.finish()");
    }

    printer.outdent();
    printer.line("}");
}
