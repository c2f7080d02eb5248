//! A `protoc` plugin generating serde data models and HTTP route bindings.
//!
//! For each `.proto` file selected for generation, two Rust modules are produced:
//!
//! * `<base>_model.rs` declares a serde struct per message, a newtype per enum with one
//!   constant per value, and re-exports of symbols reached through `import public`.
//! * `<base>_api.rs` declares a `<Service>Handler` trait per service and a
//!   `register_<service>_handler` function that wires each method to the route declared by its
//!   `google.api.http` option.
//!
//! The generated API code targets a `router` module in the consuming crate, located through the
//! `repo` parameter. Route behaviour can be adjusted with `@tag` directives in method comments:
//!
//! ```text
//! service UserService {
//!   // Creates a profile.
//!   // @tag middleware:auth,quota binding:form bindcheck:false
//!   rpc CreateProfile(Profile) returns (google.protobuf.Empty) {
//!     option (google.api.http) = { post: "/v1/profile" };
//!   }
//! }
//! ```
//!
//! The executable reads a `CodeGeneratorRequest` from stdin and writes the response to stdout.
//! Library users can call [`generate()`] directly:
//!
//! ```no_run
//! # fn main() -> Result<(), protoc_gen_rain::Error> {
//! use protoc_gen_rain::{generate, Config};
//!
//! let request: Vec<u8> = std::fs::read("request.bin").unwrap();
//! let response = generate(&request, &Config::default())?;
//! for file in response.file {
//!     println!("{}", file.name());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Error messages
//!
//! Errors implement [`miette::Diagnostic`]. When the generated code cannot be parsed, the
//! diagnostic help contains a numbered listing of the offending source.
#![warn(missing_debug_implementations, missing_docs)]
#![deny(unsafe_code)]

mod annotations;
mod case;
mod config;
mod descriptor;
mod directive;
mod error;
mod export;
mod format;
mod generate;
mod manifest;
mod resolve;

use prost::Message;
use prost_types::compiler::{code_generator_response, CodeGeneratorRequest, CodeGeneratorResponse};

pub use self::config::{Config, Parameters, PathsMode, ERROR_CODE_VAR};
pub use self::error::Error;

use self::{
    annotations::HttpRules,
    descriptor::DescriptorGraph,
    error::ErrorKind,
    export::export_public_imports,
    generate::Generator,
    resolve::{allocate_constant_names, resolve_packages, NameIndex},
};

/// Generates the model and API files for an encoded `CodeGeneratorRequest`.
///
/// The request's `parameter` field is ignored; parameters are taken from `config`. Use
/// [`Config::from_env`] to build the configuration the way the executable does.
///
/// On success, the entries for the generated services are merged into the `handler.json`
/// manifest in [`Parameters::manifest_dir`]. Nothing is written if generation fails.
pub fn generate(request: &[u8], config: &Config) -> Result<CodeGeneratorResponse, Error> {
    let CodeGeneratorRequest {
        file_to_generate,
        proto_file,
        ..
    } = decode_request(request)?;
    tracing::info!(
        files = proto_file.len(),
        generate = file_to_generate.len(),
        "received code generator request"
    );

    let mut graph = DescriptorGraph::wrap(proto_file, &file_to_generate)?;
    resolve_packages(&mut graph, &config.params)?;
    allocate_constant_names(&mut graph);
    let index = NameIndex::build(&graph)?;
    tracing::debug!(types = index.len(), "indexed types");
    export_public_imports(&mut graph)?;
    let rules = HttpRules::from_request(request)?;

    let mut generator = Generator::new(&graph, &index, &rules, config);
    let files = generator.generate_all()?;
    generator.into_manifest().write(&config.params.manifest_dir)?;

    Ok(CodeGeneratorResponse {
        supported_features: Some(code_generator_response::Feature::Proto3Optional as u64),
        file: files
            .into_iter()
            .map(|file| code_generator_response::File {
                name: Some(file.name),
                content: Some(file.content),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    })
}

/// Reads the parameter string from an encoded `CodeGeneratorRequest`.
pub fn request_parameter(request: &[u8]) -> Result<String, Error> {
    Ok(decode_request(request)?.parameter.unwrap_or_default())
}

fn decode_request(request: &[u8]) -> Result<CodeGeneratorRequest, Error> {
    CodeGeneratorRequest::decode(request)
        .map_err(|err| Error::from_kind(ErrorKind::DecodeRequest { err }))
}
