use std::{fs, path::Path};

use insta::assert_yaml_snapshot;
use prost::Message;
use prost_types::compiler::{code_generator_response::Feature, CodeGeneratorResponse};
use protoc_gen_rain::{generate, request_parameter, Config, Error, Parameters};
use protox::Compiler;
use similar_asserts::assert_eq;

/// `CodeGeneratorRequest` with the files kept as encoded bytes, so extension options survive.
#[derive(Clone, PartialEq, Message)]
struct RawRequest {
    #[prost(string, repeated, tag = "1")]
    file_to_generate: Vec<String>,
    #[prost(string, optional, tag = "2")]
    parameter: Option<String>,
    #[prost(bytes = "vec", repeated, tag = "15")]
    proto_file: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
struct RawFileDescriptorSet {
    #[prost(bytes = "vec", repeated, tag = "1")]
    file: Vec<Vec<u8>>,
}

fn request(files: &[&str], parameter: &str) -> Vec<u8> {
    let includes = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/protos");
    let mut compiler = Compiler::new([includes]).unwrap();
    compiler.include_imports(true);
    compiler.include_source_info(true);
    for file in files {
        compiler.open_file(file).unwrap();
    }

    let set = RawFileDescriptorSet::decode(compiler.encode_file_descriptor_set().as_slice())
        .unwrap();
    RawRequest {
        file_to_generate: files.iter().map(|file| (*file).to_owned()).collect(),
        parameter: Some(parameter.to_owned()),
        proto_file: set.file,
    }
    .encode_to_vec()
}

fn run(files: &[&str], parameter: &str, manifest_dir: &Path) -> Result<CodeGeneratorResponse, Error> {
    let request = request(files, parameter);
    let config = Config {
        params: Parameters::parse(&request_parameter(&request)?)?,
        error_code: 10001,
    };
    assert_eq!(config.params.manifest_dir, manifest_dir);
    generate(&request, &config)
}

fn manifest_parameter(dir: &Path) -> String {
    format!("path={}", dir.display())
}

fn content<'a>(response: &'a CodeGeneratorResponse, name: &str) -> &'a str {
    response
        .file
        .iter()
        .find(|file| file.name() == name)
        .map(|file| file.content())
        .unwrap_or_else(|| panic!("no file named {}", name))
}

fn squash(text: &str) -> String {
    text.chars().filter(|ch| !ch.is_whitespace()).collect()
}

#[track_caller]
fn assert_contains(haystack: &str, needle: &str) {
    assert!(
        squash(haystack).contains(&squash(needle)),
        "`{}` not found in:\n{}",
        needle,
        haystack
    );
}

#[test]
fn profile_service() {
    let dir = tempfile::tempdir().unwrap();
    let response = run(
        &["user/profile.proto"],
        &manifest_parameter(dir.path()),
        dir.path(),
    )
    .unwrap();

    assert_eq!(response.error, None);
    assert_eq!(
        response.supported_features,
        Some(Feature::Proto3Optional as u64)
    );
    let names: Vec<&str> = response.file.iter().map(|file| file.name()).collect();
    assert_yaml_snapshot!(names, @r###"
    - user/profile_model.rs
    - user/profile_api.rs
    "###);

    let model = content(&response, "user/profile_model.rs");
    assert_contains(model, "//! User profiles.");
    assert_contains(model, "/// A registered user.");
    assert_contains(
        model,
        "pub struct Profile {
            #[serde(rename = \"name\", skip_serializing_if = \"is_default\")]
            pub name: String,
            #[serde(rename = \"age\", skip_serializing_if = \"is_default\")]
            pub age: i32,
        }",
    );

    let api = content(&response, "user/profile_api.rs");
    assert_contains(api, "pub trait UserServiceHandler");
    assert_contains(api, "/// Creates a profile.");
    assert_contains(api, "g.post(\"/v1/profile\", move |ctx: router::Context| {");
    assert_contains(
        api,
        "if let Err(err) = ctx.bind_body_with(&mut input, binding::Json).await {
            return router::error(&ctx, 10001, err);
        }",
    );
    assert_contains(api, "let mut output = router::Empty::default();");
    assert_contains(api, "match g.middlewares(&[\"auth\", \"quota\"]) {");
    assert_contains(
        api,
        "g.handle(router::Method::Post, \"/v1/profile/update\", chain, move |ctx: router::Context| {",
    );
    assert_contains(
        api,
        "let err = router::Error::missing_middleware(&name);
        async move { router::error(&ctx, 10001, err) }",
    );
    assert_contains(api, "let mut output = super::Profile::default();");

    let manifest = fs::read_to_string(dir.path().join("handler.json")).unwrap();
    assert_eq!(manifest, r#"{"user/UserService":"user"}"#);
}

#[test]
fn order_service() {
    let dir = tempfile::tempdir().unwrap();
    let response = run(
        &["shop/order.proto"],
        &manifest_parameter(dir.path()),
        dir.path(),
    )
    .unwrap();

    let model = content(&response, "shop/order_model.rs");
    assert_contains(model, "use crate::common;");
    assert_contains(model, "use crate::router::wkt;");
    assert_contains(model, "use std::collections::HashMap;");
    assert_contains(model, "pub use common::Page;");
    assert_contains(model, "pub use common::DIRECTION_DESC;");
    assert_contains(model, "pub struct OrderState(pub i32);");
    assert_contains(model, "pub const ORDER_SHIPPED: OrderState = OrderState(2);");
    assert_contains(
        model,
        "#[serde(rename = \"orderId\", skip_serializing_if = \"is_default\")]
        pub order_id: i64,",
    );
    assert_contains(model, "pub labels: HashMap<String, String>,");
    assert_contains(
        model,
        "pub metadata: serde_json::Map<String, serde_json::Value>,",
    );
    assert_contains(model, "pub created_at: Option<Box<wkt::Timestamp>>,");
    assert_contains(model, "#[serde(flatten)] pub payment: Option<OrderPayment>,");
    assert_contains(
        model,
        "#[serde(rename = \"cardToken\")]
        CardToken(String),
        #[serde(rename = \"voucher\")]
        Voucher(Box<Voucher>),",
    );
    assert_contains(model, "pub fn get_voucher(&self) -> Option<&Voucher> {");
    assert_contains(model, "pub page: Option<Box<common::Page>>,");
    assert_contains(
        model,
        "#[serde(rename = \"direction\")]
        pub direction: common::Direction,",
    );
    assert_contains(model, "pub orders: Vec<Order>,");
    assert!(!model.contains("OrderLabelsEntry"));

    let api = content(&response, "shop/order_api.rs");
    assert_contains(api, "g.get(\"/v1/orders\"");
    assert_contains(api, "if let Err(err) = ctx.bind_query(&mut input) {");
    assert_contains(
        api,
        "let _ = ctx.bind_with(&mut input, binding::Form).await;",
    );
    assert_contains(
        api,
        "let _ = h.create_order(ctx.clone(), &input, &mut output).await;
        ctx.finish()",
    );
}

#[test]
fn manifest_is_merged() {
    let dir = tempfile::tempdir().unwrap();
    let parameter = manifest_parameter(dir.path());
    run(&["user/profile.proto"], &parameter, dir.path()).unwrap();
    run(&["shop/order.proto"], &parameter, dir.path()).unwrap();

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("handler.json")).unwrap())
            .unwrap();
    assert_yaml_snapshot!(manifest, @r###"
    shop/OrderService: shop
    user/UserService: user
    "###);
}

#[test]
fn source_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    let parameter = format!("paths=source_relative,{}", manifest_parameter(dir.path()));
    let response = run(&["common/page.proto"], &parameter, dir.path()).unwrap();

    let names: Vec<&str> = response.file.iter().map(|file| file.name()).collect();
    assert_eq!(names, ["common/page_model.rs", "common/page_api.rs"]);
    assert!(!dir.path().join("handler.json").exists());
}

#[test]
fn unsupported_http_verb() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(
        &["broken/unmapped.proto"],
        &manifest_parameter(dir.path()),
        dir.path(),
    )
    .unwrap_err();

    assert!(err.is_annotation());
    assert_eq!(
        err.to_string(),
        "http mapping not found for method broken.PingService.Replace"
    );
    assert!(!dir.path().join("handler.json").exists());
}

#[test]
fn inconsistent_packages() {
    let dir = tempfile::tempdir().unwrap();
    let err = run(
        &["broken/unmapped.proto", "broken/other.proto"],
        &manifest_parameter(dir.path()),
        dir.path(),
    )
    .unwrap_err();

    assert!(err.is_consistency());
    assert_eq!(err.to_string(), "inconsistent package names: broken, other");
}

#[test]
fn invalid_paths_parameter() {
    let request = request(&["common/page.proto"], "paths=absolute");
    let err = Parameters::parse(&request_parameter(&request).unwrap()).unwrap_err();
    assert!(err.is_input());
}

#[test]
fn malformed_request() {
    let err = generate(b"\xff\xff\xff", &Config::default()).unwrap_err();
    assert!(err.is_input());
}
