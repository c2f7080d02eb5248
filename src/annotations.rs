//! Reading `google.api.http` method options.
//!
//! `prost-types` drops extension fields while decoding, so the request is decoded a second time
//! with the files kept as raw bytes and loaded into a `prost-reflect` pool, where extensions are
//! preserved.

use std::collections::HashMap;

use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, ExtensionDescriptor, Value};

use crate::error::{Error, ErrorKind};

const HTTP_EXTENSION: &str = "google.api.http";

#[derive(Clone, PartialEq, Message)]
struct RawCodeGeneratorRequest {
    #[prost(bytes, repeated, tag = "15")]
    proto_file: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
struct RawFileDescriptorSet {
    #[prost(bytes, repeated, tag = "1")]
    file: Vec<Vec<u8>>,
}

/// The subset of `google.api.HttpRule` used to register routes.
#[derive(Clone, PartialEq, Message)]
pub(crate) struct HttpRule {
    #[prost(string, tag = "12")]
    pub response_body: String,
    #[prost(oneof = "http_rule::Pattern", tags = "2, 3, 4, 5, 6, 8")]
    pub pattern: Option<http_rule::Pattern>,
}

pub(crate) mod http_rule {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub(crate) enum Pattern {
        #[prost(string, tag = "2")]
        Get(String),
        #[prost(string, tag = "3")]
        Put(String),
        #[prost(string, tag = "4")]
        Post(String),
        #[prost(string, tag = "5")]
        Delete(String),
        #[prost(string, tag = "6")]
        Patch(String),
        #[prost(message, tag = "8")]
        Custom(super::CustomHttpPattern),
    }
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct CustomHttpPattern {
    #[prost(string, tag = "1")]
    pub kind: String,
    #[prost(string, tag = "2")]
    pub path: String,
}

/// The HTTP method and path template of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route<'a> {
    Get(&'a str),
    Post(&'a str),
}

impl HttpRule {
    /// The route for this rule, if it uses one of the supported verbs.
    pub fn route(&self) -> Option<Route<'_>> {
        match &self.pattern {
            Some(http_rule::Pattern::Get(path)) => Some(Route::Get(path)),
            Some(http_rule::Pattern::Post(path)) => Some(Route::Post(path)),
            _ => None,
        }
    }

    /// Whether the handler result is written through the JSON envelope.
    pub fn wraps_response(&self) -> bool {
        self.response_body.is_empty() || self.response_body == "json"
    }
}

/// The `google.api.http` rules of every method in a request, keyed by fully-qualified method name.
#[derive(Debug, Default)]
pub(crate) struct HttpRules {
    rules: HashMap<String, HttpRule>,
}

impl HttpRules {
    /// Collects the rules from an encoded `CodeGeneratorRequest`.
    pub fn from_request(bytes: &[u8]) -> Result<Self, Error> {
        let request = RawCodeGeneratorRequest::decode(bytes)
            .map_err(|err| Error::from_kind(ErrorKind::DecodeRequest { err }))?;
        let set = RawFileDescriptorSet {
            file: request.proto_file,
        };
        let pool = DescriptorPool::decode(set.encode_to_vec().as_slice())
            .map_err(|err| Error::from_kind(ErrorKind::DecodeDescriptors { err }))?;
        Self::from_pool(&pool)
    }

    pub fn from_pool(pool: &DescriptorPool) -> Result<Self, Error> {
        let mut rules = HttpRules::default();
        let Some(extension) = pool.get_extension_by_name(HTTP_EXTENSION) else {
            tracing::debug!("no {} extension in request", HTTP_EXTENSION);
            return Ok(rules);
        };

        for service in pool.services() {
            for method in service.methods() {
                if let Some(rule) = decode_rule(&method.options(), &extension)? {
                    rules.rules.insert(method.full_name().to_owned(), rule);
                }
            }
        }
        Ok(rules)
    }

    /// Looks up the rule of a method by its fully-qualified name, with or without a leading dot.
    pub fn get(&self, method: &str) -> Option<&HttpRule> {
        self.rules.get(method.strip_prefix('.').unwrap_or(method))
    }

    #[cfg(test)]
    pub fn insert(&mut self, method: &str, rule: HttpRule) {
        self.rules.insert(method.to_owned(), rule);
    }
}

fn decode_rule(
    options: &DynamicMessage,
    extension: &ExtensionDescriptor,
) -> Result<Option<HttpRule>, Error> {
    if !options.has_extension(extension) {
        return Ok(None);
    }

    match options.get_extension(extension).as_ref() {
        Value::Message(message) => HttpRule::decode(message.encode_to_vec().as_slice())
            .map(Some)
            .map_err(|err| Error::from_kind(ErrorKind::DecodeRequest { err })),
        _ => Ok(None),
    }
}
