//! # Topaz Core
//!
//! `topaz-core` is the client library fronting the two Topaz services: the
//! directory (a graph of objects and relations, split into the `Reader`,
//! `Writer`, `Importer`, `Exporter` and `Model` gRPC services) and the
//! authorizer (policy decisions).
//!
//! ## Key Components
//!
//! * **[`config`]:** Layered configuration. Every directory service may override the base
//!   endpoint, credentials, CA bundle and headers; [`config::merge`] and
//!   [`config::ConfigResolver`] turn the layers into one [`config::EffectiveConfig`] per service.
//! * **[`transport`]:** Builds one lazily connected channel per distinct effective configuration.
//!   A service whose effective configuration equals the base one shares the base [`transport::Transport`].
//! * **[`client`]:** The [`client::ServiceClient`] seam. A configured service is bound to a
//!   [`client::RemoteClient`]; an unconfigured one to a [`client::NullProxy`] that fails every
//!   call with a descriptive error instead of attempting a connection.
//! * **[`registry`]:** The [`registry::MessageRegistry`], a table from protobuf type name to schema,
//!   used to turn every response into canonical JSON with implicit defaults filled in.
//! * **[`directory::Directory`] & [`authorizer::Authorizer`]:** The facades callers use. Requests
//!   and responses are `serde_json::Value`s following the proto3 JSON mapping.
//!
//! Messages never go through generated structs: they are `prost_reflect::DynamicMessage`s
//! described by the schemas bundled in `topaz-proto`, carried by the [`grpc::codec::DynamicCodec`].
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod authorizer;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod grpc;
pub mod registry;
pub mod trace;
pub mod transport;

mod facade;

pub use authorizer::{Authorizer, DecisionTree};
pub use client::{CallOptions, ServiceKind};
pub use config::{AuthorizerConfig, BaseConfig, DirectoryConfig, ServiceConfig};
pub use directory::{Directory, ExportOption, ImportRequest, Manifest};
pub use error::ClientError;
pub use registry::MessageRegistry;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
