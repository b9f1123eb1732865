//! # CLI
//!
//! This module defines the command-line interface of `topaz` using `clap`.
//!
//! Connection flags are global. They override the matching base fields of the `--config` file,
//! so a file can describe per-service endpoints while the command line swaps credentials.
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use topaz_core::{ExportOption, config::BaseConfig, directory::ImportOpCode};

#[derive(Parser)]
#[command(name = "topaz", version, about = "Topaz directory and authorizer client")]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// JSON configuration file (camelCase keys, e.g. '{"url": "...", "reader": {"url": "..."}}')
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of every service (e.g. https://localhost:9292)
    #[arg(long, global = true)]
    pub url: Option<String>,

    #[arg(long, global = true)]
    pub api_key: Option<String>,

    #[arg(long, global = true)]
    pub tenant_id: Option<String>,

    /// Skip verification of the server certificate
    #[arg(long, global = true)]
    pub insecure: bool,

    /// PEM bundle of the CA certificates to trust instead of the system roots
    #[arg(long, global = true)]
    pub ca_file: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Overrides the fields of `base` given on the command line.
    pub fn apply(&self, base: &mut BaseConfig) {
        if let Some(url) = &self.url {
            base.url = Some(url.clone());
        }
        if let Some(api_key) = &self.api_key {
            base.api_key = Some(api_key.clone());
        }
        if let Some(tenant_id) = &self.tenant_id {
            base.tenant_id = Some(tenant_id.clone());
        }
        if let Some(ca_file) = &self.ca_file {
            base.ca_file = Some(ca_file.clone());
        }
        if self.insecure {
            base.insecure = true;
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Call the Topaz directory
    Directory {
        #[command(subcommand)]
        command: DirectoryCommands,
    },

    /// Call the Topaz authorizer
    Authorizer {
        #[command(subcommand)]
        command: AuthorizerCommands,
    },
}

/// JSON request body, in the proto3 JSON mapping.
#[derive(Args, Debug)]
pub struct Body {
    #[arg(long, value_parser = parse_body, default_value = "{}")]
    pub body: serde_json::Value,
}

#[derive(Subcommand)]
pub enum DirectoryCommands {
    /// Check whether a subject has a relation or permission on an object
    Check(Body),
    /// Run several checks at once
    Checks(Body),
    GetObject(Body),
    GetObjects(Body),
    GetObjectMany(Body),
    GetRelation(Body),
    GetRelations(Body),
    GetGraph(Body),
    SetObject(Body),
    DeleteObject(Body),
    SetRelation(Body),
    DeleteRelation(Body),

    /// Import objects and relations
    ///
    /// The body is an array whose items hold either an `object` or a `relation`:
    ///
    /// ```bash
    /// topaz directory import --body '[{"object": {"type": "user", "id": "rick"}}]'
    /// ```
    Import {
        #[arg(long, value_enum, default_value_t = ImportOp::Set)]
        op: ImportOp,

        #[arg(long, value_parser = parse_body)]
        body: serde_json::Value,
    },

    /// Stream the content of the directory, one JSON document per record
    Export {
        /// What to export (e.g. DATA, OBJECTS, STATS_RELATIONS)
        #[arg(value_parser = parse_export_option, default_value = "DATA")]
        option: ExportOption,
    },

    GetManifest,

    /// Replace the manifest with the content of a file
    SetManifest {
        /// Path to the manifest (YAML)
        manifest: PathBuf,
    },

    DeleteManifest,
}

#[derive(Subcommand)]
pub enum AuthorizerCommands {
    /// Evaluate the decisions of a policy path
    Is(Body),
    /// Whether the first decision of a policy path is granted
    Allowed(Body),
    Query(Body),
    DecisionTree(Body),
    ListPolicies(Body),
    GetPolicy(Body),
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportOp {
    Set,
    Delete,
    DeleteWithRelations,
}

impl From<ImportOp> for ImportOpCode {
    fn from(op: ImportOp) -> Self {
        match op {
            ImportOp::Set => ImportOpCode::Set,
            ImportOp::Delete => ImportOpCode::Delete,
            ImportOp::DeleteWithRelations => ImportOpCode::DeleteWithRelations,
        }
    }
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}

fn parse_export_option(value: &str) -> Result<ExportOption, String> {
    value.parse().map_err(|e| format!("{e}"))
}
