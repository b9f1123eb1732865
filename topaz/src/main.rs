//! # Topaz CLI Entry Point
//!
//! The main executable of the Topaz client. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Installs the log subscriber and parses arguments with [`cli::Cli`].
//! 2. **Configuration**: Loads the `--config` file and applies the connection flags over it.
//! 3. **Execution**: Runs the command against a [`Directory`] or an [`Authorizer`].
//! 4. **Presentation**: Prints results as pretty JSON on stdout. Errors go to stderr with a
//!    non-zero exit status.
//!
//! Setting `TOPAZ_TRACE_MESSAGE=1` logs a summary of every message exchanged with the server.

mod cli;

use anyhow::{Context, bail};
use clap::Parser;
use cli::{AuthorizerCommands, Body, Cli, Commands, ConnectionArgs, DirectoryCommands};
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use topaz_core::{
    Authorizer, AuthorizerConfig, CallOptions, Directory, DirectoryConfig, ImportRequest,
    MessageRegistry,
    directory::{ImportMsg, ImportOpCode, ResponseStream},
    trace::{MessageObserver, TracingObserver},
};
use tracing_subscriber::EnvFilter;

const TRACE_MESSAGE_VAR: &str = "TOPAZ_TRACE_MESSAGE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let trace_messages = trace_messages_enabled();
    init_tracing(trace_messages);

    let args = Cli::parse();
    let observer = trace_messages.then(|| Arc::new(TracingObserver) as Arc<dyn MessageObserver>);

    match args.command {
        Commands::Directory { command } => {
            let directory = directory(&args.connection, observer)?;
            run_directory(&directory, command).await
        }
        Commands::Authorizer { command } => {
            let authorizer = authorizer(&args.connection, observer)?;
            run_authorizer(&authorizer, command).await
        }
    }
}

fn trace_messages_enabled() -> bool {
    std::env::var(TRACE_MESSAGE_VAR)
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// `RUST_LOG` wins. Otherwise only warnings are shown, plus the message summaries when enabled.
fn init_tracing(trace_messages: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if trace_messages {
            EnvFilter::new("warn,topaz_core::trace=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn directory(
    connection: &ConnectionArgs,
    observer: Option<Arc<dyn MessageObserver>>,
) -> anyhow::Result<Directory> {
    let mut config = match &connection.config {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            DirectoryConfig::from_json_file(path)?
        }
        None => DirectoryConfig::default(),
    };
    connection.apply(&mut config.base);

    let directory = match observer {
        Some(observer) => Directory::with_observer(&config, observer)?,
        None => Directory::new(&config)?,
    };
    Ok(directory)
}

fn authorizer(
    connection: &ConnectionArgs,
    observer: Option<Arc<dyn MessageObserver>>,
) -> anyhow::Result<Authorizer> {
    let mut config = match &connection.config {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            AuthorizerConfig::from_json_file(path)?
        }
        None => AuthorizerConfig::default(),
    };
    connection.apply(&mut config.base);

    let authorizer = match observer {
        Some(observer) => Authorizer::with_observer(&config, observer)?,
        None => Authorizer::new(&config)?,
    };
    Ok(authorizer)
}

async fn run_directory(directory: &Directory, command: DirectoryCommands) -> anyhow::Result<()> {
    let options = CallOptions::default();

    let value = match command {
        DirectoryCommands::Check(Body { body }) => directory.check(body, options).await?,
        DirectoryCommands::Checks(Body { body }) => directory.checks(body, options).await?,
        DirectoryCommands::GetObject(Body { body }) => directory.object(body, options).await?,
        DirectoryCommands::GetObjects(Body { body }) => directory.objects(body, options).await?,
        DirectoryCommands::GetObjectMany(Body { body }) => {
            directory.object_many(body, options).await?
        }
        DirectoryCommands::GetRelation(Body { body }) => directory.relation(body, options).await?,
        DirectoryCommands::GetRelations(Body { body }) => {
            directory.relations(body, options).await?
        }
        DirectoryCommands::GetGraph(Body { body }) => directory.graph(body, options).await?,
        DirectoryCommands::SetObject(Body { body }) => directory.set_object(body, options).await?,
        DirectoryCommands::DeleteObject(Body { body }) => {
            directory.delete_object(body, options).await?
        }
        DirectoryCommands::SetRelation(Body { body }) => {
            directory.set_relation(body, options).await?
        }
        DirectoryCommands::DeleteRelation(Body { body }) => {
            directory.delete_relation(body, options).await?
        }
        DirectoryCommands::Import { op, body } => {
            let requests = import_requests(op.into(), body)?;
            let responses = directory.import(requests, options).await?;
            return print_stream(directory.registry(), responses).await;
        }
        DirectoryCommands::Export { option } => {
            let records = directory.export(option, options).await?;
            return print_stream(directory.registry(), records).await;
        }
        DirectoryCommands::GetManifest => {
            serde_json::to_value(directory.get_manifest(options).await?)?
        }
        DirectoryCommands::SetManifest { manifest } => {
            let body = std::fs::read_to_string(&manifest)
                .with_context(|| format!("Failed to read manifest '{}'", manifest.display()))?;
            directory.set_manifest(&body, options).await?
        }
        DirectoryCommands::DeleteManifest => directory.delete_manifest(options).await?,
    };

    print_json(&value)
}

async fn run_authorizer(authorizer: &Authorizer, command: AuthorizerCommands) -> anyhow::Result<()> {
    let options = CallOptions::default();

    let value = match command {
        AuthorizerCommands::Is(Body { body }) => authorizer.is(body, options).await?,
        AuthorizerCommands::Allowed(Body { body }) => {
            Value::Bool(authorizer.allowed(body, options).await?)
        }
        AuthorizerCommands::Query(Body { body }) => authorizer.query(body, options).await?,
        AuthorizerCommands::DecisionTree(Body { body }) => {
            serde_json::to_value(authorizer.decision_tree(body, options).await?)?
        }
        AuthorizerCommands::ListPolicies(Body { body }) => {
            Value::Array(authorizer.list_policies(body, options).await?)
        }
        AuthorizerCommands::GetPolicy(Body { body }) => {
            authorizer.get_policy(body, options).await?
        }
        AuthorizerCommands::Info => authorizer.info(options).await?,
    };

    print_json(&value)
}

/// Turns the `import` body, an array of `{"object": ...}` / `{"relation": ...}` items, into requests.
fn import_requests(op_code: ImportOpCode, body: Value) -> anyhow::Result<Vec<ImportRequest>> {
    let Value::Array(items) = body else {
        bail!("The import body must be a JSON array");
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, mut item)| {
            let msg = if let Some(object) = item.get_mut("object") {
                ImportMsg::Object(object.take())
            } else if let Some(relation) = item.get_mut("relation") {
                ImportMsg::Relation(relation.take())
            } else {
                bail!("Import item {index} has neither an 'object' nor a 'relation'");
            };
            Ok(ImportRequest { op_code, msg })
        })
        .collect()
}

async fn print_stream(registry: &MessageRegistry, stream: ResponseStream) -> anyhow::Result<()> {
    let mut values = std::pin::pin!(registry.serialize_stream(stream));

    while let Some(value) = values.next().await {
        print_json(&value?)?;
    }

    Ok(())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
