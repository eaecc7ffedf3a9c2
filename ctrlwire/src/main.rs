//! # Ctrlwire CLI Entry Point
//!
//! The main executable for the ctrlwire tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Installs the log subscriber and parses arguments using [`cli::Cli`].
//! 2. **Schema**: Loads the descriptor set given on the command line, or falls back to the
//!    built-in control-plane schema.
//! 3. **Execution**: Introspection commands run offline; calls connect over the selected
//!    transport and delegate to the `CtrlClient`.
//! 4. **Presentation**: Formats and prints the resulting data or error status.

mod cli;
mod formatter;

use clap::Parser;
use cli::{Cli, Commands, ListCommands, Transport};
use ctrlwire_core::{
    client::{ClientConfig, CtrlClient, DynamicRequest, Offline, Online},
    controlplane,
    schema::Schema,
    tonic,
};
use formatter::{FormattedString, GenericError, ServiceList};
use http_body::Body as HttpBody;
use std::path::Path;
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() {
    init_tracing();

    let args = Cli::parse();
    let schema = load_schema_or_exit(args.file_descriptor_set.as_deref());

    match args.command {
        Commands::Call {
            endpoint,
            body,
            headers,
        } => {
            let (service, method) = endpoint;
            let request = DynamicRequest {
                body,
                headers,
                service,
                method,
            };

            let mut config = ClientConfig::new(args.url);
            if let Some(token) = args.token {
                config = config
                    .with_default_metadata(vec![("authorization".to_string(), format!("Bearer {token}"))]);
            }
            if let Some(timeout) = args.timeout {
                config = config.with_timeout(timeout);
            }

            match args.transport {
                Transport::Grpc => {
                    let client = match CtrlClient::connect(&config, schema).await {
                        Ok(client) => client,
                        Err(err) => exit_with(err),
                    };
                    run_call(client, request).await;
                }
                Transport::GrpcWeb => {
                    let client = match CtrlClient::connect_grpc_web(&config, schema) {
                        Ok(client) => client,
                        Err(err) => exit_with(err),
                    };
                    run_call(client, request).await;
                }
            }
        }
        Commands::List { sub } => match sub {
            ListCommands::Services => list_services(&CtrlClient::offline(schema)),
        },
        Commands::Describe { symbol } => describe(&CtrlClient::offline(schema), &symbol),
    }
}

fn init_tracing() {
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .compact();

    let filter = EnvFilter::new(std::env::var("RUST_LOG").as_deref().unwrap_or("warn"));

    Registry::default().with(filter).with(stderr).init();
}

fn exit_with(err: impl Into<FormattedString>) -> ! {
    eprintln!("{}", err.into());
    process::exit(1);
}

fn load_schema_or_exit(path: Option<&Path>) -> Schema {
    let Some(path) = path else {
        return controlplane::schema();
    };

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => exit_with(err),
    };

    match Schema::decode_file_descriptor_set(&bytes) {
        Ok(schema) => {
            tracing::debug!(path = %path.display(), "loaded file descriptor set");
            schema
        }
        Err(err) => exit_with(err),
    }
}

fn list_services(client: &CtrlClient<Offline>) {
    println!("{}", FormattedString::from(ServiceList(client.list_services())));
}

fn describe(client: &CtrlClient<Offline>, symbol: &str) {
    match client.get_descriptor_by_symbol(symbol) {
        Some(descriptor) => println!("{}", FormattedString::from(descriptor)),
        None => exit_with(GenericError(
            "Symbol Lookup Failed",
            format!("Symbol '{symbol}' not found"),
        )),
    }
}

async fn run_call<S>(mut client: CtrlClient<Online<S>>, request: DynamicRequest)
where
    S: tonic::client::GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    match client.dynamic(request).await {
        Ok(value) => println!("{}", FormattedString::from(value)),
        Err(err) => exit_with(err),
    }
}
