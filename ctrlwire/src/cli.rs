//! # CLI
//!
//! This module defines the command-line interface of `ctrlwire` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring headers are `key:value`);
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ctrlwire", version, about = "Control-plane API client over gRPC and gRPC-Web")]
pub struct Cli {
    /// The control-plane URL (e.g. http://localhost:9000)
    #[arg(env = "CTRLWIRE_URL")]
    pub url: String,

    /// Wire transport used for calls
    #[arg(long, value_enum, env = "CTRLWIRE_TRANSPORT", default_value_t = Transport::Grpc)]
    pub transport: Transport,

    /// Bearer token sent as the `authorization` header of every call
    #[arg(long, env = "CTRLWIRE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Deadline for each call, in seconds
    #[arg(long, value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Path to a descriptor set (.bin) replacing the built-in control-plane schema
    #[arg(long)]
    pub file_descriptor_set: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Native gRPC over HTTP/2
    Grpc,
    /// gRPC-Web over HTTP/1.1
    GrpcWeb,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Perform a unary call
    ///
    /// The request body is the JSON projection of the method's input message.
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// ctrlwire http://localhost:9000 call controlplane.v1.WorkflowService/List --body '{"projectNames": ["core"]}'
    /// ```
    Call {
        /// Endpoint (package.Service/Method)
        #[arg(value_parser = parse_endpoint)]
        endpoint: (String, String),
        /// JSON body of the request message
        #[arg(long, value_parser = parse_body, default_value = "{}")]
        body: serde_json::Value,

        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// List available services or other resources
    List {
        #[command(subcommand)]
        sub: ListCommands,
    },

    /// Describe a service, message or enum
    Describe {
        /// Fully qualified symbol name (e.g. controlplane.v1.WorkflowItem)
        symbol: String,
    },
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// List all services of the schema
    Services,
}

fn parse_endpoint(value: &str) -> Result<(String, String), String> {
    let (service, method) = value.split_once('/').ok_or_else(|| {
        format!("Invalid endpoint format: '{value}'. Expected 'package.Service/Method'",)
    })?;

    if service.trim().is_empty() || method.trim().is_empty() {
        return Err("Service and Method names cannot be empty".to_string());
    }

    Ok((service.to_string(), method.to_string()))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| format!("Invalid timeout '{value}'. Expected a positive number of seconds"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_arguments() {
        let cli = Cli::try_parse_from([
            "ctrlwire",
            "--transport",
            "grpc-web",
            "--timeout",
            "2.5",
            "http://localhost:9000",
            "call",
            "controlplane.v1.WorkflowService/List",
            "--body",
            r#"{"projectNames": ["core"]}"#,
            "-H",
            "x-org: acme",
        ])
        .unwrap();

        assert_eq!(cli.transport, Transport::GrpcWeb);
        assert_eq!(cli.timeout, Some(Duration::from_millis(2500)));
        match cli.command {
            Commands::Call {
                endpoint,
                body,
                headers,
            } => {
                assert_eq!(
                    endpoint,
                    ("controlplane.v1.WorkflowService".to_string(), "List".to_string())
                );
                assert_eq!(body, serde_json::json!({"projectNames": ["core"]}));
                assert_eq!(headers, vec![("x-org".to_string(), "acme".to_string())]);
            }
            _ => panic!("Expected the call command"),
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_endpoint("controlplane.v1.WorkflowService").is_err());
        assert!(parse_endpoint("/List").is_err());
        assert!(parse_header("no-separator").is_err());
        assert!(parse_body("{not json").is_err());
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("soon").is_err());
        assert!(parse_timeout("1e30").is_err());
        assert!(parse_timeout("inf").is_err());
        assert!(parse_timeout("-1").is_err());
        assert_eq!(parse_timeout("0.25"), Ok(Duration::from_millis(250)));
    }
}
