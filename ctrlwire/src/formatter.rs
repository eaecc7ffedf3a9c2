use colored::*;
use ctrlwire_core::{
    client::{
        Descriptor,
        online::{ClientConnectError, DynamicCallError},
    },
    grpc::client::{GrpcRequestError, RpcError},
    schema::{EnumDescriptor, Kind, Label, MessageDescriptor, MethodDescriptor, SchemaError, ServiceDescriptor},
};
use std::fmt::Display;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct ServiceList(pub Vec<String>);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<&RpcError> for FormattedString {
    fn from(err: &RpcError) -> Self {
        FormattedString(format!(
            "{} code={} ({:?}) message={:?}",
            "RPC Failed:".red().bold(),
            err.code_number(),
            err.code,
            err.message
        ))
    }
}

impl From<DynamicCallError> for FormattedString {
    fn from(err: DynamicCallError) -> Self {
        match &err {
            DynamicCallError::GrpcRequestError(GrpcRequestError::Status(status)) => {
                FormattedString::from(status)
            }
            _ => FormattedString(format!("{}\n\n'{}'", "Call Failed:".red().bold(), err)),
        }
    }
}

impl From<ClientConnectError> for FormattedString {
    fn from(err: ClientConnectError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Connection Error:".red().bold(), err))
    }
}

impl From<SchemaError> for FormattedString {
    fn from(err: SchemaError) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Failed to parse file descriptor:".red().bold(),
            err
        ))
    }
}

impl From<std::io::Error> for FormattedString {
    fn from(err: std::io::Error) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Failed to read file:".red().bold(),
            err
        ))
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{}:\n\n'{}'", msg.red().bold(), err))
    }
}

impl From<ServiceList> for FormattedString {
    fn from(ServiceList(services): ServiceList) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Available Services:\n");
        for svc in services {
            out.push_str(&format!("  - {}\n", svc.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<Descriptor> for FormattedString {
    fn from(descriptor: Descriptor) -> Self {
        match descriptor {
            Descriptor::ServiceDescriptor(d) => d.into(),
            Descriptor::MessageDescriptor(d) => d.into(),
            Descriptor::EnumDescriptor(d) => d.into(),
        }
    }
}

impl From<ServiceDescriptor> for FormattedString {
    fn from(service: ServiceDescriptor) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "service".cyan(),
            service.name().green()
        ));

        for method in service.methods() {
            out.push_str("  ");
            let method_fmt = FormattedString::from(method);
            out.push_str(&method_fmt.0);
            out.push_str("\n\n");
        }
        out.push('}');
        FormattedString(out)
    }
}

impl From<MethodDescriptor> for FormattedString {
    fn from(method: MethodDescriptor) -> Self {
        FormattedString(format!(
            "{} {}({}) {} ({});",
            "rpc".cyan(),
            method.name().green(),
            method.input().full_name().yellow(),
            "returns".cyan(),
            method.output().full_name().yellow()
        ))
    }
}

fn type_name(kind: &Kind) -> String {
    match kind {
        Kind::Double => "double".to_string(),
        Kind::Float => "float".to_string(),
        Kind::Int32 => "int32".to_string(),
        Kind::Int64 => "int64".to_string(),
        Kind::Uint32 => "uint32".to_string(),
        Kind::Uint64 => "uint64".to_string(),
        Kind::Bool => "bool".to_string(),
        Kind::String => "string".to_string(),
        Kind::Bytes => "bytes".to_string(),
        Kind::Message(m) => m.full_name().to_string(),
        Kind::Enum(e) => e.full_name().to_string(),
        Kind::Map { key, value } => format!("map<{}, {}>", type_name(key), type_name(value)),
    }
}

impl From<MessageDescriptor> for FormattedString {
    fn from(message: MessageDescriptor) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "message".cyan(),
            message.name().green()
        ));

        for field in message.fields() {
            let label = match field.label() {
                Label::Repeated => format!("{} ", "repeated".cyan()),
                Label::Optional => format!("{} ", "optional".cyan()),
                Label::Singular => "".to_string(),
            };

            out.push_str(&format!(
                "  {}{} {} = {};\n",
                label,
                type_name(&field.kind()).yellow(),
                field.name(),
                field.number()
            ));
        }
        out.push('}');
        FormattedString(out)
    }
}

impl From<EnumDescriptor> for FormattedString {
    fn from(enum_desc: EnumDescriptor) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "enum".cyan(),
            enum_desc.name().green()
        ));

        for val in enum_desc.values() {
            out.push_str(&format!(
                "  {} = {};\n",
                val.name,
                val.number.to_string().purple()
            ));
        }
        out.push('}');

        FormattedString(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctrlwire_core::controlplane;

    #[test]
    fn describes_messages_with_labels_and_maps() {
        colored::control::set_override(false);

        let group = controlplane::schema()
            .get_message_by_name("controlplane.v1.Group")
            .unwrap();
        let FormattedString(out) = group.into();

        assert!(out.starts_with("message Group {"));
        assert!(out.contains("  google.protobuf.Timestamp created_at = 6;"));
        assert!(out.contains("  map<string, string> labels = 8;"));

        let request = controlplane::schema()
            .get_message_by_name("controlplane.v1.GroupServiceListRequest")
            .unwrap();
        let FormattedString(out) = request.into();
        assert!(out.contains("  optional string group_name = 1;"));
    }

    #[test]
    fn describes_services() {
        colored::control::set_override(false);

        let service = controlplane::schema()
            .get_service_by_name("controlplane.v1.WorkflowService")
            .unwrap();
        let FormattedString(out) = service.into();

        assert!(out.contains(
            "rpc Delete(controlplane.v1.WorkflowServiceDeleteRequest) returns (controlplane.v1.WorkflowServiceDeleteResponse);"
        ));
    }
}
