//! # Client State: Offline
//!
//! Introspection over the client's [`Schema`]. These methods are available in every
//! state through [`SchemaState`].
use super::{CtrlClient, Offline, SchemaState};
use crate::client::types::Descriptor;
use crate::schema::{Schema, SchemaError};

impl CtrlClient<Offline> {
    /// Creates a disconnected client over `schema`.
    pub fn offline(schema: Schema) -> Self {
        Self {
            state: Offline { schema },
        }
    }

    /// Creates a disconnected client from an encoded `FileDescriptorSet`.
    ///
    /// # Returns
    ///
    /// * `Ok(CtrlClient<Offline>)` - The initialized offline client.
    /// * `Err(SchemaError)` - If the bytes are not a valid descriptor set.
    pub fn from_file_descriptor_set(bytes: &[u8]) -> Result<Self, SchemaError> {
        Ok(Self::offline(Schema::decode_file_descriptor_set(bytes)?))
    }
}

impl<T> CtrlClient<T>
where
    T: SchemaState,
{
    pub fn schema(&self) -> &Schema {
        self.state.schema()
    }

    /// Lists all services of the schema.
    ///
    /// # Returns
    ///
    /// A list of fully qualified service names (e.g. `controlplane.v1.WorkflowService`).
    pub fn list_services(&self) -> Vec<String> {
        self.state
            .schema()
            .services()
            .map(|s| s.full_name().to_string())
            .collect()
    }

    /// Looks up a service, message or enum by its fully qualified name.
    pub fn get_descriptor_by_symbol(&self, symbol: &str) -> Option<Descriptor> {
        let schema = self.state.schema();

        if let Some(descriptor) = schema.get_service_by_name(symbol) {
            return Some(Descriptor::ServiceDescriptor(descriptor));
        }
        if let Some(descriptor) = schema.get_message_by_name(symbol) {
            return Some(Descriptor::MessageDescriptor(descriptor));
        }
        if let Some(descriptor) = schema.get_enum_by_name(symbol) {
            return Some(Descriptor::EnumDescriptor(descriptor));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane;
    use assert_matches::assert_matches;

    #[test]
    fn lists_and_describes_the_builtin_schema() {
        let client = CtrlClient::offline(controlplane::schema());

        let services = client.list_services();
        assert!(services.contains(&"controlplane.v1.WorkflowService".to_string()));

        assert_matches!(
            client.get_descriptor_by_symbol("controlplane.v1.WorkflowService"),
            Some(Descriptor::ServiceDescriptor(_))
        );
        assert_matches!(
            client.get_descriptor_by_symbol("controlplane.v1.WorkflowItem"),
            Some(Descriptor::MessageDescriptor(d)) if d.name() == "WorkflowItem"
        );
        assert_matches!(
            client.get_descriptor_by_symbol("controlplane.v1.MembershipRole"),
            Some(Descriptor::EnumDescriptor(_))
        );
        assert!(client.get_descriptor_by_symbol("controlplane.v1.Missing").is_none());
    }
}
