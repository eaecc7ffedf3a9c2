//! Loading a [`Schema`] from a binary `google.protobuf.FileDescriptorSet`.
//!
//! The set is what `protoc --descriptor_set_out=out.bin --include_imports` emits.
use super::{
    EnumDef, FieldDef, MessageDef, Schema, SchemaBuilder, SchemaError, ServiceDef, TypeDef,
};
use prost::Message;
use prost_types::field_descriptor_proto::{Label as ProtoLabel, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorSet,
    ServiceDescriptorProto,
};
use std::collections::HashMap;

type MapEntries = HashMap<String, (TypeDef, TypeDef)>;

impl Schema {
    /// Decodes an encoded `FileDescriptorSet` and builds a schema from it.
    ///
    /// # Returns
    ///
    /// * `Ok(Schema)` - Every message, enum and unary method of the set.
    /// * `Err(SchemaError)` - If the bytes are not a descriptor set or a definition is invalid.
    pub fn decode_file_descriptor_set(bytes: &[u8]) -> Result<Self, SchemaError> {
        let set = FileDescriptorSet::decode(bytes)?;
        Self::from_file_descriptor_set(&set)
    }

    pub fn from_file_descriptor_set(set: &FileDescriptorSet) -> Result<Self, SchemaError> {
        let mut map_entries = MapEntries::new();
        for file in &set.file {
            for message in &file.message_type {
                collect_map_entries(file.package(), message, &mut map_entries)?;
            }
        }

        let mut builder = SchemaBuilder::new();
        for file in &set.file {
            let scope = file.package();

            for message in &file.message_type {
                builder = add_message(builder, scope, message, &map_entries)?;
            }
            for enumeration in &file.enum_type {
                builder = builder.enumeration(enum_def(scope, enumeration));
            }
            for service in &file.service {
                builder = builder.service(service_def(scope, service));
            }
        }

        builder.build()
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn is_map_entry(message: &DescriptorProto) -> bool {
    message
        .options
        .as_ref()
        .is_some_and(|options| options.map_entry())
}

fn collect_map_entries(
    scope: &str,
    message: &DescriptorProto,
    map_entries: &mut MapEntries,
) -> Result<(), SchemaError> {
    let full_name = qualify(scope, message.name());

    if is_map_entry(message) {
        let find = |number: i32| {
            message
                .field
                .iter()
                .find(|f| f.number() == number)
                .map(|f| scalar_type(&full_name, f))
                .transpose()
        };
        // A map entry without a key or value is malformed; treat the missing side as a string.
        let key = find(1)?.unwrap_or(TypeDef::String);
        let value = find(2)?.unwrap_or(TypeDef::String);
        map_entries.insert(full_name, (key, value));
        return Ok(());
    }

    for nested in &message.nested_type {
        collect_map_entries(&full_name, nested, map_entries)?;
    }
    Ok(())
}

fn add_message(
    mut builder: SchemaBuilder,
    scope: &str,
    message: &DescriptorProto,
    map_entries: &MapEntries,
) -> Result<SchemaBuilder, SchemaError> {
    if is_map_entry(message) {
        return Ok(builder);
    }

    let full_name = qualify(scope, message.name());
    let mut def = MessageDef::new(full_name.clone());

    for field in &message.field {
        def = def.field(field_def(&full_name, field, map_entries)?);
    }
    builder = builder.message(def);

    for nested in &message.nested_type {
        builder = add_message(builder, &full_name, nested, map_entries)?;
    }
    for enumeration in &message.enum_type {
        builder = builder.enumeration(enum_def(&full_name, enumeration));
    }

    Ok(builder)
}

fn field_def(
    message: &str,
    field: &FieldDescriptorProto,
    map_entries: &MapEntries,
) -> Result<FieldDef, SchemaError> {
    let number = u32::try_from(field.number()).map_err(|_| SchemaError::InvalidFieldNumber {
        message: message.to_string(),
        number: 0,
    })?;

    let map = (field.label() == ProtoLabel::Repeated && field.r#type() == Type::Message)
        .then(|| map_entries.get(type_name(field)))
        .flatten();

    let mut def = match map {
        Some((key, value)) => FieldDef::new(
            number,
            field.name(),
            TypeDef::map(key.clone(), value.clone()),
        ),
        None => {
            let def = FieldDef::new(number, field.name(), scalar_type(message, field)?);
            if field.label() == ProtoLabel::Repeated {
                def.repeated()
            } else if field.proto3_optional() || field.oneof_index.is_some() {
                def.optional()
            } else {
                def
            }
        }
    };

    if let Some(json_name) = &field.json_name {
        def = def.json_name(json_name.clone());
    }

    Ok(def)
}

fn type_name(field: &FieldDescriptorProto) -> &str {
    field.type_name().trim_start_matches('.')
}

fn scalar_type(message: &str, field: &FieldDescriptorProto) -> Result<TypeDef, SchemaError> {
    Ok(match field.r#type() {
        Type::Int32 => TypeDef::Int32,
        Type::Int64 => TypeDef::Int64,
        Type::Uint32 => TypeDef::Uint32,
        Type::Uint64 => TypeDef::Uint64,
        Type::Bool => TypeDef::Bool,
        Type::String => TypeDef::String,
        Type::Bytes => TypeDef::Bytes,
        Type::Double => TypeDef::Double,
        Type::Float => TypeDef::Float,
        Type::Enum => TypeDef::enumeration(type_name(field)),
        Type::Message => TypeDef::message(type_name(field)),
        _ => {
            return Err(SchemaError::UnsupportedFieldType {
                message: message.to_string(),
                field: field.name().to_string(),
                type_code: field.r#type.unwrap_or_default(),
            });
        }
    })
}

fn enum_def(scope: &str, enumeration: &EnumDescriptorProto) -> EnumDef {
    enumeration.value.iter().fold(
        EnumDef::new(qualify(scope, enumeration.name())),
        |def, value| def.value(value.name(), value.number()),
    )
}

fn service_def(scope: &str, service: &ServiceDescriptorProto) -> ServiceDef {
    let full_name = qualify(scope, service.name());
    let mut def = ServiceDef::new(full_name.clone());

    for method in &service.method {
        if method.client_streaming() || method.server_streaming() {
            tracing::debug!(
                service = %full_name,
                method = method.name(),
                "skipping streaming method"
            );
            continue;
        }
        def = def.method(
            method.name(),
            method.input_type().trim_start_matches('.'),
            method.output_type().trim_start_matches('.'),
        );
    }

    def
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Kind;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use prost_types::{
        FileDescriptorProto, MessageOptions, MethodDescriptorProto,
        field_descriptor_proto::{Label, Type},
    };

    fn field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            r#type: Some(ty as i32),
            label: Some(label as i32),
            ..Default::default()
        }
    }

    fn message_field(name: &str, number: i32, type_name: &str, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            type_name: Some(type_name.to_string()),
            ..field(name, number, Type::Message, label)
        }
    }

    fn group_file() -> FileDescriptorProto {
        let labels_entry = DescriptorProto {
            name: Some("LabelsEntry".to_string()),
            field: vec![
                field("key", 1, Type::String, Label::Optional),
                field("value", 2, Type::Int32, Label::Optional),
            ],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let group = DescriptorProto {
            name: Some("Group".to_string()),
            field: vec![
                field("id", 1, Type::String, Label::Optional),
                message_field("labels", 2, ".controlplane.v1.Group.LabelsEntry", Label::Repeated),
                FieldDescriptorProto {
                    proto3_optional: Some(true),
                    oneof_index: Some(0),
                    ..field("description", 3, Type::String, Label::Optional)
                },
                field("member_ids", 4, Type::String, Label::Repeated),
            ],
            nested_type: vec![labels_entry],
            ..Default::default()
        };

        let list_response = DescriptorProto {
            name: Some("GroupServiceListResponse".to_string()),
            field: vec![message_field(
                "result",
                1,
                ".controlplane.v1.Group",
                Label::Repeated,
            )],
            ..Default::default()
        };

        let service = ServiceDescriptorProto {
            name: Some("GroupService".to_string()),
            method: vec![
                MethodDescriptorProto {
                    name: Some("List".to_string()),
                    input_type: Some(".controlplane.v1.Group".to_string()),
                    output_type: Some(".controlplane.v1.GroupServiceListResponse".to_string()),
                    ..Default::default()
                },
                MethodDescriptorProto {
                    name: Some("Watch".to_string()),
                    input_type: Some(".controlplane.v1.Group".to_string()),
                    output_type: Some(".controlplane.v1.Group".to_string()),
                    server_streaming: Some(true),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        FileDescriptorProto {
            name: Some("controlplane/v1/group.proto".to_string()),
            package: Some("controlplane.v1".to_string()),
            message_type: vec![group, list_response],
            service: vec![service],
            syntax: Some("proto3".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn decodes_messages_maps_and_unary_methods() {
        let set = FileDescriptorSet {
            file: vec![group_file()],
        };
        let schema = Schema::decode_file_descriptor_set(&set.encode_to_vec()).unwrap();

        let group = schema.get_message_by_name("controlplane.v1.Group").unwrap();
        assert_eq!(group.fields().len(), 4);
        assert!(schema.get_message_by_name("controlplane.v1.Group.LabelsEntry").is_none());

        let labels = group.get_field_by_name("labels").unwrap();
        assert!(labels.is_map());
        assert_eq!(labels.label(), crate::schema::Label::Singular);
        assert_matches!(
            labels.kind(),
            Kind::Map { key, value } if *key == Kind::String && *value == Kind::Int32
        );

        let description = group.get_field_by_name("description").unwrap();
        assert!(description.is_optional());

        let member_ids = group.get_field_by_name("memberIds").unwrap();
        assert!(member_ids.is_repeated());

        let service = schema
            .get_service_by_name("controlplane.v1.GroupService")
            .unwrap();
        assert_eq!(service.methods().len(), 1);
        assert_eq!(
            service.get_method("List").unwrap().path(),
            "/controlplane.v1.GroupService/List"
        );
    }

    #[test]
    fn unsupported_types_are_reported() {
        let mut file = group_file();
        file.message_type[0]
            .field
            .push(field("weight", 9, Type::Sint32, Label::Optional));

        let err = Schema::from_file_descriptor_set(&FileDescriptorSet { file: vec![file] })
            .unwrap_err();
        assert_matches!(
            err,
            SchemaError::UnsupportedFieldType { field, .. } if field == "weight"
        );
    }

    #[test]
    fn malformed_method_names_are_rejected() {
        let mut file = group_file();
        file.service[0].method[0].name = Some("List\u{7f}".to_string());

        let err = Schema::from_file_descriptor_set(&FileDescriptorSet { file: vec![file] })
            .unwrap_err();
        assert_matches!(err, SchemaError::InvalidMethodName { .. });
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = Schema::decode_file_descriptor_set(&[0x0a, 0xff]).unwrap_err();
        assert_matches!(err, SchemaError::Decode(_));
    }
}
