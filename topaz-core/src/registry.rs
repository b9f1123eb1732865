//! # Message registry
//!
//! The [`MessageRegistry`] turns response messages into canonical JSON. It is an explicit table
//! from fully qualified protobuf type name to [`MessageSchema`]; every message, including the
//! nested ones, is converted by looking up the type name it carries.
//!
//! The output follows the proto3 JSON mapping with implicit defaults emitted:
//!
//! * Fields without presence (plain scalars, repeated and map fields) are always present,
//!   with their zero value when the server did not send them.
//! * Fields with presence (messages, `optional` scalars and `oneof` members) appear only when set.
//! * Keys use the camelCase JSON names, 64-bit integers are strings, bytes are base64 and
//!   enums are their value names.
//!
//! Well-known types (`google.protobuf.*`) use their special JSON forms (RFC 3339 timestamps,
//! plain objects for `Struct`, and so on).
//!
//! The table is built at construction from the bundled schemas plus any caller-supplied
//! [`DescriptorPool`]s, the last registration of a type name winning. It never changes afterwards.
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use futures_util::{Stream, StreamExt};
use prost_reflect::{
    DescriptorError, DescriptorPool, DynamicMessage, FieldDescriptor, Kind, MapKey,
    MessageDescriptor, ReflectMessage, SerializeOptions, Value as ProtoValue,
};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

const WELL_KNOWN_PACKAGE: &str = "google.protobuf";
const NULL_VALUE_ENUM: &str = "google.protobuf.NullValue";

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("schema not registered for type: [{0}]")]
    SchemaNotRegistered(String),
    #[error("Failed to serialize well-known type '{type_name}': '{source}'")]
    WellKnown {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A converter for one message type.
#[derive(Debug, Clone)]
pub enum MessageSchema {
    /// A regular message, converted field by field.
    Message(MessageDescriptor),
    /// A `google.protobuf` type with a dedicated JSON representation.
    WellKnown(MessageDescriptor),
}

impl MessageSchema {
    fn new(descriptor: MessageDescriptor) -> Self {
        if descriptor.package_name() == WELL_KNOWN_PACKAGE {
            MessageSchema::WellKnown(descriptor)
        } else {
            MessageSchema::Message(descriptor)
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        match self {
            MessageSchema::Message(d) | MessageSchema::WellKnown(d) => d,
        }
    }

    fn to_json(
        &self,
        registry: &MessageRegistry,
        message: &DynamicMessage,
    ) -> Result<Value, SerializeError> {
        match self {
            MessageSchema::WellKnown(descriptor) => {
                let options = SerializeOptions::new().skip_default_fields(false);
                message
                    .serialize_with_options(serde_json::value::Serializer, &options)
                    .map_err(|source| SerializeError::WellKnown {
                        type_name: descriptor.full_name().to_string(),
                        source,
                    })
            }
            MessageSchema::Message(descriptor) => {
                let mut object = Map::new();
                for field in descriptor.fields() {
                    if field.supports_presence() && !message.has_field_by_number(field.number()) {
                        continue;
                    }
                    let value = match message.get_field_by_number(field.number()) {
                        Some(value) => registry.value_to_json(&field, &value)?,
                        None => registry.value_to_json(&field, &ProtoValue::default_value_for_field(&field))?,
                    };
                    object.insert(field.json_name().to_string(), value);
                }
                Ok(Value::Object(object))
            }
        }
    }
}

/// Table of the message schemas a client can serialize.
#[derive(Debug, Clone, Default)]
pub struct MessageRegistry {
    table: HashMap<String, MessageSchema>,
}

impl MessageRegistry {
    /// A registry holding the schemas bundled with the crate.
    pub fn builtin() -> Result<Self, DescriptorError> {
        let mut registry = Self::default();
        registry.register_pool(&topaz_proto::descriptor_pool()?);
        Ok(registry)
    }

    /// The bundled schemas followed by `additional` ones, in order.
    pub fn with_schemas(additional: &[DescriptorPool]) -> Result<Self, DescriptorError> {
        let mut registry = Self::builtin()?;
        for pool in additional {
            registry.register_pool(pool);
        }
        Ok(registry)
    }

    /// Adds every message of `pool`, replacing any previous schema with the same name.
    pub fn register_pool(&mut self, pool: &DescriptorPool) {
        for descriptor in pool.all_messages() {
            self.register(descriptor);
        }
    }

    pub fn register(&mut self, descriptor: MessageDescriptor) {
        self.table
            .insert(descriptor.full_name().to_string(), MessageSchema::new(descriptor));
    }

    pub fn schema(&self, type_name: &str) -> Option<&MessageSchema> {
        self.table.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.table.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Converts a message into JSON, looking its schema up by the type name it carries.
    ///
    /// Fails without partial output when the type, or the type of any nested message,
    /// is not registered.
    pub fn serialize(&self, message: &DynamicMessage) -> Result<Value, SerializeError> {
        let descriptor = message.descriptor();
        let type_name = descriptor.full_name();
        let schema = self
            .schema(type_name)
            .ok_or_else(|| SerializeError::SchemaNotRegistered(type_name.to_string()))?;

        schema.to_json(self, message)
    }

    /// Serializes every message of a stream as it is pulled. Stream errors pass through.
    pub fn serialize_stream<'a, S, E>(&'a self, messages: S) -> impl Stream<Item = Result<Value, E>> + 'a
    where
        S: Stream<Item = Result<DynamicMessage, E>> + 'a,
        E: From<SerializeError> + 'a,
    {
        messages.map(move |item| item.and_then(|message| Ok(self.serialize(&message)?)))
    }

    fn value_to_json(
        &self,
        field: &FieldDescriptor,
        value: &ProtoValue,
    ) -> Result<Value, SerializeError> {
        match value {
            ProtoValue::List(items) => items
                .iter()
                .map(|item| self.scalar_to_json(&field.kind(), item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            ProtoValue::Map(entries) => {
                let value_kind = match field.kind() {
                    Kind::Message(entry) => entry.map_entry_value_field().kind(),
                    other => other,
                };
                let mut object = Map::new();
                for (key, value) in entries {
                    object.insert(map_key_to_string(key), self.scalar_to_json(&value_kind, value)?);
                }
                Ok(Value::Object(object))
            }
            other => self.scalar_to_json(&field.kind(), other),
        }
    }

    fn scalar_to_json(&self, kind: &Kind, value: &ProtoValue) -> Result<Value, SerializeError> {
        let json = match value {
            ProtoValue::Bool(v) => Value::Bool(*v),
            ProtoValue::I32(v) => Value::from(*v),
            ProtoValue::U32(v) => Value::from(*v),
            ProtoValue::I64(v) => Value::String(v.to_string()),
            ProtoValue::U64(v) => Value::String(v.to_string()),
            ProtoValue::F32(v) => float_to_json(f64::from(*v)),
            ProtoValue::F64(v) => float_to_json(*v),
            ProtoValue::String(v) => Value::String(v.clone()),
            ProtoValue::Bytes(v) => Value::String(BASE64.encode(v)),
            ProtoValue::EnumNumber(number) => enum_to_json(kind, *number),
            ProtoValue::Message(message) => self.serialize(message)?,
            ProtoValue::List(_) | ProtoValue::Map(_) => Value::Null,
        };
        Ok(json)
    }
}

fn enum_to_json(kind: &Kind, number: i32) -> Value {
    match kind {
        Kind::Enum(descriptor) if descriptor.full_name() == NULL_VALUE_ENUM => Value::Null,
        Kind::Enum(descriptor) => match descriptor.get_value(number) {
            Some(value) => Value::String(value.name().to_string()),
            None => Value::from(number),
        },
        _ => Value::from(number),
    }
}

fn float_to_json(value: f64) -> Value {
    if value.is_nan() {
        Value::String("NaN".to_string())
    } else if value == f64::INFINITY {
        Value::String("Infinity".to_string())
    } else if value == f64::NEG_INFINITY {
        Value::String("-Infinity".to_string())
    } else {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

fn map_key_to_string(key: &MapKey) -> String {
    match key {
        MapKey::Bool(v) => v.to_string(),
        MapKey::I32(v) => v.to_string(),
        MapKey::I64(v) => v.to_string(),
        MapKey::U32(v) => v.to_string(),
        MapKey::U64(v) => v.to_string(),
        MapKey::String(v) => v.clone(),
    }
}
