//! Schemas derived from Rust types with `schemars`.
//!
//! A project can either commit the generated `RootSchema` as JSON (loaded with
//! `[schema] format = "schemars"`) or build one in-process from any type that
//! implements [`JsonSchema`] via [`DerivedSchemaAdapter::schema_for`].

use super::{Check, Schema, SchemaAdapter, SchemaNode, union_of};
use crate::error::{ErrorCode, Result, ZenfigError};
use schemars::JsonSchema;
use schemars::schema::{
    InstanceType, RootSchema, Schema as JsonSchemaNode, SchemaObject, SingleOrVec,
};

const MAX_REF_DEPTH: usize = 32;

/// Integer formats emitted by schemars for Rust integer types.
const INTEGER_FORMATS: &[&str] = &[
    "int", "int8", "int16", "int32", "int64", "int128", "uint", "uint8", "uint16", "uint32",
    "uint64", "uint128",
];

pub struct DerivedSchemaAdapter;

impl SchemaAdapter for DerivedSchemaAdapter {
    fn name(&self) -> &'static str {
        "schemars"
    }

    fn is_schema(&self, source: &str) -> bool {
        serde_json::from_str::<RootSchema>(source)
            .ok()
            .and_then(|root| self.lower_root(&root).ok())
            .is_some_and(|node| node.normalize().is_object())
    }

    fn load(&self, source: &str) -> Result<Schema> {
        let root: RootSchema = serde_json::from_str(source)?;
        Schema::new(self.lower_root(&root)?)
    }
}

impl DerivedSchemaAdapter {
    /// Schema of a Rust configuration type.
    pub fn schema_for<T: JsonSchema>(&self) -> Result<Schema> {
        let root = schemars::schema_for!(T);
        Schema::new(self.lower_root(&root)?)
    }

    pub fn lower_root(&self, root: &RootSchema) -> Result<SchemaNode> {
        Lowering { root }.lower_object(&root.schema, 0)
    }
}

struct Lowering<'r> {
    root: &'r RootSchema,
}

impl Lowering<'_> {
    fn lower(&self, schema: &JsonSchemaNode, depth: usize) -> Result<SchemaNode> {
        match schema {
            JsonSchemaNode::Bool(_) => Ok(SchemaNode::Any),
            JsonSchemaNode::Object(obj) => self.lower_object(obj, depth),
        }
    }

    fn lower_object(&self, obj: &SchemaObject, depth: usize) -> Result<SchemaNode> {
        let mut lowered = self.lower_base(obj, depth)?;
        for check in checks(obj) {
            lowered = lowered.refine(check);
        }
        if let Some(default) = obj.metadata.as_ref().and_then(|m| m.default.clone()) {
            lowered = lowered.with_default(default);
        }
        Ok(lowered)
    }

    fn lower_base(&self, obj: &SchemaObject, depth: usize) -> Result<SchemaNode> {
        if let Some(reference) = &obj.reference {
            return self.lower_ref(reference, depth);
        }
        if let Some(constant) = &obj.const_value {
            return Ok(SchemaNode::Literal(constant.clone()));
        }
        if let Some(options) = &obj.enum_values {
            let strings: Option<Vec<String>> =
                options.iter().map(|v| v.as_str().map(str::to_string)).collect();
            return Ok(match strings {
                Some(strings) => SchemaNode::Enum(strings),
                None => union_of(options.iter().cloned().map(SchemaNode::Literal).collect()),
            });
        }
        if let Some(subschemas) = &obj.subschemas {
            if let Some(branches) = subschemas.any_of.as_ref().or(subschemas.one_of.as_ref()) {
                let branches = branches
                    .iter()
                    .map(|b| self.lower(b, depth))
                    .collect::<Result<Vec<_>>>()?;
                return Ok(union_of(branches));
            }
            if let Some(parts) = &subschemas.all_of {
                return match parts.as_slice() {
                    [single] => self.lower(single, depth),
                    _ => Err(invalid("allOf with more than one member is not supported")),
                };
            }
        }

        match &obj.instance_type {
            Some(SingleOrVec::Single(kind)) => self.lower_instance(**kind, obj, depth),
            Some(SingleOrVec::Vec(kinds)) => {
                let mut branches = Vec::new();
                for kind in kinds.iter().filter(|k| **k != InstanceType::Null) {
                    branches.push(self.lower_instance(*kind, obj, depth)?);
                }
                if kinds.contains(&InstanceType::Null) {
                    branches.push(SchemaNode::Null);
                }
                Ok(union_of(branches))
            }
            None if obj.object.is_some() => self.lower_instance(InstanceType::Object, obj, depth),
            None => Ok(SchemaNode::Any),
        }
    }

    fn lower_instance(
        &self,
        kind: InstanceType,
        obj: &SchemaObject,
        depth: usize,
    ) -> Result<SchemaNode> {
        Ok(match kind {
            InstanceType::Null => SchemaNode::Null,
            InstanceType::Boolean => SchemaNode::Boolean,
            InstanceType::String => SchemaNode::String,
            InstanceType::Integer => SchemaNode::integer(),
            InstanceType::Number if is_integer_format(obj) => SchemaNode::integer(),
            InstanceType::Number => SchemaNode::Number,
            InstanceType::Array => {
                let items = match obj.array.as_ref().and_then(|a| a.items.as_ref()) {
                    Some(SingleOrVec::Single(item)) => self.lower(item, depth)?,
                    Some(SingleOrVec::Vec(items)) => union_of(
                        items
                            .iter()
                            .map(|i| self.lower(i, depth))
                            .collect::<Result<Vec<_>>>()?,
                    ),
                    None => SchemaNode::Any,
                };
                SchemaNode::Array(Box::new(items))
            }
            InstanceType::Object => {
                let Some(validation) = &obj.object else {
                    return Ok(SchemaNode::object(Vec::<(String, SchemaNode)>::new()));
                };
                if validation.properties.is_empty() {
                    if let Some(values) = &validation.additional_properties {
                        if let JsonSchemaNode::Object(_) = values.as_ref() {
                            return Ok(SchemaNode::Record(Box::new(self.lower(values, depth)?)));
                        }
                    }
                }
                let mut properties = Vec::new();
                for (name, schema) in &validation.properties {
                    let mut node = self.lower(schema, depth)?;
                    if !validation.required.contains(name) && !node.normalize().optional {
                        node = node.optional();
                    }
                    properties.push((name.clone(), node));
                }
                SchemaNode::object(properties)
            }
        })
    }

    fn lower_ref(&self, reference: &str, depth: usize) -> Result<SchemaNode> {
        if depth >= MAX_REF_DEPTH {
            return Err(invalid(format!(
                "$ref '{}' nests too deeply; recursive types are not supported",
                reference
            )));
        }
        let name = reference
            .strip_prefix("#/definitions/")
            .or_else(|| reference.strip_prefix("#/$defs/"))
            .ok_or_else(|| invalid(format!("Unsupported $ref '{}'", reference)))?;
        let target = self
            .root
            .definitions
            .get(name)
            .ok_or_else(|| invalid(format!("Cannot resolve $ref '{}'", reference)))?;
        self.lower(target, depth + 1)
    }
}

fn is_integer_format(obj: &SchemaObject) -> bool {
    obj.format
        .as_deref()
        .is_some_and(|format| INTEGER_FORMATS.contains(&format))
}

fn checks(obj: &SchemaObject) -> Vec<Check> {
    let mut out = Vec::new();
    if let Some(number) = &obj.number {
        match number.multiple_of {
            Some(step) if step == 1.0 => out.push(Check::Int),
            Some(step) => out.push(Check::MultipleOf(step)),
            None => {}
        }
        out.extend(number.minimum.map(Check::Minimum));
        out.extend(number.maximum.map(Check::Maximum));
        out.extend(number.exclusive_minimum.map(Check::ExclusiveMinimum));
        out.extend(number.exclusive_maximum.map(Check::ExclusiveMaximum));
    }
    if let Some(string) = &obj.string {
        out.extend(string.min_length.map(|n| Check::MinLength(n as usize)));
        out.extend(string.max_length.map(|n| Check::MaxLength(n as usize)));
        out.extend(string.pattern.clone().map(Check::Pattern));
    }
    if let Some(array) = &obj.array {
        out.extend(array.min_items.map(|n| Check::MinItems(n as usize)));
        out.extend(array.max_items.map(|n| Check::MaxItems(n as usize)));
    }
    if let Some(format) = &obj.format {
        if !INTEGER_FORMATS.contains(&format.as_str()) && !is_float_format(format) {
            out.push(Check::Format(format.clone()));
        }
    }
    out
}

fn is_float_format(format: &str) -> bool {
    matches!(format, "float" | "double")
}

fn invalid(message: impl Into<String>) -> ZenfigError {
    ZenfigError::new(
        ErrorCode::InvalidFormat,
        format!("Invalid schemars schema: {}", message.into()),
    )
}
