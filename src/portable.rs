//! Portable tree form of the project model.
//!
//! Entities become JSON objects tagged with `"type"`; byte buffers become
//! `{"type": "bytes", "data": "<hex>"}` records so they are never confused
//! with text. Plain maps, sequences, and scalars pass through unchanged.
//! Decoding rejects unknown fields and mismatched types with the JSON
//! pointer of the offending node.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::codec::{Operand, ParamKind, ParamValue};
use crate::error::{SctError, SctResult};
use crate::model::{Instruction, Link, Opcode, Parameter, Project, Script, ScriptString, Section};

pub const TYPE_KEY: &str = "type";
pub const BYTES_TAG: &str = "bytes";
pub const DATA_KEY: &str = "data";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Project,
    Script,
    Section,
    Instruction,
    Parameter,
    Link,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        Self::Project,
        Self::Script,
        Self::Section,
        Self::Instruction,
        Self::Parameter,
        Self::Link,
    ];

    pub const fn tag(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Script => "script",
            Self::Section => "section",
            Self::Instruction => "instruction",
            Self::Parameter => "parameter",
            Self::Link => "link",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }
}

/// Borrowed view of any model entity.
#[derive(Clone, Copy, Debug)]
pub enum EntityRef<'a> {
    Project(&'a Project),
    Script(&'a Script),
    Section(&'a Section),
    Instruction(&'a Instruction),
    Parameter(&'a Parameter),
    Link(&'a Link),
}

impl EntityRef<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Project(_) => EntityKind::Project,
            Self::Script(_) => EntityKind::Script,
            Self::Section(_) => EntityKind::Section,
            Self::Instruction(_) => EntityKind::Instruction,
            Self::Parameter(_) => EntityKind::Parameter,
            Self::Link(_) => EntityKind::Link,
        }
    }
}

/// Owned entity produced by decoding.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    Project(Project),
    Script(Script),
    Section(Section),
    Instruction(Instruction),
    Parameter(Parameter),
    Link(Link),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        self.view().kind()
    }

    pub fn view(&self) -> EntityRef<'_> {
        match self {
            Self::Project(node) => EntityRef::Project(node),
            Self::Script(node) => EntityRef::Script(node),
            Self::Section(node) => EntityRef::Section(node),
            Self::Instruction(node) => EntityRef::Instruction(node),
            Self::Parameter(node) => EntityRef::Parameter(node),
            Self::Link(node) => EntityRef::Link(node),
        }
    }
}

/// Model types that have a portable form.
pub trait Portable: Sized {
    const KIND: EntityKind;

    fn from_entity(entity: Entity) -> Option<Self>;
}

macro_rules! portable {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Portable for $ty {
                const KIND: EntityKind = EntityKind::$ty;

                fn from_entity(entity: Entity) -> Option<Self> {
                    match entity {
                        Entity::$ty(node) => Some(node),
                        _ => None,
                    }
                }
            }

            impl<'a> From<&'a $ty> for EntityRef<'a> {
                fn from(node: &'a $ty) -> Self {
                    EntityRef::$ty(node)
                }
            }
        )*
    };
}

portable!(Project, Script, Section, Instruction, Parameter, Link);

// -----------------------------------------------------------------------------
// Encoding
// -----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BytesMode {
    Tagged,
    BareHex,
}

enum Field<'a> {
    Entity(EntityRef<'a>),
    Bytes(&'a [u8]),
    Map(Vec<(&'a str, Field<'a>)>),
    Seq(Vec<Field<'a>>),
    Plain(Value),
}

fn plain<T: Serialize + ?Sized>(value: &T, pointer: &str) -> SctResult<Field<'static>> {
    serde_json::to_value(value)
        .map(Field::Plain)
        .map_err(|err| mismatch(pointer, "serializable value", err.to_string()))
}

/// serde_json writes non-finite floats as `null`, which would not load back.
fn check_finite(value: &ParamValue, pointer: &str) -> SctResult<()> {
    let finite = match value {
        ParamValue::Float(value) => value.is_finite(),
        ParamValue::Operand(Operand::Float { value }) => value.is_finite(),
        _ => true,
    };
    if finite {
        Ok(())
    } else {
        Err(mismatch(pointer, "finite float", "non-finite float"))
    }
}

fn fields<'a>(node: EntityRef<'a>, pointer: &str) -> SctResult<Vec<(&'static str, Field<'a>)>> {
    let at = |key: &str| child_pointer(pointer, key);
    let fields = match node {
        EntityRef::Project(project) => vec![(
            "scripts",
            Field::Map(
                project
                    .scripts()
                    .map(|script| (script.name.as_str(), Field::Entity(script.into())))
                    .collect(),
            ),
        )],
        EntityRef::Script(script) => vec![
            ("name", plain(&script.name, &at("name"))?),
            (
                "sections",
                Field::Seq(
                    script
                        .sections
                        .iter()
                        .map(|section| Field::Entity(section.into()))
                        .collect(),
                ),
            ),
            ("strings", plain(&script.strings, &at("strings"))?),
        ],
        EntityRef::Section(section) => vec![
            ("offset", plain(&section.offset, &at("offset"))?),
            (
                "instructions",
                Field::Seq(
                    section
                        .instructions
                        .iter()
                        .map(|instruction| Field::Entity(instruction.into()))
                        .collect(),
                ),
            ),
        ],
        EntityRef::Instruction(instruction) => vec![
            ("opcode", plain(&instruction.opcode, &at("opcode"))?),
            ("offset", plain(&instruction.offset, &at("offset"))?),
            (
                "params",
                Field::Seq(
                    instruction
                        .params
                        .iter()
                        .map(|param| Field::Entity(param.into()))
                        .collect(),
                ),
            ),
        ],
        EntityRef::Parameter(param) => {
            let value = match &param.value {
                ParamValue::Link(link) => Field::Entity(link.into()),
                ParamValue::Bytes(bytes) => Field::Bytes(bytes),
                other => {
                    check_finite(other, &at("value"))?;
                    plain(other, &at("value"))?
                }
            };
            vec![
                ("kind", plain(&param.kind, &at("kind"))?),
                ("value", value),
                ("raw", Field::Bytes(&param.raw)),
            ]
        }
        EntityRef::Link(link) => vec![
            ("script", plain(&link.script, &at("script"))?),
            ("target", plain(&link.target, &at("target"))?),
            ("offset", plain(&link.offset, &at("offset"))?),
        ],
    };
    Ok(fields)
}

fn walk(field: Field<'_>, mode: BytesMode, pointer: &str) -> SctResult<Value> {
    let value = match field {
        Field::Entity(node) => {
            let mut record = Map::new();
            record.insert(TYPE_KEY.to_string(), Value::from(node.kind().tag()));
            for (key, child) in fields(node, pointer)? {
                record.insert(key.to_string(), walk(child, mode, &child_pointer(pointer, key))?);
            }
            Value::Object(record)
        }
        Field::Bytes(bytes) => match mode {
            BytesMode::Tagged => {
                let mut record = Map::new();
                record.insert(TYPE_KEY.to_string(), Value::from(BYTES_TAG));
                record.insert(DATA_KEY.to_string(), Value::from(encode_hex(bytes)));
                Value::Object(record)
            }
            BytesMode::BareHex => Value::from(encode_hex(bytes)),
        },
        Field::Map(entries) => entries
            .into_iter()
            .map(|(key, child)| Ok((key.to_string(), walk(child, mode, &child_pointer(pointer, key))?)))
            .collect::<SctResult<Map<String, Value>>>()
            .map(Value::Object)?,
        Field::Seq(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, child)| walk(child, mode, &child_pointer(pointer, &index.to_string())))
            .collect::<SctResult<Vec<_>>>()
            .map(Value::Array)?,
        Field::Plain(value) => value,
    };
    Ok(value)
}

/// Converts an entity into its tagged portable tree.
///
/// Fails with the JSON pointer of any value that has no JSON form.
pub fn to_portable<'a>(node: impl Into<EntityRef<'a>>) -> SctResult<Value> {
    walk(Field::Entity(node.into()), BytesMode::Tagged, "")
}

/// Like [`to_portable`] but with byte buffers as bare hex strings.
///
/// The result is for external tools and cannot be decoded again.
pub fn to_export<'a>(node: impl Into<EntityRef<'a>>) -> SctResult<Value> {
    walk(Field::Entity(node.into()), BytesMode::BareHex, "")
}

pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

pub fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|index| {
            text.get(index..index + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
        })
        .collect()
}

// -----------------------------------------------------------------------------
// Decoding
// -----------------------------------------------------------------------------

enum Decoded {
    Entity(Entity),
    Bytes(Vec<u8>),
    Map(BTreeMap<String, Decoded>),
    Seq(Vec<Decoded>),
    Plain(Value),
}

impl Decoded {
    fn describe(&self) -> String {
        match self {
            Self::Entity(entity) => format!("`{}` entity", entity.kind().tag()),
            Self::Bytes(_) => "bytes record".to_string(),
            Self::Map(_) => "object".to_string(),
            Self::Seq(_) => "array".to_string(),
            Self::Plain(value) => json_kind(value).to_string(),
        }
    }

    /// Back to a plain JSON value; tagged records are not plain.
    fn into_plain(self, pointer: &str) -> SctResult<Value> {
        match self {
            Self::Plain(value) => Ok(value),
            Self::Map(entries) => entries
                .into_iter()
                .map(|(key, child)| {
                    let value = child.into_plain(&child_pointer(pointer, &key))?;
                    Ok((key, value))
                })
                .collect::<SctResult<Map<String, Value>>>()
                .map(Value::Object),
            Self::Seq(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, child)| child.into_plain(&child_pointer(pointer, &index.to_string())))
                .collect::<SctResult<Vec<_>>>()
                .map(Value::Array),
            other => Err(SctError::type_mismatch(
                display_pointer(pointer),
                "plain value",
                other.describe(),
            )),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn child_pointer(pointer: &str, key: &str) -> String {
    format!("{pointer}/{}", key.replace('~', "~0").replace('/', "~1"))
}

fn display_pointer(pointer: &str) -> &str {
    if pointer.is_empty() {
        "/"
    } else {
        pointer
    }
}

fn mismatch(pointer: &str, expected: impl Into<String>, found: impl Into<String>) -> SctError {
    SctError::type_mismatch(display_pointer(pointer), expected, found)
}

fn read(value: &Value, pointer: &str) -> SctResult<Decoded> {
    match value {
        Value::Object(map) => match map.get(TYPE_KEY) {
            Some(Value::String(tag)) if tag == BYTES_TAG => read_bytes(map, pointer),
            Some(Value::String(tag)) => {
                let kind = EntityKind::from_tag(tag)
                    .ok_or_else(|| mismatch(pointer, "entity or bytes tag", format!("`{tag}`")))?;
                read_entity(kind, map, pointer).map(Decoded::Entity)
            }
            Some(other) => Err(mismatch(
                &child_pointer(pointer, TYPE_KEY),
                "string tag",
                json_kind(other),
            )),
            None => read_keyed(map, pointer),
        },
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, child)| read(child, &child_pointer(pointer, &index.to_string())))
            .collect::<SctResult<Vec<_>>>()
            .map(Decoded::Seq),
        other => Ok(Decoded::Plain(other.clone())),
    }
}

/// Reads every entry of a map without looking for a type tag, so keys
/// are free to be `type`.
fn read_keyed(map: &Map<String, Value>, pointer: &str) -> SctResult<Decoded> {
    map.iter()
        .map(|(key, child)| Ok((key.clone(), read(child, &child_pointer(pointer, key))?)))
        .collect::<SctResult<BTreeMap<_, _>>>()
        .map(Decoded::Map)
}

fn read_bytes(map: &Map<String, Value>, pointer: &str) -> SctResult<Decoded> {
    if let Some(extra) = map.keys().find(|key| *key != TYPE_KEY && *key != DATA_KEY) {
        return Err(mismatch(
            &child_pointer(pointer, extra),
            "no extra fields on bytes record",
            format!("field `{extra}`"),
        ));
    }
    let data_pointer = child_pointer(pointer, DATA_KEY);
    match map.get(DATA_KEY) {
        Some(Value::String(hex)) => decode_hex(hex)
            .map(Decoded::Bytes)
            .ok_or_else(|| mismatch(&data_pointer, "hex string", "malformed hex")),
        Some(other) => Err(mismatch(&data_pointer, "hex string", json_kind(other))),
        None => Err(mismatch(&data_pointer, "hex string", "nothing")),
    }
}

fn expect_entity<T: Portable>(decoded: Decoded, pointer: &str) -> SctResult<T> {
    match decoded {
        Decoded::Entity(entity) => {
            let found = entity.kind();
            T::from_entity(entity).ok_or_else(|| {
                mismatch(
                    pointer,
                    format!("`{}` entity", T::KIND.tag()),
                    format!("`{}` entity", found.tag()),
                )
            })
        }
        other => Err(mismatch(
            pointer,
            format!("`{}` entity", T::KIND.tag()),
            other.describe(),
        )),
    }
}

/// Fields of one entity record, consumed by the builder for its kind.
struct Record<'p> {
    kind: EntityKind,
    pointer: &'p str,
    fields: BTreeMap<String, Decoded>,
}

impl Record<'_> {
    fn take(&mut self, key: &str) -> SctResult<(Decoded, String)> {
        let pointer = child_pointer(self.pointer, key);
        match self.fields.remove(key) {
            Some(decoded) => Ok((decoded, pointer)),
            None => Err(mismatch(
                &pointer,
                format!("field `{key}` of `{}`", self.kind.tag()),
                "nothing",
            )),
        }
    }

    fn plain<T: DeserializeOwned>(&mut self, key: &str, expected: &str) -> SctResult<T> {
        let (decoded, pointer) = self.take(key)?;
        let value = decoded.into_plain(&pointer)?;
        serde_json::from_value(value).map_err(|err| mismatch(&pointer, expected, err.to_string()))
    }

    fn bytes(&mut self, key: &str) -> SctResult<Vec<u8>> {
        match self.take(key)? {
            (Decoded::Bytes(bytes), _) => Ok(bytes),
            (other, pointer) => Err(mismatch(&pointer, "bytes record", other.describe())),
        }
    }

    fn entity_seq<T: Portable>(&mut self, key: &str) -> SctResult<Vec<T>> {
        match self.take(key)? {
            (Decoded::Seq(items), pointer) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| expect_entity(item, &child_pointer(&pointer, &index.to_string())))
                .collect(),
            (other, pointer) => Err(mismatch(&pointer, "array", other.describe())),
        }
    }

    fn entity_map<T: Portable>(&mut self, key: &str) -> SctResult<Vec<(String, T)>> {
        match self.take(key)? {
            (Decoded::Map(entries), pointer) => entries
                .into_iter()
                .map(|(name, item)| {
                    let node = expect_entity(item, &child_pointer(&pointer, &name))?;
                    Ok((name, node))
                })
                .collect(),
            (other, pointer) => Err(mismatch(&pointer, "object", other.describe())),
        }
    }

    fn finish(self) -> SctResult<()> {
        match self.fields.keys().next() {
            Some(key) => Err(mismatch(
                &child_pointer(self.pointer, key),
                format!("no extra fields on `{}`", self.kind.tag()),
                format!("field `{key}`"),
            )),
            None => Ok(()),
        }
    }
}

fn read_entity(kind: EntityKind, map: &Map<String, Value>, pointer: &str) -> SctResult<Entity> {
    let mut fields = BTreeMap::new();
    for (key, value) in map {
        if key == TYPE_KEY {
            continue;
        }
        let child = child_pointer(pointer, key);
        let decoded = match (kind, key.as_str(), value) {
            // Keyed by script name, never a tagged record.
            (EntityKind::Project, "scripts", Value::Object(entries)) => read_keyed(entries, &child)?,
            _ => read(value, &child)?,
        };
        fields.insert(key.clone(), decoded);
    }
    let mut record = Record {
        kind,
        pointer,
        fields,
    };
    let entity = match kind {
        EntityKind::Project => {
            let scripts = record.entity_map::<Script>("scripts")?;
            record.finish()?;
            let mut project = Project::new();
            for (name, script) in scripts {
                if name != script.name {
                    return Err(SctError::Project(format!(
                        "script stored under `{name}` is named `{}`",
                        script.name
                    )));
                }
                project.add_script(script)?;
            }
            Entity::Project(project)
        }
        EntityKind::Script => {
            let script = Script {
                name: record.plain("name", "string")?,
                sections: record.entity_seq("sections")?,
                strings: record.plain::<Vec<ScriptString>>("strings", "array of strings")?,
            };
            record.finish()?;
            Entity::Script(script)
        }
        EntityKind::Section => {
            let section = Section {
                offset: record.plain("offset", "offset or null")?,
                instructions: record.entity_seq("instructions")?,
            };
            record.finish()?;
            Entity::Section(section)
        }
        EntityKind::Instruction => {
            let instruction = Instruction {
                opcode: record.plain::<Opcode>("opcode", "hex code string")?,
                offset: record.plain("offset", "offset or null")?,
                params: record.entity_seq("params")?,
            };
            record.finish()?;
            Entity::Instruction(instruction)
        }
        EntityKind::Parameter => {
            let kind = record
                .plain::<String>("kind", "parameter type name")?
                .parse::<ParamKind>()?;
            let value = match record.take("value")? {
                (Decoded::Entity(Entity::Link(link)), _) => ParamValue::Link(link),
                (Decoded::Bytes(bytes), _) => ParamValue::Bytes(bytes),
                (Decoded::Entity(other), pointer) => {
                    return Err(mismatch(
                        &pointer,
                        "parameter value",
                        format!("`{}` entity", other.kind().tag()),
                    ))
                }
                (other, pointer) => {
                    let value = serde_json::from_value::<ParamValue>(other.into_plain(&pointer)?)
                        .map_err(|err| mismatch(&pointer, "parameter value", err.to_string()))?;
                    if matches!(value, ParamValue::Link(_) | ParamValue::Bytes(_)) {
                        return Err(mismatch(
                            &pointer,
                            "tagged record",
                            format!("untagged {}", value.variant_name()),
                        ));
                    }
                    value
                }
            };
            let raw = record.bytes("raw")?;
            record.finish()?;
            Entity::Parameter(Parameter { kind, value, raw })
        }
        EntityKind::Link => {
            let link = Link {
                script: record.plain("script", "string")?,
                target: record.plain("target", "`instruction` or `string`")?,
                offset: record.plain("offset", "32-bit offset")?,
            };
            record.finish()?;
            Entity::Link(link)
        }
    };
    Ok(entity)
}

/// Rebuilds an entity of the expected kind from its portable tree.
pub fn from_portable(tree: &Value, kind: EntityKind) -> SctResult<Entity> {
    match read(tree, "")? {
        Decoded::Entity(entity) if entity.kind() == kind => Ok(entity),
        other => Err(mismatch(
            "",
            format!("`{}` entity", kind.tag()),
            other.describe(),
        )),
    }
}

/// Typed form of [`from_portable`].
pub fn from_portable_as<T: Portable>(tree: &Value) -> SctResult<T> {
    expect_entity(read(tree, "")?, "")
}

#[cfg(test)]
#[path = "tests/portable_tests.rs"]
mod tests;
