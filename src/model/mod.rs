//! Structural model of a script project.
//!
//! A [`Project`] owns scripts by name; each [`Script`] owns its sections,
//! instructions, parameters, and string table outright. Cross references
//! are plain [`Link`] values naming a script and a byte offset; they are
//! resolved on demand against the recorded layout instead of being held
//! as pointers.

mod binary;
mod layout;
mod project;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use binary::{compute_script_id, script_id_hex, ScriptId};
pub use layout::ResolvedLink;
pub use project::Project;

use crate::codec::{decode_param, encode_param, normalize, ParamKind, ParamValue};
use crate::config::SctConfig;
use crate::error::{NodePath, SctError, SctResult};
use crate::tables::{self, format_code, parse_code, OpcodeInfo};
use crate::text::{dialogue_to_raw, dialogue_to_visible, HeadBody};
use crate::version::INSTRUCTION_HEADER_BYTES;

/// What a link points at inside its script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTarget {
    Instruction,
    String,
}

/// Reference to a byte offset inside a named script.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub script: String,
    pub target: LinkTarget,
    pub offset: u32,
}

impl Link {
    pub fn instruction(script: impl Into<String>, offset: u32) -> Self {
        Self {
            script: script.into(),
            target: LinkTarget::Instruction,
            offset,
        }
    }

    pub fn string(script: impl Into<String>, offset: u32) -> Self {
        Self {
            script: script.into(),
            target: LinkTarget::String,
            offset,
        }
    }
}

/// Instruction opcode. Serialized in canonical `0x%08x` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(pub u32);

impl Opcode {
    pub fn info(self) -> Option<&'static OpcodeInfo> {
        tables::opcode(self.0)
    }

    pub fn mnemonic(self) -> Option<&'static str> {
        self.info().map(|info| info.mnemonic)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_code(self.0))
    }
}

impl Serialize for Opcode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_code(self.0))
    }
}

impl<'de> Deserialize<'de> for Opcode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        parse_code(&key).map(Opcode).map_err(serde::de::Error::custom)
    }
}

/// One typed argument of an instruction, with its exact encoded bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub kind: ParamKind,
    pub value: ParamValue,
    pub raw: Vec<u8>,
}

impl Parameter {
    /// Builds a parameter from a value, encoding it immediately.
    pub fn new(kind: ParamKind, value: ParamValue) -> SctResult<Self> {
        let (value, raw) = normalize(kind, value)?;
        Ok(Self { kind, value, raw })
    }

    pub fn from_raw(kind: ParamKind, raw: Vec<u8>, script: &str) -> SctResult<Self> {
        let value = decode_param(kind, &raw, script)?;
        Ok(Self { kind, value, raw })
    }

    /// Replaces the value, re-encoding the raw bytes. Leaves the parameter
    /// untouched on error.
    pub fn set_value(&mut self, value: ParamValue) -> SctResult<()> {
        let (value, raw) = normalize(self.kind, value)?;
        self.value = value;
        self.raw = raw;
        Ok(())
    }

    pub fn link(&self) -> Option<&Link> {
        self.value.as_link()
    }

    pub fn byte_len(&self) -> usize {
        self.raw.len()
    }

    /// Checks that `raw` is exactly the encoding of `value`.
    pub fn verify(&self) -> SctResult<()> {
        let encoded = encode_param(self.kind, &self.value)?;
        if encoded != self.raw {
            return Err(SctError::decode(format!(
                "raw bytes {:02x?} disagree with {} value encoding {:02x?}",
                self.raw,
                self.value.variant_name(),
                encoded
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Byte offset in the script as last laid out; `None` until placed.
    pub offset: Option<u32>,
    pub params: Vec<Parameter>,
}

impl Instruction {
    pub fn new(opcode: u32, params: Vec<Parameter>) -> Self {
        Self {
            opcode: Opcode(opcode),
            offset: None,
            params,
        }
    }

    pub fn info(&self) -> Option<&'static OpcodeInfo> {
        self.opcode.info()
    }

    pub fn param_len(&self) -> usize {
        self.params.iter().map(Parameter::byte_len).sum()
    }

    pub fn byte_len(&self) -> usize {
        INSTRUCTION_HEADER_BYTES + self.param_len()
    }

    pub fn parameter(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub offset: Option<u32>,
    pub instructions: Vec<Instruction>,
}

impl Section {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            offset: None,
            instructions,
        }
    }

    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn byte_len(&self) -> usize {
        self.instructions.iter().map(Instruction::byte_len).sum()
    }
}

/// Entry of a script's string table, kept in raw form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptString {
    pub offset: Option<u32>,
    pub text: String,
}

impl ScriptString {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            offset: None,
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub name: String,
    pub sections: Vec<Section>,
    pub strings: Vec<ScriptString>,
}

impl Script {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sections: Vec::new(),
            strings: Vec::new(),
        }
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn string(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(|entry| entry.text.as_str())
    }

    pub fn instruction_count(&self) -> usize {
        self.sections.iter().map(|section| section.instructions.len()).sum()
    }

    fn root(&self) -> NodePath {
        NodePath::script(&self.name)
    }

    /// Appends a string and places it; returns its index.
    pub fn push_string(&mut self, text: impl Into<String>) -> SctResult<usize> {
        let text = text.into();
        check_string(&text).map_err(|err| err.at(&self.root()))?;
        self.strings.push(ScriptString::new(text));
        if let Err(err) = self.reflow() {
            self.strings.pop();
            return Err(err);
        }
        Ok(self.strings.len() - 1)
    }

    /// Replaces the raw text of a string and moves everything after it.
    pub fn set_string(&mut self, index: usize, text: impl Into<String>) -> SctResult<()> {
        let root = self.root();
        let text = text.into();
        check_string(&text).map_err(|err| err.at(&root))?;
        let entry = self
            .strings
            .get_mut(index)
            .ok_or(SctError::NodeNotFound(root))?;
        let previous = std::mem::replace(&mut entry.text, text);
        if let Err(err) = self.reflow() {
            self.strings[index].text = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Visible header and body of a dialogue string.
    pub fn dialogue(&self, index: usize) -> SctResult<HeadBody> {
        self.string(index)
            .map(dialogue_to_visible)
            .ok_or_else(|| SctError::NodeNotFound(self.root()))
    }

    /// Stores visible dialogue parts back as one raw framed string.
    pub fn set_dialogue(&mut self, index: usize, visible: &HeadBody) -> SctResult<()> {
        self.set_string(index, dialogue_to_raw(visible))
    }

    /// Validates with the default configuration, which rejects unknown
    /// opcodes.
    pub fn validate(&self) -> SctResult<()> {
        self.validate_with_config(&SctConfig::default())
    }

    /// Checks opcode signatures, parameter encodings, string contents, and
    /// every link. A script that passes encodes to bytes that decode again
    /// under the same configuration.
    pub fn validate_with_config(&self, config: &SctConfig) -> SctResult<()> {
        let root = self.root();
        for (s, section) in self.sections.iter().enumerate() {
            for (i, instruction) in section.instructions.iter().enumerate() {
                let at = root.clone().section(s).instruction(i);
                check_signature(instruction, config.strict_opcodes).map_err(|err| err.at(&at))?;
                for (p, param) in instruction.params.iter().enumerate() {
                    let path = at.clone().parameter(p);
                    param.verify().map_err(|err| err.at(&path))?;
                    if let Some(link) = param.link() {
                        self.resolve_link(link).map_err(|err| err.at(&path))?;
                    }
                }
            }
        }
        for entry in &self.strings {
            check_string(&entry.text).map_err(|err| err.at(&root))?;
        }
        Ok(())
    }
}

fn kind_list(kinds: &[ParamKind]) -> String {
    let names: Vec<&str> = kinds.iter().map(|kind| kind.name()).collect();
    format!("({})", names.join(", "))
}

/// Parameter kinds must be exactly what the binary reader would produce
/// for this opcode.
fn check_signature(instruction: &Instruction, strict_opcodes: bool) -> SctResult<()> {
    let kinds: Vec<ParamKind> = instruction.params.iter().map(|param| param.kind).collect();
    match instruction.info() {
        Some(info) if kinds.as_slice() != info.params => Err(SctError::decode(format!(
            "{} expects parameters {}, found {}",
            info.mnemonic,
            kind_list(info.params),
            kind_list(&kinds)
        ))),
        Some(_) => Ok(()),
        None if strict_opcodes => Err(SctError::decode(format!(
            "unknown opcode {}",
            instruction.opcode
        ))),
        None if kinds.is_empty() || kinds == [ParamKind::Blob] => Ok(()),
        None => Err(SctError::decode(format!(
            "unknown opcode {} carries parameters {}, expected at most one blob",
            instruction.opcode,
            kind_list(&kinds)
        ))),
    }
}

fn check_string(text: &str) -> SctResult<()> {
    if text.contains('\0') {
        return Err(SctError::range("strings cannot contain NUL"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/model_tests.rs"]
mod tests;
