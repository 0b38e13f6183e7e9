//! SCT binary reader and writer.
//!
//! Layout, all words little-endian:
//!
//! ```text
//! u32 section_count
//! u32 string_area_offset
//! u32 section_offset[section_count]
//! sections, back to back: { u32 opcode, u32 param_len, params[param_len] }*
//! string area: NUL-terminated UTF-8 strings up to end of file
//! ```
//!
//! Every byte belongs to exactly one node, so decoding then encoding an
//! unmodified script reproduces the input.

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{Instruction, Opcode, Parameter, Script, ScriptString, Section};
use crate::codec::ParamKind;
use crate::config::{Limits, SctConfig};
use crate::error::{NodePath, SctError, SctResult};
use crate::tables::{self, format_code};
use crate::version::{INSTRUCTION_HEADER_BYTES, SCRIPT_HEADER_BYTES, WORD_BYTES};

/// SHA-256 of a script's encoded bytes.
pub type ScriptId = [u8; 32];

pub fn compute_script_id(bytes: &[u8]) -> ScriptId {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

pub fn script_id_hex(id: &ScriptId) -> String {
    id.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn word_at(input: &[u8], position: usize) -> SctResult<u32> {
    let end = position
        .checked_add(WORD_BYTES)
        .filter(|end| *end <= input.len())
        .ok_or_else(|| {
            SctError::decode(format!(
                "truncated word at {position:#x} in {} byte input",
                input.len()
            ))
        })?;
    let mut array = [0u8; WORD_BYTES];
    array.copy_from_slice(&input[position..end]);
    Ok(u32::from_le_bytes(array))
}

fn push_word(output: &mut Vec<u8>, word: u32) {
    output.extend_from_slice(&word.to_le_bytes());
}

struct Reader<'a> {
    input: &'a [u8],
    name: &'a str,
    limits: &'a Limits,
    strict_opcodes: bool,
    instructions: usize,
}

impl<'a> Reader<'a> {
    fn root(&self) -> NodePath {
        NodePath::script(self.name)
    }

    fn section(&mut self, index: usize, start: usize, end: usize) -> SctResult<Section> {
        let mut instructions = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let path = self.root().section(index).instruction(instructions.len());
            if end - cursor < INSTRUCTION_HEADER_BYTES {
                return Err(SctError::decode(format!(
                    "truncated instruction header at {cursor:#x}"
                ))
                .at(&path));
            }
            self.instructions += 1;
            if self.instructions > self.limits.max_instructions {
                return Err(SctError::ResourceLimit(format!(
                    "script `{}` has more than {} instructions",
                    self.name, self.limits.max_instructions
                )));
            }
            let opcode = word_at(self.input, cursor)?;
            let param_len = word_at(self.input, cursor + WORD_BYTES)? as usize;
            let params_start = cursor + INSTRUCTION_HEADER_BYTES;
            let params_end = params_start
                .checked_add(param_len)
                .filter(|params_end| *params_end <= end)
                .ok_or_else(|| {
                    SctError::decode(format!(
                        "{param_len} parameter bytes at {cursor:#x} run past the section end {end:#x}"
                    ))
                    .at(&path)
                })?;
            let params = self
                .params(opcode, &self.input[params_start..params_end], &path)
                .map_err(|err| err.at(&path))?;
            instructions.push(Instruction {
                opcode: Opcode(opcode),
                offset: Some(cursor as u32),
                params,
            });
            cursor = params_end;
        }
        Ok(Section {
            offset: Some(start as u32),
            instructions,
        })
    }

    fn params(&self, opcode: u32, bytes: &[u8], path: &NodePath) -> SctResult<Vec<Parameter>> {
        let Some(info) = tables::opcode(opcode) else {
            if self.strict_opcodes {
                return Err(SctError::decode(format!(
                    "unknown opcode {}",
                    format_code(opcode)
                )));
            }
            warn!(script = self.name, opcode = %format_code(opcode), "unknown opcode kept as blob");
            if bytes.is_empty() {
                return Ok(Vec::new());
            }
            return Ok(vec![Parameter::from_raw(
                ParamKind::Blob,
                bytes.to_vec(),
                self.name,
            )?]);
        };
        if bytes.len() != info.param_len() {
            return Err(SctError::decode(format!(
                "{} expects {} parameter bytes, found {}",
                info.mnemonic,
                info.param_len(),
                bytes.len()
            )));
        }
        let mut params = Vec::with_capacity(info.params.len());
        let mut cursor = 0;
        for (index, kind) in info.params.iter().enumerate() {
            let width = kind.fixed_width().unwrap_or(bytes.len() - cursor);
            let raw = bytes[cursor..cursor + width].to_vec();
            let param = Parameter::from_raw(*kind, raw, self.name)
                .map_err(|err| err.at(&path.clone().parameter(index)))?;
            params.push(param);
            cursor += width;
        }
        Ok(params)
    }

    fn strings(&self, start: usize) -> SctResult<Vec<ScriptString>> {
        let area = &self.input[start..];
        let Some((last, body)) = area.split_last() else {
            return Ok(Vec::new());
        };
        if *last != 0 {
            return Err(SctError::decode("string area is not NUL-terminated").at(&self.root()));
        }
        let mut strings = Vec::new();
        let mut offset = start;
        for chunk in body.split(|byte| *byte == 0) {
            if chunk.len() > self.limits.max_string_bytes {
                return Err(SctError::ResourceLimit(format!(
                    "string at {offset:#x} in `{}` exceeds {} bytes",
                    self.name, self.limits.max_string_bytes
                )));
            }
            let text = std::str::from_utf8(chunk).map_err(|err| {
                SctError::decode(format!("string at {offset:#x} is not UTF-8: {err}"))
                    .at(&self.root())
            })?;
            strings.push(ScriptString {
                offset: Some(offset as u32),
                text: text.to_string(),
            });
            offset += chunk.len() + 1;
        }
        Ok(strings)
    }
}

impl Script {
    /// Decodes a script binary with the default configuration.
    pub fn from_bytes(name: impl Into<String>, input: &[u8]) -> SctResult<Self> {
        Self::from_bytes_with_config(name, input, &SctConfig::default())
    }

    pub fn from_bytes_with_config(
        name: impl Into<String>,
        input: &[u8],
        config: &SctConfig,
    ) -> SctResult<Self> {
        let name = name.into();
        let limits = &config.limits;
        let root = NodePath::script(&name);
        if input.len() > limits.max_script_bytes {
            return Err(SctError::ResourceLimit(format!(
                "script `{name}` is {} bytes, limit is {}",
                input.len(),
                limits.max_script_bytes
            )));
        }
        // Every offset must fit the 32-bit words that store it.
        if u32::try_from(input.len()).is_err() {
            return Err(SctError::decode("script exceeds 32-bit offsets").at(&root));
        }

        let section_count = word_at(input, 0).map_err(|err| err.at(&root))? as usize;
        let string_area = word_at(input, WORD_BYTES).map_err(|err| err.at(&root))? as usize;
        if section_count > limits.max_sections {
            return Err(SctError::ResourceLimit(format!(
                "script `{name}` declares {section_count} sections, limit is {}",
                limits.max_sections
            )));
        }
        let table_end = SCRIPT_HEADER_BYTES + section_count * WORD_BYTES;
        if table_end > input.len() {
            return Err(SctError::decode(format!(
                "section table of {section_count} entries runs past end of input"
            ))
            .at(&root));
        }
        if string_area < table_end || string_area > input.len() {
            return Err(SctError::decode(format!(
                "string area offset {string_area:#x} outside {table_end:#x}..={:#x}",
                input.len()
            ))
            .at(&root));
        }

        let mut starts = Vec::with_capacity(section_count);
        for index in 0..section_count {
            let start = word_at(input, SCRIPT_HEADER_BYTES + index * WORD_BYTES)? as usize;
            let expected_min = starts.last().copied().unwrap_or(table_end);
            if (index == 0 && start != table_end) || start < expected_min || start > string_area {
                return Err(SctError::decode(format!(
                    "section offset {start:#x} leaves a gap or overlaps (expected at least {expected_min:#x})"
                ))
                .at(&root.clone().section(index)));
            }
            starts.push(start);
        }
        if section_count == 0 && string_area != table_end {
            return Err(SctError::decode(format!(
                "{} bytes between header and string area belong to no section",
                string_area - table_end
            ))
            .at(&root));
        }

        let mut reader = Reader {
            input,
            name: &name,
            limits,
            strict_opcodes: config.strict_opcodes,
            instructions: 0,
        };
        let mut sections = Vec::with_capacity(section_count);
        for (index, start) in starts.iter().enumerate() {
            let end = starts.get(index + 1).copied().unwrap_or(string_area);
            sections.push(reader.section(index, *start, end)?);
        }
        let strings = reader.strings(string_area)?;

        let script = Script {
            name,
            sections,
            strings,
        };
        script.validate_with_config(config)?;
        debug!(
            script = %script.name,
            sections = script.sections.len(),
            instructions = script.instruction_count(),
            strings = script.strings.len(),
            "decoded script"
        );
        Ok(script)
    }

    /// Encodes the script, laying it out afresh. The script itself keeps
    /// its recorded offsets.
    pub fn to_bytes(&self) -> SctResult<Vec<u8>> {
        let mut packed = self.clone();
        packed.reflow()?;
        packed.write()
    }

    fn write(&self) -> SctResult<Vec<u8>> {
        let placement = self.placement()?;
        let root = NodePath::script(&self.name);
        let mut output = Vec::with_capacity(placement.total);
        push_word(&mut output, self.sections.len() as u32);
        push_word(&mut output, placement.string_area);
        for offset in &placement.sections {
            push_word(&mut output, *offset);
        }
        for (s, section) in self.sections.iter().enumerate() {
            for (i, instruction) in section.instructions.iter().enumerate() {
                let param_len = u32::try_from(instruction.param_len()).map_err(|_| {
                    SctError::range("parameter area exceeds 32 bits")
                        .at(&root.clone().section(s).instruction(i))
                })?;
                push_word(&mut output, instruction.opcode.0);
                push_word(&mut output, param_len);
                for param in &instruction.params {
                    output.extend_from_slice(&param.raw);
                }
            }
        }
        for entry in &self.strings {
            output.extend_from_slice(entry.text.as_bytes());
            output.push(0);
        }
        Ok(output)
    }

    /// Content hash of the encoded script.
    pub fn script_id(&self) -> SctResult<ScriptId> {
        self.to_bytes().map(|bytes| compute_script_id(&bytes))
    }
}
