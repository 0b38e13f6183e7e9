//! Offset layout of a script and link maintenance.
//!
//! Recorded offsets describe where each node sat when the script was last
//! decoded or reflowed. Links resolve against those recorded offsets;
//! [`Script::reflow`] recomputes the layout from node sizes and rewrites
//! every link to the new position of its target.

use std::collections::HashMap;

use tracing::trace;

use super::{Link, LinkTarget, Script};
use crate::codec::{encode_param, ParamValue};
use crate::error::{NodePath, SctError, SctResult};
use crate::version::{SCRIPT_HEADER_BYTES, WORD_BYTES};

/// Node a link lands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedLink {
    Instruction { section: usize, instruction: usize },
    /// An empty section, addressed by where its first instruction would be.
    Section { section: usize },
    String { index: usize },
}

/// Offsets of every node under a packed layout.
#[derive(Debug, Default)]
pub(crate) struct Placement {
    pub sections: Vec<u32>,
    pub instructions: Vec<Vec<u32>>,
    pub string_area: u32,
    pub strings: Vec<u32>,
    pub total: usize,
}

fn to_offset(position: usize) -> SctResult<u32> {
    u32::try_from(position)
        .map_err(|_| SctError::range(format!("script layout exceeds 32-bit offsets at {position}")))
}

impl Script {
    /// Packs sections back to back after the section table, followed by
    /// the NUL-terminated string area.
    pub(crate) fn placement(&self) -> SctResult<Placement> {
        let mut placement = Placement::default();
        let mut cursor = SCRIPT_HEADER_BYTES + self.sections.len() * WORD_BYTES;
        for section in &self.sections {
            placement.sections.push(to_offset(cursor)?);
            let mut offsets = Vec::with_capacity(section.instructions.len());
            for instruction in &section.instructions {
                offsets.push(to_offset(cursor)?);
                cursor += instruction.byte_len();
            }
            placement.instructions.push(offsets);
        }
        placement.string_area = to_offset(cursor)?;
        for entry in &self.strings {
            placement.strings.push(to_offset(cursor)?);
            cursor += entry.text.len() + 1;
        }
        to_offset(cursor)?;
        placement.total = cursor;
        Ok(placement)
    }

    /// Finds the node a link targets under the recorded offsets.
    pub fn resolve_link(&self, link: &Link) -> SctResult<ResolvedLink> {
        if link.script != self.name {
            return Err(SctError::link(
                link.offset,
                format!("points into script `{}`, not `{}`", link.script, self.name),
            ));
        }
        match link.target {
            LinkTarget::Instruction => {
                for (s, section) in self.sections.iter().enumerate() {
                    if let Some(i) = section
                        .instructions
                        .iter()
                        .position(|instruction| instruction.offset == Some(link.offset))
                    {
                        return Ok(ResolvedLink::Instruction {
                            section: s,
                            instruction: i,
                        });
                    }
                }
                self.sections
                    .iter()
                    .position(|section| {
                        section.instructions.is_empty() && section.offset == Some(link.offset)
                    })
                    .map(|section| ResolvedLink::Section { section })
                    .ok_or_else(|| {
                        SctError::link(link.offset, "does not land on an instruction")
                    })
            }
            LinkTarget::String => self
                .strings
                .iter()
                .position(|entry| entry.offset == Some(link.offset))
                .map(|index| ResolvedLink::String { index })
                .ok_or_else(|| SctError::link(link.offset, "does not land on a string")),
        }
    }

    /// Resolves a text link to the raw string it names.
    pub fn link_text(&self, link: &Link) -> SctResult<&str> {
        match self.resolve_link(link)? {
            ResolvedLink::String { index } => Ok(&self.strings[index].text),
            _ => Err(SctError::link(link.offset, "does not name a string")),
        }
    }

    /// Recomputes every offset from node sizes and rewrites links to
    /// follow their targets.
    ///
    /// Fails with a link resolution error, leaving the script untouched,
    /// if any link does not match a recorded offset.
    pub fn reflow(&mut self) -> SctResult<()> {
        let placement = self.placement()?;

        let mut code_moves: HashMap<u32, u32> = HashMap::new();
        for (s, section) in self.sections.iter().enumerate() {
            for (i, instruction) in section.instructions.iter().enumerate() {
                if let Some(old) = instruction.offset {
                    code_moves.entry(old).or_insert(placement.instructions[s][i]);
                }
            }
        }
        // Empty sections are addressable by their start offset.
        for (s, section) in self.sections.iter().enumerate() {
            if !section.instructions.is_empty() {
                continue;
            }
            if let Some(old) = section.offset {
                code_moves.entry(old).or_insert(placement.sections[s]);
            }
        }
        let string_moves: HashMap<u32, u32> = self
            .strings
            .iter()
            .zip(&placement.strings)
            .filter_map(|(entry, new)| entry.offset.map(|old| (old, *new)))
            .collect();

        let root = NodePath::script(&self.name);
        let mut rewrites = Vec::new();
        for (s, section) in self.sections.iter().enumerate() {
            for (i, instruction) in section.instructions.iter().enumerate() {
                for (p, param) in instruction.params.iter().enumerate() {
                    let Some(link) = param.link() else {
                        continue;
                    };
                    let path = root.clone().section(s).instruction(i).parameter(p);
                    if link.script != self.name {
                        return Err(SctError::link(
                            link.offset,
                            format!("points into script `{}`", link.script),
                        )
                        .at(&path));
                    }
                    let moves = match link.target {
                        LinkTarget::Instruction => &code_moves,
                        LinkTarget::String => &string_moves,
                    };
                    let new = moves.get(&link.offset).copied().ok_or_else(|| {
                        SctError::link(link.offset, "target no longer exists").at(&path)
                    })?;
                    if new != link.offset {
                        let moved = ParamValue::Link(Link {
                            offset: new,
                            ..link.clone()
                        });
                        let raw = encode_param(param.kind, &moved).map_err(|err| err.at(&path))?;
                        rewrites.push((s, i, p, moved, raw));
                    }
                }
            }
        }

        trace!(script = %self.name, rewrites = rewrites.len(), "reflow");
        for (s, i, p, value, raw) in rewrites {
            let param = &mut self.sections[s].instructions[i].params[p];
            param.value = value;
            param.raw = raw;
        }
        for (s, section) in self.sections.iter_mut().enumerate() {
            section.offset = Some(placement.sections[s]);
            for (i, instruction) in section.instructions.iter_mut().enumerate() {
                instruction.offset = Some(placement.instructions[s][i]);
            }
        }
        for (entry, offset) in self.strings.iter_mut().zip(&placement.strings) {
            entry.offset = Some(*offset);
        }
        Ok(())
    }
}
