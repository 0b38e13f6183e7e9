//! Human-readable rendering of instructions.
//!
//! Comparisons read as conditional branches, arithmetic as expressions
//! with constant folding when both sides are plain decimals, and
//! everything else as `mnemonic arg, arg`.

use std::fmt::Write as _;

use crate::codec::{Operand, ParamValue};
use crate::model::{Instruction, LinkTarget, Parameter, Script};
use crate::tables::{format_code, operator, secondary_name, OpcodeClass};
use crate::text::dialogue_to_visible;

/// Longest visible text shown inline before eliding.
const TEXT_PREVIEW_CHARS: usize = 32;

pub fn describe_operand(opcode: u32, operand: &Operand) -> String {
    if let Operand::GlobalWord { .. } = operand {
        if let Some(name) = operand
            .to_word()
            .ok()
            .and_then(|word| secondary_name(opcode, word))
        {
            return name.to_string();
        }
    }
    operand.to_string()
}

pub fn describe_parameter(opcode: u32, param: &Parameter) -> String {
    match &param.value {
        ParamValue::Word(word) => format_code(*word),
        ParamValue::Operand(operand) => describe_operand(opcode, operand),
        ParamValue::Code(code) => operator(*code)
            .map(|info| info.symbol.to_string())
            .unwrap_or_else(|| format_code(*code)),
        ParamValue::Float(value) => format!("{value}f"),
        ParamValue::Link(link) => match link.target {
            LinkTarget::Instruction => format_code(link.offset),
            LinkTarget::String => format!("str@{}", format_code(link.offset)),
        },
        ParamValue::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

fn operand_of(param: Option<&Parameter>) -> Option<&Operand> {
    match param.map(|param| &param.value) {
        Some(ParamValue::Operand(operand)) => Some(operand),
        _ => None,
    }
}

/// Renders one instruction on its own.
pub fn describe_instruction(instruction: &Instruction) -> String {
    describe_with(instruction, |opcode, param| describe_parameter(opcode, param))
}

fn describe_with(
    instruction: &Instruction,
    render: impl Fn(u32, &Parameter) -> String,
) -> String {
    let opcode = instruction.opcode.0;
    let args: Vec<String> = instruction
        .params
        .iter()
        .map(|param| render(opcode, param))
        .collect();
    let arg = |index: usize| args.get(index).map(String::as_str).unwrap_or("?");

    let Some(info) = instruction.info() else {
        return format!("op_{} {}", format_code(opcode), args.join(", "))
            .trim_end()
            .to_string();
    };
    match info.class {
        OpcodeClass::Compare => {
            let condition = operator(opcode)
                .map(|op| op.render(arg(0), arg(1)))
                .unwrap_or_else(|| format!("{} {}", arg(0), arg(1)));
            format!("if {condition} else goto {}", arg(2))
        }
        OpcodeClass::Arithmetic => {
            let lhs = operand_of(instruction.params.first());
            let rhs = operand_of(instruction.params.get(1));
            if lhs.is_some_and(Operand::is_no_loop) || rhs.is_some_and(Operand::is_no_loop) {
                return format!("{} (no-loop)", arg(0));
            }
            let Some(op) = operator(opcode) else {
                return format!("{} {}", info.mnemonic, args.join(", "));
            };
            let mut out = op.render(arg(0), arg(1));
            let folded = lhs
                .and_then(Operand::immediate)
                .zip(rhs.and_then(Operand::immediate))
                .and_then(|(a, b)| op.apply(a, b));
            if let Some(result) = folded {
                let _ = write!(out, " (= {result})");
            }
            out
        }
        OpcodeClass::Assign => format!("{} = {}", arg(0), arg(1)),
        OpcodeClass::Calc => {
            let code = match instruction.params.get(1).map(|param| &param.value) {
                Some(ParamValue::Code(code)) => operator(*code),
                _ => None,
            };
            match code {
                Some(op) => format!("{} = {}", arg(0), op.render(arg(0), arg(2))),
                None => format!("{} {} {}", arg(0), arg(1), arg(2)),
            }
        }
        OpcodeClass::Jump | OpcodeClass::Message | OpcodeClass::Plain => {
            format!("{} {}", info.mnemonic, args.join(", "))
                .trim_end()
                .to_string()
        }
    }
}

fn preview(raw: &str) -> String {
    let dialogue = dialogue_to_visible(raw);
    let body = dialogue.body.replace('\n', " ");
    let body = body.trim();
    let shown = if body.chars().count() <= TEXT_PREVIEW_CHARS {
        body.to_string()
    } else {
        let cut: String = body.chars().take(TEXT_PREVIEW_CHARS).collect();
        format!("{cut}...")
    };
    if dialogue.header.is_empty() {
        format!("\"{shown}\"")
    } else {
        format!("{}: \"{shown}\"", dialogue.header)
    }
}

impl Script {
    /// Renders an instruction with string links shown as visible text.
    pub fn describe_instruction(&self, instruction: &Instruction) -> String {
        describe_with(instruction, |opcode, param| match param.link() {
            Some(link) if link.target == LinkTarget::String => self
                .link_text(link)
                .map(preview)
                .unwrap_or_else(|_| describe_parameter(opcode, param)),
            _ => describe_parameter(opcode, param),
        })
    }

    /// One line per instruction, prefixed with its recorded offset.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (index, section) in self.sections.iter().enumerate() {
            let _ = writeln!(out, "section {index}:");
            for instruction in &section.instructions {
                let offset = instruction
                    .offset
                    .map(format_code)
                    .unwrap_or_else(|| "----------".to_string());
                let _ = writeln!(out, "  {offset}  {}", self.describe_instruction(instruction));
            }
        }
        out
    }
}
