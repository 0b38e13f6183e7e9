//! Static code tables for the SCT instruction set.
//!
//! Everything here is immutable data fixed at compile time. Keys are
//! 32-bit codes; string lookups accept any casing and width and
//! canonicalize to `0x` plus eight lowercase hex digits.

use serde::{Deserialize, Serialize};

use crate::codec::ParamKind;
use crate::codec::ParamKind::{Float, Input, Offset, Operator, Text, Word};
use crate::error::{SctError, SctResult};

/// Renders a code in canonical form, e.g. `0x0000000b`.
pub fn format_code(code: u32) -> String {
    format!("{code:#010x}")
}

/// Parses a hex code with or without `0x`, in any case.
pub fn parse_code(key: &str) -> SctResult<u32> {
    let trimmed = key.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(SctError::decode(format!("invalid code `{key}`")));
    }
    u32::from_str_radix(digits, 16).map_err(|_| SctError::decode(format!("invalid code `{key}`")))
}

pub fn canonical_code(key: &str) -> SctResult<String> {
    parse_code(key).map(format_code)
}

// -----------------------------------------------------------------------------
// Operators
// -----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorClass {
    Comparison,
    Arithmetic,
}

/// Mask used by the case-folding equality comparison.
pub const BIT5_EQUALITY_MASK: i64 = 0x20;

#[derive(Debug)]
pub struct OperatorInfo {
    pub code: u32,
    pub class: OperatorClass,
    pub mnemonic: &'static str,
    pub symbol: &'static str,
    template: &'static str,
}

impl OperatorInfo {
    /// Renders the operator applied to two already formatted operands.
    pub fn render(&self, lhs: &str, rhs: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + lhs.len() + rhs.len());
        let mut rest = self.template;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            match rest.get(start..start + 3) {
                Some("{a}") => out.push_str(lhs),
                Some("{b}") => out.push_str(rhs),
                _ => {
                    out.push('{');
                    rest = &rest[start + 1..];
                    continue;
                }
            }
            rest = &rest[start + 3..];
        }
        out.push_str(rest);
        out
    }

    /// Evaluates the operator on two integers; comparisons yield 0 or 1.
    ///
    /// Returns `None` on overflow, division by zero, or a shift out of range.
    pub fn apply(&self, a: i64, b: i64) -> Option<i64> {
        let bit = |a: i64, b: i64| {
            u32::try_from(b)
                .ok()
                .and_then(|shift| a.checked_shr(shift))
                .map(|v| v & 1)
        };
        match self.code {
            0x00 => Some(i64::from(a == b)),
            0x01 => Some(i64::from(a != b)),
            0x02 => Some(i64::from(a > b)),
            0x03 => Some(i64::from(a >= b)),
            0x04 => Some(i64::from(a < b)),
            0x05 => Some(i64::from(a <= b)),
            0x06 => Some(i64::from((a & b) != 0)),
            0x07 => Some(i64::from((a & b) == 0)),
            0x08 => bit(a, b),
            0x09 => bit(a, b).map(|v| 1 - v),
            0x0a => Some(i64::from(
                (a | BIT5_EQUALITY_MASK) == (b | BIT5_EQUALITY_MASK),
            )),
            0x0b => a.checked_mul(b),
            0x0c => a.checked_div(b),
            0x0d => a.checked_rem(b),
            0x0e => a.checked_add(b),
            0x0f => a.checked_sub(b),
            _ => None,
        }
    }
}

const fn cmp(
    code: u32,
    mnemonic: &'static str,
    symbol: &'static str,
    template: &'static str,
) -> OperatorInfo {
    OperatorInfo {
        code,
        class: OperatorClass::Comparison,
        mnemonic,
        symbol,
        template,
    }
}

const fn arith(
    code: u32,
    mnemonic: &'static str,
    symbol: &'static str,
    template: &'static str,
) -> OperatorInfo {
    OperatorInfo {
        code,
        class: OperatorClass::Arithmetic,
        mnemonic,
        symbol,
        template,
    }
}

pub static COMPARISON_CODES: [OperatorInfo; 11] = [
    cmp(0x00, "eq", "==", "{a} == {b}"),
    cmp(0x01, "ne", "!=", "{a} != {b}"),
    cmp(0x02, "gt", ">", "{a} > {b}"),
    cmp(0x03, "ge", ">=", "{a} >= {b}"),
    cmp(0x04, "lt", "<", "{a} < {b}"),
    cmp(0x05, "le", "<=", "{a} <= {b}"),
    cmp(0x06, "and", "&", "({a} & {b}) != 0"),
    cmp(0x07, "nand", "!&", "({a} & {b}) == 0"),
    cmp(0x08, "bit_on", "bit", "(({a} >> {b}) & 1) == 1"),
    cmp(0x09, "bit_off", "!bit", "(({a} >> {b}) & 1) == 0"),
    cmp(0x0a, "eq_b5", "==|0x20", "({a} | 0x20) == ({b} | 0x20)"),
];

pub static ARITHMETIC_CODES: [OperatorInfo; 5] = [
    arith(0x0b, "mul", "*", "{a} * {b}"),
    arith(0x0c, "div", "/", "{a} / {b}"),
    arith(0x0d, "mod", "%", "{a} % {b}"),
    arith(0x0e, "add", "+", "{a} + {b}"),
    arith(0x0f, "sub", "-", "{a} - {b}"),
];

pub fn operator(code: u32) -> Option<&'static OperatorInfo> {
    COMPARISON_CODES
        .iter()
        .chain(ARITHMETIC_CODES.iter())
        .find(|info| info.code == code)
}

pub fn lookup_operator(key: &str) -> SctResult<&'static OperatorInfo> {
    let code = parse_code(key)?;
    operator(code)
        .ok_or_else(|| SctError::decode(format!("unknown operator code {}", format_code(code))))
}

// -----------------------------------------------------------------------------
// No-loop sentinels
// -----------------------------------------------------------------------------

/// Operand words that make the engine return the first operand at once
/// instead of entering its per-frame instruction loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentinel {
    FloatMax,
    FloatMinPositive,
    IntMax,
}

impl Sentinel {
    pub const fn raw(self) -> u32 {
        match self {
            Self::FloatMax => 0x7f7f_ffff,
            Self::FloatMinPositive => 0x0080_0000,
            Self::IntMax => 0x7fff_ffff,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::FloatMax => "FLT_MAX",
            Self::FloatMinPositive => "FLT_MIN",
            Self::IntMax => "INT_MAX",
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        NO_LOOP_SENTINELS
            .iter()
            .copied()
            .find(|sentinel| sentinel.raw() == raw)
    }
}

pub static NO_LOOP_SENTINELS: [Sentinel; 3] =
    [Sentinel::FloatMax, Sentinel::FloatMinPositive, Sentinel::IntMax];

// -----------------------------------------------------------------------------
// Input cutoffs
// -----------------------------------------------------------------------------

pub const SYSTEM_WORD_BASE: u32 = 0x8030_0000;
pub const GLOBAL_WORD_BASE: u32 = 0x8031_0000;
pub const BYTE_BASE: u32 = 0x8032_0000;
pub const FLAG_BASE: u32 = 0x8033_0000;

/// Fractional bits of the fixed-point float band.
pub const FLOAT_FRACTION_BITS: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEncoding {
    WordRelative,
    ByteRelative,
    BitAddressed,
    Decimal,
    Float,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Band {
    SystemWord,
    GlobalWord,
    Byte,
    Flag,
    Decimal,
    Float,
}

#[derive(Debug)]
pub struct CutoffBand {
    pub band: Band,
    pub threshold: u32,
    /// First word past the band.
    pub limit: u32,
    pub encoding: InputEncoding,
    /// Address of offset zero for the memory-relative encodings.
    pub base: u32,
    pub label: &'static str,
}

impl CutoffBand {
    pub const fn width(&self) -> u32 {
        self.limit - self.threshold
    }
}

/// Ordered by descending threshold; the first band whose threshold the
/// word reaches wins.
pub static INPUT_CUTOFFS: [CutoffBand; 6] = [
    CutoffBand {
        band: Band::SystemWord,
        threshold: 0x5000_0000,
        limit: 0x8000_0000,
        encoding: InputEncoding::WordRelative,
        base: SYSTEM_WORD_BASE,
        label: "sys",
    },
    CutoffBand {
        band: Band::GlobalWord,
        threshold: 0x4000_0000,
        limit: 0x5000_0000,
        encoding: InputEncoding::WordRelative,
        base: GLOBAL_WORD_BASE,
        label: "var",
    },
    CutoffBand {
        band: Band::Byte,
        threshold: 0x2000_0000,
        limit: 0x4000_0000,
        encoding: InputEncoding::ByteRelative,
        base: BYTE_BASE,
        label: "byte",
    },
    CutoffBand {
        band: Band::Flag,
        threshold: 0x1000_0000,
        limit: 0x2000_0000,
        encoding: InputEncoding::BitAddressed,
        base: FLAG_BASE,
        label: "flag",
    },
    CutoffBand {
        band: Band::Decimal,
        threshold: 0x0800_0000,
        limit: 0x1000_0000,
        encoding: InputEncoding::Decimal,
        base: 0,
        label: "dec",
    },
    CutoffBand {
        band: Band::Float,
        threshold: 0x0400_0000,
        limit: 0x0800_0000,
        encoding: InputEncoding::Float,
        base: 0,
        label: "float",
    },
];

/// Selects the band for a raw operand word.
pub fn cutoff_for(raw: u32) -> Option<&'static CutoffBand> {
    INPUT_CUTOFFS
        .iter()
        .find(|band| raw >= band.threshold)
        .filter(|band| raw < band.limit)
}

pub fn band_info(band: Band) -> &'static CutoffBand {
    match band {
        Band::SystemWord => &INPUT_CUTOFFS[0],
        Band::GlobalWord => &INPUT_CUTOFFS[1],
        Band::Byte => &INPUT_CUTOFFS[2],
        Band::Flag => &INPUT_CUTOFFS[3],
        Band::Decimal => &INPUT_CUTOFFS[4],
        Band::Float => &INPUT_CUTOFFS[5],
    }
}

// -----------------------------------------------------------------------------
// Secondary codes
// -----------------------------------------------------------------------------

#[derive(Debug)]
pub struct GlobalVariable {
    pub code: u32,
    pub name: &'static str,
}

const fn global(code: u32, name: &'static str) -> GlobalVariable {
    GlobalVariable { code, name }
}

pub static SECONDARY_CODES: [GlobalVariable; 14] = [
    global(0x4000_0000, "gold"),
    global(0x4000_0001, "reputation"),
    global(0x4000_0010, "hp[Vyse]"),
    global(0x4000_0011, "hp[Aika]"),
    global(0x4000_0012, "hp[Fina]"),
    global(0x4000_0013, "hp[Drachma]"),
    global(0x4000_0014, "hp[Enrique]"),
    global(0x4000_0015, "hp[Gilder]"),
    global(0x4000_0020, "level[Vyse]"),
    global(0x4000_0021, "level[Aika]"),
    global(0x4000_0022, "level[Fina]"),
    global(0x4000_0023, "level[Drachma]"),
    global(0x4000_0024, "level[Enrique]"),
    global(0x4000_0025, "level[Gilder]"),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpcodeGuard {
    AtMost(u32),
    Below(u32),
    Exactly(u32),
}

impl OpcodeGuard {
    pub const fn admits(self, opcode: u32) -> bool {
        match self {
            Self::AtMost(code) => opcode <= code,
            Self::Below(code) => opcode < code,
            Self::Exactly(code) => opcode == code,
        }
    }
}

/// Opcodes whose operands may name global variables.
pub static SECONDARY_GUARDS: [OpcodeGuard; 3] = [
    OpcodeGuard::AtMost(0x07),
    OpcodeGuard::Below(0x21),
    OpcodeGuard::Exactly(0x4a),
];

pub fn secondary_applies(opcode: u32) -> bool {
    SECONDARY_GUARDS.iter().any(|guard| guard.admits(opcode))
}

pub fn global_variable(code: u32) -> Option<&'static GlobalVariable> {
    SECONDARY_CODES.iter().find(|var| var.code == code)
}

/// Name of the global variable an operand refers to, if the opcode allows it.
pub fn secondary_name(opcode: u32, sub_code: u32) -> Option<&'static str> {
    if !secondary_applies(opcode) {
        return None;
    }
    global_variable(sub_code).map(|var| var.name)
}

pub fn lookup_global(key: &str) -> SctResult<Option<&'static GlobalVariable>> {
    parse_code(key).map(global_variable)
}

// -----------------------------------------------------------------------------
// Opcode signatures
// -----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpcodeClass {
    Compare,
    Arithmetic,
    Assign,
    Calc,
    Jump,
    Message,
    Plain,
}

#[derive(Debug)]
pub struct OpcodeInfo {
    pub code: u32,
    pub mnemonic: &'static str,
    pub class: OpcodeClass,
    pub params: &'static [ParamKind],
}

impl OpcodeInfo {
    /// Byte length of the parameter area for this signature.
    pub fn param_len(&self) -> usize {
        self.params
            .iter()
            .map(|kind| kind.fixed_width().unwrap_or(0))
            .sum()
    }
}

const COMPARE: &[ParamKind] = &[Input, Input, Offset];
const BINARY: &[ParamKind] = &[Input, Input];

const fn op(
    code: u32,
    mnemonic: &'static str,
    class: OpcodeClass,
    params: &'static [ParamKind],
) -> OpcodeInfo {
    OpcodeInfo {
        code,
        mnemonic,
        class,
        params,
    }
}

/// Sorted by code.
pub static OPCODES: [OpcodeInfo; 30] = [
    op(0x00, "if_eq", OpcodeClass::Compare, COMPARE),
    op(0x01, "if_ne", OpcodeClass::Compare, COMPARE),
    op(0x02, "if_gt", OpcodeClass::Compare, COMPARE),
    op(0x03, "if_ge", OpcodeClass::Compare, COMPARE),
    op(0x04, "if_lt", OpcodeClass::Compare, COMPARE),
    op(0x05, "if_le", OpcodeClass::Compare, COMPARE),
    op(0x06, "if_and", OpcodeClass::Compare, COMPARE),
    op(0x07, "if_nand", OpcodeClass::Compare, COMPARE),
    op(0x08, "if_bit_on", OpcodeClass::Compare, COMPARE),
    op(0x09, "if_bit_off", OpcodeClass::Compare, COMPARE),
    op(0x0a, "if_eq_b5", OpcodeClass::Compare, COMPARE),
    op(0x0b, "mul", OpcodeClass::Arithmetic, BINARY),
    op(0x0c, "div", OpcodeClass::Arithmetic, BINARY),
    op(0x0d, "mod", OpcodeClass::Arithmetic, BINARY),
    op(0x0e, "add", OpcodeClass::Arithmetic, BINARY),
    op(0x0f, "sub", OpcodeClass::Arithmetic, BINARY),
    op(0x10, "jump", OpcodeClass::Jump, &[Offset]),
    op(0x11, "call", OpcodeClass::Jump, &[Offset]),
    op(0x12, "return", OpcodeClass::Plain, &[]),
    op(0x13, "wait", OpcodeClass::Plain, &[Input]),
    op(0x14, "end", OpcodeClass::Plain, &[]),
    op(0x20, "set", OpcodeClass::Assign, BINARY),
    op(0x21, "calc", OpcodeClass::Calc, &[Input, Operator, Input]),
    op(0x22, "set_float", OpcodeClass::Assign, &[Input, Float]),
    op(0x30, "message", OpcodeClass::Message, &[Text, Word]),
    op(0x31, "choice", OpcodeClass::Message, &[Text, Word]),
    op(0x40, "set_flag", OpcodeClass::Plain, &[Input]),
    op(0x41, "clear_flag", OpcodeClass::Plain, &[Input]),
    op(0x42, "play_sound", OpcodeClass::Plain, &[Word]),
    op(0x4a, "add_gold", OpcodeClass::Plain, &[Input]),
];

pub fn opcode(code: u32) -> Option<&'static OpcodeInfo> {
    OPCODES
        .binary_search_by_key(&code, |info| info.code)
        .ok()
        .map(|index| &OPCODES[index])
}

pub fn lookup_opcode(key: &str) -> SctResult<&'static OpcodeInfo> {
    let code = parse_code(key)?;
    opcode(code).ok_or_else(|| SctError::decode(format!("unknown opcode {}", format_code(code))))
}
