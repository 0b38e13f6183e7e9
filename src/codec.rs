//! Parameter codec.
//!
//! Maps a parameter's semantic value to its exact on-disk bytes and back.
//! Every fixed-size parameter is one little-endian 32-bit word; `blob`
//! parameters carry their bytes untouched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SctError, SctResult};
use crate::model::{Link, LinkTarget};
use crate::tables::{
    band_info, cutoff_for, format_code, operator, Band, Sentinel, FLOAT_FRACTION_BITS,
};
use crate::version::WORD_BYTES;

/// Declared type of a parameter slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Raw 32-bit word.
    Word,
    /// Operand word selected by the input cutoff bands.
    Input,
    /// Code from the comparison or arithmetic table.
    Operator,
    /// IEEE-754 single.
    Float,
    /// Byte offset of an instruction in the same script.
    Offset,
    /// Byte offset of a string in the same script.
    Text,
    /// Opaque bytes.
    Blob,
}

impl ParamKind {
    pub const ALL: [ParamKind; 7] = [
        Self::Word,
        Self::Input,
        Self::Operator,
        Self::Float,
        Self::Offset,
        Self::Text,
        Self::Blob,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Input => "input",
            Self::Operator => "operator",
            Self::Float => "float",
            Self::Offset => "offset",
            Self::Text => "text",
            Self::Blob => "blob",
        }
    }

    /// Encoded size, or `None` for variable-length kinds.
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Blob => None,
            _ => Some(WORD_BYTES),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamKind {
    type Err = SctError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == input)
            .ok_or_else(|| SctError::decode(format!("unknown parameter type `{input}`")))
    }
}

/// Width of the float band payload.
const FLOAT_PAYLOAD_BITS: u32 = 26;

/// Decoded form of an `input` word.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Operand {
    SystemWord { index: u32 },
    GlobalWord { index: u32 },
    Byte { index: u32 },
    Flag { bit: u32 },
    Decimal { value: u32 },
    Float { value: f64 },
    NoLoop { sentinel: Sentinel },
}

impl Operand {
    /// Classifies a raw operand word. Sentinels are checked before the
    /// cutoff bands.
    pub fn from_word(raw: u32) -> SctResult<Self> {
        if let Some(sentinel) = Sentinel::from_raw(raw) {
            return Ok(Self::NoLoop { sentinel });
        }
        let band = cutoff_for(raw).ok_or_else(|| {
            SctError::range(format!(
                "input word {} is outside every cutoff band",
                format_code(raw)
            ))
        })?;
        let offset = raw - band.threshold;
        Ok(match band.band {
            Band::SystemWord => Self::SystemWord { index: offset },
            Band::GlobalWord => Self::GlobalWord { index: offset },
            Band::Byte => Self::Byte { index: offset },
            Band::Flag => Self::Flag { bit: offset },
            Band::Decimal => Self::Decimal { value: offset },
            Band::Float => Self::Float {
                value: fixed_to_f64(offset),
            },
        })
    }

    pub fn to_word(&self) -> SctResult<u32> {
        let (band, offset) = match *self {
            Self::NoLoop { sentinel } => return Ok(sentinel.raw()),
            Self::SystemWord { index } => (Band::SystemWord, index),
            Self::GlobalWord { index } => (Band::GlobalWord, index),
            Self::Byte { index } => (Band::Byte, index),
            Self::Flag { bit } => (Band::Flag, bit),
            Self::Decimal { value } => (Band::Decimal, value),
            Self::Float { value } => (Band::Float, f64_to_fixed(value)?),
        };
        let info = band_info(band);
        if offset >= info.width() {
            return Err(SctError::range(format!(
                "{} operand {offset:#x} exceeds band width {:#x}",
                info.label,
                info.width()
            )));
        }
        let raw = info.threshold + offset;
        if let Some(sentinel) = Sentinel::from_raw(raw) {
            return Err(SctError::range(format!(
                "operand word {} collides with the {} no-loop sentinel",
                format_code(raw),
                sentinel.name()
            )));
        }
        Ok(raw)
    }

    pub fn band(&self) -> Option<Band> {
        match self {
            Self::SystemWord { .. } => Some(Band::SystemWord),
            Self::GlobalWord { .. } => Some(Band::GlobalWord),
            Self::Byte { .. } => Some(Band::Byte),
            Self::Flag { .. } => Some(Band::Flag),
            Self::Decimal { .. } => Some(Band::Decimal),
            Self::Float { .. } => Some(Band::Float),
            Self::NoLoop { .. } => None,
        }
    }

    pub fn is_no_loop(&self) -> bool {
        matches!(self, Self::NoLoop { .. })
    }

    /// Integer value of a plain decimal operand.
    pub fn immediate(&self) -> Option<i64> {
        match self {
            Self::Decimal { value } => Some(i64::from(*value)),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SystemWord { index } | Self::GlobalWord { index } => {
                let info = band_info(self.band().unwrap_or(Band::SystemWord));
                let offset = u64::from(index) * WORD_BYTES as u64;
                write!(f, "{}[{:#010x}+{offset:#x}]", info.label, info.base)
            }
            Self::Byte { index } => {
                let info = band_info(Band::Byte);
                write!(f, "{}[{:#010x}+{index:#x}]", info.label, info.base)
            }
            Self::Flag { bit } => {
                let info = band_info(Band::Flag);
                write!(f, "{}[{:#010x}+{:#x}].{}", info.label, info.base, bit / 8, bit % 8)
            }
            Self::Decimal { value } => write!(f, "{value}"),
            Self::Float { value } => write!(f, "{value}f"),
            Self::NoLoop { sentinel } => write!(f, "no-loop({})", sentinel.name()),
        }
    }
}

fn fixed_to_f64(payload: u32) -> f64 {
    let sign_bit = 1u32 << (FLOAT_PAYLOAD_BITS - 1);
    let signed = if payload & sign_bit != 0 {
        i64::from(payload) - (1i64 << FLOAT_PAYLOAD_BITS)
    } else {
        i64::from(payload)
    };
    signed as f64 / f64::from(1u32 << FLOAT_FRACTION_BITS)
}

fn f64_to_fixed(value: f64) -> SctResult<u32> {
    let scaled = value * f64::from(1u32 << FLOAT_FRACTION_BITS);
    let half = (1i64 << (FLOAT_PAYLOAD_BITS - 1)) as f64;
    if !scaled.is_finite() || scaled.fract() != 0.0 || scaled < -half || scaled >= half {
        return Err(SctError::range(format!(
            "float {value} is not representable with {FLOAT_PAYLOAD_BITS} bits and {FLOAT_FRACTION_BITS} fractional bits"
        )));
    }
    let mask = (1i64 << FLOAT_PAYLOAD_BITS) - 1;
    Ok(((scaled as i64) & mask) as u32)
}

/// Semantic value of a parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Word(u32),
    Operand(Operand),
    Code(u32),
    Float(f32),
    Link(Link),
    Bytes(Vec<u8>),
}

impl ParamValue {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Word(_) => "word",
            Self::Operand(_) => "operand",
            Self::Code(_) => "code",
            Self::Float(_) => "float",
            Self::Link(_) => "link",
            Self::Bytes(_) => "bytes",
        }
    }

    pub fn as_link(&self) -> Option<&Link> {
        match self {
            Self::Link(link) => Some(link),
            _ => None,
        }
    }
}

/// Encodes a value for a parameter slot of the given kind.
///
/// An `input` slot also accepts a raw `word`, which must classify into a
/// cutoff band or be a sentinel. A `float` slot takes a raw `word` only
/// for non-finite bit patterns.
pub fn encode_param(kind: ParamKind, value: &ParamValue) -> SctResult<Vec<u8>> {
    let word = match (kind, value) {
        (ParamKind::Blob, ParamValue::Bytes(bytes)) => return Ok(bytes.clone()),
        (ParamKind::Word, ParamValue::Word(word)) => *word,
        (ParamKind::Input, ParamValue::Operand(operand)) => operand.to_word()?,
        (ParamKind::Input, ParamValue::Word(raw)) => Operand::from_word(*raw)?.to_word()?,
        (ParamKind::Operator, ParamValue::Code(code)) => {
            operator(*code).ok_or_else(|| {
                SctError::decode(format!("unknown operator code {}", format_code(*code)))
            })?;
            *code
        }
        (ParamKind::Float, ParamValue::Float(value)) => {
            if !value.is_finite() {
                return Err(SctError::range(format!(
                    "non-finite float {value} must be given as raw word bits"
                )));
            }
            value.to_bits()
        }
        (ParamKind::Float, ParamValue::Word(bits)) => {
            if f32::from_bits(*bits).is_finite() {
                return Err(SctError::decode(format!(
                    "finite float bits {} must be given as a float value",
                    format_code(*bits)
                )));
            }
            *bits
        }
        (ParamKind::Offset, ParamValue::Link(link)) if link.target == LinkTarget::Instruction => {
            link.offset
        }
        (ParamKind::Text, ParamValue::Link(link)) if link.target == LinkTarget::String => {
            link.offset
        }
        (kind, value) => {
            return Err(SctError::decode(format!(
                "{} value does not fit parameter type `{kind}`",
                value.variant_name()
            )))
        }
    };
    Ok(word.to_le_bytes().to_vec())
}

/// Decodes the bytes of a parameter slot. `script` names the owning
/// script so that offsets become links into it.
pub fn decode_param(kind: ParamKind, bytes: &[u8], script: &str) -> SctResult<ParamValue> {
    let value = match kind {
        ParamKind::Blob => ParamValue::Bytes(bytes.to_vec()),
        ParamKind::Word => ParamValue::Word(read_word(bytes)?),
        ParamKind::Input => ParamValue::Operand(Operand::from_word(read_word(bytes)?)?),
        ParamKind::Operator => {
            let code = read_word(bytes)?;
            operator(code).ok_or_else(|| {
                SctError::decode(format!("unknown operator code {}", format_code(code)))
            })?;
            ParamValue::Code(code)
        }
        ParamKind::Float => {
            let bits = read_word(bytes)?;
            let value = f32::from_bits(bits);
            if value.is_finite() {
                ParamValue::Float(value)
            } else {
                ParamValue::Word(bits)
            }
        }
        ParamKind::Offset => ParamValue::Link(Link::instruction(script, read_word(bytes)?)),
        ParamKind::Text => ParamValue::Link(Link::string(script, read_word(bytes)?)),
    };
    Ok(value)
}

/// Encodes a value and returns it in canonical decoded form with its bytes.
pub fn normalize(kind: ParamKind, value: ParamValue) -> SctResult<(ParamValue, Vec<u8>)> {
    let raw = encode_param(kind, &value)?;
    let value = match (kind, value) {
        (ParamKind::Input, ParamValue::Word(word)) => ParamValue::Operand(Operand::from_word(word)?),
        (_, value) => value,
    };
    Ok((value, raw))
}

pub(crate) fn read_word(bytes: &[u8]) -> SctResult<u32> {
    let array: [u8; WORD_BYTES] = bytes.try_into().map_err(|_| {
        SctError::decode(format!(
            "expected {WORD_BYTES} parameter bytes, found {}",
            bytes.len()
        ))
    })?;
    Ok(u32::from_le_bytes(array))
}

#[cfg(test)]
#[path = "tests/codec_tests.rs"]
mod tests;
