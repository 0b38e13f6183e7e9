use super::*;
use crate::tables::Sentinel;

fn word(raw: u32) -> Vec<u8> {
    raw.to_le_bytes().to_vec()
}

#[test]
fn param_kind_parses_known_names() {
    for kind in ParamKind::ALL {
        assert_eq!(kind.name().parse::<ParamKind>().unwrap(), kind);
    }
}

#[test]
fn unknown_param_kind_names_the_type() {
    let err = "matrix".parse::<ParamKind>().unwrap_err();
    assert!(matches!(err, SctError::Decode { .. }));
    assert!(err.to_string().contains("matrix"));
}

#[test]
fn system_word_operand_renders_base_and_offset() {
    let operand = Operand::from_word(0x5000_0000).unwrap();
    assert_eq!(operand, Operand::SystemWord { index: 0 });
    assert_eq!(operand.to_string(), "sys[0x80300000+0x0]");

    let third = Operand::from_word(0x5000_0003).unwrap();
    assert_eq!(third.to_string(), "sys[0x80300000+0xc]");
}

#[test]
fn memory_bands_classify_by_threshold() {
    assert_eq!(
        Operand::from_word(0x4000_0010).unwrap(),
        Operand::GlobalWord { index: 0x10 }
    );
    assert_eq!(
        Operand::from_word(0x2000_0005).unwrap(),
        Operand::Byte { index: 5 }
    );
    let flag = Operand::from_word(0x1000_0013).unwrap();
    assert_eq!(flag, Operand::Flag { bit: 0x13 });
    assert_eq!(flag.to_string(), "flag[0x80330000+0x2].3");
}

#[test]
fn decimal_and_float_bands() {
    assert_eq!(
        Operand::from_word(0x0800_0064).unwrap(),
        Operand::Decimal { value: 100 }
    );
    let half = Operand::from_word(0x0400_0600).unwrap();
    assert_eq!(half, Operand::Float { value: 1.5 });
    assert_eq!(half.to_string(), "1.5f");

    // Top bit of the 26-bit payload is the sign.
    let negative = Operand::from_word(0x0400_0000 | 0x03ff_fc00).unwrap();
    assert_eq!(negative, Operand::Float { value: -1.0 });
    assert_eq!(negative.to_word().unwrap(), 0x07ff_fc00);
}

#[test]
fn sentinels_take_precedence_over_bands() {
    assert_eq!(
        Operand::from_word(0x7f7f_ffff).unwrap(),
        Operand::NoLoop {
            sentinel: Sentinel::FloatMax
        }
    );
    assert_eq!(
        Operand::from_word(0x0080_0000).unwrap(),
        Operand::NoLoop {
            sentinel: Sentinel::FloatMinPositive
        }
    );
    let int_max = Operand::from_word(0x7fff_ffff).unwrap();
    assert!(int_max.is_no_loop());
    assert_eq!(int_max.to_string(), "no-loop(INT_MAX)");
    assert_eq!(int_max.to_word().unwrap(), 0x7fff_ffff);
}

#[test]
fn words_below_every_band_are_range_errors() {
    for raw in [0, 0x0000_0001, 0x03ff_ffff, 0x8000_0000, 0xffff_ffff] {
        let err = Operand::from_word(raw).unwrap_err();
        assert!(
            matches!(err, SctError::EncodingRange { .. }),
            "{raw:#x}: {err}"
        );
    }
}

#[test]
fn operand_past_band_width_is_range_error() {
    let err = Operand::Decimal { value: 0x0800_0000 }
        .to_word()
        .unwrap_err();
    assert!(matches!(err, SctError::EncodingRange { .. }));

    let err = Operand::Float { value: 0.0001 }.to_word().unwrap_err();
    assert!(matches!(err, SctError::EncodingRange { .. }));
}

#[test]
fn operand_colliding_with_sentinel_is_rejected() {
    // 0x50000000 + 0x2f7fffff is the FLT_MAX bit pattern.
    let err = Operand::SystemWord { index: 0x2f7f_ffff }
        .to_word()
        .unwrap_err();
    assert!(matches!(err, SctError::EncodingRange { .. }));
    assert!(err.to_string().contains("FLT_MAX"));
}

fn assert_round_trip(kind: ParamKind, value: ParamValue) {
    let bytes = encode_param(kind, &value).unwrap();
    let decoded = decode_param(kind, &bytes, "s").unwrap();
    assert_eq!(decoded, value, "{kind}");
    assert_eq!(encode_param(kind, &decoded).unwrap(), bytes, "{kind} {value:?}");
}

/// First and last word of every band, the sentinels, and the words
/// around the sentinel inside the system band.
const INPUT_EDGES: [u32; 17] = [
    0x5000_0000, 0x7fff_fffe, 0x7f7f_fffe, 0x7f80_0000, //
    0x4000_0000, 0x4fff_ffff, //
    0x2000_0000, 0x3fff_ffff, //
    0x1000_0000, 0x1fff_ffff, //
    0x0800_0000, 0x0fff_ffff, //
    0x0400_0000, 0x07ff_ffff, //
    0x7f7f_ffff, 0x0080_0000, 0x7fff_ffff,
];

#[test]
fn input_band_edges_round_trip_both_ways() {
    for raw in INPUT_EDGES {
        let value = decode_param(ParamKind::Input, &word(raw), "s").unwrap();
        assert_eq!(encode_param(ParamKind::Input, &value).unwrap(), word(raw), "{raw:#x}");
        assert_round_trip(ParamKind::Input, value);
    }
    assert_eq!(
        Operand::from_word(0x07ff_ffff).unwrap(),
        Operand::Float { value: -1.0 / 1024.0 }
    );
    assert_eq!(
        Operand::from_word(0x0400_0000).unwrap(),
        Operand::Float { value: 0.0 }
    );
    assert_eq!(
        Operand::from_word(0x0fff_ffff).unwrap(),
        Operand::Decimal { value: 0x07ff_ffff }
    );
}

#[test]
fn every_kind_round_trips_from_values() {
    for raw in [0, 1, 0x7fff_ffff, u32::MAX] {
        assert_round_trip(ParamKind::Word, ParamValue::Word(raw));
    }
    let floats = [
        0.0,
        -0.0,
        1.5,
        f32::from_bits(1),
        f32::from_bits(0x807f_ffff),
        f32::MIN_POSITIVE,
        f32::MAX,
        f32::MIN,
    ];
    for value in floats {
        assert_round_trip(ParamKind::Float, ParamValue::Float(value));
    }
    assert_eq!(
        encode_param(ParamKind::Float, &ParamValue::Float(-0.0)).unwrap(),
        word(0x8000_0000)
    );
    for bits in [f32::INFINITY.to_bits(), f32::NEG_INFINITY.to_bits(), 0x7fc0_0001] {
        assert_round_trip(ParamKind::Float, ParamValue::Word(bits));
    }
    for code in (0..=0xffu32).filter(|code| operator(*code).is_some()) {
        assert_round_trip(ParamKind::Operator, ParamValue::Code(code));
    }
    for offset in [0, 8, u32::MAX] {
        assert_round_trip(ParamKind::Offset, ParamValue::Link(Link::instruction("s", offset)));
        assert_round_trip(ParamKind::Text, ParamValue::Link(Link::string("s", offset)));
    }
    for bytes in [Vec::new(), vec![0], vec![0xff; 9]] {
        assert_round_trip(ParamKind::Blob, ParamValue::Bytes(bytes));
    }
    let operands = [
        Operand::SystemWord { index: 0x2fff_fffe },
        Operand::GlobalWord { index: 0x0fff_ffff },
        Operand::Byte { index: 0x1fff_ffff },
        Operand::Flag { bit: 0x0fff_ffff },
        Operand::Decimal { value: 0x07ff_ffff },
        Operand::Float { value: -32768.0 },
        Operand::Float { value: 32767.0 + 1023.0 / 1024.0 },
    ];
    for operand in operands {
        assert_round_trip(ParamKind::Input, ParamValue::Operand(operand));
    }
}

#[test]
fn raw_word_in_input_slot_is_classified() {
    assert_eq!(
        encode_param(ParamKind::Input, &ParamValue::Word(0x0800_0002)).unwrap(),
        word(0x0800_0002)
    );
    let err = encode_param(ParamKind::Input, &ParamValue::Word(0x10)).unwrap_err();
    assert!(matches!(err, SctError::EncodingRange { .. }));

    let (value, raw) = normalize(ParamKind::Input, ParamValue::Word(0x0800_0002)).unwrap();
    assert_eq!(value, ParamValue::Operand(Operand::Decimal { value: 2 }));
    assert_eq!(raw, word(0x0800_0002));
}

#[test]
fn operator_params_must_name_a_table_code() {
    assert_eq!(
        decode_param(ParamKind::Operator, &word(0x0e), "s").unwrap(),
        ParamValue::Code(0x0e)
    );
    assert!(decode_param(ParamKind::Operator, &word(0x99), "s").is_err());
    assert!(encode_param(ParamKind::Operator, &ParamValue::Code(0x99)).is_err());
}

#[test]
fn non_finite_floats_stay_raw_words() {
    let nan = f32::NAN.to_bits();
    let value = decode_param(ParamKind::Float, &word(nan), "s").unwrap();
    assert_eq!(value, ParamValue::Word(nan));
    assert_eq!(encode_param(ParamKind::Float, &value).unwrap(), word(nan));

    let err = encode_param(ParamKind::Float, &ParamValue::Float(f32::INFINITY)).unwrap_err();
    assert!(matches!(err, SctError::EncodingRange { .. }));
    assert!(encode_param(ParamKind::Float, &ParamValue::Word(1.0f32.to_bits())).is_err());
}

#[test]
fn offsets_decode_as_links_into_the_owning_script() {
    let value = decode_param(ParamKind::Offset, &word(0x50), "intro").unwrap();
    assert_eq!(value, ParamValue::Link(Link::instruction("intro", 0x50)));

    let text = decode_param(ParamKind::Text, &word(0x8c), "intro").unwrap();
    assert_eq!(text, ParamValue::Link(Link::string("intro", 0x8c)));
    assert_eq!(encode_param(ParamKind::Text, &text).unwrap(), word(0x8c));
}

#[test]
fn link_target_must_match_slot() {
    let err = encode_param(
        ParamKind::Offset,
        &ParamValue::Link(Link::string("intro", 0x8c)),
    )
    .unwrap_err();
    assert!(matches!(err, SctError::Decode { .. }));
}

#[test]
fn blobs_are_carried_verbatim() {
    let bytes = vec![0xde, 0xad, 0xbe];
    let value = decode_param(ParamKind::Blob, &bytes, "s").unwrap();
    assert_eq!(value, ParamValue::Bytes(bytes.clone()));
    assert_eq!(encode_param(ParamKind::Blob, &value).unwrap(), bytes);
}

#[test]
fn fixed_width_params_reject_short_input() {
    let err = decode_param(ParamKind::Word, &[1, 2, 3], "s").unwrap_err();
    assert!(matches!(err, SctError::Decode { .. }));
}

#[test]
fn mismatched_value_and_kind_is_decode_error() {
    let err = encode_param(ParamKind::Word, &ParamValue::Float(1.0)).unwrap_err();
    assert!(err.to_string().contains("float value does not fit parameter type `word`"));
}
