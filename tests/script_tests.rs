//! Byte fidelity and editing scenarios on a representative script.

use insta::assert_snapshot;
use sct_editor::{
    describe_instruction, script_id_hex, Instruction, NodePath, Operand, ParamValue, Script, SctError,
};

mod common;
use common::{fixture_bytes, fixture_project, fixture_script, word_at, GOLD};

#[test]
fn fixture_round_trips_byte_for_byte() {
    let bytes = fixture_bytes();
    let script = Script::from_bytes("intro", &bytes).expect("decode");
    assert_eq!(script.to_bytes().expect("encode"), bytes);
}

#[test]
fn script_id_is_sha256_of_encoding() {
    let id = fixture_script("intro").script_id().expect("id");
    assert_snapshot!(
        script_id_hex(&id),
        @"afbe8c8935adfd5fc3dde9cfb4167b90ae03b35dc668952d5b1600fbb2df2988"
    );
    // The name is not part of the encoding.
    assert_eq!(fixture_script("other").script_id().expect("id"), id);
}

#[test]
fn listing_reads_like_pseudocode() {
    let listing = fixture_script("intro").listing();
    assert_snapshot!(listing.trim_end(), @r#"
    section 0:
      0x00000010  message Vyse: "Hello there!", 0x00000001
      0x00000020  4 * 2 (= 8)
      0x00000030  if gold == 100 else goto 0x00000050
      0x00000044  jump 0x00000010
    section 1:
      0x00000050  message "Gold is tight...", 0x00000000
      0x00000060  sys[0x80300000+0x0] = sys[0x80300000+0x0] + 1.5f
      0x00000074  gold (no-loop)
      0x00000084  return
    "#);
}

#[test]
fn standalone_description_shows_raw_links() {
    let script = fixture_script("intro");
    let message = &script.sections[0].instructions[0];
    assert_eq!(
        describe_instruction(message),
        "message str@0x0000008c, 0x00000001"
    );
}

#[test]
fn system_word_operand_decodes_with_base() {
    let script = fixture_script("intro");
    let calc = &script.sections[1].instructions[1];
    assert_eq!(
        calc.params[0].value,
        ParamValue::Operand(Operand::SystemWord { index: 0 })
    );
    assert_eq!(
        calc.params[2].value,
        ParamValue::Operand(Operand::Float { value: 1.5 })
    );
}

#[test]
fn edited_dialogue_survives_encode_and_decode() {
    let mut project = fixture_project();
    let script = project.script_mut("intro").expect("script");
    let mut dialogue = script.dialogue(0).expect("dialogue");
    dialogue.body = "Welcome aboard... captain!".to_string();
    script.set_dialogue(0, &dialogue).expect("set dialogue");

    let bytes = script.to_bytes().expect("encode");
    let reread = Script::from_bytes("intro", &bytes).expect("decode");
    assert_eq!(reread.dialogue(0).expect("dialogue"), dialogue);
    assert_eq!(reread.string(1), Some(GOLD));

    // Both text links still land on their strings.
    let first = reread.sections[0].instructions[0].params[0].link().expect("link");
    let second = reread.sections[1].instructions[0].params[0].link().expect("link");
    assert_eq!(reread.link_text(first).expect("text"), reread.string(0).expect("s0"));
    assert_eq!(reread.link_text(second).expect("text"), GOLD);
}

#[test]
fn parameter_edit_only_touches_its_word() {
    let mut project = fixture_project();
    let path = NodePath::script("finale").section(0).instruction(2).parameter(1);
    project
        .set_parameter_value(&path, ParamValue::Operand(Operand::Decimal { value: 250 }))
        .expect("set value");

    let before = fixture_bytes();
    let after = project.script("finale").expect("script").to_bytes().expect("encode");
    assert_eq!(word_at(&after, 60), 0x0800_00fa);
    let changed: Vec<usize> = before
        .iter()
        .zip(&after)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(index, _)| index)
        .collect();
    assert_eq!(changed, vec![60]);

    // The other script is untouched.
    assert_eq!(
        project.script("intro").expect("script").to_bytes().expect("encode"),
        before
    );
}

#[test]
fn growing_an_instruction_moves_branch_targets() {
    let mut project = fixture_project();
    let script = project.script_mut("intro").expect("script");
    let mul = script.sections[0].instructions[1].clone();
    script.sections[0]
        .instructions
        .insert(1, Instruction::new(mul.opcode.0, mul.params));
    script.reflow().expect("reflow");

    let bytes = script.to_bytes().expect("encode");
    let reread = Script::from_bytes("intro", &bytes).expect("decode");
    let branch = reread.sections[0].instructions[3].params[2].link().expect("link");
    assert_eq!(branch.offset, 0x50 + 16);
    assert_eq!(reread.sections[1].offset, Some(0x60));
}

#[test]
fn errors_carry_node_paths() {
    let mut project = fixture_project();
    let path = NodePath::script("intro").section(1).instruction(1).parameter(2);
    let err = project
        .set_parameter_value(&path, ParamValue::Operand(Operand::Float { value: 1e9 }))
        .unwrap_err();
    assert!(matches!(err, SctError::EncodingRange { .. }));
    assert_eq!(
        err.to_string(),
        format!(
            "encoding range error at {path}: float 1000000000 is not representable with 26 bits and 10 fractional bits"
        )
    );
}
