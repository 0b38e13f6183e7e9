use super::*;
use crate::codec::Operand;
use crate::config::SctConfig;
use crate::text::HeadBody;

const GREETING: &str = "\\h(Vyse)Hello_there!\\n\\e";
const GOLD: &str = "\\h()Gold_is_tight\u{2026}\\e";

fn fixture_bytes() -> Vec<u8> {
    let words: [u32; 35] = [
        2, 140, 16, 80, //
        0x30, 8, 140, 1, //
        0x0b, 8, 0x0800_0004, 0x0800_0002, //
        0x00, 12, 0x4000_0000, 0x0800_0064, 80, //
        0x10, 4, 16, //
        0x30, 8, 165, 0, //
        0x21, 12, 0x5000_0000, 0x0e, 0x0400_0600, //
        0x0e, 8, 0x4000_0000, 0x7f7f_ffff, //
        0x12, 0,
    ];
    let mut bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
    for text in [GREETING, GOLD] {
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
    }
    bytes
}

fn fixture() -> Script {
    Script::from_bytes("intro", &fixture_bytes()).expect("decode fixture")
}

fn word_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
fn fixture_decodes_into_sections_and_strings() {
    let script = fixture();
    assert_eq!(script.sections.len(), 2);
    assert_eq!(script.sections[0].offset, Some(16));
    assert_eq!(script.sections[1].offset, Some(80));
    assert_eq!(script.instruction_count(), 8);
    assert_eq!(script.strings.len(), 2);
    assert_eq!(script.strings[1].offset, Some(165));
    assert_eq!(script.string(0), Some(GREETING));

    let compare = &script.sections[0].instructions[2];
    assert_eq!(compare.offset, Some(48));
    assert_eq!(compare.opcode.mnemonic(), Some("if_eq"));
    assert_eq!(
        compare.params[0].value,
        ParamValue::Operand(Operand::GlobalWord { index: 0 })
    );
}

#[test]
fn unmodified_script_encodes_to_identical_bytes() {
    let bytes = fixture_bytes();
    assert_eq!(bytes.len(), 188);
    assert_eq!(fixture().to_bytes().unwrap(), bytes);
}

#[test]
fn links_resolve_against_recorded_offsets() {
    let script = fixture();
    let branch = script.sections[0].instructions[2].params[2].link().unwrap();
    assert_eq!(
        script.resolve_link(branch).unwrap(),
        ResolvedLink::Instruction {
            section: 1,
            instruction: 0
        }
    );
    let text = script.sections[0].instructions[0].params[0].link().unwrap();
    assert_eq!(
        script.resolve_link(text).unwrap(),
        ResolvedLink::String { index: 0 }
    );
    assert_eq!(script.link_text(text).unwrap(), GREETING);

    let stray = Link::instruction("intro", 20);
    let err = script.resolve_link(&stray).unwrap_err();
    assert!(matches!(err, SctError::LinkResolution { offset: 20, .. }));
}

#[test]
fn longer_string_moves_later_strings_and_their_links() {
    let mut script = fixture();
    script
        .set_string(0, "\\h(Vyse)Hello_there,_friend!\\n\\e")
        .unwrap();

    assert_eq!(script.strings[1].offset, Some(173));
    let gold_link = script.sections[1].instructions[0].params[0].link().unwrap();
    assert_eq!(gold_link.offset, 173);

    let bytes = script.to_bytes().unwrap();
    assert_eq!(word_at(&bytes, 88), 173);
    let reread = Script::from_bytes("intro", &bytes).unwrap();
    assert_eq!(reread.dialogue(1).unwrap(), script.dialogue(1).unwrap());
}

#[test]
fn inserted_instruction_shifts_every_link() {
    let mut script = fixture();
    script.sections[0]
        .instructions
        .insert(0, Instruction::new(0x14, Vec::new()));
    script.reflow().unwrap();

    assert_eq!(script.sections[1].offset, Some(88));
    let jump = script.sections[0].instructions[4].params[0].link().unwrap();
    assert_eq!(jump.offset, 24);
    let branch = script.sections[0].instructions[3].params[2].link().unwrap();
    assert_eq!(branch.offset, 88);
    let text = script.sections[0].instructions[1].params[0].link().unwrap();
    assert_eq!(text.offset, 148);

    let bytes = script.to_bytes().unwrap();
    assert_eq!(bytes.len(), 196);
    assert_eq!(Script::from_bytes("intro", &bytes).unwrap(), script);
}

#[test]
fn removing_a_link_target_is_a_resolution_error() {
    let mut script = fixture();
    script.sections[1].instructions.remove(0);
    let err = script.reflow().unwrap_err();
    match &err {
        SctError::LinkResolution { path, offset, .. } => {
            assert_eq!(*offset, 80);
            assert_eq!(
                *path,
                NodePath::script("intro").section(0).instruction(2).parameter(2)
            );
        }
        other => panic!("unexpected error {other}"),
    }
    // Nothing was moved.
    assert_eq!(script.sections[1].instructions[0].offset, Some(96));
}

#[test]
fn dialogue_round_trips_through_visible_form() {
    let mut script = fixture();
    let visible = script.dialogue(0).unwrap();
    assert_eq!(visible, HeadBody::new(true, "Vyse", "Hello there!\n"));

    let gold = script.dialogue(1).unwrap();
    assert!(!gold.has_header);
    assert_eq!(gold.body, "Gold is tight...");

    script
        .set_dialogue(0, &HeadBody::new(true, "Aika", "Over here!"))
        .unwrap();
    assert_eq!(script.string(0), Some("\\h(Aika)Over_here!\\e"));
    assert!(matches!(
        script.dialogue(9),
        Err(SctError::NodeNotFound(_))
    ));
}

#[test]
fn strings_reject_nul() {
    let mut script = fixture();
    let err = script.set_string(0, "a\0b").unwrap_err();
    assert!(matches!(err, SctError::EncodingRange { .. }));
    assert_eq!(script.string(0), Some(GREETING));
}

#[test]
fn pushed_string_lands_at_end_of_area() {
    let mut script = fixture();
    let index = script.push_string("\\h()Bye\\e").unwrap();
    assert_eq!(index, 2);
    assert_eq!(script.strings[2].offset, Some(188));
}

#[test]
fn set_parameter_value_reencodes_in_place() {
    let mut project = Project::from_scripts([fixture()]).unwrap();
    let path = NodePath::script("intro")
        .section(0)
        .instruction(1)
        .parameter(0);
    project
        .set_parameter_value(&path, ParamValue::Operand(Operand::Decimal { value: 7 }))
        .unwrap();

    let bytes = project.script("intro").unwrap().to_bytes().unwrap();
    assert_eq!(word_at(&bytes, 40), 0x0800_0007);
    assert_eq!(bytes.len(), 188);
}

#[test]
fn out_of_range_value_leaves_project_unchanged() {
    let mut project = Project::from_scripts([fixture()]).unwrap();
    let before = project.clone();
    let path = NodePath::script("intro")
        .section(0)
        .instruction(1)
        .parameter(0);
    let err = project
        .set_parameter_value(&path, ParamValue::Word(0x0000_0010))
        .unwrap_err();
    assert!(matches!(err, SctError::EncodingRange { .. }));
    assert_eq!(err.path(), Some(&path));
    assert_eq!(project, before);
}

#[test]
fn retargeting_a_link_to_nowhere_is_rolled_back() {
    let mut project = Project::from_scripts([fixture()]).unwrap();
    let before = project.clone();
    let path = NodePath::script("intro")
        .section(0)
        .instruction(3)
        .parameter(0);
    let err = project
        .set_parameter_value(&path, ParamValue::Link(Link::instruction("intro", 20)))
        .unwrap_err();
    assert!(matches!(err, SctError::LinkResolution { .. }));
    assert_eq!(project, before);

    project
        .set_parameter_value(&path, ParamValue::Link(Link::instruction("intro", 96)))
        .unwrap();
    assert_eq!(
        project.parameter(&path).unwrap().raw,
        96u32.to_le_bytes().to_vec()
    );
}

#[test]
fn missing_nodes_report_their_path() {
    let project = Project::from_scripts([fixture()]).unwrap();
    let path = NodePath::script("intro").section(5);
    assert!(matches!(
        project.section(&path),
        Err(SctError::NodeNotFound(found)) if found == path
    ));
    assert!(project
        .instruction(&NodePath::script("missing").section(0).instruction(0))
        .is_err());
}

#[test]
fn project_names_are_unique_and_renames_follow_links() {
    let mut project = Project::from_scripts([fixture()]).unwrap();
    let err = project.add_script(fixture()).unwrap_err();
    assert!(matches!(err, SctError::Project(_)));

    project.rename_script("intro", "prologue").unwrap();
    assert_eq!(project.script_names(), vec!["prologue".to_string()]);
    let script = project.script("prologue").unwrap();
    let jump = script.sections[0].instructions[3].params[0].link().unwrap();
    assert_eq!(jump.script, "prologue");
    script.validate().unwrap();

    assert!(matches!(
        project.remove_script("intro"),
        Err(SctError::NodeNotFound(_))
    ));
    project.add_script(Script::new("epilogue")).unwrap();
    assert!(project.rename_script("epilogue", "prologue").is_err());
    assert_eq!(project.len(), 2);
}

#[test]
fn truncated_input_is_decode_error() {
    let bytes = fixture_bytes();
    let err = Script::from_bytes("intro", &bytes[..6]).unwrap_err();
    assert!(matches!(err, SctError::Decode { .. }));

    let mut cut = bytes.clone();
    cut.truncate(130);
    assert!(Script::from_bytes("intro", &cut).is_err());
}

#[test]
fn section_gap_is_decode_error() {
    let mut bytes = fixture_bytes();
    bytes[12..16].copy_from_slice(&84u32.to_le_bytes());
    let err = Script::from_bytes("intro", &bytes).unwrap_err();
    assert!(matches!(err, SctError::Decode { .. }));
}

#[test]
fn signature_length_mismatch_is_decode_error() {
    let mut bytes = fixture_bytes();
    // `return` declares four parameter bytes it does not have.
    bytes[136..140].copy_from_slice(&4u32.to_le_bytes());
    let err = Script::from_bytes("intro", &bytes).unwrap_err();
    assert!(matches!(err, SctError::Decode { .. }));
    assert_eq!(
        err.path(),
        Some(&NodePath::script("intro").section(1).instruction(3))
    );
}

#[test]
fn unknown_opcodes_follow_strictness() {
    let mut bytes = fixture_bytes();
    // Turn `add` into an opcode missing from the table.
    bytes[116..120].copy_from_slice(&0x7777u32.to_le_bytes());

    let err = Script::from_bytes("intro", &bytes).unwrap_err();
    assert!(err.to_string().contains("unknown opcode 0x00007777"));

    let lenient = SctConfig {
        strict_opcodes: false,
        ..SctConfig::default()
    };
    let script = Script::from_bytes_with_config("intro", &bytes, &lenient).unwrap();
    let unknown = &script.sections[1].instructions[2];
    assert_eq!(unknown.params.len(), 1);
    assert_eq!(unknown.params[0].kind, ParamKind::Blob);
    assert_eq!(script.to_bytes().unwrap(), bytes);
}

#[test]
fn dangling_link_in_binary_is_rejected() {
    let mut bytes = fixture_bytes();
    bytes[76..80].copy_from_slice(&18u32.to_le_bytes());
    let err = Script::from_bytes("intro", &bytes).unwrap_err();
    assert!(matches!(err, SctError::LinkResolution { offset: 18, .. }));
}

#[test]
fn size_limit_is_enforced() {
    let mut config = SctConfig::default();
    config.limits.max_script_bytes = 64;
    let err = Script::from_bytes_with_config("intro", &fixture_bytes(), &config).unwrap_err();
    assert!(matches!(err, SctError::ResourceLimit(_)));
}

#[test]
fn empty_script_round_trips() {
    let bytes = [0u8, 0, 0, 0, 8, 0, 0, 0];
    let script = Script::from_bytes("empty", &bytes).unwrap();
    assert!(script.sections.is_empty());
    assert!(script.strings.is_empty());
    assert_eq!(script.to_bytes().unwrap(), bytes.to_vec());
}

#[test]
fn validate_catches_raw_drift() {
    let mut script = fixture();
    script.sections[0].instructions[1].params[0].raw = 0x0800_0009u32.to_le_bytes().to_vec();
    let err = script.validate().unwrap_err();
    assert_eq!(
        err.path(),
        Some(&NodePath::script("intro").section(0).instruction(1).parameter(0))
    );
}

#[test]
fn script_id_tracks_content() {
    let script = fixture();
    let id = script.script_id().unwrap();
    assert_eq!(id, compute_script_id(&fixture_bytes()));
    assert_eq!(script_id_hex(&id).len(), 64);

    let mut edited = script.clone();
    edited.set_string(1, "\\h()Rich!\\e").unwrap();
    assert_ne!(edited.script_id().unwrap(), id);
}

#[test]
fn validate_enforces_opcode_signatures() {
    let mut script = fixture();
    // Drop the second input of `mul`.
    script.sections[0].instructions[1].params.pop();
    let err = script.validate().unwrap_err();
    assert!(matches!(err, SctError::Decode { .. }));
    assert_eq!(
        err.path(),
        Some(&NodePath::script("intro").section(0).instruction(1))
    );
    assert!(err.to_string().contains("found (input)"));
}

#[test]
fn validate_applies_opcode_strictness() {
    let lenient = SctConfig {
        strict_opcodes: false,
        ..SctConfig::default()
    };
    let blob = Parameter::new(ParamKind::Blob, ParamValue::Bytes(vec![9, 9])).unwrap();
    let mut script = Script::new("odd");
    script
        .sections
        .push(Section::new(vec![Instruction::new(0x7777, vec![blob.clone()])]));

    assert!(script.validate().is_err());
    script.validate_with_config(&lenient).unwrap();

    // The reader never splits an unknown opcode's bytes.
    script.sections[0].instructions[0].params.push(blob);
    assert!(script.validate_with_config(&lenient).is_err());
}
