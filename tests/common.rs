#![allow(dead_code)]

use sct_editor::{Project, Script};

pub const GREETING: &str = "\\h(Vyse)Hello_there!\\n\\e";
pub const GOLD: &str = "\\h()Gold_is_tight\u{2026}\\e";

/// Two sections covering messages, arithmetic, a branch, a jump, a calc
/// with a float operand, and a no-loop sentinel, followed by two strings.
pub fn fixture_bytes() -> Vec<u8> {
    let words: [u32; 35] = [
        2, 140, 16, 80, // header, section table
        0x30, 8, 140, 1, // @0x10 message
        0x0b, 8, 0x0800_0004, 0x0800_0002, // @0x20 mul
        0x00, 12, 0x4000_0000, 0x0800_0064, 80, // @0x30 if_eq
        0x10, 4, 16, // @0x44 jump
        0x30, 8, 165, 0, // @0x50 message
        0x21, 12, 0x5000_0000, 0x0e, 0x0400_0600, // @0x60 calc
        0x0e, 8, 0x4000_0000, 0x7f7f_ffff, // @0x74 add
        0x12, 0, // @0x84 return
    ];
    let mut bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
    for text in [GREETING, GOLD] {
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
    }
    bytes
}

pub fn fixture_script(name: &str) -> Script {
    Script::from_bytes(name, &fixture_bytes()).expect("decode fixture")
}

pub fn fixture_project() -> Project {
    Project::from_scripts([fixture_script("intro"), fixture_script("finale")])
        .expect("build project")
}

pub fn word_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().expect("word"))
}
