//! Format constants for SCT binaries and project files.
//!
//! The binary side mirrors the game's own layout and never changes; the
//! project file side is ours and carries an explicit schema version.

/// Current schema version for JSON project files.
/// Increment MINOR for compatible changes, MAJOR for breaking changes.
pub const PROJECT_SCHEMA_VERSION: &str = "1.0";

/// Key holding the schema version at the top of a project file.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Width of every fixed-size word in an SCT file.
pub const WORD_BYTES: usize = 4;

/// Bytes before the section table: section count and string area offset.
pub const SCRIPT_HEADER_BYTES: usize = 2 * WORD_BYTES;

/// Bytes of an instruction header: opcode word and parameter length word.
pub const INSTRUCTION_HEADER_BYTES: usize = 2 * WORD_BYTES;

/// File extension used for raw script binaries.
pub const SCRIPT_EXTENSION: &str = "sct";
