pub mod codec;
pub mod config;
pub mod describe;
mod error;
pub mod model;
pub mod portable;
pub mod project_io;
pub mod tables;
pub mod text;
pub mod version;

pub use codec::{decode_param, encode_param, Operand, ParamKind, ParamValue};
pub use config::{Limits, SctConfig};
pub use describe::describe_instruction;
pub use error::{NodePath, SctError, SctResult};
pub use model::{
    compute_script_id, script_id_hex, Instruction, Link, LinkTarget, Opcode, Parameter, Project,
    ResolvedLink, Script, ScriptId, ScriptString, Section,
};
pub use portable::{from_portable, from_portable_as, to_export, to_portable, Entity, EntityKind};
pub use project_io::{
    export_json, export_scripts, import_scripts, load_project, load_project_with_config,
    project_from_json, project_from_json_with_config, project_to_json, save_project,
    save_project_with_config,
};
pub use text::{join_head_body, split_head_body, to_raw, to_visible, HeadBody};
