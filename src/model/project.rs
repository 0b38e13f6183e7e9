use std::collections::BTreeMap;

use tracing::info;

use super::{Instruction, Parameter, Script, Section};
use crate::codec::ParamValue;
use crate::config::SctConfig;
use crate::error::{NodePath, SctError, SctResult};

/// Named collection of scripts. The name index is only changed through
/// [`Project::add_script`], [`Project::remove_script`], and
/// [`Project::rename_script`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Project {
    scripts: BTreeMap<String, Script>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a project from scripts, rejecting duplicate names.
    pub fn from_scripts(scripts: impl IntoIterator<Item = Script>) -> SctResult<Self> {
        let mut project = Self::new();
        for script in scripts {
            project.add_script(script)?;
        }
        Ok(project)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Script names in lexicographic order.
    pub fn script_names(&self) -> Vec<String> {
        self.scripts.keys().cloned().collect()
    }

    pub fn scripts(&self) -> impl Iterator<Item = &Script> {
        self.scripts.values()
    }

    pub fn script(&self, name: &str) -> Option<&Script> {
        self.scripts.get(name)
    }

    /// Mutable access to a script. Renaming through this handle is not
    /// allowed; use [`Project::rename_script`].
    pub fn script_mut(&mut self, name: &str) -> Option<&mut Script> {
        self.scripts.get_mut(name)
    }

    pub fn add_script(&mut self, script: Script) -> SctResult<()> {
        if self.scripts.contains_key(&script.name) {
            return Err(SctError::Project(format!(
                "duplicate script name `{}`",
                script.name
            )));
        }
        self.scripts.insert(script.name.clone(), script);
        Ok(())
    }

    pub fn remove_script(&mut self, name: &str) -> SctResult<Script> {
        self.scripts
            .remove(name)
            .ok_or_else(|| SctError::NodeNotFound(NodePath::script(name)))
    }

    /// Renames a script and every link that names it.
    pub fn rename_script(&mut self, from: &str, to: &str) -> SctResult<()> {
        if from == to {
            return self
                .scripts
                .contains_key(from)
                .then_some(())
                .ok_or_else(|| SctError::NodeNotFound(NodePath::script(from)));
        }
        if self.scripts.contains_key(to) {
            return Err(SctError::Project(format!("duplicate script name `{to}`")));
        }
        let mut script = self.remove_script(from)?;
        script.name = to.to_string();
        for section in &mut script.sections {
            for instruction in &mut section.instructions {
                for param in &mut instruction.params {
                    if let ParamValue::Link(link) = &mut param.value {
                        if link.script == from {
                            link.script = to.to_string();
                        }
                    }
                }
            }
        }
        info!(from, to, "renamed script");
        self.scripts.insert(to.to_string(), script);
        Ok(())
    }

    fn script_at(&self, path: &NodePath) -> SctResult<&Script> {
        path.script
            .as_deref()
            .and_then(|name| self.scripts.get(name))
            .ok_or_else(|| SctError::NodeNotFound(path.clone()))
    }

    pub fn section(&self, path: &NodePath) -> SctResult<&Section> {
        let script = self.script_at(path)?;
        path.section
            .and_then(|index| script.sections.get(index))
            .ok_or_else(|| SctError::NodeNotFound(path.clone()))
    }

    pub fn instruction(&self, path: &NodePath) -> SctResult<&Instruction> {
        let section = self.section(path)?;
        path.instruction
            .and_then(|index| section.instructions.get(index))
            .ok_or_else(|| SctError::NodeNotFound(path.clone()))
    }

    pub fn parameter(&self, path: &NodePath) -> SctResult<&Parameter> {
        let instruction = self.instruction(path)?;
        path.parameter
            .and_then(|index| instruction.params.get(index))
            .ok_or_else(|| SctError::NodeNotFound(path.clone()))
    }

    /// Replaces one parameter value, re-encoding it and reflowing the
    /// script. On error the project is unchanged.
    pub fn set_parameter_value(&mut self, path: &NodePath, value: ParamValue) -> SctResult<()> {
        self.parameter(path)?;
        let (Some(name), Some(s), Some(i), Some(p)) = (
            path.script.as_deref(),
            path.section,
            path.instruction,
            path.parameter,
        ) else {
            return Err(SctError::NodeNotFound(path.clone()));
        };
        let script = self
            .scripts
            .get_mut(name)
            .ok_or_else(|| SctError::NodeNotFound(path.clone()))?;
        if let ParamValue::Link(link) = &value {
            if link.script != script.name {
                return Err(SctError::link(
                    link.offset,
                    format!("points into script `{}`", link.script),
                )
                .at(path));
            }
        }

        let param = &mut script.sections[s].instructions[i].params[p];
        let previous = param.clone();
        param.set_value(value).map_err(|err| err.at(path))?;
        if let Err(err) = script.reflow() {
            script.sections[s].instructions[i].params[p] = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Validates every script with the default configuration.
    pub fn validate(&self) -> SctResult<()> {
        self.validate_with_config(&SctConfig::default())
    }

    pub fn validate_with_config(&self, config: &SctConfig) -> SctResult<()> {
        self.scripts
            .values()
            .try_for_each(|script| script.validate_with_config(config))
    }
}
