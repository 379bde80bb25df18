//! Project descriptor reader.
//!
//! The descriptor is a small XML document: an `<Obfuscator>` root with `<Var>` settings
//! and one `<Module>` element per input, each optionally carrying skip rules:
//!
//! ```xml
//! <Obfuscator>
//!   <Var name="OutPath" value="obfuscated" />
//!   <Var name="HideStrings" value="true" />
//!   <Module file="Lib.dll">
//!     <SkipNamespace name="Lib.Api" />
//!     <SkipMethod type="Lib.Widget" rx="^On" attrib="public" />
//!   </Module>
//!   <Module file="App.exe" />
//! </Obfuscator>
//! ```
//!
//! `$(Name)` occurrences in attribute values are substituted from previously declared
//! variables. Binary module loading stays behind [`crate::project::ModuleLoader`]; this
//! module only turns the descriptor into [`Settings`] plus per-module [`SkipSet`]s.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{
    project::{
        skip::{MemberRule, NamePattern, SkipSet, TypeRule, TypeSkipFlags, Visibility},
        Settings,
    },
    Error, Result,
};

/// One `<Module>` entry of the descriptor.
#[derive(Debug)]
pub struct ModuleConfig {
    /// Path of the input module
    pub file: PathBuf,
    /// Skip rules scoped to this module
    pub skip: SkipSet,
}

/// A parsed project descriptor.
#[derive(Debug)]
pub struct ProjectConfig {
    /// Global settings
    pub settings: Settings,
    /// Input modules, descriptor order
    pub modules: Vec<ModuleConfig>,
}

impl ProjectConfig {
    /// Read and parse a descriptor file. Relative module paths resolve against the
    /// descriptor's directory.
    ///
    /// # Errors
    /// [`Error::Project`] when the file cannot be read, [`Error::Config`] /
    /// [`Error::Pattern`] for invalid content.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Project(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text, path.parent())
    }

    /// Parse a descriptor from a string, without path resolution.
    ///
    /// # Errors
    /// Same conditions as [`ProjectConfig::from_path`], minus the read fault.
    pub fn from_xml(text: &str) -> Result<Self> {
        Self::parse(text, None)
    }

    fn parse(text: &str, base_dir: Option<&Path>) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut vars: HashMap<String, String> = HashMap::new();
        let mut modules = Vec::new();
        let mut current: Option<ModuleConfig> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    if let Some(module) =
                        handle_element(&e, &mut vars, base_dir, current.as_mut())?
                    {
                        current = Some(module);
                    }
                }
                Event::Empty(e) => {
                    let opened = handle_element(&e, &mut vars, base_dir, current.as_mut())?;
                    // a self-closing Module carries no skip children
                    if let Some(module) = opened {
                        modules.push(module);
                    }
                }
                Event::End(e) => {
                    if e.name().as_ref() == b"Module" {
                        if let Some(module) = current.take() {
                            modules.push(module);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(ProjectConfig {
            settings: settings_from_vars(&vars)?,
            modules,
        })
    }
}

/// Dispatch one element. Returns `Some` when the element opens a new module scope.
fn handle_element(
    e: &BytesStart<'_>,
    vars: &mut HashMap<String, String>,
    base_dir: Option<&Path>,
    current: Option<&mut ModuleConfig>,
) -> Result<Option<ModuleConfig>> {
    let attrs = read_attributes(e, vars)?;
    match e.name().as_ref() {
        b"Obfuscator" => Ok(None),
        b"Var" => {
            let key = required(&attrs, "name", "Var")?;
            let value = required(&attrs, "value", "Var")?;
            vars.insert(key, value);
            Ok(None)
        }
        b"Module" => {
            let file = required(&attrs, "file", "Module")?;
            let file = match base_dir {
                Some(base) if Path::new(&file).is_relative() => base.join(&file),
                _ => PathBuf::from(&file),
            };
            Ok(Some(ModuleConfig {
                file,
                skip: SkipSet::new(),
            }))
        }
        name => {
            if let Some(module) = current {
                parse_skip_element(name, &attrs, &mut module.skip)?;
            }
            Ok(None)
        }
    }
}

fn read_attributes(
    e: &BytesStart<'_>,
    vars: &HashMap<String, String>,
) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for attr in e.attributes() {
        let attr =
            attr.map_err(|e| Error::Project(format!("invalid attribute in project file: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        out.insert(key, substitute(&value, vars));
    }
    Ok(out)
}

fn required(attrs: &HashMap<String, String>, key: &str, element: &str) -> Result<String> {
    attrs
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| Error::Config(format!("A {element} element requires a {key} attribute")))
}

/// Replace `$(Name)` occurrences from the variable table; unknown names are left as-is.
fn substitute(value: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("$(") {
        out.push_str(&rest[..start]);
        match rest[start..].find(')') {
            Some(close) => {
                let name = &rest[start + 2..start + close];
                match vars.get(name) {
                    Some(replacement) => out.push_str(replacement),
                    None => out.push_str(&rest[start..=start + close]),
                }
                rest = &rest[start + close + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn parse_skip_element(
    name: &[u8],
    attrs: &HashMap<String, String>,
    skip: &mut SkipSet,
) -> Result<()> {
    match name {
        b"SkipNamespace" => {
            if let Some(pattern) = name_pattern(attrs)? {
                skip.add_namespace(pattern);
            }
        }
        b"SkipType" => {
            if let Some(pattern) = name_pattern(attrs)? {
                let mut flags = TypeSkipFlags::empty();
                for (attr, flag) in [
                    ("skipMethods", TypeSkipFlags::METHOD),
                    ("skipFields", TypeSkipFlags::FIELD),
                    ("skipProperties", TypeSkipFlags::PROPERTY),
                    ("skipEvents", TypeSkipFlags::EVENT),
                    ("skipStringHiding", TypeSkipFlags::STRING_HIDING),
                ] {
                    if bool_attr(attrs, attr)? {
                        flags |= flag;
                    }
                }
                skip.add_type(TypeRule {
                    pattern,
                    flags,
                    visibility: visibility_attr(attrs, "attrib")?,
                });
            }
        }
        b"SkipMethod" => {
            if let Some(rule) = member_rule(attrs)? {
                skip.add_method(rule);
            }
        }
        b"SkipStringHiding" => {
            if let Some(rule) = member_rule(attrs)? {
                skip.add_string_hiding(rule);
            }
        }
        b"SkipField" => {
            if let Some(rule) = member_rule(attrs)? {
                skip.add_field(rule);
            }
        }
        b"SkipProperty" => {
            if let Some(rule) = member_rule(attrs)? {
                skip.add_property(rule);
            }
        }
        b"SkipEvent" => {
            if let Some(rule) = member_rule(attrs)? {
                skip.add_event(rule);
            }
        }
        _ => {}
    }
    Ok(())
}

/// The `name=`/`rx=` pair of a rule; `None` when both are absent (rule ignored).
fn name_pattern(attrs: &HashMap<String, String>) -> Result<Option<NamePattern>> {
    if let Some(name) = attrs.get("name").filter(|v| !v.is_empty()) {
        return Ok(Some(NamePattern::Literal(name.clone())));
    }
    if let Some(rx) = attrs.get("rx").filter(|v| !v.is_empty()) {
        return Ok(Some(NamePattern::regex(rx)?));
    }
    Ok(None)
}

fn member_rule(attrs: &HashMap<String, String>) -> Result<Option<MemberRule>> {
    let Some(name) = name_pattern(attrs)? else {
        return Ok(None);
    };
    let declaring = match attrs.get("type").filter(|v| !v.is_empty()) {
        Some(type_name) => NamePattern::Literal(type_name.clone()),
        None => NamePattern::Any,
    };
    Ok(Some(MemberRule {
        name,
        declaring,
        visibility: visibility_attr(attrs, "attrib")?,
        type_visibility: visibility_attr(attrs, "typeattrib")?,
    }))
}

fn visibility_attr(attrs: &HashMap<String, String>, key: &str) -> Result<Option<Visibility>> {
    match attrs.get(key).map(String::as_str) {
        None | Some("") => Ok(None),
        Some("public") => Ok(Some(Visibility::Public)),
        Some(other) => Err(Error::Config(format!(
            "Unsupported {key} value '{other}' (expected 'public')"
        ))),
    }
}

fn bool_attr(attrs: &HashMap<String, String>, key: &str) -> Result<bool> {
    match attrs.get(key).map(String::as_str) {
        None | Some("") => Ok(false),
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(Error::Config(format!(
            "Invalid boolean value '{other}' for {key}"
        ))),
    }
}

fn bool_var(vars: &HashMap<String, String>, name: &str, default: bool) -> Result<bool> {
    match vars.get(name).map(String::as_str) {
        None => Ok(default),
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(Error::Config(format!(
            "Invalid boolean value '{other}' for {name}"
        ))),
    }
}

fn settings_from_vars(vars: &HashMap<String, String>) -> Result<Settings> {
    let mut settings = Settings::default();
    if let Some(out_path) = vars.get("OutPath") {
        settings.out_path = PathBuf::from(out_path);
    }
    settings.key_file = vars.get("KeyFile").cloned();
    settings.hide_strings = bool_var(vars, "HideStrings", settings.hide_strings)?;
    settings.rename_properties = bool_var(vars, "RenameProperties", settings.rename_properties)?;
    settings.rename_events = bool_var(vars, "RenameEvents", settings.rename_events)?;
    settings.reuse_names = bool_var(vars, "ReuseNames", settings.reuse_names)?;
    settings.marked_only = bool_var(vars, "MarkedOnly", settings.marked_only)?;
    settings.xml_mapping = bool_var(vars, "XmlMapping", settings.xml_mapping)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_descriptor() {
        let config = ProjectConfig::from_xml(
            r#"<Obfuscator>
                 <Var name="Base" value="out" />
                 <Var name="OutPath" value="$(Base)/bin" />
                 <Var name="XmlMapping" value="true" />
                 <Module file="Lib.dll">
                   <SkipNamespace name="Lib.Api" />
                   <SkipMethod type="Lib.Widget" rx="^On" />
                 </Module>
                 <Module file="App.exe" />
               </Obfuscator>"#,
        )
        .unwrap();

        assert_eq!(config.settings.out_path, PathBuf::from("out/bin"));
        assert!(config.settings.xml_mapping);
        assert_eq!(config.modules.len(), 2);
        assert_eq!(config.modules[0].file, PathBuf::from("Lib.dll"));
        assert!(config.modules[0].skip.should_skip_namespace("Lib.Api"));
        assert!(config.modules[1].skip.is_empty());
    }

    #[test]
    fn test_module_without_file_is_a_config_fault() {
        let result = ProjectConfig::from_xml("<Obfuscator><Module /></Obfuscator>");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_rx_is_a_pattern_fault() {
        let result = ProjectConfig::from_xml(
            r#"<Obfuscator><Module file="A.dll"><SkipMethod rx="(" /></Module></Obfuscator>"#,
        );
        assert!(matches!(result, Err(Error::Pattern { .. })));
    }

    #[test]
    fn test_var_substitution_handles_unknown_names() {
        let vars = HashMap::from([("A".to_string(), "1".to_string())]);
        assert_eq!(substitute("$(A)-$(B)", &vars), "1-$(B)");
        assert_eq!(substitute("plain", &vars), "plain");
    }

    #[test]
    fn test_missing_descriptor_file() {
        let result = ProjectConfig::from_path(Path::new("does/not/exist.xml"));
        assert!(matches!(result, Err(Error::Project(_))));
    }
}
