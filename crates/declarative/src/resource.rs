//! Resource declarations
//!
//! A [`Resource`] is a validated declaration: a kind, a name, an action and
//! the attributes that parameterize it. Validation happens once, in
//! [`Resource::declare`], against the kind's attribute schema, so providers
//! can read attributes without re-checking their shape.

use crate::error::{Error, Result};
use crate::value::{Attributes, Value, ValueType};
use serde::{Deserialize, Serialize};
use shellkit::{Guard, ShellCommand};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of host state a resource manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    File,
    Directory,
    Link,
    Execute,
    Package,
    Service,
    PropertiesFile,
    XmlConfig,
}

impl ResourceKind {
    /// Every kind
    pub const ALL: [ResourceKind; 8] = [
        Self::File,
        Self::Directory,
        Self::Link,
        Self::Execute,
        Self::Package,
        Self::Service,
        Self::PropertiesFile,
        Self::XmlConfig,
    ];

    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Directory => "Directory",
            Self::Link => "Link",
            Self::Execute => "Execute",
            Self::Package => "Package",
            Self::Service => "Service",
            Self::PropertiesFile => "PropertiesFile",
            Self::XmlConfig => "XmlConfig",
        }
    }

    /// Allowed actions; the first is the default
    pub fn actions(&self) -> &'static [Action] {
        use Action::{Create, Delete, Install, Nothing, Reload, Remove, Restart, Run, Start, Stop, Upgrade};
        match self {
            Self::File
            | Self::Directory
            | Self::Link
            | Self::PropertiesFile
            | Self::XmlConfig => &[Create, Delete, Nothing],
            Self::Execute => &[Run, Nothing],
            Self::Package => &[Install, Remove, Upgrade, Nothing],
            Self::Service => &[Start, Stop, Restart, Reload, Nothing],
        }
    }

    /// Action used when none is declared
    pub fn default_action(&self) -> Action {
        self.actions()[0]
    }

    /// Kind-specific attributes (common attributes excluded)
    pub fn schema(&self) -> &'static [AttrSpec] {
        match self {
            Self::File => FILE_ATTRIBUTES,
            Self::Directory => DIRECTORY_ATTRIBUTES,
            Self::Link => LINK_ATTRIBUTES,
            Self::Execute => EXECUTE_ATTRIBUTES,
            Self::Package => PACKAGE_ATTRIBUTES,
            Self::Service => SERVICE_ATTRIBUTES,
            Self::PropertiesFile => PROPERTIES_FILE_ATTRIBUTES,
            Self::XmlConfig => XML_CONFIG_ATTRIBUTES,
        }
    }

    /// Whether realizations of this kind are deduplicated within a scope
    pub fn is_deduplicated(&self) -> bool {
        !matches!(self, Self::Execute | Self::Service)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().to_lowercase() == normalized)
            .ok_or_else(|| format!("unknown resource type: {s}"))
    }
}

/// What to do with a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Delete,
    Nothing,
    Run,
    Install,
    Remove,
    Upgrade,
    Start,
    Stop,
    Restart,
    Reload,
}

impl Action {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Nothing => "nothing",
            Self::Run => "run",
            Self::Install => "install",
            Self::Remove => "remove",
            Self::Upgrade => "upgrade",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Reload => "reload",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let all = [
            Self::Create,
            Self::Delete,
            Self::Nothing,
            Self::Run,
            Self::Install,
            Self::Remove,
            Self::Upgrade,
            Self::Start,
            Self::Stop,
            Self::Restart,
            Self::Reload,
        ];
        all.into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown action: {s}"))
    }
}

/// One attribute in a kind's schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrSpec {
    pub name: &'static str,
    pub ty: ValueType,
    pub required: bool,
}

impl AttrSpec {
    const fn optional(name: &'static str, ty: ValueType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }

    const fn required(name: &'static str, ty: ValueType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }
}

use ValueType::{Bool, Command, Int, List, Map, Mode, Str};

const FILE_ATTRIBUTES: &[AttrSpec] = &[
    AttrSpec::optional("content", Str),
    AttrSpec::optional("source", Str),
    AttrSpec::optional("owner", Str),
    AttrSpec::optional("group", Str),
    AttrSpec::optional("mode", Mode),
    AttrSpec::optional("encoding", Str),
    AttrSpec::optional("backup", Bool),
    AttrSpec::optional("replace", Bool),
    AttrSpec::optional("create_parents", Bool),
];

const DIRECTORY_ATTRIBUTES: &[AttrSpec] = &[
    AttrSpec::optional("owner", Str),
    AttrSpec::optional("group", Str),
    AttrSpec::optional("mode", Mode),
    AttrSpec::optional("create_parents", Bool),
    AttrSpec::optional("recursive_ownership", Bool),
];

const LINK_ATTRIBUTES: &[AttrSpec] = &[AttrSpec::required("to", Str), AttrSpec::optional("hard", Bool)];

const EXECUTE_ATTRIBUTES: &[AttrSpec] = &[
    AttrSpec::required("command", Command),
    AttrSpec::optional("user", Str),
    AttrSpec::optional("environment", Map),
    AttrSpec::optional("cwd", Str),
    AttrSpec::optional("timeout", Int),
    AttrSpec::optional("logoutput", Bool),
    AttrSpec::optional("sudo", Bool),
    AttrSpec::optional("creates", Str),
    AttrSpec::optional("tries", Int),
    AttrSpec::optional("try_sleep", Int),
];

const PACKAGE_ATTRIBUTES: &[AttrSpec] = &[
    AttrSpec::optional("version", Str),
    AttrSpec::optional("use_repos", List),
    AttrSpec::optional("skip_repos", List),
    AttrSpec::optional("retry_count", Int),
    AttrSpec::optional("retry_sleep", Int),
    AttrSpec::optional("retry_on_locked", Bool),
    AttrSpec::optional("retry_on_repo_unavailability", Bool),
    AttrSpec::optional("logoutput", Bool),
    AttrSpec::optional("ignore_dependencies", Bool),
];

const SERVICE_ATTRIBUTES: &[AttrSpec] = &[AttrSpec::optional("status_command", Command)];

const PROPERTIES_FILE_ATTRIBUTES: &[AttrSpec] = &[
    AttrSpec::required("properties", Map),
    AttrSpec::optional("key_value_delimiter", Str),
    AttrSpec::optional("owner", Str),
    AttrSpec::optional("group", Str),
    AttrSpec::optional("mode", Mode),
    AttrSpec::optional("encoding", Str),
    AttrSpec::optional("backup", Bool),
    AttrSpec::optional("create_parents", Bool),
];

// `name` is the file name, resolved against `conf_dir` when set
const XML_CONFIG_ATTRIBUTES: &[AttrSpec] = &[
    AttrSpec::required("configurations", Map),
    AttrSpec::optional("configuration_attributes", Map),
    AttrSpec::optional("conf_dir", Str),
    AttrSpec::optional("owner", Str),
    AttrSpec::optional("group", Str),
    AttrSpec::optional("mode", Mode),
    AttrSpec::optional("encoding", Str),
    AttrSpec::optional("backup", Bool),
    AttrSpec::optional("create_parents", Bool),
];

/// Attributes every kind accepts
pub const COMMON_ATTRIBUTES: [AttrSpec; 4] = [
    AttrSpec::optional("action", ValueType::Str),
    AttrSpec::optional("only_if", ValueType::Command),
    AttrSpec::optional("not_if", ValueType::Command),
    AttrSpec::optional("ignore_failures", ValueType::Bool),
];

const ENCODINGS: [&str; 5] = ["utf-8", "utf8", "ascii", "latin-1", "iso-8859-1"];

fn is_attribute_key(key: &str) -> bool {
    key.split_once(':')
        .is_some_and(|(attr, property)| !attr.is_empty() && !property.is_empty())
}

/// A validated resource declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    kind: ResourceKind,
    name: String,
    action: Action,
    attributes: Attributes,
    guards: Vec<Guard>,
    ignore_failures: bool,
}

impl Resource {
    /// Validate a declaration against its kind's schema.
    ///
    /// Rejects unknown attributes, missing required attributes, values of the
    /// wrong shape and actions the kind does not support.
    pub fn declare(kind: ResourceKind, name: impl Into<String>, attributes: Attributes) -> Result<Self> {
        let name = name.into();
        let invalid = |attribute: &str, message: String| Error::InvalidAttribute {
            kind: kind.to_string(),
            name: name.clone(),
            attribute: attribute.to_string(),
            message,
        };

        if name.trim().is_empty() {
            return Err(invalid("name", "must not be empty".to_string()));
        }

        for (key, value) in &attributes {
            let spec = COMMON_ATTRIBUTES
                .iter()
                .chain(kind.schema())
                .find(|s| s.name == key.as_str())
                .ok_or_else(|| Error::UnknownAttribute {
                    kind: kind.to_string(),
                    name: name.clone(),
                    attribute: key.clone(),
                })?;
            if !spec.ty.accepts(value) {
                return Err(invalid(key, format!("expected {}, got '{value}'", spec.ty.as_str())));
            }
        }

        if let Some(spec) = kind
            .schema()
            .iter()
            .find(|s| s.required && !attributes.contains_key(s.name))
        {
            return Err(Error::MissingAttribute {
                kind: kind.to_string(),
                name: name.clone(),
                attribute: spec.name.to_string(),
            });
        }

        let action = match attributes.get("action").and_then(Value::as_str) {
            None => kind.default_action(),
            Some(raw) => raw
                .parse::<Action>()
                .ok()
                .filter(|a| kind.actions().contains(a))
                .ok_or_else(|| Error::UnsupportedAction {
                    kind: kind.to_string(),
                    name: name.clone(),
                    action: raw.to_string(),
                })?,
        };

        if attributes.contains_key("content") && attributes.contains_key("source") {
            return Err(invalid("source", "'content' and 'source' are mutually exclusive".to_string()));
        }

        if let Some(encoding) = attributes.get("encoding").and_then(Value::as_str)
            && !ENCODINGS.contains(&encoding.to_lowercase().as_str())
        {
            return Err(invalid(
                "encoding",
                format!("unsupported encoding '{encoding}' (expected one of {})", ENCODINGS.join(", ")),
            ));
        }

        if let Some(attrs) = attributes.get("configuration_attributes").and_then(Value::as_map)
            && let Some(key) = attrs.keys().find(|k| !is_attribute_key(k))
        {
            return Err(invalid(
                "configuration_attributes",
                format!("key '{key}' must look like '<attribute>:<property>'"),
            ));
        }

        for key in ["timeout", "tries", "try_sleep", "retry_count", "retry_sleep"] {
            if let Some(n) = attributes.get(key).and_then(Value::as_int)
                && n < 0
            {
                return Err(invalid(key, format!("must not be negative, got {n}")));
            }
        }

        let mut guards = Vec::new();
        if let Some(cmd) = attributes.get("only_if").and_then(to_command) {
            guards.push(Guard::OnlyIf(cmd));
        }
        if let Some(cmd) = attributes.get("not_if").and_then(to_command) {
            guards.push(Guard::NotIf(cmd));
        }

        let ignore_failures = attributes
            .get("ignore_failures")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self {
            kind,
            name,
            action,
            attributes,
            guards,
            ignore_failures,
        })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// `only_if` / `not_if` guards, in that order
    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn ignore_failures(&self) -> bool {
        self.ignore_failures
    }

    /// Scope dedup key (`kind:action:name`), `None` for kinds never deduplicated
    pub fn dedup_key(&self) -> Option<String> {
        self.kind
            .is_deduplicated()
            .then(|| format!("{}:{}:{}", self.kind, self.action, self.name))
    }

    /// Name as a filesystem path
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.name)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn bool_attr(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn str_attr(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Non-negative integer attribute (validated at declaration)
    pub fn u64_attr(&self, key: &str) -> Option<u64> {
        self.get(key)
            .and_then(Value::as_int)
            .and_then(|i| u64::try_from(i).ok())
    }

    pub fn list_attr(&self, key: &str) -> Vec<String> {
        self.get(key).and_then(Value::as_list).unwrap_or_default()
    }

    pub fn map_attr(&self, key: &str) -> BTreeMap<String, String> {
        self.get(key).and_then(Value::as_map).cloned().unwrap_or_default()
    }

    pub fn mode_attr(&self) -> Option<u32> {
        self.get("mode").and_then(Value::as_mode)
    }

    pub fn command_attr(&self, key: &str) -> Option<ShellCommand> {
        self.get(key).and_then(to_command)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.name)
    }
}

fn to_command(value: &Value) -> Option<ShellCommand> {
    match value {
        Value::Str(s) => Some(ShellCommand::shell(s.clone())),
        Value::List(args) => Some(ShellCommand::Argv(args.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;

    #[test]
    fn test_default_action() {
        let r = Resource::declare(ResourceKind::File, "/tmp/a", attrs! {}).unwrap();
        assert_eq!(r.action(), Action::Create);
        let r = Resource::declare(ResourceKind::Package, "httpd", attrs! {}).unwrap();
        assert_eq!(r.action(), Action::Install);
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let err = Resource::declare(ResourceKind::File, "/tmp/a", attrs! { "colour" => "red" })
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAttribute { ref attribute, .. } if attribute == "colour"));
    }

    #[test]
    fn test_missing_required_attribute() {
        let err = Resource::declare(ResourceKind::Link, "/tmp/l", attrs! {}).unwrap_err();
        assert!(matches!(err, Error::MissingAttribute { ref attribute, .. } if attribute == "to"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = Resource::declare(ResourceKind::File, "/tmp/a", attrs! { "backup" => "maybe" })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAttribute { .. }));
    }

    #[test]
    fn test_lenient_coercion_accepted() {
        let r = Resource::declare(
            ResourceKind::Package,
            "httpd",
            attrs! { "retry_count" => "3", "retry_on_locked" => "false" },
        )
        .unwrap();
        assert_eq!(r.u64_attr("retry_count"), Some(3));
        assert!(!r.bool_attr("retry_on_locked", true));
    }

    #[test]
    fn test_unsupported_action() {
        let err = Resource::declare(ResourceKind::Execute, "x", attrs! { "command" => "true", "action" => "delete" })
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedAction { ref action, .. } if action == "delete"));
    }

    #[test]
    fn test_content_and_source_exclusive() {
        let err = Resource::declare(
            ResourceKind::File,
            "/tmp/a",
            attrs! { "content" => "x", "source" => "y" },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAttribute { .. }));
    }

    #[test]
    fn test_encoding_validated() {
        assert!(Resource::declare(ResourceKind::File, "/tmp/a", attrs! { "encoding" => "UTF-8" }).is_ok());
        assert!(Resource::declare(ResourceKind::File, "/tmp/a", attrs! { "encoding" => "ebcdic" }).is_err());
    }

    #[test]
    fn test_negative_counts_rejected() {
        let err = Resource::declare(
            ResourceKind::Execute,
            "x",
            attrs! { "command" => "true", "tries" => -1 },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAttribute { ref attribute, .. } if attribute == "tries"));
    }

    #[test]
    fn test_guards_and_flags() {
        let r = Resource::declare(
            ResourceKind::Execute,
            "x",
            attrs! {
                "command" => "true",
                "only_if" => "test -f /a",
                "not_if" => vec!["test", "-f", "/b"],
                "ignore_failures" => true,
            },
        )
        .unwrap();
        assert_eq!(r.guards().len(), 2);
        assert!(matches!(r.guards()[0], Guard::OnlyIf(_)));
        assert!(r.ignore_failures());
    }

    #[test]
    fn test_dedup_key() {
        let f = Resource::declare(ResourceKind::File, "/tmp/a", attrs! {}).unwrap();
        assert_eq!(f.dedup_key().as_deref(), Some("File:create:/tmp/a"));
        let e = Resource::declare(ResourceKind::Execute, "x", attrs! { "command" => "true" }).unwrap();
        assert_eq!(e.dedup_key(), None);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("properties_file".parse::<ResourceKind>(), Ok(ResourceKind::PropertiesFile));
        assert_eq!("file".parse::<ResourceKind>(), Ok(ResourceKind::File));
        assert_eq!("xml_config".parse::<ResourceKind>(), Ok(ResourceKind::XmlConfig));
        assert!("template".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_schema_is_static() {
        let schemas: Vec<&'static [AttrSpec]> = ResourceKind::ALL.iter().map(ResourceKind::schema).collect();
        assert_eq!(schemas.len(), ResourceKind::ALL.len());
        assert!(schemas.iter().all(|schema| !schema.is_empty()));
        assert!(ResourceKind::Link.schema().iter().any(|s| s.name == "to" && s.required));
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn test_xml_config_attribute_keys() {
        let ok = Resource::declare(
            ResourceKind::XmlConfig,
            "hdfs-site.xml",
            attrs! {
                "configurations" => map(&[("dfs.replication", "3")]),
                "configuration_attributes" => map(&[("final:dfs.replication", "true")]),
            },
        );
        assert!(ok.is_ok());

        let err = Resource::declare(
            ResourceKind::XmlConfig,
            "hdfs-site.xml",
            attrs! {
                "configurations" => map(&[("dfs.replication", "3")]),
                "configuration_attributes" => map(&[("final", "true")]),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAttribute { ref attribute, .. } if attribute == "configuration_attributes"));

        let err = Resource::declare(ResourceKind::XmlConfig, "core-site.xml", attrs! {}).unwrap_err();
        assert!(matches!(err, Error::MissingAttribute { .. }));
    }
}
