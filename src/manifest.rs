//! TOML manifests
//!
//! ```toml
//! base_dir = "/etc/hadoop/conf"
//!
//! [[resource]]
//! type = "package"
//! name = "hadoop-hdfs"
//!
//! [[resource]]
//! type = "file"
//! name = "core-site.xml"
//! source = "templates/core-site.xml"
//! mode = "0644"
//!
//! [[scope]]
//! base_dir = "/var/lib/hadoop"
//!
//! [[scope.resource]]
//! type = "directory"
//! name = "hdfs"
//! owner = "hdfs"
//! ```
//!
//! Every declaration is validated before anything is realized.

use anyhow::{Context, Result, anyhow, bail};
use declarative::{Attributes, Environment, Resource, ResourceKind, ScopeOptions, ScopeReport, Value};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::expand_path;

/// One scope of a manifest file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub base_dir: Option<String>,
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceEntry>,
    #[serde(default, rename = "scope")]
    pub scopes: Vec<Manifest>,
}

/// A `[[resource]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(flatten)]
    pub attributes: toml::Table,
}

/// Validated manifest scope
#[derive(Debug, Clone, Default)]
pub struct ScopePlan {
    pub base_dir: Option<PathBuf>,
    pub resources: Vec<Resource>,
    pub scopes: Vec<ScopePlan>,
}

impl ScopePlan {
    /// Resources in this scope and all nested ones
    pub fn len(&self) -> usize {
        self.resources.len() + self.scopes.iter().map(ScopePlan::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Attributes holding paths get `~` and `$VAR` expansion like resource names do
const PATH_ATTRIBUTES: [&str; 5] = ["source", "to", "cwd", "creates", "conf_dir"];

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate every declaration
    pub fn plan(&self) -> Result<ScopePlan> {
        let base_dir = self.base_dir.as_deref().map(expand_path).transpose()?;
        let resources = self
            .resources
            .iter()
            .map(ResourceEntry::to_resource)
            .collect::<Result<Vec<_>>>()?;
        let scopes = self.scopes.iter().map(Manifest::plan).collect::<Result<Vec<_>>>()?;
        Ok(ScopePlan {
            base_dir,
            resources,
            scopes,
        })
    }
}

impl ResourceEntry {
    fn to_resource(&self) -> Result<Resource> {
        let kind: ResourceKind = self.kind.parse().map_err(|e: String| anyhow!(e))?;
        let name = if is_path_kind(kind) {
            expand_path(&self.name)?.to_string_lossy().into_owned()
        } else {
            self.name.clone()
        };

        let mut attributes = Attributes::new();
        for (key, value) in &self.attributes {
            let mut value = to_value(value).with_context(|| format!("{kind}[{name}]: attribute '{key}'"))?;
            if PATH_ATTRIBUTES.contains(&key.as_str())
                && let Value::Str(path) = &value
            {
                value = Value::Str(expand_path(path)?.to_string_lossy().into_owned());
            }
            attributes.insert(key.clone(), value);
        }
        Ok(Resource::declare(kind, name, attributes)?)
    }
}

fn is_path_kind(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::File
            | ResourceKind::Directory
            | ResourceKind::Link
            | ResourceKind::PropertiesFile
            | ResourceKind::XmlConfig
    )
}

fn scalar(value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => bail!("nested values are not supported"),
    }
}

fn to_value(value: &toml::Value) -> Result<Value> {
    Ok(match value {
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Float(_) => bail!("floating point values are not supported"),
        toml::Value::Datetime(d) => Value::Str(d.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(scalar).collect::<Result<_>>()?),
        toml::Value::Table(table) => Value::Map(
            table
                .iter()
                .map(|(k, v)| Ok((k.clone(), scalar(v)?)))
                .collect::<Result<BTreeMap<_, _>>>()?,
        ),
    })
}

/// Realize `plan` as nested scopes
///
/// A scope's own resources are realized before its nested scopes. The
/// returned report covers every scope.
pub fn realize(env: &mut Environment<'_>, plan: &ScopePlan) -> declarative::Result<ScopeReport> {
    let opts = ScopeOptions {
        base_dir: plan.base_dir.clone(),
    };
    let (nested, mut report) = env.with_scope(opts, |env| {
        for resource in &plan.resources {
            env.push(resource.clone())?;
        }
        env.realize_pending()?;

        let mut nested = ScopeReport::default();
        for scope in &plan.scopes {
            nested.absorb(realize(env, scope)?);
        }
        Ok(nested)
    })?;
    report.absorb(nested);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::ApplyResult;
    use pkgkit::PlatformFamily;
    use shellkit::ScriptedShell;

    const MANIFEST: &str = r#"
base_dir = "/srv/app"

[[resource]]
type = "package"
name = "httpd"
retry_count = 2
use_repos = ["base", "updates"]

[[resource]]
type = "properties_file"
name = "app.properties"
properties = { port = 8080, "log.dir" = "/var/log/app" }

[[scope]]
base_dir = "data"

[[scope.resource]]
type = "execute"
name = "init"
command = "app init"
only_if = "test -d /srv/app"
"#;

    #[test]
    fn test_parse_and_plan() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        let plan = manifest.plan().unwrap();
        assert_eq!(plan.base_dir, Some(PathBuf::from("/srv/app")));
        assert_eq!(plan.len(), 3);

        let httpd = &plan.resources[0];
        assert_eq!(httpd.kind(), ResourceKind::Package);
        assert_eq!(httpd.u64_attr("retry_count"), Some(2));
        assert_eq!(httpd.list_attr("use_repos"), ["base", "updates"]);

        let props = plan.resources[1].map_attr("properties");
        assert_eq!(props.get("port").map(String::as_str), Some("8080"));

        assert_eq!(plan.scopes[0].base_dir, Some(PathBuf::from("data")));
        assert_eq!(plan.scopes[0].resources[0].guards().len(), 1);
    }

    #[test]
    fn test_invalid_declaration_fails_plan() {
        let manifest = Manifest::parse(
            r#"
[[resource]]
type = "link"
name = "/opt/app/current"
"#,
        )
        .unwrap();
        let err = manifest.plan().unwrap_err();
        assert!(err.to_string().contains("missing required attribute 'to'"));
    }

    #[test]
    fn test_unknown_kind() {
        let manifest = Manifest::parse("[[resource]]\ntype = \"cron\"\nname = \"x\"\n").unwrap();
        assert!(manifest.plan().is_err());
    }

    #[test]
    fn test_float_rejected() {
        let manifest = Manifest::parse("[[resource]]\ntype = \"execute\"\nname = \"x\"\ncommand = \"true\"\ntimeout = 1.5\n").unwrap();
        let err = format!("{:#}", manifest.plan().unwrap_err());
        assert!(err.contains("floating point"));
    }

    #[test]
    fn test_tilde_in_names_and_paths() {
        let home = dirs::home_dir().unwrap();
        let manifest = Manifest::parse(
            "[[resource]]\ntype = \"link\"\nname = \"~/current\"\nto = \"~/releases/1\"\n",
        )
        .unwrap();
        let plan = manifest.plan().unwrap();
        let link = &plan.resources[0];
        assert_eq!(link.path(), home.join("current"));
        let to = home.join("releases/1").to_string_lossy().into_owned();
        assert_eq!(link.str_attr("to"), Some(to.as_str()));
    }

    #[test]
    fn test_xml_config_resource() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::parse(&format!(
            r#"
[[resource]]
type = "xml_config"
name = "hdfs-site.xml"
conf_dir = "{}"
configurations = {{ "dfs.replication" = 3, "dfs.permissions.enabled" = true }}
configuration_attributes = {{ "final:dfs.replication" = "true" }}
"#,
            dir.path().display()
        ))
        .unwrap();
        let plan = manifest.plan().unwrap();
        assert_eq!(plan.resources[0].kind(), ResourceKind::XmlConfig);

        let shell = ScriptedShell::new();
        let mut env = Environment::new(&shell, PlatformFamily::Debian);
        let report = realize(&mut env, &plan).unwrap();
        assert_eq!(report.outcomes[0].result, ApplyResult::Created);

        let text = fs::read_to_string(dir.path().join("hdfs-site.xml")).unwrap();
        assert!(text.contains("<name>dfs.replication</name>\n    <value>3</value>\n    <final>true</final>"));
        assert!(text.contains("<value>true</value>"));
    }

    #[test]
    fn test_realize_nested_scopes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::parse(&format!(
            r#"
base_dir = "{}"

[[resource]]
type = "directory"
name = "conf"

[[scope]]
base_dir = "conf"

[[scope.resource]]
type = "file"
name = "app.conf"
content = "port = 8080\n"
"#,
            dir.path().display()
        ))
        .unwrap();
        let plan = manifest.plan().unwrap();

        let shell = ScriptedShell::new();
        let mut env = Environment::new(&shell, PlatformFamily::Redhat);
        let report = realize(&mut env, &plan).unwrap();

        let results: Vec<_> = report.outcomes.iter().map(|o| o.result.clone()).collect();
        assert_eq!(results, [ApplyResult::Created, ApplyResult::Created]);
        assert_eq!(
            fs::read_to_string(dir.path().join("conf/app.conf")).unwrap(),
            "port = 8080\n"
        );
        assert_eq!(env.depth(), 0);
    }
}
