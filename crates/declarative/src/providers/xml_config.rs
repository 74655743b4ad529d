//! XmlConfig provider
//!
//! Renders a Hadoop-style `<configuration>` document with one `<property>`
//! per key, sorted by name. Per-property attributes come from
//! `configuration_attributes`, keyed `<attribute>:<property>`, and become
//! child elements of the property they name.

use super::Provider;
use super::file::{FileSpec, delete_file, ensure_file};
use crate::context::ApplyContext;
use crate::error::Result;
use crate::resource::{Action, Resource};
use crate::types::ApplyResult;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const HEADER: &str = "<!--Generated by converge.-->";
const ROOT_OPEN: &str = r#"<configuration xmlns:xi="http://www.w3.org/2001/XInclude">"#;
const ROOT_CLOSE: &str = "</configuration>";

/// Escape text for element content
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the configuration document
pub fn render_xml_config(
    configurations: &BTreeMap<String, String>,
    attributes: &BTreeMap<String, String>,
) -> String {
    // property -> [(attribute, value)], attribute order follows the sorted keys
    let mut by_property: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
    for (key, value) in attributes {
        if let Some((attribute, property)) = key.split_once(':') {
            by_property
                .entry(property)
                .or_default()
                .push((attribute, value.as_str()));
        }
    }

    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    out.push_str(ROOT_OPEN);
    out.push('\n');
    for (name, value) in configurations {
        out.push_str("  <property>\n");
        out.push_str(&format!("    <name>{}</name>\n", escape(name)));
        out.push_str(&format!("    <value>{}</value>\n", escape(value)));
        for (attribute, attr_value) in by_property.get(name.as_str()).into_iter().flatten() {
            let tag = escape(attribute);
            out.push_str(&format!("    <{tag}>{}</{tag}>\n", escape(attr_value)));
        }
        out.push_str("  </property>\n");
    }
    out.push_str(ROOT_CLOSE);
    out.push('\n');
    out
}

/// Managed file path: `conf_dir/name` when `conf_dir` is set
fn target_path(resource: &Resource, ctx: &ApplyContext<'_>) -> PathBuf {
    match resource.str_attr("conf_dir") {
        Some(dir) => ctx.resolve(Path::new(dir).join(resource.name())),
        None => ctx.resolve(resource.name()),
    }
}

/// Manages Hadoop-style XML configuration files
#[derive(Debug, Default)]
pub struct XmlConfigProvider;

impl Provider for XmlConfigProvider {
    fn name(&self) -> &'static str {
        "xml_config"
    }

    fn apply(&self, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
        let path = target_path(resource, ctx);
        match resource.action() {
            Action::Create => {
                let content = render_xml_config(
                    &resource.map_attr("configurations"),
                    &resource.map_attr("configuration_attributes"),
                );
                let spec = FileSpec::from_resource(resource)?;
                ensure_file(&path, Some(&content), &spec, ctx)
            }
            Action::Delete => delete_file(&path, ctx),
            _ => Ok(ApplyResult::NoChange),
        }
    }
}
