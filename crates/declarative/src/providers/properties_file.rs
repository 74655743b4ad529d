//! PropertiesFile provider
//!
//! Renders `key<delimiter>value` lines sorted by key, then hands the text to
//! the File semantics.

use super::Provider;
use super::file::{FileSpec, ensure_file};
use crate::context::ApplyContext;
use crate::error::Result;
use crate::resource::{Action, Resource};
use crate::types::ApplyResult;
use std::collections::BTreeMap;

const HEADER: &str = "# Generated by converge.";

/// Render properties under the generated-by header
pub fn render_properties(properties: &BTreeMap<String, String>, delimiter: &str) -> String {
    let mut out = String::from(HEADER);
    out.push_str("\n\n");
    for (key, value) in properties {
        out.push_str(key);
        out.push_str(delimiter);
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Manages Java-style `.properties` files
#[derive(Debug, Default)]
pub struct PropertiesFileProvider;

impl Provider for PropertiesFileProvider {
    fn name(&self) -> &'static str {
        "properties_file"
    }

    fn apply(&self, resource: &Resource, ctx: &ApplyContext<'_>) -> Result<ApplyResult> {
        match resource.action() {
            Action::Create => {
                let delimiter = resource.str_attr("key_value_delimiter").unwrap_or("=");
                let content = render_properties(&resource.map_attr("properties"), delimiter);
                let spec = FileSpec::from_resource(resource)?;
                ensure_file(&ctx.resolve(resource.name()), Some(&content), &spec, ctx)
            }
            // Deletion is plain File semantics
            Action::Delete => super::file::FileProvider.apply(resource, ctx),
            _ => Ok(ApplyResult::NoChange),
        }
    }
}
