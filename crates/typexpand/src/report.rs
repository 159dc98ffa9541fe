//! Rendering of `typexpand scan` results.

use serde::Serialize;
use typexpand_engine::Scan;

/// Serializable summary of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub types: Vec<TypeEntry>,
    pub expanders: Vec<ExpanderEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeEntry {
    pub name: String,
    pub templates: Vec<TemplateEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateEntry {
    pub name: String,
    pub explicit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpanderEntry {
    pub name: String,
    pub template: String,
    pub explicit_use: bool,
}

impl From<&Scan> for ScanReport {
    fn from(scan: &Scan) -> Self {
        let types = scan
            .types
            .iter()
            .map(|ty| TypeEntry {
                name: ty.name().to_string(),
                templates: ty
                    .templates
                    .iter()
                    .map(|(name, explicit)| TemplateEntry {
                        name: name.clone(),
                        explicit: *explicit,
                    })
                    .collect(),
            })
            .collect();
        let expanders = scan
            .expanders
            .iter()
            .map(|e| ExpanderEntry {
                name: e.name.clone(),
                template: e.template.clone(),
                explicit_use: e.explicit_use,
            })
            .collect();
        Self { types, expanders }
    }
}

impl ScanReport {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One line per type and expander. Explicit requests and explicit-use
    /// expanders are marked with `!`.
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("types ({}):\n", self.types.len()));
        for ty in &self.types {
            let templates: Vec<String> = ty
                .templates
                .iter()
                .map(|t| {
                    if t.explicit {
                        format!("{}!", t.name)
                    } else {
                        t.name.clone()
                    }
                })
                .collect();
            out.push_str(&format!("  {} [{}]\n", ty.name, templates.join(", ")));
        }

        out.push_str(&format!("expanders ({}):\n", self.expanders.len()));
        for expander in &self.expanders {
            let marker = if expander.explicit_use { "!" } else { "" };
            out.push_str(&format!(
                "  {} -> {}{}\n",
                expander.name, expander.template, marker
            ));
        }
        out
    }
}
