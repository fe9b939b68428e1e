use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

const DEFAULT_MESSAGES: &str = include_str!("../messages.json");

/// User-facing message templates keyed by name. `{}` placeholders are
/// filled left to right.
#[derive(Debug, Clone, Default)]
pub struct Texts {
    templates: HashMap<String, String>,
}

impl Texts {
    pub fn from_json(raw: &str) -> Result<Self> {
        let templates: HashMap<String, String> =
            serde_json::from_str(raw).context("messages must be a JSON object of strings")?;
        Ok(Self { templates })
    }

    /// Loads templates from `path`, falling back to the bundled set when the
    /// file does not exist. A file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let texts = Self::from_json(&raw)
                    .with_context(|| format!("bad messages file {}", path.display()))?;
                info!("Loaded {} messages from {}", texts.templates.len(), path.display());
                Ok(texts)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("{} not found, using built-in messages", path.display());
                Self::bundled()
            }
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    pub fn bundled() -> Result<Self> {
        Self::from_json(DEFAULT_MESSAGES)
    }

    pub fn format(&self, key: &str, args: &[&dyn Display]) -> String {
        let Some(template) = self.templates.get(key) else {
            warn!("Message key {:?} not found", key);
            return format!("[{}]", key);
        };

        let mut out = String::with_capacity(template.len());
        let mut args = args.iter();
        let mut rest = template.as_str();
        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            match args.next() {
                Some(arg) => out.push_str(&arg.to_string()),
                None => out.push_str("{}"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }
}
