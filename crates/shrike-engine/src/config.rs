//! Engine configuration (shrike.toml)
//!
//! Options are plain serde structures so embedders can build them in code or
//! load them from TOML:
//!
//! ```toml
//! threads = 4
//!
//! [publicizer]
//! enabled = true
//!
//! [[assertion-handlers]]
//! holder = "Lcom/example/Assertions;"
//! name = "onAssertionError"
//! descriptor = "(Ljava/lang/AssertionError;)V"
//!
//! [keep]
//! classes = ["Lcom/example/Main;"]
//! methods = ["Lcom/example/Main;->main([Ljava/lang/String;)V"]
//! no-obfuscation = ["Lcom/example/Api;->call()V"]
//! ```

use crate::graph::items::{is_method_descriptor, is_type_descriptor};
use crate::graph::{ItemFactory, MethodId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the options file
    #[error("Failed to read options file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse options: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A member reference could not be parsed
    #[error("Invalid member reference '{0}'")]
    InvalidMember(String),

    /// Validation error
    #[error("Invalid options: {0}")]
    ValidationError(String),
}

/// Top-level engine options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EngineOptions {
    /// Worker threads for parallel phases (0 = one per CPU)
    #[serde(default)]
    pub threads: usize,

    /// Publicizer settings
    #[serde(default)]
    pub publicizer: PublicizerOptions,

    /// Methods invoked when an assertion fails, kept live whenever a
    /// class reads its assertion status
    #[serde(default, rename = "assertion-handlers")]
    pub assertion_handlers: Vec<AssertionHandler>,

    /// Keep rules
    #[serde(default)]
    pub keep: KeepOptions,
}

/// Publicizer settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicizerOptions {
    /// Run the publicizer (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for PublicizerOptions {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

/// A configured assertion handler method
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssertionHandler {
    /// Holder type descriptor, e.g. `Lcom/example/Assertions;`
    pub holder: String,
    /// Method name
    pub name: String,
    /// Method descriptor, e.g. `(Ljava/lang/AssertionError;)V`
    pub descriptor: String,
}

/// Keep rules, written as `Lholder;->name(params)ret` for methods,
/// `Lholder;->name:type` for fields and plain descriptors for classes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KeepOptions {
    /// Classes kept live and treated as instantiated
    #[serde(default)]
    pub classes: Vec<String>,

    /// Methods kept live and pinned against shrinking
    #[serde(default)]
    pub methods: Vec<String>,

    /// Fields kept live
    #[serde(default)]
    pub fields: Vec<String>,

    /// Methods whose name and signature must not change
    #[serde(default, rename = "no-obfuscation")]
    pub no_obfuscation: Vec<String>,
}

impl EngineOptions {
    /// Parse options from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse options from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let options: EngineOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Validate member references
    pub fn validate(&self) -> Result<(), ConfigError> {
        for handler in &self.assertion_handlers {
            if !is_type_descriptor(&handler.holder) || !handler.holder.starts_with('L') {
                return Err(ConfigError::ValidationError(format!(
                    "Assertion handler holder '{}' is not a class descriptor",
                    handler.holder
                )));
            }
            if handler.name.is_empty() || !is_method_descriptor(&handler.descriptor) {
                return Err(ConfigError::InvalidMember(format!(
                    "{}->{}{}",
                    handler.holder, handler.name, handler.descriptor
                )));
            }
        }

        for class in &self.keep.classes {
            if !is_type_descriptor(class) {
                return Err(ConfigError::InvalidMember(class.clone()));
            }
        }
        for method in self.keep.methods.iter().chain(&self.keep.no_obfuscation) {
            if !is_method_reference(method) {
                return Err(ConfigError::InvalidMember(method.clone()));
            }
        }
        for field in &self.keep.fields {
            if !is_field_reference(field) {
                return Err(ConfigError::InvalidMember(field.clone()));
            }
        }
        Ok(())
    }

    /// Effective worker thread count
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// Intern the configured assertion handlers
    pub fn resolve_assertion_handlers(
        &self,
        items: &mut ItemFactory,
    ) -> Result<Vec<MethodId>, ConfigError> {
        self.assertion_handlers
            .iter()
            .map(|handler| {
                items
                    .create_method_from_descriptor(&handler.holder, &handler.name, &handler.descriptor)
                    .ok_or_else(|| {
                        ConfigError::InvalidMember(format!(
                            "{}->{}{}",
                            handler.holder, handler.name, handler.descriptor
                        ))
                    })
            })
            .collect()
    }
}

fn is_method_reference(text: &str) -> bool {
    let Some((holder, member)) = text.split_once("->") else {
        return false;
    };
    match member.find('(') {
        Some(paren) if paren > 0 => {
            is_type_descriptor(holder) && is_method_descriptor(&member[paren..])
        }
        _ => false,
    }
}

fn is_field_reference(text: &str) -> bool {
    let Some((holder, member)) = text.split_once("->") else {
        return false;
    };
    match member.split_once(':') {
        Some((name, ty)) => !name.is_empty() && is_type_descriptor(holder) && is_type_descriptor(ty),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::from_str("").unwrap();
        assert_eq!(options.threads, 0);
        assert!(options.publicizer.enabled);
        assert!(options.assertion_handlers.is_empty());
        assert!(options.worker_threads() >= 1);
    }

    #[test]
    fn test_parse_full() {
        let toml = r#"
threads = 2

[publicizer]
enabled = false

[[assertion-handlers]]
holder = "Lcom/example/Assertions;"
name = "onAssertionError"
descriptor = "(Ljava/lang/AssertionError;)V"

[keep]
classes = ["Lcom/example/Main;"]
methods = ["Lcom/example/Main;->main([Ljava/lang/String;)V"]
fields = ["Lcom/example/Main;->DEBUG:Z"]
no-obfuscation = ["Lcom/example/Api;->call()V"]
"#;
        let options = EngineOptions::from_str(toml).unwrap();
        assert_eq!(options.worker_threads(), 2);
        assert!(!options.publicizer.enabled);
        assert_eq!(options.keep.no_obfuscation.len(), 1);

        let mut items = ItemFactory::new();
        let handlers = options.resolve_assertion_handlers(&mut items).unwrap();
        assert_eq!(
            items.method_to_string(handlers[0]),
            "Lcom/example/Assertions;->onAssertionError(Ljava/lang/AssertionError;)V"
        );
    }

    #[test]
    fn test_invalid_references() {
        let bad_method = "[keep]\nmethods = [\"Main.main()\"]\n";
        assert!(matches!(
            EngineOptions::from_str(bad_method),
            Err(ConfigError::InvalidMember(_))
        ));

        let bad_handler = r#"
[[assertion-handlers]]
holder = "I"
name = "x"
descriptor = "()V"
"#;
        assert!(matches!(
            EngineOptions::from_str(bad_handler),
            Err(ConfigError::ValidationError(_))
        ));

        assert!(matches!(
            EngineOptions::from_str("threads = \"many\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threads = 3").unwrap();
        let options = EngineOptions::from_file(file.path()).unwrap();
        assert_eq!(options.threads, 3);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            EngineOptions::from_file(&missing),
            Err(ConfigError::IoError(_))
        ));
    }
}
