use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// A breakpoint declared by the source site, on top of the built-in set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomBreakpoint {
    pub key: String,
    pub width: u32,
    /// Marks the desktop (min-width) breakpoint.
    #[serde(default)]
    pub base: bool,
}

/// A built-in style seeded into every registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkStyle {
    pub id: String,
    pub selector: String,
    pub css: String,
}

/// Engine configuration. Every field has a default, so an empty YAML document
/// yields [`EngineConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub breakpoints: Vec<CustomBreakpoint>,
    /// Only migrate classes referenced by the scanned content.
    pub restrict_to_referenced: bool,
    pub excluded_class_prefixes: Vec<String>,
    pub excluded_class_names: Vec<String>,
    /// Prefixes that are migrated even when an excluded prefix matches.
    pub allowed_class_names: Vec<String>,
    pub framework_styles: Vec<FrameworkStyle>,
    pub collection: String,
    /// Recursion limit when scanning settings for class references.
    pub max_scan_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            breakpoints: Vec::new(),
            restrict_to_referenced: false,
            excluded_class_prefixes: [
                "brxe-",
                "bricks-",
                "brx-",
                "wp-",
                "wp-block-",
                "has-",
                "is-",
                "woocommerce-",
                "wc-",
                "product-",
                "cart-",
                "checkout-",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            excluded_class_names: [
                "bg--ultra-light",
                "bg--ultra-dark",
                "fr-lede",
                "fr-intro",
                "fr-note",
                "fr-notes",
                "text--l",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            allowed_class_names: vec!["is-bg".to_string()],
            framework_styles: default_framework_styles(),
            collection: "default".to_string(),
            max_scan_depth: 8,
        }
    }
}

fn default_framework_styles() -> Vec<FrameworkStyle> {
    vec![
        FrameworkStyle {
            id: "etch-section-style".to_string(),
            selector: ":where([data-etch-element=\"section\"])".to_string(),
            css: "inline-size: 100%; display: flex; flex-direction: column; align-items: center;"
                .to_string(),
        },
        FrameworkStyle {
            id: "etch-container-style".to_string(),
            selector: ":where([data-etch-element=\"container\"])".to_string(),
            css: "inline-size: 100%; display: flex; flex-direction: column; max-width: var(--content-width, 1366px); align-self: center;"
                .to_string(),
        },
        FrameworkStyle {
            id: "etch-iframe-style".to_string(),
            selector: ":where([data-etch-element=\"iframe\"])".to_string(),
            css: "inline-size: 100%; height: auto; aspect-ratio: 16/9;".to_string(),
        },
    ]
}

impl EngineConfig {
    /// Load a configuration from YAML. Missing keys fall back to the defaults.
    pub fn from_yaml_str(yaml: &str) -> EngineResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> EngineResult<()> {
        for bp in &self.breakpoints {
            if bp.key.trim().is_empty() {
                return Err(EngineError::InvalidBreakpoint {
                    key: bp.key.clone(),
                    reason: "key must not be empty".to_string(),
                });
            }
            if bp.width == 0 {
                return Err(EngineError::InvalidBreakpoint {
                    key: bp.key.clone(),
                    reason: "width must be greater than zero".to_string(),
                });
            }
        }
        if self.framework_styles.iter().any(|s| !s.id.starts_with("etch-")) {
            return Err(EngineError::InvalidConfig(
                "framework style ids must start with 'etch-'".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a class name is filtered out by the exclusion policy.
    pub fn is_excluded_class(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return true;
        }
        let allowed = self
            .allowed_class_names
            .iter()
            .any(|n| name.starts_with(n.as_str()));
        if !allowed
            && self
                .excluded_class_prefixes
                .iter()
                .any(|prefix| name.starts_with(prefix.as_str()))
        {
            return true;
        }
        let bare = name.strip_prefix("acss_import_").unwrap_or(name);
        let bare = bare.trim_start_matches('.');
        self.excluded_class_names.iter().any(|n| n == bare)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
restrictToReferenced: true
breakpoints:
  - key: widescreen
    width: 1600
"#;
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert!(config.restrict_to_referenced);
        assert_eq!(config.breakpoints.len(), 1);
        assert_eq!(config.breakpoints[0].key, "widescreen");
        assert!(!config.breakpoints[0].base);
        assert_eq!(config.collection, "default");
        assert_eq!(config.max_scan_depth, 8);
    }

    #[test]
    fn test_zero_width_breakpoint_rejected() {
        let yaml = "breakpoints:\n  - key: broken\n    width: 0\n";
        assert!(matches!(
            EngineConfig::from_yaml_str(yaml),
            Err(EngineError::InvalidBreakpoint { .. })
        ));
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        assert!(matches!(
            EngineConfig::from_yaml_str("breakpoints: [unclosed"),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_class_exclusion_policy() {
        let config = EngineConfig::default();
        assert!(config.is_excluded_class(""));
        assert!(config.is_excluded_class("brxe-heading"));
        assert!(config.is_excluded_class("is-active"));
        assert!(config.is_excluded_class("fr-lede"));
        assert!(!config.is_excluded_class("is-bg"));
        assert!(!config.is_excluded_class("is-bg-dark"));
        assert!(config.is_excluded_class("acss_import_text--l"));
        assert!(!config.is_excluded_class("card"));
    }
}
