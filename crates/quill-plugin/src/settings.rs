//! Plugin setting declarations and validation.
//!
//! A plugin declares the settings it understands in its [`PluginConfig`];
//! values themselves live in the external [`SettingsStore`]. Declarations
//! provide defaults, mark required keys and constrain what the admin API
//! accepts.
//!
//! [`PluginConfig`]: crate::plugin::PluginConfig
//! [`SettingsStore`]: quill_core::traits::SettingsStore

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value type of a declared setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    /// Free text.
    String,
    /// Free text that is never echoed back by the admin API.
    Secret,
    /// Any JSON number.
    Number,
    /// A whole number.
    Integer,
    /// `true` / `false`.
    Boolean,
    /// One of `validation.options`.
    Select,
    /// Any JSON value.
    Json,
}

/// Optional constraints on a setting's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingValidation {
    /// Inclusive lower bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Minimum string length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum string length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Allowed string values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// A setting a plugin understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingDeclaration {
    /// Key under which the value is stored.
    pub key: String,
    /// Human-readable label for the admin UI.
    pub label: String,
    /// Value type.
    pub kind: SettingKind,
    /// Value used when nothing is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Whether activation requires a value (stored or default).
    #[serde(default)]
    pub required: bool,
    /// Help text for the admin UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Additional constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<SettingValidation>,
}

impl SettingDeclaration {
    /// Declares a setting; the label defaults to the key.
    pub fn new(key: impl Into<String>, kind: SettingKind) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            kind,
            default: None,
            required: false,
            description: None,
            validation: None,
        }
    }

    /// Sets the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the default value.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Marks the setting as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the help text.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the value constraints.
    pub fn validation(mut self, validation: SettingValidation) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Whether the value must be masked when shown.
    pub fn is_secret(&self) -> bool {
        self.kind == SettingKind::Secret
    }

    /// Checks one value against this declaration.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return if self.required {
                Err("value is required".to_string())
            } else {
                Ok(())
            };
        }

        let type_ok = match self.kind {
            SettingKind::String | SettingKind::Secret | SettingKind::Select => value.is_string(),
            SettingKind::Number => value.is_number(),
            SettingKind::Integer => value.is_i64() || value.is_u64(),
            SettingKind::Boolean => value.is_boolean(),
            SettingKind::Json => true,
        };
        if !type_ok {
            return Err(format!("expected a {} value", kind_name(self.kind)));
        }

        let Some(rules) = &self.validation else {
            if self.kind == SettingKind::Select {
                return Err("select setting declares no options".to_string());
            }
            return Ok(());
        };

        if let Some(number) = value.as_f64() {
            if let Some(min) = rules.min.filter(|&min| number < min) {
                return Err(format!("must be at least {min}"));
            }
            if let Some(max) = rules.max.filter(|&max| number > max) {
                return Err(format!("must be at most {max}"));
            }
        }

        if let Some(text) = value.as_str() {
            let length = text.chars().count();
            if let Some(min_length) = rules.min_length.filter(|&min| length < min) {
                return Err(format!("must be at least {min_length} characters"));
            }
            if let Some(max_length) = rules.max_length.filter(|&max| length > max) {
                return Err(format!("must be at most {max_length} characters"));
            }
            if (self.kind == SettingKind::Select || !rules.options.is_empty())
                && !rules.options.iter().any(|option| option == text)
            {
                return Err(format!("must be one of: {}", rules.options.join(", ")));
            }
        }

        Ok(())
    }
}

fn kind_name(kind: SettingKind) -> &'static str {
    match kind {
        SettingKind::String => "string",
        SettingKind::Secret => "secret",
        SettingKind::Number => "number",
        SettingKind::Integer => "integer",
        SettingKind::Boolean => "boolean",
        SettingKind::Select => "select",
        SettingKind::Json => "json",
    }
}

/// One rejected setting value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingViolation {
    /// The offending key.
    pub key: String,
    /// Why it was rejected.
    pub message: String,
}

impl fmt::Display for SettingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Validates `values` against `declarations` and returns every violation.
///
/// Only the supplied keys are checked; keys with no declaration are
/// rejected.
pub fn validate_settings(
    declarations: &[SettingDeclaration],
    values: &Map<String, Value>,
) -> Vec<SettingViolation> {
    let mut violations = Vec::new();

    for (key, value) in values {
        match declarations.iter().find(|d| &d.key == key) {
            Some(declaration) => {
                if let Err(message) = declaration.check(value) {
                    violations.push(SettingViolation {
                        key: key.clone(),
                        message,
                    });
                }
            }
            None => violations.push(SettingViolation {
                key: key.clone(),
                message: "unknown setting".to_string(),
            }),
        }
    }

    violations
}

/// Declared defaults overlaid with stored values.
pub fn effective_settings(
    declarations: &[SettingDeclaration],
    stored: &Map<String, Value>,
) -> Map<String, Value> {
    let mut effective: Map<String, Value> = declarations
        .iter()
        .filter_map(|d| d.default.clone().map(|value| (d.key.clone(), value)))
        .collect();

    for (key, value) in stored {
        if !value.is_null() {
            effective.insert(key.clone(), value.clone());
        }
    }

    effective
}

/// Keys of required settings with neither a stored value nor a default.
pub fn missing_required(
    declarations: &[SettingDeclaration],
    stored: &Map<String, Value>,
) -> Vec<String> {
    declarations
        .iter()
        .filter(|d| d.required)
        .filter(|d| d.default.as_ref().is_none_or(Value::is_null))
        .filter(|d| stored.get(&d.key).is_none_or(Value::is_null))
        .map(|d| d.key.clone())
        .collect()
}

/// Replaces the values of secret settings with a fixed mask.
pub fn mask_secrets(declarations: &[SettingDeclaration], values: &mut Map<String, Value>) {
    for declaration in declarations.iter().filter(|d| d.is_secret()) {
        if let Some(value) = values.get_mut(&declaration.key).filter(|v| !v.is_null()) {
            *value = Value::String(SECRET_MASK.to_string());
        }
    }
}

/// Placeholder shown instead of secret values.
pub const SECRET_MASK: &str = "********";

/// Whether `value` is the mask echoed back for a secret setting, meaning the
/// stored secret should be left untouched.
pub fn is_masked_secret(declarations: &[SettingDeclaration], key: &str, value: &Value) -> bool {
    value.as_str() == Some(SECRET_MASK)
        && declarations
            .iter()
            .any(|d| d.key == key && d.is_secret())
}
