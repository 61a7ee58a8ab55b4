use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// The full preference record shared across clients. The field set is closed
/// and known at build time; wire names are camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub push_notifications: bool,
    pub ai_suggestions: bool,
    pub dark_mode: bool,
    pub auto_sync: bool,
    pub time_zone: bool,
    pub language: String,
    pub privacy: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            push_notifications: true,
            ai_suggestions: true,
            dark_mode: true,
            auto_sync: true,
            time_zone: true,
            language: "en".to_string(),
            privacy: true,
        }
    }
}

impl Settings {
    /// Field-wise unconditional overwrite. Applying the same patch twice is
    /// a no-op the second time, which is what makes relay echoes safe.
    pub fn merge(&mut self, patch: &SettingsPatch) {
        if let Some(v) = patch.push_notifications {
            self.push_notifications = v;
        }
        if let Some(v) = patch.ai_suggestions {
            self.ai_suggestions = v;
        }
        if let Some(v) = patch.dark_mode {
            self.dark_mode = v;
        }
        if let Some(v) = patch.auto_sync {
            self.auto_sync = v;
        }
        if let Some(v) = patch.time_zone {
            self.time_zone = v;
        }
        if let Some(ref v) = patch.language {
            self.language = v.clone();
        }
        if let Some(v) = patch.privacy {
            self.privacy = v;
        }
    }
}

/// A partial settings mapping: the payload of one update event. Unset fields
/// are omitted on the wire. Carries no timestamp, origin id, or version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_suggestions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dark_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_sync: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<bool>,
}

/// Wire names of the closed field set.
pub const FIELD_NAMES: &[&str] = &[
    "pushNotifications",
    "aiSuggestions",
    "darkMode",
    "autoSync",
    "timeZone",
    "language",
    "privacy",
];

impl SettingsPatch {
    pub fn push_notifications(on: bool) -> Self {
        Self {
            push_notifications: Some(on),
            ..Default::default()
        }
    }

    pub fn ai_suggestions(on: bool) -> Self {
        Self {
            ai_suggestions: Some(on),
            ..Default::default()
        }
    }

    pub fn dark_mode(on: bool) -> Self {
        Self {
            dark_mode: Some(on),
            ..Default::default()
        }
    }

    pub fn auto_sync(on: bool) -> Self {
        Self {
            auto_sync: Some(on),
            ..Default::default()
        }
    }

    pub fn time_zone(on: bool) -> Self {
        Self {
            time_zone: Some(on),
            ..Default::default()
        }
    }

    pub fn language(code: impl Into<String>) -> Self {
        Self {
            language: Some(code.into()),
            ..Default::default()
        }
    }

    pub fn privacy(on: bool) -> Self {
        Self {
            privacy: Some(on),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.push_notifications.is_none()
            && self.ai_suggestions.is_none()
            && self.dark_mode.is_none()
            && self.auto_sync.is_none()
            && self.time_zone.is_none()
            && self.language.is_none()
            && self.privacy.is_none()
    }

    /// Set one field from its wire name and a raw string value, e.g. from a
    /// `darkMode=false` CLI argument. Unknown names are rejected.
    pub fn set_field(&mut self, key: &str, raw: &str) -> Result<()> {
        match key {
            "pushNotifications" => self.push_notifications = Some(parse_flag(key, raw)?),
            "aiSuggestions" => self.ai_suggestions = Some(parse_flag(key, raw)?),
            "darkMode" => self.dark_mode = Some(parse_flag(key, raw)?),
            "autoSync" => self.auto_sync = Some(parse_flag(key, raw)?),
            "timeZone" => self.time_zone = Some(parse_flag(key, raw)?),
            "language" => self.language = Some(raw.to_string()),
            "privacy" => self.privacy = Some(parse_flag(key, raw)?),
            other => bail!(
                "unknown settings field '{other}', expected one of: {}",
                FIELD_NAMES.join(", ")
            ),
        }
        Ok(())
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        other => bail!("field '{key}' expects true or false, got '{other}'"),
    }
}
