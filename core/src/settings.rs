//! Device settings pushed from the broker
//!
//! The settings topic carries a JSON array of per-device documents with
//! optional fields; only entries matching our device id apply, and absent
//! fields leave the current value untouched.

use serde::{Deserialize, Serialize};

use crate::protocol::constants::{DEFAULT_CACHE_TIME_SECS, MAX_CACHE_TIME_SECS};
use crate::Result;

/// Effective device settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Display name for this device
    pub nickname: String,
    /// When false, inbound messages are ignored entirely
    pub enabled: bool,
    /// Auto-copy received content to the clipboard (UI layer concern)
    pub auto_copy: bool,
    /// Seconds a received message stays cached
    pub cache_time: u64,
    /// Mute the notification sound (UI layer concern)
    pub muted: bool,
    /// Keep our own messages instead of dropping them by sender hash
    pub send_to_self: bool,
    /// Fall back to BLE automatically on network loss
    pub auto_ble: bool,
    /// Launch at login (UI layer concern)
    pub startup: bool,
    /// Remote kill switch: quit and self-remove
    pub destroy: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            nickname: "Unnamed Device".to_string(),
            enabled: true,
            auto_copy: false,
            cache_time: DEFAULT_CACHE_TIME_SECS,
            muted: false,
            send_to_self: true,
            auto_ble: false,
            startup: true,
            destroy: false,
        }
    }
}

/// One device's entry in the pushed settings document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(rename = "deviceid")]
    pub device_id: String,
    pub settings: SettingsPatch,
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_copy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_to_self: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_ble: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destroy: Option<bool>,
}

impl Settings {
    /// Apply the pushed settings document, honoring only entries for
    /// `device_id`. Returns whether anything applied.
    pub fn apply_push(&mut self, data: &[u8], device_id: &str) -> Result<bool> {
        let all: Vec<DeviceSettings> = serde_json::from_slice(data)?;
        let mut applied = false;

        for entry in all {
            if entry.device_id != device_id {
                continue;
            }
            self.apply_patch(&entry.settings);
            applied = true;
        }

        Ok(applied)
    }

    fn apply_patch(&mut self, patch: &SettingsPatch) {
        if let Some(v) = &patch.nickname {
            self.nickname = v.clone();
        }
        if let Some(v) = patch.enabled {
            self.enabled = v;
        }
        if let Some(v) = patch.auto_copy {
            self.auto_copy = v;
        }
        if let Some(v) = patch.cache_time {
            self.cache_time = v.clamp(1, MAX_CACHE_TIME_SECS);
        }
        if let Some(v) = patch.muted {
            self.muted = v;
        }
        if let Some(v) = patch.send_to_self {
            self.send_to_self = v;
        }
        if let Some(v) = patch.auto_ble {
            self.auto_ble = v;
        }
        if let Some(v) = patch.startup {
            self.startup = v;
        }
        if let Some(v) = patch.destroy {
            self.destroy = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_update() {
        let mut settings = Settings::default();
        let push = br#"[{"deviceid":"dev-1","settings":{"nickname":"Laptop","cache_time":60}}]"#;

        assert!(settings.apply_push(push, "dev-1").unwrap());
        assert_eq!(settings.nickname, "Laptop");
        assert_eq!(settings.cache_time, 60);
        // Untouched fields keep their defaults
        assert!(settings.enabled);
        assert!(settings.send_to_self);
    }

    #[test]
    fn test_other_devices_ignored() {
        let mut settings = Settings::default();
        let push = br#"[{"deviceid":"dev-2","settings":{"enabled":false}}]"#;

        assert!(!settings.apply_push(push, "dev-1").unwrap());
        assert!(settings.enabled);
    }

    #[test]
    fn test_cache_time_clamped() {
        let mut settings = Settings::default();
        let push = br#"[{"deviceid":"dev-1","settings":{"cache_time":100000}}]"#;

        settings.apply_push(push, "dev-1").unwrap();
        assert_eq!(settings.cache_time, MAX_CACHE_TIME_SECS);

        let push = br#"[{"deviceid":"dev-1","settings":{"cache_time":0}}]"#;
        settings.apply_push(push, "dev-1").unwrap();
        assert_eq!(settings.cache_time, 1);
    }

    #[test]
    fn test_malformed_push_is_an_error() {
        let mut settings = Settings::default();
        assert!(settings.apply_push(b"not json", "dev-1").is_err());
    }

    #[test]
    fn test_multiple_entries_apply_in_order() {
        let mut settings = Settings::default();
        let push = br#"[
            {"deviceid":"dev-1","settings":{"nickname":"First"}},
            {"deviceid":"dev-1","settings":{"nickname":"Second","muted":true}}
        ]"#;

        settings.apply_push(push, "dev-1").unwrap();
        assert_eq!(settings.nickname, "Second");
        assert!(settings.muted);
    }
}
