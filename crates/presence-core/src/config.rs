//! Settings loading and validation.
//!
//! The settings file has three sections:
//! - `[collection]` - engine tunables ([`CollectionConfig`])
//! - `[[devices]]` - per-identity overrides ([`DeviceConfigEntry`])
//! - `[server]` - host process options ([`ServerConfig`])
//!
//! Environment variables prefixed with `PRESENCE__` override file values,
//! e.g. `PRESENCE__COLLECTION__MAX_DISTANCE=8`.

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use utoipa::ToSchema;

use crate::distance::FilterSettings;
use crate::resolver::Irk;

/// Environment variable naming an alternative settings file.
pub const CONFIG_PATH_ENV: &str = "PRESENCE_CONFIG";

/// Prefix of environment overrides.
const ENV_PREFIX: &str = "PRESENCE";

/// Legacy value of `query` that enabled Apple nearby devices only.
const LEGACY_QUERY: &str = "1";

/// What the legacy `query` value expands to.
const LEGACY_QUERY_PREFIX: &str = "apple:10";

static MAC_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{1,12}$").expect("valid MAC prefix pattern"));

// =============================================================================
// ERRORS
// =============================================================================

/// Errors from loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// The settings file could not be read.
    #[error("Failed to read configuration from {path}: {source}")]
    ReadError {
        /// File that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A source could not be parsed or deserialized.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] ::config::ConfigError),

    /// A single value is out of range.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several values are out of range.
    #[error("Configuration has {} invalid values", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result alias for settings operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

// =============================================================================
// PREFIX LISTS
// =============================================================================

/// A list of identity prefixes.
///
/// Accepts a space-separated string (`"apple: tile:"`), an array of strings,
/// or a bare number in the settings file. Serializes back to a string.
#[derive(Debug, Clone, Default, PartialEq, Eq, ToSchema)]
#[schema(value_type = String, example = "apple: tile:")]
pub struct TokenList(Vec<String>);

impl TokenList {
    /// Builds a list from individual tokens, dropping blanks.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            tokens
                .into_iter()
                .map(Into::into)
                .filter(|t| !t.trim().is_empty())
                .collect(),
        )
    }

    /// Splits a space-separated string.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::new(text.split_whitespace())
    }

    /// `true` when the list has no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The tokens.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// `true` if any token is a prefix of `value`.
    #[must_use]
    pub fn matches_prefix(&self, value: &str) -> bool {
        self.0.iter().any(|token| value.starts_with(token.as_str()))
    }

    fn map_tokens(&mut self, f: impl Fn(&str) -> String) {
        for token in &mut self.0 {
            *token = f(token);
        }
    }
}

impl fmt::Display for TokenList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl Serialize for TokenList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TokenListVisitor;

        impl<'de> Visitor<'de> for TokenListVisitor {
            type Value = TokenList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a space-separated string or a list of strings")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(TokenList::parse(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(TokenList::parse(&v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(TokenList::parse(&v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(TokenList::default())
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(TokenList::default())
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut tokens = Vec::new();
                while let Some(token) = seq.next_element::<String>()? {
                    tokens.push(token);
                }
                Ok(TokenList::new(tokens))
            }
        }

        deserializer.deserialize_any(TokenListVisitor)
    }
}

// =============================================================================
// COLLECTION
// =============================================================================

/// Engine tunables, read as one immutable snapshot per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CollectionConfig {
    /// RSSI of a 0 dBm transmitter at 1 m.
    #[schema(example = -65)]
    pub ref_rssi: i16,
    /// Receiver-specific offset added to every 1 m reference.
    #[schema(example = 0)]
    pub rx_adj_rssi: i16,
    /// Path-loss exponent: about 2 in free space, higher indoors.
    #[schema(example = 3.5)]
    pub absorption: f64,
    /// Records unseen for this long are evicted.
    #[schema(example = 150_000)]
    pub forget_ms: u64,
    /// Report again within `skip_ms` only after moving this far (metres).
    #[schema(example = 0.5)]
    pub skip_distance: f64,
    /// Report throttle window.
    #[schema(example = 5000)]
    pub skip_ms: u64,
    /// Devices further than this are not reported; 0 disables the limit.
    #[schema(example = 16.0)]
    pub max_distance: f64,
    /// Distance at or below which counting starts.
    #[schema(example = 2.0)]
    pub count_enter: f64,
    /// Distance above which counting stops.
    #[schema(example = 4.0)]
    pub count_exit: f64,
    /// Counting stops for devices unseen this long.
    #[schema(example = 30_000)]
    pub count_ms: u64,
    /// RSSI above which a device becomes close.
    #[schema(example = -40)]
    pub close_rssi: i16,
    /// RSSI below which a close device is released.
    #[schema(example = -50)]
    pub left_rssi: i16,
    /// Delay between successful follow-up queries of the same device.
    #[schema(example = 300_000)]
    pub requery_ms: u64,
    /// Maximum number of tracked records.
    #[schema(example = 50)]
    pub max_devices: usize,
    /// Channels seen within this window take part in RSSI selection.
    #[schema(example = 5000)]
    pub recency_ms: u64,
    /// Only identities matching one of these prefixes are visible (empty: all).
    pub include: TokenList,
    /// Identities matching one of these prefixes are hidden.
    pub exclude: TokenList,
    /// Identities matching one of these prefixes may be queried.
    pub query: TokenList,
    /// Identities matching one of these prefixes are counted.
    pub count_ids: TokenList,
    /// MAC prefixes (lowercase hex, no separators) treated as known devices.
    pub known_macs: TokenList,
    /// Identity resolution keys as 32 hex digits.
    pub known_irks: TokenList,
    /// Distance smoother tuning.
    pub filter: FilterSettings,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            ref_rssi: -65,
            rx_adj_rssi: 0,
            absorption: 3.5,
            forget_ms: 150_000,
            skip_distance: 0.5,
            skip_ms: 5000,
            max_distance: 16.0,
            count_enter: 2.0,
            count_exit: 4.0,
            count_ms: 30_000,
            close_rssi: -40,
            left_rssi: -50,
            requery_ms: 300_000,
            max_devices: 50,
            recency_ms: 5000,
            include: TokenList::default(),
            exclude: TokenList::default(),
            query: TokenList::default(),
            count_ids: TokenList::default(),
            known_macs: TokenList::default(),
            known_irks: TokenList::default(),
            filter: FilterSettings::default(),
        }
    }
}

impl CollectionConfig {
    /// Rewrites legacy and loosely formatted values into canonical form.
    pub fn normalize(&mut self) {
        if self.query.tokens() == [LEGACY_QUERY] {
            self.query = TokenList::parse(LEGACY_QUERY_PREFIX);
        }
        self.known_macs.map_tokens(|mac| {
            mac.chars()
                .filter(|c| *c != ':' && *c != '-')
                .collect::<String>()
                .to_lowercase()
        });
        self.known_irks.map_tokens(str::to_lowercase);
    }

    /// Decoded identity resolution keys. Malformed entries are skipped;
    /// [`validate`](Self::validate) reports them.
    #[must_use]
    pub fn irks(&self) -> Vec<Irk> {
        self.known_irks
            .tokens()
            .iter()
            .filter_map(|text| hex::decode(text).ok())
            .filter_map(|bytes| Irk::try_from(bytes.as_slice()).ok())
            .collect()
    }

    /// `true` if the MAC (lowercase hex) starts with a known prefix.
    #[must_use]
    pub fn is_known_mac(&self, mac_hex: &str) -> bool {
        self.known_macs.matches_prefix(mac_hex)
    }

    fn validate_into(&self, errors: &mut Vec<ConfigError>) {
        if !(self.absorption.is_finite() && self.absorption > 0.0) {
            errors.push(invalid("collection.absorption", "must be greater than 0"));
        }
        if !(-100..=100).contains(&self.ref_rssi) {
            errors.push(invalid("collection.ref_rssi", "must be between -100 and 100"));
        }
        if !(-100..=100).contains(&self.rx_adj_rssi) {
            errors.push(invalid("collection.rx_adj_rssi", "must be between -100 and 100"));
        }
        for (field, value) in [
            ("collection.close_rssi", self.close_rssi),
            ("collection.left_rssi", self.left_rssi),
        ] {
            if !(-127..=20).contains(&value) {
                errors.push(invalid(field, "must be between -127 and 20"));
            }
        }
        if self.left_rssi > self.close_rssi {
            errors.push(invalid(
                "collection.left_rssi",
                format!("must not exceed close_rssi ({})", self.close_rssi),
            ));
        }
        if self.count_enter < 0.0 {
            errors.push(invalid("collection.count_enter", "must not be negative"));
        }
        if self.count_exit < self.count_enter {
            errors.push(invalid(
                "collection.count_exit",
                format!("must be at least count_enter ({})", self.count_enter),
            ));
        }
        for (field, value) in [
            ("collection.skip_distance", self.skip_distance),
            ("collection.max_distance", self.max_distance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                errors.push(invalid(field, "must not be negative"));
            }
        }
        if self.max_devices == 0 {
            errors.push(invalid("collection.max_devices", "must be at least 1"));
        }
        if !(self.filter.min_cutoff > 0.0 && self.filter.d_cutoff > 0.0 && self.filter.beta >= 0.0)
        {
            errors.push(invalid(
                "collection.filter",
                "cutoffs must be positive and beta non-negative",
            ));
        }
        for mac in self.known_macs.tokens() {
            if !is_valid_mac_prefix(mac) {
                errors.push(invalid(
                    "collection.known_macs",
                    format!("'{mac}' is not a hex MAC prefix"),
                ));
            }
        }
        for irk in self.known_irks.tokens() {
            if hex::decode(irk).map_or(true, |bytes| bytes.len() != 16) {
                errors.push(invalid(
                    "collection.known_irks",
                    format!("'{irk}' is not 32 hex digits"),
                ));
            }
        }
    }
}

/// `true` for 1 to 12 lowercase hex digits.
#[must_use]
pub fn is_valid_mac_prefix(prefix: &str) -> bool {
    MAC_PREFIX.is_match(prefix)
}

// =============================================================================
// DEVICE TABLE
// =============================================================================

/// Operator overrides for identities starting with `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeviceConfigEntry {
    /// Identity prefix this entry applies to.
    #[schema(example = "nut:aabbccddeeff")]
    pub id: String,
    /// Identity to report instead of the raw one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "living-room-tag")]
    pub alias: Option<String>,
    /// Display name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Living room tag")]
    pub name: Option<String>,
    /// 1 m RSSI override, before receiver adjustment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = -62)]
    pub rssi_at_1m: Option<i16>,
}

/// Ordered device override table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceTable(Vec<DeviceConfigEntry>);

impl DeviceTable {
    /// Wraps a list of entries.
    #[must_use]
    pub fn new(entries: Vec<DeviceConfigEntry>) -> Self {
        Self(entries)
    }

    /// Entry with the longest `id` prefix of `identity`. Ties go to the
    /// earlier entry.
    #[must_use]
    pub fn find(&self, identity: &str) -> Option<&DeviceConfigEntry> {
        self.0
            .iter()
            .filter(|entry| !entry.id.is_empty() && identity.starts_with(entry.id.as_str()))
            .fold(None, |best: Option<&DeviceConfigEntry>, entry| match best {
                Some(b) if b.id.len() >= entry.id.len() => Some(b),
                _ => Some(entry),
            })
    }

    /// All entries in file order.
    #[must_use]
    pub fn entries(&self) -> &[DeviceConfigEntry] {
        &self.0
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn validate_into(&self, errors: &mut Vec<ConfigError>) {
        for (index, entry) in self.0.iter().enumerate() {
            if entry.id.trim().is_empty() {
                errors.push(invalid(&format!("devices[{index}].id"), "must not be empty"));
            }
            if entry.alias.as_deref().is_some_and(|a| a.trim().is_empty()) {
                errors.push(invalid(
                    &format!("devices[{index}].alias"),
                    "must not be empty when set",
                ));
            }
        }
    }
}

// =============================================================================
// SERVER
// =============================================================================

/// Host process options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP API listens on.
    #[schema(example = "0.0.0.0:3000")]
    pub bind_address: String,
    /// Cadence of counting, reporting, and expiry.
    #[schema(example = 1000)]
    pub maintenance_interval_ms: u64,
    /// JSON file logging instead of pretty console output.
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            maintenance_interval_ms: 1000,
            production: false,
        }
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// The complete settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Engine tunables.
    pub collection: CollectionConfig,
    /// Per-identity overrides.
    pub devices: DeviceTable,
    /// Host process options.
    pub server: ServerConfig,
}

impl Settings {
    /// Loads settings from the default location, falling back to defaults
    /// (plus environment overrides) when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn load() -> ConfigResult<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Self::build(None)
        }
    }

    /// Loads settings from `path`, which must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is missing,
    /// [`ConfigError::ReadError`] if it cannot be read, or a parse or
    /// validation error.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.display().to_string(),
            source,
        })?;
        Self::build(Some(&text))
    }

    fn build(toml_text: Option<&str>) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(text) = toml_text {
            builder = builder.add_source(::config::File::from_str(
                text,
                ::config::FileFormat::Toml,
            ));
        }
        let mut settings: Self = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.collection.normalize();
        settings.validate()?;
        Ok(settings)
    }

    /// Checks every value, collecting all violations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for one violation and
    /// [`ConfigError::MultipleValidationErrors`] for several.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        self.collection.validate_into(&mut errors);
        self.devices.validate_into(&mut errors);
        if self.server.maintenance_interval_ms == 0 {
            errors.push(invalid("server.maintenance_interval_ms", "must be at least 1"));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// Settings file location: `$PRESENCE_CONFIG`, else
    /// `/etc/presence/config.toml` on Linux, else the platform config dir.
    #[must_use]
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        #[cfg(target_os = "linux")]
        {
            PathBuf::from("/etc/presence/config.toml")
        }
        #[cfg(not(target_os = "linux"))]
        {
            directories::ProjectDirs::from("", "", "presence").map_or_else(
                || PathBuf::from("presence.toml"),
                |dirs| dirs.config_dir().join("config.toml"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_settings(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.collection.ref_rssi, -65);
        assert!((settings.collection.absorption - 3.5).abs() < f64::EPSILON);
        assert_eq!(settings.collection.max_devices, 50);
        assert_eq!(settings.server.maintenance_interval_ms, 1000);
    }

    #[test]
    fn test_load_from_file() {
        let file = write_settings(
            r#"
[collection]
ref_rssi = -59
absorption = 2.0
include = "apple: iBeacon:"
count_ids = ["iBeacon:", "name:"]
known_macs = "AA:BB:CC"
query = "1"

[[devices]]
id = "nut:aabbccddeeff"
alias = "living-room-tag"

[[devices]]
id = "living-room-tag"
name = "Living room tag"
rssi_at_1m = -62

[server]
bind_address = "127.0.0.1:8080"
"#,
        );

        let settings = Settings::load_from(file.path()).unwrap();
        let collection = &settings.collection;
        assert_eq!(collection.ref_rssi, -59);
        assert_eq!(collection.include.tokens(), ["apple:", "iBeacon:"]);
        assert_eq!(collection.count_ids.tokens(), ["iBeacon:", "name:"]);
        assert_eq!(collection.known_macs.tokens(), ["aabbcc"]);
        assert_eq!(collection.query.tokens(), ["apple:10"]);
        assert_eq!(collection.skip_ms, 5000);
        assert_eq!(settings.devices.len(), 2);
        assert_eq!(settings.server.bind_address, "127.0.0.1:8080");
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = Settings::load_from(Path::new("/nonexistent/presence.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_unreadable_path_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load_from(dir.path());
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_serialized_settings_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.collection.exclude = TokenList::parse("md: sd:");
        settings.devices = DeviceTable::new(vec![DeviceConfigEntry {
            id: "iBeacon:e2c5".to_string(),
            name: Some("Keys".to_string()),
            ..DeviceConfigEntry::default()
        }]);
        std::fs::write(&path, toml::to_string_pretty(&settings).unwrap()).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.collection.exclude, settings.collection.exclude);
        assert_eq!(loaded.devices, settings.devices);
    }

    #[test]
    fn test_validation_collects_every_violation() {
        let mut settings = Settings::default();
        settings.collection.absorption = 0.0;
        settings.collection.count_exit = 1.0;
        settings.collection.left_rssi = -30;
        settings.collection.max_devices = 0;
        settings.collection.known_irks = TokenList::parse("abcd");

        match settings.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => {
                let text: Vec<String> = errors.iter().map(ToString::to_string).collect();
                assert_eq!(errors.len(), 5, "{text:?}");
                assert!(text.iter().any(|t| t.contains("collection.absorption")));
                assert!(text.iter().any(|t| t.contains("collection.count_exit")));
                assert!(text.iter().any(|t| t.contains("collection.left_rssi")));
                assert!(text.iter().any(|t| t.contains("collection.max_devices")));
                assert!(text.iter().any(|t| t.contains("collection.known_irks")));
            }
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_single_violation_is_not_wrapped() {
        let mut settings = Settings::default();
        settings.collection.known_macs = TokenList::parse("zz11");
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::ValidationError { field, .. }) if field == "collection.known_macs"
        ));
    }

    #[test]
    fn test_irks_decoded() {
        let mut collection = CollectionConfig {
            known_irks: TokenList::parse("EC0234A357C8AD05341010A60A397D9B"),
            ..CollectionConfig::default()
        };
        collection.normalize();
        let irks = collection.irks();
        assert_eq!(irks.len(), 1);
        assert_eq!(irks[0][0], 0xEC);
        assert_eq!(irks[0][15], 0x9B);
    }

    #[test]
    fn test_device_table_longest_prefix_wins() {
        let table = DeviceTable::new(vec![
            DeviceConfigEntry {
                id: "apple:".to_string(),
                name: Some("any apple".to_string()),
                ..DeviceConfigEntry::default()
            },
            DeviceConfigEntry {
                id: "apple:1005".to_string(),
                name: Some("phone".to_string()),
                ..DeviceConfigEntry::default()
            },
            DeviceConfigEntry {
                id: "apple:1005".to_string(),
                name: Some("duplicate".to_string()),
                ..DeviceConfigEntry::default()
            },
        ]);

        let found = table.find("apple:1005:9").unwrap();
        assert_eq!(found.name.as_deref(), Some("phone"));
        assert_eq!(
            table.find("apple:1007:9").unwrap().name.as_deref(),
            Some("any apple")
        );
        assert!(table.find("tile:aabb").is_none());
    }

    #[test]
    fn test_token_list_prefix_match() {
        let list = TokenList::parse("  apple:10   iBeacon: ");
        assert_eq!(list.tokens().len(), 2);
        assert!(list.matches_prefix("apple:1005:9"));
        assert!(!list.matches_prefix("apple:1205:9"));
        assert!(!TokenList::default().matches_prefix("anything"));
    }

    #[test]
    fn test_mac_prefix_validation() {
        assert!(is_valid_mac_prefix("aabbcc"));
        assert!(is_valid_mac_prefix("aabbccddeeff"));
        assert!(!is_valid_mac_prefix("aabbccddeeff00"));
        assert!(!is_valid_mac_prefix("AABB"));
        assert!(!is_valid_mac_prefix(""));
    }
}
