//! # presence-core
//!
//! BLE fingerprinting engine for room presence sensing.
//!
//! Every advertisement heard by the radio is folded into a per-address
//! [`FingerprintRecord`]: the payload is decoded into ranked identity
//! proposals, the RSSI is turned into a smoothed distance, and closeness and
//! occupancy counting are tracked with hysteresis. Hosts drain reports and
//! telemetry from the [`FingerprintRegistry`] on their own cadence.
//!
//! ## Modules
//!
//! - [`advertisement`] - advertisement and address types
//! - [`reader`] - bounds-checked payload reads
//! - [`resolver`] - resolvable private address matching against known IRKs
//! - [`identity`] - identity ranks and the precedence rule
//! - [`decoders`] - service UUID, service data and manufacturer data decoders
//! - [`classifier`] - turns decoder evidence into identity changes
//! - [`distance`] - calibration, per-channel samples and the distance filter
//! - [`proximity`] - closeness and counting state machines
//! - [`fingerprint`] - the per-address record
//! - [`registry`] - live record set and configuration snapshots
//! - [`report`] - report payloads, record views and telemetry
//! - [`query`] - active follow-up queries over GATT
//! - [`radio`] - scanning and connection backends
//! - [`config`] - settings file loading and validation
//! - [`error`] - unified error type

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod advertisement;
pub mod classifier;
pub mod config;
pub mod decoders;
pub mod distance;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod proximity;
pub mod query;
pub mod radio;
pub mod reader;
pub mod registry;
pub mod report;
pub mod resolver;

pub use advertisement::{AddressKind, Advertisement, MacAddress, ManufacturerData, ServiceData};
pub use config::{
    is_valid_mac_prefix, CollectionConfig, ConfigError, ConfigResult, DeviceConfigEntry,
    DeviceTable, ServerConfig, Settings, TokenList,
};
pub use error::{PresenceError, Result};
pub use fingerprint::FingerprintRecord;
pub use identity::{IdType, IdentityRecord, Proposal};
pub use proximity::{NoopObserver, ProximityObserver};
pub use query::{NameModelHandler, QueryHandler, QueryManager};
#[cfg(feature = "bluetooth")]
pub use radio::bluez::BluezRadio;
#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub use radio::mock::{MockDevice, MockRadio};
pub use radio::{BleConnection, BleRadio, RadioError, RadioResult};
pub use registry::{ConfigHandle, EngineConfig, FingerprintRegistry, SharedRecord};
pub use report::{RecordView, ReportPayload, TelemetrySnapshot};
