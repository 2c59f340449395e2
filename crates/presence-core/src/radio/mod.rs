//! Radio seam: passive scanning and short-lived GATT connections.
//!
//! The engine never talks to a controller directly. Scanning yields
//! [`Advertisement`]s on a channel; follow-up queries go through
//! [`BleRadio::connect`]. [`bluez`] drives a local BlueZ adapter and
//! [`mock`] replays scripted devices for tests and hosts without Bluetooth.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::advertisement::{Advertisement, MacAddress};

#[cfg(feature = "bluetooth")]
pub mod bluez;
#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth"), test))]
pub mod mock;

/// Errors raised by a radio backend.
#[derive(Debug, Error)]
pub enum RadioError {
    /// No adapter is present.
    #[error("No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded.")]
    AdapterNotFound,

    /// The adapter is present but powered off.
    #[error("Bluetooth adapter is powered off. Run 'bluetoothctl power on' to enable.")]
    AdapterPoweredOff,

    /// The Bluetooth session could not be established.
    #[error("Failed to initialize Bluetooth session: {message}")]
    SessionInitFailed {
        /// Backend message.
        message: String,
    },

    /// Discovery could not be started or broke down.
    #[error("Bluetooth discovery failed: {message}")]
    DiscoveryFailed {
        /// Backend message.
        message: String,
    },

    /// Connecting took longer than allowed.
    #[error("Connection to {address} timed out after {timeout_ms} ms")]
    ConnectTimeout {
        /// Peer address.
        address: MacAddress,
        /// Time allowed.
        timeout_ms: u64,
    },

    /// The peer refused or dropped the connection attempt.
    #[error("Connection to {address} failed: {message}")]
    ConnectFailed {
        /// Peer address.
        address: MacAddress,
        /// Backend message.
        message: String,
    },

    /// The peer does not expose the requested characteristic.
    #[error("Characteristic {characteristic} of service {service} not found")]
    CharacteristicNotFound {
        /// Service UUID.
        service: Uuid,
        /// Characteristic UUID.
        characteristic: Uuid,
    },

    /// The connection was lost mid-operation.
    #[error("Peer disconnected")]
    Disconnected,

    /// Any other backend failure.
    #[error("Bluetooth error: {message}")]
    Internal {
        /// Backend message.
        message: String,
    },
}

/// Result alias for radio operations.
pub type RadioResult<T> = std::result::Result<T, RadioError>;

/// A local radio able to scan and open GATT connections.
#[async_trait]
pub trait BleRadio: Send + Sync {
    /// Starts passive scanning with duplicate reporting. Advertisements are
    /// delivered on the returned channel until the radio is dropped.
    async fn start_scan(&self) -> RadioResult<mpsc::Receiver<Advertisement>>;

    /// Suspends scanning so a connection can be made.
    async fn pause_scan(&self) -> RadioResult<()>;

    /// Restarts scanning after [`pause_scan`](Self::pause_scan).
    async fn resume_scan(&self) -> RadioResult<()>;

    /// Opens a GATT connection, failing after `timeout`.
    async fn connect(
        &self,
        address: MacAddress,
        timeout: Duration,
    ) -> RadioResult<Box<dyn BleConnection>>;
}

/// An open GATT connection.
#[async_trait]
pub trait BleConnection: Send {
    /// Reads one characteristic value.
    async fn read_characteristic(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> RadioResult<Vec<u8>>;

    /// Closes the connection.
    async fn disconnect(&mut self) -> RadioResult<()>;
}
