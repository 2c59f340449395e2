//! Scripted radio for tests and hosts without a Bluetooth stack.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::{BleConnection, BleRadio, RadioError, RadioResult};
use crate::advertisement::{Advertisement, MacAddress};

/// A connectable peer with readable characteristics.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    characteristics: HashMap<(Uuid, Uuid), Vec<u8>>,
    refuse: bool,
}

impl MockDevice {
    /// A peer exposing no characteristics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a readable characteristic.
    #[must_use]
    pub fn with_characteristic(
        mut self,
        service: Uuid,
        characteristic: Uuid,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.characteristics
            .insert((service, characteristic), value.into());
        self
    }

    /// Makes every connection attempt fail.
    #[must_use]
    pub const fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }
}

/// Radio that replays a fixed advertisement script and serves GATT reads
/// from [`MockDevice`]s.
#[derive(Debug, Default)]
pub struct MockRadio {
    script: Mutex<Vec<Advertisement>>,
    devices: HashMap<MacAddress, MockDevice>,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    connects: Mutex<Vec<MacAddress>>,
}

impl MockRadio {
    /// Radio with nothing in range.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues advertisements delivered once scanning starts.
    #[must_use]
    pub fn with_advertisements(self, advertisements: impl IntoIterator<Item = Advertisement>) -> Self {
        self.script.lock().extend(advertisements);
        self
    }

    /// Registers a connectable peer.
    #[must_use]
    pub fn with_device(mut self, address: MacAddress, device: MockDevice) -> Self {
        self.devices.insert(address, device);
        self
    }

    /// Number of `pause_scan` calls.
    #[must_use]
    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    /// Number of `resume_scan` calls.
    #[must_use]
    pub fn resumes(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    /// Addresses connected to, in order.
    #[must_use]
    pub fn connections(&self) -> Vec<MacAddress> {
        self.connects.lock().clone()
    }
}

#[async_trait]
impl BleRadio for MockRadio {
    async fn start_scan(&self) -> RadioResult<mpsc::Receiver<Advertisement>> {
        let script: Vec<Advertisement> = std::mem::take(&mut *self.script.lock());
        let (tx, rx) = mpsc::channel(script.len().max(1));
        debug!(count = script.len(), "replaying scripted advertisements");
        for advertisement in script {
            tx.send(advertisement)
                .await
                .map_err(|e| RadioError::Internal {
                    message: e.to_string(),
                })?;
        }
        Ok(rx)
    }

    async fn pause_scan(&self) -> RadioResult<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resume_scan(&self) -> RadioResult<()> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(
        &self,
        address: MacAddress,
        _timeout: Duration,
    ) -> RadioResult<Box<dyn BleConnection>> {
        self.connects.lock().push(address);
        match self.devices.get(&address) {
            Some(device) if !device.refuse => Ok(Box::new(MockConnection {
                characteristics: device.characteristics.clone(),
                open: true,
            })),
            Some(_) => Err(RadioError::ConnectFailed {
                address,
                message: "connection refused".to_string(),
            }),
            None => Err(RadioError::ConnectTimeout {
                address,
                timeout_ms: 0,
            }),
        }
    }
}

struct MockConnection {
    characteristics: HashMap<(Uuid, Uuid), Vec<u8>>,
    open: bool,
}

#[async_trait]
impl BleConnection for MockConnection {
    async fn read_characteristic(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> RadioResult<Vec<u8>> {
        if !self.open {
            return Err(RadioError::Disconnected);
        }
        self.characteristics
            .get(&(service, characteristic))
            .cloned()
            .ok_or(RadioError::CharacteristicNotFound {
                service,
                characteristic,
            })
    }

    async fn disconnect(&mut self) -> RadioResult<()> {
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisement::{uuid16, AddressKind};

    fn address() -> MacAddress {
        MacAddress::new([1, 2, 3, 4, 5, 6])
    }

    #[tokio::test]
    async fn test_scan_replays_script() {
        let radio = MockRadio::new().with_advertisements(vec![
            Advertisement::new(address(), AddressKind::Public, -60),
            Advertisement::new(address(), AddressKind::Public, -61),
        ]);
        let mut rx = radio.start_scan().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().rssi, -60);
        assert_eq!(rx.recv().await.unwrap().rssi, -61);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_connection_reads_characteristics() {
        let radio = MockRadio::new().with_device(
            address(),
            MockDevice::new().with_characteristic(uuid16(0x1800), uuid16(0x2A00), b"Tag".to_vec()),
        );
        let mut conn = radio.connect(address(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            conn.read_characteristic(uuid16(0x1800), uuid16(0x2A00))
                .await
                .unwrap(),
            b"Tag"
        );
        assert!(matches!(
            conn.read_characteristic(uuid16(0x180A), uuid16(0x2A24)).await,
            Err(RadioError::CharacteristicNotFound { .. })
        ));
        conn.disconnect().await.unwrap();
        assert!(matches!(
            conn.read_characteristic(uuid16(0x1800), uuid16(0x2A00)).await,
            Err(RadioError::Disconnected)
        ));
        assert_eq!(radio.connections(), vec![address()]);
    }

    #[tokio::test]
    async fn test_unknown_and_refusing_peers_fail() {
        let other = MacAddress::new([9; 6]);
        let radio = MockRadio::new().with_device(other, MockDevice::new().refusing());
        assert!(matches!(
            radio.connect(address(), Duration::from_secs(1)).await,
            Err(RadioError::ConnectTimeout { .. })
        ));
        assert!(matches!(
            radio.connect(other, Duration::from_secs(1)).await,
            Err(RadioError::ConnectFailed { .. })
        ));
    }
}
