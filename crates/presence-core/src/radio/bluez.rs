//! BlueZ backend over D-Bus.

use std::time::Duration;

use async_trait::async_trait;
use bluer::{
    Adapter, AdapterEvent, Address, AddressType, Device, DiscoveryFilter, DiscoveryTransport,
    Session,
};
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BleConnection, BleRadio, RadioError, RadioResult};
use crate::advertisement::{Advertisement, AddressKind, MacAddress, ManufacturerData, ServiceData};

const SCAN_CHANNEL_CAPACITY: usize = 256;
const RESTART_DELAY: Duration = Duration::from_secs(1);

impl From<bluer::Error> for RadioError {
    fn from(err: bluer::Error) -> Self {
        match err.kind {
            bluer::ErrorKind::NotReady => Self::AdapterPoweredOff,
            bluer::ErrorKind::NotConnected => Self::Disconnected,
            _ => Self::Internal {
                message: err.to_string(),
            },
        }
    }
}

/// Local adapter driven through `bluetoothd`.
pub struct BluezRadio {
    _session: Session,
    adapter: Adapter,
    paused: watch::Sender<bool>,
}

impl BluezRadio {
    /// Opens the default adapter and powers it on.
    ///
    /// # Errors
    ///
    /// Returns [`RadioError::SessionInitFailed`] when `bluetoothd` is not
    /// reachable and [`RadioError::AdapterNotFound`] without an adapter.
    pub async fn new() -> RadioResult<Self> {
        let session = Session::new()
            .await
            .map_err(|e| RadioError::SessionInitFailed {
                message: e.to_string(),
            })?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|_| RadioError::AdapterNotFound)?;
        if !adapter.is_powered().await? {
            adapter
                .set_powered(true)
                .await
                .map_err(|_| RadioError::AdapterPoweredOff)?;
        }
        info!(adapter = adapter.name(), "bluetooth adapter ready");

        let (paused, _) = watch::channel(false);
        Ok(Self {
            _session: session,
            adapter,
            paused,
        })
    }
}

fn le_duplicates_filter() -> DiscoveryFilter {
    DiscoveryFilter {
        transport: DiscoveryTransport::Le,
        duplicate_data: true,
        ..DiscoveryFilter::default()
    }
}

/// Runs discovery until the receiver goes away, stopping while paused.
async fn scan_loop(
    adapter: Adapter,
    mut paused: watch::Receiver<bool>,
    tx: mpsc::Sender<Advertisement>,
) {
    loop {
        while *paused.borrow_and_update() {
            if paused.changed().await.is_err() {
                return;
            }
        }

        if let Err(e) = adapter.set_discovery_filter(le_duplicates_filter()).await {
            warn!(error = %e, "failed to set discovery filter");
            tokio::time::sleep(RESTART_DELAY).await;
            continue;
        }
        let events = match adapter.discover_devices_with_changes().await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "failed to start discovery");
                tokio::time::sleep(RESTART_DELAY).await;
                continue;
            }
        };
        tokio::pin!(events);
        debug!("discovery running");

        loop {
            tokio::select! {
                changed = paused.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *paused.borrow() {
                        debug!("discovery paused");
                        break;
                    }
                }
                event = events.next() => match event {
                    Some(AdapterEvent::DeviceAdded(address)) => {
                        match read_advertisement(&adapter, address).await {
                            Ok(Some(advertisement)) => {
                                if tx.send(advertisement).await.is_err() {
                                    return;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => debug!(mac = %address, error = %e, "skipping unreadable device"),
                        }
                    }
                    Some(_) => {}
                    None => {
                        warn!("discovery stream ended, restarting");
                        break;
                    }
                }
            }
        }
    }
}

/// Snapshot of the properties BlueZ holds for `address`. `None` when the
/// device is cached but has no current RSSI.
async fn read_advertisement(
    adapter: &Adapter,
    address: Address,
) -> bluer::Result<Option<Advertisement>> {
    let device = adapter.device(address)?;
    let Some(rssi) = device.rssi().await? else {
        return Ok(None);
    };

    let mac = MacAddress::new(address.0);
    let kind = match device.address_type().await? {
        AddressType::LeRandom => mac.random_kind(),
        _ => AddressKind::Public,
    };
    let mut advertisement = Advertisement::new(mac, kind, rssi);
    advertisement.name = device.name().await?;
    advertisement.tx_power = device
        .tx_power()
        .await?
        .and_then(|power| i8::try_from(power).ok());
    if let Some(uuids) = device.uuids().await? {
        let mut uuids: Vec<Uuid> = uuids.into_iter().collect();
        uuids.sort();
        advertisement.service_uuids = uuids;
    }
    if let Some(entries) = device.service_data().await? {
        let mut entries: Vec<ServiceData> = entries
            .into_iter()
            .map(|(uuid, data)| ServiceData { uuid, data })
            .collect();
        entries.sort_by_key(|entry| entry.uuid);
        advertisement.service_data = entries;
    }
    if let Some(entries) = device.manufacturer_data().await? {
        // BlueZ keys by company; one advertisement carries at most one.
        advertisement.manufacturer_data = entries
            .into_iter()
            .min_by_key(|(company, _)| *company)
            .map(|(company, payload)| ManufacturerData::from_parts(company, &payload));
    }
    Ok(Some(advertisement))
}

#[async_trait]
impl BleRadio for BluezRadio {
    async fn start_scan(&self) -> RadioResult<mpsc::Receiver<Advertisement>> {
        self.adapter
            .set_discovery_filter(le_duplicates_filter())
            .await
            .map_err(|e| RadioError::DiscoveryFailed {
                message: e.to_string(),
            })?;
        let (tx, rx) = mpsc::channel(SCAN_CHANNEL_CAPACITY);
        tokio::spawn(scan_loop(
            self.adapter.clone(),
            self.paused.subscribe(),
            tx,
        ));
        Ok(rx)
    }

    async fn pause_scan(&self) -> RadioResult<()> {
        self.paused.send_replace(true);
        Ok(())
    }

    async fn resume_scan(&self) -> RadioResult<()> {
        self.paused.send_replace(false);
        Ok(())
    }

    async fn connect(
        &self,
        address: MacAddress,
        timeout: Duration,
    ) -> RadioResult<Box<dyn BleConnection>> {
        let device = self.adapter.device(Address(address.octets()))?;
        match tokio::time::timeout(timeout, device.connect()).await {
            Ok(Ok(())) => Ok(Box::new(BluezConnection { device })),
            Ok(Err(e)) => Err(RadioError::ConnectFailed {
                address,
                message: e.to_string(),
            }),
            Err(_) => {
                let _ = device.disconnect().await;
                Err(RadioError::ConnectTimeout {
                    address,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }
}

struct BluezConnection {
    device: Device,
}

#[async_trait]
impl BleConnection for BluezConnection {
    async fn read_characteristic(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
    ) -> RadioResult<Vec<u8>> {
        for remote in self.device.services().await? {
            if remote.uuid().await? != service {
                continue;
            }
            for candidate in remote.characteristics().await? {
                if candidate.uuid().await? == characteristic {
                    return Ok(candidate.read().await?);
                }
            }
        }
        Err(RadioError::CharacteristicNotFound {
            service,
            characteristic,
        })
    }

    async fn disconnect(&mut self) -> RadioResult<()> {
        Ok(self.device.disconnect().await?)
    }
}
