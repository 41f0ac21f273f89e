//! Nordic SoftDevice S140 implementation of [`HostStack`].
//!
//! The SoftDevice reports connections as the completion of an advertising
//! future rather than through callbacks, so [`SoftdeviceStack::run`] turns
//! that flow back into `on_connected` / `on_disconnected` calls on the
//! registered sink:
//!
//! 1. wait for an advertising request (`start_advertising`);
//! 2. advertise until a central connects or `stop_advertising` is called;
//! 3. report the connection, serve GATT until the link drops;
//! 4. report the disconnection and go back to 1.
//!
//! Only one peripheral link is configured, so the SoftDevice itself stops
//! advertising while connected.

use core::cell::Cell;
use core::mem;

use defmt::{error, warn};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use heapless::Vec;
use kinpathic_hrm::ble::adv_data::AdPayload;
use kinpathic_hrm::ble::advertising::AdvertisingDescriptor;
use kinpathic_hrm::ble::{ConnectionEventSink, HostStack, Link, HCI_SUCCESS};
use kinpathic_hrm::config;
use kinpathic_hrm::error::{nrf, NotifyError, StackError};
use kinpathic_hrm::hrs::HRM_MAX_LEN;
use nrf_softdevice::ble::gatt_server::NotifyValueError;
use nrf_softdevice::ble::{peripheral, Connection};
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;

use crate::server::Server;

/// `gatt_server::run` does not surface the HCI reason; this value is
/// outside the HCI error range so it cannot be mistaken for one.
const UNREPORTED_REASON: u8 = 0xFF;

type Sink = &'static dyn ConnectionEventSink<SdConnection>;

/// One reference to a SoftDevice connection.  Cloning bumps the
/// connection's reference count; dropping releases it.
pub type SdConnection = Link<Connection>;

const _: () = {
    assert!(nrf::NRF_ERROR_INVALID_STATE == raw::NRF_ERROR_INVALID_STATE);
    assert!(nrf::NRF_ERROR_RESOURCES == raw::NRF_ERROR_RESOURCES);
    assert!(nrf::BLE_ERROR_INVALID_CONN_HANDLE == raw::BLE_ERROR_INVALID_CONN_HANDLE);
    assert!(nrf::BLE_ERROR_GATTS_SYS_ATTR_MISSING == raw::BLE_ERROR_GATTS_SYS_ATTR_MISSING);
};

struct AdvRequest {
    adv: AdPayload,
    scan: AdPayload,
    interval: u32,
}

pub struct SoftdeviceStack {
    sd: Mutex<CriticalSectionRawMutex, Cell<Option<&'static Softdevice>>>,
    server: Mutex<CriticalSectionRawMutex, Cell<Option<&'static Server>>>,
    sink: Mutex<CriticalSectionRawMutex, Cell<Option<Sink>>>,
    adv_request: Signal<CriticalSectionRawMutex, AdvRequest>,
    adv_stop: Signal<CriticalSectionRawMutex, ()>,
}

impl SoftdeviceStack {
    pub const fn new() -> Self {
        Self {
            sd: Mutex::new(Cell::new(None)),
            server: Mutex::new(Cell::new(None)),
            sink: Mutex::new(Cell::new(None)),
            adv_request: Signal::new(),
            adv_stop: Signal::new(),
        }
    }

    /// The enabled SoftDevice, once `enable` has succeeded.
    pub fn softdevice(&self) -> Option<&'static Softdevice> {
        self.sd.lock(|c| c.get())
    }

    fn server(&self) -> Option<&'static Server> {
        self.server.lock(|c| c.get())
    }

    fn with_sink(&self, f: impl FnOnce(Sink)) {
        match self.sink.lock(|c| c.get()) {
            Some(sink) => f(sink),
            None => warn!("connection event with no callbacks registered"),
        }
    }

    /// Advertising / connection loop.  Spawn once after a successful enable.
    pub async fn run(&self) -> ! {
        loop {
            let request = self.adv_request.wait().await;
            let (Some(sd), Some(server)) = (self.softdevice(), self.server()) else {
                warn!("advertising requested before the SoftDevice is enabled");
                continue;
            };

            let config = peripheral::Config {
                interval: request.interval,
                ..Default::default()
            };
            let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
                adv_data: &request.adv,
                scan_data: &request.scan,
            };

            let conn = match select(
                peripheral::advertise_connectable(sd, adv, &config),
                self.adv_stop.wait(),
            )
            .await
            {
                Either::First(Ok(conn)) => conn,
                Either::First(Err(e)) => {
                    warn!("advertising ended without a connection: {:?}", e);
                    continue;
                }
                Either::Second(()) => continue,
            };

            let Some(id) = conn.handle() else {
                warn!("link dropped before it could be reported");
                continue;
            };
            let handle = SdConnection::new(id, conn);
            self.with_sink(|sink| sink.on_connected(&handle, HCI_SUCCESS));

            // Returns when the connection gets disconnected.
            server.run(handle.conn()).await;

            self.with_sink(|sink| sink.on_disconnected(&handle, UNREPORTED_REASON));
        }
    }
}

impl HostStack for SoftdeviceStack {
    type Handle = SdConnection;

    fn enable(&self) -> Result<(), StackError> {
        if self.softdevice().is_some() {
            return Err(StackError::AlreadyEnabled);
        }

        let sd = Softdevice::enable(&softdevice_config());
        let server = Server::new(sd).map_err(|_| {
            error!("GATT service registration failed");
            StackError::ServiceRegistration
        })?;

        if server
            .hrs
            .body_sensor_location_set(&(config::BODY_SENSOR_LOCATION as u8))
            .is_err()
        {
            warn!("could not set body sensor location");
        }

        static SERVER: StaticCell<Server> = StaticCell::new();
        let server: &'static Server = SERVER.init(server);
        let sd: &'static Softdevice = sd;

        self.sd.lock(|c| c.set(Some(sd)));
        self.server.lock(|c| c.set(Some(server)));
        Ok(())
    }

    fn start_advertising(&self, descriptor: &AdvertisingDescriptor) -> Result<(), StackError> {
        if self.softdevice().is_none() {
            return Err(StackError::NotEnabled);
        }
        if !descriptor.options.connectable {
            return Err(StackError::Raw(raw::NRF_ERROR_NOT_SUPPORTED));
        }

        let request = AdvRequest {
            adv: descriptor.adv_data()?,
            scan: descriptor.scan_data()?,
            interval: descriptor.interval_min as u32,
        };
        self.adv_stop.reset();
        self.adv_request.signal(request);
        Ok(())
    }

    fn stop_advertising(&self) -> Result<(), StackError> {
        if self.softdevice().is_none() {
            return Err(StackError::NotEnabled);
        }
        self.adv_request.reset();
        self.adv_stop.signal(());
        Ok(())
    }

    fn register_connection_callbacks(&self, sink: Sink) {
        self.sink.lock(|c| c.set(Some(sink)));
    }

    fn acquire(&self, handle: &SdConnection) -> SdConnection {
        handle.clone()
    }

    fn release(&self, handle: SdConnection) {
        drop(handle);
    }

    fn notify(&self, handle: &SdConnection, value: &[u8]) -> Result<(), NotifyError> {
        let server = self.server().ok_or(NotifyError::Disconnected)?;
        let payload: Vec<u8, HRM_MAX_LEN> =
            Vec::from_slice(value).map_err(|_| NotifyError::Raw(raw::NRF_ERROR_INVALID_LENGTH))?;

        server
            .hrs
            .measurement_notify(handle.conn(), &payload)
            .map_err(|e| match e {
                NotifyValueError::Disconnected => NotifyError::Disconnected,
                NotifyValueError::Raw(e) => NotifyError::from_raw(e as u32),
            })
    }
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_XTAL as u8,
            rc_ctiv: 0,
            rc_temp_ctiv: 0,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_20_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: config::PERIPHERAL_LINKS,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t {
            att_mtu: config::ATT_MTU,
        }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: config::PERIPHERAL_LINKS,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: config::DEVICE_NAME.as_ptr() as _,
            current_len: config::DEVICE_NAME.len() as u16,
            max_len: config::DEVICE_NAME.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}
