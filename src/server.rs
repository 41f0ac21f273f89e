//! GATT server exposing the Heart Rate Service (0x180D).

use defmt::info;
use heapless::Vec;
use kinpathic_hrm::hrs::HRM_MAX_LEN;
use nrf_softdevice::ble::{gatt_server, Connection};

#[nrf_softdevice::gatt_service(uuid = "180d")]
pub struct HeartRateService {
    /// Heart Rate Measurement - notify only, flags byte + value.
    #[characteristic(uuid = "2a37", notify)]
    pub measurement: Vec<u8, HRM_MAX_LEN>,

    /// Body Sensor Location - static, set once after registration.
    #[characteristic(uuid = "2a38", read)]
    pub body_sensor_location: u8,
}

impl HeartRateService {
    fn handle(&self, event: HeartRateServiceEvent) {
        match event {
            HeartRateServiceEvent::MeasurementCccdWrite { notifications } => {
                if notifications {
                    info!("HRS notifications enabled");
                } else {
                    info!("HRS notifications disabled");
                }
            }
        }
    }
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub hrs: HeartRateService,
}

impl Server {
    /// Serve GATT requests until the link drops.
    pub async fn run(&self, conn: &Connection) {
        let e = gatt_server::run(conn, self, |e| self.handle_event(e)).await;
        info!("gatt_server run exited with error: {:?}", e);
    }

    fn handle_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::Hrs(e) => self.hrs.handle(e),
        }
    }
}
