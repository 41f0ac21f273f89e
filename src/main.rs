#![no_std]
#![no_main]

mod server;
mod softdevice;

use defmt_rtt as _; // global logger
use panic_probe as _;

use defmt::{info, unwrap, warn};
use embassy_executor::Spawner;
use embassy_nrf::interrupt::Priority;
use embassy_time::{Duration, Ticker};
use kinpathic_hrm::config::NOTIFY_PERIOD_SECS;
use kinpathic_hrm::hrs::FixedHeartRate;
use kinpathic_hrm::{
    startup, AdvertisingController, ConnectionRegistry, EventDispatcher, NotificationScheduler,
    HEART_RATE_ADVERTISING,
};
use nrf_softdevice::Softdevice;
use static_cell::StaticCell;

use crate::softdevice::{SdConnection, SoftdeviceStack};

type Advertiser = AdvertisingController<'static, SoftdeviceStack>;
type Dispatcher = EventDispatcher<'static, SoftdeviceStack>;
type HrmScheduler = NotificationScheduler<'static, SoftdeviceStack, FixedHeartRate>;

static STACK: StaticCell<SoftdeviceStack> = StaticCell::new();
static REGISTRY: StaticCell<ConnectionRegistry<SdConnection>> = StaticCell::new();
static ADVERTISER: StaticCell<Advertiser> = StaticCell::new();
static DISPATCHER: StaticCell<Dispatcher> = StaticCell::new();

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    info!("SD is running");
    sd.run().await
}

#[embassy_executor::task]
async fn advertising_task(stack: &'static SoftdeviceStack) -> ! {
    stack.run().await
}

/// Periodic heart-rate notifier.
#[embassy_executor::task]
async fn hrm_task(mut scheduler: HrmScheduler) -> ! {
    let mut ticker = Ticker::every(Duration::from_secs(NOTIFY_PERIOD_SECS));
    loop {
        ticker.next().await;
        scheduler.tick();
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // P0, P1 and P4 are reserved by the SoftDevice.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let _p = embassy_nrf::init(config);

    let stack: &'static SoftdeviceStack = STACK.init(SoftdeviceStack::new());
    let registry: &'static ConnectionRegistry<SdConnection> =
        REGISTRY.init(ConnectionRegistry::new());
    let advertiser: &'static Advertiser =
        ADVERTISER.init(AdvertisingController::new(stack, &HEART_RATE_ADVERTISING));
    let dispatcher: &'static Dispatcher =
        DISPATCHER.init(EventDispatcher::new(stack, registry, advertiser));

    let outcome = startup(stack, dispatcher, advertiser);
    info!("startup: {}", outcome);

    match stack.softdevice() {
        Some(sd) => {
            unwrap!(spawner.spawn(softdevice_task(sd)));
            unwrap!(spawner.spawn(advertising_task(stack)));
        }
        None => warn!("Bluetooth unavailable, measurements will not be sent"),
    }

    let scheduler = NotificationScheduler::new(stack, registry, FixedHeartRate::default());
    unwrap!(spawner.spawn(hrm_task(scheduler)));
}
