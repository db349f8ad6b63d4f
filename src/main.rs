//! TrafficSeq Firmware: Main Entry Point
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │  UartSerial      GpioLamps       SystemClock   LogEventSink  │
//! │  (SerialPort)    (OutputPort)    (TimePort)    (EventSink)   │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  serial-rx ─▶ FramingBuffer ─▶ dispatch ─▶ TurnBoard         │
//! │                                  lamp-red · lamp-yellow ·    │
//! │                                  lamp-green                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_hal::units::Hertz;
use log::{debug, info, warn};

use trafficseq::adapters::hardware::GpioLamps;
use trafficseq::adapters::log_sink::LogEventSink;
use trafficseq::adapters::time::SystemClock;
use trafficseq::adapters::uart::UartSerial;
use trafficseq::app::service::SequencerService;
use trafficseq::config::SystemConfig;
use trafficseq::pins;

/// Optional build-time JSON override, e.g.
/// `TRAFFICSEQ_CONFIG='{"echo_input":false}' cargo build`.
fn load_config() -> SystemConfig {
    let Some(json) = option_env!("TRAFFICSEQ_CONFIG") else {
        return SystemConfig::default();
    };
    match SystemConfig::from_json(json) {
        Ok(cfg) => {
            info!("Config override applied");
            cfg
        }
        Err(e) => {
            warn!("Config override rejected ({}), using defaults", e);
            SystemConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  TrafficSeq v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = load_config();

    // ── 2. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take().context("peripherals already taken")?;

    // SAFETY: pin numbers come from the board map and are not claimed
    // by any other driver.
    let (red, green) = unsafe {
        (
            AnyOutputPin::new(pins::RED_LED_GPIO),
            AnyOutputPin::new(pins::GREEN_LED_GPIO),
        )
    };
    let lamps = GpioLamps::new(
        PinDriver::output(red).context("red lamp GPIO")?,
        PinDriver::output(green).context("green lamp GPIO")?,
    );
    info!("GPIOs initialized");

    let uart_config = UartConfig::default().baudrate(Hertz(pins::UART_BAUD));
    // SAFETY: as above, UART pins are dedicated to the console.
    let (tx, rx) = unsafe {
        (
            AnyIOPin::new(pins::UART_TX_GPIO),
            AnyIOPin::new(pins::UART_RX_GPIO),
        )
    };
    let uart = UartDriver::new(
        peripherals.uart0,
        tx,
        rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart_config,
    )
    .context("UART init")?;
    info!("UART initialized ({} baud)", pins::UART_BAUD);

    // ── 3. Start the sequencer ────────────────────────────────
    let service = SequencerService::start(
        &config,
        lamps,
        SystemClock::new(),
        UartSerial::new(uart),
        Arc::new(LogEventSink::new()),
    )
    .context("sequencer start")?;

    info!("Ready: send e.g. R,500,G,300T,3 (D,1 / D,0 toggles diagnostics)");

    // ── 4. Idle ───────────────────────────────────────────────
    loop {
        std::thread::sleep(Duration::from_secs(30));
        debug!("{} byte(s) awaiting dispatch", service.pending_bytes());
    }
}
