//! UART serial adapter.
//!
//! Non-blocking single-byte reads over an `esp-idf-hal` [`UartDriver`];
//! the ingestion loop supplies the polling cadence.

use esp_idf_hal::delay::NON_BLOCK;
use esp_idf_hal::uart::UartDriver;
use log::warn;

use crate::app::ports::SerialPort;

pub struct UartSerial {
    driver: UartDriver<'static>,
}

impl UartSerial {
    pub fn new(driver: UartDriver<'static>) -> Self {
        Self { driver }
    }
}

impl SerialPort for UartSerial {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.driver.read(&mut byte, NON_BLOCK) {
            Ok(1) => Some(byte[0]),
            Ok(_) => None,
            Err(e) => {
                warn!("uart: read failed: {}", e);
                None
            }
        }
    }

    fn write_byte(&mut self, byte: u8) {
        if let Err(e) = self.driver.write(&[byte]) {
            warn!("uart: echo failed: {}", e);
        }
    }
}
