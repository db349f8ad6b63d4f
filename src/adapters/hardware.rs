//! Lamp hardware adapter: bridges two GPIO lines to [`OutputPort`].
//!
//! The board has only red and green LEDs; yellow is both lit at once.
//! Generic over `embedded-hal` output pins so the same adapter drives
//! `esp-idf-hal` `PinDriver`s on target and plain mock pins on the host.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::OutputPort;
use crate::protocol::ChannelId;

/// Red + green lamp pair behind [`OutputPort`].
pub struct GpioLamps<R, G> {
    red: R,
    green: G,
}

impl<R: OutputPin, G: OutputPin> GpioLamps<R, G> {
    /// Takes ownership of both pins and drives them low.
    pub fn new(red: R, green: G) -> Self {
        let mut lamps = Self { red, green };
        lamps.all_off_inner();
        lamps
    }

    /// Give the pins back (used by tests to inspect final levels).
    pub fn release(self) -> (R, G) {
        (self.red, self.green)
    }

    fn drive_red(&mut self, high: bool) {
        let result = if high { self.red.set_high() } else { self.red.set_low() };
        if result.is_err() {
            warn!("lamp: red GPIO write failed");
        }
    }

    fn drive_green(&mut self, high: bool) {
        let result = if high {
            self.green.set_high()
        } else {
            self.green.set_low()
        };
        if result.is_err() {
            warn!("lamp: green GPIO write failed");
        }
    }

    fn all_off_inner(&mut self) {
        self.drive_red(false);
        self.drive_green(false);
    }
}

impl<R, G> OutputPort for GpioLamps<R, G>
where
    R: OutputPin + Send,
    G: OutputPin + Send,
{
    fn set_level(&mut self, channel: ChannelId, on: bool) {
        match (channel, on) {
            (ChannelId::Red, true) => {
                self.drive_green(false);
                self.drive_red(true);
            }
            (ChannelId::Red, false) => self.drive_red(false),
            (ChannelId::Green, true) => {
                self.drive_red(false);
                self.drive_green(true);
            }
            (ChannelId::Green, false) => self.drive_green(false),
            (ChannelId::Yellow, level) => {
                self.drive_red(level);
                self.drive_green(level);
            }
            (ChannelId::Unrecognized(sym), _) => {
                warn!("lamp: no output for channel 0x{sym:02x}");
            }
        }
    }

    fn all_off(&mut self) {
        self.all_off_inner();
    }
}
