//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements  | Connects to                   |
//! |------------|-------------|-------------------------------|
//! | `hardware` | OutputPort  | red + green GPIO (embedded-hal)|
//! | `log_sink` | EventSink   | Serial log output             |
//! | `time`     | TimePort    | ESP32 system timer / Instant  |
//! | `uart`     | SerialPort  | ESP-IDF UART driver           |

pub mod hardware;
pub mod log_sink;
pub mod time;
#[cfg(target_os = "espidf")]
pub mod uart;
