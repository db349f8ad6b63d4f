//! GPIO / peripheral pin assignments for the sequencer board.
//!
//! Single source of truth: `main` references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Lamp outputs (active HIGH)
// ---------------------------------------------------------------------------

/// Red lamp. Yellow is produced by driving red and green together.
pub const RED_LED_GPIO: i32 = 11;
/// Green lamp.
pub const GREEN_LED_GPIO: i32 = 12;

// ---------------------------------------------------------------------------
// Command console (UART0, routed to the USB-serial bridge)
// ---------------------------------------------------------------------------

pub const UART_TX_GPIO: i32 = 43;
pub const UART_RX_GPIO: i32 = 44;
pub const UART_BAUD: u32 = 115_200;
