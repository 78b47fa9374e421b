// Licensed under the Apache-2.0 license

// Enforce coding guidelines - prevent panic-prone patterns in production code only
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::indexing_slicing))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! Interrupt-driven I2C (TWI) slave driver.
//!
//! The bus side is a state machine that runs once per TWI interrupt and moves
//! bytes between the data register and two fixed-capacity FIFOs. The
//! application side only polls FIFO state and pushes or pulls bytes; it never
//! calls into the interrupt path.
//!
//! ```rust,ignore
//! use twi_slave::common::NoOpLogger;
//! use twi_slave::i2c::{Atmega328pTwi, SlaveConfigBuilder, TwiSlave};
//!
//! static SLAVE: TwiSlave<Atmega328pTwi> =
//!     TwiSlave::new(unsafe { Atmega328pTwi::steal() }, NoOpLogger);
//!
//! fn main() -> ! {
//!     SLAVE.initialize(SlaveConfigBuilder::new(0x42).build()).ok();
//!     SLAVE.enable().ok();
//!     loop {
//!         if SLAVE.has_received_data() {
//!             let cmd = SLAVE.receive();
//!             SLAVE.transmit(cmd.wrapping_add(1));
//!         }
//!     }
//! }
//!
//! // #[avr_device::interrupt(atmega328p)]
//! fn TWI() {
//!     SLAVE.on_interrupt();
//! }
//! ```

pub mod common;
pub mod flash_table;
pub mod i2c;
