// Licensed under the Apache-2.0 license

//! TWI (I2C) slave driver module.
//!
//! This module provides an interrupt-driven slave controller with FIFO
//! buffering, designed for bare-metal `no_std` targets. Register access goes
//! through [`TwiRegisters`], so the same state machine runs on hardware and
//! against a scripted test double.

pub mod common;
pub mod fifo;
pub mod registers;
pub mod slave;
mod slave_impl;
pub mod traits;

pub use common::{
    Error, LinkError, SessionState, SlaveConfig, SlaveConfigBuilder, SlaveEvent, SlaveStatus,
    TwiStatus, DEFAULT_BUFFER_SIZE, SENTINEL_BYTE,
};
pub use fifo::{ByteFifo, FifoError};
#[cfg(feature = "atmega328p")]
pub use registers::Atmega328pTwi;
pub use registers::TwiRegisters;
pub use slave::{Rearm, TwiSlave};
pub use traits::{
    I2cSlave, I2cSlaveBasic, I2cSlaveBuffer, I2cSlaveCore, I2cSlaveEventPolling,
    I2cSlaveInterrupts,
};
