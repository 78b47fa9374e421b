// Licensed under the Apache-2.0 license

//! # I2C Slave Traits
//!
//! Composable traits for an interrupt-driven I2C slave. Each trait covers one
//! concern and the composites are provided through blanket implementations.
//!
//! ```text
//! embedded_hal::i2c::ErrorType
//!     └── I2cSlaveCore (address configuration, mode control)
//!         ├── I2cSlaveBuffer (FIFO data transfer)
//!         └── I2cSlaveInterrupts (status, last event)
//!             └── I2cSlaveEventPolling (bus event entry point)
//!
//! Composite Traits:
//!     ├── I2cSlaveBasic (core + buffer)
//!     └── I2cSlave (core + buffer + event polling)
//! ```

use crate::i2c::common::{LinkError, SlaveEvent, SlaveStatus, TwiStatus};
use crate::i2c::slave::Rearm;
use embedded_hal::i2c::{AddressMode, ErrorType, SevenBitAddress};

/// Core slave functionality - address configuration and mode control
///
/// # Examples
///
/// ```rust,ignore
/// fn bring_up<T: I2cSlaveCore>(slave: &mut T) -> Result<(), T::Error> {
///     slave.configure_slave_address(0x42)?;
///     slave.enable_slave_mode()
/// }
/// ```
pub trait I2cSlaveCore<A: AddressMode = SevenBitAddress>: ErrorType {
    /// Set the own address; the interface is left disabled
    fn configure_slave_address(&mut self, addr: A) -> Result<(), Self::Error>;

    /// Start acknowledging the own address
    fn enable_slave_mode(&mut self) -> Result<(), Self::Error>;

    /// Stop acknowledging the own address
    fn disable_slave_mode(&mut self) -> Result<(), Self::Error>;

    fn is_slave_mode_enabled(&self) -> bool;

    fn slave_address(&self) -> Option<A>;
}

/// Slave buffer operations - data transfer with master
///
/// Data written by the master is queued until read here, and data written
/// here is queued until the master reads it.
pub trait I2cSlaveBuffer<A: AddressMode = SevenBitAddress>: I2cSlaveCore<A> {
    /// Read received data from the slave buffer
    ///
    /// Returns the number of bytes actually read.
    fn read_slave_buffer(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error>;

    /// Queue response data for the next read transaction
    ///
    /// Either all of `data` is queued or none of it.
    fn write_slave_response(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Some(length) if received data is waiting, None otherwise
    fn poll_slave_data(&mut self) -> Result<Option<usize>, Self::Error>;

    /// Drop received and queued data
    fn clear_slave_buffer(&mut self) -> Result<(), Self::Error>;

    /// Bytes that can be queued without overflowing
    fn tx_buffer_space(&self) -> Result<usize, Self::Error>;

    /// Bytes waiting in the receive buffer
    fn rx_buffer_count(&self) -> Result<usize, Self::Error>;
}

/// Slave status management
pub trait I2cSlaveInterrupts<A: AddressMode = SevenBitAddress>: I2cSlaveCore<A> {
    /// Current slave status snapshot
    fn slave_status(&self) -> Result<SlaveStatus, Self::Error>;

    /// Last slave event that occurred
    fn last_slave_event(&self) -> Option<SlaveEvent>;
}

/// Non-blocking bus event handling
///
/// The hardware event source calls `handle_slave_event` once per bus event.
/// A test harness can drive it with a scripted sequence of status codes.
pub trait I2cSlaveEventPolling<A: AddressMode = SevenBitAddress>: I2cSlaveInterrupts<A> {
    /// Process one bus event and re-arm the hardware
    ///
    /// `data` carries the byte of a receive event when the event source has
    /// already read it; `None` leaves it in the data register.
    fn handle_slave_event(&mut self, status: TwiStatus, data: Option<u8>) -> Rearm;

    /// Condition behind the last forced STOP
    fn link_error(&self) -> Option<LinkError>;
}

/// Basic slave: core setup plus buffer operations
pub trait I2cSlaveBasic<A: AddressMode = SevenBitAddress>:
    I2cSlaveCore<A> + I2cSlaveBuffer<A>
{
}

/// Blanket implementation: any type implementing core + buffer gets basic slave
impl<T, A: AddressMode> I2cSlaveBasic<A> for T where T: I2cSlaveCore<A> + I2cSlaveBuffer<A> {}

/// Complete slave: buffer operations plus event handling
pub trait I2cSlave<A: AddressMode = SevenBitAddress>:
    I2cSlaveBuffer<A> + I2cSlaveEventPolling<A>
{
}

/// Blanket implementation: any type implementing buffer + event polling gets full slave
impl<T, A: AddressMode> I2cSlave<A> for T where T: I2cSlaveBuffer<A> + I2cSlaveEventPolling<A> {}
