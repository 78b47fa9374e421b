// Licensed under the Apache-2.0 license

//! Slave trait implementations for `TwiSlave`.
//!
//! These bridge the FIFO driver to the composable trait surface in
//! [`crate::i2c::traits`]; every method forwards to the inherent API.

use crate::common::Logger;
use crate::i2c::common::{Error, LinkError, SlaveConfigBuilder, SlaveEvent, SlaveStatus, TwiStatus};
use crate::i2c::registers::TwiRegisters;
use crate::i2c::slave::{Rearm, TwiSlave};
use crate::i2c::traits::{
    I2cSlaveBuffer, I2cSlaveCore, I2cSlaveEventPolling, I2cSlaveInterrupts,
};
use embedded_hal::i2c::{ErrorType, SevenBitAddress};

impl<R: TwiRegisters, L: Logger, const RX: usize, const TX: usize> ErrorType
    for TwiSlave<R, L, RX, TX>
{
    type Error = Error;
}

// ================================================================================================
// I2cSlaveCore implementation - core slave functionality
// ================================================================================================

impl<R: TwiRegisters, L: Logger, const RX: usize, const TX: usize> I2cSlaveCore<SevenBitAddress>
    for TwiSlave<R, L, RX, TX>
{
    fn configure_slave_address(&mut self, addr: SevenBitAddress) -> Result<(), Self::Error> {
        self.initialize(SlaveConfigBuilder::new(addr).build())
    }

    fn enable_slave_mode(&mut self) -> Result<(), Self::Error> {
        self.enable()
    }

    fn disable_slave_mode(&mut self) -> Result<(), Self::Error> {
        self.disable();
        Ok(())
    }

    fn is_slave_mode_enabled(&self) -> bool {
        self.is_enabled()
    }

    fn slave_address(&self) -> Option<SevenBitAddress> {
        self.address()
    }
}

// ================================================================================================
// Buffer Operations - I2cSlaveBuffer Trait
// ================================================================================================

impl<R: TwiRegisters, L: Logger, const RX: usize, const TX: usize> I2cSlaveBuffer<SevenBitAddress>
    for TwiSlave<R, L, RX, TX>
{
    fn read_slave_buffer(&mut self, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(self.read_into(buffer))
    }

    fn write_slave_response(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.write_all(data)
    }

    fn poll_slave_data(&mut self) -> Result<Option<usize>, Self::Error> {
        let count = TwiSlave::rx_buffer_count(self);
        Ok((count > 0).then_some(count))
    }

    fn clear_slave_buffer(&mut self) -> Result<(), Self::Error> {
        self.flush();
        Ok(())
    }

    fn tx_buffer_space(&self) -> Result<usize, Self::Error> {
        Ok(TwiSlave::tx_buffer_space(self))
    }

    fn rx_buffer_count(&self) -> Result<usize, Self::Error> {
        Ok(TwiSlave::rx_buffer_count(self))
    }
}

// ================================================================================================
// I2cSlaveInterrupts implementation - status management
// ================================================================================================

impl<R: TwiRegisters, L: Logger, const RX: usize, const TX: usize>
    I2cSlaveInterrupts<SevenBitAddress> for TwiSlave<R, L, RX, TX>
{
    fn slave_status(&self) -> Result<SlaveStatus, Self::Error> {
        Ok(self.status())
    }

    fn last_slave_event(&self) -> Option<SlaveEvent> {
        self.last_event()
    }
}

// ================================================================================================
// Event handling - I2cSlaveEventPolling Trait
// ================================================================================================

impl<R: TwiRegisters, L: Logger, const RX: usize, const TX: usize>
    I2cSlaveEventPolling<SevenBitAddress> for TwiSlave<R, L, RX, TX>
{
    fn handle_slave_event(&mut self, status: TwiStatus, data: Option<u8>) -> Rearm {
        self.handle_event(status, data)
    }

    fn link_error(&self) -> Option<LinkError> {
        TwiSlave::link_error(self)
    }
}
