// Licensed under the Apache-2.0 license

//! TWI register access.
//!
//! The driver only needs four registers: own address (plus its mask), control,
//! data and status. `TwiRegisters` abstracts them PAC-style with `&self`
//! accessors so a driver instance can be shared with the interrupt handler.

/// TWI Interrupt Flag; writing one clears it and starts the next bus action
pub const TWCR_TWINT: u8 = 0x80;
/// TWI Enable Acknowledge
pub const TWCR_TWEA: u8 = 0x40;
/// TWI START Condition
pub const TWCR_TWSTA: u8 = 0x20;
/// TWI STOP Condition
pub const TWCR_TWSTO: u8 = 0x10;
/// TWI Write Collision Flag
pub const TWCR_TWWC: u8 = 0x08;
/// TWI Enable
pub const TWCR_TWEN: u8 = 0x04;
/// TWI Interrupt Enable
pub const TWCR_TWIE: u8 = 0x01;

/// Interface powered, but no interrupts and no acknowledge
pub const CONTROL_INIT: u8 = TWCR_TWEN;
/// Release the bus and acknowledge the next address or data byte
pub const CONTROL_ARM_ACK: u8 = TWCR_TWEN | TWCR_TWIE | TWCR_TWINT | TWCR_TWEA;
/// Recover from an illegal bus state by issuing STOP
pub const CONTROL_FORCE_STOP: u8 = TWCR_TWSTO | TWCR_TWINT;

/// Hardware interface of a TWI slave peripheral
pub trait TwiRegisters {
    fn write_own_address(&self, value: u8);

    fn write_address_mask(&self, value: u8);

    fn write_control(&self, value: u8);

    fn read_data(&self) -> u8;

    fn write_data(&self, value: u8);

    /// Raw status register, prescaler bits included
    fn read_status(&self) -> u8;
}

impl<T: TwiRegisters + ?Sized> TwiRegisters for &T {
    fn write_own_address(&self, value: u8) {
        (**self).write_own_address(value);
    }
    fn write_address_mask(&self, value: u8) {
        (**self).write_address_mask(value);
    }
    fn write_control(&self, value: u8) {
        (**self).write_control(value);
    }
    fn read_data(&self) -> u8 {
        (**self).read_data()
    }
    fn write_data(&self, value: u8) {
        (**self).write_data(value);
    }
    fn read_status(&self) -> u8 {
        (**self).read_status()
    }
}

#[cfg(feature = "atmega328p")]
pub use self::atmega328p::Atmega328pTwi;

#[cfg(feature = "atmega328p")]
mod atmega328p {
    use super::TwiRegisters;
    use core::ptr::{read_volatile, write_volatile};

    // Data-space addresses of the TWI block
    const TWSR: usize = 0xb9;
    const TWAR: usize = 0xba;
    const TWDR: usize = 0xbb;
    const TWCR: usize = 0xbc;
    const TWAMR: usize = 0xbd;

    /// Memory-mapped TWI peripheral of the ATmega328P
    #[derive(Debug)]
    pub struct Atmega328pTwi {
        _private: (),
    }

    impl Atmega328pTwi {
        /// # Safety
        ///
        /// The caller must be the only owner of the TWI peripheral.
        #[must_use]
        pub const unsafe fn steal() -> Self {
            Self { _private: () }
        }

        fn read(addr: usize) -> u8 {
            // SAFETY: fixed I/O register address of this MCU
            unsafe { read_volatile(addr as *const u8) }
        }

        fn write(addr: usize, value: u8) {
            // SAFETY: fixed I/O register address of this MCU
            unsafe { write_volatile(addr as *mut u8, value) }
        }
    }

    impl TwiRegisters for Atmega328pTwi {
        fn write_own_address(&self, value: u8) {
            Self::write(TWAR, value);
        }
        fn write_address_mask(&self, value: u8) {
            Self::write(TWAMR, value);
        }
        fn write_control(&self, value: u8) {
            Self::write(TWCR, value);
        }
        fn read_data(&self) -> u8 {
            Self::read(TWDR)
        }
        fn write_data(&self, value: u8) {
            Self::write(TWDR, value);
        }
        fn read_status(&self) -> u8 {
            Self::read(TWSR)
        }
    }
}
