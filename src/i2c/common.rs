// Licensed under the Apache-2.0 license

//! Common types and constants for the TWI slave driver.
//!
//! This module provides shared definitions for status codes, slave events,
//! configuration and error handling used across the driver implementation.

use core::fmt;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource, SevenBitAddress};

/// Byte loaded for transmission when the master reads past the queued data,
/// and returned by `receive()` when nothing has been received.
pub const SENTINEL_BYTE: u8 = 0x88;

/// Lowest and highest non-reserved 7-bit addresses
pub const MIN_SLAVE_ADDRESS: SevenBitAddress = 0x08;
pub const MAX_SLAVE_ADDRESS: SevenBitAddress = 0x77;

/// Default FIFO capacity for both directions
pub const DEFAULT_BUFFER_SIZE: usize = 16;

const TWSR_STATUS_MASK: u8 = 0xf8;

/// Slave-relevant TWI status codes as reported in the status register
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiStatus {
    /// 0x60: own SLA+W received, ACK returned
    OwnWriteAddressed,
    /// 0x68: arbitration lost as master, own SLA+W received, ACK returned
    OwnWriteAddressedArbLost,
    /// 0x70: general call received, ACK returned
    GeneralCallAddressed,
    /// 0x78: arbitration lost as master, general call received, ACK returned
    GeneralCallAddressedArbLost,
    /// 0x80: data received after own SLA+W, ACK returned
    DataReceivedAck,
    /// 0x88: data received after own SLA+W, NOT ACK returned
    DataReceivedNack,
    /// 0x90: data received after general call, ACK returned
    GeneralDataReceivedAck,
    /// 0x98: data received after general call, NOT ACK returned
    GeneralDataReceivedNack,
    /// 0xA0: STOP or repeated START while addressed
    StopOrRestart,
    /// 0xA8: own SLA+R received, ACK returned
    OwnReadAddressed,
    /// 0xB0: arbitration lost as master, own SLA+R received, ACK returned
    OwnReadAddressedArbLost,
    /// 0xB8: data byte transmitted, ACK received
    DataTransmittedAck,
    /// 0xC0: data byte transmitted, NOT ACK received
    DataTransmittedNack,
    /// 0xC8: last data byte transmitted (TWEA = 0), ACK received
    LastByteTransmittedAck,
    /// 0xF8: no relevant state information available
    NoState,
    /// 0x00: bus error due to an illegal START or STOP condition
    BusError,
    /// Any other code, including master-mode codes
    Unknown(u8),
}

impl TwiStatus {
    /// Decode a raw status register value; prescaler bits are ignored
    #[must_use]
    pub const fn from_register(value: u8) -> Self {
        match value & TWSR_STATUS_MASK {
            0x60 => Self::OwnWriteAddressed,
            0x68 => Self::OwnWriteAddressedArbLost,
            0x70 => Self::GeneralCallAddressed,
            0x78 => Self::GeneralCallAddressedArbLost,
            0x80 => Self::DataReceivedAck,
            0x88 => Self::DataReceivedNack,
            0x90 => Self::GeneralDataReceivedAck,
            0x98 => Self::GeneralDataReceivedNack,
            0xa0 => Self::StopOrRestart,
            0xa8 => Self::OwnReadAddressed,
            0xb0 => Self::OwnReadAddressedArbLost,
            0xb8 => Self::DataTransmittedAck,
            0xc0 => Self::DataTransmittedNack,
            0xc8 => Self::LastByteTransmittedAck,
            0xf8 => Self::NoState,
            0x00 => Self::BusError,
            other => Self::Unknown(other),
        }
    }

    /// Raw status code
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::OwnWriteAddressed => 0x60,
            Self::OwnWriteAddressedArbLost => 0x68,
            Self::GeneralCallAddressed => 0x70,
            Self::GeneralCallAddressedArbLost => 0x78,
            Self::DataReceivedAck => 0x80,
            Self::DataReceivedNack => 0x88,
            Self::GeneralDataReceivedAck => 0x90,
            Self::GeneralDataReceivedNack => 0x98,
            Self::StopOrRestart => 0xa0,
            Self::OwnReadAddressed => 0xa8,
            Self::OwnReadAddressedArbLost => 0xb0,
            Self::DataTransmittedAck => 0xb8,
            Self::DataTransmittedNack => 0xc0,
            Self::LastByteTransmittedAck => 0xc8,
            Self::NoState => 0xf8,
            Self::BusError => 0x00,
            Self::Unknown(code) => code,
        }
    }
}

impl From<u8> for TwiStatus {
    fn from(value: u8) -> Self {
        Self::from_register(value)
    }
}

/// Slave-side event derived from a status code
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SlaveEvent {
    /// Master addressed us for writing
    WriteRequest = 1,
    /// General call received
    GeneralCall,
    /// A byte from the master was stored (or dropped on overflow)
    DataReceived,
    /// Master addressed us for reading; first byte loaded
    ReadRequest,
    /// Master acked a byte; next byte loaded
    ReadProcessed,
    /// Master nacked a byte, read transfer finished
    ReadDone,
    /// STOP or repeated START
    Stop,
    /// Forced-stop recovery was performed
    Fault,
}

impl SlaveEvent {
    pub(crate) const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::WriteRequest),
            2 => Some(Self::GeneralCall),
            3 => Some(Self::DataReceived),
            4 => Some(Self::ReadRequest),
            5 => Some(Self::ReadProcessed),
            6 => Some(Self::ReadDone),
            7 => Some(Self::Stop),
            8 => Some(Self::Fault),
            _ => None,
        }
    }
}

/// Bus session as seen from the slave
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    AddressedAsReceiver,
    AddressedAsTransmitter,
    ReceivingGeneralCall,
    Error,
}

impl SessionState {
    pub(crate) const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::AddressedAsReceiver,
            2 => Self::AddressedAsTransmitter,
            3 => Self::ReceivingGeneralCall,
            4 => Self::Error,
            _ => Self::Idle,
        }
    }
}

/// Condition that made the event handler force a STOP
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LinkError {
    /// Illegal START or STOP condition (0x00)
    BusError = 1,
    /// No relevant state information (0xF8)
    NoState,
    /// Data received after own address, NOT ACK returned (0x88)
    DataNack,
    /// Data received after general call, NOT ACK returned (0x98)
    GeneralCallDataNack,
    /// Last byte transmitted and acked by the master (0xC8)
    LastByteAcked,
}

impl LinkError {
    pub(crate) const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::BusError),
            2 => Some(Self::NoState),
            3 => Some(Self::DataNack),
            4 => Some(Self::GeneralCallDataNack),
            5 => Some(Self::LastByteAcked),
            _ => None,
        }
    }

    /// Status code class that produces this error, if any
    #[must_use]
    pub const fn from_status(status: TwiStatus) -> Option<Self> {
        match status {
            TwiStatus::BusError => Some(Self::BusError),
            TwiStatus::NoState => Some(Self::NoState),
            TwiStatus::DataReceivedNack => Some(Self::DataNack),
            TwiStatus::GeneralDataReceivedNack => Some(Self::GeneralCallDataNack),
            TwiStatus::LastByteTransmittedAck => Some(Self::LastByteAcked),
            _ => None,
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::BusError => "illegal START or STOP on the bus",
            Self::NoState => "no relevant bus state",
            Self::DataNack => "data received with NOT ACK",
            Self::GeneralCallDataNack => "general call data received with NOT ACK",
            Self::LastByteAcked => "master acked the last transmitted byte",
        };
        f.write_str(msg)
    }
}

/// Driver error
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Own address is not a usable 7-bit slave address
    InvalidAddress(u8),
    /// Address mask has bits outside the 7-bit address
    InvalidAddressMask(u8),
    /// `enable` was called before `initialize`
    NotInitialized,
    /// Transmit FIFO cannot take the data
    BufferFull,
    /// The bus was forced to STOP
    Link(LinkError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress(addr) => write!(f, "invalid slave address {addr:#04x}"),
            Self::InvalidAddressMask(mask) => write!(f, "invalid address mask {mask:#04x}"),
            Self::NotInitialized => f.write_str("slave interface not initialized"),
            Self::BufferFull => f.write_str("transmit buffer full"),
            Self::Link(err) => write!(f, "link error: {err}"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(err: LinkError) -> Self {
        Self::Link(err)
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::BufferFull => ErrorKind::Overrun,
            Self::Link(LinkError::BusError | LinkError::NoState) => ErrorKind::Bus,
            Self::Link(LinkError::DataNack | LinkError::GeneralCallDataNack) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
            }
            Self::Link(LinkError::LastByteAcked)
            | Self::InvalidAddress(_)
            | Self::InvalidAddressMask(_)
            | Self::NotInitialized => ErrorKind::Other,
        }
    }
}

/// Status information for slave operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlaveStatus {
    /// Whether the interface is acknowledging its address
    pub enabled: bool,
    /// Configured own address (once initialized)
    pub address: Option<u8>,
    /// Whether there's data available to read
    pub data_available: bool,
    /// Number of bytes in receive buffer
    pub rx_buffer_count: usize,
    /// Number of bytes in transmit buffer
    pub tx_buffer_count: usize,
    /// Last slave event that occurred
    pub last_event: Option<SlaveEvent>,
    /// Outstanding forced-stop condition
    pub error: Option<LinkError>,
}

/// Slave interface configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlaveConfig {
    pub address: SevenBitAddress,
    pub general_call: bool,
    pub address_mask: u8,
    pub allow_reserved: bool,
}

impl SlaveConfig {
    /// Check the own address against the 7-bit range
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAddress` for addresses above 0x7f, and for the
    /// reserved ranges unless `allow_reserved` is set.
    /// `Error::InvalidAddressMask` if the mask does not fit in 7 bits.
    pub fn validate(&self) -> Result<(), Error> {
        let in_range = if self.allow_reserved {
            self.address <= 0x7f
        } else {
            (MIN_SLAVE_ADDRESS..=MAX_SLAVE_ADDRESS).contains(&self.address)
        };
        if !in_range {
            return Err(Error::InvalidAddress(self.address));
        }
        if self.address_mask > 0x7f {
            return Err(Error::InvalidAddressMask(self.address_mask));
        }
        Ok(())
    }

    /// Own-address register value: address in bits 7..1, general call enable in bit 0
    #[must_use]
    pub const fn own_address_register(&self) -> u8 {
        (self.address << 1) | (self.general_call as u8)
    }

    /// Address-mask register value
    #[must_use]
    pub const fn address_mask_register(&self) -> u8 {
        self.address_mask << 1
    }
}

pub struct SlaveConfigBuilder {
    address: SevenBitAddress,
    general_call: bool,
    address_mask: u8,
    allow_reserved: bool,
}

impl SlaveConfigBuilder {
    #[must_use]
    pub fn new(address: SevenBitAddress) -> Self {
        Self {
            address,
            general_call: false,
            address_mask: 0,
            allow_reserved: false,
        }
    }
    #[must_use]
    pub fn general_call(mut self, enabled: bool) -> Self {
        self.general_call = enabled;
        self
    }
    #[must_use]
    pub fn address_mask(mut self, mask: u8) -> Self {
        self.address_mask = mask;
        self
    }
    #[must_use]
    pub fn allow_reserved(mut self, allowed: bool) -> Self {
        self.allow_reserved = allowed;
        self
    }
    #[must_use]
    pub fn build(self) -> SlaveConfig {
        SlaveConfig {
            address: self.address,
            general_call: self.general_call,
            address_mask: self.address_mask,
            allow_reserved: self.allow_reserved,
        }
    }
}
