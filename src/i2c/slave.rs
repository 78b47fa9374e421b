// Licensed under the Apache-2.0 license

//! Interrupt-driven TWI slave with receive and transmit FIFOs.
//!
//! `TwiSlave` owns both FIFOs and all session bookkeeping. Every method takes
//! `&self`, so one instance can sit in a `static` and be used by the
//! interrupt handler (`on_interrupt`) and the main loop at the same time.
//! The handler is the producer of the receive FIFO and the consumer of the
//! transmit FIFO; the application holds the opposite roles.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{
    Error, LinkError, SessionState, SlaveConfig, SlaveConfigBuilder, SlaveEvent, SlaveStatus,
    TwiStatus, DEFAULT_BUFFER_SIZE, SENTINEL_BYTE,
};
use crate::i2c::fifo::ByteFifo;
use crate::i2c::registers::{TwiRegisters, CONTROL_ARM_ACK, CONTROL_FORCE_STOP, CONTROL_INIT};
use embedded_hal::i2c::SevenBitAddress;
use portable_atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};

const NO_EVENT: u8 = 0;
const NO_ERROR: u8 = 0;

/// How the handler left the hardware after an event
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rearm {
    /// Bus released, next address or data byte will be acknowledged
    Acknowledge,
    /// STOP forced; the interface stays down until `enable()`
    ForceStop,
}

pub struct TwiSlave<
    R,
    L = NoOpLogger,
    const RX: usize = DEFAULT_BUFFER_SIZE,
    const TX: usize = DEFAULT_BUFFER_SIZE,
> {
    regs: R,
    logger: L,
    rx: ByteFifo<RX>,
    tx: ByteFifo<TX>,
    address: AtomicU8,
    initialized: AtomicBool,
    enabled: AtomicBool,
    general_call: AtomicBool,
    session: AtomicU8,
    last_event: AtomicU8,
    link_error: AtomicU8,
    rx_dropped: AtomicU16,
    tx_underruns: AtomicU16,
}

impl<R: TwiRegisters, L: Logger, const RX: usize, const TX: usize> TwiSlave<R, L, RX, TX> {
    pub const fn new(regs: R, logger: L) -> Self {
        Self {
            regs,
            logger,
            rx: ByteFifo::new(),
            tx: ByteFifo::new(),
            address: AtomicU8::new(0),
            initialized: AtomicBool::new(false),
            enabled: AtomicBool::new(false),
            general_call: AtomicBool::new(false),
            session: AtomicU8::new(SessionState::Idle as u8),
            last_event: AtomicU8::new(NO_EVENT),
            link_error: AtomicU8::new(NO_ERROR),
            rx_dropped: AtomicU16::new(0),
            tx_underruns: AtomicU16::new(0),
        }
    }

    // ============================================================================================
    // Configuration
    // ============================================================================================

    /// Program the own address and power the interface without enabling
    /// acknowledges or interrupts.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAddress` if the configuration does not validate;
    /// no register is written in that case.
    pub fn initialize(&self, config: SlaveConfig) -> Result<(), Error> {
        config.validate()?;

        self.enabled.store(false, Ordering::Release);
        self.regs.write_own_address(config.own_address_register());
        self.regs.write_address_mask(config.address_mask_register());
        self.regs.write_control(CONTROL_INIT);

        self.address.store(config.address, Ordering::Relaxed);
        self.initialized.store(true, Ordering::Release);
        self.logger.info(format_args!(
            "twi slave initialized at {:#04x}, general call {}",
            config.address, config.general_call
        ));
        Ok(())
    }

    /// `initialize` with default settings for `address`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAddress` for reserved or out-of-range addresses.
    pub fn initialize_address(&self, address: SevenBitAddress) -> Result<(), Error> {
        self.initialize(SlaveConfigBuilder::new(address).build())
    }

    /// Start acknowledging the own address and raising bus events. Clears a
    /// previously recorded link error.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotInitialized` if `initialize` has not succeeded.
    pub fn enable(&self) -> Result<(), Error> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(Error::NotInitialized);
        }
        self.link_error.store(NO_ERROR, Ordering::Relaxed);
        self.general_call.store(false, Ordering::Relaxed);
        self.set_session(SessionState::Idle);
        self.enabled.store(true, Ordering::Release);
        self.regs.write_control(CONTROL_ARM_ACK);
        self.logger.debug(format_args!("twi slave enabled"));
        Ok(())
    }

    /// Stop acknowledging; the peripheral stays powered
    pub fn disable(&self) {
        self.regs.write_control(CONTROL_INIT);
        self.enabled.store(false, Ordering::Release);
        self.set_session(SessionState::Idle);
        self.logger.debug(format_args!("twi slave disabled"));
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn address(&self) -> Option<SevenBitAddress> {
        self.initialized
            .load(Ordering::Acquire)
            .then(|| self.address.load(Ordering::Relaxed))
    }

    // ============================================================================================
    // Bus event handling (interrupt context)
    // ============================================================================================

    /// Service one TWI interrupt: read the status register and handle it
    pub fn on_interrupt(&self) -> Rearm {
        let status = TwiStatus::from_register(self.regs.read_status());
        self.handle_event(status, None)
    }

    /// Handle one bus event. Must run to completion before the next event is
    /// signalled; the hardware holds SCL low until the control register is
    /// written here.
    ///
    /// `data` is the byte latched with a receive event. `None` reads it from
    /// the data register.
    pub fn handle_event(&self, status: TwiStatus, data: Option<u8>) -> Rearm {
        match status {
            TwiStatus::OwnWriteAddressed | TwiStatus::OwnWriteAddressedArbLost => {
                self.general_call.store(false, Ordering::Relaxed);
                self.set_session(SessionState::AddressedAsReceiver);
                self.record(SlaveEvent::WriteRequest);
                self.acknowledge()
            }
            TwiStatus::GeneralCallAddressed | TwiStatus::GeneralCallAddressedArbLost => {
                self.general_call.store(true, Ordering::Relaxed);
                self.set_session(SessionState::ReceivingGeneralCall);
                self.record(SlaveEvent::GeneralCall);
                self.acknowledge()
            }
            TwiStatus::DataReceivedAck | TwiStatus::GeneralDataReceivedAck => {
                let byte = data.unwrap_or_else(|| self.regs.read_data());
                if self.rx.push(byte).is_err() {
                    bump(&self.rx_dropped);
                    self.logger
                        .warn(format_args!("twi rx overflow, dropped {byte:#04x}"));
                }
                self.record(SlaveEvent::DataReceived);
                self.acknowledge()
            }
            TwiStatus::OwnReadAddressed
            | TwiStatus::OwnReadAddressedArbLost
            | TwiStatus::DataTransmittedAck => {
                let byte = match self.tx.pop() {
                    Ok(byte) => byte,
                    Err(_) => {
                        bump(&self.tx_underruns);
                        self.logger
                            .warn(format_args!("twi tx underrun, sending sentinel"));
                        SENTINEL_BYTE
                    }
                };
                self.regs.write_data(byte);
                self.set_session(SessionState::AddressedAsTransmitter);
                self.record(if status == TwiStatus::DataTransmittedAck {
                    SlaveEvent::ReadProcessed
                } else {
                    SlaveEvent::ReadRequest
                });
                self.acknowledge()
            }
            TwiStatus::DataTransmittedNack => {
                self.set_session(SessionState::Idle);
                self.record(SlaveEvent::ReadDone);
                self.acknowledge()
            }
            TwiStatus::StopOrRestart => {
                self.general_call.store(false, Ordering::Relaxed);
                self.set_session(SessionState::Idle);
                self.record(SlaveEvent::Stop);
                self.acknowledge()
            }
            TwiStatus::DataReceivedNack
            | TwiStatus::GeneralDataReceivedNack
            | TwiStatus::LastByteTransmittedAck
            | TwiStatus::NoState
            | TwiStatus::BusError => {
                // every status in this arm has a LinkError
                let error = LinkError::from_status(status).unwrap_or(LinkError::BusError);
                self.force_stop(error)
            }
            TwiStatus::Unknown(code) => {
                self.logger
                    .debug(format_args!("twi unexpected status {code:#04x}, re-arming"));
                self.acknowledge()
            }
        }
    }

    fn acknowledge(&self) -> Rearm {
        self.regs.write_control(CONTROL_ARM_ACK);
        Rearm::Acknowledge
    }

    fn force_stop(&self, error: LinkError) -> Rearm {
        self.regs.write_control(CONTROL_FORCE_STOP);
        self.enabled.store(false, Ordering::Release);
        self.link_error.store(error as u8, Ordering::Release);
        self.set_session(SessionState::Error);
        self.record(SlaveEvent::Fault);
        self.logger.error(format_args!("twi forced stop: {error}"));
        Rearm::ForceStop
    }

    fn set_session(&self, state: SessionState) {
        self.session.store(state as u8, Ordering::Release);
    }

    fn record(&self, event: SlaveEvent) {
        self.last_event.store(event as u8, Ordering::Release);
    }

    // ============================================================================================
    // Application accessors
    // ============================================================================================

    /// Queue a byte for the master to read. Dropped silently when the
    /// transmit FIFO is full; pace writes with `has_pending_transmit` or
    /// `tx_buffer_space`.
    pub fn transmit(&self, byte: u8) {
        if self.tx.push(byte).is_err() {
            self.logger
                .debug(format_args!("twi tx full, dropped {byte:#04x}"));
        }
    }

    /// Queue a byte, reporting a full FIFO instead of dropping silently
    ///
    /// # Errors
    ///
    /// `nb::Error::WouldBlock` while the transmit FIFO is full.
    pub fn try_transmit(&self, byte: u8) -> nb::Result<(), Error> {
        self.tx.push(byte).map_err(|_| nb::Error::WouldBlock)
    }

    /// Take the oldest received byte, or `SENTINEL_BYTE` when nothing was
    /// received. The sentinel is indistinguishable from a received 0x88, so
    /// check `has_received_data` first or use `try_receive`.
    pub fn receive(&self) -> u8 {
        self.rx.pop().unwrap_or(SENTINEL_BYTE)
    }

    /// Take the oldest received byte.
    ///
    /// # Errors
    ///
    /// `nb::Error::Other(Error::Link(_))` when the FIFO is empty and the
    /// handler forced a STOP since the last `enable`, otherwise
    /// `nb::Error::WouldBlock` while the FIFO is empty.
    pub fn try_receive(&self) -> nb::Result<u8, Error> {
        match self.rx.pop() {
            Ok(byte) => Ok(byte),
            Err(_) => match self.link_error() {
                Some(err) => Err(nb::Error::Other(Error::Link(err))),
                None => Err(nb::Error::WouldBlock),
            },
        }
    }

    pub fn has_received_data(&self) -> bool {
        self.rx.has_data()
    }

    /// True while bytes queued by `transmit` have not all been read by the
    /// master. Should be false when a new read request arrives; otherwise
    /// the exchange is out of sync and `clear_transmit` recovers it.
    pub fn has_pending_transmit(&self) -> bool {
        self.tx.is_pending()
    }

    /// Drop everything queued for transmission. May run while the interface
    /// is enabled.
    pub fn clear_transmit(&self) {
        self.tx.clear();
    }

    /// Drop everything received but not yet read
    pub fn clear_receive(&self) {
        self.rx.clear();
    }

    /// Empty both FIFOs
    pub fn flush(&self) {
        self.rx.clear();
        self.tx.clear();
    }

    /// Inject a byte into the receive FIFO as if the master had written it.
    /// Returns false, dropping the byte, when the FIFO is full.
    pub fn stuff_receive(&self, byte: u8) -> bool {
        self.rx.push(byte).is_ok()
    }

    /// Pop as many received bytes as fit into `buffer`; returns the count
    pub fn read_into(&self, buffer: &mut [u8]) -> usize {
        let mut count = 0;
        for slot in buffer.iter_mut() {
            match self.rx.pop() {
                Ok(byte) => *slot = byte,
                Err(_) => break,
            }
            count += 1;
        }
        count
    }

    /// Queue all of `data` or nothing
    ///
    /// # Errors
    ///
    /// Returns `Error::BufferFull` without queueing anything when `data` does
    /// not fit into the free space of the transmit FIFO.
    pub fn write_all(&self, data: &[u8]) -> Result<(), Error> {
        if data.len() > self.tx.free() {
            return Err(Error::BufferFull);
        }
        for &byte in data {
            self.tx.push(byte).map_err(|_| Error::BufferFull)?;
        }
        Ok(())
    }

    /// Collect up to `M` received bytes; bytes beyond `M` stay queued
    pub fn drain_received<const M: usize>(&self) -> heapless::Vec<u8, M> {
        let mut out = heapless::Vec::new();
        while !out.is_full() {
            let Ok(byte) = self.rx.pop() else { break };
            if out.push(byte).is_err() {
                break;
            }
        }
        out
    }

    pub fn rx_buffer_count(&self) -> usize {
        self.rx.len()
    }

    pub fn tx_buffer_count(&self) -> usize {
        self.tx.len()
    }

    pub fn tx_buffer_space(&self) -> usize {
        self.tx.free()
    }

    // ============================================================================================
    // Status
    // ============================================================================================

    pub fn session_state(&self) -> SessionState {
        SessionState::from_raw(self.session.load(Ordering::Acquire))
    }

    pub fn last_event(&self) -> Option<SlaveEvent> {
        SlaveEvent::from_raw(self.last_event.load(Ordering::Acquire))
    }

    /// Whether the current write session was opened by a general call
    pub fn general_call_active(&self) -> bool {
        self.general_call.load(Ordering::Relaxed)
    }

    /// Condition behind the last forced STOP, until the next `enable`
    pub fn link_error(&self) -> Option<LinkError> {
        LinkError::from_raw(self.link_error.load(Ordering::Acquire))
    }

    /// Read and clear the recorded link error
    pub fn take_link_error(&self) -> Option<LinkError> {
        LinkError::from_raw(self.link_error.swap(NO_ERROR, Ordering::AcqRel))
    }

    /// Received bytes lost to a full receive FIFO
    pub fn rx_dropped(&self) -> u16 {
        self.rx_dropped.load(Ordering::Relaxed)
    }

    /// Reads served with the sentinel because the transmit FIFO was empty
    pub fn tx_underruns(&self) -> u16 {
        self.tx_underruns.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.rx_dropped.store(0, Ordering::Relaxed);
        self.tx_underruns.store(0, Ordering::Relaxed);
    }

    pub fn status(&self) -> SlaveStatus {
        SlaveStatus {
            enabled: self.is_enabled(),
            address: self.address(),
            data_available: self.rx.has_data(),
            rx_buffer_count: self.rx.len(),
            tx_buffer_count: self.tx.len(),
            last_event: self.last_event(),
            error: self.link_error(),
        }
    }

    /// Register backend, mainly for diagnostics
    pub fn registers(&self) -> &R {
        &self.regs
    }
}

/// Saturating counter update. Only the interrupt handler increments, so a
/// plain load/store pair is enough.
fn bump(counter: &AtomicU16) {
    let value = counter.load(Ordering::Relaxed);
    counter.store(value.saturating_add(1), Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::tests::RecordingLogger;
    use crate::common::Level;
    use crate::i2c::registers::mock::MockTwi;
    use hex_literal::hex;

    type Slave<'a> = TwiSlave<MockTwi, &'a RecordingLogger, 8, 8>;

    /// One scripted bus event: raw status and, for receive events, the byte
    /// latched in the data register.
    #[derive(Copy, Clone)]
    struct BusEvent {
        status: u8,
        data: Option<u8>,
    }

    const fn ev(status: u8) -> BusEvent {
        BusEvent { status, data: None }
    }

    const fn rx(status: u8, data: u8) -> BusEvent {
        BusEvent {
            status,
            data: Some(data),
        }
    }

    /// Plays events through the interrupt entry point like the hardware would
    fn run_script(slave: &Slave<'_>, script: &[BusEvent]) -> Vec<Rearm> {
        script
            .iter()
            .map(|event| {
                let regs = slave.registers();
                regs.status.set(event.status);
                if let Some(byte) = event.data {
                    regs.data.set(byte);
                }
                slave.on_interrupt()
            })
            .collect()
    }

    fn enabled_slave(logger: &RecordingLogger) -> Slave<'_> {
        let slave = TwiSlave::new(MockTwi::new(), logger);
        slave.initialize_address(0x42).unwrap();
        slave.enable().unwrap();
        slave
    }

    #[test]
    fn test_initialize_leaves_interface_disabled() {
        let logger = RecordingLogger::default();
        let slave: Slave<'_> = TwiSlave::new(MockTwi::new(), &logger);

        slave.initialize_address(0x42).unwrap();

        let regs = slave.registers();
        assert_eq!(regs.own_address.get(), 0x84);
        assert_eq!(regs.last_control(), Some(CONTROL_INIT));
        assert!(!slave.is_enabled());
        assert_eq!(slave.address(), Some(0x42));
    }

    #[test]
    fn test_initialize_with_general_call() {
        let logger = RecordingLogger::default();
        let slave: Slave<'_> = TwiSlave::new(MockTwi::new(), &logger);

        let config = SlaveConfigBuilder::new(0x30)
            .general_call(true)
            .address_mask(0x01)
            .build();
        slave.initialize(config).unwrap();

        assert_eq!(slave.registers().own_address.get(), 0x61);
        assert_eq!(slave.registers().address_mask.get(), 0x02);
    }

    #[test]
    fn test_invalid_address_writes_nothing() {
        let logger = RecordingLogger::default();
        let slave: Slave<'_> = TwiSlave::new(MockTwi::new(), &logger);

        assert_eq!(slave.initialize_address(0x00), Err(Error::InvalidAddress(0)));
        assert!(slave.registers().control_writes.borrow().is_empty());
        assert_eq!(slave.address(), None);
        assert_eq!(slave.enable(), Err(Error::NotInitialized));
    }

    #[test]
    fn test_enable_arms_acknowledge() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        assert!(slave.is_enabled());
        assert_eq!(slave.registers().last_control(), Some(CONTROL_ARM_ACK));
        assert_eq!(slave.session_state(), SessionState::Idle);
    }

    #[test]
    fn test_master_write_fills_receive_buffer() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        let rearms = run_script(
            &slave,
            &[ev(0x60), rx(0x80, 0x11), rx(0x80, 0x22), rx(0x80, 0x33), ev(0xa0)],
        );

        assert!(rearms.iter().all(|r| *r == Rearm::Acknowledge));
        assert_eq!(slave.rx_buffer_count(), 3);
        assert_eq!(slave.receive(), 0x11);
        assert_eq!(slave.receive(), 0x22);
        assert_eq!(slave.receive(), 0x33);
        assert!(!slave.has_received_data());
        assert_eq!(slave.receive(), SENTINEL_BYTE);
        assert_eq!(slave.session_state(), SessionState::Idle);
        assert_eq!(slave.last_event(), Some(SlaveEvent::Stop));
    }

    #[test]
    fn test_single_received_byte() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        let rearm = run_script(&slave, &[rx(0x80, 0x5a)]);

        assert_eq!(rearm, vec![Rearm::Acknowledge]);
        assert!(slave.has_received_data());
        assert_eq!(slave.receive(), 0x5a);
    }

    #[test]
    fn test_general_call_receive() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        run_script(&slave, &[ev(0x70), rx(0x90, 0xa5)]);
        assert!(slave.general_call_active());
        assert_eq!(slave.session_state(), SessionState::ReceivingGeneralCall);
        assert_eq!(slave.receive(), 0xa5);

        run_script(&slave, &[ev(0xa0)]);
        assert!(!slave.general_call_active());
    }

    #[test]
    fn test_receive_overflow_drops_newest() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        let mut script = vec![ev(0x60)];
        script.extend((1..=9).map(|b| rx(0x80, b)));
        let rearms = run_script(&slave, &script);

        assert!(rearms.iter().all(|r| *r == Rearm::Acknowledge));
        assert_eq!(slave.rx_buffer_count(), 7);
        assert_eq!(slave.rx_dropped(), 2);
        assert_eq!(logger.count(Level::Warn), 2);

        let drained: heapless::Vec<u8, 16> = slave.drain_received();
        assert_eq!(drained.as_slice(), &hex!("01 02 03 04 05 06 07"));
    }

    #[test]
    fn test_master_read_takes_transmit_buffer() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);
        slave.write_all(&hex!("c0 ff ee")).unwrap();
        assert!(slave.has_pending_transmit());

        run_script(&slave, &[ev(0xa8), ev(0xb8), ev(0xb8)]);
        assert_eq!(
            slave.registers().data_writes.borrow().as_slice(),
            &hex!("c0 ff ee")
        );
        assert_eq!(slave.session_state(), SessionState::AddressedAsTransmitter);
        assert!(!slave.has_pending_transmit());

        run_script(&slave, &[ev(0xc0)]);
        assert_eq!(slave.session_state(), SessionState::Idle);
        assert_eq!(slave.last_event(), Some(SlaveEvent::ReadDone));
        assert_eq!(slave.tx_underruns(), 0);
    }

    #[test]
    fn test_transmit_underrun_sends_sentinel() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        let rearm = run_script(&slave, &[ev(0xa8)]);

        assert_eq!(rearm, vec![Rearm::Acknowledge]);
        assert_eq!(slave.registers().last_data(), Some(SENTINEL_BYTE));
        assert_eq!(slave.tx_underruns(), 1);
        assert_eq!(slave.last_event(), Some(SlaveEvent::ReadRequest));
    }

    #[test]
    fn test_read_past_queued_data() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);
        slave.transmit(0x01);

        run_script(&slave, &[ev(0xa8), ev(0xb8), ev(0xc0)]);
        assert_eq!(
            slave.registers().data_writes.borrow().as_slice(),
            &[0x01, SENTINEL_BYTE]
        );
    }

    #[test]
    fn test_transmit_overflow_is_silent() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        for byte in 0..7 {
            slave.transmit(byte);
        }
        assert_eq!(slave.tx_buffer_space(), 0);
        slave.transmit(0xff);
        assert_eq!(slave.tx_buffer_count(), 7);
        assert_eq!(slave.try_transmit(0xff), Err(nb::Error::WouldBlock));

        run_script(&slave, &[ev(0xa8)]);
        assert_eq!(slave.registers().last_data(), Some(0x00));
    }

    #[test]
    fn test_clear_transmit_recovers_desync() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);
        slave.write_all(&hex!("01 02 03")).unwrap();

        // master only reads one byte of the three
        run_script(&slave, &[ev(0xa8), ev(0xc0)]);
        assert!(slave.has_pending_transmit());

        slave.clear_transmit();
        assert!(!slave.has_pending_transmit());
        slave.transmit(0x77);
        run_script(&slave, &[ev(0xa8)]);
        assert_eq!(slave.registers().last_data(), Some(0x77));
    }

    #[test]
    fn test_bus_error_forces_stop_without_touching_buffers() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);
        slave.stuff_receive(0x10);
        slave.transmit(0x20);

        let rearm = run_script(&slave, &[ev(0x00)]);

        assert_eq!(rearm, vec![Rearm::ForceStop]);
        assert_eq!(slave.registers().last_control(), Some(CONTROL_FORCE_STOP));
        assert_eq!(slave.session_state(), SessionState::Error);
        assert_eq!(slave.link_error(), Some(LinkError::BusError));
        assert!(!slave.is_enabled());
        assert_eq!(slave.rx_buffer_count(), 1);
        assert_eq!(slave.tx_buffer_count(), 1);
        assert_eq!(logger.count(Level::Error), 1);
    }

    #[test]
    fn test_every_error_class_forces_stop() {
        let cases = [
            (rx(0x88, 0x99), LinkError::DataNack),
            (rx(0x98, 0x99), LinkError::GeneralCallDataNack),
            (ev(0xc8), LinkError::LastByteAcked),
            (ev(0xf8), LinkError::NoState),
            (ev(0x00), LinkError::BusError),
        ];
        for (event, expected) in cases {
            let logger = RecordingLogger::default();
            let slave = enabled_slave(&logger);

            assert_eq!(run_script(&slave, &[event]), vec![Rearm::ForceStop]);
            assert_eq!(slave.link_error(), Some(expected));
            assert!(!slave.has_received_data());
        }
    }

    #[test]
    fn test_error_state_is_sticky_until_enable() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        run_script(&slave, &[ev(0xf8)]);
        assert_eq!(slave.try_receive(), Err(nb::Error::Other(Error::Link(LinkError::NoState))));
        assert_eq!(slave.receive(), SENTINEL_BYTE);

        slave.enable().unwrap();
        assert_eq!(slave.link_error(), None);
        assert_eq!(slave.session_state(), SessionState::Idle);
        assert_eq!(slave.try_receive(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn test_take_link_error_clears_it() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        run_script(&slave, &[ev(0x00)]);
        assert_eq!(slave.take_link_error(), Some(LinkError::BusError));
        assert_eq!(slave.take_link_error(), None);
        assert_eq!(slave.status().error, None);
    }

    #[test]
    fn test_try_receive_distinguishes_sentinel_value() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        run_script(&slave, &[ev(0x60), rx(0x80, SENTINEL_BYTE)]);
        assert_eq!(slave.try_receive(), Ok(SENTINEL_BYTE));
        assert_eq!(slave.try_receive(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn test_unknown_status_rearms() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);
        run_script(&slave, &[ev(0x60)]);

        // a master-mode code never seen by a pure slave
        let rearm = run_script(&slave, &[ev(0x08)]);

        assert_eq!(rearm, vec![Rearm::Acknowledge]);
        assert_eq!(slave.registers().last_control(), Some(CONTROL_ARM_ACK));
        assert_eq!(slave.session_state(), SessionState::AddressedAsReceiver);
        assert!(slave.is_enabled());
        assert!(logger.contains("0x08"));
    }

    #[test]
    fn test_arbitration_lost_addressing() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);
        slave.transmit(0x3c);

        run_script(&slave, &[ev(0x68)]);
        assert_eq!(slave.session_state(), SessionState::AddressedAsReceiver);

        run_script(&slave, &[ev(0x78)]);
        assert!(slave.general_call_active());

        run_script(&slave, &[ev(0xb0)]);
        assert_eq!(slave.registers().last_data(), Some(0x3c));
        assert_eq!(slave.session_state(), SessionState::AddressedAsTransmitter);
    }

    #[test]
    fn test_prescaler_bits_are_ignored() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        run_script(&slave, &[rx(0x83, 0x44)]);
        assert_eq!(slave.receive(), 0x44);
    }

    #[test]
    fn test_write_then_read_exchange() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        // master writes a command, then reads the reply after a repeated start
        run_script(&slave, &[ev(0x60), rx(0x80, 0x04), ev(0xa0)]);
        let cmd = slave.receive();
        slave.write_all(&[cmd, 0x01, 0x02]).unwrap();
        run_script(&slave, &[ev(0xa8), ev(0xb8), ev(0xb8), ev(0xc0)]);

        assert_eq!(
            slave.registers().data_writes.borrow().as_slice(),
            &hex!("04 01 02")
        );
        assert!(!slave.has_pending_transmit());
    }

    #[test]
    fn test_read_into_and_status() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);
        for byte in hex!("0a 0b 0c 0d") {
            assert!(slave.stuff_receive(byte));
        }
        slave.transmit(0x01);

        let status = slave.status();
        assert!(status.enabled);
        assert_eq!(status.address, Some(0x42));
        assert!(status.data_available);
        assert_eq!(status.rx_buffer_count, 4);
        assert_eq!(status.tx_buffer_count, 1);

        let mut buf = [0u8; 3];
        assert_eq!(slave.read_into(&mut buf), 3);
        assert_eq!(buf, hex!("0a 0b 0c"));
        assert_eq!(slave.read_into(&mut buf), 1);
        assert_eq!(buf[0], 0x0d);
    }

    #[test]
    fn test_drain_leaves_backlog() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);
        for byte in 1..=5 {
            slave.stuff_receive(byte);
        }

        let first: heapless::Vec<u8, 2> = slave.drain_received();
        assert_eq!(first.as_slice(), &[1, 2]);
        assert_eq!(slave.rx_buffer_count(), 3);
    }

    #[test]
    fn test_stuff_receive_reports_overflow() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);
        for byte in 0..7 {
            assert!(slave.stuff_receive(byte));
        }
        assert!(!slave.stuff_receive(0xee));
        assert_eq!(slave.receive(), 0);
    }

    #[test]
    fn test_flush_and_counters() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);
        slave.stuff_receive(0x01);
        slave.transmit(0x02);
        run_script(&slave, &[ev(0xa8), ev(0xb8)]);
        assert_eq!(slave.tx_underruns(), 1);

        slave.flush();
        assert!(!slave.has_received_data());
        assert!(!slave.has_pending_transmit());

        slave.reset_counters();
        assert_eq!(slave.tx_underruns(), 0);
        assert_eq!(slave.rx_dropped(), 0);
    }

    #[test]
    fn test_disable_stops_acknowledging() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);

        slave.disable();
        assert!(!slave.is_enabled());
        assert_eq!(slave.registers().last_control(), Some(CONTROL_INIT));

        slave.enable().unwrap();
        assert_eq!(slave.registers().last_control(), Some(CONTROL_ARM_ACK));
    }

    /// Stateless backend that is `Sync`, for tests sharing a driver across threads
    struct NullRegs;

    impl TwiRegisters for NullRegs {
        fn write_own_address(&self, _: u8) {}
        fn write_address_mask(&self, _: u8) {}
        fn write_control(&self, _: u8) {}
        fn read_data(&self) -> u8 {
            0
        }
        fn write_data(&self, _: u8) {}
        fn read_status(&self) -> u8 {
            0xf8
        }
    }

    #[test]
    fn test_handle_event_uses_supplied_byte() {
        let logger = RecordingLogger::default();
        let slave = enabled_slave(&logger);
        slave.registers().data.set(0x00);

        slave.handle_event(TwiStatus::OwnWriteAddressed, None);
        slave.handle_event(TwiStatus::DataReceivedAck, Some(0x5a));
        slave.handle_event(TwiStatus::GeneralDataReceivedAck, Some(0xa5));
        slave.handle_event(TwiStatus::DataReceivedAck, None);

        let drained: heapless::Vec<u8, 8> = slave.drain_received();
        assert_eq!(drained.as_slice(), &hex!("5a a5 00"));
    }

    #[test]
    fn test_fault_raised_during_take_is_kept() {
        use std::sync::atomic::{AtomicBool, Ordering as StdOrdering};

        const FAULTS: usize = 200;
        let slave: TwiSlave<NullRegs> = TwiSlave::new(NullRegs, NoOpLogger);
        slave.initialize_address(0x42).unwrap();
        slave.enable().unwrap();
        let isr_done = AtomicBool::new(false);

        let taken = std::thread::scope(|scope| {
            let isr = scope.spawn(|| {
                for _ in 0..FAULTS {
                    // a new fault only once the previous one has been taken
                    while slave.link_error().is_some() {
                        std::thread::yield_now();
                    }
                    slave.handle_event(TwiStatus::BusError, None);
                }
                isr_done.store(true, StdOrdering::Release);
            });

            let mut taken = 0;
            loop {
                let finished = isr_done.load(StdOrdering::Acquire);
                if slave.take_link_error().is_some() {
                    taken += 1;
                } else if finished {
                    break;
                } else {
                    std::thread::yield_now();
                }
            }
            isr.join().unwrap();
            taken
        });

        assert_eq!(taken, FAULTS);
        assert_eq!(slave.session_state(), SessionState::Error);
    }

    #[test]
    fn test_driver_is_sync_with_sync_registers() {
        fn assert_sync<T: Sync>() {}

        assert_sync::<TwiSlave<NullRegs>>();
        static SLAVE: TwiSlave<NullRegs> = TwiSlave::new(NullRegs, NoOpLogger);
        assert_eq!(SLAVE.receive(), SENTINEL_BYTE);
    }
}
