//! Drive a daisy-chained string of latched shift registers (74HC595 and
//! friends) through three output pins: serial data, serial clock and latch.
//!
//! Bytes are shifted out in buffer order, each byte least significant bit
//! first. Every transmission fills all active outputs, padding with zeros,
//! and ends with a single latch pulse.
#![cfg_attr(not(test), no_std)]
use embedded_hal::digital::{OutputPin, PinState};

/// Longest chain a channel will drive, in bits.
pub const MAX_SERIAL_BITS: usize = 1024;

const BITS_IN_BYTE: usize = 8;

/// Direction of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Driven output.
    Output,
    /// Non-driving, high-impedance input.
    Input,
}

/// A pin whose direction can be changed at run time.
pub trait ModePin {
    fn set_mode(&mut self, mode: PinMode);
}

/// The three pins wired to the first register of the chain.
pub struct PinSet<C, D, L> {
    /// Shift register clock (SRCLK), data is sampled on its rising edge.
    pub serial_clock: C,
    /// Serial data (SER).
    pub serial_data: D,
    /// Storage register clock (RCLK).
    pub latch_clock: L,
}

/// A chain of latched shift registers and the pins that drive it.
///
/// Dropping the channel clears the chain and leaves all three pins as inputs.
pub struct Channel<C, D, L>
where
    C: OutputPin + ModePin,
    D: OutputPin + ModePin,
    L: OutputPin + ModePin,
{
    pins: PinSet<C, D, L>,
    total_outputs: usize,
    active_outputs: usize,
}

impl<C, D, L> Channel<C, D, L>
where
    C: OutputPin + ModePin,
    D: OutputPin + ModePin,
    L: OutputPin + ModePin,
{
    /// Claim the pins as outputs and clear the whole chain.
    ///
    /// `bits` is the physical length of the chain. Anything above
    /// [`MAX_SERIAL_BITS`] is clamped. All outputs start active.
    pub fn new(pins: PinSet<C, D, L>, bits: usize) -> Self {
        let total_outputs = bits.min(MAX_SERIAL_BITS);
        let mut channel = Self {
            pins,
            total_outputs,
            active_outputs: total_outputs,
        };
        #[cfg(feature = "defmt")]
        defmt::debug!("shift channel: {} outputs", total_outputs);
        channel.claim_pins();
        channel.clear_shift_register();
        channel
    }

    /// Physical length of the chain.
    pub fn total_outputs(&self) -> usize {
        self.total_outputs
    }

    /// Number of outputs driven by [`Channel::transmit`].
    pub fn active_outputs(&self) -> usize {
        self.active_outputs
    }

    /// Change how many outputs future transmissions drive.
    ///
    /// Clamped to [`Channel::total_outputs`]. Outputs past the active window
    /// keep whatever was last shifted into them.
    pub fn set_active_outputs(&mut self, count: usize) {
        self.active_outputs = count.min(self.total_outputs);
        #[cfg(feature = "defmt")]
        defmt::trace!("shift channel: {} active outputs", self.active_outputs);
    }

    /// Shift out the first `bits` bits of `data` and latch them.
    ///
    /// `bits` is clamped to the active outputs and to the length of `data`.
    /// The remaining active outputs are padded with zeros.
    pub fn transmit(&mut self, data: &[u8], bits: usize) {
        let bits = bits
            .min(self.active_outputs)
            .min(data.len().saturating_mul(BITS_IN_BYTE));
        self.send_bytes(data, bits);
        self.send_zeros(self.active_outputs - bits);
        self.latch();
    }

    fn send_bytes(&mut self, data: &[u8], bits: usize) {
        let whole = bits / BITS_IN_BYTE;
        for &byte in &data[..whole] {
            self.send_byte(byte, BITS_IN_BYTE);
        }
        let rest = bits % BITS_IN_BYTE;
        if rest > 0 {
            if let Some(&byte) = data.get(whole) {
                self.send_byte(byte, rest);
            }
        }
    }

    fn send_byte(&mut self, mut byte: u8, bits: usize) {
        for _ in 0..bits.min(BITS_IN_BYTE) {
            self.send_bit(byte & 1 == 1);
            byte >>= 1;
        }
    }

    fn send_zeros(&mut self, count: usize) {
        for _ in 0..count {
            self.send_bit(false);
        }
    }

    fn send_bit(&mut self, high: bool) {
        let _ = self.pins.serial_data.set_state(PinState::from(high));
        let _ = self.pins.serial_clock.set_high();
        let _ = self.pins.serial_clock.set_low();
    }

    fn latch(&mut self) {
        let _ = self.pins.latch_clock.set_high();
        let _ = self.pins.latch_clock.set_low();
    }

    /// Zero every physical output, inactive ones included.
    fn clear_shift_register(&mut self) {
        self.send_zeros(self.total_outputs);
        self.latch();
    }

    fn claim_pins(&mut self) {
        self.pins.serial_clock.set_mode(PinMode::Output);
        self.pins.serial_data.set_mode(PinMode::Output);
        self.pins.latch_clock.set_mode(PinMode::Output);
        let _ = self.pins.serial_clock.set_low();
        let _ = self.pins.serial_data.set_low();
        let _ = self.pins.latch_clock.set_low();
    }

    fn release_pins(&mut self) {
        self.pins.serial_clock.set_mode(PinMode::Input);
        self.pins.serial_data.set_mode(PinMode::Input);
        self.pins.latch_clock.set_mode(PinMode::Input);
    }
}

impl<C, D, L> Drop for Channel<C, D, L>
where
    C: OutputPin + ModePin,
    D: OutputPin + ModePin,
    L: OutputPin + ModePin,
{
    fn drop(&mut self) {
        self.clear_shift_register();
        self.release_pins();
        #[cfg(feature = "defmt")]
        defmt::debug!("shift channel: released");
    }
}
