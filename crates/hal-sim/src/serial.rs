//! An in-process loopback serial console: bytes a test pushes via
//! [`SimSerialPort::feed_input`] are what `read_byte` sees; bytes the
//! controller writes accumulate for later inspection with
//! [`SimSerialPort::take_output`].

use std::collections::VecDeque;

use hal::SerialPort;

#[derive(Debug, Default)]
pub struct SimSerialPort {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl SimSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_input(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.tx)
    }
}

impl SerialPort for SimSerialPort {
    type Error = core::convert::Infallible;

    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        Ok(self.rx.pop_front())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.tx.push(byte);
        Ok(())
    }
}
