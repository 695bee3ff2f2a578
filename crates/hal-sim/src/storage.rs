//! An in-memory stand-in for the settings EEPROM/flash page.

use hal::NonVolatileStorage;

#[derive(Debug, Clone)]
pub struct SimStorage {
    bytes: Vec<u8>,
}

impl SimStorage {
    pub fn new(capacity: usize) -> Self {
        SimStorage { bytes: vec![0u8; capacity] }
    }

    /// Simulates a torn write or erased page by corrupting the byte at
    /// `offset`, for exercising the settings store's fault-recovery path.
    pub fn corrupt_byte(&mut self, offset: usize) {
        if let Some(b) = self.bytes.get_mut(offset) {
            *b ^= 0xFF;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageFault;

impl NonVolatileStorage for SimStorage {
    type Error = StorageFault;

    fn store(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.bytes.len() < offset + bytes.len() {
            self.bytes.resize(offset + bytes.len(), 0);
        }
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn fetch(&mut self, offset: usize, bytes: &mut [u8]) -> Result<(), Self::Error> {
        if self.bytes.len() < offset + bytes.len() {
            return Err(StorageFault);
        }
        bytes.copy_from_slice(&self.bytes[offset..offset + bytes.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_settings_record() {
        let mut storage = SimStorage::new(64);
        let record = settings::SettingsRecord::default();
        record.store(&mut storage).unwrap();
        let (loaded, fault) = settings::SettingsRecord::load(&mut storage);
        assert!(fault.is_none());
        assert_eq!(loaded, record);
    }
}
