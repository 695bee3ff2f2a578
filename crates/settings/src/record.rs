//! The persisted settings record and its `$n=v` edit protocol.

use core::fmt::Write as _;

use crate::crc::crc8_ibutton;
use crate::error::{SettingsError, StoreFault};
use hal::NonVolatileStorage;

/// Magic value prefixed to the persisted record, matching the upstream
/// firmware's EEPROM layout so a settings dump format migrated from that
/// firmware stays byte-compatible.
pub const SETTINGS_SIGNATURE: u16 = 0x9761;

/// Size of the persisted payload (without signature/CRC framing): three
/// `f32` steps/mm, one `u8` pulse width, three `f32`s, one `u16` invert
/// mask, one `f32` junction deviation.
const PAYLOAD_LEN: usize = 4 * 3 + 1 + 4 * 3 + 2 + 4;
const RECORD_LEN: usize = 2 + PAYLOAD_LEN + 1;

/// All user-tunable parameters of the motion-control core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsRecord {
    pub steps_per_mm: [f32; 3],
    pub pulse_microseconds: u8,
    pub default_seek_rate: f32,
    pub mm_per_arc_segment: f32,
    pub invert_mask: u16,
    /// mm/min², the internal unit; entered and reported in mm/sec².
    pub acceleration: f32,
    pub junction_deviation: f32,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        SettingsRecord {
            steps_per_mm: [200.0, 200.0, 200.0],
            pulse_microseconds: 50,
            default_seek_rate: 600.0,
            mm_per_arc_segment: 0.1,
            invert_mask: 0x0000,
            acceleration: 60.0 * 60.0 * 60.0 / 10.0,
            junction_deviation: 0.05,
        }
    }
}

impl SettingsRecord {
    fn to_payload(&self) -> [u8; PAYLOAD_LEN] {
        let mut buf = [0u8; PAYLOAD_LEN];
        let mut offset = 0;
        for axis in self.steps_per_mm {
            buf[offset..offset + 4].copy_from_slice(&axis.to_le_bytes());
            offset += 4;
        }
        buf[offset] = self.pulse_microseconds;
        offset += 1;
        buf[offset..offset + 4].copy_from_slice(&self.default_seek_rate.to_le_bytes());
        offset += 4;
        buf[offset..offset + 4].copy_from_slice(&self.mm_per_arc_segment.to_le_bytes());
        offset += 4;
        buf[offset..offset + 2].copy_from_slice(&self.invert_mask.to_le_bytes());
        offset += 2;
        buf[offset..offset + 4].copy_from_slice(&self.acceleration.to_le_bytes());
        offset += 4;
        buf[offset..offset + 4].copy_from_slice(&self.junction_deviation.to_le_bytes());
        buf
    }

    fn from_payload(buf: &[u8; PAYLOAD_LEN]) -> Self {
        let mut offset = 0;
        let mut steps_per_mm = [0.0f32; 3];
        for axis in steps_per_mm.iter_mut() {
            *axis = f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
            offset += 4;
        }
        let pulse_microseconds = buf[offset];
        offset += 1;
        let default_seek_rate = f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let mm_per_arc_segment = f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let invert_mask = u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap());
        offset += 2;
        let acceleration = f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let junction_deviation = f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
        SettingsRecord {
            steps_per_mm,
            pulse_microseconds,
            default_seek_rate,
            mm_per_arc_segment,
            invert_mask,
            acceleration,
            junction_deviation,
        }
    }

    /// Serializes to the full `signature | payload | crc8` wire layout.
    pub fn to_record_bytes(&self) -> [u8; RECORD_LEN] {
        let mut record = [0u8; RECORD_LEN];
        record[0..2].copy_from_slice(&SETTINGS_SIGNATURE.to_le_bytes());
        let payload = self.to_payload();
        record[2..2 + PAYLOAD_LEN].copy_from_slice(&payload);
        record[2 + PAYLOAD_LEN] = crc8_ibutton(&payload);
        record
    }

    /// Validates signature and checksum, returning the decoded record.
    pub fn from_record_bytes(record: &[u8]) -> Result<Self, StoreFault> {
        if record.len() != RECORD_LEN {
            return Err(StoreFault::SignatureMismatch);
        }
        let signature = u16::from_le_bytes([record[0], record[1]]);
        if signature != SETTINGS_SIGNATURE {
            return Err(StoreFault::SignatureMismatch);
        }
        let payload: [u8; PAYLOAD_LEN] = record[2..2 + PAYLOAD_LEN].try_into().unwrap();
        let crc = record[2 + PAYLOAD_LEN];
        if crc8_ibutton(&payload) != crc {
            return Err(StoreFault::ChecksumMismatch);
        }
        Ok(Self::from_payload(&payload))
    }

    /// Loads the record from `storage`, falling back to (and re-persisting)
    /// [`Self::default`] on any signature/CRC/IO fault.
    pub fn load<S: NonVolatileStorage>(storage: &mut S) -> (Self, Option<StoreFault>) {
        let mut buf = [0u8; RECORD_LEN];
        if storage.fetch(0, &mut buf).is_err() {
            let defaults = Self::default();
            let _ = storage.store(0, &defaults.to_record_bytes());
            return (defaults, Some(StoreFault::Io));
        }
        match Self::from_record_bytes(&buf) {
            Ok(record) => (record, None),
            Err(fault) => {
                let defaults = Self::default();
                let _ = storage.store(0, &defaults.to_record_bytes());
                (defaults, Some(fault))
            }
        }
    }

    /// Persists the record via whole-record overwrite.
    pub fn store<S: NonVolatileStorage>(&self, storage: &mut S) -> Result<(), StoreFault> {
        storage
            .store(0, &self.to_record_bytes())
            .map_err(|_| StoreFault::Io)
    }

    /// Applies a `$n=v` edit. Rejected values leave `self` untouched.
    pub fn set_parameter(&mut self, parameter: u32, value: f32) -> Result<(), SettingsError> {
        match parameter {
            0 | 1 | 2 => {
                if value <= 0.0 {
                    return Err(SettingsError::StepsPerMmMustBePositive);
                }
                self.steps_per_mm[parameter as usize] = value;
            }
            3 => {
                if value < 3.0 {
                    return Err(SettingsError::StepPulseTooShort);
                }
                self.pulse_microseconds = libm_round(value) as u8;
            }
            4 => self.default_seek_rate = value,
            5 => self.mm_per_arc_segment = value,
            6 => self.invert_mask = value as u16,
            7 => self.acceleration = value * 3600.0,
            8 => self.junction_deviation = value.abs(),
            _ => return Err(SettingsError::UnknownParameter),
        }
        Ok(())
    }

    /// Renders the `$`-dump text, one line per parameter, matching the
    /// upstream console format.
    pub fn dump(&self) -> heapless::String<512> {
        let mut out = heapless::String::new();
        let _ = write!(
            out,
            "$0 = {:.4} (steps/mm x)\r\n$1 = {:.4} (steps/mm y)\r\n$2 = {:.4} (steps/mm z)\r\n",
            self.steps_per_mm[0], self.steps_per_mm[1], self.steps_per_mm[2]
        );
        let _ = write!(
            out,
            "$3 = {} (microseconds step pulse)\r\n$4 = {:.2} (mm/min default seek rate)\r\n",
            self.pulse_microseconds, self.default_seek_rate
        );
        let _ = write!(
            out,
            "$5 = {:.4} (mm/arc segment)\r\n$6 = {} (GPIO port invert mask)\r\n",
            self.mm_per_arc_segment, self.invert_mask
        );
        let _ = write!(
            out,
            "$7 = {:.2} (acceleration in mm/sec^2)\r\n$8 = {:.4} (cornering junction deviation in mm)\r\n",
            self.acceleration / 3600.0,
            self.junction_deviation
        );
        let _ = write!(out, "'$x=value' to set parameter or just '$' to dump current settings\r\n");
        out
    }
}

fn libm_round(x: f32) -> f32 {
    #[cfg(feature = "std")]
    {
        x.round()
    }
    #[cfg(not(feature = "std"))]
    {
        libm::roundf(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemoryStore(Vec<u8>);
    impl NonVolatileStorage for MemoryStore {
        type Error = ();
        fn store(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
            if self.0.len() < offset + data.len() {
                self.0.resize(offset + data.len(), 0);
            }
            self.0[offset..offset + data.len()].copy_from_slice(data);
            Ok(())
        }
        fn fetch(&mut self, offset: usize, data: &mut [u8]) -> Result<(), Self::Error> {
            if self.0.len() < offset + data.len() {
                return Err(());
            }
            data.copy_from_slice(&self.0[offset..offset + data.len()]);
            Ok(())
        }
    }

    #[test]
    fn round_trip_through_storage() {
        let mut store = MemoryStore(vec![0u8; 64]);
        let original = SettingsRecord {
            steps_per_mm: [320.0, 320.0, 400.0],
            ..Default::default()
        };
        original.store(&mut store).unwrap();
        let (loaded, fault) = SettingsRecord::load(&mut store);
        assert!(fault.is_none());
        assert_eq!(loaded, original);
    }

    #[test]
    fn corrupted_payload_falls_back_to_defaults() {
        let mut store = MemoryStore(vec![0u8; 64]);
        SettingsRecord::default().store(&mut store).unwrap();
        store.0[5] ^= 0xFF; // Corrupt one payload byte without touching the CRC.
        let (loaded, fault) = SettingsRecord::load(&mut store);
        assert_eq!(fault, Some(StoreFault::ChecksumMismatch));
        assert_eq!(loaded, SettingsRecord::default());
    }

    #[test]
    fn negative_steps_per_mm_is_rejected() {
        let mut record = SettingsRecord::default();
        let err = record.set_parameter(0, -5.0).unwrap_err();
        assert_eq!(err, SettingsError::StepsPerMmMustBePositive);
        assert_eq!(record, SettingsRecord::default());
    }

    #[test]
    fn short_pulse_width_is_rejected() {
        let mut record = SettingsRecord::default();
        assert_eq!(
            record.set_parameter(3, 1.0).unwrap_err(),
            SettingsError::StepPulseTooShort
        );
    }

    #[test]
    fn acceleration_round_trips_through_mm_per_sec2() {
        let mut record = SettingsRecord::default();
        record.set_parameter(7, 10.0).unwrap();
        assert!((record.acceleration - 36_000.0).abs() < 1e-3);
    }
}
