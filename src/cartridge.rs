use crate::common::*;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PRG_BANK_SIZE: usize = 0x4000;
pub const CHR_BANK_SIZE: usize = 0x2000;

const HEADER_SIZE: usize = 0x10;
const TRAINER_SIZE: usize = 0x200;

/// Reasons a ROM image cannot be turned into a running cartridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
  /// The first four bytes are not `NES\x1A`.
  BadMagic,
  /// The image is shorter than the header-declared layout.
  Truncated { expected: usize, actual: usize },
  /// The header declares zero 16KB PRG-ROM banks.
  NoPrgBanks,
  /// The mapper id is outside the supported set.
  UnsupportedMapper(u8),
  /// The image is flagged PAL; only NTSC timing is implemented.
  UnsupportedTvSystem,
}

impl fmt::Display for LoadError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LoadError::BadMagic => write!(f, "not an iNES image (missing NES\\x1A magic)"),
      LoadError::Truncated { expected, actual } => write!(
        f,
        "ROM image truncated: header promises {} bytes, got {}",
        expected, actual
      ),
      LoadError::NoPrgBanks => write!(f, "header declares zero PRG-ROM banks"),
      LoadError::UnsupportedMapper(id) => write!(f, "mapper {} is not supported", id),
      LoadError::UnsupportedTvSystem => write!(f, "PAL-only image, NTSC timing is required"),
    }
  }
}

impl std::error::Error for LoadError {}

#[derive(Serialize, Deserialize, Clone)]
pub struct Cartridge {
  #[serde(with = "serde_bytes")]
  prg_rom: Vec<Byte>,
  #[serde(with = "serde_bytes")]
  chr_rom: Vec<Byte>,
  name_table_mirroring: Byte,
  mapper_number: Byte,
  battery: bool,
}

impl Cartridge {
  /// Parses an iNES / NES 2.0 image. All sizes are validated against the
  /// byte count before anything is copied.
  pub fn load(data: &[u8]) -> Result<Self, LoadError> {
    if data.len() < HEADER_SIZE {
      return Err(LoadError::Truncated {
        expected: HEADER_SIZE,
        actual: data.len(),
      });
    }
    let header = &data[..HEADER_SIZE];
    if &header[0..4] != b"NES\x1A" {
      return Err(LoadError::BadMagic);
    }
    let mut banks = header[4] as usize;
    let mut vbanks = header[5] as usize;
    // Four-screen wiring wins over the horizontal/vertical bit.
    let name_table_mirroring = if bit_eq(header[6], 0x8) {
      0x8
    } else {
      header[6] & 0x1
    };
    let mapper_number = ((header[6] >> 4) & 0xF) | (header[7] & 0xF0);
    let battery = bit_eq(header[6], 0x2);
    let has_trainer = bit_eq(header[6], 0x4);

    if (header[7] & 0x0C) == 0x08 {
      info!("NES 2.0 image, submapper {}", header[8] >> 4);
      if header[8] & 0x0F != 0 {
        // Mapper ids above 255 cannot belong to the supported set.
        return Err(LoadError::UnsupportedMapper(mapper_number));
      }
      // Byte 9 extends the bank counts to 12 bits each.
      banks |= ((header[9] & 0x0F) as usize) << 8;
      vbanks |= ((header[9] >> 4) as usize) << 8;
    }
    if banks == 0 {
      return Err(LoadError::NoPrgBanks);
    }
    if header[0xA] & 0x3 != 0 {
      return Err(LoadError::UnsupportedTvSystem);
    }

    let trainer_size = if has_trainer { TRAINER_SIZE } else { 0 };
    let prg_size = banks * PRG_BANK_SIZE;
    let chr_size = vbanks * CHR_BANK_SIZE;
    let expected = HEADER_SIZE + trainer_size + prg_size + chr_size;
    if data.len() < expected {
      return Err(LoadError::Truncated {
        expected,
        actual: data.len(),
      });
    }

    let prg_start = HEADER_SIZE + trainer_size;
    let chr_start = prg_start + prg_size;
    let prg_rom = data[prg_start..chr_start].to_vec();
    let chr_rom = data[chr_start..chr_start + chr_size].to_vec();

    info!(
      "16KB PRG-ROM banks: {}, 8KB CHR-ROM banks: {}",
      banks, vbanks
    );
    info!(
      "Name table mirroring: {}, mapper: {}, battery: {}",
      name_table_mirroring, mapper_number, battery
    );
    if has_trainer {
      warn!("512-byte trainer present, skipped");
    }
    if vbanks == 0 {
      info!("Cartridge with CHR-RAM");
    }

    Ok(Self {
      prg_rom,
      chr_rom,
      name_table_mirroring,
      mapper_number,
      battery,
    })
  }

  pub fn get_rom(&self) -> &Vec<Byte> {
    &self.prg_rom
  }

  pub fn get_vrom(&self) -> &Vec<Byte> {
    &self.chr_rom
  }

  pub fn get_mapper(&self) -> Byte {
    self.mapper_number
  }

  pub fn get_name_table_mirroring(&self) -> Byte {
    self.name_table_mirroring
  }

  pub fn has_battery(&self) -> bool {
    self.battery
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn image(banks: u8, vbanks: u8, flags6: u8, flags7: u8) -> Vec<u8> {
    let mut data = vec![0u8; HEADER_SIZE];
    data[0..4].copy_from_slice(b"NES\x1A");
    data[4] = banks;
    data[5] = vbanks;
    data[6] = flags6;
    data[7] = flags7;
    data.resize(
      HEADER_SIZE + banks as usize * PRG_BANK_SIZE + vbanks as usize * CHR_BANK_SIZE,
      0,
    );
    data
  }

  #[test]
  fn rejects_bad_magic() {
    let mut data = image(1, 1, 0, 0);
    data[0] = b'M';
    assert!(matches!(Cartridge::load(&data), Err(LoadError::BadMagic)));
  }

  #[test]
  fn rejects_zero_prg_banks() {
    let data = image(0, 1, 0, 0);
    assert!(matches!(Cartridge::load(&data), Err(LoadError::NoPrgBanks)));
  }

  #[test]
  fn rejects_truncated_image() {
    let mut data = image(2, 1, 0, 0);
    data.truncate(data.len() - 1);
    match Cartridge::load(&data) {
      Err(LoadError::Truncated { expected, actual }) => {
        assert_eq!(expected, HEADER_SIZE + 2 * PRG_BANK_SIZE + CHR_BANK_SIZE);
        assert_eq!(actual, expected - 1);
      }
      other => panic!("expected Truncated, got {:?}", other.err()),
    }
  }

  #[test]
  fn rejects_pal_image() {
    let mut data = image(1, 1, 0, 0);
    data[0xA] = 0x1;
    assert!(matches!(
      Cartridge::load(&data),
      Err(LoadError::UnsupportedTvSystem)
    ));
  }

  #[test]
  fn parses_header_fields() {
    let cart = Cartridge::load(&image(2, 1, 0x13, 0x40)).unwrap();
    assert_eq!(cart.get_mapper(), 0x41);
    assert_eq!(cart.get_name_table_mirroring(), 0x1);
    assert!(cart.has_battery());
    assert_eq!(cart.get_rom().len(), 2 * PRG_BANK_SIZE);
    assert_eq!(cart.get_vrom().len(), CHR_BANK_SIZE);
  }

  #[test]
  fn nes2_size_high_bits_extend_the_layout() {
    let mut data = image(1, 1, 0, 0x08);
    data[9] = 0x10; // CHR bank count becomes 0x101
    match Cartridge::load(&data) {
      Err(LoadError::Truncated { expected, .. }) => {
        assert_eq!(expected, HEADER_SIZE + PRG_BANK_SIZE + 0x101 * CHR_BANK_SIZE);
      }
      other => panic!("expected Truncated, got {:?}", other.err()),
    }
  }

  #[test]
  fn chr_ram_image_has_empty_vrom() {
    let cart = Cartridge::load(&image(1, 0, 0, 0)).unwrap();
    assert!(cart.get_vrom().is_empty());
  }

  #[test]
  fn trainer_is_skipped() {
    let mut data = image(1, 0, 0x4, 0);
    data.splice(HEADER_SIZE..HEADER_SIZE, std::iter::repeat(0xAA).take(TRAINER_SIZE));
    data[HEADER_SIZE + TRAINER_SIZE] = 0x55;
    let cart = Cartridge::load(&data).unwrap();
    assert_eq!(cart.get_rom()[0], 0x55);
  }
}
