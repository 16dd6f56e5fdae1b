/*
cfbio library
Copyright (C) 2018 Steve Muller <steve.muller@outlook.com>

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/

use std::io::{Read, Seek};
use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;
use crate::defect::{self, DefectKind, DefectPolicy, Severity};
use crate::error::Result;
use crate::io::Reader;
use super::structures::{sector_position, HEADER_DIFAT_ENTRIES, HEADER_DIFAT_OFFSET, HEADER_SIZE, SIGNATURE};

/// Sector shifts outside this range would overflow the sector arithmetic or make no sense at all.
const SECTOR_SHIFT_RANGE: std::ops::RangeInclusive<u16> = 7..=16;

/// The header of a CFBF file, including the first 109 FAT sector locations.
#[derive(Clone, Debug)]
pub struct Header {
	pub signature: [u8; 8],
	pub clsid: [u8; 16],
	pub minor_version: u16,
	pub major_version: u16,
	pub byte_order: u16,
	pub sector_shift: u16,
	pub sector_size: u64, // virtual field; not actually contained in CFBF file
	pub mini_sector_shift: u16,
	pub mini_sector_size: u64, // virtual field; not actually contained in CFBF file
	pub number_of_directory_sectors: u32,
	pub number_of_fat_sectors: u32,
	pub directory_sector_start: u32,
	pub transaction_signature: u32,
	pub mini_stream_cutoff_size: u32,
	pub minifat_sector_start: u32,
	pub number_of_minifat_sectors: u32,
	pub difat_sector_start: u32,
	pub number_of_difat_sectors: u32,
	fat_sector_locations: [u32; HEADER_DIFAT_ENTRIES],
}

impl Header {
	/// Parses and validates the header from bytes [0, 512) of the file.
	pub fn read<TFile: Read + Seek>(reader: &Reader<TFile>, policy: &DefectPolicy) -> Result<Header> {
		debug!("reading CFBF file header ({} bytes)", HEADER_SIZE);
		let mut buffer = [0; HEADER_SIZE];
		reader.read_exact_at(0, &mut buffer)?;
		Header::parse(&buffer, policy)
	}

	pub fn parse(buffer: &[u8; HEADER_SIZE], policy: &DefectPolicy) -> Result<Header> {
		let mut signature = [0; 8];
		signature.copy_from_slice(&buffer[0..8]);
		let mut clsid = [0; 16];
		clsid.copy_from_slice(&buffer[8..24]);
		let sector_shift = LittleEndian::read_u16(&buffer[30..32]);
		let mini_sector_shift = LittleEndian::read_u16(&buffer[32..34]);
		// reserved (6 bytes) at 34..40

		let mut fat_sector_locations = [0; HEADER_DIFAT_ENTRIES];
		let difat = &buffer[HEADER_DIFAT_OFFSET as usize..];
		LittleEndian::read_u32_into(&difat[..HEADER_DIFAT_ENTRIES * 4], &mut fat_sector_locations);

		// Anything that is not a CFBF file is reported as such, before its geometry is looked at
		if signature != SIGNATURE {
			policy.check(DefectKind::Format, Severity::Fatal, format!("bad signature {:02X?}, expected {:02X?}", signature, SIGNATURE))?;
		}
		if !SECTOR_SHIFT_RANGE.contains(&sector_shift) {
			return Err(defect::defect(DefectKind::Format, Severity::Fatal, format!("unusable sector shift {}", sector_shift)));
		}
		if mini_sector_shift == 0 || mini_sector_shift >= sector_shift {
			return Err(defect::defect(DefectKind::Format, Severity::Fatal, format!("unusable mini sector shift {}", mini_sector_shift)));
		}

		let header = Header {
			signature,
			clsid,
			minor_version: LittleEndian::read_u16(&buffer[24..26]),
			major_version: LittleEndian::read_u16(&buffer[26..28]),
			byte_order: LittleEndian::read_u16(&buffer[28..30]),
			sector_shift,
			sector_size: 1 << sector_shift,
			mini_sector_shift,
			mini_sector_size: 1 << mini_sector_shift,
			number_of_directory_sectors: LittleEndian::read_u32(&buffer[40..44]),
			number_of_fat_sectors: LittleEndian::read_u32(&buffer[44..48]),
			directory_sector_start: LittleEndian::read_u32(&buffer[48..52]),
			transaction_signature: LittleEndian::read_u32(&buffer[52..56]),
			mini_stream_cutoff_size: LittleEndian::read_u32(&buffer[56..60]),
			minifat_sector_start: LittleEndian::read_u32(&buffer[60..64]),
			number_of_minifat_sectors: LittleEndian::read_u32(&buffer[64..68]),
			difat_sector_start: LittleEndian::read_u32(&buffer[68..72]),
			number_of_difat_sectors: LittleEndian::read_u32(&buffer[72..76]),
			fat_sector_locations,
		};
		header.validate(&buffer[34..40], policy)?;

		debug!(
			version = header.major_version,
			sector_size = header.sector_size,
			directory = header.directory_sector_start,
			minifat = header.minifat_sector_start,
			difat = header.difat_sector_start,
			"header OK"
		);
		Ok(header)
	}

	fn validate(&self, reserved: &[u8], policy: &DefectPolicy) -> Result<()> {
		let report = |severity, message: String| policy.check(DefectKind::Format, severity, message);

		if self.clsid.iter().any(|&b| b != 0) {
			report(Severity::Error, "header CLSID is not null".to_owned())?;
		}
		if self.minor_version != 0x3E {
			report(Severity::Warning, format!("unexpected minor version {:#X}", self.minor_version))?;
		}
		match self.major_version {
			3 if self.sector_shift != 9 => report(Severity::Error, format!("version 3 requires 512-byte sectors, found shift {}", self.sector_shift))?,
			4 if self.sector_shift != 12 => report(Severity::Error, format!("version 4 requires 4096-byte sectors, found shift {}", self.sector_shift))?,
			3 | 4 => (),
			other => report(Severity::Error, format!("unknown major version {}", other))?,
		}
		if self.byte_order != 0xFFFE {
			report(Severity::Error, format!("bad byte order mark {:#06X}", self.byte_order))?;
		}
		if self.mini_sector_shift != 6 {
			report(Severity::Error, format!("mini sector shift must be 6, found {}", self.mini_sector_shift))?;
		}
		if reserved.iter().any(|&b| b != 0) {
			report(Severity::Error, "reserved header bytes are not zero".to_owned())?;
		}
		if self.major_version == 3 && self.number_of_directory_sectors != 0 {
			report(Severity::Error, format!("version 3 must not count directory sectors, found {}", self.number_of_directory_sectors))?;
		}
		if self.mini_stream_cutoff_size != 4096 {
			report(Severity::Error, format!("mini stream cutoff must be 4096, found {}", self.mini_stream_cutoff_size))?;
		}
		Ok(())
	}

	/// Number of 4-byte entries in one FAT, Mini-FAT or DIFAT sector.
	pub fn entries_per_sector(&self) -> u32 {
		(self.sector_size / 4) as u32
	}

	pub fn sector_position(&self, sector: u32) -> u64 {
		sector_position(sector, self.sector_shift)
	}

	/// Number of whole or partial sectors following the header in a file of the given length.
	pub fn sector_count(&self, file_length: u64) -> u64 {
		let sectors = (file_length + self.sector_size - 1) >> self.sector_shift;
		sectors.saturating_sub(1)
	}

	/// Location of the `block`th FAT sector, if it is one of those listed in the header itself.
	pub fn fat_sector_location(&self, block: u32) -> Option<u32> {
		self.fat_sector_locations.get(block as usize).cloned()
	}

	#[cfg(test)]
	pub(crate) fn synthetic(sector_shift: u16) -> Header {
		Header {
			signature: SIGNATURE,
			clsid: [0; 16],
			minor_version: 0x3E,
			major_version: if sector_shift == 12 { 4 } else { 3 },
			byte_order: 0xFFFE,
			sector_shift,
			sector_size: 1 << sector_shift,
			mini_sector_shift: 6,
			mini_sector_size: 64,
			number_of_directory_sectors: 0,
			number_of_fat_sectors: 1,
			directory_sector_start: super::structures::ENDOFCHAIN,
			transaction_signature: 0,
			mini_stream_cutoff_size: 4096,
			minifat_sector_start: super::structures::ENDOFCHAIN,
			number_of_minifat_sectors: 0,
			difat_sector_start: super::structures::ENDOFCHAIN,
			number_of_difat_sectors: 0,
			fat_sector_locations: [super::structures::FREESECT; HEADER_DIFAT_ENTRIES],
		}
	}

	#[cfg(test)]
	pub(crate) fn set_fat_sector_location(&mut self, block: usize, sector: u32) {
		self.fat_sector_locations[block] = sector;
	}
}
