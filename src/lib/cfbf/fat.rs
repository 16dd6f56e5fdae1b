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
use tracing::trace;
use crate::defect::{self, DefectKind, DefectPolicy, Severity};
use crate::error::Result;
use crate::io::Reader;
use super::header::Header;
use super::structures::{is_special, ENDOFCHAIN, HEADER_DIFAT_ENTRIES};

/// Walks the File Allocation Table.
/// The locations of the FAT sectors themselves are found in the header (first 109) and in the DIFAT sector chain (all others).
pub struct Fat<'a, TFile: Read + Seek> {
	header: &'a Header,
	reader: &'a Reader<TFile>,
	sector_count: u64,
}

impl<'a, TFile> Fat<'a, TFile> where TFile: Read + Seek {
	pub fn new(header: &'a Header, reader: &'a Reader<TFile>) -> Fat<'a, TFile> {
		let sector_count = header.sector_count(reader.len());
		Fat { header, reader, sector_count }
	}

	/// Number of sectors in the file (excluding the header).
	pub fn sector_count(&self) -> u64 {
		self.sector_count
	}

	/// Fails unless `sector` designates a sector that physically exists in the file.
	/// Not subject to the defect policy: reading such a sector would return unrelated data or nothing at all.
	pub fn check_sector(&self, sector: u32, role: &str) -> Result<()> {
		if is_special(sector) || sector as u64 >= self.sector_count {
			Err(defect::defect(
				DefectKind::Chain,
				Severity::Fatal,
				format!("{} sector {:#X} lies outside the file ({} sectors)", role, sector, self.sector_count)))
		}
		else {
			Ok(())
		}
	}

	/// Retrieves the sector number of the sector that follows the given sector in the chain.
	/// The result is either a sector number inside the file or one of the special markers (usually `ENDOFCHAIN`).
	pub fn next(&self, current: u32) -> Result<u32> {
		self.check_sector(current, "current")?;

		// Every FAT sector contains exactly `sector_size / 4` entries.
		let entries_per_sector = self.header.entries_per_sector();
		let block = current / entries_per_sector;
		let fat_sector = self.fat_sector_location(block)?;
		self.check_sector(fat_sector, "FAT")?;

		let fat_position = self.header.sector_position(fat_sector) + (current % entries_per_sector) as u64 * 4;
		let next = self.reader.read_u32_le(fat_position)?;
		trace!(current, block, fat_sector, fat_position, next, "FAT lookup");

		if !is_special(next) {
			self.check_sector(next, "next")?;
		}
		Ok(next)
	}

	/// Finds the location of the `block`th FAT sector.
	fn fat_sector_location(&self, block: u32) -> Result<u32> {
		// The first 109 FAT sector numbers are listed in the header, all subsequent ones in the DIFAT sectors.
		if let Some(location) = self.header.fat_sector_location(block) {
			return Ok(location);
		}

		// The last slot of each DIFAT sector holds the location of the next DIFAT sector
		let difat_entries_per_sector = self.header.entries_per_sector() - 1;
		let mut relative_block = block - HEADER_DIFAT_ENTRIES as u32;
		let mut difat_sector = self.header.difat_sector_start;
		while relative_block >= difat_entries_per_sector {
			self.check_sector(difat_sector, "DIFAT")?;
			let next_position = self.header.sector_position(difat_sector) + self.header.sector_size - 4;
			let next_difat_sector = self.reader.read_u32_le(next_position)?;
			trace!(difat_sector, next_difat_sector, relative_block, "DIFAT hop");

			difat_sector = next_difat_sector;
			relative_block -= difat_entries_per_sector;
		}

		self.check_sector(difat_sector, "DIFAT")?;
		let difat_position = self.header.sector_position(difat_sector);
		let location = self.reader.read_u32_le(difat_position + relative_block as u64 * 4)?;
		trace!(block, difat_sector, relative_block, location, "FAT sector located through DIFAT");
		Ok(location)
	}

	/// Collects all sectors of the chain that starts at `start`.
	/// A chain that is longer than the file has sectors must loop; if the policy tolerates that, the sectors collected so far are returned.
	pub fn chain(&self, start: u32, policy: &DefectPolicy) -> Result<Vec<u32>> {
		let mut sectors = Vec::new();
		let mut sector = start;
		while sector != ENDOFCHAIN {
			if sectors.len() as u64 >= self.sector_count {
				policy.check(
					DefectKind::Chain,
					Severity::Error,
					format!("chain starting at sector {:#X} exceeds {} sectors, it must loop", start, self.sector_count))?;
				break;
			}
			let next = self.next(sector)?;
			sectors.push(sector);
			sector = next;
		}
		Ok(sectors)
	}
}
