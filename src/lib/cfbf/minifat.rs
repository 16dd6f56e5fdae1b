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
use crate::defect::{DefectKind, DefectPolicy, Severity};
use crate::error::Result;
use crate::io::Reader;
use super::fat::Fat;
use super::header::Header;
use super::structures::ENDOFCHAIN;

/// Walks the miniFAT, the allocation table of the mini-sectors in the ministream.
/// The miniFAT sectors are an ordinary sector chain starting at `minifat_sector_start`.
pub struct MiniFat<'a, TFile: Read + Seek> {
	header: &'a Header,
	reader: &'a Reader<TFile>,
	fat: Fat<'a, TFile>,
	policy: &'a DefectPolicy,
}

impl<'a, TFile> MiniFat<'a, TFile> where TFile: Read + Seek {
	pub fn new(header: &'a Header, reader: &'a Reader<TFile>, policy: &'a DefectPolicy) -> MiniFat<'a, TFile> {
		MiniFat { header, reader, fat: Fat::new(header, reader), policy }
	}

	/// Retrieves the mini-sector number of the mini-sector that follows the given mini-sector.
	/// Returns `ENDOFCHAIN` if the miniFAT is too short to hold an entry for `current`,
	/// or if its sector chain loops and the policy tolerates that.
	pub fn next(&self, current: u32) -> Result<u32> {
		// Every miniFAT sector contains exactly `sector_size / 4` entries.
		let entries_per_sector = self.header.entries_per_sector();
		let target = current / entries_per_sector;

		let mut minifat_sector = self.header.minifat_sector_start;
		let mut position = 0;
		while minifat_sector != ENDOFCHAIN && position < target {
			// More miniFAT sectors than the file has sectors: the chain must loop
			if position as u64 >= self.fat.sector_count() {
				self.policy.check(
					DefectKind::Chain,
					Severity::Error,
					format!("miniFAT chain starting at sector {:#X} exceeds {} sectors, it must loop", self.header.minifat_sector_start, self.fat.sector_count()))?;
				return Ok(ENDOFCHAIN);
			}
			minifat_sector = self.fat.next(minifat_sector)?;
			position += 1;
		}

		if minifat_sector == ENDOFCHAIN {
			trace!(current, position, "miniFAT ends before the requested entry");
			return Ok(ENDOFCHAIN);
		}

		self.fat.check_sector(minifat_sector, "miniFAT")?;
		let minifat_position = self.header.sector_position(minifat_sector) + (current - position * entries_per_sector) as u64 * 4;
		let next = self.reader.read_u32_le(minifat_position)?;
		trace!(current, minifat_sector, minifat_position, next, "miniFAT lookup");
		Ok(next)
	}
}
