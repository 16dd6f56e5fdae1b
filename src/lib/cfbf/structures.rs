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

// Also see: [MS-CFB]: Compound File Binary File Format specifications, https://msdn.microsoft.com/en-us/library/dd942138.aspx

/// Magic bytes at the very beginning of every CFBF file.
pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// The header always occupies the first 512 bytes, whatever the sector size.
pub const HEADER_SIZE: usize = 512;

/// Byte offset of the FAT sector locations embedded in the header.
pub const HEADER_DIFAT_OFFSET: u64 = 0x4C;

/// Number of FAT sector locations embedded in the header.
pub const HEADER_DIFAT_ENTRIES: usize = 109;

pub const DIRECTORY_ENTRY_SIZE: usize = 128;

// Special sector numbers
pub const MAXREGSECT: u32 = 0xFFFFFFFA;
pub const DIFSECT: u32 = 0xFFFFFFFC;
pub const FATSECT: u32 = 0xFFFFFFFD;
pub const ENDOFCHAIN: u32 = 0xFFFFFFFE;
pub const FREESECT: u32 = 0xFFFFFFFF;

/// Directory entry id meaning "no sibling/child".
pub const NOSTREAM: u32 = 0xFFFFFFFF;

/// Byte position of a sector in the file.
/// Sector numbering starts right after the header, which is why the header is sometimes thought of as sector -1.
pub fn sector_position(sector: u32, sector_shift: u16) -> u64 {
	(sector as u64 + 1) << sector_shift
}

/// Whether `value` is one of the reserved markers rather than a sector number.
pub fn is_special(value: u32) -> bool {
	value > MAXREGSECT
}
