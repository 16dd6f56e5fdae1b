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

//! Builds small CFBF images in memory (512-byte sectors, version 3).

#![allow(dead_code)]

use byteorder::{ByteOrder, LittleEndian};

pub const SECTOR_SIZE: usize = 512;
pub const MAXREGSECT: u32 = 0xFFFFFFFA;
pub const FATSECT: u32 = 0xFFFFFFFD;
pub const ENDOFCHAIN: u32 = 0xFFFFFFFE;
pub const FREESECT: u32 = 0xFFFFFFFF;
pub const NOSTREAM: u32 = 0xFFFFFFFF;

pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

pub struct Image {
	pub bytes: Vec<u8>,
}

impl Image {
	/// A valid header followed by `sectors` zeroed sectors. No chains are set up.
	pub fn new(sectors: usize) -> Image {
		let mut image = Image { bytes: vec![0; (sectors + 1) * SECTOR_SIZE] };
		image.bytes[0..8].copy_from_slice(&SIGNATURE);
		image.put_u16(24, 0x3E);
		image.put_u16(26, 3);
		image.put_u16(28, 0xFFFE);
		image.put_u16(30, 9);
		image.put_u16(32, 6);
		image.put_u32(48, ENDOFCHAIN);
		image.put_u32(56, 4096);
		image.put_u32(60, ENDOFCHAIN);
		image.put_u32(68, ENDOFCHAIN);
		for block in 0..109 {
			image.set_fat_locator(block, FREESECT);
		}
		image
	}

	pub fn put_u16(&mut self, position: usize, value: u16) {
		LittleEndian::write_u16(&mut self.bytes[position..position + 2], value);
	}

	pub fn put_u32(&mut self, position: usize, value: u32) {
		LittleEndian::write_u32(&mut self.bytes[position..position + 4], value);
	}

	pub fn position(sector: u32) -> usize {
		(sector as usize + 1) * SECTOR_SIZE
	}

	pub fn set_fat_locator(&mut self, block: usize, sector: u32) {
		self.put_u32(76 + block * 4, sector);
	}

	pub fn set_directory_start(&mut self, sector: u32) {
		self.put_u32(48, sector);
	}

	pub fn set_minifat_start(&mut self, sector: u32, count: u32) {
		self.put_u32(60, sector);
		self.put_u32(64, count);
	}

	/// Turns `fat_sector` into a FAT sector with all entries free and registers it as the first FAT sector.
	pub fn init_fat(&mut self, fat_sector: u32) {
		self.set_fat_locator(0, fat_sector);
		self.put_u32(44, 1);
		for index in 0..(SECTOR_SIZE / 4) as u32 {
			self.set_fat(fat_sector, index, FREESECT);
		}
		self.set_fat(fat_sector, fat_sector, FATSECT);
	}

	pub fn set_fat(&mut self, fat_sector: u32, index: u32, value: u32) {
		let position = Image::position(fat_sector) + index as usize * 4;
		self.put_u32(position, value);
	}

	pub fn write(&mut self, sector: u32, offset: usize, data: &[u8]) {
		let position = Image::position(sector) + offset;
		self.bytes[position..position + data.len()].copy_from_slice(data);
	}

	#[allow(clippy::too_many_arguments)]
	pub fn entry(&mut self, sector: u32, slot: usize, name: &str, entry_type: u8, left: u32, right: u32, child: u32, start: u32, size: u64) {
		let base = Image::position(sector) + slot * 128;
		let units: Vec<u16> = name.encode_utf16().collect();
		for (i, unit) in units.iter().enumerate() {
			self.put_u16(base + i * 2, *unit);
		}
		self.put_u16(base + 64, ((units.len() + 1) * 2) as u16);
		self.bytes[base + 66] = entry_type;
		self.bytes[base + 67] = 1;
		self.put_u32(base + 68, left);
		self.put_u32(base + 72, right);
		self.put_u32(base + 76, child);
		self.put_u32(base + 116, start);
		LittleEndian::write_u64(&mut self.bytes[base + 120..base + 128], size);
	}
}

pub fn big_content() -> Vec<u8> {
	(0..4100u32).map(|i| (i % 251) as u8).collect()
}

pub fn small_content() -> Vec<u8> {
	(0..100u8).map(|i| i.wrapping_mul(7)).collect()
}

/// Sector layout of the sample container:
///
/// | sector | content |
/// |---|---|
/// | 0 | FAT |
/// | 1 | directory: Root Entry, Big, Small, Data |
/// | 2 | miniFAT: mini-sector 0 -> 1 -> end |
/// | 3 | ministream holding "Small" |
/// | 4..=12 | "Big" (4100 bytes) |
pub fn sample_image() -> Image {
	let mut image = Image::new(13);
	image.init_fat(0);
	image.set_fat(0, 1, ENDOFCHAIN);
	image.set_fat(0, 2, ENDOFCHAIN);
	image.set_fat(0, 3, ENDOFCHAIN);
	for sector in 4..12 {
		image.set_fat(0, sector, sector + 1);
	}
	image.set_fat(0, 12, ENDOFCHAIN);

	image.set_directory_start(1);
	image.entry(1, 0, "Root Entry", 5, NOSTREAM, NOSTREAM, 1, 3, 128);
	image.entry(1, 1, "Big", 2, NOSTREAM, 2, NOSTREAM, 4, 4100);
	image.entry(1, 2, "Small", 2, 3, NOSTREAM, NOSTREAM, 0, 100);
	image.entry(1, 3, "Data", 1, NOSTREAM, NOSTREAM, NOSTREAM, 0, 0);

	image.set_minifat_start(2, 1);
	for index in 0..128 {
		image.set_fat(2, index, FREESECT);
	}
	image.set_fat(2, 0, 1);
	image.set_fat(2, 1, ENDOFCHAIN);

	image.write(3, 0, &small_content());
	image.write(4, 0, &big_content());
	image
}

pub fn sample() -> Vec<u8> {
	sample_image().bytes
}
