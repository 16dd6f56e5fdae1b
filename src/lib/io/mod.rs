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

use std::cell::RefCell;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::io::Error;
use byteorder::{LittleEndian, ReadBytesExt};

/// Positioned reads against a seekable source.
///
/// Every read names its absolute byte offset, so callers never depend on where a previous read left the file pointer.
/// The source is borrowed mutably for the duration of one read only; a `Reader` is not meant to be shared across threads.
pub struct Reader<TFile: Read + Seek> {
	file: RefCell<TFile>,
	length: u64,
}

impl<TFile> Reader<TFile> where TFile: Read + Seek {
	pub fn new(mut file: TFile) -> Result<Reader<TFile>, Error> {
		let length = file.seek(SeekFrom::End(0))?;
		Ok(Reader { file: RefCell::new(file), length })
	}

	/// Total length of the source in bytes, as measured when the reader was created.
	pub fn len(&self) -> u64 {
		self.length
	}

	pub fn is_empty(&self) -> bool {
		self.length == 0
	}

	pub fn read_u32_le(&self, offset: u64) -> Result<u32, Error> {
		let mut file = self.file.borrow_mut();
		file.seek(SeekFrom::Start(offset))?;
		file.read_u32::<LittleEndian>()
	}

	pub fn read_exact_at(&self, offset: u64, buffer: &mut [u8]) -> Result<(), Error> {
		let mut file = self.file.borrow_mut();
		file.seek(SeekFrom::Start(offset))?;
		file.read_exact(buffer)
	}

	pub fn into_inner(self) -> TFile {
		self.file.into_inner()
	}
}

impl Reader<Cursor<Vec<u8>>> {
	/// Loads a non-seekable source (such as STDIN) entirely into memory.
	pub fn buffered(mut read: impl Read) -> Result<Reader<Cursor<Vec<u8>>>, Error> {
		let mut data: Vec<u8> = Vec::new();
		read.read_to_end(&mut data)?;
		Reader::new(Cursor::new(data))
	}
}
