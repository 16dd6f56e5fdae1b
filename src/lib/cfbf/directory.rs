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

use std::char::{decode_utf16, REPLACEMENT_CHARACTER};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};
use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;
use crate::defect::{DefectKind, DefectPolicy, Severity};
use crate::error::{Error, Result};
use crate::io::Reader;
use super::fat::Fat;
use super::header::Header;
use super::structures::{is_special, DIRECTORY_ENTRY_SIZE};

#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryEntry {
	/// Position of the entry in the directory, which is also how other entries refer to it.
	pub id: u32,
	pub name: String,
	/// Whether this entry is a folder or a file.
	pub entry_type: EntryType,
	/// Red-black tree colour (0 = red, 1 = black).
	pub color: u8,
	/// The ID of the left sibling entry in the binary tree (in this folder).
	pub left_sibling_id: u32,
	/// The ID of the right sibling entry in the binary tree (in this folder).
	pub right_sibling_id: u32,
	/// If this entry is a folder: the ID of the root of the binary tree of its children.
	pub child_id: u32,
	pub clsid: [u8; 16],
	pub state_bits: u32,
	pub creation_time: u64,
	pub modified_time: u64,
	/// If this entry is a file: the first sector (or mini-sector) that holds the file content.
	/// For the root storage: the first sector of the ministream.
	pub start_sector: u32,
	/// If this entry is a file: the length of the file content.
	pub stream_size: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntryType {
	/// Unused directory slot.
	Empty,
	/// A folder.
	Storage,
	/// A file.
	Stream,
	/// The root folder.
	RootStorage,
	Unknown(u8),
}

impl From<u8> for EntryType {
	fn from(value: u8) -> EntryType {
		match value {
			0 => EntryType::Empty,
			1 => EntryType::Storage,
			2 => EntryType::Stream,
			5 => EntryType::RootStorage,
			other => EntryType::Unknown(other),
		}
	}
}

impl DirectoryEntry {
	/// Decodes one 128-byte directory entry record.
	pub fn parse(id: u32, buffer: &[u8; DIRECTORY_ENTRY_SIZE], header: &Header, policy: &DefectPolicy) -> Result<DirectoryEntry> {
		// The length is expressed in bytes and includes the trailing NUL character
		let mut name_length = LittleEndian::read_u16(&buffer[64..66]) as usize;
		if name_length > 64 || name_length % 2 != 0 {
			policy.check(DefectKind::Format, Severity::Error, format!("entry #{} has an invalid name length {}", id, name_length))?;
			name_length = name_length.min(64) & !1;
		}
		let mut name_units = [0u16; 32];
		LittleEndian::read_u16_into(&buffer[0..64], &mut name_units);
		let name = decode_utf16(
				name_units
				.iter()
				.take((name_length / 2).saturating_sub(1))
				.cloned())
			.map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
			.collect::<String>();

		let mut clsid = [0; 16];
		clsid.copy_from_slice(&buffer[80..96]);

		let mut stream_size = LittleEndian::read_u64(&buffer[120..128]);
		// Version 3 files only use the low 32 bits; writers are known to leave garbage in the high ones
		if header.major_version == 3 && stream_size >> 32 != 0 {
			policy.check(DefectKind::Format, Severity::Warning, format!("entry #{} has a stream size above 4 GiB in a version 3 file", id))?;
			stream_size &= 0xFFFFFFFF;
		}

		Ok(DirectoryEntry {
			id,
			name,
			entry_type: EntryType::from(buffer[66]),
			color: buffer[67],
			left_sibling_id: LittleEndian::read_u32(&buffer[68..72]),
			right_sibling_id: LittleEndian::read_u32(&buffer[72..76]),
			child_id: LittleEndian::read_u32(&buffer[76..80]),
			clsid,
			state_bits: LittleEndian::read_u32(&buffer[96..100]),
			creation_time: LittleEndian::read_u64(&buffer[100..108]),
			modified_time: LittleEndian::read_u64(&buffer[108..116]),
			start_sector: LittleEndian::read_u32(&buffer[116..120]),
			stream_size,
		})
	}

	pub fn is_stream(&self) -> bool {
		self.entry_type == EntryType::Stream
	}

	pub fn is_storage(&self) -> bool {
		match self.entry_type {
			EntryType::Storage | EntryType::RootStorage => true,
			_ => false,
		}
	}
}

/// Key for looking up an entry in the directory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LookupKey<'a> {
	ByName(&'a str),
	ByIndex(usize),
}

impl<'a> From<&'a str> for LookupKey<'a> {
	fn from(name: &'a str) -> LookupKey<'a> {
		LookupKey::ByName(name)
	}
}

impl<'a> From<&'a String> for LookupKey<'a> {
	fn from(name: &'a String) -> LookupKey<'a> {
		LookupKey::ByName(name)
	}
}

impl<'a> From<usize> for LookupKey<'a> {
	fn from(index: usize) -> LookupKey<'a> {
		LookupKey::ByIndex(index)
	}
}

/// All directory entries of a container, in the order they are stored.
pub struct Directory {
	entries: Vec<DirectoryEntry>,
	names: HashMap<String, usize>,
}

impl Directory {
	/// Reads every entry of the directory sector chain.
	pub fn read<TFile: Read + Seek>(header: &Header, reader: &Reader<TFile>, policy: &DefectPolicy) -> Result<Directory> {
		let fat = Fat::new(header, reader);
		let sectors = fat.chain(header.directory_sector_start, policy)?;
		debug!("reading directory from {} sectors", sectors.len());

		let mut entries = Vec::new();
		let mut buffer = vec![0; header.sector_size as usize];
		let mut record = [0; DIRECTORY_ENTRY_SIZE];
		for sector in sectors {
			reader.read_exact_at(header.sector_position(sector), &mut buffer)?;
			// Sector sizes are powers of two of at least 128 bytes, so every chunk is a whole record
			for chunk in buffer.chunks_exact(DIRECTORY_ENTRY_SIZE) {
				record.copy_from_slice(chunk);
				let entry = DirectoryEntry::parse(entries.len() as u32, &record, header, policy)?;
				entries.push(entry);
			}
		}
		Ok(Directory::from_entries(entries))
	}

	pub fn from_entries(entries: Vec<DirectoryEntry>) -> Directory {
		let mut names = HashMap::new();
		for (index, entry) in entries.iter().enumerate() {
			if entry.entry_type != EntryType::Empty {
				names.entry(entry.name.clone()).or_insert(index);
			}
		}
		Directory { entries, names }
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> std::slice::Iter<DirectoryEntry> {
		self.entries.iter()
	}

	pub fn get(&self, index: usize) -> Result<&DirectoryEntry> {
		self.entries.get(index).ok_or(Error::IndexOutOfBounds { index, len: self.entries.len() })
	}

	/// Finds the first non-empty entry with the given name, anywhere in the tree.
	pub fn by_name(&self, name: &str) -> Result<&DirectoryEntry> {
		match self.names.get(name) {
			Some(&index) => Ok(&self.entries[index]),
			None => Err(Error::EntryNotFound(name.to_owned())),
		}
	}

	pub fn lookup(&self, key: LookupKey) -> Result<&DirectoryEntry> {
		match key {
			LookupKey::ByName(name) => self.by_name(name),
			LookupKey::ByIndex(index) => self.get(index),
		}
	}

	/// Lists the direct children of a storage entry, ordered as in the binary tree (left, node, right).
	pub fn children(&self, entry: &DirectoryEntry, policy: &DefectPolicy) -> Result<Vec<&DirectoryEntry>> {
		let mut children = Vec::new();
		let mut visited = HashSet::new();
		self.collect_siblings(entry.child_id, &mut visited, &mut children, policy)?;
		Ok(children)
	}

	fn collect_siblings<'d>(&'d self, id: u32, visited: &mut HashSet<u32>, children: &mut Vec<&'d DirectoryEntry>, policy: &DefectPolicy) -> Result<()> {
		// Mostly 0xFFFFFFFF, representing non-existing sibling nodes
		if is_special(id) {
			return Ok(());
		}
		let node = match self.entries.get(id as usize) {
			Some(node) => node,
			None => {
				return policy.check(DefectKind::Format, Severity::Error, format!("entry #{} referenced but the directory has {} entries", id, self.entries.len()));
			}
		};
		if !visited.insert(id) {
			return policy.check(DefectKind::Format, Severity::Error, format!("entry #{} is referenced twice in the directory tree", id));
		}

		self.collect_siblings(node.left_sibling_id, visited, children, policy)?;
		children.push(node);
		self.collect_siblings(node.right_sibling_id, visited, children, policy)
	}

	/// Finds an entry by its path below the root storage, e.g. `&["Dir1", "Dir2", "MyFile"]`.
	pub fn find_path(&self, path: &[&str], policy: &DefectPolicy) -> Result<&DirectoryEntry> {
		let mut current = self.get(0)?;
		for (depth, segment) in path.iter().enumerate() {
			let found = self.children(current, policy)?
				.into_iter()
				.find(|child| child.name == *segment);
			current = match found {
				Some(child) => child,
				None => return Err(Error::EntryNotFound(path[..=depth].join("/"))),
			};
		}
		Ok(current)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;
	use super::super::structures::{ENDOFCHAIN, FATSECT, NOSTREAM};

	fn record(name: &str, entry_type: u8, left: u32, right: u32, child: u32) -> [u8; DIRECTORY_ENTRY_SIZE] {
		let mut buffer = [0; DIRECTORY_ENTRY_SIZE];
		let units: Vec<u16> = name.encode_utf16().collect();
		for (i, unit) in units.iter().enumerate() {
			LittleEndian::write_u16(&mut buffer[i * 2..i * 2 + 2], *unit);
		}
		LittleEndian::write_u16(&mut buffer[64..66], ((units.len() + 1) * 2) as u16);
		buffer[66] = entry_type;
		buffer[67] = 1;
		LittleEndian::write_u32(&mut buffer[68..72], left);
		LittleEndian::write_u32(&mut buffer[72..76], right);
		LittleEndian::write_u32(&mut buffer[76..80], child);
		buffer
	}

	fn entry(id: u32, name: &str, entry_type: u8, left: u32, right: u32, child: u32) -> DirectoryEntry {
		let header = Header::synthetic(9);
		DirectoryEntry::parse(id, &record(name, entry_type, left, right, child), &header, &DefectPolicy::Strict).unwrap()
	}

	fn sample() -> Directory {
		Directory::from_entries(vec![
			entry(0, "Root Entry", 5, NOSTREAM, NOSTREAM, 2),
			entry(1, "Alpha", 2, NOSTREAM, NOSTREAM, NOSTREAM),
			entry(2, "Folder", 1, 1, 3, 4),
			entry(3, "Zulu", 2, NOSTREAM, NOSTREAM, NOSTREAM),
			entry(4, "Alpha", 2, NOSTREAM, NOSTREAM, NOSTREAM),
			entry(5, "", 0, NOSTREAM, NOSTREAM, NOSTREAM),
		])
	}

	#[test]
	fn parses_names_and_types() {
		let root = entry(0, "Root Entry", 5, NOSTREAM, NOSTREAM, 2);
		assert_eq!(root.name, "Root Entry");
		assert_eq!(root.entry_type, EntryType::RootStorage);
		assert!(root.is_storage());
		assert_eq!(root.child_id, 2);
		assert_eq!(EntryType::from(7), EntryType::Unknown(7));
	}

	#[test]
	fn reads_every_record_of_a_directory_sector() {
		let mut header = Header::synthetic(9);
		header.set_fat_sector_location(0, 0);
		header.directory_sector_start = 1;

		let mut bytes = vec![0; 3 * 512];
		LittleEndian::write_u32(&mut bytes[512..516], FATSECT);
		LittleEndian::write_u32(&mut bytes[516..520], ENDOFCHAIN);
		bytes[1024..1152].copy_from_slice(&record("Root Entry", 5, NOSTREAM, NOSTREAM, 3));
		bytes[1408..1536].copy_from_slice(&record("Last", 2, NOSTREAM, NOSTREAM, NOSTREAM));

		let reader = Reader::new(Cursor::new(bytes)).unwrap();
		let directory = Directory::read(&header, &reader, &DefectPolicy::Strict).unwrap();
		assert_eq!(directory.len(), 4);
		assert_eq!(directory.get(0).unwrap().entry_type, EntryType::RootStorage);
		assert_eq!(directory.get(1).unwrap().entry_type, EntryType::Empty);
		let last = directory.by_name("Last").unwrap();
		assert_eq!(last.id, 3);
		assert!(last.is_stream());
	}

	#[test]
	fn invalid_name_length_follows_policy() {
		let header = Header::synthetic(9);
		let mut buffer = record("Name", 2, NOSTREAM, NOSTREAM, NOSTREAM);
		LittleEndian::write_u16(&mut buffer[64..66], 200);

		assert!(DirectoryEntry::parse(1, &buffer, &header, &DefectPolicy::Standard).is_err());
		let parsed = DirectoryEntry::parse(1, &buffer, &header, &DefectPolicy::Lenient).unwrap();
		assert!(parsed.name.starts_with("Name"));
	}

	#[test]
	fn masks_stream_size_of_version_3_files() {
		let header = Header::synthetic(9);
		let mut buffer = record("Big", 2, NOSTREAM, NOSTREAM, NOSTREAM);
		LittleEndian::write_u64(&mut buffer[120..128], 0x1_0000_0010);

		let parsed = DirectoryEntry::parse(1, &buffer, &header, &DefectPolicy::Standard).unwrap();
		assert_eq!(parsed.stream_size, 0x10);
		assert!(DirectoryEntry::parse(1, &buffer, &header, &DefectPolicy::Strict).is_err());
	}

	#[test]
	fn looks_up_by_name_and_index() {
		let directory = sample();
		assert_eq!(directory.len(), 6);
		// first occurrence wins
		assert_eq!(directory.lookup(LookupKey::from("Alpha")).unwrap().id, 1);
		assert_eq!(directory.lookup(LookupKey::from(3usize)).unwrap().name, "Zulu");

		let err = directory.lookup(LookupKey::ByName("Missing")).unwrap_err();
		assert!(err.is_lookup());
		let err = directory.lookup(LookupKey::ByIndex(6)).unwrap_err();
		assert!(err.is_lookup());
		// empty slots are not indexed by name
		assert!(directory.by_name("").is_err());
	}

	#[test]
	fn lists_children_in_tree_order() {
		let directory = sample();
		let root = directory.get(0).unwrap();
		let names: Vec<&str> = directory.children(root, &DefectPolicy::Standard).unwrap()
			.iter()
			.map(|child| child.name.as_str())
			.collect();
		assert_eq!(names, vec!["Alpha", "Folder", "Zulu"]);

		let nested = directory.find_path(&["Folder", "Alpha"], &DefectPolicy::Standard).unwrap();
		assert_eq!(nested.id, 4);
		match directory.find_path(&["Folder", "Nope"], &DefectPolicy::Standard).unwrap_err() {
			Error::EntryNotFound(path) => assert_eq!(path, "Folder/Nope"),
			other => panic!("unexpected error: {}", other),
		}
	}

	#[test]
	fn tree_loops_are_defects() {
		let directory = Directory::from_entries(vec![
			entry(0, "Root Entry", 5, NOSTREAM, NOSTREAM, 1),
			entry(1, "Loop", 2, NOSTREAM, 1, NOSTREAM),
		]);
		let root = directory.get(0).unwrap();
		assert!(directory.children(root, &DefectPolicy::Standard).is_err());
		assert_eq!(directory.children(root, &DefectPolicy::Lenient).unwrap().len(), 1);
	}
}
