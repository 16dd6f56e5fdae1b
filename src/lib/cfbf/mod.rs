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

pub mod structures;
mod header;
mod fat;
mod minifat;
mod directory;

pub use self::header::Header;
pub use self::fat::Fat;
pub use self::minifat::MiniFat;
pub use self::directory::{Directory, DirectoryEntry, EntryType, LookupKey};

use std::cell::OnceCell;
use std::cmp::min;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use tracing::{debug, info, trace};
use crate::defect::{self, DefectKind, DefectPolicy, Severity};
use crate::error::{Error, Result};
use crate::io::Reader;
use self::structures::{is_special, DIRECTORY_ENTRY_SIZE, ENDOFCHAIN};

/// An open CFBF file.
///
/// The header and the whole directory are read when the container is opened.
/// All other reads (chain lookups, stream content) go to the file on demand.
pub struct Container<TFile: Read + Seek> {
	reader: Reader<TFile>,
	policy: DefectPolicy,
	header: Header,
	directory: Directory,
	root: OnceCell<DirectoryEntry>,
}

impl Container<File> {
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Container<File>> {
		Container::open_with_policy(path, DefectPolicy::default())
	}

	pub fn open_with_policy<P: AsRef<Path>>(path: P, policy: DefectPolicy) -> Result<Container<File>> {
		let file = File::open(path.as_ref())?;
		debug!(path = %path.as_ref().display(), "opened file");
		Container::with_policy(file, policy)
	}
}

impl<TFile> Container<TFile> where TFile: Read + Seek {
	pub fn new(file: TFile) -> Result<Container<TFile>> {
		Container::with_policy(file, DefectPolicy::default())
	}

	pub fn with_policy(file: TFile, policy: DefectPolicy) -> Result<Container<TFile>> {
		Container::from_reader(Reader::new(file)?, policy)
	}

	pub fn from_reader(reader: Reader<TFile>, policy: DefectPolicy) -> Result<Container<TFile>> {
		debug!(length = reader.len(), ?policy, "reading CFBF container");
		let header = Header::read(&reader, &policy)?;
		let directory = Directory::read(&header, &reader, &policy)?;
		info!(
			length = reader.len(),
			sector_size = header.sector_size,
			entries = directory.len(),
			"opened CFBF container"
		);

		Ok(Container {
			reader,
			policy,
			header,
			directory,
			root: OnceCell::new(),
		})
	}

	pub fn header(&self) -> &Header {
		&self.header
	}

	pub fn policy(&self) -> DefectPolicy {
		self.policy
	}

	/// Length of the underlying file in bytes.
	pub fn file_length(&self) -> u64 {
		self.reader.len()
	}

	pub fn directory(&self) -> &Directory {
		&self.directory
	}

	pub fn fat(&self) -> Fat<'_, TFile> {
		Fat::new(&self.header, &self.reader)
	}

	pub fn minifat(&self) -> MiniFat<'_, TFile> {
		MiniFat::new(&self.header, &self.reader, &self.policy)
	}

	/// Retrieves the sector that follows `current` in its chain (from the FAT).
	pub fn next_fat(&self, current: u32) -> Result<u32> {
		self.fat().next(current)
	}

	/// Retrieves the mini-sector that follows `current` in its chain (from the miniFAT).
	pub fn next_minifat(&self, current: u32) -> Result<u32> {
		self.minifat().next(current)
	}

	/// The root storage entry, read from the first directory sector on first access.
	/// Every later call returns the same instance.
	pub fn root(&self) -> Result<&DirectoryEntry> {
		if let Some(root) = self.root.get() {
			return Ok(root);
		}

		let sector = self.header.directory_sector_start;
		self.fat().check_sector(sector, "directory")?;
		let mut buffer = [0; DIRECTORY_ENTRY_SIZE];
		self.reader.read_exact_at(self.header.sector_position(sector), &mut buffer)?;
		let root = DirectoryEntry::parse(0, &buffer, &self.header, &self.policy)?;
		if root.entry_type != EntryType::RootStorage {
			self.policy.check(DefectKind::Format, Severity::Error, format!("first directory entry '{}' is not the root storage", root.name))?;
		}
		debug!(name = %root.name, ministream = root.start_sector, "root entry loaded");

		Ok(self.root.get_or_init(|| root))
	}

	/// Looks up an entry by name (`&str`) or by its index in the directory (`usize`).
	pub fn get<'k, K: Into<LookupKey<'k>>>(&self, key: K) -> Result<&DirectoryEntry> {
		let key = key.into();
		trace!(?key, "lookup");
		self.directory.lookup(key)
	}

	pub fn children(&self, entry: &DirectoryEntry) -> Result<Vec<&DirectoryEntry>> {
		self.directory.children(entry, &self.policy)
	}

	/// Finds an entry by its path below the root storage.
	/// ```no_run
	/// # use cfbio::Container;
	/// let container = Container::open("document.doc")?;
	/// let stream = container.find_path(&["ObjectPool", "_1234", "Contents"])?;
	/// # Ok::<(), cfbio::Error>(())
	/// ```
	pub fn find_path(&self, path: &[&str]) -> Result<&DirectoryEntry> {
		self.directory.find_path(path, &self.policy)
	}

	pub fn read_stream(&self, entry: &DirectoryEntry) -> Result<Vec<u8>> {
		let mut data = Vec::with_capacity(min(entry.stream_size, self.reader.len()) as usize);
		self.copy_stream(entry, &mut data)?;
		Ok(data)
	}

	/// Writes the content of a stream to `output` and returns the number of bytes written.
	/// Fewer than `stream_size` bytes are only written if the policy tolerates a truncated chain.
	pub fn copy_stream<W: Write>(&self, entry: &DirectoryEntry, output: &mut W) -> Result<u64> {
		// This method only makes sense for stream entries (i.e. files) and the root storage (which contains the ministream)
		match entry.entry_type {
			EntryType::RootStorage => self.copy_stream_normal(entry, output),
			EntryType::Stream =>
				// Two cases: if the file is small, look for it in the ministream; otherwise read it from sectors
				if entry.stream_size < self.header.mini_stream_cutoff_size as u64 {
					self.copy_stream_mini(entry, output)
				}
				else {
					self.copy_stream_normal(entry, output)
				},
			_ => Err(Error::NotAStream { name: entry.name.clone() }),
		}
	}

	fn copy_stream_normal<W: Write>(&self, entry: &DirectoryEntry, output: &mut W) -> Result<u64> {
		debug!(id = entry.id, size = entry.stream_size, "copying stream from sectors");
		let fat = self.fat();

		let sector_size = self.header.sector_size;
		let mut buffer = vec![0; sector_size as usize];
		let mut size_remaining = entry.stream_size;
		let mut current_sector = entry.start_sector;
		let mut copied_sectors = 0u64;
		while size_remaining > 0 && current_sector != ENDOFCHAIN {
			if copied_sectors >= fat.sector_count() {
				self.policy.check(
					DefectKind::Chain,
					Severity::Error,
					format!("sector chain of stream '{}' exceeds the file, it must loop", entry.name))?;
				break;
			}
			fat.check_sector(current_sector, "stream")?;
			trace!(current_sector, size_remaining, "copying sector");

			// Don't copy more bytes than there are in this sector
			let num_bytes = min(sector_size, size_remaining) as usize;
			self.reader.read_exact_at(self.header.sector_position(current_sector), &mut buffer[..num_bytes])?;
			output.write_all(&buffer[..num_bytes])?;
			size_remaining -= num_bytes as u64;
			copied_sectors += 1;

			// If bytes are remaining, we need to find the next sector
			if size_remaining > 0 {
				current_sector = fat.next(current_sector)?;
			}
		}

		self.finish_stream(entry, size_remaining)
	}

	fn copy_stream_mini<W: Write>(&self, entry: &DirectoryEntry, output: &mut W) -> Result<u64> {
		debug!(id = entry.id, size = entry.stream_size, "copying stream from ministream");
		let root = self.root()?;
		let ministream = self.fat().chain(root.start_sector, &self.policy)?;
		let minifat = self.minifat();

		let mini_sector_size = self.header.mini_sector_size;
		// The ministream holds no more mini-sectors than its chain covers or the root's size declares
		let chain_capacity = ministream.len() as u64 * (self.header.sector_size / mini_sector_size);
		let declared_capacity = (root.stream_size + mini_sector_size - 1) / mini_sector_size;
		let capacity = min(chain_capacity, declared_capacity);
		let mut buffer = vec![0; mini_sector_size as usize];
		let mut size_remaining = entry.stream_size;
		let mut current_minisector = entry.start_sector;
		let mut copied_minisectors = 0u64;
		while size_remaining > 0 {
			if is_special(current_minisector) {
				break;
			}
			if current_minisector as u64 >= capacity {
				return Err(defect::defect(
					DefectKind::Chain,
					Severity::Fatal,
					format!("mini-sector {:#X} lies outside the ministream ({} mini-sectors)", current_minisector, capacity)));
			}
			if copied_minisectors >= capacity {
				self.policy.check(
					DefectKind::Chain,
					Severity::Error,
					format!("mini-sector chain of stream '{}' exceeds the ministream, it must loop", entry.name))?;
				break;
			}

			// Mini-sectors are numbered consecutively across the sectors of the ministream
			let offset = current_minisector as u64 * mini_sector_size;
			let sector = ministream[(offset >> self.header.sector_shift) as usize];
			let position = self.header.sector_position(sector) + (offset & (self.header.sector_size - 1));
			trace!(current_minisector, sector, position, "copying mini-sector");

			// Don't copy more bytes than there are in this mini-sector
			let num_bytes = min(mini_sector_size, size_remaining) as usize;
			self.reader.read_exact_at(position, &mut buffer[..num_bytes])?;
			output.write_all(&buffer[..num_bytes])?;
			size_remaining -= num_bytes as u64;
			copied_minisectors += 1;

			if size_remaining > 0 {
				current_minisector = minifat.next(current_minisector)?;
			}
		}

		self.finish_stream(entry, size_remaining)
	}

	fn finish_stream(&self, entry: &DirectoryEntry, size_remaining: u64) -> Result<u64> {
		if size_remaining > 0 {
			self.policy.check(
				DefectKind::Chain,
				Severity::Error,
				format!("chain of stream '{}' ends {} bytes before its size of {}", entry.name, size_remaining, entry.stream_size))?;
		}
		debug!(id = entry.id, "done copying");
		Ok(entry.stream_size - size_remaining)
	}

	pub fn into_inner(self) -> TFile {
		self.reader.into_inner()
	}
}
