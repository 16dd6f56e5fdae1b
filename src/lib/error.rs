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

//! Error types for container reading.

use std::io;
use thiserror::Error;
use super::defect::Severity;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
	/// Reading from the underlying file failed. Never tolerated by the defect policy.
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),

	/// The header or a directory entry contains a malformed field.
	#[error("format defect ({severity}): {message}")]
	FormatDefect { severity: Severity, message: String },

	/// An allocation chain points outside the file, loops, or ends early.
	#[error("chain defect ({severity}): {message}")]
	ChainDefect { severity: Severity, message: String },

	#[error("entry not found: {0}")]
	EntryNotFound(String),

	#[error("index out of bounds: {index} (directory holds {len} entries)")]
	IndexOutOfBounds { index: usize, len: usize },

	/// Payload was requested for an entry that has none (storage, empty slot).
	#[error("entry '{name}' is not a stream")]
	NotAStream { name: String },
}

impl Error {
	/// Whether this is a lookup failure (unknown name, index past the end).
	pub fn is_lookup(&self) -> bool {
		match self {
			Error::EntryNotFound(_) | Error::IndexOutOfBounds { .. } => true,
			_ => false,
		}
	}

	/// Whether this is a structural defect of the container.
	pub fn is_defect(&self) -> bool {
		match self {
			Error::FormatDefect { .. } | Error::ChainDefect { .. } => true,
			_ => false,
		}
	}

	/// Severity of a structural defect, `None` for every other error.
	pub fn severity(&self) -> Option<Severity> {
		match self {
			Error::FormatDefect { severity, .. } | Error::ChainDefect { severity, .. } => Some(*severity),
			_ => None,
		}
	}
}
