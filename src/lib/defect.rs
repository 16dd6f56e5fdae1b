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

//! Strictness policy for structural anomalies.
//!
//! Every anomaly found while reading a container is reported with a [`Severity`].
//! The [`DefectPolicy`] of the container decides whether it becomes an error or
//! only a warning in the log, in which case reading continues with a best-effort result.

use std::fmt;
use tracing::warn;
use super::error::{Error, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
	/// Deviation from the format that does not affect reading.
	Warning,
	/// Violation of the format; data can usually still be read.
	Error,
	/// The structure cannot be trusted at all.
	Fatal,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Severity::Warning => write!(f, "warning"),
			Severity::Error => write!(f, "error"),
			Severity::Fatal => write!(f, "fatal"),
		}
	}
}

/// Which part of the container a defect was found in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DefectKind {
	/// Header fields and directory entry records.
	Format,
	/// Allocation chains (FAT, DIFAT, Mini-FAT).
	Chain,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DefectPolicy {
	/// Raise on every defect, warnings included.
	Strict,
	/// Raise on errors and fatal defects.
	Standard,
	/// Raise on fatal defects only.
	Lenient,
	/// Never raise; every defect is logged.
	Tolerant,
}

impl Default for DefectPolicy {
	fn default() -> DefectPolicy {
		DefectPolicy::Standard
	}
}

impl DefectPolicy {
	pub fn raises(&self, severity: Severity) -> bool {
		match self {
			DefectPolicy::Strict => true,
			DefectPolicy::Standard => severity >= Severity::Error,
			DefectPolicy::Lenient => severity >= Severity::Fatal,
			DefectPolicy::Tolerant => false,
		}
	}

	/// Reports a defect. Returns the error if this policy raises on it, otherwise logs it and returns `Ok`.
	pub fn check(&self, kind: DefectKind, severity: Severity, message: String) -> Result<()> {
		if self.raises(severity) {
			Err(defect(kind, severity, message))
		}
		else {
			warn!(?kind, %severity, "tolerated defect: {}", message);
			Ok(())
		}
	}
}

/// Builds the error for a defect, bypassing any policy.
pub(crate) fn defect(kind: DefectKind, severity: Severity, message: String) -> Error {
	match kind {
		DefectKind::Format => Error::FormatDefect { severity, message },
		DefectKind::Chain => Error::ChainDefect { severity, message },
	}
}
