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

//! Reader for Compound File Binary (CFB) containers, also known as OLE files,
//! COM structured storage or CFBF.
//!
//! ```no_run
//! use cfbio::{Container, DefectPolicy};
//!
//! let container = Container::open_with_policy("installer.msi", DefectPolicy::Lenient)?;
//! let root = container.root()?;
//! for entry in container.children(root)? {
//!     println!("{} {:?}", entry.name, entry.entry_type);
//! }
//! let summary = container.get("\u{5}SummaryInformation")?;
//! let data = container.read_stream(summary)?;
//! # let _ = data;
//! # Ok::<(), cfbio::Error>(())
//! ```

pub mod cfbf;
pub mod defect;
pub mod error;
pub mod io;

pub use cfbf::{Container, Directory, DirectoryEntry, EntryType, Header, LookupKey};
pub use defect::{DefectKind, DefectPolicy, Severity};
pub use error::{Error, Result};
