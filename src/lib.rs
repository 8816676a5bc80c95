//! ## About
//! This crate reads and writes GNU/ustar tar streams incrementally: a reader consumes the stream in
//! 512 byte blocks from any byte source and hands out one entry at a time, a writer turns entry
//! metadata into conformant header blocks.
//!
//! Supported are files, directories, symlinks and hardlinks as well as GNU long-name and long-link
//! records for paths and link targets that do not fit the 100 byte header fields. Sizes are limited
//! to the 11 octal digits of the classic size field; base-256 numbers are rejected.
//!
//! ## How to read a stream
//! A [`TarReader`] pulls blocks from an `io::Read`. Every call to [`TarReader::advance`] decodes the
//! next entry; the content of a file must be read or skipped before advancing again.
//!
//! ### Example:
//! ```
//! # use std::{ error::Error, io::Read };
//! use stream_tar::{ EntryKind, TarReader };
//!
//! /// Collects the paths and contents of all files in `stream`
//! fn read_files(stream: impl Read) -> Result<Vec<(String, Vec<u8>)>, Box<dyn Error + 'static>> {
//! 	let mut reader = TarReader::new(stream);
//! 	let mut files = Vec::new();
//! 	while let Some(entry) = reader.advance()? {
//! 		if entry.kind() == EntryKind::File {
//! 			let path = entry.path().to_string();
//! 			let mut content = Vec::new();
//! 			reader.read_content_whole(&mut content)?;
//! 			files.push((path, content));
//! 		}
//! 	}
//! 	Ok(files)
//! }
//! ```
//!
//! Input that arrives in memory can be fed to a [`TarState`] directly, which reports
//! [`Advance::NeedMoreInput`] until a whole entry is available.
//!
//! ## How to write a stream
//! To write an entry, write its header, then (for files) its content and the padding to the next
//! block boundary. The archive is terminated by [`write_end`].
//!
//! ### Example:
//! ```
//! # use std::error::Error;
//! use stream_tar::{ EntryKind, EntryMeta, NumericIdentity, write_end, write_header, write_padding };
//!
//! /// Creates an archive with a single file
//! fn archive(name: &str, payload: &[u8]) -> Result<Vec<u8>, Box<dyn Error + 'static>> {
//! 	let meta = EntryMeta{ mode: 0o644, size: payload.len() as u64, ..EntryMeta::new(name, EntryKind::File) };
//!
//! 	let mut output = Vec::new();
//! 	write_header(&mut output, &meta, &NumericIdentity)?;
//! 	output.extend_from_slice(payload);
//! 	write_padding(&mut output, meta.size);
//! 	write_end(&mut output);
//! 	Ok(output)
//! }
//! ```

mod entry;
mod header;
mod helpers;
mod identity;
mod read;
mod sink;
mod source;
mod write;

use std::{ io, path::PathBuf };
pub use crate::{
	entry::{ Entry, EntryKind },
	header::{ Header, MAX_LONG_LEN, MAX_SIZE, raw },
	helpers::{ BlockExt, ReadExt, WriteExt },
	identity::{ Account, IdentityLookup, NumericIdentity },
	read::{ Advance, Content, TarReader, TarState },
	sink::TarSink,
	source::{ Source, DEFAULT_CHUNK_LEN },
	write::{ EntryMeta, PathInfo, write_end, write_header, write_padding }
};
#[cfg(unix)]
pub use crate::{ identity::SystemIdentity, write::write_path_header };


/// A `stream_tar`-related error
#[derive(Debug, thiserror::Error)]
pub enum TarError {
	/// A numeric field is empty or not octal
	#[error("malformed numeric field `{field}`")]
	ParseError{ field: &'static str },
	/// A numeric field uses the base-256 encoding
	#[error("base-256 encoding in field `{field}` is not supported")]
	UnsupportedEncoding{ field: &'static str },
	/// The header has a typeflag this crate does not handle
	#[error("invalid typeflag {0:#04x}")]
	InvalidTypeflag(u8),
	/// A GNU long-link record precedes an entry that is no link
	#[error("long link attached to an entry that is no link")]
	MisplacedLongLink,
	/// Long data or file content does not match its declared size
	#[error("declared size is {declared} bytes but found {actual} bytes")]
	SizeMismatch{ declared: u64, actual: u64 },
	/// The stream ended before the declared data
	#[error("the archive ended prematurely")]
	TruncatedArchive,
	/// A user or group could not be resolved
	#[error("failed to look up {what} `{query}`")]
	IdentityLookupFailed{ what: &'static str, query: String },
	/// A long-name/long-link record declares more than [`MAX_LONG_LEN`] bytes
	#[error("long record of {0} bytes exceeds the limit of {max} bytes", max = MAX_LONG_LEN)]
	LongDataTooLarge(u64),
	/// A size exceeds the octal size field
	#[error("size {0} exceeds the maximum of the octal size field")]
	SizeTooLarge(u64),
	/// A path is neither a file, a directory nor a symlink
	#[error("unsupported file type at {}", .0.display())]
	UnsupportedFileType(PathBuf),
	/// The header checksum does not match the header
	#[error("header checksum {stored:o} does not match the computed checksum {computed:o}")]
	ChecksumMismatch{ stored: u64, computed: u64 },
	/// A text field is not UTF-8
	#[error("field `{field}` is not UTF-8")]
	NotUtf8{ field: &'static str },
	/// A value does not fit its header field
	#[error("value does not fit into field `{field}`")]
	FieldOverflow{ field: &'static str },
	/// An empty (all zero) header was found (which is usually part of an end of archive indicator)
	#[error("empty header")]
	EmptyHeader,
	/// An API misuse occurred
	#[error("API misuse: {0}")]
	ApiMisuse(&'static str),
	/// The byte source or sink failed
	#[error(transparent)]
	Io(io::Error)
}
impl From<io::Error> for TarError {
	fn from(error: io::Error) -> Self {
		match error.kind() {
			io::ErrorKind::UnexpectedEof => Self::TruncatedArchive,
			_ => Self::Io(error)
		}
	}
}
