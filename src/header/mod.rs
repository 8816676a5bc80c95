pub mod raw;

use crate::{
	TarError,
	entry::EntryKind,
	header::raw::{ OctalExt, StrExt, Checksum, GNU_MAGIC, POSIX_MAGIC, NAME_LEN }
};
use log::debug;


/// The largest size the 11 octal digits of the size field can represent
pub const MAX_SIZE: u64 = 0o77777777777;
/// The largest GNU long-name/long-link payload, including its NUL terminator
pub const MAX_LONG_LEN: u64 = 1 << 20;


/// A decoded GNU/ustar header
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Header {
	/// The record's path and name
	pub path: String,
	/// The record's access mode bits (e.g. 0o644)
	pub mode: u64,
	/// The record's UID
	pub uid: Option<u64>,
	/// The record's GID
	pub gid: Option<u64>,
	/// The record's size
	pub size: u64,
	/// The record's modification time
	pub mtime: Option<u64>,
	/// The record's kind
	pub kind: EntryKind,
	/// The record's link name
	pub linkname: Option<String>,
	/// The owner's user name
	pub uname: String,
	/// The owner's group name
	pub gname: String
}
impl Header {
	/// Parses a raw byte block into a header
	pub fn parse(data: &raw::header::Raw) -> Result<Self, TarError> {
		// Check if we have an empty header
		if is_zero(data) {
			Err(TarError::EmptyHeader)?
		}

		// Verify the checksum and get the kind
		let tar = raw::header::Header::from_raw(data);
		Checksum::verify(tar)?;
		let kind = EntryKind::from_typeflag(tar.typeflag[0])?;

		// Decode the path and link name
		let mut path = String::new();
		tar.push_path(&mut path)?;
		let linkname = match tar.linkname()? {
			"" => None,
			linkname => Some(linkname.to_string())
		};

		// Decode the numeric fields
		let mode = tar.decode_mode()?;
		let uid = tar.decode_uid();
		let gid = tar.decode_gid();
		let size = tar.decode_size()?;
		let mtime = tar.decode_mtime();

		// Decode the owner names
		let uname = str::from_field(&tar.uname, "uname")?.to_string();
		let gname = str::from_field(&tar.gname, "gname")?.to_string();
		Ok(Self{ path, mode, uid, gid, size, mtime, kind, linkname, uname, gname })
	}

	/// Serializes the header into a raw byte block
	///
	/// _Note: this function can fail because the struct may contain values that cannot be
	/// serialized, e.g. a name of 100 bytes or more or a size above [`MAX_SIZE`]; overlong names
	/// must be split into long-name records first_
	pub fn serialize(&self) -> Result<raw::header::Raw, TarError> {
		if self.size > MAX_SIZE {
			Err(TarError::SizeTooLarge(self.size))?
		}

		// Create and populate the header
		let mut tar = raw::header::header();
		self.path.into_field(&mut tar.name, "name")?;

		self.mode.into_octal_field(&mut tar.mode, "mode")?;
		self.uid.into_octal_field(&mut tar.uid, "uid")?;
		self.gid.into_octal_field(&mut tar.gid, "gid")?;

		self.size.into_octal_field(&mut tar.size, "size")?;
		self.mtime.into_octal_field(&mut tar.mtime, "mtime")?;

		tar.typeflag[0] = self.kind.typeflag()?;
		if let Some(linkname) = &self.linkname {
			linkname.into_field(&mut tar.linkname, "linkname")?;
		}

		(tar.magic, tar.version) = GNU_MAGIC;
		self.uname.into_field(&mut tar.uname, "uname")?;
		self.gname.into_field(&mut tar.gname, "gname")?;

		// Write the checksum and return the header
		Checksum::write(&mut tar);
		Ok(tar.into())
	}
}


/// Whether `data` is an all-zero block
pub(crate) fn is_zero(data: &raw::header::Raw) -> bool {
	data.iter().all(|b| *b == 0)
}


/// The longest prefix of `name` that fits an inline name field with its terminator
pub(crate) fn inline_prefix(name: &str) -> &str {
	let mut end = name.len().min(NAME_LEN - 1);
	while !name.is_char_boundary(end) {
		end -= 1;
	}
	&name[..end]
}


/// Field decoders shared by `Header::parse` and the streaming reader
impl raw::header::Header {
	/// Appends the record's path to `path`, joining the POSIX prefix if there is one
	pub(crate) fn push_path(&self, path: &mut String) -> Result<(), TarError> {
		if self.magic == POSIX_MAGIC {
			let prefix = str::from_field(&self.prefix, "prefix")?;
			if !prefix.is_empty() {
				path.push_str(prefix);
				path.push('/');
			}
		}
		path.push_str(str::from_field(&self.name, "name")?);
		Ok(())
	}
	/// The record's link name
	pub(crate) fn linkname(&self) -> Result<&str, TarError> {
		str::from_field(&self.linkname, "linkname")
	}
	/// The record's size
	pub(crate) fn decode_size(&self) -> Result<u64, TarError> {
		u64::from_octal_field(&self.size, "size")
	}
	/// The record's mode
	pub(crate) fn decode_mode(&self) -> Result<u64, TarError> {
		u64::from_octal_field(&self.mode, "mode")
	}
	/// The record's UID, if it is set and octal
	pub(crate) fn decode_uid(&self) -> Option<u64> {
		decode_lenient(&self.uid, "uid")
	}
	/// The record's GID, if it is set and octal
	pub(crate) fn decode_gid(&self) -> Option<u64> {
		decode_lenient(&self.gid, "gid")
	}
	/// The record's modification time, if it is set and octal
	pub(crate) fn decode_mtime(&self) -> Option<u64> {
		decode_lenient(&self.mtime, "mtime")
	}
	/// Verifies the record's checksum
	pub(crate) fn verify_checksum(&self) -> Result<(), TarError> {
		Checksum::verify(self)
	}
}


/// Decodes an optional numeric field; base-256 and malformed values are treated as unset
fn decode_lenient(field: &[u8], name: &'static str) -> Option<u64> {
	Option::<u64>::from_octal_field(field, name).unwrap_or_else(|e| {
		debug!("ignoring field `{}`: {}", name, e);
		None
	})
}
