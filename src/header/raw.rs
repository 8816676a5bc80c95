//! The raw representation of the GNU/ustar header fields and some byte constants

use crate::TarError;
use zerocopy::{ FromBytes, Immutable, IntoBytes, KnownLayout };


/// The length of a tar block
pub const BLOCK_LEN: usize = 512;
/// The capacity of the inline name and link name fields (including the NUL terminator)
pub const NAME_LEN: usize = 100;


/// Defines the GNU/ustar header block
pub mod header {
	use super::{ BLOCK_LEN, FromBytes, Immutable, IntoBytes, KnownLayout };

	/// A raw header block
	pub type Raw = [u8; BLOCK_LEN];
	/// Creates a new all-zero raw header
	pub const fn raw() -> Raw {
		[0; BLOCK_LEN]
	}

	/// The 1:1-byte representation of the GNU/ustar header
	#[repr(C)]
	#[derive(Copy, Clone, FromBytes, IntoBytes, Immutable, KnownLayout)]
	pub struct Header {
		pub name: [u8; 100],
		pub mode: [u8; 8],
		pub uid: [u8; 8],
		pub gid: [u8; 8],
		pub size: [u8; 12],
		pub mtime: [u8; 12],
		pub checksum: [u8; 8],
		pub typeflag: [u8; 1],
		pub linkname: [u8; 100],
		pub magic: [u8; 6],
		pub version: [u8; 2],
		pub uname: [u8; 32],
		pub gname: [u8; 32],
		pub devmajor: [u8; 8],
		pub devminor: [u8; 8],
		pub prefix: [u8; 155],
		pub _pad: [u8; 12]
	}
	/// Creates a new all-zero header
	pub fn header() -> Header {
		Header::from(raw())
	}
	impl Header {
		/// Views a raw block as header without copying it
		pub fn from_raw(raw: &Raw) -> &Self {
			zerocopy::transmute_ref!(raw)
		}
		/// Views the header as raw block
		pub fn as_raw(&self) -> &Raw {
			zerocopy::transmute_ref!(self)
		}
	}
	impl From<Raw> for Header {
		fn from(raw: Raw) -> Self {
			zerocopy::transmute!(raw)
		}
	}
	impl From<Header> for Raw {
		fn from(header: Header) -> Self {
			zerocopy::transmute!(header)
		}
	}
}


/// The type flags which indicate the record type
pub struct TypeFlag;
impl TypeFlag {
	/// The type flag for a regular file written by pre-POSIX archivers
	pub const REGULAR_OLD: u8 = b'\0';
	/// The type flag for a regular file
	pub const REGULAR: u8 = b'0';
	/// The type flag for a hardlink
	pub const HARDLINK: u8 = b'1';
	/// The type flag for a symlink
	pub const SYMLINK: u8 = b'2';
	/// The type flag for a directory
	pub const DIRECTORY: u8 = b'5';
	/// The type flag for a GNU long-link record carrying the link target of the next record
	pub const GNU_LONGLINK: u8 = b'K';
	/// The type flag for a GNU long-name record carrying the path of the next record
	pub const GNU_LONGNAME: u8 = b'L';
}


/// The magic written by GNU tar (`magic` and `version` fields)
pub const GNU_MAGIC: ([u8; 6], [u8; 2]) = (*b"ustar ", *b" \0");
/// The magic of POSIX ustar headers, which may split long paths into `prefix` and `name`
pub const POSIX_MAGIC: [u8; 6] = *b"ustar\0";


/// Helpers for checksum computation and verification
pub(crate) struct Checksum;
impl Checksum {
	/// Computes the checksum over `tar` and writes it as six octal digits, NUL and space
	pub fn write(tar: &mut header::Header) {
		// A block sums up to at most 512 * 255, which always fits six octal digits
		let digits = format!("{:06o}", Self::compute(tar));
		tar.checksum[..6].copy_from_slice(digits.as_bytes());
		tar.checksum[6] = 0;
		tar.checksum[7] = b' ';
	}
	/// Verifies the checksum of `tar`
	///
	/// _Note: some historic archivers summed signed bytes, so both sums are accepted_
	pub fn verify(tar: &header::Header) -> Result<(), TarError> {
		let stored = u64::from_octal_field(&tar.checksum, "checksum")?;
		let computed = Self::compute(tar);
		match stored == computed || stored as i64 == Self::compute_signed(tar) {
			true => Ok(()),
			false => Err(TarError::ChecksumMismatch{ stored, computed })
		}
	}

	/// Computes the unsigned checksum with the checksum field treated as spaces
	pub fn compute(tar: &header::Header) -> u64 {
		Self::blanked(tar).fold(0, |sum, byte| sum + u64::from(byte))
	}
	/// Computes the signed checksum with the checksum field treated as spaces
	fn compute_signed(tar: &header::Header) -> i64 {
		Self::blanked(tar).fold(0, |sum, byte| sum + i64::from(byte as i8))
	}
	/// Iterates over the header bytes with the checksum field replaced by spaces
	fn blanked(tar: &header::Header) -> impl Iterator<Item = u8> + '_ {
		let raw = tar.as_raw();
		raw[..148].iter().chain([b' '; 8].iter()).chain(raw[156..].iter()).copied()
	}
}


/// An extension for numbers stored as octal text
pub(crate) trait OctalExt: Sized {
	/// Decodes an octal field; `name` identifies the field in errors
	fn from_octal_field(field: &[u8], name: &'static str) -> Result<Self, TarError>;
	/// Encodes `self` as zero-padded octal followed by a NUL terminator
	fn into_octal_field(self, field: &mut[u8], name: &'static str) -> Result<(), TarError>;
}
impl OctalExt for u64 {
	fn from_octal_field(field: &[u8], name: &'static str) -> Result<Self, TarError> {
		// Base-256 numbers are flagged by the high bit of the first byte
		if field.first().map_or(false, |b| b & 0x80 != 0) {
			Err(TarError::UnsupportedEncoding{ field: name })?
		}

		// Split the digits from their terminator
		let start = field.iter().position(|b| *b != b' ').unwrap_or(field.len());
		let digits = &field[start..];
		let end = digits.iter().position(|b| !matches!(b, b'0'..=b'7')).unwrap_or(digits.len());
		let (number, rest) = digits.split_at(end);
		if number.is_empty() || rest.iter().any(|b| *b != 0 && *b != b' ') {
			Err(TarError::ParseError{ field: name })?
		}

		number.iter()
			.try_fold(0u64, |num, digit| num.checked_mul(8)?.checked_add(u64::from(digit - b'0')))
			.ok_or(TarError::ParseError{ field: name })
	}
	fn into_octal_field(self, field: &mut[u8], name: &'static str) -> Result<(), TarError> {
		// Leave room for the terminator
		let width = field.len().checked_sub(1).ok_or(TarError::FieldOverflow{ field: name })?;
		let digits = format!("{:0width$o}", self, width = width);
		if digits.len() > width {
			Err(TarError::FieldOverflow{ field: name })?
		}

		field[..width].copy_from_slice(digits.as_bytes());
		field[width] = 0;
		Ok(())
	}
}
impl OctalExt for Option<u64> {
	fn from_octal_field(field: &[u8], name: &'static str) -> Result<Self, TarError> {
		match field.iter().all(|b| *b == 0 || *b == b' ') {
			true => Ok(None),
			false => u64::from_octal_field(field, name).map(Some)
		}
	}
	fn into_octal_field(self, field: &mut[u8], name: &'static str) -> Result<(), TarError> {
		match self {
			Some(num) => num.into_octal_field(field, name),
			None => {
				field.iter_mut().for_each(|b| *b = 0);
				Ok(())
			}
		}
	}
}


/// An extension for text fields
pub(crate) trait StrExt {
	/// Reads a (potentially NUL-terminated) text field
	fn from_field<'a>(field: &'a [u8], name: &'static str) -> Result<&'a Self, TarError>;
	/// Writes `self` NUL-terminated and NUL-padded to `field`
	fn into_field(&self, field: &mut[u8], name: &'static str) -> Result<(), TarError>;
}
impl StrExt for str {
	fn from_field<'a>(field: &'a [u8], name: &'static str) -> Result<&'a Self, TarError> {
		let nul = field.iter().position(|b| *b == 0x00).unwrap_or(field.len());
		std::str::from_utf8(&field[..nul]).map_err(|_| TarError::NotUtf8{ field: name })
	}
	fn into_field(&self, field: &mut[u8], name: &'static str) -> Result<(), TarError> {
		// The terminator must always fit
		if self.len() >= field.len() || self.as_bytes().contains(&0) {
			Err(TarError::FieldOverflow{ field: name })?
		}

		let (value, padding) = field.split_at_mut(self.len());
		value.copy_from_slice(self.as_bytes());
		padding.iter_mut().for_each(|b| *b = 0);
		Ok(())
	}
}
