use crate::header::raw::BLOCK_LEN;
use std::{
	cmp::min,
	io::{
		self, Read, Write,
		ErrorKind::{ Interrupted, UnexpectedEof, WriteZero }
	}
};


/// A block of zero bytes to write padding from
const ZERO_BLOCK: [u8; BLOCK_LEN] = [0; BLOCK_LEN];


/// An extension for `Read`
pub trait ReadExt {
	/// Performs a single `read` call into `buf`, retrying if it was interrupted
	///
	/// _Note: like `read`, this returns `Ok(0)` at the end of the stream_
	fn try_read_some(&mut self, buf: &mut[u8]) -> Result<usize, io::Error>;

	/// Reads and discards exactly `len` bytes
	///
	/// _Note: if the stream ends first, this fails with `UnexpectedEof`_
	fn try_drain(&mut self, len: u64) -> Result<(), io::Error>;
}
impl<T: Read> ReadExt for T {
	fn try_read_some(&mut self, buf: &mut[u8]) -> Result<usize, io::Error> {
		loop {
			match self.read(buf) {
				Err(ref e) if e.kind() == Interrupted => continue,
				result => return result
			}
		}
	}
	fn try_drain(&mut self, mut len: u64) -> Result<(), io::Error> {
		let mut scratch = [0; 8 * BLOCK_LEN];
		while len > 0 {
			let chunk = min(len, scratch.len() as u64) as usize;
			match self.try_read_some(&mut scratch[..chunk])? {
				0 => Err(io::Error::from(UnexpectedEof))?,
				read => len -= read as u64
			}
		}
		Ok(())
	}
}


/// An extension for `Write`
pub trait WriteExt {
	/// Writes `data` completely, retrying interrupted writes
	///
	/// _Note: a sink that accepts zero bytes fails with `WriteZero`_
	fn try_write_exact(&mut self, data: &[u8]) -> Result<(), io::Error>;

	/// Writes `len` zero bytes
	fn try_fill(&mut self, len: u64) -> Result<(), io::Error>;
}
impl<T: Write> WriteExt for T {
	fn try_write_exact(&mut self, mut data: &[u8]) -> Result<(), io::Error> {
		while !data.is_empty() {
			match self.write(data) {
				Err(ref e) if e.kind() == Interrupted => continue,
				Err(e) => Err(e)?,
				Ok(0) => Err(io::Error::from(WriteZero))?,
				Ok(len) => data = &data[len..]
			}
		}
		Ok(())
	}
	fn try_fill(&mut self, mut len: u64) -> Result<(), io::Error> {
		while len > 0 {
			let chunk = min(len, BLOCK_LEN as u64) as usize;
			self.try_write_exact(&ZERO_BLOCK[..chunk])?;
			len -= chunk as u64;
		}
		Ok(())
	}
}


/// Block arithmetic for content sizes
pub trait BlockExt {
	/// Rounds `self` up to the next block boundary
	fn ceil_to_block(self) -> Self;
	/// The amount of zero bytes behind `self` content bytes up to the next block boundary
	fn block_padding(self) -> Self;
}
impl BlockExt for u64 {
	fn ceil_to_block(self) -> Self {
		match self % BLOCK_LEN as u64 {
			0 => self,
			r => self + (BLOCK_LEN as u64 - r)
		}
	}
	fn block_padding(self) -> Self {
		self.ceil_to_block() - self
	}
}
