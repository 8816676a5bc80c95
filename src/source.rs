use crate::{
	TarError,
	helpers::ReadExt,
	header::raw::BLOCK_LEN
};
use log::trace;
use std::{ cmp::min, io::Read, mem };


/// The default amount of bytes requested from the underlying reader per refill
pub const DEFAULT_CHUNK_LEN: usize = 16 * 1024;


/// A buffered byte source over any `io::Read`
///
/// The source hands out views into its buffer; consumed bytes are only dropped on the next refill,
/// so a reader may deliver data in arbitrarily uneven chunks.
#[derive(Debug)]
pub struct Source<R> {
	inner: R,
	buf: Vec<u8>,
	pos: usize,
	chunk_len: usize
}
impl<R: Read> Source<R> {
	/// Creates a new source with the default refill size
	pub fn new(inner: R) -> Self {
		Self::with_chunk_len(inner, DEFAULT_CHUNK_LEN)
	}
	/// Creates a new source that requests `chunk_len` bytes (at least one block) per refill
	pub fn with_chunk_len(inner: R, chunk_len: usize) -> Self {
		Self{ inner, buf: Vec::new(), pos: 0, chunk_len: chunk_len.max(BLOCK_LEN) }
	}

	/// The buffered but not yet consumed bytes
	pub fn buffered(&self) -> &[u8] {
		&self.buf[self.pos..]
	}
	/// Marks `len` buffered bytes as consumed
	pub fn consume(&mut self, len: usize) {
		self.pos = min(self.pos + len, self.buf.len());
	}

	/// Refills until at least `len` bytes are buffered
	///
	/// Fails with `TruncatedArchive` if the underlying reader ends first.
	pub fn fill_minimum(&mut self, len: usize) -> Result<(), TarError> {
		while self.buffered().len() < len {
			if self.refill()? == 0 {
				Err(TarError::TruncatedArchive)?
			}
		}
		Ok(())
	}

	/// Consumes and returns up to `max` bytes, refilling once if nothing is buffered
	pub fn pull_max(&mut self, max: usize) -> Result<&[u8], TarError> {
		if self.buffered().is_empty() && self.refill()? == 0 {
			Err(TarError::TruncatedArchive)?
		}

		let start = self.pos;
		self.consume(max);
		Ok(&self.buf[start..self.pos])
	}

	/// Skips `len` bytes, draining the underlying reader past the buffer if necessary
	pub fn skip(&mut self, len: u64) -> Result<(), TarError> {
		let buffered = min(len, self.buffered().len() as u64);
		self.consume(buffered as usize);

		let rest = len - buffered;
		if rest > 0 {
			trace!("draining {} bytes past the buffer", rest);
			self.inner.try_drain(rest)?;
		}
		Ok(())
	}

	/// Swaps in a new underlying reader and discards everything buffered from the old one
	pub fn replace(&mut self, inner: R) -> R {
		self.buf.clear();
		self.pos = 0;
		mem::replace(&mut self.inner, inner)
	}
	/// Returns the underlying reader
	///
	/// _Note: bytes that were buffered but not consumed are lost_
	pub fn into_inner(self) -> R {
		self.inner
	}

	/// Performs a single read into the buffer and returns the amount of new bytes
	fn refill(&mut self) -> Result<usize, TarError> {
		// Drop the consumed bytes before growing
		if self.pos > 0 {
			self.buf.drain(..self.pos);
			self.pos = 0;
		}

		let filled = self.buf.len();
		self.buf.resize(filled + self.chunk_len, 0);
		let read = match self.inner.try_read_some(&mut self.buf[filled..]) {
			Ok(read) => read,
			Err(e) => {
				self.buf.truncate(filled);
				Err(e)?
			}
		};
		self.buf.truncate(filled + read);
		Ok(read)
	}
}
