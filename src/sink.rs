use crate::{
	TarError,
	entry::EntryKind,
	helpers::{ BlockExt, ReadExt, WriteExt },
	identity::IdentityLookup,
	write::{ self, EntryMeta }
};
use log::warn;
use std::io::{ self, Write };


/// Writes entries to an `io::Write`
///
/// Headers are assembled in a reusable buffer and flushed with every entry; file content from disk
/// is streamed straight to the sink.
#[derive(Debug)]
pub struct TarSink<W, I> {
	sink: W,
	buffer: Vec<u8>,
	identity: I
}
impl<W: Write, I: IdentityLookup> TarSink<W, I> {
	/// Creates a new tar sink that resolves owners with `identity`
	pub fn new(sink: W, identity: I) -> Self {
		Self{ sink, buffer: Vec::new(), identity }
	}

	/// Writes an entry with in-memory content
	///
	/// The size is taken from `data`; entries other than files must not have content.
	pub fn append_data(&mut self, meta: &EntryMeta, data: &[u8]) -> Result<(), TarError> {
		if meta.kind != EntryKind::File && !data.is_empty() {
			Err(TarError::ApiMisuse("only files have content"))?
		}

		let meta = EntryMeta{ size: data.len() as u64, ..meta.clone() };
		write::write_header(&mut self.buffer, &meta, &self.identity)?;
		self.buffer.extend_from_slice(data);
		write::write_padding(&mut self.buffer, meta.size);
		self.flush()
	}

	/// Writes the entry for the file, directory or symlink at `path`, including a file's content
	#[cfg(unix)]
	pub fn append_path(&mut self, path: &std::path::Path, override_name: Option<&str>)
		-> Result<write::PathInfo, TarError>
	{
		let info = write::write_path_header(&mut self.buffer, path, override_name, &self.identity)?;
		if info.kind != EntryKind::File {
			self.flush()?;
			return Ok(info)
		}

		// Nothing reaches the sink unless the content can be read
		let mut file = match std::fs::File::open(path) {
			Ok(file) => file,
			Err(e) => {
				self.buffer.clear();
				Err(e)?
			}
		};
		self.flush()?;

		// Stream the content and verify it still has the recorded size
		let copied = io::copy(&mut io::Read::take(&mut file, info.size), &mut self.sink)?;
		if copied < info.size {
			warn!("{} shrank while being archived", path.display());
			Err(TarError::TruncatedArchive)?
		}
		let mut extra_byte = [0; 1];
		if file.try_read_some(&mut extra_byte)? > 0 {
			let extra = 1 + io::copy(&mut file, &mut io::sink())?;
			warn!("{} grew while being archived", path.display());
			Err(TarError::SizeMismatch{ declared: info.size, actual: info.size + extra })?
		}

		self.sink.try_fill(info.size.block_padding())?;
		Ok(info)
	}

	/// Writes the end-of-archive marker and returns the sink
	pub fn finish(mut self) -> Result<W, TarError> {
		write::write_end(&mut self.buffer);
		self.flush()?;
		self.sink.flush()?;
		Ok(self.sink)
	}

	/// Writes the buffered bytes to the sink
	fn flush(&mut self) -> Result<(), TarError> {
		self.sink.try_write_exact(&self.buffer)?;
		self.buffer.clear();
		Ok(())
	}
}
