use crate::{
	TarError,
	entry::{ Entry, EntryKind },
	header::{ self, MAX_LONG_LEN, raw::{ self, BLOCK_LEN, StrExt, header::Raw } },
	helpers::BlockExt,
	source::Source
};
use log::{ debug, trace, warn };
use std::{ cmp::min, io::Read };


/// The result of feeding input to a [`TarState`]
#[derive(Debug)]
pub enum Advance<'a> {
	/// Less than a block is available and no entry is ready yet; call again with more input
	NeedMoreInput,
	/// The next entry has been decoded
	Entry(&'a Entry),
	/// Two consecutive zero blocks ended the archive
	End
}


/// The result of taking file content from memory
#[derive(Debug)]
pub enum Content<'a> {
	/// The input is exhausted before the content (or its padding) was fully consumed
	NeedMoreInput,
	/// The next piece of content
	Chunk(&'a [u8]),
	/// The content and its padding are consumed; the state may advance again
	Done
}


/// Where the state machine is in the stream
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
enum Phase {
	/// The next block is a header
	#[default]
	Header,
	/// One zero block was seen; a second one ends the archive
	ZeroSeen,
	/// Blocks are long-name continuation data
	LongName{ declared: u64 },
	/// Blocks are long-link continuation data
	LongLink{ declared: u64 },
	/// The current file's content has not been consumed yet
	Content,
	/// The archive has ended
	Ended,
	/// The stream is corrupt
	Failed
}


/// The outcome of a single step
enum Status {
	/// A block was consumed but no entry is complete
	Pending,
	NeedMoreInput,
	Ready,
	End
}


/// The incremental tar state machine
///
/// The state is fed raw bytes through [`TarState::update_mem`] and consumes them block by block. It
/// owns the buffers for the current entry and for pending GNU long-name/long-link data; both are
/// emptied and reused for every entry.
#[derive(Debug, Default)]
pub struct TarState {
	entry: Entry,
	phase: Phase,
	ready: bool,
	long_name: Vec<u8>,
	long_link: Vec<u8>,
	has_long_name: bool,
	has_long_link: bool
}
impl TarState {
	/// Creates a new state that expects the first header of an archive
	pub fn new() -> Self {
		Self::default()
	}

	/// The current entry
	pub fn entry(&self) -> &Entry {
		&self.entry
	}
	/// Whether an entry, the end of the archive or an error has been decoded from the input so far
	pub fn is_ready(&self) -> bool {
		self.ready
	}

	/// Prepares the state to read a different archive, keeping the buffer allocations
	pub fn restart(&mut self) {
		self.entry.clear();
		self.entry.kind = EntryKind::Error;
		self.phase = Phase::Header;
		self.ready = false;
		self.long_name.clear();
		self.long_link.clear();
		self.has_long_name = false;
		self.has_long_link = false;
	}
	/// Frees all buffers; the state can be reused after a [`TarState::restart`]
	pub fn release(&mut self) {
		*self = Self{ phase: Phase::Failed, ..Self::default() };
	}

	/// Consumes blocks from the front of `mem` until the next entry is decoded
	///
	/// On success, `mem` points behind the consumed blocks. A returned error puts the state into
	/// its terminal `Error` kind until it is restarted.
	pub fn update_mem(&mut self, mem: &mut &[u8]) -> Result<Advance<'_>, TarError> {
		match self.run(mem)? {
			Status::Ready => Ok(Advance::Entry(&self.entry)),
			Status::End => Ok(Advance::End),
			Status::Pending | Status::NeedMoreInput => Ok(Advance::NeedMoreInput)
		}
	}

	/// Takes the current file's content from the front of `mem`
	///
	/// Once all content has been handed out, the block padding is consumed and `Content::Done` is
	/// returned; this must happen before the state can advance to the next entry.
	pub fn content_mem<'a>(&mut self, mem: &mut &'a [u8]) -> Result<Content<'a>, TarError> {
		self.expect_content()?;
		let data: &'a [u8] = *mem;
		match self.remaining() {
			0 => {
				let padding = self.padding() as usize;
				if data.len() < padding {
					return Ok(Content::NeedMoreInput)
				}
				*mem = &data[padding..];
				self.finish_content();
				Ok(Content::Done)
			},
			_ if data.is_empty() => Ok(Content::NeedMoreInput),
			remaining => {
				let len = min(remaining, data.len() as u64) as usize;
				let (chunk, rest) = data.split_at(len);
				*mem = rest;
				self.entry.bytes_read += len as u64;
				Ok(Content::Chunk(chunk))
			}
		}
	}

	/// Drives the state machine until something other than a pending block comes out
	fn run(&mut self, mem: &mut &[u8]) -> Result<Status, TarError> {
		match self.phase {
			Phase::Ended => return Ok(Status::End),
			Phase::Failed => Err(TarError::ApiMisuse("the stream failed, restart the state first"))?,
			Phase::Content => Err(TarError::ApiMisuse("the current file must be read or skipped first"))?,
			_ => self.ready = false
		}

		loop {
			match self.step(mem) {
				Ok(Status::Pending) => continue,
				Ok(status) => return Ok(status),
				Err(e) => return Err(self.fail(e))
			}
		}
	}

	/// Consumes at most one header block or a batch of long-name/long-link continuation blocks
	fn step(&mut self, mem: &mut &[u8]) -> Result<Status, TarError> {
		if mem.len() < BLOCK_LEN {
			return Ok(Status::NeedMoreInput)
		}

		// Collect pending long data before looking at the next header
		match self.phase {
			Phase::LongName{ declared } => {
				if !accumulate(&mut self.long_name, declared, mem)? {
					return Ok(Status::Pending)
				}
				self.has_long_name = true;
				self.phase = Phase::Header;
			},
			Phase::LongLink{ declared } => {
				if !accumulate(&mut self.long_link, declared, mem)? {
					return Ok(Status::Pending)
				}
				self.has_long_link = true;
				self.phase = Phase::Header;
			},
			_ => ()
		}

		match mem.split_first_chunk::<BLOCK_LEN>() {
			Some((block, rest)) => {
				*mem = rest;
				self.decode(block)
			},
			None => Ok(Status::NeedMoreInput)
		}
	}

	/// Decodes a single header block
	fn decode(&mut self, block: &Raw) -> Result<Status, TarError> {
		// Only a second zero block in a row ends the archive
		if header::is_zero(block) {
			return match self.phase {
				Phase::ZeroSeen => {
					debug!("end of archive");
					self.phase = Phase::Ended;
					self.entry.kind = EntryKind::EndOfArchive;
					self.ready = true;
					Ok(Status::End)
				},
				_ => {
					trace!("zero block, waiting for a second one");
					self.phase = Phase::ZeroSeen;
					Ok(Status::Pending)
				}
			}
		}
		if self.phase == Phase::ZeroSeen {
			warn!("ignoring a lone zero block inside the archive");
			self.phase = Phase::Header;
		}

		let tar = raw::header::Header::from_raw(block);
		tar.verify_checksum()?;
		let kind = EntryKind::from_typeflag(tar.typeflag[0])?;

		// Long records only announce data for the next header
		match kind {
			EntryKind::PendingLongName => {
				let declared = long_size(tar)?;
				self.long_name.clear();
				self.entry.kind = kind;
				self.phase = Phase::LongName{ declared };
				return Ok(Status::Pending)
			},
			EntryKind::PendingLongLink => {
				let declared = long_size(tar)?;
				self.long_link.clear();
				self.entry.kind = kind;
				self.phase = Phase::LongLink{ declared };
				return Ok(Status::Pending)
			},
			_ if self.has_long_link && !kind.is_link() => Err(TarError::MisplacedLongLink)?,
			_ => ()
		}

		// Fill the entry, preferring attached long data over the inline fields
		let entry = &mut self.entry;
		entry.clear();
		match self.has_long_name {
			true => entry.path.push_str(long_str(&self.long_name, "long name")?),
			false => tar.push_path(&mut entry.path)?
		}
		if kind.is_link() {
			match self.has_long_link {
				true => entry.link.push_str(long_str(&self.long_link, "long link")?),
				false => entry.link.push_str(tar.linkname()?)
			}
		}
		if kind == EntryKind::File {
			entry.size = tar.decode_size()?;
		}
		entry.mode = tar.decode_mode()?;
		entry.uid = tar.decode_uid();
		entry.gid = tar.decode_gid();
		entry.mtime = tar.decode_mtime();
		entry.kind = kind;
		debug!("decoded {:?} {} ({} bytes)", kind, entry.path, entry.size);

		self.has_long_name = false;
		self.has_long_link = false;
		self.phase = match kind {
			EntryKind::File => Phase::Content,
			_ => Phase::Header
		};
		self.ready = true;
		Ok(Status::Ready)
	}

	/// Puts the state into its terminal error kind
	fn fail(&mut self, e: TarError) -> TarError {
		warn!("tar stream failed: {}", e);
		self.phase = Phase::Failed;
		self.entry.kind = EntryKind::Error;
		self.ready = true;
		e
	}

	/// Ensures that a file's content is pending
	fn expect_content(&self) -> Result<(), TarError> {
		match self.phase {
			Phase::Content => Ok(()),
			_ => Err(TarError::ApiMisuse("there is no file content to read"))
		}
	}
	/// The unread content bytes of the current file
	fn remaining(&self) -> u64 {
		self.entry.size - self.entry.bytes_read
	}
	/// The padding behind the current file's content
	fn padding(&self) -> u64 {
		self.entry.size.block_padding()
	}
	/// Marks the current file as consumed
	fn finish_content(&mut self) {
		trace!("finished content of {}", self.entry.path);
		self.phase = Phase::Header;
	}
}


/// Appends long-name/long-link continuation blocks from `mem` to `buffer`
///
/// Returns whether `buffer` was already complete, i.e. whether the next block is a header again.
fn accumulate(buffer: &mut Vec<u8>, declared: u64, mem: &mut &[u8]) -> Result<bool, TarError> {
	let have = buffer.len() as u64;
	if have < declared {
		append_blocks(buffer, declared, mem);
		return Ok(false)
	}
	match have == declared {
		true => Ok(true),
		false => Err(TarError::SizeMismatch{ declared, actual: have })
	}
}


/// Appends as many whole continuation blocks as `mem` holds, trimming the final block to the
/// remaining byte count
fn append_blocks(buffer: &mut Vec<u8>, declared: u64, mem: &mut &[u8]) {
	let want = declared - buffer.len() as u64;
	let want_blocks = want / BLOCK_LEN as u64;
	let have_blocks = (mem.len() / BLOCK_LEN) as u64;

	// Take the full blocks
	let blocks = min(want_blocks, have_blocks) as usize;
	let (full, rest) = mem.split_at(blocks * BLOCK_LEN);
	buffer.extend_from_slice(full);
	*mem = rest;
	if (blocks as u64) < want_blocks {
		trace!("long data at {} of {} bytes", buffer.len(), declared);
		return
	}

	// Take the final partial block
	let remainder = (want % BLOCK_LEN as u64) as usize;
	if remainder > 0 && mem.len() >= BLOCK_LEN {
		buffer.extend_from_slice(&mem[..remainder]);
		*mem = &mem[BLOCK_LEN..];
	}
	trace!("long data at {} of {} bytes", buffer.len(), declared);
}


/// The declared size of a long-name/long-link record, which must not exceed [`MAX_LONG_LEN`]
fn long_size(tar: &raw::header::Header) -> Result<u64, TarError> {
	match tar.decode_size()? {
		declared if declared > MAX_LONG_LEN => Err(TarError::LongDataTooLarge(declared)),
		declared => Ok(declared)
	}
}


/// Reads the logical string from long data, which ends at its first NUL
fn long_str<'a>(data: &'a [u8], name: &'static str) -> Result<&'a str, TarError> {
	str::from_field(data, name)
}


/// A tar reader that pulls blocks from a [`Source`]
///
/// ```
/// # fn main() -> Result<(), stream_tar::TarError> {
/// use stream_tar::{ EntryKind, TarReader };
///
/// // An empty archive
/// let archive = [0; 1024];
/// let mut reader = TarReader::new(&archive[..]);
/// while let Some(entry) = reader.advance()? {
/// 	if entry.kind() == EntryKind::File {
/// 		reader.skip_file()?;
/// 	}
/// }
/// assert_eq!(reader.entry().kind(), EntryKind::EndOfArchive);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TarReader<R> {
	state: TarState,
	source: Source<R>
}
impl<R: Read> TarReader<R> {
	/// Creates a reader over `inner` with a default source
	pub fn new(inner: R) -> Self {
		Self::with_source(Source::new(inner))
	}
	/// Creates a reader over a configured source
	pub fn with_source(source: Source<R>) -> Self {
		Self{ state: TarState::new(), source }
	}

	/// The underlying state
	pub fn state(&self) -> &TarState {
		&self.state
	}
	/// The current entry
	pub fn entry(&self) -> &Entry {
		self.state.entry()
	}

	/// Decodes the next entry
	///
	/// Returns `None` once the archive has ended. A file's content must be read to its end or
	/// skipped before the reader can advance.
	pub fn advance(&mut self) -> Result<Option<&Entry>, TarError> {
		if self.state.phase == Phase::Ended {
			return Ok(None)
		}

		loop {
			// Only pull input if the state can actually proceed
			if !matches!(self.state.phase, Phase::Failed | Phase::Content) {
				if let Err(e) = self.source.fill_minimum(BLOCK_LEN) {
					return Err(self.state.fail(e))
				}
			}

			let mut mem = self.source.buffered();
			let available = mem.len();
			let status = self.state.run(&mut mem);
			let consumed = available - mem.len();
			self.source.consume(consumed);

			match status? {
				Status::Ready => return Ok(Some(self.state.entry())),
				Status::End => return Ok(None),
				Status::Pending | Status::NeedMoreInput => continue
			}
		}
	}

	/// Reads the next chunk of the current file's content
	///
	/// Returns `None` after the content has been consumed; at that point, the padding behind the
	/// content has been skipped as well. A chunk may be shorter than the remaining content.
	pub fn read_content_chunk(&mut self) -> Result<Option<&[u8]>, TarError> {
		self.state.expect_content()?;
		if self.state.remaining() == 0 {
			if let Err(e) = self.source.skip(self.state.padding()) {
				return Err(self.state.fail(e))
			}
			self.state.finish_content();
			return Ok(None)
		}

		let want = usize::try_from(self.state.remaining()).unwrap_or(usize::MAX);
		match self.source.pull_max(want) {
			Ok(chunk) => {
				self.state.entry.bytes_read += chunk.len() as u64;
				Ok(Some(chunk))
			},
			Err(e) => Err(self.state.fail(e))
		}
	}

	/// Appends the current file's entire remaining content to `output`
	pub fn read_content_whole(&mut self, output: &mut Vec<u8>) -> Result<(), TarError> {
		while let Some(chunk) = self.read_content_chunk()? {
			output.extend_from_slice(chunk);
		}
		Ok(())
	}

	/// Skips the rest of the current file's content and its padding without reading it
	pub fn skip_file(&mut self) -> Result<(), TarError> {
		self.state.expect_content()?;
		let entry = &self.state.entry;
		let len = entry.size.ceil_to_block() - entry.bytes_read;
		if let Err(e) = self.source.skip(len) {
			return Err(self.state.fail(e))
		}
		self.state.finish_content();
		Ok(())
	}

	/// Restarts the reader on a new archive and returns the previous underlying reader
	pub fn restart(&mut self, inner: R) -> R {
		self.state.restart();
		self.source.replace(inner)
	}
	/// Frees the reader's buffers and returns the underlying reader
	pub fn release(mut self) -> R {
		self.state.release();
		self.source.into_inner()
	}
}
