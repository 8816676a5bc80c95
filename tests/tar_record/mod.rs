#![allow(dead_code)]

use std::{ cmp::min, io::{ self, Read } };
use stream_tar::{
	Account, Advance, Content, Entry, EntryKind, EntryMeta, IdentityLookup, NumericIdentity, Source,
	TarError, TarReader, TarState, write_end, write_header, write_padding,
	raw::BLOCK_LEN
};


/// A decoded record with its content
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Record {
	pub kind: EntryKind,
	pub path: String,
	pub link: Option<String>,
	pub mode: u64,
	pub size: u64,
	pub content: Vec<u8>
}
impl From<&Entry> for Record {
	fn from(entry: &Entry) -> Self {
		Self {
			kind: entry.kind(), path: entry.path().to_string(), link: entry.link().map(str::to_string),
			mode: entry.mode(), size: entry.size(), content: Vec::new()
		}
	}
}


/// A reader that hands out its data in uneven pieces
pub struct ChunkedReader<'a> {
	data: &'a [u8],
	sizes: Vec<usize>,
	calls: usize
}
impl<'a> ChunkedReader<'a> {
	pub fn new(data: &'a [u8], sizes: &[usize]) -> Self {
		Self{ data, sizes: sizes.to_vec(), calls: 0 }
	}
}
impl Read for ChunkedReader<'_> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let size = self.sizes[self.calls % self.sizes.len()];
		self.calls += 1;

		let len = min(min(size, buf.len()), self.data.len());
		buf[..len].copy_from_slice(&self.data[..len]);
		self.data = &self.data[len..];
		Ok(len)
	}
}


/// An identity database with a single user and group
pub struct TestIdentity;
impl IdentityLookup for TestIdentity {
	fn user_by_name(&self, name: &str) -> Option<Account> {
		(name == "tester").then(|| Account{ id: 1000, name: name.to_string() })
	}
	fn user_by_id(&self, uid: u64) -> Option<Account> {
		(uid == 1000).then(|| Account{ id: uid, name: "tester".to_string() })
	}
	fn group_by_name(&self, name: &str) -> Option<Account> {
		(name == "staff").then(|| Account{ id: 100, name: name.to_string() })
	}
	fn group_by_id(&self, gid: u64) -> Option<Account> {
		(gid == 100).then(|| Account{ id: gid, name: "staff".to_string() })
	}
}


/// Appends a complete entry with `content` using numeric owners
pub fn push_entry(archive: &mut Vec<u8>, meta: &EntryMeta, content: &[u8]) {
	write_header(archive, meta, &NumericIdentity).unwrap();
	archive.extend_from_slice(content);
	write_padding(archive, content.len() as u64);
}

/// Appends a regular file
pub fn push_file(archive: &mut Vec<u8>, name: &str, content: &[u8]) {
	let meta = EntryMeta{ mode: 0o644, size: content.len() as u64, ..EntryMeta::new(name, EntryKind::File) };
	push_entry(archive, &meta, content)
}

/// Builds an archive of regular files
pub fn archive(files: &[(&str, &[u8])]) -> Vec<u8> {
	let mut archive = Vec::new();
	for (name, content) in files {
		push_file(&mut archive, name, content);
	}
	write_end(&mut archive);
	archive
}


/// Rewrites the checksum of a header block after it was modified
pub fn reseal(block: &mut [u8]) {
	let sum: u64 = block[..148].iter().chain([b' '; 8].iter()).chain(block[156..BLOCK_LEN].iter())
		.map(|b| u64::from(*b))
		.sum();
	block[148..156].copy_from_slice(format!("{:06o}\0 ", sum).as_bytes());
}


/// Reads all records with a `TarReader`, pulling file content chunk by chunk
pub fn read_chunked(reader: impl Read) -> Result<Vec<Record>, TarError> {
	let mut reader = TarReader::new(reader);
	let mut records = Vec::new();
	while let Some(entry) = reader.advance()? {
		let mut record = Record::from(entry);
		if record.kind == EntryKind::File {
			while let Some(chunk) = reader.read_content_chunk()? {
				record.content.extend_from_slice(chunk);
			}
		}
		records.push(record);
	}
	Ok(records)
}

/// Reads all records with a `TarReader` over a source with the given refill size, reading file
/// content at once
pub fn read_whole(reader: impl Read, chunk_len: usize) -> Result<Vec<Record>, TarError> {
	let mut reader = TarReader::with_source(Source::with_chunk_len(reader, chunk_len));
	let mut records = Vec::new();
	while let Some(entry) = reader.advance()? {
		let mut record = Record::from(entry);
		if record.kind == EntryKind::File {
			reader.read_content_whole(&mut record.content)?;
		}
		records.push(record);
	}
	Ok(records)
}

/// Reads all records by feeding `archive` to a `TarState` in pieces of `step` bytes
pub fn read_fed(archive: &[u8], step: usize) -> Result<Vec<Record>, TarError> {
	let mut state = TarState::new();
	let mut records = Vec::new();
	let (mut pending, mut offset) = (Vec::new(), 0);

	loop {
		// Decode the next header
		let mut mem = pending.as_slice();
		let record = match state.update_mem(&mut mem)? {
			Advance::End => return Ok(records),
			Advance::NeedMoreInput => None,
			Advance::Entry(entry) => Some(Record::from(entry))
		};
		let consumed = pending.len() - mem.len();
		pending.drain(..consumed);

		let Some(mut record) = record else {
			assert!(offset < archive.len(), "the archive ended without an end marker");
			offset = feed(&mut pending, archive, offset, step);
			continue
		};

		// Collect the content
		while record.kind == EntryKind::File {
			let mut mem = pending.as_slice();
			let done = match state.content_mem(&mut mem)? {
				Content::NeedMoreInput => None,
				Content::Chunk(chunk) => {
					record.content.extend_from_slice(chunk);
					Some(false)
				},
				Content::Done => Some(true)
			};
			let consumed = pending.len() - mem.len();
			pending.drain(..consumed);

			match done {
				Some(true) => break,
				Some(false) => (),
				None => {
					assert!(offset < archive.len(), "the archive ended within a file");
					offset = feed(&mut pending, archive, offset, step);
				}
			}
		}
		records.push(record);
	}
}

/// Moves the next `step` bytes of `archive` to `pending` and returns the new offset
fn feed(pending: &mut Vec<u8>, archive: &[u8], offset: usize, step: usize) -> usize {
	let end = min(offset + step, archive.len());
	pending.extend_from_slice(&archive[offset..end]);
	end
}
