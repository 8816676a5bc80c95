mod tar_record;

use stream_tar::{
	Advance, Content, EntryKind, EntryMeta, Header, MAX_LONG_LEN, NumericIdentity, TarError, TarReader,
	TarState, write_end, write_header,
	raw::BLOCK_LEN
};
use tar_record::{ ChunkedReader, Record };
use similar_asserts::assert_eq;


/// Files that cover empty, partial, exact and multi-block content
fn sample_files() -> Vec<(String, Vec<u8>)> {
	[0usize, 1, 511, 512, 513, 2000, 7]
		.iter()
		.enumerate()
		.map(|(i, len)| (format!("dir/file_{}.bin", i), (0..*len).map(|b| (b * 7 + i) as u8).collect()))
		.collect()
}
fn sample_archive() -> Vec<u8> {
	let files = sample_files();
	let files: Vec<(&str, &[u8])> = files.iter().map(|(n, c)| (n.as_str(), c.as_slice())).collect();
	tar_record::archive(&files)
}
fn sample_records() -> Vec<Record> {
	sample_files().into_iter()
		.map(|(path, content)| Record {
			kind: EntryKind::File, path, link: None, mode: 0o644, size: content.len() as u64, content
		})
		.collect()
}


#[test]
fn test_long_name_incremental() {
	let name = "a".repeat(150);
	let mut archive = Vec::new();
	tar_record::push_file(&mut archive, &name, b"hi");
	write_end(&mut archive);
	assert_eq!(archive.len(), 6 * BLOCK_LEN);

	// The long-name record alone only leaves the state pending
	let mut state = TarState::new();
	let mut mem = &archive[..BLOCK_LEN];
	assert!(matches!(state.update_mem(&mut mem).unwrap(), Advance::NeedMoreInput));
	assert!(mem.is_empty());
	assert_eq!(state.entry().kind(), EntryKind::PendingLongName);
	assert!(!state.is_ready());

	// The remaining blocks complete the file entry
	let mut mem = &archive[BLOCK_LEN..];
	match state.update_mem(&mut mem).unwrap() {
		Advance::Entry(entry) => {
			assert_eq!(entry.kind(), EntryKind::File);
			assert_eq!(entry.path(), name);
			assert_eq!(entry.size(), 2);
		},
		other => panic!("unexpected result {:?}", other)
	}
	assert!(state.is_ready());
	assert_eq!(mem.len(), 3 * BLOCK_LEN);

	match state.content_mem(&mut mem).unwrap() {
		Content::Chunk(chunk) => assert_eq!(chunk, b"hi"),
		other => panic!("unexpected result {:?}", other)
	}
	assert!(matches!(state.content_mem(&mut mem).unwrap(), Content::Done));
	assert_eq!(mem.len(), 2 * BLOCK_LEN);

	assert!(matches!(state.update_mem(&mut mem).unwrap(), Advance::End));
	assert!(mem.is_empty());
	assert_eq!(state.entry().kind(), EntryKind::EndOfArchive);
	assert!(matches!(state.update_mem(&mut mem).unwrap(), Advance::End));
}


#[test]
fn test_empty_archive() {
	let archive = [0; 2 * BLOCK_LEN];
	let mut reader = TarReader::new(&archive[..]);
	assert!(reader.advance().unwrap().is_none());
	assert_eq!(reader.entry().kind(), EntryKind::EndOfArchive);
	assert!(reader.advance().unwrap().is_none());
}


#[test]
fn test_end_needs_two_zero_blocks() {
	let mut archive = Vec::new();
	tar_record::push_file(&mut archive, "file", b"data");
	archive.extend([0; BLOCK_LEN]);

	let mut reader = TarReader::new(archive.as_slice());
	assert!(reader.advance().unwrap().is_some());
	reader.skip_file().unwrap();
	assert!(matches!(reader.advance(), Err(TarError::TruncatedArchive)));
	assert_eq!(reader.entry().kind(), EntryKind::Error);
}


#[test]
fn test_lone_zero_block() {
	let mut archive = Vec::new();
	tar_record::push_file(&mut archive, "first", b"1");
	archive.extend([0; BLOCK_LEN]);
	tar_record::push_file(&mut archive, "second", b"2");
	write_end(&mut archive);

	let records = tar_record::read_chunked(archive.as_slice()).unwrap();
	let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
	assert_eq!(paths, ["first", "second"]);
	assert_eq!(records[1].content, b"2");
}


#[test]
fn test_truncated_content() {
	let mut archive = Vec::new();
	let meta = EntryMeta{ size: 1000, ..EntryMeta::new("file", EntryKind::File) };
	tar_record::push_entry(&mut archive, &meta, &[0x2a; 100]);
	archive.truncate(BLOCK_LEN + 100);

	let mut reader = TarReader::new(archive.as_slice());
	assert_eq!(reader.advance().unwrap().map(|e| e.size()), Some(1000));

	let mut content = Vec::new();
	assert!(matches!(reader.read_content_whole(&mut content), Err(TarError::TruncatedArchive)));
	assert_eq!(content, [0x2a; 100]);
	assert_eq!(reader.entry().kind(), EntryKind::Error);

	// The failure is terminal
	assert!(matches!(reader.advance(), Err(TarError::ApiMisuse(_))));
}


#[test]
fn test_truncated_header() {
	let archive = sample_archive();
	for cut in [1, 300, BLOCK_LEN + 17] {
		let result = tar_record::read_chunked(&archive[..cut]);
		assert!(matches!(result, Err(TarError::TruncatedArchive)), "cut at {}", cut);
	}
}


#[test]
fn test_read_modes_agree() {
	let archive = sample_archive();
	let expected = sample_records();

	assert_eq!(tar_record::read_chunked(archive.as_slice()).unwrap(), expected);
	for sizes in [&[1][..], &[7, 300, 1], &[512], &[BLOCK_LEN + 1, 3], &[100_000]] {
		let chunked = tar_record::read_chunked(ChunkedReader::new(&archive, sizes)).unwrap();
		assert_eq!(chunked, expected, "chunk sizes {:?}", sizes);

		let whole = tar_record::read_whole(ChunkedReader::new(&archive, sizes), 1).unwrap();
		assert_eq!(whole, expected, "chunk sizes {:?}", sizes);
	}
	for step in [1, 511, 512, 1000, archive.len()] {
		assert_eq!(tar_record::read_fed(&archive, step).unwrap(), expected, "step {}", step);
	}
}


#[test]
fn test_skip() {
	let archive = sample_archive();
	let expected = sample_records();

	for sizes in [&[1][..], &[13, 600], &[100_000]] {
		let mut reader = TarReader::new(ChunkedReader::new(&archive, sizes));
		let mut paths = Vec::new();
		for (i, record) in expected.iter().enumerate() {
			let entry = reader.advance().unwrap().unwrap();
			assert_eq!(entry.path(), record.path);
			paths.push(entry.path().to_string());

			// Read a part of every other file before skipping the rest
			if i % 2 == 1 && record.size > 0 {
				let chunk = reader.read_content_chunk().unwrap().unwrap();
				assert_eq!(chunk, &record.content[..chunk.len()]);
			}
			reader.skip_file().unwrap();
		}
		assert!(reader.advance().unwrap().is_none());
		assert_eq!(paths.len(), expected.len());
	}
}


#[test]
fn test_long_name_and_link() {
	let name = format!("{}/link", "long".repeat(40));
	let target = format!("{}/target", "far".repeat(60));

	let mut archive = Vec::new();
	let meta = EntryMeta{ mode: 0o777, linkname: Some(&target), ..EntryMeta::new(&name, EntryKind::Symlink) };
	tar_record::push_entry(&mut archive, &meta, b"");
	let meta = EntryMeta{ linkname: Some(&target), ..EntryMeta::new("short", EntryKind::Hardlink) };
	tar_record::push_entry(&mut archive, &meta, b"");
	write_end(&mut archive);

	let records = tar_record::read_chunked(ChunkedReader::new(&archive, &[5, 700])).unwrap();
	assert_eq!(records.len(), 2);
	assert_eq!(records[0].kind, EntryKind::Symlink);
	assert_eq!(records[0].path, name);
	assert_eq!(records[0].link.as_deref(), Some(target.as_str()));
	assert_eq!(records[0].mode, 0o777);
	assert_eq!(records[1].kind, EntryKind::Hardlink);
	assert_eq!(records[1].path, "short");
	assert_eq!(records[1].link.as_deref(), Some(target.as_str()));

	// A long link may also come first
	let mut archive = Vec::new();
	for (sentinel, kind, value) in [
		("././@LongLink", EntryKind::PendingLongLink, &target), ("././@LongName", EntryKind::PendingLongName, &name)
	] {
		let data = format!("{}\0", value);
		let meta = EntryMeta{ size: data.len() as u64, ..EntryMeta::new(sentinel, kind) };
		tar_record::push_entry(&mut archive, &meta, data.as_bytes());
	}
	let meta = EntryMeta{ linkname: Some("inline"), ..EntryMeta::new("inline", EntryKind::Symlink) };
	tar_record::push_entry(&mut archive, &meta, b"");
	write_end(&mut archive);

	let records = tar_record::read_fed(&archive, 300).unwrap();
	assert_eq!(records.len(), 1);
	assert_eq!(records[0].path, name);
	assert_eq!(records[0].link.as_deref(), Some(target.as_str()));
}


#[test]
fn test_long_data_limit() {
	let mut archive = Vec::new();
	let meta = EntryMeta{ size: MAX_LONG_LEN + 1, ..EntryMeta::new("././@LongName", EntryKind::PendingLongName) };
	write_header(&mut archive, &meta, &NumericIdentity).unwrap();
	archive.resize(archive.len() + 4 * BLOCK_LEN, b'a');

	let mut state = TarState::new();
	let mut mem = archive.as_slice();
	assert!(matches!(state.update_mem(&mut mem), Err(TarError::LongDataTooLarge(size)) if size == MAX_LONG_LEN + 1));
	assert_eq!(state.entry().kind(), EntryKind::Error);
}


#[test]
fn test_lenient_owner_fields() {
	// Base-256 and garbage in the optional fields decode as unset
	let mut archive = tar_record::archive(&[("file", &b"content"[..])]);
	archive[108..116].copy_from_slice(&[0x80, 0, 0, 0, 0x3b, 0x9a, 0xca, 0]);
	archive[116..124].copy_from_slice(b"0000144\0");
	archive[136..148].copy_from_slice(b"garbage!!!!\0");
	tar_record::reseal(&mut archive[..BLOCK_LEN]);

	let mut reader = TarReader::new(archive.as_slice());
	let entry = reader.advance().unwrap().unwrap();
	assert_eq!((entry.uid(), entry.gid(), entry.mtime()), (None, Some(0o144), None));
	assert_eq!(entry.size(), 7);

	let header = Header::parse((&archive[..BLOCK_LEN]).try_into().unwrap()).unwrap();
	assert_eq!((header.uid, header.gid, header.mtime), (None, Some(0o144), None));
}


#[test]
fn test_misplaced_long_link() {
	let target = b"target\0";
	let mut archive = Vec::new();
	let meta = EntryMeta {
		size: target.len() as u64,
		..EntryMeta::new("././@LongLink", EntryKind::PendingLongLink)
	};
	tar_record::push_entry(&mut archive, &meta, target);
	tar_record::push_file(&mut archive, "file", b"content");
	write_end(&mut archive);

	let mut reader = TarReader::new(archive.as_slice());
	assert!(matches!(reader.advance(), Err(TarError::MisplacedLongLink)));
	assert_eq!(reader.entry().kind(), EntryKind::Error);
}


/// Modifies the first header of a single-file archive
fn corrupt(modify: impl FnOnce(&mut [u8])) -> Result<Vec<Record>, TarError> {
	let mut archive = tar_record::archive(&[("file", &b"content"[..])]);
	modify(&mut archive[..BLOCK_LEN]);
	tar_record::read_chunked(archive.as_slice())
}


#[test]
fn test_invalid_headers() {
	let result = corrupt(|block| {
		block[156] = b'3';
		tar_record::reseal(block);
	});
	assert!(matches!(result, Err(TarError::InvalidTypeflag(b'3'))));

	let result = corrupt(|block| {
		block[124..136].copy_from_slice(&[0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 7]);
		tar_record::reseal(block);
	});
	assert!(matches!(result, Err(TarError::UnsupportedEncoding{ field: "size" })));

	let result = corrupt(|block| {
		block[100..108].copy_from_slice(b"00006x4\0");
		tar_record::reseal(block);
	});
	assert!(matches!(result, Err(TarError::ParseError{ field: "mode" })));

	let result = corrupt(|block| {
		block[124..136].fill(0);
		tar_record::reseal(block);
	});
	assert!(matches!(result, Err(TarError::ParseError{ field: "size" })));

	let result = corrupt(|block| {
		block[0] = 0xff;
		tar_record::reseal(block);
	});
	assert!(matches!(result, Err(TarError::NotUtf8{ field: "name" })));

	let result = corrupt(|block| block[0] = b'F');
	assert!(matches!(result, Err(TarError::ChecksumMismatch{ .. })));
}


#[test]
fn test_api_misuse() {
	let archive = tar_record::archive(&[("file", &b"content"[..]), ("next", &b""[..])]);
	let mut reader = TarReader::new(archive.as_slice());
	assert!(matches!(reader.read_content_chunk(), Err(TarError::ApiMisuse(_))));

	// Advancing over unread content is refused without breaking the reader
	assert!(reader.advance().unwrap().is_some());
	assert!(matches!(reader.advance(), Err(TarError::ApiMisuse(_))));
	assert_eq!(reader.entry().kind(), EntryKind::File);

	let mut content = Vec::new();
	reader.read_content_whole(&mut content).unwrap();
	assert_eq!(content, b"content");
	assert_eq!(reader.advance().unwrap().map(|e| e.path().to_string()), Some("next".to_string()));
	assert!(matches!(reader.skip_file(), Ok(())));
	assert!(reader.advance().unwrap().is_none());

	// The memory API refuses content reads without a file
	let mut state = TarState::new();
	let mut mem = &archive[..];
	assert!(matches!(state.content_mem(&mut mem), Err(TarError::ApiMisuse(_))));
	assert_eq!(mem.len(), archive.len());
}


#[test]
fn test_restart() {
	let broken = tar_record::archive(&[("file", &b"content"[..])]);
	let broken = &broken[..BLOCK_LEN + 3];
	let archive = tar_record::archive(&[("other", &b"data"[..])]);

	let mut reader = TarReader::new(broken);
	assert!(reader.advance().unwrap().is_some());
	assert!(reader.skip_file().is_err());
	assert_eq!(reader.entry().kind(), EntryKind::Error);

	// A restarted reader starts over on the new archive
	let previous = reader.restart(archive.as_slice());
	assert!(previous.is_empty());
	let entry = reader.advance().unwrap().unwrap();
	assert_eq!((entry.kind(), entry.path(), entry.size()), (EntryKind::File, "other", 4));

	let mut content = Vec::new();
	reader.read_content_whole(&mut content).unwrap();
	assert_eq!(content, b"data");
	assert!(reader.advance().unwrap().is_none());

	let rest = reader.release();
	assert!(rest.is_empty());
}


#[test]
fn test_state_restart_and_release() {
	let archive = tar_record::archive(&[("file", &b"content"[..])]);

	let mut state = TarState::new();
	let mut mem = &archive[..];
	assert!(matches!(state.update_mem(&mut mem), Ok(Advance::Entry(_))));

	state.release();
	assert!(matches!(state.update_mem(&mut mem), Err(TarError::ApiMisuse(_))));

	state.restart();
	assert_eq!(state.entry().kind(), EntryKind::Error);
	let mut mem = &archive[..];
	match state.update_mem(&mut mem).unwrap() {
		Advance::Entry(entry) => assert_eq!(entry.path(), "file"),
		other => panic!("unexpected result {:?}", other)
	}
}
