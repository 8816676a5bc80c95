use crate::{
	TarError,
	entry::EntryKind,
	header::{ self, Header, MAX_LONG_LEN, MAX_SIZE, raw::{ BLOCK_LEN, NAME_LEN } },
	helpers::BlockExt,
	identity::IdentityLookup
};
use log::debug;
use std::borrow::Cow;


/// The name of the record carrying an overlong path
const LONG_NAME: &str = "././@LongName";
/// The name of the record carrying an overlong link target
const LONG_LINK: &str = "././@LongLink";
/// The path separator
const SEPARATOR: char = '/';


/// The metadata of an entry to write
#[derive(Debug, Clone)]
pub struct EntryMeta<'a> {
	/// The full path; leading separators are stripped, so only directories may name the root `/`
	pub name: &'a str,
	/// The access mode bits (e.g. 0o644)
	pub mode: u64,
	/// The owner UID; ignored if `uname` is set
	pub uid: u64,
	/// The owner GID; ignored if `gname` is set
	pub gid: u64,
	/// The owner's user name, which takes precedence over `uid`
	pub uname: Option<&'a str>,
	/// The owner's group name, which takes precedence over `gid`
	pub gname: Option<&'a str>,
	/// The content size of a file; recorded as zero for every other kind
	pub size: u64,
	/// The modification time in seconds since the epoch
	pub mtime: u64,
	/// The entry kind
	pub kind: EntryKind,
	/// The link target of symlinks and hardlinks; must be `None` for every other kind
	pub linkname: Option<&'a str>
}
impl<'a> EntryMeta<'a> {
	/// Creates the metadata for `name` owned by UID/GID 0 with all other values zero
	pub fn new(name: &'a str, kind: EntryKind) -> Self {
		Self{ name, mode: 0, uid: 0, gid: 0, uname: None, gname: None, size: 0, mtime: 0, kind, linkname: None }
	}
}


/// Writes the header(s) for `meta` to `output`
///
/// Paths and link targets that do not fit the inline fields are written as GNU long-name/long-link
/// records ahead of the actual header. The header of a file must be followed by its content and
/// [`write_padding`]. Nothing is appended if writing fails.
pub fn write_header(output: &mut Vec<u8>, meta: &EntryMeta, identity: &impl IdentityLookup)
	-> Result<(), TarError>
{
	let start = output.len();
	let result = append_header(output, meta, identity);
	if result.is_err() {
		output.truncate(start);
	}
	result
}


/// Appends zero bytes to pad content of `file_size` bytes to the next block boundary
pub fn write_padding(output: &mut Vec<u8>, file_size: u64) {
	output.resize(output.len() + file_size.block_padding() as usize, 0);
}


/// Appends the end-of-archive marker (two zero blocks)
pub fn write_end(output: &mut Vec<u8>) {
	output.resize(output.len() + 2 * BLOCK_LEN, 0);
}


fn append_header(output: &mut Vec<u8>, meta: &EntryMeta, identity: &impl IdentityLookup)
	-> Result<(), TarError>
{
	// Validate the kind and size before anything is written
	meta.kind.typeflag()?;
	let size = match meta.kind {
		EntryKind::File | EntryKind::PendingLongName | EntryKind::PendingLongLink => meta.size,
		_ => 0
	};
	if meta.linkname.is_some() && !meta.kind.is_link() {
		Err(TarError::ApiMisuse("only links have a link target"))?
	}
	if size > MAX_SIZE {
		Err(TarError::SizeTooLarge(size))?
	}

	// Resolve the owner
	let user = match meta.uname {
		Some(name) => identity.user_by_name(name)
			.ok_or_else(|| TarError::IdentityLookupFailed{ what: "user", query: name.to_string() })?,
		None => identity.user_by_id(meta.uid)
			.ok_or_else(|| TarError::IdentityLookupFailed{ what: "user", query: meta.uid.to_string() })?
	};
	let group = match meta.gname {
		Some(name) => identity.group_by_name(name)
			.ok_or_else(|| TarError::IdentityLookupFailed{ what: "group", query: name.to_string() })?,
		None => identity.group_by_id(meta.gid)
			.ok_or_else(|| TarError::IdentityLookupFailed{ what: "group", query: meta.gid.to_string() })?
	};

	// Normalize the path
	let mut name = Cow::Borrowed(meta.name.trim_start_matches(SEPARATOR));
	match meta.kind {
		// The root directory keeps its separator
		EntryKind::Directory if !name.ends_with(SEPARATOR) => name.to_mut().push(SEPARATOR),
		_ if name.is_empty() => Err(TarError::ApiMisuse("the entry name is empty"))?,
		_ => ()
	}

	let mut header = Header {
		path: name.to_string(),
		mode: meta.mode,
		uid: Some(user.id),
		gid: Some(group.id),
		size,
		mtime: Some(meta.mtime),
		kind: meta.kind,
		linkname: meta.linkname.map(str::to_string),
		uname: user.name,
		gname: group.name
	};

	// Move overlong values into extension records
	let too_long = |value: &str| value.len() as u64 + 1 > MAX_LONG_LEN;
	if too_long(&*name) {
		Err(TarError::FieldOverflow{ field: "name" })?
	}
	if meta.linkname.map_or(false, too_long) {
		Err(TarError::FieldOverflow{ field: "linkname" })?
	}
	if name.len() + 1 >= NAME_LEN {
		append_long(output, LONG_NAME, EntryKind::PendingLongName, &name, &header)?;
		header.path = header::inline_prefix(&name).to_string();
	}
	if let Some(linkname) = meta.linkname.filter(|linkname| linkname.len() + 1 >= NAME_LEN) {
		append_long(output, LONG_LINK, EntryKind::PendingLongLink, linkname, &header)?;
		header.linkname = Some(header::inline_prefix(linkname).to_string());
	}

	output.extend_from_slice(&header.serialize()?);
	debug!("wrote {:?} header for {}", meta.kind, name);
	Ok(())
}


/// Appends a long-name/long-link record carrying `value`, NUL-terminated and padded
fn append_long(output: &mut Vec<u8>, sentinel: &str, kind: EntryKind, value: &str, owner: &Header)
	-> Result<(), TarError>
{
	let size = value.len() as u64 + 1;
	let header = Header {
		path: sentinel.to_string(),
		mode: 0,
		size,
		mtime: Some(0),
		kind,
		linkname: None,
		..owner.clone()
	};

	output.extend_from_slice(&header.serialize()?);
	output.extend_from_slice(value.as_bytes());
	output.push(0);
	write_padding(output, size);
	Ok(())
}


/// What [`write_path_header`] found at a path
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PathInfo {
	/// The detected entry kind
	pub kind: EntryKind,
	/// The size reported by `lstat`
	pub size: u64
}


/// Writes the header for the file, directory or symlink at `path`
///
/// The entry is named `override_name` if given, else by `path` itself. Only the permission bits of
/// the mode are recorded. Other file types fail with `UnsupportedFileType`.
#[cfg(unix)]
pub fn write_path_header(
	output: &mut Vec<u8>, path: &std::path::Path, override_name: Option<&str>,
	identity: &impl IdentityLookup
) -> Result<PathInfo, TarError>
{
	use std::{ fs, os::unix::fs::MetadataExt };

	let stat = fs::symlink_metadata(path)?;
	let file_type = stat.file_type();
	let kind = match () {
		_ if file_type.is_file() => EntryKind::File,
		_ if file_type.is_dir() => EntryKind::Directory,
		_ if file_type.is_symlink() => EntryKind::Symlink,
		_ => Err(TarError::UnsupportedFileType(path.to_path_buf()))?
	};

	// Resolve the link target
	let target = match kind {
		EntryKind::Symlink => Some(fs::read_link(path)?),
		_ => None
	};
	let linkname = match &target {
		Some(target) => Some(target.to_str().ok_or(TarError::NotUtf8{ field: "linkname" })?),
		None => None
	};

	let name = match override_name {
		Some(name) => name,
		None => path.to_str().ok_or(TarError::NotUtf8{ field: "name" })?
	};
	let meta = EntryMeta {
		mode: u64::from(stat.mode() & 0o7777),
		uid: u64::from(stat.uid()),
		gid: u64::from(stat.gid()),
		size: stat.size(),
		mtime: u64::try_from(stat.mtime()).unwrap_or(0),
		linkname,
		..EntryMeta::new(name, kind)
	};
	write_header(output, &meta, identity)?;
	Ok(PathInfo{ kind, size: stat.size() })
}
