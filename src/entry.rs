use crate::{ TarError, header::raw::TypeFlag };


/// The kind of an archive entry
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub enum EntryKind {
	/// A directory
	Directory,
	/// A regular file followed by its content
	File,
	/// A symbolic link
	Symlink,
	/// A hard link to an entry stored earlier in the archive
	Hardlink,
	/// Two consecutive zero blocks ended the archive
	EndOfArchive,
	/// The stream is corrupt or the state has not decoded anything yet
	#[default]
	Error,
	/// A GNU long-name record whose name has not been attached to an entry yet
	PendingLongName,
	/// A GNU long-link record whose target has not been attached to an entry yet
	PendingLongLink
}
impl EntryKind {
	/// Maps a header typeflag to the entry kind
	pub fn from_typeflag(typeflag: u8) -> Result<Self, TarError> {
		match typeflag {
			TypeFlag::REGULAR | TypeFlag::REGULAR_OLD => Ok(Self::File),
			TypeFlag::DIRECTORY => Ok(Self::Directory),
			TypeFlag::SYMLINK => Ok(Self::Symlink),
			TypeFlag::HARDLINK => Ok(Self::Hardlink),
			TypeFlag::GNU_LONGNAME => Ok(Self::PendingLongName),
			TypeFlag::GNU_LONGLINK => Ok(Self::PendingLongLink),
			other => Err(TarError::InvalidTypeflag(other))
		}
	}
	/// The typeflag written for this kind
	///
	/// _Note: `EndOfArchive` and `Error` have no header representation_
	pub fn typeflag(self) -> Result<u8, TarError> {
		match self {
			Self::File => Ok(TypeFlag::REGULAR),
			Self::Directory => Ok(TypeFlag::DIRECTORY),
			Self::Symlink => Ok(TypeFlag::SYMLINK),
			Self::Hardlink => Ok(TypeFlag::HARDLINK),
			Self::PendingLongName => Ok(TypeFlag::GNU_LONGNAME),
			Self::PendingLongLink => Ok(TypeFlag::GNU_LONGLINK),
			Self::EndOfArchive | Self::Error => Err(TarError::ApiMisuse("this entry kind has no header"))
		}
	}

	/// Whether entries of this kind carry a link target
	pub fn is_link(self) -> bool {
		matches!(self, Self::Symlink | Self::Hardlink)
	}
}


/// The entry most recently decoded by a reader
///
/// The path and link buffers belong to the reader and are reused for every entry, so an `Entry` is
/// only valid until the reader advances.
#[derive(Debug, Default, Clone)]
pub struct Entry {
	pub(crate) kind: EntryKind,
	pub(crate) path: String,
	pub(crate) link: String,
	pub(crate) mode: u64,
	pub(crate) uid: Option<u64>,
	pub(crate) gid: Option<u64>,
	pub(crate) mtime: Option<u64>,
	pub(crate) size: u64,
	pub(crate) bytes_read: u64
}
impl Entry {
	/// The entry kind
	pub fn kind(&self) -> EntryKind {
		self.kind
	}
	/// The entry path; directories end with a separator
	pub fn path(&self) -> &str {
		&self.path
	}
	/// The link target of symlinks and hardlinks
	pub fn link(&self) -> Option<&str> {
		match self.kind.is_link() {
			true => Some(&self.link),
			false => None
		}
	}
	/// The access mode bits (e.g. 0o644)
	pub fn mode(&self) -> u64 {
		self.mode
	}
	/// The owner UID if the header recorded one
	pub fn uid(&self) -> Option<u64> {
		self.uid
	}
	/// The owner GID if the header recorded one
	pub fn gid(&self) -> Option<u64> {
		self.gid
	}
	/// The modification time in seconds since the epoch if the header recorded one
	pub fn mtime(&self) -> Option<u64> {
		self.mtime
	}
	/// The content size of a file; zero for every other kind
	pub fn size(&self) -> u64 {
		self.size
	}
	/// The amount of content bytes already handed out for the current file
	pub fn bytes_read(&self) -> u64 {
		self.bytes_read
	}

	/// Empties the buffers while keeping their allocations
	pub(crate) fn clear(&mut self) {
		self.path.clear();
		self.link.clear();
		self.mode = 0;
		self.uid = None;
		self.gid = None;
		self.mtime = None;
		self.size = 0;
		self.bytes_read = 0;
	}
}
