// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The [`Frame`] buffer: the transport unit shared by every pipeline stage.
//!
//! A frame owns a [`BackingStore`] and exposes a payload *view* into it.
//! The view can be narrowed for free (dropping leading bytes, truncating),
//! which is what makes header stripping and prerolling zero-copy; growing
//! the view goes through [`Frame::resize`], which slides the view in place
//! whenever the store has spare room and only copies as a last resort.

use std::fs::File;
use std::num::NonZeroUsize;
use std::ops::BitAnd;
use std::ops::BitOr;
use std::ops::BitOrAssign;
use std::os::fd::AsFd;
use std::ptr::NonNull;

use bytes::Bytes;
use nix::fcntl::OFlag;
use nix::libc::c_void;
use nix::sys::mman::mmap;
use nix::sys::mman::munmap;
use nix::sys::mman::shm_open;
use nix::sys::mman::MapFlags;
use nix::sys::mman::ProtFlags;
use nix::sys::stat::Mode;
use thiserror::Error;

use crate::Ticks;

/// Bitmask attributes of a [`Frame`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameFlags(pub u32);

impl FrameFlags {
    /// The content doesn't follow the last frame of the stream.
    pub const DISCONTINUITY: FrameFlags = FrameFlags(1 << 0);
    /// Intra picture.
    pub const TYPE_I: FrameFlags = FrameFlags(1 << 1);
    /// Predicted picture.
    pub const TYPE_P: FrameFlags = FrameFlags(1 << 2);
    /// Bi-predicted picture.
    pub const TYPE_B: FrameFlags = FrameFlags(1 << 3);
    /// Mixed picture types within one frame.
    pub const TYPE_PB: FrameFlags = FrameFlags(1 << 4);
    /// Stream header material, no actual sample data.
    pub const HEADER: FrameFlags = FrameFlags(1 << 5);
    /// The last frame of a sequence.
    pub const END_OF_SEQUENCE: FrameFlags = FrameFlags(1 << 6);
    /// Payload is scrambled.
    pub const SCRAMBLED: FrameFlags = FrameFlags(1 << 7);
    /// Decode but do not present.
    pub const PREROLL: FrameFlags = FrameFlags(1 << 8);
    /// Payload is known to be damaged.
    pub const CORRUPTED: FrameFlags = FrameFlags(1 << 9);
    /// The frame ends an access unit.
    pub const AEU_END: FrameFlags = FrameFlags(1 << 10);
    /// Interlaced picture, top field stored first.
    pub const TOP_FIELD_FIRST: FrameFlags = FrameFlags(1 << 11);
    /// Interlaced picture, bottom field stored first.
    pub const BOTTOM_FIELD_FIRST: FrameFlags = FrameFlags(1 << 12);
    /// The frame carries one field, not a whole picture.
    pub const SINGLE_FIELD: FrameFlags = FrameFlags(1 << 13);

    /// All the interlacing-related bits.
    pub const INTERLACE_MASK: FrameFlags = FrameFlags(
        Self::TOP_FIELD_FIRST.0 | Self::BOTTOM_FIELD_FIRST.0 | Self::SINGLE_FIELD.0,
    );
    /// Range reserved for use by the module that produced the frame. Never
    /// interpreted by this crate and not preserved across pipeline stages.
    pub const PRIVATE_MASK: FrameFlags = FrameFlags(0xff00_0000);

    pub fn contains(self, other: FrameFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: FrameFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: FrameFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for FrameFlags {
    type Output = FrameFlags;

    fn bitor(self, rhs: FrameFlags) -> FrameFlags {
        FrameFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for FrameFlags {
    fn bitor_assign(&mut self, rhs: FrameFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for FrameFlags {
    type Output = FrameFlags;

    fn bitand(self, rhs: FrameFlags) -> FrameFlags {
        FrameFlags(self.0 & rhs.0)
    }
}

/// Externally-owned memory usable as a frame store.
///
/// The implementor remains responsible for releasing the memory, which it
/// does from its `Drop` implementation.
pub trait CustomStore: Send {
    fn as_slice(&self) -> &[u8];
    fn as_mut_slice(&mut self) -> &mut [u8];
}

/// A region obtained from `mmap(2)`, unmapped on drop.
#[derive(Debug)]
pub struct MmapStore {
    ptr: NonNull<c_void>,
    len: usize,
}

// The mapping is exclusively owned and page-backed memory has no thread
// affinity.
unsafe impl Send for MmapStore {}

impl MmapStore {
    fn as_slice(&self) -> &[u8] {
        // Safe because the mapping covers `len` bytes and lives as long as
        // `self`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr() as *const u8, self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // Safe because the mapping is writable (PROT_WRITE, private or
        // shared) and exclusively owned.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr() as *mut u8, self.len) }
    }
}

impl Drop for MmapStore {
    fn drop(&mut self) {
        // Safe because the pointer and length are the ones returned by
        // mmap() and the mapping has not been unmapped before.
        if let Err(e) = unsafe { munmap(self.ptr, self.len) } {
            log::error!("munmap of frame store failed: {}", e);
        }
    }
}

/// The memory behind a [`Frame`].
///
/// One frame type, many storage origins: dropping the store is the
/// storage-agnostic release, replacing the C-style release callback.
pub enum BackingStore {
    /// Plain heap allocation.
    Heap(Box<[u8]>),
    /// File-backed private mapping.
    Mmap(MmapStore),
    /// POSIX shared memory attach (shared mapping).
    Shm(MmapStore),
    /// Memory owned by somebody else, behind a trait object.
    Custom(Box<dyn CustomStore>),
}

impl BackingStore {
    pub fn capacity(&self) -> usize {
        self.as_slice().len()
    }

    fn as_slice(&self) -> &[u8] {
        match self {
            BackingStore::Heap(b) => b,
            BackingStore::Mmap(m) | BackingStore::Shm(m) => m.as_slice(),
            BackingStore::Custom(c) => c.as_slice(),
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            BackingStore::Heap(b) => b,
            BackingStore::Mmap(m) | BackingStore::Shm(m) => m.as_mut_slice(),
            BackingStore::Custom(c) => c.as_mut_slice(),
        }
    }
}

impl std::fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            BackingStore::Heap(_) => "Heap",
            BackingStore::Mmap(_) => "Mmap",
            BackingStore::Shm(_) => "Shm",
            BackingStore::Custom(_) => "Custom",
        };
        f.debug_struct("BackingStore")
            .field("kind", &kind)
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("cannot map an empty file")]
    EmptyFile,
    #[error("mapping larger than the address space")]
    TooLarge,
    #[error("could not query file metadata")]
    Metadata(#[from] std::io::Error),
    #[error("mmap failed")]
    Mmap(#[from] nix::Error),
    #[error("could not open the shared memory object")]
    ShmOpen(nix::Error),
}

/// An opaque side-channel attachment, keyed by a 32-bit identifier.
///
/// The payload is never interpreted by this crate; it is metadata passed
/// between the stages that understand the identifier. Cloning shares the
/// payload by bumping its reference count.
#[derive(Clone, Debug)]
pub struct Ancillary {
    id: u32,
    payload: Bytes,
}

impl Ancillary {
    pub fn new(id: u32, payload: Bytes) -> Ancillary {
        Ancillary { id, payload }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// A single-owner binary buffer with timing metadata.
///
/// Ownership is explicit: passing a frame into a chain or a FIFO is a
/// transfer, not a share. Only [`Ancillary`] entries are genuinely shared,
/// through their reference count.
#[derive(Debug)]
pub struct Frame {
    storage: BackingStore,
    /// Start of the payload view within the store.
    offset: usize,
    /// Length of the payload view.
    len: usize,
    pub flags: FrameFlags,
    /// Number of audio samples carried, when the frame holds audio.
    pub sample_count: u32,
    pub pts: Option<Ticks>,
    pub dts: Option<Ticks>,
    pub duration: Option<Ticks>,
    ancillary: Vec<Ancillary>,
}

impl Frame {
    /// Allocates a zero-filled heap-backed frame of `size` bytes.
    pub fn alloc(size: usize) -> Frame {
        Frame::from_vec(vec![0u8; size])
    }

    /// Wraps an existing heap allocation without copying it.
    pub fn from_vec(data: Vec<u8>) -> Frame {
        let storage = BackingStore::Heap(data.into_boxed_slice());
        Frame::from_store(storage)
    }

    /// Wraps externally-owned memory behind a [`CustomStore`].
    pub fn custom(store: Box<dyn CustomStore>) -> Frame {
        Frame::from_store(BackingStore::Custom(store))
    }

    /// Maps a whole file into a private copy-on-write store.
    pub fn map_file(file: &File) -> Result<Frame, MapError> {
        let len = usize::try_from(file.metadata()?.len()).map_err(|_| MapError::TooLarge)?;
        let store = Frame::map_fd(file, len, MapFlags::MAP_PRIVATE)?;
        Ok(Frame::from_store(BackingStore::Mmap(store)))
    }

    /// Attaches `len` bytes of a shared memory object as a shared mapping.
    pub fn from_shm_fd<F: AsFd>(fd: &F, len: usize) -> Result<Frame, MapError> {
        let store = Frame::map_fd(fd, len, MapFlags::MAP_SHARED)?;
        Ok(Frame::from_store(BackingStore::Shm(store)))
    }

    /// Opens the named POSIX shared memory object and attaches `len` bytes
    /// of it.
    pub fn shm_open_attach(name: &str, len: usize) -> Result<Frame, MapError> {
        let fd = shm_open(name, OFlag::O_RDWR, Mode::empty()).map_err(MapError::ShmOpen)?;
        Frame::from_shm_fd(&fd, len)
    }

    fn map_fd<F: AsFd>(fd: &F, len: usize, flags: MapFlags) -> Result<MmapStore, MapError> {
        let nz_len = NonZeroUsize::new(len).ok_or(MapError::EmptyFile)?;

        // Safe because we map a fresh region at a kernel-chosen address and
        // hand its unique ownership to the returned store.
        let ptr = unsafe {
            mmap(
                None,
                nz_len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                flags,
                fd,
                0,
            )?
        };

        Ok(MmapStore { ptr, len })
    }

    fn from_store(storage: BackingStore) -> Frame {
        let len = storage.capacity();
        Frame {
            storage,
            offset: 0,
            len,
            flags: FrameFlags::default(),
            sample_count: 0,
            pts: None,
            dts: None,
            duration: None,
            ancillary: Vec::new(),
        }
    }

    /// The payload view.
    pub fn payload(&self) -> &[u8] {
        &self.storage.as_slice()[self.offset..self.offset + self.len]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.storage.as_mut_slice()[self.offset..self.offset + self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total capacity of the backing store.
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Spare bytes before the payload view.
    pub fn headroom(&self) -> usize {
        self.offset
    }

    /// Spare bytes after the payload view.
    pub fn tailroom(&self) -> usize {
        self.capacity() - self.offset - self.len
    }

    /// Drops `n` leading payload bytes without touching the store.
    ///
    /// Panics if `n` exceeds the payload length.
    pub fn trim_front(&mut self, n: usize) {
        assert!(n <= self.len);
        self.offset += n;
        self.len -= n;
    }

    /// Shrinks the payload to `n` bytes. Growing must go through
    /// [`Frame::resize`] instead, since the store may have no spare room.
    ///
    /// Panics if `n` exceeds the payload length.
    pub fn truncate(&mut self, n: usize) {
        assert!(n <= self.len);
        self.len = n;
    }

    /// Reshapes the payload: a positive `head` reserves that many zeroed
    /// bytes before the current payload, a negative one drops up to that
    /// many leading bytes; the remaining body is then truncated or
    /// zero-extended to `body` bytes.
    ///
    /// Slides the view within the existing store whenever it fits, and only
    /// otherwise allocates a fresh heap store (converting any backing kind
    /// to heap) and copies the surviving payload.
    pub fn resize(&mut self, head: isize, body: usize) {
        if head < 0 {
            let trim = std::cmp::min(head.unsigned_abs(), self.len);
            self.trim_front(trim);
        }
        let head = std::cmp::max(head, 0) as usize;
        let kept = std::cmp::min(self.len, body);
        let total = head + body;

        let in_place = self.offset >= head && self.offset - head + total <= self.capacity();
        if in_place {
            let new_offset = self.offset - head;
            let store = self.storage.as_mut_slice();
            store[new_offset..new_offset + head].fill(0);
            store[new_offset + head + kept..new_offset + total].fill(0);
            self.offset = new_offset;
            self.len = total;
        } else {
            let mut data = vec![0u8; total];
            data[head..head + kept].copy_from_slice(&self.payload()[..kept]);
            self.storage = BackingStore::Heap(data.into_boxed_slice());
            self.offset = 0;
            self.len = total;
        }
    }

    /// Attaches `entry`, replacing any prior attachment with the same id.
    /// The replaced entry's reference is dropped, not leaked.
    pub fn attach_ancillary(&mut self, entry: Ancillary) {
        match self.ancillary.iter_mut().find(|a| a.id == entry.id) {
            Some(slot) => *slot = entry,
            None => self.ancillary.push(entry),
        }
    }

    /// Looks up the attachment stored under `id`, if any.
    pub fn ancillary(&self, id: u32) -> Option<&Ancillary> {
        self.ancillary.iter().find(|a| a.id == id)
    }

    /// Copies flags, sample count, timestamps and ancillary attachments from
    /// `src`. Attachments are shared, not duplicated.
    pub fn copy_properties(&mut self, src: &Frame) {
        self.flags = src.flags;
        self.sample_count = src.sample_count;
        self.pts = src.pts;
        self.dts = src.dts;
        self.duration = src.duration;
        self.ancillary = src.ancillary.clone();
    }

    /// Returns an independent, mutable copy: properties are copied and the
    /// payload bytes are deep-copied into a fresh heap store.
    pub fn duplicate(&self) -> Frame {
        let mut out = Frame::from_vec(self.payload().to_vec());
        out.copy_properties(self);
        out
    }
}
