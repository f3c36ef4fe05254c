//! External contracts the boot orchestrator is built on: RAM-region allocation,
//! uImage parsing, devicetree flattening, and raw file access. None of these are
//! implemented here. The host application supplies them, and this crate's own
//! tests use fakes from `testutil`.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::Error;

/// Classification of a boot payload file, the Rust analogue of the legacy
/// `enum filetype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Unknown,
    Uimage,
    Oftree,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileType::Unknown => "unknown",
            FileType::Uimage => "uImage",
            FileType::Oftree => "oftree",
        };
        f.write_str(s)
    }
}

bitflags::bitflags! {
    /// The three independent boot-time switches the original CLI exposed as
    /// separate `-v`/`-f`/`-d`-style options.
    #[repr(transparent)]
    #[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
    pub struct BootFlags: u32 {
        /// Verify the uImage payload CRC before trusting it.
        const VERIFY = 1 << 0;
        /// Proceed even if the OS filetype could not be classified.
        const FORCE = 1 << 1;
        /// Do everything short of invoking the matched handler.
        const DRYRUN = 1 << 2;
    }
}

/// Legacy uImage `ih_arch` values this crate recognises when comparing a payload's
/// declared architecture against the build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImageArch {
    Invalid = 0,
    Arm = 2,
    X86 = 3,
    PowerPc = 4,
    Mips = 5,
    RiscV = 18,
    Arm64 = 22,
    X86_64 = 23,
}

#[cfg(target_arch = "aarch64")]
pub const TARGET_ARCH: ImageArch = ImageArch::Arm64;
#[cfg(target_arch = "x86_64")]
pub const TARGET_ARCH: ImageArch = ImageArch::X86_64;
#[cfg(target_arch = "riscv64")]
pub const TARGET_ARCH: ImageArch = ImageArch::RiscV;
#[cfg(target_arch = "arm")]
pub const TARGET_ARCH: ImageArch = ImageArch::Arm;
#[cfg(target_arch = "x86")]
pub const TARGET_ARCH: ImageArch = ImageArch::X86;

/// uImage payload type carried in the header; only the multi-file marker matters
/// to this crate (it only changes what gets logged).
pub const IH_TYPE_MULTI: u8 = 4;

/// An opaque handle to a parsed uImage, minted by a [`UimageSource`] implementation.
/// Two fields of [`crate::bootm::image::ImageData`] may hold the same handle when
/// the OS and initrd paths alias the same multi-file image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UimageHandle(pub u64);

/// Fields of a uImage header this crate inspects.
#[derive(Debug, Clone, Copy)]
pub struct UimageHeader {
    /// Operating-system identifier, matched against [`crate::bootm::handler::ImageHandler::ih_os`].
    pub ih_os: u8,
    /// Declared target architecture; compared against [`TARGET_ARCH`].
    pub ih_arch: u8,
    /// Payload type, e.g. [`IH_TYPE_MULTI`].
    pub ih_type: u8,
    /// Default load address, or [`crate::bootm::image::SOME_ADDRESS`] to mean "use mine".
    pub ih_load: u64,
    pub ih_ep: u64,
}

/// Where a RAM region should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdramAddress {
    Exact(u64),
    Anywhere,
}

/// A claim on a physical address range, released explicitly via [`SdramAllocator::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdramRegion {
    pub start: u64,
    pub end: u64,
}

impl SdramRegion {
    #[must_use]
    pub fn size(&self) -> usize {
        (self.end - self.start) as usize
    }
}

/// The RAM-region allocator contract (`request_sdram_region`/`release_sdram_region`).
pub trait SdramAllocator {
    fn request(&mut self, name: &str, address: SdramAddress, size: usize) -> Result<SdramRegion, Error>;

    fn release(&mut self, region: SdramRegion);

    /// Copies `data` into a previously requested region. Standing in for the
    /// original's direct `memcpy` to a physical address, which this crate cannot
    /// perform itself without knowing the host's memory-mapping scheme.
    fn write(&mut self, region: &SdramRegion, data: &[u8]) -> Result<(), Error>;
}

/// uImage container parsing (`uimage_open`/`uimage_verify`/`uimage_load_to_sdram`).
pub trait UimageSource {
    fn open(&mut self, path: &str) -> Result<UimageHandle, Error>;

    fn verify(&mut self, handle: UimageHandle) -> Result<(), Error>;

    fn header(&self, handle: UimageHandle) -> UimageHeader;

    fn load_to_sdram<A: SdramAllocator>(
        &mut self,
        handle: UimageHandle,
        index: u32,
        addr: SdramAddress,
        alloc: &mut A,
    ) -> Result<SdramRegion, Error>;

    /// Loads payload `index` into a plain buffer instead of SDRAM, used when a
    /// devicetree is embedded inside an OS or initrd multi-file uImage.
    fn load_to_buf(&mut self, handle: UimageHandle, index: u32) -> Result<Vec<u8>, Error>;

    fn close(&mut self, handle: UimageHandle);
}

/// An in-memory, mutable devicetree, produced by [`DeviceTreeSource::unflatten`] and
/// consumed by [`DeviceTreeSource::fixed_flat`]. The representation is left to the
/// implementation; this crate only ever passes it between the two.
pub struct DeviceTree {
    pub(crate) raw: Vec<u8>,
    pub(crate) initrd: Option<(u64, u64)>,
    pub(crate) memreserves: Vec<(u64, u64)>,
}

/// Devicetree flattening/unflattening (`of_unflatten_dtb`/`of_get_fixed_tree`).
pub trait DeviceTreeSource {
    fn unflatten(&mut self, blob: &[u8]) -> Result<DeviceTree, Error>;

    fn fixed_flat(&mut self, tree: &DeviceTree) -> Result<Vec<u8>, Error>;

    fn add_initrd(&mut self, tree: &mut DeviceTree, start: u64, end: u64);

    fn add_memreserve(&mut self, tree: &mut DeviceTree, start: u64, end: u64);
}

/// Raw file access and name-based type sniffing (`file_name_detect_type`/`read_file`/
/// `file_to_sdram`), for payloads that are not wrapped in a uImage container.
pub trait FileSource {
    fn detect_by_name(&self, path: &str) -> FileType;

    fn read_to_vec(&mut self, path: &str) -> Result<Vec<u8>, Error>;

    fn stream_to_sdram<A: SdramAllocator>(
        &mut self,
        path: &str,
        addr: SdramAddress,
        alloc: &mut A,
    ) -> Result<SdramRegion, Error>;
}

/// Splits a `name[@index]` image selector into its path and numeric index, the
/// Rust analogue of `bootm_image_name_and_no`.
pub fn split_name_and_index(name: &str) -> (String, u32) {
    match name.split_once('@') {
        Some((path, idx)) => (String::from(path), idx.parse().unwrap_or(0)),
        None => (String::from(name), 0),
    }
}
