//! The boot orchestrator entry point: selects an image handler for a configured
//! OS payload, stages its initrd and devicetree, and hands off control.

use alloc::string::String;
use log::{info, warn};

use crate::bootm::collaborators::{
    split_name_and_index, BootFlags, DeviceTreeSource, FileSource, FileType, SdramAllocator, UimageSource,
};
use crate::bootm::handler::HandlerRegistry;
use crate::bootm::image::{ImageData, INVALID_ADDRESS, SOME_ADDRESS};
use crate::env::EnvStore;
use crate::error::Error;

/// Globals `bootm_boot` always has an opinion on, regardless of the `initrd` feature.
const BOOTM_GLOBALS: &[&str] = &["bootm.image", "bootm.image.loadaddr", "bootm.oftree"];
/// Globals only meaningful when an initrd can be staged at all.
const BOOTM_INITRD_GLOBALS: &[&str] = &["bootm.initrd", "bootm.initrd.loadaddr"];

/// Registers the `bootm.*` environment globals with empty defaults, mirroring the
/// original's `bootm_init()` (`globalvar_add_simple`, run as a `late_initcall`).
/// Leaves any global that already has a value untouched; this is meant to run once,
/// early, before anything has had a chance to set one.
pub fn bootm_init(store: &mut dyn EnvStore) {
    for name in BOOTM_GLOBALS {
        register_default(store, name);
    }
    if cfg!(feature = "initrd") {
        for name in BOOTM_INITRD_GLOBALS {
            register_default(store, name);
        }
    }
}

fn register_default(store: &mut dyn EnvStore, name: &str) {
    if store.get(name).is_none() {
        store.set(name, "");
    }
}

/// What the caller wants booted, parsed from CLI or environment variables before
/// reaching this crate (the CLI itself is out of scope).
pub struct BootmData {
    pub os_file: Option<String>,
    pub initrd_file: Option<String>,
    pub oftree_file: Option<String>,
    pub os_address: u64,
    pub initrd_address: u64,
    pub os_entry: u64,
    pub flags: BootFlags,
    pub verbose: u32,
}

impl Default for BootmData {
    fn default() -> Self {
        BootmData {
            os_file: None,
            initrd_file: None,
            oftree_file: None,
            os_address: SOME_ADDRESS,
            initrd_address: SOME_ADDRESS,
            os_entry: SOME_ADDRESS,
            flags: BootFlags::empty(),
            verbose: 0,
        }
    }
}

/// Selects, loads, and hands off a bootable image.
///
/// Does not return on success in a production build: the matched handler is
/// expected to diverge (e.g. jump to the loaded kernel) rather than construct an
/// `Ok(())`. The `Result<(), Error>` signature exists so a hosted test build can
/// observe success, since nothing in this crate can make a process truly diverge;
/// real handlers built on top of it are not expected to return at all.
pub fn bootm_boot<U, A, T, F>(
    bootm_data: &BootmData,
    uimage: U,
    alloc: A,
    dt: T,
    files: F,
    handlers: &HandlerRegistry<U, A, T, F>,
) -> Result<(), Error>
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    let Some(os_file) = bootm_data.os_file.as_deref() else {
        warn!("no image given");
        return Err(Error::InvalidArgument);
    };

    let (os_path, os_num) = split_name_and_index(os_file);
    let (oftree_path, oftree_num) = match bootm_data.oftree_file.as_deref() {
        Some(name) => {
            let (p, n) = split_name_and_index(name);
            (Some(p), n)
        }
        None => (None, 0),
    };
    let (initrd_path, initrd_num) = match bootm_data.initrd_file.as_deref() {
        Some(name) => {
            let (p, n) = split_name_and_index(name);
            (Some(p), n)
        }
        None => (None, 0),
    };

    let mut data = ImageData {
        uimage,
        alloc,
        dt,
        files,
        os_file: os_path,
        os_num,
        initrd_file: initrd_path,
        initrd_num,
        oftree_file: oftree_path,
        oftree_num,
        flags: bootm_data.flags,
        verbose: bootm_data.verbose,
        os_address: bootm_data.os_address,
        initrd_address: bootm_data.initrd_address,
        os_entry: bootm_data.os_entry,
        os: None,
        initrd: None,
        initrd_is_alias: false,
        of_root_node: None,
        os_res: None,
        initrd_res: None,
        oftree_res: None,
    };

    let os_type = data.files.detect_by_name(&data.os_file);
    if os_type == FileType::Unknown && !data.flags.contains(BootFlags::FORCE) {
        warn!("unknown OS filetype (try -f)");
        return Err(Error::InvalidArgument);
    }

    if os_type == FileType::Uimage {
        open_os_uimage(&mut data)?;
    }

    let mut initrd_type = FileType::Unknown;
    if cfg!(feature = "initrd") {
        if let Some(initrd_file) = data.initrd_file.clone() {
            initrd_type = data.files.detect_by_name(&initrd_file);
            if initrd_type == FileType::Uimage {
                open_initrd_uimage(&mut data, &initrd_file)?;
            }
        }
    }

    info!("loading {} '{}'", os_type, data.os_file);
    if os_type == FileType::Uimage && initrd_type == FileType::Uimage {
        info!("multifile image {}", data.os_num);
    }

    if cfg!(feature = "devicetree") {
        if let Some(oftree_file) = data.oftree_file.clone() {
            let oftree_num = data.oftree_num;
            open_oftree(&mut data, &oftree_file, oftree_num)?;
        }
    }

    if data.os_address == SOME_ADDRESS {
        data.os_address = INVALID_ADDRESS;
    }

    let ih_os = data
        .os
        .map(|handle| data.uimage.header(handle).ih_os)
        .unwrap_or(0);
    let Some(handler) = handlers.find(os_type, ih_os) else {
        warn!("no image handler found for image type {os_type}");
        return Err(Error::NoDevice);
    };

    if data.verbose > 0 {
        print_info(&data);
        info!("passing control to {} handler", handler.name);
    }

    if data.flags.contains(BootFlags::DRYRUN) {
        return Ok(());
    }

    (handler.boot)(&mut data)
}

fn open_os_uimage<U, A, T, F>(data: &mut ImageData<U, A, T, F>) -> Result<(), Error>
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    let handle = data.uimage.open(&data.os_file)?;
    if data.flags.contains(BootFlags::VERIFY) {
        if let Err(err) = data.uimage.verify(handle) {
            warn!("checking data crc failed");
            data.uimage.close(handle);
            return Err(err);
        }
    }

    let header = data.uimage.header(handle);
    if header.ih_arch != super::collaborators::TARGET_ARCH as u8 {
        warn!("unsupported architecture 0x{:x}", header.ih_arch);
        data.uimage.close(handle);
        return Err(Error::InvalidArgument);
    }

    if data.os_address == SOME_ADDRESS {
        data.os_address = header.ih_load;
    }

    data.os = Some(handle);
    Ok(())
}

fn open_initrd_uimage<U, A, T, F>(data: &mut ImageData<U, A, T, F>, initrd_file: &str) -> Result<(), Error>
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    if initrd_file == data.os_file {
        data.initrd = data.os;
        data.initrd_is_alias = true;
        return Ok(());
    }

    let handle = data.uimage.open(initrd_file)?;
    if data.flags.contains(BootFlags::VERIFY) {
        if let Err(_err) = data.uimage.verify(handle) {
            warn!("checking data crc failed");
        }
    }
    data.initrd = Some(handle);
    Ok(())
}

fn open_oftree<U, A, T, F>(data: &mut ImageData<U, A, T, F>, oftree_file: &str, oftree_num: u32) -> Result<(), Error>
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    info!("loading devicetree from '{oftree_file}'");

    let ft = data.files.detect_by_name(oftree_file);
    let blob = if ft == FileType::Uimage {
        if oftree_file == data.os_file {
            data.uimage.load_to_buf(data.os.ok_or(Error::NoDevice)?, oftree_num)?
        } else if Some(oftree_file) == data.initrd_file.as_deref() {
            data.uimage.load_to_buf(data.initrd.ok_or(Error::NoDevice)?, oftree_num)?
        } else {
            let handle = data.uimage.open(oftree_file)?;
            let buf = data.uimage.load_to_buf(handle, oftree_num);
            data.uimage.close(handle);
            buf?
        }
    } else {
        data.files.read_to_vec(oftree_file)?
    };

    let tree = data.dt.unflatten(&blob).map_err(|_| {
        warn!("{oftree_file} is not an oftree");
        Error::InvalidArgument
    })?;
    data.of_root_node = Some(tree);
    Ok(())
}

fn print_info<U, A, T, F>(data: &ImageData<U, A, T, F>)
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    match data.os_region() {
        Some(region) => info!("OS image is at 0x{:x}-0x{:x}", region.start, region.end),
        None => info!("OS image not yet relocated"),
    }

    if let Some(initrd_file) = &data.initrd_file {
        info!("loading initrd '{initrd_file}'");
        match data.initrd_region() {
            Some(region) => info!("initrd is at 0x{:x}-0x{:x}", region.start, region.end),
            None => info!("initrd image not yet relocated"),
        }
    }
}
