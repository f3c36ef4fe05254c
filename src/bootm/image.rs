//! The boot orchestrator's per-invocation context: every resource a handler might
//! need, and the `Drop` impl that guarantees all of it is released on every exit
//! path, replacing the original's `err_out:` label.

use alloc::string::String;

use crate::bootm::collaborators::{
    BootFlags, DeviceTree, DeviceTreeSource, FileSource, SdramAllocator, SdramRegion, UimageHandle, UimageSource,
};
use crate::error::Error;

/// Sentinel meaning "the caller did not ask for a specific address; use whatever
/// the image itself declares".
pub const SOME_ADDRESS: u64 = u64::MAX;
/// Sentinel meaning "no usable address is available"; loading at this address
/// always fails.
pub const INVALID_ADDRESS: u64 = u64::MAX - 1;

/// Everything the boot orchestrator assembles and every handler operates on.
///
/// Owns its collaborators by value so `Drop` can release or close whatever it
/// acquired without needing a context parameter `drop` has no way to accept.
pub struct ImageData<U, A, T, F>
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    pub(crate) uimage: U,
    pub(crate) alloc: A,
    pub(crate) dt: T,
    pub(crate) files: F,

    pub os_file: String,
    pub os_num: u32,
    pub initrd_file: Option<String>,
    pub initrd_num: u32,
    pub oftree_file: Option<String>,
    pub oftree_num: u32,

    pub flags: BootFlags,
    pub verbose: u32,

    pub os_address: u64,
    pub initrd_address: u64,
    pub os_entry: u64,

    pub(crate) os: Option<UimageHandle>,
    pub(crate) initrd: Option<UimageHandle>,
    pub(crate) initrd_is_alias: bool,
    pub(crate) of_root_node: Option<DeviceTree>,

    pub(crate) os_res: Option<SdramRegion>,
    pub(crate) initrd_res: Option<SdramRegion>,
    pub(crate) oftree_res: Option<SdramRegion>,
}

impl<U, A, T, F> ImageData<U, A, T, F>
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    #[must_use]
    pub fn os_region(&self) -> Option<SdramRegion> {
        self.os_res
    }

    #[must_use]
    pub fn initrd_region(&self) -> Option<SdramRegion> {
        self.initrd_res
    }

    #[must_use]
    pub fn oftree_region(&self) -> Option<SdramRegion> {
        self.oftree_res
    }

    /// Loads the OS payload to `addr`. Idempotent: a second call after a
    /// successful one is a no-op.
    pub fn load_os(&mut self, addr: u64) -> Result<(), Error> {
        if self.os_res.is_some() {
            return Ok(());
        }
        if addr == INVALID_ADDRESS {
            return Err(Error::InvalidArgument);
        }

        let region = if let Some(handle) = self.os {
            self.uimage
                .load_to_sdram(handle, self.os_num, super::collaborators::SdramAddress::Exact(addr), &mut self.alloc)?
        } else {
            self.files
                .stream_to_sdram(&self.os_file, super::collaborators::SdramAddress::Exact(addr), &mut self.alloc)?
        };
        self.os_res = Some(region);
        Ok(())
    }

    /// Loads the initrd payload to `addr`, if one is configured. Succeeds doing
    /// nothing when there is none (an initrd is always optional).
    pub fn load_initrd(&mut self, addr: u64) -> Result<(), Error> {
        if self.initrd_res.is_some() {
            return Ok(());
        }
        if let Some(handle) = self.initrd {
            let region = self.uimage.load_to_sdram(
                handle,
                self.initrd_num,
                super::collaborators::SdramAddress::Exact(addr),
                &mut self.alloc,
            )?;
            self.initrd_res = Some(region);
            return Ok(());
        }
        if let Some(path) = self.initrd_file.clone() {
            let region = self.files.stream_to_sdram(&path, super::collaborators::SdramAddress::Exact(addr), &mut self.alloc)?;
            self.initrd_res = Some(region);
        }
        Ok(())
    }

    /// Produces a fixed, flattened devicetree at `addr`, injecting the initrd
    /// location if one was loaded first. No-op if there is no root tree to flatten.
    pub fn load_devicetree(&mut self, addr: u64) -> Result<(), Error> {
        if self.oftree_res.is_some() {
            return Ok(());
        }
        if !cfg!(feature = "devicetree") {
            return Ok(());
        }
        let Some(tree) = self.of_root_node.as_mut() else {
            return Ok(());
        };

        if let Some(region) = self.initrd_res {
            self.dt.add_initrd(tree, region.start, region.end);
            self.dt.add_memreserve(tree, region.start, region.end);
        }

        let flat = self.dt.fixed_flat(tree)?;
        let region = self
            .alloc
            .request("oftree", super::collaborators::SdramAddress::Exact(addr), flat.len())?;
        if let Err(err) = self.alloc.write(&region, &flat) {
            self.alloc.release(region);
            return Err(err);
        }
        self.oftree_res = Some(region);
        Ok(())
    }
}

impl<U, A, T, F> Drop for ImageData<U, A, T, F>
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    fn drop(&mut self) {
        if let Some(region) = self.os_res.take() {
            self.alloc.release(region);
        }
        if let Some(region) = self.initrd_res.take() {
            self.alloc.release(region);
        }
        if let Some(region) = self.oftree_res.take() {
            self.alloc.release(region);
        }
        if self.initrd_is_alias {
            self.initrd = None;
        } else if let Some(handle) = self.initrd.take() {
            self.uimage.close(handle);
        }
        if let Some(handle) = self.os.take() {
            self.uimage.close(handle);
        }
    }
}
