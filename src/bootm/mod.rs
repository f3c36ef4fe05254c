//! Boot-image orchestration: picks an OS payload apart, stages its initrd and
//! devicetree into RAM, and hands off to whichever registered handler claims the
//! resulting image shape. See [`bootm_boot`].

pub mod collaborators;
pub mod handler;
pub mod image;
mod orchestrator;

pub use collaborators::{
    BootFlags, DeviceTree, DeviceTreeSource, FileSource, FileType, ImageArch, SdramAddress, SdramAllocator,
    SdramRegion, UimageHandle, UimageHeader, UimageSource, IH_TYPE_MULTI, TARGET_ARCH,
};
pub use handler::{HandlerRegistry, ImageHandler};
pub use image::{ImageData, INVALID_ADDRESS, SOME_ADDRESS};
pub use orchestrator::{bootm_boot, bootm_init, BootmData};
