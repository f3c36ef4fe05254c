//! Image handler registration and lookup. A handler is the last stop in
//! `bootm_boot`: the thing that actually hands off control for a matched image
//! type. Registration is append-only; lookup is a linear scan that favours the
//! earliest registrant on a tie, mirroring the original's intrusive list.

use alloc::vec::Vec;

use crate::bootm::collaborators::{DeviceTreeSource, FileSource, FileType, SdramAllocator, UimageSource};
use crate::bootm::image::ImageData;
use crate::error::Error;

/// A registered boot handler: what image shape it claims, and the function that
/// takes over once `bootm_boot` has fully prepared an [`ImageData`].
pub struct ImageHandler<U, A, T, F>
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    pub name: &'static str,
    pub filetype: FileType,
    /// Only consulted when `filetype == FileType::Uimage`.
    pub ih_os: u8,
    /// Not expected to return on success; see the doc note on [`crate::bootm::bootm_boot`].
    pub boot: fn(&mut ImageData<U, A, T, F>) -> Result<(), Error>,
}

/// An append-only, process-wide list of registered [`ImageHandler`]s.
pub struct HandlerRegistry<U, A, T, F>
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    handlers: Vec<ImageHandler<U, A, T, F>>,
}

impl<U, A, T, F> HandlerRegistry<U, A, T, F>
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    #[must_use]
    pub fn new() -> Self {
        HandlerRegistry { handlers: Vec::new() }
    }

    pub fn register(&mut self, handler: ImageHandler<U, A, T, F>) {
        self.handlers.push(handler);
    }

    /// Finds the first handler matching `filetype`/`ih_os`, in registration order.
    #[must_use]
    pub fn find(&self, filetype: FileType, ih_os: u8) -> Option<&ImageHandler<U, A, T, F>> {
        self.handlers.iter().find(|handler| {
            if filetype == FileType::Uimage {
                handler.ih_os == ih_os
            } else {
                handler.filetype == filetype
            }
        })
    }
}

impl<U, A, T, F> Default for HandlerRegistry<U, A, T, F>
where
    U: UimageSource,
    A: SdramAllocator,
    T: DeviceTreeSource,
    F: FileSource,
{
    fn default() -> Self {
        HandlerRegistry::new()
    }
}
