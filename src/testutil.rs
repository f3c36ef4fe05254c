//! Fakes for every external collaborator trait, used by this crate's own unit and
//! scenario tests. Not part of the public API.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::addr::{Ipv4Addr, MacAddr};
use crate::clock::{Clock, Interrupt};
use crate::device::EthernetDevice;
use crate::env::{DnsResolver, EnvStore};
use crate::error::Error;

/// An in-memory [`EthernetDevice`]: records every transmitted frame so tests can
/// assert on wire content, and lets tests feed inbound frames back through
/// [`crate::stack::Stack::receive`] directly.
pub struct FakeDevice {
    mac: MacAddr,
    ip: Option<Ipv4Addr>,
    netmask: Ipv4Addr,
    gateway: Option<Ipv4Addr>,
    server_ip: Option<Ipv4Addr>,
    pub sent: Vec<Vec<u8>>,
    pub rx_indications: u32,
    pub registered_params: Vec<(String, String)>,
    /// When set, the next `send` fails with this error instead of recording.
    pub fail_next_send: Option<Error>,
    /// Frames queued for `Stack::poll` to drain, in FIFO order.
    inbound: VecDeque<Vec<u8>>,
}

impl FakeDevice {
    #[must_use]
    pub fn new() -> Self {
        FakeDevice {
            mac: MacAddr::ZERO,
            ip: None,
            netmask: Ipv4Addr::UNSPECIFIED,
            gateway: None,
            server_ip: None,
            sent: Vec::new(),
            rx_indications: 0,
            registered_params: Vec::new(),
            fail_next_send: None,
            inbound: VecDeque::new(),
        }
    }

    /// Queues a frame for the next `Stack::poll` calls to deliver, in FIFO order.
    pub fn queue_rx(&mut self, frame: Vec<u8>) {
        self.inbound.push_back(frame);
    }

    pub fn set_ipv4_address(&mut self, ip: Ipv4Addr) {
        self.ip = Some(ip);
    }

    pub fn set_netmask(&mut self, netmask: Ipv4Addr) {
        self.netmask = netmask;
    }

    pub fn set_gateway(&mut self, gateway: Ipv4Addr) {
        self.gateway = Some(gateway);
    }

    pub fn set_server_ip(&mut self, ip: Ipv4Addr) {
        self.server_ip = Some(ip);
    }

    #[must_use]
    pub fn last_sent(&self) -> Option<&[u8]> {
        self.sent.last().map(Vec::as_slice)
    }
}

impl Default for FakeDevice {
    fn default() -> Self {
        FakeDevice::new()
    }
}

impl EthernetDevice for FakeDevice {
    fn mac_address(&self) -> MacAddr {
        self.mac
    }

    fn set_mac_address(&mut self, mac: MacAddr) {
        self.mac = mac;
    }

    fn ipv4_address(&self) -> Option<Ipv4Addr> {
        self.ip
    }

    fn netmask(&self) -> Ipv4Addr {
        self.netmask
    }

    fn gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
    }

    fn server_ip(&self) -> Option<Ipv4Addr> {
        self.server_ip
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        if let Some(err) = self.fail_next_send.take() {
            return Err(err);
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn indicate_rx(&mut self) {
        self.rx_indications += 1;
    }

    fn register_param(&mut self, name: &str, default: &str) {
        self.registered_params.push((name.to_string(), default.to_string()));
    }

    fn has_packet(&self) -> bool {
        !self.inbound.is_empty()
    }

    fn receive_rx_buffer(&mut self) -> Option<Vec<u8>> {
        self.inbound.pop_front()
    }
}

/// A [`Clock`] whose time is advanced explicitly by the test, never by a wall clock.
#[derive(Default)]
pub struct FakeClock {
    now: u64,
}

impl FakeClock {
    #[must_use]
    pub fn new() -> Self {
        FakeClock::default()
    }

    pub fn advance(&mut self, nanos: u64) {
        self.now += nanos;
    }

    pub fn set(&mut self, nanos: u64) {
        self.now = nanos;
    }
}

impl Clock for FakeClock {
    fn now_nanos(&self) -> u64 {
        self.now
    }
}

/// A [`Clock`] that advances itself by a fixed step on every read, for tests that
/// need a retry/timeout loop to actually make progress without a real wall clock
/// driving it from outside.
pub struct SteppingClock {
    now: core::cell::Cell<u64>,
    step: u64,
}

impl SteppingClock {
    #[must_use]
    pub fn new(step: u64) -> Self {
        SteppingClock {
            now: core::cell::Cell::new(0),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now_nanos(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

/// An [`Interrupt`] a test can fire on demand.
#[derive(Default)]
pub struct FakeInterrupt {
    fired: bool,
}

impl FakeInterrupt {
    #[must_use]
    pub fn new() -> Self {
        FakeInterrupt::default()
    }

    pub fn fire(&mut self) {
        self.fired = true;
    }
}

impl Interrupt for FakeInterrupt {
    fn is_interrupted(&self) -> bool {
        self.fired
    }
}

/// An [`EnvStore`] backed by an in-memory map.
#[derive(Default)]
pub struct FakeEnvStore {
    vars: BTreeMap<String, String>,
}

impl FakeEnvStore {
    #[must_use]
    pub fn new() -> Self {
        FakeEnvStore::default()
    }
}

impl EnvStore for FakeEnvStore {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }
}

/// A [`DnsResolver`] backed by a fixed lookup table.
#[derive(Default)]
pub struct FakeDns {
    records: BTreeMap<String, Ipv4Addr>,
}

impl FakeDns {
    #[must_use]
    pub fn new() -> Self {
        FakeDns::default()
    }

    pub fn insert(&mut self, hostname: &str, ip: Ipv4Addr) {
        self.records.insert(hostname.to_string(), ip);
    }
}

impl DnsResolver for FakeDns {
    fn resolve(&mut self, hostname: &str) -> Result<Ipv4Addr, Error> {
        self.records.get(hostname).copied().ok_or(Error::NotFound)
    }
}

/// Fakes for the boot orchestrator's external collaborators.
pub mod bootm {
    use alloc::collections::BTreeMap;
    use alloc::rc::Rc;
    use alloc::string::{String, ToString};
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use crate::bootm::{
        DeviceTree, DeviceTreeSource, FileSource, FileType, SdramAddress, SdramAllocator, SdramRegion, UimageHandle,
        UimageHeader, UimageSource,
    };
    use crate::error::Error;

    /// An [`SdramAllocator`] that hands out exact addresses verbatim and serves
    /// `Anywhere` requests from a real free-list arena, the same structure the
    /// teacher's physical-memory allocator is built on.
    pub struct FakeSdramAllocator {
        arena: free_list::FreeList<16>,
        pub writes: Vec<(SdramRegion, Vec<u8>)>,
        pub released: Vec<SdramRegion>,
        pub fail_next_request: Option<Error>,
    }

    impl FakeSdramAllocator {
        #[must_use]
        pub fn new() -> Self {
            let mut arena = free_list::FreeList::new();
            unsafe {
                arena
                    .deallocate(free_list::PageRange::new(0x8000_0000, 0x9000_0000).unwrap())
                    .unwrap();
            }
            FakeSdramAllocator {
                arena,
                writes: Vec::new(),
                released: Vec::new(),
                fail_next_request: None,
            }
        }
    }

    impl Default for FakeSdramAllocator {
        fn default() -> Self {
            FakeSdramAllocator::new()
        }
    }

    impl SdramAllocator for FakeSdramAllocator {
        fn request(&mut self, _name: &str, address: SdramAddress, size: usize) -> Result<SdramRegion, Error> {
            if let Some(err) = self.fail_next_request.take() {
                return Err(err);
            }
            match address {
                SdramAddress::Exact(addr) => Ok(SdramRegion {
                    start: addr,
                    end: addr + size as u64,
                }),
                SdramAddress::Anywhere => {
                    let layout = free_list::PageLayout::from_size_align(size, 1).map_err(|_| Error::NoMemory)?;
                    let range = self.arena.allocate(layout).map_err(|_| Error::NoMemory)?;
                    Ok(SdramRegion {
                        start: range.start() as u64,
                        end: range.end() as u64,
                    })
                }
            }
        }

        fn release(&mut self, region: SdramRegion) {
            self.released.push(region);
        }

        fn write(&mut self, region: &SdramRegion, data: &[u8]) -> Result<(), Error> {
            self.writes.push((*region, data.to_vec()));
            Ok(())
        }
    }

    #[derive(Clone)]
    struct UimageEntry {
        header: UimageHeader,
        payload: Vec<u8>,
        verify_ok: bool,
    }

    /// A [`UimageSource`] backed by a fixed table of registered paths, each with a
    /// canned header and payload.
    pub struct FakeUimageSource {
        entries: BTreeMap<String, UimageEntry>,
        handles: BTreeMap<u64, String>,
        next_id: u64,
        pub opened: Vec<String>,
        /// Shared so a test can keep a handle on what got closed even after the
        /// fake itself has been moved into an owning `ImageData`.
        closed: Rc<RefCell<Vec<UimageHandle>>>,
    }

    impl FakeUimageSource {
        #[must_use]
        pub fn new() -> Self {
            FakeUimageSource {
                entries: BTreeMap::new(),
                handles: BTreeMap::new(),
                next_id: 0,
                opened: Vec::new(),
                closed: Rc::new(RefCell::new(Vec::new())),
            }
        }

        pub fn register(&mut self, path: &str, header: UimageHeader, payload: Vec<u8>, verify_ok: bool) {
            self.entries.insert(
                path.to_string(),
                UimageEntry { header, payload, verify_ok },
            );
        }

        /// A clone of the shared handle-close log, readable after `self` has been
        /// consumed by an `ImageData`.
        #[must_use]
        pub fn closed_log(&self) -> Rc<RefCell<Vec<UimageHandle>>> {
            self.closed.clone()
        }
    }

    impl Default for FakeUimageSource {
        fn default() -> Self {
            FakeUimageSource::new()
        }
    }

    impl UimageSource for FakeUimageSource {
        fn open(&mut self, path: &str) -> Result<UimageHandle, Error> {
            if !self.entries.contains_key(path) {
                return Err(Error::InvalidArgument);
            }
            self.opened.push(path.to_string());
            let id = self.next_id;
            self.next_id += 1;
            self.handles.insert(id, path.to_string());
            Ok(UimageHandle(id))
        }

        fn verify(&mut self, handle: UimageHandle) -> Result<(), Error> {
            let path = self.handles.get(&handle.0).expect("open before verify");
            if self.entries[path].verify_ok {
                Ok(())
            } else {
                Err(Error::VerifyFailed)
            }
        }

        fn header(&self, handle: UimageHandle) -> UimageHeader {
            let path = self.handles.get(&handle.0).expect("open before header");
            self.entries[path].header
        }

        fn load_to_sdram<A: SdramAllocator>(
            &mut self,
            handle: UimageHandle,
            _index: u32,
            addr: SdramAddress,
            alloc: &mut A,
        ) -> Result<SdramRegion, Error> {
            let path = self.handles.get(&handle.0).expect("open before load").clone();
            let region = alloc.request("image", addr, self.entries[&path].payload.len())?;
            alloc.write(&region, &self.entries[&path].payload)?;
            Ok(region)
        }

        fn load_to_buf(&mut self, handle: UimageHandle, _index: u32) -> Result<Vec<u8>, Error> {
            let path = self.handles.get(&handle.0).expect("open before load");
            Ok(self.entries[path].payload.clone())
        }

        fn close(&mut self, handle: UimageHandle) {
            self.closed.borrow_mut().push(handle);
            self.handles.remove(&handle.0);
        }
    }

    /// A [`DeviceTreeSource`] that validates the blob with the real `fdt` parser
    /// when the `devicetree` feature is enabled, and otherwise just carries bytes.
    #[derive(Default)]
    pub struct FakeDeviceTreeSource {
        pub unflattened: Vec<Vec<u8>>,
    }

    impl FakeDeviceTreeSource {
        #[must_use]
        pub fn new() -> Self {
            FakeDeviceTreeSource::default()
        }
    }

    impl DeviceTreeSource for FakeDeviceTreeSource {
        fn unflatten(&mut self, blob: &[u8]) -> Result<DeviceTree, Error> {
            #[cfg(feature = "devicetree")]
            {
                fdt::Fdt::new(blob).map_err(|_| Error::InvalidArgument)?;
            }
            self.unflattened.push(blob.to_vec());
            Ok(DeviceTree {
                raw: blob.to_vec(),
                initrd: None,
                memreserves: Vec::new(),
            })
        }

        fn fixed_flat(&mut self, tree: &DeviceTree) -> Result<Vec<u8>, Error> {
            Ok(tree.raw.clone())
        }

        fn add_initrd(&mut self, tree: &mut DeviceTree, start: u64, end: u64) {
            tree.initrd = Some((start, end));
        }

        fn add_memreserve(&mut self, tree: &mut DeviceTree, start: u64, end: u64) {
            tree.memreserves.push((start, end));
        }
    }

    /// A [`FileSource`] backed by fixed tables of name-sniffed types and contents.
    #[derive(Default)]
    pub struct FakeFileSource {
        names: BTreeMap<String, FileType>,
        files: BTreeMap<String, Vec<u8>>,
    }

    impl FakeFileSource {
        #[must_use]
        pub fn new() -> Self {
            FakeFileSource::default()
        }

        pub fn register(&mut self, path: &str, filetype: FileType, bytes: Vec<u8>) {
            self.names.insert(path.to_string(), filetype);
            self.files.insert(path.to_string(), bytes);
        }
    }

    impl FileSource for FakeFileSource {
        fn detect_by_name(&self, path: &str) -> FileType {
            self.names.get(path).copied().unwrap_or(FileType::Unknown)
        }

        fn read_to_vec(&mut self, path: &str) -> Result<Vec<u8>, Error> {
            self.files.get(path).cloned().ok_or(Error::NotFound)
        }

        fn stream_to_sdram<A: SdramAllocator>(
            &mut self,
            path: &str,
            addr: SdramAddress,
            alloc: &mut A,
        ) -> Result<SdramRegion, Error> {
            let data = self.files.get(path).cloned().ok_or(Error::NotFound)?;
            let region = alloc.request("file", addr, data.len())?;
            alloc.write(&region, &data)?;
            Ok(region)
        }
    }
}
