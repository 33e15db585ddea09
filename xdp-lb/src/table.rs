use crate::{
    assign,
    backends::BackendServer,
    error::{SlotError, TableError},
};
use aya::maps::{HashMap as AyaHashMap, Map, MapData, MapType};
use std::path::Path;
#[cfg(any(test, feature = "test-util"))]
use std::io;
use xdp_lb_common::{DestInfo, MAX_SERVERS};

bitflags::bitflags! {
/// Flags for BPF_MAP_UPDATE_ELEM command
#[derive(Clone, Copy, Debug, Default)]
pub struct BpfMapUpdateFlags: u64 {
/// 0, create new element or update existing
const ANY = 0;
}
}

/// Typed slot access by index. Implemented by the pinned kernel map and
/// by [`MemorySlots`].
pub trait SlotMap {
    fn lookup(&self, index: u32) -> Result<DestInfo, SlotError>;
    fn update(&mut self, index: u32, slot: &DestInfo) -> Result<(), SlotError>;
}

/// The `servers` hash map pinned in bpffs by the xdp program loader.
pub struct PinnedSlots {
    map: AyaHashMap<MapData, u32, DestInfo>,
}

impl PinnedSlots {
    pub fn from_pin<P: AsRef<Path>>(path: P) -> Result<Self, SlotError> {
        let map = MapData::from_pin(path.as_ref())?;
        let map_type = map.info()?.map_type()?;
        if !matches!(map_type, MapType::Hash) {
            return Err(format!(
                "pinned map {} is a {:?} map, expected a hash map",
                path.as_ref().display(),
                map_type
            )
            .into());
        }
        // key and value sizes are checked by the conversion
        let map: AyaHashMap<_, u32, DestInfo> = Map::HashMap(map).try_into()?;
        Ok(Self { map })
    }
}

impl SlotMap for PinnedSlots {
    fn lookup(&self, index: u32) -> Result<DestInfo, SlotError> {
        Ok(self.map.get(&index, 0)?)
    }

    fn update(&mut self, index: u32, slot: &DestInfo) -> Result<(), SlotError> {
        Ok(self
            .map
            .insert(index, slot, BpfMapUpdateFlags::ANY.bits())?)
    }
}

/// Process local slot storage with the same shape as the pinned map, for
/// tests only. Individual slots can be made to fail to exercise error
/// paths. Available with the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[derive(Clone, Debug)]
pub struct MemorySlots {
    slots: Vec<DestInfo>,
    fail_lookup: Option<u32>,
    fail_update: Option<u32>,
    writes: usize,
}

#[cfg(any(test, feature = "test-util"))]
impl Default for MemorySlots {
    fn default() -> Self {
        Self {
            slots: vec![DestInfo::default(); MAX_SERVERS as usize],
            fail_lookup: None,
            fail_update: None,
            writes: 0,
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_lookup_at(mut self, index: u32) -> Self {
        self.fail_lookup = Some(index);
        self
    }

    pub fn fail_update_at(mut self, index: u32) -> Self {
        self.fail_update = Some(index);
        self
    }

    /// Number of successful updates so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn slots(&self) -> &[DestInfo] {
        &self.slots
    }

    /// Direct slot access, standing in for the xdp program bumping counters.
    pub fn slot_mut(&mut self, index: u32) -> Option<&mut DestInfo> {
        self.slots.get_mut(index as usize)
    }
}

#[cfg(any(test, feature = "test-util"))]
impl SlotMap for MemorySlots {
    fn lookup(&self, index: u32) -> Result<DestInfo, SlotError> {
        if self.fail_lookup == Some(index) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected lookup failure").into());
        }
        self.slots
            .get(index as usize)
            .copied()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "key not found").into())
    }

    fn update(&mut self, index: u32, slot: &DestInfo) -> Result<(), SlotError> {
        if self.fail_update == Some(index) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected update failure").into());
        }
        let entry = self
            .slots
            .get_mut(index as usize)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "map is full"))?;
        *entry = *slot;
        self.writes += 1;
        Ok(())
    }
}

/// Handle to the shared redirect table. It is bound to a map at most once
/// and rejects reads and writes until then.
pub struct RedirectTable<M = PinnedSlots> {
    map: Option<M>,
}

impl<M> Default for RedirectTable<M> {
    fn default() -> Self {
        Self { map: None }
    }
}

impl RedirectTable<PinnedSlots> {
    /// Binds the handle to the map pinned at `path`.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), TableError> {
        self.load_with(path, |path| PinnedSlots::from_pin(path))
    }
}

impl<M: SlotMap> RedirectTable<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.map.is_some()
    }

    /// Binds the handle using `open` to resolve `path`. `open` is not
    /// called when the handle is already bound.
    pub fn load_with<P, F>(&mut self, path: P, open: F) -> Result<(), TableError>
    where
        P: AsRef<Path>,
        F: FnOnce(&Path) -> Result<M, SlotError>,
    {
        if self.map.is_some() {
            return Err(TableError::AlreadyLoaded);
        }

        let path = path.as_ref();
        let map = open(path).map_err(|source| TableError::LoadFailure {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("Redirect table bound to {}", path.display());
        self.map = Some(map);
        Ok(())
    }

    /// Rewrites every slot from `servers`, see [`assign::assignments`].
    ///
    /// Writes go in slot order and stop at the first failure without
    /// rolling back the slots already written.
    pub fn set(&mut self, servers: &[BackendServer]) -> Result<(), TableError> {
        let map = self.map.as_mut().ok_or(TableError::NotLoaded)?;
        if servers.is_empty() {
            return Err(TableError::EmptyInput);
        }

        for (index, server) in assign::assignments(servers) {
            let slot = server
                .to_slot()
                .map_err(|source| TableError::InvalidMac {
                    mac: server.mac.clone(),
                    source,
                })?;
            map.update(index, &slot)
                .map_err(|source| TableError::SlotWriteFailure { index, source })?;
        }

        log::info!(
            "Assigned {} backends over {} slots",
            servers.len().min(MAX_SERVERS as usize),
            MAX_SERVERS
        );
        Ok(())
    }

    /// Reads all slots in index order. Any failed lookup fails the read.
    pub fn get(&self) -> Result<Vec<DestInfo>, TableError> {
        let map = self.map.as_ref().ok_or(TableError::NotLoaded)?;
        (0..MAX_SERVERS)
            .map(|index| {
                map.lookup(index)
                    .map_err(|source| TableError::SlotReadFailure { index, source })
            })
            .collect()
    }

    pub fn map(&self) -> Option<&M> {
        self.map.as_ref()
    }

    pub fn map_mut(&mut self) -> Option<&mut M> {
        self.map.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::inet_ntoa;

    fn memory_table(slots: MemorySlots) -> RedirectTable<MemorySlots> {
        let mut table = RedirectTable::new();
        table
            .load_with("/sys/fs/bpf/test/servers", move |_| Ok(slots))
            .unwrap();
        table
    }

    fn servers(n: usize) -> Vec<BackendServer> {
        (0..n)
            .map(|i| {
                BackendServer::new(
                    "10.0.0.1".to_string(),
                    format!("10.0.1.{}", i + 1),
                    format!("02:00:00:00:00:{:02x}", i + 1),
                    (i + 2) as u16,
                )
            })
            .collect()
    }

    #[test]
    fn unloaded_table_rejects_access() {
        let mut table = RedirectTable::<MemorySlots>::new();
        assert!(matches!(table.get(), Err(TableError::NotLoaded)));
        assert!(matches!(
            table.set(&servers(2)),
            Err(TableError::NotLoaded)
        ));
        assert!(matches!(table.set(&[]), Err(TableError::NotLoaded)));
    }

    #[test]
    fn double_load_fails_without_side_effects() {
        let mut table = memory_table(MemorySlots::new());
        table.set(&servers(2)).unwrap();
        let before = table.get().unwrap();

        let mut opened = false;
        let err = table
            .load_with("/other", |_| {
                opened = true;
                Ok(MemorySlots::new())
            })
            .unwrap_err();
        assert!(matches!(err, TableError::AlreadyLoaded));
        assert!(!opened);
        assert_eq!(table.get().unwrap(), before);
    }

    #[test]
    fn load_failure_keeps_handle_unbound() {
        let mut table = RedirectTable::<MemorySlots>::new();
        let err = table
            .load_with("/missing", |_| {
                Err(io::Error::new(io::ErrorKind::NotFound, "no such file").into())
            })
            .unwrap_err();
        match &err {
            TableError::LoadFailure { path, .. } => assert_eq!(path, Path::new("/missing")),
            e => panic!("unexpected error: {e}"),
        }
        assert!(err.to_string().contains("no such file"));
        assert!(!table.is_loaded());

        table
            .load_with("/ok", |_| Ok(MemorySlots::new()))
            .unwrap();
        assert!(table.is_loaded());
    }

    #[test]
    fn updates_create_or_replace() {
        assert_eq!(BpfMapUpdateFlags::ANY.bits(), 0);
        assert_eq!(BpfMapUpdateFlags::default().bits(), BpfMapUpdateFlags::ANY.bits());
    }

    #[test]
    fn missing_pin_is_load_failure() {
        let mut table: RedirectTable = RedirectTable::new();
        let err = table.load("/sys/fs/bpf/xdp-lb-test/no-such-map").unwrap_err();
        assert!(matches!(err, TableError::LoadFailure { .. }), "{err}");
        assert!(!table.is_loaded());
        assert!(matches!(table.get(), Err(TableError::NotLoaded)));
    }

    #[test]
    fn empty_input_writes_nothing() {
        let mut table = memory_table(MemorySlots::new());
        assert!(matches!(table.set(&[]), Err(TableError::EmptyInput)));
        assert_eq!(table.map().unwrap().writes(), 0);
    }

    #[test]
    fn set_fills_all_slots_round_robin() {
        let mut table = memory_table(MemorySlots::new());
        let servers = servers(3);
        table.set(&servers).unwrap();
        assert_eq!(table.map().unwrap().writes(), MAX_SERVERS as usize);

        let slots = table.get().unwrap();
        assert_eq!(slots.len(), MAX_SERVERS as usize);
        for (i, slot) in slots.iter().enumerate() {
            let expected = servers[i % 3].to_slot().unwrap();
            assert_eq!(*slot, expected, "slot {i}");
        }
        assert_eq!(inet_ntoa(slots[0].daddr), "10.0.1.1");
        assert_eq!(inet_ntoa(slots[3].daddr), "10.0.1.1");
        assert_eq!(inet_ntoa(slots[510].daddr), "10.0.1.1");
        assert_eq!(inet_ntoa(slots[511].daddr), "10.0.1.2");
        assert_eq!(inet_ntoa(slots[4].daddr), "10.0.1.2");
    }

    #[test]
    fn every_backend_gets_its_share() {
        for n in [1, 4, 6, 100] {
            let mut table = memory_table(MemorySlots::new());
            let servers = servers(n);
            table.set(&servers).unwrap();
            let slots = table.get().unwrap();
            for server in &servers {
                let daddr = server.to_slot().unwrap().daddr;
                let held = slots.iter().filter(|s| s.daddr == daddr).count();
                assert!(held >= MAX_SERVERS as usize / n, "n={n} held={held}");
            }
        }
    }

    #[test]
    fn set_resets_counters() {
        let mut table = memory_table(MemorySlots::new());
        table.set(&servers(2)).unwrap();
        let slot = table.map_mut().unwrap().slot_mut(5).unwrap();
        slot.bytes = 1500;
        slot.pkts = 1;

        table.set(&servers(2)).unwrap();
        assert!(table.get().unwrap().iter().all(|s| s.bytes == 0 && s.pkts == 0));
    }

    #[test]
    fn repeated_reads_are_identical() {
        let mut table = memory_table(MemorySlots::new());
        table.set(&servers(7)).unwrap();
        assert_eq!(table.get().unwrap(), table.get().unwrap());
    }

    #[test]
    fn invalid_mac_stops_at_first_use() {
        let mut table = memory_table(MemorySlots::new());
        let mut servers = servers(3);
        servers[2].mac = "02:00:00:00:00".to_string();

        match table.set(&servers) {
            Err(TableError::InvalidMac { mac, .. }) => assert_eq!(mac, "02:00:00:00:00"),
            r => panic!("unexpected result: {r:?}"),
        }

        // slots 0 and 1 were written before the bad entry at slot 2
        let map = table.map().unwrap();
        assert_eq!(map.writes(), 2);
        assert_eq!(inet_ntoa(map.slots()[1].daddr), "10.0.1.2");
        assert_eq!(map.slots()[2], DestInfo::default());
    }

    #[test]
    fn write_failure_keeps_earlier_slots() {
        let mut first = memory_table(MemorySlots::new());
        first.set(&servers(1)).unwrap();

        let mut table = memory_table(first.map().unwrap().clone().fail_update_at(10));
        match table.set(&servers(2)) {
            Err(TableError::SlotWriteFailure { index, .. }) => assert_eq!(index, 10),
            r => panic!("unexpected result: {r:?}"),
        }

        let slots = table.map().unwrap().slots();
        assert_eq!(inet_ntoa(slots[9].daddr), "10.0.1.2");
        // untouched slots still hold the previous single backend
        assert_eq!(inet_ntoa(slots[10].daddr), "10.0.1.1");
        assert_eq!(inet_ntoa(slots[11].daddr), "10.0.1.1");
    }

    #[test]
    fn read_failure_discards_partial_result() {
        let table = memory_table(MemorySlots::new().fail_lookup_at(200));
        match table.get() {
            Err(TableError::SlotReadFailure { index, .. }) => assert_eq!(index, 200),
            r => panic!("unexpected result: {r:?}"),
        }
    }
}
