use std::collections::BTreeMap;

use e131::{MAX_DATA_UNIVERSE, MAX_DMX_SLOTS};

use crate::error::{DmxError, DmxResult};
use crate::fixtures::engine::{lock_channels, FixtureInstance, SharedChannels};

/// Channel ceiling of one universe.
pub const UNIVERSE_CHANNELS: usize = MAX_DMX_SLOTS;

#[derive(Debug)]
struct AssignedFixture {
    name: String,
    channels: SharedChannels,
    len: usize,
}

/// Fixtures assigned to one universe, in registration order, and the
/// packed buffer sent for it.
#[derive(Debug)]
pub struct Universe {
    id: u16,
    fixtures: Vec<AssignedFixture>,
    buffer: Vec<u8>,
}

impl Universe {
    fn new(id: u16) -> Self {
        Self {
            id,
            fixtures: Vec::new(),
            buffer: Vec::new(),
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn channel_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn free_channels(&self) -> usize {
        UNIVERSE_CHANNELS - self.buffer.len()
    }

    pub fn fixture_names(&self) -> impl Iterator<Item = &str> {
        self.fixtures.iter().map(|f| f.name.as_str())
    }

    /// Channel offset of `name`: the sum of the fixtures registered before it.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for fixture in &self.fixtures {
            if fixture.name == name {
                return Some(offset);
            }
            offset += fixture.len;
        }
        None
    }

    /// Copies every fixture's current channel bytes into its slot.
    fn pack(&mut self) -> &[u8] {
        let mut offset = 0;
        for fixture in &self.fixtures {
            let source = lock_channels(&fixture.channels);
            let len = fixture.len.min(source.len());
            self.buffer[offset..offset + len].copy_from_slice(&source[..len]);
            offset += fixture.len;
        }
        &self.buffer
    }
}

/// Universe assignment for one output target.
#[derive(Debug, Default)]
pub struct UniverseRegistry {
    universes: BTreeMap<u16, Universe>,
}

impl UniverseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the fixture's channel span to `universe_id`. Nothing changes
    /// when the universe would exceed 512 channels. Returns the fixture's
    /// channel offset.
    pub fn register_fixture(&mut self, universe_id: u16, fixture: &FixtureInstance) -> DmxResult<usize> {
        if universe_id == 0 || universe_id > MAX_DATA_UNIVERSE {
            return Err(DmxError::configuration(format!(
                "universe {} outside 1..={}",
                universe_id, MAX_DATA_UNIVERSE
            )));
        }
        if self.contains(fixture.name()) {
            return Err(DmxError::configuration(format!(
                "fixture '{}' is already registered",
                fixture.name()
            )));
        }

        let requested = fixture.channel_count();
        let available = self
            .universes
            .get(&universe_id)
            .map_or(UNIVERSE_CHANNELS, Universe::free_channels);
        if requested > available {
            return Err(DmxError::CapacityExceeded {
                universe: universe_id,
                requested,
                available,
            });
        }

        let universe = self
            .universes
            .entry(universe_id)
            .or_insert_with(|| Universe::new(universe_id));
        let offset = universe.buffer.len();
        universe.fixtures.push(AssignedFixture {
            name: fixture.name().to_string(),
            channels: fixture.channels(),
            len: requested,
        });
        universe.buffer.resize(offset + requested, 0);
        Ok(offset)
    }

    /// Removes `name` from whichever universe holds it. Later fixtures in
    /// that universe move down; an emptied universe is dropped.
    pub fn unregister_fixture(&mut self, name: &str) -> bool {
        let Some(id) = self.universe_of(name) else {
            return false;
        };
        let Some(universe) = self.universes.get_mut(&id) else {
            return false;
        };
        universe.fixtures.retain(|f| f.name != name);
        let len: usize = universe.fixtures.iter().map(|f| f.len).sum();
        universe.buffer.truncate(len);
        if universe.fixtures.is_empty() {
            self.universes.remove(&id);
        }
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.universe_of(name).is_some()
    }

    pub fn universe_of(&self, name: &str) -> Option<u16> {
        self.universes
            .values()
            .find(|u| u.fixtures.iter().any(|f| f.name == name))
            .map(Universe::id)
    }

    pub fn universe(&self, id: u16) -> Option<&Universe> {
        self.universes.get(&id)
    }

    /// Ids of universes with at least one fixture, ascending.
    pub fn active_universe_ids(&self) -> Vec<u16> {
        self.universes
            .values()
            .filter(|u| !u.fixtures.is_empty())
            .map(Universe::id)
            .collect()
    }

    pub fn fixture_count(&self) -> usize {
        self.universes.values().map(|u| u.fixtures.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }

    /// Packs and returns the buffer for one universe.
    pub fn universe_buffer(&mut self, id: u16) -> Option<Vec<u8>> {
        self.universes.get_mut(&id).map(|u| u.pack().to_vec())
    }

    /// Packs every non-empty universe for one publish tick.
    pub fn pack_active(&mut self) -> Vec<(u16, Vec<u8>)> {
        self.universes
            .values_mut()
            .filter(|u| !u.fixtures.is_empty())
            .map(|u| (u.id, u.pack().to_vec()))
            .collect()
    }
}
