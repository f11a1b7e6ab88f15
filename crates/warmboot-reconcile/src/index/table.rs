//! Claim-tracking table used for every object class.
//!
//! A [`ClaimTable`] never creates entries on lookup and never lets an
//! entry go back from Claimed to Unclaimed. Entries are inserted only while
//! the index is being built; after that the only public mutation is
//! [`ClaimTable::claim`].

use crate::error::{ConsistencyFault, TableKind};
use std::collections::BTreeMap;
use std::fmt;

/// Per-entry claim state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimState {
    /// Recovered and not yet re-derived by replay; a deletion candidate.
    Unclaimed,
    /// Re-derived by replay; survives cleanup.
    Claimed,
}

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    state: ClaimState,
}

/// Borrowed view of one table entry.
#[derive(Debug)]
pub struct EntryRef<'a, K, V> {
    key: &'a K,
    value: &'a V,
    state: ClaimState,
}

impl<'a, K, V> Clone for EntryRef<'a, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, K, V> Copy for EntryRef<'a, K, V> {}

impl<'a, K, V> EntryRef<'a, K, V> {
    pub fn key(&self) -> &'a K {
        self.key
    }

    pub fn value(&self) -> &'a V {
        self.value
    }

    pub fn state(&self) -> ClaimState {
        self.state
    }

    pub fn is_claimed(&self) -> bool {
        self.state == ClaimState::Claimed
    }
}

/// An ordered table of recovered objects, each tagged with a [`ClaimState`].
#[derive(Debug, Clone)]
pub struct ClaimTable<K, V> {
    kind: TableKind,
    slots: BTreeMap<K, Slot<V>>,
    sealed: bool,
}

impl<K, V> ClaimTable<K, V>
where
    K: Ord + fmt::Display,
{
    pub(crate) fn new(kind: TableKind) -> Self {
        Self {
            kind,
            slots: BTreeMap::new(),
            sealed: false,
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Adds a freshly recovered entry in state Unclaimed.
    ///
    /// A second entry for the same key is a duplicate discovery.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Result<(), ConsistencyFault> {
        if self.slots.contains_key(&key) {
            return Err(ConsistencyFault::DuplicateEntry {
                table: self.kind,
                key: key.to_string(),
            });
        }
        self.slots.insert(
            key,
            Slot {
                value,
                state: ClaimState::Unclaimed,
            },
        );
        Ok(())
    }

    /// Pure lookup.
    pub fn find(&self, key: &K) -> Option<EntryRef<'_, K, V>> {
        self.slots.get_key_value(key).map(|(key, slot)| EntryRef {
            key,
            value: &slot.value,
            state: slot.state,
        })
    }

    /// Like [`Self::find`], but an already-claimed entry is reported as absent
    /// so one counter is never attached twice.
    pub fn find_stat(&self, key: &K) -> Option<EntryRef<'_, K, V>> {
        self.find(key).filter(|entry| !entry.is_claimed())
    }

    /// First entry, in key order, matching `pred`.
    pub fn find_by(&self, pred: impl Fn(&K, &V) -> bool) -> Option<EntryRef<'_, K, V>> {
        self.iter().find(|entry| pred(entry.key, entry.value))
    }

    /// Reports the fault [`Self::claim`] would raise for `key`, without
    /// claiming it.
    pub fn check_claim(&self, key: &K) -> Result<(), ConsistencyFault> {
        if self.sealed {
            return Err(ConsistencyFault::ClaimAfterCleanup {
                table: self.kind,
                key: key.to_string(),
            });
        }
        match self.slots.get(key).map(|slot| slot.state) {
            None => Err(ConsistencyFault::ClaimMissing {
                table: self.kind,
                key: key.to_string(),
            }),
            Some(ClaimState::Claimed) => Err(ConsistencyFault::DoubleClaim {
                table: self.kind,
                key: key.to_string(),
            }),
            Some(ClaimState::Unclaimed) => Ok(()),
        }
    }

    /// Transitions `key` from Unclaimed to Claimed.
    ///
    /// Claiming twice, claiming a key that was never recovered, or claiming
    /// after cleanup is a consistency fault.
    pub fn claim(&mut self, key: &K) -> Result<&V, ConsistencyFault> {
        self.check_claim(key)?;
        let kind = self.kind;
        match self.slots.get_mut(key) {
            Some(slot) => {
                slot.state = ClaimState::Claimed;
                Ok(&slot.value)
            }
            None => Err(ConsistencyFault::ClaimMissing {
                table: kind,
                key: key.to_string(),
            }),
        }
    }

    pub fn state(&self, key: &K) -> Option<ClaimState> {
        self.slots.get(key).map(|slot| slot.state)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn unclaimed_len(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.state == ClaimState::Unclaimed)
            .count()
    }

    pub fn claimed_len(&self) -> usize {
        self.len() - self.unclaimed_len()
    }

    pub fn iter(&self) -> impl Iterator<Item = EntryRef<'_, K, V>> {
        self.slots.iter().map(|(key, slot)| EntryRef {
            key,
            value: &slot.value,
            state: slot.state,
        })
    }

    pub fn unclaimed(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.state == ClaimState::Unclaimed)
            .map(|(key, slot)| (key, &slot.value))
    }

    pub fn claimed(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.state == ClaimState::Claimed)
            .map(|(key, slot)| (key, &slot.value))
    }

    /// Removes and returns every unclaimed entry, in key order.
    pub(crate) fn drain_unclaimed(&mut self) -> Vec<(K, V)> {
        self.drain_unclaimed_except(|_| false)
    }

    /// Removes every unclaimed entry except those `keep` selects.
    pub(crate) fn drain_unclaimed_except(&mut self, keep: impl Fn(&K) -> bool) -> Vec<(K, V)> {
        let slots = std::mem::take(&mut self.slots);
        let mut drained = Vec::new();
        for (key, slot) in slots {
            if slot.state == ClaimState::Claimed || keep(&key) {
                self.slots.insert(key, slot);
            } else {
                drained.push((key, slot.value));
            }
        }
        drained
    }

    /// Closes the table to further claims.
    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}
