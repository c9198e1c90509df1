use std::collections::BTreeMap;

use super::characteristic::{Characteristic, CharacteristicValue};

#[derive(Debug, Clone, PartialEq)]
struct IntentEntry {
    value: CharacteristicValue,
    generation: u64,
}

/// Locally requested changes the vendor has not confirmed yet.
///
/// Every write is stamped with a monotonically increasing generation so a
/// push only retires the entries it actually carried; anything written while
/// the push was in flight survives for the next cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingIntent {
    fields: BTreeMap<Characteristic, IntentEntry>,
}

impl PendingIntent {
    pub fn get(&self, characteristic: Characteristic) -> Option<&CharacteristicValue> {
        self.fields.get(&characteristic).map(|e| &e.value)
    }

    pub fn contains(&self, characteristic: Characteristic) -> bool {
        self.fields.contains_key(&characteristic)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn characteristics(&self) -> impl Iterator<Item = Characteristic> + '_ {
        self.fields.keys().copied()
    }

    pub(crate) fn merge(
        &mut self,
        fields: impl IntoIterator<Item = (Characteristic, CharacteristicValue)>,
        generation: u64,
    ) {
        for (characteristic, value) in fields {
            self.fields
                .insert(characteristic, IntentEntry { value, generation });
        }
    }

    /// Freeze the current entries into a batch for one push.
    pub(crate) fn batch(&self) -> Option<IntentBatch> {
        let generation = self.fields.values().map(|e| e.generation).max()?;
        let fields = self
            .fields
            .iter()
            .map(|(c, e)| (*c, e.value.clone()))
            .collect();
        Some(IntentBatch { fields, generation })
    }

    /// Drop the entries a batch carried, unless they were rewritten since.
    pub(crate) fn retire(&mut self, batch: &IntentBatch) {
        self.fields.retain(|characteristic, entry| {
            !(batch.fields.contains_key(characteristic) && entry.generation <= batch.generation)
        });
    }
}

/// The frozen contents of a [`PendingIntent`] handed to one push.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentBatch {
    pub fields: BTreeMap<Characteristic, CharacteristicValue>,
    pub generation: u64,
}

impl IntentBatch {
    pub fn get(&self, characteristic: Characteristic) -> Option<&CharacteristicValue> {
        self.fields.get(&characteristic)
    }

    pub fn contains(&self, characteristic: Characteristic) -> bool {
        self.fields.contains_key(&characteristic)
    }

    pub fn characteristics(&self) -> Vec<Characteristic> {
        self.fields.keys().copied().collect()
    }
}
