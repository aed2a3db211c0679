// Edit-session state: the set collection plus everything needed to write it
// back (the last loaded script text, character/job for the file name).
// Actions validate their target and return `EditError` instead of silently
// creating sets.
use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::EditError;
use crate::exporter::generate_with;
use crate::importer::{parse_with, scan_modes};
use crate::model::{
    BaseMap, GearItem, GearSet, LogEntry, OdysseyPath, SetCollection, Slot, qualify_set_path,
};
use crate::odyssey::is_path_item;
use crate::opts::ScriptOpts;

/// Sets every new workbook starts with.
pub const DEFAULT_SETS: [&str; 2] = ["sets.idle", "sets.engaged"];

/// Partial update of a slot's item. `Some(None)` clears a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub augments: Option<Vec<String>>,
    pub rank: Option<Option<u32>>,
    pub path: Option<Option<OdysseyPath>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workbook {
    pub sets: SetCollection,
    #[serde(default)]
    pub base_sets: BaseMap,
    pub active_set: String,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default)]
    pub job: Option<String>,
    #[serde(default)]
    pub selected_modes: BTreeMap<String, String>,
    #[serde(skip)]
    opts: ScriptOpts,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::with_opts(ScriptOpts::default())
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_opts(opts: ScriptOpts) -> Self {
        Self {
            sets: default_sets(),
            base_sets: BaseMap::new(),
            active_set: DEFAULT_SETS[0].to_string(),
            original_text: String::new(),
            character: None,
            job: None,
            selected_modes: BTreeMap::new(),
            opts,
        }
    }

    pub fn opts(&self) -> &ScriptOpts {
        &self.opts
    }

    /// Replace the session with the contents of a script.
    pub fn load_script(&mut self, text: &str) -> Vec<LogEntry> {
        let parsed = parse_with(text, &self.opts);
        self.original_text = text.to_string();
        self.selected_modes = scan_modes(text);
        if parsed.sets.is_empty() {
            self.sets = default_sets();
            self.base_sets = BaseMap::new();
        } else {
            self.sets = parsed.sets;
            self.base_sets = parsed.base_sets;
        }
        self.active_set = pick_active(&self.sets);
        debug!(
            "loaded {} sets, active {}",
            self.sets.len(),
            self.active_set
        );
        parsed.diagnostics
    }

    /// The updated script text for the current sets.
    pub fn export(&self) -> String {
        generate_with(&self.original_text, &self.sets, &self.base_sets, &self.opts)
    }

    /// Export and keep the result as the new original, so later exports diff
    /// against what was written.
    pub fn commit_export(&mut self) -> String {
        let text = self.export();
        self.original_text = text.clone();
        text
    }

    pub fn set(&self, path: &str) -> Option<&GearSet> {
        self.sets.get(path)
    }

    fn set_mut(&mut self, path: &str) -> Result<&mut GearSet, EditError> {
        self.sets
            .get_mut(path)
            .ok_or_else(|| EditError::UnknownSet(path.to_string()))
    }

    /// Add an empty set, optionally derived from `base`. Returns the full path.
    pub fn add_set(&mut self, name: &str, base: Option<&str>) -> Result<String, EditError> {
        let path = qualify_set_path(name, &self.opts.root);
        if self.sets.contains_key(&path) {
            return Err(EditError::SetExists(path));
        }
        self.sets.insert(path.clone(), GearSet::new());
        if let Some(base) = base.map(str::trim).filter(|b| !b.is_empty()) {
            self.base_sets
                .insert(path.clone(), qualify_set_path(base, &self.opts.root));
        }
        self.active_set = path.clone();
        Ok(path)
    }

    pub fn remove_set(&mut self, path: &str) -> Result<(), EditError> {
        if self.sets.remove(path).is_none() {
            return Err(EditError::UnknownSet(path.to_string()));
        }
        self.base_sets.remove(path);
        if self.sets.is_empty() {
            self.sets = default_sets();
            self.base_sets.clear();
            self.active_set = DEFAULT_SETS[0].to_string();
        } else if self.active_set == path {
            self.active_set = self.sets.keys().next().cloned().unwrap_or_default();
        }
        Ok(())
    }

    pub fn clear_set(&mut self, path: &str) -> Result<(), EditError> {
        self.set_mut(path)?.clear();
        Ok(())
    }

    /// Reset to a fresh session.
    pub fn clear_all(&mut self) {
        let opts = std::mem::take(&mut self.opts);
        *self = Self::with_opts(opts);
    }

    pub fn set_active(&mut self, path: &str) -> Result<(), EditError> {
        if !self.sets.contains_key(path) {
            return Err(EditError::UnknownSet(path.to_string()));
        }
        self.active_set = path.to_string();
        Ok(())
    }

    /// Put `item` in `slot`. An empty or "None" item empties the slot.
    pub fn update_slot(&mut self, path: &str, slot: Slot, item: GearItem) -> Result<(), EditError> {
        let set = self.set_mut(path)?;
        match item.normalized() {
            Some(item) => set.insert(slot, item),
            None => set.remove(&slot),
        };
        Ok(())
    }

    pub fn remove_slot(&mut self, path: &str, slot: &Slot) -> Result<Option<GearItem>, EditError> {
        Ok(self.set_mut(path)?.remove(slot))
    }

    /// Merge `patch` into the item in `slot`, promoting a plain name to a
    /// detailed item first.
    pub fn update_item(&mut self, path: &str, slot: Slot, patch: ItemPatch) -> Result<(), EditError> {
        let set = self.set_mut(path)?;
        let Some(current) = set.get(&slot) else {
            return Err(EditError::EmptySlot {
                set: path.to_string(),
                slot,
            });
        };
        if matches!(patch.path, Some(Some(_))) && !is_path_item(current.name()) {
            return Err(EditError::NotPathItem(current.name().to_string()));
        }

        let mut detail = current.clone().into_detail();
        if let Some(augments) = patch.augments {
            detail.augments = Some(augments);
        }
        if let Some(rank) = patch.rank {
            detail.rank = rank;
        }
        if let Some(p) = patch.path {
            detail.path = p;
        }
        match GearItem::Detailed(detail).normalized() {
            Some(item) => set.insert(slot, item),
            None => set.remove(&slot),
        };
        Ok(())
    }

    pub fn set_mode(&mut self, mode: &str, option: &str) {
        self.selected_modes
            .insert(mode.to_string(), option.to_string());
    }

    pub fn set_character_info(&mut self, character: &str, job: &str) {
        self.character = Some(character.to_string());
        self.job = Some(job.to_uppercase());
    }
}

fn default_sets() -> SetCollection {
    DEFAULT_SETS
        .iter()
        .map(|p| (p.to_string(), GearSet::new()))
        .collect()
}

/// First set mentioning "idle", else the first set.
fn pick_active(sets: &SetCollection) -> String {
    sets.keys()
        .find(|p| p.to_lowercase().contains("idle"))
        .or_else(|| sets.keys().next())
        .cloned()
        .unwrap_or_else(|| DEFAULT_SETS[0].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemDetail;

    #[test]
    fn starts_with_default_sets() {
        let wb = Workbook::new();
        assert_eq!(wb.sets.len(), 2);
        assert_eq!(wb.active_set, "sets.idle");
    }

    #[test]
    fn add_and_remove_sets() {
        let mut wb = Workbook::new();
        let path = wb.add_set("precast.WS.Acc", Some("precast.WS")).unwrap();
        assert_eq!(path, "sets.precast.WS.Acc");
        assert_eq!(wb.base_sets[&path], "sets.precast.WS");
        assert_eq!(wb.active_set, path);
        assert_eq!(
            wb.add_set("sets.precast.WS.Acc", None),
            Err(EditError::SetExists(path.clone()))
        );

        wb.remove_set(&path).unwrap();
        assert!(!wb.base_sets.contains_key(&path));
        assert_eq!(wb.active_set, "sets.engaged");
        wb.remove_set("sets.engaged").unwrap();
        wb.remove_set("sets.idle").unwrap();
        assert_eq!(wb.sets.len(), 2, "emptied workbook falls back to defaults");
        assert!(matches!(wb.remove_set("sets.nope"), Err(EditError::UnknownSet(_))));
    }

    #[test]
    fn slot_updates_normalize() {
        let mut wb = Workbook::new();
        wb.update_slot("sets.idle", Slot::Head, GearItem::named("Nyame Helm"))
            .unwrap();
        wb.update_slot("sets.idle", Slot::Body, GearItem::named("x")).unwrap();
        wb.update_slot("sets.idle", Slot::Body, GearItem::named("None"))
            .unwrap();
        let idle = wb.set("sets.idle").unwrap();
        assert_eq!(idle.len(), 1);
        assert!(wb
            .update_slot("sets.missing", Slot::Head, GearItem::named("x"))
            .is_err());
    }

    #[test]
    fn item_patch_promotes_and_validates_paths() {
        let mut wb = Workbook::new();
        wb.update_slot("sets.idle", Slot::Head, GearItem::named("Nyame Helm"))
            .unwrap();
        wb.update_slot("sets.idle", Slot::Neck, GearItem::named("Loricate Torque +1"))
            .unwrap();
        wb.update_item(
            "sets.idle",
            Slot::Head,
            ItemPatch {
                path: Some(Some(OdysseyPath::B)),
                rank: Some(Some(20)),
                ..ItemPatch::default()
            },
        )
        .unwrap();
        assert_eq!(
            wb.set("sets.idle").unwrap()[&Slot::Head],
            GearItem::Detailed(ItemDetail {
                name: "Nyame Helm".into(),
                rank: Some(20),
                path: Some(OdysseyPath::B),
                ..ItemDetail::default()
            })
        );

        let err = wb.update_item(
            "sets.idle",
            Slot::Neck,
            ItemPatch {
                path: Some(Some(OdysseyPath::A)),
                ..ItemPatch::default()
            },
        );
        assert_eq!(err, Err(EditError::NotPathItem("Loricate Torque +1".into())));

        // clearing every extra collapses back to a plain name
        wb.update_item(
            "sets.idle",
            Slot::Head,
            ItemPatch {
                path: Some(None),
                rank: Some(None),
                ..ItemPatch::default()
            },
        )
        .unwrap();
        assert_eq!(
            wb.set("sets.idle").unwrap()[&Slot::Head],
            GearItem::named("Nyame Helm")
        );
        assert!(matches!(
            wb.update_item("sets.idle", Slot::Feet, ItemPatch::default()),
            Err(EditError::EmptySlot { .. })
        ));
    }

    #[test]
    fn load_script_picks_idle_and_modes() {
        let mut wb = Workbook::new();
        let logs = wb.load_script(
            "function get_sets()\n state.IdleMode:options('Normal','PDT')\nend\nfunction init_gear_sets()\n sets.engaged = {}\n sets.idle.Town = {feet=\"Boots\"}\nend\n",
        );
        assert!(logs.is_empty());
        assert_eq!(wb.active_set, "sets.idle.Town");
        assert_eq!(wb.selected_modes["Idle"], "Normal");

        wb.load_script("-- nothing here");
        assert_eq!(wb.sets.len(), 2);
        assert_eq!(wb.active_set, "sets.idle");
    }

    #[test]
    fn commit_export_makes_exports_stable() {
        let mut wb = Workbook::new();
        wb.update_slot("sets.idle", Slot::Main, GearItem::named("Naegling"))
            .unwrap();
        let first = wb.commit_export();
        assert!(first.contains("sets.idle = {"));
        assert_eq!(wb.export(), first);
    }
}
