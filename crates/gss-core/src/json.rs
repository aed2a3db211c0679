use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScriptError;
use crate::importer::parse;
use crate::model::{BaseMap, GearSet, ParseResult, SetCollection};
use crate::scripts::{list_scripts, read_script};
use crate::workbook::Workbook;

/// Set data as read back from a dump. Diagnostics are ignored on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetsDump {
    pub sets: SetCollection,
    #[serde(default)]
    pub base_sets: BaseMap,
}

pub fn sets_to_json(result: &ParseResult) -> Result<String, ScriptError> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn workbook_to_json(wb: &Workbook) -> Result<String, ScriptError> {
    Ok(serde_json::to_string_pretty(wb)?)
}

/// Read sets written by [`sets_to_json`] or [`workbook_to_json`]. Items are
/// normalized the same way the importer stores them.
pub fn sets_from_json(text: &str) -> Result<SetsDump, ScriptError> {
    let mut dump: SetsDump = serde_json::from_str(text)?;
    for set in dump.sets.values_mut() {
        let taken = std::mem::take(set);
        *set = taken
            .into_iter()
            .filter_map(|(slot, item)| item.normalized().map(|i| (slot, i)))
            .collect::<GearSet>();
    }
    Ok(dump)
}

/// Parse one script file and dump it.
pub fn dump_script_json(path: &Path) -> Result<String, ScriptError> {
    let text = read_script(path)?;
    sets_to_json(&parse(&text))
}

/// Every script under `dir`, keyed by its path relative to `dir`.
pub fn dump_dir_map_json(dir: &Path) -> Result<String, ScriptError> {
    let mut map = BTreeMap::new();
    for path in list_scripts(dir)? {
        let text = read_script(&path)?;
        let rel = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        map.insert(rel, parse(&text));
    }
    Ok(serde_json::to_string_pretty(&map)?)
}
