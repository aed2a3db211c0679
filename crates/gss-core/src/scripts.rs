use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::error::ScriptError;
use crate::model::LogEntry;
use crate::workbook::Workbook;

pub fn is_script_file(p: &Path) -> bool {
    p.is_file()
        && p.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("lua"))
}

/// `.lua` files under `dir`, recursively, sorted by path.
pub fn list_scripts(dir: &Path) -> Result<Vec<PathBuf>, ScriptError> {
    if !dir.is_dir() {
        return Err(ScriptError::NotADirectory(dir.to_path_buf()));
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if is_script_file(entry.path()) {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}

/// Character and job from a `<Name>_<JOB>[_...].lua` file name.
pub fn character_info(file_name: &str) -> Option<(String, String)> {
    let stem = file_name
        .strip_suffix(".lua")
        .or_else(|| file_name.strip_suffix(".LUA"))
        .unwrap_or(file_name);
    let mut parts = stem.split('_');
    let name = parts.next().filter(|s| !s.is_empty())?;
    let job = parts.next().filter(|s| !s.is_empty())?;
    Some((name.to_string(), job.to_uppercase()))
}

pub fn export_file_name(character: Option<&str>, job: Option<&str>) -> String {
    match (character, job) {
        (Some(c), Some(j)) if !c.is_empty() && !j.is_empty() => format!("{}_{}_Gear.lua", c, j),
        _ => "Exported_Gear.lua".to_string(),
    }
}

pub fn read_script(path: &Path) -> Result<String, ScriptError> {
    fs::read_to_string(path).map_err(ScriptError::io(path))
}

pub fn write_script(path: &Path, text: &str) -> Result<(), ScriptError> {
    fs::write(path, text).map_err(ScriptError::io(path))
}

/// Zip `path` into `<stem>_<timestamp>.zip` next to it.
pub fn backup_script(path: &Path) -> Result<PathBuf, ScriptError> {
    let data = fs::read(path).map_err(ScriptError::io(path))?;
    let parent = path.parent().unwrap_or(Path::new("."));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("script");
    let entry_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.lua", stem));
    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let dest = parent.join(format!("{}_{}.zip", stem, ts));

    let file = fs::File::create(&dest).map_err(ScriptError::io(&dest))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    zip.start_file(entry_name, options)?;
    zip.write_all(&data).map_err(ScriptError::io(&dest))?;
    zip.finish()?;
    info!("backed up {} to {}", path.display(), dest.display());
    Ok(dest)
}

/// Read a script into a fresh workbook, taking character and job from the
/// file name when it fits the usual pattern.
pub fn load_workbook(path: &Path) -> Result<(Workbook, Vec<LogEntry>), ScriptError> {
    let text = read_script(path)?;
    let mut wb = Workbook::new();
    let logs = wb.load_script(&text);
    if let Some((name, job)) = path
        .file_name()
        .and_then(|s| s.to_str())
        .and_then(character_info)
    {
        wb.set_character_info(&name, &job);
    }
    debug!("{}: {} diagnostics", path.display(), logs.len());
    Ok((wb, logs))
}

/// Export the workbook to `path`, zipping the previous file first when
/// `backup` is set and one exists.
pub fn save_workbook(wb: &mut Workbook, path: &Path, backup: bool) -> Result<Option<PathBuf>, ScriptError> {
    let backup_path = if backup && path.is_file() {
        Some(backup_script(path)?)
    } else {
        None
    };
    let text = wb.commit_export();
    write_script(path, &text)?;
    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_conventions() {
        assert_eq!(
            character_info("Kaiju_war_Gear.lua"),
            Some(("Kaiju".to_string(), "WAR".to_string()))
        );
        assert_eq!(character_info("Mote-Include.lua"), None);
        assert_eq!(character_info("_WAR.lua"), None);
        assert_eq!(export_file_name(Some("Kaiju"), Some("WAR")), "Kaiju_WAR_Gear.lua");
        assert_eq!(export_file_name(Some("Kaiju"), None), "Exported_Gear.lua");
        assert_eq!(export_file_name(Some(""), Some("WAR")), "Exported_Gear.lua");
    }
}
