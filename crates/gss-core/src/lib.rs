//! gss-core: GearSwap set import, export and editing
//!
//! This crate focuses on a small, well-factored surface:
//! - Byte scanner shared by the importer and exporter (comment masking, brace matching)
//! - Importer: gear set assignments in a job script to a typed set collection
//! - Exporter: surgical rewrite of existing set bodies plus insertion of new sets
//! - Workbook: explicit edit-session state with validated actions
//! - File helpers (script discovery, zip backup) and a JSON dump for CLI use
//!
pub mod error;
pub mod exporter;
pub mod importer;
pub mod json;
pub mod model;
pub mod odyssey;
pub mod opts;
pub mod scanner;
pub mod scripts;
pub mod workbook;

pub use error::{EditError, ScriptError};
pub use exporter::{generate, generate_with};
pub use importer::{parse, parse_with, scan_modes};
pub use model::{
    BaseMap, GearItem, GearSet, ItemDetail, LogEntry, LogStatus, OdysseyPath, ParseResult,
    SetCollection, Slot,
};
pub use opts::ScriptOpts;
pub use workbook::{ItemPatch, Workbook};
