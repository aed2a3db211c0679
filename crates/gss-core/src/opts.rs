/// Names of the script constructs the importer and exporter look for.
///
/// The defaults match GearSwap job files; the fields exist so a host can
/// point the transforms at a differently named table or init function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOpts {
    /// Root table every set path starts with.
    pub root: String,
    /// Function used to derive a set from a base set.
    pub combine_fn: String,
    /// Function whose body receives newly added sets.
    pub init_fn: String,
    /// Comment line written above newly added sets.
    pub marker: String,
    /// One level of indentation.
    pub indent: String,
}

impl Default for ScriptOpts {
    fn default() -> Self {
        Self {
            root: "sets".to_string(),
            combine_fn: "set_combine".to_string(),
            init_fn: "init_gear_sets".to_string(),
            marker: "-- [[ New Sets Added via Studio ]]".to_string(),
            indent: "    ".to_string(),
        }
    }
}
