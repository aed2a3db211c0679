// Odyssey rewards that can be reinforced along a path (A-D), grouped by the
// atonement tier that drops them. Matched as lower-case name fragments.
const ATONEMENT: [&[&str]; 4] = [
    &["hesperiidae", "epitaph", "neo animator", "coiste bodhar"],
    &[
        "acrontica",
        "beithir ring",
        "tsuru",
        "schere earring",
        "tellen belt",
        "obstinate sash",
    ],
    &[
        "ikenga", "kunimitsu", "gleti", "gekkei", "sakpata", "agwu", "bunzi", "mpaca",
    ],
    &["nyame"],
];

/// Atonement tier (1-4) of a path-capable item.
pub fn atonement_tier(item_name: &str) -> Option<u8> {
    let lower = item_name.to_lowercase();
    ATONEMENT
        .iter()
        .position(|names| names.iter().any(|n| lower.contains(n)))
        .map(|i| i as u8 + 1)
}

pub fn is_path_item(item_name: &str) -> bool {
    atonement_tier(item_name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_items_by_fragment() {
        assert_eq!(atonement_tier("Nyame Helm"), Some(4));
        assert_eq!(atonement_tier("Mpaca's Cap"), Some(3));
        assert_eq!(atonement_tier("Schere Earring"), Some(2));
        assert!(!is_path_item("Loricate Torque +1"));
    }
}
