use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Equipment slot. Canonical slots are declared in emission order, so the
/// derived `Ord` is the order gear lines are written in. Tokens outside the
/// vocabulary are kept as `Other` and sort after every canonical slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Slot {
    Main,
    Sub,
    Range,
    Ammo,
    Head,
    Neck,
    Ear1,
    Ear2,
    Body,
    Hands,
    Ring1,
    Ring2,
    Back,
    Waist,
    Legs,
    Feet,
    Other(String),
}

impl Slot {
    /// Resolve a slot token as written in a script. Matching is
    /// case-insensitive and applies the left/right synonyms.
    pub fn from_token(token: &str) -> Slot {
        let lower = token.trim().to_ascii_lowercase();
        match lower.as_str() {
            "main" => Slot::Main,
            "sub" => Slot::Sub,
            "range" => Slot::Range,
            "ammo" => Slot::Ammo,
            "head" => Slot::Head,
            "body" => Slot::Body,
            "hands" => Slot::Hands,
            "legs" => Slot::Legs,
            "feet" => Slot::Feet,
            "neck" => Slot::Neck,
            "waist" => Slot::Waist,
            "ear1" | "left_ear" => Slot::Ear1,
            "ear2" | "right_ear" => Slot::Ear2,
            "ring1" | "left_ring" => Slot::Ring1,
            "ring2" | "right_ring" => Slot::Ring2,
            "back" => Slot::Back,
            _ => Slot::Other(lower),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Slot::Main => "main",
            Slot::Sub => "sub",
            Slot::Range => "range",
            Slot::Ammo => "ammo",
            Slot::Head => "head",
            Slot::Body => "body",
            Slot::Hands => "hands",
            Slot::Legs => "legs",
            Slot::Feet => "feet",
            Slot::Neck => "neck",
            Slot::Waist => "waist",
            Slot::Ear1 => "ear1",
            Slot::Ear2 => "ear2",
            Slot::Ring1 => "ring1",
            Slot::Ring2 => "ring2",
            Slot::Back => "back",
            Slot::Other(token) => token,
        }
    }
}

impl From<String> for Slot {
    fn from(s: String) -> Self {
        Slot::from_token(&s)
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.as_str().to_string()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Odyssey reinforcement path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OdysseyPath {
    A,
    B,
    C,
    D,
}

impl OdysseyPath {
    pub fn from_letter(s: &str) -> Option<OdysseyPath> {
        match s.trim() {
            "A" | "a" => Some(OdysseyPath::A),
            "B" | "b" => Some(OdysseyPath::B),
            "C" | "c" => Some(OdysseyPath::C),
            "D" | "d" => Some(OdysseyPath::D),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OdysseyPath::A => "A",
            OdysseyPath::B => "B",
            OdysseyPath::C => "C",
            OdysseyPath::D => "D",
        }
    }
}

impl fmt::Display for OdysseyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub augments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<OdysseyPath>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_variable: bool,
}

impl ItemDetail {
    pub fn has_extras(&self) -> bool {
        self.augments.as_ref().is_some_and(|a| !a.is_empty())
            || self.rank.is_some()
            || self.path.is_some()
    }
}

/// What occupies one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GearItem {
    Name(String),
    Detailed(ItemDetail),
}

impl GearItem {
    pub fn named(name: impl Into<String>) -> Self {
        GearItem::Name(name.into())
    }

    /// A reference to a script variable, written back unquoted.
    pub fn variable(token: impl Into<String>) -> Self {
        GearItem::Detailed(ItemDetail {
            name: token.into(),
            is_variable: true,
            ..ItemDetail::default()
        })
    }

    pub fn name(&self) -> &str {
        match self {
            GearItem::Name(n) => n,
            GearItem::Detailed(d) => &d.name,
        }
    }

    pub fn augments(&self) -> &[String] {
        match self {
            GearItem::Detailed(ItemDetail {
                augments: Some(a), ..
            }) => a,
            _ => &[],
        }
    }

    pub fn rank(&self) -> Option<u32> {
        match self {
            GearItem::Detailed(d) => d.rank,
            GearItem::Name(_) => None,
        }
    }

    pub fn path(&self) -> Option<OdysseyPath> {
        match self {
            GearItem::Detailed(d) => d.path,
            GearItem::Name(_) => None,
        }
    }

    /// Canonical form of an item, or `None` when it means "no item".
    ///
    /// Empty names and the legacy `"None"` sentinel collapse to absence,
    /// empty augment lists are dropped, and a detailed item without extras
    /// becomes a plain name.
    pub fn normalized(self) -> Option<GearItem> {
        match self {
            GearItem::Name(n) => {
                let n = n.trim();
                if is_empty_sentinel(n) {
                    None
                } else {
                    Some(GearItem::Name(n.to_string()))
                }
            }
            GearItem::Detailed(mut d) => {
                d.name = d.name.trim().to_string();
                if is_empty_sentinel(&d.name) {
                    return None;
                }
                if let Some(augs) = d.augments.take() {
                    let augs: Vec<String> = augs
                        .into_iter()
                        .map(|a| a.trim().to_string())
                        .filter(|a| !a.is_empty())
                        .collect();
                    if !augs.is_empty() {
                        d.augments = Some(augs);
                    }
                }
                if !d.is_variable && !d.has_extras() {
                    Some(GearItem::Name(d.name))
                } else {
                    Some(GearItem::Detailed(d))
                }
            }
        }
    }

    /// Promote to the detailed form, keeping the name.
    pub fn into_detail(self) -> ItemDetail {
        match self {
            GearItem::Name(name) => ItemDetail {
                is_variable: looks_like_variable(&name),
                name,
                ..ItemDetail::default()
            },
            GearItem::Detailed(d) => d,
        }
    }
}

fn is_empty_sentinel(name: &str) -> bool {
    name.is_empty() || name == "None"
}

/// Item names that reference a script variable: a dotted token without
/// whitespace, e.g. `gear.capes.tp`.
pub fn looks_like_variable(name: &str) -> bool {
    name.contains('.') && !name.chars().any(char::is_whitespace)
}

pub type GearSet = BTreeMap<Slot, GearItem>;
pub type SetCollection = BTreeMap<String, GearSet>;
pub type BaseMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub status: LogStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl LogEntry {
    pub fn success(message: impl Into<String>, path: &str) -> Self {
        Self {
            status: LogStatus::Success,
            message: message.into(),
            path: Some(path.to_string()),
        }
    }

    pub fn warning(message: impl Into<String>, path: &str) -> Self {
        Self {
            status: LogStatus::Warning,
            message: message.into(),
            path: Some(path.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub sets: SetCollection,
    #[serde(default)]
    pub base_sets: BaseMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<LogEntry>,
}

// Set path helpers

/// Make sure `name` starts with `<root>.` (or `<root>[`).
pub fn qualify_set_path(name: &str, root: &str) -> String {
    let name = name.trim();
    let rooted = name
        .strip_prefix(root)
        .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['));
    if rooted {
        name.to_string()
    } else {
        format!("{}.{}", root, name.trim_start_matches('.'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_synonyms_and_unknown_tokens() {
        assert_eq!(Slot::from_token("left_ear"), Slot::Ear1);
        assert_eq!(Slot::from_token("Right_Ring"), Slot::Ring2);
        assert_eq!(Slot::from_token("HEAD"), Slot::Head);
        assert_eq!(Slot::from_token("relic"), Slot::Other("relic".into()));
        assert!(Slot::Main < Slot::Neck && Slot::Neck < Slot::Feet);
        assert!(Slot::Ring2 < Slot::Back && Slot::Waist < Slot::Legs);
        assert!(Slot::Back < Slot::Other("aaa".into()));
    }

    #[test]
    fn normalization_collapses_sentinels_and_bare_details() {
        assert_eq!(GearItem::named("None").normalized(), None);
        assert_eq!(GearItem::named("  ").normalized(), None);
        let bare = GearItem::Detailed(ItemDetail {
            name: "Nyame Helm".into(),
            augments: Some(vec![" ".into()]),
            ..ItemDetail::default()
        });
        assert_eq!(bare.normalized(), Some(GearItem::named("Nyame Helm")));
        let var = GearItem::variable("gear.capes.tp");
        assert_eq!(var.clone().normalized(), Some(var));
    }

    #[test]
    fn set_path_helpers() {
        assert_eq!(qualify_set_path("idle.PDT", "sets"), "sets.idle.PDT");
        assert_eq!(qualify_set_path("sets.idle", "sets"), "sets.idle");
        assert_eq!(qualify_set_path("setsFoo", "sets"), "sets.setsFoo");
    }

    #[test]
    fn items_serialize_as_strings_or_objects() {
        let mut set = GearSet::new();
        set.insert(Slot::Head, GearItem::named("Nyame Helm"));
        set.insert(Slot::Back, GearItem::variable("gear.tp_cape"));
        let js = serde_json::to_value(&set).unwrap();
        assert_eq!(js["head"], serde_json::json!("Nyame Helm"));
        assert_eq!(js["back"]["isVariable"], serde_json::json!(true));
        let back: GearSet = serde_json::from_value(js).unwrap();
        assert_eq!(back, set);
    }
}
