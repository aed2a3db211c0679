// Best-effort import of gear sets from GearSwap script text.
//
// The scan looks for `sets.<path> = <rhs>` assignments in comment-masked text
// and classifies the right-hand side as a combine call, a table literal or an
// alias of an earlier set. Anything else is skipped. Nothing here fails: input
// that doesn't fit simply yields fewer sets.
use std::collections::BTreeMap;
use std::sync::OnceLock;

use log::{debug, trace, warn};
use regex::Regex;

use crate::model::{
    GearItem, GearSet, ItemDetail, LogEntry, OdysseyPath, ParseResult, Slot, looks_like_variable,
};
use crate::opts::ScriptOpts;
use crate::scanner::{
    Scanner, decode_escapes, find_call_table, is_ident_byte, mask_comments, split_top_level,
};

/// Keys that belong to an item table and never name a slot.
const ITEM_KEYS: [&str; 4] = ["name", "path", "augments", "rank"];
const KEYWORDS: [&str; 3] = ["true", "false", "nil"];

pub fn parse(text: &str) -> ParseResult {
    parse_with(text, &ScriptOpts::default())
}

pub fn parse_with(text: &str, opts: &ScriptOpts) -> ParseResult {
    let clean = mask_comments(text);
    let root = opts.root.as_str();
    let mut result = ParseResult::default();
    if root.is_empty() {
        warn!("empty root token, nothing to import");
        return result;
    }
    let mut cursor = 0;

    while let Some(found) = clean[cursor..].find(root) {
        let start = cursor + found;
        // always past the root token, whatever matches below
        cursor = start + root.len();
        if start > 0 && matches!(clean.as_bytes()[start - 1], b if is_ident_byte(b) || b == b'.') {
            continue;
        }
        let mut sc = Scanner::at(&clean, start);
        let Some(path) = sc.set_path(root) else {
            continue;
        };
        sc.skip_whitespace();
        if !sc.eat("=") || sc.peek() == Some(b'=') {
            cursor = sc.pos();
            continue;
        }
        cursor = sc.pos();
        sc.skip_whitespace();
        parse_assignment(&mut sc, path, opts, &mut result);
    }

    debug!(
        "parsed {} sets ({} combined)",
        result.sets.len(),
        result.base_sets.len()
    );
    result
}

fn parse_assignment(sc: &mut Scanner<'_>, path: &str, opts: &ScriptOpts, out: &mut ParseResult) {
    let at = sc.pos();
    let root = opts.root.as_str();

    if sc.eat_keyword(&opts.combine_fn) {
        sc.skip_whitespace();
        if sc.peek() != Some(b'(') {
            return;
        }
        let open_paren = sc.pos();
        sc.bump();
        sc.skip_whitespace();
        let base = sc.set_path(root);
        let Some(brace) = find_call_table(sc.source(), open_paren) else {
            trace!("{path}: combine call without a table argument");
            return;
        };
        sc.set_pos(brace);
        let Some((open, close)) = sc.balanced(b'{', b'}') else {
            return;
        };
        let gear = parse_gear_block(&sc.source()[open + 1..close]);
        match base {
            Some(base) => {
                let message = if out.sets.contains_key(base) {
                    format!("Combined {path} with base {base}")
                } else {
                    format!("Combined {path} with base {base} (base not defined earlier)")
                };
                out.diagnostics.push(LogEntry::success(message, path));
                out.base_sets.insert(path.to_string(), base.to_string());
            }
            None => {
                out.diagnostics.push(LogEntry::warning(
                    format!("{path}: combine base is not a set path, kept overrides only"),
                    path,
                ));
                out.base_sets.remove(path);
            }
        }
        trace!("{path}: {} override slots", gear.len());
        out.sets.insert(path.to_string(), gear);
        return;
    }

    sc.set_pos(at);
    if sc.peek() == Some(b'{') {
        if let Some((open, close)) = sc.balanced(b'{', b'}') {
            let gear = parse_gear_block(&sc.source()[open + 1..close]);
            trace!("{path}: {} slots", gear.len());
            out.sets.insert(path.to_string(), gear);
            out.base_sets.remove(path);
        }
        return;
    }

    if let Some(source) = sc.set_path(root) {
        match out.sets.get(source).cloned() {
            Some(gear) => {
                out.sets.insert(path.to_string(), gear);
                out.base_sets.remove(path);
                out.diagnostics
                    .push(LogEntry::success(format!("Copied {source} into {path}"), path));
            }
            None => out.diagnostics.push(LogEntry::warning(
                format!("{path} aliases {source}, which is not defined before it"),
                path,
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Production {
    Table,
    Quoted,
    Variable,
}

/// Parse the inside of a gear table (`{ ... }` without the braces).
///
/// Entries are collected per production first; a slot takes the first entry
/// of the highest-precedence production that mentions it.
pub fn parse_gear_block(block: &str) -> GearSet {
    let mut found: Vec<(Production, Slot, GearItem)> = Vec::new();
    let mut sc = Scanner::new(block);

    while !sc.is_eof() {
        let before = sc.pos();
        sc.skip_whitespace();
        if sc.eat(",") || sc.eat(";") {
            continue;
        }
        if sc.is_eof() {
            break;
        }
        if let Some((key, bracketed)) = field_key(&mut sc)
            && (bracketed || !ITEM_KEYS.contains(&key.to_ascii_lowercase().as_str()))
        {
            let slot = Slot::from_token(&key);
            if let Some((production, item)) = field_value(&mut sc) {
                found.push((production, slot, item));
            }
        }
        sc.skip_value();
        if sc.pos() == before {
            sc.bump();
        }
    }

    found.sort_by_key(|(production, _, _)| *production);
    let mut gear = GearSet::new();
    for (_, slot, item) in found {
        gear.entry(slot).or_insert(item);
    }
    gear
}

/// `key =` or `["key"] =`; leaves the cursor after the `=`. The flag is set
/// for the bracket form.
fn field_key(sc: &mut Scanner<'_>) -> Option<(String, bool)> {
    let bracketed = sc.peek() == Some(b'[');
    let key = if bracketed {
        sc.bump();
        sc.skip_whitespace();
        let raw = sc.quoted_string()?;
        sc.skip_whitespace();
        if !sc.eat("]") {
            return None;
        }
        decode_escapes(raw)
    } else {
        sc.identifier()?.to_string()
    };
    sc.skip_whitespace();
    if !sc.eat("=") || sc.peek() == Some(b'=') {
        return None;
    }
    sc.skip_whitespace();
    Some((key, bracketed))
}

fn field_value(sc: &mut Scanner<'_>) -> Option<(Production, GearItem)> {
    match sc.peek()? {
        b'{' => {
            let (open, close) = sc.balanced(b'{', b'}')?;
            let item = parse_item_table(&sc.source()[open + 1..close])?;
            Some((Production::Table, item))
        }
        b'"' | b'\'' => {
            let raw = sc.quoted_string()?;
            let item = GearItem::Name(decode_escapes(raw)).normalized()?;
            Some((Production::Quoted, item))
        }
        _ => {
            let chain = sc.ident_chain()?;
            let first = chain.split('.').next().unwrap_or(chain);
            if !chain.contains('.') || KEYWORDS.contains(&first) {
                return None;
            }
            Some((Production::Variable, GearItem::variable(chain)))
        }
    }
}

/// `{name="...", augments={...}, path="A", rank=15}`. Without a name the
/// entry is dropped.
fn parse_item_table(body: &str) -> Option<GearItem> {
    let mut name: Option<(String, bool)> = None;
    let mut augments: Option<Vec<String>> = None;
    let mut path: Option<OdysseyPath> = None;
    let mut rank: Option<u32> = None;
    let mut sc = Scanner::new(body);

    while !sc.is_eof() {
        let before = sc.pos();
        sc.skip_whitespace();
        if sc.eat(",") || sc.eat(";") {
            continue;
        }
        if let Some((key, _)) = field_key(&mut sc) {
            match key.to_ascii_lowercase().as_str() {
                "name" if name.is_none() => {
                    if let Some(raw) = sc.quoted_string() {
                        name = Some((decode_escapes(raw).trim().to_string(), false));
                    } else if let Some(chain) = sc.ident_chain() {
                        name = Some((chain.to_string(), true));
                    }
                }
                "augments" if augments.is_none() => {
                    if let Some((open, close)) = sc.balanced(b'{', b'}') {
                        augments = Some(parse_augments(&body[open + 1..close]));
                    }
                }
                "path" if path.is_none() => {
                    path = sc
                        .quoted_string()
                        .or_else(|| sc.identifier())
                        .and_then(OdysseyPath::from_letter);
                }
                "rank" if rank.is_none() => rank = sc.integer(),
                _ => {}
            }
        }
        sc.skip_value();
        if sc.pos() == before {
            sc.bump();
        }
    }

    let (name, bare) = name?;
    GearItem::Detailed(ItemDetail {
        is_variable: bare || looks_like_variable(&name),
        name,
        augments,
        rank,
        path,
    })
    .normalized()
}

fn parse_augments(list: &str) -> Vec<String> {
    split_top_level(list, b',')
        .into_iter()
        .map(|part| unquote(part.trim()))
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

fn unquote(s: &str) -> String {
    let b = s.as_bytes();
    if b.len() >= 2 && (b[0] == b'\'' || b[0] == b'"') && b[b.len() - 1] == b[0] {
        decode_escapes(&s[1..s.len() - 1])
    } else {
        s.replace(['\'', '"'], "")
    }
}

fn modes_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"state\.(\w+)\s*:\s*options\s*\(([^)]*)\)").expect("mode declaration regex")
    })
}

fn first_option_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"['"]([^'"]*)['"]"#).expect("mode option regex"))
}

/// Default option of every `state.<Name>Mode:options(...)` declaration,
/// keyed by the mode name without its `Mode` suffix. The first declaration
/// of a mode wins.
pub fn scan_modes(text: &str) -> BTreeMap<String, String> {
    let clean = mask_comments(text);
    let mut modes = BTreeMap::new();
    for caps in modes_regex().captures_iter(&clean) {
        let name = caps[1].strip_suffix("Mode").unwrap_or(&caps[1]).to_string();
        if let Some(first) = first_option_regex().captures(&caps[2]) {
            modes.entry(name).or_insert_with(|| first[1].to_string());
        }
    }
    modes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_augments_do_not_end_the_entry() {
        let gear = parse_gear_block(r#"main={name="Ochain", augments={'Mdef+15','Eva+10'}}"#);
        assert_eq!(
            gear[&Slot::Main],
            GearItem::Detailed(ItemDetail {
                name: "Ochain".into(),
                augments: Some(vec!["Mdef+15".into(), "Eva+10".into()]),
                ..ItemDetail::default()
            })
        );
    }

    #[test]
    fn table_beats_string_beats_variable() {
        let gear = parse_gear_block(
            r#"head=gear.hat, head="Plain Hat", head={name="Nyame Helm", path="B"},
               neck=gear.neck, neck="Loricate Torque +1",
               back=gear.capes.tp, body="A", body="B""#,
        );
        assert_eq!(gear[&Slot::Head].name(), "Nyame Helm");
        assert_eq!(gear[&Slot::Head].path(), Some(OdysseyPath::B));
        assert_eq!(gear[&Slot::Neck], GearItem::named("Loricate Torque +1"));
        assert_eq!(gear[&Slot::Back], GearItem::variable("gear.capes.tp"));
        assert_eq!(gear[&Slot::Body], GearItem::named("A"));
    }

    #[test]
    fn slot_synonyms_unknown_keys_and_sentinels() {
        let gear = parse_gear_block(
            r#"left_ear="Odnowa Earring +1", right_ring='Defending Ring', relic="Thing",
               feet="", legs="None", waist=true, hands=nil"#,
        );
        assert_eq!(gear[&Slot::Ear1], GearItem::named("Odnowa Earring +1"));
        assert_eq!(gear[&Slot::Ring2], GearItem::named("Defending Ring"));
        assert_eq!(gear[&Slot::Other("relic".into())], GearItem::named("Thing"));
        assert_eq!(gear.len(), 3);
    }

    #[test]
    fn item_fields_and_quotes() {
        let gear = parse_gear_block(
            r#"head={ name="Mpaca's Cap", augments={'Path: A', "Enh. \"Aggressor\"", ''}, rank=15, path="a" },
               body={ augments={'x'} }"#,
        );
        let head = &gear[&Slot::Head];
        assert_eq!(head.name(), "Mpaca's Cap");
        assert_eq!(head.augments(), ["Path: A", "Enh. \"Aggressor\""]);
        assert_eq!(head.rank(), Some(15));
        assert_eq!(head.path(), Some(OdysseyPath::A));
        assert!(!gear.contains_key(&Slot::Body));
    }

    #[test]
    fn combine_records_base_and_keeps_overrides_only() {
        let res = parse(
            "sets.A = {head=\"Cap\", body=\"Mail\"}\nsets.B = set_combine(sets.A, {head=\"Hat\"})",
        );
        assert_eq!(res.sets["sets.B"].len(), 1);
        assert_eq!(res.sets["sets.B"][&Slot::Head], GearItem::named("Hat"));
        assert_eq!(res.base_sets["sets.B"], "sets.A");
    }

    #[test]
    fn commented_out_sets_are_ignored() {
        let res = parse("-- sets.old = {head=\"Cap\"}\n--[[\nsets.older = {}\n]]\nsets.new = {}");
        assert_eq!(res.sets.keys().collect::<Vec<_>>(), vec!["sets.new"]);
    }

    #[test]
    fn degenerate_input_terminates() {
        for text in ["sets. =", "sets.=", "sets", "sets.a =", "sets.a = {", "sets.a = set_combine(", "sets.a == {}", "sets[ = {"] {
            let res = parse(text);
            assert!(res.sets.is_empty(), "{text}");
        }
    }

    #[test]
    fn empty_root_imports_nothing() {
        let opts = ScriptOpts {
            root: String::new(),
            ..ScriptOpts::default()
        };
        let res = parse_with("ab = {}\nsets.idle = {head=\"Hat\"}", &opts);
        assert!(res.sets.is_empty());
    }

    #[test]
    fn bracket_keys_are_always_slots() {
        let gear = parse_gear_block(r#"name="Stray", ["name"]="Odd", ["my slot"]="Thing", head="Hat""#);
        assert_eq!(gear.len(), 3);
        assert_eq!(gear[&Slot::Other("name".into())], GearItem::named("Odd"));
        assert_eq!(gear[&Slot::Other("my slot".into())], GearItem::named("Thing"));
    }

    #[test]
    fn mode_defaults() {
        let modes = scan_modes(
            "state.OffenseMode:options('Normal', 'Acc')\nstate.IdleMode:options(\"PDT\")\n-- state.CastingMode:options('Resist')\nstate.OffenseMode:options('Other')",
        );
        assert_eq!(modes.len(), 2);
        assert_eq!(modes["Offense"], "Normal");
        assert_eq!(modes["Idle"], "PDT");
    }
}
