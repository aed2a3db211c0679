// Re-emit gear sets into an existing script.
//
// Bodies of sets that already have an assignment are replaced in place; the
// rest of the text (comments, functions, the combine wrapper around a body)
// is left alone. Sets without an assignment are appended to the init
// function, unless their path already shows up somewhere in the text.
use std::cmp::Reverse;
use std::collections::HashSet;

use log::{debug, warn};
use regex::Regex;

use crate::model::{BaseMap, GearItem, GearSet, SetCollection, Slot, qualify_set_path};
use crate::opts::ScriptOpts;
use crate::scanner::{
    Scanner, find_block_end, find_call_table, find_matching, is_ident_byte, mask_comments,
    mask_source, rfind_keyword,
};

pub fn generate(original: &str, sets: &SetCollection, base_sets: &BaseMap) -> String {
    generate_with(original, sets, base_sets, &ScriptOpts::default())
}

pub fn generate_with(
    original: &str,
    sets: &SetCollection,
    base_sets: &BaseMap,
    opts: &ScriptOpts,
) -> String {
    if original.trim().is_empty() {
        let scaffold = format!("function {}()\nend\n", opts.init_fn);
        return generate_with(&scaffold, sets, base_sets, opts);
    }

    let (mut text, processed) = rewrite_existing(original, sets, opts);
    let pending: Vec<&str> = sets
        .keys()
        .map(String::as_str)
        .filter(|p| !p.trim().is_empty() && !processed.contains(*p))
        .collect();
    if pending.is_empty() {
        return text;
    }

    let statements = new_statements(&text, &pending, sets, base_sets, opts);
    if !statements.is_empty() && !insert_statements(&mut text, &statements, opts) {
        warn!(
            "no {}() function found; {} new sets were not written",
            opts.init_fn,
            statements.len()
        );
    }
    text
}

#[derive(Debug)]
struct Edit {
    open: usize,
    close: usize,
    body: String,
}

/// Replace the bodies of every set that has an assignment in `original`.
/// Longer paths go first; a match overlapping an earlier rewrite is skipped.
fn rewrite_existing(
    original: &str,
    sets: &SetCollection,
    opts: &ScriptOpts,
) -> (String, HashSet<String>) {
    let masked = mask_comments(original);
    let mut order: Vec<&String> = sets.keys().filter(|p| !p.trim().is_empty()).collect();
    order.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut edits: Vec<Edit> = Vec::new();
    let mut processed = HashSet::new();
    for path in order {
        for (stmt, open, close) in find_assignments(&masked, path, opts) {
            if edits.iter().any(|e| open <= e.close && e.open <= close) {
                debug!("{path}: body overlaps a rewritten set, left as is");
                continue;
            }
            let indent = line_indent(original, stmt);
            let lines = format_gear_lines(&sets[path], &format!("{indent}{}", opts.indent));
            edits.push(Edit {
                open,
                close,
                body: format!("\n{lines}\n{indent}"),
            });
            processed.insert(path.clone());
        }
    }

    edits.sort_by_key(|e| Reverse(e.open));
    let mut text = original.to_string();
    for e in &edits {
        text.replace_range(e.open + 1..e.close, &e.body);
    }
    debug!("rewrote {} set bodies", edits.len());
    (text, processed)
}

/// `(statement start, open brace, close brace)` of each `path = {` or
/// `path = <combine>(<base>, {` assignment in comment-masked text.
fn find_assignments(masked: &str, path: &str, opts: &ScriptOpts) -> Vec<(usize, usize, usize)> {
    let bytes = masked.as_bytes();
    let mut out = Vec::new();
    if path.is_empty() {
        return out;
    }
    let mut from = 0;
    while let Some(i) = masked[from..].find(path) {
        let start = from + i;
        from = start + path.len();
        if start > 0 && (is_ident_byte(bytes[start - 1]) || bytes[start - 1] == b'.') {
            continue;
        }
        let mut sc = Scanner::at(masked, from);
        if sc
            .peek()
            .is_some_and(|b| is_ident_byte(b) || b == b'.' || b == b'[')
        {
            continue;
        }
        sc.skip_whitespace();
        if !sc.eat("=") || sc.peek() == Some(b'=') {
            continue;
        }
        sc.skip_whitespace();
        let open = if sc.eat_keyword(&opts.combine_fn) {
            sc.skip_whitespace();
            if sc.peek() != Some(b'(') {
                continue;
            }
            find_call_table(masked, sc.pos())
        } else if sc.peek() == Some(b'{') {
            Some(sc.pos())
        } else {
            None
        };
        let Some(open) = open else {
            continue;
        };
        let Some(close) = find_matching(masked, open, b'{', b'}') else {
            continue;
        };
        out.push((start, open, close));
        from = open + 1;
    }
    out
}

fn line_indent(text: &str, pos: usize) -> &str {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let line = &text[line_start..];
    let len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..len]
}

fn new_statements(
    text: &str,
    pending: &[&str],
    sets: &SetCollection,
    base_sets: &BaseMap,
    opts: &ScriptOpts,
) -> Vec<String> {
    let indent = &opts.indent;
    let inner = format!("{indent}{indent}");
    let mut out = Vec::new();
    for path in bases_first(pending, base_sets) {
        let qualified = qualify_set_path(path, &opts.root);
        if contains_path_token(text, &qualified) {
            debug!("{qualified}: already mentioned in the script, not appending");
            continue;
        }
        let lines = format_gear_lines(&sets[path], &inner);
        let statement = match base_sets.get(path) {
            Some(base) => format!(
                "{indent}{qualified} = {}({base}, {{\n{lines}\n{indent}}})",
                opts.combine_fn
            ),
            None => format!("{indent}{qualified} = {{\n{lines}\n{indent}}}"),
        };
        out.push(statement);
    }
    out
}

/// Order new sets so a set combined from another new set comes after it.
fn bases_first<'a>(pending: &[&'a str], base_sets: &BaseMap) -> Vec<&'a str> {
    let mut remaining: Vec<&'a str> = pending.to_vec();
    let mut ordered = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let ready: Vec<&'a str> = remaining
            .iter()
            .copied()
            .filter(|p| {
                base_sets
                    .get(*p)
                    .is_none_or(|b| b.as_str() == *p || !remaining.contains(&b.as_str()))
            })
            .collect();
        // a base cycle: emit the rest as is
        let batch = if ready.is_empty() { remaining.clone() } else { ready };
        remaining.retain(|p| !batch.contains(p));
        ordered.extend(batch);
    }
    ordered
}

/// Case-insensitive search for `token` delimited by non-identifier chars.
/// Comments and strings count.
pub fn contains_path_token(text: &str, token: &str) -> bool {
    let Ok(re) = Regex::new(&format!("(?i){}", regex::escape(token))) else {
        return true;
    };
    let bytes = text.as_bytes();
    re.find_iter(text).any(|m| {
        let before = m.start().checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(m.end()).copied();
        !before.is_some_and(is_ident_byte) && !after.is_some_and(is_ident_byte)
    })
}

/// Insert statements after the last table closed inside the init function.
fn insert_statements(text: &mut String, statements: &[String], opts: &ScriptOpts) -> bool {
    let masked = mask_source(text, true);
    let decl = Regex::new(&format!(r"function\s+{}\s*\(", regex::escape(&opts.init_fn)))
        .ok()
        .and_then(|re| re.find(&masked).map(|m| m.end()));
    let Some(body) = decl else {
        return false;
    };
    let Some(end) =
        find_block_end(&masked, body).or_else(|| rfind_keyword(&masked, "end", body))
    else {
        return false;
    };

    let indent = &opts.indent;
    let marker = &opts.marker;
    let joined = statements.join("\n\n");
    match masked[body..end].rfind('}').map(|i| body + i) {
        Some(brace) => match masked[brace..end].find('\n') {
            Some(nl) => text.insert_str(brace + nl, &format!("\n\n{indent}{marker}\n{joined}")),
            None => text.insert_str(end, &format!("\n\n{indent}{marker}\n{joined}\n")),
        },
        None => {
            let line_start = text[..end].rfind('\n').map_or(0, |i| i + 1);
            if text[line_start..end].trim().is_empty() {
                text.insert_str(line_start, &format!("{indent}{marker}\n{joined}\n"));
            } else {
                text.insert_str(end, &format!("\n{indent}{marker}\n{joined}\n"));
            }
        }
    }
    debug!("appended {} new sets to {}()", statements.len(), opts.init_fn);
    true
}

/// One `slot=value,` line per filled slot, in canonical slot order.
pub fn format_gear_lines(gear: &GearSet, indent: &str) -> String {
    let lines: Vec<String> = gear
        .iter()
        .filter(|(_, item)| !matches!(item.name().trim(), "" | "None"))
        .map(|(slot, item)| format!("{indent}{}={},", slot_key(slot), format_item(item)))
        .collect();
    if lines.is_empty() {
        format!("{indent}-- No overrides")
    } else {
        lines.join("\n")
    }
}

pub fn format_item(item: &GearItem) -> String {
    let detail = match item {
        GearItem::Name(name) => return quote_name(name),
        GearItem::Detailed(d) if d.is_variable => return d.name.clone(),
        GearItem::Detailed(d) if !d.has_extras() => return quote_name(&d.name),
        GearItem::Detailed(d) => d,
    };

    let mut parts = vec![format!("name={}", quote_name(&detail.name))];
    let augments: Vec<String> = detail
        .augments
        .iter()
        .flatten()
        .filter(|a| !a.trim().is_empty())
        .map(|a| format!("'{}'", escape(a, '\'')))
        .collect();
    if !augments.is_empty() {
        parts.push(format!("augments={{{}}}", augments.join(",")));
    }
    if let Some(path) = detail.path {
        parts.push(format!("path=\"{path}\""));
    }
    if let Some(rank) = detail.rank {
        parts.push(format!("rank={rank}"));
    }
    format!("{{{}}}", parts.join(", "))
}

fn quote_name(name: &str) -> String {
    format!("\"{}\"", escape(name, '"'))
}

fn escape(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

const LUA_KEYWORDS: [&str; 22] = [
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Bare key for canonical slots and plain identifiers, `["token"]` for
/// anything the importer would not read back as a slot.
fn slot_key(slot: &Slot) -> String {
    let token = slot.as_str();
    let plain = token.bytes().next().is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && token.bytes().all(is_ident_byte)
        && !LUA_KEYWORDS.contains(&token)
        && !["name", "augments", "path", "rank"].contains(&token);
    if plain {
        token.to_string()
    } else {
        format!("[{}]", quote_name(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemDetail, OdysseyPath};
    use pretty_assertions::assert_eq;

    fn set(items: &[(Slot, GearItem)]) -> GearSet {
        items.iter().cloned().collect()
    }

    #[test]
    fn lines_follow_canonical_order() {
        let mut gear = GearSet::new();
        gear.insert(Slot::Feet, GearItem::named("Boots"));
        gear.insert(Slot::Main, GearItem::named("Sword"));
        gear.insert(Slot::Neck, GearItem::named("Torque"));
        assert_eq!(
            format_gear_lines(&gear, "  "),
            "  main=\"Sword\",\n  neck=\"Torque\",\n  feet=\"Boots\","
        );
    }

    #[test]
    fn item_formats() {
        assert_eq!(format_item(&GearItem::variable("myVar.slot")), "myVar.slot");
        assert_eq!(format_item(&GearItem::named("Mpaca's Cap")), "\"Mpaca's Cap\"");
        let item = GearItem::Detailed(ItemDetail {
            name: "Nyame Helm".into(),
            augments: Some(vec!["Path: B".into(), "Enh. 'x'".into(), " ".into()]),
            rank: Some(20),
            path: Some(OdysseyPath::B),
            is_variable: false,
        });
        assert_eq!(
            format_item(&item),
            r#"{name="Nyame Helm", augments={'Path: B','Enh. \'x\''}, path="B", rank=20}"#
        );
    }

    #[test]
    fn control_characters_are_escaped() {
        assert_eq!(format_item(&GearItem::named("a\nb\t\"c\"\\")), r#""a\nb\t\"c\"\\""#);
        let item = GearItem::Detailed(ItemDetail {
            name: "Cape".into(),
            augments: Some(vec!["line\r\nbreak".into()]),
            ..ItemDetail::default()
        });
        assert_eq!(format_item(&item), r#"{name="Cape", augments={'line\r\nbreak'}}"#);
    }

    #[test]
    fn odd_slot_tokens_use_bracket_keys() {
        let gear = set(&[
            (Slot::Head, GearItem::named("Hat")),
            (Slot::Other("my slot".into()), GearItem::named("A")),
            (Slot::Other("name".into()), GearItem::named("B")),
            (Slot::Other("end".into()), GearItem::named("C")),
            (Slot::Other("relic_2".into()), GearItem::named("D")),
        ]);
        assert_eq!(
            format_gear_lines(&gear, ""),
            "head=\"Hat\",\n[\"end\"]=\"C\",\n[\"my slot\"]=\"A\",\n[\"name\"]=\"B\",\nrelic_2=\"D\","
        );
    }

    #[test]
    fn blank_set_paths_are_ignored() {
        let mut sets = SetCollection::new();
        sets.insert(String::new(), GearSet::new());
        sets.insert("  ".into(), set(&[(Slot::Head, GearItem::named("Hat"))]));
        let original = "x = 1\na  = {}\n";
        assert_eq!(generate(original, &sets, &BaseMap::new()), original);
    }

    #[test]
    fn empty_set_gets_placeholder_comment() {
        assert_eq!(format_gear_lines(&GearSet::new(), "    "), "    -- No overrides");
    }

    #[test]
    fn rewrite_keeps_combine_wrapper_and_indent() {
        let original = "function init_gear_sets()\n\tsets.B = set_combine(sets.A, {head=\"Old\"}) -- keep\nend\n";
        let mut sets = SetCollection::new();
        sets.insert("sets.B".into(), set(&[(Slot::Head, GearItem::named("New"))]));
        let out = generate(original, &sets, &BaseMap::new());
        assert_eq!(
            out,
            "function init_gear_sets()\n\tsets.B = set_combine(sets.A, {\n\t    head=\"New\",\n\t}) -- keep\nend\n"
        );
    }

    #[test]
    fn token_search_is_case_insensitive_and_bounded() {
        assert!(contains_path_token("-- SETS.newone here", "sets.NewOne"));
        assert!(contains_path_token("x = sets.NewOne.Acc", "sets.NewOne"));
        assert!(!contains_path_token("x = sets.NewOneX", "sets.NewOne"));
    }

    #[test]
    fn new_sets_respect_base_order() {
        let mut bases = BaseMap::new();
        bases.insert("sets.a".into(), "sets.z".into());
        let order = bases_first(&["sets.a", "sets.m", "sets.z"], &bases);
        assert_eq!(order, vec!["sets.m", "sets.z", "sets.a"]);
    }
}
