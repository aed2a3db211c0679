// Byte-level scanner shared by the importer and the exporter.
// Every structural token is ASCII, so offsets the scanner stops at are always
// char boundaries and can be used to slice the source.

pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self::at(src, 0)
    }

    pub fn at(src: &'a str, pos: usize) -> Self {
        Self {
            src,
            pos: pos.min(src.len()),
        }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.src.len());
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    /// Advance by one char.
    pub fn bump(&mut self) {
        if let Some(c) = self.src[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }

    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    pub fn eat(&mut self, lit: &str) -> bool {
        if self.src[self.pos..].starts_with(lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    /// Like `eat`, but the literal must not run on into an identifier.
    pub fn eat_keyword(&mut self, word: &str) -> bool {
        if !self.src[self.pos..].starts_with(word) {
            return false;
        }
        let next = self.src.as_bytes().get(self.pos + word.len()).copied();
        if next.is_some_and(is_ident_byte) {
            return false;
        }
        self.pos += word.len();
        true
    }

    pub fn identifier(&mut self) -> Option<&'a str> {
        let start = self.pos;
        if !self.peek().is_some_and(is_ident_start) {
            return None;
        }
        while self.peek().is_some_and(is_ident_byte) {
            self.pos += 1;
        }
        Some(&self.src[start..self.pos])
    }

    /// `ident(.ident)*`, returned as one slice.
    pub fn ident_chain(&mut self) -> Option<&'a str> {
        let start = self.pos;
        self.identifier()?;
        while self.peek() == Some(b'.') && self.peek_at(1).is_some_and(is_ident_start) {
            self.pos += 1;
            self.identifier();
        }
        Some(&self.src[start..self.pos])
    }

    pub fn integer(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return None;
        }
        self.src[start..self.pos].parse().ok()
    }

    /// Raw contents of a single- or double-quoted string. Escapes are left
    /// as written; see [`decode_escapes`]. Unterminated strings fail without
    /// moving the cursor.
    pub fn quoted_string(&mut self) -> Option<&'a str> {
        let quote = self.peek().filter(|b| *b == b'"' || *b == b'\'')?;
        let (end, closed) = string_end(self.src.as_bytes(), self.pos);
        if !closed || end < self.pos + 2 || self.src.as_bytes()[end - 1] != quote {
            return None;
        }
        let raw = &self.src[self.pos + 1..end - 1];
        self.pos = end;
        Some(raw)
    }

    /// At an `open` delimiter, move past its matching `close` and return both
    /// positions. Nested pairs and quoted strings are skipped.
    pub fn balanced(&mut self, open: u8, close: u8) -> Option<(usize, usize)> {
        if self.peek() != Some(open) {
            return None;
        }
        let start = self.pos;
        let end = find_matching(self.src, start, open, close)?;
        self.pos = end + 1;
        Some((start, end))
    }

    /// A set path beginning with `root`: `sets.a.b`, `sets.WS['Tachi: Fudo']`.
    /// At least one segment is required.
    pub fn set_path(&mut self, root: &str) -> Option<&'a str> {
        let start = self.pos;
        if !self.eat(root) {
            return None;
        }
        let mut segments = 0;
        loop {
            let save = self.pos;
            let ok = match self.peek() {
                Some(b'.') => {
                    self.pos += 1;
                    self.identifier().is_some()
                }
                Some(b'[') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    let key = self.quoted_string().is_some()
                        || self.integer().is_some()
                        || self.identifier().is_some();
                    self.skip_whitespace();
                    key && self.eat("]")
                }
                _ => false,
            };
            if !ok {
                self.pos = save;
                break;
            }
            segments += 1;
        }
        if segments == 0 {
            self.pos = start;
            return None;
        }
        Some(&self.src[start..self.pos])
    }

    /// Skip the rest of a table field: stops at a `,` or `;` at the current
    /// nesting level, at an unmatched closer, or at the end of input.
    pub fn skip_value(&mut self) {
        let bytes = self.src.as_bytes();
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b',' | b';' if depth == 0 => break,
                b'{' | b'(' | b'[' => depth += 1,
                b'}' | b')' | b']' => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                b'"' | b'\'' => {
                    self.pos = string_end(bytes, self.pos).0;
                    continue;
                }
                _ => {}
            }
            self.bump();
        }
    }
}

/// Index just past the string starting at `start`, and whether it was closed.
/// Strings stop at an unescaped newline.
fn string_end(bytes: &[u8], start: usize) -> (usize, bool) {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return (i, false),
            b if b == quote => return (i + 1, true),
            _ => i += 1,
        }
    }
    (bytes.len(), false)
}

/// Position of the delimiter closing the one at `open_pos`.
pub fn find_matching(src: &str, open_pos: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = open_pos;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' || b == b'\'' {
            i = string_end(bytes, i).0;
            continue;
        }
        if b == open {
            depth += 1;
        } else if b == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// First `{` among the top-level arguments of the call whose `(` is at
/// `open_paren`. Braces inside nested calls don't count.
pub fn find_call_table(src: &str, open_paren: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = open_paren + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'{' if depth == 0 => return Some(i),
            b')' if depth == 0 => return None,
            b'{' | b'(' | b'[' => depth += 1,
            b'}' | b')' | b']' => depth = depth.saturating_sub(1),
            b'"' | b'\'' => {
                i = string_end(bytes, i).0;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn long_bracket_level(bytes: &[u8], i: usize) -> Option<usize> {
    if bytes.get(i) != Some(&b'[') {
        return None;
    }
    let mut level = 0;
    while bytes.get(i + 1 + level) == Some(&b'=') {
        level += 1;
    }
    (bytes.get(i + 1 + level) == Some(&b'[')).then_some(level)
}

fn long_bracket_end(bytes: &[u8], from: usize, level: usize) -> usize {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b']'
            && bytes[i + 1..].iter().take(level).all(|b| *b == b'=')
            && bytes.get(i + 1 + level) == Some(&b']')
        {
            return i + level + 2;
        }
        i += 1;
    }
    bytes.len()
}

fn blank(out: &mut [u8], from: usize, to: usize) {
    for b in &mut out[from..to] {
        if *b != b'\n' && *b != b'\r' {
            *b = b' ';
        }
    }
}

/// Copy of `text` with every comment replaced by spaces (line breaks kept),
/// and with string contents blanked too when `strings` is set. The result
/// has the same length as the input, so offsets carry over.
pub fn mask_source(text: &str, strings: bool) -> String {
    let bytes = text.as_bytes();
    let mut out = bytes.to_vec();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let end = match long_bracket_level(bytes, i + 2) {
                    Some(level) => long_bracket_end(bytes, i + 4 + level, level),
                    None => bytes[i..]
                        .iter()
                        .position(|b| *b == b'\n')
                        .map_or(bytes.len(), |p| i + p),
                };
                blank(&mut out, i, end);
                i = end;
            }
            b'"' | b'\'' => {
                let (end, closed) = string_end(bytes, i);
                if strings {
                    blank(&mut out, i + 1, if closed { end - 1 } else { end });
                }
                i = end;
            }
            b'[' => match long_bracket_level(bytes, i) {
                Some(level) => {
                    let end = long_bracket_end(bytes, i + 2 + level, level);
                    if strings {
                        blank(&mut out, i + 2 + level, end.saturating_sub(level + 2).max(i + 2 + level));
                    }
                    i = end;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

pub fn mask_comments(text: &str) -> String {
    mask_source(text, false)
}

/// Find the keyword closing a block whose opener ends right before `from`.
/// `masked` must have comments and strings blanked.
pub fn find_block_end(masked: &str, from: usize) -> Option<usize> {
    let bytes = masked.as_bytes();
    let mut depth = 1usize;
    let mut i = from;
    while i < bytes.len() {
        if !is_ident_byte(bytes[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && is_ident_byte(bytes[i]) {
            i += 1;
        }
        let field = start > 0 && matches!(bytes[start - 1], b'.' | b':');
        if field || (start > 0 && is_ident_byte(bytes[start - 1])) {
            continue;
        }
        match &masked[start..i] {
            "function" | "if" | "do" | "repeat" => depth += 1,
            "end" | "until" => {
                depth -= 1;
                if depth == 0 {
                    return Some(start);
                }
            }
            _ => {}
        }
    }
    None
}

/// Start of the last standalone occurrence of `word` at or after `from`.
pub fn rfind_keyword(masked: &str, word: &str, from: usize) -> Option<usize> {
    let bytes = masked.as_bytes();
    masked[from..]
        .match_indices(word)
        .map(|(i, _)| from + i)
        .filter(|&i| {
            let before = i.checked_sub(1).map(|j| bytes[j]);
            let after = bytes.get(i + word.len()).copied();
            !before.is_some_and(is_ident_byte) && !after.is_some_and(is_ident_byte)
        })
        .last()
}

/// Decode backslash escapes in a raw string literal.
pub fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Split on top-level `sep`, ignoring separators inside quotes or brackets.
pub fn split_top_level(src: &str, sep: u8) -> Vec<&str> {
    let bytes = src.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = string_end(bytes, i).0;
                continue;
            }
            b'{' | b'(' | b'[' => depth += 1,
            b'}' | b')' | b']' => depth = depth.saturating_sub(1),
            b if b == sep && depth == 0 => {
                parts.push(&src[last..i]);
                last = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&src[last..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_skips_nested_tables_and_strings() {
        let src = r#"{ main={name="Ochain", augments={'Mdef+15','}'}} } tail"#;
        let mut sc = Scanner::new(src);
        let (open, close) = sc.balanced(b'{', b'}').unwrap();
        assert_eq!(open, 0);
        assert_eq!(&src[close + 1..], " tail");
    }

    #[test]
    fn set_path_segments() {
        let mut sc = Scanner::new("sets.precast.WS['Tachi: Fudo'] = {");
        assert_eq!(sc.set_path("sets"), Some("sets.precast.WS['Tachi: Fudo']"));
        let mut sc = Scanner::new("sets. =");
        assert_eq!(sc.set_path("sets"), None);
        assert_eq!(sc.pos(), 0);
        let mut sc = Scanner::new("setsA.b");
        assert_eq!(sc.set_path("sets"), None);
    }

    #[test]
    fn masking_keeps_offsets_and_strings() {
        let src = "a = \"--x\" -- gone\nb = 1 --[[ block\n]] c";
        let masked = mask_comments(src);
        assert_eq!(masked.len(), src.len());
        assert!(masked.contains("\"--x\""));
        assert!(!masked.contains("gone"));
        assert!(!masked.contains("block"));
        assert!(masked.ends_with(" c"));
        assert_eq!(masked.matches('\n').count(), 2);
    }

    #[test]
    fn block_end_counts_nested_blocks() {
        let src = "function f()\n if x then\n  for i=1,2 do end\n end\n s = 'end'\nend\nfunction g() end";
        let masked = mask_source(src, true);
        let end = find_block_end(&masked, "function f()".len()).unwrap();
        assert_eq!(&src[end..end + 4], "end\n");
        assert_eq!(src[..end].matches("end").count(), 3);
    }

    #[test]
    fn split_top_level_respects_quotes() {
        let parts = split_top_level("'a,b', \"c\", d", b',');
        assert_eq!(parts, vec!["'a,b'", " \"c\"", " d"]);
    }

    #[test]
    fn call_table_skips_nested_calls() {
        let src = "set_combine(set_combine(sets.A, {x=1}), {head=\"Hat\"})";
        let open = src.find('(').unwrap();
        let brace = find_call_table(src, open).unwrap();
        assert!(src[brace..].starts_with("{head"));
    }
}
