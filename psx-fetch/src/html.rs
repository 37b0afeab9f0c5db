//! Tolerant HTML scanning.
//!
//! Not a parser. Tags are matched case-insensitively on an ASCII-lowercased
//! copy of the document (same byte offsets as the original), blocks are
//! scanned locally, and cell text is tag-stripped, entity-decoded and
//! whitespace-collapsed. Unclosed `<td>`/`<tr>` are tolerated.

/// A `<table>` reduced to header texts and body rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Index of the first header whose uppercased text contains `needle`.
    pub fn column(&self, needle: &str) -> Option<usize> {
        let needle = needle.to_ascii_uppercase();
        self.headers
            .iter()
            .position(|h| h.to_ascii_uppercase().contains(&needle))
    }
}

/// Every table in the document, in order.
pub fn tables(html: &str) -> Vec<Table> {
    let lower = html.to_ascii_lowercase();
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(start) = find_open_tag(&lower, "table", pos) {
        let end = lower[start..]
            .find("</table")
            .map(|i| start + i)
            .unwrap_or(lower.len());
        out.push(parse_table(&html[start..end], &lower[start..end]));
        pos = end;
    }
    out
}

/// The first table with a header containing `needle` (case-insensitive).
pub fn find_table(html: &str, needle: &str) -> Option<Table> {
    tables(html)
        .into_iter()
        .find(|t| t.column(needle).is_some())
}

fn parse_table(block: &str, lower: &str) -> Table {
    let headers = cells(block, lower, "th");

    let mut starts = Vec::new();
    let mut pos = 0;
    while let Some(at) = find_open_tag(lower, "tr", pos) {
        starts.push(at);
        pos = at + 3;
    }
    let rows = starts
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let e = starts.get(i + 1).copied().unwrap_or(lower.len());
            cells(&block[s..e], &lower[s..e], "td")
        })
        .filter(|row| !row.is_empty())
        .collect();

    Table { headers, rows }
}

/// Text of each `<tag>` cell in `block`.
fn cells(block: &str, lower: &str, tag: &str) -> Vec<String> {
    let close = format!("</{tag}");
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(open) = find_open_tag(lower, tag, pos) {
        let Some(gt) = lower[open..].find('>') else {
            break;
        };
        let content = open + gt + 1;
        let end = [
            lower[content..].find(&close).map(|i| content + i),
            find_open_tag(lower, tag, content),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(lower.len());
        out.push(clean_text(&block[content..end]));
        pos = end;
    }
    out
}

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

/// Cleaned text of every `<tag>` element, in document order.
pub fn element_texts(html: &str, tag: &str) -> Vec<String> {
    let lower = html.to_ascii_lowercase();
    let close = format!("</{tag}");
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(open) = find_open_tag(&lower, tag, pos) {
        let Some(gt) = lower[open..].find('>') else {
            break;
        };
        let content = open + gt + 1;
        let Some(len) = lower[content..].find(&close) else {
            break;
        };
        out.push(clean_text(&html[content..content + len]));
        pos = content + len;
    }
    out
}

/// First non-empty `<tag>` text.
pub fn first_text(html: &str, tag: &str) -> Option<String> {
    element_texts(html, tag).into_iter().find(|t| !t.is_empty())
}

/// Text of the first element whose `class` attribute lists `class`.
pub fn text_by_class(html: &str, class: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let class = class.to_ascii_lowercase();
    let mut pos = 0;
    while let Some(rel) = lower[pos..].find("class=") {
        let attr = pos + rel + "class=".len();
        pos = attr;

        let Some(value) = attribute_value(&lower[attr..]) else {
            continue;
        };
        if !value.split_whitespace().any(|c| c == class) {
            continue;
        }
        let Some(tag_start) = lower[..attr].rfind('<') else {
            continue;
        };
        let name: String = lower[tag_start + 1..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        let Some(gt) = lower[attr..].find('>') else {
            continue;
        };
        let content = attr + gt + 1;
        let end = lower[content..]
            .find(&format!("</{name}"))
            .map(|i| content + i)
            .unwrap_or(lower.len());
        let text = clean_text(&html[content..end]);
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

/// The whole document as plain text.
pub fn page_text(html: &str) -> String {
    clean_text(html)
}

fn attribute_value(s: &str) -> Option<&str> {
    let quote = s.chars().next()?;
    if quote == '"' || quote == '\'' {
        let rest = &s[1..];
        rest.find(quote).map(|end| &rest[..end])
    } else {
        let end = s
            .find(|c: char| c.is_whitespace() || c == '>')
            .unwrap_or(s.len());
        Some(&s[..end])
    }
}

/// Position of the next `<tag` at or after `from` that is a whole tag name
/// (so `th` does not match `<thead>`).
fn find_open_tag(lower: &str, tag: &str, from: usize) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut pos = from;
    while let Some(rel) = lower.get(pos..)?.find(&needle) {
        let at = pos + rel;
        let next = lower[at + needle.len()..].chars().next();
        if matches!(next, Some(c) if c == '>' || c == '/' || c.is_ascii_whitespace()) {
            return Some(at);
        }
        pos = at + needle.len();
    }
    None
}

// ---------------------------------------------------------------------------
// Text cleanup
// ---------------------------------------------------------------------------

/// Strip tags, decode common entities, collapse whitespace.
pub fn clean_text(fragment: &str) -> String {
    let mut stripped = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                stripped.push(' ');
            }
            _ if !in_tag => stripped.push(c),
            _ => {}
        }
    }
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
