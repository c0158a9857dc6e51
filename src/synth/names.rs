use std::collections::BTreeSet;

/// Replace every character that cannot appear in a Go identifier with `_`.
pub fn sanitize_ident(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Render `s` as a Go interpreted string literal.
pub fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Hands out unique Go identifiers for a single program.
///
/// Two model names that sanitize to the same identifier get numbered suffixes
/// in request order, so allocation is deterministic.
#[derive(Debug, Default)]
pub struct NameAllocator {
    taken: BTreeSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, prefix: &str, raw: &str) -> String {
        let base = format!("{prefix}{}", sanitize_ident(raw));
        if self.taken.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_dotted_and_indexed_actions() {
        assert_eq!(sanitize_ident("put"), "put");
        assert_eq!(sanitize_ident("s.acquire"), "s_acquire");
        assert_eq!(sanitize_ident("item[1]"), "item_1_");
        assert_eq!(sanitize_ident(""), "_");
    }

    #[test]
    fn quotes_special_characters() {
        assert_eq!(go_quote("plain"), "\"plain\"");
        assert_eq!(go_quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(go_quote("a\\b"), "\"a\\\\b\"");
        assert_eq!(go_quote("100%"), "\"100%\"");
        assert_eq!(go_quote("x\u{1}"), "\"x\\u0001\"");
    }

    #[test]
    fn allocator_disambiguates_collisions() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("ch_", "a.b"), "ch_a_b");
        assert_eq!(names.allocate("ch_", "a_b"), "ch_a_b_2");
        assert_eq!(names.allocate("ch_", "a-b"), "ch_a_b_3");
        assert_eq!(names.allocate("Process_", "a_b"), "Process_a_b");
    }
}
