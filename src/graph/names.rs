//! Tensor name resolution
//!
//! Graph lookups are keyed by `<op>:<index>`. Callers commonly pass a bare op
//! name instead, which refers to the op's first output.

/// Resolve a tensor identifier to canonical `<op>:<index>` form.
///
/// Names already ending in `:<digits>` are returned unchanged, everything else
/// gets `:0` appended. Idempotent.
pub fn resolve(name: &str) -> String {
    if has_output_index(name) {
        name.to_string()
    } else {
        format!("{}:0", name)
    }
}

/// Resolve a collection of names, preserving order
pub fn resolve_all<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names.iter().map(|n| resolve(n.as_ref())).collect()
}

/// Split a canonical name into op name and output index
pub fn split(name: &str) -> Option<(&str, usize)> {
    let (op, index) = name.rsplit_once(':')?;
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((op, index.parse().ok()?))
}

fn has_output_index(name: &str) -> bool {
    match name.rsplit_once(':') {
        Some((_, suffix)) => !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_bare_op() {
        assert_eq!(resolve("op"), "op:0");
        assert_eq!(resolve("import/x"), "import/x:0");
    }

    #[test]
    fn test_resolve_canonical_unchanged() {
        assert_eq!(resolve("op:0"), "op:0");
        assert_eq!(resolve("op:3"), "op:3");
        assert_eq!(resolve("op:12"), "op:12");
    }

    #[test]
    fn test_resolve_non_numeric_suffix() {
        assert_eq!(resolve("carlitos:tevez"), "carlitos:tevez:0");
        assert_eq!(resolve("op:"), "op::0");
    }

    #[test]
    fn test_resolve_idempotent() {
        for name in ["op", "op:0", "op:7", "a/b:c", "", ":", "x:1a"] {
            let once = resolve(name);
            assert_eq!(resolve(&once), once, "not idempotent for {:?}", name);
        }
    }

    #[test]
    fn test_split() {
        assert_eq!(split("a/b:2"), Some(("a/b", 2)));
        assert_eq!(split("a:b:0"), Some(("a:b", 0)));
        assert_eq!(split("a"), None);
        assert_eq!(split("a:x"), None);
    }

    #[test]
    fn test_resolve_all_keeps_order() {
        assert_eq!(resolve_all(&["b", "a:1"]), vec!["b:0", "a:1"]);
    }
}
