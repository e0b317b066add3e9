// SPDX-License-Identifier: MIT OR Apache-2.0
//! Name sanitizing and matching helpers.

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Remove all non-word characters and replace whitespace runs with `_`.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            in_space = false;
            if is_word(c) {
                out.push(c);
            }
        }
    }
    out
}

/// Sanitize `name` and append the first free numeric suffix if it is taken.
pub fn next_available_name<F>(name: &str, taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let name = sanitize_name(name);
    if !taken(&name) {
        return name;
    }
    let mut i = 1;
    loop {
        let candidate = format!("{name}{i}");
        if !taken(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

/// Case-insensitive wildcard match. `*` matches any run of characters and
/// the pattern may match anywhere in the name.
pub fn match_name(name: &str, pattern: &str) -> bool {
    let pattern: String = pattern
        .chars()
        .filter(|c| is_word(*c) || c.is_whitespace() || *c == '*')
        .collect::<String>()
        .to_lowercase();
    let name = name.to_lowercase();

    let mut rest = name.as_str();
    for part in pattern.split('*').filter(|p| !p.is_empty()) {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("@my  &Act$ion!#"), "my_Action");
        assert_eq!(sanitize_name("plain_name1"), "plain_name1");
    }

    #[test]
    fn test_next_available_name() {
        let taken = ["node", "node1", "node2"];
        let name = next_available_name("node", |n| taken.contains(&n));
        assert_eq!(name, "node3");
        assert_eq!(next_available_name("other", |n| taken.contains(&n)), "other");
    }

    #[test]
    fn test_match_name() {
        assert!(match_name("SwitchAction", "switch"));
        assert!(match_name("SwitchAction", "s*act"));
        assert!(!match_name("NullAction", "switch"));
        assert!(match_name("anything", ""));
    }
}
