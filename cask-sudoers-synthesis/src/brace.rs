//! Shell brace-set expansion for artifact paths

/// Expand `{a,b}` sets, including nested ones, into concrete paths.
///
/// `A{/B,/C}` expands to `A/B` and `A/C`. An empty option is allowed, so
/// `A{/B{/C,},}` yields `A/B/C`, `A/B` and `A`. A pattern without braces, or
/// with an unmatched `{`, is returned unchanged.
pub fn expand(pattern: &str) -> Vec<String> {
    let Some((open, close)) = first_group(pattern) else {
        return vec![pattern.to_string()];
    };
    let before = &pattern[..open];
    let after = &pattern[close + 1..];
    split_options(&pattern[open + 1..close])
        .into_iter()
        .flat_map(|option| expand(&format!("{before}{option}{after}")))
        .collect()
}

/// Byte offsets of the first top-level `{` and its matching `}`
fn first_group(pattern: &str) -> Option<(usize, usize)> {
    let open = pattern.find('{')?;
    let mut depth = 0usize;
    for (offset, c) in pattern[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open, open + offset));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on commas that are not inside a nested group
fn split_options(inner: &str) -> Vec<&str> {
    let mut options = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (offset, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                options.push(&inner[start..offset]);
                start = offset + 1;
            }
            _ => {}
        }
    }
    options.push(&inner[start..]);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("A{/B,/C}", &["A/B", "A/C"])]
    #[case("A{/B{/C,},}", &["A/B/C", "A/B", "A"])]
    #[case("/Library/Foo", &["/Library/Foo"])]
    #[case("/Library/{A,B}/{x,y}", &["/Library/A/x", "/Library/A/y", "/Library/B/x", "/Library/B/y"])]
    #[case("/Library/{Unclosed", &["/Library/{Unclosed"])]
    fn test_expand(#[case] pattern: &str, #[case] expected: &[&str]) {
        assert_eq!(expand(pattern), expected);
    }

    #[test]
    fn test_expand_single_option_group() {
        assert_eq!(expand("~/Library/{Caches}"), vec!["~/Library/Caches"]);
    }
}
