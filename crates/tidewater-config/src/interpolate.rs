//! `${section:option}` interpolation over a merged section map.
//!
//! References are expanded transitively. `${option}` refers to the section
//! that holds the value being expanded and `$$` yields a literal `$`.
//! Cycles are detected with the stack of keys currently being expanded.

use crate::{ConfigError, SectionMap};

/// A (section, option) pair currently on the expansion stack.
type Key = (String, String);

/// Resolve a single option, following references to their terminal values.
pub(crate) fn resolve_option(
    sections: &SectionMap,
    section: &str,
    option: &str,
) -> Result<String, ConfigError> {
    let mut stack = Vec::new();
    resolve_inner(sections, section, &option.to_ascii_lowercase(), &mut stack)
}

/// Expand references in free text as if it were a value stored in `section`.
pub(crate) fn interpolate_text(
    sections: &SectionMap,
    section: &str,
    text: &str,
) -> Result<String, ConfigError> {
    let mut stack = Vec::new();
    expand(sections, section, "<text>", text, &mut stack)
}

fn resolve_inner(
    sections: &SectionMap,
    section: &str,
    option: &str,
    stack: &mut Vec<Key>,
) -> Result<String, ConfigError> {
    let key = (section.to_string(), option.to_string());
    if stack.contains(&key) {
        return Err(ConfigError::CircularReference {
            chain: format_chain(stack, &key),
        });
    }

    let raw = match sections.get(section) {
        Some(options) => options.get(option),
        None if stack.is_empty() => return Err(ConfigError::MissingSection(section.to_string())),
        None => None,
    };
    let Some(raw) = raw else {
        if stack.is_empty() {
            return Err(ConfigError::MissingOption {
                section: section.to_string(),
                option: option.to_string(),
            });
        }
        return Err(ConfigError::UnresolvedReference {
            chain: format_chain(stack, &key),
        });
    };

    stack.push(key);
    let expanded = expand(sections, section, option, raw, stack)?;
    stack.pop();
    Ok(expanded)
}

fn expand(
    sections: &SectionMap,
    section: &str,
    option: &str,
    raw: &str,
    stack: &mut Vec<Key>,
) -> Result<String, ConfigError> {
    if !raw.contains('$') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        if let Some(after) = tail.strip_prefix('$') {
            out.push('$');
            rest = after;
        } else if let Some(body) = tail.strip_prefix('{') {
            let Some(end) = body.find('}') else {
                return Err(ConfigError::BadInterpolation {
                    section: section.to_string(),
                    option: option.to_string(),
                    message: format!("unterminated reference in {raw:?}"),
                });
            };
            let reference = body[..end].trim();
            let (target_section, target_option) = match reference.split_once(':') {
                Some((sec, opt)) => (sec.trim(), opt.trim()),
                None => (section, reference),
            };
            if target_section.is_empty() || target_option.is_empty() {
                return Err(ConfigError::BadInterpolation {
                    section: section.to_string(),
                    option: option.to_string(),
                    message: format!("empty reference ${{{reference}}}"),
                });
            }
            let value = resolve_inner(
                sections,
                target_section,
                &target_option.to_ascii_lowercase(),
                stack,
            )?;
            out.push_str(&value);
            rest = &body[end + 1..];
        } else {
            out.push('$');
            rest = tail;
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn format_chain(stack: &[Key], last: &Key) -> String {
    stack
        .iter()
        .chain(std::iter::once(last))
        .map(|(section, option)| format!("{section}:{option}"))
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::{interpolate_text, resolve_option};
    use crate::{ConfigError, SectionMap};
    use pretty_assertions::assert_eq;

    fn sections(entries: &[(&str, &str, &str)]) -> SectionMap {
        let mut map = SectionMap::new();
        for (section, option, value) in entries {
            map.entry(section.to_string())
                .or_default()
                .insert(option.to_string(), value.to_string());
        }
        map
    }

    #[test]
    fn follows_references_to_terminal_value() {
        let map = sections(&[
            ("a", "b", "${c:d}"),
            ("c", "d", "${e:f}"),
            ("e", "f", "z-level"),
        ]);
        assert_eq!(resolve_option(&map, "a", "b").expect("resolve"), "z-level");
    }

    #[test]
    fn same_section_reference_and_escape() {
        let map = sections(&[
            ("paths", "root", "/scratch"),
            ("paths", "mesh", "${root}/mesh"),
            ("paths", "price", "$$5"),
        ]);
        assert_eq!(
            resolve_option(&map, "paths", "mesh").expect("mesh"),
            "/scratch/mesh"
        );
        assert_eq!(resolve_option(&map, "paths", "price").expect("price"), "$5");
    }

    #[test]
    fn self_reference_is_circular() {
        let map = sections(&[("a", "b", "x${a:b}")]);
        let err = resolve_option(&map, "a", "b").unwrap_err();
        match err {
            ConfigError::CircularReference { chain } => assert_eq!(chain, "a:b -> a:b"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mutual_reference_is_circular() {
        let map = sections(&[("a", "b", "${c:d}"), ("c", "d", "${a:b}")]);
        let err = resolve_option(&map, "a", "b").unwrap_err();
        match err {
            ConfigError::CircularReference { chain } => {
                assert_eq!(chain, "a:b -> c:d -> a:b")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_target_is_unresolved_with_chain() {
        let map = sections(&[("a", "b", "${c:d}"), ("c", "d", "${nowhere:x}")]);
        let err = resolve_option(&map, "a", "b").unwrap_err();
        match err {
            ConfigError::UnresolvedReference { chain } => {
                assert_eq!(chain, "a:b -> c:d -> nowhere:x")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn repeated_non_cyclic_reference_is_fine() {
        let map = sections(&[("a", "x", "1"), ("a", "y", "${x}-${x}")]);
        assert_eq!(resolve_option(&map, "a", "y").expect("resolve"), "1-1");
    }

    #[test]
    fn unterminated_reference_is_rejected() {
        let map = sections(&[("a", "b", "${c:d")]);
        let err = resolve_option(&map, "a", "b").unwrap_err();
        assert!(matches!(err, ConfigError::BadInterpolation { .. }));
    }

    #[test]
    fn interpolates_free_text() {
        let map = sections(&[("ocean", "model", "omega")]);
        let text = interpolate_text(&map, "ocean", "run ${model} then ${ocean:model}")
            .expect("text");
        assert_eq!(text, "run omega then omega");
    }
}
