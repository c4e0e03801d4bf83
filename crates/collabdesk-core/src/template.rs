//! Flat `{variable}` substitution used to personalize campaign emails

use std::collections::HashMap;

/// Characters allowed inside a `{name}` placeholder: anything but a brace
fn is_variable_char(c: char) -> bool {
    c != '{' && c != '}'
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Variable(&'a str),
}

/// Splits a template into literal text and placeholders in one left to
/// right pass. Braces that do not wrap a valid name stay literal text.
struct Segments<'a> {
    rest: &'a str,
}

fn segments(template: &str) -> Segments<'_> {
    Segments { rest: template }
}

/// If `s` starts with `name}`, return `name`
fn leading_variable(s: &str) -> Option<&str> {
    let end = s.find(|c: char| !is_variable_char(c))?;
    (end > 0 && s[end..].starts_with('}')).then(|| &s[..end])
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        if let Some(name) = self.rest.strip_prefix('{').and_then(leading_variable) {
            self.rest = &self.rest[name.len() + 2..];
            return Some(Segment::Variable(name));
        }

        let skip = usize::from(self.rest.starts_with('{'));
        let end = self.rest[skip..]
            .find('{')
            .map(|i| i + skip)
            .unwrap_or(self.rest.len());
        let (text, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(Segment::Text(text))
    }
}

/// Replace every `{name}` whose name is in `variables` with its value.
///
/// Unknown placeholders are left exactly as written. Substituted values are
/// never scanned again, so a value containing `{x}` is emitted verbatim.
pub fn substitute(template: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());

    for segment in segments(template) {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Variable(name) => match variables.get(name) {
                Some(value) => out.push_str(value),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            },
        }
    }

    out
}

/// Unique variable names referenced by the given templates, in first-seen order
pub fn extract_variables<'a>(templates: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();

    for template in templates {
        for segment in segments(template) {
            if let Segment::Variable(name) = segment {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_known_variables() {
        let out = substitute(
            "Hi {influencerName}, {companyName} loves your work",
            &vars(&[("influencerName", "Jane"), ("companyName", "Acme")]),
        );
        assert_eq!(out, "Hi Jane, Acme loves your work");
    }

    #[test]
    fn test_substitute_leaves_unknown_placeholders() {
        let out = substitute("Hi {influencerName}, code {discountCode}", &vars(&[("influencerName", "Jane")]));
        assert_eq!(out, "Hi Jane, code {discountCode}");
    }

    #[test]
    fn test_substitute_replaces_every_occurrence() {
        let out = substitute("{name} {name} {name}", &vars(&[("name", "x")]));
        assert_eq!(out, "x x x");
    }

    #[test]
    fn test_substitute_is_case_sensitive() {
        let out = substitute("{Name} {name}", &vars(&[("name", "jane")]));
        assert_eq!(out, "{Name} jane");
    }

    #[test]
    fn test_substitute_is_idempotent_once_complete() {
        let m = vars(&[("a", "1"), ("b", "2")]);
        let once = substitute("{a}-{b}-{a}", &m);
        assert_eq!(substitute(&once, &m), once);
    }

    #[test]
    fn test_substitute_does_not_rescan_values() {
        let out = substitute("{a}", &vars(&[("a", "{b}"), ("b", "nope")]));
        assert_eq!(out, "{b}");
    }

    #[test]
    fn test_substitute_stray_braces_stay_literal() {
        let m = vars(&[("a", "1")]);
        assert_eq!(substitute("{{a}}", &m), "{1}");
        assert_eq!(substitute("{ a } {} {a", &m), "{ a } {} {a");
        assert_eq!(substitute("p { color: red }", &m), "p { color: red }");
        assert_eq!(substitute("héllo {a} wörld", &m), "héllo 1 wörld");
    }

    #[test]
    fn test_substitute_names_with_spaces_and_punctuation() {
        let m = vars(&[("first name", "Jane"), ("promo-code!", "SPRING20")]);
        assert_eq!(substitute("Hi {first name}", &m), "Hi Jane");
        assert_eq!(substitute("Use {promo-code!} at {shop url}", &m), "Use SPRING20 at {shop url}");
    }

    #[test]
    fn test_substitute_personalization_scenario() {
        let m = vars(&[("companyName", "Acme"), ("influencerName", "Jane")]);
        assert_eq!(substitute("Hi {influencerName}", &m), "Hi Jane");
        assert_eq!(substitute("From {companyName}", &m), "From Acme");
    }

    #[test]
    fn test_extract_variables_unique_first_seen() {
        assert_eq!(extract_variables(["{a} text {b} {a}"]), vec!["a", "b"]);
    }

    #[test]
    fn test_extract_variables_across_subject_and_content() {
        let names = extract_variables(["Hi {influencerName}", "From {companyName} to {influencerName}"]);
        assert_eq!(names, vec!["influencerName", "companyName"]);
    }

    #[test]
    fn test_extract_variables_with_spaces() {
        assert_eq!(
            extract_variables(["Dear {first name}, {Brand Name} x {first name}"]),
            vec!["first name", "Brand Name"]
        );
    }

    #[test]
    fn test_extract_variables_none() {
        assert!(extract_variables(["no placeholders {} here"]).is_empty());
    }
}
