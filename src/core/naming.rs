//! Naming helpers used to derive default resource names
//!
//! `Person` becomes `people`, `BlogPost` becomes `blog_posts`.

/// Irregular English plurals that the suffix rules get wrong
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("datum", "data"),
    ("index", "indices"),
    ("series", "series"),
    ("species", "species"),
];

/// Convert `CamelCase` or `kebab-case` to `snake_case`
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '-' || c == ' ' {
            out.push('_');
            prev_lower = false;
        } else if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// Pluralize the last `_`-separated word of a snake_case name
pub fn pluralize(singular: &str) -> String {
    let (head, word) = match singular.rfind('_') {
        Some(idx) => singular.split_at(idx + 1),
        None => ("", singular),
    };
    format!("{}{}", head, pluralize_word(word))
}

fn pluralize_word(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(s, _)| *s == word) {
        return plural.to_string();
    }

    let ends_with_vowel_y = ["ay", "ey", "iy", "oy", "uy"].iter().any(|s| word.ends_with(s));
    if word.ends_with('y') && !ends_with_vowel_y && word.len() > 1 {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    if ["s", "sh", "ch", "x", "z"].iter().any(|s| word.ends_with(s)) {
        return format!("{}es", word);
    }
    if word.ends_with("fe") && word.len() > 2 {
        return format!("{}ves", &word[..word.len() - 2]);
    }
    if word.ends_with('f') && !word.ends_with("ff") && word.len() > 1 {
        return format!("{}ves", &word[..word.len() - 1]);
    }
    format!("{}s", word)
}

/// Default path segment for a resource type name
pub fn default_resource_name(type_name: &str) -> String {
    pluralize(&snake_case(type_name))
}
