//! TypeScript type-text combinators and escaping helpers.

use std::cmp::Ordering;

use serde_json::{Map, Value};

// =============================================================================
// Escaping
// =============================================================================

/// True when `name` cannot be written as a bare TypeScript property key.
pub fn needs_quoting(name: &str) -> bool {
    let mut chars = name.chars();
    !chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// String literal for `value`. Strings lose their line breaks and are quoted;
/// anything else renders as its JSON text.
pub fn esc_str(value: &Value) -> String {
    match value {
        Value::String(text) => quote(text),
        other => other.to_string(),
    }
}

/// Quote a string as a TypeScript string literal.
pub fn quote(text: &str) -> String {
    let flat: String = text.chars().filter(|c| !matches!(c, '\n' | '\r')).collect();
    format!("\"{}\"", flat.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Property key, quoted only when it is not a valid identifier.
pub fn esc_obj_key(name: &str) -> String {
    if needs_quoting(name) {
        quote(name)
    } else {
        name.to_string()
    }
}

/// Text rendering of a scalar that passes through the transformer unchanged.
pub fn raw_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// Combinators
// =============================================================================

/// `A | B`, deduplicated. `unknown` absorbs the union and `never` only
/// survives on its own.
pub fn ts_union_of<I, S>(types: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut members: Vec<String> = Vec::new();
    for member in types {
        let member = member.into();
        if member == "unknown" {
            return member;
        }
        if !members.contains(&member) {
            members.push(member);
        }
    }
    if members.is_empty() || (members.len() == 1 && members[0] == "never") {
        return "never".to_string();
    }
    members.retain(|member| member != "never");
    members.join(" | ")
}

/// `A & B`. Empty and `unknown` members are dropped; unions are parenthesized.
pub fn ts_intersection_of<I, S>(types: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let members: Vec<String> = types
        .into_iter()
        .map(Into::into)
        .filter(|member| !member.is_empty() && member != "unknown")
        .collect();
    match members.len() {
        0 => "unknown".to_string(),
        1 => members.into_iter().collect(),
        _ => members
            .iter()
            .map(|member| {
                if member.contains('|') {
                    format!("({member})")
                } else {
                    member.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" & "),
    }
}

/// Exclusive union of object shapes.
pub fn ts_one_of(types: Vec<String>) -> String {
    if types.len() == 1 {
        return types.into_iter().collect();
    }
    format!("OneOf<[{}]>", types.join(", "))
}

/// `[A, B, C]`
pub fn ts_tuple_of<I, S>(types: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let members: Vec<String> = types
        .into_iter()
        .map(|member| member.as_ref().to_string())
        .collect();
    format!("[{}]", members.join(", "))
}

/// `(T)[]`
pub fn ts_array_of(item: &str) -> String {
    format!("({item})[]")
}

/// `readonly T`
pub fn ts_readonly(type_text: &str) -> String {
    format!("readonly {type_text}")
}

/// `key?`
pub fn ts_optional_property(key: &str) -> String {
    format!("{key}?")
}

/// `Omit<T, "a" | "b">`
pub fn ts_omit(type_text: &str, keys: &[&str]) -> String {
    format!("Omit<{type_text}, {}>", key_union(keys.iter().copied()))
}

/// `WithRequired<T, "a" | "b">`
pub fn ts_with_required(type_text: &str, keys: &[Value]) -> String {
    let names = keys.iter().map(esc_str).collect::<Vec<_>>().join(" | ");
    format!("WithRequired<{type_text}, {names}>")
}

fn key_union<'a>(keys: impl Iterator<Item = &'a str>) -> String {
    keys.map(quote).collect::<Vec<_>>().join(" | ")
}

// =============================================================================
// Layout
// =============================================================================

/// Prefix `text` with two spaces per level.
pub fn indent(text: &str, level: usize) -> String {
    format!("{}{text}", "  ".repeat(level))
}

/// A `/** ... */` block. Single-line text stays on one line.
pub fn comment(text: &str, level: usize) -> String {
    let body = text.trim().replace("*/", "*\\/");
    if !body.contains('\n') {
        return format!("/** {body} */");
    }
    let star = indent(" *", level);
    let lines: Vec<String> = body
        .lines()
        .map(|line| {
            let line = line.trim_end();
            if line.is_empty() {
                star.clone()
            } else {
                format!("{star} {line}")
            }
        })
        .collect();
    format!("/**\n{}\n{}", lines.join("\n"), indent(" */", level))
}

/// Documentation comment for a property schema, if it has anything to say.
pub fn schema_comment(schema: &Value, level: usize) -> Option<String> {
    let fields = schema.as_object()?;
    let mut output = Vec::new();

    for key in ["title", "summary"] {
        if let Some(text) = fields.get(key).filter(|value| truthy(value)) {
            output.push(raw_text(text));
        }
    }
    if let Some(format) = fields.get("format").filter(|value| truthy(value)) {
        output.push(format!("Format: {}", raw_text(format)));
    }
    if fields.get("deprecated").is_some_and(truthy) {
        output.push("@deprecated".to_string());
    }
    for tag in ["description", "default", "example"] {
        let Some(value) = fields.get(tag) else {
            continue;
        };
        if tag == "description" && value.as_str() == Some("") {
            continue;
        }
        let text = match value {
            Value::Object(_) | Value::Array(_) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            other => raw_text(other),
        };
        output.push(format!("@{tag} {text}"));
    }
    if fields.contains_key("const") {
        output.push("@constant".to_string());
    }
    if fields.contains_key("enum") {
        let ty = match fields.get("type") {
            Some(Value::Array(types)) => types.iter().map(raw_text).collect::<Vec<_>>().join("|"),
            Some(Value::String(ty)) => ty.clone(),
            _ => "unknown".to_string(),
        };
        let nullable = if fields.get("nullable").is_some_and(truthy) {
            "|null"
        } else {
            ""
        };
        output.push(format!("@enum {{{ty}{nullable}}}"));
    }

    (!output.is_empty()).then(|| comment(&output.join("\n"), level))
}

// =============================================================================
// Values
// =============================================================================

/// Loose truthiness: `null`, `false`, `0` and `""` are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Property entries in declaration order, or natural order when
/// `alphabetize` is set, without deprecated ones when `exclude_deprecated` is.
pub fn entries(
    properties: &Map<String, Value>,
    alphabetize: bool,
    exclude_deprecated: bool,
) -> Vec<(&String, &Value)> {
    let mut entries: Vec<(&String, &Value)> = properties.iter().collect();
    if alphabetize {
        entries.sort_by(|(a, _), (b, _)| natural_cmp(a, b));
    }
    if exclude_deprecated {
        entries.retain(|(_, schema)| {
            !schema
                .as_object()
                .and_then(|fields| fields.get("deprecated"))
                .is_some_and(truthy)
        });
    }
    entries
}

/// Case-insensitive ordering that compares digit runs numerically.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_run = take_digits(&mut left);
                let r_run = take_digits(&mut right);
                let l_trim = l_run.trim_start_matches('0');
                let r_trim = r_run.trim_start_matches('0');
                let ordering = l_trim
                    .len()
                    .cmp(&r_trim.len())
                    .then_with(|| l_trim.cmp(r_trim));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}
