use std::collections::HashMap;

pub type TemplateVars = HashMap<String, String>;

/// Build a variable map from literal pairs.
pub fn vars(pairs: &[(&str, String)]) -> TemplateVars {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// Substitute `{{key}}` placeholders in a single left-to-right pass.
///
/// Keys present in `variables` are replaced everywhere they occur, empty
/// values included. Keys absent from `variables` stay as literal `{{key}}`
/// text, and substituted values are never re-scanned, so there is no
/// recursive expansion. An unterminated `{{` is copied through verbatim.
pub fn render(template: &str, variables: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];

        match after_open.find("}}") {
            Some(close) => {
                let key = &after_open[..close];
                match variables.get(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after_open[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}
