//! Placeholder substitution for test variables.
//!
//! Instructions and model-produced actions refer to variables by placeholder
//! (`{{PASSWORD}}` or `${PASSWORD}`). The model only ever sees the
//! placeholder; real values are spliced in after it has answered.
//!
//! Names must match `[A-Za-z_][A-Za-z0-9_]*`. A map entry with any other
//! name is skipped with a warning and its placeholders stay as written.
//! Placeholder lookup is case-insensitive, with an exact-case match winning.
//! Values are inserted literally: `$1`, `\`, and friends carry no meaning.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex_lite::{Captures, Regex};
use stepwright_core::outcome::Action;
use tracing::warn;

/// Variable name → value.
pub type Variables = HashMap<String, String>;

static VALID_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("name pattern compiles"));

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}|\$\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}")
        .expect("placeholder pattern compiles")
});

/// Whether `name` may be used as a variable name.
pub fn is_valid_variable_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

/// Replace every `{{NAME}}` / `${NAME}` whose name is in `vars`.
///
/// Placeholders for unknown names are left untouched, as is the text of
/// any name that fails validation. Substituted values are not rescanned.
pub fn substitute_variables(text: &str, vars: &Variables) -> String {
    let mut folded: HashMap<String, &str> = HashMap::new();
    for (name, value) in vars {
        if !is_valid_variable_name(name) {
            warn!(variable = %name, "Skipping variable with invalid name");
            continue;
        }
        folded.insert(name.to_ascii_lowercase(), value.as_str());
    }
    if folded.is_empty() {
        return text.to_string();
    }

    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let value = vars
                .get(name)
                .filter(|_| is_valid_variable_name(name))
                .map(String::as_str)
                .or_else(|| folded.get(&name.to_ascii_lowercase()).copied());
            match value {
                Some(v) => v.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Distinct placeholder names in `text`, in order of first appearance.
pub fn placeholder_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(text) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            let name = m.as_str().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Resolve placeholders in an action's arguments.
pub fn resolve_action(action: &Action, vars: &Variables) -> Action {
    if vars.is_empty() {
        return action.clone();
    }
    action.map_args(|arg| substitute_variables(arg, vars))
}

/// Replace any literal variable value in `text` with its `{{NAME}}`
/// placeholder. Longer values are replaced first so a value that contains
/// another is not split.
pub fn redact_values(text: &str, vars: &Variables) -> String {
    let mut pairs: Vec<(&String, &String)> = vars
        .iter()
        .filter(|(name, value)| !value.is_empty() && is_valid_variable_name(name))
        .collect();
    pairs.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    let mut out = text.to_string();
    for (name, value) in pairs {
        if out.contains(value.as_str()) {
            out = out.replace(value.as_str(), &format!("{{{{{name}}}}}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn login_scenario_inserts_values_verbatim() {
        let v = vars(&[("USERNAME", "alice"), ("PASSWORD", "p@ss!")]);
        let out = substitute_variables("Log in with {{USERNAME}} and {{PASSWORD}}", &v);
        assert_eq!(out, "Log in with alice and p@ss!");
        assert!(!out.contains("{{"));
        assert!(!out.contains("${"));
    }

    #[test]
    fn dollar_brace_form_is_substituted() {
        let v = vars(&[("TOKEN", "abc")]);
        assert_eq!(substitute_variables("Bearer ${TOKEN}", &v), "Bearer abc");
        assert_eq!(substitute_variables("Bearer ${ TOKEN }", &v), "Bearer abc");
    }

    #[test]
    fn every_occurrence_is_replaced() {
        let v = vars(&[("X", "1")]);
        assert_eq!(substitute_variables("{{X}}+{{X}}=${X}${X}", &v), "1+1=11");
    }

    #[test]
    fn replacement_syntax_in_values_is_literal() {
        let v = vars(&[("PW", r"$1\0${2}$$")]);
        assert_eq!(substitute_variables("pw={{PW}}", &v), r"pw=$1\0${2}$$");
    }

    #[test]
    fn invalid_names_leave_text_untouched() {
        let v = vars(&[("BAD-NAME", "x"), ("1ST", "y"), ("has space", "z")]);
        let text = "a {{BAD-NAME}} b {{1ST}} c ${has space}";
        assert_eq!(substitute_variables(text, &v), text);
    }

    #[test]
    fn invalid_name_does_not_block_valid_ones() {
        let v = vars(&[("BAD-NAME", "x"), ("GOOD", "y")]);
        assert_eq!(
            substitute_variables("{{BAD-NAME}} {{GOOD}}", &v),
            "{{BAD-NAME}} y"
        );
    }

    #[test]
    fn unknown_placeholders_survive() {
        let v = vars(&[("KNOWN", "k")]);
        assert_eq!(
            substitute_variables("{{KNOWN}} {{UNKNOWN}}", &v),
            "k {{UNKNOWN}}"
        );
    }

    #[test]
    fn lookup_is_case_insensitive_with_exact_match_preferred() {
        let v = vars(&[("email", "a@example.com")]);
        assert_eq!(substitute_variables("{{EMAIL}}", &v), "a@example.com");

        let both = vars(&[("user", "lower"), ("USER", "upper")]);
        assert_eq!(substitute_variables("{{USER}}", &both), "upper");
        assert_eq!(substitute_variables("{{user}}", &both), "lower");
    }

    #[test]
    fn substitution_is_idempotent() {
        let v = vars(&[("A", "alpha"), ("B", "beta & $1"), ("C_3", "")]);
        let text = "{{A}} ${B} {{C_3}} {{D}} plain";
        let once = substitute_variables(text, &v);
        let twice = substitute_variables(&once, &v);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_map_is_identity() {
        let text = "nothing {{HERE}}";
        assert_eq!(substitute_variables(text, &Variables::new()), text);
    }

    #[test]
    fn placeholder_names_in_order() {
        let names = placeholder_names("{{B}} ${A} {{B}} {{bad-name}}");
        assert_eq!(names, vec!["B".to_string(), "A".to_string()]);
    }

    #[test]
    fn resolve_action_only_touches_args() {
        let action = Action {
            method: "fill".into(),
            target_element_ref: "{{NOT_AN_ARG}}".into(),
            args: vec!["{{PASSWORD}}".into()],
            completed: true,
            step_description: "Type the password".into(),
            rationale: None,
            target_path: None,
        };
        let resolved = resolve_action(&action, &vars(&[("PASSWORD", "hunter2")]));
        assert_eq!(resolved.args, vec!["hunter2".to_string()]);
        assert_eq!(resolved.target_element_ref, "{{NOT_AN_ARG}}");
    }

    #[test]
    fn redaction_restores_placeholders() {
        let v = vars(&[("PASSWORD", "p@ss!"), ("PASS", "p@ss")]);
        let out = redact_values("typed p@ss! into field", &v);
        assert_eq!(out, "typed {{PASSWORD}} into field");
        assert!(!out.contains("p@ss"));
    }

    #[test]
    fn redaction_ignores_empty_values() {
        let v = vars(&[("EMPTY", "")]);
        assert_eq!(redact_values("abc", &v), "abc");
    }
}
