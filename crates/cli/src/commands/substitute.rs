//! `stepwright substitute` — resolve placeholders in a piece of text.

use stepwright_security::{Variables, placeholder_names, substitute_variables};

pub fn run(text: &str, variables: &Variables) -> Result<(), Box<dyn std::error::Error>> {
    let unknown: Vec<String> = placeholder_names(text)
        .into_iter()
        .filter(|name| !variables.keys().any(|k| k.eq_ignore_ascii_case(name)))
        .collect();
    if !unknown.is_empty() {
        eprintln!("warning: no value given for {}", unknown.join(", "));
    }

    println!("{}", substitute_variables(text, variables));
    Ok(())
}
