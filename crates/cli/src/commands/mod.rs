pub mod cache;
pub mod doctor;
pub mod onboard;
pub mod run;
pub mod substitute;

/// Parse a `NAME=VALUE` argument. The value may itself contain `=`.
pub fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}
