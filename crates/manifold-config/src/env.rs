/// Expand `{{ env.VAR }}` placeholders in a raw TOML string
///
/// Supports an optional fallback via `{{ env.VAR | default("fallback") }}`.
/// A placeholder without a default whose variable is unset is an error.
/// Lines starting with `#` (TOML comments) pass through unchanged.
pub fn expand_env(input: &str) -> Result<String, String> {
    let mut output = String::with_capacity(input.len());

    for (i, line) in input.lines().enumerate() {
        if i > 0 {
            output.push('\n');
        }

        if line.trim_start().starts_with('#') {
            output.push_str(line);
        } else {
            output.push_str(&expand_line(line)?);
        }
    }

    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

fn expand_line(line: &str) -> Result<String, String> {
    let mut result = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start..].find("}}") else {
            break;
        };

        result.push_str(&rest[..start]);
        result.push_str(&resolve(rest[start + 2..start + len].trim())?);
        rest = &rest[start + len + 2..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Resolve a single `env.VAR` placeholder, honoring `| default("...")`
fn resolve(placeholder: &str) -> Result<String, String> {
    let (key, default) = match placeholder.split_once('|') {
        Some((key, modifier)) => (key.trim(), Some(parse_default(modifier.trim())?)),
        None => (placeholder, None),
    };

    let Some(var_name) = key.strip_prefix("env.") else {
        return Err(format!("only variables scoped with 'env.' are supported: `{key}`"));
    };

    match std::env::var(var_name) {
        Ok(value) => Ok(value),
        Err(_) => default.ok_or_else(|| format!("environment variable not found: `{var_name}`")),
    }
}

fn parse_default(modifier: &str) -> Result<String, String> {
    modifier
        .strip_prefix("default(\"")
        .and_then(|s| s.strip_suffix("\")"))
        .map(ToOwned::to_owned)
        .ok_or_else(|| format!("unsupported placeholder modifier: `{modifier}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_placeholders() {
        let input = "key = \"value\"";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn single_env_var() {
        temp_env::with_var("MANIFOLD_TEST_VAR", Some("hello"), || {
            let result = expand_env("key = \"{{ env.MANIFOLD_TEST_VAR }}\"").unwrap();
            assert_eq!(result, "key = \"hello\"");
        });
    }

    #[test]
    fn multiple_vars_on_one_line() {
        let vars = [("MANIFOLD_FOO", Some("foo")), ("MANIFOLD_BAR", Some("bar"))];
        temp_env::with_vars(vars, || {
            let result = expand_env("key = \"{{ env.MANIFOLD_FOO }}:{{ env.MANIFOLD_BAR }}\"").unwrap();
            assert_eq!(result, "key = \"foo:bar\"");
        });
    }

    #[test]
    fn missing_var_errors() {
        temp_env::with_var_unset("MANIFOLD_MISSING", || {
            let err = expand_env("key = \"{{ env.MANIFOLD_MISSING }}\"").unwrap_err();
            assert!(err.contains("MANIFOLD_MISSING"));
        });
    }

    #[test]
    fn default_used_when_var_missing() {
        temp_env::with_var_unset("MANIFOLD_OPTIONAL", || {
            let result = expand_env("key = \"{{ env.MANIFOLD_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "key = \"fallback\"");
        });
    }

    #[test]
    fn default_ignored_when_var_present() {
        temp_env::with_var("MANIFOLD_OPTIONAL", Some("actual"), || {
            let result = expand_env("key = \"{{ env.MANIFOLD_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "key = \"actual\"");
        });
    }

    #[test]
    fn unsupported_scope_errors() {
        let err = expand_env("key = \"{{ secrets.FOO }}\"").unwrap_err();
        assert!(err.contains("only variables scoped with 'env.'"));
    }

    #[test]
    fn comment_lines_skip_expansion() {
        temp_env::with_var_unset("MANIFOLD_MISSING", || {
            let input = "# key = \"{{ env.MANIFOLD_MISSING }}\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
