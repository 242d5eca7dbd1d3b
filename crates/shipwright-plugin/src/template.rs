//! `${path}` template rendering against a JSON context.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;
use shipwright_config::merge::lookup;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_.\-]+)\}").expect("invalid regex"));

/// Replaces each `${path}` with the value at that dotted path.
///
/// Strings are inserted verbatim, other scalars in their JSON form.
/// Placeholders whose path is missing or `null` are left untouched.
#[must_use]
pub fn render(template: &str, context: &Value) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            match lookup(context, &caps[1]) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => caps[0].to_string(),
                Some(other) => other.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_simple() {
        let ctx = json!({"version": "1.1.0"});
        assert_eq!(render("Release ${version}", &ctx), "Release 1.1.0");
    }

    #[test]
    fn test_render_nested_and_scalars() {
        let ctx = json!({"repo": {"owner": "acme"}, "isPreRelease": false, "count": 3});
        insta::assert_snapshot!(
            render("${repo.owner}/${isPreRelease}/${count}", &ctx),
            @"acme/false/3"
        );
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let ctx = json!({"version": "1.1.0", "changelog": null});
        assert_eq!(
            render("${version} ${unknown} ${changelog}", &ctx),
            "1.1.0 ${unknown} ${changelog}"
        );
    }

    #[test]
    fn test_render_without_placeholders() {
        assert_eq!(render("npm test", &json!({})), "npm test");
    }
}
