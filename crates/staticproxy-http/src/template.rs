//! Named-parameter substitution.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Values captured from a matched request path, by parameter name.
pub type PathVariables = HashMap<String, String>;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]+\}").expect("placeholder pattern is valid"));

/// Replace every `{name}` token in `template` with its binding.
///
/// Unbound names become the empty string. A token written as
/// `{name:pattern}` binds by `name`. Text outside tokens is copied as is.
///
/// ```
/// use staticproxy_http::template::{PathVariables, substitute};
///
/// let mut vars = PathVariables::new();
/// vars.insert("user".to_owned(), "ada".to_owned());
/// assert_eq!(substitute("/users/{user}/{missing}", &vars), "/users/ada/");
/// ```
#[must_use]
pub fn substitute(template: &str, bindings: &PathVariables) -> String {
    if !template.contains('{') {
        return template.to_owned();
    }
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let token = &caps[0];
            let inner = &token[1..token.len() - 1];
            let name = inner.split_once(':').map_or(inner, |(name, _)| name);
            bindings.get(name).cloned().unwrap_or_default()
        })
        .into_owned()
}
