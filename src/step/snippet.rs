// Copyright (c) 2024-2026  cornichon contributors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Registration snippet suggestions for undefined steps.

use itertools::Itertools as _;
use lazy_regex::regex;

/// Builds a ready-to-paste registration snippet for an undefined step
/// text: quoted substrings become string captures, integers become
/// numeric captures, everything else is escaped verbatim.
#[must_use]
pub fn suggest(text: &str) -> String {
    let (pattern, params) = derive_pattern(text);
    let args = params
        .iter()
        .enumerate()
        .map(|(i, ty)| format!("arg{}: {ty}", i + 1))
        .join(", ");
    format!(
        "suite.step(r#\"^{pattern}$\"#, |{args}| {{\n    \
             Err(cornichon::Failure::pending())\n\
         }});",
    )
}

fn derive_pattern(text: &str) -> (String, Vec<&'static str>) {
    let mut pattern = String::with_capacity(text.len());
    let mut params = Vec::new();
    let mut last = 0;
    for m in regex!(r#""[^"]*"|\d+"#).find_iter(text) {
        pattern.push_str(&regex::escape(&text[last..m.start()]));
        if m.as_str().starts_with('"') {
            pattern.push_str(r#""([^"]*)""#);
            params.push("String");
        } else {
            pattern.push_str(r"(\d+)");
            params.push("i64");
        }
        last = m.end();
    }
    pattern.push_str(&regex::escape(&text[last..]));
    (pattern, params)
}

#[cfg(test)]
mod spec {
    use super::*;

    #[test]
    fn numbers_become_numeric_captures() {
        let snippet = suggest("I eat 5 cukes");

        assert!(snippet.contains(r##"r#"^I eat (\d+) cukes$"#"##));
        assert!(snippet.contains("arg1: i64"));
    }

    #[test]
    fn quoted_strings_become_string_captures() {
        let snippet = suggest(r#"I see "kiwi" in the basket"#);

        assert!(snippet.contains(r#""([^"]*)""#));
        assert!(snippet.contains("arg1: String"));
    }

    #[test]
    fn mixed_captures_keep_text_order() {
        let snippet = suggest(r#"I put 3 of "kiwi" into 1 basket"#);

        assert!(snippet.contains("arg1: i64"));
        assert!(snippet.contains("arg2: String"));
        assert!(snippet.contains("arg3: i64"));
    }

    #[test]
    fn plain_text_is_escaped_verbatim() {
        let snippet = suggest("weird (text) with [brackets]");

        assert!(snippet.contains(r"\(text\)"));
        assert!(snippet.contains("|| {"));
    }
}
