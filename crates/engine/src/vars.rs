// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `$(name)` variable substitution for task inputs.

use std::collections::HashMap;

/// Replace every `$(name)` with the matching variable, case-insensitively.
/// Unknown names are left in place; replacement text is not rescanned.
pub fn substitute(input: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("$(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find(')') {
            Some(end) => {
                let name = &after[..end];
                match lookup_ci(variables, name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("$(");
                        out.push_str(name);
                        out.push(')');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // unterminated placeholder, keep literally
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Substitute every value of an input map in place.
pub fn substitute_inputs(
    inputs: &HashMap<String, String>,
    variables: &HashMap<String, String>,
) -> HashMap<String, String> {
    inputs
        .iter()
        .map(|(k, v)| (k.clone(), substitute(v, variables)))
        .collect()
}

fn lookup_ci<'a>(variables: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    variables
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
#[path = "vars_tests.rs"]
mod tests;
