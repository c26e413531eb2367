// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn vars() -> HashMap<String, String> {
    HashMap::from([
        ("Build.SourceDir".to_string(), "/work/src".to_string()),
        ("agent.name".to_string(), "drover-1".to_string()),
    ])
}

#[parameterized(
    exact = { "$(agent.name)", "drover-1" },
    case_insensitive = { "$(BUILD.sourcedir)/ci.sh", "/work/src/ci.sh" },
    multiple = { "$(agent.name):$(agent.name)", "drover-1:drover-1" },
    unknown_kept = { "$(no.such)", "$(no.such)" },
    unterminated_kept = { "x $(agent.name", "x $(agent.name" },
    no_placeholder = { "plain text", "plain text" },
    empty = { "", "" },
    adjacent_text = { "a$(agent.name)b", "adrover-1b" },
)]
fn substitution(input: &str, expected: &str) {
    assert_eq!(substitute(input, &vars()), expected);
}

#[test]
fn replacement_is_not_rescanned() {
    let variables = HashMap::from([
        ("outer".to_string(), "$(inner)".to_string()),
        ("inner".to_string(), "nope".to_string()),
    ]);
    assert_eq!(substitute("$(outer)", &variables), "$(inner)");
}

#[test]
fn substitute_inputs_rewrites_values_only() {
    let inputs = HashMap::from([(
        "scriptPath".to_string(),
        "$(Build.SourceDir)/ci.sh".to_string(),
    )]);
    let out = substitute_inputs(&inputs, &vars());
    assert_eq!(out["scriptPath"], "/work/src/ci.sh");
}
