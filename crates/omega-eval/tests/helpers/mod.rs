#![allow(dead_code)]

use std::fs;

use omega_eval::{Engine, Value, evaluate};
use omega_parser::{Rule, RuleSet, parse_rule_directory, parse_rule_yaml};
use tempfile::TempDir;

pub fn rule(yaml: &str) -> Rule {
    parse_rule_yaml(yaml).unwrap()
}

/// Evaluate a single rule against a JSON document.
pub fn matches(rule: &Rule, doc: serde_json::Value) -> bool {
    evaluate(&Value::from(doc), rule).unwrap().matches
}

/// Write `(file name, yaml)` pairs to a fresh directory and load it.
pub fn load_dir(files: &[(&str, &str)]) -> (TempDir, RuleSet) {
    let dir = TempDir::new().unwrap();
    for (name, yaml) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, yaml).unwrap();
    }
    let set = parse_rule_directory(dir.path()).unwrap();
    (dir, set)
}

pub fn engine_from_set(set: &RuleSet) -> Engine {
    let mut engine = Engine::new();
    let failures = engine.add_rule_set(set);
    assert!(failures.is_empty(), "compile failures: {failures:?}");
    engine
}

pub const OR_ANYWHERE: &str = r#"
title: Anywhere strings
detection:
    phrases:
        - foo
        - bar
    condition: phrases
"#;

pub const OR_ANYWHERE_NUMBER: &str = r#"
title: Anywhere numbers
detection:
    phrases:
        - 1
        - 2
    condition: phrases
"#;

pub const STRING_LIST: &str = r#"
title: String list
detection:
    words: [foo, bar]
    condition: words
"#;

pub const MAP_LIST: &str = r#"
title: Map list
detection:
    alternatives:
        - a: bar
          b: foo
        - a|startswith: foo
          b: baz
        - c|contains: foo
    condition: alternatives
"#;

pub const MAPS: &str = r#"
title: Maps
detection:
    all_three:
        a|startswith: foo
        c|endswith: foo
        b:
            - baz
            - f?b
    d_only:
        d|re: '(do|od)[dt]o'
    condition: all_three or d_only
"#;

pub const CONDITIONS: &str = r#"
title: Conditions
detection:
    a:
        a: 1
    b:
        b: 1
    c:
        c: 1
    d:
        d: 1
    e:
        e: 1
    condition: a and c or a and d and not e and not b
"#;

pub const BOOLEAN: &str = r#"
title: Boolean
detection:
    flag:
        a: true
    condition: flag
"#;

pub const NESTED_KEY: &str = r#"
title: Nested key
detection:
    deep:
        a.b.c.d.e: foobar
    condition: deep
"#;

pub fn fixture_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("or_anywhere.yml", OR_ANYWHERE),
        ("or_anywhere_number.yml", OR_ANYWHERE_NUMBER),
        ("string_list.yaml", STRING_LIST),
        ("lists/map_list.yml", MAP_LIST),
        ("lists/maps.yml", MAPS),
        ("conditions.yml", CONDITIONS),
        ("boolean.yml", BOOLEAN),
        ("nested/deeper/nested_key.yml", NESTED_KEY),
    ]
}
