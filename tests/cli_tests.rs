#[test]
fn test_cli_examples() {
    trycmd::TestCases::new().case("README.md");
}

#[test]
fn test_cli_generate() {
    trycmd::TestCases::new().case("tests/generate.trycmd");
}

#[test]
fn test_cli_check() {
    trycmd::TestCases::new().case("tests/check.trycmd");
}

#[test]
fn test_cli_rule_file() {
    trycmd::TestCases::new()
        .case("tests/rule-file.trycmd")
        .case("tests/rule-stdin.toml");
}

#[test]
fn test_cli_plan() {
    trycmd::TestCases::new().case("tests/plan.trycmd");
}

#[test]
fn test_cli_apply() {
    trycmd::TestCases::new()
        .case("tests/apply-copy.toml")
        .case("tests/apply-move.toml");
}

#[test]
fn test_cli_edit() {
    trycmd::TestCases::new().case("tests/edit.trycmd");
}

#[test]
fn test_cli_rotation() {
    trycmd::TestCases::new().case("tests/rotation.trycmd");
}
