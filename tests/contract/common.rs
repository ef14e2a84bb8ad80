use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};

pub const EQEQ_RULES: &str = r#"rules:
  - id: eqeq
    pattern: $X == $X
    message: "$X == $X is a useless equality check"
    languages: [python]
    severity: ERROR
"#;

/// `sgrep-lint` with a clean environment
pub fn sgrep(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sgrep-lint").unwrap();
    cmd.current_dir(dir)
        .env_remove("SGREP_IN_DOCKER")
        .env_remove("GITHUB_WORKSPACE")
        .env_remove("RUST_LOG");
    cmd
}

/// Shell script standing in for the matcher: checks its arguments and prints `report`.
#[cfg(unix)]
pub fn fake_engine(dir: &Path, expect_in_rules: &str, report: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-sgrep-core");
    let script = format!(
        "#!/bin/sh\n\
         [ \"$1\" = \"-rules_file\" ] || {{ echo \"unexpected args: $*\" >&2; exit 9; }}\n\
         grep -q -- '{expect_in_rules}' \"$2\" || {{ echo 'rule not passed' >&2; exit 8; }}\n\
         cat <<'JSON'\n{report}\nJSON\n"
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn finding_json(check_id: &str, path: &str, line: usize) -> String {
    format!(
        r#"{{"check_id":"{check_id}","path":"{path}","start":{{"line":{line},"col":1}},"end":{{"line":{line},"col":7}},"extra":{{"message":"useless","line":"a == a"}}}}"#
    )
}
