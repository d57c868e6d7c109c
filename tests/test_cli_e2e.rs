mod common;

use common::{Toolconf, stderr, stdout};

// ============================================================================
// --list-components
// ============================================================================

#[test]
fn list_components_colon() {
    let tc = Toolconf::new();
    let output = tc.run(&["--list-components"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "0:toolA:Description A\n1:toolB:Description B\n"
    );
}

#[test]
fn list_components_is_the_default_action() {
    let tc = Toolconf::new();
    let output = tc.run(&[]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("0:toolA:"));
}

#[test]
fn list_components_json() {
    let tc = Toolconf::new();
    let output = tc.run(&["--list-components", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("output should be valid JSON");
    let items = parsed.as_array().expect("array of components");
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["name"], "toolB");
    assert_eq!(items[1]["installed"], true);
    assert_eq!(items[0]["installed"], false);
}

#[test]
fn output_flag_writes_file() {
    let tc = Toolconf::new();
    let target = tc.root().join("components.txt");
    let output = tc.run(&["--list-components", "-o", target.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).is_empty());
    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "0:toolA:Description A\n1:toolB:Description B\n"
    );
}

// ============================================================================
// --list-options
// ============================================================================

#[test]
fn list_options_in_schema_order() {
    let tc = Toolconf::new();
    tc.write("tool-a.conf", "group ops\nmax-cache-ttl 60\nverbose\n");
    let output = tc.run(&["--list-options", "toolA"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let lines: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(
        lines,
        vec![
            "verbose:0:0:Verbose output:0:::1",
            "keyserver:256:0:Key server to use:1:URL::",
            "group:260:0::3:NAME::\"ops",
            "max-cache-ttl:1296:1::2::7200:60",
        ]
    );
}

#[cfg(unix)]
#[test]
fn list_options_queries_component() {
    let tc = Toolconf::new();
    let output = tc.run(&["--list-options", "toolB"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "debug-level:280:0::1::\"basic:\n");
}

#[cfg(unix)]
#[test]
fn failing_component_query_is_an_error() {
    let tc = Toolconf::new();
    tc.mock_tool("tool-b", "echo broken >&2\nexit 3\n");
    let output = tc.run(&["--list-options", "toolB"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("toolB"));
}

#[test]
fn unknown_component_exits_1_with_suggestion() {
    let tc = Toolconf::new();
    let output = tc.run(&["--list-options", "toolZ"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("did you mean"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn missing_component_argument_exits_2() {
    let tc = Toolconf::new();
    let output = tc.run(&["--list-options"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn extra_argument_exits_2() {
    let tc = Toolconf::new();
    let output = tc.run(&["--list-options", "toolA", "toolB"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn conflicting_commands_exit_2() {
    let tc = Toolconf::new();
    let output = tc.run(&["--list-components", "--apply-defaults"]);
    assert_eq!(output.status.code(), Some(2));
}

// ============================================================================
// --change-options
// ============================================================================

#[test]
fn change_use_default_removes_line() {
    let tc = Toolconf::new();
    tc.write("tool-a.conf", "# comment\nverbose\nkeyserver hkps://example.com\n");
    let output = tc.run_with_stdin(&["--change-options", "toolA"], "verbose:use-default:\n");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        tc.read("tool-a.conf"),
        "# comment\nkeyserver hkps://example.com\n"
    );
}

#[test]
fn change_list_rewrites_in_place() {
    let tc = Toolconf::new();
    tc.write("tool-a.conf", "group admin\ngroup ops\n");
    let output = tc.run_with_stdin(
        &["--change-options", "toolA"],
        "group:explicit:admin,readers\n",
    );
    assert!(output.status.success());
    assert_eq!(tc.read("tool-a.conf"), "group admin\ngroup readers\n");
}

#[test]
fn change_with_bad_line_keeps_good_changes() {
    let tc = Toolconf::new();
    tc.write("tool-a.conf", "foobar 1\n");
    let output = tc.run_with_stdin(
        &["--change-options", "toolA"],
        "max-cache-ttl:0:soon\nverbose:0:\n",
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("line 1"), "stderr: {}", stderr(&output));
    assert_eq!(tc.read("tool-a.conf"), "foobar 1\nverbose\n");
}

#[test]
fn dry_run_leaves_file_alone() {
    let tc = Toolconf::new();
    let output = tc.run_with_stdin(&["--change-options", "toolA", "--dry-run"], "verbose:0:\n");
    assert!(output.status.success());
    assert!(!tc.exists("tool-a.conf"));
}

#[test]
fn runtime_without_reload_support_still_succeeds() {
    let tc = Toolconf::new();
    let output = tc.run_with_stdin(&["--change-options", "toolA", "-r"], "verbose:0:\n");
    assert!(output.status.success());
    assert_eq!(tc.read("tool-a.conf"), "verbose\n");
}

#[test]
fn no_change_rule_is_honored() {
    let tc = Toolconf::new();
    tc.write("gpgconf.conf", "*  toolA  keyserver  [no-change]\n");
    let output = tc.run_with_stdin(&["--change-options", "toolA"], "keyserver:0:\"x\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("may not be changed"));
    assert!(!tc.exists("tool-a.conf"));
}

#[test]
fn change_leaves_output_file_untouched() {
    let tc = Toolconf::new();
    let target = tc.root().join("records.txt");
    std::fs::write(&target, "previous\n").unwrap();
    let output = tc.run_with_stdin(
        &["--change-options", "toolA", "-o", target.to_str().unwrap()],
        "verbose:0:\n",
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "previous\n");
    assert_eq!(tc.read("tool-a.conf"), "verbose\n");
}

// ============================================================================
// Invalid global rules
// ============================================================================

#[test]
fn invalid_global_rules_fail_list_options() {
    let tc = Toolconf::new();
    tc.write("gpgconf.conf", "* toolA nosuch [no-change]\n");
    let output = tc.run(&["--list-options", "toolA"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("global configuration"));
}

#[test]
fn invalid_global_rules_fail_change_options() {
    let tc = Toolconf::new();
    tc.write("gpgconf.conf", "* toolA nosuch [no-change]\n");
    let output = tc.run_with_stdin(&["--change-options", "toolA"], "verbose:0:\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(!tc.exists("tool-a.conf"));
}

#[test]
fn invalid_global_rules_block_apply_defaults() {
    let tc = Toolconf::new();
    tc.write("gpgconf.conf", "* toolA nosuch [no-change]\n");
    let output = tc.run(&["--apply-defaults"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("nosuch"));
    assert!(!tc.exists("tool-a.conf"));
}

// ============================================================================
// --check-config / --apply-defaults
// ============================================================================

#[test]
fn check_config_unknown_option_is_warning() {
    let tc = Toolconf::new();
    tc.write("tool-a.conf", "foobar 1\n");
    let output = tc.run(&["--check-config"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert_eq!(out.lines().count(), 1, "stdout: {out}");
    assert!(out.contains("warning") && out.contains("foobar"));
}

#[test]
fn check_config_reports_bad_values() {
    let tc = Toolconf::new();
    tc.write("tool-a.conf", "max-cache-ttl soon\n");
    let output = tc.run(&["--check-config", "--format", "json"]);
    assert_eq!(output.status.code(), Some(1));
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(parsed["errors"], 1);
    assert_eq!(parsed["components"][0]["valid"], false);
}

#[test]
fn check_config_missing_explicit_file_fails() {
    let tc = Toolconf::new();
    let missing = tc.root().join("nope.conf");
    let output = tc.run(&["--check-config", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn check_config_rejects_bad_rules() {
    let tc = Toolconf::new();
    let rules = tc.root().join("rules.conf");
    std::fs::write(&rules, "* toolA keyserver [sometimes]\n").unwrap();
    let output = tc.run(&["--check-config", rules.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("unknown flag"));
}

#[test]
fn apply_defaults_twice_is_a_no_op() {
    let tc = Toolconf::new();
    tc.write("tool-a.conf", "# settings\nverbose\n\n# end\n");

    let first = tc.run(&["--apply-defaults"]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    let content = tc.read("tool-a.conf");
    assert_eq!(content, "# settings\nverbose\nmax-cache-ttl 7200\n\n# end\n");

    let second = tc.run(&["--apply-defaults"]);
    assert!(second.status.success());
    assert_eq!(tc.read("tool-a.conf"), content);
}
