//! Integration tests for the agent binary.
#![cfg(unix)]

mod common;

use common::{
    run::{run_agent, stdout_json},
    write_config, write_plugin,
};
use indoc::{formatdoc, indoc};
use pretty_assertions::assert_eq;
use serde_json::json;

const AGENT_BIN: &str = "plugin-metrics-agent";

const DICE_PLUGIN: &str = indoc! {r#"
    if [ "$MACKEREL_AGENT_PLUGIN_META" = "1" ]; then
        echo '# mackerel-agent-plugin'
        echo '{"graphs":{"dice":{"label":"My Dice","unit":"integer","metrics":[{"name":"d6","label":"Die (d6)"}]}}}'
        exit 0
    fi
    echo "dice.d6 4 1397031808"
    echo "dice.d20 17 1397031808"
"#};

const BROKEN_PLUGIN: &str = indoc! {r#"
    echo 'connection refused' >&2
    exit 3
"#};

#[test]
fn help() -> anyhow::Result<()> {
    let tmp_dir = tempfile::tempdir()?;
    let output = run_agent(AGENT_BIN, &["--help"], tmp_dir.path())?;
    assert!(output.status.success());
    let help = String::from_utf8(output.stdout)?;
    assert!(help.contains("collect"), "{help}");
    assert!(help.contains("graphdefs"), "{help}");
    Ok(())
}

#[test]
fn missing_config_file() -> anyhow::Result<()> {
    let tmp_dir = tempfile::tempdir()?;
    let output = run_agent(AGENT_BIN, &["check"], tmp_dir.path())?;
    assert!(!output.status.success(), "the default config file does not exist");
    Ok(())
}

#[test]
fn check() -> anyhow::Result<()> {
    let tmp_dir = tempfile::tempdir()?;
    write_config(
        tmp_dir.path(),
        indoc! {r#"
            [plugins.tcp]
            command = "tcp-states"
            include_pattern = '^tcp\.'
            timeout = "5s"
        "#},
    )?;
    let output = run_agent(AGENT_BIN, &["check"], tmp_dir.path())?;
    assert!(output.status.success());

    write_config(tmp_dir.path(), "[plugins.tcp]\ncommand = \"x\"\ninclude_pattern = '('\n")?;
    let output = run_agent(AGENT_BIN, &["check"], tmp_dir.path())?;
    assert!(!output.status.success(), "invalid regex should be rejected");

    write_config(tmp_dir.path(), "[plugins.tcp]\ncommand = \"x\"\ninterval = \"1m\"\n")?;
    let output = run_agent(AGENT_BIN, &["check"], tmp_dir.path())?;
    assert!(!output.status.success(), "unknown fields should be rejected");
    Ok(())
}

#[test]
fn collect() -> anyhow::Result<()> {
    let tmp_dir = tempfile::tempdir()?;
    let dice = write_plugin(tmp_dir.path(), "dice.sh", DICE_PLUGIN)?;
    let broken = write_plugin(tmp_dir.path(), "broken.sh", BROKEN_PLUGIN)?;
    let config = write_config(
        tmp_dir.path(),
        &formatdoc! {r#"
            [plugins.dice]
            command = {dice}
            exclude_pattern = 'd20$'
            custom_identifier = "casino.example.com"

            [plugins.broken]
            command = {broken}
        "#},
    )?;
    let config = config.to_string_lossy().into_owned();

    let output = run_agent(AGENT_BIN, &["--config", &config, "collect"], tmp_dir.path())?;
    assert!(output.status.success(), "one failing plugin is not fatal");
    assert_eq!(
        stdout_json(&output)?,
        json!({
            "dice": {
                "customIdentifier": "casino.example.com",
                "values": { "custom.dice.d6": 4.0 }
            }
        })
    );
    let logs = String::from_utf8(output.stderr)?;
    assert!(logs.contains("connection refused"), "{logs}");

    let output = run_agent(
        AGENT_BIN,
        &["--config", &config, "collect", "--plugin", "broken"],
        tmp_dir.path(),
    )?;
    assert!(!output.status.success(), "every selected plugin failed");
    assert_eq!(stdout_json(&output)?, json!({}));
    Ok(())
}

#[test]
fn graphdefs() -> anyhow::Result<()> {
    let tmp_dir = tempfile::tempdir()?;
    let dice = write_plugin(tmp_dir.path(), "dice.sh", DICE_PLUGIN)?;
    write_config(tmp_dir.path(), &format!("[plugins.dice]\ncommand = {dice}\n"))?;

    let output = run_agent(AGENT_BIN, &["graphdefs", "--plugin", "dice"], tmp_dir.path())?;
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output)?,
        json!({
            "dice": [{
                "name": "custom.dice",
                "displayName": "My Dice",
                "unit": "integer",
                "metrics": [
                    { "name": "custom.dice.d6", "displayName": "Die (d6)", "isStacked": false }
                ]
            }]
        })
    );
    Ok(())
}

#[test]
fn unknown_plugin() -> anyhow::Result<()> {
    let tmp_dir = tempfile::tempdir()?;
    write_config(tmp_dir.path(), "[plugins.dice]\ncommand = \"true\"\n")?;
    let output = run_agent(AGENT_BIN, &["collect", "--plugin", "coin"], tmp_dir.path())?;
    assert!(!output.status.success());
    let logs = String::from_utf8(output.stderr)?;
    assert!(logs.contains("plugin 'coin' is not in the config file"), "{logs}");
    Ok(())
}
