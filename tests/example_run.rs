//! Integration tests for the `example run` command.
use opinmod::cli::RunOpts;
use opinmod::cli::example::handle_example_run_command;
use opinmod::settings::Settings;
use tempfile::tempdir;

/// An integration test for the `example run` command.
#[test]
fn test_handle_example_run_command() {
    unsafe { std::env::set_var("OPINMOD_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().join("results")),
        debug_model: true,
        ..RunOpts::default()
    };
    handle_example_run_command("simple", &opts, Some(Settings::default())).unwrap();
    assert!(tempdir.path().join("results/debug_variables.csv").is_file());
}
