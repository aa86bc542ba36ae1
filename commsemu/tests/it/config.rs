use std::io::Write;

use commsemu::{Config, ConfigError, InputPolicy, Overrides};

#[test]
fn load_from_file_and_override() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        listen = "127.0.0.1:0"
        out_of_range = "reject"
        dry_run = true

        [[links]]
        source = "atlas"
        target = "bestla"
        interfaces = ["vA", "vB"]
        "#
    )
    .unwrap();

    let mut config = Config::load(file.path()).unwrap();
    assert_eq!(config.out_of_range, InputPolicy::Reject);
    assert!(config.dry_run);

    config
        .apply(Overrides { out_of_range: Some(InputPolicy::Clamp), command_timeout_ms: Some(250), ..Default::default() })
        .unwrap();

    assert_eq!(config.out_of_range, InputPolicy::Clamp);
    assert_eq!(config.command_timeout().map(|t| t.as_millis()), Some(250));
    let links = config.links().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].interfaces(), ["vA", "vB"]);
}

#[test]
fn missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn empty_interface_in_file_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[[links]]\nsource = \"atlas\"\ntarget = \"bestla\"\ninterfaces = [\"vA\", \"\"]").unwrap();

    let config = Config::load(file.path()).unwrap();
    let err = config.links().unwrap_err();
    assert!(matches!(err, ConfigError::Link { .. }), "{err}");
}

#[test]
fn wrong_positional_count() {
    let mut config = Config::default();
    let err = config
        .apply(Overrides { endpoints: vec!["atlas".into(), "vA".into(), "bestla".into()], ..Default::default() })
        .unwrap_err();
    assert!(matches!(err, ConfigError::Arity(3)));
}
