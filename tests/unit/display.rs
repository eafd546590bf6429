use super::*;

fn cfg(server: &str, probe: &[&str]) -> XvfbConfig {
    XvfbConfig {
        server: server.to_string(),
        probe: probe.iter().map(|s| s.to_string()).collect(),
        startup_timeout: Duration::from_millis(300),
        probe_interval: Duration::from_millis(20),
        ..XvfbConfig::new(":177")
    }
}

#[test]
fn defaults_match_a_full_hd_screen() {
    let c = XvfbConfig::new(":99");
    assert_eq!(c.screen, "1920x1080x24");
    assert_eq!(c.probe, ["xset", "q"]);
}

#[cfg(unix)]
#[test]
fn refuses_when_the_display_already_answers() {
    let mut x = Xvfb::new(cfg("Xvfb", &["true"]));
    let err = x.start().unwrap_err();
    match &err {
        MixError::DisplayAlreadyRunning { display } => assert_eq!(display, ":177"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("already running"));
    assert!(!x.is_running());
}

#[test]
fn missing_server_binary_is_reported() {
    let mut x = Xvfb::new(cfg("livemix-no-such-display-server", &[]));
    let err = x.start().unwrap_err();
    assert!(matches!(err, MixError::Display(_)));
}

#[cfg(unix)]
#[test]
fn server_exiting_early_fails_start() {
    let mut x = Xvfb::new(cfg("true", &["false"]));
    assert!(x.start().is_err());
    assert!(!x.is_running());
    x.stop();
}
