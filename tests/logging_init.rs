use dmm_energy::logging;

#[test]
fn test_second_init_keeps_first_subscriber() {
    let dir = tempfile::tempdir().unwrap();
    let logs_home = dir.path().join("logs");

    let path = logging::init(&logs_home, false).unwrap();
    assert!(path.starts_with(&logs_home));
    assert!(path.exists());

    assert_eq!(logging::init(&logs_home, true), None);
}
