use mdconvert_engine::{fingerprint, load_or_create_with, HostInfo, DEVICE_ID_FILENAME};
use tempfile::TempDir;

fn host(host: Option<&str>, user: Option<&str>) -> HostInfo {
    HostInfo {
        host: host.map(str::to_string),
        user: user.map(str::to_string),
        os: "linux".to_string(),
        arch: "x86_64".to_string(),
    }
}

#[test]
fn fingerprint_is_stable_and_host_specific() {
    let a = fingerprint(&host(Some("box"), Some("ann"))).unwrap();
    let again = fingerprint(&host(Some("box"), Some("ann"))).unwrap();
    let other = fingerprint(&host(Some("box"), Some("bob"))).unwrap();

    assert_eq!(a, again);
    assert_ne!(a, other);
    assert_eq!(a.len(), 32);
}

#[test]
fn fingerprint_needs_host_or_user() {
    assert_eq!(fingerprint(&host(None, None)), None);
}

#[test]
fn device_id_is_created_once_and_cached() {
    let temp = TempDir::new().unwrap();
    let first = load_or_create_with(temp.path(), &host(Some("box"), Some("ann"))).unwrap();
    let cached = load_or_create_with(temp.path(), &host(Some("other"), Some("bob"))).unwrap();

    assert_eq!(first, cached);
    let on_disk = std::fs::read_to_string(temp.path().join(DEVICE_ID_FILENAME)).unwrap();
    assert_eq!(on_disk, first);
}

#[test]
fn falls_back_to_random_id_without_host_facts() {
    let temp = TempDir::new().unwrap();
    let id = load_or_create_with(temp.path(), &host(None, None)).unwrap();

    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
}
