use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use rft::client::{self, ClientConfig, DownloadJob, Job, UploadJob};
use rft::net::Protocol;
use rft::server::{self, ServerConfig};
use rft::Error;

fn spawn_server(port: u16, storage_dir: PathBuf, protocol: Protocol) {
    thread::spawn(move || {
        let cfg = ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
            storage_dir,
            protocol,
        };
        let _ = server::run(cfg);
    });
    // Give the accepter time to bind the welcoming socket before any
    // client in the test sends its SYN.
    thread::sleep(Duration::from_millis(100));
}

fn random_content(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| ((i as u8).wrapping_mul(31).wrapping_add(seed))).collect()
}

#[test]
fn upload_then_download_round_trip_saw() {
    let storage = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    spawn_server(17301, storage.path().to_path_buf(), Protocol::Saw);

    let source = workdir.path().join("upload.bin");
    std::fs::write(&source, random_content(5000, 7)).unwrap();

    let upload_cfg = ClientConfig { host: "127.0.0.1".into(), port: 17301, protocol: Protocol::Saw };
    client::run(upload_cfg, Job::Upload(UploadJob { source: source.clone(), name: "saw_file.bin".into() })).unwrap();
    assert_eq!(std::fs::read(storage.path().join("saw_file.bin")).unwrap(), std::fs::read(&source).unwrap());

    let destination = workdir.path().join("downloaded.bin");
    let download_cfg = ClientConfig { host: "127.0.0.1".into(), port: 17301, protocol: Protocol::Saw };
    client::run(download_cfg, Job::Download(DownloadJob { name: "saw_file.bin".into(), destination: destination.clone() })).unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), std::fs::read(&source).unwrap());
}

#[test]
fn upload_then_download_round_trip_gbn() {
    let storage = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    spawn_server(17302, storage.path().to_path_buf(), Protocol::Gbn);

    let source = workdir.path().join("upload.bin");
    std::fs::write(&source, random_content(40_000, 13)).unwrap();

    let upload_cfg = ClientConfig { host: "127.0.0.1".into(), port: 17302, protocol: Protocol::Gbn };
    client::run(upload_cfg, Job::Upload(UploadJob { source: source.clone(), name: "gbn_file.bin".into() })).unwrap();
    assert_eq!(std::fs::read(storage.path().join("gbn_file.bin")).unwrap(), std::fs::read(&source).unwrap());

    let destination = workdir.path().join("downloaded.bin");
    let download_cfg = ClientConfig { host: "127.0.0.1".into(), port: 17302, protocol: Protocol::Gbn };
    client::run(download_cfg, Job::Download(DownloadJob { name: "gbn_file.bin".into(), destination: destination.clone() })).unwrap();

    assert_eq!(std::fs::read(&destination).unwrap(), std::fs::read(&source).unwrap());
}

#[test]
fn upload_collision_is_rejected_and_leaves_existing_file_untouched() {
    let storage = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    spawn_server(17303, storage.path().to_path_buf(), Protocol::Gbn);

    std::fs::write(storage.path().join("taken.bin"), b"original content").unwrap();

    let source = workdir.path().join("upload.bin");
    std::fs::write(&source, b"new content").unwrap();

    let cfg = ClientConfig { host: "127.0.0.1".into(), port: 17303, protocol: Protocol::Gbn };
    let result = client::run(cfg, Job::Upload(UploadJob { source, name: "taken.bin".into() }));

    assert!(matches!(result, Err(Error::FileAlreadyExists)));
    assert_eq!(std::fs::read(storage.path().join("taken.bin")).unwrap(), b"original content");
}

#[test]
fn download_of_missing_file_is_rejected_without_partial_file() {
    let storage = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    spawn_server(17304, storage.path().to_path_buf(), Protocol::Saw);

    let destination = workdir.path().join("never_written.bin");
    let cfg = ClientConfig { host: "127.0.0.1".into(), port: 17304, protocol: Protocol::Saw };
    let result = client::run(cfg, Job::Download(DownloadJob { name: "does_not_exist.bin".into(), destination: destination.clone() }));

    assert!(matches!(result, Err(Error::FileDoesNotExist)));
    assert!(!destination.exists());
}

#[test]
fn protocol_mismatch_is_reported_and_server_keeps_serving() {
    let storage = tempfile::tempdir().unwrap();
    let workdir = tempfile::tempdir().unwrap();
    spawn_server(17305, storage.path().to_path_buf(), Protocol::Saw);

    let cfg = ClientConfig { host: "127.0.0.1".into(), port: 17305, protocol: Protocol::Gbn };
    let result = client::run(cfg, Job::Download(DownloadJob { name: "anything.bin".into(), destination: workdir.path().join("x.bin") }));
    assert!(matches!(result, Err(Error::ProtocolMismatch)));

    // The welcoming loop must still accept a correctly-configured client
    // afterwards; a mismatched SYN must never take the accepter down.
    std::fs::write(storage.path().join("ok.bin"), b"still alive").unwrap();
    let good_cfg = ClientConfig { host: "127.0.0.1".into(), port: 17305, protocol: Protocol::Saw };
    let dest = workdir.path().join("ok_downloaded.bin");
    client::run(good_cfg, Job::Download(DownloadJob { name: "ok.bin".into(), destination: dest.clone() })).unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"still alive");
}
