// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::io::{self, Read};

use remotefs_core::fault::{FaultErrno, FaultOp, FaultPolicy, FaultRule};
use remotefs_core::testing::memory::{InMemoryConnectionProvider, InMemoryServer};
use remotefs_core::{ErrorKind, FsConfig, RemoteFileSystem, WriteMode, WriteOptions};

/// Reader handing out at most five bytes per call
struct Trickle<'a>(&'a [u8]);

impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(5).min(self.0.len());
        buf[..n].copy_from_slice(&self.0[..n]);
        self.0 = &self.0[n..];
        Ok(n)
    }
}

fn filesystem() -> (InMemoryServer, RemoteFileSystem<InMemoryConnectionProvider>) {
    let server = InMemoryServer::new();
    let fs = RemoteFileSystem::new(
        InMemoryConnectionProvider::new(server.clone()),
        FsConfig::default(),
    );
    (server, fs)
}

#[test]
fn disconnect_mid_write_keeps_partial_file_and_releases_lock() {
    let (server, fs) = filesystem();
    server.faults().set_policy(FaultPolicy {
        enabled: true,
        rules: vec![FaultRule {
            op: FaultOp::Write,
            errno: FaultErrno::Disconnected,
            start_after: 1,
            max_faults: Some(1),
        }],
    });

    let options = WriteOptions {
        mode: WriteMode::CreateNew,
        lock: true,
        ..WriteOptions::default()
    };
    let err = fs
        .write("/partial.txt", &mut Trickle(b"hello world"), &options)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connectivity);
    assert_eq!(err.path(), "/partial.txt");
    assert!(!fs.is_locked("/partial.txt"));
    assert_eq!(server.file_content("/partial.txt").as_deref(), Some(&b"hello"[..]));
    assert_eq!(server.open_sessions(), 0);
}

#[test]
fn read_error_closes_stream_and_releases_lock() {
    let (server, fs) = filesystem();
    server.put_file("/big.bin", vec![7u8; 64]);
    server.faults().set_policy(FaultPolicy {
        enabled: true,
        rules: vec![FaultRule {
            op: FaultOp::Read,
            errno: FaultErrno::Disconnected,
            start_after: 2,
            max_faults: None,
        }],
    });

    let mut result = fs.read("/big.bin", true).unwrap();
    assert!(fs.is_locked("/big.bin"));

    let mut sink = Vec::new();
    let err = result.stream.read_to_end(&mut sink).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    assert!(result.stream.is_closed());
    assert!(!fs.is_locked("/big.bin"));
    assert_eq!(server.open_sessions(), 0);
}

#[test]
fn lost_connection_during_stat_is_not_mistaken_for_absence() {
    let (server, fs) = filesystem();
    server
        .faults()
        .set_policy(FaultPolicy::always(FaultOp::Stat, FaultErrno::Disconnected));

    let err = fs
        .write("/new.txt", &mut &b"x"[..], &WriteOptions::with_mode(WriteMode::CreateNew))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);
    assert!(!server.exists("/new.txt"));

    assert_eq!(fs.read("/new.txt", false).unwrap_err().kind(), ErrorKind::Connectivity);
}

#[test]
fn unexpected_open_failure_is_wrapped_with_context() {
    let (server, fs) = filesystem();
    server
        .faults()
        .set_policy(FaultPolicy::always(FaultOp::OpenWrite, FaultErrno::PermissionDenied));

    let options = WriteOptions {
        lock: true,
        ..WriteOptions::with_mode(WriteMode::Append)
    };
    let err = fs.write("/log.txt", &mut &b"entry"[..], &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Wrapped);
    assert!(err
        .to_string()
        .contains("Could not open stream to write to path '/log.txt' using mode 'APPEND'"));
    assert!(!fs.is_locked("/log.txt"));
}

#[test]
fn open_read_failure_releases_lock() {
    let (server, fs) = filesystem();
    server.put_file("/f", "x");
    server
        .faults()
        .set_policy(FaultPolicy::always(FaultOp::OpenRead, FaultErrno::Eio));

    assert_eq!(fs.read("/f", true).unwrap_err().kind(), ErrorKind::Wrapped);
    assert!(!fs.is_locked("/f"));

    server.faults().clear();
    assert_eq!(fs.read("/f", true).unwrap().stream.read_all().unwrap(), b"x");
}

#[test]
fn policy_loaded_from_json_drives_listing_failures() {
    let (server, fs) = filesystem();
    server.create_dirs("/d");
    let policy = FaultPolicy::from_json_bytes(
        br#"{ "enabled": true, "rules": [ { "op": "list", "errno": "disconnected", "max_faults": 1 } ] }"#,
    )
    .unwrap();
    server.faults().set_policy(policy);

    assert_eq!(fs.list("/d").unwrap_err().kind(), ErrorKind::Connectivity);
    assert!(fs.list("/d").unwrap().is_empty());
}
