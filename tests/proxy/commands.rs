//! Control-surface tests: verb parsing, flag ranges, execution

use relaypool::app::commands::{execute, ProxyCommand};
use relaypool::core::proxy::{ProxyPool, ProxyType};
use std::io::Write;
use std::path::PathBuf;

fn list_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp list file");
    file.write_all(contents.as_bytes()).expect("write list file");
    file.flush().expect("flush list file");
    file
}

#[test]
fn test_no_arguments_means_status() {
    assert_eq!(ProxyCommand::parse(&[]).unwrap(), ProxyCommand::Status);
}

#[test]
fn test_clear_verb() {
    assert_eq!(ProxyCommand::parse(&["clear"]).unwrap(), ProxyCommand::Clear);
    assert!(ProxyCommand::parse(&["clear", "now"]).is_err());
}

#[test]
fn test_check_verb_with_flags() {
    let cmd = ProxyCommand::parse(&[
        "check",
        "--concurrency",
        "5",
        "--timeout",
        "800",
        "--save",
        "out.txt",
    ])
    .unwrap();
    match cmd {
        ProxyCommand::Check { save, options } => {
            assert_eq!(save, Some(PathBuf::from("out.txt")));
            assert_eq!(options.concurrency, 5);
            assert_eq!(options.timeout_ms, 800);
        }
        other => panic!("expected Check, got {other:?}"),
    }
}

#[test]
fn test_check_rejects_load_only_flags() {
    assert!(ProxyCommand::parse(&["check", "--type", "socks5"]).is_err());
    assert!(ProxyCommand::parse(&["check", "--no-check"]).is_err());
}

#[test]
fn test_load_verb_with_flags() {
    let cmd = ProxyCommand::parse(&[
        "proxies.txt",
        "--type",
        "socks5",
        "--no-check",
        "--test-host",
        "irc.example.net",
        "--test-port",
        "6697",
    ])
    .unwrap();
    match cmd {
        ProxyCommand::Load {
            file,
            default_type,
            check,
            save,
            options,
        } => {
            assert_eq!(file, PathBuf::from("proxies.txt"));
            assert_eq!(default_type, ProxyType::Socks5);
            assert!(!check);
            assert_eq!(save, None);
            assert_eq!(options.test_host, "irc.example.net");
            assert_eq!(options.test_port, 6697);
        }
        other => panic!("expected Load, got {other:?}"),
    }
}

#[test]
fn test_load_validates_by_default() {
    match ProxyCommand::parse(&["proxies.txt"]).unwrap() {
        ProxyCommand::Load { check, default_type, .. } => {
            assert!(check);
            assert_eq!(default_type, ProxyType::None);
        }
        other => panic!("expected Load, got {other:?}"),
    }
}

#[test]
fn test_flag_range_validation() {
    for args in [
        ["check", "--concurrency", "0"],
        ["check", "--concurrency", "129"],
        ["check", "--timeout", "99"],
        ["check", "--timeout", "60001"],
        ["check", "--test-port", "0"],
    ] {
        assert!(ProxyCommand::parse(&args).is_err(), "{args:?} should fail");
    }
}

#[test]
fn test_unknown_or_valueless_flags_fail() {
    assert!(ProxyCommand::parse(&["check", "--frobnicate"]).is_err());
    assert!(ProxyCommand::parse(&["check", "--timeout"]).is_err());
    assert!(ProxyCommand::parse(&["list.txt", "--type", "carrier-pigeon"]).is_err());
}

#[test]
fn test_execute_load_without_validation() {
    let file = list_file("127.0.0.1:1080\nsocks4://127.0.0.2:1081\n");
    let mut pool = ProxyPool::new();
    let cmd = ProxyCommand::parse(&[file.path().to_str().unwrap(), "--no-check"]).unwrap();
    let message = execute(cmd, &mut pool).unwrap();
    assert!(message.contains("loaded 2 proxies"));
    assert_eq!(pool.count(), 2);
    assert_eq!(pool.validated_count(), 0);
}

#[test]
fn test_execute_status_and_clear() {
    let file = list_file("127.0.0.1:1080\n");
    let mut pool = ProxyPool::new();
    let cmd = ProxyCommand::parse(&[file.path().to_str().unwrap(), "--no-check"]).unwrap();
    execute(cmd, &mut pool).unwrap();

    let status = execute(ProxyCommand::Status, &mut pool).unwrap();
    assert!(status.contains("1 proxies loaded"));

    execute(ProxyCommand::Clear, &mut pool).unwrap();
    assert!(pool.is_empty());
    let status = execute(ProxyCommand::Status, &mut pool).unwrap();
    assert_eq!(status, "proxy pool is empty");
}

#[test]
fn test_execute_check_on_empty_pool_fails() {
    let mut pool = ProxyPool::new();
    let cmd = ProxyCommand::parse(&["check"]).unwrap();
    assert!(execute(cmd, &mut pool).is_err());
}

#[test]
fn test_execute_load_missing_file_fails() {
    let mut pool = ProxyPool::new();
    let cmd = ProxyCommand::parse(&["/nonexistent/proxies.txt", "--no-check"]).unwrap();
    assert!(execute(cmd, &mut pool).is_err());
}
