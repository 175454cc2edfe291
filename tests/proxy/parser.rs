//! Line parser tests: accepted grammar, credential policy, rejection cases

use relaypool::core::proxy::{parse_proxy_line, Proxy, ProxyType};

fn parsed(line: &str) -> Proxy {
    parse_proxy_line(line, ProxyType::None)
        .expect("line should parse")
        .expect("line should yield a record")
}

fn parsed_with(line: &str, default_type: ProxyType) -> Proxy {
    parse_proxy_line(line, default_type)
        .expect("line should parse")
        .expect("line should yield a record")
}

#[test]
fn test_scheme_credentials_ipv4_literal() {
    let p = parsed("socks5://u:p@198.51.100.4:1080");
    assert_eq!(p.host, "198.51.100.4");
    assert_eq!(p.port, 1080);
    assert_eq!(p.username.as_deref(), Some("u"));
    assert_eq!(p.password.as_deref(), Some("p"));
    assert_eq!(p.declared_type, ProxyType::Socks5);
    assert!(!p.is_ipv6());
    assert_eq!(p.detected_type, ProxyType::None);
    assert!(!p.validated);
    assert!(!p.is_active);
    assert_eq!(p.last_rtt_ms, 0);
}

#[test]
fn test_bracketed_ipv6_with_suffix_credentials() {
    let p = parsed_with("[2001:db8::1]:1080:alice:s3cret", ProxyType::Http);
    assert_eq!(p.host, "2001:db8::1");
    assert_eq!(p.port, 1080);
    assert_eq!(p.username.as_deref(), Some("alice"));
    assert_eq!(p.password.as_deref(), Some("s3cret"));
    assert!(p.is_ipv6());
    assert_eq!(p.declared_type, ProxyType::Http);
}

#[test]
fn test_comments_and_blank_lines_yield_nothing() {
    assert_eq!(parse_proxy_line("   # comment  ", ProxyType::None).unwrap(), None);
    assert_eq!(parse_proxy_line("", ProxyType::None).unwrap(), None);
    assert_eq!(parse_proxy_line("\r\n", ProxyType::None).unwrap(), None);
    assert_eq!(parse_proxy_line("# socks5://u:p@1.2.3.4:1", ProxyType::None).unwrap(), None);
}

#[test]
fn test_bare_host_port() {
    let p = parsed("127.0.0.1:3128");
    assert_eq!(p.host, "127.0.0.1");
    assert_eq!(p.port, 3128);
    assert!(p.username.is_none());
    assert!(p.password.is_none());
    assert_eq!(p.declared_type, ProxyType::None);
}

#[test]
fn test_password_field_absorbs_remaining_colons() {
    let p = parsed("127.0.0.1:1080:user:pa:ss");
    assert_eq!(p.username.as_deref(), Some("user"));
    assert_eq!(p.password.as_deref(), Some("pa:ss"));
}

#[test]
fn test_prefix_credentials() {
    let p = parsed("alice:secret@127.0.0.1:8080");
    assert_eq!(p.host, "127.0.0.1");
    assert_eq!(p.port, 8080);
    assert_eq!(p.username.as_deref(), Some("alice"));
    assert_eq!(p.password.as_deref(), Some("secret"));
}

#[test]
fn test_rightmost_at_sign_wins() {
    // The split uses the rightmost '@'; everything left of it is the
    // credential block.
    let p = parsed("a@b:pw@127.0.0.1:1080");
    assert_eq!(p.username.as_deref(), Some("a@b"));
    assert_eq!(p.password.as_deref(), Some("pw"));
    assert_eq!(p.host, "127.0.0.1");
}

#[test]
fn test_scheme_is_case_insensitive() {
    assert_eq!(parsed("SoCkS4://127.0.0.1:1").declared_type, ProxyType::Socks4);
    assert_eq!(parsed("HTTPS://127.0.0.1:8443").declared_type, ProxyType::Https);
}

#[test]
fn test_unknown_scheme_falls_back_to_default() {
    let p = parsed_with("ftp://127.0.0.1:21", ProxyType::Socks5);
    assert_eq!(p.declared_type, ProxyType::Socks5);
    assert_eq!(p.host, "127.0.0.1");
}

#[test]
fn test_wrapping_bracket_pair_is_peeled_once() {
    let p = parsed("[u:p@[2001:db8::2]:1080]");
    assert_eq!(p.username.as_deref(), Some("u"));
    assert_eq!(p.password.as_deref(), Some("p"));
    assert_eq!(p.host, "2001:db8::2");
    assert!(p.is_ipv6());
}

#[test]
fn test_whitespace_only_credentials_are_absent() {
    let p = parsed("127.0.0.1:1080:   :pass");
    assert!(p.username.is_none());
    // A password cannot survive without a username.
    assert!(p.password.is_none());
}

#[test]
fn test_orphan_prefix_password_is_dropped() {
    let p = parsed(":pass@127.0.0.1:1080");
    assert!(p.username.is_none());
    assert!(p.password.is_none());
}

#[test]
fn test_username_only_suffix() {
    let p = parsed("127.0.0.1:1080:bob");
    assert_eq!(p.username.as_deref(), Some("bob"));
    assert!(p.password.is_none());
}

#[test]
fn test_prefix_credentials_win_over_suffix() {
    let p = parsed("u1:p1@127.0.0.1:1080:u2:p2");
    assert_eq!(p.username.as_deref(), Some("u1"));
    assert_eq!(p.password.as_deref(), Some("p1"));
}

#[test]
fn test_port_with_surrounding_whitespace() {
    let p = parsed("127.0.0.1: 1080 ");
    assert_eq!(p.port, 1080);
}

#[test]
fn test_rejects_malformed_lines() {
    for line in [
        "nocolon",
        "127.0.0.1:0",
        "127.0.0.1:70000",
        "127.0.0.1:12ab",
        "127.0.0.1:-1",
        "[::1:1080",
        "[::1]1080",
        "[::1]",
        ":1080",
        "user:pass@",
    ] {
        assert!(
            parse_proxy_line(line, ProxyType::None).is_err(),
            "line {line:?} should be rejected"
        );
    }
}

#[test]
fn test_rejects_bracketed_non_ipv6_literal() {
    let err = parse_proxy_line("[127.0.0.1]:80", ProxyType::None).unwrap_err();
    assert_eq!(err.category(), "resolve");
}

#[test]
fn test_unbracketed_ipv6_is_rejected() {
    // Without brackets the first colon is taken as the port separator.
    assert!(parse_proxy_line("2001:db8::1:1080", ProxyType::None).is_err());
}

#[test]
fn test_long_lines_are_truncated() {
    let line = format!("127.0.0.1:1080:user:{}", "a".repeat(600));
    let p = parsed(&line);
    // 512-byte cap minus the fixed "127.0.0.1:1080:user:" prefix.
    assert_eq!(p.password.as_deref().map(str::len), Some(492));
}

#[test]
fn test_bracketed_ipv6_without_credentials() {
    let p = parsed("[::1]:9050");
    assert_eq!(p.host, "::1");
    assert_eq!(p.port, 9050);
    assert!(p.is_ipv6());
    assert!(p.username.is_none());
}
