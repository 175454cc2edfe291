//! `proxy` control-surface verbs
//!
//! The host program tokenizes its command line and hands everything after
//! the `proxy` keyword to [`ProxyCommand::parse`]:
//!
//! ```text
//! proxy <file> [--type T] [--check|--no-check] [--concurrency N]
//!              [--timeout MS] [--save F] [--test-host H] [--test-port P]
//! proxy check  [--concurrency N] [--timeout MS] [--save F]
//!              [--test-host H] [--test-port P]
//! proxy clear
//! proxy
//! ```

use crate::core::proxy::{
    config::{MAX_CONCURRENCY, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS},
    validate_pool, ProxyPool, ProxyType, ValidatorOptions,
};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyCommand {
    /// Replace the pool from a list file, optionally validating it
    Load {
        file: PathBuf,
        default_type: ProxyType,
        check: bool,
        save: Option<PathBuf>,
        options: ValidatorOptions,
    },
    /// Re-validate the existing pool
    Check {
        save: Option<PathBuf>,
        options: ValidatorOptions,
    },
    /// Empty the pool
    Clear,
    /// Describe the pool
    Status,
}

impl ProxyCommand {
    /// Parse the argument tokens following the `proxy` verb.
    pub fn parse(args: &[&str]) -> Result<ProxyCommand> {
        match args.first() {
            None => Ok(ProxyCommand::Status),
            Some(&"clear") => {
                if args.len() > 1 {
                    bail!("'proxy clear' takes no arguments");
                }
                Ok(ProxyCommand::Clear)
            }
            Some(&"check") => {
                let flags = parse_flags(&args[1..])?;
                if flags.default_type.is_some() || flags.check.is_some() {
                    bail!("'proxy check' does not accept --type or --check");
                }
                Ok(ProxyCommand::Check {
                    options: flags.options()?,
                    save: flags.save,
                })
            }
            Some(&file) => {
                let flags = parse_flags(&args[1..])?;
                Ok(ProxyCommand::Load {
                    file: PathBuf::from(file),
                    default_type: flags.default_type.unwrap_or(ProxyType::None),
                    check: flags.check.unwrap_or(true),
                    options: flags.options()?,
                    save: flags.save,
                })
            }
        }
    }
}

#[derive(Debug, Default)]
struct Flags {
    default_type: Option<ProxyType>,
    check: Option<bool>,
    save: Option<PathBuf>,
    concurrency: Option<usize>,
    timeout_ms: Option<u64>,
    test_host: Option<String>,
    test_port: Option<u16>,
}

impl Flags {
    fn options(&self) -> Result<ValidatorOptions> {
        let defaults = ValidatorOptions::default();
        let options = ValidatorOptions {
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            test_host: self.test_host.clone().unwrap_or(defaults.test_host),
            test_port: self.test_port.unwrap_or(defaults.test_port),
            verbose: defaults.verbose,
        };
        options.validate()?;
        Ok(options)
    }
}

fn parse_flags(args: &[&str]) -> Result<Flags> {
    let mut flags = Flags::default();
    let mut iter = args.iter();
    while let Some(&flag) = iter.next() {
        match flag {
            "--type" => {
                let value = flag_value(&mut iter, flag)?;
                flags.default_type = Some(
                    ProxyType::from_scheme(value)
                        .with_context(|| format!("unknown proxy type '{value}'"))?,
                );
            }
            "--check" => flags.check = Some(true),
            "--no-check" => flags.check = Some(false),
            "--save" => flags.save = Some(PathBuf::from(flag_value(&mut iter, flag)?)),
            "--concurrency" => {
                let value: usize = parse_flag_value(&mut iter, flag)?;
                if value < 1 || value > MAX_CONCURRENCY {
                    bail!("--concurrency must be between 1 and {MAX_CONCURRENCY}");
                }
                flags.concurrency = Some(value);
            }
            "--timeout" => {
                let value: u64 = parse_flag_value(&mut iter, flag)?;
                if value < MIN_TIMEOUT_MS || value > MAX_TIMEOUT_MS {
                    bail!("--timeout must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS} ms");
                }
                flags.timeout_ms = Some(value);
            }
            "--test-host" => {
                flags.test_host = Some(flag_value(&mut iter, flag)?.to_string());
            }
            "--test-port" => {
                let value: u16 = parse_flag_value(&mut iter, flag)?;
                if value == 0 {
                    bail!("--test-port must be between 1 and 65535");
                }
                flags.test_port = Some(value);
            }
            other => bail!("unknown flag '{other}'"),
        }
    }
    Ok(flags)
}

fn flag_value<'a>(iter: &mut std::slice::Iter<'a, &'a str>, flag: &str) -> Result<&'a str> {
    iter.next()
        .copied()
        .with_context(|| format!("{flag} requires a value"))
}

fn parse_flag_value<'a, T: std::str::FromStr>(
    iter: &mut std::slice::Iter<'a, &'a str>,
    flag: &str,
) -> Result<T> {
    let value = flag_value(iter, flag)?;
    value
        .parse()
        .ok()
        .with_context(|| format!("{flag}: '{value}' is not a valid number"))
}

/// Run one command against the pool; the returned string is what the host
/// program echoes back to its operator.
pub fn execute(command: ProxyCommand, pool: &mut ProxyPool) -> Result<String> {
    match command {
        ProxyCommand::Load {
            file,
            default_type,
            check,
            save,
            options,
        } => {
            let loaded = pool
                .load(&file, default_type)
                .with_context(|| format!("loading {}", file.display()))?;
            if loaded == 0 {
                return Ok(format!("no valid proxies found in {}", file.display()));
            }
            if !check {
                return Ok(format!("loaded {loaded} proxies (validation skipped)"));
            }
            let summary = validate_pool(pool, &options)?;
            if let Some(path) = save {
                pool.save_validated(&path)?;
            }
            Ok(format!(
                "loaded {loaded} proxies, {} working after validation ({} removed)",
                summary.working, summary.removed
            ))
        }
        ProxyCommand::Check { save, options } => {
            let summary = validate_pool(pool, &options)?;
            if let Some(path) = save {
                pool.save_validated(&path)?;
            }
            Ok(format!(
                "validated {} proxies: {} working, {} removed (SOCKS5={}, SOCKS4={}, HTTP={})",
                summary.total,
                summary.working,
                summary.removed,
                summary.socks5,
                summary.socks4,
                summary.http
            ))
        }
        ProxyCommand::Clear => {
            pool.clear();
            tracing::info!(target = "proxy", "proxy pool cleared");
            Ok("proxy pool cleared".to_string())
        }
        ProxyCommand::Status => Ok(status_line(pool)),
    }
}

fn status_line(pool: &ProxyPool) -> String {
    if pool.is_empty() {
        return "proxy pool is empty".to_string();
    }
    let mut line = format!("{} proxies loaded", pool.count());
    if let Some(path) = pool.source_path() {
        line.push_str(&format!(" from {}", path.display()));
    }
    if pool.default_type() != ProxyType::None {
        line.push_str(&format!(" (default type {})", pool.default_type()));
    }
    let validated = pool.validated_count();
    if validated > 0 {
        let socks5 = count_type(pool, ProxyType::Socks5);
        let socks4 = count_type(pool, ProxyType::Socks4);
        let http = count_type(pool, ProxyType::Http) + count_type(pool, ProxyType::Https);
        line.push_str(&format!(
            ", {validated} validated (SOCKS5={socks5}, SOCKS4={socks4}, HTTP={http})"
        ));
    }
    line
}

fn count_type(pool: &ProxyPool, ty: ProxyType) -> usize {
    pool.entries()
        .iter()
        .filter(|p| p.validated && p.detected_type == ty)
        .count()
}
