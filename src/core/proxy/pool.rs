//! Ordered proxy pool with a round-robin cursor
//!
//! The pool owns its [`Proxy`] records outright: an ordered vector plus a
//! cursor index, replacing the intrusive linked list a naive port would
//! carry over. Deletions during a validation sweep are collected first and
//! applied in one pass.

use super::config::ProxyType;
use super::errors::ProxyError;
use super::parser::parse_proxy_line;
use super::Proxy;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct ProxyPool {
    entries: Vec<Proxy>,
    /// Index of the entry most recently returned by [`ProxyPool::next`]
    cursor: Option<usize>,
    source_path: Option<PathBuf>,
    default_type: ProxyType,
}

impl ProxyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pool from a list file.
    ///
    /// Unparsable lines are skipped, not fatal; comments and blank lines are
    /// ignored. Returns the number of records loaded. The source path and
    /// default type are remembered when at least one record loads.
    pub fn load(
        &mut self,
        path: impl AsRef<Path>,
        default_type: ProxyType,
    ) -> Result<usize, ProxyError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ProxyError::io(format!("open {}: {e}", path.display())))?;

        self.clear();
        self.default_type = default_type;

        let mut skipped = 0usize;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| ProxyError::io(format!("read {}: {e}", path.display())))?;
            match parse_proxy_line(&line, default_type) {
                Ok(Some(proxy)) => self.entries.push(proxy),
                Ok(None) => {}
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        target = "proxy",
                        error = %e,
                        category = e.category(),
                        "skipping unusable proxy line"
                    );
                }
            }
        }

        let loaded = self.entries.len();
        if loaded > 0 {
            self.source_path = Some(path.to_path_buf());
            tracing::info!(
                target = "proxy",
                count = loaded,
                skipped,
                path = %path.display(),
                "loaded proxy list"
            );
        } else {
            tracing::warn!(
                target = "proxy",
                skipped,
                path = %path.display(),
                "no valid proxies found"
            );
        }
        Ok(loaded)
    }

    /// Drop every entry and reset the cursor. The remembered source path is
    /// kept so a later `check` can still describe where the pool came from.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// Append one record. Fresh records are usable immediately; a sweep will
    /// judge them like any other entry.
    pub fn push(&mut self, proxy: Proxy) {
        self.entries.push(proxy);
    }

    /// Advance the round-robin cursor and return the next usable entry,
    /// wrapping at the tail.
    ///
    /// Usability policy: entries never judged by a sweep are served as-is;
    /// once validated, an entry must also be active. Returns `None` when no
    /// usable entry exists.
    pub fn next(&mut self) -> Option<&Proxy> {
        let len = self.entries.len();
        if len == 0 {
            return None;
        }
        let start = self.cursor.map_or(0, |c| (c + 1) % len);
        for step in 0..len {
            let idx = (start + step) % len;
            if self.entries[idx].usable() {
                self.cursor = Some(idx);
                return Some(&self.entries[idx]);
            }
        }
        None
    }

    /// Mark the entry the cursor points at (the one last returned by
    /// [`ProxyPool::next`]) as inactive. Only meaningful for validated
    /// entries: an unvalidated entry stays usable until a sweep judges it.
    pub fn mark_current_inactive(&mut self) {
        if let Some(idx) = self.cursor {
            if let Some(p) = self.entries.get_mut(idx) {
                p.is_active = false;
                tracing::info!(
                    target = "proxy",
                    proxy = %p.sanitized_endpoint(),
                    "proxy marked inactive"
                );
            }
        }
    }

    /// Unlink one entry. The cursor keeps aiming at the removed entry's
    /// successor (wrapping at the tail).
    pub fn remove_at(&mut self, index: usize) -> Option<Proxy> {
        if index >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(index);
        match self.cursor {
            Some(c) if c > index => self.cursor = Some(c - 1),
            Some(c) if c == index => {
                if self.entries.is_empty() {
                    self.cursor = None;
                } else if index == 0 {
                    // next() advances past the tail and wraps to the head,
                    // which is the removed entry's successor.
                    self.cursor = Some(self.entries.len() - 1);
                } else {
                    self.cursor = Some(index - 1);
                }
            }
            _ => {}
        }
        Some(removed)
    }

    /// Remove every entry a sweep left unvalidated. Returns how many were
    /// dropped.
    pub fn remove_unvalidated(&mut self) -> usize {
        let mut removed = 0;
        for index in (0..self.entries.len()).rev() {
            if !self.entries[index].validated {
                self.remove_at(index);
                removed += 1;
            }
        }
        removed
    }

    /// Write the pool in canonical form, one proxy per line, scheme taken
    /// from each entry's detected type. Returns the number written.
    pub fn save_validated(&self, path: impl AsRef<Path>) -> Result<usize, ProxyError> {
        let path = path.as_ref();
        let mut file = File::create(path)
            .map_err(|e| ProxyError::io(format!("create {}: {e}", path.display())))?;
        for proxy in &self.entries {
            writeln!(file, "{}", proxy.canonical_line())
                .map_err(|e| ProxyError::io(format!("write {}: {e}", path.display())))?;
        }
        tracing::info!(
            target = "proxy",
            count = self.entries.len(),
            path = %path.display(),
            "saved validated proxies"
        );
        Ok(self.entries.len())
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Proxy] {
        &self.entries
    }

    /// Path of the most recently loaded list file
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Default type applied by the most recent load
    pub fn default_type(&self) -> ProxyType {
        self.default_type
    }

    pub fn validated_count(&self) -> usize {
        self.entries.iter().filter(|p| p.validated).count()
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [Proxy] {
        &mut self.entries
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut Proxy> {
        self.entries.get_mut(index)
    }
}
