//! Breakpoint registry
//!
//! Breakpoints are owned by their stable source location. The id delve
//! assigns is only attached while the breakpoint is confirmed and is never
//! carried across sessions: a new debugger process hands out new ids.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// Stable identity of a breakpoint: `file:line`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BreakpointKey {
    pub file: PathBuf,
    pub line: u32,
}

impl BreakpointKey {
    pub fn new(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Parse a location string like "main.go:42"
    ///
    /// Careful with Windows paths like "C:\src\main.go:10": the line number
    /// is whatever follows the last ':'.
    pub fn parse(s: &str) -> Result<Self> {
        let (file, line) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidLocation(format!("expected FILE:LINE, got '{}'", s)))?;

        if file.is_empty() {
            return Err(Error::InvalidLocation(format!("missing file in '{}'", s)));
        }
        let line: u32 = line
            .parse()
            .map_err(|_| Error::InvalidLocation(format!("invalid line number: {}", line)))?;
        if line == 0 {
            return Err(Error::InvalidLocation("line numbers start at 1".to_string()));
        }

        Ok(Self::new(file, line))
    }

    /// Make the file absolute relative to `cwd`
    pub fn absolutize(self, cwd: &Path) -> Self {
        if self.file.is_absolute() {
            self
        } else {
            Self::new(cwd.join(&self.file), self.line)
        }
    }
}

impl fmt::Display for BreakpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A breakpoint the user asked for
#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoint {
    /// Server-assigned id, set only while confirmed
    pub id: Option<i64>,
    pub file: PathBuf,
    /// 1-based
    pub line: u32,
    /// Source line text, for display only
    pub source_text: Option<String>,
    /// Editor buffer the breakpoint was placed from, for display only
    pub buffer: Option<u64>,
}

impl Breakpoint {
    pub fn new(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            id: None,
            file: file.into(),
            line,
            source_text: None,
            buffer: None,
        }
    }

    pub fn key(&self) -> BreakpointKey {
        BreakpointKey::new(self.file.clone(), self.line)
    }

    pub fn is_confirmed(&self) -> bool {
        self.id.is_some()
    }
}

/// Pending and confirmed breakpoints, keyed by location
///
/// A key lives in at most one of the two maps. Every operation is total;
/// the controller enforces protocol preconditions.
#[derive(Debug, Default)]
pub struct BreakpointRegistry {
    /// Requested while no halted session existed; no server id
    pending: BTreeMap<BreakpointKey, Breakpoint>,
    /// Registered with the server; always carry an id
    confirmed: BTreeMap<BreakpointKey, Breakpoint>,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a breakpoint that has no server id yet
    pub fn add_pending(&mut self, mut bp: Breakpoint) {
        bp.id = None;
        let key = bp.key();
        self.confirmed.remove(&key);
        self.pending.insert(key, bp);
    }

    /// Store a breakpoint the server registered under `id`
    pub fn add_confirmed(&mut self, mut bp: Breakpoint, id: i64) {
        bp.id = Some(id);
        let key = bp.key();
        self.pending.remove(&key);
        self.confirmed.insert(key, bp);
    }

    /// Move a pending breakpoint to confirmed under `id`
    ///
    /// Returns false if `key` was not pending.
    pub fn promote(&mut self, key: &BreakpointKey, id: i64) -> bool {
        match self.pending.remove(key) {
            Some(bp) => {
                self.add_confirmed(bp, id);
                true
            }
            None => false,
        }
    }

    /// Move every confirmed breakpoint back to pending, dropping its id
    pub fn demote_all(&mut self) {
        let confirmed = std::mem::take(&mut self.confirmed);
        for (_, bp) in confirmed {
            self.add_pending(bp);
        }
    }

    /// Remove `key` from whichever map holds it
    pub fn remove(&mut self, key: &BreakpointKey) -> Option<Breakpoint> {
        self.confirmed
            .remove(key)
            .or_else(|| self.pending.remove(key))
    }

    pub fn lookup_confirmed(&self, key: &BreakpointKey) -> Option<&Breakpoint> {
        self.confirmed.get(key)
    }

    pub fn lookup_pending(&self, key: &BreakpointKey) -> Option<&Breakpoint> {
        self.pending.get(key)
    }

    pub fn is_pending(&self, key: &BreakpointKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn is_confirmed(&self, key: &BreakpointKey) -> bool {
        self.confirmed.contains_key(key)
    }

    /// Snapshot of pending breakpoints, in location order
    pub fn pending(&self) -> Vec<Breakpoint> {
        self.pending.values().cloned().collect()
    }

    /// Snapshot of confirmed breakpoints, in location order
    pub fn confirmed(&self) -> Vec<Breakpoint> {
        self.confirmed.values().cloned().collect()
    }

    /// Pending breakpoints followed by confirmed ones
    pub fn all_pending_and_confirmed(&self) -> Vec<Breakpoint> {
        self.pending
            .values()
            .chain(self.confirmed.values())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.confirmed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
