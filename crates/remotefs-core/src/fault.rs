// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fault injection for test sessions
//!
//! A [`FaultPolicy`] names primitive session calls that should fail and how.
//! Sessions built for testing consult a shared [`FaultInjector`] before each
//! call, which lets tests cut the connection in the middle of a write or make
//! a listing fail without a real server.

use std::io;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Primitive session calls that can be made to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultOp {
    Stat,
    OpenRead,
    OpenWrite,
    /// A chunk read from an open read handle
    Read,
    /// A chunk written to an open write handle
    Write,
    List,
    Mkdir,
    Delete,
    Rename,
}

/// Kind of synthetic failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultErrno {
    Eio,
    Disconnected,
    PermissionDenied,
}

impl FaultErrno {
    fn to_error(self) -> SessionError {
        match self {
            FaultErrno::Eio => SessionError::Io(io::Error::new(io::ErrorKind::Other, "injected I/O error")),
            FaultErrno::Disconnected => SessionError::Disconnected("injected disconnect".into()),
            FaultErrno::PermissionDenied => SessionError::PermissionDenied,
        }
    }
}

/// Which call should fail and how often
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FaultRule {
    pub op: FaultOp,
    pub errno: FaultErrno,
    /// Number of leading invocations to let through before failing
    #[serde(default)]
    pub start_after: u64,
    /// Maximum number of injected failures for this rule
    #[serde(default)]
    pub max_faults: Option<u64>,
}

impl Default for FaultRule {
    fn default() -> Self {
        Self {
            op: FaultOp::Write,
            errno: FaultErrno::Eio,
            start_after: 0,
            max_faults: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct FaultPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<FaultRule>,
}

impl FaultPolicy {
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Policy failing `op` every time with `errno`
    pub fn always(op: FaultOp, errno: FaultErrno) -> Self {
        Self {
            enabled: true,
            rules: vec![FaultRule {
                op,
                errno,
                ..FaultRule::default()
            }],
        }
    }
}

#[derive(Clone, Debug, Default)]
struct RuleCounters {
    hits: u64,
    invocations: u64,
}

#[derive(Clone, Debug, Default)]
struct FaultState {
    policy: FaultPolicy,
    counters: Vec<RuleCounters>,
}

/// Runtime controller that tracks the active policy and hit counts
#[derive(Debug, Default)]
pub struct FaultInjector {
    state: Mutex<FaultState>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FaultState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> FaultPolicy {
        self.state().policy.clone()
    }

    pub fn set_policy(&self, policy: FaultPolicy) {
        let mut guard = self.state();
        guard.counters = vec![RuleCounters::default(); policy.rules.len()];
        guard.policy = policy;
    }

    pub fn clear(&self) {
        self.set_policy(FaultPolicy::default());
    }

    /// Error to report for this invocation of `op`, if any
    pub fn should_fault(&self, op: FaultOp) -> Option<SessionError> {
        let mut guard = self.state();
        if !guard.policy.enabled {
            return None;
        }
        let FaultState { policy, counters } = &mut *guard;
        if counters.len() < policy.rules.len() {
            counters.resize(policy.rules.len(), RuleCounters::default());
        }
        for (rule, counter) in policy.rules.iter().zip(counters.iter_mut()) {
            if rule.op != op {
                continue;
            }
            counter.invocations = counter.invocations.saturating_add(1);
            if counter.invocations <= rule.start_after {
                continue;
            }
            if let Some(max) = rule.max_faults {
                if counter.hits >= max {
                    continue;
                }
            }
            counter.hits = counter.hits.saturating_add(1);
            tracing::trace!(?op, errno = ?rule.errno, "injecting fault");
            return Some(rule.errno.to_error());
        }
        None
    }

    /// `Err` when a fault is due for `op`
    pub fn check(&self, op: FaultOp) -> Result<(), SessionError> {
        match self.should_fault(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
