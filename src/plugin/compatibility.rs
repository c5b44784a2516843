//! Version Compatibility Checker
//!
//! Matches plugin dependency constraints against discovered versions and
//! orders enabled plugins so dependencies come first. Dependency problems
//! are reported, not enforced: the host decides what to do with them.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::error::{PluginError, PluginResult};
use super::metadata::{PluginMeta, CORE_DEPENDENCY};

/// Version of the host core, compared against `core` dependency constraints
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Dependency problem found for one plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencyIssue {
    Missing { plugin: String, dependency: String, constraint: String },
    VersionMismatch { plugin: String, dependency: String, constraint: String, found: String },
    InvalidConstraint { plugin: String, dependency: String, constraint: String },
}

impl fmt::Display for DependencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyIssue::Missing { plugin, dependency, constraint } => write!(
                f, "'{}' requires '{}' {} which is not available", plugin, dependency, constraint
            ),
            DependencyIssue::VersionMismatch { plugin, dependency, constraint, found } => write!(
                f, "'{}' requires '{}' {} but found {}", plugin, dependency, constraint, found
            ),
            DependencyIssue::InvalidConstraint { plugin, dependency, constraint } => write!(
                f, "'{}' declares an unreadable constraint '{}' for '{}'", plugin, constraint, dependency
            ),
        }
    }
}

/// Checker for plugin dependency constraints
pub struct DependencyChecker {
    core_version: String,
}

impl DependencyChecker {
    pub fn new<S: Into<String>>(core_version: S) -> Self {
        Self { core_version: core_version.into() }
    }

    /// Problems with `meta`'s dependencies given the plugins in `available`
    pub fn check(&self, meta: &PluginMeta, available: &BTreeMap<String, PluginMeta>) -> Vec<DependencyIssue> {
        let mut issues = Vec::new();

        for (dependency, constraint) in &meta.dependencies {
            let found = if dependency == CORE_DEPENDENCY {
                Some(self.core_version.as_str())
            } else {
                available.get(dependency).map(|m| m.version.as_str())
            };

            let issue = match found {
                None => Some(DependencyIssue::Missing {
                    plugin: meta.id.clone(),
                    dependency: dependency.clone(),
                    constraint: constraint.clone(),
                }),
                Some(version) => match version_matches(constraint, version) {
                    Some(true) => None,
                    Some(false) => Some(DependencyIssue::VersionMismatch {
                        plugin: meta.id.clone(),
                        dependency: dependency.clone(),
                        constraint: constraint.clone(),
                        found: version.to_string(),
                    }),
                    None => Some(DependencyIssue::InvalidConstraint {
                        plugin: meta.id.clone(),
                        dependency: dependency.clone(),
                        constraint: constraint.clone(),
                    }),
                },
            };
            issues.extend(issue);
        }

        issues
    }

    /// Order `enabled` so each plugin follows the enabled plugins it depends on
    ///
    /// Otherwise the given order is kept. Ids without metadata keep their
    /// position relative to their neighbours. A dependency cycle is an error.
    pub fn boot_order(&self, enabled: &[String], metas: &BTreeMap<String, PluginMeta>) -> PluginResult<Vec<String>> {
        let wanted: HashSet<&str> = enabled.iter().map(String::as_str).collect();
        let mut order = Vec::with_capacity(enabled.len());
        let mut state: HashMap<&str, Visit> = HashMap::new();

        for id in enabled {
            self.visit(id, &wanted, metas, &mut state, &mut order, &mut Vec::new())?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &self,
        id: &'a str,
        wanted: &HashSet<&'a str>,
        metas: &'a BTreeMap<String, PluginMeta>,
        state: &mut HashMap<&'a str, Visit>,
        order: &mut Vec<String>,
        path: &mut Vec<&'a str>,
    ) -> PluginResult<()> {
        match state.get(id) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::InProgress) => {
                path.push(id);
                return Err(PluginError::dependency_error(format!(
                    "Circular dependency detected: {}", path.join(" -> ")
                )));
            }
            None => {}
        }

        state.insert(id, Visit::InProgress);
        path.push(id);

        if let Some(meta) = metas.get(id) {
            for (dependency, _) in meta.plugin_dependencies() {
                if wanted.contains(dependency.as_str()) {
                    self.visit(dependency, wanted, metas, state, order, path)?;
                }
            }
        }

        path.pop();
        state.insert(id, Visit::Done);
        order.push(id.to_string());
        Ok(())
    }
}

impl Default for DependencyChecker {
    fn default() -> Self {
        Self::new(CORE_VERSION)
    }
}

#[derive(Clone, Copy)]
enum Visit {
    InProgress,
    Done,
}

/// Check a version against a constraint
///
/// Returns `None` when the version or the constraint cannot be read. An
/// unreadable alternative only matters when no other alternative matches.
pub fn version_matches(constraint: &str, version: &str) -> Option<bool> {
    let version = parse_version(version)?;

    let mut alternatives = constraint.split('|').map(str::trim).filter(|s| !s.is_empty()).peekable();
    alternatives.peek()?;

    let mut unreadable = false;
    for alternative in alternatives {
        match matches_one(alternative, &version) {
            Some(true) => return Some(true),
            Some(false) => {}
            None => unreadable = true,
        }
    }
    (!unreadable).then_some(false)
}

fn matches_one(constraint: &str, version: &[u64]) -> Option<bool> {
    if constraint == "*" {
        return Some(true);
    }

    // Space separated terms must all hold: ">=1.0 <2.0"
    let terms: Vec<&str> = constraint.split_whitespace().collect();
    if terms.len() > 1 {
        let mut all = true;
        for term in terms {
            all &= matches_one(term, version)?;
        }
        return Some(all);
    }

    if let Some(req) = constraint.strip_prefix('^') {
        let given = req.trim().trim_start_matches('v').split(['-', '+']).next()?.split('.').count();
        let req = parse_version(req)?;
        // The leftmost non-zero component may not change: ^1.2 < 2.0.0, ^0.1 < 0.2.0
        let pinned = req[..given].iter().position(|&part| part != 0).unwrap_or(given - 1);
        let mut upper = vec![0; 3];
        upper[..pinned].copy_from_slice(&req[..pinned]);
        upper[pinned] = req[pinned] + 1;
        return Some(compare(version, &req) != Ordering::Less && compare(version, &upper) == Ordering::Less);
    }
    if let Some(req) = constraint.strip_prefix('~') {
        let req = parse_version(req)?;
        return Some(version[0] == req[0] && version[1] == req[1] && compare(version, &req) != Ordering::Less);
    }

    let operators: [(&str, fn(Ordering) -> bool); 5] = [
        (">=", |o| o != Ordering::Less),
        ("<=", |o| o != Ordering::Greater),
        (">", |o| o == Ordering::Greater),
        ("<", |o| o == Ordering::Less),
        ("=", |o| o == Ordering::Equal),
    ];
    for (prefix, accept) in operators {
        if let Some(req) = constraint.strip_prefix(prefix) {
            let req = parse_version(req.trim())?;
            return Some(accept(compare(version, &req)));
        }
    }

    let req = parse_version(constraint)?;
    Some(compare(version, &req) == Ordering::Equal)
}

/// `major[.minor[.patch]]`, optional leading `v`, pre-release suffix ignored
fn parse_version(text: &str) -> Option<Vec<u64>> {
    let text = text.trim().trim_start_matches('v');
    let core = text.split(['-', '+']).next()?;
    let mut parts: Vec<u64> = core
        .split('.')
        .map(|p| p.parse().ok())
        .collect::<Option<Vec<u64>>>()?;
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    parts.resize(3, 0);
    Some(parts)
}

fn compare(a: &[u64], b: &[u64]) -> Ordering {
    a.iter().cmp(b.iter())
}
