//! The substitution registry and its two-state lifecycle.

use crate::capability::{CapabilitySnapshot, Feature, LayoutOffset, VmEra};
use crate::error::{ApplyError, RegistryError};
use crate::key::MethodKey;
use crate::rule::RewriteRule;
use graft_ir::{GraphBuilderContext, NodeId};
use log::{debug, info, trace, warn};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Predicate over the capability snapshot deciding whether a registration takes
/// effect. Evaluated exactly once, when the registry is sealed.
#[derive(Clone)]
pub enum Guard {
    Always,
    Feature(Feature),
    /// The layout defines the given optional offset.
    LayoutOffset(LayoutOffset),
    Era(VmEra),
    Not(Box<Guard>),
    All(Vec<Guard>),
    Any(Vec<Guard>),
    Custom(Arc<dyn Fn(&CapabilitySnapshot) -> bool + Send + Sync>),
}

impl Guard {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&CapabilitySnapshot) -> bool + Send + Sync + 'static,
    {
        Guard::Custom(Arc::new(f))
    }

    pub fn not(guard: Guard) -> Self {
        Guard::Not(Box::new(guard))
    }

    pub fn evaluate(&self, caps: &CapabilitySnapshot) -> bool {
        match self {
            Guard::Always => true,
            Guard::Feature(feature) => caps.has_feature(*feature),
            Guard::LayoutOffset(which) => caps.layout().offset(*which).is_some(),
            Guard::Era(era) => caps.vm_era() == *era,
            Guard::Not(inner) => !inner.evaluate(caps),
            Guard::All(guards) => guards.iter().all(|g| g.evaluate(caps)),
            Guard::Any(guards) => guards.iter().any(|g| g.evaluate(caps)),
            Guard::Custom(f) => f(caps),
        }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Always => f.write_str("Always"),
            Guard::Feature(feature) => write!(f, "Feature({feature})"),
            Guard::LayoutOffset(which) => write!(f, "LayoutOffset({which})"),
            Guard::Era(era) => write!(f, "Era({era})"),
            Guard::Not(inner) => write!(f, "Not({inner:?})"),
            Guard::All(guards) => f.debug_tuple("All").field(guards).finish(),
            Guard::Any(guards) => f.debug_tuple("Any").field(guards).finish(),
            Guard::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One pending entry: a key, the rule to install, and when to install it.
#[derive(Debug, Clone)]
pub struct Registration {
    pub key: MethodKey,
    pub rule: RewriteRule,
    pub guard: Guard,
    /// The registration is expected to replace an earlier one for the same key.
    pub allow_overwrite: bool,
    /// Name of the pass that produced the registration, for logs and dumps.
    pub origin: &'static str,
}

impl Registration {
    pub fn new(key: MethodKey, rule: impl Into<RewriteRule>) -> Self {
        Registration {
            key,
            rule: rule.into(),
            guard: Guard::Always,
            allow_overwrite: false,
            origin: "host",
        }
    }

    pub fn guarded(mut self, guard: Guard) -> Self {
        self.guard = guard;
        self
    }

    pub fn allow_overwrite(mut self) -> Self {
        self.allow_overwrite = true;
        self
    }

    pub fn origin(mut self, origin: &'static str) -> Self {
        self.origin = origin;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Open,
    Sealed,
}

/// Counters collected while sealing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SealStats {
    pub registrations: usize,
    pub installed: usize,
    pub guarded_out: usize,
    pub overwrites: usize,
    /// Overwrites by registrations that did not declare `allow_overwrite`.
    pub unflagged_overwrites: usize,
}

/// An installed rule together with where it came from.
#[derive(Debug, Clone)]
pub struct Entry {
    pub rule: RewriteRule,
    pub origin: &'static str,
}

/// Maps method keys to rewrite rules.
///
/// Registrations are queued while the registry is [`Open`](RegistryState::Open).
/// [`seal`](Registry::seal) evaluates every guard once, in registration order, and
/// installs the survivors with last-write-wins semantics. A sealed registry is
/// immutable, so it can be shared across compiler threads behind an `Arc` without
/// locking.
pub struct Registry {
    caps: Arc<CapabilitySnapshot>,
    state: RegistryState,
    pending: Vec<Registration>,
    entries: FxHashMap<MethodKey, Entry>,
    stats: SealStats,
}

impl Registry {
    pub fn new(caps: Arc<CapabilitySnapshot>) -> Self {
        Registry {
            caps,
            state: RegistryState::Open,
            pending: Vec::new(),
            entries: FxHashMap::default(),
            stats: SealStats::default(),
        }
    }

    pub fn capabilities(&self) -> &Arc<CapabilitySnapshot> {
        &self.caps
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    pub fn is_sealed(&self) -> bool {
        self.state == RegistryState::Sealed
    }

    /// Queues a registration.
    ///
    /// Native stub rules must call a stub at exactly the address the capability
    /// snapshot reports for it.
    pub fn register(&mut self, registration: Registration) -> Result<(), RegistryError> {
        if self.is_sealed() {
            return Err(RegistryError::Sealed {
                key: registration.key,
            });
        }
        let count = registration.key.argument_count();
        if let Some(index) = registration.rule.max_arg_index().filter(|i| *i >= count) {
            return Err(RegistryError::ArgumentOutOfRange {
                key: registration.key,
                index,
                count,
            });
        }
        if let Some(call) = registration.rule.as_native_stub() {
            if self.caps.stub_address(call.stub()) != Some(call.address()) {
                return Err(RegistryError::UnverifiedStub {
                    key: registration.key,
                    stub: call.stub(),
                    address: call.address(),
                });
            }
        }
        debug!(
            "queued {} -> {} ({})",
            registration.key,
            registration.rule.variant_name(),
            registration.origin
        );
        self.pending.push(registration);
        Ok(())
    }

    /// Number of registrations waiting for [`seal`](Registry::seal).
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Evaluates guards and installs the surviving registrations. Allowed once.
    pub fn seal(&mut self) -> Result<SealStats, RegistryError> {
        if self.is_sealed() {
            return Err(RegistryError::AlreadySealed);
        }

        let mut stats = SealStats {
            registrations: self.pending.len(),
            ..SealStats::default()
        };
        for registration in self.pending.drain(..) {
            if !registration.guard.evaluate(&self.caps) {
                debug!("guard rejected {} ({})", registration.key, registration.origin);
                stats.guarded_out += 1;
                continue;
            }

            let entry = Entry {
                rule: registration.rule,
                origin: registration.origin,
            };
            if let Some(previous) = self.entries.insert(registration.key.clone(), entry) {
                stats.overwrites += 1;
                if registration.allow_overwrite {
                    debug!(
                        "{} from {} replaces the rule from {}",
                        registration.key, registration.origin, previous.origin
                    );
                } else {
                    stats.unflagged_overwrites += 1;
                    warn!(
                        "{} from {} silently replaces the rule from {}",
                        registration.key, registration.origin, previous.origin
                    );
                }
            }
        }
        stats.installed = self.entries.len();
        self.pending = Vec::new();
        self.state = RegistryState::Sealed;
        self.stats = stats;

        info!(
            "sealed intrinsic registry: {} entries from {} registrations ({} guarded out, {} overwritten)",
            stats.installed, stats.registrations, stats.guarded_out, stats.overwrites
        );
        Ok(stats)
    }

    pub fn stats(&self) -> SealStats {
        self.stats
    }

    /// Exact-match lookup. Always misses while the registry is open.
    pub fn lookup(&self, key: &MethodKey) -> Option<&RewriteRule> {
        if !self.is_sealed() {
            return None;
        }
        let entry = self.entries.get(key)?;
        trace!("intrinsic hit for {key}");
        Some(&entry.rule)
    }

    pub fn entry(&self, key: &MethodKey) -> Option<&Entry> {
        if !self.is_sealed() {
            return None;
        }
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Installed entries sorted by key.
    pub fn entries(&self) -> Vec<(&MethodKey, &Entry)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// One line per installed entry, sorted by key.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (key, entry) in self.entries() {
            out.push_str(&format!("{key} => {}\n", entry.rule));
        }
        out
    }

    /// Replaces the call to `key` at the builder's current call site if a rule is
    /// registered for it.
    ///
    /// Returns `Ok(false)` on a miss or when the rule declines, in which case the
    /// translator emits the generic invoke.
    pub fn try_apply(
        &self,
        b: &mut dyn GraphBuilderContext,
        key: &MethodKey,
        args: &[NodeId],
    ) -> Result<bool, ApplyError> {
        if !self.is_sealed() {
            return Err(ApplyError::RegistryOpen { key: key.clone() });
        }
        let Some(rule) = self.lookup(key) else {
            return Ok(false);
        };
        if rule.is_inline_only() && !b.is_inlining() {
            return Err(ApplyError::InlineOnly { key: key.clone() });
        }
        let expected = key.argument_count();
        if args.len() != expected {
            return Err(ApplyError::ArgumentCount {
                key: key.clone(),
                expected,
                found: args.len(),
            });
        }
        Ok(rule.apply(b, args))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}
