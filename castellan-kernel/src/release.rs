//! Release tracking. Every resolution which creates something requiring cleanup produces a
//! [Burden], which owns the burdens of dependencies created for it. A [ReleasePolicy] decides which
//! burdens are remembered, so they can later be released explicitly or when the kernel is disposed.

use crate::component::InstancePtr;
use crate::handler::HandlerPtr;
use dashmap::DashMap;
use derivative::Derivative;
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

pub type BurdenPtr = Arc<Burden>;

/// Ownership record of a resolved instance.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Burden {
    #[derivative(Debug = "ignore")]
    instance: InstancePtr,
    #[derivative(Debug = "ignore")]
    handler: HandlerPtr,
    requires_decommission: bool,
    children: Vec<BurdenPtr>,
}

impl Burden {
    pub fn new(
        instance: InstancePtr,
        handler: HandlerPtr,
        requires_decommission: bool,
        children: Vec<BurdenPtr>,
    ) -> Self {
        Self {
            instance,
            handler,
            requires_decommission,
            children,
        }
    }

    #[inline]
    pub fn instance(&self) -> &InstancePtr {
        &self.instance
    }

    #[inline]
    pub fn handler(&self) -> &HandlerPtr {
        &self.handler
    }

    #[inline]
    pub fn children(&self) -> &[BurdenPtr] {
        &self.children
    }

    #[inline]
    pub fn requires_decommission(&self) -> bool {
        self.requires_decommission
    }

    /// Checks if this burden or any of its children needs to be released.
    pub fn requires_policy_release(&self) -> bool {
        self.requires_decommission
            || self
                .children
                .iter()
                .any(|child| child.requires_policy_release())
    }

    /// Checks if the instance should be released together with the component which required it.
    #[inline]
    pub fn releases_with_owner(&self) -> bool {
        self.handler.releases_with_owner()
    }

    #[inline]
    pub fn address(&self) -> usize {
        crate::component::instance_address(&self.instance)
    }

    /// Releases the instance through its handler. When the handler lets it go, all children are
    /// released through given policy. Returns whether the instance was let go.
    pub fn release(&self, policy: &dyn ReleasePolicy) -> bool {
        if !self.handler.release(&self.instance) {
            return false;
        }

        for child in &self.children {
            policy.release(child.address());
        }

        true
    }
}

/// Remembers burdens which need to be released later. Instances are identified by their address,
/// as returned by [instance_address](crate::component::instance_address).
#[cfg_attr(test, automock)]
pub trait ReleasePolicy: Send + Sync {
    /// Starts tracking given burden.
    fn track(&self, burden: BurdenPtr);

    /// Checks if an instance with given address is tracked.
    fn has_track(&self, address: usize) -> bool;

    /// Releases a tracked instance. Does nothing for unknown instances.
    fn release(&self, address: usize);

    /// Releases all tracked instances.
    fn dispose(&self);
}

pub type ReleasePolicyPtr = Arc<dyn ReleasePolicy>;

/// Tracks all burdens requiring release, and releases them in reverse order of tracking on
/// disposal.
#[derive(Default, Debug)]
pub struct LifecycledComponentsReleasePolicy {
    burdens: DashMap<usize, (u64, BurdenPtr)>,
    sequence: AtomicU64,
}

impl LifecycledComponentsReleasePolicy {
    #[inline]
    pub fn len(&self) -> usize {
        self.burdens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.burdens.is_empty()
    }
}

impl ReleasePolicy for LifecycledComponentsReleasePolicy {
    fn track(&self, burden: BurdenPtr) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        trace!(address = burden.address(), sequence, "Tracking burden.");
        self.burdens.insert(burden.address(), (sequence, burden));
    }

    fn has_track(&self, address: usize) -> bool {
        self.burdens.contains_key(&address)
    }

    fn release(&self, address: usize) {
        // the entry is gone before releasing, so re-entrant releases of the same address are no-ops
        if let Some((_, (_, burden))) = self.burdens.remove(&address) {
            burden.release(self);
        }
    }

    fn dispose(&self) {
        let addresses = self
            .burdens
            .iter()
            .map(|entry| (*entry.key(), entry.value().0))
            .sorted_by_key(|(_, sequence)| Reverse(*sequence))
            .map(|(address, _)| address)
            .collect_vec();

        debug!(count = addresses.len(), "Releasing tracked burdens.");

        for address in addresses {
            self.release(address);
        }
    }
}

/// Never tracks anything. Instances are only cleaned up when released explicitly by a lifestyle
/// which owns them.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoTrackingReleasePolicy;

impl ReleasePolicy for NoTrackingReleasePolicy {
    fn track(&self, _burden: BurdenPtr) {}

    fn has_track(&self, _address: usize) -> bool {
        false
    }

    fn release(&self, _address: usize) {}

    fn dispose(&self) {}
}
