//! Call sites: a fixed signature bound to a (possibly replaceable) current target.

use std::fmt;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use junction_config::targets;
use junction_signature::SignatureType;
use parking_lot::RwLock;

use crate::error::{LinkError, Result};
use crate::handle::{CallTarget, Form};
use crate::runtime::Runtime;

/// How target updates become visible to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSitePolicy {
    /// The target is fixed at construction.
    Constant,
    /// Every write is visible to every later read on any thread.
    Volatile,
    /// Writers and readers coordinate through [`CallSite::sync_all`] or their own fences
    /// before relying on cross-thread visibility.
    Mutable,
}

#[derive(Clone)]
pub struct CallSite(Arc<SiteInner>);

struct SiteInner {
    policy: CallSitePolicy,
    signature: SignatureType,
    target: RwLock<CallTarget>,
}

impl CallSite {
    pub fn constant(target: CallTarget) -> Self {
        CallSite::with_policy(CallSitePolicy::Constant, target)
    }

    pub fn volatile(target: CallTarget) -> Self {
        CallSite::with_policy(CallSitePolicy::Volatile, target)
    }

    pub fn mutable(target: CallTarget) -> Self {
        CallSite::with_policy(CallSitePolicy::Mutable, target)
    }

    pub fn with_policy(policy: CallSitePolicy, target: CallTarget) -> Self {
        CallSite(Arc::new(SiteInner {
            policy,
            signature: target.signature().clone(),
            target: RwLock::new(target),
        }))
    }

    /// A site of type `ty` whose target fails with an illegal-state error until one is
    /// installed. Constant sites cannot start unlinked.
    pub fn unlinked(
        runtime: &Arc<Runtime>,
        policy: CallSitePolicy,
        ty: &SignatureType,
    ) -> Result<Self> {
        if policy == CallSitePolicy::Constant {
            return Err(LinkError::IllegalArgument(
                "a constant call site needs its target at construction".to_string(),
            ));
        }
        let placeholder = CallTarget::build(runtime, ty.clone(), Form::Unlinked)?;
        Ok(CallSite::with_policy(policy, placeholder))
    }

    pub fn policy(&self) -> CallSitePolicy {
        self.0.policy
    }

    pub fn signature(&self) -> &SignatureType {
        &self.0.signature
    }

    pub fn target(&self) -> CallTarget {
        self.0.target.read().clone()
    }

    /// Installs `target`. Its signature must equal the site's.
    pub fn set_target(&self, target: CallTarget) -> Result<()> {
        if self.0.policy == CallSitePolicy::Constant {
            return Err(LinkError::IllegalArgument(
                "constant call sites cannot be retargeted".to_string(),
            ));
        }
        if target.signature() != &self.0.signature {
            return Err(LinkError::TypeMismatch {
                expected: self.0.signature.clone(),
                found: target.signature().clone(),
            });
        }
        tracing::debug!(
            target: targets::CALLSITE,
            policy = ?self.0.policy,
            signature = %self.0.signature,
            kind = ?target.kind(),
            "retargeting call site"
        );
        *self.0.target.write() = target;
        if self.0.policy == CallSitePolicy::Volatile {
            fence(Ordering::SeqCst);
        }
        Ok(())
    }

    /// A target of the site's type that delegates to the current target on every call.
    /// Constant sites return their target directly.
    pub fn dynamic_invoker(&self) -> Result<CallTarget> {
        if self.0.policy == CallSitePolicy::Constant {
            return Ok(self.target());
        }
        let target = self.target();
        CallTarget::build(target.runtime(), self.0.signature.clone(), Form::Site(self.clone()))
    }

    /// Publishes the current targets of `sites` to all threads.
    pub fn sync_all(sites: &[CallSite]) {
        for site in sites {
            // Re-publishing under the write lock orders earlier writes before later reads.
            let guard = site.0.target.write();
            drop(guard);
        }
        fence(Ordering::SeqCst);
        tracing::trace!(target: targets::CALLSITE, sites = sites.len(), "synchronized call sites");
    }

    pub fn ptr_eq(&self, other: &CallSite) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("policy", &self.0.policy)
            .field("signature", &self.0.signature)
            .finish_non_exhaustive()
    }
}
