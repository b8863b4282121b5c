//! Batched fixes applied as one all-or-nothing transaction

use log::{debug, info, warn};
use ptassist_common::{Error, Result};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::dataset::Dataset;
use crate::edit::EditSet;
use crate::primitives::PrimitiveRef;
use crate::replace::plan_replacement;

type Planner = Arc<dyn Fn(&Dataset) -> Result<EditSet> + Send + Sync>;

#[derive(Clone)]
enum FixPlan {
    /// Planned up front; stale if an earlier fix touched the same relation
    Edits(EditSet),
    /// Planned against the batch state when the fix's turn comes
    Deferred(Planner),
}

impl fmt::Debug for FixPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixPlan::Edits(edits) => f.debug_tuple("Edits").field(edits).finish(),
            FixPlan::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// One described fix
#[derive(Debug, Clone)]
pub struct Fix {
    pub description: String,
    plan: FixPlan,
}

impl Fix {
    /// A fix applying exactly `edits`
    pub fn new(description: impl Into<String>, edits: EditSet) -> Self {
        Self {
            description: description.into(),
            plan: FixPlan::Edits(edits),
        }
    }

    /// A fix whose edits are planned from the dataset as left by the fixes before it
    pub fn planned<F>(description: impl Into<String>, planner: F) -> Self
    where
        F: Fn(&Dataset) -> Result<EditSet> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            plan: FixPlan::Deferred(Arc::new(planner)),
        }
    }

    /// Hand every membership of `old` to `new` with `role`
    pub fn replacement(old: PrimitiveRef, new: PrimitiveRef, role: &str) -> Self {
        let role = role.to_string();
        Self::planned(format!("{old} -> {new}"), move |dataset| {
            plan_replacement(dataset, old, new, &role)
        })
    }

    fn edits_for<'e>(&'e self, dataset: &Dataset) -> Result<Cow<'e, EditSet>> {
        match &self.plan {
            FixPlan::Edits(edits) => Ok(Cow::Borrowed(edits)),
            FixPlan::Deferred(planner) => planner(dataset).map(Cow::Owned),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOutcome {
    pub applied: usize,
    pub relations_changed: usize,
    /// Dataset revision after the commit
    pub revision: u64,
}

/// Ordered list of fixes run against a dataset in a single transaction
#[derive(Debug, Clone, Default)]
pub struct FixTask {
    fixes: Vec<Fix>,
}

impl FixTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fix: Fix) {
        self.fixes.push(fix);
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// Apply every fix in order and commit once.
    ///
    /// `progress` receives `(done, total, description)` before each fix. Deferred
    /// fixes see the changes of the fixes before them. Cancellation or any failing
    /// fix leaves `dataset` exactly as it was.
    pub fn run<F>(
        &self,
        dataset: &mut Dataset,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<FixOutcome>
    where
        F: FnMut(usize, usize, &str),
    {
        let total = self.fixes.len();
        let mut tx = dataset.begin();
        let mut relations_changed = 0;

        for (done, fix) in self.fixes.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Fix task cancelled after {done} of {total} fixes");
                return Err(Error::Cancelled);
            }
            progress(done, total, &fix.description);
            let edits = fix.edits_for(tx.dataset())?;
            debug!("Applying fix '{}' ({} edits)", fix.description, edits.len());
            tx.apply_edit_set(&edits)?;
            relations_changed += edits.len();
        }
        progress(total, total, "done");

        let revision = tx.commit();
        info!("Applied {total} fixes touching {relations_changed} relation(s)");
        Ok(FixOutcome {
            applied: total,
            relations_changed,
            revision,
        })
    }
}

impl FromIterator<Fix> for FixTask {
    fn from_iter<I: IntoIterator<Item = Fix>>(iter: I) -> Self {
        Self {
            fixes: iter.into_iter().collect(),
        }
    }
}
