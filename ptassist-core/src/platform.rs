//! Stop position to platform transfer
//!
//! Moves the details of a `public_transport=stop_position` node onto a platform
//! node: the platform receives the stop's tags plus the platform tagging for the
//! stop's kind, every route membership of the stop is handed to the platform, and
//! the stop position is left untagged.

use log::info;
use ptassist_common::{Error, Result};
use serde::Serialize;

use crate::dataset::Transaction;
use crate::edit::EditSet;
use crate::primitives::{Node, PrimitiveRef, Tags};
use crate::replace::plan_replacement;
use crate::store::GraphStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StopKind {
    Railway,
    Highway,
}

impl StopKind {
    /// Tags written over the transferred ones
    fn platform_overrides(&self) -> [(&'static str, &'static str); 3] {
        match self {
            StopKind::Railway => [
                ("tram", "yes"),
                ("railway", "tram_stop"),
                ("public_transport", "platform"),
            ],
            StopKind::Highway => [
                ("bus", "yes"),
                ("highway", "bus_stop"),
                ("public_transport", "platform"),
            ],
        }
    }
}

/// Kind of a stop position node; `None` if it is not a railway or highway stop position
pub fn stop_kind(node: &Node) -> Option<StopKind> {
    if node.tag("public_transport") != Some("stop_position") {
        return None;
    }
    if node.has_tag("railway") {
        Some(StopKind::Railway)
    } else if node.has_tag("highway") {
        Some(StopKind::Highway)
    } else {
        None
    }
}

/// Planned transfer; nothing is changed until [`apply`](Self::apply)
#[derive(Debug, Clone, Serialize)]
pub struct PlatformTransfer {
    pub stop_position: i64,
    pub platform: i64,
    pub kind: StopKind,
    /// Complete tag set the platform ends up with
    pub platform_tags: Tags,
    pub memberships: EditSet,
}

impl PlatformTransfer {
    /// Stage the transfer in `tx`. Committing is up to the caller.
    pub fn apply(&self, tx: &mut Transaction<'_>) -> Result<()> {
        tx.set_tags(PrimitiveRef::node(self.platform), self.platform_tags.clone())?;
        tx.apply_edit_set(&self.memberships)?;
        tx.set_tags(PrimitiveRef::node(self.stop_position), Tags::new())?;
        info!(
            "Transferred stop position {} to platform {} ({} relation(s))",
            self.stop_position,
            self.platform,
            self.memberships.len()
        );
        Ok(())
    }
}

/// Plan moving stop position `stop_position` onto node `platform`, giving the
/// platform `role` in every relation the stop belonged to.
pub fn plan_platform_transfer<S: GraphStore + ?Sized>(
    store: &S,
    stop_position: i64,
    platform: i64,
    role: &str,
) -> Result<PlatformTransfer> {
    if stop_position == platform {
        return Err(Error::InvalidInput(format!(
            "stop position and platform are the same node {stop_position}"
        )));
    }

    let stop = store
        .node(stop_position)
        .ok_or_else(|| Error::PrimitiveNotFound(PrimitiveRef::node(stop_position).to_string()))?;
    let target = store
        .node(platform)
        .ok_or_else(|| Error::PrimitiveNotFound(PrimitiveRef::node(platform).to_string()))?;
    let kind = stop_kind(stop).ok_or(Error::NotAStopPosition(stop_position))?;

    let mut platform_tags = target.tags.clone();
    platform_tags.extend(stop.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    for (key, value) in kind.platform_overrides() {
        platform_tags.insert(key.to_string(), value.to_string());
    }

    let memberships = plan_replacement(
        store,
        PrimitiveRef::node(stop_position),
        PrimitiveRef::node(platform),
        role,
    )?;

    Ok(PlatformTransfer {
        stop_position,
        platform,
        kind,
        platform_tags,
        memberships,
    })
}
