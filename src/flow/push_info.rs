// src/flow/push_info.rs

use tracing::debug;

use crate::flow::FlowContext;
use crate::flow::buildability::is_built;
use crate::model::{Job, JobId};
use crate::types::Scope;

/// Whether a child is ready for a push, and at which scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushInfo {
    pub ready: bool,
    pub scope: Option<Scope>,
}

impl PushInfo {
    pub const NOT_READY: PushInfo = PushInfo {
        ready: false,
        scope: None,
    };

    fn ready(scope: Scope) -> Self {
        Self {
            ready: true,
            scope: Some(scope),
        }
    }
}

/// Parent readiness of `child`.
///
/// Buildability of the child itself is checked by the caller, which also
/// owns the dedup lock. Optional and disabled parents always count as built.
///
/// Without partial edges the child is ready at FULL scope once every parent
/// is built. With partial edges it is ready at FULL scope when every parent
/// is built, otherwise at PARTIAL scope when every partial parent is built,
/// unless the child already started a partial build today.
pub fn push_info(ctx: &FlowContext<'_>, child: &Job) -> PushInfo {
    let mut all: Vec<(JobId, bool)> = Vec::with_capacity(child.parents.len());
    let mut partial: Vec<(JobId, bool)> = Vec::new();

    for edge in &child.parents {
        let built = edge.scope == Scope::Optional
            || match ctx.graph.job(edge.parent) {
                Some(parent) => {
                    let status = ctx.status(edge.parent);
                    !parent.enabled
                        || is_built(parent, status.as_ref(), None, child.any_scope, ctx.now)
                }
                // A dangling edge cannot hold the child back.
                None => true,
            };

        all.push((edge.parent, built));
        if edge.scope == Scope::Partial {
            partial.push((edge.parent, built));
        }
    }

    let all_built = all.iter().all(|(_, built)| *built);

    let info = if partial.is_empty() {
        if all_built {
            PushInfo::ready(Scope::Full)
        } else {
            PushInfo::NOT_READY
        }
    } else if all_built {
        PushInfo::ready(Scope::Full)
    } else if partial.iter().all(|(_, built)| *built) && !partially_built_today(ctx, child) {
        PushInfo::ready(Scope::Partial)
    } else {
        PushInfo::NOT_READY
    };

    debug!(
        job = %child.name,
        mode = if partial.is_empty() { "full" } else { "mixed" },
        ready = info.ready,
        scope = ?info.scope,
        parents = ?all,
        partial = ?partial,
        "push info"
    );

    info
}

/// A missing status means the child has not been partially built yet.
fn partially_built_today(ctx: &FlowContext<'_>, child: &Job) -> bool {
    ctx.status(child.id).is_some_and(|status| {
        status.scope == Scope::Partial && status.date.date() == ctx.now.date()
    })
}
