use crate::binder::CreatorKind;
use crate::errors::{BindError, Result};
use crate::introspect::{CreatorCandidate, CreatorMode};
use crate::types::TypeDescriptor;
use tracing::{debug, trace};

/// Pick the shape of every usable creator candidate.
///
/// Hidden candidates that are not explicitly marked are ignored. A single
/// unnamed scalar argument becomes a scalar creator; any other single unnamed
/// argument is delegating only when explicitly marked. Creators with more
/// arguments are property-based and need a name or injection id for each.
pub(crate) fn adopt<'m>(
    ty: &TypeDescriptor,
    candidates: &'m [CreatorCandidate],
) -> Result<Vec<(CreatorKind, &'m CreatorCandidate)>> {
    let mut adopted = Vec::new();
    for candidate in candidates {
        if !candidate.explicit && !candidate.visible {
            trace!(ty = %ty, params = candidate.params.len(), "skipping hidden creator");
            continue;
        }
        let kind = match candidate.mode {
            CreatorMode::Properties => {
                require_names(ty, candidate)?;
                CreatorKind::Properties
            }
            CreatorMode::Delegating => {
                if candidate.params.len() != 1 || candidate.params[0].injection_id.is_some() {
                    return Err(BindError::definition(
                        ty,
                        "delegating creator must take exactly one stream argument",
                    ));
                }
                CreatorKind::Delegating
            }
            CreatorMode::Auto => match auto_kind(ty, candidate)? {
                Some(kind) => kind,
                None => {
                    trace!(ty = %ty, "implicit single-argument creator not adopted");
                    continue;
                }
            },
        };
        debug!(ty = %ty, kind = ?kind, explicit = candidate.explicit, "adopted creator");
        adopted.push((kind, candidate));
    }
    Ok(adopted)
}

fn auto_kind(ty: &TypeDescriptor, candidate: &CreatorCandidate) -> Result<Option<CreatorKind>> {
    match candidate.params.as_slice() {
        [] => Ok(Some(CreatorKind::Default)),
        [param] if param.injection_id.is_none() => {
            if param.name.is_some() {
                return Ok(Some(CreatorKind::Properties));
            }
            if let Some(kind) = CreatorKind::for_scalar(&param.ty) {
                return Ok(Some(kind));
            }
            Ok(candidate.explicit.then_some(CreatorKind::Delegating))
        }
        _ => {
            require_names(ty, candidate)?;
            Ok(Some(CreatorKind::Properties))
        }
    }
}

fn require_names(ty: &TypeDescriptor, candidate: &CreatorCandidate) -> Result<()> {
    let unnamed = candidate
        .params
        .iter()
        .position(|p| p.name.is_none() && p.injection_id.is_none());
    match unnamed {
        Some(position) => Err(BindError::definition(
            ty,
            format!(
                "argument {} of a property-based creator has neither a name nor an injection id",
                position
            ),
        )),
        None => Ok(()),
    }
}
