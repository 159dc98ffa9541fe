//! Matching expanders to expandable types and invoking them.

use typexpand_telemetry::events;

use crate::error::ExpandError;
use crate::scanner::{ExpandableType, ExpanderFunction};

/// Whether an expander should run for a type.
///
/// The type must accept the expander's template, and an explicit-use
/// expander only runs when the type explicitly requests that template.
pub fn is_applicable(ty: &ExpandableType, expander: &ExpanderFunction) -> bool {
    ty.accepts(&expander.template) && (!expander.explicit_use || ty.requests(&expander.template))
}

/// Run every applicable (expander, type) pair.
///
/// Fragments come out expander-major, type-minor, both in discovery order;
/// pairs that do not apply contribute an empty fragment. The first fault
/// aborts the whole expansion.
pub fn expand(
    types: &[ExpandableType],
    expanders: &[ExpanderFunction],
) -> Result<Vec<String>, ExpandError> {
    let mut fragments = Vec::with_capacity(types.len() * expanders.len());

    for expander in expanders {
        for ty in types {
            if !is_applicable(ty, expander) {
                fragments.push(String::new());
                continue;
            }

            let fragment = expander.invoke(&ty.info).map_err(|fault| {
                tracing::error!(
                    event = events::EXPANDER_FAILED,
                    expander = %expander.name,
                    type_name = %ty.name(),
                    error = %fault,
                    "expander faulted"
                );
                ExpandError::ExpansionInvocation {
                    expander: expander.name.clone(),
                    type_name: ty.name().to_string(),
                    message: fault.message,
                }
            })?;

            fragments.push(fragment);
        }
    }

    Ok(fragments)
}
