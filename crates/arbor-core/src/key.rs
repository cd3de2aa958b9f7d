use crate::collections::map::HashSet;
use crate::element::Element;
use crate::error::RenderError;
use crate::path::{InstanceKey, InstancePath};

/// Sibling identities for `children` of the instance at `parent`.
///
/// Explicit keys must be unique within the list. Unkeyed children fall back
/// to their position; in lists longer than one that fallback is logged once
/// when `warn` is set.
pub(crate) fn assign_keys(
    parent: &InstancePath,
    children: &[Element],
    warn: bool,
) -> Result<Vec<InstanceKey>, RenderError> {
    let mut seen: HashSet<&str> = HashSet::default();
    let mut warned = false;
    let mut keys = Vec::with_capacity(children.len());
    for (index, child) in children.iter().enumerate() {
        match child.key() {
            Some(key) => {
                if !seen.insert(key) {
                    return Err(RenderError::AmbiguousKey {
                        parent: parent.clone(),
                        key: key.to_owned(),
                    });
                }
                keys.push(InstanceKey::Explicit(key.to_owned()));
            }
            None => {
                if warn && !warned && children.len() > 1 {
                    log::warn!(
                        "children of {parent} have no key; falling back to positions, \
                         reordering them will recreate their state"
                    );
                    warned = true;
                }
                keys.push(InstanceKey::Positional(index));
            }
        }
    }
    Ok(keys)
}
