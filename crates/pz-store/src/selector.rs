// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use pz_events::{SelectorTarget, SessionSelector, TimeSource};

use crate::error::StoreError;
use crate::sid;
use crate::store::SessionStore;

/// Resolve a [`SessionSelector`] against `store` into a concrete session id
/// (spec §4.1 "Selector").
///
/// `auto` never touches the directory; every other variant does a directory
/// scan, so callers that only want a fresh id should prefer `auto` when
/// they can.
pub fn resolve(
    selector: &SessionSelector,
    store: &SessionStore,
    clock: &dyn TimeSource,
) -> Result<String, StoreError> {
    match selector {
        SessionSelector::Auto => Ok(sid::fresh_sid(clock)),
        SessionSelector::Continue | SessionSelector::Resume => {
            let mut ids = store.list_by_mtime()?;
            ids.pop().ok_or_else(|| StoreError::NotFound("no sessions in directory".into()))
        }
        SessionSelector::Explicit(SelectorTarget::Path(path)) => {
            let (dir, sid) = sid::parse_log_path(path)?;
            if dir != store.dir() {
                return Err(StoreError::InvalidPath(format!(
                    "{} is not under {}",
                    path.display(),
                    store.dir().display()
                )));
            }
            Ok(sid)
        }
        SessionSelector::Explicit(SelectorTarget::Id(id)) => resolve_id(id, store),
    }
}

fn resolve_id(id: &str, store: &SessionStore) -> Result<String, StoreError> {
    let all = store.list()?;
    if all.iter().any(|s| s == id) {
        return Ok(id.to_string());
    }
    let matches: Vec<String> = all.into_iter().filter(|s| s.starts_with(id)).collect();
    match matches.len() {
        0 => Err(StoreError::NotFound(id.to_string())),
        1 => Ok(matches.into_iter().next().unwrap()),
        _ => Err(StoreError::Ambiguous {
            prefix: id.to_string(),
            matches,
        }),
    }
}
