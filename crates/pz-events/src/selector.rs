use std::path::PathBuf;

/// How to resolve the session a run should operate on (spec §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSelector {
    /// Start a fresh session with a freshly derived id.
    Auto,
    /// Reuse the most recently modified session in the directory.
    Continue,
    /// Same resolution as `Continue`; kept distinct because the CLI exposes
    /// both `-c/--continue` and `-r/--resume` as separate flags that may one
    /// day diverge (e.g. `resume` gaining interactive picker semantics).
    Resume,
    /// An explicit id, id-prefix, or `<dir>/<sid>.jsonl` path.
    Explicit(SelectorTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorTarget {
    Id(String),
    Path(PathBuf),
}
