//! Prompt-context assembly from ranked chunks or whole sources.

use serde::Serialize;

use crate::ranker::ScoredChunk;

/// Delimiter placed between ranked chunks.
pub const CHUNK_DELIMITER: &str = "\n\n---\n\n";
/// Default total character budget for whole-source assembly.
pub const DEFAULT_MAX_TOTAL_CHARS: usize = 12_000;
/// Default reserve below which whole-source assembly stops.
pub const DEFAULT_RESERVE_CHARS: usize = 500;

const SOURCE_TRAILER: &str = "\n\n";

/// Assembled context plus what went into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextAssembly {
    /// Text handed to the answer generator.
    pub text: String,
    /// Characters in `text`.
    pub chars_used: usize,
    /// Number of chunks or sources included.
    pub sources_used: usize,
}

impl ContextAssembly {
    /// True when no grounding text was produced.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Budget knobs for whole-source assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetConfig {
    /// Hard cap on the assembled string, in characters.
    pub max_total_chars: usize,
    /// Stop once the remaining budget is at or below this many characters.
    pub reserve_chars: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_total_chars: DEFAULT_MAX_TOTAL_CHARS,
            reserve_chars: DEFAULT_RESERVE_CHARS,
        }
    }
}

/// Renders ranked chunks as `[Källa: source]` blocks joined by
/// [`CHUNK_DELIMITER`].
pub fn assemble_ranked(chunks: &[ScoredChunk]) -> ContextAssembly {
    let text = chunks
        .iter()
        .map(|chunk| format!("[Källa: {}]\n{}", chunk.source, chunk.text))
        .collect::<Vec<_>>()
        .join(CHUNK_DELIMITER);
    ContextAssembly {
        chars_used: text.chars().count(),
        sources_used: chunks.len(),
        text,
    }
}

/// Packs named source texts into at most `budget.max_total_chars` characters.
///
/// Sources are taken shortest first (ties keep input order) so that as many
/// distinct sources as possible make it in. Each one is wrapped with an
/// uppercase `=== NAME ===` header and cut to the remaining budget. Packing
/// stops once the remaining budget is at or below the reserve, or when the
/// next source could only contribute a cut excerpt shorter than the reserve.
pub fn assemble_budgeted<N, T>(sources: &[(N, T)], budget: BudgetConfig) -> ContextAssembly
where
    N: AsRef<str>,
    T: AsRef<str>,
{
    let mut order: Vec<(usize, usize)> = sources
        .iter()
        .enumerate()
        .map(|(idx, (_, text))| (idx, text.as_ref().chars().count()))
        .collect();
    order.sort_by_key(|&(_, len)| len);

    let mut out = ContextAssembly::default();
    let trailer_chars = SOURCE_TRAILER.chars().count();
    for (idx, text_chars) in order {
        let remaining = budget.max_total_chars.saturating_sub(out.chars_used);
        if remaining <= budget.reserve_chars {
            break;
        }
        let (name, text) = &sources[idx];
        let header = format!("=== {} ===\n", name.as_ref().to_uppercase());
        let overhead = header.chars().count() + trailer_chars;
        let room = remaining.saturating_sub(overhead);
        let take = text_chars.min(room);
        let truncated = take < text_chars;
        if overhead > remaining || (truncated && take < budget.reserve_chars.max(1)) {
            break;
        }
        out.text.push_str(&header);
        out.text.push_str(prefix_chars(text.as_ref(), take));
        out.text.push_str(SOURCE_TRAILER);
        out.chars_used += overhead + take;
        out.sources_used += 1;
    }
    out
}

fn prefix_chars(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
