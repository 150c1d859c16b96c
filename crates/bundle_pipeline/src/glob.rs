//! Multi-pattern glob matching over file-collection keys.

use globset::{Glob, GlobBuilder, GlobMatcher};

use crate::error::PipelineError;

struct Rule {
    negated: bool,
    matcher: GlobMatcher,
}

fn compile(pattern: &str) -> Result<Rule, PipelineError> {
    let (negated, body) = match pattern.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let glob: Glob = GlobBuilder::new(body)
        .literal_separator(true)
        .build()
        .map_err(|e| PipelineError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.kind().to_string(),
        })?;
    Ok(Rule {
        negated,
        matcher: glob.compile_matcher(),
    })
}

/// Returns the candidates selected by `patterns`, in candidate order.
///
/// Patterns apply in order: a plain pattern selects the paths it matches, a
/// pattern starting with `!` deselects them. `*` does not cross `/`; `**`
/// does. A list made only of negations selects nothing.
pub fn match_globs<'a, I>(patterns: &[String], candidates: I) -> Result<Vec<String>, PipelineError>
where
    I: IntoIterator<Item = &'a str>,
{
    let rules = patterns
        .iter()
        .map(|p| compile(p))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(candidates
        .into_iter()
        .filter(|path| {
            rules.iter().fold(false, |selected, rule| {
                if rule.matcher.is_match(path) {
                    !rule.negated
                } else {
                    selected
                }
            })
        })
        .map(str::to_string)
        .collect())
}
