use std::time::Instant;

use serde_json::json;
use tracing::{info, warn};

use baton_core::bundle::{VoteDef, VoteStrategy};
use baton_core::error::Result;
use baton_core::traits::OutputSink;
use baton_core::{Envelope, ErrorCode};

use super::gather_sources;
use crate::context::Context;

/// Picks one value from the outputs of earlier steps.
pub struct VoteExecutor;

/// Outcome of a tally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Winner { value: String, votes: usize },
    NoConsensus,
}

impl VoteExecutor {
    pub async fn execute(
        &self,
        step: &str,
        def: &VoteDef,
        save: Option<&str>,
        ctx: &Context,
        sink: &dyn OutputSink,
    ) -> Result<Envelope> {
        let start = Instant::now();
        let ballots: Vec<(String, String)> = gather_sources(ctx, step, &def.inputs)
            .into_iter()
            .filter_map(|(name, envelope)| match envelope.output_text() {
                Some(text) => Some((name, text.trim().to_string())),
                None => {
                    warn!(step = %step, source = %name, "Source has no output to vote with");
                    None
                }
            })
            .collect();

        if ballots.is_empty() {
            warn!(step = %step, "Vote has no usable sources");
            return Ok(Envelope::failure(
                ErrorCode::SourcesMissing,
                format!("no usable sources among [{}]", def.inputs.join(", ")),
            )
            .duration(start.elapsed())
            .build());
        }

        let values: Vec<&str> = ballots.iter().map(|(_, value)| value.as_str()).collect();
        let total = values.len();

        let (value, votes) = match tally(&values, def.strategy) {
            Verdict::Winner { value, votes } => (value, votes),
            Verdict::NoConsensus => {
                let distinct = distinct_values(&values);
                warn!(step = %step, distinct = distinct.len(), "Sources disagree");
                return Ok(Envelope::failure(
                    ErrorCode::NoConsensus,
                    format!("{} sources gave {} different answers", total, distinct.len()),
                )
                .result("total", total)
                .result("strategy", def.strategy.as_str())
                .duration(start.elapsed())
                .build());
            }
        };

        let payload = json!({
            "strategy": def.strategy.as_str(),
            "ballots": ballots
                .iter()
                .map(|(name, value)| json!({ "source": name, "value": value }))
                .collect::<Vec<_>>(),
            "output": value,
            "votes": votes,
        });
        let output_ref = sink.write_output(step, &payload).await?;

        let mut builder = Envelope::success()
            .output_ref(output_ref)
            .result("output", value.as_str())
            .result("votes", votes)
            .result("total", total)
            .result("strategy", def.strategy.as_str());
        if let Some(file_name) = save {
            let saved = sink.save(file_name, &value).await?;
            builder = builder.result("saved", saved);
        }

        info!(
            step = %step,
            strategy = def.strategy.as_str(),
            votes,
            total,
            "Vote finished"
        );
        Ok(builder.duration(start.elapsed()).build())
    }
}

/// Count votes per distinct value, in first-seen order.
fn counts<'a>(values: &[&'a str]) -> Vec<(&'a str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((*value, 1)),
        }
    }
    counts
}

fn distinct_values<'a>(values: &[&'a str]) -> Vec<&'a str> {
    counts(values).into_iter().map(|(v, _)| v).collect()
}

/// Decide a vote.
///
/// - `majority`: most votes; ties go to the value seen first.
/// - `unanimous`: every value identical, otherwise no consensus.
/// - `ranked`: the first value in source order backed by more than half of
///   the votes, falling back to `majority` when none is.
pub fn tally(values: &[&str], strategy: VoteStrategy) -> Verdict {
    let counts = counts(values);
    let majority = || {
        let mut best: Option<(&str, usize)> = None;
        for &(value, n) in &counts {
            if best.map_or(true, |(_, top)| n > top) {
                best = Some((value, n));
            }
        }
        best.map_or(Verdict::NoConsensus, |(value, votes)| Verdict::Winner {
            value: value.to_string(),
            votes,
        })
    };

    match strategy {
        VoteStrategy::Majority => majority(),
        VoteStrategy::Unanimous => match counts.as_slice() {
            [(value, votes)] => Verdict::Winner {
                value: value.to_string(),
                votes: *votes,
            },
            _ => Verdict::NoConsensus,
        },
        VoteStrategy::Ranked => counts
            .iter()
            .find(|(_, n)| n * 2 > values.len())
            .map(|(value, votes)| Verdict::Winner {
                value: value.to_string(),
                votes: *votes,
            })
            .unwrap_or_else(majority),
    }
}
