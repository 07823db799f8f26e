//! Result calculation, computed exactly once when voting closes.

use std::collections::BTreeMap;

use chrysalis_types::models::{Proposal, Vote, VoteType};
use chrysalis_types::voting::{
    ApprovalCount, ApprovalTally, OptionCount, RankedRound, RankedTally, SimpleTally, TallyResult,
    Verdict, VoteChoice, WeightedTally,
};

/// Tally a closed ballot box. Quorum gating short-circuits the
/// type-specific count entirely.
pub fn tally(proposal: &Proposal, votes: &[Vote]) -> TallyResult {
    let total_votes = votes.len() as u32;

    if let Some(quorum) = proposal.quorum {
        if total_votes < quorum {
            return TallyResult::QuorumNotMet {
                quorum,
                total_votes,
            };
        }
    }

    match proposal.vote_type {
        VoteType::Simple => simple(proposal.threshold, votes),
        VoteType::Ranked => ranked(&proposal.content.options, votes),
        VoteType::Weighted => weighted(proposal.threshold, votes),
        VoteType::Approval => approval(votes),
    }
}

fn simple(threshold: Option<f64>, votes: &[Vote]) -> TallyResult {
    let total_votes = votes.len() as u32;
    let yes_votes = votes
        .iter()
        .filter(|v| matches!(v.choice, VoteChoice::Simple { vote: true }))
        .count() as u32;

    let percentage = if total_votes == 0 {
        0.0
    } else {
        f64::from(yes_votes) / f64::from(total_votes) * 100.0
    };

    // Explicit threshold is inclusive; the default bar is a strict
    // majority.
    let passed = match threshold {
        Some(t) => percentage >= t,
        None => percentage > 50.0,
    };

    TallyResult::Simple(SimpleTally {
        verdict: if passed { Verdict::Passed } else { Verdict::Failed },
        total_votes,
        yes_votes,
        no_votes: total_votes - yes_votes,
        percentage,
    })
}

/// Instant-runoff: count continuing ballots' top preferences each
/// round; a strict majority of non-exhausted ballots wins, otherwise
/// the lowest-count option is eliminated (ties toward the lowest option
/// index) and its ballots redistribute. Ballots ranking no continuing
/// option are exhausted and leave the majority denominator.
fn ranked(options: &[String], votes: &[Vote]) -> TallyResult {
    let total_votes = votes.len() as u32;
    let ballots: Vec<&[u32]> = votes
        .iter()
        .filter_map(|v| match &v.choice {
            VoteChoice::Ranked { rankings } => Some(rankings.as_slice()),
            _ => None,
        })
        .collect();

    let mut rounds = Vec::new();
    let mut winner = None;

    if options.is_empty() || ballots.is_empty() {
        return TallyResult::RankedChoice(RankedTally {
            total_votes,
            rounds,
            winner,
        });
    }

    let mut continuing = vec![true; options.len()];

    loop {
        let mut counts = vec![0u32; options.len()];
        let mut exhausted = 0u32;
        for ballot in &ballots {
            match top_preference(ballot, &continuing) {
                Some(idx) => counts[idx] += 1,
                None => exhausted += 1,
            }
        }
        let active = ballots.len() as u32 - exhausted;

        let round_counts: Vec<OptionCount> = options
            .iter()
            .enumerate()
            .filter(|(i, _)| continuing[*i])
            .map(|(i, option)| OptionCount {
                option: option.clone(),
                count: counts[i],
            })
            .collect();

        let leader = continuing_extreme(&counts, &continuing, |a, b| a > b);
        if let Some(leader) = leader {
            if u64::from(counts[leader]) * 2 > u64::from(active) && active > 0 {
                winner = Some(options[leader].clone());
                rounds.push(RankedRound {
                    counts: round_counts,
                    eliminated: None,
                    exhausted,
                });
                break;
            }
        }

        let remaining = continuing.iter().filter(|c| **c).count();
        if remaining <= 1 {
            // Last option standing wins by default.
            winner = continuing
                .iter()
                .position(|c| *c)
                .map(|i| options[i].clone());
            rounds.push(RankedRound {
                counts: round_counts,
                eliminated: None,
                exhausted,
            });
            break;
        }

        let loser = continuing_extreme(&counts, &continuing, |a, b| a < b)
            .unwrap_or_default();
        continuing[loser] = false;
        rounds.push(RankedRound {
            counts: round_counts,
            eliminated: Some(options[loser].clone()),
            exhausted,
        });
    }

    TallyResult::RankedChoice(RankedTally {
        total_votes,
        rounds,
        winner,
    })
}

/// The ballot's most preferred continuing option: lowest rank value,
/// equal ranks resolved toward the lower option index. Options the
/// ballot leaves unranked (short ballot) are skipped.
fn top_preference(rankings: &[u32], continuing: &[bool]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (idx, cont) in continuing.iter().enumerate() {
        if !cont {
            continue;
        }
        let Some(&rank) = rankings.get(idx) else {
            continue;
        };
        if best.is_none_or(|(_, r)| rank < r) {
            best = Some((idx, rank));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Index of the continuing option whose count wins under `better`,
/// first index on ties.
fn continuing_extreme(
    counts: &[u32],
    continuing: &[bool],
    better: fn(u32, u32) -> bool,
) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, cont) in continuing.iter().enumerate() {
        if !cont {
            continue;
        }
        if best.is_none_or(|b| better(counts[idx], counts[b])) {
            best = Some(idx);
        }
    }
    best
}

fn weighted(threshold: Option<f64>, votes: &[Vote]) -> TallyResult {
    let total_votes = votes.len() as u32;
    let total_weight: f64 = votes
        .iter()
        .filter_map(|v| match v.choice {
            VoteChoice::Weighted { weight } => Some(weight),
            _ => None,
        })
        .sum();
    let average_weight = if total_votes == 0 {
        0.0
    } else {
        total_weight / f64::from(total_votes)
    };

    // Verdict compares the average (not the total) against the
    // threshold so turnout doesn't change the bar; quorum already
    // gates turnout. No threshold, no verdict.
    let verdict = threshold.map(|t| {
        if average_weight * 100.0 >= t {
            Verdict::Passed
        } else {
            Verdict::Failed
        }
    });

    TallyResult::Weighted(WeightedTally {
        verdict,
        total_votes,
        total_weight,
        average_weight,
    })
}

fn approval(votes: &[Vote]) -> TallyResult {
    let total_votes = votes.len() as u32;
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for vote in votes {
        if let VoteChoice::Approval { approved } = &vote.choice {
            for option in approved {
                *counts.entry(option.as_str()).or_insert(0) += 1;
            }
        }
    }

    let mut options: Vec<ApprovalCount> = counts
        .into_iter()
        .map(|(option, count)| ApprovalCount {
            option: option.to_string(),
            count,
            percentage: if total_votes == 0 {
                0.0
            } else {
                f64::from(count) / f64::from(total_votes) * 100.0
            },
        })
        .collect();
    options.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.option.cmp(&b.option)));

    TallyResult::Approval(ApprovalTally {
        total_votes,
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrysalis_types::models::{VoteStatus, VoteType};
    use chrysalis_types::voting::ProposalContent;
    use uuid::Uuid;

    fn proposal(vote_type: VoteType, options: &[&str]) -> Proposal {
        Proposal {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: "d".into(),
            content: ProposalContent {
                text: None,
                options: options.iter().map(|s| s.to_string()).collect(),
            },
            vote_type,
            vote_status: VoteStatus::Active,
            start_date: Some(Utc::now()),
            end_date: None,
            quorum: None,
            threshold: None,
            result: None,
            author_id: Uuid::new_v4(),
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    fn votes(choices: Vec<VoteChoice>) -> Vec<Vote> {
        let proposal_id = Uuid::new_v4();
        choices
            .into_iter()
            .map(|choice| Vote {
                proposal_id,
                user_id: Uuid::new_v4(),
                choice,
                cast_at: Utc::now(),
            })
            .collect()
    }

    fn simple_votes(yes: usize, no: usize) -> Vec<Vote> {
        let mut choices = vec![VoteChoice::Simple { vote: true }; yes];
        choices.extend(vec![VoteChoice::Simple { vote: false }; no]);
        votes(choices)
    }

    #[test]
    fn simple_majority_passes_without_threshold() {
        let result = tally(&proposal(VoteType::Simple, &[]), &simple_votes(7, 3));
        match result {
            TallyResult::Simple(t) => {
                assert_eq!(t.verdict, Verdict::Passed);
                assert_eq!(t.yes_votes, 7);
                assert_eq!(t.no_votes, 3);
                assert!((t.percentage - 70.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn simple_fails_below_explicit_threshold() {
        let mut p = proposal(VoteType::Simple, &[]);
        p.threshold = Some(75.0);
        match tally(&p, &simple_votes(7, 3)) {
            TallyResult::Simple(t) => assert_eq!(t.verdict, Verdict::Failed),
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn simple_exact_threshold_passes() {
        let mut p = proposal(VoteType::Simple, &[]);
        p.threshold = Some(70.0);
        match tally(&p, &simple_votes(7, 3)) {
            TallyResult::Simple(t) => assert_eq!(t.verdict, Verdict::Passed),
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn simple_exact_half_fails_by_default() {
        match tally(&proposal(VoteType::Simple, &[]), &simple_votes(5, 5)) {
            TallyResult::Simple(t) => assert_eq!(t.verdict, Verdict::Failed),
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn quorum_short_circuits_any_vote_type() {
        for vote_type in [
            VoteType::Simple,
            VoteType::Ranked,
            VoteType::Weighted,
            VoteType::Approval,
        ] {
            let mut p = proposal(vote_type, &["a", "b"]);
            p.quorum = Some(10);
            let result = tally(&p, &simple_votes(5, 0));
            assert_eq!(
                result,
                TallyResult::QuorumNotMet {
                    quorum: 10,
                    total_votes: 5
                }
            );
        }
    }

    #[test]
    fn quorum_exactly_met_proceeds_to_tally() {
        let mut p = proposal(VoteType::Simple, &[]);
        p.quorum = Some(5);
        match tally(&p, &simple_votes(4, 1)) {
            TallyResult::Simple(t) => assert_eq!(t.total_votes, 5),
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn ranked_immediate_majority_wins_in_one_round() {
        // rankings[i] = rank of option i; option "a" is everyone's first.
        let p = proposal(VoteType::Ranked, &["a", "b", "c"]);
        let vs = votes(vec![
            VoteChoice::Ranked {
                rankings: vec![1, 2, 3],
            },
            VoteChoice::Ranked {
                rankings: vec![1, 3, 2],
            },
            VoteChoice::Ranked {
                rankings: vec![1, 2, 3],
            },
        ]);
        match tally(&p, &vs) {
            TallyResult::RankedChoice(t) => {
                assert_eq!(t.winner.as_deref(), Some("a"));
                assert_eq!(t.rounds.len(), 1);
                assert_eq!(t.rounds[0].eliminated, None);
            }
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn ranked_elimination_redistributes_to_next_preference() {
        // First preferences: a=2, b=2, c=1. c is eliminated; its ballot
        // prefers b next, giving b the 3-of-5 majority.
        let p = proposal(VoteType::Ranked, &["a", "b", "c"]);
        let vs = votes(vec![
            VoteChoice::Ranked {
                rankings: vec![1, 2, 3],
            },
            VoteChoice::Ranked {
                rankings: vec![1, 3, 2],
            },
            VoteChoice::Ranked {
                rankings: vec![2, 1, 3],
            },
            VoteChoice::Ranked {
                rankings: vec![3, 1, 2],
            },
            VoteChoice::Ranked {
                rankings: vec![3, 2, 1],
            },
        ]);
        match tally(&p, &vs) {
            TallyResult::RankedChoice(t) => {
                assert_eq!(t.winner.as_deref(), Some("b"));
                assert_eq!(t.rounds.len(), 2);
                assert_eq!(t.rounds[0].eliminated.as_deref(), Some("c"));
                let final_counts = &t.rounds[1].counts;
                let b = final_counts.iter().find(|c| c.option == "b").unwrap();
                assert_eq!(b.count, 3);
            }
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn ranked_short_ballots_exhaust_and_leave_denominator() {
        // The short ballot only ranks option a; once a is eliminated it
        // exhausts, and b wins 2-1 among active ballots.
        let p = proposal(VoteType::Ranked, &["a", "b", "c"]);
        let vs = votes(vec![
            VoteChoice::Ranked { rankings: vec![1] },
            VoteChoice::Ranked {
                rankings: vec![2, 1, 3],
            },
            VoteChoice::Ranked {
                rankings: vec![3, 1, 2],
            },
            VoteChoice::Ranked {
                rankings: vec![2, 3, 1],
            },
        ]);
        match tally(&p, &vs) {
            TallyResult::RankedChoice(t) => {
                assert_eq!(t.winner.as_deref(), Some("b"));
                let last = t.rounds.last().unwrap();
                assert!(last.exhausted >= 1);
            }
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn ranked_elimination_tie_breaks_toward_lowest_index() {
        // a=1, b=1 first preferences; the elimination tie breaks
        // toward the lowest option index, so a goes first.
        let p = proposal(VoteType::Ranked, &["a", "b"]);
        let vs = votes(vec![
            VoteChoice::Ranked {
                rankings: vec![1, 2],
            },
            VoteChoice::Ranked {
                rankings: vec![2, 1],
            },
        ]);
        match tally(&p, &vs) {
            TallyResult::RankedChoice(t) => {
                assert_eq!(t.rounds[0].eliminated.as_deref(), Some("a"));
                assert_eq!(t.winner.as_deref(), Some("b"));
            }
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn ranked_with_no_options_or_ballots_has_no_winner() {
        let p = proposal(VoteType::Ranked, &[]);
        match tally(&p, &[]) {
            TallyResult::RankedChoice(t) => {
                assert_eq!(t.winner, None);
                assert!(t.rounds.is_empty());
            }
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn weighted_reports_totals_without_verdict_when_no_threshold() {
        let p = proposal(VoteType::Weighted, &[]);
        let vs = votes(vec![
            VoteChoice::Weighted { weight: 0.5 },
            VoteChoice::Weighted { weight: 1.0 },
            VoteChoice::Weighted { weight: 0.0 },
        ]);
        match tally(&p, &vs) {
            TallyResult::Weighted(t) => {
                assert_eq!(t.verdict, None);
                assert!((t.total_weight - 1.5).abs() < 1e-9);
                assert!((t.average_weight - 0.5).abs() < 1e-9);
            }
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn weighted_verdict_compares_average_against_threshold() {
        let mut p = proposal(VoteType::Weighted, &[]);
        p.threshold = Some(50.0);
        let vs = votes(vec![
            VoteChoice::Weighted { weight: 0.6 },
            VoteChoice::Weighted { weight: 0.4 },
        ]);
        match tally(&p, &vs) {
            TallyResult::Weighted(t) => assert_eq!(t.verdict, Some(Verdict::Passed)),
            other => panic!("unexpected tally: {other:?}"),
        }

        p.threshold = Some(51.0);
        match tally(&p, &vs) {
            TallyResult::Weighted(t) => assert_eq!(t.verdict, Some(Verdict::Failed)),
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn approval_ranks_options_by_count_descending() {
        let p = proposal(VoteType::Approval, &["a", "b", "c"]);
        let vs = votes(vec![
            VoteChoice::Approval {
                approved: vec!["a".into(), "b".into()],
            },
            VoteChoice::Approval {
                approved: vec!["b".into()],
            },
            VoteChoice::Approval {
                approved: vec!["b".into(), "c".into()],
            },
            VoteChoice::Approval { approved: vec![] },
        ]);
        match tally(&p, &vs) {
            TallyResult::Approval(t) => {
                assert_eq!(t.total_votes, 4);
                assert_eq!(t.options[0].option, "b");
                assert_eq!(t.options[0].count, 3);
                assert!((t.options[0].percentage - 75.0).abs() < 1e-9);
                assert_eq!(t.options[1].option, "a");
                assert_eq!(t.options[2].option, "c");
            }
            other => panic!("unexpected tally: {other:?}"),
        }
    }

    #[test]
    fn approval_counts_options_outside_the_ballot_list() {
        // No option-list check at cast time; unknown strings still
        // accumulate counts.
        let p = proposal(VoteType::Approval, &["a"]);
        let vs = votes(vec![VoteChoice::Approval {
            approved: vec!["write-in".into()],
        }]);
        match tally(&p, &vs) {
            TallyResult::Approval(t) => {
                assert_eq!(t.options[0].option, "write-in");
                assert_eq!(t.options[0].count, 1);
            }
            other => panic!("unexpected tally: {other:?}"),
        }
    }
}
