//! Winner selection.
//!
//! Winners are sampled uniformly without replacement from the eligible population.
//! Each selection produces an [`Audit`] record:
//!
//! - `seed` is 32 random bytes, rendered as lowercase hex. It is an audit label
//!   included in `hash_before`, and is *not* used to seed the sampling itself.
//! - `hash_before` is `SHA256("{draw_id}:{seed}:{ids}")`, where `ids` are the eligible entry
//!   identifiers sorted in ascending order, rendered in decimal and joined by `,`.
//! - `hash_after` is `SHA256("{ids}")`, where `ids` are the picked entry identifiers
//!   in pick order, joined by `,`.
//!
//! Both hashes are hex-encoded.

use std::{collections::HashSet, fmt::Display};

use common::hash;
use db::{entry, winner::WinnerType};
use derive_more::{Display, Error};
use rand::{seq::SliceRandom, CryptoRng, Rng};
use serde::Serialize;

/// Length of the audit seed, in bytes.
pub const SEED_LENGTH: usize = 32;

/// Errors that may occur during winner selection.
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// Eligible population is smaller than the amount of entries to pick.
    #[display(
        fmt = "not enough eligible entries: {} required, {} available",
        required,
        available
    )]
    InsufficientEntries { required: usize, available: usize },

    /// The same entry was provided twice, which means the ledger is corrupted.
    #[display(fmt = "duplicate entry identifier in selection population: {}", _0)]
    DuplicateEntry(#[error(ignore)] i64),
}

/// Fairness audit record of a single selection.
#[derive(Clone, Debug, Serialize)]
pub struct Audit {
    pub seed: String,
    pub hash_before: String,
    pub hash_after: String,
}

/// Single selected entry.
#[derive(Clone, Debug)]
pub struct Pick<'a> {
    /// 1-based rank, equal to the pick order.
    pub rank: i32,
    pub winner_type: WinnerType,
    pub entry: &'a entry::Model,
}

/// Selection result.
#[derive(Debug)]
pub struct Selection<'a> {
    pub picked: Vec<Pick<'a>>,
    pub audit: Audit,
}

/// Compute the commitment to the eligible population before the selection.
pub fn hash_before<I>(draw_id: i64, seed: &str, sorted_ids: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let ids = join(sorted_ids);

    hash::sha256_hex(format!("{draw_id}:{seed}:{ids}").as_bytes())
}

/// Compute the digest of the picked entries, in pick order.
pub fn hash_after<I>(picked_ids: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    hash::sha256_hex(join(picked_ids).as_bytes())
}

fn join<I>(ids: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Select `winners + alternates` entries from the provided population.
///
/// The first `winners` picks are tagged as [`WinnerType::Winner`], the rest as
/// [`WinnerType::Alternate`]. Output is deterministic for a given `rng` state.
pub fn select_winners<'a, R>(
    rng: &mut R,
    draw_id: i64,
    population: &'a [entry::Model],
    winners: usize,
    alternates: usize,
) -> Result<Selection<'a>, SelectionError>
where
    R: Rng + CryptoRng + ?Sized,
{
    let mut seen = HashSet::with_capacity(population.len());

    for entry in population {
        if !seen.insert(entry.id) {
            return Err(SelectionError::DuplicateEntry(entry.id));
        }
    }

    let required = winners + alternates;

    if population.is_empty() || required > population.len() {
        return Err(SelectionError::InsufficientEntries {
            required,
            available: population.len(),
        });
    }

    let mut seed = [0u8; SEED_LENGTH];
    rng.fill_bytes(&mut seed);
    let seed = hex::encode(seed);

    let mut sorted_ids: Vec<i64> = population.iter().map(|entry| entry.id).collect();
    sorted_ids.sort_unstable();

    let hash_before = hash_before(draw_id, &seed, &sorted_ids);

    let mut candidates: Vec<&entry::Model> = population.iter().collect();
    let (chosen, _) = candidates.partial_shuffle(rng, required);

    let picked: Vec<Pick> = chosen
        .iter()
        .copied()
        .enumerate()
        .map(|(idx, entry)| Pick {
            rank: idx as i32 + 1,
            winner_type: if idx < winners {
                WinnerType::Winner
            } else {
                WinnerType::Alternate
            },
            entry,
        })
        .collect();

    let hash_after = hash_after(picked.iter().map(|pick| pick.entry.id));

    Ok(Selection {
        picked,
        audit: Audit {
            seed,
            hash_before,
            hash_after,
        },
    })
}

#[cfg(test)]
mod tests {
    use db::{entry, now, winner::WinnerType};
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn population(ids: &[i64]) -> Vec<entry::Model> {
        ids.iter()
            .map(|id| entry::Model {
                id: *id,
                draw_id: 1,
                external_id: format!("comment-{id}"),
                author_id: format!("author-{id}"),
                author_name: None,
                content: String::from("entry"),
                status: entry::Status::Eligible,
                is_correct: None,
                proof_url: None,
                created_at: now(),
            })
            .collect()
    }

    #[test]
    fn picks_everyone_when_population_matches() {
        let entries = population(&[1, 2, 3, 4, 5]);
        let selection =
            select_winners(&mut StdRng::seed_from_u64(7), 10, &entries, 3, 2).unwrap();

        assert_eq!(selection.picked.len(), 5);

        let ranks: Vec<i32> = selection.picked.iter().map(|pick| pick.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);

        let types: Vec<WinnerType> = selection
            .picked
            .iter()
            .map(|pick| pick.winner_type)
            .collect();
        assert_eq!(
            types,
            vec![
                WinnerType::Winner,
                WinnerType::Winner,
                WinnerType::Winner,
                WinnerType::Alternate,
                WinnerType::Alternate
            ]
        );

        let mut ids: Vec<i64> = selection.picked.iter().map(|pick| pick.entry.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn insufficient_population() {
        let entries = population(&[1, 2, 3, 4]);

        assert_eq!(
            select_winners(&mut StdRng::seed_from_u64(7), 10, &entries, 3, 2).unwrap_err(),
            SelectionError::InsufficientEntries {
                required: 5,
                available: 4
            }
        );
    }

    #[test]
    fn empty_population() {
        assert_eq!(
            select_winners(&mut StdRng::seed_from_u64(7), 10, &[], 1, 0).unwrap_err(),
            SelectionError::InsufficientEntries {
                required: 1,
                available: 0
            }
        );
    }

    #[test]
    fn duplicate_entries() {
        let entries = population(&[1, 2, 2, 3]);

        assert_eq!(
            select_winners(&mut StdRng::seed_from_u64(7), 10, &entries, 1, 0).unwrap_err(),
            SelectionError::DuplicateEntry(2)
        );
    }

    #[test]
    fn deterministic_for_rng_state() {
        let entries = population(&(1..=50).collect::<Vec<_>>());

        let first = select_winners(&mut StdRng::seed_from_u64(42), 3, &entries, 5, 5).unwrap();
        let second = select_winners(&mut StdRng::seed_from_u64(42), 3, &entries, 5, 5).unwrap();

        let ids = |selection: &Selection| -> Vec<i64> {
            selection.picked.iter().map(|pick| pick.entry.id).collect()
        };

        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.audit.seed, second.audit.seed);
        assert_eq!(first.audit.hash_after, hash_after(ids(&first)));

        let unique: HashSet<i64> = ids(&first).into_iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn audit_hashes() {
        let entries = population(&[30, 10, 20]);
        let selection =
            select_winners(&mut StdRng::seed_from_u64(1), 5, &entries, 1, 1).unwrap();

        assert_eq!(selection.audit.seed.len(), SEED_LENGTH * 2);
        assert_eq!(
            selection.audit.hash_before,
            hash_before(5, &selection.audit.seed, [10, 20, 30])
        );
    }

    #[test]
    fn hash_before_reference_vector() {
        assert_eq!(
            hash_before(1, "seed", ["a", "b", "c"]),
            "c6d57294e2c7743a20b2413c1294f7cc63d971b3e64cecf60e7777ec809f9b8d"
        );
    }

    #[test]
    fn hash_after_reference_vector() {
        assert_eq!(
            hash_after([3, 1, 2]),
            "edb794d615a63f5eec436d83bed7299d6af36f508c0bf38a3c1cd85d6e4ebd56"
        );
    }
}
