// SPDX-License-Identifier: MIT OR Apache-2.0

//! Site-aware ordering of replicas and storage elements.
//!
//! The ordering is deterministic for a fixed input: it only depends on the client site, the
//! include/exclude lists, the topology's distances and the input order (ties keep it).
use std::cmp::Ordering;

use alien_core::StorageElement;

use crate::traits::SiteTopology;

/// Client-side parameters of a proximity sort.
#[derive(Clone, Debug)]
pub struct ProximityFilter<'a> {
    site: Option<&'a str>,
    include: &'a [String],
    exclude: &'a [String],
}

impl<'a> ProximityFilter<'a> {
    pub fn new(site: Option<&'a str>, include: &'a [String], exclude: &'a [String]) -> Self {
        Self {
            site,
            include,
            exclude,
        }
    }

    pub fn is_excluded(&self, se: &StorageElement) -> bool {
        self.exclude.iter().any(|name| se.is_named(name))
    }

    /// Position of the storage element in the preference list, if it is listed.
    pub fn preference(&self, se: &StorageElement) -> Option<usize> {
        self.include.iter().position(|name| se.is_named(name))
    }
}

/// Sort key of one storage element, smaller ranks first.
#[derive(Clone, Debug, PartialEq)]
pub struct Rank {
    remote: bool,
    preference: usize,
    distance: f64,
}

impl Rank {
    pub fn of<S>(se: &StorageElement, filter: &ProximityFilter<'_>, topology: &S) -> Self
    where
        S: SiteTopology + ?Sized,
    {
        let (remote, distance) = match filter.site {
            Some(site) => {
                let remote = !se.site().eq_ignore_ascii_case(site);
                let distance = topology.distance(site, se).unwrap_or(f64::MAX);
                (remote, distance)
            }
            None => (false, 0.0),
        };

        Self {
            remote,
            preference: filter.preference(se).unwrap_or(usize::MAX),
            distance: distance + se.demote_read,
        }
    }
}

impl Eq for Rank {}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.remote
            .cmp(&other.remote)
            .then(self.preference.cmp(&other.preference))
            .then(self.distance.total_cmp(&other.distance))
    }
}

/// Drop excluded items and stable-sort the rest by rank.
pub fn sort_by<T, S, F>(items: Vec<T>, filter: &ProximityFilter<'_>, topology: &S, se_of: F) -> Vec<T>
where
    S: SiteTopology + ?Sized,
    F: Fn(&T) -> &StorageElement,
{
    let mut ranked: Vec<(Rank, T)> = items
        .into_iter()
        .filter(|item| !filter.is_excluded(se_of(item)))
        .map(|item| (Rank::of(se_of(&item), filter, topology), item))
        .collect();

    // `sort_by` is stable, equal ranks keep catalogue order.
    ranked.sort_by(|(a, _), (b, _)| a.cmp(b));

    ranked.into_iter().map(|(_, item)| item).collect()
}
