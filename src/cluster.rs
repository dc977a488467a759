/*!
 * The hotspot to incident clustering engine.
 *
 * One invocation takes the full current hotspot and incident snapshots and produces the
 * change-set of incidents that gained members. The pass is greedy nearest-centroid growth:
 * incidents are long-lived and only ever gain members, so re-clustering from scratch every
 * run would thrash incident identity and cost more besides.
 *
 * The work is split into two phases. Phase one builds an assignment plan against a frozen
 * snapshot of incident centroids, so no assignment made during the pass moves a centroid
 * that later hotspots match against. A newly spawned incident does enter the plan
 * immediately with its founding detection as its centroid, which lets later detections in
 * the same pass attach to it. Phase two recomputes geometry and metrics for every incident
 * the plan touched and collects the results as the change-set.
 */

use crate::{
    geo::{self, Coord},
    hotspot::Hotspot,
    incident::{self, Incident, IncidentStatus},
};
use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

/// A hotspot joins the nearest active incident strictly closer than this to its centroid.
pub const DISTANCE_THRESHOLD_KM: f64 = 5.0;

/// Counters for one engine invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterStats {
    /// Hotspots that joined an incident this run, including incidents spawned earlier in
    /// the same pass.
    pub assigned: usize,
    /// Incidents created this run.
    pub spawned: usize,
    /// Incidents recomputed and included in the change-set.
    pub updated: usize,
}

/// One incident's standing in the assignment plan.
struct PlanEntry {
    /// Centroid used for matching, frozen at the value the incident had when it entered the
    /// plan. Assignments during the pass do not move it.
    centroid: Coord,
    first_seen: String,
    members: Vec<String>,
    dirty: bool,
}

/**
 * Run one clustering pass over the current snapshots.
 *
 * Hotspots are processed oldest first. A hotspot that is already a member of any active
 * incident is never reconsidered, and one without usable coordinates is skipped for good.
 * Each remaining hotspot joins the nearest incident strictly within
 * [DISTANCE_THRESHOLD_KM], or founds a new incident that later hotspots in the same pass
 * may join. Equidistant candidates resolve to the lowest incident id.
 *
 * New incident ids are minted from `next_incident_num`, which the caller restores from the
 * store before the run.
 *
 * #Returns
 * The change-set, every incident whose membership changed, fully recomputed, ordered by
 * incident id, plus counters for the run. Incidents left with no resolvable members are
 * excluded from the change-set rather than returned with empty geometry.
 */
pub fn assign_and_update(
    hotspots: &[Hotspot],
    incidents: &[Incident],
    next_incident_num: &mut u64,
    now: DateTime<Utc>,
) -> (Vec<Incident>, ClusterStats) {
    let mut stats = ClusterStats::default();

    let mut taken: FxHashSet<&str> = FxHashSet::default();
    let mut plan: BTreeMap<String, PlanEntry> = BTreeMap::new();

    for inc in incidents.iter().filter(|i| i.status == IncidentStatus::Active) {
        for id in &inc.hotspot_ids {
            taken.insert(id.as_str());
        }

        plan.insert(
            inc.id.clone(),
            PlanEntry {
                centroid: inc.centroid,
                first_seen: inc.first_seen.clone(),
                members: inc.hotspot_ids.clone(),
                dirty: false,
            },
        );
    }

    // Oldest first. The fixed-width zero-padded timestamp format makes the lexicographic
    // order chronological; non-conforming values sort by their literal string value.
    let mut ordered: Vec<&Hotspot> = hotspots.iter().collect();
    ordered.sort_by(|a, b| a.acq_datetime.cmp(&b.acq_datetime));

    for hs in ordered {
        if taken.contains(hs.id.as_str()) {
            continue;
        }

        let coord = match hs.coord() {
            Some(coord) => coord,
            None => continue,
        };

        // Only a strictly smaller distance replaces the candidate, and the map iterates in
        // ascending id order, so ties resolve to the lowest incident id.
        let mut best: Option<(&String, f64)> = None;
        for (id, entry) in plan.iter() {
            let dist = geo::great_circle_distance(
                coord.lat,
                coord.lon,
                entry.centroid.lat,
                entry.centroid.lon,
            );

            if dist < DISTANCE_THRESHOLD_KM && best.map_or(true, |(_, best_dist)| dist < best_dist)
            {
                best = Some((id, dist));
            }
        }

        match best.map(|(id, _)| id.clone()) {
            Some(id) => {
                if let Some(entry) = plan.get_mut(&id) {
                    entry.members.push(hs.id.clone());
                    entry.dirty = true;
                }
                taken.insert(hs.id.as_str());
                stats.assigned += 1;
            }
            None => {
                let id = format!("INC-{:08X}", *next_incident_num);
                *next_incident_num += 1;

                plan.insert(
                    id,
                    PlanEntry {
                        centroid: coord,
                        first_seen: hs.acq_datetime.clone(),
                        members: vec![hs.id.clone()],
                        dirty: true,
                    },
                );
                taken.insert(hs.id.as_str());
                stats.spawned += 1;
            }
        }
    }

    // Phase two: recompute every incident the plan touched.
    let lookup: FxHashMap<&str, &Hotspot> = hotspots.iter().map(|h| (h.id.as_str(), h)).collect();

    let mut changed = Vec::new();
    for (id, entry) in plan {
        if !entry.dirty {
            continue;
        }

        match incident::aggregate(&entry.members, &lookup, now) {
            Some(agg) => changed.push(Incident::from_aggregate(
                id,
                entry.first_seen,
                entry.members,
                agg,
                now,
            )),
            None => log::debug!("incident {} has no resolvable members, not writing it", id),
        }
    }

    stats.updated = changed.len();

    (changed, stats)
}
