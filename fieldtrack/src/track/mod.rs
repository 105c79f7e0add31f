//! Multi-frame feature tracking.
//!
//! [`FeatureTracker::step`] consumes one frame of features and advances an
//! explicit [`TrackSet`]. Per track the lifecycle is
//! `New -> Active -> (Active | Missing) -> Terminated`. Within a step:
//!
//! 1. Every live track predicts its position for the frame and a gated cost
//!    row is built against all features (rows in parallel).
//! 2. Rows and features are assigned (greedy or optimal).
//! 3. Unmatched tracks that were observed on the previous frame and whose gate
//!    contains an already matched feature merge into that feature's track.
//! 4. Unmatched features inside a matched track's gate split from it, unless
//!    that track just survived a merge: it continues as the merged identity.
//! 5. Remaining features are born as new tracks; remaining tracks miss.
//!
//! All validation happens before the set is touched, so a step that returns
//! an error leaves the set exactly as it was.

mod assignment;
pub mod umbrella;

use std::collections::BTreeMap;
use std::fmt;

use glam::DVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{
    require_non_negative, require_positive, require_unit_interval, ConstructionError,
    TrackingError,
};
use crate::extract::Feature;

pub use assignment::AssignmentMethod;

const CONTEXT: &str = "TrackerConfig";

// =============================================================================
// Identity and state
// =============================================================================

/// Track identifier, assigned from a per-set counter in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    /// Born but not yet confirmed.
    New,
    Active,
    /// Not observed on the latest frame(s).
    Missing,
    /// Final; excluded from matching.
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Missing for more than the tolerated number of frames.
    Missed,
    /// A new track that was not observed again before confirmation.
    Unconfirmed,
    /// Absorbed by another track.
    Merged,
    /// Replaced by its split children.
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// This track was absorbed by `other`.
    MergedInto,
    /// `other` was absorbed by this track.
    Absorbed,
    /// This track split off from `other`.
    SplitFrom,
    /// `other` split off from this track.
    SplitInto,
}

/// A merge or split relation with another track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    pub kind: LinkKind,
    pub other: TrackId,
    pub frame: usize,
}

/// Persistent identity of one feature across frames. Serialize-only: tracks
/// are built by [`FeatureTracker::step`] and never read back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    id: TrackId,
    features: Vec<Feature>,
    status: TrackStatus,
    missed_frames: usize,
    links: Vec<Provenance>,
    terminated: Option<(usize, TerminationReason)>,
}

impl Track {
    fn new(id: TrackId, feature: Feature, status: TrackStatus) -> Self {
        Self {
            id,
            features: vec![feature],
            status,
            missed_frames: 0,
            links: Vec::new(),
            terminated: None,
        }
    }

    #[inline]
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// Observations in strictly increasing frame order.
    #[inline]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    #[inline]
    pub fn status(&self) -> TrackStatus {
        self.status
    }

    #[inline]
    pub fn missed_frames(&self) -> usize {
        self.missed_frames
    }

    #[inline]
    pub fn links(&self) -> &[Provenance] {
        &self.links
    }

    /// Frame and reason of termination, if terminated.
    #[inline]
    pub fn termination(&self) -> Option<(usize, TerminationReason)> {
        self.terminated
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.status != TrackStatus::Terminated
    }

    pub fn last(&self) -> &Feature {
        // A track is created with one feature and never loses any.
        &self.features[self.features.len() - 1]
    }

    pub fn first_frame(&self) -> usize {
        self.features[0].frame
    }

    pub fn last_frame(&self) -> usize {
        self.last().frame
    }

    /// Sum of observed peak values.
    pub fn cumulative_amplitude(&self) -> f64 {
        self.features.iter().map(|f| f.value).sum()
    }

    /// Displacement per frame between the last two observations.
    pub fn velocity(&self) -> DVec2 {
        match self.features.as_slice() {
            [.., prev, last] if last.frame > prev.frame => {
                (last.position - prev.position) / (last.frame - prev.frame) as f64
            }
            _ => DVec2::ZERO,
        }
    }

    /// Expected position at `frame`.
    pub fn predict(&self, frame: usize, prediction: Prediction) -> DVec2 {
        let last = self.last();
        match prediction {
            Prediction::Static => last.position,
            Prediction::ConstantVelocity => {
                let elapsed = frame.saturating_sub(last.frame) as f64;
                last.position + self.velocity() * elapsed
            }
        }
    }

    fn terminate(&mut self, frame: usize, reason: TerminationReason) {
        self.status = TrackStatus::Terminated;
        self.terminated = Some((frame, reason));
    }
}

/// Lifecycle events, in the order they were produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackEvent {
    Birth {
        frame: usize,
        track: TrackId,
        position: DVec2,
    },
    Confirmed {
        frame: usize,
        track: TrackId,
    },
    Merge {
        frame: usize,
        survivor: TrackId,
        absorbed: Vec<TrackId>,
        position: DVec2,
    },
    Split {
        frame: usize,
        parent: TrackId,
        children: Vec<TrackId>,
    },
    Terminated {
        frame: usize,
        track: TrackId,
        reason: TerminationReason,
    },
}

impl TrackEvent {
    pub fn frame(&self) -> usize {
        match self {
            TrackEvent::Birth { frame, .. }
            | TrackEvent::Confirmed { frame, .. }
            | TrackEvent::Merge { frame, .. }
            | TrackEvent::Split { frame, .. }
            | TrackEvent::Terminated { frame, .. } => *frame,
        }
    }
}

/// All tracks of a run plus the identifier counter and event history.
/// Owned by the caller and threaded through successive steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackSet {
    tracks: Vec<Track>,
    next_id: u64,
    last_frame: Option<usize>,
    events: Vec<TrackEvent>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every track ever created, in identifier order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        // Identifiers are dense and tracks are never removed.
        self.tracks.get(id.0 as usize)
    }

    /// Tracks that still take part in matching.
    pub fn live(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.is_live())
    }

    pub fn with_status(&self, status: TrackStatus) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(move |t| t.status == status)
    }

    pub fn events(&self) -> &[TrackEvent] {
        &self.events
    }

    /// Frame of the most recent successful step.
    pub fn last_frame(&self) -> Option<usize> {
        self.last_frame
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn allocate_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Weights of the matching cost terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    /// Per unit of distance between prediction and feature.
    pub position: f64,
    /// Per unit of peak value difference.
    pub amplitude: f64,
    /// Per unit of spread difference.
    pub spread: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            position: 1.0,
            amplitude: 0.0,
            spread: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prediction {
    /// Expect the feature where it was last seen.
    Static,
    /// Extrapolate the last observed displacement.
    #[default]
    ConstantVelocity,
}

/// What happens to the parent track when it splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// The parent terminates; its own match and every extra feature become
    /// child tracks.
    #[default]
    Branch,
    /// The parent keeps its match; only the extra features become children.
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Largest admissible distance between a prediction and a feature.
    pub gate_distance: f64,
    /// Consecutive missed frames tolerated before termination.
    pub max_missed_frames: usize,
    /// Extra frames a new track must be observed on before it is active.
    /// Zero makes new tracks active immediately.
    pub confirmation_frames: usize,
    pub weights: CostWeights,
    pub assignment: AssignmentMethod,
    pub prediction: Prediction,
    pub split_policy: SplitPolicy,
    /// A feature splits from a track only if its value is at least this
    /// fraction of the track's last value.
    pub min_split_ratio: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gate_distance: 2.0,
            max_missed_frames: 2,
            confirmation_frames: 1,
            weights: CostWeights::default(),
            assignment: AssignmentMethod::default(),
            prediction: Prediction::default(),
            split_policy: SplitPolicy::default(),
            min_split_ratio: 0.25,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConstructionError> {
        require_positive(CONTEXT, "gate_distance", self.gate_distance)?;
        require_non_negative(CONTEXT, "weights.position", self.weights.position)?;
        require_non_negative(CONTEXT, "weights.amplitude", self.weights.amplitude)?;
        require_non_negative(CONTEXT, "weights.spread", self.weights.spread)?;
        require_unit_interval(CONTEXT, "min_split_ratio", self.min_split_ratio)
    }
}

// =============================================================================
// Tracker
// =============================================================================

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub frame: usize,
    /// Tracks extended with a feature this frame.
    pub extended: usize,
    pub born: Vec<TrackId>,
    pub terminated: Vec<TrackId>,
    pub events: Vec<TrackEvent>,
}

#[derive(Debug, Clone)]
pub struct FeatureTracker {
    config: TrackerConfig,
}

impl FeatureTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, ConstructionError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Track a whole sequence of `(frame, features)` from an empty set.
    pub fn run<I>(&self, frames: I) -> Result<TrackSet, TrackingError>
    where
        I: IntoIterator<Item = (usize, Vec<Feature>)>,
    {
        let mut set = TrackSet::new();
        for (frame, features) in frames {
            self.step(&mut set, &features, frame)?;
        }
        Ok(set)
    }

    /// Advance `set` by one frame. On error `set` is unchanged.
    pub fn step(
        &self,
        set: &mut TrackSet,
        features: &[Feature],
        frame: usize,
    ) -> Result<StepReport, TrackingError> {
        validate_step(set, features, frame)?;
        let plan = self.plan(set, features, frame);
        Ok(self.commit(set, features, frame, plan))
    }

    /// Decide every transition of the step without touching the set.
    fn plan(&self, set: &TrackSet, features: &[Feature], frame: usize) -> StepPlan {
        let cfg = &self.config;
        let live: Vec<usize> = (0..set.tracks.len())
            .filter(|&i| set.tracks[i].is_live())
            .collect();
        let predictions: Vec<DVec2> = live
            .iter()
            .map(|&i| set.tracks[i].predict(frame, cfg.prediction))
            .collect();

        let costs: Vec<Vec<Option<f64>>> = live
            .par_iter()
            .zip(predictions.par_iter())
            .map(|(&i, &predicted)| {
                let last = set.tracks[i].last();
                features
                    .iter()
                    .map(|f| self.cost(predicted, last, f))
                    .collect()
            })
            .collect();

        let pairs = assignment::assign(&costs, features.len(), cfg.assignment);

        // Track index -> feature index.
        let mut matched: BTreeMap<usize, usize> = pairs
            .iter()
            .map(|&(row, col)| (live[row], col))
            .collect();
        let mut feature_owner: Vec<Option<usize>> = vec![None; features.len()];
        for (&track, &feature) in &matched {
            feature_owner[feature] = Some(track);
        }

        let merges = self.plan_merges(
            set,
            features,
            frame,
            &live,
            &predictions,
            &mut matched,
            &mut feature_owner,
        );
        let survivors: Vec<usize> = merges.iter().map(|m| m.survivor).collect();
        let splits = self.plan_splits(
            set,
            features,
            &live,
            &predictions,
            &matched,
            &survivors,
            &mut feature_owner,
        );

        let births: Vec<usize> = (0..features.len())
            .filter(|&f| feature_owner[f].is_none())
            .collect();

        let absorbed: Vec<usize> = merges.iter().flat_map(|m| m.absorbed.clone()).collect();
        let missed: Vec<usize> = live
            .iter()
            .copied()
            .filter(|i| !matched.contains_key(i) && !absorbed.contains(i))
            .collect();

        StepPlan {
            matched,
            merges,
            splits,
            births,
            missed,
        }
    }

    /// Cost of assigning `feature` to a track, `None` outside the gate.
    fn cost(&self, predicted: DVec2, last: &Feature, feature: &Feature) -> Option<f64> {
        let distance = predicted.distance(feature.position);
        if distance > self.config.gate_distance {
            return None;
        }
        let w = &self.config.weights;
        Some(
            w.position * distance
                + w.amplitude * (feature.value - last.value).abs()
                + w.spread * (feature.spread - last.spread).abs(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_merges(
        &self,
        set: &TrackSet,
        features: &[Feature],
        frame: usize,
        live: &[usize],
        predictions: &[DVec2],
        matched: &mut BTreeMap<usize, usize>,
        feature_owner: &mut [Option<usize>],
    ) -> Vec<MergePlan> {
        let gate = self.config.gate_distance;

        // Feature index -> unmatched tracks converging on it.
        let mut converging: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (row, &track_idx) in live.iter().enumerate() {
            let track = &set.tracks[track_idx];
            if matched.contains_key(&track_idx)
                || track.status != TrackStatus::Active
                || track.last_frame() + 1 != frame
            {
                continue;
            }
            let nearest = (0..features.len())
                .filter(|&f| feature_owner[f].is_some())
                .map(|f| (predictions[row].distance(features[f].position), f))
                .filter(|&(d, _)| d <= gate)
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            if let Some((_, f)) = nearest {
                converging.entry(f).or_default().push(track_idx);
            }
        }

        let mut merges = Vec::with_capacity(converging.len());
        for (feature, mut group) in converging {
            let Some(holder) = feature_owner[feature] else {
                continue;
            };
            group.push(holder);
            group.sort_unstable();

            let survivor = group
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    let ca = set.tracks[a].cumulative_amplitude();
                    let cb = set.tracks[b].cumulative_amplitude();
                    // Lower index wins ties.
                    ca.total_cmp(&cb).then(b.cmp(&a))
                })
                .unwrap_or(holder);

            if survivor != holder {
                matched.remove(&holder);
                matched.insert(survivor, feature);
                feature_owner[feature] = Some(survivor);
            }

            let absorbed: Vec<usize> = group.into_iter().filter(|&t| t != survivor).collect();
            merges.push(MergePlan {
                feature,
                survivor,
                absorbed,
            });
        }
        merges
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_splits(
        &self,
        set: &TrackSet,
        features: &[Feature],
        live: &[usize],
        predictions: &[DVec2],
        matched: &BTreeMap<usize, usize>,
        survivors: &[usize],
        feature_owner: &mut [Option<usize>],
    ) -> Vec<SplitPlan> {
        let gate = self.config.gate_distance;
        let ratio = self.config.min_split_ratio;

        let parents: Vec<(usize, DVec2)> = live
            .iter()
            .zip(predictions)
            .filter(|(i, _)| {
                matched.contains_key(*i)
                    && set.tracks[**i].status != TrackStatus::New
                    && !survivors.contains(*i)
            })
            .map(|(&i, &p)| (i, p))
            .collect();

        let mut extras: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for f in 0..features.len() {
            if feature_owner[f].is_some() {
                continue;
            }
            let feature = &features[f];
            let parent = parents
                .iter()
                .filter(|(i, _)| feature.value >= ratio * set.tracks[*i].last().value)
                .map(|&(i, p)| (p.distance(feature.position), i))
                .filter(|&(d, _)| d <= gate)
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            if let Some((_, parent)) = parent {
                extras.entry(parent).or_default().push(f);
            }
        }

        extras
            .into_iter()
            .map(|(parent, extra)| {
                for &f in &extra {
                    feature_owner[f] = Some(parent);
                }
                SplitPlan { parent, extra }
            })
            .collect()
    }

    /// Apply a plan. Infallible.
    fn commit(
        &self,
        set: &mut TrackSet,
        features: &[Feature],
        frame: usize,
        plan: StepPlan,
    ) -> StepReport {
        let cfg = &self.config;
        let mut events = Vec::new();
        let mut born = Vec::new();
        let mut terminated = Vec::new();
        let mut extended = 0;

        // Merges: absorbed tracks end, survivors record the relation.
        for merge in &plan.merges {
            let survivor_id = set.tracks[merge.survivor].id;
            let absorbed_ids: Vec<TrackId> =
                merge.absorbed.iter().map(|&i| set.tracks[i].id).collect();
            for &i in &merge.absorbed {
                let track = &mut set.tracks[i];
                track.links.push(Provenance {
                    kind: LinkKind::MergedInto,
                    other: survivor_id,
                    frame,
                });
                track.terminate(frame, TerminationReason::Merged);
            }
            for &id in &absorbed_ids {
                set.tracks[merge.survivor].links.push(Provenance {
                    kind: LinkKind::Absorbed,
                    other: id,
                    frame,
                });
            }
            events.push(TrackEvent::Merge {
                frame,
                survivor: survivor_id,
                absorbed: absorbed_ids.clone(),
                position: features[merge.feature].position,
            });
            for id in absorbed_ids {
                events.push(TrackEvent::Terminated {
                    frame,
                    track: id,
                    reason: TerminationReason::Merged,
                });
                terminated.push(id);
            }
        }

        // Splits.
        let mut branched: Vec<usize> = Vec::new();
        for split in &plan.splits {
            let parent_id = set.tracks[split.parent].id;

            let mut child_features = split.extra.clone();
            if cfg.split_policy == SplitPolicy::Branch {
                if let Some(&own) = plan.matched.get(&split.parent) {
                    child_features.push(own);
                }
                child_features.sort_unstable();
                branched.push(split.parent);
            }

            let mut children = Vec::with_capacity(child_features.len());
            for f in child_features {
                let id = set.allocate_id();
                let mut child = Track::new(id, features[f], TrackStatus::Active);
                child.links.push(Provenance {
                    kind: LinkKind::SplitFrom,
                    other: parent_id,
                    frame,
                });
                set.tracks.push(child);
                set.tracks[split.parent].links.push(Provenance {
                    kind: LinkKind::SplitInto,
                    other: id,
                    frame,
                });
                children.push(id);
            }
            born.extend(children.iter().copied());
            events.push(TrackEvent::Split {
                frame,
                parent: parent_id,
                children,
            });

            if cfg.split_policy == SplitPolicy::Branch {
                set.tracks[split.parent].terminate(frame, TerminationReason::Split);
                events.push(TrackEvent::Terminated {
                    frame,
                    track: parent_id,
                    reason: TerminationReason::Split,
                });
                terminated.push(parent_id);
            }
        }

        // Extensions.
        for (&i, &f) in &plan.matched {
            if branched.contains(&i) {
                continue;
            }
            let track = &mut set.tracks[i];
            debug_assert!(track.last_frame() < frame);
            track.features.push(features[f]);
            track.missed_frames = 0;
            extended += 1;
            match track.status {
                TrackStatus::New if track.features.len() > cfg.confirmation_frames => {
                    track.status = TrackStatus::Active;
                    events.push(TrackEvent::Confirmed {
                        frame,
                        track: track.id,
                    });
                }
                TrackStatus::Missing => track.status = TrackStatus::Active,
                _ => {}
            }
        }

        // Births.
        let birth_status = if cfg.confirmation_frames == 0 {
            TrackStatus::Active
        } else {
            TrackStatus::New
        };
        for &f in &plan.births {
            let id = set.allocate_id();
            set.tracks.push(Track::new(id, features[f], birth_status));
            events.push(TrackEvent::Birth {
                frame,
                track: id,
                position: features[f].position,
            });
            born.push(id);
        }

        // Misses.
        for &i in &plan.missed {
            let track = &mut set.tracks[i];
            let reason = if track.status == TrackStatus::New {
                Some(TerminationReason::Unconfirmed)
            } else {
                track.missed_frames += 1;
                track.status = TrackStatus::Missing;
                (track.missed_frames > cfg.max_missed_frames).then_some(TerminationReason::Missed)
            };
            if let Some(reason) = reason {
                track.terminate(frame, reason);
                events.push(TrackEvent::Terminated {
                    frame,
                    track: track.id,
                    reason,
                });
                terminated.push(track.id);
            }
        }

        set.last_frame = Some(frame);
        set.events.extend(events.iter().cloned());

        tracing::debug!(
            frame,
            features = features.len(),
            extended,
            born = born.len(),
            terminated = terminated.len(),
            merges = plan.merges.len(),
            splits = plan.splits.len(),
            live = set.live().count(),
            "tracker step"
        );

        StepReport {
            frame,
            extended,
            born,
            terminated,
            events,
        }
    }
}

fn validate_step(set: &TrackSet, features: &[Feature], frame: usize) -> Result<(), TrackingError> {
    if let Some(last) = set.last_frame {
        let expected = last + 1;
        if frame != expected {
            return Err(TrackingError::OutOfSequence { frame, expected });
        }
    }
    for (feature_index, feature) in features.iter().enumerate() {
        if feature.frame != frame {
            return Err(TrackingError::FrameMismatch {
                frame,
                feature_index,
                feature_frame: feature.frame,
            });
        }
        if !feature.is_finite() {
            return Err(TrackingError::NonFiniteFeature {
                frame,
                feature_index,
            });
        }
    }
    if let Some(track) = set.live().find(|t| t.last_frame() >= frame) {
        return Err(TrackingError::DuplicateFrame {
            track: track.id.0,
            frame,
        });
    }
    Ok(())
}

#[derive(Debug)]
struct MergePlan {
    feature: usize,
    survivor: usize,
    absorbed: Vec<usize>,
}

#[derive(Debug)]
struct SplitPlan {
    parent: usize,
    extra: Vec<usize>,
}

#[derive(Debug)]
struct StepPlan {
    matched: BTreeMap<usize, usize>,
    merges: Vec<MergePlan>,
    splits: Vec<SplitPlan>,
    births: Vec<usize>,
    missed: Vec<usize>,
}
