//! The stage abstraction and the rule evaluator shared by predicate stages.

use rayon::prelude::*;
use tracing::debug;

use crate::cleaning::types::{CleaningStatistics, ExclusionEvent, ExclusionReason};
use crate::record::{Field, InputSchema, TripRecord};

/// What a stage sees besides its input records.
pub struct StageContext<'a> {
    pub schema: &'a InputSchema,
    /// Statistics accumulated by the stages that already ran.
    pub statistics: &'a CleaningStatistics,
    /// Batches at least this large are evaluated on the rayon pool.
    pub parallel_threshold: usize,
}

impl StageContext<'_> {
    fn parallel(&self, len: usize) -> bool {
        len >= self.parallel_threshold
    }
}

#[derive(Debug, Default)]
pub struct StageOutput {
    pub survivors: Vec<TripRecord>,
    pub events: Vec<ExclusionEvent>,
}

/// One named step of the cleaning sequence.
///
/// A stage consumes the survivors of its predecessor and never fails: every
/// removal is reported as an [`ExclusionEvent`], and a stage that removes
/// nothing reports nothing.
pub trait CleaningStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, records: Vec<TripRecord>, ctx: &StageContext<'_>) -> StageOutput;
}

/// A per-record exclusion predicate tagged with the reason it reports.
#[derive(Clone, Copy)]
pub struct Rule {
    pub reason: ExclusionReason,
    pub excludes: fn(&TripRecord) -> bool,
}

impl Rule {
    pub const fn new(reason: ExclusionReason, excludes: fn(&TripRecord) -> bool) -> Self {
        Self { reason, excludes }
    }
}

/// Drops every record the rule excludes, preserving input order.
/// Returns the survivors and how many records were removed.
pub fn apply_rule(
    records: Vec<TripRecord>,
    rule: &Rule,
    ctx: &StageContext<'_>,
) -> (Vec<TripRecord>, usize) {
    let flags: Vec<bool> = if ctx.parallel(records.len()) {
        records.par_iter().map(|r| (rule.excludes)(r)).collect()
    } else {
        records.iter().map(|r| (rule.excludes)(r)).collect()
    };

    let removed = flags.iter().filter(|drop| **drop).count();
    if removed == 0 {
        return (records, 0);
    }

    let survivors = records
        .into_iter()
        .zip(flags)
        .filter_map(|(record, drop)| (!drop).then_some(record))
        .collect();

    (survivors, removed)
}

/// A stage made of an optional per-record preparation step followed by an
/// ordered list of rules, each applied to the survivors of the one before.
pub struct RuleStage {
    name: &'static str,
    prepare: Option<fn(TripRecord) -> TripRecord>,
    rules: Vec<Rule>,
    /// The stage is skipped when this field is absent from the input schema.
    requires: Option<Field>,
}

impl RuleStage {
    pub fn new(name: &'static str, rules: Vec<Rule>) -> Self {
        Self {
            name,
            prepare: None,
            rules,
            requires: None,
        }
    }

    pub fn with_prepare(mut self, prepare: fn(TripRecord) -> TripRecord) -> Self {
        self.prepare = Some(prepare);
        self
    }

    pub fn requiring(mut self, field: Field) -> Self {
        self.requires = Some(field);
        self
    }

    /// Whether a single record would come out of this stage.
    pub fn admits(&self, record: &TripRecord) -> bool {
        match self.prepare {
            Some(prepare) => {
                let prepared = prepare(record.clone());
                self.rules.iter().all(|rule| !(rule.excludes)(&prepared))
            }
            None => self.rules.iter().all(|rule| !(rule.excludes)(record)),
        }
    }
}

impl CleaningStage for RuleStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn apply(&self, records: Vec<TripRecord>, ctx: &StageContext<'_>) -> StageOutput {
        if self.requires.is_some_and(|field| !ctx.schema.has(field)) {
            debug!(stage = self.name, "Required field absent from schema, stage skipped");
            return StageOutput {
                survivors: records,
                events: Vec::new(),
            };
        }

        debug!(
            stage = self.name,
            input = records.len(),
            excluded_so_far = ctx.statistics.total_excluded(),
            "Stage started"
        );

        let mut survivors = match self.prepare {
            Some(prepare) if ctx.parallel(records.len()) => {
                records.into_par_iter().map(prepare).collect()
            }
            Some(prepare) => records.into_iter().map(prepare).collect(),
            None => records,
        };

        let mut events = Vec::new();
        for rule in &self.rules {
            let (kept, removed) = apply_rule(survivors, rule, ctx);
            survivors = kept;
            if removed > 0 {
                events.push(ExclusionEvent::new(rule.reason, removed));
            }
        }

        StageOutput { survivors, events }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(
        schema: &'a InputSchema,
        stats: &'a CleaningStatistics,
        threshold: usize,
    ) -> StageContext<'a> {
        StageContext {
            schema,
            statistics: stats,
            parallel_threshold: threshold,
        }
    }

    fn with_distance(d: f64) -> TripRecord {
        TripRecord {
            trip_distance: Some(d),
            ..Default::default()
        }
    }

    fn is_long(r: &TripRecord) -> bool {
        r.trip_distance.is_some_and(|d| d > 10.0)
    }

    const LONG: Rule = Rule::new(ExclusionReason::ExcessiveDistance, is_long);

    #[test]
    fn test_apply_rule_preserves_order() {
        let schema = InputSchema::full();
        let stats = CleaningStatistics::default();
        let records = vec![
            with_distance(1.0),
            with_distance(20.0),
            with_distance(2.0),
            with_distance(30.0),
            with_distance(3.0),
        ];

        let (kept, removed) = apply_rule(records, &LONG, &ctx(&schema, &stats, usize::MAX));

        assert_eq!(removed, 2);
        let distances: Vec<_> = kept.iter().map(|r| r.trip_distance.unwrap()).collect();
        assert_eq!(distances, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_parallel_and_sequential_evaluation_agree() {
        let schema = InputSchema::full();
        let stats = CleaningStatistics::default();
        let records: Vec<_> = (0..1_000).map(|i| with_distance((i % 25) as f64)).collect();

        let (seq, seq_removed) =
            apply_rule(records.clone(), &LONG, &ctx(&schema, &stats, usize::MAX));
        let (par, par_removed) = apply_rule(records, &LONG, &ctx(&schema, &stats, 0));

        assert_eq!(seq_removed, par_removed);
        assert_eq!(seq, par);
    }

    #[test]
    fn test_rule_stage_emits_no_event_when_nothing_removed() {
        let schema = InputSchema::full();
        let stats = CleaningStatistics::default();
        let stage = RuleStage::new("distance", vec![LONG]);

        let out = stage.apply(vec![with_distance(1.0)], &ctx(&schema, &stats, usize::MAX));

        assert_eq!(out.survivors.len(), 1);
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_rule_stage_skipped_without_required_field() {
        let schema = InputSchema::full().without(Field::TripDistance);
        let stats = CleaningStatistics::default();
        let stage = RuleStage::new("distance", vec![LONG]).requiring(Field::TripDistance);

        let out = stage.apply(vec![with_distance(50.0)], &ctx(&schema, &stats, usize::MAX));

        assert_eq!(out.survivors.len(), 1);
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_admits_matches_apply() {
        let stage = RuleStage::new("distance", vec![LONG]);
        assert!(stage.admits(&with_distance(10.0)));
        assert!(!stage.admits(&with_distance(10.5)));
    }
}
