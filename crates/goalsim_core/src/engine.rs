//! Engine entry points: `analyze` and `recommend`.
//!
//! The engine owns the assumption provider, the result cache and its
//! auto-save task, and the concurrent-analysis ceiling. Goals and profiles
//! pass through unchanged; per-call state lives on the stack.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use jiff::civil::Date;
use tracing::debug;

use crate::aggregate::aggregate_result;
use crate::assumptions::{AssumptionOverrides, MarketAssumptions};
use crate::cache::{AutoSaveHandle, ResultCache};
use crate::config::EngineConfig;
use crate::driver::run_trials;
use crate::error::Result;
use crate::model::goal::Goal;
use crate::model::inputs::{SimulationInputs, TrialSet};
use crate::model::profile::Profile;
use crate::model::result::{ProbabilityResult, Recommendation};
use crate::schedule::{
    allocation_schedule, contribution_schedule, AllocationPolicy, ContributionPattern,
};

/// Per-call analysis options. Unset fields fall back to engine defaults.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub trial_count: Option<usize>,
    pub root_seed: Option<u64>,
    /// Whether to simulate full yearly trajectories (enables the
    /// time-based metrics). Defaults to on.
    pub include_trajectories: Option<bool>,
    pub deadline: Option<Instant>,
    /// Bypass the cache for this call; the fresh result is still stored.
    pub force_recalculate: bool,
    /// Analysis "today"; defaults to the current date. Fixing it makes
    /// results reproducible regardless of wall clock.
    pub analysis_date: Option<Date>,
    /// How contributions evolve over the horizon.
    pub contribution_pattern: Option<ContributionPattern>,
    /// Allocation policy; defaults to the goal category's policy.
    pub allocation_policy: Option<AllocationPolicy>,
}

/// Options for `recommend`, extending the analysis options.
#[derive(Debug, Clone, Default)]
pub struct RecommendOptions {
    pub analysis: AnalysisOptions,
    /// Cap on returned recommendations (default 5).
    pub max_recommendations: Option<usize>,
    /// Minimum probability gain a candidate must clear (default 0.005).
    pub min_delta: Option<f64>,
}

pub struct Engine {
    config: EngineConfig,
    assumptions: MarketAssumptions,
    cache: Arc<ResultCache>,
    active_analyses: AtomicUsize,
    autosave: Option<AutoSaveHandle>,
}

impl Engine {
    /// Engine with default market assumptions.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        // Default overrides are always valid
        Self::with_assumptions(config, AssumptionOverrides::default())
            .unwrap_or_else(|_| unreachable!("default assumptions are valid"))
    }

    /// Engine with configured assumption overrides.
    pub fn with_assumptions(
        config: EngineConfig,
        overrides: AssumptionOverrides,
    ) -> Result<Self> {
        let assumptions = MarketAssumptions::new(overrides)?;
        let cache = Arc::new(ResultCache::new(config.cache.clone()));
        let autosave = cache.spawn_auto_save();
        Ok(Self {
            config,
            assumptions,
            cache,
            active_analyses: AtomicUsize::new(0),
            autosave,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn assumptions(&self) -> &MarketAssumptions {
        &self.assumptions
    }

    /// The result cache, for stats/invalidate/save/load/configure.
    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Stop the auto-save task and attempt a final snapshot. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.autosave.take() {
            handle.shutdown();
        }
    }

    /// Estimate the probability of meeting the goal by its target date.
    pub fn analyze(
        &self,
        goal: &Goal,
        profile: &Profile,
        options: &AnalysisOptions,
    ) -> Result<ProbabilityResult> {
        let _permit = self.acquire_permit()?;
        self.analyze_inner(goal, profile, options)
    }

    /// Analysis without taking a concurrency permit; the recommender holds
    /// one permit across the whole candidate sweep.
    pub(crate) fn analyze_inner(
        &self,
        goal: &Goal,
        profile: &Profile,
        options: &AnalysisOptions,
    ) -> Result<ProbabilityResult> {
        let as_of = options.analysis_date.unwrap_or_else(today);
        goal.validate(as_of)?;
        debug!(goal = %goal.id, "assumptions resolved");

        let trial_count = options
            .trial_count
            .unwrap_or(self.config.sim.default_trials);

        if goal.is_achieved() {
            // Zero-variance success: every trial sits at the current amount
            let trials = achieved_trial_set(goal.current_amount, trial_count);
            return aggregate_result(&trials, goal, profile, &self.assumptions, 0);
        }

        let inputs = self.build_inputs(goal, options, as_of, trial_count)?;
        let trials = self.run_cached(&inputs, options)?;
        debug!(goal = %goal.id, trials = trials.trial_count(), "baseline simulated");

        aggregate_result(&trials, goal, profile, &self.assumptions, inputs.years)
    }

    /// Search goal adjustments that raise the success probability; see
    /// [`crate::recommend`].
    pub fn recommend(
        &self,
        goal: &Goal,
        profile: &Profile,
        options: &RecommendOptions,
    ) -> Result<Vec<Recommendation>> {
        let _permit = self.acquire_permit()?;
        let baseline = self.analyze_inner(goal, profile, &options.analysis)?;
        crate::recommend::recommend_adjustments(self, goal, profile, &baseline, options)
    }

    pub(crate) fn build_inputs(
        &self,
        goal: &Goal,
        options: &AnalysisOptions,
        as_of: Date,
        trial_count: usize,
    ) -> Result<SimulationInputs> {
        let mut years = goal.horizon_years(as_of);
        if let Some(cap) = self
            .assumptions
            .horizon_override_for(goal.category, goal, as_of)
        {
            years = cap;
        }

        let pattern = options.contribution_pattern.clone().unwrap_or_default();
        let contributions = contribution_schedule(goal.monthly_contribution, &pattern, years)?;
        let policy = options
            .allocation_policy
            .unwrap_or_else(|| AllocationPolicy::for_category(goal.category));
        let allocations = allocation_schedule(goal.allocation, policy, years);

        Ok(SimulationInputs {
            initial_amount: goal.current_amount,
            contributions,
            years,
            allocations,
            asset_params: self.assumptions.asset_params(),
            trial_count,
            root_seed: options.root_seed.unwrap_or(self.config.sim.default_seed),
            include_trajectories: options.include_trajectories.unwrap_or(true),
        })
    }

    pub(crate) fn run_cached(
        &self,
        inputs: &SimulationInputs,
        options: &AnalysisOptions,
    ) -> Result<Arc<TrialSet>> {
        let key = inputs.fingerprint();
        if !options.force_recalculate {
            if let Some(hit) = self.cache.get(&key) {
                return Ok(hit);
            }
        }

        let trials = Arc::new(run_trials(inputs, &self.config.sim, options.deadline)?);
        self.cache.put(key, Arc::clone(&trials));
        Ok(trials)
    }

    fn acquire_permit(&self) -> Result<AnalysisPermit<'_>> {
        let limit = self.config.sim.max_concurrent_analyses;
        let previous = self
            .active_analyses
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < limit).then_some(active + 1)
            });
        match previous {
            Ok(_) => Ok(AnalysisPermit {
                counter: &self.active_analyses,
            }),
            Err(active) => Err(crate::error::EngineError::BusyRejected { active, limit }),
        }
    }
}

/// RAII guard for the concurrent-analysis ceiling.
struct AnalysisPermit<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for AnalysisPermit<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

fn achieved_trial_set(current_amount: f64, trial_count: usize) -> TrialSet {
    TrialSet {
        terminal_values: vec![current_amount; trial_count],
        trajectories: Some(vec![vec![current_amount]; trial_count]),
        degenerate_trials: 0,
    }
}

fn today() -> Date {
    jiff::Zoned::now().date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::goal::{Allocation, GoalBuilder};
    use crate::model::profile::RiskTolerance;

    fn as_of() -> Date {
        jiff::civil::date(2025, 1, 1)
    }

    fn engine() -> Engine {
        let mut config = EngineConfig::default();
        config.cache.save_interval_seconds = 0;
        Engine::new(config)
    }

    fn profile() -> Profile {
        Profile {
            age: 35,
            annual_income: 2_400_000.0,
            monthly_expenses: 80_000.0,
            dependents: 1,
            risk_tolerance: RiskTolerance::Moderate,
            country: "IN".to_string(),
        }
    }

    fn options() -> AnalysisOptions {
        AnalysisOptions {
            trial_count: Some(1000),
            root_seed: Some(42),
            analysis_date: Some(as_of()),
            ..AnalysisOptions::default()
        }
    }

    #[test]
    fn test_achieved_goal_is_certain() {
        let goal = GoalBuilder::new("done", as_of())
            .target(100_000.0)
            .current(150_000.0)
            .years(5)
            .build()
            .unwrap();
        let result = engine().analyze(&goal, &profile(), &options()).unwrap();
        assert_eq!(result.success.success_probability, 1.0);
        assert_eq!(result.distribution.std_dev, 0.0);
        assert_eq!(result.time.median_years_to_target, Some(0.0));
    }

    #[test]
    fn test_invalid_goal_rejected_before_simulation() {
        let goal = Goal {
            id: "bad".to_string(),
            category: crate::model::goal::GoalCategory::Custom,
            target_amount: -5.0,
            current_amount: 0.0,
            monthly_contribution: 0.0,
            target_date: jiff::civil::date(2030, 1, 1),
            importance: crate::model::goal::Importance::Low,
            flexibility: crate::model::goal::Flexibility::Fixed,
            allocation: Allocation::all_cash(),
        };
        assert!(engine().analyze(&goal, &profile(), &options()).is_err());
    }

    #[test]
    fn test_cache_hit_equals_recomputation() {
        let engine = engine();
        let goal = GoalBuilder::new("g1", as_of())
            .target(10_000_000.0)
            .current(1_000_000.0)
            .monthly(50_000.0)
            .years(10)
            .allocation(Allocation::new(0.6, 0.3, 0.05, 0.0, 0.05))
            .build()
            .unwrap();

        let first = engine.analyze(&goal, &profile(), &options()).unwrap();
        let stats_before = engine.cache().stats();

        let second = engine.analyze(&goal, &profile(), &options()).unwrap();
        let stats_after = engine.cache().stats();

        assert_eq!(first, second);
        assert_eq!(stats_after.hits, stats_before.hits + 1);

        // Forcing recalculation must also reproduce the result bit for bit
        let mut forced_options = options();
        forced_options.force_recalculate = true;
        let forced = engine.analyze(&goal, &profile(), &forced_options).unwrap();
        assert_eq!(first, forced);
    }

    #[test]
    fn test_concurrency_ceiling_rejects() {
        let mut config = EngineConfig::default();
        config.cache.save_interval_seconds = 0;
        config.sim.max_concurrent_analyses = 0;
        let engine = Engine::new(config);
        let goal = GoalBuilder::new("g1", as_of())
            .target(1_000_000.0)
            .years(5)
            .build()
            .unwrap();
        let result = engine.analyze(&goal, &profile(), &options());
        assert!(matches!(
            result,
            Err(crate::error::EngineError::BusyRejected { .. })
        ));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut engine = engine();
        engine.shutdown();
        engine.shutdown();
    }
}
