//! Per-signal processing and position monitoring.
//!
//! [`Session`] owns every piece of mutable session state: guards, counters
//! and the options metadata of open positions. Only the actor holds it, so
//! admission-control mutations are serialised by construction.

use crate::clock::{Clock, SystemClock};
use crate::planner::{plan_options, OptionsPlan, OptionsPositionMeta};
use crate::status::{
    DailyStatus, KillSwitchReport, OrchestratorEvent, PositionFailure, PositionsStatus,
    SessionCounters,
};
use crate::store::{DecisionRecord, InMemoryStateStore, StateStore};
use algo_trade_core::{
    classify, AppConfig, Decision, GateResult, MarketDataProvider, Regime, RunMode, Signal,
    CONTRACT_MULTIPLIER,
};
use algo_trade_decision::gates::{GATE_COOLDOWN, GATE_DUPLICATE, GATE_PORTFOLIO, GATE_STRIKES};
use algo_trade_decision::{
    trading_date, CooldownGuard, CooldownStore, DailyLimitGuard, DuplicateDetector,
    ExposureSnapshot, GateEngine, GuardOutcome, InMemoryCooldownStore, OptionsGateEngine,
    PositionLimitGuard, Screening, VolatilityGuard,
};
use algo_trade_execution::{
    ExecutionVenue, ExitReason, Order, OrderSide, PaperExecutor, PaperPosition,
    DIRECTIONAL,
};
use algo_trade_options::{
    check_exit_rules, EventCalendar, ExitAction, ExitRule, ExitSnapshot, PortfolioGreeks,
    PortfolioGreeksGuard, PositionSizer,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Venue closes tried per position by the kill switch.
pub const MAX_CLOSE_ATTEMPTS: u32 = 5;

/// Collaborators injected at construction.
pub struct Dependencies {
    pub provider: Arc<dyn MarketDataProvider>,
    pub venue: Arc<dyn ExecutionVenue>,
    pub store: Arc<dyn StateStore>,
    pub cooldown_store: Arc<dyn CooldownStore>,
    pub calendar: EventCalendar,
    pub clock: Arc<dyn Clock>,
}

impl Dependencies {
    /// Paper venue over `provider`, in-memory stores and the system clock.
    #[must_use]
    pub fn paper(config: &AppConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        let venue = PaperExecutor::new(config.paper.clone(), Arc::clone(&provider));
        Self {
            provider,
            venue: Arc::new(venue),
            store: Arc::new(InMemoryStateStore::new()),
            cooldown_store: Arc::new(InMemoryCooldownStore::new()),
            calendar: EventCalendar::default(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_calendar(mut self, calendar: EventCalendar) -> Self {
        self.calendar = calendar;
        self
    }
}

pub struct Session {
    config: AppConfig,
    provider: Arc<dyn MarketDataProvider>,
    venue: Arc<dyn ExecutionVenue>,
    store: Arc<dyn StateStore>,
    calendar: EventCalendar,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<OrchestratorEvent>,

    gates: GateEngine,
    options_gates: OptionsGateEngine,
    sizer: PositionSizer,
    duplicates: DuplicateDetector,
    cooldowns: CooldownGuard,
    daily: DailyLimitGuard,
    position_limits: PositionLimitGuard,
    volatility: VolatilityGuard,
    portfolio: PortfolioGreeksGuard,

    pub(crate) counters: SessionCounters,
    options_meta: HashMap<String, OptionsPositionMeta>,
}

impl Session {
    #[must_use]
    pub fn new(
        config: AppConfig,
        deps: Dependencies,
        events: broadcast::Sender<OrchestratorEvent>,
    ) -> Self {
        let today = deps.clock.now().date_naive();
        Self {
            gates: GateEngine::new(config.account.clone()),
            options_gates: OptionsGateEngine::new(config.account.clone()),
            sizer: PositionSizer::new(config.account.size, config.account.risk_percent),
            duplicates: DuplicateDetector::new(config.duplicate),
            cooldowns: CooldownGuard::new(deps.cooldown_store, config.cooldowns),
            daily: DailyLimitGuard::from_config(&config.orchestrator, today),
            position_limits: PositionLimitGuard::from_config(&config.account, &config.orchestrator),
            volatility: VolatilityGuard::new(config.volatility),
            portfolio: PortfolioGreeksGuard::new(config.portfolio_limits),
            provider: deps.provider,
            venue: deps.venue,
            store: deps.store,
            calendar: deps.calendar,
            clock: deps.clock,
            events,
            counters: SessionCounters::default(),
            options_meta: HashMap::new(),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Daily counters reset by UTC calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub(crate) fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub(crate) fn emit(&self, event: OrchestratorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Rebuilds guards from a new configuration. Counters and cooldowns survive.
    pub fn apply_config(&mut self, config: AppConfig) {
        if config.duplicate != self.config.duplicate {
            self.duplicates = DuplicateDetector::new(config.duplicate);
        }
        self.gates = GateEngine::new(config.account.clone());
        self.options_gates = OptionsGateEngine::new(config.account.clone());
        self.sizer = PositionSizer::new(config.account.size, config.account.risk_percent);
        self.cooldowns.set_config(config.cooldowns);
        self.daily.set_limits(
            config.orchestrator.max_daily_trades,
            config.orchestrator.max_daily_loss,
        );
        self.position_limits = PositionLimitGuard::from_config(&config.account, &config.orchestrator);
        self.volatility = VolatilityGuard::new(config.volatility);
        self.portfolio = PortfolioGreeksGuard::new(config.portfolio_limits);
        self.config = config;
    }

    pub(crate) fn reset_counters(&mut self) {
        self.counters = SessionCounters::default();
    }

    pub(crate) fn daily_record(&self) -> algo_trade_decision::DailyRecord {
        self.daily.record(self.today())
    }

    pub(crate) fn restore_daily(&self, record: algo_trade_decision::DailyRecord) {
        self.daily.restore(record);
    }

    #[must_use]
    pub fn daily_status(&self) -> DailyStatus {
        DailyStatus::from_record(
            self.daily_record(),
            self.daily.max_daily_trades(),
            self.daily.max_daily_loss(),
        )
    }

    pub async fn positions_status(&self) -> PositionsStatus {
        let (exposure, greeks) = self.exposure().await;
        PositionsStatus {
            open_positions: exposure.open_positions,
            total_exposure: exposure.total,
            portfolio_greeks: greeks,
        }
    }

    async fn exposure(&self) -> (ExposureSnapshot, PortfolioGreeks) {
        let positions = self.venue.get_positions().await;
        let mut exposure = ExposureSnapshot::default();
        for position in &positions {
            let underlying = self
                .options_meta
                .get(&position.id)
                .map_or(position.symbol.as_str(), |m| m.underlying.as_str());
            exposure.add(underlying, position.notional());
        }
        let greeks = PortfolioGreeks::from_positions(positions.iter().filter_map(|p| p.greeks));
        (exposure, greeks)
    }

    fn routes_to_options(&self, signal: &Signal) -> bool {
        signal.is_options
            || self
                .config
                .orchestrator
                .options_symbols
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&signal.symbol))
    }

    /// Runs one signal through validation, the gates and admission control,
    /// and executes it in paper mode.
    ///
    /// Returns `None` when the signal fails schema validation.
    pub async fn process_signal(&mut self, signal: Signal) -> Option<Decision> {
        self.counters.signals_generated += 1;
        let now = self.now();

        if let Err(e) = signal.validate() {
            self.counters.signals_rejected += 1;
            tracing::warn!(symbol = %signal.symbol, error = %e, "Signal rejected by validation");
            self.emit(OrchestratorEvent::SignalRejected {
                symbol: signal.symbol.clone(),
                reason: e.to_string(),
            });
            return None;
        }

        let regime = classify(signal.resolution.as_deref(), None);
        let first_tag = signal.active_signals.first().cloned();

        let duplicate = self.duplicates.check_and_record(&signal);
        let (mut decision, plan) = if let GuardOutcome::Blocked { reason } = duplicate {
            tracing::info!(symbol = %signal.symbol, reason = %reason, "Duplicate signal");
            let gates = vec![GateResult::fail(GATE_DUPLICATE, reason.clone())];
            (Decision::block(&signal.symbol, regime, gates, first_tag, reason), None)
        } else if self.routes_to_options(&signal) {
            self.evaluate_options(&signal, regime, now).await
        } else {
            (self.gates.evaluate(&signal, regime, now), None)
        };

        if decision.is_trade() {
            // Same measure as `PaperPosition::notional` for the open book.
            let proposed = plan.as_ref().map_or_else(
                || signal.entry_price * Decimal::from(decision.risk.quantity),
                OptionsPlan::entry_cost,
            );
            self.admit(&mut decision, &signal, proposed, now).await;
        }

        tracing::info!(
            symbol = %signal.symbol,
            regime = %regime,
            outcome = ?decision.outcome,
            reason = decision.block_reason.as_deref().unwrap_or(""),
            gates = decision.gate_results.len(),
            "Decision made"
        );
        self.audit(&signal, &decision, now).await;
        self.emit(OrchestratorEvent::DecisionMade(Box::new(decision.clone())));

        if decision.is_trade() {
            match self.config.orchestrator.mode {
                RunMode::Paper => self.execute(&signal, &decision, regime, plan.as_ref(), now).await,
                RunMode::Shadow | RunMode::Live => {
                    tracing::info!(symbol = %signal.symbol, "Shadow mode, decision logged only");
                }
            }
        } else {
            self.counters.trades_blocked += 1;
        }

        Some(decision)
    }

    async fn evaluate_options(
        &self,
        signal: &Signal,
        regime: Regime,
        now: DateTime<Utc>,
    ) -> (Decision, Option<OptionsPlan>) {
        let passed = match self.options_gates.screen(signal, regime, now) {
            Screening::Blocked(decision) => return (decision, None),
            Screening::Cleared(passed) => passed,
        };

        let planned = plan_options(
            self.provider.as_ref(),
            &self.config.retry,
            &self.sizer,
            signal,
            regime,
            trading_date(now),
        )
        .await;

        let plan = match planned {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(symbol = %signal.symbol, error = %e, "Options plan unavailable");
                let reason = e.to_string();
                let mut gates = passed;
                gates.push(GateResult::fail(GATE_STRIKES, reason.clone()));
                let decision = Decision::block(
                    &signal.symbol,
                    regime,
                    gates,
                    signal.active_signals.first().cloned(),
                    reason,
                );
                return (decision, None);
            }
        };

        let evaluated = self.options_gates.evaluate(
            signal,
            regime,
            Some(&plan.gate_input),
            self.calendar.events(),
            now,
        );
        let mut decision = evaluated.decision;
        if !decision.is_trade() {
            return (decision, None);
        }

        decision.risk.quantity = plan.sizing.contracts;
        let (_, current) = self.exposure().await;
        let check = self.portfolio.check_projected(&current, &plan.sizing);
        if check.approved {
            decision.append_gate(
                GateResult::pass(GATE_PORTFOLIO).with_reason("Within portfolio Greeks limits"),
            );
        } else {
            decision.append_gate(GateResult::fail(GATE_PORTFOLIO, check.breaches.join("; ")));
        }
        (decision, Some(plan))
    }

    /// Appended admission stage: volatility, cooldowns, daily and position limits.
    async fn admit(&self, decision: &mut Decision, signal: &Signal, proposed: Decimal, now: DateTime<Utc>) {
        let volatility = self.volatility.check(self.provider.as_ref()).await;
        volatility.annotate(decision);
        self.report_degraded("volatility", &volatility.outcome);
        if !decision.is_trade() {
            return;
        }

        match self
            .cooldowns
            .check_all(&signal.symbol, &signal.signal_type, now)
            .await
        {
            GuardOutcome::Blocked { reason } => {
                decision.append_gate(GateResult::fail(GATE_COOLDOWN, reason));
                return;
            }
            outcome => {
                let mut gate = GateResult::pass(GATE_COOLDOWN).with_reason("No active cooldowns");
                if let Some(reason) = outcome.reason() {
                    gate = gate.with_detail(reason);
                }
                decision.append_gate(gate);
                self.report_degraded("cooldown", &outcome);
            }
        }

        self.daily.admit(decision, self.today());
        let (exposure, _) = self.exposure().await;
        self.position_limits.admit(decision, &exposure, proposed);
    }

    fn report_degraded(&self, guard: &str, outcome: &GuardOutcome) {
        if let GuardOutcome::Degraded { reason } = outcome {
            tracing::warn!(guard, reason = %reason, "Guard degraded, trade admitted");
            self.emit(OrchestratorEvent::GuardDegraded {
                guard: guard.to_string(),
                reason: reason.clone(),
            });
        }
    }

    async fn audit(&self, signal: &Signal, decision: &Decision, now: DateTime<Utc>) {
        let record = DecisionRecord {
            recorded_at: now,
            algorithm_version: self.config.orchestrator.algorithm_version.clone(),
            signal: signal.clone(),
            decision: decision.clone(),
        };
        if let Err(e) = self.store.append_decision(&record).await {
            tracing::error!(symbol = %signal.symbol, error = %e, "Failed to persist decision");
        }
    }

    async fn execute(
        &mut self,
        signal: &Signal,
        decision: &Decision,
        regime: Regime,
        plan: Option<&OptionsPlan>,
        now: DateTime<Utc>,
    ) {
        let order = match plan {
            Some(plan) => {
                let side = if plan.selection.net_premium.is_sign_negative() {
                    OrderSide::Sell
                } else {
                    OrderSide::Buy
                };
                Order::limit(
                    plan.instrument(&signal.symbol),
                    side,
                    plan.sizing.contracts,
                    plan.entry_premium(),
                    now,
                )
                .with_strategy(plan.selection.strategy.to_string())
                .with_multiplier(CONTRACT_MULTIPLIER)
                .with_greeks(plan.sizing.total_greeks)
            }
            None => Order::market(
                &signal.symbol,
                OrderSide::opening(signal.direction),
                decision.risk.quantity,
                now,
            )
            .with_brackets(signal.stop_loss, signal.take_profit_1),
        };

        let report = match self.venue.submit_order(order).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(symbol = %signal.symbol, error = %e, "Order submission failed");
                self.emit(OrchestratorEvent::Error {
                    message: format!("Order for {} failed: {e}", signal.symbol),
                    at: now,
                });
                return;
            }
        };

        if report.is_rejected() || report.filled_quantity() == 0 {
            tracing::warn!(
                symbol = %signal.symbol,
                reason = report.reason.as_deref().unwrap_or(""),
                "Order rejected"
            );
        } else {
            self.counters.trades_executed += 1;
            self.daily.record_trade(self.today());
            if let Err(e) = self
                .cooldowns
                .record_trade(&signal.symbol, &signal.signal_type, now)
                .await
            {
                tracing::warn!(symbol = %signal.symbol, error = %e, "Failed to record cooldown");
            }
            if let (Some(plan), Some(position_id)) = (plan, report.position_id.as_ref()) {
                self.options_meta.insert(
                    position_id.clone(),
                    OptionsPositionMeta::from_plan(&signal.symbol, regime, plan),
                );
            }
            tracing::info!(
                symbol = %signal.symbol,
                quantity = report.filled_quantity(),
                status = ?report.status,
                "Order filled"
            );
        }
        self.emit(OrchestratorEvent::OrderSubmitted(report));
    }

    /// One monitoring pass: brackets for directional positions, exit rules
    /// for option structures. Returns positions closed by it.
    pub async fn monitor(&mut self) -> Vec<PaperPosition> {
        let now = self.now();
        let positions = self.venue.get_positions().await;

        let mut prices = HashMap::new();
        let mut current_iv = HashMap::new();
        for position in &positions {
            if let Some(meta) = self.options_meta.get(&position.id) {
                match self
                    .provider
                    .options_chain(&meta.underlying, Some(meta.expiration))
                    .await
                {
                    Ok(chain) => {
                        if let Some(mark) = meta.mark(&chain) {
                            prices.insert(position.symbol.clone(), mark);
                        }
                        if let Some(iv) = meta.current_iv(&chain) {
                            current_iv.insert(position.id.clone(), iv);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(position_id = %position.id, error = %e, "No chain for mark");
                    }
                }
            } else if position.strategy == DIRECTIONAL {
                match self.provider.current_price(&position.symbol).await {
                    Ok(price) => {
                        prices.insert(position.symbol.clone(), price);
                    }
                    Err(e) => {
                        tracing::debug!(symbol = %position.symbol, error = %e, "No price for mark");
                    }
                }
            }
        }

        let mut closed = self.venue.monitor_positions(&prices, now).await;
        for position in &closed {
            self.settle_closed(position, position.realized_pnl);
        }

        let marked = self.venue.get_positions().await;
        for position in marked {
            let Some(meta) = self.options_meta.get(&position.id) else {
                continue;
            };
            let snapshot = ExitSnapshot {
                pnl_pct: pnl_fraction(&position),
                dte: (meta.expiration - trading_date(now)).num_days(),
                iv: current_iv.get(&position.id).copied().unwrap_or(meta.entry_iv),
                entry_iv: meta.entry_iv,
                hours_held: Decimal::from((now - position.opened_at).num_minutes()) / dec!(60),
            };
            let Some(rule) = check_exit_rules(&meta.exit_rules, &snapshot).copied() else {
                continue;
            };
            if let Some(done) = self.act_on_exit(&position, rule, now).await {
                closed.push(done);
            }
        }
        closed
    }

    async fn act_on_exit(
        &mut self,
        position: &PaperPosition,
        rule: ExitRule,
        now: DateTime<Utc>,
    ) -> Option<PaperPosition> {
        tracing::info!(
            position_id = %position.id,
            trigger = ?rule.trigger_type,
            action = ?rule.action,
            "Exit rule triggered"
        );
        self.emit(OrchestratorEvent::ExitRuleTriggered {
            position_id: position.id.clone(),
            trigger: rule.trigger_type,
            action: rule.action,
        });

        let result = match rule.action {
            ExitAction::CloseFull | ExitAction::Roll => {
                self.venue
                    .close_position(&position.id, ExitReason::ExitRule, now)
                    .await
            }
            ExitAction::CloseHalf => {
                let half = (position.abs_quantity() / 2).max(1);
                let side = if position.is_long() {
                    OrderSide::Sell
                } else {
                    OrderSide::Buy
                };
                let order = Order::market(position.symbol.clone(), side, half, now)
                    .with_strategy(position.strategy.clone())
                    .with_multiplier(position.multiplier);
                // Scale out once per rule.
                if let Some(meta) = self.options_meta.get_mut(&position.id) {
                    meta.exit_rules.retain(|r| *r != rule);
                }
                self.venue.submit_order(order).await
            }
            ExitAction::Hedge => {
                tracing::info!(position_id = %position.id, "Hedge requested, no automatic action");
                return None;
            }
        };

        match result {
            Ok(report) if report.is_rejected() => {
                tracing::warn!(position_id = %position.id, "Exit order rejected");
                None
            }
            Ok(_) => {
                let after = self.venue.get_position(&position.id).await?;
                let pnl = after.realized_pnl - position.realized_pnl;
                if after.is_open() {
                    self.daily.record_pnl(self.today(), pnl);
                    None
                } else {
                    self.settle_closed(&after, pnl);
                    Some(after)
                }
            }
            Err(e) => {
                tracing::warn!(position_id = %position.id, error = %e, "Exit order failed");
                None
            }
        }
    }

    fn settle_closed(&mut self, position: &PaperPosition, pnl: Decimal) {
        self.daily.record_pnl(self.today(), pnl);
        self.options_meta.remove(&position.id);
        self.emit(OrchestratorEvent::PositionClosed {
            position_id: position.id.clone(),
            symbol: position.symbol.clone(),
            reason: position.exit_reason.unwrap_or(ExitReason::Manual),
            pnl: position.realized_pnl,
        });
    }

    /// Attempts to close every open position.
    ///
    /// Partial fills are re-submitted up to [`MAX_CLOSE_ATTEMPTS`] times. A
    /// position is reported closed only once the venue no longer holds it
    /// open; anything else is a failure carrying the units left.
    pub async fn close_all(&mut self) -> KillSwitchReport {
        let now = self.now();
        let mut report = KillSwitchReport {
            at: Some(now),
            ..KillSwitchReport::default()
        };

        for position in self.venue.get_positions().await {
            let result = self.close_remainder(&position.id, now).await;

            let after = self.venue.get_position(&position.id).await;
            let remaining = after
                .as_ref()
                .filter(|p| p.is_open())
                .map_or(0, PaperPosition::abs_quantity);
            if let Some(after) = &after {
                self.settle_after(&position, after);
            }

            match result {
                Ok(()) => report.closed.push(position.id.clone()),
                Err(error) => {
                    tracing::error!(
                        position_id = %position.id,
                        remaining,
                        error = %error,
                        "Kill switch close failed"
                    );
                    report.failures.push(PositionFailure {
                        position_id: position.id.clone(),
                        symbol: position.symbol.clone(),
                        error,
                        remaining_quantity: remaining,
                    });
                }
            }
        }
        report
    }

    /// Closes whatever is left of `position_id`, one venue close per attempt.
    async fn close_remainder(&self, position_id: &str, now: DateTime<Utc>) -> Result<(), String> {
        for attempt in 1..=MAX_CLOSE_ATTEMPTS {
            let close = self
                .venue
                .close_position(position_id, ExitReason::KillSwitch, now)
                .await
                .map_err(|e| e.to_string())?;
            if close.is_rejected() {
                return Err(close.reason.unwrap_or_else(|| "Order rejected".to_string()));
            }
            match self.venue.get_position(position_id).await {
                Some(after) if after.is_open() => {
                    tracing::warn!(
                        position_id,
                        attempt,
                        status = ?close.status,
                        remaining = after.abs_quantity(),
                        "Kill switch close left a remainder"
                    );
                }
                _ => return Ok(()),
            }
        }
        Err(format!("Position still open after {MAX_CLOSE_ATTEMPTS} close attempts"))
    }

    /// Books P&L realised since `before`, settling the position if it closed.
    fn settle_after(&mut self, before: &PaperPosition, after: &PaperPosition) {
        let pnl = after.realized_pnl - before.realized_pnl;
        if after.is_open() {
            self.daily.record_pnl(self.today(), pnl);
        } else {
            self.settle_closed(after, pnl);
        }
    }
}

/// Unrealised P&L over entry cost.
fn pnl_fraction(position: &PaperPosition) -> Decimal {
    let cost = position.notional();
    if cost.is_zero() {
        Decimal::ZERO
    } else {
        position.unrealized_pnl / cost
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.config.orchestrator.mode)
            .field("counters", &self.counters)
            .field("options_positions", &self.options_meta.len())
            .finish_non_exhaustive()
    }
}
