//! Moderation engine
//!
//! Ties the pieces together: events are parsed, scoped by [`EventFilter`],
//! scored by [`OffenceClassifier`], and recorded in the
//! [`OffenderRegistry`]. When an identity's state moves up, the engine
//! composes the matching actions and hands them to the
//! [`ActionDispatcher`]. Ban commands go through the [`ActionDeduplicator`]
//! so at most one is outstanding per identity.
//!
//! Nothing here awaits; the only async work happens on the dispatcher's
//! worker and the background sweep.

use crate::action::{ActionKind, ModerationAction, OutboundMessage};
use crate::classifier::OffenceClassifier;
use crate::config::Config;
use crate::dedup::ActionDeduplicator;
use crate::dispatcher::ActionDispatcher;
use crate::error::{ModerationError, Result};
use crate::event::RoomMessage;
use crate::filter::EventFilter;
use crate::offence::{Classification, Offence};
use crate::offender::ModerationState;
use crate::registry::{OffenderRegistry, RecordOutcome, SweepReport};
use crate::tasks::BackgroundTasks;
use antiping_core::{PhysicalClock, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Decision for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "state", rename_all = "snake_case")]
pub enum Verdict {
    /// Not a room message, or out of scope
    Ignored,
    /// Scored and below the spam limit
    Clean,
    /// Sender is over a limit; carries their state after this event
    Spam(ModerationState),
}

impl Verdict {
    /// Whether the event should be treated as spam.
    pub fn is_spam(&self) -> bool {
        matches!(self, Self::Spam(_))
    }
}

/// Scores events and dispatches moderation actions.
pub struct ModerationEngine {
    config: Config,
    filter: EventFilter,
    classifier: OffenceClassifier,
    registry: Arc<OffenderRegistry>,
    dedup: ActionDeduplicator,
    dispatcher: Arc<ActionDispatcher>,
    clock: Arc<dyn PhysicalClock>,
}

impl ModerationEngine {
    /// Validate `config` and build an engine around `dispatcher`.
    pub fn new(
        config: Config,
        dispatcher: Arc<ActionDispatcher>,
        clock: Arc<dyn PhysicalClock>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = OffenderRegistry::new(config.offences.history_size, config.limits()?)?;
        Ok(Self {
            filter: EventFilter::from_config(&config)?,
            classifier: OffenceClassifier::new(config.offences.clone()),
            registry: Arc::new(registry),
            dedup: ActionDeduplicator::new(),
            dispatcher,
            clock,
            config,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Tracked identities.
    pub fn registry(&self) -> &Arc<OffenderRegistry> {
        &self.registry
    }

    /// Ban commands currently outstanding.
    pub fn deduplicator(&self) -> &ActionDeduplicator {
        &self.dedup
    }

    /// Score one event.
    ///
    /// Malformed room messages are reported as errors rather than passed
    /// as clean.
    pub fn check_event(&self, event: &serde_json::Value) -> Result<Verdict> {
        let Some(message) = RoomMessage::from_event(event)? else {
            return Ok(Verdict::Ignored);
        };
        if let Some(reason) = self.filter.skip_reason(&message) {
            trace!(room = %message.room_id, sender = %message.sender, ?reason, "event out of scope");
            return Ok(Verdict::Ignored);
        }
        let Some(spec) = self.classifier.classify(&message) else {
            return Ok(Verdict::Clean);
        };

        let outcome = self.record_and_classify(
            &message.sender,
            &message.room_id,
            message.timestamp,
            spec.weight,
            spec.ttl,
        )?;
        debug!(
            identity = %message.sender,
            room = %message.room_id,
            category = %spec.category,
            total_weight = outcome.total_weight,
            state = %outcome.state,
            "scored message"
        );

        Ok(match outcome.classification {
            Classification::Okay => Verdict::Clean,
            Classification::Spam | Classification::Ban => Verdict::Spam(outcome.state),
        })
    }

    /// Record an offence of `weight` committed by `identity` at `timestamp`
    /// in `room`, expiring after `ttl`. Dispatches actions if the identity's
    /// state moves up; `room` is named in those actions.
    pub fn record_and_classify(
        &self,
        identity: &str,
        room: &str,
        timestamp: Timestamp,
        weight: u32,
        ttl: Duration,
    ) -> Result<RecordOutcome> {
        if ttl.is_zero() {
            return Err(ModerationError::invalid_offence("ttl must be greater than zero"));
        }
        let offence = Offence::committed_at(timestamp, weight, ttl);
        let outcome = self.registry.record(identity, offence, self.clock.now())?;
        if let Some(state) = outcome.escalation() {
            self.dispatch_escalation(identity, room, state);
        }
        Ok(outcome)
    }

    fn dispatch_escalation(&self, identity: &str, room: &str, state: ModerationState) {
        match state {
            ModerationState::Banned => self.dispatch_ban(identity, room),
            ModerationState::Alerted => self.dispatch_alert(identity, room),
            ModerationState::Okay => {}
        }
    }

    fn dispatch_ban(&self, identity: &str, room: &str) {
        info!(identity, room, "banning offender");
        self.dispatcher.submit(ModerationAction::new(
            ActionKind::LogNotice,
            identity,
            OutboundMessage::text(
                &self.config.log.room,
                format!("{identity} was banned for spam in {room}"),
            )
            .as_notice(),
        ));

        let Some(token) = self.dedup.try_begin(identity) else {
            debug!(identity, "ban already in flight");
            return;
        };
        let mjolnir = &self.config.mjolnir;
        let handle = self.dispatcher.submit(ModerationAction::new(
            ActionKind::BanCommand,
            identity,
            OutboundMessage::text(
                &mjolnir.room,
                format!("{} ban {} user {identity} spam", mjolnir.prefix, mjolnir.banlist),
            ),
        ));
        token.bind(&handle);
    }

    fn dispatch_alert(&self, identity: &str, room: &str) {
        info!(identity, room, "alerting offender");
        self.dispatcher.submit(ModerationAction::new(
            ActionKind::LogNotice,
            identity,
            OutboundMessage::text(
                &self.config.log.room,
                format!("{identity} was submitting spam in {room}"),
            )
            .as_notice(),
        ));

        let alert = &self.config.offences.spam_alert;
        self.dispatcher.submit(ModerationAction::new(
            ActionKind::SpamAlert,
            identity,
            OutboundMessage::text(room, format!("{identity} {alert}")).with_formatted(format!(
                r#"<a href="https://matrix.to/#/{identity}">{identity}</a> {alert}"#
            )),
        ));
    }

    /// Expire, demote and reclaim idle identities as of the clock's now.
    pub fn gc_sweep(&self) -> SweepReport {
        sweep(&self.registry, self.clock.as_ref())
    }

    /// Run [`Self::gc_sweep`] every configured interval on `tasks`.
    pub fn spawn_gc(&self, tasks: &BackgroundTasks) {
        let registry = self.registry.clone();
        let clock = self.clock.clone();
        tasks.spawn_interval(self.config.offences.gc_interval(), move || {
            sweep(&registry, clock.as_ref());
            std::future::ready(())
        });
    }
}

impl std::fmt::Debug for ModerationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationEngine")
            .field("server_name", &self.config.server_name)
            .field("tracked", &self.registry.len())
            .field("bans_in_flight", &self.dedup.in_flight_count())
            .finish()
    }
}

fn sweep(registry: &OffenderRegistry, clock: &dyn PhysicalClock) -> SweepReport {
    let report = registry.gc_sweep(clock.now());
    debug!(
        examined = report.examined,
        expired = report.expired_offences,
        demoted = report.demoted,
        removed = report.removed,
        failed = report.failed,
        "offender sweep finished"
    );
    report
}
