//! The Petri net: construction, the place-status FSM, and the atomic
//! arc-flow protocol that drives observer dispatch.

use std::collections::{HashMap, HashSet};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::autofire;
use crate::error::{Namespace, Result, SimError, TransKindTag};
use crate::meters::{PlacePopulationHandle, TokenVisitHandle, TransitionFiringHandle};
use crate::net::place::{Place, PlaceId, Policy};
use crate::net::token::{Token, TokenTypeId};
use crate::net::trans::{ArcEntry, ArcId, ArcKind, TransId, TransKind, Transition};
use crate::observer::Plugin;
use crate::scheduler::FireControl;

/// Places, the token policy, and the construction-time status FSM.
pub mod place;
/// Tokens: identity, type, and the observers attached at construction.
pub mod token;
/// Transitions and the five arc kinds.
pub mod trans;

/// A Petri net: the place/transition/arc/token arenas, the name tables
/// resolving builder calls against them, and the discrete-event scheduler
/// driving simulation.
///
/// Generic over the RNG so callers can inject a reproducible source; see
/// [`Net::seeded`] for the common case.
pub struct Net<R: RngCore> {
    token_types: Vec<String>,
    token_type_ids: HashMap<String, TokenTypeId>,

    places: Vec<Place>,
    place_ids: HashMap<String, PlaceId>,

    transitions: Vec<Transition>,
    trans_ids: HashMap<String, TransId>,

    arcs: Vec<ArcEntry>,
    arc_ids: HashMap<String, ArcId>,

    plugins: Vec<Box<dyn Plugin>>,
    /// One closure per subscribed collector, reporting whether it still
    /// needs observations; polled by [`Net::simulate`]'s halting check.
    collectors: Vec<Box<dyn Fn() -> bool>>,

    next_token_id: u64,
    fire_control: FireControl<R>,
    started: bool,
    /// Set when a timed sampler misbehaves while re-enabling a transition
    /// as a side effect of another transition's firing (a presence-observer
    /// arc crossing mid-`fire`). Firing must finish flowing every arc of
    /// the transition actually selected before this surfaces, so the error
    /// is stashed here and drained at the end of [`Net::fire`] instead of
    /// propagated from inside the crossing handler.
    pending_fire_error: Option<SimError>,
}

impl Net<ChaCha8Rng> {
    /// Builds an empty net with a `ChaCha8Rng` seeded deterministically.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: RngCore> Net<R> {
    /// Builds an empty net driven by the given RNG.
    #[must_use]
    pub fn with_rng(rng: R) -> Self {
        Self {
            token_types: Vec::new(),
            token_type_ids: HashMap::new(),
            places: Vec::new(),
            place_ids: HashMap::new(),
            transitions: Vec::new(),
            trans_ids: HashMap::new(),
            arcs: Vec::new(),
            arc_ids: HashMap::new(),
            plugins: Vec::new(),
            collectors: Vec::new(),
            next_token_id: 0,
            fire_control: FireControl::new(rng),
            started: false,
            pending_fire_error: None,
        }
    }

    /// The scheduler's current virtual time.
    #[inline]
    #[must_use]
    pub fn current_time(&self) -> f64 {
        self.fire_control.current_time()
    }

    /// Looks up a place's id by name, for tests and collector filters.
    #[must_use]
    pub fn place_id(&self, name: &str) -> Option<PlaceId> {
        self.place_ids.get(name).copied()
    }

    /// Looks up a transition's id by name, for tests and inspection.
    #[must_use]
    pub fn trans_id(&self, name: &str) -> Option<TransId> {
        self.trans_ids.get(name).copied()
    }

    /// Read-only access to a place, by id.
    #[must_use]
    pub fn place(&self, id: PlaceId) -> &Place {
        &self.places[id.index()]
    }

    /// Read-only access to a transition, by id.
    #[must_use]
    pub fn transition(&self, id: TransId) -> &Transition {
        &self.transitions[id.index()]
    }

    // ---- builder: token types, places, transitions ----------------------

    /// Registers a new token type, returning its id.
    ///
    /// ## Errors
    /// [`SimError::DuplicateName`] if `name` is already a token type.
    pub fn add_type(&mut self, name: &str) -> Result<TokenTypeId> {
        if self.token_type_ids.contains_key(name) {
            return Err(SimError::DuplicateName {
                namespace: Namespace::Type,
                name: name.to_string(),
            });
        }
        let id = TokenTypeId(self.token_types.len() as u32);
        self.token_types.push(name.to_string());
        self.token_type_ids.insert(name.to_string(), id);
        tracing::debug!(name, "registered token type");
        Ok(id)
    }

    /// Registers a new place holding tokens of `token_type`.
    ///
    /// ## Errors
    /// [`SimError::DuplicateName`] if `name` is already a place.
    pub fn add_place(&mut self, name: &str, token_type: TokenTypeId, policy: Policy) -> Result<PlaceId> {
        if self.place_ids.contains_key(name) {
            return Err(SimError::DuplicateName {
                namespace: Namespace::Place,
                name: name.to_string(),
            });
        }
        let id = PlaceId(self.places.len() as u32);
        self.places.push(Place::new(name.to_string(), id, token_type, policy));
        self.place_ids.insert(name.to_string(), id);
        self.attach_place_plugins(id, name);
        tracing::debug!(name, ?policy, "added place");
        Ok(id)
    }

    /// Registers a priority-ordered, weighted immediate transition.
    ///
    /// ## Errors
    /// [`SimError::DuplicateName`] if `name` is already a transition.
    pub fn add_immediate_transition(&mut self, name: &str, priority: i32, weight: f64) -> Result<TransId> {
        self.add_transition(name, TransKind::Immediate { priority, weight })
    }

    /// Registers a timed transition firing after `sampler()` elapses.
    ///
    /// ## Errors
    /// [`SimError::DuplicateName`] if `name` is already a transition.
    pub fn add_timed_transition(
        &mut self,
        name: &str,
        sampler: Box<dyn FnMut() -> f64>,
    ) -> Result<TransId> {
        self.add_transition(name, TransKind::Timed { sampler })
    }

    fn add_transition(&mut self, name: &str, kind: TransKind) -> Result<TransId> {
        if self.trans_ids.contains_key(name) {
            return Err(SimError::DuplicateName {
                namespace: Namespace::Transition,
                name: name.to_string(),
            });
        }
        let id = TransId(self.transitions.len() as u32);
        self.transitions.push(Transition::new(name.to_string(), id, kind));
        self.trans_ids.insert(name.to_string(), id);
        self.attach_transition_plugins(id, name);
        tracing::debug!(name, "added transition");
        Ok(id)
    }

    fn attach_place_plugins(&mut self, place_id: PlaceId, name: &str) {
        for plugin in &self.plugins {
            if let Some(mut obs) = plugin.observe_place(name) {
                obs.bind_place(place_id);
                self.places[place_id.index()].observers.push(obs);
            }
        }
    }

    fn attach_transition_plugins(&mut self, trans_id: TransId, name: &str) {
        for plugin in &self.plugins {
            if let Some(mut obs) = plugin.observe_transition(name) {
                obs.bind_transition(trans_id);
                self.transitions[trans_id.index()].observers.push(obs);
            }
        }
    }

    // ---- builder: arcs ----------------------------------------------------

    fn resolve_place(&self, name: &str) -> Result<PlaceId> {
        self.place_ids.get(name).copied().ok_or_else(|| SimError::UnknownName {
            namespace: Namespace::Place,
            name: name.to_string(),
        })
    }

    fn resolve_trans(&self, name: &str) -> Result<TransId> {
        self.trans_ids.get(name).copied().ok_or_else(|| SimError::UnknownName {
            namespace: Namespace::Transition,
            name: name.to_string(),
        })
    }

    /// Adds a presence-observer arc with no consuming effect.
    ///
    /// ## Errors
    /// [`SimError::UnknownName`] if `trans` or `place` do not exist;
    /// [`SimError::DuplicateName`] if `name` is already an arc;
    /// [`SimError::InvalidStructure`] if the place-status FSM rejects it.
    pub fn add_test(&mut self, name: &str, trans: &str, place: &str) -> Result<ArcId> {
        let trans_id = self.resolve_trans(trans)?;
        let place_id = self.resolve_place(place)?;
        self.register_arc(name, trans_id, ArcKind::Test(place_id), false)
    }

    /// Adds an inverse presence-observer arc (requires the place empty).
    ///
    /// ## Errors
    /// See [`Net::add_test`].
    pub fn add_inhibitor(&mut self, name: &str, trans: &str, place: &str) -> Result<ArcId> {
        let trans_id = self.resolve_trans(trans)?;
        let place_id = self.resolve_place(place)?;
        self.register_arc(name, trans_id, ArcKind::Inhibitor(place_id), false)
    }

    /// Adds a consuming presence-observer arc: pops and destroys a token.
    ///
    /// ## Errors
    /// See [`Net::add_test`].
    pub fn add_destructor(&mut self, name: &str, trans: &str, place: &str) -> Result<ArcId> {
        let trans_id = self.resolve_trans(trans)?;
        let place_id = self.resolve_place(place)?;
        self.register_arc(name, trans_id, ArcKind::Destructor(place_id), true)
    }

    /// Adds a token-placer arc: constructs a fresh token of `place`'s type.
    ///
    /// ## Errors
    /// See [`Net::add_test`].
    pub fn add_constructor(&mut self, name: &str, trans: &str, place: &str) -> Result<ArcId> {
        let trans_id = self.resolve_trans(trans)?;
        let place_id = self.resolve_place(place)?;
        let token_type = self.places[place_id.index()].token_type;
        self.register_arc(name, trans_id, ArcKind::Constructor(place_id, token_type), false)
    }

    /// Adds an atomic move arc: pops from `input` and pushes to `output`.
    ///
    /// ## Errors
    /// See [`Net::add_test`].
    pub fn add_transfer(&mut self, name: &str, trans: &str, input: &str, output: &str) -> Result<ArcId> {
        let trans_id = self.resolve_trans(trans)?;
        let input_id = self.resolve_place(input)?;
        let output_id = self.resolve_place(output)?;
        self.register_arc(name, trans_id, ArcKind::Transfer(input_id, output_id), true)
    }

    fn register_arc(&mut self, arc_name: &str, trans_id: TransId, kind: ArcKind, consumer: bool) -> Result<ArcId> {
        if self.arc_ids.contains_key(arc_name) {
            return Err(SimError::DuplicateName {
                namespace: Namespace::Arc,
                name: arc_name.to_string(),
            });
        }
        if let Some(place_id) = kind.observed_place() {
            let trans_kind_tag = match self.transitions[trans_id.index()].kind {
                TransKind::Immediate { .. } => TransKindTag::Immediate,
                TransKind::Timed { .. } => TransKindTag::Timed,
            };
            let trans_name = self.transitions[trans_id.index()].name.clone();
            let place_name = self.places[place_id.index()].name.clone();
            let new_status = self.places[place_id.index()].status.transition(
                trans_kind_tag,
                consumer,
                &place_name,
                &trans_name,
                kind.tag(),
            )?;
            self.places[place_id.index()].status = new_status;
        }

        let id = ArcId(self.arcs.len() as u32);
        self.arcs.push(ArcEntry {
            id,
            trans: trans_id,
            kind,
            locally_enabled: false,
        });
        self.transitions[trans_id.index()].arcs.push(id);
        if let Some(place_id) = kind.observed_place() {
            self.places[place_id.index()].presence_observers.push(id);
        }
        self.arc_ids.insert(arc_name.to_string(), id);
        tracing::trace!(arc = arc_name, kind = kind.tag(), "added arc");
        Ok(id)
    }

    // ---- builder: plugins & meters ----------------------------------------

    /// Registers a plugin, retroactively attaching it to every place and
    /// transition already added (entities added afterward query the
    /// plugin list directly at registration time).
    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) {
        for idx in 0..self.places.len() {
            let place_id = PlaceId(idx as u32);
            let name = self.places[idx].name.clone();
            if let Some(mut obs) = plugin.observe_place(&name) {
                obs.bind_place(place_id);
                self.places[idx].observers.push(obs);
            }
        }
        for idx in 0..self.transitions.len() {
            let trans_id = TransId(idx as u32);
            let name = self.transitions[idx].name.clone();
            if let Some(mut obs) = plugin.observe_transition(&name) {
                obs.bind_transition(trans_id);
                self.transitions[idx].observers.push(obs);
            }
        }
        self.plugins.push(plugin);
    }

    /// Subscribes to the token-visit stream, attaching its observer to
    /// every token constructed from now on.
    pub fn subscribe_token_visits(&mut self, required: usize, filter: Option<HashSet<PlaceId>>) -> TokenVisitHandle {
        let filter = filter.map(|set| set.into_iter().map(|p| p.index() as u32).collect());
        let handle = TokenVisitHandle::new(required, filter);
        self.register_plugin(Box::new(handle.as_plugin()));
        let polled = handle.clone();
        self.collectors.push(Box::new(move || polled.needs_more_observations()));
        handle
    }

    /// Subscribes to the place-population stream for every place.
    pub fn subscribe_place_population(&mut self, required: usize) -> PlacePopulationHandle {
        let handle = PlacePopulationHandle::new(required);
        self.register_plugin(Box::new(handle.as_plugin()));
        let polled = handle.clone();
        self.collectors.push(Box::new(move || polled.needs_more_observations()));
        handle
    }

    /// Subscribes to the transition-firing stream. `filter` restricts which
    /// transitions' firings count toward `required` and get recorded;
    /// `None` subscribes to every transition.
    pub fn subscribe_transition_firing(
        &mut self,
        required: usize,
        filter: Option<HashSet<TransId>>,
    ) -> TransitionFiringHandle {
        let filter = filter.map(|set| set.into_iter().map(|t| t.index() as u32).collect());
        let handle = TransitionFiringHandle::new(required, filter);
        self.register_plugin(Box::new(handle.as_plugin()));
        let polled = handle.clone();
        self.collectors.push(Box::new(move || polled.needs_more_observations()));
        handle
    }

    // ---- simulation ---------------------------------------------------

    /// Evaluates every presence-observer arc once and brings the
    /// scheduler up to date with the resulting initial enablement. Must
    /// be called (directly, or implicitly via [`Net::simulate`]) before
    /// the first [`Net::fire_next`].
    pub fn start(&mut self) -> Result<()> {
        for idx in 0..self.places.len() {
            let arc_ids = self.places[idx].presence_observers.clone();
            let place_empty = self.places[idx].is_empty();
            for arc_id in arc_ids {
                let kind = self.arcs[arc_id.index()].kind;
                let locally_enabled = ArcEntry::evaluate(&kind, place_empty);
                self.arcs[arc_id.index()].locally_enabled = locally_enabled;
                if !locally_enabled {
                    let trans_id = self.arcs[arc_id.index()].trans;
                    self.transitions[trans_id.index()].disabled_arc_count += 1;
                }
            }
        }
        for idx in 0..self.transitions.len() {
            let trans_id = TransId(idx as u32);
            if self.transitions[idx].is_enabled() {
                self.schedule_enable(trans_id)?;
                for obs in self.transitions[idx].observers.iter_mut() {
                    obs.got_enabled(0.0);
                }
            }
        }
        self.started = true;
        tracing::debug!(
            places = self.places.len(),
            transitions = self.transitions.len(),
            arcs = self.arcs.len(),
            "net started"
        );
        Ok(())
    }

    /// Clears the marking, the scheduler state, and every arc's cached
    /// enabledness, ready for a fresh [`Net::start`]. The place-status FSM
    /// and the built structure are untouched. RNG state is not reseeded.
    pub fn reset(&mut self) {
        for place in &mut self.places {
            place.tokens.clear();
        }
        for arc in &mut self.arcs {
            arc.locally_enabled = false;
        }
        for trans in &mut self.transitions {
            trans.disabled_arc_count = 0;
        }
        self.fire_control.reset();
        self.next_token_id = 0;
        self.started = false;
        self.pending_fire_error = None;
    }

    /// Runs [`Net::fire_next`] until every subscribed collector reports it
    /// needs no more observations, or the scheduler runs out of work.
    /// Calls [`Net::start`] first if the net has not started yet.
    pub fn simulate(&mut self) -> Result<()> {
        if !self.started {
            self.start()?;
        }
        while self.collectors.iter().any(|needs_more| needs_more()) {
            match self.fire_next() {
                Ok(_) => {}
                Err(SimError::NoEnabledTransition) => {
                    tracing::warn!("no enabled transition; halting");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Selects and fires the next transition, advancing virtual time.
    ///
    /// ## Errors
    /// [`SimError::NoEnabledTransition`] if the scheduler is idle;
    /// [`SimError::BadSample`] if a timed transition's sampler misbehaves.
    pub fn fire_next(&mut self) -> Result<TransId> {
        let (new_time, trans_id) = self.fire_control.select_next()?;
        self.fire_control.advance_time_to(new_time);
        let is_timed = matches!(self.transitions[trans_id.index()].kind, TransKind::Timed { .. });
        if is_timed {
            self.fire_control.remove_stale_timed(trans_id);
        }
        // Immediate transitions are never eagerly removed from their
        // priority bucket here: the only path that toggles scheduler
        // membership for an immediate transition is the auto-fire bridge
        // reacting to its own enabled/disabled crossing as the firing's
        // arcs flow. A transition with no presence-observer arc on itself
        // never crosses and must stay selectable after every firing.
        tracing::trace!(trans = %self.transitions[trans_id.index()].name, time = new_time, "firing");
        self.fire(trans_id)?;
        if is_timed && self.transitions[trans_id.index()].is_enabled() && !self.fire_control.has_pending(trans_id) {
            self.schedule_enable(trans_id)?;
        }
        Ok(trans_id)
    }

    fn schedule_enable(&mut self, trans_id: TransId) -> Result<()> {
        let trans = &mut self.transitions[trans_id.index()];
        match &mut trans.kind {
            TransKind::Immediate { priority, weight } => {
                self.fire_control.enable_immediate(trans_id, *priority, *weight);
            }
            TransKind::Timed { sampler } => {
                let duration = sampler();
                if !duration.is_finite() || duration < 0.0 {
                    return Err(SimError::BadSample {
                        trans: trans.name.clone(),
                        value: duration,
                    });
                }
                self.fire_control.enable_timed(trans_id, duration);
            }
        }
        Ok(())
    }

    fn schedule_disable(&mut self, trans_id: TransId) {
        if let TransKind::Immediate { priority, .. } = self.transitions[trans_id.index()].kind {
            self.fire_control.disable_immediate(trans_id, priority);
        }
        // Timed transitions are only ever disabled by firing themselves;
        // `fire_next` already pops the stale heap entry directly.
    }

    /// Never propagates a [`SimError::BadSample`] directly: a crossing
    /// triggered mid-`fire` is a side effect of some other transition's own
    /// arcs flowing, and that transition must finish flowing all of them
    /// before the net reports an error. Any `BadSample` is stashed in
    /// `pending_fire_error` and drained at the end of [`Net::fire`].
    fn apply_crossing(&mut self, trans_id: TransId, crossing: autofire::Crossing, time: f64) {
        match crossing {
            autofire::Crossing::GotEnabled => {
                if let Err(e) = self.schedule_enable(trans_id) {
                    self.pending_fire_error.get_or_insert(e);
                }
                for obs in self.transitions[trans_id.index()].observers.iter_mut() {
                    obs.got_enabled(time);
                }
            }
            autofire::Crossing::GotDisabled => {
                self.schedule_disable(trans_id);
                for obs in self.transitions[trans_id.index()].observers.iter_mut() {
                    obs.got_disabled(time);
                }
            }
        }
    }

    fn toggle_presence_observers(&mut self, place_id: PlaceId, time: f64) {
        let place_empty = self.places[place_id.index()].is_empty();
        let arc_ids = self.places[place_id.index()].presence_observers.clone();
        for arc_id in arc_ids {
            let kind = self.arcs[arc_id.index()].kind;
            let new_local = ArcEntry::evaluate(&kind, place_empty);
            if self.arcs[arc_id.index()].locally_enabled == new_local {
                continue;
            }
            self.arcs[arc_id.index()].locally_enabled = new_local;
            let trans_id = self.arcs[arc_id.index()].trans;
            let before = self.transitions[trans_id.index()].disabled_arc_count;
            let after = if new_local { before.saturating_sub(1) } else { before + 1 };
            self.transitions[trans_id.index()].disabled_arc_count = after;
            if let Some(crossing) = autofire::detect(before, after) {
                self.apply_crossing(trans_id, crossing, time);
            }
        }
    }

    fn fire(&mut self, trans_id: TransId) -> Result<()> {
        let time = self.fire_control.current_time();
        for obs in self.transitions[trans_id.index()].observers.iter_mut() {
            obs.before_firing(time);
        }
        let arc_ids = self.transitions[trans_id.index()].arcs.clone();
        for arc_id in arc_ids {
            self.flow_arc(arc_id, time)?;
        }
        for obs in self.transitions[trans_id.index()].observers.iter_mut() {
            obs.after_firing(time);
        }
        if let Some(e) = self.pending_fire_error.take() {
            return Err(e);
        }
        Ok(())
    }

    fn flow_arc(&mut self, arc_id: ArcId, time: f64) -> Result<()> {
        match self.arcs[arc_id.index()].kind {
            ArcKind::Test(_) | ArcKind::Inhibitor(_) => Ok(()),
            ArcKind::Destructor(place_id) => self.destruct(place_id, time),
            ArcKind::Constructor(place_id, token_type) => self.construct(place_id, token_type, time),
            ArcKind::Transfer(input, output) => self.transfer(input, output, time),
        }
    }

    fn construct(&mut self, place_id: PlaceId, token_type: TokenTypeId, time: f64) -> Result<()> {
        let id = self.next_token_id;
        self.next_token_id += 1;
        let mut token = Token::new(id, token_type);
        let type_name = self.token_types[token_type.index()].clone();
        for plugin in &self.plugins {
            if let Some(mut obs) = plugin.observe_token(id, token_type.index() as u32, &type_name) {
                obs.report_construction(time);
                token.observers.push(obs);
            }
        }
        self.push_token(place_id, token, time)
    }

    fn destruct(&mut self, place_id: PlaceId, time: f64) -> Result<()> {
        let mut token = self.pop_token(place_id, time)?;
        for obs in token.observers.iter_mut() {
            obs.report_destruction(time);
        }
        drop(token);
        Ok(())
    }

    fn transfer(&mut self, input: PlaceId, output: PlaceId, time: f64) -> Result<()> {
        let token = self.pop_token(input, time)?;
        self.push_token(output, token, time)
    }

    fn pop_token(&mut self, place_id: PlaceId, time: f64) -> Result<Token> {
        let mut token = self.places[place_id.index()]
            .dequeue()
            .expect("arc-gated pop on a place known to hold a token");
        {
            let place = &mut self.places[place_id.index()];
            for obs in place.observers.iter_mut() {
                obs.report_departure_of(time, &token);
            }
        }
        for obs in token.observers.iter_mut() {
            obs.report_departure_from(time, place_id);
        }
        if self.places[place_id.index()].is_empty() {
            self.toggle_presence_observers(place_id, time);
        }
        Ok(token)
    }

    fn push_token(&mut self, place_id: PlaceId, token: Token, time: f64) -> Result<()> {
        let place_type = self.places[place_id.index()].token_type;
        if token.token_type() != place_type {
            return Err(SimError::InvalidTokenType {
                place: self.places[place_id.index()].name.clone(),
                expected: self.token_types[place_type.index()].clone(),
                found: self.token_types[token.token_type().index()].clone(),
            });
        }
        let was_empty = self.places[place_id.index()].is_empty();
        {
            let place = &mut self.places[place_id.index()];
            place.enqueue(token);
            let token_ref = place.tokens.back().expect("just enqueued");
            for obs in place.observers.iter_mut() {
                obs.report_arrival_of(time, token_ref);
            }
        }
        if was_empty {
            self.toggle_presence_observers(place_id, time);
        }
        {
            let place = &mut self.places[place_id.index()];
            let token_mut = place.tokens.back_mut().expect("just enqueued");
            token_mut.record_visit();
            for obs in token_mut.observers.iter_mut() {
                obs.report_arrival_at(time, place_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net() -> Net<ChaCha8Rng> {
        Net::seeded(1)
    }

    #[test]
    fn duplicate_place_name_is_rejected() {
        let mut n = net();
        let ty = n.add_type("job").unwrap();
        n.add_place("buffer", ty, Policy::Fifo).unwrap();
        let err = n.add_place("buffer", ty, Policy::Fifo).unwrap_err();
        assert!(matches!(err, SimError::DuplicateName { .. }));
    }

    #[test]
    fn unknown_transition_name_is_rejected() {
        let mut n = net();
        let ty = n.add_type("job").unwrap();
        n.add_place("buffer", ty, Policy::Fifo).unwrap();
        let err = n.add_test("t0", "nonexistent", "buffer").unwrap_err();
        assert!(matches!(err, SimError::UnknownName { .. }));
    }

    #[test]
    fn inhibitor_bootstrap_fires_once_then_disables() {
        let mut n = net();
        let ty = n.add_type("job").unwrap();
        n.add_place("buffer", ty, Policy::Fifo).unwrap();
        n.add_immediate_transition("start", 1, 1.0).unwrap();
        n.add_inhibitor("inh", "start", "buffer").unwrap();
        n.add_constructor("ctor", "start", "buffer").unwrap();

        n.start().unwrap();
        let fired = n.fire_next().unwrap();
        assert_eq!(fired, n.trans_id("start").unwrap());
        assert_eq!(n.place(n.place_id("buffer").unwrap()).len(), 1);
        assert!(matches!(n.fire_next(), Err(SimError::NoEnabledTransition)));
    }

    #[test]
    fn place_fsm_rejection_leaves_arc_table_unchanged() {
        let mut n = net();
        let ty = n.add_type("job").unwrap();
        n.add_place("buffer", ty, Policy::Fifo).unwrap();
        n.add_timed_transition("serve", Box::new(|| 1.0)).unwrap();
        n.add_destructor("consume", "serve", "buffer").unwrap();

        n.add_timed_transition("serve2", Box::new(|| 2.0)).unwrap();
        let err = n.add_destructor("consume2", "serve2", "buffer").unwrap_err();
        assert!(matches!(err, SimError::InvalidStructure { .. }));
        assert_eq!(n.arc_ids.len(), 1);
    }

    #[test]
    fn collector_saturation_halts_the_driver() {
        // `bootstrap` seeds `loop_place` once; `x` then sustains itself
        // via its own destructor/constructor pair, firing indefinitely.
        let mut n = net();
        let ty = n.add_type("job").unwrap();
        n.add_place("loop_place", ty, Policy::Fifo).unwrap();
        n.add_immediate_transition("bootstrap", 2, 1.0).unwrap();
        n.add_inhibitor("bootstrap_inh", "bootstrap", "loop_place").unwrap();
        n.add_constructor("bootstrap_ctor", "bootstrap", "loop_place").unwrap();
        n.add_immediate_transition("x", 1, 1.0).unwrap();
        n.add_destructor("x_out", "x", "loop_place").unwrap();
        n.add_constructor("x_in", "x", "loop_place").unwrap();

        let handle = n.subscribe_transition_firing(10, None);
        n.simulate().unwrap();
        // `bootstrap`'s single firing contributes the first row (against
        // the simulation's start time); `x` then fires 9 more times to
        // reach the 10-row quota.
        assert_eq!(handle.observations().transition.len(), 10);
    }

    #[test]
    fn transition_firing_filter_counts_only_the_named_transition() {
        let mut n = net();
        let ty = n.add_type("job").unwrap();
        n.add_place("loop_place", ty, Policy::Fifo).unwrap();
        n.add_immediate_transition("bootstrap", 2, 1.0).unwrap();
        n.add_inhibitor("bootstrap_inh", "bootstrap", "loop_place").unwrap();
        n.add_constructor("bootstrap_ctor", "bootstrap", "loop_place").unwrap();
        n.add_immediate_transition("x", 1, 1.0).unwrap();
        n.add_destructor("x_out", "x", "loop_place").unwrap();
        n.add_constructor("x_in", "x", "loop_place").unwrap();

        let x = n.trans_id("x").unwrap();
        let mut filter = HashSet::new();
        filter.insert(x);
        let handle = n.subscribe_transition_firing(5, Some(filter));
        n.simulate().unwrap();
        assert_eq!(handle.observations().transition.len(), 5);
        assert!(handle.observations().transition.iter().all(|&t| t == x.index() as u32));
    }

    #[test]
    fn priority_preemption_always_picks_the_higher_bucket() {
        // `a` (priority 1) and `b` (priority 2) are both permanently
        // enabled (their only arc is a constructor, which gates nothing);
        // the higher priority must fire every time, regardless of its
        // much larger weight being on the loser's side.
        let mut n = net();
        let ty = n.add_type("job").unwrap();
        n.add_place("p_a", ty, Policy::Fifo).unwrap();
        n.add_place("p_b", ty, Policy::Fifo).unwrap();
        n.add_immediate_transition("a", 1, 1000.0).unwrap();
        n.add_constructor("a_ctor", "a", "p_a").unwrap();
        n.add_immediate_transition("b", 2, 0.001).unwrap();
        n.add_constructor("b_ctor", "b", "p_b").unwrap();

        n.start().unwrap();
        let b = n.trans_id("b").unwrap();
        for _ in 0..50 {
            assert_eq!(n.fire_next().unwrap(), b);
        }
    }

    #[test]
    fn timed_interleaving_matches_deterministic_schedule() {
        // Two timed transitions with deterministic samplers (1.0 and 1.5);
        // each is unconditionally enabled (its only arc is a constructor,
        // which gates nothing), so both are enabled at t=0 and re-enable
        // themselves every time they fire.
        let mut n = net();
        let ty = n.add_type("job").unwrap();
        n.add_place("p_fast", ty, Policy::Fifo).unwrap();
        n.add_place("p_slow", ty, Policy::Fifo).unwrap();
        n.add_timed_transition("fast", Box::new(|| 1.0)).unwrap();
        n.add_constructor("fast_seed", "fast", "p_fast").unwrap();
        n.add_timed_transition("slow", Box::new(|| 1.5)).unwrap();
        n.add_constructor("slow_seed", "slow", "p_slow").unwrap();

        n.start().unwrap();
        let expected_times = [1.0, 1.5, 2.0, 3.0, 3.0, 4.0, 4.5, 5.0, 6.0, 6.0];
        for expected in expected_times {
            n.fire_next().unwrap();
            assert!((n.current_time() - expected).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn timed_self_loop_keeps_re_enabling() {
        // `bootstrap` seeds the loop once (an inhibitor arc disables it
        // the instant the place holds a token) and `tick` then sustains
        // itself indefinitely via its own destructor/constructor pair.
        let mut n = net();
        let ty = n.add_type("job").unwrap();
        n.add_place("loop_place", ty, Policy::Fifo).unwrap();
        n.add_immediate_transition("bootstrap", 1, 1.0).unwrap();
        n.add_inhibitor("bootstrap_inh", "bootstrap", "loop_place").unwrap();
        n.add_timed_transition("tick", Box::new(|| 1.0)).unwrap();
        n.add_destructor("tick_out", "tick", "loop_place").unwrap();
        n.add_constructor("bootstrap_ctor", "bootstrap", "loop_place").unwrap();
        n.add_constructor("tick_in", "tick", "loop_place").unwrap();

        n.start().unwrap();
        let bootstrap = n.fire_next().unwrap();
        assert_eq!(bootstrap, n.trans_id("bootstrap").unwrap());
        assert_eq!(n.current_time(), 0.0);

        for expected in [1.0, 2.0, 3.0] {
            let fired = n.fire_next().unwrap();
            assert_eq!(fired, n.trans_id("tick").unwrap());
            assert!((n.current_time() - expected).abs() < f64::EPSILON);
        }
    }
}
