use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::Result;
use tokio::task::JoinHandle;

use crate::{
    config::Config,
    device::{Accuracy, GeolocationProvider},
    protocol::{Location, SearchCandidate},
    server::Geocoder,
};

/// What the candidate list under the search box currently holds.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CandidateState {
    /// Nothing to show.
    #[default]
    Empty,
    /// A lookup is on the wire.
    Loading,
    /// Matches for the current query.
    Populated(Vec<SearchCandidate>),
}

/// Stamp handed out when a device position request starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeolocationToken(u64);

#[derive(Debug, Default)]
struct SelectionState {
    location: Option<Location>,
    query: String,
    candidates: CandidateState,
    /// Bumped on every query change and every pick; a lookup only lands if it still matches.
    search_generation: u64,
    /// Bumped on every position request and every user pick.
    geolocation_generation: u64,
}

impl SelectionState {
    /// A location chosen by the user. Outstanding device fixes lose.
    fn choose(&mut self, location: Location) {
        self.location = Some(location);
        self.geolocation_generation += 1;
    }
}

type SharedState = Arc<Mutex<SelectionState>>;

fn lock(state: &Mutex<SelectionState>) -> MutexGuard<'_, SelectionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the one selected location and merges every way of picking it.
///
/// Sources are device geolocation, debounced geocoder search, picking a search
/// candidate, clicking the map, and the location in the launch URL. Every
/// asynchronous source stamps its request with a generation counter and its
/// result is dropped if the counter has moved on, so a slow answer can never
/// overwrite something the user did afterwards.
///
/// Methods that schedule work spawn onto the current tokio runtime.
pub struct LocationSelectionController<G> {
    state: SharedState,
    geocoder: Arc<G>,
    debounce: Duration,
    min_query_chars: usize,
    accuracy: Accuracy,
    home: Option<Location>,
    pending_search: Option<JoinHandle<()>>,
}

impl<G: Geocoder> LocationSelectionController<G> {
    /// Start with `home` (usually from the launch URL) selected, if given.
    pub fn new(geocoder: G, config: &Config, home: Option<Location>) -> Self {
        let state = SelectionState {
            location: home,
            ..SelectionState::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            geocoder: Arc::new(geocoder),
            debounce: config.debounce,
            min_query_chars: config.min_query_chars,
            accuracy: config.geolocation_accuracy,
            home,
            pending_search: None,
        }
    }

    /// The selected location, if any.
    pub fn current_location(&self) -> Option<Location> {
        lock(&self.state).location
    }

    /// Text in the search box.
    pub fn query(&self) -> String {
        lock(&self.state).query.clone()
    }

    /// Full state of the candidate list, including `Loading`.
    pub fn candidate_state(&self) -> CandidateState {
        lock(&self.state).candidates.clone()
    }

    /// Candidates ready to be picked; empty while loading.
    pub fn candidates(&self) -> Vec<SearchCandidate> {
        match &lock(&self.state).candidates {
            CandidateState::Populated(candidates) => candidates.clone(),
            _ => Vec::new(),
        }
    }

    /// Where the map should be centered.
    pub fn map_center(&self) -> Location {
        self.current_location()
            .unwrap_or(Location::DEFAULT_MAP_CENTER)
    }

    /// The location from the launch URL, if there was one.
    pub fn home_location(&self) -> Option<Location> {
        self.home
    }

    /// Start a device position request.
    pub fn begin_geolocation(&self) -> GeolocationToken {
        let mut state = lock(&self.state);
        state.geolocation_generation += 1;
        GeolocationToken(state.geolocation_generation)
    }

    /// Apply the answer to the request stamped with `token`.
    ///
    /// A fix only lands if nothing has been selected and no newer request or user
    /// pick happened in the meantime. Failures are logged and otherwise ignored.
    pub fn on_geolocation_resolved(&self, token: GeolocationToken, result: Result<Location>) {
        apply_geolocation(&self.state, token, result);
    }

    /// Ask `provider` for a fix at the configured accuracy in the background.
    pub fn locate_device<P>(&self, provider: P) -> JoinHandle<()>
    where
        P: GeolocationProvider + 'static,
    {
        let token = self.begin_geolocation();
        let state = Arc::clone(&self.state);
        let accuracy = self.accuracy;

        tokio::spawn(async move {
            let result = provider.current_position(accuracy).await;
            apply_geolocation(&state, token, result);
        })
    }

    /// The search box changed: restart the debounce window.
    ///
    /// Short queries empty the candidate list right away and are never looked up.
    pub fn on_search_query_changed(&mut self, text: impl Into<String>) {
        let query = text.into();
        self.cancel_pending_search();

        let generation = {
            let mut state = lock(&self.state);
            state.query = query.clone();
            state.search_generation += 1;

            if query.chars().count() <= self.min_query_chars {
                state.candidates = CandidateState::Empty;
                return;
            }
            state.search_generation
        };

        let state = Arc::clone(&self.state);
        let geocoder = Arc::clone(&self.geocoder);
        let debounce = self.debounce;

        self.pending_search = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            lookup(state, geocoder, query, generation).await;
        }));
    }

    /// Wait until the scheduled lookup, if any, has landed or been dropped.
    pub async fn wait_for_search(&mut self) {
        if let Some(pending) = self.pending_search.take() {
            if let Err(e) = pending.await {
                if !e.is_cancelled() {
                    log::warn!("search task failed: {e}");
                }
            }
        }
    }

    /// Pick a candidate from the list.
    ///
    /// The query text becomes the candidate's name without triggering a new lookup.
    /// Candidates with unparsable coordinates are refused and nothing changes.
    pub fn on_candidate_selected(&mut self, candidate: &SearchCandidate) -> Result<Location> {
        let location = candidate.to_location().inspect_err(|e| {
            log::warn!("ignoring candidate: {e:#}");
        })?;

        self.cancel_pending_search();

        let mut state = lock(&self.state);
        state.choose(location);
        state.query = candidate.display_name.clone();
        state.candidates = CandidateState::Empty;
        state.search_generation += 1;

        Ok(location)
    }

    /// The user clicked the map. The search box is left alone.
    pub fn on_map_clicked(&mut self, location: Location) {
        lock(&self.state).choose(location);
    }

    /// Enter in the search box picks the first candidate, if there is one.
    pub fn on_submit_search_form(&mut self) -> Option<Location> {
        let first = self.candidates().into_iter().next()?;
        self.on_candidate_selected(&first).ok()
    }

    /// Go back to the location from the launch URL; does nothing without one.
    pub fn set_home_location(&mut self) -> Option<Location> {
        let home = self.home?;
        lock(&self.state).choose(home);
        Some(home)
    }

    /// Forget the selected location.
    pub fn clear_location(&mut self) {
        let mut state = lock(&self.state);
        state.location = None;
        state.geolocation_generation += 1;
    }

    fn cancel_pending_search(&mut self) {
        if let Some(pending) = self.pending_search.take() {
            pending.abort();
        }
    }
}

impl<G> Drop for LocationSelectionController<G> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending_search.take() {
            pending.abort();
        }
    }
}

fn apply_geolocation(state: &Mutex<SelectionState>, token: GeolocationToken, result: Result<Location>) {
    let location = match result {
        Ok(location) => location,
        Err(e) => {
            log::warn!("geolocation failed: {e:#}");
            return;
        }
    };
    if !location.is_valid() {
        log::warn!("geolocation returned an impossible fix {location}");
        return;
    }

    let mut state = lock(state);
    if token.0 != state.geolocation_generation {
        log::debug!("dropping stale device fix {location}");
        return;
    }
    if state.location.is_some() {
        log::debug!("location already chosen, ignoring device fix {location}");
        return;
    }

    log::info!("device location: {location}");
    state.location = Some(location);
}

async fn lookup<G: Geocoder>(state: SharedState, geocoder: Arc<G>, query: String, generation: u64) {
    {
        let mut state = lock(&state);
        if state.search_generation != generation {
            return;
        }
        state.candidates = CandidateState::Loading;
    }

    let result = geocoder.search(&query).await;

    let mut state = lock(&state);
    if state.search_generation != generation {
        log::debug!("dropping stale results for {query:?}");
        return;
    }

    state.candidates = match result {
        Ok(candidates) if !candidates.is_empty() => CandidateState::Populated(candidates),
        Ok(_) => CandidateState::Empty,
        Err(e) => {
            log::debug!("lookup for {query:?} failed: {e:#}");
            CandidateState::Empty
        }
    };
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::anyhow;

    use super::*;
    use crate::device::FixedPosition;

    #[derive(Default)]
    struct MockGeocoder {
        answers: HashMap<&'static str, Vec<SearchCandidate>>,
        delays: HashMap<&'static str, Duration>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockGeocoder {
        fn answering(mut self, query: &'static str, candidates: Vec<SearchCandidate>) -> Self {
            self.answers.insert(query, candidates);
            self
        }

        fn slow(mut self, query: &'static str, delay: Duration) -> Self {
            self.delays.insert(query, delay);
            self
        }
    }

    impl Geocoder for MockGeocoder {
        async fn search(&self, query: &str) -> Result<Vec<SearchCandidate>> {
            self.calls.lock().unwrap().push(query.to_string());
            if let Some(delay) = self.delays.get(query) {
                tokio::time::sleep(*delay).await;
            }
            self.answers
                .get(query)
                .cloned()
                .ok_or_else(|| anyhow!("geocoder unreachable"))
        }
    }

    fn candidate(lat: &str, lon: &str, name: &str) -> SearchCandidate {
        SearchCandidate {
            lat: lat.to_string(),
            lon: lon.to_string(),
            display_name: name.to_string(),
        }
    }

    fn bangalore() -> SearchCandidate {
        candidate("12.97", "77.59", "Bangalore, India")
    }

    fn controller(geocoder: MockGeocoder) -> (LocationSelectionController<MockGeocoder>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::clone(&geocoder.calls);
        (LocationSelectionController::new(geocoder, &Config::default(), None), calls)
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_select_end_to_end() {
        let (mut selection, calls) =
            controller(MockGeocoder::default().answering("Bangalore", vec![bangalore()]));

        selection.on_search_query_changed("Bangalore");
        tokio::time::sleep(Duration::from_millis(299)).await;
        assert!(calls.lock().unwrap().is_empty());

        selection.wait_for_search().await;
        assert_eq!(*calls.lock().unwrap(), vec!["Bangalore".to_string()]);
        assert_eq!(selection.candidates(), vec![bangalore()]);

        let location = selection.on_candidate_selected(&bangalore()).unwrap();

        assert_eq!(location, Location::new(12.97, 77.59));
        assert_eq!(selection.current_location(), Some(location));
        assert_eq!(selection.query(), "Bangalore, India");
        assert_eq!(selection.candidate_state(), CandidateState::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_burst_issues_one_lookup() {
        let (mut selection, calls) =
            controller(MockGeocoder::default().answering("Bangalore", vec![bangalore()]));

        for prefix in ["Ban", "Bang", "Banga", "Bangalore"] {
            selection.on_search_query_changed(prefix);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        selection.wait_for_search().await;

        assert_eq!(*calls.lock().unwrap(), vec!["Bangalore".to_string()]);
        assert_eq!(selection.candidates(), vec![bangalore()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_query_always_empties_candidates() {
        let (mut selection, calls) =
            controller(MockGeocoder::default().answering("Bangalore", vec![bangalore()]));

        selection.on_search_query_changed("Bangalore");
        selection.wait_for_search().await;
        assert!(!selection.candidates().is_empty());

        for short in ["Ba", "B", ""] {
            selection.on_search_query_changed(short);
            assert_eq!(selection.candidate_state(), CandidateState::Empty);
            selection.wait_for_search().await;
            assert_eq!(selection.candidate_state(), CandidateState::Empty);
        }

        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_query_cancels_scheduled_lookup() {
        let (mut selection, calls) =
            controller(MockGeocoder::default().answering("Bangalore", vec![bangalore()]));

        selection.on_search_query_changed("Bangalore");
        tokio::time::sleep(Duration::from_millis(100)).await;
        selection.on_search_query_changed("Ba");
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(selection.candidate_state(), CandidateState::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_failure_clears_candidates() {
        let (mut selection, _calls) =
            controller(MockGeocoder::default().answering("Bangalore", vec![bangalore()]));

        selection.on_search_query_changed("Bangalore");
        selection.wait_for_search().await;
        selection.on_search_query_changed("Nowhere at all");
        selection.wait_for_search().await;

        assert_eq!(selection.candidate_state(), CandidateState::Empty);
        assert_eq!(selection.current_location(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_while_lookup_in_flight() {
        let (mut selection, _calls) = controller(
            MockGeocoder::default()
                .answering("Bangalore", vec![bangalore()])
                .slow("Bangalore", Duration::from_secs(2)),
        );

        selection.on_search_query_changed("Bangalore");
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(selection.candidate_state(), CandidateState::Loading);

        selection.wait_for_search().await;
        assert_eq!(selection.candidates(), vec![bangalore()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_stale_lookup_never_lands() {
        let delhi = candidate("28.61", "77.21", "Delhi, India");
        let (mut selection, calls) = controller(
            MockGeocoder::default()
                .answering("Delhi", vec![delhi])
                .slow("Delhi", Duration::from_secs(5))
                .answering("Bangalore", vec![bangalore()]),
        );

        selection.on_search_query_changed("Delhi");
        tokio::time::sleep(Duration::from_millis(400)).await;
        selection.on_search_query_changed("Bangalore");
        selection.wait_for_search().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["Delhi".to_string(), "Bangalore".to_string()]
        );
        assert_eq!(selection.candidates(), vec![bangalore()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pick_cancels_in_flight_lookup() {
        let (mut selection, _calls) = controller(
            MockGeocoder::default()
                .answering("Bangalore", vec![bangalore()])
                .answering("Bangalore, India", vec![bangalore()])
                .slow("Bangalore, India", Duration::from_secs(5)),
        );

        selection.on_search_query_changed("Bangalore");
        selection.wait_for_search().await;
        selection.on_search_query_changed("Bangalore, India");
        tokio::time::sleep(Duration::from_secs(1)).await;
        selection.on_candidate_selected(&bangalore()).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(selection.candidate_state(), CandidateState::Empty);
    }

    #[tokio::test]
    async fn test_bad_candidate_is_refused() {
        let (mut selection, _calls) = controller(MockGeocoder::default());
        selection.on_map_clicked(Location::new(1.0, 2.0));

        for (lat, lon) in [("north", "77.59"), ("NaN", "77.59"), ("12.97", "inf")] {
            assert!(selection
                .on_candidate_selected(&candidate(lat, lon, "Somewhere"))
                .is_err());
        }
        assert_eq!(selection.current_location(), Some(Location::new(1.0, 2.0)));
        assert_eq!(selection.query(), "");
    }

    #[tokio::test]
    async fn test_map_click_keeps_query() {
        let (mut selection, _calls) = controller(MockGeocoder::default());
        selection.on_search_query_changed("Ba");

        selection.on_map_clicked(Location::new(13.0, 77.6));

        assert_eq!(selection.current_location(), Some(Location::new(13.0, 77.6)));
        assert_eq!(selection.query(), "Ba");
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_search_form_picks_first() {
        let mysore = candidate("12.29", "76.63", "Mysore, India");
        let (mut selection, _calls) = controller(
            MockGeocoder::default().answering("Bangalore", vec![bangalore(), mysore]),
        );

        assert_eq!(selection.on_submit_search_form(), None);
        assert_eq!(selection.current_location(), None);

        selection.on_search_query_changed("Bangalore");
        selection.wait_for_search().await;

        assert_eq!(
            selection.on_submit_search_form(),
            Some(Location::new(12.97, 77.59))
        );
        assert_eq!(selection.query(), "Bangalore, India");
        assert!(selection.candidates().is_empty());
    }

    #[tokio::test]
    async fn test_device_fix_fills_empty_selection() {
        let (selection, _calls) = controller(MockGeocoder::default());
        let here = Location::new(28.61, 77.21);

        selection.locate_device(FixedPosition(Some(here))).await.unwrap();

        assert_eq!(selection.current_location(), Some(here));
    }

    #[tokio::test]
    async fn test_late_device_fix_loses_to_map_click() {
        let (mut selection, _calls) = controller(MockGeocoder::default());
        let token = selection.begin_geolocation();

        selection.on_map_clicked(Location::new(13.0, 77.6));
        selection.on_geolocation_resolved(token, Ok(Location::new(28.61, 77.21)));

        assert_eq!(selection.current_location(), Some(Location::new(13.0, 77.6)));
    }

    #[tokio::test]
    async fn test_late_device_fix_does_not_refill_cleared_selection() {
        let (mut selection, _calls) = controller(MockGeocoder::default());
        let token = selection.begin_geolocation();

        selection.on_map_clicked(Location::new(13.0, 77.6));
        selection.clear_location();
        selection.on_geolocation_resolved(token, Ok(Location::new(28.61, 77.21)));

        assert_eq!(selection.current_location(), None);
    }

    #[tokio::test]
    async fn test_superseded_device_request_is_dropped() {
        let (selection, _calls) = controller(MockGeocoder::default());
        let first = selection.begin_geolocation();
        let second = selection.begin_geolocation();

        selection.on_geolocation_resolved(first, Ok(Location::new(1.0, 1.0)));
        assert_eq!(selection.current_location(), None);

        selection.on_geolocation_resolved(second, Ok(Location::new(2.0, 2.0)));
        assert_eq!(selection.current_location(), Some(Location::new(2.0, 2.0)));
    }

    #[tokio::test]
    async fn test_device_failure_is_silent() {
        let (selection, _calls) = controller(MockGeocoder::default());

        selection.locate_device(FixedPosition(None)).await.unwrap();

        assert_eq!(selection.current_location(), None);
        assert_eq!(selection.map_center(), Location::DEFAULT_MAP_CENTER);
    }

    #[tokio::test]
    async fn test_device_fix_out_of_range_is_ignored() {
        let (selection, _calls) = controller(MockGeocoder::default());

        selection
            .locate_device(FixedPosition(Some(Location::new(f64::NAN, 77.21))))
            .await
            .unwrap();

        assert_eq!(selection.current_location(), None);
    }

    struct RecordingProvider(Arc<Mutex<Vec<Accuracy>>>);

    impl GeolocationProvider for RecordingProvider {
        async fn current_position(&self, accuracy: Accuracy) -> Result<Location> {
            self.0.lock().unwrap().push(accuracy);
            Ok(Location::new(28.61, 77.21))
        }
    }

    #[tokio::test]
    async fn test_device_is_asked_for_configured_accuracy() {
        let asked = Arc::new(Mutex::new(Vec::new()));

        let (selection, _calls) = controller(MockGeocoder::default());
        selection
            .locate_device(RecordingProvider(Arc::clone(&asked)))
            .await
            .unwrap();

        let config = Config {
            geolocation_accuracy: Accuracy::Coarse,
            ..Config::default()
        };
        let coarse = LocationSelectionController::new(MockGeocoder::default(), &config, None);
        coarse
            .locate_device(RecordingProvider(Arc::clone(&asked)))
            .await
            .unwrap();

        assert_eq!(*asked.lock().unwrap(), vec![Accuracy::High, Accuracy::Coarse]);
        assert_eq!(coarse.current_location(), Some(Location::new(28.61, 77.21)));
    }

    #[tokio::test]
    async fn test_home_location() {
        let home = Location::new(12.9716, 77.5946);
        let mut selection =
            LocationSelectionController::new(MockGeocoder::default(), &Config::default(), Some(home));
        assert_eq!(selection.current_location(), Some(home));

        // a device fix does not displace the launch location
        selection
            .locate_device(FixedPosition(Some(Location::new(28.61, 77.21))))
            .await
            .unwrap();
        assert_eq!(selection.current_location(), Some(home));

        selection.on_map_clicked(Location::new(13.0, 77.6));
        assert_eq!(selection.set_home_location(), Some(home));
        assert_eq!(selection.current_location(), Some(home));
    }

    #[tokio::test]
    async fn test_set_home_location_without_home() {
        let (mut selection, _calls) = controller(MockGeocoder::default());

        assert_eq!(selection.set_home_location(), None);
        assert_eq!(selection.current_location(), None);
    }
}
