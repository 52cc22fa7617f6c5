//! A supervisor driving an engine on its own thread.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crossbeam_channel::Receiver;
use strata_core::TimeStamp;
use strata_engine::{
    ConfigError, Engine, Probe, ProbeError, Supervisor, SupervisorConfig, SupervisorEvent,
    SupervisorState,
};
use strata_test_utils::{counter, level_id, Behaviour, ProbeCall, RecordingProbe, TestModel};

const PATIENCE: Duration = Duration::from_secs(10);

/// Collect events until `target` shows up.
fn wait_for(events: &Receiver<SupervisorEvent>, target: SupervisorEvent) -> Vec<SupervisorEvent> {
    let mut seen = Vec::new();
    loop {
        let event = events
            .recv_timeout(PATIENCE)
            .unwrap_or_else(|_| panic!("no {target:?} after {seen:?}"));
        seen.push(event);
        if event == target {
            return seen;
        }
    }
}

fn state_changes(events: &[SupervisorEvent]) -> Vec<SupervisorState> {
    events
        .iter()
        .filter_map(|event| match event {
            SupervisorEvent::StateChanged(state) => Some(*state),
            SupervisorEvent::ViewShutdownRequested => None,
        })
        .collect()
}

/// Asks the supervisor to pause once the given tick completes.
#[derive(Default)]
struct PauseAt {
    at: i64,
    supervisor: OnceLock<Supervisor>,
}

impl Probe for PauseAt {
    fn observe_at_partial_consistent_time(
        &self,
        time: TimeStamp,
        _engine: &Engine,
    ) -> Result<(), ProbeError> {
        if time == TimeStamp::new(self.at) {
            if let Some(supervisor) = self.supervisor.get() {
                supervisor.request_pause();
            }
        }
        Ok(())
    }
}

fn endless() -> Arc<dyn strata_model::SimulationModel> {
    TestModel::new(i64::MAX / 2)
        .with_level("L", 1, 0)
        .with_agents(3, &["L"], Behaviour::Increment)
        .shared()
}

#[test]
fn abort_while_paused() {
    let engine = Engine::sequential(0);
    let recorder = RecordingProbe::new();
    let pause = Arc::new(PauseAt {
        at: 3,
        ..PauseAt::default()
    });
    engine.add_probe("recorder", recorder.clone()).unwrap();
    engine.add_probe("pause", pause.clone()).unwrap();

    let supervisor = Supervisor::spawn(engine, endless(), SupervisorConfig::default()).unwrap();
    assert!(pause.supervisor.set(supervisor.clone()).is_ok());
    let events = supervisor.events();

    assert!(supervisor.request_start());
    let mut seen = wait_for(&events, SupervisorEvent::StateChanged(SupervisorState::Paused));
    assert_eq!(supervisor.state(), SupervisorState::Paused);
    assert!(supervisor.request_abort());
    seen.extend(wait_for(&events, SupervisorEvent::StateChanged(SupervisorState::Idle)));

    assert_eq!(
        state_changes(&seen),
        vec![
            SupervisorState::RunPlanned,
            SupervisorState::Initializing,
            SupervisorState::Running,
            SupervisorState::Paused,
            SupervisorState::AbortRequested,
            SupervisorState::Aborting,
            SupervisorState::Idle,
        ]
    );

    assert!(supervisor.request_shutdown());
    let engine = supervisor.join().unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Inactive);
    assert_eq!(engine.current_time(), TimeStamp::new(3));
    assert_eq!(counter(&engine, &level_id("L")), Some(9));

    let calls = recorder.calls();
    assert_eq!(
        calls[calls.len() - 2..],
        [
            ProbeCall { callback: "react_to_abortion", time: Some(TimeStamp::new(3)) },
            ProbeCall { callback: "end_observation", time: None },
        ]
    );
}

#[test]
fn pause_and_resume() {
    let engine = Engine::sequential(0);
    let pause = Arc::new(PauseAt {
        at: 2,
        ..PauseAt::default()
    });
    engine.add_probe("pause", pause.clone()).unwrap();
    let model = TestModel::new(5)
        .with_level("L", 1, 0)
        .with_agents(1, &["L"], Behaviour::Increment)
        .shared();

    let supervisor = Supervisor::spawn(engine, model, SupervisorConfig::default()).unwrap();
    assert!(pause.supervisor.set(supervisor.clone()).is_ok());
    let events = supervisor.events();

    assert!(supervisor.request_start());
    wait_for(&events, SupervisorEvent::StateChanged(SupervisorState::Paused));
    assert!(supervisor.request_pause());
    let seen = wait_for(&events, SupervisorEvent::StateChanged(SupervisorState::Idle));
    assert_eq!(
        state_changes(&seen),
        vec![SupervisorState::Running, SupervisorState::Idle]
    );

    assert!(supervisor.request_shutdown());
    let engine = supervisor.join().unwrap();
    assert_eq!(engine.current_time(), TimeStamp::new(5));
    assert_eq!(counter(&engine, &level_id("L")), Some(5));
}

#[test]
fn runs_again_after_completion() {
    let engine = Engine::sequential(0);
    let recorder = RecordingProbe::new();
    engine.add_probe("recorder", recorder.clone()).unwrap();
    let model = TestModel::new(4)
        .with_level("L", 1, 0)
        .with_agents(1, &["L"], Behaviour::Increment)
        .shared();

    let supervisor = Supervisor::spawn(engine, model, SupervisorConfig::default()).unwrap();
    let events = supervisor.events();
    for _ in 0..2 {
        assert!(supervisor.request_start());
        wait_for(&events, SupervisorEvent::StateChanged(SupervisorState::Idle));
    }
    assert!(supervisor.request_shutdown());
    let engine = supervisor.join().unwrap();

    assert_eq!(counter(&engine, &level_id("L")), Some(4));
    let runs = recorder
        .callbacks()
        .into_iter()
        .filter(|callback| *callback == "end_observation")
        .count();
    assert_eq!(runs, 2);
}

#[test]
fn shutdown_while_running_stops_the_driver() {
    let engine = Engine::sequential(0);
    let recorder = RecordingProbe::new();
    engine.add_probe("recorder", recorder.clone()).unwrap();
    let supervisor = Supervisor::spawn(engine, endless(), SupervisorConfig::default()).unwrap();
    let events = supervisor.events();

    assert!(supervisor.request_start());
    wait_for(&events, SupervisorEvent::StateChanged(SupervisorState::Running));
    assert!(supervisor.request_shutdown());
    let seen = wait_for(&events, SupervisorEvent::StateChanged(SupervisorState::Inactive));
    assert!(!state_changes(&seen).contains(&SupervisorState::Aborting));

    let engine = supervisor.join().unwrap();
    assert!(!engine.is_running());
    assert!(recorder.callbacks().contains(&"react_to_abortion"));
    assert_eq!(recorder.callbacks().last(), Some(&"end_observation"));
    assert!(!supervisor.request_start());
}

#[test]
fn failure_asks_the_view_to_shut_down() {
    let model = TestModel::new(10)
        .with_level("L", 1, 0)
        .with_agents(1, &["L"], Behaviour::FailFrom(TimeStamp::new(2)))
        .shared();
    let supervisor =
        Supervisor::spawn(Engine::sequential(0), model, SupervisorConfig::default()).unwrap();
    let events = supervisor.events();

    assert!(supervisor.request_start());
    let seen = wait_for(&events, SupervisorEvent::ViewShutdownRequested);
    assert_eq!(
        state_changes(&seen).last(),
        Some(&SupervisorState::Inactive)
    );

    let engine = supervisor.join().unwrap();
    assert_eq!(engine.current_time(), TimeStamp::new(1));
    assert!(!supervisor.request_start());
    assert!(supervisor.join().is_none());
}

#[test]
fn shutdown_when_idle() {
    let supervisor = Supervisor::spawn(
        Engine::sequential(0),
        endless(),
        SupervisorConfig::default(),
    )
    .unwrap();
    assert!(supervisor.is_listening());
    assert!(!supervisor.request_pause());
    assert!(supervisor.request_shutdown());
    let engine = supervisor.join().unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Inactive);
    assert_eq!(engine.agent_count(), 0);
}

#[test]
fn invalid_poll_interval_is_rejected() {
    let config = SupervisorConfig {
        pause_poll_interval: Duration::ZERO,
    };
    let result = Supervisor::spawn(Engine::sequential(0), endless(), config);
    assert!(matches!(
        result,
        Err(ConfigError::InvalidPollInterval { .. })
    ));
}
