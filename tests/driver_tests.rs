mod common;

use common::{CountingBackend, NoopSimulator, ScriptedTransport, cheater_env, station_env};
use cwlearn::agents::{AgentParams, MabBackend};
use cwlearn::error::ConfigError;
use cwlearn::simulation::{Driver, ExperimentConfig, Scenario};
use cwlearn::transport::{Act, MAX_CHEATERS};
use cwlearn::warmup::WarmupConfig;
use tokio_util::sync::CancellationToken;

fn one_cheater(agent: &str) -> ExperimentConfig {
    let mut config = ExperimentConfig::default().with_agent(agent);
    config.scenario = Scenario::MultiAgent {
        data_rate: 100,
        max_queue_size: 100,
        cheater_number: 1,
    };
    config
}

fn three_steps() -> Vec<cwlearn::transport::Env> {
    vec![cheater_env(0.0), cheater_env(1.0), cheater_env(2.0)]
}

#[tokio::test]
async fn fixed_policy_leaves_act_untouched() {
    let transport = ScriptedTransport::new(three_steps(), MAX_CHEATERS);
    let transport_calls = transport.calls.clone();
    let backend = CountingBackend::new(3);
    let backend_calls = backend.calls.clone();
    let simulator = NoopSimulator::new();
    let simulator_calls = simulator.calls.clone();

    let summary = Driver::new(one_cheater("wifi"), transport, simulator)
        .unwrap()
        .with_backend(Box::new(backend))
        .run()
        .await
        .unwrap();

    let calls = transport_calls.lock().unwrap();
    assert_eq!(calls.acquires, 3);
    assert_eq!(calls.releases, 3);
    assert_eq!(calls.closes, 1);
    for act in &calls.released {
        assert_eq!(act, &Act::new(MAX_CHEATERS));
    }

    let backend = backend_calls.lock().unwrap();
    assert!(backend.samples.is_empty());
    assert!(backend.logs.is_empty());

    let simulator = simulator_calls.lock().unwrap();
    assert_eq!((simulator.launches, simulator.waits, simulator.shutdowns), (1, 1, 1));
    assert_eq!(summary.steps, 3);
    assert_eq!(summary.exit_code, Some(0));
}

#[tokio::test]
async fn learning_backend_writes_every_snapshot() {
    let transport = ScriptedTransport::new(three_steps(), MAX_CHEATERS);
    let transport_calls = transport.calls.clone();
    let backend = CountingBackend::new(3);
    let backend_calls = backend.calls.clone();

    let summary = Driver::new(one_cheater("UCB").with_seed(4), transport, NoopSimulator::new())
        .unwrap()
        .with_backend(Box::new(backend))
        .run()
        .await
        .unwrap();

    let backend = backend_calls.lock().unwrap();
    assert_eq!(backend.inits, vec![4]);
    assert_eq!(backend.samples.len(), 3);
    for (reward, agent) in &backend.samples {
        assert!((reward - 0.9).abs() < 1e-12, "reward {}", reward);
        assert_eq!(*agent, 0);
    }
    assert_eq!(backend.logs, vec![("cw0".to_string(), 3.0); 3]);
    assert_eq!(backend.closes, 1);

    let calls = transport_calls.lock().unwrap();
    assert_eq!(calls.released.len(), 3);
    for act in &calls.released {
        assert_eq!(act.cw[0], 3);
        assert!(act.end_warmup);
        assert!(act.cw[1..].iter().all(|cw| *cw == Act::UNSET_CW));
    }

    assert_eq!(summary.agents.len(), 1);
    assert_eq!(summary.agents[0].last_cw, Some(3));
    assert!((summary.agents[0].mean_reward - 0.9).abs() < 1e-12);
    assert_eq!(summary.last_time, 2.0);
}

#[tokio::test]
async fn failing_acquire_still_tears_down_once() {
    let transport = ScriptedTransport::new(three_steps(), MAX_CHEATERS).failing_on(2);
    let transport_calls = transport.calls.clone();
    let backend = CountingBackend::new(0);
    let backend_calls = backend.calls.clone();
    let simulator = NoopSimulator::new();
    let simulator_calls = simulator.calls.clone();

    let err = Driver::new(one_cheater("UCB"), transport, simulator)
        .unwrap()
        .with_backend(Box::new(backend))
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "scripted failure on acquire 2");
    assert_eq!(err.chain().count(), 1);

    let calls = transport_calls.lock().unwrap();
    assert_eq!(calls.acquires, 2);
    assert_eq!(calls.releases, 1);
    assert_eq!(calls.closes, 1);
    assert_eq!(backend_calls.lock().unwrap().closes, 1);

    let simulator = simulator_calls.lock().unwrap();
    assert_eq!(simulator.waits, 0);
    assert_eq!(simulator.shutdowns, 1);
}

#[tokio::test]
async fn unknown_agent_fails_before_any_resource_is_used() {
    let transport = ScriptedTransport::new(three_steps(), MAX_CHEATERS);
    let transport_calls = transport.calls.clone();
    let simulator = NoopSimulator::new();
    let simulator_calls = simulator.calls.clone();

    let err = Driver::new(one_cheater("Softmax"), transport, simulator)
        .err()
        .unwrap();

    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::UnknownAgent("Softmax".into()))
    );
    let calls = transport_calls.lock().unwrap();
    assert_eq!((calls.acquires, calls.releases, calls.closes), (0, 0, 0));
    assert_eq!(simulator_calls.lock().unwrap().launches, 0);
}

#[tokio::test]
async fn out_of_range_action_propagates_after_release() {
    let transport = ScriptedTransport::new(three_steps(), MAX_CHEATERS);
    let transport_calls = transport.calls.clone();
    let backend = CountingBackend::new(24);
    let backend_calls = backend.calls.clone();

    let err = Driver::new(one_cheater("UCB"), transport, NoopSimulator::new())
        .unwrap()
        .with_backend(Box::new(backend))
        .run()
        .await
        .unwrap_err();

    assert!(err.downcast_ref::<cwlearn::error::ActionError>().is_some());
    let calls = transport_calls.lock().unwrap();
    assert_eq!((calls.acquires, calls.releases, calls.closes), (1, 1, 1));
    assert_eq!(backend_calls.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn single_agent_writes_link_flags() {
    let config = ExperimentConfig::for_scenario("scenario_mgr".parse().unwrap()).with_agent("EGreedy");
    let envs = vec![station_env(0.5, 57.5), station_env(1.0, 57.5)];
    let transport = ScriptedTransport::new(envs, 1);
    let transport_calls = transport.calls.clone();
    // (7, 2, 2): index 5 is CW 1, RTS/CTS off, AMPDU on
    let backend = CountingBackend::new(5);
    let backend_calls = backend.calls.clone();

    Driver::new(config, transport, NoopSimulator::new())
        .unwrap()
        .with_backend(Box::new(backend))
        .run()
        .await
        .unwrap();

    for (reward, _) in &backend_calls.lock().unwrap().samples {
        assert!((reward - 0.5).abs() < 1e-12, "reward {}", reward);
    }
    let calls = transport_calls.lock().unwrap();
    for act in &calls.released {
        assert_eq!(act.cw, vec![1]);
        assert_eq!(act.rts_cts, vec![false]);
        assert_eq!(act.ampdu, vec![true]);
    }
}

#[tokio::test]
async fn warmup_flag_needs_every_agent() {
    let mut config = one_cheater("UCB").with_warmup(WarmupConfig {
        enabled: true,
        max_time: 1.5,
        ..WarmupConfig::default()
    });
    config.scenario = Scenario::MultiAgent {
        data_rate: 100,
        max_queue_size: 100,
        cheater_number: 2,
    };
    let transport = ScriptedTransport::new(three_steps(), MAX_CHEATERS);
    let transport_calls = transport.calls.clone();

    let summary = Driver::new(config, transport, NoopSimulator::new())
        .unwrap()
        .with_backend(Box::new(CountingBackend::new(7)))
        .run()
        .await
        .unwrap();

    let calls = transport_calls.lock().unwrap();
    let flags: Vec<bool> = calls.released.iter().map(|act| act.end_warmup).collect();
    // window never fills; only the time bound at t = 2.0 ends warm-up
    assert_eq!(flags, vec![false, false, true]);
    assert_eq!(calls.released[2].cw[..2], [7, 7]);
    assert!(summary.agents.iter().all(|a| a.warmup_end == Some(2.0)));
}

#[tokio::test]
async fn cancelled_run_still_cleans_up() {
    let transport = ScriptedTransport::new(three_steps(), MAX_CHEATERS);
    let transport_calls = transport.calls.clone();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = Driver::new(one_cheater("UCB"), transport, NoopSimulator::new())
        .unwrap()
        .with_backend(Box::new(CountingBackend::new(0)))
        .with_cancel(cancel)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.steps, 0);
    let calls = transport_calls.lock().unwrap();
    assert_eq!((calls.acquires, calls.closes), (0, 1));
}

#[tokio::test]
async fn failing_backend_log_does_not_end_the_run() {
    let transport = ScriptedTransport::new(three_steps(), MAX_CHEATERS);
    let transport_calls = transport.calls.clone();
    let backend = CountingBackend::new(3).failing_logs();
    let backend_calls = backend.calls.clone();

    let summary = Driver::new(one_cheater("UCB"), transport, NoopSimulator::new())
        .unwrap()
        .with_backend(Box::new(backend))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.steps, 3);
    let backend = backend_calls.lock().unwrap();
    assert_eq!((backend.samples.len(), backend.logs.len(), backend.closes), (3, 3, 1));

    let calls = transport_calls.lock().unwrap();
    assert_eq!((calls.releases, calls.closes), (3, 1));
    assert!(calls.released.iter().all(|act| act.cw[0] == 3));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn unwritable_metric_log_does_not_fail_the_run() {
    let transport = ScriptedTransport::new(vec![cheater_env(0.0)], MAX_CHEATERS);
    let transport_calls = transport.calls.clone();
    // writes to /dev/full fail with ENOSPC once flushed
    let backend = MabBackend::new("UCB", AgentParams::default(), 24)
        .unwrap()
        .with_metric_log("/dev/full");

    let summary = Driver::new(one_cheater("UCB"), transport, NoopSimulator::new())
        .unwrap()
        .with_backend(Box::new(backend))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.steps, 1);
    let calls = transport_calls.lock().unwrap();
    assert_eq!((calls.releases, calls.closes), (1, 1));
    assert!((0..24).contains(&calls.released[0].cw[0]));
}

#[tokio::test]
async fn undefined_fairness_is_ignored_when_unweighted() {
    let config = ExperimentConfig::for_scenario("scenario_mgr".parse().unwrap()).with_agent("EGreedy");
    let mut env = station_env(0.5, 57.5);
    env.fairness = f64::NAN;
    let transport = ScriptedTransport::new(vec![env], 1);
    let backend = CountingBackend::new(0);
    let backend_calls = backend.calls.clone();

    let summary = Driver::new(config, transport, NoopSimulator::new())
        .unwrap()
        .with_backend(Box::new(backend))
        .run()
        .await
        .unwrap();

    let backend = backend_calls.lock().unwrap();
    assert_eq!(backend.samples.len(), 1);
    assert!((backend.samples[0].0 - 0.5).abs() < 1e-12, "reward {}", backend.samples[0].0);
    assert!((summary.agents[0].mean_reward - 0.5).abs() < 1e-12);
}
