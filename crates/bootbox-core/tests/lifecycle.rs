//! Lifecycle tests against the recording mock provisioner.
//!
//! Each test builds a scratch workspace, runs `setup`/`teardown` the way a
//! host orchestrator would, and checks the exact sequence of provisioning
//! calls plus the build log.

use bootbox_config::WrapperConfig;
use bootbox_core::{
    BuildContext, BuildContextBridge, ContextFile, CoreError, LifecycleController, LifecycleState,
    SetupOutcome, TeardownOutcome,
};
use bootbox_provision::{
    EnvironmentHandle, LogSink, MachineRecord, MemorySink, MockProvisioner, ProvisionCall,
    ProvisionError, Target,
};
use std::path::Path;
use std::sync::Arc;

fn workspace_with_descriptor() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Vagrantfile"),
        "Vagrant.configure(\"2\") do |config|\nend\n",
    )
    .unwrap();
    dir
}

fn config(destroy: bool, reload: bool) -> WrapperConfig {
    WrapperConfig {
        destroy_on_teardown: destroy,
        reload_existing_machines: reload,
        provisioner: "mock".to_owned(),
        ..WrapperConfig::default()
    }
}

fn harness(mock: &MockProvisioner) -> (LifecycleController, Arc<MemorySink>) {
    (
        LifecycleController::new(Box::new(mock.clone())),
        Arc::new(MemorySink::new()),
    )
}

fn bring_up_all() -> ProvisionCall {
    ProvisionCall::BringUp {
        target: Target::All,
        skip_provisioning: true,
    }
}

fn destroy_all() -> ProvisionCall {
    ProvisionCall::Destroy {
        target: Target::All,
        force: true,
    }
}

// Scenario A: bulk boot, destroy on teardown.
#[test]
fn bulk_boot_then_forced_destroy() {
    let ws = workspace_with_descriptor();
    let mock = MockProvisioner::new();
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    let outcome = controller
        .setup(&config(true, false), ws.path(), sink.clone(), &mut ctx)
        .unwrap();
    assert!(matches!(outcome, SetupOutcome::Active(_)));
    assert_eq!(controller.state(), LifecycleState::Active);
    assert_eq!(mock.commands(), vec![bring_up_all()]);

    let handle = ctx.environment().unwrap();
    assert_eq!(handle.root(), ws.path());
    assert_eq!(handle.provisioner(), "mock");
    assert!(!ctx.is_dirty());
    assert!(ctx.destroy_policy());

    let outcome = controller.teardown(&mut ctx, sink.clone()).unwrap();
    assert_eq!(outcome, TeardownOutcome::Destroyed);
    assert_eq!(controller.state(), LifecycleState::Done);
    assert_eq!(mock.commands(), vec![bring_up_all(), destroy_all()]);
    assert!(ctx.environment().is_none());

    let lines = sink.lines();
    assert!(lines.contains(&"Running mock with version: 0.0.0-mock".to_owned()));
    assert!(lines.contains(&"mock box is online, continuing with the build".to_owned()));
    assert!(lines.contains(&"Build finished, destroying the mock box".to_owned()));
}

// Scenario B: no descriptor, nothing provisioned.
#[test]
fn missing_descriptor_is_not_executed() {
    let ws = tempfile::tempdir().unwrap();
    let mock = MockProvisioner::new();
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    let outcome = controller
        .setup(&config(true, false), ws.path(), sink.clone(), &mut ctx)
        .unwrap();
    assert!(
        matches!(outcome, SetupOutcome::NotExecuted { ref reason } if reason.contains("Vagrantfile"))
    );
    assert_eq!(controller.state(), LifecycleState::Aborted);
    assert!(ctx.environment().is_none());

    let outcome = controller.teardown(&mut ctx, sink.clone()).unwrap();
    assert_eq!(outcome, TeardownOutcome::NothingToDo);
    assert!(mock.calls().is_empty());

    let lines = sink.lines();
    assert_eq!(lines[0], "There is no Vagrantfile in your workspace!");
    assert_eq!(lines[1], format!("We looked in: {}", ws.path().display()));
    assert_eq!(lines.len(), 2);
}

// Scenario C: reload mode boots missing machines and reloads existing ones.
#[test]
fn reload_mode_follows_descriptor_order() {
    let ws = workspace_with_descriptor();
    let mock = MockProvisioner::new().with_machines(vec![
        MachineRecord::new("machine1", false),
        MachineRecord::new("machine2", true),
    ]);
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    controller
        .setup(&config(false, true), ws.path(), sink.clone(), &mut ctx)
        .unwrap();

    assert_eq!(
        mock.commands(),
        vec![
            ProvisionCall::BringUp {
                target: Target::Machine("machine1".to_owned()),
                skip_provisioning: false,
            },
            ProvisionCall::Reload {
                machine: "machine2".to_owned(),
                skip_provisioning: true,
            },
        ]
    );

    let lines = sink.lines();
    let creating = lines
        .iter()
        .position(|l| l == "Creating 'machine1' VM ...")
        .unwrap();
    let reloading = lines
        .iter()
        .position(|l| l == "Reloading 'machine2' VM ...")
        .unwrap();
    assert!(creating < reloading);
}

// Scenario D: keep policy, nothing destroyed and nothing said about it.
#[test]
fn keep_policy_never_destroys() {
    let ws = workspace_with_descriptor();
    let mock = MockProvisioner::new();
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    controller
        .setup(&config(false, false), ws.path(), sink.clone(), &mut ctx)
        .unwrap();
    let before = sink.lines().len();

    let outcome = controller.teardown(&mut ctx, sink.clone()).unwrap();
    assert_eq!(outcome, TeardownOutcome::Retained);
    assert_eq!(mock.commands(), vec![bring_up_all()]);
    assert_eq!(sink.lines().len(), before);
    assert!(!sink.lines().iter().any(|l| l.contains("destroy")));
    assert!(mock.machines().iter().all(|m| m.created));
}

#[test]
fn bulk_mode_issues_one_command_regardless_of_machine_count() {
    let ws = workspace_with_descriptor();
    let mock = MockProvisioner::new().with_machines(vec![
        MachineRecord::new("a", false),
        MachineRecord::new("b", true),
        MachineRecord::new("c", false),
    ]);
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    controller
        .setup(&config(false, false), ws.path(), sink, &mut ctx)
        .unwrap();
    assert_eq!(mock.commands(), vec![bring_up_all()]);
    assert!(!mock.calls().contains(&ProvisionCall::ListMachines));
}

#[test]
fn reload_mode_never_boots_or_destroys_created_machines() {
    let ws = workspace_with_descriptor();
    let mock = MockProvisioner::new().with_machines(vec![
        MachineRecord::new("web", true),
        MachineRecord::new("db", true),
    ]);
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    controller
        .setup(&config(false, true), ws.path(), sink, &mut ctx)
        .unwrap();
    let commands = mock.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands.iter().all(|c| matches!(
        c,
        ProvisionCall::Reload {
            skip_provisioning: true,
            ..
        }
    )));
}

#[test]
fn configured_descriptor_path_is_used() {
    let ws = tempfile::tempdir().unwrap();
    let vm = workspace_with_descriptor();
    let mock = MockProvisioner::new();
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    let cfg = WrapperConfig {
        descriptor_path: Some(vm.path().to_path_buf()),
        ..config(false, false)
    };
    let outcome = controller.setup(&cfg, ws.path(), sink, &mut ctx).unwrap();
    match outcome {
        SetupOutcome::Active(handle) => assert_eq!(handle.root(), vm.path()),
        other => panic!("expected Active, got {other:?}"),
    }
    assert_eq!(
        mock.calls()[0],
        ProvisionCall::Open {
            root: vm.path().to_path_buf()
        }
    );
}

#[test]
fn failed_command_aborts_setup() {
    let ws = workspace_with_descriptor();
    let mock = MockProvisioner::new()
        .with_machines(vec![
            MachineRecord::new("a", false),
            MachineRecord::new("b", true),
            MachineRecord::new("c", true),
        ])
        .failing_on("reload");
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    let err = controller
        .setup(&config(true, true), ws.path(), sink.clone(), &mut ctx)
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Provision(ProvisionError::CommandFailed { .. })
    ));
    assert_eq!(controller.state(), LifecycleState::Aborted);
    assert!(ctx.environment().is_none());

    // Machine `c` is never touched once `b` fails.
    assert_eq!(mock.commands().len(), 2);
    assert!(sink
        .lines()
        .last()
        .unwrap()
        .starts_with("error: provisioning error:"));

    assert_eq!(
        controller.teardown(&mut ctx, sink).unwrap(),
        TeardownOutcome::NothingToDo
    );
    assert_eq!(mock.commands().len(), 2);
}

#[test]
fn interactive_prompt_fails_the_build() {
    let ws = workspace_with_descriptor();
    let mock = MockProvisioner::new().prompting_on("up", "Trust host key for 10.0.0.5? [y/N]");
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    let err = controller
        .setup(&config(true, false), ws.path(), sink.clone(), &mut ctx)
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Provision(ProvisionError::InteractiveInputUnavailable(_))
    ));
    assert_eq!(controller.state(), LifecycleState::Aborted);
    assert!(sink
        .lines()
        .contains(&"Trust host key for 10.0.0.5? [y/N]".to_owned()));
}

#[test]
fn unavailable_tool_aborts_before_opening_a_session() {
    let ws = workspace_with_descriptor();
    let mock = MockProvisioner::new().unavailable();
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    let err = controller
        .setup(&config(true, false), ws.path(), sink, &mut ctx)
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Provision(ProvisionError::Unavailable(_))
    ));
    assert!(mock.calls().is_empty());
}

#[test]
fn teardown_without_setup_is_a_no_op() {
    let mock = MockProvisioner::new();
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();
    ctx.destroy_policy = true;

    assert_eq!(
        controller.teardown(&mut ctx, sink.clone()).unwrap(),
        TeardownOutcome::NothingToDo
    );
    assert_eq!(controller.state(), LifecycleState::Idle);
    assert!(mock.calls().is_empty());
    assert!(sink.lines().is_empty());
}

#[test]
fn terminal_states_reject_further_operations() {
    let ws = workspace_with_descriptor();
    let mock = MockProvisioner::new();
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    controller
        .setup(&config(true, false), ws.path(), sink.clone(), &mut ctx)
        .unwrap();
    controller.teardown(&mut ctx, sink.clone()).unwrap();

    let err = controller
        .setup(&config(true, false), ws.path(), sink.clone(), &mut ctx)
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { .. }));

    ctx.publish(EnvironmentHandle::new("mock", ws.path()), true);
    let err = controller.teardown(&mut ctx, sink.clone()).unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { .. }));
    assert_eq!(mock.commands().len(), 2);

    let rejected: Vec<String> = sink
        .lines()
        .into_iter()
        .filter(|l| l.starts_with("error: invalid lifecycle transition"))
        .collect();
    assert_eq!(
        rejected,
        vec![
            "error: invalid lifecycle transition: done -> provisioning",
            "error: invalid lifecycle transition: done -> tearing_down",
        ]
    );
    assert_eq!(controller.state(), LifecycleState::Done);
}

#[test]
fn teardown_from_a_fresh_wrapper_reads_policy_from_context() {
    let ws = workspace_with_descriptor();
    let store = tempfile::tempdir().unwrap();
    let file = ContextFile::new(store.path().join("ctx.json"));
    let mock = MockProvisioner::new();
    let sink: Arc<dyn LogSink> = Arc::new(MemorySink::new());

    {
        let mut setup_controller = LifecycleController::new(Box::new(mock.clone()));
        file.update(|ctx| {
            setup_controller.setup(&config(true, false), ws.path(), sink.clone(), ctx)
        })
        .unwrap();
    }

    // A new wrapper instance with no access to the original config.
    let mut teardown_controller = LifecycleController::new(Box::new(mock.clone()));
    let outcome = file
        .update(|ctx| teardown_controller.teardown(ctx, sink.clone()))
        .unwrap();
    assert_eq!(outcome, TeardownOutcome::Destroyed);

    let calls = mock.calls();
    assert_eq!(
        calls,
        vec![
            ProvisionCall::Open {
                root: ws.path().to_path_buf()
            },
            bring_up_all(),
            ProvisionCall::Open {
                root: ws.path().to_path_buf()
            },
            destroy_all(),
        ]
    );
    assert!(file.load().unwrap().environment().is_none());
}

#[test]
fn failed_destroy_keeps_handle_for_a_later_attempt() {
    let ws = workspace_with_descriptor();
    let mock = MockProvisioner::new().failing_on("destroy");
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    controller
        .setup(&config(true, false), ws.path(), sink.clone(), &mut ctx)
        .unwrap();
    let err = controller.teardown(&mut ctx, sink.clone()).unwrap_err();
    assert!(matches!(err, CoreError::Provision(_)));
    assert_eq!(controller.state(), LifecycleState::Done);
    assert!(ctx.environment().is_some());
    assert!(sink.lines().last().unwrap().starts_with("error:"));
}

#[test]
fn handle_from_another_provisioner_is_refused() {
    let mock = MockProvisioner::new();
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();
    ctx.publish(EnvironmentHandle::new("vagrant", Path::new("/work")), true);

    let err = controller.teardown(&mut ctx, sink).unwrap_err();
    assert!(matches!(err, CoreError::ProvisionerMismatch { .. }));
    assert!(mock.calls().is_empty());
}

#[test]
fn downstream_steps_own_the_dirty_flag() {
    let ws = workspace_with_descriptor();
    let mock = MockProvisioner::new();
    let (mut controller, sink) = harness(&mock);
    let mut ctx = BuildContext::new();

    controller
        .setup(&config(false, false), ws.path(), sink.clone(), &mut ctx)
        .unwrap();
    assert!(!ctx.is_dirty());

    ctx.mark_dirty();
    controller.teardown(&mut ctx, sink).unwrap();
    assert!(ctx.is_dirty());
}
