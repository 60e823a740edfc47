use crate::context::BuildContextBridge;
use crate::lifecycle::{validate_transition, LifecycleState};
use crate::locator::EnvironmentLocator;
use crate::CoreError;
use bootbox_config::WrapperConfig;
use bootbox_provision::{
    DestroyOptions, EnvironmentHandle, LogSink, OutputAdapter, ProvisionError, Provisioner,
    ReloadOptions, Session, Target, Ui, UpOptions,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The environment is up and published into the build context.
    Active(EnvironmentHandle),
    /// Nothing was provisioned; the build should not run.
    NotExecuted { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// No environment was ever published.
    NothingToDo,
    /// Destroy policy was off; the environment keeps running.
    Retained,
    Destroyed,
}

/// Drives one build's environment from `setup` to `teardown`.
///
/// A controller serves exactly one build. Commands run one at a time, in
/// descriptor order, and are never retried.
pub struct LifecycleController {
    provisioner: Box<dyn Provisioner>,
    locator: EnvironmentLocator,
    state: LifecycleState,
    session: Option<Box<dyn Session>>,
}

impl LifecycleController {
    pub fn new(provisioner: Box<dyn Provisioner>) -> Self {
        let locator = EnvironmentLocator::new(provisioner.descriptor_file());
        Self {
            provisioner,
            locator,
            state: LifecycleState::Idle,
            session: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn provisioner_name(&self) -> &str {
        self.provisioner.name()
    }

    /// Rejected transitions are written to the build log before they are
    /// returned.
    fn check_transition(&self, to: LifecycleState, sink: &dyn LogSink) -> Result<(), CoreError> {
        validate_transition(self.state, to).inspect_err(|err| {
            sink.line(&format!("error: {err}"));
        })
    }

    fn transition(&mut self, to: LifecycleState, sink: &dyn LogSink) -> Result<(), CoreError> {
        self.check_transition(to, sink)?;
        debug!("lifecycle: {} -> {to}", self.state);
        self.state = to;
        Ok(())
    }

    /// Log the failure to the build log, then park the controller in
    /// `Aborted`.
    fn abort(&mut self, sink: &dyn LogSink, err: CoreError) -> CoreError {
        sink.line(&format!("error: {err}"));
        warn!("setup aborted: {err}");
        self.session = None;
        self.state = LifecycleState::Aborted;
        err
    }

    fn adapter(sink: &Arc<dyn LogSink>) -> Arc<dyn Ui> {
        Arc::new(OutputAdapter::new(Arc::clone(sink)))
    }

    /// Bring the environment up for a build.
    ///
    /// A missing descriptor yields `NotExecuted` without touching the
    /// provisioning tool. Any tool failure aborts setup and is returned.
    pub fn setup<C: BuildContextBridge + ?Sized>(
        &mut self,
        config: &WrapperConfig,
        workspace: &Path,
        sink: Arc<dyn LogSink>,
        context: &mut C,
    ) -> Result<SetupOutcome, CoreError> {
        self.check_transition(LifecycleState::Provisioning, sink.as_ref())?;

        let root = match self
            .locator
            .resolve(config.configured_descriptor(), workspace)
        {
            Ok(root) => root,
            Err(CoreError::MissingDescriptor {
                descriptor,
                searched,
            }) => {
                sink.line(&format!("There is no {descriptor} in your workspace!"));
                sink.line(&format!("We looked in: {}", searched.display()));
                self.transition(LifecycleState::Aborted, sink.as_ref())?;
                return Ok(SetupOutcome::NotExecuted {
                    reason: format!("no {descriptor} found in {}", searched.display()),
                });
            }
            Err(e) => return Err(self.abort(sink.as_ref(), e)),
        };

        let tool = self.provisioner.name().to_owned();
        if !self.provisioner.available() {
            let err = ProvisionError::Unavailable(tool).into();
            return Err(self.abort(sink.as_ref(), err));
        }
        let version = match self.provisioner.version() {
            Ok(v) => v,
            Err(e) => return Err(self.abort(sink.as_ref(), e.into())),
        };
        sink.line(&format!("Running {tool} with version: {version}"));

        let session = match self.provisioner.open(&root, Self::adapter(&sink)) {
            Ok(s) => s,
            Err(e) => return Err(self.abort(sink.as_ref(), e.into())),
        };
        self.transition(LifecycleState::Provisioning, sink.as_ref())?;
        sink.line(&format!(
            "{} loaded, bringing {tool} box up for the build",
            self.locator.descriptor_file()
        ));

        if let Err(e) = Self::bring_up(session.as_ref(), config, sink.as_ref()) {
            return Err(self.abort(sink.as_ref(), e));
        }

        let handle = EnvironmentHandle::new(tool.as_str(), root);
        context.publish(handle.clone(), config.destroy_on_teardown);
        self.session = Some(session);
        self.transition(LifecycleState::Active, sink.as_ref())?;

        sink.line(&format!("{tool} box is online, continuing with the build"));
        info!(
            "environment active in {} (destroy on teardown: {})",
            handle.root().display(),
            config.destroy_on_teardown
        );
        Ok(SetupOutcome::Active(handle))
    }

    fn bring_up(
        session: &dyn Session,
        config: &WrapperConfig,
        sink: &dyn LogSink,
    ) -> Result<(), CoreError> {
        if !config.reload_existing_machines {
            session.bring_up(
                &Target::All,
                UpOptions {
                    skip_provisioning: true,
                },
            )?;
            return Ok(());
        }

        for machine in session.list_machines()? {
            if !machine.created {
                sink.line(&format!("Creating '{}' VM ...", machine.name));
                session.bring_up(&Target::Machine(machine.name), UpOptions::default())?;
                continue;
            }
            sink.line(&format!("Reloading '{}' VM ...", machine.name));
            session.reload(
                &machine.name,
                ReloadOptions {
                    skip_provisioning: true,
                },
            )?;
        }
        Ok(())
    }

    /// Tear the environment down after a build.
    ///
    /// With no published environment this is a no-op in any state. Otherwise
    /// the destroy policy is read from `context`, never from config. A failed
    /// destroy leaves the handle in the context and is returned for the host
    /// to report alongside the build result.
    pub fn teardown<C: BuildContextBridge + ?Sized>(
        &mut self,
        context: &mut C,
        sink: Arc<dyn LogSink>,
    ) -> Result<TeardownOutcome, CoreError> {
        let Some(handle) = context.environment().cloned() else {
            debug!("no environment published; nothing to tear down");
            return Ok(TeardownOutcome::NothingToDo);
        };
        self.transition(LifecycleState::TearingDown, sink.as_ref())?;

        if handle.provisioner() != self.provisioner.name() {
            let err = CoreError::ProvisionerMismatch {
                recorded: handle.provisioner().to_owned(),
                current: self.provisioner.name().to_owned(),
            };
            sink.line(&format!("error: {err}"));
            self.finish();
            return Err(err);
        }

        if !context.destroy_policy() {
            debug!(
                "destroy policy off; leaving environment in {} running",
                handle.root().display()
            );
            context.clear_environment();
            self.finish();
            return Ok(TeardownOutcome::Retained);
        }

        sink.line(&format!(
            "Build finished, destroying the {} box",
            handle.provisioner()
        ));
        let result = self.destroy(&handle, &sink);
        self.finish();
        match result {
            Ok(()) => {
                context.clear_environment();
                info!("environment in {} destroyed", handle.root().display());
                Ok(TeardownOutcome::Destroyed)
            }
            Err(e) => {
                sink.line(&format!("error: {e}"));
                warn!("teardown failed: {e}");
                Err(e)
            }
        }
    }

    fn destroy(
        &mut self,
        handle: &EnvironmentHandle,
        sink: &Arc<dyn LogSink>,
    ) -> Result<(), CoreError> {
        let session = match self.session.take() {
            Some(s) => s,
            None => {
                debug!("reopening session in {}", handle.root().display());
                self.provisioner.open(handle.root(), Self::adapter(sink))?
            }
        };
        session.destroy(&Target::All, DestroyOptions { force: true })?;
        Ok(())
    }

    fn finish(&mut self) {
        self.session = None;
        self.state = LifecycleState::Done;
    }
}
