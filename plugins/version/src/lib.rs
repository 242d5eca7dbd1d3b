//! Version plugin.
//!
//! Resolves the next version with [`VersionResolver`]. In interactive runs
//! where nothing was requested, the operator picks a release type or types
//! a version.

use async_trait::async_trait;
use semver::Version;
use shipwright_config::VersionConfig;
use shipwright_core::{Resolution, VersionResolver};
use shipwright_plugin::{
    Choice, Increment, Phase, Plugin, PluginContext, PluginError, PluginFactory, PluginResult,
    PluginSetup, Question, ReleaseType, Services, VersionRequest,
};
use tracing::{debug, warn};

const OTHER: &str = "other";

/// Built-in plugin owning the `version` namespace.
pub struct VersionPlugin {
    context: PluginContext,
    services: Services,
    options: VersionConfig,
    resolver: VersionResolver,
}

impl VersionPlugin {
    /// Creates the plugin.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn new(setup: PluginSetup) -> PluginResult<Self> {
        let context = setup.context();
        let options = context
            .options_as()
            .map_err(|e| PluginError::Config(format!("version: {e}")))?;
        Ok(Self {
            context,
            services: setup.services,
            options,
            resolver: VersionResolver::new(),
        })
    }

    fn accept(&self, resolution: Resolution) -> Version {
        for warning in resolution.warnings {
            warn!("{warning}");
            self.context.push_warning(warning);
        }
        resolution.version
    }

    /// Release types offered to the operator, most likely first.
    fn release_types(&self, request: &VersionRequest) -> Vec<ReleaseType> {
        let mut types = Vec::new();
        if !request.latest_version.pre.is_empty() {
            types.push(ReleaseType::PreRelease);
        }
        if request.is_pre_release {
            types.extend([
                ReleaseType::PrePatch,
                ReleaseType::PreMinor,
                ReleaseType::PreMajor,
            ]);
        } else {
            types.extend([ReleaseType::Patch, ReleaseType::Minor, ReleaseType::Major]);
            if self.options.prompt_pre_release {
                types.extend([
                    ReleaseType::PrePatch,
                    ReleaseType::PreMinor,
                    ReleaseType::PreMajor,
                ]);
            }
        }
        types
    }

    fn bump(&self, request: &VersionRequest, release_type: ReleaseType) -> Version {
        self.resolver.increment(
            &request.latest_version,
            release_type,
            request.pre_release_id.as_deref(),
            request.pre_release_base.as_deref(),
        )
    }

    async fn ask(&self, question: Question) -> PluginResult<String> {
        let name = question.name.clone();
        let answer = self.services.prompt.ask(&question).await?;
        answer
            .get(&name)
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| PluginError::Prompt(format!("no answer for `{name}`")))
    }
}

#[async_trait]
impl Plugin for VersionPlugin {
    fn context(&self) -> &PluginContext {
        &self.context
    }

    fn handles(&self, phase: Phase) -> bool {
        matches!(phase, Phase::ResolveIncrement | Phase::ResolveVersion)
    }

    async fn get_increment(&mut self, request: &VersionRequest) -> PluginResult<Option<Increment>> {
        Ok(request.increment.clone())
    }

    async fn get_incremented_version_ci(
        &mut self,
        request: &VersionRequest,
    ) -> PluginResult<Option<Version>> {
        Ok(self.resolver.resolve(request).map(|r| self.accept(r)))
    }

    async fn get_incremented_version(
        &mut self,
        request: &VersionRequest,
    ) -> PluginResult<Option<Version>> {
        if self.services.ci {
            return Ok(None);
        }

        let mut choices: Vec<Choice> = self
            .release_types(request)
            .into_iter()
            .map(|t| Choice::new(format!("{t} ({})", Self::bump(self, request, t)), t.as_str()))
            .collect();
        choices.push(Choice::new("Other, please specify...", OTHER));

        let message = format!(
            "Select increment (next version) from {}:",
            request.latest_version
        );
        let answer = self
            .ask(Question::list("increment", message, choices))
            .await?;
        debug!(%answer, "increment selected");

        if answer != OTHER {
            let release_type: ReleaseType = answer
                .parse()
                .map_err(|_| PluginError::Prompt(format!("unknown increment `{answer}`")))?;
            return Ok(Some(Self::bump(self, request, release_type)));
        }

        let input = self
            .ask(Question::input("version", "Please enter a valid version:"))
            .await?;
        let explicit = VersionRequest {
            increment: Some(Increment::Explicit(input.clone())),
            ..request.clone()
        };
        self.resolver
            .resolve(&explicit)
            .map(|r| Some(self.accept(r)))
            .ok_or_else(|| {
                PluginError::Prompt(format!(
                    "`{input}` is not a version greater than {}",
                    request.latest_version
                ))
            })
    }
}

/// Factory for [`VersionPlugin`]. Always enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionPluginFactory;

impl PluginFactory for VersionPluginFactory {
    fn create(&self, setup: PluginSetup) -> PluginResult<Box<dyn Plugin>> {
        Ok(Box::new(VersionPlugin::new(setup)?))
    }
}
