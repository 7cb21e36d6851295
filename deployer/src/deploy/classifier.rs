//! Framework classification
//!
//! A rule engine over `package.json` / `index.html` content, plus an optional
//! advisory oracle for trees the rules cannot read.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::deploy::locator::ProjectLayout;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::jobs::store::JobWriter;

/// Known front-end project kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameworkIdentity {
    #[serde(rename = "nextjs")]
    NextJs,
    Remix,
    #[serde(rename = "sveltekit")]
    SvelteKit,
    #[serde(rename = "nuxtjs")]
    NuxtJs,
    Astro,
    ViteReact,
    Cra,
    GenericReact,
    CustomBuild,
    React,
    Static,
}

impl FrameworkIdentity {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameworkIdentity::NextJs => "nextjs",
            FrameworkIdentity::Remix => "remix",
            FrameworkIdentity::SvelteKit => "sveltekit",
            FrameworkIdentity::NuxtJs => "nuxtjs",
            FrameworkIdentity::Astro => "astro",
            FrameworkIdentity::ViteReact => "vite-react",
            FrameworkIdentity::Cra => "cra",
            FrameworkIdentity::GenericReact => "generic-react",
            FrameworkIdentity::CustomBuild => "custom-build",
            FrameworkIdentity::React => "react",
            FrameworkIdentity::Static => "static",
        }
    }

    /// Server-rendering frameworks whose static export may need extra subpath config
    pub fn is_ssr(&self) -> bool {
        matches!(
            self,
            FrameworkIdentity::NextJs
                | FrameworkIdentity::Remix
                | FrameworkIdentity::SvelteKit
                | FrameworkIdentity::NuxtJs
                | FrameworkIdentity::Astro
        )
    }

    /// The framework's own build CLI
    fn cli_command(&self) -> Option<&'static str> {
        match self {
            FrameworkIdentity::NextJs => Some("npx next build"),
            FrameworkIdentity::Remix => Some("npx remix build"),
            FrameworkIdentity::SvelteKit
            | FrameworkIdentity::ViteReact
            | FrameworkIdentity::GenericReact => Some("npx vite build"),
            FrameworkIdentity::NuxtJs => Some("npx nuxi generate"),
            FrameworkIdentity::Astro => Some("npx astro build"),
            FrameworkIdentity::Cra => Some("npx react-scripts build"),
            FrameworkIdentity::CustomBuild => Some("npm run build"),
            FrameworkIdentity::React | FrameworkIdentity::Static => None,
        }
    }

    /// Where the framework writes its output by default
    fn default_output(&self) -> Option<&'static str> {
        match self {
            FrameworkIdentity::NextJs => Some(".next"),
            FrameworkIdentity::Remix => Some("public/build"),
            FrameworkIdentity::SvelteKit => Some(".svelte-kit/output/client"),
            FrameworkIdentity::NuxtJs => Some(".output/public"),
            FrameworkIdentity::Cra => Some("build"),
            FrameworkIdentity::Astro
            | FrameworkIdentity::ViteReact
            | FrameworkIdentity::GenericReact
            | FrameworkIdentity::CustomBuild => Some("dist"),
            FrameworkIdentity::React | FrameworkIdentity::Static => None,
        }
    }
}

impl fmt::Display for FrameworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameworkIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nextjs" | "next" => Ok(FrameworkIdentity::NextJs),
            "remix" => Ok(FrameworkIdentity::Remix),
            "sveltekit" => Ok(FrameworkIdentity::SvelteKit),
            "nuxtjs" | "nuxt" => Ok(FrameworkIdentity::NuxtJs),
            "astro" => Ok(FrameworkIdentity::Astro),
            "vite-react" => Ok(FrameworkIdentity::ViteReact),
            "cra" => Ok(FrameworkIdentity::Cra),
            "generic-react" => Ok(FrameworkIdentity::GenericReact),
            "custom-build" => Ok(FrameworkIdentity::CustomBuild),
            "react" => Ok(FrameworkIdentity::React),
            "static" => Ok(FrameworkIdentity::Static),
            other => Err(format!("Unknown framework: {}", other)),
        }
    }
}

/// Which file the classification was based on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzedFile {
    Manifest,
    EntryDocument,
}

/// Classification result
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFramework {
    pub identity: FrameworkIdentity,
    pub build_command: Option<String>,
    pub output_directory: Option<String>,
    pub reasoning: Option<String>,
    pub confidence: f32,
}

impl DetectedFramework {
    /// Defaults for `identity`; `npm run build` replaces the CLI when a build script exists
    pub fn for_identity(identity: FrameworkIdentity, has_build_script: bool, confidence: f32) -> Self {
        let build_command = match identity.cli_command() {
            Some(_) if has_build_script => Some("npm run build".to_string()),
            Some(cli) => Some(cli.to_string()),
            None => None,
        };

        Self {
            identity,
            build_command,
            output_directory: identity.default_output().map(str::to_string),
            reasoning: None,
            confidence,
        }
    }

    pub fn static_site(reasoning: impl Into<String>) -> Self {
        Self::for_identity(FrameworkIdentity::Static, false, 1.0).with_reasoning(reasoning)
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn needs_build(&self) -> bool {
        self.build_command.is_some()
    }
}

/// Classify manifest or entry-document content. Never fails: unreadable input is `static`.
pub fn classify(content: &str, analyzed: AnalyzedFile) -> DetectedFramework {
    match analyzed {
        AnalyzedFile::Manifest => match parse_manifest(content) {
            Ok(manifest) => classify_manifest(&manifest),
            Err(e) => DetectedFramework::static_site(format!("package.json could not be parsed: {}", e)),
        },
        AnalyzedFile::EntryDocument => classify_entry_document(content),
    }
}

/// Parse a manifest, requiring a JSON object at the top level
pub fn parse_manifest(content: &str) -> Result<Value, DeployError> {
    let value: Value = serde_json::from_str(content)?;
    if !value.is_object() {
        return Err(DeployError::InvalidInput(
            "package.json is not a JSON object".to_string(),
        ));
    }
    Ok(value)
}

fn dependency_names(manifest: &Value) -> BTreeSet<String> {
    ["dependencies", "devDependencies"]
        .iter()
        .filter_map(|section| manifest.get(section).and_then(Value::as_object))
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}

fn has_build_script(manifest: &Value) -> bool {
    manifest
        .get("scripts")
        .and_then(|s| s.get("build"))
        .and_then(Value::as_str)
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false)
}

/// Apply the ordered manifest rules; first match wins
pub fn classify_manifest(manifest: &Value) -> DetectedFramework {
    let deps = dependency_names(manifest);
    let has = |name: &str| deps.contains(name);
    let build_script = has_build_script(manifest);

    let rule = if has("next") {
        Some((FrameworkIdentity::NextJs, "depends on next"))
    } else if has("@remix-run/dev") || has("remix") {
        Some((FrameworkIdentity::Remix, "depends on remix"))
    } else if has("@sveltejs/kit") {
        Some((FrameworkIdentity::SvelteKit, "depends on @sveltejs/kit"))
    } else if has("nuxt") {
        Some((FrameworkIdentity::NuxtJs, "depends on nuxt"))
    } else if has("astro") {
        Some((FrameworkIdentity::Astro, "depends on astro"))
    } else if has("vite") && (has("@vitejs/plugin-react") || has("@vitejs/plugin-react-swc")) {
        Some((FrameworkIdentity::ViteReact, "depends on vite with the react plugin"))
    } else if has("react-scripts") {
        Some((FrameworkIdentity::Cra, "depends on react-scripts"))
    } else if has("react") && has("react-dom") {
        Some((FrameworkIdentity::GenericReact, "depends on react and react-dom"))
    } else {
        None
    };

    match rule {
        Some((identity, reason)) => {
            DetectedFramework::for_identity(identity, build_script, 1.0).with_reasoning(reason)
        }
        None if build_script => {
            DetectedFramework::for_identity(FrameworkIdentity::CustomBuild, true, 0.6)
                .with_reasoning("declares a build script")
        }
        None => DetectedFramework::static_site("no known framework dependency or build script"),
    }
}

/// `react` when the page loads React and ReactDOM from a CDN and has a mount element
pub fn classify_entry_document(content: &str) -> DetectedFramework {
    let lower = content.to_lowercase();
    let sources = script_sources(&lower);
    let from_cdn = |src: &&String| {
        src.starts_with("https://") || src.starts_with("http://") || src.starts_with("//")
    };

    let has_dom = sources.iter().filter(from_cdn).any(|s| s.contains("react-dom"));
    let has_library = sources
        .iter()
        .filter(from_cdn)
        .any(|s| s.replace("react-dom", "").contains("react"));
    let has_mount = ["id=\"root\"", "id='root'", "id=\"app\"", "id='app'"]
        .iter()
        .any(|m| lower.contains(m));

    if has_dom && has_library && has_mount {
        DetectedFramework::for_identity(FrameworkIdentity::React, false, 0.4)
            .with_reasoning("index.html loads react and react-dom from a CDN")
    } else {
        DetectedFramework::static_site("plain index.html")
    }
}

/// `src` attributes of every `<script>` tag
fn script_sources(html: &str) -> Vec<String> {
    let mut sources = Vec::new();
    let mut rest = html;

    while let Some(start) = rest.find("<script") {
        let tag = &rest[start..];
        let end = tag.find('>').unwrap_or(tag.len());
        let attributes = &tag[..end];

        if let Some(pos) = attributes.find("src=") {
            let value = attributes[pos + 4..].trim_start();
            let src = match value.chars().next() {
                Some(quote @ ('"' | '\'')) => value[1..].split(quote).next().unwrap_or(""),
                _ => value.split(|c: char| c.is_whitespace()).next().unwrap_or(""),
            };
            sources.push(src.trim().to_string());
        }

        rest = &tag[end..];
    }

    sources
}

/// What the oracle gets to see
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleRequest {
    /// Top-level entries of the project root
    pub files: Vec<String>,

    /// Raw manifest text when one exists but failed to parse
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
}

/// The oracle's answer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleSuggestion {
    pub framework: String,
    pub confidence: f32,

    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Advisory classifier consulted when the rules have nothing to read
#[async_trait]
pub trait FrameworkOracle: Send + Sync {
    async fn suggest(&self, request: &OracleRequest) -> Result<OracleSuggestion, DeployError>;
}

/// Classifies a located project, consulting the oracle when configured
#[derive(Clone)]
pub struct Classifier {
    oracle: Option<Arc<dyn FrameworkOracle>>,
    min_confidence: f32,
}

impl Classifier {
    pub fn new(oracle: Option<Arc<dyn FrameworkOracle>>, min_confidence: f32) -> Self {
        Self {
            oracle,
            min_confidence,
        }
    }

    /// Rules only
    pub fn rules_only() -> Self {
        Self::new(None, 1.0)
    }

    pub async fn detect(
        &self,
        layout: &ProjectLayout,
        job: &JobWriter,
    ) -> Result<DetectedFramework, DeployError> {
        if let Some(path) = layout.manifest_path() {
            let content = File::new(&path).read_string().await?;
            return match parse_manifest(&content) {
                Ok(manifest) => Ok(classify_manifest(&manifest)),
                Err(e) => {
                    warn!("Unreadable package.json at {}: {}", path.display(), e);
                    job.log(format!("package.json could not be parsed: {}", e)).await;
                    let fallback = DetectedFramework::static_site(format!("package.json could not be parsed: {}", e));
                    Ok(self.consult(layout, Some(content), fallback, job).await)
                }
            };
        }

        if let Some(path) = layout.entry_document_path() {
            let content = File::new(&path).read_string().await?;
            return Ok(classify_entry_document(&content));
        }

        let fallback = DetectedFramework::static_site("no package.json or index.html found");
        Ok(self.consult(layout, None, fallback, job).await)
    }

    /// Ask the oracle; any failure or weak answer keeps `fallback`
    async fn consult(
        &self,
        layout: &ProjectLayout,
        manifest: Option<String>,
        fallback: DetectedFramework,
        job: &JobWriter,
    ) -> DetectedFramework {
        let Some(oracle) = &self.oracle else {
            return fallback;
        };

        let files = Dir::new(&layout.root_path).entry_names().await.unwrap_or_default();
        let request = OracleRequest { files, manifest };

        let suggestion = match oracle.suggest(&request).await {
            Ok(suggestion) => suggestion,
            Err(e) => {
                warn!("Framework oracle unavailable: {}", e);
                job.log("Framework advisor unavailable, using rule-based detection").await;
                return fallback;
            }
        };

        let identity = match suggestion.framework.parse::<FrameworkIdentity>() {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Ignoring oracle answer: {}", e);
                return fallback;
            }
        };

        if !(suggestion.confidence >= self.min_confidence && suggestion.confidence <= 1.0) {
            info!(
                framework = %identity,
                confidence = suggestion.confidence,
                "Ignoring low-confidence oracle answer"
            );
            return fallback;
        }

        job.log(format!(
            "Framework advisor suggested {} (confidence {:.2})",
            identity, suggestion.confidence
        ))
        .await;

        let mut detected = DetectedFramework::for_identity(identity, false, suggestion.confidence);
        detected.reasoning = suggestion.reasoning.or(Some("framework advisor".to_string()));
        detected
    }
}
