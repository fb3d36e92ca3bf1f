//! Configuration: the rewrite exemption sets with their defaults, an
//! optional `imex.toml` / environment override layer, and the repository
//! layout (which files are parsed, which are written back).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::infra::io::normalize_path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Context lifecycle APIs exempt from rewriting.
    pub blacklist: Vec<String>,

    /// Types whose instances already hold the context in a `Ctx` member;
    /// their methods forward that member instead of gaining a parameter.
    pub classes_with_context: Vec<String>,

    /// Function templates the parser cannot mangle, addressed by
    /// qualified name and located with the bracket-aware scan.
    pub special_template_funcs: Vec<String>,

    /// Debug-log macro spellings; each expands to a call that needs the
    /// context.
    pub log_macros: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blacklist: vec![
                "CreateContext".to_string(),
                "DestroyContext".to_string(),
                "GetCurrentContext".to_string(),
                "SetCurrentContext".to_string(),
                "AddContextHook".to_string(),
                "RemoveContextHook".to_string(),
                "CallContextHooks".to_string(),
                "MemAlloc".to_string(),
                "MemFree".to_string(),
            ],
            classes_with_context: vec![
                "ImGuiWindow".to_string(),
                "ImGuiListClipper".to_string(),
            ],
            special_template_funcs: vec![
                "ImGui::ScaleRatioFromValueT".to_string(),
                "ImGui::ScaleValueFromRatioT".to_string(),
                "ImGui::DragBehaviorT".to_string(),
                "ImGui::SliderBehaviorT".to_string(),
                "ImGui::RoundScalarWithFormatT".to_string(),
                "ImGui::CheckboxFlagsT".to_string(),
            ],
            log_macros: vec![
                "IMGUI_DEBUG_LOG".to_string(),
                "IMGUI_DEBUG_LOG_ACTIVEID".to_string(),
                "IMGUI_DEBUG_LOG_FOCUS".to_string(),
                "IMGUI_DEBUG_LOG_POPUP".to_string(),
                "IMGUI_DEBUG_LOG_NAV".to_string(),
                "IMGUI_DEBUG_LOG_CLIPPER".to_string(),
                "IMGUI_DEBUG_LOG_IO".to_string(),
                "IMGUI_DEBUG_LOG_DOCKING".to_string(),
                "IMGUI_DEBUG_LOG_VIEWPORT".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.iter().any(|b| b == name)
    }

    pub fn is_special_template(&self, fq_name: &str) -> bool {
        self.special_template_funcs.iter().any(|t| t == fq_name)
    }
}

/// Load `imex.toml` (repository root first, then the working directory)
/// layered under `IMEX_*` environment variables; defaults fill whatever
/// is left unset.
pub fn load_config(root: &Path) -> Result<Config> {
    let mut builder = config::Config::builder();

    let candidates = [
        root.join("imex.toml"),
        PathBuf::from("imex.toml"),
        PathBuf::from(".imex.toml"),
    ];
    for path in &candidates {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.as_path()));
            break;
        }
    }

    builder = builder.add_source(config::Environment::with_prefix("IMEX").separator("__"));

    let cfg = builder.build().context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;
    Ok(parsed)
}

pub fn init(args: InitArgs, ctx: &AppContext) -> Result<()> {
    let config_path = args.path.join("imex.toml");

    if config_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

/// The fixed file set of a Dear ImGui checkout, as the tool sees it.
#[derive(Debug, Clone)]
pub struct RepoLayout {
    pub root: PathBuf,
    pub public_header: PathBuf,
    pub internal_header: PathBuf,
    pub main_unit: PathBuf,
    pub draw_unit: PathBuf,
    pub tables_unit: PathBuf,
    pub widgets_unit: PathBuf,
    pub demo_unit: PathBuf,
    pub textedit_header: PathBuf,
    /// Arbitrary source set override used by unit tests.
    extra_sources: Option<Vec<PathBuf>>,
}

impl RepoLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = normalize_path(&root.into());
        Self {
            public_header: root.join("imgui.h"),
            internal_header: root.join("imgui_internal.h"),
            main_unit: root.join("imgui.cpp"),
            draw_unit: root.join("imgui_draw.cpp"),
            tables_unit: root.join("imgui_tables.cpp"),
            widgets_unit: root.join("imgui_widgets.cpp"),
            demo_unit: root.join("imgui_demo.cpp"),
            textedit_header: root.join("imstb_textedit.h"),
            extra_sources: None,
            root,
        }
    }

    /// A layout whose source set is exactly `sources`, for tests that
    /// drive the passes over hand-built fixtures.
    #[doc(hidden)]
    pub fn for_tests(sources: &[PathBuf]) -> Self {
        let mut layout = Self::new(".");
        layout.extra_sources = Some(sources.to_vec());
        layout
    }

    /// Path of the synthetic translation unit handed to the parser.
    pub fn synthetic_unit(&self) -> PathBuf {
        self.root.join("tmp.cpp")
    }

    /// Path of the generated implicit-context definitions file.
    pub fn implicit_unit(&self) -> PathBuf {
        self.root.join("imgui_implicit.cpp")
    }

    /// Everything the ledger loads and the passes treat as in scope.
    pub fn source_set(&self) -> Vec<PathBuf> {
        if let Some(extra) = &self.extra_sources {
            return extra.clone();
        }
        vec![
            self.public_header.clone(),
            self.internal_header.clone(),
            self.main_unit.clone(),
            self.draw_unit.clone(),
            self.tables_unit.clone(),
            self.widgets_unit.clone(),
            self.demo_unit.clone(),
            self.textedit_header.clone(),
        ]
    }

    /// Files that get written back; the demo unit only on request.
    pub fn write_set(&self, include_demo: bool) -> Vec<PathBuf> {
        let mut set = self.source_set();
        if !include_demo {
            set.retain(|p| p != &self.demo_unit);
        }
        set
    }

    pub fn is_source(&self, path: &Path) -> bool {
        let normalized = normalize_path(path);
        self.source_set()
            .iter()
            .any(|p| normalize_path(p) == normalized)
    }

    /// Friendly up-front check that the checkout looks like Dear ImGui.
    pub fn ensure_inputs(&self) -> Result<()> {
        let missing: Vec<String> = self
            .source_set()
            .iter()
            .filter(|p| !p.exists())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "{} does not look like a Dear ImGui checkout; missing: {}",
                self.root.display(),
                missing.join(", ")
            );
        }
        Ok(())
    }
}
