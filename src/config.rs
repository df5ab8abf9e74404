use crate::error::PanelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the one-line file that points at the generator installation.
pub const PATH_FILE_NAME: &str = "stylegan_path.txt";

/// Minimum frame count used when a smoothing or random mode is requested with too few frames.
pub const MIN_SEQUENCE_COUNT: u32 = 10;

const FFHQ_MODEL: &str = "StyleGAN_karras2019stylegan-ffhq-1024x1024.ct4";
const CELEBAHQ_MODEL: &str = "StyleGAN_karras2019stylegan-celebahq-1024x1024.ct4";
const ANIME1_MODEL: &str = "StyleGAN_2019-03-08-stylegan-animefaces-network-02051-021980.ct4";
const ANIME2_MODEL: &str = "StyleGAN_2019-02-26-stylegan-faces-network-02048-016041.ct4";
const PORTRAITS_MODEL: &str = "StyleGAN_2019-04-30-stylegan-danbooru2018-portraits-02095-066083.ct4";

// Scanned top to bottom, the last matching label wins. "FFHQ Faces" appears
// twice. The legacy Windows panel mapped the second row to the celebahq weights,
// so picking "FFHQ Faces" there actually ran celebahq. Both rows point at FFHQ here.
const MODEL_TABLE: &[(&str, &str)] = &[
    ("FFHQ Faces", FFHQ_MODEL),
    ("CelebA HQ Faces", CELEBAHQ_MODEL),
    ("FFHQ Faces", FFHQ_MODEL),
    ("Anime Faces1", ANIME1_MODEL),
    ("Anime Faces2", ANIME2_MODEL),
    ("Anime Portraits", PORTRAITS_MODEL),
];

/// Resolve a model label to its weights file. Unknown labels fall back to FFHQ.
pub fn model_filename_for_label(label: &str) -> &'static str {
    MODEL_TABLE
        .iter()
        .filter(|(candidate, _)| *candidate == label)
        .last()
        .map(|(_, file)| *file)
        .unwrap_or(FFHQ_MODEL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelId {
    #[default]
    Ffhq,
    CelebaHq,
    Anime1,
    Anime2,
    AnimePortraits,
}

impl ModelId {
    pub const ALL: [ModelId; 5] = [
        ModelId::Ffhq,
        ModelId::CelebaHq,
        ModelId::Anime1,
        ModelId::Anime2,
        ModelId::AnimePortraits,
    ];

    /// Label shown in the model picker.
    pub fn label(self) -> &'static str {
        match self {
            ModelId::Ffhq => "FFHQ Faces",
            ModelId::CelebaHq => "CelebA HQ Faces",
            ModelId::Anime1 => "Anime Faces1",
            ModelId::Anime2 => "Anime Faces2",
            ModelId::AnimePortraits => "Anime Portraits",
        }
    }

    pub fn filename(self) -> &'static str {
        model_filename_for_label(self.label())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ffhq" | "ffhq faces" => Ok(ModelId::Ffhq),
            "celebahq" | "celeba-hq" | "celeba hq faces" => Ok(ModelId::CelebaHq),
            "anime1" | "anime faces1" => Ok(ModelId::Anime1),
            "anime2" | "anime faces2" => Ok(ModelId::Anime2),
            "anime-portraits" | "portraits" | "anime portraits" => Ok(ModelId::AnimePortraits),
            other => Err(format!("Unknown model: {}", other)),
        }
    }
}

/// The three mutually exclusive generation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunFlag {
    RandomSeed,
    SmoothZ,
    SmoothPsi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub seed_start: i64,
    pub seed_end: i64,
    pub count: u32,
    pub start_index: u32,
    pub random_seed: bool,
    pub smooth_z: bool,
    pub smooth_psi: bool,
    pub model: ModelId,
    /// Overrides the model directory derived from the generator install.
    pub model_base_path: Option<PathBuf>,
    pub psi: Option<f32>,
    pub layers: Option<u32>,
    pub sequential_seeds: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed_start: 5,
            seed_end: 841,
            count: 1,
            start_index: 0,
            random_seed: false,
            smooth_z: false,
            smooth_psi: false,
            model: ModelId::default(),
            model_base_path: None,
            psi: None,
            layers: None,
            sequential_seeds: false,
        }
    }
}

impl RunConfig {
    pub fn any_flag(&self) -> bool {
        self.random_seed || self.smooth_z || self.smooth_psi
    }

    pub fn flag(&self, flag: RunFlag) -> bool {
        match flag {
            RunFlag::RandomSeed => self.random_seed,
            RunFlag::SmoothZ => self.smooth_z,
            RunFlag::SmoothPsi => self.smooth_psi,
        }
    }

    /// Toggle a mode flag. Turning one on turns the other two off.
    pub fn set_flag(&mut self, flag: RunFlag, on: bool) {
        if on {
            self.random_seed = false;
            self.smooth_z = false;
            self.smooth_psi = false;
        }
        match flag {
            RunFlag::RandomSeed => self.random_seed = on,
            RunFlag::SmoothZ => self.smooth_z = on,
            RunFlag::SmoothPsi => self.smooth_psi = on,
        }
    }
}

/// Which form inputs are editable for a given configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEnablement {
    pub seed: bool,
    pub seed2: bool,
    pub random_seed: bool,
    pub smooth_z: bool,
    pub smooth_psi: bool,
    /// Seek slider, progress bar and animation export.
    pub sequence_controls: bool,
}

impl InputEnablement {
    pub fn for_config(config: &RunConfig) -> Self {
        let others_off = |flag: RunFlag| {
            [RunFlag::RandomSeed, RunFlag::SmoothZ, RunFlag::SmoothPsi]
                .into_iter()
                .filter(|other| *other != flag)
                .all(|other| !config.flag(other))
        };

        Self {
            seed: !config.random_seed,
            seed2: config.smooth_z && !config.random_seed,
            random_seed: others_off(RunFlag::RandomSeed),
            smooth_z: others_off(RunFlag::SmoothZ),
            smooth_psi: others_off(RunFlag::SmoothPsi),
            sequence_controls: config.count > 1,
        }
    }
}

/// Locations derived from the generator installation directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratorPaths {
    pub install_dir: PathBuf,
    pub executable_stem: String,
}

impl GeneratorPaths {
    pub fn new(install_dir: impl Into<PathBuf>, executable_stem: impl Into<String>) -> Self {
        Self {
            install_dir: install_dir.into(),
            executable_stem: executable_stem.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.install_dir.as_os_str().is_empty()
    }

    pub fn executable(&self) -> PathBuf {
        self.install_dir.join(format!(
            "{}{}",
            self.executable_stem,
            std::env::consts::EXE_SUFFIX
        ))
    }

    /// The generator writes its frames into the parent of its install directory.
    pub fn working_dir(&self) -> PathBuf {
        parent_or_self(&self.install_dir)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.working_dir().join("model")
    }
}

fn parent_or_self(dir: &Path) -> PathBuf {
    match dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => dir.join(".."),
    }
}

/// Read the generator installation path from the first line of `path`.
pub fn load_generator_path(path: &Path) -> Result<PathBuf, PanelError> {
    let contents = fs::read_to_string(path).map_err(|e| PanelError::ConfigLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let line = contents
        .lines()
        .next()
        .map(|line| line.trim_end_matches(['\r', '\n']))
        .unwrap_or("");
    log::info!("Generator installation path: {:?}", line);
    Ok(PathBuf::from(line))
}

/// Default location of the path file: next to the running executable.
pub fn default_path_file() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_default()
        .join(PATH_FILE_NAME)
}
