use directories::ProjectDirs;
use doc_model::Settings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: u32 = 1;
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported image {path}: {reason}")]
    UnsupportedImage { path: PathBuf, reason: String },
    #[error("{0} is not inside the asset folder")]
    OutsideAssetDir(PathBuf),
}

/// Which asset folder an image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Stamp,
    Signature,
}

impl AssetKind {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Stamp => "stamps",
            Self::Signature => "signatures",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    config_root: PathBuf,
    data_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: Settings,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PdfEditor", "PdfEditor")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self {
            config_root: dirs.config_dir().to_path_buf(),
            data_root: dirs.data_local_dir().to_path_buf(),
        })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self { config_root: root.clone(), data_root: root }
    }

    pub fn root(&self) -> &Path {
        &self.config_root
    }

    /// Loads settings, falling back to defaults when no file exists yet.
    /// Recent entries whose files have disappeared are dropped.
    pub fn load_settings(&self) -> Result<Settings, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            return Ok(Settings::default());
        }

        let bytes = fs::read(&path)?;
        let envelope: SettingsEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != SETTINGS_SCHEMA_VERSION {
            tracing::warn!(version = envelope.version, "settings written by a different schema version");
        }

        let mut settings = envelope.settings.normalized();
        settings.retain_existing_recent(|path| path.is_file());
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        fs::create_dir_all(&self.config_root)?;

        let envelope =
            SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings: settings.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        atomic_write(&self.settings_path(), &bytes)?;
        tracing::debug!(path = %self.settings_path().display(), "settings saved");
        Ok(())
    }

    pub fn asset_dir(&self, kind: AssetKind) -> PathBuf {
        self.data_root.join(kind.dir_name())
    }

    /// Image files in the asset folder, sorted by file name.
    pub fn list_assets(&self, kind: AssetKind) -> Result<Vec<PathBuf>, StorageError> {
        let dir = self.asset_dir(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut assets = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                assets.push(path);
            }
        }
        assets.sort();
        Ok(assets)
    }

    /// Copies an image into the asset folder after checking that it decodes.
    pub fn import_asset(&self, kind: AssetKind, source: &Path) -> Result<PathBuf, StorageError> {
        image::image_dimensions(source).map_err(|err| StorageError::UnsupportedImage {
            path: source.to_path_buf(),
            reason: err.to_string(),
        })?;

        let dir = self.asset_dir(kind);
        fs::create_dir_all(&dir)?;

        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "asset.png".to_owned());
        let target = unique_path(&dir, &file_name);
        fs::copy(source, &target)?;

        tracing::info!(target = %target.display(), "imported asset");
        Ok(target)
    }

    /// Saves a drawn signature as PNG in the signature folder.
    pub fn save_drawn_signature(
        &self,
        image: &image::RgbaImage,
        name: &str,
    ) -> Result<PathBuf, StorageError> {
        let dir = self.asset_dir(AssetKind::Signature);
        fs::create_dir_all(&dir)?;

        let stem: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let stem = if stem.is_empty() { "signature".to_owned() } else { stem };
        let target = unique_path(&dir, &format!("{stem}.png"));

        image.save(&target).map_err(|err| match err {
            image::ImageError::IoError(io) => StorageError::Io(io),
            other => StorageError::UnsupportedImage {
                path: target.clone(),
                reason: other.to_string(),
            },
        })?;

        Ok(target)
    }

    pub fn delete_asset(&self, kind: AssetKind, path: &Path) -> Result<(), StorageError> {
        let dir = self.asset_dir(kind);
        if path.parent() != Some(dir.as_path()) {
            return Err(StorageError::OutsideAssetDir(path.to_path_buf()));
        }

        fs::remove_file(path)?;
        Ok(())
    }

    fn settings_path(&self) -> PathBuf {
        self.config_root.join("settings.json")
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(file_name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("asset");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("png");

    (1..)
        .map(|n| dir.join(format!("{stem}-{n}.{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(candidate)
}

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::ThemeMode;

    fn write_png(path: &Path) {
        let image = image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        image.save(path).expect("png should be written");
    }

    #[test]
    fn settings_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let recent = temp.path().join("doc.pdf");
        fs::write(&recent, b"%PDF").expect("recent file should be written");

        let mut settings = Settings {
            theme: ThemeMode::Dark,
            author_name: "Reviewer".to_owned(),
            ..Settings::default()
        };
        settings.add_recent(&recent);

        store.save_settings(&settings).expect("save should succeed");
        let loaded = store.load_settings().expect("load should succeed");

        assert_eq!(loaded, settings);
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_settings().expect("load should succeed");
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn load_drops_recent_files_that_no_longer_exist() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let mut settings = Settings::default();
        settings.add_recent(temp.path().join("missing.pdf"));
        store.save_settings(&settings).expect("save should succeed");

        let loaded = store.load_settings().expect("load should succeed");
        assert!(loaded.recent_files.is_empty());
        assert_eq!(loaded.last_file, None);
    }

    #[test]
    fn corrupt_settings_are_reported() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        fs::write(temp.path().join("settings.json"), b"{ not json").expect("write should succeed");

        let err = store.load_settings().expect_err("corrupt settings should fail");
        assert!(matches!(err, StorageError::Serde(_)));
    }

    #[test]
    fn save_leaves_no_temporary_file_behind() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        store.save_settings(&Settings::default()).expect("save should succeed");

        assert!(temp.path().join("settings.json").exists());
        assert!(!temp.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn default_settings_file_contract() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        store.save_settings(&Settings::default()).expect("save should succeed");

        let json = fs::read_to_string(temp.path().join("settings.json"))
            .expect("settings should be readable");

        insta::assert_snapshot!("default_settings_file", json);
    }

    #[test]
    fn import_list_and_delete_assets() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path().join("store"));

        let source = temp.path().join("mark.png");
        write_png(&source);

        let first = store.import_asset(AssetKind::Stamp, &source).expect("import should work");
        let second = store.import_asset(AssetKind::Stamp, &source).expect("import should work");
        assert_ne!(first, second, "second import should not overwrite the first");

        let assets = store.list_assets(AssetKind::Stamp).expect("list should work");
        assert_eq!(assets.len(), 2);
        assert!(store.list_assets(AssetKind::Signature).expect("list should work").is_empty());

        store.delete_asset(AssetKind::Stamp, &first).expect("delete should work");
        assert_eq!(store.list_assets(AssetKind::Stamp).expect("list should work"), vec![second]);
    }

    #[test]
    fn import_rejects_non_images() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let source = temp.path().join("notes.png");
        fs::write(&source, b"plain text, not pixels").expect("write should succeed");

        let err = store.import_asset(AssetKind::Signature, &source).expect_err("should fail");
        assert!(matches!(err, StorageError::UnsupportedImage { .. }));
        assert!(store.list_assets(AssetKind::Signature).expect("list should work").is_empty());
    }

    #[test]
    fn delete_outside_asset_dir_is_refused() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        let outside = temp.path().join("elsewhere.png");
        write_png(&outside);

        let err = store.delete_asset(AssetKind::Stamp, &outside).expect_err("should refuse");
        assert!(matches!(err, StorageError::OutsideAssetDir(_)));
        assert!(outside.exists());
    }

    #[test]
    fn drawn_signature_is_saved_as_png() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        let image = image::RgbaImage::from_pixel(8, 3, image::Rgba([0, 0, 0, 255]));

        let path = store.save_drawn_signature(&image, "my signature").expect("save should work");

        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("my_signature.png"));
        assert_eq!(image::image_dimensions(&path).expect("png should decode"), (8, 3));
    }
}
