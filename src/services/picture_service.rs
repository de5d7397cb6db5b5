//! Profile pictures on disk: resolution with role defaults, thumbnailed
//! uploads, and the listing used by the admin file browser.

use crate::models::{Profile, Role};
use image::ImageFormat;
use rand::Rng;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const PICTURES_URL_PREFIX: &str = "/static/profile_pics";
pub const DEFAULT_STUDENT_PICTURE: &str = "student.png";
pub const DEFAULT_TUTOR_PICTURE: &str = "tutor.png";
pub const THUMBNAIL_SIZE: u32 = 125;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

#[derive(Debug, thiserror::Error)]
pub enum PictureError {
    #[error("Only jpg, jpeg, png and gif pictures are accepted")]
    UnsupportedType,
    #[error("Invalid file name")]
    InvalidName,
    #[error("A file with this name already exists")]
    AlreadyExists,
    #[error("Default pictures cannot be removed")]
    Protected,
    #[error("Could not read image: {0}")]
    Decode(String),
    #[error("Could not write image: {0}")]
    Encode(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureFile {
    pub name: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct PictureStore {
    dir: PathBuf,
}

impl PictureStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}", PICTURES_URL_PREFIX, name)
    }

    pub fn default_picture(role: Role) -> &'static str {
        match role {
            Role::Tutor => DEFAULT_TUTOR_PICTURE,
            Role::Student | Role::Admin => DEFAULT_STUDENT_PICTURE,
        }
    }

    /// URL of the stored picture if it is a readable file in the pictures
    /// directory, otherwise the role's default. Never fails.
    pub fn resolve(&self, role: Role, stored: Option<&str>) -> String {
        let found = stored
            .map(str::trim)
            .filter(|name| is_safe_name(name))
            .filter(|name| {
                fs::metadata(self.dir.join(name))
                    .map(|meta| meta.is_file())
                    .unwrap_or(false)
            });

        match found {
            Some(name) => self.url_for(name),
            None => self.url_for(Self::default_picture(role)),
        }
    }

    pub fn resolve_profile(&self, role: Role, profile: Option<&Profile>) -> String {
        self.resolve(role, profile.and_then(|p| p.profile_pic()))
    }

    /// Decode an upload, shrink it to fit the thumbnail box and store it under
    /// a random name that keeps the original extension.
    pub fn save_thumbnail(&self, original_name: &str, bytes: &[u8]) -> Result<String, PictureError> {
        let extension = allowed_extension(original_name).ok_or(PictureError::UnsupportedType)?;
        let format = ImageFormat::from_extension(&extension).ok_or(PictureError::UnsupportedType)?;

        let image = image::load_from_memory(bytes).map_err(|e| PictureError::Decode(e.to_string()))?;
        let mut thumbnail = image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
        if format == ImageFormat::Jpeg {
            thumbnail = image::DynamicImage::ImageRgb8(thumbnail.to_rgb8());
        }

        fs::create_dir_all(&self.dir)?;

        let mut rng = rand::thread_rng();
        let random: [u8; 8] = rng.gen();
        let filename = format!("{}.{}", hex::encode(random), extension);

        thumbnail
            .save_with_format(self.dir.join(&filename), format)
            .map_err(|e| PictureError::Encode(e.to_string()))?;

        tracing::debug!("Stored profile picture {}", filename);
        Ok(filename)
    }

    /// Store a file as-is under `name` (admin upload).
    pub fn store_file(&self, name: &str, bytes: &[u8]) -> Result<String, PictureError> {
        let name = name.trim();
        if !is_safe_name(name) {
            return Err(PictureError::InvalidName);
        }
        allowed_extension(name).ok_or(PictureError::UnsupportedType)?;
        image::guess_format(bytes).map_err(|e| PictureError::Decode(e.to_string()))?;

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        if path.exists() {
            return Err(PictureError::AlreadyExists);
        }
        fs::write(path, bytes)?;

        Ok(name.to_string())
    }

    pub fn delete(&self, name: &str) -> Result<(), PictureError> {
        if !is_safe_name(name) {
            return Err(PictureError::InvalidName);
        }
        if name == DEFAULT_STUDENT_PICTURE || name == DEFAULT_TUTOR_PICTURE {
            return Err(PictureError::Protected);
        }

        fs::remove_file(self.dir.join(name))?;
        Ok(())
    }

    /// Regular files in the pictures directory, sorted by name. A missing
    /// directory lists as empty.
    pub fn list(&self) -> Result<Vec<PictureFile>, PictureError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            files.push(PictureFile {
                url: self.url_for(&name),
                name,
                size: meta.len(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
}

fn allowed_extension(name: &str) -> Option<String> {
    let extension = Path::new(name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}
