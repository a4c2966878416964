//! API key storage.
//!
//! Keys live in a flat JSON object (`alias -> key`) in `.ocrvid.json`, in the
//! directory named by `OCRVID_USER_PATH` or else the user's home directory.
//! Lookups try the alias first, then an environment variable.

use std::{
    collections::BTreeMap,
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use directories::BaseDirs;

use crate::{
    error::OcrvidError,
    store::{to_json_pretty, write_atomic},
};

/// Environment variable overriding the key file directory.
pub const USER_PATH_ENV: &str = "OCRVID_USER_PATH";
/// Name of the key file.
pub const KEY_FILE_NAME: &str = ".ocrvid.json";
/// Alias used when none is given, also the environment variable consulted
/// by the playlist command.
pub const DEFAULT_KEY_ALIAS: &str = "YOUTUBE_API_KEY";

/// A JSON key file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Use the key file at `path`.
    pub fn at<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Use `.ocrvid.json` inside `directory`.
    pub fn in_directory<P: AsRef<Path>>(directory: P) -> Self {
        Self::at(directory.as_ref().join(KEY_FILE_NAME))
    }

    /// The key file in `$OCRVID_USER_PATH`, or in the home directory.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::InvalidConfig`] if the variable is unset and no
    /// home directory can be determined.
    pub fn default_location() -> Result<Self, OcrvidError> {
        if let Some(directory) = env::var_os(USER_PATH_ENV).filter(|value| !value.is_empty()) {
            return Ok(Self::in_directory(PathBuf::from(directory)));
        }

        let base = BaseDirs::new().ok_or_else(|| {
            OcrvidError::InvalidConfig(format!(
                "cannot determine the home directory; set {USER_PATH_ENV}"
            ))
        })?;
        Ok(Self::in_directory(base.home_dir()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored keys. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::IoError`] or [`OcrvidError::JsonError`] if the
    /// file exists but cannot be read or is not a JSON object of strings.
    pub fn load(&self) -> Result<BTreeMap<String, String>, OcrvidError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(error) => Err(error.into()),
        }
    }

    /// Store `key` under `alias`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Errors from [`load`](CredentialStore::load), or
    /// [`OcrvidError::WriteFailed`].
    pub fn set(&self, alias: &str, key: &str) -> Result<(), OcrvidError> {
        let mut keys = self.load()?;
        keys.insert(alias.to_string(), key.to_string());
        write_atomic(&self.path, &to_json_pretty(&keys)?)?;
        log::debug!("Stored key {alias} in {}", self.path.display());
        Ok(())
    }

    /// Look up a key by `alias`, then by the environment variable `env_var`.
    ///
    /// Empty values are treated as absent.
    ///
    /// # Errors
    ///
    /// Errors from [`load`](CredentialStore::load).
    pub fn resolve(
        &self,
        alias: Option<&str>,
        env_var: Option<&str>,
    ) -> Result<Option<String>, OcrvidError> {
        if let Some(alias) = alias {
            if let Some(key) = self.load()?.remove(alias).filter(|key| !key.is_empty()) {
                return Ok(Some(key));
            }
        }

        Ok(env_var
            .and_then(|name| env::var(name).ok())
            .filter(|key| !key.is_empty()))
    }

    /// Like [`resolve`](CredentialStore::resolve), but a missing key is an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`OcrvidError::CredentialMissing`] if neither source has a key.
    pub fn require(&self, alias: Option<&str>, env_var: Option<&str>) -> Result<String, OcrvidError> {
        self.resolve(alias, env_var)?
            .ok_or_else(|| OcrvidError::CredentialMissing {
                alias: alias.map(str::to_string),
                env_var: env_var.map(str::to_string),
            })
    }
}
